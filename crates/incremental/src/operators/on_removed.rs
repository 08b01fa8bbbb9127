//! Release hook for items leaving a sequence.

use super::{attach, Stage};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use ripple_core::{Change, Result};
use ripple_reactive::{Observable, Observer, Subscription};

/// Forwards every change unchanged and calls `hook` for each item that leaves
/// the sequence: removed items, the old side of a replacement and the old
/// content of a reset. Moved items stay in the sequence and are not reported.
///
/// The hook runs before the change reaches the downstream observer. Items are
/// cloned through a pipeline, so a resource meant to be released here should
/// be shared (`Rc<Resource>`) rather than owned by each copy.
pub struct OnRemoved<S, F> {
    source: S,
    hook: Rc<F>,
}

impl<S, F> OnRemoved<S, F> {
    pub fn new(source: S, hook: F) -> Self {
        Self {
            source,
            hook: Rc::new(hook),
        }
    }
}

struct OnRemovedStage<F> {
    hook: Rc<F>,
}

impl<T, F> Stage<T, T> for OnRemovedStage<F>
where
    T: Clone,
    F: Fn(&T),
{
    fn handle(&mut self, change: &Change<T>) -> Result<Vec<Change<T>>> {
        if !matches!(change, Change::Move { .. }) {
            change.old_items().iter().for_each(|item| (self.hook)(item));
        }
        Ok(vec![change.clone()])
    }
}

impl<S, T, F> Observable<T> for OnRemoved<S, F>
where
    S: Observable<T>,
    T: Clone + 'static,
    F: Fn(&T) + 'static,
{
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        let stage = OnRemovedStage {
            hook: self.hook.clone(),
        };
        attach(&self.source, stage, observer).1
    }
}
