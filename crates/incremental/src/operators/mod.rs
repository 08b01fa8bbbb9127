//! Incremental operators over change streams.
//!
//! Every operator is cold: subscribing creates a fresh per-subscription node
//! holding the derived state (mirror, lookup, sorted backing, records), which
//! then subscribes upstream and receives the initial replay.
//!
//! - Map: per-item projection with a mirror of mapped values
//! - Filter: subsequence of passing items with a signed position lookup
//! - Sort: comparator order with a sorted backing and position lookup
//! - Concat: `first ++ second`
//! - Flatten: concatenation of the inner sequences of every outer item
//! - OnRemoved: pass-through that reports items leaving the sequence

mod concat;
mod filter;
mod flatten;
mod map;
mod on_removed;
mod sort;

pub use concat::Concat;
pub use filter::Filter;
pub use flatten::Flatten;
pub use map::Map;
pub use on_removed::OnRemoved;
pub use sort::{ByKey, Comparer, NaturalOrder, Sort};

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::marker::PhantomData;
use ripple_core::{Change, Error, Result};
use ripple_reactive::{Downstream, InnerList, Observable, Observer, Subscription};

/// Derived state of a single-input operator.
pub(crate) trait Stage<In, Out> {
    /// Translates one upstream change into the changes to emit, updating the
    /// derived state. Must leave the state untouched when it returns an error.
    fn handle(&mut self, change: &Change<In>) -> Result<Vec<Change<Out>>>;
}

/// Read access to the content a stage keeps.
pub(crate) trait Content<T> {
    fn content(&self) -> &[T];
}

/// Per-subscription node of a single-input operator.
pub(crate) struct StageNode<S, In, Out> {
    stage: RefCell<S>,
    downstream: Downstream<Out>,
    _input: PhantomData<fn(&Change<In>)>,
}

impl<S, In, Out> StageNode<S, In, Out>
where
    S: Stage<In, Out>,
{
    pub(crate) fn new(stage: S, observer: Rc<dyn Observer<Out>>) -> Self {
        Self {
            stage: RefCell::new(stage),
            downstream: Downstream::new(observer),
            _input: PhantomData,
        }
    }

    /// Runs `f` against the stage state.
    #[cfg(test)]
    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.stage.borrow())
    }
}

impl<S, In, Out> Observer<In> for StageNode<S, In, Out>
where
    S: Stage<In, Out>,
{
    fn on_next(&self, change: &Change<In>) {
        if self.downstream.is_terminated() {
            return;
        }
        let result = match self.stage.try_borrow_mut() {
            Ok(mut stage) => stage.handle(change),
            Err(_) => Err(Error::Reentrant),
        };
        match result {
            Ok(changes) => self.downstream.next_all(changes),
            Err(error) => self.downstream.error(&error),
        }
    }

    fn on_completed(&self) {
        self.downstream.complete();
    }

    fn on_error(&self, error: &Error) {
        self.downstream.error(error);
    }
}

impl<S, In, Out> InnerList<Out> for StageNode<S, In, Out>
where
    S: Content<Out>,
    Out: Clone,
{
    fn len(&self) -> usize {
        self.stage.borrow().content().len()
    }

    fn get(&self, index: usize) -> Option<Out> {
        self.stage.borrow().content().get(index).cloned()
    }
}

/// Subscribes a fresh stage node to `upstream`.
///
/// The returned subscription releases the upstream link.
pub(crate) fn attach<U, S, In, Out>(
    upstream: &U,
    stage: S,
    observer: Rc<dyn Observer<Out>>,
) -> (Rc<StageNode<S, In, Out>>, Subscription<Out>)
where
    U: Observable<In> + ?Sized,
    S: Stage<In, Out> + 'static,
    In: 'static,
    Out: 'static,
{
    let node = Rc::new(StageNode::new(stage, observer));
    let mut upstream_subscription = upstream.subscribe(node.clone());
    let subscription = Subscription::new(move || upstream_subscription.unsubscribe());
    (node, subscription)
}
