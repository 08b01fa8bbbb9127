//! Materialized list.
//!
//! Consumes a change stream into a concrete `Vec`, applying each change as it
//! arrives. This is the terminal stage of most pipelines and what external
//! adapters read from.

use crate::observable::{InnerList, Observable};
use crate::observer::Observer;
use crate::subscription::Subscription;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{Change, Error};
use tracing::warn;

struct MaterializedState<T> {
    items: RefCell<Vec<T>>,
    completed: Cell<bool>,
    error: RefCell<Option<Error>>,
}

impl<T> MaterializedState<T> {
    fn is_terminated(&self) -> bool {
        self.completed.get() || self.error.borrow().is_some()
    }
}

impl<T: Clone> Observer<T> for MaterializedState<T> {
    fn on_next(&self, change: &Change<T>) {
        if self.is_terminated() {
            return;
        }
        let result = change.apply_to(&mut self.items.borrow_mut());
        if let Err(error) = result {
            warn!(%error, "change does not fit materialized list");
            *self.error.borrow_mut() = Some(error);
        }
    }

    fn on_completed(&self) {
        self.completed.set(true);
    }

    fn on_error(&self, error: &Error) {
        *self.error.borrow_mut() = Some(error.clone());
    }
}

/// A `Vec` kept in lock-step with a change stream.
///
/// Dropping the list releases its subscription.
pub struct MaterializedList<T> {
    state: Rc<MaterializedState<T>>,
    subscription: Subscription<T>,
}

impl<T: Clone + 'static> MaterializedList<T> {
    /// Subscribes to `source` and materializes its content.
    pub fn new<O>(source: &O) -> Self
    where
        O: Observable<T> + ?Sized,
    {
        Self::with_capacity(source, 0)
    }

    /// Like [`MaterializedList::new`], reserving room for `capacity` items.
    pub fn with_capacity<O>(source: &O, capacity: usize) -> Self
    where
        O: Observable<T> + ?Sized,
    {
        let state = Rc::new(MaterializedState {
            items: RefCell::new(Vec::with_capacity(capacity)),
            completed: Cell::new(false),
            error: RefCell::new(None),
        });
        let subscription = source.subscribe(state.clone());
        Self {
            state,
            subscription,
        }
    }
}

impl<T: Clone> MaterializedList<T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.state.items.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.state.items.borrow().get(index).cloned()
    }

    /// Copies the current content.
    pub fn to_vec(&self) -> Vec<T> {
        self.state.items.borrow().clone()
    }

    /// Returns true once the upstream completed.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state.completed.get()
    }

    /// The error that ended the stream, if any.
    pub fn error(&self) -> Option<Error> {
        self.state.error.borrow().clone()
    }

    /// Stops tracking the upstream; the content stays as it is.
    pub fn unsubscribe(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl<T: Clone> InnerList<T> for MaterializedList<T> {
    fn len(&self) -> usize {
        MaterializedList::len(self)
    }

    fn get(&self, index: usize) -> Option<T> {
        MaterializedList::get(self, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_list::SourceList;
    use alloc::vec;

    #[test]
    fn test_materialize_follows_source() {
        let source: SourceList<i32> = vec![1, 2, 3].into_iter().collect();
        let list = MaterializedList::new(&source);
        assert_eq!(list.to_vec(), vec![1, 2, 3]);

        source.insert(1, 9).unwrap();
        source.move_item(0, 3).unwrap();
        source.replace_at(0, 7).unwrap();
        source.remove_range(1, 2).unwrap();
        assert_eq!(list.to_vec(), source.to_vec());

        source.replace_all([4, 5]).unwrap();
        assert_eq!(list.to_vec(), vec![4, 5]);
        assert_eq!(list.get(1), Some(5));
        assert_eq!(InnerList::to_vec(&list), vec![4, 5]);
    }

    #[test]
    fn test_materialize_unsubscribe_freezes_content() {
        let source = SourceList::<i32>::new();
        let mut list = MaterializedList::new(&source);

        source.push(1).unwrap();
        list.unsubscribe();
        source.push(2).unwrap();

        assert_eq!(list.to_vec(), vec![1]);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_materialize_records_terminal() {
        let source = SourceList::<i32>::new();
        let list = MaterializedList::new(&source);
        source.fail(Error::upstream("gone")).unwrap();
        assert_eq!(list.error(), Some(Error::upstream("gone")));
        assert!(!list.is_completed());

        let source = SourceList::<i32>::new();
        let list = MaterializedList::new(&source);
        source.complete().unwrap();
        assert!(list.is_completed());
    }

    #[test]
    fn test_materialize_rejects_malformed_change() {
        struct Broken;

        impl Observable<i32> for Broken {
            fn subscribe(&self, observer: Rc<dyn Observer<i32>>) -> Subscription<i32> {
                observer.on_next(&Change::Removal {
                    index: 3,
                    items: vec![1],
                });
                Subscription::empty()
            }
        }

        let list = MaterializedList::new(&Broken);
        assert_eq!(list.error(), Some(Error::range_out_of_bounds(3, 1, 0)));
        assert!(list.is_empty());
    }
}
