//! Producers of change streams.

use crate::observer::{observer_fn, Observer};
use crate::subscription::Subscription;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use ripple_core::Change;

/// A source of `Change` events.
///
/// Subscribing replays the current content as one `Insertion` at index 0
/// (nothing when empty) before any later change.
pub trait Observable<T> {
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T>;
}

impl<T, O: Observable<T> + ?Sized> Observable<T> for &O {
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        (**self).subscribe(observer)
    }
}

impl<T, O: Observable<T> + ?Sized> Observable<T> for Rc<O> {
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        (**self).subscribe(observer)
    }
}

impl<T, O: Observable<T> + ?Sized> Observable<T> for Box<O> {
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        (**self).subscribe(observer)
    }
}

/// Closure-based subscribing.
pub trait SubscribeExt<T: 'static>: Observable<T> {
    /// Subscribes a closure that receives every change.
    fn subscribe_fn<F>(&self, f: F) -> Subscription<T>
    where
        F: Fn(&Change<T>) + 'static,
    {
        self.subscribe(observer_fn(f))
    }
}

impl<T: 'static, O: Observable<T> + ?Sized> SubscribeExt<T> for O {}

/// Read access to the current content of a stage.
///
/// Lets a consumer read the materialized state a stage already keeps
/// instead of rebuilding it from the change stream.
pub trait InnerList<T> {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<T>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the whole content.
    fn to_vec(&self) -> Vec<T> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }
}
