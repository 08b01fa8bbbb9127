//! Observer contract for change streams.
//!
//! Delivery is push based and synchronous: a producer calls `on_next` for
//! every change, then at most one of `on_completed` / `on_error`.

use alloc::rc::Rc;
use core::cell::Cell;
use core::marker::PhantomData;
use ripple_core::{Change, Error};
use tracing::{trace, warn};

/// Receiver of a change stream.
///
/// Methods take `&self`: observers that keep state use interior mutability,
/// which lets a callback reach back into the pipeline that is notifying it.
pub trait Observer<T> {
    /// Receives the next change.
    fn on_next(&self, change: &Change<T>);

    /// The producer finished; no further changes follow.
    fn on_completed(&self) {}

    /// The producer failed; no further changes follow.
    fn on_error(&self, _error: &Error) {}
}

/// Observer that forwards every change to a closure.
pub struct FnObserver<T, F>
where
    F: Fn(&Change<T>),
{
    f: F,
    _phantom: PhantomData<fn(&Change<T>)>,
}

impl<T, F> FnObserver<T, F>
where
    F: Fn(&Change<T>),
{
    pub fn new(f: F) -> Self {
        FnObserver {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<T, F> Observer<T> for FnObserver<T, F>
where
    F: Fn(&Change<T>),
{
    fn on_next(&self, change: &Change<T>) {
        (self.f)(change);
    }
}

/// Wraps a closure into a shareable observer.
pub fn observer_fn<T, F>(f: F) -> Rc<dyn Observer<T>>
where
    T: 'static,
    F: Fn(&Change<T>) + 'static,
{
    Rc::new(FnObserver::new(f))
}

/// The single consumer of an operator's output.
///
/// Enforces the terminal rules of the contract: once completed or failed,
/// nothing else reaches the observer.
pub struct Downstream<T> {
    observer: Rc<dyn Observer<T>>,
    terminated: Cell<bool>,
}

impl<T> Downstream<T> {
    pub fn new(observer: Rc<dyn Observer<T>>) -> Self {
        Self {
            observer,
            terminated: Cell::new(false),
        }
    }

    /// Returns true once a terminal notification went out.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated.get()
    }

    /// Delivers a change unless the stream already terminated.
    pub fn next(&self, change: &Change<T>) {
        if self.terminated.get() {
            return;
        }
        trace!(kind = ?change.kind(), delta = change.len_delta(), "emit change");
        self.observer.on_next(change);
    }

    /// Delivers every change in order.
    pub fn next_all(&self, changes: impl IntoIterator<Item = Change<T>>) {
        for change in changes {
            self.next(&change);
        }
    }

    pub fn complete(&self) {
        if self.terminated.replace(true) {
            return;
        }
        self.observer.on_completed();
    }

    pub fn error(&self, error: &Error) {
        if self.terminated.replace(true) {
            return;
        }
        warn!(%error, "change stream failed");
        self.observer.on_error(error);
    }
}
