//! Subscription handles and subscriber bookkeeping.
//!
//! A `Subscription` is the live link between a producer and one consumer.
//! Releasing it (explicitly or by dropping it) stops delivery and releases
//! whatever the link owns, including nested subscriptions.

use crate::observable::InnerList;
use crate::observer::Observer;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;
use ripple_core::{Change, Error};

/// Unique identifier for a subscriber of a source.
pub type SubscriptionId = u64;

/// Handle to a live subscription.
pub struct Subscription<T> {
    teardown: Option<Box<dyn FnOnce()>>,
    inner_list: Option<Rc<dyn InnerList<T>>>,
}

impl<T> Subscription<T> {
    /// Creates a subscription that runs `teardown` when released.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
            inner_list: None,
        }
    }

    /// A subscription that owns nothing.
    pub fn empty() -> Self {
        Self {
            teardown: None,
            inner_list: None,
        }
    }

    /// Attaches the materialized content of the producing stage.
    pub fn with_inner_list(mut self, inner_list: Rc<dyn InnerList<T>>) -> Self {
        self.inner_list = Some(inner_list);
        self
    }

    /// Current content of the producing stage, when it maintains one.
    #[inline]
    pub fn inner_list(&self) -> Option<&Rc<dyn InnerList<T>>> {
        self.inner_list.as_ref()
    }

    /// Returns whether this subscription still has something to release.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    /// Releases the subscription. Calling it twice is harmless.
    pub fn unsubscribe(&mut self) {
        self.inner_list = None;
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .field("inner_list", &self.inner_list.is_some())
            .finish()
    }
}

/// One registered observer of a source.
pub struct Subscriber<T> {
    /// Unique identifier
    id: SubscriptionId,
    /// Receiver of the notifications
    observer: Rc<dyn Observer<T>>,
    /// Sequence number of the first change this subscriber may see
    since: u64,
    /// Whether this subscriber is still registered
    active: Cell<bool>,
}

impl<T> Subscriber<T> {
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Returns whether the change numbered `seq` was issued after this
    /// subscriber joined.
    #[inline]
    pub fn accepts(&self, seq: u64) -> bool {
        self.active.get() && seq >= self.since
    }

    pub fn notify(&self, change: &Change<T>) {
        if self.active.get() {
            self.observer.on_next(change);
        }
    }

    pub fn notify_completed(&self) {
        if self.active.get() {
            self.observer.on_completed();
        }
    }

    pub fn notify_error(&self, error: &Error) {
        if self.active.get() {
            self.observer.on_error(error);
        }
    }
}

/// Ordered registry of the subscribers of one source.
///
/// Notification order is subscription order.
pub struct SubscriberList<T> {
    subscribers: Vec<Rc<Subscriber<T>>>,
    next_id: SubscriptionId,
}

impl<T> Default for SubscriberList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriberList<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 1,
        }
    }

    /// Registers `observer` for changes numbered `since` and later.
    pub fn subscribe(&mut self, observer: Rc<dyn Observer<T>>, since: u64) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push(Rc::new(Subscriber {
            id,
            observer,
            since,
            active: Cell::new(true),
        }));
        id
    }

    /// Unregisters by ID.
    ///
    /// Returns true if the subscriber was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.subscribers.iter().position(|s| s.id == id) {
            Some(pos) => {
                let subscriber = self.subscribers.remove(pos);
                subscriber.active.set(false);
                true
            }
            None => false,
        }
    }

    /// Looks up a subscriber by ID.
    pub fn get(&self, id: SubscriptionId) -> Option<Rc<Subscriber<T>>> {
        self.subscribers.iter().find(|s| s.id == id).cloned()
    }

    /// Copies the current subscribers, so that delivery can proceed while
    /// the registry is modified by the observers themselves.
    pub fn snapshot(&self) -> Vec<Rc<Subscriber<T>>> {
        self.subscribers.clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscribers.iter().map(|s| s.id).collect()
    }

    /// Unregisters every subscriber.
    pub fn clear(&mut self) {
        for subscriber in self.subscribers.drain(..) {
            subscriber.active.set(false);
        }
    }
}
