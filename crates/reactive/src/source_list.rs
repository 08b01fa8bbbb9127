//! Mutable source sequence.
//!
//! `SourceList` owns an ordered `Vec` and emits exactly one `Change` per
//! mutation, synchronously, to every subscriber in subscription order.
//!
//! Mutations issued from inside a change callback are applied to storage at
//! once and their changes queued; the outermost delivery loop hands them out
//! in issue order after the current change reached every subscriber.

use crate::observable::{InnerList, Observable};
use crate::observer::Observer;
use crate::subscription::{Subscriber, SubscriberList, Subscription, SubscriptionId};
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use ripple_core::{Change, Error, Result};
use tracing::{debug, trace};

enum Notification<T> {
    Next(Change<T>),
    Completed,
    Failed(Error),
}

impl<T> Notification<T> {
    fn deliver(&self, observer: &Subscriber<T>) {
        match self {
            Notification::Next(change) => observer.notify(change),
            Notification::Completed => observer.notify_completed(),
            Notification::Failed(error) => observer.notify_error(error),
        }
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }
}

struct Pending<T> {
    /// Issue order; subscribers only see changes issued after they joined
    seq: u64,
    /// Set for replays addressed to a single subscriber
    target: Option<SubscriptionId>,
    notification: Notification<T>,
}

#[derive(Clone)]
enum Terminal {
    Completed,
    Failed(Error),
}

struct Shared<T> {
    items: RefCell<Vec<T>>,
    subscribers: RefCell<SubscriberList<T>>,
    queue: RefCell<VecDeque<Pending<T>>>,
    delivering: Cell<bool>,
    issued: Cell<u64>,
    terminal: RefCell<Option<Terminal>>,
}

struct DeliveryGuard<'a>(&'a Cell<bool>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// An observable, index-addressed mutable sequence.
///
/// Cloning yields another handle to the same sequence.
pub struct SourceList<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for SourceList<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Default for SourceList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SourceList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Creates an empty list with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_vec(Vec::with_capacity(capacity))
    }

    /// Creates a list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            shared: Rc::new(Shared {
                items: RefCell::new(items),
                subscribers: RefCell::new(SubscriberList::new()),
                queue: RefCell::new(VecDeque::new()),
                delivering: Cell::new(false),
                issued: Cell::new(0),
                terminal: RefCell::new(None),
            }),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shared.items.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.items.borrow().is_empty()
    }

    /// Returns the number of registered subscribers.
    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.borrow().len()
    }

    /// Returns whether `complete` or `fail` was called.
    pub fn is_terminated(&self) -> bool {
        self.shared.terminal.borrow().is_some()
    }

    /// Ends the stream: subscribers receive `on_completed` and are released.
    pub fn complete(&self) -> Result<()> {
        self.terminate(Terminal::Completed)
    }

    /// Fails the stream: subscribers receive `on_error` and are released.
    pub fn fail(&self, error: Error) -> Result<()> {
        self.terminate(Terminal::Failed(error))
    }

    fn terminate(&self, terminal: Terminal) -> Result<()> {
        self.ensure_open()?;
        *self.shared.terminal.borrow_mut() = Some(terminal.clone());
        debug!("source list terminated");
        self.publish(match terminal {
            Terminal::Completed => Notification::Completed,
            Terminal::Failed(error) => Notification::Failed(error),
        });
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_terminated() {
            Err(Error::Terminated)
        } else {
            Ok(())
        }
    }

    fn publish(&self, notification: Notification<T>) {
        let seq = self.shared.issued.get();
        self.shared.issued.set(seq + 1);
        self.shared.queue.borrow_mut().push_back(Pending {
            seq,
            target: None,
            notification,
        });
        self.drain();
    }

    /// Delivers queued notifications unless a delivery loop is already
    /// running further up the stack.
    fn drain(&self) {
        if self.shared.delivering.replace(true) {
            return;
        }
        let _guard = DeliveryGuard(&self.shared.delivering);
        loop {
            let next = self.shared.queue.borrow_mut().pop_front();
            let Some(pending) = next else {
                break;
            };
            match pending.target {
                Some(id) => {
                    let subscriber = self.shared.subscribers.borrow().get(id);
                    if let Some(subscriber) = subscriber {
                        pending.notification.deliver(&subscriber);
                        if pending.notification.is_terminal() {
                            self.shared.subscribers.borrow_mut().unsubscribe(id);
                        }
                    }
                }
                None => {
                    let subscribers = self.shared.subscribers.borrow().snapshot();
                    for subscriber in subscribers {
                        if subscriber.accepts(pending.seq) {
                            pending.notification.deliver(&subscriber);
                        }
                    }
                    if pending.notification.is_terminal() {
                        self.shared.subscribers.borrow_mut().clear();
                    }
                }
            }
        }
    }
}

impl<T: Clone> SourceList<T> {
    /// Returns a copy of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.shared.items.borrow().get(index).cloned()
    }

    /// Copies the whole content.
    pub fn to_vec(&self) -> Vec<T> {
        self.shared.items.borrow().clone()
    }

    /// Appends one item.
    pub fn push(&self, item: T) -> Result<()> {
        let index = self.len();
        self.insert_range(index, [item])
    }

    /// Appends items; fails with `EmptyItems` when there are none.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        let index = self.len();
        self.insert_range(index, items)
    }

    /// Inserts one item at `index` (`0..=len`).
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.insert_range(index, [item])
    }

    /// Inserts items starting at `index` (`0..=len`).
    pub fn insert_range(&self, index: usize, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.ensure_open()?;
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return Err(Error::EmptyItems);
        }
        {
            let mut storage = self.shared.items.borrow_mut();
            Error::check_insertion_point(index, storage.len())?;
            storage.splice(index..index, items.iter().cloned());
        }
        trace!(index, count = items.len(), "source insert");
        self.publish(Notification::Next(Change::Insertion { index, items }));
        Ok(())
    }

    /// Removes and returns the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.ensure_open()?;
        Error::check_index(index, self.len())?;
        let mut removed = self.remove_range(index, 1)?;
        removed.pop().ok_or(Error::EmptyItems)
    }

    /// Removes `count` items starting at `index` and returns them.
    pub fn remove_range(&self, index: usize, count: usize) -> Result<Vec<T>> {
        self.ensure_open()?;
        if count == 0 {
            return Err(Error::EmptyItems);
        }
        let items: Vec<T> = {
            let mut storage = self.shared.items.borrow_mut();
            Error::check_range(index, count, storage.len())?;
            storage.drain(index..index + count).collect()
        };
        trace!(index, count, "source remove");
        self.publish(Notification::Next(Change::Removal {
            index,
            items: items.clone(),
        }));
        Ok(items)
    }

    /// Moves the item at `old_index` so that it ends up at `new_index`.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        let len = self.len();
        Error::check_index(old_index, len)?;
        Error::check_index(new_index, len)?;
        let gap = if new_index > old_index {
            new_index + 1
        } else {
            new_index
        };
        self.move_range(old_index, 1, gap)
    }

    /// Moves `count` items starting at `old_index` in front of the item that
    /// currently sits at `new_index` (`len` moves them to the end).
    ///
    /// Targets touching the moved range itself leave the list unchanged and
    /// emit nothing; targets strictly inside it are rejected.
    pub fn move_range(&self, old_index: usize, count: usize, new_index: usize) -> Result<()> {
        self.ensure_open()?;
        if count == 0 {
            return Err(Error::EmptyItems);
        }
        let (final_index, items) = {
            let mut storage = self.shared.items.borrow_mut();
            let len = storage.len();
            Error::check_range(old_index, count, len)?;
            Error::check_insertion_point(new_index, len)?;
            if new_index > old_index && new_index < old_index + count {
                return Err(Error::invalid_move(old_index, count, new_index));
            }
            if new_index == old_index || new_index == old_index + count {
                return Ok(());
            }
            let final_index = if new_index > old_index {
                new_index - count
            } else {
                new_index
            };
            let items: Vec<T> = storage.drain(old_index..old_index + count).collect();
            storage.splice(final_index..final_index, items.iter().cloned());
            (final_index, items)
        };
        trace!(old_index, new_index = final_index, count, "source move");
        self.publish(Notification::Next(Change::Move {
            old_index,
            new_index: final_index,
            items,
        }));
        Ok(())
    }

    /// Replaces the item at `index` and returns the previous one.
    pub fn replace_at(&self, index: usize, item: T) -> Result<T> {
        self.ensure_open()?;
        let old = {
            let mut storage = self.shared.items.borrow_mut();
            Error::check_index(index, storage.len())?;
            core::mem::replace(&mut storage[index], item.clone())
        };
        trace!(index, "source replace");
        self.publish(Notification::Next(Change::Replacement {
            index,
            old_items: alloc::vec![old.clone()],
            new_items: alloc::vec![item],
        }));
        Ok(old)
    }

    /// Removes everything. Clearing an empty list emits nothing.
    pub fn clear(&self) -> Result<()> {
        self.replace_all(Vec::new())
    }

    /// Replaces the whole content, emitting a single `Reset`.
    pub fn replace_all(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.ensure_open()?;
        let new_items: Vec<T> = items.into_iter().collect();
        let old_items = {
            let mut storage = self.shared.items.borrow_mut();
            if storage.is_empty() && new_items.is_empty() {
                return Ok(());
            }
            core::mem::replace(&mut *storage, new_items.clone())
        };
        trace!(old = old_items.len(), new = new_items.len(), "source reset");
        self.publish(Notification::Next(Change::Reset {
            old_items,
            new_items,
        }));
        Ok(())
    }
}

impl<T: Clone + PartialEq> SourceList<T> {
    /// Position of the first item equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.shared.items.borrow().iter().position(|x| x == item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Removes the first item equal to `item`; returns whether one was found.
    pub fn remove_item(&self, item: &T) -> Result<bool> {
        match self.index_of(item) {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }
}

impl<T: Clone + 'static> Observable<T> for SourceList<T> {
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        let since = self.shared.issued.get();
        let id = self.shared.subscribers.borrow_mut().subscribe(observer, since);
        debug!(id, "source list subscribed");

        let snapshot = self.shared.items.borrow().clone();
        {
            let mut queue = self.shared.queue.borrow_mut();
            if !snapshot.is_empty() {
                queue.push_back(Pending {
                    seq: since,
                    target: Some(id),
                    notification: Notification::Next(Change::Insertion {
                        index: 0,
                        items: snapshot,
                    }),
                });
            }
            if let Some(terminal) = self.shared.terminal.borrow().clone() {
                queue.push_back(Pending {
                    seq: since,
                    target: Some(id),
                    notification: match terminal {
                        Terminal::Completed => Notification::Completed,
                        Terminal::Failed(error) => Notification::Failed(error),
                    },
                });
            }
        }
        self.drain();

        let shared = Rc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                if shared.subscribers.borrow_mut().unsubscribe(id) {
                    debug!(id, "source list unsubscribed");
                }
            }
        })
    }
}

impl<T: Clone> InnerList<T> for SourceList<T> {
    fn len(&self) -> usize {
        SourceList::len(self)
    }

    fn get(&self, index: usize) -> Option<T> {
        SourceList::get(self, index)
    }
}

impl<T> FromIterator<T> for SourceList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for SourceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceList")
            .field("items", &*self.shared.items.borrow())
            .field("subscribers", &self.shared.subscribers.borrow().len())
            .finish()
    }
}
