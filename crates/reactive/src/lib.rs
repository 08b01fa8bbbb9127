//! Ripple Reactive - Observable sequences for Ripple.
//!
//! This crate implements the push side of Ripple: a mutable sequence that
//! emits one `Change` per edit, the observer contract, and the subscription
//! handles that tie producers to consumers.
//!
//! # Core Concepts
//!
//! - `Observer`: receives `on_next(change)`, then at most one terminal call
//! - `Observable`: anything that can be subscribed to; replays its current
//!   content as an initial insertion
//! - `Subscription`: live link between a producer and a consumer, released
//!   explicitly or on drop
//! - `SourceList`: the mutable sequence where changes originate
//! - `MaterializedList`: a `Vec` kept in lock-step with a change stream
//! - `InnerList`: read access to the content a stage already maintains
//!
//! # Example
//!
//! ```rust
//! use ripple_reactive::{MaterializedList, SourceList};
//!
//! let source: SourceList<i32> = vec![1, 2].into_iter().collect();
//! let list = MaterializedList::new(&source);
//!
//! source.push(3).unwrap();
//! source.move_item(0, 2).unwrap();
//!
//! assert_eq!(list.to_vec(), vec![2, 3, 1]);
//! ```

#![no_std]

extern crate alloc;

pub mod materialize;
pub mod observable;
pub mod observer;
pub mod source_list;
pub mod subscription;

pub use materialize::MaterializedList;
pub use observable::{InnerList, Observable, SubscribeExt};
pub use observer::{observer_fn, Downstream, FnObserver, Observer};
pub use source_list::SourceList;
pub use subscription::{Subscriber, SubscriberList, Subscription, SubscriptionId};

// Re-export the change model
pub use ripple_core::{Change, ChangeKind, Error, IndexedItems, Result};
