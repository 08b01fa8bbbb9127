//! Ripple Core - Change model for observable ordered sequences.
//!
//! This crate provides the vocabulary shared by every Ripple component:
//!
//! - `Change`: one positional edit (insertion, removal, replacement, move, reset)
//! - `IndexedItems`: an anchored run of items, the unit operators translate
//! - `Change::classify`: infers the kind of edit an old/new pair represents
//! - `Error`: precondition and stream errors
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{Change, IndexedItems};
//!
//! let change = Change::classify(IndexedItems::new(0, vec![1]), IndexedItems::new(2, vec![1]));
//! assert_eq!(change, Some(Change::Move { old_index: 0, new_index: 2, items: vec![1] }));
//!
//! let mut list = vec![1, 2, 3];
//! change.unwrap().apply_to(&mut list).unwrap();
//! assert_eq!(list, vec![2, 3, 1]);
//! ```

#![no_std]

extern crate alloc;

mod change;
mod error;

pub use change::{Change, ChangeKind, IndexedItems};
pub use error::{Error, Result};
