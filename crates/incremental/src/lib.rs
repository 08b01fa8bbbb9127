//! Ripple Incremental - Incremental operators over observable sequences.
//!
//! Each operator consumes a stream of positional `Change`s and emits the
//! changes of a derived sequence, keeping just enough state to never recompute
//! the derived sequence from scratch.
//!
//! # Operators
//!
//! - `Map`: per-item projection, mirrored so old items are never re-projected
//! - `Filter`: subsequence satisfying a predicate
//! - `Sort`: comparator order, with removals batched into contiguous runs
//! - `Concat`: two sequences one after the other
//! - `Flatten`: concatenation of an inner sequence per outer item
//! - `OnRemoved`: calls a hook for every item that leaves the sequence
//!
//! Filter and Sort map source positions onto output positions through an
//! [`IndexLookup`], one entry per source item.
//!
//! # Example
//!
//! ```rust
//! use ripple_incremental::{ObservableExt, SourceList};
//!
//! let first: SourceList<i32> = vec![1, 2, 3].into_iter().collect();
//! let second: SourceList<i32> = vec![4, 5, 6].into_iter().collect();
//! let view = first.clone().concat(second.clone()).materialize();
//!
//! first.extend([7, 8]).unwrap();
//! second.remove_at(0).unwrap();
//!
//! assert_eq!(view.to_vec(), vec![1, 2, 3, 7, 8, 5, 6]);
//! ```

#![no_std]

extern crate alloc;

mod ext;
pub mod lookup;
pub mod operators;

pub use ext::ObservableExt;
pub use lookup::IndexLookup;
pub use operators::{
    ByKey, Comparer, Concat, Filter, Flatten, Map, NaturalOrder, OnRemoved, Sort,
};

// Re-export the sequence and change model
pub use ripple_reactive::{
    observer_fn, Change, ChangeKind, Error, IndexedItems, InnerList, MaterializedList, Observable,
    Observer, Result, SourceList, SubscribeExt, Subscription,
};
