//! Change model for observable sequences.
//!
//! A `Change` is one positional edit to an ordered sequence. Operators never
//! re-send a whole collection: they take the old and new sides of an incoming
//! change, translate both into their own coordinates as `IndexedItems`, and
//! let [`Change::classify`] decide which kind of edit the pair represents.

use crate::error::{Error, Result};
use alloc::vec;
use alloc::vec::Vec;

/// Discriminant of a [`Change`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insertion,
    Removal,
    Replacement,
    Move,
    Reset,
}

/// A single edit to an ordered sequence.
///
/// Every variant except `Reset` carries only the affected items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change<T> {
    /// `items` inserted starting at `index` of the post-edit sequence.
    Insertion { index: usize, items: Vec<T> },
    /// `items` removed starting at `index` of the pre-edit sequence.
    Removal { index: usize, items: Vec<T> },
    /// `old_items` at `index` replaced by `new_items`.
    Replacement {
        index: usize,
        old_items: Vec<T>,
        new_items: Vec<T>,
    },
    /// `items` taken out at `old_index` and put back so that the first of
    /// them ends up at `new_index` of the post-edit sequence.
    Move {
        old_index: usize,
        new_index: usize,
        items: Vec<T>,
    },
    /// Whole content replaced.
    Reset { old_items: Vec<T>, new_items: Vec<T> },
}

impl<T> Change<T> {
    /// Returns the kind of this change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Insertion { .. } => ChangeKind::Insertion,
            Change::Removal { .. } => ChangeKind::Removal,
            Change::Replacement { .. } => ChangeKind::Replacement,
            Change::Move { .. } => ChangeKind::Move,
            Change::Reset { .. } => ChangeKind::Reset,
        }
    }

    /// Items leaving the sequence (for a move, the moved items).
    pub fn old_items(&self) -> &[T] {
        match self {
            Change::Insertion { .. } => &[],
            Change::Removal { items, .. } | Change::Move { items, .. } => items,
            Change::Replacement { old_items, .. } | Change::Reset { old_items, .. } => old_items,
        }
    }

    /// Items entering the sequence (for a move, the moved items).
    pub fn new_items(&self) -> &[T] {
        match self {
            Change::Removal { .. } => &[],
            Change::Insertion { items, .. } | Change::Move { items, .. } => items,
            Change::Replacement { new_items, .. } | Change::Reset { new_items, .. } => new_items,
        }
    }

    /// Start of the old side, `None` when the old side is empty.
    pub fn old_index(&self) -> Option<usize> {
        match self {
            Change::Insertion { .. } => None,
            Change::Removal { index, .. } | Change::Replacement { index, .. } => Some(*index),
            Change::Move { old_index, .. } => Some(*old_index),
            Change::Reset { old_items, .. } => (!old_items.is_empty()).then_some(0),
        }
    }

    /// Start of the new side, `None` when the new side is empty.
    pub fn new_index(&self) -> Option<usize> {
        match self {
            Change::Removal { .. } => None,
            Change::Insertion { index, .. } | Change::Replacement { index, .. } => Some(*index),
            Change::Move { new_index, .. } => Some(*new_index),
            Change::Reset { new_items, .. } => (!new_items.is_empty()).then_some(0),
        }
    }

    /// Net change in sequence length.
    pub fn len_delta(&self) -> isize {
        match self {
            Change::Move { .. } => 0,
            _ => self.new_items().len() as isize - self.old_items().len() as isize,
        }
    }

    /// Shifts every index of the change by `delta`.
    ///
    /// A `Reset` has no position and is returned unchanged; normalize it with
    /// [`Change::normalize_reset`] first when it must be positioned.
    pub fn offset(self, delta: usize) -> Self {
        match self {
            Change::Insertion { index, items } => Change::Insertion {
                index: index + delta,
                items,
            },
            Change::Removal { index, items } => Change::Removal {
                index: index + delta,
                items,
            },
            Change::Replacement {
                index,
                old_items,
                new_items,
            } => Change::Replacement {
                index: index + delta,
                old_items,
                new_items,
            },
            Change::Move {
                old_index,
                new_index,
                items,
            } => Change::Move {
                old_index: old_index + delta,
                new_index: new_index + delta,
                items,
            },
            reset @ Change::Reset { .. } => reset,
        }
    }

    /// Verifies that this change is well formed against a sequence of `len`
    /// items (the length before the edit).
    pub fn check_bounds(&self, len: usize) -> Result<()> {
        match self {
            Change::Insertion { index, items } => {
                if items.is_empty() {
                    return Err(Error::EmptyItems);
                }
                Error::check_insertion_point(*index, len)
            }
            Change::Removal { index, items } => {
                if items.is_empty() {
                    return Err(Error::EmptyItems);
                }
                Error::check_range(*index, items.len(), len)
            }
            Change::Replacement {
                index,
                old_items,
                new_items,
            } => {
                if old_items.is_empty() || new_items.is_empty() {
                    return Err(Error::EmptyItems);
                }
                Error::check_range(*index, old_items.len(), len)
            }
            Change::Move {
                old_index,
                new_index,
                items,
            } => {
                if items.is_empty() {
                    return Err(Error::EmptyItems);
                }
                Error::check_range(*old_index, items.len(), len)?;
                if *new_index + items.len() > len {
                    return Err(Error::invalid_move(*old_index, items.len(), *new_index));
                }
                Ok(())
            }
            Change::Reset { old_items, .. } => {
                if old_items.len() != len {
                    return Err(Error::range_out_of_bounds(0, old_items.len(), len));
                }
                Ok(())
            }
        }
    }

    /// Splits the change into its old and new sides, consuming it.
    pub fn into_sides(self) -> (IndexedItems<T>, IndexedItems<T>)
    where
        T: Clone,
    {
        match self {
            Change::Insertion { index, items } => {
                (IndexedItems::empty(), IndexedItems::new(index, items))
            }
            Change::Removal { index, items } => {
                (IndexedItems::new(index, items), IndexedItems::empty())
            }
            Change::Replacement {
                index,
                old_items,
                new_items,
            } => (
                IndexedItems::new(index, old_items),
                IndexedItems::new(index, new_items),
            ),
            Change::Move {
                old_index,
                new_index,
                items,
            } => (
                IndexedItems::new(old_index, items.clone()),
                IndexedItems::new(new_index, items),
            ),
            Change::Reset {
                old_items,
                new_items,
            } => (IndexedItems::new(0, old_items), IndexedItems::new(0, new_items)),
        }
    }

    /// Applies the change to a materialized sequence.
    ///
    /// The target is left untouched when the change does not fit it.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<()>
    where
        T: Clone,
    {
        self.check_bounds(target.len())?;
        match self {
            Change::Insertion { index, items } => {
                target.splice(*index..*index, items.iter().cloned());
            }
            Change::Removal { index, items } => {
                target.drain(*index..*index + items.len());
            }
            Change::Replacement {
                index,
                old_items,
                new_items,
            } => {
                target.splice(*index..*index + old_items.len(), new_items.iter().cloned());
            }
            Change::Move {
                old_index,
                new_index,
                items,
            } => {
                let moved: Vec<T> = target.drain(*old_index..*old_index + items.len()).collect();
                target.splice(*new_index..*new_index, moved);
            }
            Change::Reset { new_items, .. } => {
                target.clear();
                target.extend(new_items.iter().cloned());
            }
        }
        Ok(())
    }
}

impl<T: PartialEq> Change<T> {
    /// Infers which edit an (old side, new side) pair represents.
    ///
    /// - only new items: `Insertion`
    /// - only old items: `Removal`
    /// - both, same index: `Replacement`
    /// - both, different index, equal items: `Move`
    ///
    /// Anything else yields `None`. A `Reset` is never produced here. A move
    /// that leaves its items in place is not a change at all; callers that
    /// relocate items compare the indices themselves before classifying.
    pub fn classify(old: IndexedItems<T>, new: IndexedItems<T>) -> Option<Self> {
        match (old.into_parts(), new.into_parts()) {
            (None, None) => None,
            (None, Some((index, items))) => Some(Change::Insertion { index, items }),
            (Some((index, items)), None) => Some(Change::Removal { index, items }),
            (Some((old_index, old_items)), Some((new_index, new_items))) => {
                if old_index == new_index {
                    Some(Change::Replacement {
                        index: new_index,
                        old_items,
                        new_items,
                    })
                } else if old_items == new_items {
                    Some(Change::Move {
                        old_index,
                        new_index,
                        items: new_items,
                    })
                } else {
                    None
                }
            }
        }
    }

    /// Like [`Change::classify`], but never drops items: a pair that no single
    /// kind can express becomes a `Removal` followed by an `Insertion`.
    pub fn from_sides(old: IndexedItems<T>, new: IndexedItems<T>) -> Vec<Self> {
        let split = !old.is_empty()
            && !new.is_empty()
            && old.index() != new.index()
            && old.items() != new.items();
        if split {
            let (old_index, old_items) = old.into_parts().unwrap_or_default();
            let (new_index, new_items) = new.into_parts().unwrap_or_default();
            return vec![
                Change::Removal {
                    index: old_index,
                    items: old_items,
                },
                Change::Insertion {
                    index: new_index,
                    items: new_items,
                },
            ];
        }
        Self::classify(old, new).into_iter().collect()
    }

    /// Rewrites a `Reset` as the equivalent positional change at index 0.
    ///
    /// Returns `None` for a reset that neither removed nor added anything;
    /// any other change is returned as is.
    pub fn normalize_reset(self) -> Option<Self> {
        match self {
            Change::Reset {
                old_items,
                new_items,
            } => Self::classify(
                IndexedItems::new(0, old_items),
                IndexedItems::new(0, new_items),
            ),
            change => Some(change),
        }
    }
}

/// A run of items anchored at an index, or nothing.
///
/// The index is only meaningful when the run is non-empty: [`index`] returns
/// `None` exactly when there are no items.
///
/// [`index`]: IndexedItems::index
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedItems<T> {
    index: usize,
    items: Vec<T>,
}

impl<T> Default for IndexedItems<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> IndexedItems<T> {
    /// Creates a run starting at `index`. An empty `items` yields the empty run.
    pub fn new(index: usize, items: Vec<T>) -> Self {
        if items.is_empty() {
            return Self::empty();
        }
        Self { index, items }
    }

    /// The empty run.
    #[inline]
    pub fn empty() -> Self {
        Self {
            index: 0,
            items: Vec::new(),
        }
    }

    #[inline]
    pub fn index(&self) -> Option<usize> {
        (!self.items.is_empty()).then_some(self.index)
    }

    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Shifts the run by `delta` positions.
    pub fn offset(self, delta: usize) -> Self {
        Self {
            index: self.index + delta,
            items: self.items,
        }
    }

    /// Returns `(index, items)`, or `None` for the empty run.
    pub fn into_parts(self) -> Option<(usize, Vec<T>)> {
        if self.items.is_empty() {
            None
        } else {
            Some((self.index, self.items))
        }
    }
}
