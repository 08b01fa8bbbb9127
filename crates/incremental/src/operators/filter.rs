//! Incremental filter operator.

use super::{attach, Stage, StageNode};
use crate::lookup::{encode, IndexLookup};
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use ripple_core::{Change, IndexedItems, Result};
use ripple_reactive::{Observable, Observer, Subscription};

/// Keeps the items that satisfy a predicate, in source order.
///
/// The predicate runs once per inserted item; removals and moves are resolved
/// through a lookup holding one signed entry per source item (see
/// [`IndexLookup`]).
pub struct Filter<S, F> {
    source: S,
    predicate: Rc<F>,
}

impl<S, F> Filter<S, F> {
    pub fn new(source: S, predicate: F) -> Self {
        Self {
            source,
            predicate: Rc::new(predicate),
        }
    }
}

pub(crate) struct FilterStage<F> {
    predicate: Rc<F>,
    lookup: IndexLookup,
}

impl<F> FilterStage<F> {
    fn new(predicate: Rc<F>) -> Self {
        Self {
            predicate,
            lookup: IndexLookup::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn lookup(&self) -> &IndexLookup {
        &self.lookup
    }

    /// Filtered position at which items inserted at source `index` start.
    fn cursor_at(&self, index: usize) -> usize {
        if index < self.lookup.len() {
            self.lookup.resolve(index)
        } else if index == 0 {
            0
        } else {
            // Appending: nothing follows, derive from the preceding entry.
            let prev = index - 1;
            self.lookup.resolve(prev) + usize::from(self.lookup.passes(prev))
        }
    }

    /// Drops the entries of `items` removed at source `index`, returning the
    /// passing subset at its filtered position.
    fn remove<T: Clone>(&mut self, index: usize, items: &[T]) -> IndexedItems<T> {
        if items.is_empty() {
            return IndexedItems::empty();
        }
        let start = self.lookup.resolve(index);
        let removed: Vec<T> = items
            .iter()
            .enumerate()
            .filter(|(offset, _)| self.lookup.passes(index + offset))
            .map(|(_, item)| item.clone())
            .collect();
        self.lookup.remove_range(index, items.len());
        self.lookup.shift(index, -(removed.len() as isize));
        IndexedItems::new(start, removed)
    }

    /// Adds entries for `items` inserted at source `index`, given their pass
    /// flags, returning the passing subset at its filtered position.
    fn insert<T: Clone>(&mut self, index: usize, items: &[T], flags: &[bool]) -> IndexedItems<T> {
        let start = self.cursor_at(index);
        let mut cursor = start;
        let mut values = Vec::with_capacity(items.len());
        let mut added = Vec::new();
        for (item, &passes) in items.iter().zip(flags) {
            values.push(encode(cursor, passes));
            if passes {
                cursor += 1;
                added.push(item.clone());
            }
        }
        self.lookup.shift(index, added.len() as isize);
        self.lookup.insert_at(index, values);
        IndexedItems::new(start, added)
    }

    /// Relocates lookup entries without consulting the predicate.
    fn relocate<T: Clone>(
        &mut self,
        old_index: usize,
        new_index: usize,
        items: &[T],
    ) -> Vec<Change<T>> {
        let flags: Vec<bool> = (0..items.len())
            .map(|offset| self.lookup.passes(old_index + offset))
            .collect();
        let removed = self.remove(old_index, items);
        let added = self.insert(new_index, items, &flags);
        match (removed.into_parts(), added.into_parts()) {
            (Some((old_index, items)), Some((new_index, _))) if old_index != new_index => {
                vec![Change::Move {
                    old_index,
                    new_index,
                    items,
                }]
            }
            _ => Vec::new(),
        }
    }
}

impl<T, F> Stage<T, T> for FilterStage<F>
where
    T: Clone + PartialEq,
    F: Fn(&T) -> bool,
{
    fn handle(&mut self, change: &Change<T>) -> Result<Vec<Change<T>>> {
        change.check_bounds(self.lookup.len())?;
        match change {
            Change::Move {
                old_index,
                new_index,
                items,
            } => Ok(self.relocate(*old_index, *new_index, items)),
            Change::Reset {
                old_items,
                new_items,
            } => {
                let flags: Vec<bool> = new_items.iter().map(|item| (self.predicate)(item)).collect();
                let removed = self.remove(0, old_items);
                let added = self.insert(0, new_items, &flags);
                Ok(vec![Change::Reset {
                    old_items: removed.into_parts().map(|(_, items)| items).unwrap_or_default(),
                    new_items: added.into_parts().map(|(_, items)| items).unwrap_or_default(),
                }])
            }
            _ => {
                // Evaluate first so a panicking predicate leaves the lookup intact.
                let flags: Vec<bool> = change
                    .new_items()
                    .iter()
                    .map(|item| (self.predicate)(item))
                    .collect();
                let removed = match change.old_index() {
                    Some(index) => self.remove(index, change.old_items()),
                    None => IndexedItems::empty(),
                };
                let added = match change.new_index() {
                    Some(index) => self.insert(index, change.new_items(), &flags),
                    None => IndexedItems::empty(),
                };
                Ok(Change::from_sides(removed, added))
            }
        }
    }
}

type FilterNode<T, F> = StageNode<FilterStage<F>, T, T>;

fn subscribe_stage<S, T, F>(
    filter: &Filter<S, F>,
    observer: Rc<dyn Observer<T>>,
) -> (Rc<FilterNode<T, F>>, Subscription<T>)
where
    S: Observable<T>,
    T: Clone + PartialEq + 'static,
    F: Fn(&T) -> bool + 'static,
{
    attach(&filter.source, FilterStage::new(filter.predicate.clone()), observer)
}

impl<S, T, F> Observable<T> for Filter<S, F>
where
    S: Observable<T>,
    T: Clone + PartialEq + 'static,
    F: Fn(&T) -> bool + 'static,
{
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        subscribe_stage(self, observer).1
    }
}
