//! Incremental sort operator.

use super::{attach, Content, Stage, StageNode};
use crate::lookup::{contiguous_runs, decode, IndexLookup};
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use ripple_core::{Change, IndexedItems, Result};
use ripple_reactive::{Observable, Observer, Subscription};

/// Total order used by [`Sort`].
///
/// Implemented for closures `Fn(&T, &T) -> Ordering`, for [`NaturalOrder`]
/// and for [`ByKey`].
pub trait Comparer<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

impl<T, F> Comparer<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Orders items by their `Ord` implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<T: Ord> Comparer<T> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Orders items by a key extracted from each.
#[derive(Clone, Copy, Debug)]
pub struct ByKey<F>(pub F);

impl<T, K, F> Comparer<T> for ByKey<F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.0)(a).cmp(&(self.0)(b))
    }
}

/// Keeps the source items ordered by a comparer.
///
/// Comparer-equal items are allowed. A newly inserted item goes after the
/// equal items already present; equal items inserted together keep their
/// source order.
pub struct Sort<S, C> {
    source: S,
    comparer: Rc<C>,
}

impl<S, C> Sort<S, C> {
    pub fn new(source: S, comparer: C) -> Self {
        Self {
            source,
            comparer: Rc::new(comparer),
        }
    }
}

pub(crate) struct SortStage<T, C> {
    comparer: Rc<C>,
    sorted: Vec<T>,
    lookup: IndexLookup,
}

impl<T, C> SortStage<T, C>
where
    T: Clone,
    C: Comparer<T>,
{
    fn new(comparer: Rc<C>) -> Self {
        Self {
            comparer,
            sorted: Vec::new(),
            lookup: IndexLookup::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn lookup(&self) -> &IndexLookup {
        &self.lookup
    }

    /// Removes `count` source items at `index`, returning the sorted runs
    /// they occupied, highest first.
    fn remove(&mut self, index: usize, count: usize) -> Vec<IndexedItems<T>> {
        let mut positions: Vec<usize> = self
            .lookup
            .remove_range(index, count)
            .into_iter()
            .map(decode)
            .collect();
        positions.sort_unstable();

        let runs = contiguous_runs(&positions);
        let mut removed = Vec::with_capacity(runs.len());
        for run in runs.into_iter().rev() {
            let items: Vec<T> = self.sorted.drain(run.clone()).collect();
            self.lookup.shift_positions_from(run.end, -(items.len() as isize));
            removed.push(IndexedItems::new(run.start, items));
        }
        removed
    }

    /// Inserts source items at `index`, returning the sorted runs they now
    /// occupy, lowest first.
    fn insert(&mut self, index: usize, items: &[T]) -> Vec<IndexedItems<T>> {
        let comparer = &self.comparer;

        // Items sharing an insertion point form one run.
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (offset, item) in items.iter().enumerate() {
            let point = self
                .sorted
                .partition_point(|probe| comparer.compare(probe, item) != Ordering::Greater);
            groups.entry(point).or_default().push(offset);
        }

        let mut values = vec![0isize; items.len()];
        let mut added = Vec::with_capacity(groups.len());
        let mut inserted = 0;
        for (point, mut group) in groups {
            group.sort_by(|&a, &b| comparer.compare(&items[a], &items[b]));
            let at = point + inserted;
            self.lookup.shift_positions_from(at, group.len() as isize);
            for (rank, &offset) in group.iter().enumerate() {
                values[offset] = (at + rank) as isize;
            }
            let run: Vec<T> = group.iter().map(|&offset| items[offset].clone()).collect();
            self.sorted.splice(at..at, run.iter().cloned());
            inserted += run.len();
            added.push(IndexedItems::new(at, run));
        }
        self.lookup.insert_at(index, values);
        added
    }

    /// Sorts `items` from scratch, replacing the whole state.
    fn rebuild(&mut self, items: &[T]) {
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&a, &b| self.comparer.compare(&items[a], &items[b]));

        let mut values = vec![0isize; items.len()];
        for (position, &offset) in order.iter().enumerate() {
            values[offset] = position as isize;
        }
        self.sorted = order.iter().map(|&offset| items[offset].clone()).collect();
        self.lookup = IndexLookup::from(values);
    }
}

impl<T, C> Stage<T, T> for SortStage<T, C>
where
    T: Clone + PartialEq,
    C: Comparer<T>,
{
    fn handle(&mut self, change: &Change<T>) -> Result<Vec<Change<T>>> {
        change.check_bounds(self.lookup.len())?;
        match change {
            Change::Move {
                old_index,
                new_index,
                items,
            } => {
                self.lookup.relocate(*old_index, items.len(), *new_index);
                Ok(Vec::new())
            }
            Change::Reset { new_items, .. } => {
                let old_items = core::mem::take(&mut self.sorted);
                self.rebuild(new_items);
                if old_items.is_empty() && self.sorted.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![Change::Reset {
                    old_items,
                    new_items: self.sorted.clone(),
                }])
            }
            _ => {
                let mut removed = match change.old_index() {
                    Some(index) => self.remove(index, change.old_items().len()),
                    None => Vec::new(),
                };
                let mut added = match change.new_index() {
                    Some(index) => self.insert(index, change.new_items()),
                    None => Vec::new(),
                };
                if removed.len() <= 1 && added.len() <= 1 {
                    return Ok(Change::from_sides(
                        removed.pop().unwrap_or_default(),
                        added.pop().unwrap_or_default(),
                    ));
                }
                let removals = removed.into_iter().filter_map(|run| {
                    let (index, items) = run.into_parts()?;
                    Some(Change::Removal { index, items })
                });
                let insertions = added.into_iter().filter_map(|run| {
                    let (index, items) = run.into_parts()?;
                    Some(Change::Insertion { index, items })
                });
                Ok(removals.chain(insertions).collect())
            }
        }
    }
}

impl<T, C> Content<T> for SortStage<T, C> {
    fn content(&self) -> &[T] {
        &self.sorted
    }
}

type SortNode<T, C> = StageNode<SortStage<T, C>, T, T>;

fn subscribe_stage<S, T, C>(
    sort: &Sort<S, C>,
    observer: Rc<dyn Observer<T>>,
) -> (Rc<SortNode<T, C>>, Subscription<T>)
where
    S: Observable<T>,
    T: Clone + PartialEq + 'static,
    C: Comparer<T> + 'static,
{
    attach(&sort.source, SortStage::new(sort.comparer.clone()), observer)
}

impl<S, T, C> Observable<T> for Sort<S, C>
where
    S: Observable<T>,
    T: Clone + PartialEq + 'static,
    C: Comparer<T> + 'static,
{
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        let (node, subscription) = subscribe_stage(self, observer);
        subscription.with_inner_list(node)
    }
}
