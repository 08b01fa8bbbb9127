//! Source-to-output position lookup.
//!
//! Filter and sort stages keep one entry per upstream item, in upstream order.
//! An entry is the item's position in the stage output. Filter also records
//! whether the item passed: a non-negative entry `p` is a passing item at `p`,
//! a negative entry `!p` is a rejected item whose successor would land at `p`.

use alloc::vec::Vec;
use core::ops::Range;

/// Encodes an output position together with a pass flag.
#[inline]
pub fn encode(position: usize, passes: bool) -> isize {
    let position = position as isize;
    if passes {
        position
    } else {
        !position
    }
}

/// Recovers the output position from an encoded entry.
#[inline]
pub fn decode(value: isize) -> usize {
    if value < 0 {
        (!value) as usize
    } else {
        value as usize
    }
}

#[inline]
fn shifted(value: isize, delta: isize) -> isize {
    if value < 0 {
        value - delta
    } else {
        value + delta
    }
}

/// Ordered table of encoded output positions, one per upstream item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexLookup {
    entries: Vec<isize>,
}

impl IndexLookup {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<isize> {
        self.entries.get(index).copied()
    }

    /// Output position recorded for the upstream item at `index`.
    #[inline]
    pub fn resolve(&self, index: usize) -> usize {
        decode(self.entries[index])
    }

    /// Whether the upstream item at `index` is present in the output.
    #[inline]
    pub fn passes(&self, index: usize) -> bool {
        self.entries[index] >= 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[isize] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Inserts entries for items added at upstream `index`.
    pub fn insert_at(&mut self, index: usize, values: impl IntoIterator<Item = isize>) {
        self.entries.splice(index..index, values);
    }

    /// Removes the entries of `count` upstream items starting at `index`.
    pub fn remove_range(&mut self, index: usize, count: usize) -> Vec<isize> {
        self.entries.drain(index..index + count).collect()
    }

    /// Moves `count` entries from `old_index` so the first lands at `new_index`
    /// of the resulting table. The stored values are left as they are.
    pub fn relocate(&mut self, old_index: usize, count: usize, new_index: usize) {
        let moved: Vec<isize> = self.entries.drain(old_index..old_index + count).collect();
        self.entries.splice(new_index..new_index, moved);
    }

    /// Shifts the output position of every entry from upstream `start` on,
    /// keeping each entry's pass flag.
    pub fn shift(&mut self, start: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        for value in self.entries.iter_mut().skip(start) {
            *value = shifted(*value, delta);
        }
    }

    /// Shifts every entry whose output position is at least `threshold`.
    pub fn shift_positions_from(&mut self, threshold: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        for value in self.entries.iter_mut() {
            if decode(*value) >= threshold {
                *value = shifted(*value, delta);
            }
        }
    }

    /// Output positions of the upstream items in `range`, decoded.
    pub fn positions(&self, range: Range<usize>) -> Vec<usize> {
        self.entries[range].iter().map(|&v| decode(v)).collect()
    }
}

impl From<Vec<isize>> for IndexLookup {
    fn from(entries: Vec<isize>) -> Self {
        Self { entries }
    }
}

/// Groups sorted positions into maximal runs of consecutive values.
pub fn contiguous_runs(sorted: &[usize]) -> Vec<Range<usize>> {
    let mut runs: Vec<Range<usize>> = Vec::new();
    for &position in sorted {
        match runs.last_mut() {
            Some(run) if run.end == position => run.end += 1,
            _ => runs.push(position..position + 1),
        }
    }
    runs
}
