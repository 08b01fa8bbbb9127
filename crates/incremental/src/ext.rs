//! Operator composition.

use crate::operators::{
    ByKey, Comparer, Concat, Filter, Flatten, Map, NaturalOrder, OnRemoved, Sort,
};
use ripple_reactive::{MaterializedList, Observable};

/// Builds operator pipelines on top of any [`Observable`].
///
/// Every method only wraps `self`; nothing is subscribed until the resulting
/// operator is.
///
/// # Example
///
/// ```rust
/// use ripple_incremental::{ObservableExt, SourceList};
///
/// let source: SourceList<i32> = vec![5, 2, 8, 1].into_iter().collect();
/// let view = source
///     .clone()
///     .filter(|x: &i32| x % 2 == 0)
///     .sort()
///     .materialize();
///
/// source.push(4).unwrap();
/// assert_eq!(view.to_vec(), vec![2, 4, 8]);
/// ```
pub trait ObservableExt<T>: Observable<T> + Sized {
    /// Projects every item through `projection`.
    fn map<U, F>(self, projection: F) -> Map<Self, T, F>
    where
        F: Fn(&T) -> U,
    {
        Map::new(self, projection)
    }

    /// Keeps the items for which `predicate` holds.
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: Fn(&T) -> bool,
    {
        Filter::new(self, predicate)
    }

    /// Orders items by their natural order.
    fn sort(self) -> Sort<Self, NaturalOrder>
    where
        T: Ord,
    {
        Sort::new(self, NaturalOrder)
    }

    /// Orders items with a comparer.
    fn sort_by<C>(self, comparer: C) -> Sort<Self, C>
    where
        C: Comparer<T>,
    {
        Sort::new(self, comparer)
    }

    /// Orders items by an extracted key.
    fn sort_by_key<K, F>(self, key: F) -> Sort<Self, ByKey<F>>
    where
        K: Ord,
        F: Fn(&T) -> K,
    {
        Sort::new(self, ByKey(key))
    }

    /// Appends the items of `other`.
    fn concat<O>(self, other: O) -> Concat<Self, O>
    where
        O: Observable<T>,
    {
        Concat::new(self, other)
    }

    /// Replaces every item with the inner sequence `projection` returns for
    /// it and concatenates the results.
    fn flatten<I, P>(self, projection: P) -> Flatten<Self, T, P>
    where
        P: Fn(&T) -> I,
    {
        Flatten::new(self, projection)
    }

    /// Calls `hook` for every item that leaves the sequence: removals, the old
    /// side of replacements and the old content of resets.
    ///
    /// Items are cloned along a pipeline, so dropping one copy releases
    /// nothing. Share the resource (`Rc<Resource>`) and release it here.
    fn on_removed<F>(self, hook: F) -> OnRemoved<Self, F>
    where
        F: Fn(&T),
    {
        OnRemoved::new(self, hook)
    }

    /// Subscribes and keeps the content in a [`MaterializedList`].
    fn materialize(&self) -> MaterializedList<T>
    where
        T: Clone + 'static,
    {
        MaterializedList::new(self)
    }
}

impl<T, O: Observable<T>> ObservableExt<T> for O {}
