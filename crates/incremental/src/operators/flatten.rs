//! Incremental flatten ("transform-many") operator.
//!
//! Every outer item is projected to an inner sequence which gets its own
//! subscription. The node keeps one record per outer item holding the inner
//! content and its offset in the flattened output, so inner changes can be
//! forwarded with shifted indices and outer changes can be answered without
//! re-reading any inner sequence.

use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use hashbrown::HashMap;
use ripple_core::{Change, Error, IndexedItems, Result};
use ripple_reactive::{Downstream, Observable, Observer, Subscription};
use tracing::debug;

/// Concatenates the inner sequences of every outer item, in outer order.
pub struct Flatten<S, T, P> {
    source: S,
    projection: Rc<P>,
    _item: PhantomData<fn(&T)>,
}

impl<S, T, P> Flatten<S, T, P> {
    pub fn new(source: S, projection: P) -> Self {
        Self {
            source,
            projection: Rc::new(projection),
            _item: PhantomData,
        }
    }
}

type RecordId = u64;

/// State kept for one outer item.
struct Record<U> {
    id: RecordId,
    /// Position of the first inner item in the flattened output.
    offset: usize,
    items: Vec<U>,
    subscription: Subscription<U>,
    completed: bool,
}

/// Replay of the inner sequence currently being subscribed.
struct Priming<U> {
    id: RecordId,
    items: Vec<U>,
    completed: bool,
    error: Option<Error>,
}

struct FlattenState<U> {
    records: Vec<Record<U>>,
    positions: HashMap<RecordId, usize>,
}

impl<U: Clone> FlattenState<U> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn offset_before(&self, index: usize) -> usize {
        match index.checked_sub(1).map(|prev| &self.records[prev]) {
            Some(prev) => prev.offset + prev.items.len(),
            None => 0,
        }
    }

    /// Recomputes offsets and positions of the records in `from..to`.
    fn reindex(&mut self, from: usize, to: usize) {
        let mut offset = self.offset_before(from);
        for position in from..to {
            let record = &mut self.records[position];
            record.offset = offset;
            offset += record.items.len();
            self.positions.insert(record.id, position);
        }
    }

    fn remove(&mut self, index: usize, count: usize) -> Vec<Record<U>> {
        let removed: Vec<Record<U>> = self.records.drain(index..index + count).collect();
        for record in &removed {
            self.positions.remove(&record.id);
        }
        self.reindex(index, self.records.len());
        removed
    }

    fn insert(&mut self, index: usize, records: Vec<Record<U>>) -> IndexedItems<U> {
        let start = self.offset_before(index);
        let items: Vec<U> = records
            .iter()
            .flat_map(|record| record.items.iter().cloned())
            .collect();
        self.records.splice(index..index, records);
        self.reindex(index, self.records.len());
        IndexedItems::new(start, items)
    }

    fn relocate(&mut self, old_index: usize, count: usize, new_index: usize) -> Vec<Change<U>> {
        let old_offset = self.records[old_index].offset;
        let moving: Vec<Record<U>> = self.records.drain(old_index..old_index + count).collect();
        self.records.splice(new_index..new_index, moving);
        self.reindex(old_index.min(new_index), old_index.max(new_index) + count);

        let new_offset = self.records[new_index].offset;
        let items: Vec<U> = self.records[new_index..new_index + count]
            .iter()
            .flat_map(|record| record.items.iter().cloned())
            .collect();
        if items.is_empty() || old_offset == new_offset {
            return Vec::new();
        }
        vec![Change::Move {
            old_index: old_offset,
            new_index: new_offset,
            items,
        }]
    }

    fn is_completed(&self) -> bool {
        self.records.iter().all(|record| record.completed)
    }
}

pub(crate) struct FlattenNode<T, U, I, P> {
    me: Weak<Self>,
    projection: Rc<P>,
    state: RefCell<FlattenState<U>>,
    priming: RefCell<Option<Priming<U>>>,
    /// Set while an outer change is being processed.
    busy: Cell<bool>,
    next_id: Cell<RecordId>,
    outer_completed: Cell<bool>,
    downstream: Downstream<U>,
    _types: PhantomData<fn(&T) -> I>,
}

impl<T, U, I, P> FlattenNode<T, U, I, P>
where
    T: 'static,
    U: Clone + PartialEq + 'static,
    I: Observable<U> + 'static,
    P: Fn(&T) -> I + 'static,
{
    fn new(projection: Rc<P>, observer: Rc<dyn Observer<U>>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            projection,
            state: RefCell::new(FlattenState::new()),
            priming: RefCell::new(None),
            busy: Cell::new(false),
            next_id: Cell::new(1),
            outer_completed: Cell::new(false),
            downstream: Downstream::new(observer),
            _types: PhantomData,
        })
    }

    /// Number of live inner subscriptions.
    #[cfg(test)]
    pub(crate) fn record_count(&self) -> usize {
        self.state.borrow().records.len()
    }

    /// Subscribes to the inner sequence of `item`, capturing its replay.
    fn subscribe_record(&self, item: &T) -> Result<Record<U>> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let inner = (self.projection)(item);
        *self.priming.borrow_mut() = Some(Priming {
            id,
            items: Vec::new(),
            completed: false,
            error: None,
        });
        let subscription = inner.subscribe(Rc::new(RecordObserver {
            node: self.me.clone(),
            id,
        }));
        let priming = self.priming.borrow_mut().take();

        let Some(priming) = priming else {
            return Err(Error::Reentrant);
        };
        if let Some(error) = priming.error {
            return Err(error);
        }
        Ok(Record {
            id,
            offset: 0,
            items: priming.items,
            subscription,
            completed: priming.completed,
        })
    }

    /// Drops the records of `count` outer items at `index`, releasing their
    /// inner subscriptions.
    fn detach(&self, index: usize, count: usize) -> Result<IndexedItems<U>> {
        let removed = {
            let mut state = self.state.try_borrow_mut().map_err(|_| Error::Reentrant)?;
            state.remove(index, count)
        };
        let start = removed.first().map_or(0, |record| record.offset);
        let mut items = Vec::new();
        for mut record in removed {
            record.subscription.unsubscribe();
            items.extend(record.items);
        }
        if count > 0 {
            debug!(index, count, "flatten released inner sequences");
        }
        Ok(IndexedItems::new(start, items))
    }

    /// Subscribes the inner sequences of `items` and places their records at
    /// outer `index`.
    fn attach(&self, index: usize, items: &[T]) -> Result<IndexedItems<U>> {
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            records.push(self.subscribe_record(item)?);
        }
        let mut state = self.state.try_borrow_mut().map_err(|_| Error::Reentrant)?;
        Ok(state.insert(index, records))
    }

    fn handle_outer(&self, change: &Change<T>) -> Result<Vec<Change<U>>> {
        let len = self
            .state
            .try_borrow()
            .map_err(|_| Error::Reentrant)?
            .records
            .len();
        change.check_bounds(len)?;
        match change {
            Change::Move {
                old_index,
                new_index,
                items,
            } => {
                let mut state = self.state.try_borrow_mut().map_err(|_| Error::Reentrant)?;
                Ok(state.relocate(*old_index, items.len(), *new_index))
            }
            Change::Reset {
                old_items,
                new_items,
            } => {
                let removed = self.detach(0, old_items.len())?;
                let added = self.attach(0, new_items)?;
                let old_items = removed.into_parts().map(|(_, items)| items).unwrap_or_default();
                let new_items = added.into_parts().map(|(_, items)| items).unwrap_or_default();
                if old_items.is_empty() && new_items.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![Change::Reset {
                    old_items,
                    new_items,
                }])
            }
            _ => {
                let removed = match change.old_index() {
                    Some(index) => self.detach(index, change.old_items().len())?,
                    None => IndexedItems::empty(),
                };
                let added = match change.new_index() {
                    Some(index) => self.attach(index, change.new_items())?,
                    None => IndexedItems::empty(),
                };
                Ok(Change::from_sides(removed, added))
            }
        }
    }

    fn handle_inner(&self, id: RecordId, change: &Change<U>) -> Result<Vec<Change<U>>> {
        let mut state = self.state.try_borrow_mut().map_err(|_| Error::Reentrant)?;
        let Some(&position) = state.positions.get(&id) else {
            return Ok(Vec::new());
        };
        let record = &mut state.records[position];
        change.check_bounds(record.items.len())?;
        let Some(change) = change.clone().normalize_reset() else {
            return Ok(Vec::new());
        };
        change.apply_to(&mut record.items)?;
        let offset = record.offset;
        let delta = change.len_delta();
        if delta != 0 {
            for following in state.records.iter_mut().skip(position + 1) {
                following.offset = (following.offset as isize + delta) as usize;
            }
        }
        Ok(vec![change.offset(offset)])
    }

    fn on_inner_next(&self, id: RecordId, change: &Change<U>) {
        if self.downstream.is_terminated() {
            return;
        }
        {
            let mut slot = self.priming.borrow_mut();
            if let Some(priming) = slot.as_mut().filter(|priming| priming.id == id) {
                if let Err(error) = change.apply_to(&mut priming.items) {
                    priming.error.get_or_insert(error);
                }
                return;
            }
        }
        if self.busy.get() {
            self.downstream.error(&Error::Reentrant);
            return;
        }
        match self.handle_inner(id, change) {
            Ok(changes) => self.downstream.next_all(changes),
            Err(error) => self.downstream.error(&error),
        }
    }

    fn on_inner_completed(&self, id: RecordId) {
        {
            let mut slot = self.priming.borrow_mut();
            if let Some(priming) = slot.as_mut().filter(|priming| priming.id == id) {
                priming.completed = true;
                return;
            }
        }
        if let Ok(mut state) = self.state.try_borrow_mut() {
            if let Some(&position) = state.positions.get(&id) {
                state.records[position].completed = true;
            }
        }
        self.try_complete();
    }

    fn on_inner_error(&self, id: RecordId, error: &Error) {
        {
            let mut slot = self.priming.borrow_mut();
            if let Some(priming) = slot.as_mut().filter(|priming| priming.id == id) {
                priming.error.get_or_insert_with(|| error.clone());
                return;
            }
        }
        let live = self
            .state
            .try_borrow()
            .map(|state| state.positions.contains_key(&id))
            .unwrap_or(true);
        if live {
            self.downstream.error(error);
        }
    }

    /// Completes once the outer sequence and every live inner sequence have.
    fn try_complete(&self) {
        if !self.outer_completed.get() || self.busy.get() {
            return;
        }
        let completed = self
            .state
            .try_borrow()
            .map(|state| state.is_completed())
            .unwrap_or(false);
        if completed {
            self.downstream.complete();
        }
    }

    /// Releases every inner subscription.
    fn dispose(&self) {
        let records = {
            let mut state = self.state.borrow_mut();
            state.positions.clear();
            core::mem::take(&mut state.records)
        };
        debug!(count = records.len(), "flatten disposed");
        for mut record in records {
            record.subscription.unsubscribe();
        }
    }
}

impl<T, U, I, P> Observer<T> for FlattenNode<T, U, I, P>
where
    T: 'static,
    U: Clone + PartialEq + 'static,
    I: Observable<U> + 'static,
    P: Fn(&T) -> I + 'static,
{
    fn on_next(&self, change: &Change<T>) {
        if self.downstream.is_terminated() {
            return;
        }
        if self.busy.replace(true) {
            self.downstream.error(&Error::Reentrant);
            return;
        }
        let result = self.handle_outer(change);
        self.busy.set(false);
        match result {
            Ok(changes) => self.downstream.next_all(changes),
            Err(error) => self.downstream.error(&error),
        }
        self.try_complete();
    }

    fn on_completed(&self) {
        self.outer_completed.set(true);
        self.try_complete();
    }

    fn on_error(&self, error: &Error) {
        self.downstream.error(error);
    }
}

/// Receives the changes of one inner sequence.
struct RecordObserver<T, U, I, P> {
    node: Weak<FlattenNode<T, U, I, P>>,
    id: RecordId,
}

impl<T, U, I, P> Observer<U> for RecordObserver<T, U, I, P>
where
    T: 'static,
    U: Clone + PartialEq + 'static,
    I: Observable<U> + 'static,
    P: Fn(&T) -> I + 'static,
{
    fn on_next(&self, change: &Change<U>) {
        if let Some(node) = self.node.upgrade() {
            node.on_inner_next(self.id, change);
        }
    }

    fn on_completed(&self) {
        if let Some(node) = self.node.upgrade() {
            node.on_inner_completed(self.id);
        }
    }

    fn on_error(&self, error: &Error) {
        if let Some(node) = self.node.upgrade() {
            node.on_inner_error(self.id, error);
        }
    }
}

fn subscribe_node<S, T, U, I, P>(
    flatten: &Flatten<S, T, P>,
    observer: Rc<dyn Observer<U>>,
) -> (Rc<FlattenNode<T, U, I, P>>, Subscription<U>)
where
    S: Observable<T>,
    T: 'static,
    U: Clone + PartialEq + 'static,
    I: Observable<U> + 'static,
    P: Fn(&T) -> I + 'static,
{
    let node = FlattenNode::new(flatten.projection.clone(), observer);
    let mut outer = flatten.source.subscribe(node.clone());
    let owner = node.clone();
    let subscription = Subscription::new(move || {
        outer.unsubscribe();
        owner.dispose();
    });
    (node, subscription)
}

impl<S, T, U, I, P> Observable<U> for Flatten<S, T, P>
where
    S: Observable<T>,
    T: 'static,
    U: Clone + PartialEq + 'static,
    I: Observable<U> + 'static,
    P: Fn(&T) -> I + 'static,
{
    fn subscribe(&self, observer: Rc<dyn Observer<U>>) -> Subscription<U> {
        subscribe_node(self, observer).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testing::Recorder;
    use ripple_reactive::SourceList;

    type Inner = SourceList<i32>;
    type Projection = fn(&Inner) -> Inner;
    type Node = FlattenNode<Inner, i32, Inner, Projection>;

    fn identity(inner: &Inner) -> Inner {
        inner.clone()
    }

    fn list(items: &[i32]) -> Inner {
        SourceList::from_vec(items.to_vec())
    }

    fn observe(outer: &SourceList<Inner>) -> (Rc<Recorder<i32>>, Rc<Node>, Subscription<i32>) {
        let flatten = Flatten::new(outer.clone(), identity as Projection);
        let recorder = Recorder::<i32>::new();
        let observer: Rc<dyn Observer<i32>> = recorder.clone();
        let (node, subscription) = subscribe_node(&flatten, observer);
        (recorder, node, subscription)
    }

    /// Flattened content computed from scratch.
    fn expected(outer: &SourceList<Inner>) -> Vec<i32> {
        outer.to_vec().iter().flat_map(|inner| inner.to_vec()).collect()
    }

    #[test]
    fn test_flatten_removed_inner_is_released() {
        let a = list(&[1, 2]);
        let b = list(&[4, 5, 6]);
        let outer = SourceList::from_vec(vec![a.clone(), b.clone()]);
        let (recorder, node, _sub) = observe(&outer);

        assert_eq!(
            recorder.take(),
            vec![Change::Insertion {
                index: 0,
                items: vec![1, 2, 4, 5, 6],
            }]
        );

        outer.remove_at(0).unwrap();
        assert_eq!(
            recorder.take(),
            vec![Change::Removal {
                index: 0,
                items: vec![1, 2],
            }]
        );
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(node.record_count(), 1);

        a.push(3).unwrap();
        a.clear().unwrap();
        assert!(recorder.take().is_empty());

        b.push(7).unwrap();
        assert_eq!(
            recorder.take(),
            vec![Change::Insertion {
                index: 3,
                items: vec![7],
            }]
        );
    }

    #[test]
    fn test_flatten_inner_changes_are_offset() {
        let a = list(&[1, 2]);
        let b = list(&[3]);
        let outer = SourceList::from_vec(vec![a.clone(), b.clone()]);
        let (recorder, _node, _sub) = observe(&outer);
        recorder.take();

        b.push(4).unwrap();
        a.insert(0, 0).unwrap();
        b.remove_at(0).unwrap();
        a.move_item(0, 2).unwrap();
        b.replace_all([8, 9]).unwrap();

        assert_eq!(
            recorder.take(),
            vec![
                Change::Insertion {
                    index: 3,
                    items: vec![4],
                },
                Change::Insertion {
                    index: 0,
                    items: vec![0],
                },
                Change::Removal {
                    index: 3,
                    items: vec![3],
                },
                Change::Move {
                    old_index: 0,
                    new_index: 2,
                    items: vec![0],
                },
                Change::Replacement {
                    index: 3,
                    old_items: vec![4],
                    new_items: vec![8, 9],
                },
            ]
        );
    }

    #[test]
    fn test_flatten_outer_insert_and_replace() {
        let a = list(&[1]);
        let b = list(&[3]);
        let outer = SourceList::from_vec(vec![a.clone(), b.clone()]);
        let (recorder, _node, _sub) = observe(&outer);
        recorder.take();

        let c = list(&[2, 2]);
        outer.insert(1, c.clone()).unwrap();
        assert_eq!(
            recorder.take(),
            vec![Change::Insertion {
                index: 1,
                items: vec![2, 2],
            }]
        );

        let d = list(&[5]);
        outer.replace_at(1, d.clone()).unwrap();
        assert_eq!(
            recorder.take(),
            vec![Change::Replacement {
                index: 1,
                old_items: vec![2, 2],
                new_items: vec![5],
            }]
        );
        assert_eq!(c.subscriber_count(), 0);
        assert_eq!(d.subscriber_count(), 1);

        c.push(9).unwrap();
        d.push(6).unwrap();
        assert_eq!(
            recorder.take(),
            vec![Change::Insertion {
                index: 2,
                items: vec![6],
            }]
        );
    }

    #[test]
    fn test_flatten_outer_move_keeps_subscriptions() {
        let a = list(&[1, 2]);
        let b = list(&[]);
        let c = list(&[3]);
        let outer = SourceList::from_vec(vec![a.clone(), b.clone(), c.clone()]);
        let (recorder, _node, _sub) = observe(&outer);

        outer.move_item(0, 2).unwrap();
        assert_eq!(
            recorder.changes.borrow().last(),
            Some(&Change::Move {
                old_index: 0,
                new_index: 1,
                items: vec![1, 2],
            })
        );
        assert_eq!(a.subscriber_count(), 1);

        // Moving an empty inner sequence changes nothing visible.
        outer.move_item(0, 1).unwrap();
        b.push(7).unwrap();
        a.push(8).unwrap();

        assert_eq!(recorder.replay(), expected(&outer));
    }

    #[test]
    fn test_flatten_outer_reset() {
        let a = list(&[1]);
        let b = list(&[2, 3]);
        let outer = SourceList::from_vec(vec![a.clone()]);
        let (recorder, node, _sub) = observe(&outer);
        recorder.take();

        outer.replace_all([b.clone()]).unwrap();
        assert_eq!(
            recorder.take(),
            vec![Change::Reset {
                old_items: vec![1],
                new_items: vec![2, 3],
            }]
        );
        assert_eq!(a.subscriber_count(), 0);

        outer.clear().unwrap();
        assert_eq!(
            recorder.take(),
            vec![Change::Reset {
                old_items: vec![2, 3],
                new_items: vec![],
            }]
        );
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(node.record_count(), 0);
    }

    #[test]
    fn test_flatten_empty_inner_sequences() {
        let a = list(&[]);
        let outer = SourceList::from_vec(vec![a.clone(), list(&[1])]);
        let (recorder, _node, _sub) = observe(&outer);

        a.push(5).unwrap();
        assert_eq!(
            recorder.take(),
            vec![
                Change::Insertion {
                    index: 0,
                    items: vec![1],
                },
                Change::Insertion {
                    index: 0,
                    items: vec![5],
                },
            ]
        );
    }

    #[test]
    fn test_flatten_unsubscribe_releases_everything() {
        let a = list(&[1]);
        let b = list(&[2]);
        let outer = SourceList::from_vec(vec![a.clone(), b.clone()]);
        let (recorder, node, mut sub) = observe(&outer);
        recorder.take();

        sub.unsubscribe();
        assert_eq!(outer.subscriber_count(), 0);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(node.record_count(), 0);

        a.push(3).unwrap();
        outer.push(list(&[4])).unwrap();
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_flatten_completion() {
        let a = list(&[1]);
        let outer = SourceList::from_vec(vec![a.clone()]);
        let (recorder, _node, _sub) = observe(&outer);

        outer.complete().unwrap();
        assert!(!recorder.completed.get());
        a.complete().unwrap();
        assert!(recorder.completed.get());
    }

    #[test]
    fn test_flatten_completed_inner_counts_when_subscribed() {
        let a = list(&[1]);
        a.complete().unwrap();
        let outer = SourceList::from_vec(vec![a]);
        let (recorder, _node, _sub) = observe(&outer);

        assert_eq!(recorder.replay(), vec![1]);
        outer.complete().unwrap();
        assert!(recorder.completed.get());
    }

    #[test]
    fn test_flatten_inner_error_is_forwarded() {
        let a = list(&[1]);
        let outer = SourceList::from_vec(vec![a.clone()]);
        let (recorder, _node, _sub) = observe(&outer);

        a.fail(Error::upstream("inner")).unwrap();
        assert_eq!(*recorder.error.borrow(), Some(Error::upstream("inner")));
    }

    #[test]
    fn test_flatten_inner_change_during_outer_edit_fails() {
        let a = list(&[1]);
        let outer = SourceList::from_vec(vec![a.clone()]);
        let live = a.clone();
        let flatten = Flatten::new(outer.clone(), move |inner: &Inner| {
            if inner.is_empty() {
                live.push(9).unwrap();
            }
            inner.clone()
        });
        let recorder = Recorder::<i32>::new();
        let observer: Rc<dyn Observer<i32>> = recorder.clone();
        let (node, _sub) = subscribe_node(&flatten, observer);
        assert_eq!(recorder.replay(), vec![1]);

        outer.push(list(&[])).unwrap();
        assert_eq!(*recorder.error.borrow(), Some(Error::Reentrant));
        assert_eq!(a.to_vec(), vec![1, 9]);

        a.push(3).unwrap();
        assert_eq!(recorder.replay(), vec![1]);
        assert_eq!(node.record_count(), 2);
    }
}
