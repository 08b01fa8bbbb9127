//! Incremental map operator.

use super::{attach, Content, Stage, StageNode};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::marker::PhantomData;
use ripple_core::{Change, Result};
use ripple_reactive::{Observable, Observer, Subscription};

/// Projects every item through `f`, keeping a mirror of the mapped values.
///
/// Removals and moves are answered from the mirror, so `f` runs exactly once
/// per inserted item.
pub struct Map<S, T, F> {
    source: S,
    projection: Rc<F>,
    _item: PhantomData<fn(&T)>,
}

impl<S, T, F> Map<S, T, F> {
    pub fn new(source: S, projection: F) -> Self {
        Self {
            source,
            projection: Rc::new(projection),
            _item: PhantomData,
        }
    }
}

pub(crate) struct MapStage<T, U, F> {
    projection: Rc<F>,
    mirror: Vec<U>,
    _item: PhantomData<fn(&T)>,
}

impl<T, U, F> MapStage<T, U, F>
where
    F: Fn(&T) -> U,
{
    fn new(projection: Rc<F>) -> Self {
        Self {
            projection,
            mirror: Vec::new(),
            _item: PhantomData,
        }
    }

    fn project(&self, items: &[T]) -> Vec<U> {
        items.iter().map(|item| (self.projection)(item)).collect()
    }
}

impl<T, U, F> Stage<T, U> for MapStage<T, U, F>
where
    U: Clone,
    F: Fn(&T) -> U,
{
    fn handle(&mut self, change: &Change<T>) -> Result<Vec<Change<U>>> {
        change.check_bounds(self.mirror.len())?;
        let mapped = match change {
            Change::Insertion { index, items } => {
                let items = self.project(items);
                self.mirror.splice(*index..*index, items.iter().cloned());
                Change::Insertion {
                    index: *index,
                    items,
                }
            }
            Change::Removal { index, items } => Change::Removal {
                index: *index,
                items: self.mirror.drain(*index..*index + items.len()).collect(),
            },
            Change::Replacement {
                index,
                old_items,
                new_items,
            } => {
                let new_items = self.project(new_items);
                let old_items = self
                    .mirror
                    .splice(*index..*index + old_items.len(), new_items.iter().cloned())
                    .collect();
                Change::Replacement {
                    index: *index,
                    old_items,
                    new_items,
                }
            }
            Change::Move {
                old_index,
                new_index,
                items,
            } => {
                let moved: Vec<U> = self
                    .mirror
                    .drain(*old_index..*old_index + items.len())
                    .collect();
                self.mirror.splice(*new_index..*new_index, moved.iter().cloned());
                Change::Move {
                    old_index: *old_index,
                    new_index: *new_index,
                    items: moved,
                }
            }
            Change::Reset { new_items, .. } => {
                let new_items = self.project(new_items);
                let old_items = core::mem::replace(&mut self.mirror, new_items.clone());
                Change::Reset {
                    old_items,
                    new_items,
                }
            }
        };
        Ok(alloc::vec![mapped])
    }
}

impl<T, U, F> Content<U> for MapStage<T, U, F> {
    fn content(&self) -> &[U] {
        &self.mirror
    }
}

type MapNode<T, U, F> = StageNode<MapStage<T, U, F>, T, U>;

fn subscribe_stage<S, T, U, F>(
    map: &Map<S, T, F>,
    observer: Rc<dyn Observer<U>>,
) -> (Rc<MapNode<T, U, F>>, Subscription<U>)
where
    S: Observable<T>,
    T: 'static,
    U: Clone + 'static,
    F: Fn(&T) -> U + 'static,
{
    attach(&map.source, MapStage::new(map.projection.clone()), observer)
}

impl<S, T, U, F> Observable<U> for Map<S, T, F>
where
    S: Observable<T>,
    T: 'static,
    U: Clone + 'static,
    F: Fn(&T) -> U + 'static,
{
    fn subscribe(&self, observer: Rc<dyn Observer<U>>) -> Subscription<U> {
        let (node, subscription) = subscribe_stage(self, observer);
        subscription.with_inner_list(node)
    }
}
