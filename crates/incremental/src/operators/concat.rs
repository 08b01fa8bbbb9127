//! Incremental concatenation of two sequences.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{Change, Error, Result};
use ripple_reactive::{Downstream, Observable, Observer, Subscription};
use tracing::debug;

/// Emits `first ++ second`.
///
/// First-side changes pass through; second-side changes are shifted by the
/// current length of the first side. Completes once both sides completed.
pub struct Concat<A, B> {
    first: A,
    second: B,
}

impl<A, B> Concat<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    First,
    Second,
}

/// Content captured while both sides replay during subscribe.
struct Priming<T> {
    first: Vec<T>,
    second: Vec<T>,
}

struct ConcatState<T> {
    priming: Option<Priming<T>>,
    /// Current length of the first side.
    offset: usize,
    second_len: usize,
}

pub(crate) struct ConcatNode<T> {
    state: RefCell<ConcatState<T>>,
    completed: [Cell<bool>; 2],
    downstream: Downstream<T>,
}

impl<T> ConcatNode<T>
where
    T: Clone + PartialEq,
{
    fn new(observer: Rc<dyn Observer<T>>) -> Self {
        Self {
            state: RefCell::new(ConcatState {
                priming: Some(Priming {
                    first: Vec::new(),
                    second: Vec::new(),
                }),
                offset: 0,
                second_len: 0,
            }),
            completed: [Cell::new(false), Cell::new(false)],
            downstream: Downstream::new(observer),
        }
    }

    /// Current length of the first side.
    #[cfg(test)]
    pub(crate) fn offset(&self) -> usize {
        self.state.borrow().offset
    }

    fn handle(&self, side: Side, change: &Change<T>) -> Result<Option<Change<T>>> {
        let mut state = self.state.try_borrow_mut().map_err(|_| Error::Reentrant)?;
        if let Some(priming) = state.priming.as_mut() {
            let buffer = match side {
                Side::First => &mut priming.first,
                Side::Second => &mut priming.second,
            };
            change.apply_to(buffer)?;
            return Ok(None);
        }

        let len = match side {
            Side::First => state.offset,
            Side::Second => state.second_len,
        };
        change.check_bounds(len)?;
        let Some(change) = change.clone().normalize_reset() else {
            return Ok(None);
        };
        let len = (len as isize + change.len_delta()) as usize;
        match side {
            Side::First => {
                state.offset = len;
                Ok(Some(change))
            }
            Side::Second => {
                state.second_len = len;
                Ok(Some(change.offset(state.offset)))
            }
        }
    }

    fn on_side_next(&self, side: Side, change: &Change<T>) {
        if self.downstream.is_terminated() {
            return;
        }
        match self.handle(side, change) {
            Ok(Some(change)) => self.downstream.next(&change),
            Ok(None) => {}
            Err(error) => self.downstream.error(&error),
        }
    }

    fn on_side_completed(&self, side: Side) {
        self.completed[side as usize].set(true);
        self.try_complete();
    }

    fn try_complete(&self) {
        let priming = self
            .state
            .try_borrow()
            .map(|state| state.priming.is_some())
            .unwrap_or(true);
        if !priming && self.completed.iter().all(Cell::get) {
            self.downstream.complete();
        }
    }

    /// Ends the replay phase and emits the combined initial content.
    fn finish_priming(&self) {
        let priming = self.state.borrow_mut().priming.take();
        let Some(Priming { mut first, second }) = priming else {
            return;
        };
        {
            let mut state = self.state.borrow_mut();
            state.offset = first.len();
            state.second_len = second.len();
        }
        debug!(first = first.len(), second = second.len(), "concat primed");
        first.extend(second);
        if !first.is_empty() {
            self.downstream.next(&Change::Insertion {
                index: 0,
                items: first,
            });
        }
        self.try_complete();
    }
}

struct SideObserver<T> {
    node: Rc<ConcatNode<T>>,
    side: Side,
}

impl<T> Observer<T> for SideObserver<T>
where
    T: Clone + PartialEq,
{
    fn on_next(&self, change: &Change<T>) {
        self.node.on_side_next(self.side, change);
    }

    fn on_completed(&self) {
        self.node.on_side_completed(self.side);
    }

    fn on_error(&self, error: &Error) {
        self.node.downstream.error(error);
    }
}

fn subscribe_node<A, B, T>(
    concat: &Concat<A, B>,
    observer: Rc<dyn Observer<T>>,
) -> (Rc<ConcatNode<T>>, Subscription<T>)
where
    A: Observable<T>,
    B: Observable<T>,
    T: Clone + PartialEq + 'static,
{
    let node = Rc::new(ConcatNode::new(observer));
    let mut first = concat.first.subscribe(Rc::new(SideObserver {
        node: node.clone(),
        side: Side::First,
    }));
    let mut second = concat.second.subscribe(Rc::new(SideObserver {
        node: node.clone(),
        side: Side::Second,
    }));
    node.finish_priming();
    let subscription = Subscription::new(move || {
        first.unsubscribe();
        second.unsubscribe();
    });
    (node, subscription)
}

impl<A, B, T> Observable<T> for Concat<A, B>
where
    A: Observable<T>,
    B: Observable<T>,
    T: Clone + PartialEq + 'static,
{
    fn subscribe(&self, observer: Rc<dyn Observer<T>>) -> Subscription<T> {
        subscribe_node(self, observer).1
    }
}
