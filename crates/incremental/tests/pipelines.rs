//! Integration tests for operator pipelines.

use std::cell::RefCell;
use std::rc::Rc;

use ripple_incremental::{
    Change, Error, MaterializedList, Observable, ObservableExt, SourceList, SubscribeExt,
    Subscription,
};

type Log = Rc<RefCell<Vec<Change<i32>>>>;

/// Collects every change a pipeline emits.
fn record<O: Observable<i32>>(source: &O) -> (Log, Subscription<i32>) {
    let changes: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    let subscription =
        source.subscribe_fn(move |change: &Change<i32>| sink.borrow_mut().push(change.clone()));
    (changes, subscription)
}

fn is_even(x: &i32) -> bool {
    x % 2 == 0
}

#[test]
fn test_filter_scenario() {
    let source: SourceList<i32> = vec![1, 2, 3, 4].into_iter().collect();
    let (changes, _sub) = record(&source.clone().filter(is_even));

    source.insert_range(2, [5, 6, 7, 8]).unwrap();

    assert_eq!(
        *changes.borrow(),
        vec![
            Change::Insertion {
                index: 0,
                items: vec![2, 4],
            },
            Change::Insertion {
                index: 1,
                items: vec![6, 8],
            },
        ]
    );
}

#[test]
fn test_sort_scenario() {
    let source: SourceList<i32> = vec![2, 3, 1].into_iter().collect();
    let (changes, _sub) = record(&source.clone().sort());

    source.push(0).unwrap();

    assert_eq!(
        *changes.borrow(),
        vec![
            Change::Insertion {
                index: 0,
                items: vec![1, 2, 3],
            },
            Change::Insertion {
                index: 0,
                items: vec![0],
            },
        ]
    );
}

#[test]
fn test_concat_scenario() {
    let first: SourceList<i32> = vec![1, 2, 3].into_iter().collect();
    let second: SourceList<i32> = vec![4, 5, 6].into_iter().collect();
    let (changes, _sub) = record(&first.clone().concat(second.clone()));

    first.extend([7, 8]).unwrap();
    second.push(9).unwrap();

    assert_eq!(
        *changes.borrow(),
        vec![
            Change::Insertion {
                index: 0,
                items: vec![1, 2, 3, 4, 5, 6],
            },
            Change::Insertion {
                index: 3,
                items: vec![7, 8],
            },
            Change::Insertion {
                index: 8,
                items: vec![9],
            },
        ]
    );
}

#[test]
fn test_flatten_scenario() {
    let a: SourceList<i32> = vec![1, 2].into_iter().collect();
    let b: SourceList<i32> = vec![4, 5, 6].into_iter().collect();
    let outer = SourceList::from_vec(vec![a.clone(), b.clone()]);
    let view = outer
        .clone()
        .flatten(|inner: &SourceList<i32>| inner.clone())
        .materialize();
    assert_eq!(view.to_vec(), vec![1, 2, 4, 5, 6]);

    outer.remove_at(0).unwrap();
    a.push(3).unwrap();
    a.insert(0, 0).unwrap();
    a.clear().unwrap();

    assert_eq!(view.to_vec(), vec![4, 5, 6]);
    assert_eq!(a.subscriber_count(), 0);
}

#[test]
fn test_nested_flatten() {
    let leaf_a: SourceList<i32> = vec![1].into_iter().collect();
    let leaf_b: SourceList<i32> = vec![2, 3].into_iter().collect();
    let leaf_c: SourceList<i32> = vec![4].into_iter().collect();
    let middle_a = SourceList::from_vec(vec![leaf_a.clone(), leaf_b.clone()]);
    let middle_b = SourceList::from_vec(vec![leaf_c.clone()]);
    let top = SourceList::from_vec(vec![middle_a.clone(), middle_b.clone()]);

    let mut view = top
        .clone()
        .flatten(|middle: &SourceList<SourceList<i32>>| {
            middle.clone().flatten(|leaf: &SourceList<i32>| leaf.clone())
        })
        .materialize();
    assert_eq!(view.to_vec(), vec![1, 2, 3, 4]);

    leaf_b.push(9).unwrap();
    leaf_c.insert(0, 8).unwrap();
    middle_a.remove_at(0).unwrap();
    assert_eq!(view.to_vec(), vec![2, 3, 9, 8, 4]);
    assert_eq!(leaf_a.subscriber_count(), 0);

    top.move_item(0, 1).unwrap();
    assert_eq!(view.to_vec(), vec![8, 4, 2, 3, 9]);

    top.remove_at(1).unwrap();
    assert_eq!(leaf_b.subscriber_count(), 0);
    assert_eq!(middle_a.subscriber_count(), 0);
    leaf_b.push(10).unwrap();
    assert_eq!(view.to_vec(), vec![8, 4]);

    view.unsubscribe();
    assert_eq!(top.subscriber_count(), 0);
    assert_eq!(middle_b.subscriber_count(), 0);
    assert_eq!(leaf_c.subscriber_count(), 0);
}

#[test]
fn test_flatten_of_filtered_inners() {
    let a: SourceList<i32> = vec![1, 2, 3, 4].into_iter().collect();
    let b: SourceList<i32> = vec![6, 7].into_iter().collect();
    let outer = SourceList::from_vec(vec![a.clone(), b.clone()]);
    let view = outer
        .clone()
        .flatten(|inner: &SourceList<i32>| inner.clone().filter(is_even))
        .sort_by(|x: &i32, y: &i32| y.cmp(x))
        .materialize();
    assert_eq!(view.to_vec(), vec![6, 4, 2]);

    a.push(10).unwrap();
    b.replace_at(1, 8).unwrap();
    outer.remove_at(0).unwrap();
    assert_eq!(view.to_vec(), vec![8, 6]);
}

#[test]
fn test_dispose_releases_whole_chain() {
    let first: SourceList<i32> = vec![1, 2].into_iter().collect();
    let second: SourceList<i32> = vec![3].into_iter().collect();
    let pipeline = first
        .clone()
        .concat(second.clone())
        .map(|x: &i32| x * 10)
        .filter(|x: &i32| *x > 10)
        .sort();

    let mut view = pipeline.materialize();
    assert_eq!(view.to_vec(), vec![20, 30]);
    assert_eq!(first.subscriber_count(), 1);

    view.unsubscribe();
    assert_eq!(first.subscriber_count(), 0);
    assert_eq!(second.subscriber_count(), 0);

    first.push(5).unwrap();
    assert_eq!(view.to_vec(), vec![20, 30]);
}

#[test]
fn test_operators_are_cold() {
    let source: SourceList<i32> = vec![3, 1, 2].into_iter().collect();
    let sort = source.clone().sort();
    assert_eq!(source.subscriber_count(), 0);

    let view_a = sort.materialize();
    source.push(0).unwrap();
    let view_b = sort.materialize();

    assert_eq!(source.subscriber_count(), 2);
    assert_eq!(view_a.to_vec(), vec![0, 1, 2, 3]);
    assert_eq!(view_b.to_vec(), vec![0, 1, 2, 3]);
}

#[test]
fn test_inner_list_of_terminal_stage() {
    let source: SourceList<i32> = vec![5, 3, 4].into_iter().collect();
    let (_changes, sub) = record(&source.clone().sort());

    let content = sub.inner_list().unwrap();
    assert_eq!(content.to_vec(), vec![3, 4, 5]);

    source.remove_at(0).unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content.get(1), Some(4));
}

#[test]
fn test_reentrant_mutation_is_sequential() {
    let source: SourceList<i32> = SourceList::new();
    let view = source.clone().filter(is_even).materialize();

    let feedback = source.clone();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    let _sub = source.subscribe_fn(move |change: &Change<i32>| {
        seen_clone.borrow_mut().push(change.clone());
        // Each odd insertion feeds back its successor.
        if let Change::Insertion { items, .. } = change {
            if let Some(&last) = items.last() {
                if last % 2 == 1 {
                    feedback.push(last + 1).unwrap();
                }
            }
        }
    });

    source.push(1).unwrap();
    source.push(3).unwrap();

    assert_eq!(source.to_vec(), vec![1, 2, 3, 4]);
    assert_eq!(view.to_vec(), vec![2, 4]);
    assert_eq!(
        *seen.borrow(),
        vec![
            Change::Insertion {
                index: 0,
                items: vec![1],
            },
            Change::Insertion {
                index: 1,
                items: vec![2],
            },
            Change::Insertion {
                index: 2,
                items: vec![3],
            },
            Change::Insertion {
                index: 3,
                items: vec![4],
            },
        ]
    );
}

#[test]
fn test_error_terminates_pipeline() {
    let source: SourceList<i32> = vec![1, 2].into_iter().collect();
    let view: MaterializedList<i32> = source.clone().map(|x: &i32| x + 1).sort().materialize();

    source.fail(Error::upstream("disconnected")).unwrap();
    assert_eq!(view.error(), Some(Error::upstream("disconnected")));
    assert_eq!(source.push(3), Err(Error::Terminated));
    assert_eq!(view.to_vec(), vec![2, 3]);
}

#[test]
fn test_completion_propagates() {
    let first: SourceList<i32> = SourceList::new();
    let second: SourceList<i32> = SourceList::new();
    let view = first.clone().concat(second.clone()).filter(is_even).materialize();

    first.complete().unwrap();
    assert!(!view.is_completed());
    second.complete().unwrap();
    assert!(view.is_completed());
}

#[test]
fn test_stage_reentered_from_its_own_projection_fails() {
    let first: SourceList<i32> = SourceList::new();
    let second: SourceList<i32> = vec![5].into_iter().collect();
    let feedback = second.clone();
    let view = first
        .clone()
        .concat(second.clone())
        .map(move |x: &i32| {
            // Reaches the map stage again through the second side.
            if *x == 1 {
                feedback.push(100).unwrap();
            }
            x * 2
        })
        .materialize();
    assert_eq!(view.to_vec(), vec![10]);

    first.push(1).unwrap();
    assert_eq!(view.error(), Some(Error::Reentrant));
    assert_eq!(view.to_vec(), vec![10]);
    assert_eq!(second.to_vec(), vec![5, 100]);

    first.push(2).unwrap();
    assert_eq!(view.to_vec(), vec![10]);
}

#[test]
fn test_on_removed_sees_items_leaving_the_view() {
    let source: SourceList<i32> = vec![1, 2, 3, 4].into_iter().collect();
    let released = Rc::new(RefCell::new(Vec::new()));
    let sink = released.clone();
    let view = source
        .clone()
        .filter(is_even)
        .on_removed(move |x: &i32| sink.borrow_mut().push(*x))
        .materialize();

    source.remove_range(0, 2).unwrap();
    source.replace_at(1, 6).unwrap();
    source.push(5).unwrap();

    assert_eq!(*released.borrow(), vec![2, 4]);
    assert_eq!(view.to_vec(), vec![6]);
}
