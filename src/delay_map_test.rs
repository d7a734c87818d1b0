use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::Arc;

use super::*;

// delay map whose entry values count how often they were computed
fn counting_map(n: i64, runs: &Arc<AtomicUsize>) -> DelayMap<i64, i64> {
    let mut map = DelayMap::new();
    for key in 0..n {
        let counter = Arc::clone(runs);
        map = map.insert_lazy(key, move || {
            counter.fetch_add(1, SeqCst);
            key * 10
        });
    }
    map
}

#[test]
fn test_reads_force_only_what_they_return() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(8, &runs);

    assert_eq!(map.len(), 8);
    assert!(map.contains_key(&3));
    assert_eq!(map.min_key(), Some(&0));
    assert_eq!(map.max_key(), Some(&7));
    assert_eq!(map.keys().count(), 8);
    assert_eq!(runs.load(SeqCst), 0);

    assert_eq!(map.get(&3), Some(30));
    assert_eq!(runs.load(SeqCst), 1);
    // second read comes from the cache
    assert_eq!(map.get(&3), Some(30));
    assert_eq!(runs.load(SeqCst), 1);
    assert_eq!(map.get(&100), None);
    assert_eq!(runs.load(SeqCst), 1);
}

#[test]
fn test_clones_share_memoization() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(4, &runs);
    let other = map.clone();
    assert_eq!(other.get(&2), Some(20));
    assert_eq!(map.get(&2), Some(20));
    assert_eq!(runs.load(SeqCst), 1);
}

#[test]
fn test_get_with_default() {
    let map: DelayMap<i64, i64> = DelayMap::new().insert(1, 11);
    assert_eq!(map.get_with_default(&1, 0), 11);
    assert_eq!(map.get_with_default(&2, 0), 0);
}

#[test]
fn test_map_values_lazy() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(8, &runs);
    let mapped = map.map_values_lazy(|v| v + 1);
    // composing forces nothing
    assert_eq!(runs.load(SeqCst), 0);

    assert_eq!(mapped.get(&5), Some(51));
    // only the read entry's input was forced, exactly once
    assert_eq!(runs.load(SeqCst), 1);
    assert_eq!(mapped.get(&5), Some(51));
    assert_eq!(runs.load(SeqCst), 1);
}

#[test]
fn test_map_with_key_lazy() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(4, &runs);
    let mapped = map.map_with_key_lazy(|k, v| k + v);
    assert_eq!(runs.load(SeqCst), 0);
    assert_eq!(mapped.get(&3), Some(33));
    assert_eq!(runs.load(SeqCst), 1);
}

#[test]
fn test_map_values_eager_forces_now() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(4, &runs);
    let mapped = map.map_values_eager(|v| v + 1);
    // the eager variant ran the function over every entry already
    assert_eq!(runs.load(SeqCst), 4);
    assert_eq!(mapped.get(&0), Some(1));
    assert_eq!(runs.load(SeqCst), 4);
}

#[test]
fn test_insert_with_lazy_and_eager() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(2, &runs);

    let lazy = map.insert_with_lazy(|new, old| new + old, 1, 5);
    assert_eq!(runs.load(SeqCst), 0);
    assert_eq!(lazy.get(&1), Some(15));
    assert_eq!(runs.load(SeqCst), 1);

    let runs2 = Arc::new(AtomicUsize::new(0));
    let map = counting_map(2, &runs2);
    let eager = map.insert_with_eager(|new, old| new + old, 1, 5);
    // collision forced the old value during the insert
    assert_eq!(runs2.load(SeqCst), 1);
    assert_eq!(eager.get(&1), Some(15));
    assert_eq!(runs2.load(SeqCst), 1);

    // no collision, the combiner never runs
    let fresh = eager.insert_with_eager(|new, old| new + old, 9, 90);
    assert_eq!(fresh.get(&9), Some(90));
}

#[test]
fn test_fold_and_to_vec_force_in_order() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(5, &runs);
    assert_eq!(
        map.to_vec(),
        vec![(0, 0), (1, 10), (2, 20), (3, 30), (4, 40)]
    );
    assert_eq!(runs.load(SeqCst), 5);

    let sum = map.fold_left(0, |acc, _, v| acc + v);
    assert_eq!(sum, 100);
    // folds reuse the cache
    assert_eq!(runs.load(SeqCst), 5);
}

#[test]
fn test_to_map_and_from_map() {
    let runs = Arc::new(AtomicUsize::new(0));
    let map = counting_map(16, &runs);
    let strict = map.to_map();
    assert_eq!(runs.load(SeqCst), 16);
    assert_eq!(strict.len(), 16);
    assert!(strict.iter().all(|(k, v)| *v == k * 10));

    let back = DelayMap::from_map(&strict);
    let forced_again = back.to_map();
    // from_map wraps evaluated values, nothing recomputes
    assert_eq!(runs.load(SeqCst), 16);
    assert_eq!(forced_again, strict);
}

#[test]
fn test_to_map_parallel_path() {
    // size at the parallel threshold, values forced on the pool
    let n = crate::parallel::PAR_THRESHOLD as i64;
    let mut map: DelayMap<i64, i64> = DelayMap::new();
    for key in 0..n {
        map = map.insert_lazy(key, move || key * 2);
    }
    let strict = map.to_map();
    assert_eq!(strict.len(), n as usize);
    assert!(strict.iter().all(|(k, v)| *v == k * 2));
    assert!(strict.validate().is_ok());
}

#[test]
fn test_debug_never_forces() {
    let map: DelayMap<i64, i64> = DelayMap::new()
        .insert(1, 10)
        .insert_lazy(2, || panic!("forced by Debug"));
    let text = format!("{:?}", map);
    assert!(text.contains("10"));
    assert!(text.contains("<suspended>"));
}
