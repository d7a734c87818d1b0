use rand::{rngs::SmallRng, Rng, SeedableRng};

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use super::*;

fn map_of(pairs: &[(i64, i64)]) -> Map<i64, i64> {
    pairs.iter().cloned().collect()
}

fn random_map(rng: &mut SmallRng, n: usize, key_space: i64) -> Map<i64, i64> {
    let mut map = Map::new();
    for _ in 0..n {
        map = map.insert(rng.gen_range(0..key_space), rng.gen_range(0..100));
    }
    map
}

#[test]
fn test_basic() {
    let map: Map<i64, char> = Map::new();
    assert!(map.is_empty());
    let map = map.insert(1, 'a');
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&1), Some(&'a'));
    assert_eq!(map.get_with_default(&1, 'z'), 'a');
    assert_eq!(map.get_with_default(&2, 'z'), 'z');
    assert!(map.contains_key(&1));
    let map = map.remove(&1);
    assert!(map.is_empty());

    let single = Map::singleton(7, 70);
    assert_eq!(single.to_vec(), vec![(7, 70)]);
}

#[test]
fn test_union_with_merge() {
    let m1 = map_of(&[(1, 10), (2, 20)]);
    let m2 = map_of(&[(2, 3), (3, 4)]);
    let merged = m1.union_with(|a, b| a + b, &m2);
    assert_eq!(merged.to_vec(), vec![(1, 10), (2, 23), (3, 4)]);
}

#[test]
fn test_union_left_biased() {
    let m1 = map_of(&[(1, 10), (2, 20)]);
    let m2 = map_of(&[(2, 99), (3, 30)]);
    let merged = m1.union(&m2);
    assert_eq!(merged.to_vec(), vec![(1, 10), (2, 20), (3, 30)]);
    // not commutative
    let merged = m2.union(&m1);
    assert_eq!(merged.get(&2), Some(&99));
}

#[test]
fn test_union_identity_laws() {
    let mut rng = SmallRng::seed_from_u64(0xCAFE);
    let m = random_map(&mut rng, 100, 64);
    let empty = Map::new();
    assert_eq!(m.union(&empty), m);
    assert_eq!(empty.union(&m), m);
}

#[test]
fn test_union_associative() {
    let mut rng = SmallRng::seed_from_u64(0xACCA);
    for _ in 0..8 {
        let a = random_map(&mut rng, 40, 32);
        let b = random_map(&mut rng, 40, 32);
        let c = random_map(&mut rng, 40, 32);
        assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
    }
}

#[test]
fn test_union_merge_order_survives_fold_direction() {
    // a deep right operand flips the fold direction internally, the
    // merge function must still see (left value, right value)
    let shallow: Map<i64, String> = [(0, "L0".to_string()), (1, "L1".to_string())]
        .iter()
        .cloned()
        .collect();
    let deep: Map<i64, String> = (0..200).map(|k| (k, format!("R{}", k))).collect();

    let merged = shallow.union_with_key(|_, l, r| format!("{}|{}", l, r), &deep);
    assert_eq!(merged.get(&0), Some(&"L0|R0".to_string()));
    assert_eq!(merged.get(&1), Some(&"L1|R1".to_string()));
    assert_eq!(merged.get(&7), Some(&"R7".to_string()));

    let merged = deep.union_with_key(|_, l, r| format!("{}|{}", l, r), &shallow);
    assert_eq!(merged.get(&0), Some(&"R0|L0".to_string()));
    assert_eq!(merged.len(), 200);
}

#[test]
fn test_intersection() {
    let m1 = map_of(&[(1, 10), (2, 20), (3, 30)]);
    let m2 = map_of(&[(2, 200), (3, 300), (4, 400)]);
    assert_eq!(m1.intersection(&m2).to_vec(), vec![(2, 20), (3, 30)]);
    let merged = m1.intersection_with(|a, b| a + b, &m2);
    assert_eq!(merged.to_vec(), vec![(2, 220), (3, 330)]);
    let keyed = m1.intersection_with_key(|k, a, b| k + a + b, &m2);
    assert_eq!(keyed.to_vec(), vec![(2, 222), (3, 333)]);

    let empty: Map<i64, i64> = Map::new();
    assert!(m1.intersection(&empty).is_empty());
    assert!(empty.intersection(&m1).is_empty());
}

#[test]
fn test_difference() {
    let m1 = map_of(&[(1, 10), (2, 20), (3, 30)]);
    let m2 = map_of(&[(2, 2), (3, 3), (4, 4)]);
    assert_eq!(m1.difference(&m2).to_vec(), vec![(1, 10)]);

    // merge decides retention per key
    let merged = m1.difference_with(|a, b| if a % b == 0 { None } else { Some(a - b) }, &m2);
    assert_eq!(merged.to_vec(), vec![(1, 10)]);
    let merged = m1.difference_with_key(|k, a, b| if *k == 3 { Some(a + b) } else { None }, &m2);
    assert_eq!(merged.to_vec(), vec![(1, 10), (3, 33)]);
}

#[test]
fn test_invert() {
    let map: Map<i64, char> = [(1, 'a'), (2, 'a'), (3, 'b')].iter().cloned().collect();
    let inverted = map.invert();
    let expect_a: BTreeSet<i64> = [1, 2].iter().cloned().collect();
    let expect_b: BTreeSet<i64> = [3].iter().cloned().collect();
    assert_eq!(inverted.get(&'a'), Some(&expect_a));
    assert_eq!(inverted.get(&'b'), Some(&expect_b));
    assert_eq!(inverted.len(), 2);
}

#[test]
fn test_submap() {
    let small = map_of(&[(1, 10), (2, 20)]);
    let large = map_of(&[(1, 10), (2, 20), (3, 30)]);
    assert!(small.is_submap_of(&large));
    assert!(small.is_submap_of(&small));
    assert!(small.is_proper_submap_of(&large));
    assert!(!small.is_proper_submap_of(&small));
    assert!(!large.is_submap_of(&small));

    let twisted = map_of(&[(1, 11), (2, 20)]);
    assert!(!twisted.is_submap_of(&large));
}

#[test]
fn test_traverse() {
    let map = map_of(&[(1, 10), (2, 20), (3, 30)]);
    let halved = map.traverse(|v| {
        if v % 2 == 0 {
            Ok(v / 2)
        } else {
            Err(format!("odd {}", v))
        }
    });
    assert_eq!(halved.unwrap().to_vec(), vec![(1, 5), (2, 10), (3, 15)]);

    let mut visited = vec![];
    let failed = map.traverse_with_key(|k, v| {
        visited.push(*k);
        if *k < 2 {
            Ok(*v)
        } else {
            Err(*k)
        }
    });
    assert_eq!(failed.unwrap_err(), 2);
    // first error in traversal order wins
    assert_eq!(visited, vec![1, 2]);
}

#[test]
fn test_sequence() {
    let good: Map<i64, _> = [(1, Ok::<i64, String>(10)), (2, Ok(20))]
        .iter()
        .cloned()
        .collect();
    assert_eq!(good.sequence().unwrap().to_vec(), vec![(1, 10), (2, 20)]);

    let bad: Map<i64, _> = [
        (1, Ok::<i64, String>(10)),
        (2, Err("no".to_string())),
        (3, Err("later".to_string())),
    ]
    .iter()
    .cloned()
    .collect();
    assert_eq!(bad.sequence().unwrap_err(), "no".to_string());
}

#[test]
fn test_unfold() {
    let map: Map<i64, i64> = Map::unfold(0, |state| {
        if state < 10 {
            Some((state, state * state, state + 1))
        } else {
            None
        }
    });
    assert_eq!(map.len(), 10);
    assert!(map.iter().all(|(k, v)| k * k == *v));

    let mut feed = (0..5).map(|k| (k, k + 100));
    let map: Map<i64, i64> = Map::unfold_with_iter(|| feed.next());
    assert_eq!(map.to_vec(), (0..5).map(|k| (k, k + 100)).collect::<Vec<_>>());
}

#[test]
fn test_from_to_list_roundtrip() {
    let mut rng = SmallRng::seed_from_u64(0x11ff);
    let map = random_map(&mut rng, 200, 128);
    let roundtrip: Map<i64, i64> = map.to_vec().into_iter().collect();
    assert_eq!(roundtrip, map);
}

#[test]
fn test_eq_is_structural() {
    let a = map_of(&[(1, 1), (2, 2), (3, 3)]);
    let b = map_of(&[(3, 3), (1, 1), (2, 2)]);
    assert_eq!(a, b);
    assert!(!(a != b));
    let c = b.insert(4, 4);
    assert_ne!(a, c);
    assert!(a < c);
}

#[test]
fn test_hash_agrees_with_eq() {
    fn hash_of(map: &Map<i64, i64>) -> u64 {
        let mut hasher = DefaultHasher::new();
        map.hash(&mut hasher);
        hasher.finish()
    }
    let a = map_of(&[(1, 1), (2, 2), (3, 3)]);
    let b = map_of(&[(2, 2), (3, 3), (1, 1)]);
    assert_eq!(hash_of(&a), hash_of(&b));
}

#[test]
fn test_query() {
    use std::cmp::Ordering;

    let map: Map<i64, i64> = (0..50).map(|k| (k, k)).collect();
    let hits = map.query(|k| {
        if *k < 40 {
            Ordering::Less
        } else if *k > 44 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    assert_eq!(hits, (40..=44).map(|k| (k, k)).collect::<Vec<_>>());
}

#[test]
fn test_folds_and_selectors() {
    let map = map_of(&[(1, 5), (2, 9), (3, 9), (4, 1)]);
    assert_eq!(map.fold_left(0, |acc, _, v| acc + v), 24);
    assert_eq!(map.fold_right(0, |_, v, acc| acc + v), 24);
    assert_eq!(map.count(|_, v| *v == 9), 2);
    assert_eq!(map.min_entry(), Some((&1, &5)));
    assert_eq!(map.max_entry(), Some((&4, &1)));

    let by_value = |_: &i64, av: &i64, _: &i64, bv: &i64| av.cmp(bv);
    assert_eq!(map.min_by(by_value), Some((4, 1)));
    // leftmost of the tied maxima
    assert_eq!(map.max_by(by_value), Some((2, 9)));

    assert_eq!(map.find_left(|_, v| *v == 9), Some((&2, &9)));
    assert_eq!(map.find_right(|_, v| *v == 9), Some((&3, &9)));
    assert!(map.exists(|_, v| *v == 1));
    assert!(map.forall(|_, v| *v < 10));
}

#[test]
fn test_map_values() {
    let map = map_of(&[(1, 10), (2, 20)]);
    let doubled = map.map_values(|v| v * 2);
    assert_eq!(doubled.to_vec(), vec![(1, 20), (2, 40)]);
    let keyed = map.map_with_key(|k, v| k + v);
    assert_eq!(keyed.to_vec(), vec![(1, 11), (2, 22)]);
}

#[test]
fn test_par_variants_match_seq() {
    let map: Map<i64, i64> = (0..4096).map(|k| (k, k % 11)).collect();
    assert_eq!(
        map.par_map_with_key(|k, v| k + v),
        map.map_with_key(|k, v| k + v)
    );
    assert_eq!(map.par_count(|_, v| *v == 3), map.count(|_, v| *v == 3));

    let by_value = |_: &i64, av: &i64, _: &i64, bv: &i64| av.cmp(bv);
    assert_eq!(map.par_min_by(by_value), map.min_by(by_value));
    assert_eq!(map.par_max_by(by_value), map.max_by(by_value));
}

#[test]
fn test_keys_values() {
    let map = map_of(&[(2, 20), (1, 10)]);
    assert_eq!(map.keys().cloned().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(map.values().cloned().collect::<Vec<_>>(), vec![10, 20]);
    assert!(map.validate().is_ok());
}
