//! Module `map` export a persistent ordered map type.
//!
//! [Map] is a thin wrapper over [Rbt] carrying no state beyond the
//! wrapped tree. Equality, ordering, hashing and formatting are all
//! defined by the sorted sequence of entries, two maps built through
//! different insertion orders compare equal iff they hold the same
//! entries.
//!
//! The set-theoretic operations are left-biased, on a key collision
//! the left operand's value wins unless a merge function says
//! otherwise. When a merge function is given, union folds the
//! shallower operand into the deeper one, judged by black height, and
//! swaps the merge arguments when the fold direction reverses so the
//! per-key semantics stay fixed.

use std::{
    borrow::Borrow,
    cmp::Ordering,
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    iter::FromIterator,
};

use crate::error::Result;
use crate::rbt::{Iter, Rbt, Stats};

/// Persistent ordered map from `K` to `V`.
pub struct Map<K, V> {
    pub(crate) tree: Rbt<K, V>,
}

impl<K, V> Clone for Map<K, V> {
    fn clone(&self) -> Self {
        Map {
            tree: self.tree.clone(),
        }
    }
}

impl<K, V> Default for Map<K, V> {
    fn default() -> Self {
        Map { tree: Rbt::new() }
    }
}

impl<K, V> Map<K, V> {
    /// Create an empty map.
    pub fn new() -> Map<K, V> {
        Map { tree: Rbt::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of entries, walks the whole tree.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// In-order iterator over the entries.
    pub fn iter(&self) -> Iter<K, V> {
        self.tree.iter()
    }
}

impl<K, V> Map<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Map holding exactly one entry.
    pub fn singleton(key: K, value: V) -> Map<K, V> {
        Map::new().insert(key, value)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key)
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_with_default<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) -> Map<K, V> {
        Map {
            tree: self.tree.insert(key, value),
        }
    }

    /// Insert `(key, value)`, on collision store `f(value, old)`.
    pub fn insert_with<F>(&self, f: F, key: K, value: V) -> Map<K, V>
    where
        F: FnOnce(V, &V) -> V,
    {
        Map {
            tree: self.tree.insert_with(|_, new, old| f(new, old), key, value),
        }
    }

    /// Insert `(key, value)`, on collision store `f(key, value, old)`.
    pub fn insert_with_key<F>(&self, f: F, key: K, value: V) -> Map<K, V>
    where
        F: FnOnce(&K, V, &V) -> V,
    {
        Map {
            tree: self.tree.insert_with(f, key, value),
        }
    }

    /// Replace the value under `key` with `f(key, value)` when it
    /// yields one, otherwise hand back the map unchanged.
    pub fn update_with<Q, F>(&self, f: F, key: &Q) -> Map<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        Map {
            tree: self.tree.update_with(f, key),
        }
    }

    pub fn remove<Q>(&self, key: &Q) -> Map<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Map {
            tree: self.tree.remove(key),
        }
    }

    pub fn min_entry(&self) -> Option<(&K, &V)> {
        self.tree.min_entry()
    }

    pub fn max_entry(&self) -> Option<(&K, &V)> {
        self.tree.max_entry()
    }

    pub fn fold_left<A, F>(&self, seed: A, f: F) -> A
    where
        F: FnMut(A, &K, &V) -> A,
    {
        self.tree.fold_left(seed, f)
    }

    pub fn fold_right<A, F>(&self, seed: A, f: F) -> A
    where
        F: FnMut(&K, &V, A) -> A,
    {
        self.tree.fold_right(seed, f)
    }

    pub fn reduce_left<F>(&self, f: F) -> Option<(K, V)>
    where
        F: FnMut((K, V), (&K, &V)) -> (K, V),
    {
        self.tree.reduce_left(f)
    }

    pub fn reduce_right<F>(&self, f: F) -> Option<(K, V)>
    where
        F: FnMut((&K, &V), (K, V)) -> (K, V),
    {
        self.tree.reduce_right(f)
    }

    pub fn find_left<P>(&self, p: P) -> Option<(&K, &V)>
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.tree.find_left(p)
    }

    pub fn find_right<P>(&self, p: P) -> Option<(&K, &V)>
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.tree.find_right(p)
    }

    pub fn exists<P>(&self, p: P) -> bool
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.tree.exists(p)
    }

    pub fn forall<P>(&self, p: P) -> bool
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.tree.forall(p)
    }

    pub fn foreach<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        self.tree.foreach(f)
    }

    pub fn count<P>(&self, p: P) -> usize
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.tree.count(p)
    }

    pub fn min_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering,
    {
        self.tree.min_by(cmp)
    }

    pub fn max_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering,
    {
        self.tree.max_by(cmp)
    }

    /// New map with every value passed through `f`.
    pub fn map_values<V2, F>(&self, mut f: F) -> Map<K, V2>
    where
        V2: Clone,
        F: FnMut(&V) -> V2,
    {
        self.map_with_key(|_, v| f(v))
    }

    pub fn map_with_key<V2, F>(&self, f: F) -> Map<K, V2>
    where
        V2: Clone,
        F: FnMut(&K, &V) -> V2,
    {
        Map {
            tree: self.tree.map_with_key(f),
        }
    }

    /// Left-biased union, collisions keep this map's value.
    pub fn union(&self, other: &Map<K, V>) -> Map<K, V> {
        self.union_with_key(|_, left, _| left.clone(), other)
    }

    /// Union merging collisions with `f(left, right)`.
    pub fn union_with<F>(&self, mut f: F, other: &Map<K, V>) -> Map<K, V>
    where
        F: FnMut(&V, &V) -> V,
    {
        self.union_with_key(|_, a, b| f(a, b), other)
    }

    /// Union merging collisions with `f(key, left, right)`. The
    /// shallower operand is folded into the deeper one, swapping the
    /// merge arguments when the right operand is the accumulator.
    pub fn union_with_key<F>(&self, mut f: F, other: &Map<K, V>) -> Map<K, V>
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        if self.tree.black_height() >= other.tree.black_height() {
            other.fold_left(self.clone(), |acc, k, v2| {
                Map {
                    tree: acc
                        .tree
                        .insert_with(|k, new, old| f(k, old, &new), k.clone(), v2.clone()),
                }
            })
        } else {
            self.fold_left(other.clone(), |acc, k, v1| {
                Map {
                    tree: acc
                        .tree
                        .insert_with(|k, new, old| f(k, &new, old), k.clone(), v1.clone()),
                }
            })
        }
    }

    /// Left-biased intersection, keys present in both maps keep this
    /// map's value.
    pub fn intersection(&self, other: &Map<K, V>) -> Map<K, V> {
        self.intersection_with_key(|_, left, _| left.clone(), other)
    }

    pub fn intersection_with<F>(&self, mut f: F, other: &Map<K, V>) -> Map<K, V>
    where
        F: FnMut(&V, &V) -> V,
    {
        self.intersection_with_key(|_, a, b| f(a, b), other)
    }

    /// Intersection merging with `f(key, left, right)`. Restrict the
    /// right operand to this map's keys, then adjust every surviving
    /// entry with this map's value.
    pub fn intersection_with_key<F>(&self, mut f: F, other: &Map<K, V>) -> Map<K, V>
    where
        F: FnMut(&K, &V, &V) -> V,
    {
        let restricted = other.fold_left(Map::new(), |acc, k, v2| {
            if self.contains_key(k) {
                acc.insert(k.clone(), v2.clone())
            } else {
                acc
            }
        });
        self.fold_left(restricted, |acc, k, v1| {
            acc.update_with(|k2, v2| Some(f(k2, v1, v2)), k)
        })
    }

    /// Entries of this map whose key is absent from `other`.
    pub fn difference(&self, other: &Map<K, V>) -> Map<K, V> {
        self.difference_with_key(|_, _, _| None, other)
    }

    pub fn difference_with<F>(&self, mut f: F, other: &Map<K, V>) -> Map<K, V>
    where
        F: FnMut(&V, &V) -> Option<V>,
    {
        self.difference_with_key(|_, a, b| f(a, b), other)
    }

    /// Difference with a merge, a key present in both maps survives
    /// with `v` when `f(key, left, right)` yields `Some(v)` and is
    /// dropped on `None`.
    pub fn difference_with_key<F>(&self, mut f: F, other: &Map<K, V>) -> Map<K, V>
    where
        F: FnMut(&K, &V, &V) -> Option<V>,
    {
        self.fold_left(Map::new(), |acc, k, v1| match other.get(k) {
            None => acc.insert(k.clone(), v1.clone()),
            Some(v2) => match f(k, v1, v2) {
                Some(v) => acc.insert(k.clone(), v),
                None => acc,
            },
        })
    }

    /// Invert the mapping, every value maps to the set of keys that
    /// held it.
    pub fn invert(&self) -> Map<V, BTreeSet<K>>
    where
        V: Ord,
    {
        self.fold_left(Map::new(), |acc, k, v| {
            let mut single = BTreeSet::new();
            single.insert(k.clone());
            Map {
                tree: acc.tree.insert_with(
                    |_, mut new, old| {
                        new.extend(old.iter().cloned());
                        new
                    },
                    v.clone(),
                    single,
                ),
            }
        })
    }

    /// Whether every entry of this map appears in `other`.
    pub fn is_submap_of(&self, other: &Map<K, V>) -> bool
    where
        V: PartialEq,
    {
        self.forall(|k, v| other.get(k) == Some(v))
    }

    pub fn is_proper_submap_of(&self, other: &Map<K, V>) -> bool
    where
        V: PartialEq,
    {
        self.len() < other.len() && self.is_submap_of(other)
    }

    /// Rebuild the map inside the effect of `f`, visiting entries in
    /// order and stopping at the first error.
    pub fn traverse<V2, E, F>(&self, mut f: F) -> std::result::Result<Map<K, V2>, E>
    where
        V2: Clone,
        F: FnMut(&V) -> std::result::Result<V2, E>,
    {
        self.traverse_with_key(|_, v| f(v))
    }

    pub fn traverse_with_key<V2, E, F>(&self, f: F) -> std::result::Result<Map<K, V2>, E>
    where
        V2: Clone,
        F: FnMut(&K, &V) -> std::result::Result<V2, E>,
    {
        Ok(Map {
            tree: self.tree.try_map_with_key(f)?,
        })
    }

    /// Build a map by repeatedly applying `f` to a state until it
    /// yields `None`.
    pub fn unfold<S, F>(seed: S, mut f: F) -> Map<K, V>
    where
        F: FnMut(S) -> Option<(K, V, S)>,
    {
        let mut map = Map::new();
        let mut state = seed;
        while let Some((key, value, next)) = f(state) {
            map = map.insert(key, value);
            state = next;
        }
        map
    }

    /// Build a map by draining a stateful producer.
    pub fn unfold_with_iter<F>(mut next: F) -> Map<K, V>
    where
        F: FnMut() -> Option<(K, V)>,
    {
        let mut map = Map::new();
        while let Some((key, value)) = next() {
            map = map.insert(key, value);
        }
        map
    }

    /// In-order list of entries matching the band described by `p`,
    /// see [`Rbt::query_with`].
    pub fn query<P>(&self, p: P) -> Vec<(K, V)>
    where
        P: Fn(&K) -> Ordering,
    {
        self.tree.query(p)
    }

    pub fn query_with<P, F>(&self, p: P, f: F)
    where
        P: Fn(&K) -> Ordering,
        F: FnMut(&K, &V),
    {
        self.tree.query_with(p, f)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.tree.to_vec()
    }

    /// Validate the underlying tree, see [`Rbt::validate`].
    pub fn validate(&self) -> Result<Stats>
    where
        K: fmt::Debug,
    {
        self.tree.validate()
    }
}

// parallel variants, for pure functions
impl<K, V> Map<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Parallel [`map_with_key`] for a pure `f`, see
    /// [`Rbt::par_map_with_key`].
    ///
    /// [`map_with_key`]: Map::map_with_key
    pub fn par_map_with_key<V2, F>(&self, f: F) -> Map<K, V2>
    where
        V2: Clone + Send + Sync,
        F: Fn(&K, &V) -> V2 + Sync,
    {
        Map {
            tree: self.tree.par_map_with_key(f),
        }
    }

    /// Parallel [`count`] for a pure `p`.
    ///
    /// [`count`]: Map::count
    pub fn par_count<P>(&self, p: P) -> usize
    where
        P: Fn(&K, &V) -> bool + Sync,
    {
        self.tree.par_count(p)
    }

    pub fn par_min_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering + Sync,
    {
        self.tree.par_min_by(cmp)
    }

    pub fn par_max_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering + Sync,
    {
        self.tree.par_max_by(cmp)
    }
}

impl<K, V, E> Map<K, std::result::Result<V, E>>
where
    K: Ord + Clone,
    V: Clone,
    E: Clone,
{
    /// Turn a map of results into a result of a map, the first error
    /// in traversal order wins.
    pub fn sequence(&self) -> std::result::Result<Map<K, V>, E> {
        self.traverse_with_key(|_, r| r.clone())
    }
}

impl<K, V> PartialEq for Map<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl<K, V> Eq for Map<K, V>
where
    K: Ord + Clone,
    V: Clone + Eq,
{
}

impl<K, V> PartialOrd for Map<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialOrd,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K, V> Ord for Map<K, V>
where
    K: Ord + Clone,
    V: Clone + Ord,
{
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K, V> Hash for Map<K, V>
where
    K: Ord + Clone + Hash,
    V: Clone + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut entries = 0;
        for (key, value) in self.iter() {
            key.hash(state);
            value.hash(state);
            entries += 1;
        }
        state.write_usize(entries);
    }
}

impl<K, V> fmt::Debug for Map<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Map<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn from_iter<I>(iter: I) -> Map<K, V>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Map {
            tree: Rbt::from_iter(iter),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a Map<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

#[cfg(test)]
#[path = "map_test.rs"]
mod map_test;
