//! Module `delay_map` export a persistent ordered map with lazy
//! values.
//!
//! [DelayMap] maps keys to memoizing suspensions, see [Thunk]. A read
//! forces only the values it returns, everything else stays
//! suspended. When every stored value is eventually forced the map
//! behaves exactly like [Map] over the same entries, provided value
//! construction is effect free or its effects are idempotent.
//!
//! Combinators come in pairs. The `*_lazy` variant expects a pure
//! function and composes suspensions, nothing is forced until the
//! resulting entry is itself forced, and then at most once. The eager
//! variant is for effectful functions, it forces the inputs it needs
//! right away, runs the function, and stores the result already
//! evaluated.

use std::{borrow::Borrow, fmt, sync::Arc};

use crate::{map::Map, parallel, rbt::Rbt, thunk::Thunk};

/// Persistent ordered map from `K` to lazily evaluated `V`.
pub struct DelayMap<K, V> {
    tree: Rbt<K, Thunk<V>>,
}

impl<K, V> Clone for DelayMap<K, V> {
    fn clone(&self) -> Self {
        DelayMap {
            tree: self.tree.clone(),
        }
    }
}

impl<K, V> Default for DelayMap<K, V> {
    fn default() -> Self {
        DelayMap { tree: Rbt::new() }
    }
}

impl<K, V> DelayMap<K, V> {
    /// Create an empty map.
    pub fn new() -> DelayMap<K, V> {
        DelayMap { tree: Rbt::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of entries, walks the whole tree, forces nothing.
    pub fn len(&self) -> usize {
        self.tree.len()
    }
}

impl<K, V> DelayMap<K, V>
where
    K: Ord + Clone,
{
    /// Map holding exactly one, already evaluated, entry.
    pub fn singleton(key: K, value: V) -> DelayMap<K, V> {
        DelayMap::new().insert(key, value)
    }

    /// Insert an already evaluated value.
    pub fn insert(&self, key: K, value: V) -> DelayMap<K, V> {
        DelayMap {
            tree: self.tree.insert(key, Thunk::evaluated(value)),
        }
    }

    /// Insert a suspension, `f` runs when the entry is first forced.
    pub fn insert_lazy<F>(&self, key: K, f: F) -> DelayMap<K, V>
    where
        F: FnOnce() -> V + Send + 'static,
    {
        DelayMap {
            tree: self.tree.insert(key, Thunk::new(f)),
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Smallest key, forces nothing.
    pub fn min_key(&self) -> Option<&K> {
        self.tree.min_entry().map(|(k, _)| k)
    }

    /// Largest key, forces nothing.
    pub fn max_key(&self) -> Option<&K> {
        self.tree.max_entry().map(|(k, _)| k)
    }

    /// Iterator over the keys, forces nothing.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.tree.iter().map(|(k, _)| k)
    }
}

impl<K, V> DelayMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Force and return the value under `key`, nothing else.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(Thunk::force)
    }

    /// Force and return the value under `key`, or `default` when
    /// absent.
    pub fn get_with_default<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).unwrap_or(default)
    }

    /// Insert `(key, value)`, on collision suspend `f(value, old)`.
    /// Neither the old suspension nor `f` run until the entry is
    /// forced.
    pub fn insert_with_lazy<F>(&self, f: F, key: K, value: V) -> DelayMap<K, V>
    where
        V: Send + Sync + 'static,
        F: FnOnce(V, V) -> V + Send + 'static,
    {
        DelayMap {
            tree: self.tree.insert_with(
                |_, new, old| {
                    let old = old.clone();
                    Thunk::new(move || f(new.force(), old.force()))
                },
                key,
                Thunk::evaluated(value),
            ),
        }
    }

    /// Insert `(key, value)`, on collision force the old value and
    /// store `f(value, old)` already evaluated.
    pub fn insert_with_eager<F>(&self, f: F, key: K, value: V) -> DelayMap<K, V>
    where
        F: FnOnce(V, V) -> V,
    {
        DelayMap {
            tree: self.tree.insert_with(
                |_, new, old| Thunk::evaluated(f(new.force(), old.force())),
                key,
                Thunk::evaluated(value),
            ),
        }
    }

    /// Compose the pure `f` over every suspension. Nothing is forced,
    /// each input value is forced at most once, and only if the mapped
    /// entry is forced.
    pub fn map_values_lazy<V2, F>(&self, f: F) -> DelayMap<K, V2>
    where
        V: Send + Sync + 'static,
        V2: Clone,
        F: Fn(V) -> V2 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        DelayMap {
            tree: self.tree.map_with_key(|_, thunk| {
                let f = Arc::clone(&f);
                let thunk = thunk.clone();
                Thunk::new(move || f(thunk.force()))
            }),
        }
    }

    /// Keyed variant of [`map_values_lazy`].
    ///
    /// [`map_values_lazy`]: DelayMap::map_values_lazy
    pub fn map_with_key_lazy<V2, F>(&self, f: F) -> DelayMap<K, V2>
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
        V2: Clone,
        F: Fn(&K, V) -> V2 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        DelayMap {
            tree: self.tree.map_with_key(|key, thunk| {
                let f = Arc::clone(&f);
                let key = key.clone();
                let thunk = thunk.clone();
                Thunk::new(move || f(&key, thunk.force()))
            }),
        }
    }

    /// Run the effectful `f` over every value right away, forcing all
    /// of them, and store the results already evaluated.
    pub fn map_values_eager<V2, F>(&self, mut f: F) -> DelayMap<K, V2>
    where
        V2: Clone,
        F: FnMut(V) -> V2,
    {
        DelayMap {
            tree: self
                .tree
                .map_with_key(|_, thunk| Thunk::evaluated(f(thunk.force()))),
        }
    }

    /// Keyed variant of [`map_values_eager`].
    ///
    /// [`map_values_eager`]: DelayMap::map_values_eager
    pub fn map_with_key_eager<V2, F>(&self, mut f: F) -> DelayMap<K, V2>
    where
        V2: Clone,
        F: FnMut(&K, V) -> V2,
    {
        DelayMap {
            tree: self
                .tree
                .map_with_key(|key, thunk| Thunk::evaluated(f(key, thunk.force()))),
        }
    }

    /// In-order fold, forcing values as they are reached.
    pub fn fold_left<A, F>(&self, seed: A, mut f: F) -> A
    where
        F: FnMut(A, &K, V) -> A,
    {
        self.tree
            .fold_left(seed, |acc, key, thunk| f(acc, key, thunk.force()))
    }

    /// In-order list of entries, forcing every value.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.fold_left(vec![], |mut items, key, value| {
            items.push((key.clone(), value));
            items
        })
    }

    /// Wrap every value of `map` as an already evaluated entry.
    pub fn from_map(map: &Map<K, V>) -> DelayMap<K, V> {
        DelayMap {
            tree: map.tree.map_with_key(|_, v| Thunk::evaluated(v.clone())),
        }
    }
}

impl<K, V> DelayMap<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Force every value and return the strict counterpart of this
    /// map. Large maps are forced on the worker pool.
    pub fn to_map(&self) -> Map<K, V> {
        let entries = self.len();
        if entries >= parallel::PAR_THRESHOLD {
            log::trace!("to_map: forcing {} entries in parallel", entries);
            Map {
                tree: self.tree.par_map_always(|_, thunk| thunk.force()),
            }
        } else {
            Map {
                tree: self.tree.map_with_key(|_, thunk| thunk.force()),
            }
        }
    }
}

impl<K, V> fmt::Debug for DelayMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    // prints evaluated values and elides pending suspensions, forces
    // nothing
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.tree.iter()).finish()
    }
}

#[cfg(test)]
#[path = "delay_map_test.rs"]
mod delay_map_test;
