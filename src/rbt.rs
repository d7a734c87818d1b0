//! Module `rbt` export a persistent ordered index type, implementing
//! an immutable red-black tree.
//!
//! [Rbt] values are never mutated in place. Every write operation
//! returns a new tree that shares all untouched subtrees with its
//! input, a tree can therefore be cloned and handed around freely, in
//! O(1), while older versions remain valid.
//!
//! Deletion follows the four-color scheme, where a transient
//! `DoubleBlack` marker carries a missing black upward until a local
//! rotation absorbs it. The marker never appears in a tree returned by
//! a public operation, `validate()` checks this along with the usual
//! red-black invariants.
//!
//! Bulk walks (`par_map_with_key`, `par_count`, `par_min_by`,
//! `par_max_by`) fork the tree across the crate's worker pool when the
//! tree is large enough, see the `parallel` module. Their results are
//! identical to the sequential counterparts.

use std::{borrow::Borrow, cmp::Ordering, fmt, iter::FromIterator, sync::Arc};

use crate::{
    depth::Depth,
    error::{Error, Result},
    parallel,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Color {
    Red,
    Black,
    DoubleBlack, // transient, only during remove
}

pub(crate) enum Tree<K, V> {
    Leaf,
    DoubleBlackLeaf, // transient, only during remove
    Node {
        color: Color,
        left: Arc<Tree<K, V>>,
        key: K,
        value: V,
        right: Arc<Tree<K, V>>,
    },
}

#[inline]
fn leaf<K, V>() -> Arc<Tree<K, V>> {
    Arc::new(Tree::Leaf)
}

#[inline]
fn dbleaf<K, V>() -> Arc<Tree<K, V>> {
    Arc::new(Tree::DoubleBlackLeaf)
}

#[inline]
fn node<K, V>(
    color: Color,
    left: Arc<Tree<K, V>>,
    key: K,
    value: V,
    right: Arc<Tree<K, V>>,
) -> Arc<Tree<K, V>> {
    Arc::new(Tree::Node {
        color,
        left,
        key,
        value,
        right,
    })
}

#[inline]
fn is_leaf<K, V>(tree: &Arc<Tree<K, V>>) -> bool {
    matches!(&**tree, Tree::Leaf)
}

#[inline]
fn is_red<K, V>(tree: &Arc<Tree<K, V>>) -> bool {
    matches!(
        &**tree,
        Tree::Node {
            color: Color::Red,
            ..
        }
    )
}

#[inline]
fn is_black_node<K, V>(tree: &Arc<Tree<K, V>>) -> bool {
    matches!(
        &**tree,
        Tree::Node {
            color: Color::Black,
            ..
        }
    )
}

#[inline]
fn is_double_black<K, V>(tree: &Arc<Tree<K, V>>) -> bool {
    matches!(
        &**tree,
        Tree::DoubleBlackLeaf
            | Tree::Node {
                color: Color::DoubleBlack,
                ..
            }
    )
}

/// Persistent ordered map from `K` to `V` backed by a red-black tree.
///
/// Write operations take `&self` and return the updated tree, the
/// receiver is left untouched.
pub struct Rbt<K, V> {
    root: Arc<Tree<K, V>>,
}

impl<K, V> Clone for Rbt<K, V> {
    fn clone(&self) -> Self {
        Rbt {
            root: Arc::clone(&self.root),
        }
    }
}

impl<K, V> Default for Rbt<K, V> {
    fn default() -> Self {
        Rbt { root: leaf() }
    }
}

impl<K, V> Rbt<K, V> {
    /// Create an empty tree.
    pub fn new() -> Rbt<K, V> {
        Rbt { root: leaf() }
    }

    pub fn is_empty(&self) -> bool {
        is_leaf(&self.root)
    }

    /// Return the number of entries, walks the whole tree.
    pub fn len(&self) -> usize {
        fn count<K, V>(tree: &Tree<K, V>) -> usize {
            match tree {
                Tree::Node { left, right, .. } => 1 + count(left) + count(right),
                _ => 0,
            }
        }
        count(&self.root)
    }

    /// Number of black nodes on the path from the root to the leftmost
    /// leaf.
    pub fn black_height(&self) -> usize {
        let mut tree = &*self.root;
        let mut blacks = 0;
        while let Tree::Node { color, left, .. } = tree {
            if *color == Color::Black {
                blacks += 1;
            }
            tree = left;
        }
        blacks
    }

    /// Return an in-order iterator over the entries.
    pub fn iter(&self) -> Iter<K, V> {
        let mut iter = Iter { stack: vec![] };
        iter.push_left(&self.root);
        iter
    }
}

impl<K, V> Rbt<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Get the value mapped to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut tree = &*self.root;
        loop {
            match tree {
                Tree::Node {
                    left,
                    key: k,
                    value,
                    right,
                    ..
                } => {
                    tree = match key.cmp(k.borrow()) {
                        Ordering::Less => left,
                        Ordering::Greater => right,
                        Ordering::Equal => return Some(value),
                    }
                }
                _ => return None,
            }
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Insert `(key, value)`, overwriting an existing mapping for the
    /// same key.
    pub fn insert(&self, key: K, value: V) -> Rbt<K, V> {
        self.insert_with(|_, new, _| new, key, value)
    }

    /// Insert `(key, value)`. If `key` is already present the stored
    /// value becomes `f(key, value, old_value)`.
    pub fn insert_with<F>(&self, f: F, key: K, value: V) -> Rbt<K, V>
    where
        F: FnOnce(&K, V, &V) -> V,
    {
        Rbt {
            root: blacken(insert_help(&self.root, f, key, value)),
        }
    }

    /// If `f(key, old_value)` yields a new value, replace the mapping
    /// with it. When `f` yields `None`, or `key` is absent, the
    /// original tree is handed back untouched so callers keep full
    /// structural sharing.
    pub fn update_with<Q, F>(&self, f: F, key: &Q) -> Rbt<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        match update_tree(&self.root, f, key) {
            Some(root) => Rbt { root },
            None => self.clone(),
        }
    }

    /// Delete the mapping for `key` if present, reestablishing the
    /// invariants.
    pub fn remove<Q>(&self, key: &Q) -> Rbt<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let root = redden(remove_help(&redden(Arc::clone(&self.root)), key));
        debug_assert!(
            !is_double_black(&root),
            "double-black marker survived at the root"
        );
        Rbt { root }
    }

    /// Leftmost entry.
    pub fn min_entry(&self) -> Option<(&K, &V)> {
        let mut tree = &*self.root;
        let mut entry = None;
        while let Tree::Node {
            left, key, value, ..
        } = tree
        {
            entry = Some((key, value));
            tree = left;
        }
        entry
    }

    /// Rightmost entry.
    pub fn max_entry(&self) -> Option<(&K, &V)> {
        let mut tree = &*self.root;
        let mut entry = None;
        while let Tree::Node {
            key, value, right, ..
        } = tree
        {
            entry = Some((key, value));
            tree = right;
        }
        entry
    }

    /// In-order fold from the leftmost entry.
    pub fn fold_left<A, F>(&self, seed: A, mut f: F) -> A
    where
        F: FnMut(A, &K, &V) -> A,
    {
        fn go<K, V, A, F>(tree: &Tree<K, V>, acc: A, f: &mut F) -> A
        where
            F: FnMut(A, &K, &V) -> A,
        {
            match tree {
                Tree::Node {
                    left,
                    key,
                    value,
                    right,
                    ..
                } => {
                    let acc = go(left, acc, f);
                    let acc = f(acc, key, value);
                    go(right, acc, f)
                }
                _ => acc,
            }
        }
        go(&self.root, seed, &mut f)
    }

    /// In-order fold from the rightmost entry.
    pub fn fold_right<A, F>(&self, seed: A, mut f: F) -> A
    where
        F: FnMut(&K, &V, A) -> A,
    {
        fn go<K, V, A, F>(tree: &Tree<K, V>, acc: A, f: &mut F) -> A
        where
            F: FnMut(&K, &V, A) -> A,
        {
            match tree {
                Tree::Node {
                    left,
                    key,
                    value,
                    right,
                    ..
                } => {
                    let acc = go(right, acc, f);
                    let acc = f(key, value, acc);
                    go(left, acc, f)
                }
                _ => acc,
            }
        }
        go(&self.root, seed, &mut f)
    }

    /// Left fold without a seed, `None` on an empty tree.
    pub fn reduce_left<F>(&self, mut f: F) -> Option<(K, V)>
    where
        F: FnMut((K, V), (&K, &V)) -> (K, V),
    {
        self.fold_left(None, |acc, key, value| {
            Some(match acc {
                None => (key.clone(), value.clone()),
                Some(acc) => f(acc, (key, value)),
            })
        })
    }

    /// Right fold without a seed, `None` on an empty tree.
    pub fn reduce_right<F>(&self, mut f: F) -> Option<(K, V)>
    where
        F: FnMut((&K, &V), (K, V)) -> (K, V),
    {
        self.fold_right(None, |key, value, acc| {
            Some(match acc {
                None => (key.clone(), value.clone()),
                Some(acc) => f((key, value), acc),
            })
        })
    }

    /// First entry, in traversal order, satisfying `p`.
    pub fn find_left<P>(&self, mut p: P) -> Option<(&K, &V)>
    where
        P: FnMut(&K, &V) -> bool,
    {
        fn go<'a, K, V, P>(tree: &'a Tree<K, V>, p: &mut P) -> Option<(&'a K, &'a V)>
        where
            P: FnMut(&K, &V) -> bool,
        {
            match tree {
                Tree::Node {
                    left,
                    key,
                    value,
                    right,
                    ..
                } => {
                    if let Some(found) = go(left, p) {
                        return Some(found);
                    }
                    if p(key, value) {
                        return Some((key, value));
                    }
                    go(right, p)
                }
                _ => None,
            }
        }
        go(&self.root, &mut p)
    }

    /// Last entry, in traversal order, satisfying `p`.
    pub fn find_right<P>(&self, mut p: P) -> Option<(&K, &V)>
    where
        P: FnMut(&K, &V) -> bool,
    {
        fn go<'a, K, V, P>(tree: &'a Tree<K, V>, p: &mut P) -> Option<(&'a K, &'a V)>
        where
            P: FnMut(&K, &V) -> bool,
        {
            match tree {
                Tree::Node {
                    left,
                    key,
                    value,
                    right,
                    ..
                } => {
                    if let Some(found) = go(right, p) {
                        return Some(found);
                    }
                    if p(key, value) {
                        return Some((key, value));
                    }
                    go(left, p)
                }
                _ => None,
            }
        }
        go(&self.root, &mut p)
    }

    pub fn exists<P>(&self, mut p: P) -> bool
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.find_left(|k, v| p(k, v)).is_some()
    }

    pub fn forall<P>(&self, mut p: P) -> bool
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.find_left(|k, v| !p(k, v)).is_none()
    }

    pub fn foreach<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        self.fold_left((), |_, k, v| f(k, v))
    }

    /// Number of entries satisfying `p`.
    pub fn count<P>(&self, mut p: P) -> usize
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.fold_left(0, |n, k, v| n + (p(k, v) as usize))
    }

    /// Smallest entry under `cmp`, ties resolved towards the leftmost
    /// entry. `cmp(ak, av, bk, bv)` orders entry `a` against entry `b`.
    pub fn min_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering,
    {
        seq_extreme_tree(&self.root, &cmp, true).map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Largest entry under `cmp`, ties resolved towards the leftmost
    /// entry.
    pub fn max_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering,
    {
        seq_extreme_tree(&self.root, &cmp, false).map(|(k, v)| (k.clone(), v.clone()))
    }

    /// New tree of the same shape with every value passed through `f`,
    /// in traversal order.
    pub fn map_with_key<V2, F>(&self, mut f: F) -> Rbt<K, V2>
    where
        V2: Clone,
        F: FnMut(&K, &V) -> V2,
    {
        fn go<K, V, V2, F>(tree: &Tree<K, V>, f: &mut F) -> Arc<Tree<K, V2>>
        where
            K: Clone,
            F: FnMut(&K, &V) -> V2,
        {
            match tree {
                Tree::Node {
                    color,
                    left,
                    key,
                    value,
                    right,
                } => {
                    let left = go(left, f);
                    let value = f(key, value);
                    let right = go(right, f);
                    node(*color, left, key.clone(), value, right)
                }
                _ => leaf(),
            }
        }
        Rbt {
            root: go(&self.root, &mut f),
        }
    }

    /// Same shape rebuild as [`map_with_key`] with a fallible `f`. The
    /// first error stops the walk and is handed back.
    ///
    /// [`map_with_key`]: Rbt::map_with_key
    pub fn try_map_with_key<V2, E, F>(&self, mut f: F) -> std::result::Result<Rbt<K, V2>, E>
    where
        V2: Clone,
        F: FnMut(&K, &V) -> std::result::Result<V2, E>,
    {
        fn go<K, V, V2, E, F>(
            tree: &Tree<K, V>,
            f: &mut F,
        ) -> std::result::Result<Arc<Tree<K, V2>>, E>
        where
            K: Clone,
            F: FnMut(&K, &V) -> std::result::Result<V2, E>,
        {
            match tree {
                Tree::Node {
                    color,
                    left,
                    key,
                    value,
                    right,
                } => {
                    let left = go(left, f)?;
                    let value = f(key, value)?;
                    let right = go(right, f)?;
                    Ok(node(*color, left, key.clone(), value, right))
                }
                _ => Ok(leaf()),
            }
        }
        Ok(Rbt {
            root: go(&self.root, &mut f)?,
        })
    }

    /// Visit, in order, every entry whose key matches the band
    /// described by `p`. `p` reports where a probed key stands relative
    /// to the band, `Less` when the key is below it, `Greater` when
    /// above, `Equal` when inside, which lets the walk prune whole
    /// subtrees.
    pub fn query_with<P, F>(&self, p: P, mut f: F)
    where
        P: Fn(&K) -> Ordering,
        F: FnMut(&K, &V),
    {
        fn go<K, V, P, F>(tree: &Tree<K, V>, p: &P, f: &mut F)
        where
            P: Fn(&K) -> Ordering,
            F: FnMut(&K, &V),
        {
            if let Tree::Node {
                left,
                key,
                value,
                right,
                ..
            } = tree
            {
                match p(key) {
                    Ordering::Less => go(right, p, f),
                    Ordering::Greater => go(left, p, f),
                    Ordering::Equal => {
                        go(left, p, f);
                        f(key, value);
                        go(right, p, f);
                    }
                }
            }
        }
        go(&self.root, &p, &mut f)
    }

    /// In-order list of entries matching the band described by `p`,
    /// see [`query_with`].
    ///
    /// [`query_with`]: Rbt::query_with
    pub fn query<P>(&self, p: P) -> Vec<(K, V)>
    where
        P: Fn(&K) -> Ordering,
    {
        let mut items = vec![];
        self.query_with(p, |k, v| items.push((k.clone(), v.clone())));
        items
    }

    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Validate the red-black invariants. On success return [Stats]
    /// with entry count, black height and leaf-depth statistics.
    pub fn validate(&self) -> Result<Stats>
    where
        K: fmt::Debug,
    {
        let mut depths = Depth::default();
        let blacks = validate_tree(&self.root, 0, 0, &mut depths)?;
        Ok(Stats {
            entries: self.len(),
            blacks,
            depths,
        })
    }
}

// parallel walks
impl<K, V> Rbt<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Parallel [`map_with_key`] for a pure `f`. Falls back to a
    /// sequential walk when the tree is too shallow to pay for the
    /// fork/join overhead. The result is identical to the sequential
    /// walk.
    ///
    /// [`map_with_key`]: Rbt::map_with_key
    pub fn par_map_with_key<V2, F>(&self, f: F) -> Rbt<K, V2>
    where
        V2: Clone + Send + Sync,
        F: Fn(&K, &V) -> V2 + Sync,
    {
        let height = self.black_height();
        if !parallel::above_threshold(height) {
            log::trace!("par_map_with_key: black-height {} runs sequential", height);
            return Rbt {
                root: seq_map_tree(&self.root, &f),
            };
        }
        self.par_map_always(f)
    }

    pub(crate) fn par_map_always<V2, F>(&self, f: F) -> Rbt<K, V2>
    where
        V2: Clone + Send + Sync,
        F: Fn(&K, &V) -> V2 + Sync,
    {
        let budget = parallel::worker_budget();
        log::trace!("par_map_with_key: worker budget {}", budget);
        Rbt {
            root: parallel::install(|| par_map_tree(&self.root, budget, &f)),
        }
    }

    /// Parallel [`count`] for a pure `p`.
    ///
    /// [`count`]: Rbt::count
    pub fn par_count<P>(&self, p: P) -> usize
    where
        P: Fn(&K, &V) -> bool + Sync,
    {
        let height = self.black_height();
        if !parallel::above_threshold(height) {
            log::trace!("par_count: black-height {} runs sequential", height);
            return seq_count_tree(&self.root, &p);
        }
        let budget = parallel::worker_budget();
        parallel::install(|| par_count_tree(&self.root, budget, &p))
    }

    /// Parallel [`min_by`] for a pure `cmp`. Ties resolve towards the
    /// leftmost entry, exactly like the sequential walk.
    ///
    /// [`min_by`]: Rbt::min_by
    pub fn par_min_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering + Sync,
    {
        self.par_extreme(cmp, true)
    }

    /// Parallel [`max_by`] for a pure `cmp`.
    ///
    /// [`max_by`]: Rbt::max_by
    pub fn par_max_by<F>(&self, cmp: F) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering + Sync,
    {
        self.par_extreme(cmp, false)
    }

    fn par_extreme<F>(&self, cmp: F, min: bool) -> Option<(K, V)>
    where
        F: Fn(&K, &V, &K, &V) -> Ordering + Sync,
    {
        let height = self.black_height();
        let entry = if !parallel::above_threshold(height) {
            log::trace!("par_extreme: black-height {} runs sequential", height);
            seq_extreme_tree(&self.root, &cmp, min)
        } else {
            let budget = parallel::worker_budget();
            parallel::install(|| par_extreme_tree(&self.root, budget, &cmp, min))
        };
        entry.map(|(k, v)| (k.clone(), v.clone()))
    }
}

impl<K, V> FromIterator<(K, V)> for Rbt<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn from_iter<I>(iter: I) -> Rbt<K, V>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut tree = Rbt::new();
        for (key, value) in iter {
            tree = tree.insert(key, value);
        }
        tree
    }
}

impl<'a, K, V> IntoIterator for &'a Rbt<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V> fmt::Debug for Rbt<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// In-order iterator over the entries of an [Rbt].
pub struct Iter<'a, K, V> {
    stack: Vec<(&'a K, &'a V, &'a Tree<K, V>)>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut tree: &'a Tree<K, V>) {
        while let Tree::Node {
            left,
            key,
            value,
            right,
            ..
        } = tree
        {
            self.stack.push((key, value, right));
            tree = left;
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value, right) = self.stack.pop()?;
        self.push_left(right);
        Some((key, value))
    }
}

/// Outcome of [`Rbt::validate`].
pub struct Stats {
    entries: usize,
    blacks: usize,
    depths: Depth,
}

impl Stats {
    /// Number of entries in the tree.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Number of black nodes from the root to any leaf.
    pub fn blacks(&self) -> usize {
        self.blacks
    }

    /// Leaf-depth statistics.
    pub fn depths(&self) -> &Depth {
        &self.depths
    }
}

// Okasaki's insert. Recurse down, rebuild up coloring the new node
// red, balance every rebuilt parent and blacken the root.
fn insert_help<K, V, F>(tree: &Arc<Tree<K, V>>, f: F, key: K, value: V) -> Arc<Tree<K, V>>
where
    K: Ord + Clone,
    V: Clone,
    F: FnOnce(&K, V, &V) -> V,
{
    match &**tree {
        Tree::Node {
            color,
            left,
            key: k,
            value: v,
            right,
        } => match key.cmp(k) {
            Ordering::Less => balance(
                *color,
                insert_help(left, f, key, value),
                k.clone(),
                v.clone(),
                Arc::clone(right),
            ),
            Ordering::Equal => node(*color, Arc::clone(left), key, f(k, value, v), Arc::clone(right)),
            Ordering::Greater => balance(
                *color,
                Arc::clone(left),
                k.clone(),
                v.clone(),
                insert_help(right, f, key, value),
            ),
        },
        _ => node(Color::Red, leaf(), key, value, leaf()),
    }
}

// Force the root black when it is red with a red child, the only
// breakage insertion can leave at the root.
fn blacken<K, V>(tree: Arc<Tree<K, V>>) -> Arc<Tree<K, V>>
where
    K: Clone,
    V: Clone,
{
    match &*tree {
        Tree::Node {
            color: Color::Red,
            left,
            key,
            value,
            right,
        } if is_red(left) || is_red(right) => node(
            Color::Black,
            Arc::clone(left),
            key.clone(),
            value.clone(),
            Arc::clone(right),
        ),
        _ => tree,
    }
}

// Before the delete descent, redden a black root whose children are
// black nodes so a double-black can always be absorbed below the root.
// After the descent, turn a double-black leaf root back into a leaf.
fn redden<K, V>(tree: Arc<Tree<K, V>>) -> Arc<Tree<K, V>>
where
    K: Clone,
    V: Clone,
{
    match &*tree {
        Tree::Node {
            color: Color::Black,
            left,
            key,
            value,
            right,
        } if is_black_node(left) && is_black_node(right) => node(
            Color::Red,
            Arc::clone(left),
            key.clone(),
            value.clone(),
            Arc::clone(right),
        ),
        Tree::DoubleBlackLeaf => leaf(),
        _ => tree,
    }
}

// Rebalance around a red-red violation. Four classic configurations
// for a black root, plus the two double-black configurations produced
// by `rotate`, a double-black root over a red child with a red inner
// grandchild. Anything else is handed back unchanged.
fn balance<K, V>(
    color: Color,
    left: Arc<Tree<K, V>>,
    key: K,
    value: V,
    right: Arc<Tree<K, V>>,
) -> Arc<Tree<K, V>>
where
    K: Clone,
    V: Clone,
{
    use self::Color::{Black, DoubleBlack, Red};

    match color {
        Black => {
            if let Tree::Node {
                color: Red,
                left: ll,
                key: lk,
                value: lv,
                right: lr,
            } = &*left
            {
                // B(R(R(a,x,b), y, c), z, d) => R(B(a,x,b), y, B(c,z,d))
                if let Tree::Node {
                    color: Red,
                    left: a,
                    key: gk,
                    value: gv,
                    right: b,
                } = &**ll
                {
                    return node(
                        Red,
                        node(Black, Arc::clone(a), gk.clone(), gv.clone(), Arc::clone(b)),
                        lk.clone(),
                        lv.clone(),
                        node(Black, Arc::clone(lr), key, value, right),
                    );
                }
                // B(R(a, x, R(b,y,c)), z, d) => R(B(a,x,b), y, B(c,z,d))
                if let Tree::Node {
                    color: Red,
                    left: b,
                    key: gk,
                    value: gv,
                    right: c,
                } = &**lr
                {
                    return node(
                        Red,
                        node(Black, Arc::clone(ll), lk.clone(), lv.clone(), Arc::clone(b)),
                        gk.clone(),
                        gv.clone(),
                        node(Black, Arc::clone(c), key, value, right),
                    );
                }
            }
            if let Tree::Node {
                color: Red,
                left: rl,
                key: rk,
                value: rv,
                right: rr,
            } = &*right
            {
                // B(a, x, R(R(b,y,c), z, d)) => R(B(a,x,b), y, B(c,z,d))
                if let Tree::Node {
                    color: Red,
                    left: b,
                    key: gk,
                    value: gv,
                    right: c,
                } = &**rl
                {
                    return node(
                        Red,
                        node(Black, left, key, value, Arc::clone(b)),
                        gk.clone(),
                        gv.clone(),
                        node(Black, Arc::clone(c), rk.clone(), rv.clone(), Arc::clone(rr)),
                    );
                }
                // B(a, x, R(b, y, R(c,z,d))) => R(B(a,x,b), y, B(c,z,d))
                if let Tree::Node {
                    color: Red,
                    left: c,
                    key: gk,
                    value: gv,
                    right: d,
                } = &**rr
                {
                    return node(
                        Red,
                        node(Black, left, key, value, Arc::clone(rl)),
                        rk.clone(),
                        rv.clone(),
                        node(Black, Arc::clone(c), gk.clone(), gv.clone(), Arc::clone(d)),
                    );
                }
            }
        }
        DoubleBlack => {
            // BB(R(a, x, R(b,y,c)), z, d) => B(B(a,x,b), y, B(c,z,d))
            if let Tree::Node {
                color: Red,
                left: ll,
                key: lk,
                value: lv,
                right: lr,
            } = &*left
            {
                if let Tree::Node {
                    color: Red,
                    left: b,
                    key: gk,
                    value: gv,
                    right: c,
                } = &**lr
                {
                    return node(
                        Black,
                        node(Black, Arc::clone(ll), lk.clone(), lv.clone(), Arc::clone(b)),
                        gk.clone(),
                        gv.clone(),
                        node(Black, Arc::clone(c), key, value, right),
                    );
                }
            }
            // BB(a, x, R(R(b,y,c), z, d)) => B(B(a,x,b), y, B(c,z,d))
            if let Tree::Node {
                color: Red,
                left: rl,
                key: rk,
                value: rv,
                right: rr,
            } = &*right
            {
                if let Tree::Node {
                    color: Red,
                    left: b,
                    key: gk,
                    value: gv,
                    right: c,
                } = &**rl
                {
                    return node(
                        Black,
                        node(Black, left, key, value, Arc::clone(b)),
                        gk.clone(),
                        gv.clone(),
                        node(Black, Arc::clone(c), rk.clone(), rv.clone(), Arc::clone(rr)),
                    );
                }
            }
        }
        Red => {}
    }
    node(color, left, key, value, right)
}

// Demote a double-black item one black, `DoubleBlackLeaf` to `Leaf`
// and a double-black node to a black node.
fn demote<K, V>(tree: &Arc<Tree<K, V>>) -> Arc<Tree<K, V>>
where
    K: Clone,
    V: Clone,
{
    match &**tree {
        Tree::DoubleBlackLeaf => leaf(),
        Tree::Node {
            color: Color::DoubleBlack,
            left,
            key,
            value,
            right,
        } => node(
            Color::Black,
            Arc::clone(left),
            key.clone(),
            value.clone(),
            Arc::clone(right),
        ),
        _ => Arc::clone(tree),
    }
}

// Absorb, or push one level up, a double-black marker carried by a
// child. Six shapes, each accepting the marker as a double-black node
// or a double-black leaf, keyed on the parent color and the sibling
// shape. Every other tree is handed back unchanged.
fn rotate<K, V>(
    color: Color,
    left: Arc<Tree<K, V>>,
    key: K,
    value: V,
    right: Arc<Tree<K, V>>,
) -> Arc<Tree<K, V>>
where
    K: Clone,
    V: Clone,
{
    use self::Color::{Black, DoubleBlack, Red};

    match color {
        Red => {
            // R(BB, x, B(c,y,d)) => balance B(R(BB-1, x, c), y, d)
            if is_double_black(&left) {
                if let Tree::Node {
                    color: Black,
                    left: c,
                    key: rk,
                    value: rv,
                    right: d,
                } = &*right
                {
                    return balance(
                        Black,
                        node(Red, demote(&left), key, value, Arc::clone(c)),
                        rk.clone(),
                        rv.clone(),
                        Arc::clone(d),
                    );
                }
            }
            // R(B(a,w,b), x, BB) => balance B(a, w, R(b, x, BB-1))
            if is_double_black(&right) {
                if let Tree::Node {
                    color: Black,
                    left: a,
                    key: lk,
                    value: lv,
                    right: b,
                } = &*left
                {
                    return balance(
                        Black,
                        Arc::clone(a),
                        lk.clone(),
                        lv.clone(),
                        node(Red, Arc::clone(b), key, value, demote(&right)),
                    );
                }
            }
        }
        Black => {
            if is_double_black(&left) {
                // B(BB, x, B(c,y,d)) => balance BB(R(BB-1, x, c), y, d)
                if let Tree::Node {
                    color: Black,
                    left: c,
                    key: rk,
                    value: rv,
                    right: d,
                } = &*right
                {
                    return balance(
                        DoubleBlack,
                        node(Red, demote(&left), key, value, Arc::clone(c)),
                        rk.clone(),
                        rv.clone(),
                        Arc::clone(d),
                    );
                }
                // B(BB, w, R(B(c,x,d), y, e))
                //   => B(balance B(R(BB-1, w, c), x, d), y, e)
                if let Tree::Node {
                    color: Red,
                    left: sibling,
                    key: rk,
                    value: rv,
                    right: e,
                } = &*right
                {
                    if let Tree::Node {
                        color: Black,
                        left: c,
                        key: sk,
                        value: sv,
                        right: d,
                    } = &**sibling
                    {
                        return node(
                            Black,
                            balance(
                                Black,
                                node(Red, demote(&left), key, value, Arc::clone(c)),
                                sk.clone(),
                                sv.clone(),
                                Arc::clone(d),
                            ),
                            rk.clone(),
                            rv.clone(),
                            Arc::clone(e),
                        );
                    }
                }
            }
            if is_double_black(&right) {
                // B(B(a,w,b), x, BB) => balance BB(a, w, R(b, x, BB-1))
                if let Tree::Node {
                    color: Black,
                    left: a,
                    key: lk,
                    value: lv,
                    right: b,
                } = &*left
                {
                    return balance(
                        DoubleBlack,
                        Arc::clone(a),
                        lk.clone(),
                        lv.clone(),
                        node(Red, Arc::clone(b), key, value, demote(&right)),
                    );
                }
                // B(R(a, w, B(b,x,c)), y, BB)
                //   => B(a, w, balance B(b, x, R(c, y, BB-1)))
                if let Tree::Node {
                    color: Red,
                    left: a,
                    key: lk,
                    value: lv,
                    right: sibling,
                } = &*left
                {
                    if let Tree::Node {
                        color: Black,
                        left: b,
                        key: sk,
                        value: sv,
                        right: c,
                    } = &**sibling
                    {
                        return node(
                            Black,
                            Arc::clone(a),
                            lk.clone(),
                            lv.clone(),
                            balance(
                                Black,
                                Arc::clone(b),
                                sk.clone(),
                                sv.clone(),
                                node(Red, Arc::clone(c), key, value, demote(&right)),
                            ),
                        );
                    }
                }
            }
        }
        DoubleBlack => {}
    }
    node(color, left, key, value, right)
}

// Delete descent. Three terminal shapes are handled directly, interior
// matches splice in the in-order successor via `min_delete`, every
// rebuilt parent goes through `rotate`.
fn remove_help<K, V, Q>(tree: &Arc<Tree<K, V>>, key: &Q) -> Arc<Tree<K, V>>
where
    K: Ord + Clone + Borrow<Q>,
    V: Clone,
    Q: Ord + ?Sized,
{
    use self::Color::{Black, Red};

    match &**tree {
        // red leaf-node
        Tree::Node {
            color: Red,
            left,
            key: k,
            right,
            ..
        } if is_leaf(left) && is_leaf(right) => {
            if key == k.borrow() {
                leaf()
            } else {
                Arc::clone(tree)
            }
        }
        // black leaf-node, removal leaves a double-black leaf
        Tree::Node {
            color: Black,
            left,
            key: k,
            right,
            ..
        } if is_leaf(left) && is_leaf(right) => {
            if key == k.borrow() {
                dbleaf()
            } else {
                Arc::clone(tree)
            }
        }
        // black node whose only child is a red leaf-node, removal
        // promotes the child to black
        Tree::Node {
            color: Black,
            left,
            key: k,
            value: v,
            right,
        } if is_red(left) && is_leaf(right) => match key.cmp(k.borrow()) {
            Ordering::Less => node(
                Black,
                remove_help(left, key),
                k.clone(),
                v.clone(),
                leaf(),
            ),
            Ordering::Equal => match &**left {
                Tree::Node {
                    key: lk, value: lv, ..
                } => node(Black, leaf(), lk.clone(), lv.clone(), leaf()),
                _ => Arc::clone(tree),
            },
            Ordering::Greater => Arc::clone(tree),
        },
        Tree::Node {
            color,
            left,
            key: k,
            value: v,
            right,
        } => match key.cmp(k.borrow()) {
            Ordering::Less => rotate(
                *color,
                remove_help(left, key),
                k.clone(),
                v.clone(),
                Arc::clone(right),
            ),
            Ordering::Equal => {
                let (sk, sv, right) = min_delete(right);
                rotate(*color, Arc::clone(left), sk, sv, right)
            }
            Ordering::Greater => rotate(
                *color,
                Arc::clone(left),
                k.clone(),
                v.clone(),
                remove_help(right, key),
            ),
        },
        // key not present
        _ => Arc::clone(tree),
    }
}

// Remove the leftmost entry of a non-empty subtree and return it along
// with the remainder, which may carry a double-black marker.
fn min_delete<K, V>(tree: &Arc<Tree<K, V>>) -> (K, V, Arc<Tree<K, V>>)
where
    K: Clone,
    V: Clone,
{
    use self::Color::{Black, Red};

    match &**tree {
        Tree::Node {
            color,
            left,
            key,
            value,
            right,
        } => {
            if is_leaf(left) {
                match (color, &**right) {
                    (Red, Tree::Leaf) => (key.clone(), value.clone(), leaf()),
                    (Black, Tree::Leaf) => (key.clone(), value.clone(), dbleaf()),
                    (
                        Black,
                        Tree::Node {
                            color: Red,
                            key: rk,
                            value: rv,
                            ..
                        },
                    ) => (
                        key.clone(),
                        value.clone(),
                        node(Black, leaf(), rk.clone(), rv.clone(), leaf()),
                    ),
                    _ => unreachable!("min_delete: tree out of invariant"),
                }
            } else {
                let (mk, mv, left) = min_delete(left);
                (
                    mk,
                    mv,
                    rotate(*color, left, key.clone(), value.clone(), Arc::clone(right)),
                )
            }
        }
        _ => unreachable!("min_delete: tree out of invariant"),
    }
}

// `update_with` walk. `None` means nothing changed, the caller then
// reuses its own subtree as-is.
fn update_tree<K, V, Q, F>(tree: &Arc<Tree<K, V>>, f: F, key: &Q) -> Option<Arc<Tree<K, V>>>
where
    K: Ord + Clone + Borrow<Q>,
    V: Clone,
    Q: Ord + ?Sized,
    F: FnOnce(&K, &V) -> Option<V>,
{
    match &**tree {
        Tree::Node {
            color,
            left,
            key: k,
            value: v,
            right,
        } => match key.cmp(k.borrow()) {
            Ordering::Less => update_tree(left, f, key).map(|left| {
                node(*color, left, k.clone(), v.clone(), Arc::clone(right))
            }),
            Ordering::Equal => f(k, v).map(|value| {
                node(*color, Arc::clone(left), k.clone(), value, Arc::clone(right))
            }),
            Ordering::Greater => update_tree(right, f, key).map(|right| {
                node(*color, Arc::clone(left), k.clone(), v.clone(), right)
            }),
        },
        _ => None,
    }
}

fn validate_tree<K, V>(
    tree: &Tree<K, V>,
    mut blacks: usize,
    depth: usize,
    depths: &mut Depth,
) -> Result<usize>
where
    K: Ord + fmt::Debug,
{
    match tree {
        Tree::Leaf => {
            depths.sample(depth);
            Ok(blacks)
        }
        Tree::DoubleBlackLeaf => Err(Error::DoubleBlackRemnant),
        Tree::Node {
            color: Color::DoubleBlack,
            ..
        } => Err(Error::DoubleBlackRemnant),
        Tree::Node {
            color,
            left,
            key,
            right,
            ..
        } => {
            if *color == Color::Red {
                if let Tree::Node {
                    color: Color::Red,
                    key: ck,
                    ..
                } = &**left
                {
                    return Err(Error::ConsecutiveReds(
                        format!("{:?}", key),
                        format!("{:?}", ck),
                    ));
                }
                if let Tree::Node {
                    color: Color::Red,
                    key: ck,
                    ..
                } = &**right
                {
                    return Err(Error::ConsecutiveReds(
                        format!("{:?}", key),
                        format!("{:?}", ck),
                    ));
                }
            } else {
                blacks += 1;
            }
            if let Tree::Node { key: lk, .. } = &**left {
                if lk >= key {
                    return Err(Error::SortError(format!("{:?}", lk), format!("{:?}", key)));
                }
            }
            if let Tree::Node { key: rk, .. } = &**right {
                if rk <= key {
                    return Err(Error::SortError(format!("{:?}", key), format!("{:?}", rk)));
                }
            }
            let l = validate_tree(left, blacks, depth + 1, depths)?;
            let r = validate_tree(right, blacks, depth + 1, depths)?;
            if l != r {
                return Err(Error::UnbalancedBlacks(l, r));
            }
            Ok(l)
        }
    }
}

// Sequential walks backing the parallel operations once the worker
// budget runs out. Kept separate from the public sequential variants.

fn seq_map_tree<K, V, V2, F>(tree: &Arc<Tree<K, V>>, f: &F) -> Arc<Tree<K, V2>>
where
    K: Clone,
    F: Fn(&K, &V) -> V2,
{
    match &**tree {
        Tree::Node {
            color,
            left,
            key,
            value,
            right,
        } => {
            let left = seq_map_tree(left, f);
            let value = f(key, value);
            let right = seq_map_tree(right, f);
            node(*color, left, key.clone(), value, right)
        }
        _ => leaf(),
    }
}

fn par_map_tree<K, V, V2, F>(tree: &Arc<Tree<K, V>>, budget: usize, f: &F) -> Arc<Tree<K, V2>>
where
    K: Clone + Send + Sync,
    V: Send + Sync,
    V2: Send + Sync,
    F: Fn(&K, &V) -> V2 + Sync,
{
    match &**tree {
        Tree::Node {
            color,
            left,
            key,
            value,
            right,
        } if budget > 1 => {
            let budget = (budget - 2) / 2;
            // node-local work stays in the caller
            let value = f(key, value);
            let (left, right) = rayon::join(
                || par_map_tree(left, budget, f),
                || par_map_tree(right, budget, f),
            );
            node(*color, left, key.clone(), value, right)
        }
        _ => seq_map_tree(tree, f),
    }
}

fn seq_count_tree<K, V, P>(tree: &Arc<Tree<K, V>>, p: &P) -> usize
where
    P: Fn(&K, &V) -> bool,
{
    match &**tree {
        Tree::Node {
            left,
            key,
            value,
            right,
            ..
        } => seq_count_tree(left, p) + (p(key, value) as usize) + seq_count_tree(right, p),
        _ => 0,
    }
}

fn par_count_tree<K, V, P>(tree: &Arc<Tree<K, V>>, budget: usize, p: &P) -> usize
where
    K: Send + Sync,
    V: Send + Sync,
    P: Fn(&K, &V) -> bool + Sync,
{
    match &**tree {
        Tree::Node {
            left,
            key,
            value,
            right,
            ..
        } if budget > 1 => {
            let budget = (budget - 2) / 2;
            let local = p(key, value) as usize;
            let (l, r) = rayon::join(
                || par_count_tree(left, budget, p),
                || par_count_tree(right, budget, p),
            );
            local + l + r
        }
        _ => seq_count_tree(tree, p),
    }
}

#[inline]
fn improves(ord: Ordering, min: bool) -> bool {
    if min {
        ord == Ordering::Less
    } else {
        ord == Ordering::Greater
    }
}

fn seq_extreme_tree<'a, K, V, F>(
    tree: &'a Tree<K, V>,
    cmp: &F,
    min: bool,
) -> Option<(&'a K, &'a V)>
where
    F: Fn(&K, &V, &K, &V) -> Ordering,
{
    match tree {
        Tree::Node {
            left,
            key,
            value,
            right,
            ..
        } => {
            let mut best = match seq_extreme_tree(left, cmp, min) {
                Some((bk, bv)) => {
                    if improves(cmp(key, value, bk, bv), min) {
                        (key, value)
                    } else {
                        (bk, bv)
                    }
                }
                None => (key, value),
            };
            if let Some((rk, rv)) = seq_extreme_tree(right, cmp, min) {
                if improves(cmp(rk, rv, best.0, best.1), min) {
                    best = (rk, rv);
                }
            }
            Some(best)
        }
        _ => None,
    }
}

fn par_extreme_tree<'a, K, V, F>(
    tree: &'a Arc<Tree<K, V>>,
    budget: usize,
    cmp: &F,
    min: bool,
) -> Option<(&'a K, &'a V)>
where
    K: Send + Sync,
    V: Send + Sync,
    F: Fn(&K, &V, &K, &V) -> Ordering + Sync,
{
    match &**tree {
        Tree::Node {
            left,
            key,
            value,
            right,
            ..
        } if budget > 0 => {
            let budget = budget.saturating_sub(2) / 2;
            let (l, r) = rayon::join(
                || par_extreme_tree(left, budget, cmp, min),
                || par_extreme_tree(right, budget, cmp, min),
            );
            let mut best = match l {
                Some((bk, bv)) => {
                    if improves(cmp(key, value, bk, bv), min) {
                        (key, value)
                    } else {
                        (bk, bv)
                    }
                }
                None => (key, value),
            };
            if let Some((rk, rv)) = r {
                if improves(cmp(rk, rv, best.0, best.1), min) {
                    best = (rk, rv);
                }
            }
            Some(best)
        }
        _ => seq_extreme_tree(tree, cmp, min),
    }
}

#[cfg(test)]
#[path = "rbt_test.rs"]
mod rbt_test;
