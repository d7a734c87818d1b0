//! Module `thunk` export a memoizing suspension type.

use std::{
    fmt,
    sync::{Arc, Mutex, OnceLock},
};

type Susp<V> = Box<dyn FnOnce() -> V + Send>;

/// A suspended computation that evaluates at most once and caches its
/// value. Clones share the cache, forcing any clone forces all of them.
pub struct Thunk<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    cell: OnceLock<V>,
    susp: Mutex<Option<Susp<V>>>,
}

impl<V> Clone for Thunk<V> {
    fn clone(&self) -> Self {
        Thunk {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Thunk<V> {
    /// Suspend `f`. Nothing runs until the first [`force`].
    ///
    /// [`force`]: Thunk::force
    pub fn new<F>(f: F) -> Thunk<V>
    where
        F: FnOnce() -> V + Send + 'static,
    {
        Thunk {
            inner: Arc::new(Inner {
                cell: OnceLock::new(),
                susp: Mutex::new(Some(Box::new(f))),
            }),
        }
    }

    /// Wrap an already computed value, [`force`] returns it without
    /// running anything.
    ///
    /// [`force`]: Thunk::force
    pub fn evaluated(value: V) -> Thunk<V> {
        let cell = OnceLock::new();
        cell.set(value).ok();
        Thunk {
            inner: Arc::new(Inner {
                cell,
                susp: Mutex::new(None),
            }),
        }
    }

    /// Whether the suspension has already been evaluated.
    pub fn is_forced(&self) -> bool {
        self.inner.cell.get().is_some()
    }

    pub(crate) fn force_ref(&self) -> &V {
        self.inner.cell.get_or_init(|| {
            let susp = self.inner.susp.lock().unwrap().take();
            match susp {
                Some(f) => f(),
                None => unreachable!("thunk without cache or suspension"),
            }
        })
    }
}

impl<V> Thunk<V>
where
    V: Clone,
{
    /// Evaluate the suspension, cache and return the value. Later calls
    /// return the cache. Concurrent forces evaluate exactly once.
    pub fn force(&self) -> V {
        self.force_ref().clone()
    }

    /// Suspend `f` over this thunk. The result forces this thunk only
    /// when it is itself forced.
    pub fn map<V2, F>(&self, f: F) -> Thunk<V2>
    where
        F: FnOnce(V) -> V2 + Send + 'static,
        V: Send + Sync + 'static,
    {
        let this = self.clone();
        Thunk::new(move || f(this.force()))
    }
}

impl<V> fmt::Debug for Thunk<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner.cell.get() {
            Some(value) => write!(f, "{:?}", value),
            None => write!(f, "<suspended>"),
        }
    }
}

#[cfg(test)]
#[path = "thunk_test.rs"]
mod thunk_test;
