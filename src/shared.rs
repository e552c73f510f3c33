//! Thread-safe wrapper around [`FluidGrid`].

use parking_lot::RwLock;

use crate::{Cell, FluidGrid, GridConfig, GridKey, Result};

/// A [`FluidGrid`] behind a reader-writer lock.
///
/// Any number of readers may run at once; an insert waits for them and then
/// holds exclusive access for the duration of the call. Lookups return a
/// copy of the value since no borrow can outlive the lock guard.
pub struct SharedGrid<V = Cell> {
    inner: RwLock<FluidGrid<V>>,
}

impl<V> SharedGrid<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(FluidGrid::new()),
        }
    }

    pub fn with_config(config: GridConfig) -> Result<Self> {
        Ok(Self {
            inner: RwLock::new(FluidGrid::with_config(config)?),
        })
    }

    /// Stores `value` at `(x, y, z)`, returning the value it replaced.
    pub fn insert(&self, x: i32, y: i32, z: i32, value: V) -> Option<V> {
        self.inner.write().insert(x, y, z, value)
    }

    pub fn contains(&self, key: &GridKey) -> bool {
        self.inner.read().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Runs `f` with shared access to the grid.
    pub fn read<R>(&self, f: impl FnOnce(&FluidGrid<V>) -> R) -> R {
        let guard = self.inner.read();
        f(&*guard)
    }

    /// Runs `f` with exclusive access to the grid.
    pub fn write<R>(&self, f: impl FnOnce(&mut FluidGrid<V>) -> R) -> R {
        let mut guard = self.inner.write();
        f(&mut *guard)
    }

    pub fn into_inner(self) -> FluidGrid<V> {
        self.inner.into_inner()
    }
}

impl<V: Clone> SharedGrid<V> {
    pub fn find(&self, x: i32, y: i32, z: i32) -> Option<V> {
        self.inner.read().find(x, y, z).cloned()
    }
}

impl<V> Default for SharedGrid<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> From<FluidGrid<V>> for SharedGrid<V> {
    fn from(grid: FluidGrid<V>) -> Self {
        Self {
            inner: RwLock::new(grid),
        }
    }
}
