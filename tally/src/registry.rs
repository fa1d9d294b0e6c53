//! Thread-safe handle over the durable store.
//!
//! [`Registry`] wraps a [`Store`] in a single readers-writer lock.
//! Lookups, listing, and status take the lock in shared mode; inserts and
//! deletes take it exclusively and hold it across both the in-memory
//! mutation and the snapshot write, so concurrent observers never see a
//! table that is ahead of, or interleaved with, what is on disk.
//!
//! Each operation acquires the lock once and releases it on return; no
//! operation takes a second lock.

use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entry::{Entry, reduce};
use crate::error::Result;
use crate::store::Store;

/// Shared registry of named summaries.
///
/// Construct once at startup and share by `Arc` with every handler.
#[derive(Debug)]
pub struct Registry {
    store: RwLock<Store>,
}

impl Registry {
    /// Wraps an opened store.
    pub fn new(store: Store) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }

    /// Opens the backing file at `path` and wraps the loaded store.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap errors of [`Store::open`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Store::open(path).map(Self::new)
    }

    // Store mutations cannot panic between touching the table and the
    // index, so a poisoned lock still guards a consistent pair.
    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reduces `samples` and stores the result under `name`.
    ///
    /// The reduction runs before the write lock is taken.
    ///
    /// # Errors
    ///
    /// - [`TallyError::InvalidInput`](crate::TallyError::InvalidInput) from [`reduce`]
    /// - the errors of [`Registry::insert`]
    pub fn insert_samples(&self, name: &str, samples: &[f64]) -> Result<Entry> {
        let entry = reduce(name, samples)?;
        self.insert(entry.clone())?;
        Ok(entry)
    }

    /// Stores a reduced entry.
    ///
    /// # Errors
    ///
    /// See [`Store::insert`].
    pub fn insert(&self, entry: Entry) -> Result<()> {
        self.write().insert(entry)
    }

    /// Removes the named entry.
    ///
    /// # Errors
    ///
    /// See [`Store::delete`].
    pub fn delete(&self, name: &str) -> Result<()> {
        self.write().delete(name)
    }

    /// Returns a copy of the named entry.
    ///
    /// # Errors
    ///
    /// See [`Store::search`].
    pub fn search(&self, name: &str) -> Result<Entry> {
        self.read().search(name).cloned()
    }

    /// Returns a snapshot of all entries in insertion order.
    pub fn list(&self) -> Vec<Entry> {
        self.read().entries().to_vec()
    }

    /// Returns the number of stored entries.
    pub fn status(&self) -> usize {
        self.read().len()
    }
}
