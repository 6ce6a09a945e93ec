//! Resource loader seam between the cache and the host's asset I/O
//!
//! The cache only ever talks to a [`ResourceLoader`]: start a load for an
//! address under a fresh [`LoadHandle`], and release a handle when the entry
//! dies. Loaders report back through the [`LoadCompletion`] they were given,
//! from any thread; the cache applies completions on the loop thread in
//! `AssetCache::pump`.
//!
//! [`ThreadedLoader`] is the stock implementation: it runs a blocking
//! [`ChunkSource`] on the [`Workers`] pool.

use crossbeam_channel::Sender;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::error::LoadError;
use super::texture::ChunkTexture;
use super::workers::Workers;

/// Identity of one underlying load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadHandle(pub u64);

impl LoadHandle {
    /// Allocate a process-unique handle
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        LoadHandle(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for LoadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

/// Result of one load as delivered to the cache
pub type LoadOutcome = (LoadHandle, Result<ChunkTexture, LoadError>);

/// One-shot reply slot handed to a loader
#[derive(Debug)]
pub struct LoadCompletion {
    handle: LoadHandle,
    tx: Sender<LoadOutcome>,
}

impl LoadCompletion {
    pub(crate) fn new(handle: LoadHandle, tx: Sender<LoadOutcome>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> LoadHandle {
        self.handle
    }

    /// Deliver the result. Safe to call from any thread; a dropped cache just
    /// discards it.
    pub fn complete(self, result: Result<ChunkTexture, LoadError>) {
        if self.tx.send((self.handle, result)).is_err() {
            trace!("{} completed after cache shutdown", self.handle);
        }
    }
}

/// Asynchronous asset loading service consumed by the cache
pub trait ResourceLoader: Send + Sync {
    /// Begin loading `address`. Must not block; the result goes to `done`.
    fn load_async(&self, handle: LoadHandle, address: &str, done: LoadCompletion);

    /// Drop whatever the loader keeps for `handle`. Called exactly once per
    /// handle, possibly while its load is still running.
    fn release(&self, handle: LoadHandle);
}

impl<T: ResourceLoader + ?Sized> ResourceLoader for Arc<T> {
    fn load_async(&self, handle: LoadHandle, address: &str, done: LoadCompletion) {
        (**self).load_async(handle, address, done)
    }

    fn release(&self, handle: LoadHandle) {
        (**self).release(handle)
    }
}

/// Blocking chunk reader (file system, archive, network mount...)
pub trait ChunkSource: Send + Sync {
    fn read(&self, address: &str) -> Result<ChunkTexture, LoadError>;
}

/// Runs a [`ChunkSource`] on a worker pool.
///
/// Released handles whose job has not started yet are skipped at execution
/// time and complete with [`LoadError::Cancelled`]; the cache ignores results
/// for handles it no longer tracks.
pub struct ThreadedLoader {
    workers: Arc<Workers>,
    source: Arc<dyn ChunkSource>,
    /// Jobs queued but not started, with their cancelled flag
    queued: Arc<Mutex<HashMap<LoadHandle, bool>>>,
}

impl ThreadedLoader {
    pub fn new(workers: Arc<Workers>, source: Arc<dyn ChunkSource>) -> Self {
        Self {
            workers,
            source,
            queued: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl ResourceLoader for ThreadedLoader {
    fn load_async(&self, handle: LoadHandle, address: &str, done: LoadCompletion) {
        let source = Arc::clone(&self.source);
        let queued = Arc::clone(&self.queued);
        let address = address.to_string();
        self.queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle, false);

        self.workers.execute(move || {
            // Check at execution time, not enqueue time
            let skip = queued
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&handle)
                .unwrap_or(false);
            if skip {
                trace!("Skipping released {} ('{}')", handle, address);
                done.complete(Err(LoadError::Cancelled));
                return;
            }
            debug!("Reading chunk '{}' ({})", address, handle);
            done.complete(source.read(&address));
        });
    }

    fn release(&self, handle: LoadHandle) {
        // Started jobs have nothing to free beyond the texture, which the cache drops itself
        if let Some(cancelled) = self
            .queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&handle)
        {
            *cancelled = true;
        }
    }
}
