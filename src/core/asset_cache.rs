//! Reference-counted chunk cache with in-flight load deduplication
//!
//! **Structure**: `IndexMap<address, CacheEntry>` plus `HashMap<LoadHandle, address>`
//! for routing loader completions back to their entry.
//!
//! **Rules**:
//! - every `load` adds one reference, every `release` removes one
//! - at most one loader request per address; later callers wait on it
//! - the entry and its resource are freed the moment the count reaches 0
//! - a failed load removes the entry; the next `load` starts over
//!
//! All mutation happens on the loop thread. Loader results arrive over a
//! channel and are applied by [`AssetCache::pump`]; the mutex only exists so
//! the cache can be shared as `Arc<AssetCache>` and is never held while
//! calling into the loader.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use indexmap::IndexMap;
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use super::budget::MemoryBudget;
use super::error::ConfigError;
use super::loader::{LoadCompletion, LoadHandle, LoadOutcome, ResourceLoader};
use super::sequence::{SequenceSet, SetId, SetRegistry};
use super::texture::{human_mb, ChunkTexture};

/// Shortest allowed period of the automatic cache summary
const MIN_AUTO_LOG_INTERVAL: f32 = 0.5;

/// Opaque identity of a cache client, used for attribution only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl OwnerId {
    /// Allocate a process-unique owner id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        OwnerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Cache tuning and diagnostics switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Record which owners hold each entry
    pub track_owners: bool,
    /// Log a cache summary every N seconds (0 = off)
    pub auto_log_interval_secs: f32,
    /// Include one line per entry in summaries
    pub detailed_log: bool,
    /// Soft memory budget: fraction of available memory
    pub memory_fraction: f64,
    /// Memory kept out of the budget for the rest of the system (GB)
    pub reserve_gb: f64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            track_owners: true,
            auto_log_interval_secs: 0.0,
            detailed_log: true,
            memory_fraction: 0.5,
            reserve_gb: 1.0,
        }
    }
}

/// Counters for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
    frees: AtomicU64,
}

impl CacheStats {
    /// `load` calls served by an existing entry (loaded or in flight)
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// `load` calls that started a loader request
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Entries freed (refcount reached 0 or trimmed)
    pub fn frees(&self) -> u64 {
        self.frees.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome of a [`ChunkRequest`] as seen by its holder
#[derive(Debug, Clone)]
pub enum RequestState {
    Pending,
    Ready(Arc<ChunkTexture>),
    /// Load failed, or the entry was released before the load finished
    Failed,
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }
}

/// Pending result of [`AssetCache::load`], resolved on the loop thread.
///
/// Every `load` call counts one reference whatever the outcome; the holder
/// must `release` the address once it is done with a `Ready` result.
/// A `Failed` request holds no reference.
#[derive(Debug)]
pub struct ChunkRequest {
    address: String,
    rx: Option<Receiver<Arc<ChunkTexture>>>,
    resolved: Option<RequestState>,
}

impl ChunkRequest {
    fn waiting(address: &str, rx: Receiver<Arc<ChunkTexture>>) -> Self {
        Self {
            address: address.to_string(),
            rx: Some(rx),
            resolved: None,
        }
    }

    fn failed(address: &str) -> Self {
        Self {
            address: address.to_string(),
            rx: None,
            resolved: Some(RequestState::Failed),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Non-blocking check. Once resolved the answer never changes.
    pub fn poll(&mut self) -> RequestState {
        if let Some(state) = &self.resolved {
            return state.clone();
        }
        let state = match self.rx.as_ref().map(|rx| rx.try_recv()) {
            Some(Ok(tex)) => RequestState::Ready(tex),
            Some(Err(TryRecvError::Empty)) => return RequestState::Pending,
            Some(Err(TryRecvError::Disconnected)) | None => RequestState::Failed,
        };
        self.rx = None;
        self.resolved = Some(state.clone());
        state
    }
}

struct CacheEntry {
    handle: LoadHandle,
    texture: Option<Arc<ChunkTexture>>,
    ref_count: usize,
    owners: Option<IndexMap<OwnerId, usize>>,
    last_access: Instant,
    /// Requests still waiting for the in-flight load
    waiters: Vec<Sender<Arc<ChunkTexture>>>,
}

impl CacheEntry {
    fn add_owner(&mut self, owner: OwnerId) {
        if let Some(owners) = self.owners.as_mut() {
            *owners.entry(owner).or_insert(0) += 1;
        }
    }

    fn remove_owner(&mut self, owner: OwnerId) {
        let Some(owners) = self.owners.as_mut() else {
            return;
        };
        if let Some(count) = owners.get_mut(&owner) {
            *count -= 1;
            if *count == 0 {
                owners.shift_remove(&owner);
            }
        }
    }

    fn bytes(&self) -> u64 {
        self.texture.as_ref().map(|t| t.estimated_bytes()).unwrap_or(0)
    }
}

#[derive(Default)]
struct CacheInner {
    entries: IndexMap<String, CacheEntry>,
    in_flight: HashMap<LoadHandle, String>,
    last_summary: Option<Instant>,
}

/// One line of a cache summary
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySummary {
    pub address: String,
    pub ref_count: usize,
    pub bytes: u64,
    pub loading: bool,
    pub owners: Vec<(OwnerId, usize)>,
    pub idle: Duration,
}

/// Read-only snapshot for diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSummary {
    pub entries: Vec<EntrySummary>,
    pub total_bytes: u64,
}

impl CacheSummary {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared chunk cache plus the sequence-set registry
pub struct AssetCache {
    inner: Mutex<CacheInner>,
    sets: RwLock<SetRegistry>,
    loader: Arc<dyn ResourceLoader>,
    done_tx: Sender<LoadOutcome>,
    done_rx: Receiver<LoadOutcome>,
    stats: CacheStats,
    budget: Arc<MemoryBudget>,
    options: CacheOptions,
}

impl AssetCache {
    /// Cache with a memory budget derived from the machine's available memory
    pub fn new(loader: Arc<dyn ResourceLoader>, options: CacheOptions) -> Self {
        let budget = Arc::new(MemoryBudget::new(options.memory_fraction, options.reserve_gb));
        Self::with_budget(loader, options, budget)
    }

    pub fn with_budget(
        loader: Arc<dyn ResourceLoader>,
        options: CacheOptions,
        budget: Arc<MemoryBudget>,
    ) -> Self {
        let (done_tx, done_rx) = unbounded();
        debug!(
            "AssetCache created: track_owners={}, auto_log={}s",
            options.track_owners, options.auto_log_interval_secs
        );
        Self {
            inner: Mutex::new(CacheInner::default()),
            sets: RwLock::new(SetRegistry::new()),
            loader,
            done_tx,
            done_rx,
            stats: CacheStats::default(),
            budget,
            options,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Sequence sets =====

    /// Append a set; its id is its position in registration order
    pub fn register_set(&self, set: SequenceSet) -> Result<SetId, ConfigError> {
        let name = set.name.clone();
        let id = self.sets.write().unwrap_or_else(|e| e.into_inner()).register(set)?;
        info!("Registered sequence set {} '{}'", id, name);
        Ok(id)
    }

    /// Address of a zero-based chunk, `None` for an unknown set
    pub fn get_address(&self, set_id: SetId, chunk_index: usize) -> Option<String> {
        self.sets.read().unwrap_or_else(|e| e.into_inner()).address(set_id, chunk_index)
    }

    pub fn get_set(&self, set_id: SetId) -> Option<SequenceSet> {
        self.sets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(set_id)
            .map(|s| s.set.clone())
    }

    pub fn total_chunks(&self, set_id: SetId) -> usize {
        self.sets.read().unwrap_or_else(|e| e.into_inner()).total_chunks(set_id)
    }

    pub fn set_count(&self) -> usize {
        self.sets.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    // ===== Load / release =====

    /// Take one reference on `address`, starting a load if nobody holds it.
    pub fn load(&self, address: &str, owner: OwnerId) -> ChunkRequest {
        if address.is_empty() {
            warn!("AssetCache: load of empty address by {}", owner);
            return ChunkRequest::failed(address);
        }

        let (tx, rx) = bounded(1);
        let started = {
            let mut inner = self.lock();
            if let Some(entry) = inner.entries.get_mut(address) {
                entry.ref_count += 1;
                entry.last_access = Instant::now();
                entry.add_owner(owner);
                match &entry.texture {
                    Some(tex) => {
                        let _ = tx.send(Arc::clone(tex));
                    }
                    None => entry.waiters.push(tx),
                }
                CacheStats::bump(&self.stats.hits);
                trace!("Cache hit '{}' by {} (ref={})", address, owner, entry.ref_count);
                None
            } else {
                let handle = LoadHandle::next();
                let mut entry = CacheEntry {
                    handle,
                    texture: None,
                    ref_count: 1,
                    owners: self.options.track_owners.then(IndexMap::new),
                    last_access: Instant::now(),
                    waiters: vec![tx],
                };
                entry.add_owner(owner);
                inner.entries.insert(address.to_string(), entry);
                inner.in_flight.insert(handle, address.to_string());
                CacheStats::bump(&self.stats.misses);
                Some(handle)
            }
        };

        if let Some(handle) = started {
            debug!("Loading '{}' ({}) for {}", address, handle, owner);
            self.loader
                .load_async(handle, address, LoadCompletion::new(handle, self.done_tx.clone()));
        }

        ChunkRequest::waiting(address, rx)
    }

    /// Drop one reference. Frees the entry when the count reaches 0.
    pub fn release(&self, address: &str, owner: OwnerId) {
        let freed = {
            let mut inner = self.lock();
            let Some(entry) = inner.entries.get_mut(address) else {
                return;
            };
            entry.ref_count = entry.ref_count.saturating_sub(1);
            entry.last_access = Instant::now();
            entry.remove_owner(owner);
            trace!("Release '{}' by {} (ref={})", address, owner, entry.ref_count);

            if entry.ref_count == 0 {
                let entry = inner.entries.shift_remove(address);
                if let Some(e) = &entry {
                    inner.in_flight.remove(&e.handle);
                }
                entry
            } else {
                None
            }
        };

        if let Some(entry) = freed {
            self.free_entry(address, entry);
        }
    }

    /// Runs outside the lock
    fn free_entry(&self, address: &str, entry: CacheEntry) {
        let bytes = entry.bytes();
        let was_loading = entry.texture.is_none();
        self.loader.release(entry.handle);
        self.budget.free(bytes);
        CacheStats::bump(&self.stats.frees);
        debug!(
            "Freed '{}' ({}{})",
            address,
            human_mb(bytes),
            if was_loading { ", load still in flight" } else { "" }
        );
        // dropping `entry` disconnects any remaining waiters
    }

    /// Apply loader completions. Call once per loop iteration; players also
    /// call it before polling their requests.
    pub fn pump(&self) -> usize {
        let mut applied = 0;
        while let Ok((handle, result)) = self.done_rx.try_recv() {
            applied += 1;
            self.apply(handle, result);
        }
        applied
    }

    fn apply(&self, handle: LoadHandle, result: Result<ChunkTexture, super::error::LoadError>) {
        let mut inner = self.lock();
        let Some(address) = inner.in_flight.remove(&handle) else {
            trace!("Dropping result of untracked {}", handle);
            return;
        };

        match result {
            Ok(texture) => {
                let texture = Arc::new(texture);
                let bytes = texture.estimated_bytes();
                let Some(entry) = inner.entries.get_mut(&address) else {
                    return;
                };
                entry.texture = Some(Arc::clone(&texture));
                for waiter in entry.waiters.drain(..) {
                    let _ = waiter.send(Arc::clone(&texture));
                }
                let ref_count = entry.ref_count;
                drop(inner);

                self.budget.add(bytes);
                debug!(
                    "Loaded '{}': {} frames, ~{} (ref={})",
                    address,
                    texture.frame_count(),
                    human_mb(bytes),
                    ref_count
                );
            }
            Err(e) => {
                let entry = inner.entries.shift_remove(&address);
                drop(inner);

                error!("AssetCache: failed to load '{}' - {}", address, e);
                CacheStats::bump(&self.stats.failures);
                self.loader.release(handle);
                drop(entry);
            }
        }
    }

    /// Free entries whose count is 0 but which are somehow still present.
    /// Returns how many were removed.
    pub fn trim_unused(&self) -> usize {
        let removed: Vec<(String, CacheEntry)> = {
            let mut inner = self.lock();
            let dead: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.ref_count == 0)
                .map(|(addr, _)| addr.clone())
                .collect();
            dead.into_iter()
                .filter_map(|addr| {
                    let entry = inner.entries.shift_remove(&addr)?;
                    inner.in_flight.remove(&entry.handle);
                    Some((addr, entry))
                })
                .collect()
        };

        let count = removed.len();
        for (address, entry) in removed {
            self.free_entry(&address, entry);
        }
        info!("AssetCache trim_unused: removed {} entries", count);
        count
    }

    // ===== Introspection =====

    /// Current reference count (0 when absent)
    pub fn ref_count(&self, address: &str) -> usize {
        self.lock().entries.get(address).map(|e| e.ref_count).unwrap_or(0)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.lock().entries.contains_key(address)
    }

    /// True once the entry's load has completed
    pub fn is_loaded(&self, address: &str) -> bool {
        self.lock()
            .entries
            .get(address)
            .map(|e| e.texture.is_some())
            .unwrap_or(false)
    }

    /// Owners currently holding `address` with their reference counts
    pub fn owners(&self, address: &str) -> Vec<(OwnerId, usize)> {
        self.lock()
            .entries
            .get(address)
            .and_then(|e| e.owners.as_ref())
            .map(|o| o.iter().map(|(id, n)| (*id, *n)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Loads started but not yet applied
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn summary(&self) -> CacheSummary {
        let inner = self.lock();
        let now = Instant::now();
        let entries: Vec<EntrySummary> = inner
            .entries
            .iter()
            .map(|(address, e)| EntrySummary {
                address: address.clone(),
                ref_count: e.ref_count,
                bytes: e.bytes(),
                loading: e.texture.is_none(),
                owners: e
                    .owners
                    .as_ref()
                    .map(|o| o.iter().map(|(id, n)| (*id, *n)).collect())
                    .unwrap_or_default(),
                idle: now.saturating_duration_since(e.last_access),
            })
            .collect();
        let total_bytes = entries.iter().map(|e| e.bytes).sum();
        CacheSummary { entries, total_bytes }
    }

    pub fn log_summary(&self, detailed: bool) {
        let summary = self.summary();
        info!(
            "[AssetCache] CACHE: {} items, ~{} (hits={}, misses={}, failures={})",
            summary.len(),
            human_mb(summary.total_bytes),
            self.stats.hits(),
            self.stats.misses(),
            self.stats.failures()
        );
        if !detailed {
            return;
        }
        for (i, e) in summary.entries.iter().enumerate() {
            let owners = if e.owners.is_empty() {
                "-".to_string()
            } else {
                e.owners
                    .iter()
                    .map(|(id, n)| if *n > 1 { format!("{}x{}", id, n) } else { id.to_string() })
                    .collect::<Vec<_>>()
                    .join(",")
            };
            info!(
                "  {:02}. ref={}  size~{}  idle={:.1}s{}  addr='{}'  owners=[{}]",
                i + 1,
                e.ref_count,
                human_mb(e.bytes),
                e.idle.as_secs_f32(),
                if e.loading { "  (loading)" } else { "" },
                e.address,
                owners
            );
        }
    }

    /// Periodic summary, driven by the host loop
    pub fn tick_diagnostics(&self) {
        let interval = self.options.auto_log_interval_secs;
        if interval <= 0.0 {
            return;
        }
        let period = Duration::from_secs_f32(interval.max(MIN_AUTO_LOG_INTERVAL));
        let now = Instant::now();
        let due = {
            let mut inner = self.lock();
            match inner.last_summary {
                Some(last) if now.duration_since(last) < period => false,
                Some(_) => {
                    inner.last_summary = Some(now);
                    true
                }
                None => {
                    inner.last_summary = Some(now);
                    false
                }
            }
        };
        if due {
            self.log_summary(self.options.detailed_log);
        }
    }
}

impl Drop for AssetCache {
    fn drop(&mut self) {
        let inner = std::mem::take(&mut *self.lock());
        if !inner.entries.is_empty() {
            debug!("AssetCache teardown: releasing {} entries", inner.entries.len());
        }
        for (_, entry) in inner.entries {
            self.loader.release(entry.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoadError;
    use crate::core::test_support::{test_cache, ScriptedLoader};

    const A: &str = "fish/chunk00";
    const B: &str = "fish/chunk01";

    fn ready(request: &mut ChunkRequest) -> Arc<ChunkTexture> {
        match request.poll() {
            RequestState::Ready(tex) => tex,
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[test]
    fn test_refcount_tracks_load_and_release() {
        let loader = ScriptedLoader::manual(4);
        let cache = test_cache(&loader);
        let p1 = OwnerId(1);
        let p2 = OwnerId(2);

        let mut r1 = cache.load(A, p1);
        assert_eq!(cache.ref_count(A), 1);
        assert!(r1.poll().is_pending());

        loader.finish(A);
        cache.pump();
        ready(&mut r1);

        let mut r2 = cache.load(A, p2);
        ready(&mut r2);
        let mut r3 = cache.load(A, p1);
        ready(&mut r3);
        assert_eq!(cache.ref_count(A), 3);
        assert_eq!(cache.owners(A), vec![(p1, 2), (p2, 1)]);

        cache.release(A, p1);
        cache.release(A, p2);
        assert_eq!(cache.ref_count(A), 1);
        assert_eq!(loader.released_count(), 0);

        cache.release(A, p1);
        assert!(!cache.contains(A));
        assert_eq!(loader.released_count(), 1);

        // Extra releases are no-ops and never free twice
        cache.release(A, p1);
        assert_eq!(loader.released_count(), 1);
        assert_eq!(cache.stats().frees(), 1);
        assert_eq!(loader.calls(A), 1);
    }

    #[test]
    fn test_concurrent_loads_share_one_request() {
        let loader = ScriptedLoader::manual(7);
        let cache = test_cache(&loader);

        let mut requests: Vec<ChunkRequest> = (0..5).map(|i| cache.load(A, OwnerId(i))).collect();
        assert_eq!(loader.calls(A), 1);
        assert_eq!(cache.ref_count(A), 5);
        assert!(requests.iter_mut().all(|r| r.poll().is_pending()));

        loader.finish(A);
        assert_eq!(cache.pump(), 1);

        let textures: Vec<Arc<ChunkTexture>> = requests.iter_mut().map(ready).collect();
        assert!(textures.iter().all(|t| Arc::ptr_eq(t, &textures[0])));
        assert_eq!(textures[0].frame_count(), 7);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hits(), 4);
    }

    #[test]
    fn test_failed_load_fails_every_waiter_and_allows_retry() {
        let loader = ScriptedLoader::manual(4);
        let cache = test_cache(&loader);

        let mut r1 = cache.load(B, OwnerId(1));
        let mut r2 = cache.load(B, OwnerId(2));
        loader.fail(B);
        cache.pump();

        assert!(matches!(r1.poll(), RequestState::Failed));
        assert!(matches!(r2.poll(), RequestState::Failed));
        assert!(!cache.contains(B));
        assert_eq!(loader.released_count(), 1);
        assert_eq!(cache.stats().failures(), 1);

        let mut retry = cache.load(B, OwnerId(1));
        assert_eq!(loader.calls(B), 2);
        loader.finish(B);
        cache.pump();
        ready(&mut retry);
        assert_eq!(cache.ref_count(B), 1);
    }

    #[test]
    fn test_release_while_in_flight_drops_late_result() {
        let loader = ScriptedLoader::manual(4);
        let cache = test_cache(&loader);

        let mut request = cache.load(A, OwnerId(1));
        cache.release(A, OwnerId(1));
        assert!(!cache.contains(A));
        assert_eq!(loader.released_count(), 1);
        assert!(matches!(request.poll(), RequestState::Failed));

        loader.finish(A);
        assert_eq!(cache.pump(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.budget().resident(), 0);
    }

    #[test]
    fn test_poll_is_stable_once_resolved() {
        let loader = ScriptedLoader::immediate(2);
        let cache = test_cache(&loader);

        let mut request = cache.load(A, OwnerId(1));
        cache.pump();
        ready(&mut request);
        ready(&mut request);
        assert_eq!(request.address(), A);
    }

    #[test]
    fn test_empty_address_fails_without_entry() {
        let loader = ScriptedLoader::manual(4);
        let cache = test_cache(&loader);

        let mut request = cache.load("", OwnerId(1));
        assert!(matches!(request.poll(), RequestState::Failed));
        assert!(cache.is_empty());
        assert_eq!(loader.total_calls(), 0);
    }

    #[test]
    fn test_budget_follows_resident_textures() {
        let loader = ScriptedLoader::immediate(3);
        let cache = test_cache(&loader);

        let _r = cache.load(A, OwnerId(1));
        cache.pump();
        // ScriptedLoader textures are 8x8 Rgba8
        assert_eq!(cache.budget().resident(), 8 * 8 * 3 * 4);
        assert_eq!(cache.summary().total_bytes, 8 * 8 * 3 * 4);

        cache.release(A, OwnerId(1));
        assert_eq!(cache.budget().resident(), 0);
    }

    #[test]
    fn test_trim_unused_collects_orphaned_entries() {
        let loader = ScriptedLoader::immediate(2);
        let cache = test_cache(&loader);
        let _a = cache.load(A, OwnerId(1));
        let _b = cache.load(B, OwnerId(1));
        cache.pump();

        // Simulate a bookkeeping slip
        cache.lock().entries.get_mut(B).unwrap().ref_count = 0;

        assert_eq!(cache.trim_unused(), 1);
        assert!(cache.contains(A));
        assert!(!cache.contains(B));
        assert_eq!(cache.trim_unused(), 0);
    }

    #[test]
    fn test_summary_lists_owners_and_loading_entries() {
        let loader = ScriptedLoader::manual(2);
        let cache = test_cache(&loader);
        let _a = cache.load(A, OwnerId(3));
        let _b = cache.load(B, OwnerId(4));
        loader.finish(A);
        cache.pump();

        let summary = cache.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.entries[0].address, A);
        assert!(!summary.entries[0].loading);
        assert!(summary.entries[1].loading);
        assert_eq!(summary.entries[1].owners, vec![(OwnerId(4), 1)]);
        cache.log_summary(true);
    }

    #[test]
    fn test_owner_tracking_can_be_disabled() {
        let loader = ScriptedLoader::immediate(2);
        let options = CacheOptions {
            track_owners: false,
            ..Default::default()
        };
        let cache = AssetCache::with_budget(
            loader.clone(),
            options,
            Arc::new(MemoryBudget::with_limit(u64::MAX)),
        );
        let _a = cache.load(A, OwnerId(1));
        assert!(cache.owners(A).is_empty());
        assert_eq!(cache.ref_count(A), 1);
    }

    #[test]
    fn test_sets_and_addresses() {
        let loader = ScriptedLoader::manual(2);
        let cache = test_cache(&loader);
        let id = cache
            .register_set(SequenceSet {
                name: "Fish".into(),
                address_template: "fish/chunk{0:00}".into(),
                total_chunks: 3,
                start_at_zero: false,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(cache.get_address(id, 0).as_deref(), Some("fish/chunk01"));
        assert_eq!(cache.get_address(id + 1, 0), None);
        assert_eq!(cache.total_chunks(id), 3);
        assert_eq!(cache.set_count(), 1);
    }

    #[test]
    fn test_cancelled_result_for_released_handle_is_ignored() {
        let loader = ScriptedLoader::manual(2);
        let cache = test_cache(&loader);
        let _a = cache.load(A, OwnerId(1));
        cache.release(A, OwnerId(1));

        loader.complete_with(A, Err(LoadError::Cancelled));
        cache.pump();
        assert_eq!(cache.stats().failures(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_drop_releases_live_handles() {
        let loader = ScriptedLoader::immediate(2);
        {
            let cache = test_cache(&loader);
            let _a = cache.load(A, OwnerId(1));
            let _b = cache.load(B, OwnerId(1));
            cache.pump();
        }
        assert_eq!(loader.released_count(), 2);
    }
}
