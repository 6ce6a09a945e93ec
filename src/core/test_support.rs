//! Scripted loader and fixtures shared by the cache, player and director tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::asset_cache::{AssetCache, CacheOptions};
use super::budget::MemoryBudget;
use super::error::LoadError;
use super::loader::{LoadCompletion, LoadHandle, ResourceLoader};
use super::sequence::{SequenceSet, SetId};
use super::texture::{ChunkTexture, TextureFormat};

/// Loader whose completions are driven by the test.
///
/// In manual mode every request waits until `finish`/`fail`; in immediate
/// mode it completes inside `load_async` (still applied only on `pump`).
/// Textures are 8x8 RGBA8 with a per-address frame count.
pub(crate) struct ScriptedLoader {
    immediate: bool,
    default_frames: u32,
    frames: Mutex<HashMap<String, u32>>,
    failing: Mutex<HashSet<String>>,
    pending: Mutex<Vec<(String, LoadCompletion)>>,
    calls: Mutex<Vec<String>>,
    released: Mutex<Vec<LoadHandle>>,
}

impl ScriptedLoader {
    fn build(immediate: bool, default_frames: u32) -> Arc<Self> {
        Arc::new(Self {
            immediate,
            default_frames,
            frames: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            pending: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        })
    }

    pub fn manual(default_frames: u32) -> Arc<Self> {
        Self::build(false, default_frames)
    }

    pub fn immediate(default_frames: u32) -> Arc<Self> {
        Self::build(true, default_frames)
    }

    pub fn set_frames(&self, address: &str, frames: u32) {
        self.frames.lock().unwrap().insert(address.to_string(), frames);
    }

    /// Immediate mode: make every load of `address` fail
    pub fn fail_always(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn heal(&self, address: &str) {
        self.failing.lock().unwrap().remove(address);
    }

    fn texture_for(&self, address: &str) -> ChunkTexture {
        let frames = self
            .frames
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(self.default_frames);
        ChunkTexture::empty(8, 8, frames, TextureFormat::Rgba8)
    }

    /// Complete the oldest pending request for `address`
    pub fn complete_with(&self, address: &str, result: Result<ChunkTexture, LoadError>) -> bool {
        let done = {
            let mut pending = self.pending.lock().unwrap();
            pending
                .iter()
                .position(|(a, _)| a == address)
                .map(|i| pending.remove(i).1)
        };
        match done {
            Some(done) => {
                done.complete(result);
                true
            }
            None => false,
        }
    }

    pub fn finish(&self, address: &str) -> bool {
        self.complete_with(address, Ok(self.texture_for(address)))
    }

    pub fn fail(&self, address: &str) -> bool {
        self.complete_with(address, Err(LoadError::NotFound(address.to_string())))
    }

    pub fn finish_all(&self) -> usize {
        let drained: Vec<(String, LoadCompletion)> = self.pending.lock().unwrap().drain(..).collect();
        let count = drained.len();
        for (address, done) in drained {
            done.complete(Ok(self.texture_for(&address)));
        }
        count
    }

    pub fn calls(&self, address: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|a| *a == address).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn released_count(&self) -> usize {
        self.released.lock().unwrap().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_pending(&self, address: &str) -> bool {
        self.pending.lock().unwrap().iter().any(|(a, _)| a == address)
    }
}

impl ResourceLoader for ScriptedLoader {
    fn load_async(&self, _handle: LoadHandle, address: &str, done: LoadCompletion) {
        self.calls.lock().unwrap().push(address.to_string());
        if !self.immediate {
            self.pending.lock().unwrap().push((address.to_string(), done));
            return;
        }
        if self.failing.lock().unwrap().contains(address) {
            done.complete(Err(LoadError::NotFound(address.to_string())));
        } else {
            done.complete(Ok(self.texture_for(address)));
        }
    }

    fn release(&self, handle: LoadHandle) {
        self.released.lock().unwrap().push(handle);
    }
}

/// Cache over `loader` with an unlimited budget
pub(crate) fn test_cache(loader: &Arc<ScriptedLoader>) -> Arc<AssetCache> {
    Arc::new(AssetCache::with_budget(
        loader.clone(),
        CacheOptions::default(),
        Arc::new(MemoryBudget::with_limit(u64::MAX)),
    ))
}

/// Register a `name/c{0}` set
pub(crate) fn register_set(
    cache: &AssetCache,
    name: &str,
    total_chunks: usize,
    frames_per_chunk: usize,
) -> SetId {
    cache
        .register_set(SequenceSet {
            name: name.to_string(),
            address_template: format!("{}/c{{0}}", name),
            total_chunks,
            fps: 30,
            frames_per_chunk,
            start_at_zero: true,
        })
        .unwrap()
}
