//! Chunked flipbook player: a playback cursor over one sequence set
//!
//! **Architecture**: the player does NOT own the cache. It receives an
//! `Arc<AssetCache>` at construction and takes one cache reference per chunk it
//! holds (current, look-ahead next, preserved), tagged with its own `OwnerId`.
//!
//! # Timing Model
//!
//! FPS-based: `update(dt)` accumulates time and steps whole frames; `tick()`
//! steps exactly one. If the next chunk is not loaded at a chunk boundary the
//! last frame of the previous chunk stays on screen until it lands.
//!
//! # Async Model
//!
//! Every chunk request is a [`ChunkRequest`] kept in `pending` together with the
//! generation it was issued under. Prepare, stop, set change and disable bump
//! the generation; a request that resolves under an older generation is
//! discarded and its reference released. Requests are resolved at the start of
//! each update and right after being issued, so synchronous loaders behave
//! synchronously.
//!
//! # Chunk Lifecycle
//!
//! ```text
//! prepare:   load(chunk 0)                      -> current
//! preload:   remaining <= threshold, load(next) -> next
//! boundary:  next ready ? promote : load(target) and hold last frame
//!            release(old current)
//! ```

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::asset_cache::{AssetCache, ChunkRequest, OwnerId, RequestState};
use super::error::ConfigError;
use super::event_bus::{EventEmitter, PlayerEmitter, PlayerEvent};
use super::prepare_delay::{DeferredPrepare, PrepareDelay};
use super::sequence::SetId;
use super::texture::ChunkTexture;

/// Per-player tuning. `fps` and `frames_per_chunk` are replaced by the set's
/// values when those are positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub set_id: SetId,
    pub fps: u32,
    /// Nominal frame count, used until a chunk's real count is known
    pub frames_per_chunk: usize,
    pub loop_playback: bool,
    /// Start loading the next chunk when this many frames (or fewer) remain
    pub preload_threshold_frames: usize,
    pub emit_every_frame: bool,
    pub auto_load_on_enable: bool,
    pub auto_play_on_enable: bool,
    pub initial_delay_min_ms: u64,
    pub initial_delay_max_ms: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            set_id: 0,
            fps: 30,
            frames_per_chunk: 120,
            loop_playback: true,
            preload_threshold_frames: 30,
            emit_every_frame: false,
            auto_load_on_enable: true,
            auto_play_on_enable: true,
            initial_delay_min_ms: 0,
            initial_delay_max_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Preparing,
    Playing,
    Paused,
    Finished,
}

/// What the presentation layer should draw this tick
#[derive(Debug, Clone)]
pub struct FrameView {
    pub texture: Arc<ChunkTexture>,
    /// Layer within the chunk texture
    pub layer: usize,
    pub chunk_index: usize,
    pub global_frame: usize,
}

/// A chunk this player holds one cache reference on
#[derive(Debug, Clone)]
struct HeldChunk {
    index: usize,
    address: String,
    texture: Arc<ChunkTexture>,
    frames: usize,
}

/// Chunk kept on screen by `stop_preserving_frame`
#[derive(Debug)]
struct PreservedChunk {
    chunk: HeldChunk,
    layer: usize,
    global_frame: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPurpose {
    Prepare,
    Preload,
    /// Boundary load the player is stalled on
    Switch,
}

#[derive(Debug)]
struct PendingLoad {
    purpose: LoadPurpose,
    generation: u64,
    chunk_index: usize,
    request: ChunkRequest,
}

pub struct ChunkedPlayer {
    id: OwnerId,
    cache: Arc<AssetCache>,
    events: PlayerEmitter,
    settings: PlayerSettings,

    state: PlaybackState,
    generation: u64,

    current: Option<HeldChunk>,
    next: Option<HeldChunk>,
    preserved: Option<PreservedChunk>,
    pending: Vec<PendingLoad>,

    chunk_index: usize,
    frame_in_chunk: usize,
    chunk_frames: HashMap<usize, usize>,
    accum: f32,

    play_after_prepare: bool,
    /// Chunk the player is waiting for at a boundary
    stalled: Option<usize>,
    /// Preload of this chunk failed; the boundary load takes over
    failed_preload: Option<usize>,
    /// Show the freshly landed frame 0 for one step before advancing
    hold_tick: bool,
    started_raised: bool,
    last_emitted_global: Option<usize>,
    delay: PrepareDelay,
}

impl ChunkedPlayer {
    pub fn new(cache: Arc<AssetCache>, settings: PlayerSettings) -> Self {
        let id = OwnerId::next();
        let delay = PrepareDelay::new(settings.initial_delay_min_ms, settings.initial_delay_max_ms);
        debug!("Player {} created for set {}", id, settings.set_id);

        let mut player = Self {
            id,
            cache,
            events: PlayerEmitter::dummy(id),
            settings,
            state: PlaybackState::Idle,
            generation: 0,
            current: None,
            next: None,
            preserved: None,
            pending: Vec::new(),
            chunk_index: 0,
            frame_in_chunk: 0,
            chunk_frames: HashMap::new(),
            accum: 0.0,
            play_after_prepare: false,
            stalled: None,
            failed_preload: None,
            hold_tick: false,
            started_raised: false,
            last_emitted_global: None,
            delay,
        };
        player.apply_set_overrides();
        player
    }

    pub fn set_event_emitter(&mut self, emitter: EventEmitter) {
        self.events = PlayerEmitter::new(self.id, emitter);
    }

    // === Accessors ===

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Chunk 0 (or later) is loaded and presentable
    pub fn is_prepared(&self) -> bool {
        self.current.is_some()
            && matches!(
                self.state,
                PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Finished
            )
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn set_id(&self) -> SetId {
        self.settings.set_id
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn frame_in_chunk(&self) -> usize {
        self.frame_in_chunk
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_address(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.address.as_str())
    }

    /// Address of the ready look-ahead chunk
    pub fn next_address(&self) -> Option<&str> {
        self.next.as_ref().map(|c| c.address.as_str())
    }

    /// Waiting at a chunk boundary for the next chunk
    pub fn is_stalled(&self) -> bool {
        self.stalled.is_some()
    }

    /// Requests issued and not yet resolved
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Frame index over the whole set. Chunks not loaded yet count as
    /// `frames_per_chunk`.
    pub fn global_frame(&self) -> usize {
        (0..self.chunk_index).map(|i| self.frames_in_chunk(i)).sum::<usize>() + self.frame_in_chunk
    }

    pub fn frame_view(&self) -> Option<FrameView> {
        if let Some(current) = &self.current {
            return Some(FrameView {
                texture: Arc::clone(&current.texture),
                layer: self.frame_in_chunk.min(current.frames - 1),
                chunk_index: current.index,
                global_frame: self.global_frame(),
            });
        }
        self.preserved.as_ref().map(|p| FrameView {
            texture: Arc::clone(&p.chunk.texture),
            layer: p.layer,
            chunk_index: p.chunk.index,
            global_frame: p.global_frame,
        })
    }

    // === Public controls ===

    /// Prepare if needed and play. Restarts from chunk 0 when finished.
    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Idle => self.start_prepare(true),
            PlaybackState::Preparing => self.play_after_prepare = true,
            PlaybackState::Paused => {
                self.state = PlaybackState::Playing;
                self.events.emit(PlayerEvent::Played);
            }
            PlaybackState::Playing => {}
            PlaybackState::Finished => self.restart(),
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.events.emit(PlayerEvent::Paused);
        }
    }

    /// Release every chunk and return to `Idle`
    pub fn stop(&mut self) {
        self.stop_internal(false);
    }

    /// Like `stop`, but the current chunk stays presentable until the next
    /// successful prepare
    pub fn stop_preserving_frame(&mut self) {
        self.stop_internal(true);
    }

    /// Switch to `set_id` and prepare its chunk 0. A no-op (apart from
    /// `play_after`) if already prepared or preparing on that set.
    pub fn preload_set(&mut self, set_id: SetId, play_after: bool) {
        let same_set = self.settings.set_id == set_id;
        if same_set && self.state == PlaybackState::Preparing {
            self.play_after_prepare |= play_after;
            return;
        }
        if same_set && self.is_prepared() {
            if play_after {
                self.play();
            }
            return;
        }

        if self.state == PlaybackState::Preparing {
            debug!("Player {}: prepare of set {} superseded by set {}", self.id, self.settings.set_id, set_id);
        }
        self.generation += 1;
        self.delay.cancel();
        self.release_preserved();
        self.release_chunks();
        self.chunk_frames.clear();
        self.reset_playback();
        self.state = PlaybackState::Idle;

        self.settings.set_id = set_id;
        self.apply_set_overrides();
        self.start_prepare(play_after);
    }

    /// Play `set_id`, preparing it first unless it is already prepared
    pub fn play_set(&mut self, set_id: SetId) {
        if self.settings.set_id == set_id && self.is_prepared() {
            self.play();
        } else {
            self.preload_set(set_id, true);
        }
    }

    /// Apply the auto load / auto play settings, after the random initial
    /// delay when one is configured
    pub fn enable(&mut self) {
        self.apply_set_overrides();
        let play_after = self.settings.auto_play_on_enable;
        if !(self.settings.auto_load_on_enable || play_after) {
            return;
        }

        self.delay = PrepareDelay::new(
            self.settings.initial_delay_min_ms,
            self.settings.initial_delay_max_ms,
        );
        if self.delay.is_zero() {
            self.run_deferred_prepare(DeferredPrepare { play_after });
        } else {
            let wait = self.delay.schedule(DeferredPrepare { play_after });
            debug!("Player {}: initial prepare in {}ms", self.id, wait.as_millis());
        }
    }

    /// Release everything this player holds, in-flight requests included
    pub fn disable(&mut self) {
        self.generation += 1;
        self.delay.cancel();

        for mut load in std::mem::take(&mut self.pending) {
            match load.request.poll() {
                RequestState::Failed => {}
                RequestState::Ready(_) | RequestState::Pending => {
                    self.cache.release(load.request.address(), self.id)
                }
            }
        }
        self.release_preserved();
        self.release_chunks();
        self.chunk_frames.clear();
        self.reset_playback();
        self.state = PlaybackState::Idle;
        trace!("Player {} disabled", self.id);
    }

    /// Advance by wall-clock time at the player's fps
    pub fn update(&mut self, dt: f32) {
        self.poll_loads();
        if self.state != PlaybackState::Playing || self.current.is_none() || self.settings.fps == 0 {
            return;
        }
        self.raise_started();

        self.accum += dt.max(0.0);
        let frame_time = 1.0 / self.settings.fps as f32;
        while self.accum >= frame_time && self.state == PlaybackState::Playing {
            self.accum -= frame_time;
            self.step_frame();
        }
        self.emit_frame_changed();
    }

    /// Advance exactly one frame
    pub fn tick(&mut self) {
        self.poll_loads();
        if self.state != PlaybackState::Playing || self.current.is_none() {
            return;
        }
        self.raise_started();
        self.step_frame();
        self.emit_frame_changed();
    }

    // === Playback internals ===

    fn poll_loads(&mut self) {
        self.cache.pump();
        self.resolve_pending();
        if let Some(action) = self.delay.tick() {
            self.run_deferred_prepare(action);
        }
    }

    /// Auto prepare from `enable`; an explicit prepare or play wins
    fn run_deferred_prepare(&mut self, action: DeferredPrepare) {
        if self.state == PlaybackState::Preparing || self.is_prepared() {
            trace!("Player {}: auto prepare skipped, already {:?}", self.id, self.state);
            return;
        }
        self.start_prepare(action.play_after);
    }

    fn raise_started(&mut self) {
        if !self.started_raised {
            self.started_raised = true;
            self.events.emit(PlayerEvent::Started);
        }
    }

    fn emit_frame_changed(&mut self) {
        if !self.settings.emit_every_frame {
            return;
        }
        let global = self.global_frame();
        if self.last_emitted_global != Some(global) {
            self.last_emitted_global = Some(global);
            let layer = self.frame_in_chunk.min(self.frames_in_current() - 1);
            self.events.emit(PlayerEvent::FrameChanged {
                global,
                chunk: self.chunk_index,
                layer,
            });
        }
    }

    fn step_frame(&mut self) {
        if std::mem::take(&mut self.hold_tick) {
            return;
        }
        if let Some(target) = self.stalled {
            // Hold the last frame; retry if the boundary load failed
            if !self.has_pending(LoadPurpose::Switch) {
                self.begin_switch(target);
            }
            return;
        }

        let total = self.total_chunks();
        let frames = self.frames_in_current();
        self.frame_in_chunk += 1;
        trace!(
            "Player {}: chunk {} frame {}/{}",
            self.id, self.chunk_index, self.frame_in_chunk, frames
        );

        if self.frame_in_chunk >= frames && !self.advance_chunk(total, frames) {
            return;
        }
        self.maybe_preload(total);
    }

    /// Returns true if playback continues on the new chunk right away
    fn advance_chunk(&mut self, total: usize, frames: usize) -> bool {
        let was_last = self.chunk_index + 1 >= total;
        self.frame_in_chunk = frames - 1;

        if was_last && !self.settings.loop_playback {
            self.state = PlaybackState::Finished;
            info!("Player {} finished set {}", self.id, self.settings.set_id);
            self.events.emit(PlayerEvent::Finished);
            return false;
        }

        let target = if was_last { 0 } else { self.chunk_index + 1 };
        if was_last {
            self.events.emit(PlayerEvent::Loop);
        }
        self.begin_switch(target)
    }

    /// Move to `target`: promote the ready next chunk, adopt an in-flight
    /// preload, or issue a boundary load. Returns true once switched.
    fn begin_switch(&mut self, target: usize) -> bool {
        if let Some(next) = self.next.take() {
            if next.index == target {
                self.install_current(next);
                return true;
            }
            self.cache.release(&next.address, self.id);
        }

        self.stalled = Some(target);
        let generation = self.generation;
        let adopted = self
            .pending
            .iter_mut()
            .find(|p| {
                p.purpose == LoadPurpose::Preload && p.generation == generation && p.chunk_index == target
            })
            .map(|p| p.purpose = LoadPurpose::Switch)
            .is_some();

        if !adopted {
            let Some(address) = self.cache.get_address(self.settings.set_id, target) else {
                self.raise_error(ConfigError::UnknownSet(self.settings.set_id).to_string(), None);
                return false;
            };
            debug!("Player {}: boundary load of chunk {} '{}'", self.id, target, address);
            self.issue(LoadPurpose::Switch, target, address);
        }

        self.cache.pump();
        self.resolve_pending();
        self.hold_tick = false;
        self.stalled.is_none()
    }

    fn maybe_preload(&mut self, total: usize) {
        let remaining = self.frames_in_current().saturating_sub(self.frame_in_chunk);
        if remaining > self.settings.preload_threshold_frames {
            return;
        }
        if !self.settings.loop_playback && self.chunk_index + 1 >= total {
            return;
        }

        let wanted = (self.chunk_index + 1) % total;
        if self.failed_preload == Some(wanted) {
            return;
        }
        if self.next.as_ref().is_some_and(|n| n.index == wanted) {
            return;
        }
        let generation = self.generation;
        if self
            .pending
            .iter()
            .any(|p| p.generation == generation && p.purpose != LoadPurpose::Prepare)
        {
            return;
        }

        if let Some(stale) = self.next.take() {
            self.cache.release(&stale.address, self.id);
        }
        let Some(address) = self.cache.get_address(self.settings.set_id, wanted) else {
            return;
        };

        debug!("Player {}: preloading chunk {} '{}'", self.id, wanted, address);
        self.events.emit(PlayerEvent::PreloadStarted(wanted));
        self.issue(LoadPurpose::Preload, wanted, address);
        self.cache.pump();
        self.resolve_pending();
    }

    fn restart(&mut self) {
        debug!("Player {} restarting set {}", self.id, self.settings.set_id);
        self.accum = 0.0;
        self.started_raised = false;
        self.last_emitted_global = None;
        self.state = PlaybackState::Playing;
        self.events.emit(PlayerEvent::Played);

        if self.chunk_index == 0 {
            self.frame_in_chunk = 0;
        } else {
            self.begin_switch(0);
        }
    }

    fn start_prepare(&mut self, play_after: bool) {
        self.delay.cancel();
        if self.state == PlaybackState::Preparing {
            self.play_after_prepare |= play_after;
            return;
        }

        let set_id = self.settings.set_id;
        let Some(address) = self.cache.get_address(set_id, 0) else {
            self.state = PlaybackState::Idle;
            self.raise_error(ConfigError::UnknownSet(set_id).to_string(), None);
            return;
        };

        self.generation += 1;
        self.state = PlaybackState::Preparing;
        self.play_after_prepare = play_after;
        self.chunk_index = 0;
        self.frame_in_chunk = 0;
        self.accum = 0.0;
        self.stalled = None;
        self.failed_preload = None;
        debug!("Player {}: preparing set {} from '{}'", self.id, set_id, address);

        self.issue(LoadPurpose::Prepare, 0, address);
        self.cache.pump();
        self.resolve_pending();
        self.hold_tick = false;
    }

    fn stop_internal(&mut self, preserve_frame: bool) {
        let was_running = self.is_prepared();
        self.generation += 1;
        self.delay.cancel();

        if preserve_frame && self.current.is_some() {
            let layer = self.frame_view().map(|v| (v.layer, v.global_frame));
            if let (Some(chunk), Some((layer, global_frame))) = (self.current.take(), layer) {
                self.release_preserved();
                self.preserved = Some(PreservedChunk {
                    chunk,
                    layer,
                    global_frame,
                });
            }
        } else {
            self.release_preserved();
        }
        self.release_chunks();
        self.chunk_frames.clear();
        self.reset_playback();
        self.state = PlaybackState::Idle;

        if was_running {
            self.events.emit(PlayerEvent::Stopped);
        }
    }

    fn reset_playback(&mut self) {
        self.chunk_index = 0;
        self.frame_in_chunk = 0;
        self.accum = 0.0;
        self.play_after_prepare = false;
        self.stalled = None;
        self.failed_preload = None;
        self.hold_tick = false;
        self.started_raised = false;
        self.last_emitted_global = None;
    }

    fn apply_set_overrides(&mut self) {
        let Some(set) = self.cache.get_set(self.settings.set_id) else {
            return;
        };
        if set.fps > 0 {
            self.settings.fps = set.fps;
        }
        if set.frames_per_chunk > 0 {
            self.settings.frames_per_chunk = set.frames_per_chunk;
        }
    }

    // === Chunk bookkeeping ===

    fn total_chunks(&self) -> usize {
        self.cache.total_chunks(self.settings.set_id).max(1)
    }

    fn frames_in_chunk(&self, chunk_index: usize) -> usize {
        self.chunk_frames
            .get(&chunk_index)
            .copied()
            .unwrap_or(self.settings.frames_per_chunk)
            .max(1)
    }

    fn frames_in_current(&self) -> usize {
        match &self.current {
            Some(c) if c.index == self.chunk_index => c.frames,
            _ => self.frames_in_chunk(self.chunk_index),
        }
    }

    fn register_frames(&mut self, chunk_index: usize, texture: &ChunkTexture) -> usize {
        let frames = texture.frame_count();
        self.chunk_frames.insert(chunk_index, frames);
        frames
    }

    fn has_pending(&self, purpose: LoadPurpose) -> bool {
        self.pending
            .iter()
            .any(|p| p.purpose == purpose && p.generation == self.generation)
    }

    fn issue(&mut self, purpose: LoadPurpose, chunk_index: usize, address: String) {
        let request = self.cache.load(&address, self.id);
        self.pending.push(PendingLoad {
            purpose,
            generation: self.generation,
            chunk_index,
            request,
        });
    }

    fn release_chunks(&mut self) {
        if let Some(next) = self.next.take() {
            self.cache.release(&next.address, self.id);
        }
        if let Some(current) = self.current.take() {
            self.cache.release(&current.address, self.id);
        }
    }

    fn release_preserved(&mut self) {
        if let Some(p) = self.preserved.take() {
            self.cache.release(&p.chunk.address, self.id);
        }
    }

    /// Make `chunk` current, releasing the previous one
    fn install_current(&mut self, chunk: HeldChunk) {
        self.release_preserved();
        if let Some(old) = self.current.take() {
            self.cache.release(&old.address, self.id);
        }

        let changed = chunk.index != self.chunk_index;
        debug!(
            "Player {}: chunk {} -> {} '{}' ({} frames)",
            self.id, self.chunk_index, chunk.index, chunk.address, chunk.frames
        );
        self.chunk_index = chunk.index;
        self.frame_in_chunk = 0;
        self.current = Some(chunk);
        self.stalled = None;
        self.failed_preload = None;

        if changed {
            self.events.emit(PlayerEvent::ChunkChanged(self.chunk_index));
        }
    }

    // === Request resolution ===

    fn resolve_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut waiting = Vec::new();
        for mut load in std::mem::take(&mut self.pending) {
            match load.request.poll() {
                RequestState::Pending => waiting.push(load),
                outcome => self.finish_load(load, outcome),
            }
        }
        waiting.append(&mut self.pending);
        self.pending = waiting;
    }

    fn finish_load(&mut self, load: PendingLoad, outcome: RequestState) {
        let address = load.request.address().to_string();
        let index = load.chunk_index;

        if load.generation != self.generation {
            if let RequestState::Ready(_) = outcome {
                self.cache.release(&address, self.id);
            }
            trace!(
                "Player {}: discarded stale {:?} of '{}' (generation {} != {})",
                self.id, load.purpose, address, load.generation, self.generation
            );
            return;
        }

        match (load.purpose, outcome) {
            (_, RequestState::Pending) => {}
            (LoadPurpose::Prepare, RequestState::Ready(texture)) => {
                self.on_prepared(index, address, texture)
            }
            (LoadPurpose::Prepare, RequestState::Failed) => {
                self.state = PlaybackState::Idle;
                self.play_after_prepare = false;
                self.raise_error(format!("Failed to load first chunk: '{}'", address), Some(address));
            }
            (LoadPurpose::Preload, RequestState::Ready(texture)) => {
                self.on_preloaded(index, address, texture)
            }
            (LoadPurpose::Preload, RequestState::Failed) => {
                warn!("Player {}: preload of chunk {} failed", self.id, index);
                self.failed_preload = Some(index);
                self.events.emit(PlayerEvent::PreloadFailed {
                    chunk: index,
                    message: format!("Failed to load '{}'", address),
                });
            }
            (LoadPurpose::Switch, RequestState::Ready(texture)) => {
                let frames = self.register_frames(index, &texture);
                self.install_current(HeldChunk {
                    index,
                    address,
                    texture,
                    frames,
                });
                self.hold_tick = true;
            }
            (LoadPurpose::Switch, RequestState::Failed) => {
                self.raise_error(format!("Failed to load chunk: '{}'", address), Some(address));
            }
        }
    }

    fn on_prepared(&mut self, index: usize, address: String, texture: Arc<ChunkTexture>) {
        self.release_preserved();
        if let Some(old) = self.current.take() {
            self.cache.release(&old.address, self.id);
        }

        let frames = self.register_frames(index, &texture);
        info!(
            "Player {}: prepared set {} ('{}', {} frames)",
            self.id, self.settings.set_id, address, frames
        );
        self.current = Some(HeldChunk {
            index,
            address,
            texture,
            frames,
        });
        self.chunk_index = index;
        self.frame_in_chunk = 0;
        self.state = if self.play_after_prepare {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        self.hold_tick = self.state == PlaybackState::Playing;
        self.play_after_prepare = false;

        self.events.emit(PlayerEvent::PrepareCompleted);
        self.events.emit(PlayerEvent::FirstFrameReady);
    }

    fn on_preloaded(&mut self, index: usize, address: String, texture: Arc<ChunkTexture>) {
        let wanted = (self.chunk_index + 1) % self.total_chunks();
        if index != wanted || self.next.is_some() {
            trace!("Player {}: preloaded chunk {} no longer wanted", self.id, index);
            self.cache.release(&address, self.id);
            return;
        }

        let frames = self.register_frames(index, &texture);
        self.next = Some(HeldChunk {
            index,
            address,
            texture,
            frames,
        });
        self.events.emit(PlayerEvent::PreloadReady(index));
    }

    fn raise_error(&mut self, message: String, address: Option<String>) {
        warn!("Player {}: {}", self.id, message);
        self.events.emit(PlayerEvent::Error { message, address });
    }
}

impl Drop for ChunkedPlayer {
    fn drop(&mut self) {
        if self.current.is_some() || self.next.is_some() || self.preserved.is_some() || !self.pending.is_empty() {
            self.disable();
        }
    }
}
