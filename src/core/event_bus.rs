//! Player event bus.
//!
//! Two delivery modes working together:
//! - subscribers are called synchronously inside `emit()`
//! - every notice is also queued for the host loop to `poll()`
//!
//! Subscribers run on the loop thread in subscription order. They must not
//! call back into the emitting player.

use log::warn;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

use super::asset_cache::OwnerId;

/// Maximum notices in queue before the oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Lifecycle and playback notifications raised by a `ChunkedPlayer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Chunk 0 is loaded and presentable
    PrepareCompleted,
    /// The first frame of a fresh prepare is visible
    FirstFrameReady,
    /// First playing tick after a prepare or a restart
    Started,
    ChunkChanged(usize),
    /// Only raised with `emit_every_frame`
    FrameChanged { global: usize, chunk: usize, layer: usize },
    PreloadStarted(usize),
    PreloadReady(usize),
    PreloadFailed { chunk: usize, message: String },
    Loop,
    Finished,
    Error { message: String, address: Option<String> },
    Played,
    Paused,
    Stopped,
}

/// An event tagged with the player that raised it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerNotice {
    pub player: OwnerId,
    pub event: PlayerEvent,
}

type Callback = Arc<dyn Fn(&PlayerNotice) + Send + Sync>;
type Subscribers = Arc<RwLock<Vec<Callback>>>;
type Queue = Arc<Mutex<VecDeque<PlayerNotice>>>;

fn deliver(subscribers: &Subscribers, queue: &Queue, notice: PlayerNotice) {
    for cb in subscribers.read().unwrap_or_else(|e| e.into_inner()).iter() {
        cb(&notice);
    }

    let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
    if queue.len() >= MAX_QUEUE_SIZE {
        let evict_count = queue.len() / 2;
        warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
        queue.drain(0..evict_count);
    }
    queue.push_back(notice);
}

/// Pub/sub bus for [`PlayerNotice`]s.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Subscribers,
    queue: Queue,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every emitted notice.
    ///
    /// # Example
    /// ```ignore
    /// bus.subscribe(|n| {
    ///     if n.event == PlayerEvent::Finished {
    ///         log::info!("{} finished", n.player);
    ///     }
    /// });
    /// ```
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&PlayerNotice) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
    }

    pub fn emit(&self, notice: PlayerNotice) {
        deliver(&self.subscribers, &self.queue, notice);
    }

    /// All notices emitted since the last poll, oldest first
    pub fn poll(&self) -> Vec<PlayerNotice> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    /// Handle for passing to players
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            subscribers: Arc::clone(&self.subscribers),
            queue: Arc::clone(&self.queue),
        }
    }

    /// Clear all subscribers and queue
    pub fn clear(&self) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Cloneable emitting half of an [`EventBus`]
#[derive(Clone)]
pub struct EventEmitter {
    subscribers: Subscribers,
    queue: Queue,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .field("queue_len", &self.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    pub fn emit(&self, notice: PlayerNotice) {
        deliver(&self.subscribers, &self.queue, notice);
    }
}

/// Per-player emitter: tags events with the player id (no-op if dummy)
#[derive(Clone, Debug)]
pub struct PlayerEmitter {
    player: OwnerId,
    inner: Option<EventEmitter>,
}

impl PlayerEmitter {
    /// Emitter that drops everything
    pub fn dummy(player: OwnerId) -> Self {
        Self { player, inner: None }
    }

    pub fn new(player: OwnerId, emitter: EventEmitter) -> Self {
        Self {
            player,
            inner: Some(emitter),
        }
    }

    pub fn emit(&self, event: PlayerEvent) {
        if let Some(ref emitter) = self.inner {
            emitter.emit(PlayerNotice {
                player: self.player,
                event,
            });
        }
    }
}
