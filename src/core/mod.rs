//! Core engine modules - cache, loaders, players, events
//!
//! Everything here is host-neutral: a host drives it by calling
//! `ChunkedPlayer::update` (or `Director::update`) once per frame.

pub mod asset_cache;
pub mod budget;
pub mod dir_source;
pub mod director;
pub mod error;
pub mod event_bus;
pub mod loader;
pub mod player;
pub mod prepare_delay;
pub mod sequence;
pub mod texture;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use asset_cache::{AssetCache, CacheOptions, CacheStats, ChunkRequest, OwnerId, RequestState};
pub use budget::MemoryBudget;
pub use dir_source::DirSource;
pub use director::{Director, DirectorSettings};
pub use error::{ConfigError, LoadError};
pub use event_bus::{EventBus, PlayerEvent, PlayerNotice};
pub use loader::{ChunkSource, LoadHandle, ResourceLoader, ThreadedLoader};
pub use player::{ChunkedPlayer, FrameView, PlaybackState, PlayerSettings};
pub use sequence::{SequenceSet, SetId};
pub use texture::{ChunkTexture, TextureFormat};
pub use workers::Workers;
