//! FLIPBOOK - Chunked flipbook playback library
//!
//! Re-exports all modules for use by the binary target.

// Core engine (cache, loaders, players, events)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod runner;

// Re-export commonly used types from core
pub use core::asset_cache::{AssetCache, CacheOptions, OwnerId};
pub use core::director::Director;
pub use core::event_bus::{EventBus, PlayerEvent};
pub use core::player::{ChunkedPlayer, PlaybackState, PlayerSettings};
pub use core::sequence::SequenceSet;
