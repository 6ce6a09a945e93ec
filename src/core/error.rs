//! Error types shared by the cache, loaders and players.
//!
//! Neither error crosses the cache/player boundary as control flow: loaders
//! hand `LoadError` back through a completion, players turn both kinds into
//! `PlayerEvent::Error` notifications.

use super::sequence::SetId;

/// Sequence-set definition or lookup problems
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownSet(SetId),
    InvalidSet { name: String, reason: String },
    Template { template: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownSet(id) => write!(f, "Unknown sequence set id {}", id),
            ConfigError::InvalidSet { name, reason } => {
                write!(f, "Invalid sequence set '{}': {}", name, reason)
            }
            ConfigError::Template { template, reason } => {
                write!(f, "Malformed address template '{}': {}", template, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Chunk loading errors reported by a `ResourceLoader` or `ChunkSource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    NotFound(String),
    Decode(String),
    Empty(String),
    InconsistentFrames {
        address: String,
        expected: (u32, u32),
        found: (u32, u32),
        frame: usize,
    },
    /// The handle was released before the load started
    Cancelled,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::NotFound(addr) => write!(f, "Chunk not found: {}", addr),
            LoadError::Decode(msg) => write!(f, "Decode error: {}", msg),
            LoadError::Empty(addr) => write!(f, "Chunk has no frames: {}", addr),
            LoadError::InconsistentFrames { address, expected, found, frame } => write!(
                f,
                "Frame {} of '{}' is {}x{} (expected {}x{})",
                frame, address, found.0, found.1, expected.0, expected.1
            ),
            LoadError::Cancelled => write!(f, "Load cancelled"),
        }
    }
}

impl std::error::Error for LoadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = ConfigError::UnknownSet(7);
        assert_eq!(err.to_string(), "Unknown sequence set id 7");

        let err = LoadError::InconsistentFrames {
            address: "fish/chunk01".into(),
            expected: (64, 32),
            found: (32, 32),
            frame: 3,
        };
        assert_eq!(err.to_string(), "Frame 3 of 'fish/chunk01' is 32x32 (expected 64x32)");
    }
}
