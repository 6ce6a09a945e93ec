//! Chunk texture: a layered texture array, one layer per animation frame
//!
//! The cache never looks at pixel data. It only needs the layer count (the
//! chunk's real frame count) and a byte estimate for diagnostics.

use serde::{Deserialize, Serialize};

/// Storage format of the texture layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFormat {
    Rgba8, // 4 bytes/pixel
    Dxt5,  // block compressed, ~1 byte/pixel
    Bc7,   // block compressed, ~1 byte/pixel
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> f64 {
        match self {
            TextureFormat::Rgba8 => 4.0,
            TextureFormat::Dxt5 | TextureFormat::Bc7 => 1.0,
        }
    }
}

/// Loaded chunk: `depth` layers of `width` x `height`
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTexture {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl ChunkTexture {
    pub fn new(width: u32, height: u32, depth: u32, format: TextureFormat, data: Vec<u8>) -> Self {
        Self { width, height, depth, format, data }
    }

    /// Metadata-only texture (no pixel payload), used by synthetic sources and tests
    pub fn empty(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self::new(width, height, depth, format, Vec::new())
    }

    /// Frames stored in this chunk (never 0)
    pub fn frame_count(&self) -> usize {
        self.depth.max(1) as usize
    }

    /// Estimated GPU-resident size in bytes
    pub fn estimated_bytes(&self) -> u64 {
        let pixels = self.width as f64 * self.height as f64 * self.depth as f64;
        (pixels * self.format.bytes_per_pixel()) as u64
    }
}

/// Format bytes as "12.3 MB"
pub fn human_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}
