//! Directory-backed chunk source
//!
//! An address is a path relative to the root:
//! - an image file -> a one-frame chunk
//! - a directory -> one frame per image file inside, in file name order
//!
//! Frames are decoded with the `image` crate and stacked into a single RGBA8
//! texture array. All frames of a chunk must share one resolution.

use log::debug;
use std::path::{Path, PathBuf};

use super::error::LoadError;
use super::loader::ChunkSource;
use super::texture::{ChunkTexture, TextureFormat};

/// Frame file extensions picked up inside a chunk directory
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "tga"];

#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted frame files of a chunk directory
    fn frame_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
        let paths = glob::glob(&pattern).map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut files: Vec<PathBuf> = paths
            .filter_map(Result::ok)
            .filter(|p| p.is_file() && Self::is_frame_file(p))
            .collect();
        files.sort();
        Ok(files)
    }

    fn is_frame_file(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn decode(path: &Path) -> Result<image::RgbaImage, LoadError> {
        image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|e| LoadError::Decode(format!("{}: {}", path.display(), e)))
    }
}

impl ChunkSource for DirSource {
    fn read(&self, address: &str) -> Result<ChunkTexture, LoadError> {
        let path = self.root.join(address);

        let files = if path.is_dir() {
            Self::frame_files(&path)?
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            return Err(LoadError::NotFound(address.to_string()));
        };

        if files.is_empty() {
            return Err(LoadError::Empty(address.to_string()));
        }

        let mut data = Vec::new();
        let mut size: Option<(u32, u32)> = None;
        for (frame, file) in files.iter().enumerate() {
            let img = Self::decode(file)?;
            let found = img.dimensions();
            match size {
                None => size = Some(found),
                Some(expected) if expected != found => {
                    return Err(LoadError::InconsistentFrames {
                        address: address.to_string(),
                        expected,
                        found,
                        frame,
                    });
                }
                Some(_) => {}
            }
            data.extend_from_slice(img.as_raw());
        }

        let (width, height) = size.unwrap_or((0, 0));
        debug!(
            "Decoded chunk '{}': {} frames of {}x{}",
            address,
            files.len(),
            width,
            height
        );
        Ok(ChunkTexture::new(
            width,
            height,
            files.len() as u32,
            TextureFormat::Rgba8,
            data,
        ))
    }
}
