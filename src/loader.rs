//! Raster loading: turning an image URL into decoded RGBA8 pixels.
//!
//! [`RasterLoader`] is the seam between the magnifier and whatever fetches
//! images. Loaders run off the UI thread, so they must be `Send + Sync`.
//!
//! [`FileLoader`] is the stock implementation:
//!
//! | Step | How |
//! |---|---|
//! | URL → path | plain paths and `file://` URLs; other schemes are rejected |
//! | Format | sniffed from the file contents (`image::ImageReader::with_guessed_format`) |
//! | Size check | header dimensions only, before the full decode |
//! | Decode | `image` crate (JPEG, PNG, TIFF, WebP), converted to RGBA8 |

use image::{ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Rasters above this many pixels are refused unless configured otherwise.
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("Unsupported image URL: {0}")]
    UnsupportedUrl(String),
    #[error("Image {url} is {width}x{height}, over the {limit} pixel limit")]
    ResourceLimit {
        url: String,
        width: u32,
        height: u32,
        limit: u64,
    },
    #[error("Loader for {0} stopped without producing a result")]
    Interrupted(String),
    #[error("Loader for {url} panicked: {message}")]
    Panicked { url: String, message: String },
}

/// Fetches and decodes the image behind a URL.
pub trait RasterLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<RgbaImage, LoadError>;
}

/// Map a URL onto a local path. Accepts bare paths and `file://` URLs.
pub fn resolve_path(url: &str) -> Result<PathBuf, LoadError> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if url.contains("://") || url.starts_with("data:") {
        return Err(LoadError::UnsupportedUrl(url.to_string()));
    }
    Ok(PathBuf::from(url))
}

/// Loads images from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileLoader {
    max_pixels: u64,
}

impl FileLoader {
    pub fn new() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    fn decode(&self, url: &str, path: &Path) -> Result<RgbaImage, LoadError> {
        let bytes = std::fs::read(path)?;
        let decode_err = |e: image::ImageError| LoadError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let (width, height) = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(decode_err)?;
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(LoadError::ResourceLimit {
                url: url.to_string(),
                width,
                height,
                limit: self.max_pixels,
            });
        }

        let decoded = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()?
            .decode()
            .map_err(decode_err)?;
        Ok(decoded.to_rgba8())
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterLoader for FileLoader {
    fn load(&self, url: &str) -> Result<RgbaImage, LoadError> {
        let path = resolve_path(url)?;
        log::debug!("decoding {}", path.display());
        self.decode(url, &path)
    }
}
