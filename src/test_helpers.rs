//! Shared test utilities: fixture rasters and mock loaders.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let raster = gradient(4, 3);
//! let handler = loaded_handler(raster.clone());
//! assert_eq!(handler.raster(), Some(&raster));
//! ```

use crate::loader::{LoadError, RasterLoader};
use crate::raster::{ImageHandler, LoadState};
use crate::surface::RenderSurface;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generous bound for waiting on the rayon pool in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

// =========================================================================
// Fixture rasters
// =========================================================================

/// Opaque raster where every pixel is distinct for sizes up to 256×256.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([x as u8, y as u8, (x ^ y) as u8 | 0x40, 255])
    })
}

pub fn write_png(dir: &Path, name: &str, raster: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    raster.save(&path).unwrap();
    path
}

/// A surface holding `raster`, the way a loaded source surface does.
pub fn surface_from(raster: &RgbaImage) -> RenderSurface {
    let mut surface = RenderSurface::new(raster.width(), raster.height());
    surface.draw_image(raster);
    surface
}

// =========================================================================
// Mock loaders
// =========================================================================

/// Hands out a fixed raster for every URL.
pub struct StaticLoader(pub RgbaImage);

impl RasterLoader for StaticLoader {
    fn load(&self, _url: &str) -> Result<RgbaImage, LoadError> {
        Ok(self.0.clone())
    }
}

/// Fails every load with a decode error.
pub struct FailingLoader;

impl RasterLoader for FailingLoader {
    fn load(&self, url: &str) -> Result<RgbaImage, LoadError> {
        Err(LoadError::Decode {
            url: url.to_string(),
            reason: "mock failure".into(),
        })
    }
}

/// Panics inside `load`, like a decoder bug would.
pub struct PanickingLoader;

impl RasterLoader for PanickingLoader {
    fn load(&self, url: &str) -> Result<RgbaImage, LoadError> {
        panic!("decoder bug while reading {url}");
    }
}

/// Blocks inside `load` until the test opens the gate.
///
/// `finished` fires once `load` has returned its raster, so a test can tell
/// the worker has run to completion.
pub struct GatedLoader {
    raster: RgbaImage,
    gate: Mutex<Receiver<()>>,
    finished: Mutex<Sender<()>>,
}

impl GatedLoader {
    /// Returns the loader, the gate opener and the completion signal.
    pub fn new(raster: RgbaImage) -> (Self, Sender<()>, Receiver<()>) {
        let (open, gate) = mpsc::channel();
        let (finished, done) = mpsc::channel();
        let loader = Self {
            raster,
            gate: Mutex::new(gate),
            finished: Mutex::new(finished),
        };
        (loader, open, done)
    }
}

impl RasterLoader for GatedLoader {
    fn load(&self, _url: &str) -> Result<RgbaImage, LoadError> {
        let _ = self.gate.lock().unwrap().recv();
        let _ = self.finished.lock().unwrap().send(());
        Ok(self.raster.clone())
    }
}

// =========================================================================
// Handlers
// =========================================================================

/// A handler whose load has already been applied.
pub fn loaded_handler(raster: RgbaImage) -> ImageHandler {
    let mut handler = ImageHandler::new("mem://fixture", Arc::new(StaticLoader(raster)));
    let state = handler.wait(TEST_TIMEOUT);
    assert!(matches!(state, LoadState::Loaded(_)), "fixture failed to load: {state:?}");
    handler
}
