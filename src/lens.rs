//! The lens: its size, where its surfaces are mounted, how it marks itself.
//!
//! [`LensCapabilities`] is the contract an image handler attaches to.
//! [`Lens`] is the stock implementation; a custom lens only has to answer
//! the same questions (and may draw a different marker via
//! [`display`](LensCapabilities::display)).
//!
//! Attachment validates structurally with [`validate_lens`]: a lens with a
//! zero side can sample nothing, and one over [`MAX_LENS_PIXELS`] would
//! allocate a preview buffer that size on every move. Both are rejected as
//! [`LensError::InvalidLens`].

use crate::document::{ContainerId, ContainerRef, Document};
use crate::geometry::{Dimensions, LensRect};
use crate::surface::RenderSurface;
use image::Rgba;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    /// A container the render path needs was never configured.
    #[error("Configuration error: {0} was never configured")]
    Configuration(&'static str),
    #[error("Invalid lens: {0}")]
    InvalidLens(String),
    #[error("No container matches selector {0:?}")]
    ContainerResolution(String),
    #[error("A lens is already attached to this image")]
    AlreadyAttached,
}

/// Largest lens area accepted, in pixels (4096×4096).
pub const MAX_LENS_PIXELS: u64 = 4096 * 4096;

/// Overlay color of the translucent lens marker, 30% black by default.
pub const DEFAULT_OVERLAY_COLOR: Rgba<u8> = Rgba([0, 0, 0, 77]);

/// Immutable render settings, captured once per pointer move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LensStyle {
    pub color: Rgba<u8>,
}

impl Default for LensStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_OVERLAY_COLOR,
        }
    }
}

/// What an image handler needs from a lens.
pub trait LensCapabilities {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Container the preview surface is mounted into.
    fn output_container(&self) -> Option<ContainerId>;

    /// Container the overlay surface is mounted into. When `None` the
    /// handler falls back to the container the image itself is mounted in.
    fn overlay_container(&self) -> Option<ContainerId>;

    /// Draw the lens marker for `rect` onto the (already cleared) overlay.
    fn display(&self, overlay: &mut RenderSurface, rect: &LensRect, style: &LensStyle) {
        overlay.fill_rect(rect.pixel_rect(), style.color);
    }

    fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }
}

/// Reject lenses that cannot sample anything or are too large to sample.
pub fn validate_lens<L: LensCapabilities + ?Sized>(lens: &L) -> Result<(), LensError> {
    let dims = lens.dimensions();
    if dims.is_empty() {
        return Err(LensError::InvalidLens(format!(
            "lens must have a non-zero size, got {}x{}",
            dims.width, dims.height
        )));
    }
    if dims.area() > MAX_LENS_PIXELS {
        return Err(LensError::InvalidLens(format!(
            "lens {}x{} is over the {MAX_LENS_PIXELS} pixel limit",
            dims.width, dims.height
        )));
    }
    Ok(())
}

/// Rectangular lens of fixed size.
///
/// Created unconfigured; call [`output_onto`](Self::output_onto) (and
/// optionally [`load_onto`](Self::load_onto)) before the first pointer move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lens {
    width: u32,
    height: u32,
    output: Option<ContainerId>,
    overlay: Option<ContainerId>,
}

impl Lens {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            output: None,
            overlay: None,
        }
    }

    /// Mount the preview into `target`.
    pub fn output_onto<D>(
        &mut self,
        doc: &D,
        target: impl Into<ContainerRef>,
    ) -> Result<(), LensError>
    where
        D: Document + ?Sized,
    {
        self.output = Some(doc.resolve(&target.into())?);
        Ok(())
    }

    /// Mount the overlay into `target`.
    pub fn load_onto<D>(&mut self, doc: &D, target: impl Into<ContainerRef>) -> Result<(), LensError>
    where
        D: Document + ?Sized,
    {
        self.overlay = Some(doc.resolve(&target.into())?);
        Ok(())
    }
}

impl LensCapabilities for Lens {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn output_container(&self) -> Option<ContainerId> {
        self.output
    }

    fn overlay_container(&self) -> Option<ContainerId> {
        self.overlay
    }
}
