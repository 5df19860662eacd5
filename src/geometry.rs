//! Lens geometry. Pure value types, no pixels and no I/O.
//!
//! A pointer position turns into a [`LensRect`] centred on the pointer. The
//! lens rectangle keeps the fractional origin the pointer produced; the
//! sampled region is the integer [`PixelRect`] derived from it.
//!
//! ```text
//!   pointer (px, py), lens w×h
//!
//!   LensRect  = (px − w/2, py − h/2, w, h)        f64 origin, exact
//!   PixelRect = (trunc(x), trunc(y), w, h)        i64 origin, sampled
//! ```
//!
//! Nothing here clamps to the image. A lens hanging off the edge produces
//! negative or out-of-range coordinates, and the surfaces deal with that
//! when reading (transparent padding) or writing (clipping).

use serde::Serialize;

/// Width and height of a raster or surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A pointer-move as delivered by the host, in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    pub client_x: f64,
    pub client_y: f64,
}

impl PointerEvent {
    pub fn new(client_x: f64, client_y: f64) -> Self {
        Self { client_x, client_y }
    }
}

/// The lens rectangle for one pointer position. Recomputed on every move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LensRect {
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
}

impl LensRect {
    /// Centre a `width`×`height` lens on the pointer.
    pub fn centered_on(pointer: PointerEvent, width: u32, height: u32) -> Self {
        Self {
            x: pointer.client_x - f64::from(width) / 2.0,
            y: pointer.client_y - f64::from(height) / 2.0,
            width,
            height,
        }
    }

    /// The integer pixel region this lens samples.
    ///
    /// The origin is truncated toward zero, the way surface read-back
    /// converts its coordinate arguments. `NaN` maps to 0 and infinities
    /// saturate.
    pub fn pixel_rect(&self) -> PixelRect {
        PixelRect {
            x: self.x as i64,
            y: self.y as i64,
            width: self.width,
            height: self.height,
        }
    }
}

/// An integer rectangle in surface coordinates. May lie partly or wholly
/// outside any particular surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x.saturating_add(i64::from(self.width))
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y.saturating_add(i64::from(self.height))
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// The part of this rectangle that lies on a surface of size `bounds`,
    /// or `None` when they do not overlap.
    pub fn clip_to(&self, bounds: Dimensions) -> Option<PixelRect> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.right().min(i64::from(bounds.width));
        let bottom = self.bottom().min(i64::from(bounds.height));

        if left >= right || top >= bottom {
            return None;
        }

        Some(PixelRect {
            x: left,
            y: top,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    /// Number of pixels of this rectangle that land on a surface of size `bounds`.
    pub fn overlap_area(&self, bounds: Dimensions) -> u64 {
        self.clip_to(bounds)
            .map(|clip| clip.dimensions().area())
            .unwrap_or(0)
    }
}
