//! Off-screen render surfaces.
//!
//! A [`RenderSurface`] is an RGBA8 pixel buffer with the handful of 2D
//! operations the magnifier needs:
//!
//! | Operation | Semantics |
//! |---|---|
//! | [`resize`](RenderSurface::resize) | destructive: the surface comes back fully transparent, even at the same size |
//! | [`clear`](RenderSurface::clear) | every pixel becomes transparent black |
//! | [`fill_rect`](RenderSurface::fill_rect) | source-over blend of a solid color, clipped |
//! | [`draw_image`](RenderSurface::draw_image) | copy a raster in at the origin |
//! | [`get_image_data`](RenderSurface::get_image_data) | read back a rectangle; off-surface samples are transparent zeros |
//! | [`put_image_data`](RenderSurface::put_image_data) | replace pixels at an offset, no blending, clipped |
//!
//! Every surface has a process-unique [`SurfaceId`] so a host document can
//! track where it is mounted. Surfaces are never shared between components;
//! pixels cross component boundaries only through `get_image_data` /
//! `put_image_data` (or the [`PixelSource`] trait built on them).

use crate::geometry::{Dimensions, PixelRect};
use image::{Pixel, Rgba, RgbaImage, imageops};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A rectangular block of RGBA8 pixels moved between surfaces.
pub type PixelBuffer = RgbaImage;

/// Fully transparent black, the value of every freshly allocated pixel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Identity of a surface for mounting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Anything pixels can be extracted from by rectangle.
pub trait PixelSource {
    /// Read `rect` back as a buffer of exactly `rect.width`×`rect.height`.
    /// Samples that fall outside the source are transparent zeros.
    fn extract_pixels(&self, rect: PixelRect) -> PixelBuffer;
}

#[derive(Debug)]
pub struct RenderSurface {
    id: SurfaceId,
    pixels: RgbaImage,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: SurfaceId::next(),
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Pixel at (x, y), or `None` off the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.pixels.get_pixel_checked(x, y).copied()
    }

    /// Reallocate at `width`×`height`. Prior contents are always discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    /// Blend `color` over every pixel of `rect` that lies on the surface.
    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgba<u8>) {
        let Some(clip) = rect.clip_to(self.dimensions()) else {
            return;
        };
        let (x0, y0) = (clip.x as u32, clip.y as u32);
        for y in y0..y0 + clip.height {
            for x in x0..x0 + clip.width {
                self.pixels.get_pixel_mut(x, y).blend(&color);
            }
        }
    }

    /// Draw `raster` with its top-left at the origin.
    ///
    /// Only ever called on a freshly sized (transparent) surface, where
    /// source-over compositing reduces to a straight copy, so the pixels are
    /// copied exactly.
    pub fn draw_image(&mut self, raster: &RgbaImage) {
        imageops::replace(&mut self.pixels, raster, 0, 0);
    }

    /// Copy `rect` out of the surface.
    pub fn get_image_data(&self, rect: PixelRect) -> PixelBuffer {
        let mut out = RgbaImage::new(rect.width, rect.height);
        if rect.clip_to(self.dimensions()).is_some() {
            imageops::replace(
                &mut out,
                &self.pixels,
                rect.x.saturating_neg(),
                rect.y.saturating_neg(),
            );
        }
        out
    }

    /// Write `data` with its top-left at (`dx`, `dy`), replacing what is
    /// there. The part of `data` that falls off the surface is dropped.
    pub fn put_image_data(&mut self, data: &PixelBuffer, dx: i64, dy: i64) {
        imageops::replace(&mut self.pixels, data, dx, dy);
    }
}

impl PixelSource for RenderSurface {
    fn extract_pixels(&self, rect: PixelRect) -> PixelBuffer {
        self.get_image_data(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        })
    }

    fn surface_with(raster: &RgbaImage) -> RenderSurface {
        let mut surface = RenderSurface::new(raster.width(), raster.height());
        surface.draw_image(raster);
        surface
    }

    #[test]
    fn surface_ids_are_unique() {
        let a = RenderSurface::new(1, 1);
        let b = RenderSurface::new(1, 1);
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("surface#"));
    }

    #[test]
    fn new_surface_is_transparent() {
        let surface = RenderSurface::new(3, 2);
        assert_eq!(surface.dimensions(), Dimensions::new(3, 2));
        assert!(surface.pixels().pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn resize_discards_contents_even_at_same_size() {
        let mut surface = surface_with(&gradient(4, 4));
        surface.resize(4, 4);
        assert!(surface.pixels().pixels().all(|p| *p == TRANSPARENT));

        surface.resize(7, 2);
        assert_eq!(surface.dimensions(), Dimensions::new(7, 2));
    }

    #[test]
    fn resize_keeps_identity() {
        let mut surface = RenderSurface::new(1, 1);
        let id = surface.id();
        surface.resize(10, 10);
        assert_eq!(surface.id(), id);
    }

    #[test]
    fn clear_resets_every_pixel() {
        let mut surface = surface_with(&gradient(5, 5));
        surface.clear();
        assert!(surface.pixels().pixels().all(|p| *p == TRANSPARENT));
        assert_eq!(surface.dimensions(), Dimensions::new(5, 5));
    }

    #[test]
    fn draw_image_copies_opaque_raster() {
        let raster = gradient(6, 3);
        let surface = surface_with(&raster);
        assert_eq!(surface.pixels(), &raster);
    }

    // =========================================================================
    // fill_rect tests
    // =========================================================================

    #[test]
    fn fill_rect_on_transparent_takes_color() {
        let mut surface = RenderSurface::new(4, 4);
        let color = Rgba([0, 0, 0, 77]);
        surface.fill_rect(PixelRect::new(1, 1, 2, 2), color);

        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            let pixel = surface.pixel(x, y).unwrap();
            assert_eq!(&pixel.0[..3], &[0, 0, 0]);
            // float compositing may land one step below
            assert!((76..=77).contains(&pixel[3]), "({x}, {y}) got {pixel:?}");
        }
        assert_eq!(surface.pixel(0, 0), Some(TRANSPARENT));
        assert_eq!(surface.pixel(3, 3), Some(TRANSPARENT));
    }

    #[test]
    fn fill_rect_blends_translucent_over_opaque() {
        let mut surface = surface_with(&RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 255])));
        surface.fill_rect(PixelRect::new(0, 0, 1, 1), Rgba([0, 0, 0, 128]));

        let blended = surface.pixel(0, 0).unwrap();
        assert_eq!(blended[3], 255);
        assert!(blended[0] < 200 && blended[0] > 0, "got {blended:?}");
        assert_eq!(surface.pixel(1, 1), Some(Rgba([200, 200, 200, 255])));
    }

    #[test]
    fn fill_rect_clips_off_surface() {
        let mut surface = RenderSurface::new(3, 3);
        let color = Rgba([255, 0, 0, 255]);
        surface.fill_rect(PixelRect::new(-2, -2, 3, 3), color);

        assert_eq!(surface.pixel(0, 0).map(|p| p[0]), Some(255));
        assert_ne!(surface.pixel(0, 0), Some(TRANSPARENT));
        assert_eq!(surface.pixel(1, 0), Some(TRANSPARENT));

        surface.fill_rect(PixelRect::new(50, 50, 3, 3), color);
        assert_eq!(surface.pixel(2, 2), Some(TRANSPARENT));
    }

    // =========================================================================
    // get_image_data / put_image_data tests
    // =========================================================================

    #[test]
    fn read_inside_matches_source() {
        let raster = gradient(10, 10);
        let surface = surface_with(&raster);

        let block = surface.get_image_data(PixelRect::new(2, 3, 4, 5));
        assert_eq!(block.dimensions(), (4, 5));
        for (x, y, pixel) in block.enumerate_pixels() {
            assert_eq!(pixel, raster.get_pixel(x + 2, y + 3));
        }
    }

    #[test]
    fn read_partially_outside_pads_with_transparent() {
        let raster = gradient(100, 100);
        let surface = surface_with(&raster);

        let block = surface.get_image_data(PixelRect::new(-10, 0, 20, 20));
        assert_eq!(block.dimensions(), (20, 20));
        for (x, y, pixel) in block.enumerate_pixels() {
            if x < 10 {
                assert_eq!(*pixel, TRANSPARENT, "({x}, {y}) should be padding");
            } else {
                assert_eq!(pixel, raster.get_pixel(x - 10, y));
            }
        }
    }

    #[test]
    fn read_fully_outside_is_all_transparent() {
        let surface = surface_with(&gradient(8, 8));
        let block = surface.get_image_data(PixelRect::new(100, -100, 5, 5));
        assert_eq!(block.dimensions(), (5, 5));
        assert!(block.pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn read_from_empty_surface_is_transparent() {
        let surface = RenderSurface::new(0, 0);
        let block = surface.get_image_data(PixelRect::new(0, 0, 3, 3));
        assert!(block.pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn put_replaces_without_blending() {
        let mut surface = surface_with(&RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 255])));
        let data = RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 0]));
        surface.put_image_data(&data, 1, 1);
        assert_eq!(surface.pixel(1, 1), Some(Rgba([1, 2, 3, 0])));
        assert_eq!(surface.pixel(0, 0), Some(Rgba([9, 9, 9, 255])));
    }

    #[test]
    fn put_clips_at_edges() {
        let mut surface = RenderSurface::new(4, 4);
        let data = RgbaImage::from_pixel(3, 3, Rgba([5, 5, 5, 255]));
        surface.put_image_data(&data, 2, -1);

        assert_eq!(surface.pixel(2, 0), Some(Rgba([5, 5, 5, 255])));
        assert_eq!(surface.pixel(3, 1), Some(Rgba([5, 5, 5, 255])));
        assert_eq!(surface.pixel(3, 2), Some(TRANSPARENT));
        assert_eq!(surface.pixel(1, 0), Some(TRANSPARENT));
    }

    #[test]
    fn extract_then_put_round_trips() {
        let raster = gradient(16, 16);
        let source = surface_with(&raster);
        let block = source.extract_pixels(PixelRect::new(4, 4, 8, 8));

        let mut target = RenderSurface::new(8, 8);
        target.put_image_data(&block, 0, 0);
        assert_eq!(target.pixels(), &block);
    }

    proptest! {
        #[test]
        fn out_of_bounds_reads_never_fail(
            x in -64i64..64,
            y in -64i64..64,
            w in 1u32..48,
            h in 1u32..48,
        ) {
            let raster = gradient(32, 24);
            let surface = surface_with(&raster);
            let block = surface.get_image_data(PixelRect::new(x, y, w, h));

            prop_assert_eq!(block.dimensions(), (w, h));
            for (bx, by, pixel) in block.enumerate_pixels() {
                let sx = x + i64::from(bx);
                let sy = y + i64::from(by);
                let inside = (0..32).contains(&sx) && (0..24).contains(&sy);
                if inside {
                    prop_assert_eq!(pixel, raster.get_pixel(sx as u32, sy as u32));
                } else {
                    prop_assert_eq!(*pixel, TRANSPARENT);
                }
            }
        }
    }
}
