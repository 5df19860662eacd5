//! Preview projection: the pixels under the lens, copied 1:1.
//!
//! Order matters in [`PreviewProjector::update`]. Resizing a surface wipes
//! it, so the sequence is always extract → resize → write → mount.

use crate::document::Document;
use crate::geometry::PixelRect;
use crate::lens::{LensCapabilities, LensError};
use crate::surface::{PixelSource, RenderSurface};

#[derive(Debug)]
pub struct PreviewProjector {
    surface: RenderSurface,
}

impl PreviewProjector {
    pub fn new() -> Self {
        Self {
            surface: RenderSurface::new(0, 0),
        }
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    /// Show the pixels of `source` under `rect` in the lens' output container.
    ///
    /// Fails with [`LensError::Configuration`] before touching anything when
    /// the lens has no output container.
    pub fn update<S, L, D>(
        &mut self,
        source: &S,
        lens: &L,
        rect: PixelRect,
        doc: &mut D,
    ) -> Result<(), LensError>
    where
        S: PixelSource + ?Sized,
        L: LensCapabilities + ?Sized,
        D: Document + ?Sized,
    {
        let container = lens
            .output_container()
            .ok_or(LensError::Configuration("preview output container"))?;

        let pixels = source.extract_pixels(rect);
        self.surface.resize(rect.width, rect.height);
        self.surface.put_image_data(&pixels, 0, 0);
        doc.append_child(container, self.surface.id());

        log::debug!(
            "preview {}x{} from ({}, {})",
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );
        Ok(())
    }
}

impl Default for PreviewProjector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;
    use crate::geometry::Dimensions;
    use crate::lens::Lens;
    use crate::surface::TRANSPARENT;
    use crate::test_helpers::{gradient, surface_from};
    use proptest::prelude::*;

    fn configured_lens(page: &mut Page, width: u32, height: u32) -> Lens {
        page.add_container(".preview");
        let mut lens = Lens::new(width, height);
        lens.output_onto(page, ".preview").unwrap();
        lens
    }

    #[test]
    fn update_copies_pixels_one_to_one() {
        let mut page = Page::new();
        let lens = configured_lens(&mut page, 5, 4);
        let raster = gradient(20, 20);
        let source = surface_from(&raster);
        let mut projector = PreviewProjector::new();

        projector
            .update(&source, &lens, PixelRect::new(3, 6, 5, 4), &mut page)
            .unwrap();

        let preview = projector.surface();
        assert_eq!(preview.dimensions(), Dimensions::new(5, 4));
        for (x, y, pixel) in preview.pixels().enumerate_pixels() {
            assert_eq!(pixel, raster.get_pixel(x + 3, y + 6));
        }
    }

    #[test]
    fn update_at_edge_pads_transparent() {
        let mut page = Page::new();
        let lens = configured_lens(&mut page, 20, 20);
        let raster = gradient(100, 100);
        let source = surface_from(&raster);
        let mut projector = PreviewProjector::new();

        projector
            .update(&source, &lens, PixelRect::new(-10, 0, 20, 20), &mut page)
            .unwrap();

        for (x, y, pixel) in projector.surface().pixels().enumerate_pixels() {
            if x < 10 {
                assert_eq!(*pixel, TRANSPARENT);
            } else {
                assert_eq!(pixel, raster.get_pixel(x - 10, y));
            }
        }
    }

    #[test]
    fn update_mounts_preview_in_output_container() {
        let mut page = Page::new();
        let lens = configured_lens(&mut page, 2, 2);
        let source = surface_from(&gradient(4, 4));
        let mut projector = PreviewProjector::new();

        projector
            .update(&source, &lens, PixelRect::new(0, 0, 2, 2), &mut page)
            .unwrap();

        assert_eq!(
            page.parent_of(projector.surface().id()),
            lens.output_container()
        );
    }

    #[test]
    fn update_without_output_container_is_configuration_error() {
        let mut page = Page::new();
        let lens = Lens::new(4, 4);
        let source = surface_from(&gradient(8, 8));
        let mut projector = PreviewProjector::new();

        let err = projector
            .update(&source, &lens, PixelRect::new(0, 0, 4, 4), &mut page)
            .unwrap_err();

        assert!(matches!(err, LensError::Configuration(_)));
        assert_eq!(projector.surface().dimensions(), Dimensions::new(0, 0));
    }

    proptest! {
        #[test]
        fn preview_always_matches_lens_size(
            prior_w in 0u32..64,
            prior_h in 0u32..64,
            w in 1u32..40,
            h in 1u32..40,
            x in -50i64..50,
            y in -50i64..50,
        ) {
            let mut page = Page::new();
            let lens = configured_lens(&mut page, w, h);
            let source = surface_from(&gradient(32, 32));
            let mut projector = PreviewProjector::new();

            projector
                .update(&source, &lens, PixelRect::new(0, 0, prior_w.max(1), prior_h.max(1)), &mut page)
                .unwrap();
            projector
                .update(&source, &lens, PixelRect::new(x, y, w, h), &mut page)
                .unwrap();

            prop_assert_eq!(projector.surface().dimensions(), Dimensions::new(w, h));
        }
    }
}
