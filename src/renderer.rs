//! Lens overlay rendering.
//!
//! The [`LensRenderer`] owns the overlay surface: a transparent layer the
//! size of the source image carrying only the lens marker. Its size follows
//! the source surface through `set-lens-dimensions` events for as long as
//! the renderer lives.

use crate::document::{ContainerId, Document};
use crate::events::{Event, EventBus, Subscription, Topic};
use crate::geometry::{Dimensions, LensRect, PointerEvent};
use crate::lens::{LensCapabilities, LensError, LensStyle};
use crate::surface::RenderSurface;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

#[derive(Debug)]
pub struct LensRenderer {
    overlay: Rc<RefCell<RenderSurface>>,
    _mirror: Subscription,
}

impl LensRenderer {
    /// Create the overlay, sized to `source` when the source is already
    /// known, and start mirroring later size changes published on `bus`.
    pub fn new(bus: &EventBus, source: Option<Dimensions>) -> Self {
        let initial = source.unwrap_or(Dimensions::new(0, 0));
        let overlay = Rc::new(RefCell::new(RenderSurface::new(
            initial.width,
            initial.height,
        )));

        let mirrored = Rc::clone(&overlay);
        let mirror = bus.subscribe(Topic::SetLensDimensions, move |event| {
            if let Event::SetLensDimensions(dims) = event {
                mirrored.borrow_mut().resize(dims.width, dims.height);
            }
        });

        Self {
            overlay,
            _mirror: mirror,
        }
    }

    pub fn overlay(&self) -> Ref<'_, RenderSurface> {
        self.overlay.borrow()
    }

    /// Redraw the overlay for one pointer position and mount it.
    ///
    /// The overlay goes into the lens' own overlay container, or `fallback`
    /// when the lens has none. With neither configured nothing is touched.
    pub fn render<L, D>(
        &self,
        lens: &L,
        pointer: PointerEvent,
        style: &LensStyle,
        doc: &mut D,
        fallback: Option<ContainerId>,
    ) -> Result<LensRect, LensError>
    where
        L: LensCapabilities + ?Sized,
        D: Document + ?Sized,
    {
        let target = lens
            .overlay_container()
            .or(fallback)
            .ok_or(LensError::Configuration("lens overlay container"))?;

        let mut overlay = self.overlay.borrow_mut();
        overlay.clear();
        let rect = LensRect::centered_on(pointer, lens.width(), lens.height());
        lens.display(&mut overlay, &rect, style);
        doc.append_child(target, overlay.id());

        Ok(rect)
    }
}
