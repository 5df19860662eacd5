//! The image handler: raster source, lens attachment and the pointer-move path.
//!
//! An [`ImageHandler`] owns the decoded raster and a full-resolution source
//! surface kept in sync with it. Loading starts on construction and runs on
//! the rayon pool; the result comes back over a channel and is applied on
//! the owning thread by [`poll`](ImageHandler::poll) or
//! [`wait`](ImageHandler::wait).
//!
//! ## Lifecycle
//!
//! ```text
//! new ──► Pending ──poll/wait──► Loaded ──► publish load, set-lens-dimensions
//!                       └──────► Failed  (logged, nothing published)
//!
//! Unattached ──attach_lens──► Attached ──detach_lens──► Unattached
//! ```
//!
//! ## Pointer move
//!
//! While a lens is attached, [`on_pointer_move`](ImageHandler::on_pointer_move)
//! checks both containers are known, then:
//!
//! 1. clears the overlay and draws the marker at the pointer-centered rect,
//! 2. mounts the overlay (lens overlay container, else the image's parent),
//! 3. copies the pixels under the rect into the preview and mounts it.
//!
//! Dropping the handler drops the receiving end of the load channel, so a
//! decode finishing late has nowhere to deliver and is discarded. A loader
//! that panics is caught on the worker and reported as
//! [`LoadError::Panicked`].

use crate::document::{ContainerId, ContainerRef, Document};
use crate::events::{Event, EventBus, LoadInfo, Subscription, Topic};
use crate::geometry::{Dimensions, LensRect, PixelRect, PointerEvent};
use crate::lens::{Lens, LensCapabilities, LensError, LensStyle, validate_lens};
use crate::loader::{FileLoader, LoadError, RasterLoader};
use crate::preview::PreviewProjector;
use crate::renderer::LensRenderer;
use crate::surface::{PixelBuffer, PixelSource, RenderSurface};
use image::RgbaImage;
use std::any::Any;
use std::cell::Ref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

type LoadResult = Result<RgbaImage, LoadError>;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Where a handler's load stands, as of the last `poll`/`wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded(Dimensions),
    Failed,
}

#[derive(Debug)]
struct Attachment<L> {
    lens: L,
    renderer: LensRenderer,
    projector: PreviewProjector,
}

pub struct ImageHandler<L: LensCapabilities = Lens> {
    url: String,
    bus: EventBus,
    source: RenderSurface,
    raster: Option<RgbaImage>,
    pending: Option<Receiver<LoadResult>>,
    load_error: Option<LoadError>,
    parent: Option<ContainerId>,
    style: LensStyle,
    attachment: Option<Attachment<L>>,
}

impl<L: LensCapabilities> ImageHandler<L> {
    /// Start loading `url` through `loader` and return immediately.
    pub fn new(url: impl Into<String>, loader: Arc<dyn RasterLoader>) -> Self {
        let url = url.into();
        let (tx, rx) = mpsc::channel();

        let job_url = url.clone();
        rayon::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| loader.load(&job_url)))
                .unwrap_or_else(|payload| {
                    Err(LoadError::Panicked {
                        url: job_url.clone(),
                        message: panic_message(payload.as_ref()),
                    })
                });
            if tx.send(result).is_err() {
                log::debug!("{job_url}: handler dropped before the load finished");
            }
        });

        Self {
            url,
            bus: EventBus::new(),
            source: RenderSurface::new(0, 0),
            raster: None,
            pending: Some(rx),
            load_error: None,
            parent: None,
            style: LensStyle::default(),
            attachment: None,
        }
    }

    /// Load a local file (plain path or `file://` URL).
    pub fn open(url: impl Into<String>) -> Self {
        Self::new(url, Arc::new(FileLoader::new()))
    }

    /// Builder form of [`set_style`](Self::set_style).
    pub fn with_style(mut self, style: LensStyle) -> Self {
        self.style = style;
        self
    }

    /// Takes effect from the next pointer move.
    pub fn set_style(&mut self, style: LensStyle) {
        self.style = style;
    }

    /// Overlay marker style used for pointer moves.
    pub fn style(&self) -> LensStyle {
        self.style
    }

    /// The URL this handler was created for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// This handler's event bus. Clones share the same listeners.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe to this handler's events.
    pub fn on<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: FnMut(&Event) + 'static,
    {
        self.bus.subscribe(topic, callback)
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Apply the load result if it has arrived. Never blocks.
    pub fn poll(&mut self) -> LoadState {
        if let Some(rx) = &self.pending {
            match rx.try_recv() {
                Ok(result) => self.complete(result),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.complete(Err(LoadError::Interrupted(self.url.clone())))
                }
            }
        }
        self.load_state()
    }

    /// Block up to `timeout` for the load result, then apply it.
    pub fn wait(&mut self, timeout: Duration) -> LoadState {
        if let Some(rx) = &self.pending {
            match rx.recv_timeout(timeout) {
                Ok(result) => self.complete(result),
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("{}: still loading after {timeout:?}", self.url);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.complete(Err(LoadError::Interrupted(self.url.clone())))
                }
            }
        }
        self.load_state()
    }

    /// Current state without touching the channel.
    pub fn load_state(&self) -> LoadState {
        match (&self.raster, &self.load_error) {
            (Some(raster), _) => LoadState::Loaded(Dimensions::new(raster.width(), raster.height())),
            (None, Some(_)) => LoadState::Failed,
            (None, None) => LoadState::Pending,
        }
    }

    /// Why the load failed, once it has.
    pub fn load_error(&self) -> Option<&LoadError> {
        self.load_error.as_ref()
    }

    fn complete(&mut self, result: LoadResult) {
        self.pending = None;

        let raster = match result {
            Ok(raster) if raster.width() == 0 || raster.height() == 0 => {
                Err(LoadError::Decode {
                    url: self.url.clone(),
                    reason: format!("empty raster ({}x{})", raster.width(), raster.height()),
                })
            }
            other => other,
        };
        let raster = match raster {
            Ok(raster) => raster,
            Err(e) => {
                log::error!("Failed to load {}: {e}", self.url);
                self.load_error = Some(e);
                return;
            }
        };

        let dims = Dimensions::new(raster.width(), raster.height());
        self.source.resize(dims.width, dims.height);
        self.source.draw_image(&raster);
        self.raster = Some(raster);
        log::info!("Loaded {} ({}x{})", self.url, dims.width, dims.height);

        self.bus.publish(&Event::Load(LoadInfo {
            url: self.url.clone(),
            dimensions: dims,
        }));
        self.bus.publish(&Event::SetLensDimensions(dims));
    }

    // ---------------------------------------------------------------------
    // Raster source
    // ---------------------------------------------------------------------

    /// Raster size, once loaded.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.raster
            .as_ref()
            .map(|r| Dimensions::new(r.width(), r.height()))
    }

    /// The decoded raster, once loaded.
    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_ref()
    }

    /// Full-resolution surface the raster is drawn into. Empty until load.
    pub fn source_surface(&self) -> &RenderSurface {
        &self.source
    }

    /// Read back a rectangle of the source surface. Samples outside the
    /// image (or anywhere, before load) are transparent.
    pub fn extract_pixels(&self, x: i64, y: i64, width: u32, height: u32) -> PixelBuffer {
        self.source.get_image_data(PixelRect::new(x, y, width, height))
    }

    /// Mount the source surface into `parent`.
    ///
    /// The resolved container also becomes the overlay fallback for lenses
    /// without an overlay container of their own. On failure the previous
    /// parent is kept.
    pub fn set_parent<D>(
        &mut self,
        doc: &mut D,
        parent: impl Into<ContainerRef>,
    ) -> Result<ContainerId, LensError>
    where
        D: Document + ?Sized,
    {
        let container = doc
            .resolve(&parent.into())
            .inspect_err(|e| log::error!("Cannot mount {}: {e}", self.url))?;
        doc.append_child(container, self.source.id());
        self.parent = Some(container);
        Ok(container)
    }

    /// Container the source surface was last mounted into.
    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    // ---------------------------------------------------------------------
    // Lens attachment
    // ---------------------------------------------------------------------

    /// Bind `lens` to this image and start following the source size.
    ///
    /// Rejected lenses are dropped and the handler stays as it was.
    pub fn attach_lens(&mut self, lens: L) -> Result<(), LensError> {
        if let Err(e) = validate_lens(&lens) {
            log::warn!("Rejected lens for {}: {e}", self.url);
            return Err(e);
        }
        if self.attachment.is_some() {
            log::warn!("Rejected lens for {}: one is already attached", self.url);
            return Err(LensError::AlreadyAttached);
        }

        let dims = lens.dimensions();
        self.attachment = Some(Attachment {
            lens,
            renderer: LensRenderer::new(&self.bus, self.dimensions()),
            projector: PreviewProjector::new(),
        });
        log::info!("Attached {}x{} lens to {}", dims.width, dims.height, self.url);
        self.bus.publish(&Event::LoadLens(dims));
        Ok(())
    }

    /// Release the attached lens and everything built for it.
    ///
    /// The overlay and preview surfaces are unmounted from `doc` and the
    /// overlay stops following the source size.
    pub fn detach_lens<D>(&mut self, doc: &mut D) -> Option<L>
    where
        D: Document + ?Sized,
    {
        let attachment = self.attachment.take()?;
        doc.remove_child(attachment.renderer.overlay().id());
        doc.remove_child(attachment.projector.surface().id());
        log::info!("Detached lens from {}", self.url);
        Some(attachment.lens)
    }

    /// Whether a lens is currently attached.
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// The attached lens.
    pub fn lens(&self) -> Option<&L> {
        self.attachment.as_ref().map(|a| &a.lens)
    }

    /// Reconfigure the attached lens in place, e.g. its containers.
    pub fn lens_mut(&mut self) -> Option<&mut L> {
        self.attachment.as_mut().map(|a| &mut a.lens)
    }

    /// Preview surface of the attached lens.
    pub fn preview(&self) -> Option<&RenderSurface> {
        self.attachment.as_ref().map(|a| a.projector.surface())
    }

    /// Overlay surface of the attached lens.
    pub fn overlay(&self) -> Option<Ref<'_, RenderSurface>> {
        self.attachment.as_ref().map(|a| a.renderer.overlay())
    }

    // ---------------------------------------------------------------------
    // Pointer move
    // ---------------------------------------------------------------------

    /// Move the lens to `pointer` and refresh overlay and preview.
    ///
    /// Returns `Ok(None)` when no lens is attached. Missing containers fail
    /// with [`LensError::Configuration`] before any surface is touched.
    pub fn on_pointer_move<D>(
        &mut self,
        doc: &mut D,
        pointer: PointerEvent,
    ) -> Result<Option<LensRect>, LensError>
    where
        D: Document + ?Sized,
    {
        let Some(attachment) = self.attachment.as_mut() else {
            return Ok(None);
        };
        if attachment.lens.output_container().is_none() {
            return Err(LensError::Configuration("preview output container"));
        }

        let style = self.style;
        let rect = attachment
            .renderer
            .render(&attachment.lens, pointer, &style, doc, self.parent)?;
        attachment
            .projector
            .update(&self.source, &attachment.lens, rect.pixel_rect(), doc)?;

        log::debug!(
            "{}: lens at ({}, {}) for pointer ({}, {})",
            self.url,
            rect.x,
            rect.y,
            pointer.client_x,
            pointer.client_y
        );
        Ok(Some(rect))
    }
}

impl<L: LensCapabilities> PixelSource for ImageHandler<L> {
    fn extract_pixels(&self, rect: PixelRect) -> PixelBuffer {
        self.source.get_image_data(rect)
    }
}

impl<L: LensCapabilities> std::fmt::Debug for ImageHandler<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandler")
            .field("url", &self.url)
            .field("state", &self.load_state())
            .field("parent", &self.parent)
            .field("attached", &self.attachment.is_some())
            .finish_non_exhaustive()
    }
}
