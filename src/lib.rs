//! # Pixel Loupe
//!
//! The core of an in-page image magnifier. A rectangular lens follows the
//! pointer over a source image; on every move the pixels under the lens are
//! copied, 1:1, into a separate preview surface, and a translucent marker is
//! drawn over the sampled area.
//!
//! # Data Flow
//!
//! ```text
//! pointer move ─► LensRenderer ─ clear overlay, draw marker at LensRect, mount
//!                      │
//!                      ▼ LensRect → PixelRect
//!                PreviewProjector ─ extract from source, resize preview, write, mount
//! ```
//!
//! Load and attach are one-shot setup events published on the handler's
//! [`EventBus`](events::EventBus); pointer moves are delivered directly by
//! the host and handled synchronously, in arrival order.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | `Dimensions`, `PointerEvent`, pointer-centered `LensRect`, integer `PixelRect` |
//! | [`surface`] | `RenderSurface`: resizable RGBA8 buffer with fill, read-back and write |
//! | [`events`] | Per-handler publish/subscribe with cancelable `Subscription`s |
//! | [`document`] | The host page as a trait (`Document`) plus the in-memory `Page` |
//! | [`lens`] | `LensCapabilities`, the stock `Lens`, `LensError` |
//! | [`loader`] | `RasterLoader` and the filesystem `FileLoader` |
//! | [`raster`] | `ImageHandler`: async load, source surface, attachment, pointer moves |
//! | [`renderer`] | `LensRenderer`: the overlay surface |
//! | [`preview`] | `PreviewProjector`: the preview surface |
//! | [`config`] | TOML configuration: lens size, overlay color, load limits |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## One Owner Per Surface
//!
//! The source, overlay and preview surfaces each belong to exactly one
//! component. Pixels move between them only through explicit
//! `get_image_data` / `put_image_data` calls.
//!
//! ## Containers Are Checked Up Front
//!
//! A lens without an output container, or with no overlay container and no
//! image parent to fall back to, fails the pointer move with
//! [`LensError::Configuration`](lens::LensError::Configuration) before any
//! surface changes.
//!
//! ## Loading Off Thread, Applying On Thread
//!
//! Decoding runs on the rayon pool. The result is applied by the owning
//! thread when it calls [`poll`](raster::ImageHandler::poll) or
//! [`wait`](raster::ImageHandler::wait), so events are always published
//! from the thread that owns the bus. A handler dropped mid-load simply
//! never receives the result.
//!
//! ## Edges
//!
//! Lens rectangles are never clamped. Reads past the image come back as
//! transparent pixels and writes past a surface are clipped.

pub mod config;
pub mod document;
pub mod events;
pub mod geometry;
pub mod lens;
pub mod loader;
pub mod output;
pub mod preview;
pub mod raster;
pub mod renderer;
pub mod surface;

pub use document::{ContainerId, ContainerRef, Document, Page};
pub use events::{Event, EventBus, Subscription, Topic};
pub use geometry::{Dimensions, LensRect, PixelRect, PointerEvent};
pub use lens::{Lens, LensCapabilities, LensError, LensStyle};
pub use loader::{FileLoader, LoadError, RasterLoader};
pub use raster::{ImageHandler, LoadState};

#[cfg(test)]
pub(crate) mod test_helpers;
