//! CLI output formatting for preview runs.
//!
//! Every `format_*` function is pure and returns lines; the `print_*`
//! wrappers only write them to stdout. JSON output serializes the same
//! [`PreviewRun`] value instead.
//!
//! # Output Format
//!
//! ```text
//! photo.jpg (400x300)
//! Lens 100x100
//! 001 pointer (200, 150)
//!     Lens: (150, 100) 100x100
//!     Sampled: 10000/10000 px in bounds
//!     Preview: out/preview-001.png
//! 002 pointer (390, 10)
//!     Lens: (340, -40) 100x100
//!     Sampled: 3600/10000 px in bounds
//!     Preview: out/preview-002.png
//! ```

use crate::geometry::{Dimensions, LensRect, PixelRect, PointerEvent};
use serde::Serialize;
use std::path::PathBuf;

/// One replayed pointer move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveReport {
    pub index: usize,
    pub pointer_x: f64,
    pub pointer_y: f64,
    pub lens: LensRect,
    pub sampled: PixelRect,
    /// Sampled pixels that fell inside the source image.
    pub in_bounds: u64,
    pub preview: Option<PathBuf>,
    pub overlay: Option<PathBuf>,
}

impl MoveReport {
    pub fn new(index: usize, pointer: PointerEvent, lens: LensRect, source: Dimensions) -> Self {
        let sampled = lens.pixel_rect();
        Self {
            index,
            pointer_x: pointer.client_x,
            pointer_y: pointer.client_y,
            lens,
            sampled,
            in_bounds: sampled.overlap_area(source),
            preview: None,
            overlay: None,
        }
    }
}

/// Everything a `preview` invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRun {
    pub url: String,
    pub dimensions: Dimensions,
    pub lens: Dimensions,
    pub moves: Vec<MoveReport>,
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

pub fn format_load(url: &str, dimensions: Dimensions) -> Vec<String> {
    vec![format!("{url} ({}x{})", dimensions.width, dimensions.height)]
}

pub fn format_moves(moves: &[MoveReport]) -> Vec<String> {
    let mut lines = Vec::new();
    for report in moves {
        lines.push(format!(
            "{:03} pointer ({}, {})",
            report.index, report.pointer_x, report.pointer_y
        ));
        lines.push(format!(
            "{}Lens: ({}, {}) {}x{}",
            indent(1),
            report.lens.x,
            report.lens.y,
            report.lens.width,
            report.lens.height
        ));
        lines.push(format!(
            "{}Sampled: {}/{} px in bounds",
            indent(1),
            report.in_bounds,
            report.sampled.dimensions().area()
        ));
        if let Some(path) = &report.preview {
            lines.push(format!("{}Preview: {}", indent(1), path.display()));
        }
        if let Some(path) = &report.overlay {
            lines.push(format!("{}Overlay: {}", indent(1), path.display()));
        }
    }
    lines
}

pub fn format_run(run: &PreviewRun) -> Vec<String> {
    let mut lines = format_load(&run.url, run.dimensions);
    lines.push(format!("Lens {}x{}", run.lens.width, run.lens.height));
    lines.extend(format_moves(&run.moves));
    lines
}

pub fn print_run(run: &PreviewRun) {
    for line in format_run(run) {
        println!("{}", line);
    }
}
