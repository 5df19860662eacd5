//! Magnifier configuration module.
//!
//! Handles loading, validating, and merging a `pixel-loupe.toml` file. Stock
//! defaults are the base layer; a user file overrides just the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [lens]
//! width = 100                     # Lens (and preview) width in pixels
//! height = 100                    # Lens (and preview) height in pixels
//! color = "rgba(0, 0, 0, 0.30)"   # Overlay marker color
//!
//! [loading]
//! timeout_ms = 10000              # How long blocking waits give the decoder
//! max_pixels = 100000000          # Larger rasters are refused before decode
//! ```
//!
//! Colors accept `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` and
//! `rgba(r, g, b, a)` with `a` in `0.0..=1.0`. They are written back as
//! `#rrggbbaa`.
//!
//! Unknown keys are rejected to catch typos early.

use crate::lens::{DEFAULT_OVERLAY_COLOR, LensStyle, MAX_LENS_PIXELS};
use crate::loader::{DEFAULT_MAX_PIXELS, FileLoader};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Magnifier configuration loaded from a TOML file.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MagnifierConfig {
    pub lens: LensSettings,
    pub loading: LoadingConfig,
}

impl MagnifierConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lens.width == 0 || self.lens.height == 0 {
            return Err(ConfigError::Validation(
                "lens.width and lens.height must be non-zero".into(),
            ));
        }
        if u64::from(self.lens.width) * u64::from(self.lens.height) > MAX_LENS_PIXELS {
            return Err(ConfigError::Validation(format!(
                "lens.width x lens.height must not exceed {MAX_LENS_PIXELS} pixels"
            )));
        }
        if self.loading.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "loading.timeout_ms must be non-zero".into(),
            ));
        }
        if self.loading.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "loading.max_pixels must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Render settings for the overlay, captured per pointer move.
    pub fn lens_style(&self) -> LensStyle {
        LensStyle {
            color: self.lens.color.0,
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.loading.timeout_ms)
    }

    pub fn file_loader(&self) -> FileLoader {
        FileLoader::with_max_pixels(self.loading.max_pixels)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LensSettings {
    pub width: u32,
    pub height: u32,
    pub color: OverlayColor,
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            color: OverlayColor::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadingConfig {
    pub timeout_ms: u64,
    pub max_pixels: u64,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

// =============================================================================
// Overlay color
// =============================================================================

/// An RGBA8 color parsed from a CSS-style string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OverlayColor(pub Rgba<u8>);

impl Default for OverlayColor {
    fn default() -> Self {
        Self(DEFAULT_OVERLAY_COLOR)
    }
}

impl fmt::Display for OverlayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl From<OverlayColor> for String {
    fn from(color: OverlayColor) -> Self {
        color.to_string()
    }
}

impl TryFrom<String> for OverlayColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for OverlayColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if let Some(hex) = s.strip_prefix('#') {
            parse_hex(hex)
        } else if let Some(args) = function_args(s, "rgba") {
            parse_rgb_args(args, true)
        } else if let Some(args) = function_args(s, "rgb") {
            parse_rgb_args(args, false)
        } else {
            None
        };
        parsed
            .map(Self)
            .ok_or_else(|| format!("invalid color {s:?}: expected #rrggbb[aa], rgb() or rgba()"))
    }
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn function_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_rgb_args(args: &str, with_alpha: bool) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }
    let channel = |p: &str| p.parse::<u8>().ok();
    let alpha = if with_alpha {
        let a: f64 = parts[3].parse().ok()?;
        if !(0.0..=1.0).contains(&a) {
            return None;
        }
        (a * 255.0).round() as u8
    } else {
        255
    };
    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(MagnifierConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Err` if the file is missing or contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(value)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MagnifierConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MagnifierConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or the stock defaults when no path is given.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<MagnifierConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixel-loupe configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Lens
# ---------------------------------------------------------------------------
[lens]
# Lens size in source pixels. The preview is always exactly this size:
# pixels are copied 1:1, never scaled.
width = 100
height = 100

# Color of the translucent marker drawn over the sampled area.
# Accepts #rgb, #rgba, #rrggbb, #rrggbbaa, rgb(r, g, b), rgba(r, g, b, a).
color = "rgba(0, 0, 0, 0.30)"

# ---------------------------------------------------------------------------
# Image loading
# ---------------------------------------------------------------------------
[loading]
# Milliseconds a blocking wait gives the decoder before giving up.
timeout_ms = 10000

# Images with more pixels than this are refused before they are decoded.
max_pixels = 100000000
"##
}
