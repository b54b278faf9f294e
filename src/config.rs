//! Downsize configuration module.
//!
//! Handles loading, validating, and layering `downsize.toml` files. Values are
//! resolved in three layers, each overriding the one before:
//!
//! ```text
//! stock defaults  →  --config FILE  →  command-line flags
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! pixel_budget = 15000000     # Max width*height of a decoded thumbnail
//! quality = 0.75              # Lossy quality factor (0.0-1.0)
//! preferred_format = "heic"   # Target format when re-encoding a source
//! preserve_orientation = false
//! force_decode = false
//!
//! [constraint]
//! short_edge = 1500           # Max short edge in pixels (omit for none)
//! long_edge = 4096            # Max long edge in pixels (omit for none)
//!
//! [metadata]
//! embed_thumbnail = true      # Store a preview in EXIF (JPEG output only)
//! strip_gps = true            # Remove GPS fields, keep everything else
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EdgeConstraint, ImageKind, Quality, ThumbnailConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `downsize.toml`.
///
/// All fields have sensible defaults. Config files need only specify the
/// values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownsizeConfig {
    /// Ceiling on the decoded thumbnail's width × height.
    pub pixel_budget: u64,
    /// Lossy quality factor, 0.0 (smallest) to 1.0 (best).
    pub quality: f64,
    /// Target format for source re-encoding; JPEG is used when unavailable.
    pub preferred_format: ImageKind,
    /// Rotate pixels upright per EXIF orientation and reset the tag.
    pub preserve_orientation: bool,
    /// Convert decoded frames to 8-bit buffers immediately.
    pub force_decode: bool,
    /// Default edge constraint.
    pub constraint: ConstraintConfig,
    /// Metadata carried into the output.
    pub metadata: MetadataConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for DownsizeConfig {
    fn default() -> Self {
        Self {
            pixel_budget: 15_000_000,
            quality: 0.75,
            preferred_format: ImageKind::Heic,
            preserve_orientation: false,
            force_decode: false,
            constraint: ConstraintConfig::default(),
            metadata: MetadataConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl DownsizeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 0.0-1.0".into()));
        }
        if self.pixel_budget == 0 {
            return Err(ConfigError::Validation(
                "pixel_budget must be greater than zero".into(),
            ));
        }
        if self.preferred_format == ImageKind::Unknown {
            return Err(ConfigError::Validation(
                "preferred_format must name an image format".into(),
            ));
        }
        let edges = [
            ("constraint.short_edge", self.constraint.short_edge),
            ("constraint.long_edge", self.constraint.long_edge),
        ];
        for (key, value) in edges {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ConfigError::Validation(format!("{key} must be finite")));
            }
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::from_factor(self.quality)
    }

    pub fn edge_constraint(&self) -> EdgeConstraint {
        EdgeConstraint::new(self.constraint.short_edge, self.constraint.long_edge)
    }

    /// [`edge_constraint`](Self::edge_constraint) with the edges given in
    /// points converted at `device_scale` and used in place of the configured
    /// ones. Configured edges are pixels and stay as they are.
    pub fn edge_constraint_with_points(
        &self,
        short_points: Option<f64>,
        long_points: Option<f64>,
        device_scale: f64,
    ) -> EdgeConstraint {
        let points = EdgeConstraint::from_points(short_points, long_points, device_scale);
        EdgeConstraint::new(
            points.short_edge.or(self.constraint.short_edge),
            points.long_edge.or(self.constraint.long_edge),
        )
    }

    pub fn thumbnail_config(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            pixel_budget: self.pixel_budget as f64,
            preserve_orientation: self.preserve_orientation,
            force_decode: self.force_decode,
        }
    }
}

/// Default edge constraint, in pixels.
///
/// Absent or non-positive edges impose no limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_edge: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_edge: Option<f64>,
}

/// Metadata handling for re-encoded output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Embed a small preview in the output's EXIF (JPEG output only).
    pub embed_thumbnail: bool,
    /// Remove GPS fields. Orientation and color profile are always kept.
    pub strip_gps: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            embed_thumbnail: true,
            strip_gps: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that config files and flags are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(DownsizeConfig::default())?)
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

/// Load a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge overlays onto the stock defaults in order, then deserialize and
/// validate.
pub fn resolve_config(
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<DownsizeConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .fold(stock_defaults_value()?, merge_toml);
    let config: DownsizeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<DownsizeConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(overlay)
}

/// Returns a fully-commented stock `downsize.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Downsize Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override values from this file.
# Unknown keys will cause an error.

# Ceiling on width * height of a decoded thumbnail. Applied after the edge
# constraint and only ever shrinks further.
pixel_budget = 15000000

# Lossy encoding quality factor (0.0 = smallest, 1.0 = best).
quality = 0.75

# Target format for `reencode`. When no encoder for it is available the
# output falls back to JPEG.
# One of: heic, avif, jpeg, png, gif, webp
preferred_format = "heic"

# Rotate pixels upright according to EXIF orientation (and reset the tag).
preserve_orientation = false

# Convert decoded frames to 8-bit display buffers immediately.
force_decode = false

# ---------------------------------------------------------------------------
# Edge constraint (pixels)
# ---------------------------------------------------------------------------
[constraint]
# The short edge is clamped first, then the long edge of the result.
# Omit a key (or set it to 0) for no limit on that edge.
# short_edge = 1500
# long_edge = 4096

# ---------------------------------------------------------------------------
# Metadata
# ---------------------------------------------------------------------------
[metadata]
# Store a small preview in the output's EXIF block (JPEG output only).
embed_thumbnail = true

# Remove GPS location fields. Orientation and color profile are kept.
strip_gps = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
