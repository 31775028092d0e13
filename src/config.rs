//! Service and batch configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialised to a TOML table, the user file is merged on top of it, and the
//! result is deserialised with unknown keys rejected.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! listen = "127.0.0.1:8000"     # Address the HTTP service binds to
//! upstream_timeout_secs = 3     # Timeout for upstream image fetches
//!
//! [defaults]
//! upscale = true                # Request defaults for the HTTP service
//! force_aspect = true
//! quality = 90
//! optimize = false
//! prescale_factor = 2.0
//!
//! [limits]
//! max_dimension = 65000         # Largest accepted w or h
//! max_pixels = 10000000         # Largest accepted w * h
//!
//! [processing]
//! max_processes = 4             # Max parallel batch workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Quality, ThumbnailParameters};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
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

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumberConfig {
    /// HTTP service settings.
    pub server: ServerConfig,
    /// Per-request defaults for the HTTP service.
    pub defaults: RequestDefaults,
    /// Bounds on requested thumbnail sizes.
    pub limits: LimitsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ThumberConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.quality > 100 {
            return Err(ConfigError::Validation(
                "defaults.quality must be 0-100".into(),
            ));
        }
        if !self.defaults.prescale_factor.is_finite() || self.defaults.prescale_factor < 0.0 {
            return Err(ConfigError::Validation(
                "defaults.prescale_factor must be a finite number >= 0".into(),
            ));
        }
        if self.limits.max_dimension == 0 || self.limits.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "limits values must be non-zero".into(),
            ));
        }
        if self.server.upstream_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.upstream_timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub listen: String,
    /// Seconds to wait for the upstream server.
    pub upstream_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
            upstream_timeout_secs: 3,
        }
    }
}

impl ServerConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Values used for request arguments the client leaves out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestDefaults {
    pub upscale: bool,
    pub force_aspect: bool,
    pub quality: u32,
    pub optimize: bool,
    pub prescale_factor: f64,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            upscale: true,
            force_aspect: true,
            quality: 90,
            optimize: false,
            prescale_factor: 2.0,
        }
    }
}

impl RequestDefaults {
    /// Thumbnail parameters for a `width × height` request before any
    /// per-request overrides.
    pub fn thumbnail_parameters(&self, width: usize, height: usize) -> ThumbnailParameters {
        ThumbnailParameters {
            width,
            height,
            upscale: self.upscale,
            force_aspect: self.force_aspect,
            quality: Quality::new(self.quality),
            optimize: self.optimize,
            prescale_factor: self.prescale_factor,
        }
    }
}

/// Bounds on requested thumbnail sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_dimension: usize,
    pub max_pixels: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dimension: 65000,
            max_pixels: 10_000_000,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ThumberConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults: {e}")))
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

/// Merge user TOML text onto the stock defaults, then deserialize and validate.
pub fn parse_config(content: &str) -> Result<ThumberConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let merged = merge_toml(stock_defaults_value()?, overlay);
    let config: ThumberConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<ThumberConfig, ConfigError> {
    match path {
        Some(path) => parse_config(&fs::read_to_string(path)?),
        None => Ok(ThumberConfig::default()),
    }
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Thumber Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with `thumber --config config.toml <command>`.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP service
# ---------------------------------------------------------------------------
[server]
# Socket address `thumber serve` binds to.
listen = "127.0.0.1:8000"

# Seconds to wait for the upstream server when fetching a source image.
upstream_timeout_secs = 3

# ---------------------------------------------------------------------------
# Request defaults
# ---------------------------------------------------------------------------
# Used by the HTTP service for arguments a request leaves out
# (u, a, q, o, p in `/w=..,h=../host/path`).
[defaults]
# Allow thumbnails larger than the source image.
upscale = true

# Produce exactly w x h, ignoring the source aspect ratio.
force_aspect = true

# JPEG quality (0 = worst, 100 = best).
quality = 90

# Optimise Huffman tables (smaller files, slower encode).
optimize = false

# Decode at no less than this multiple of the thumbnail size.
# 0 decodes at full size.
prescale_factor = 2.0

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest width or height a request may ask for.
max_dimension = 65000

# Largest w * h a request may ask for.
max_pixels = 10000000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `thumber batch`. Omit for auto (= CPU cores).
# Values above the core count are clamped down.
# max_processes = 4
"##
}
