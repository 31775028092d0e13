//! Parameter types for thumbnail operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the callers (CLI, batch processing, HTTP service) and the
//! drivers in [`decode`](super::decode), [`scale`](super::scale),
//! [`encode`](super::encode) and [`operations`](super::operations).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 90). Clamped on construction.
//! - [`FilterKind`]: Resampling filter, Lanczos by default.
//! - [`DecompressionParameters`]: Prescale target and DCT speed for decoding.
//! - [`CompressionParameters`]: Quality, Huffman optimisation and DCT speed for encoding.
//! - [`ScaleOptions`]: Destination size and filter for one resample.
//! - [`ThumbnailParameters`]: Everything one thumbnail request needs.

/// Quality setting for JPEG encoding (1-100).
///
/// Requests accept 0 to 100. The encoder has no quality 0, so 0 maps to 1,
/// and anything above 100 maps to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as the byte the encoder takes.
    pub fn as_u8(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Resampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    Nearest,
    Bilinear,
    Bicubic,
    Gaussian,
    #[default]
    Lanczos,
}

/// Decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecompressionParameters {
    /// Smallest acceptable output width. Prescaling is enabled only when both
    /// target dimensions are non-zero.
    pub target_width: usize,
    pub target_height: usize,
    pub use_fast_transform: bool,
}

/// Encoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionParameters {
    pub quality: Quality,
    pub optimize_tables: bool,
    pub use_fast_transform: bool,
}

impl Default for CompressionParameters {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            optimize_tables: false,
            use_fast_transform: false,
        }
    }
}

/// One resample request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleOptions {
    pub dst_width: usize,
    pub dst_height: usize,
    pub filter: FilterKind,
}

/// Parameters for one thumbnail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailParameters {
    pub width: usize,
    pub height: usize,
    /// Allow output larger than the source.
    pub upscale: bool,
    /// Produce exactly `width × height`, distorting the aspect ratio if needed.
    pub force_aspect: bool,
    pub quality: Quality,
    pub optimize: bool,
    /// Decode at no less than this multiple of the thumbnail size. Zero or less decodes at full size.
    pub prescale_factor: f64,
}

impl Default for ThumbnailParameters {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            upscale: false,
            force_aspect: false,
            quality: Quality::new(95),
            optimize: false,
            prescale_factor: 1.0,
        }
    }
}
