//! The JPEG codec contract used by the decode and encode drivers.
//!
//! The drivers in [`decode`](super::decode) and [`encode`](super::encode) only
//! know how to walk a [`PlanarImage`](super::PlanarImage) in row blocks and
//! hand row slices to a codec. Everything about the bitstream lives behind the
//! [`Decompressor`] and [`Compressor`] traits, so the drivers can be tested
//! against the mock codecs in [`tests`] and run in production against
//! [`jpeg_backend`](super::jpeg_backend).
//!
//! Row slices are handed over as one `Vec` of rows per plane. Each row is a
//! full-stride slice of the destination plane, so a codec may write (or read)
//! past the visible width into the padding.

use super::stream::{SinkError, SourceError};
use thiserror::Error;

/// Rows per DCT block.
pub const DCT_SIZE: usize = 8;

/// Largest per-component sampling factor JPEG allows.
pub const MAX_SAMPLING_FACTOR: usize = 4;

/// Upper bound on rows in a single row block (`DCT_SIZE × MAX_SAMPLING_FACTOR`).
pub const MAX_BLOCK_ROWS: usize = DCT_SIZE * MAX_SAMPLING_FACTOR;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("malformed JPEG: {0}")]
    Malformed(String),
    #[error("unsupported JPEG: {0}")]
    Unsupported(String),
    #[error("row buffer too small: need {needed} rows, got {given}")]
    BufferTooSmall { needed: usize, given: usize },
    #[error("codec used out of order: {0}")]
    State(&'static str),
    #[error("encoder error: {0}")]
    Encoder(String),
}

/// Colour space the codec reports for the decoded components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Grayscale,
    YCbCr,
    Rgb,
    Cmyk,
    Ycck,
    Unknown,
}

/// What the codec learned from the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub width: usize,
    pub height: usize,
    pub components: usize,
    pub color_space: ColorSpace,
}

/// Post-scale geometry of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub downsampled_width: usize,
    pub downsampled_height: usize,
    pub h_samp_factor: usize,
    pub v_samp_factor: usize,
    /// Rows each block row of this component decodes to after scaling.
    pub dct_v_scaled_size: usize,
}

/// Output geometry after a scale request has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub width: usize,
    pub height: usize,
    pub color_space: ColorSpace,
    pub components: Vec<ComponentInfo>,
}

/// Rows delivered per block by the codec (`max(dct_v_scaled_size × v_samp_factor)`).
pub fn imcu_rows(components: &[ComponentInfo]) -> usize {
    components
        .iter()
        .map(|c| c.dct_v_scaled_size * c.v_samp_factor)
        .max()
        .unwrap_or(0)
}

/// Encoder configuration for one raw-data session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSetup {
    pub width: usize,
    pub height: usize,
    pub color_space: ColorSpace,
    /// `(h, v)` sampling factor per component.
    pub sampling: Vec<(usize, usize)>,
    pub quality: u8,
    pub optimize_coding: bool,
    pub fast_transform: bool,
}

/// Pull-driven JPEG decoder producing raw component rows.
///
/// Call order: `read_header`, optionally `request_scale` and
/// `set_fast_transform`, `calc_output_dimensions`, `start_raw`, then
/// `read_raw_rows` until every output row has arrived, then `finish`.
pub trait Decompressor {
    fn read_header(&mut self) -> Result<HeaderInfo, CodecError>;

    /// Ask for the output to be scaled by `numerator / denominator`.
    fn request_scale(&mut self, numerator: usize, denominator: usize);

    fn set_fast_transform(&mut self, fast: bool);

    fn calc_output_dimensions(&mut self) -> Result<OutputInfo, CodecError>;

    fn start_raw(&mut self) -> Result<(), CodecError>;

    /// Decode the next row block into `rows` (one `Vec` per component).
    ///
    /// `max_rows` is the luma row capacity the caller offers. Returns the
    /// number of luma rows produced.
    fn read_raw_rows(
        &mut self,
        rows: &mut [Vec<&mut [u8]>],
        max_rows: usize,
    ) -> Result<usize, CodecError>;

    fn finish(&mut self) -> Result<(), CodecError>;
}

/// Push-driven JPEG encoder consuming raw component rows.
pub trait Compressor {
    fn start_raw(&mut self, setup: &EncodeSetup) -> Result<(), CodecError>;

    /// Consume `count` rows from each component. Returns rows accepted.
    fn write_raw_rows(
        &mut self,
        rows: &[Vec<&[u8]>],
        count: usize,
    ) -> Result<usize, CodecError>;

    fn finish(&mut self) -> Result<(), CodecError>;
}
