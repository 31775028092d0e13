//! High-level thumbnail operation.
//!
//! Combines the three stages: decode (with a prescale hint derived from the
//! thumbnail size), the scale decision policy, and encode. The first stage to
//! fail ends the operation and its error is returned unchanged inside
//! [`ThumbnailError`].

use super::calculations::prescale_target;
use super::decode::{DecodeError, read_jpeg};
use super::encode::{EncodeError, write_jpeg};
use super::params::{CompressionParameters, DecompressionParameters, ThumbnailParameters};
use super::planar::PixelFormat;
use super::resample::{Resampler, RustResampler, ScaleError};
use super::scale::apply_scale;
use log::debug;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Result type for thumbnail operations.
pub type Result<T> = std::result::Result<T, ThumbnailError>;

/// What happened to one image on its way through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailOutcome {
    pub decoded: (usize, usize),
    pub decoded_format: PixelFormat,
    pub output: (usize, usize),
    pub output_format: PixelFormat,
}

impl ThumbnailOutcome {
    pub fn resampled(&self) -> bool {
        self.decoded != self.output || self.decoded_format != self.output_format
    }
}

/// Thumbnail a JPEG stream with the default Lanczos resampler.
pub fn make_thumbnail<R: Read, W: Write>(
    src: R,
    dst: W,
    params: &ThumbnailParameters,
) -> Result<ThumbnailOutcome> {
    make_thumbnail_with(src, dst, params, &RustResampler::new())
}

/// Thumbnail a JPEG stream with the given resampler.
pub fn make_thumbnail_with<R: Read, W: Write>(
    src: R,
    dst: W,
    params: &ThumbnailParameters,
    resampler: &impl Resampler,
) -> Result<ThumbnailOutcome> {
    let (target_width, target_height) =
        prescale_target((params.width, params.height), params.prescale_factor).unwrap_or((0, 0));
    let decode_params = DecompressionParameters {
        target_width,
        target_height,
        use_fast_transform: false,
    };
    let image = read_jpeg(src, &decode_params)?;
    let decoded = (image.width(), image.height());
    let decoded_format = image.format();

    let image = apply_scale(image, params, resampler)?;

    let encode_params = CompressionParameters {
        quality: params.quality,
        optimize_tables: params.optimize,
        use_fast_transform: false,
    };
    write_jpeg(&image, dst, &encode_params)?;

    let outcome = ThumbnailOutcome {
        decoded,
        decoded_format,
        output: (image.width(), image.height()),
        output_format: image.format(),
    };
    debug!(
        "Thumbnail {}x{} {} -> {}x{} {}",
        decoded.0,
        decoded.1,
        decoded_format,
        outcome.output.0,
        outcome.output.1,
        outcome.output_format
    );
    Ok(outcome)
}
