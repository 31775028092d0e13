//! Planar resampling.
//!
//! The [`Resampler`] trait turns any [`PlanarImage`] into a 4:4:4 (or
//! grayscale) image of a requested size. The production implementation,
//! [`RustResampler`], runs `image::imageops::resize` over each plane
//! independently, so subsampled chroma is upsampled and rescaled in a single
//! pass.
//!
//! | Filter | `image` filter |
//! |---|---|
//! | Nearest | `Nearest` |
//! | Bilinear | `Triangle` |
//! | Bicubic | `CatmullRom` |
//! | Gaussian | `Gaussian` |
//! | Lanczos | `Lanczos3` |

use super::params::{FilterKind, ScaleOptions};
use super::planar::{PixelFormat, PlanarImage};
use image::GrayImage;
use image::imageops::{self, FilterType};
use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScaleError {
    #[error("invalid scale dimensions {src_width}x{src_height} -> {dst_width}x{dst_height}")]
    InvalidDimensions {
        src_width: usize,
        src_height: usize,
        dst_width: usize,
        dst_height: usize,
    },
    #[error("resample failed: {0}")]
    Failed(String),
}

/// Trait for plane resamplers.
///
/// Output is always [`PixelFormat::Yuv444`], or [`PixelFormat::Grayscale`]
/// for grayscale input, at exactly `dst_width × dst_height`.
pub trait Resampler: Sync {
    fn scale(&self, src: &PlanarImage, opts: &ScaleOptions) -> Result<PlanarImage, ScaleError>;
}

/// Pure-Rust resampler backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustResampler;

impl RustResampler {
    pub fn new() -> Self {
        Self
    }
}

fn filter_type(filter: FilterKind) -> FilterType {
    match filter {
        FilterKind::Nearest => FilterType::Nearest,
        FilterKind::Bilinear => FilterType::Triangle,
        FilterKind::Bicubic => FilterType::CatmullRom,
        FilterKind::Gaussian => FilterType::Gaussian,
        FilterKind::Lanczos => FilterType::Lanczos3,
    }
}

impl Resampler for RustResampler {
    fn scale(&self, src: &PlanarImage, opts: &ScaleOptions) -> Result<PlanarImage, ScaleError> {
        let (dst_w, dst_h) = (opts.dst_width, opts.dst_height);
        if dst_w == 0 || dst_h == 0 || src.width() == 0 || src.height() == 0 {
            return Err(ScaleError::InvalidDimensions {
                src_width: src.width(),
                src_height: src.height(),
                dst_width: dst_w,
                dst_height: dst_h,
            });
        }
        let (Ok(out_w), Ok(out_h)) = (u32::try_from(dst_w), u32::try_from(dst_h)) else {
            return Err(ScaleError::Failed(format!("{dst_w}x{dst_h} is too large")));
        };

        let format = match src.format() {
            PixelFormat::Grayscale => PixelFormat::Grayscale,
            _ => PixelFormat::Yuv444,
        };
        debug!(
            "Resampling {}x{} {} -> {}x{} {} ({:?})",
            src.width(),
            src.height(),
            src.format(),
            dst_w,
            dst_h,
            format,
            opts.filter
        );

        let filter = filter_type(opts.filter);
        let mut dst = PlanarImage::new(dst_w, dst_h, format);
        for index in 0..dst.plane_count() {
            let plane = src.plane(index);
            let resized = if (plane.width(), plane.height()) == (dst_w, dst_h) {
                plane.to_packed()
            } else {
                let gray = GrayImage::from_raw(
                    plane.width() as u32,
                    plane.height() as u32,
                    plane.to_packed(),
                )
                .ok_or_else(|| ScaleError::Failed(format!("plane {index} has a short buffer")))?;
                imageops::resize(&gray, out_w, out_h, filter).into_raw()
            };
            let target = dst.plane_mut(index);
            for (y, row) in resized.chunks_exact(dst_w).enumerate() {
                target.row_mut(y).copy_from_slice(row);
            }
        }
        dst.replicate_edges();
        Ok(dst)
    }
}
