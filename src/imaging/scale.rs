//! Scale decision policy: whether and how to resample a decoded image.
//!
//! A resample happens when the decoded size differs from the target, or when
//! the decoded layout is something the encoder cannot take (any subsampled
//! chroma). Unless `force_aspect` is set, the destination is shrunk on one
//! side to keep the source aspect ratio. Unless `upscale` is set, a source
//! smaller than the target in both dimensions keeps its own size.

use super::calculations::fit_aspect;
use super::params::{FilterKind, ScaleOptions, ThumbnailParameters};
use super::planar::{PixelFormat, PlanarImage};
use super::resample::{Resampler, ScaleError};
use log::debug;

/// Decide the resample for an image of the given size and layout.
///
/// Returns `None` when the image can be encoded as it is.
pub fn plan_scale(
    width: usize,
    height: usize,
    format: PixelFormat,
    params: &ThumbnailParameters,
) -> Option<ScaleOptions> {
    let (mut target_w, mut target_h) = (params.width, params.height);
    if !params.upscale && !params.force_aspect && width < target_w && height < target_h {
        target_w = width;
        target_h = height;
    }

    if width == target_w && height == target_h && format.is_encodable() {
        return None;
    }

    let (dst_width, dst_height) = if params.force_aspect {
        (target_w, target_h)
    } else {
        fit_aspect((width, height), (target_w, target_h))
    };
    Some(ScaleOptions {
        dst_width,
        dst_height,
        filter: FilterKind::Lanczos,
    })
}

/// Apply [`plan_scale`], running the resampler only when needed.
pub fn apply_scale(
    image: PlanarImage,
    params: &ThumbnailParameters,
    resampler: &impl Resampler,
) -> Result<PlanarImage, ScaleError> {
    match plan_scale(image.width(), image.height(), image.format(), params) {
        Some(opts) => resampler.scale(&image, &opts),
        None => {
            debug!(
                "No resample needed for {}x{} {}",
                image.width(),
                image.height(),
                image.format()
            );
            Ok(image)
        }
    }
}
