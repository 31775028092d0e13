//! Decode driver: JPEG bytes to a [`PlanarImage`].
//!
//! The driver reads the header, asks the codec for the cheapest DCT prescale
//! that still covers the requested target, classifies the post-scale plane
//! geometry into a [`PixelFormat`], then pulls raw component rows straight
//! into the padded planes one row block at a time. No interleaved RGB
//! buffer is ever built.

use super::calculations::select_scale_numerator;
use super::codec::{
    CodecError, ColorSpace, DCT_SIZE, Decompressor, MAX_BLOCK_ROWS, OutputInfo, imcu_rows,
};
use super::jpeg_backend::JpegDecompressor;
use super::params::DecompressionParameters;
use super::planar::{PixelFormat, PlanarImage};
use super::stream::SourceError;
use log::debug;
use std::io::{self, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("decode failed: input is empty")]
    EmptyInput,
    #[error("decode failed: {0}")]
    Io(#[source] io::Error),
    #[error("decode failed: unsupported colorspace {0:?}")]
    UnsupportedColorspace(ColorSpace),
    #[error("decode failed: unsupported number of components ({0})")]
    UnsupportedComponentCount(usize),
    #[error("decode failed: unsupported color subsampling ({0})")]
    UnsupportedSubsampling(&'static str),
    #[error("decode failed: {0}")]
    Codec(#[source] CodecError),
}

impl From<CodecError> for DecodeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Source(SourceError::Empty) => DecodeError::EmptyInput,
            CodecError::Source(SourceError::Read(e)) => DecodeError::Io(e),
            other => DecodeError::Codec(other),
        }
    }
}

/// Decode a JPEG stream into a planar image.
pub fn read_jpeg<R: Read>(
    src: R,
    params: &DecompressionParameters,
) -> Result<PlanarImage, DecodeError> {
    let mut codec = JpegDecompressor::new(src);
    decode_with(&mut codec, params)
}

/// Run the decode sequence against any [`Decompressor`].
///
/// On error no partial image is returned; the codec is left to be dropped.
pub fn decode_with<D: Decompressor>(
    codec: &mut D,
    params: &DecompressionParameters,
) -> Result<PlanarImage, DecodeError> {
    let header = codec.read_header()?;
    debug!(
        "JPEG header: {}x{}, {} components, {:?}",
        header.width, header.height, header.components, header.color_space
    );

    if params.target_width > 0 && params.target_height > 0 {
        if let Some(k) = select_scale_numerator(
            (header.width, header.height),
            (params.target_width, params.target_height),
        ) {
            debug!(
                "Prescaling by {k}/{DCT_SIZE} towards {}x{}",
                params.target_width, params.target_height
            );
            codec.request_scale(k, DCT_SIZE);
        }
    }
    codec.set_fast_transform(params.use_fast_transform);

    let output = codec.calc_output_dimensions()?;
    let (format, chroma_v_div) = classify(&output)?;

    let luma = output.components[0];
    let mut image = PlanarImage::new(luma.downsampled_width, luma.downsampled_height, format);
    for (plane, comp) in image.planes().iter().zip(&output.components) {
        debug_assert_eq!(
            (plane.width(), plane.height()),
            (comp.downsampled_width, comp.downsampled_height)
        );
    }
    debug!(
        "Decoding to {}x{} {}",
        image.width(),
        image.height(),
        image.format()
    );

    let block_rows = imcu_rows(&output.components);
    if block_rows == 0 || block_rows > MAX_BLOCK_ROWS {
        return Err(CodecError::Unsupported(format!("row block of {block_rows} rows")).into());
    }

    codec.start_raw()?;
    let mut row = 0;
    while row < output.height {
        let mut rows: Vec<Vec<&mut [u8]>> = image
            .planes_mut()
            .iter_mut()
            .enumerate()
            .map(|(index, plane)| {
                let first = if index == 0 { row } else { row / chroma_v_div };
                plane.rows_mut(first, block_rows)
            })
            .collect();
        let produced = codec.read_raw_rows(&mut rows, 2 * block_rows)?;
        if produced == 0 {
            return Err(CodecError::State("decoder stopped before the last row").into());
        }
        row += produced;
    }
    codec.finish()?;

    Ok(image)
}

/// Infer the planar format from post-scale component geometry.
///
/// Returns the format and the vertical chroma divisor used to position chroma rows.
fn classify(output: &OutputInfo) -> Result<(PixelFormat, usize), DecodeError> {
    match output.components.len() {
        1 => {
            if output.color_space != ColorSpace::Grayscale {
                return Err(DecodeError::UnsupportedColorspace(output.color_space));
            }
            Ok((PixelFormat::Grayscale, 1))
        }
        3 => {
            if output.color_space != ColorSpace::YCbCr {
                return Err(DecodeError::UnsupportedColorspace(output.color_space));
            }
            let (y, cb, cr) = (
                &output.components[0],
                &output.components[1],
                &output.components[2],
            );
            if (cb.downsampled_width, cb.downsampled_height)
                != (cr.downsampled_width, cr.downsampled_height)
            {
                return Err(DecodeError::UnsupportedSubsampling("Cb and Cr differ"));
            }

            let half_w = y.downsampled_width.div_ceil(2);
            let half_h = y.downsampled_height.div_ceil(2);
            let full_h = cb.downsampled_height == y.downsampled_height;
            let halved_h = cb.downsampled_height == half_h;

            if cb.downsampled_width == y.downsampled_width {
                if full_h {
                    Ok((PixelFormat::Yuv444, 1))
                } else if halved_h {
                    Ok((PixelFormat::Yuv440, 2))
                } else {
                    Err(DecodeError::UnsupportedSubsampling("vertical is not 1 or 2"))
                }
            } else if cb.downsampled_width == half_w {
                if full_h {
                    Ok((PixelFormat::Yuv422, 1))
                } else if halved_h {
                    Ok((PixelFormat::Yuv420, 2))
                } else {
                    Err(DecodeError::UnsupportedSubsampling("vertical is not 1 or 2"))
                }
            } else {
                Err(DecodeError::UnsupportedSubsampling("horizontal is not 1 or 2"))
            }
        }
        n => Err(DecodeError::UnsupportedComponentCount(n)),
    }
}
