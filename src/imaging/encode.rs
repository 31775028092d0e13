//! Encode driver: a [`PlanarImage`] to JPEG bytes.
//!
//! Only 4:4:4 and grayscale buffers are accepted, so every component is
//! written at 1×1 sampling and the driver can hand the codec eight rows of
//! each plane per call.

use super::codec::{CodecError, ColorSpace, Compressor, DCT_SIZE, EncodeSetup};
use super::jpeg_backend::JpegCompressor;
use super::params::CompressionParameters;
use super::planar::{PixelFormat, PlanarImage};
use super::stream::SinkError;
use log::debug;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("encode failed: unsupported colorspace {0}")]
    UnsupportedFormat(PixelFormat),
    #[error("encode failed: {0}")]
    Io(#[source] io::Error),
    #[error("encode failed: {0}")]
    Codec(#[source] CodecError),
}

impl From<CodecError> for EncodeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Sink(SinkError::Write(e)) => EncodeError::Io(e),
            other => EncodeError::Codec(other),
        }
    }
}

/// Encode `image` as a baseline JPEG into `dest`.
pub fn write_jpeg<W: Write>(
    image: &PlanarImage,
    dest: W,
    params: &CompressionParameters,
) -> Result<(), EncodeError> {
    if !image.format().is_encodable() {
        return Err(EncodeError::UnsupportedFormat(image.format()));
    }
    let mut codec = JpegCompressor::new(dest);
    encode_with(image, &mut codec, params)
}

/// Run the encode sequence against any [`Compressor`].
pub fn encode_with<C: Compressor>(
    image: &PlanarImage,
    codec: &mut C,
    params: &CompressionParameters,
) -> Result<(), EncodeError> {
    let color_space = match image.format() {
        PixelFormat::Grayscale => ColorSpace::Grayscale,
        PixelFormat::Yuv444 => ColorSpace::YCbCr,
        other => return Err(EncodeError::UnsupportedFormat(other)),
    };
    let setup = EncodeSetup {
        width: image.width(),
        height: image.height(),
        color_space,
        sampling: vec![(1, 1); image.plane_count()],
        quality: params.quality.as_u8(),
        optimize_coding: params.optimize_tables,
        fast_transform: params.use_fast_transform,
    };
    debug!(
        "Encoding {}x{} {} at quality {}{}",
        setup.width,
        setup.height,
        image.format(),
        setup.quality,
        if setup.optimize_coding {
            ", optimized tables"
        } else {
            ""
        }
    );
    codec.start_raw(&setup)?;

    let mut row = 0;
    while row < image.height() {
        let rows: Vec<Vec<&[u8]>> = image
            .planes()
            .iter()
            .map(|plane| plane.rows(row, DCT_SIZE))
            .collect();
        let written = codec.write_raw_rows(&rows, DCT_SIZE)?;
        if written == 0 {
            return Err(CodecError::State("encoder accepted no rows").into());
        }
        row += written;
    }
    codec.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::tests::MockCompressor;
    use crate::imaging::decode::read_jpeg;
    use crate::imaging::params::{DecompressionParameters, Quality};
    use crate::test_helpers::{FailingWriter, planar_gradient};

    // =========================================================================
    // Driver against the mock codec
    // =========================================================================

    #[test]
    fn hands_over_every_row_in_blocks_of_eight() {
        let mut image = PlanarImage::new(10, 20, PixelFormat::Yuv444);
        for plane in 0..3 {
            image.fill_plane(plane, |x, y| (plane * 50 + y + x) as u8);
        }
        let mut codec = MockCompressor::new();
        encode_with(&image, &mut codec, &CompressionParameters::default()).unwrap();

        assert_eq!(codec.block_sizes, vec![8, 8, 8]);
        assert!(codec.finished);
        for plane in 0..3 {
            // 24 rows received: 20 visible plus padding from the last block.
            assert_eq!(codec.planes[plane].len(), 24);
            for y in 0..20 {
                assert_eq!(codec.planes[plane][y], image.plane(plane).row(y));
            }
        }
    }

    #[test]
    fn setup_reflects_parameters() {
        let image = PlanarImage::new(4, 4, PixelFormat::Grayscale);
        let mut codec = MockCompressor::new();
        let params = CompressionParameters {
            quality: Quality::new(42),
            optimize_tables: true,
            use_fast_transform: true,
        };
        encode_with(&image, &mut codec, &params).unwrap();
        let setup = codec.setup.unwrap();
        assert_eq!(setup.color_space, ColorSpace::Grayscale);
        assert_eq!(setup.sampling, vec![(1, 1)]);
        assert_eq!(setup.quality, 42);
        assert!(setup.optimize_coding);
        assert!(setup.fast_transform);
    }

    #[test]
    fn subsampled_formats_are_rejected_before_the_codec() {
        for format in [PixelFormat::Yuv420, PixelFormat::Yuv422, PixelFormat::Yuv440] {
            let image = PlanarImage::new(16, 16, format);
            let mut codec = MockCompressor::new();
            let err = encode_with(&image, &mut codec, &CompressionParameters::default())
                .unwrap_err();
            assert!(matches!(err, EncodeError::UnsupportedFormat(f) if f == format));
            assert!(codec.setup.is_none());
        }
    }

    #[test]
    fn codec_failure_propagates() {
        let image = PlanarImage::new(8, 8, PixelFormat::Grayscale);
        let mut codec = MockCompressor {
            fail_finish: true,
            ..MockCompressor::default()
        };
        let err = encode_with(&image, &mut codec, &CompressionParameters::default()).unwrap_err();
        assert!(err.to_string().starts_with("encode failed: "));
    }

    // =========================================================================
    // Real encoder
    // =========================================================================

    #[test]
    fn round_trip_keeps_geometry_and_pixels() {
        let image = planar_gradient(45, 30);
        let mut jpeg = Vec::new();
        let params = CompressionParameters {
            quality: Quality::new(99),
            ..CompressionParameters::default()
        };
        write_jpeg(&image, &mut jpeg, &params).unwrap();

        let decoded = read_jpeg(&jpeg[..], &DecompressionParameters::default()).unwrap();
        assert_eq!(decoded.format(), PixelFormat::Yuv444);
        assert_eq!((decoded.width(), decoded.height()), (45, 30));

        for plane in 0..3 {
            let mut worst = 0;
            for y in 0..30 {
                for x in 0..45 {
                    let diff = image.pixel(plane, x, y).abs_diff(decoded.pixel(plane, x, y));
                    worst = worst.max(diff);
                }
            }
            assert!(worst <= 8, "plane {plane} differs by up to {worst}");
        }
    }

    #[test]
    fn grayscale_round_trip() {
        let mut image = PlanarImage::new(20, 9, PixelFormat::Grayscale);
        image.fill_plane(0, |x, _| (x * 12) as u8);
        let mut jpeg = Vec::new();
        write_jpeg(&image, &mut jpeg, &CompressionParameters::default()).unwrap();
        let decoded = read_jpeg(&jpeg[..], &DecompressionParameters::default()).unwrap();
        assert_eq!(decoded.format(), PixelFormat::Grayscale);
        assert_eq!((decoded.width(), decoded.height()), (20, 9));
    }

    #[test]
    fn write_jpeg_rejects_420() {
        let image = PlanarImage::new(8, 8, PixelFormat::Yuv420);
        let err = write_jpeg(&image, Vec::new(), &CompressionParameters::default()).unwrap_err();
        assert_eq!(err.to_string(), "encode failed: unsupported colorspace 4:2:0");
    }

    #[test]
    fn sink_failure_surfaces_as_io() {
        let image = PlanarImage::new(8, 8, PixelFormat::Grayscale);
        let err = write_jpeg(
            &image,
            FailingWriter::new(io::ErrorKind::BrokenPipe),
            &CompressionParameters::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
