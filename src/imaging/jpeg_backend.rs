//! Production codec: `jpeg-decoder` and `jpeg-encoder` behind the
//! [`Decompressor`] / [`Compressor`] traits.
//!
//! ## Decoding
//!
//! The frame header is read by [`jpeg_header`](super::jpeg_header) straight
//! off the [`StreamSource`], which settles colour space and sampling before any
//! entropy-coded data is touched. The captured header bytes are then chained
//! in front of the remaining stream and handed to `jpeg_decoder::Decoder`,
//! which performs DCT-domain scaling (1/8, 1/4, 1/2) while decoding.
//!
//! `jpeg-decoder` only emits interleaved pixels, so [`start_raw`] converts its
//! output back to per-component planes at the geometry the frame header
//! implies: luma at full output size, chroma box-filtered to its sampled size.
//! `read_raw_rows` then hands these out one row block at a time, replicating
//! the last column and row into the block padding.
//!
//! The whole prescaled frame is therefore resident: first as interleaved RGB,
//! then as full-size planes that are box-filtered one component at a time.
//! The RGB buffer is released as soon as it has been split.
//!
//! ## Encoding
//!
//! `jpeg-encoder` takes a whole interleaved image, so rows are collected into
//! one output-sized buffer as they arrive and the bitstream is produced at [`finish`](Compressor::finish)
//! through a [`StreamSink`]. Only 1×1 sampling is accepted; the caller
//! resamples to 4:4:4 or grayscale first.
//!
//! [`start_raw`]: Decompressor::start_raw

use super::codec::{
    CodecError, ColorSpace, ComponentInfo, Compressor, DCT_SIZE, Decompressor, EncodeSetup,
    HeaderInfo, OutputInfo, imcu_rows,
};
use super::jpeg_header::{self, JpegHeader};
use super::stream::{SourceError, StreamSink, StreamSource, source_error_from_io};
use jpeg_decoder::Decoder;
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use log::{debug, trace};
use std::io::{Chain, Cursor, Read, Write};

type Replay<R> = Chain<Cursor<Vec<u8>>, StreamSource<R>>;

enum DecodeState<R: Read> {
    Idle(StreamSource<R>),
    HeaderRead {
        source: StreamSource<R>,
        header: JpegHeader,
    },
    Configured {
        decoder: Decoder<Replay<R>>,
        output: OutputInfo,
    },
    Decoding(RawPlanes),
    Done,
}

/// Decoded component planes waiting to be handed out in row blocks.
struct RawPlanes {
    planes: Vec<ComponentPlane>,
    components: Vec<ComponentInfo>,
    block_rows: usize,
    max_v: usize,
    height: usize,
    next_row: usize,
}

struct ComponentPlane {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

/// JPEG decoder reading from any [`Read`] through a [`StreamSource`].
pub struct JpegDecompressor<R: Read> {
    state: DecodeState<R>,
    scale_eighths: usize,
    fast_transform: bool,
}

impl<R: Read> JpegDecompressor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            state: DecodeState::Idle(StreamSource::new(reader)),
            scale_eighths: DCT_SIZE,
            fast_transform: false,
        }
    }

    fn configure(
        &self,
        source: StreamSource<R>,
        mut header: JpegHeader,
    ) -> Result<(Decoder<Replay<R>>, OutputInfo), CodecError> {
        let prefix = std::mem::take(&mut header.prefix);
        let mut decoder = Decoder::new(Cursor::new(prefix).chain(source));
        decoder.read_info().map_err(decoder_error)?;

        let (width, height) = (header.width as usize, header.height as usize);
        let wanted = supported_eighths(self.scale_eighths);
        let (out_width, out_height) = if wanted < DCT_SIZE {
            let (w, h) = decoder
                .scale(
                    scaled(width, wanted) as u16,
                    scaled(height, wanted) as u16,
                )
                .map_err(decoder_error)?;
            (w as usize, h as usize)
        } else {
            (width, height)
        };
        let eighths = [1, 2, 4, 8]
            .into_iter()
            .find(|&k| scaled(width, k) == out_width && scaled(height, k) == out_height)
            .unwrap_or(DCT_SIZE);

        let (max_h, max_v) = header.max_sampling();
        let components = header
            .components
            .iter()
            .map(|c| {
                let (h, v) = (c.h_samp_factor as usize, c.v_samp_factor as usize);
                ComponentInfo {
                    downsampled_width: (out_width * h).div_ceil(max_h),
                    downsampled_height: (out_height * v).div_ceil(max_v),
                    h_samp_factor: h,
                    v_samp_factor: v,
                    dct_v_scaled_size: eighths,
                }
            })
            .collect();

        debug!(
            "Decoding {}x{} at {}/8 -> {}x{}{}",
            width,
            height,
            eighths,
            out_width,
            out_height,
            if self.fast_transform {
                " (fast DCT requested, using accurate)"
            } else {
                ""
            }
        );

        let output = OutputInfo {
            width: out_width,
            height: out_height,
            color_space: header.color_space(),
            components,
        };
        Ok((decoder, output))
    }
}

impl<R: Read> Decompressor for JpegDecompressor<R> {
    fn read_header(&mut self) -> Result<HeaderInfo, CodecError> {
        let DecodeState::Idle(mut source) = std::mem::replace(&mut self.state, DecodeState::Done)
        else {
            return Err(CodecError::State("header already read"));
        };
        source.init();
        let header = jpeg_header::read_header(&mut source)?;
        let info = HeaderInfo {
            width: header.width as usize,
            height: header.height as usize,
            components: header.components.len(),
            color_space: header.color_space(),
        };
        self.state = DecodeState::HeaderRead { source, header };
        Ok(info)
    }

    fn request_scale(&mut self, numerator: usize, denominator: usize) {
        if denominator > 0 {
            self.scale_eighths = (numerator * DCT_SIZE)
                .div_ceil(denominator)
                .clamp(1, DCT_SIZE);
        }
    }

    fn set_fast_transform(&mut self, fast: bool) {
        self.fast_transform = fast;
    }

    fn calc_output_dimensions(&mut self) -> Result<OutputInfo, CodecError> {
        match std::mem::replace(&mut self.state, DecodeState::Done) {
            DecodeState::HeaderRead { source, header } => {
                let (decoder, output) = self.configure(source, header)?;
                self.state = DecodeState::Configured {
                    decoder,
                    output: output.clone(),
                };
                Ok(output)
            }
            DecodeState::Configured { decoder, output } => {
                let info = output.clone();
                self.state = DecodeState::Configured { decoder, output };
                Ok(info)
            }
            other => {
                self.state = other;
                Err(CodecError::State("output dimensions need a fresh header"))
            }
        }
    }

    fn start_raw(&mut self) -> Result<(), CodecError> {
        let DecodeState::Configured {
            mut decoder,
            output,
        } = std::mem::replace(&mut self.state, DecodeState::Done)
        else {
            return Err(CodecError::State("decoding started before output dimensions"));
        };

        let pixels = decoder.decode().map_err(decoder_error)?;
        let format = decoder
            .info()
            .map(|info| info.pixel_format)
            .ok_or(CodecError::State("decoder returned no image info"))?;
        let (width, height) = (output.width, output.height);

        let full_planes = match format {
            jpeg_decoder::PixelFormat::L8 => {
                expect_len(&pixels, width * height)?;
                vec![pixels]
            }
            jpeg_decoder::PixelFormat::RGB24 => {
                expect_len(&pixels, width * height * 3)?;
                let planes = split_ycbcr(&pixels);
                drop(pixels);
                planes
            }
            other => {
                return Err(CodecError::Unsupported(format!(
                    "decoder output format {other:?}"
                )));
            }
        };
        if full_planes.len() != output.components.len() {
            return Err(CodecError::Malformed(format!(
                "decoder produced {} planes for {} components",
                full_planes.len(),
                output.components.len()
            )));
        }

        let max_h = output.components.iter().map(|c| c.h_samp_factor).max().unwrap_or(1);
        let max_v = output.components.iter().map(|c| c.v_samp_factor).max().unwrap_or(1);
        let planes = full_planes
            .into_iter()
            .zip(&output.components)
            .map(|(full, comp)| ComponentPlane {
                data: box_downsample(
                    full,
                    (width, height),
                    (max_h / comp.h_samp_factor, max_v / comp.v_samp_factor),
                    (comp.downsampled_width, comp.downsampled_height),
                ),
                width: comp.downsampled_width,
                height: comp.downsampled_height,
            })
            .collect();

        self.state = DecodeState::Decoding(RawPlanes {
            planes,
            block_rows: imcu_rows(&output.components),
            components: output.components,
            max_v,
            height,
            next_row: 0,
        });
        Ok(())
    }

    fn read_raw_rows(
        &mut self,
        rows: &mut [Vec<&mut [u8]>],
        max_rows: usize,
    ) -> Result<usize, CodecError> {
        let DecodeState::Decoding(raw) = &mut self.state else {
            return Err(CodecError::State("raw rows requested before decoding started"));
        };
        if max_rows < raw.block_rows {
            return Err(CodecError::BufferTooSmall {
                needed: raw.block_rows,
                given: max_rows,
            });
        }
        if raw.next_row >= raw.height {
            return Ok(0);
        }

        for (index, (plane, comp)) in raw.planes.iter().zip(&raw.components).enumerate() {
            let block = raw.block_rows * comp.v_samp_factor / raw.max_v;
            let first = raw.next_row * comp.v_samp_factor / raw.max_v;
            let given = rows.get(index).map_or(0, Vec::len);
            if given < block {
                return Err(CodecError::BufferTooSmall {
                    needed: block,
                    given,
                });
            }
            let padded_width = plane
                .width
                .next_multiple_of(comp.h_samp_factor * comp.dct_v_scaled_size);
            for (offset, row) in rows[index].iter_mut().take(block).enumerate() {
                if row.len() < plane.width {
                    return Err(CodecError::BufferTooSmall {
                        needed: plane.width,
                        given: row.len(),
                    });
                }
                let y = (first + offset).min(plane.height - 1);
                let src = &plane.data[y * plane.width..(y + 1) * plane.width];
                row[..plane.width].copy_from_slice(src);
                let edge = src[plane.width - 1];
                let end = padded_width.min(row.len());
                row[plane.width..end].fill(edge);
            }
        }

        let produced = raw.block_rows.min(raw.height - raw.next_row);
        trace!("Delivered rows {}..{}", raw.next_row, raw.next_row + produced);
        raw.next_row += produced;
        Ok(produced)
    }

    fn finish(&mut self) -> Result<(), CodecError> {
        self.state = DecodeState::Done;
        Ok(())
    }
}

/// Output size of `len` pixels scaled by `eighths / 8`, rounded up.
fn scaled(len: usize, eighths: usize) -> usize {
    (len * eighths).div_ceil(DCT_SIZE)
}

/// Nearest scale at or above `eighths` that the bitstream decoder implements.
fn supported_eighths(eighths: usize) -> usize {
    match eighths {
        0..=1 => 1,
        2 => 2,
        3..=4 => 4,
        _ => DCT_SIZE,
    }
}

fn decoder_error(err: jpeg_decoder::Error) -> CodecError {
    match err {
        jpeg_decoder::Error::Io(io) => match source_error_from_io(io) {
            Ok(source) => CodecError::Source(source),
            Err(io) => CodecError::Source(SourceError::Read(io)),
        },
        jpeg_decoder::Error::Unsupported(feature) => {
            CodecError::Unsupported(format!("{feature:?}"))
        }
        other => CodecError::Malformed(other.to_string()),
    }
}

fn expect_len(pixels: &[u8], expected: usize) -> Result<(), CodecError> {
    if pixels.len() == expected {
        Ok(())
    } else {
        Err(CodecError::Malformed(format!(
            "decoder returned {} bytes, expected {expected}",
            pixels.len()
        )))
    }
}

/// JFIF (BT.601 full range) RGB to YCbCr, 16-bit fixed point.
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = (19595 * r + 38470 * g + 7471 * b + 32768) >> 16;
    let cb = (-11059 * r - 21709 * g + 32768 * b + (128 << 16) + 32768) >> 16;
    let cr = (32768 * r - 27439 * g - 5329 * b + (128 << 16) + 32768) >> 16;
    [y, cb, cr].map(|v| v.clamp(0, 255) as u8)
}

fn split_ycbcr(rgb: &[u8]) -> Vec<Vec<u8>> {
    let pixels = rgb.len() / 3;
    let mut planes = vec![Vec::with_capacity(pixels); 3];
    for px in rgb.chunks_exact(3) {
        let ycc = rgb_to_ycbcr(px[0], px[1], px[2]);
        for (plane, value) in planes.iter_mut().zip(ycc) {
            plane.push(value);
        }
    }
    planes
}

/// Average `factor`-sized boxes of a full-resolution plane down to `dst` size.
fn box_downsample(
    full: Vec<u8>,
    (width, height): (usize, usize),
    (fx, fy): (usize, usize),
    (dst_w, dst_h): (usize, usize),
) -> Vec<u8> {
    if (dst_w, dst_h) == (width, height) {
        return full;
    }
    let (fx, fy) = (fx.max(1), fy.max(1));
    let mut out = Vec::with_capacity(dst_w * dst_h);
    for y in 0..dst_h {
        let y0 = (y * fy).min(height - 1);
        let y1 = ((y + 1) * fy).min(height).max(y0 + 1);
        for x in 0..dst_w {
            let x0 = (x * fx).min(width - 1);
            let x1 = ((x + 1) * fx).min(width).max(x0 + 1);
            let mut sum = 0usize;
            for row in y0..y1 {
                sum += full[row * width + x0..row * width + x1]
                    .iter()
                    .map(|&v| v as usize)
                    .sum::<usize>();
            }
            let count = (y1 - y0) * (x1 - x0);
            out.push(((sum + count / 2) / count) as u8);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

struct EncodeSession {
    setup: EncodeSetup,
    pixels: Vec<u8>,
    rows: usize,
}

/// JPEG encoder writing to any [`Write`] through a [`StreamSink`].
pub struct JpegCompressor<W: Write> {
    sink: StreamSink<W>,
    session: Option<EncodeSession>,
}

impl<W: Write> JpegCompressor<W> {
    pub fn new(writer: W) -> Self {
        Self {
            sink: StreamSink::new(writer),
            session: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}

impl<W: Write> Compressor for JpegCompressor<W> {
    fn start_raw(&mut self, setup: &EncodeSetup) -> Result<(), CodecError> {
        let components = setup.sampling.len();
        match (components, setup.color_space) {
            (1, ColorSpace::Grayscale) | (3, ColorSpace::YCbCr) => {}
            (n, space) => {
                return Err(CodecError::Unsupported(format!(
                    "{n} components in {space:?}"
                )));
            }
        }
        if setup.sampling.iter().any(|&s| s != (1, 1)) {
            return Err(CodecError::Unsupported(
                "only 1x1 chroma sampling is encoded".into(),
            ));
        }
        let max = u16::MAX as usize;
        if setup.width == 0 || setup.height == 0 || setup.width > max || setup.height > max {
            return Err(CodecError::Unsupported(format!(
                "image size {}x{}",
                setup.width, setup.height
            )));
        }
        self.session = Some(EncodeSession {
            pixels: Vec::with_capacity(setup.width * setup.height * components),
            setup: setup.clone(),
            rows: 0,
        });
        Ok(())
    }

    fn write_raw_rows(
        &mut self,
        rows: &[Vec<&[u8]>],
        count: usize,
    ) -> Result<usize, CodecError> {
        let session = self
            .session
            .as_mut()
            .ok_or(CodecError::State("rows written before encoding started"))?;
        let width = session.setup.width;
        let components = session.setup.sampling.len();
        if rows.len() < components {
            return Err(CodecError::BufferTooSmall {
                needed: components,
                given: rows.len(),
            });
        }
        for plane_rows in &rows[..components] {
            if plane_rows.len() < count {
                return Err(CodecError::BufferTooSmall {
                    needed: count,
                    given: plane_rows.len(),
                });
            }
            if let Some(short) = plane_rows[..count].iter().find(|r| r.len() < width) {
                return Err(CodecError::BufferTooSmall {
                    needed: width,
                    given: short.len(),
                });
            }
        }

        let visible = count.min(session.setup.height.saturating_sub(session.rows));
        for j in 0..visible {
            if components == 1 {
                session.pixels.extend_from_slice(&rows[0][j][..width]);
            } else {
                let (y, cb, cr) = (&rows[0][j][..width], &rows[1][j][..width], &rows[2][j][..width]);
                for x in 0..width {
                    session.pixels.extend_from_slice(&[y[x], cb[x], cr[x]]);
                }
            }
        }
        session.rows += count;
        Ok(count)
    }

    fn finish(&mut self) -> Result<(), CodecError> {
        let session = self
            .session
            .take()
            .ok_or(CodecError::State("finish called before encoding started"))?;
        let setup = &session.setup;
        if session.rows < setup.height {
            return Err(CodecError::State("too few rows written"));
        }

        let color = if setup.sampling.len() == 1 {
            ColorType::Luma
        } else {
            ColorType::Ycbcr
        };
        let mut encoder = Encoder::new(&mut self.sink, setup.quality.clamp(1, 100));
        encoder.set_sampling_factor(SamplingFactor::F_1_1);
        encoder.set_optimized_huffman_tables(setup.optimize_coding);
        let result = encoder.encode(
            &session.pixels,
            setup.width as u16,
            setup.height as u16,
            color,
        );
        if let Err(err) = result {
            return Err(match self.sink.take_error() {
                Some(sink) => CodecError::Sink(sink),
                None => CodecError::Encoder(err.to_string()),
            });
        }
        self.sink.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingWriter, SamplingFactor as Fixture, gray_fixture, jpeg_fixture};
    use std::io;

    fn configured(bytes: &[u8], eighths: usize) -> (JpegDecompressor<&[u8]>, OutputInfo) {
        let mut codec = JpegDecompressor::new(bytes);
        codec.read_header().unwrap();
        codec.request_scale(eighths, 8);
        let output = codec.calc_output_dimensions().unwrap();
        (codec, output)
    }

    fn setup(width: usize, height: usize, components: usize) -> EncodeSetup {
        EncodeSetup {
            width,
            height,
            color_space: if components == 1 {
                ColorSpace::Grayscale
            } else {
                ColorSpace::YCbCr
            },
            sampling: vec![(1, 1); components],
            quality: 90,
            optimize_coding: false,
            fast_transform: false,
        }
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    #[test]
    fn full_size_420_geometry() {
        let jpeg = jpeg_fixture(64, 48, Fixture::F_2_2);
        let (_, output) = configured(&jpeg, 8);
        assert_eq!((output.width, output.height), (64, 48));
        assert_eq!(output.color_space, ColorSpace::YCbCr);
        assert_eq!(output.components[0].downsampled_width, 64);
        assert_eq!(output.components[1].downsampled_width, 32);
        assert_eq!(output.components[1].downsampled_height, 24);
        assert_eq!(imcu_rows(&output.components), 16);
    }

    #[test]
    fn half_scale_shrinks_blocks() {
        let jpeg = jpeg_fixture(64, 48, Fixture::F_2_2);
        let (_, output) = configured(&jpeg, 4);
        assert_eq!((output.width, output.height), (32, 24));
        assert_eq!(output.components[2].downsampled_width, 16);
        assert_eq!(output.components[0].dct_v_scaled_size, 4);
        assert_eq!(imcu_rows(&output.components), 8);
    }

    #[test]
    fn unsupported_scale_rounds_up() {
        let jpeg = jpeg_fixture(80, 80, Fixture::F_1_1);
        let (_, output) = configured(&jpeg, 3);
        assert_eq!(output.width, 40);
    }

    #[test]
    fn supported_eighths_mapping() {
        assert_eq!(supported_eighths(1), 1);
        assert_eq!(supported_eighths(2), 2);
        assert_eq!(supported_eighths(3), 4);
        assert_eq!(supported_eighths(5), 8);
        assert_eq!(supported_eighths(8), 8);
    }

    // =========================================================================
    // Raw rows
    // =========================================================================

    #[test]
    fn delivers_blocks_with_edge_padding() {
        let jpeg = gray_fixture(12, 10);
        let (mut codec, output) = configured(&jpeg, 8);
        codec.start_raw().unwrap();
        let mut storage = vec![vec![0u8; 32]; 8];
        let mut rows = vec![storage.iter_mut().map(|r| &mut r[..]).collect::<Vec<_>>()];
        let produced = codec.read_raw_rows(&mut rows, 16).unwrap();
        assert_eq!(produced, 8);
        assert_eq!(output.components[0].downsampled_width, 12);
        // Padded to the next 8-pixel block with the edge value.
        assert!(storage[0][12..16].iter().all(|&v| v == storage[0][11]));
        assert_eq!(storage[0][16], 0);

        let mut rows = vec![storage.iter_mut().map(|r| &mut r[..]).collect::<Vec<_>>()];
        assert_eq!(codec.read_raw_rows(&mut rows, 16).unwrap(), 2);
        // Rows past the image repeat the last one.
        assert_eq!(storage[2][..12], storage[1][..12]);
        codec.finish().unwrap();
    }

    #[test]
    fn colour_frame_splits_into_subsampled_planes() {
        let jpeg = jpeg_fixture(40, 40, Fixture::F_2_2);
        let (mut codec, output) = configured(&jpeg, 8);
        assert_eq!(output.components[1].downsampled_width, 20);
        codec.start_raw().unwrap();

        let mut luma = vec![vec![0u8; 64]; 16];
        let mut cb = vec![vec![0u8; 32]; 8];
        let mut cr = vec![vec![0u8; 32]; 8];
        let mut rows = vec![
            luma.iter_mut().map(|r| &mut r[..]).collect::<Vec<_>>(),
            cb.iter_mut().map(|r| &mut r[..]).collect::<Vec<_>>(),
            cr.iter_mut().map(|r| &mut r[..]).collect::<Vec<_>>(),
        ];
        assert_eq!(codec.read_raw_rows(&mut rows, 16).unwrap(), 16);

        assert!(luma[0][40..48].iter().all(|&v| v == luma[0][39]));
        assert_eq!(luma[0][48], 0);
        for plane in [&cb, &cr] {
            assert!(plane[7][20..24].iter().all(|&v| v == plane[7][19]));
            assert_eq!(plane[7][24], 0);
        }
        codec.finish().unwrap();
    }

    #[test]
    fn too_few_row_slices_is_an_error() {
        let jpeg = jpeg_fixture(32, 32, Fixture::F_2_2);
        let (mut codec, _) = configured(&jpeg, 8);
        codec.start_raw().unwrap();
        let mut storage = vec![vec![0u8; 64]; 8];
        let mut rows = vec![storage.iter_mut().map(|r| &mut r[..]).collect::<Vec<_>>()];
        let err = codec.read_raw_rows(&mut rows, 32).unwrap_err();
        assert!(matches!(err, CodecError::BufferTooSmall { needed: 16, given: 8 }));
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let jpeg = gray_fixture(8, 8);
        let mut codec = JpegDecompressor::new(&jpeg[..]);
        assert!(matches!(codec.start_raw(), Err(CodecError::State(_))));
    }

    #[test]
    fn empty_input_surfaces_source_error() {
        let mut codec = JpegDecompressor::new(io::empty());
        assert!(matches!(
            codec.read_header(),
            Err(CodecError::Source(SourceError::Empty))
        ));
    }

    // =========================================================================
    // Colour conversion
    // =========================================================================

    #[test]
    fn rgb_to_ycbcr_reference_points() {
        assert_eq!(rgb_to_ycbcr(255, 255, 255), [255, 128, 128]);
        assert_eq!(rgb_to_ycbcr(0, 0, 0), [0, 128, 128]);
        assert_eq!(rgb_to_ycbcr(255, 0, 0), [76, 85, 255]);
    }

    #[test]
    fn box_downsample_averages() {
        let full = vec![0, 10, 20, 30, 40, 50, 60, 70];
        let out = box_downsample(full, (4, 2), (2, 2), (2, 1));
        assert_eq!(out, vec![25, 45]);
    }

    #[test]
    fn box_downsample_odd_edge_uses_partial_box() {
        let out = box_downsample(vec![10, 20, 30], (3, 1), (2, 1), (2, 1));
        assert_eq!(out, vec![15, 30]);
    }

    // =========================================================================
    // Encoder
    // =========================================================================

    #[test]
    fn encodes_grayscale_rows() {
        let mut codec = JpegCompressor::new(Vec::new());
        codec.start_raw(&setup(10, 3, 1)).unwrap();
        let data = vec![vec![128u8; 32]; 8];
        let rows = vec![data.iter().map(|r| &r[..]).collect::<Vec<_>>()];
        assert_eq!(codec.write_raw_rows(&rows, 8).unwrap(), 8);
        codec.finish().unwrap();

        let jpeg = codec.into_inner();
        let mut decoder = Decoder::new(&jpeg[..]);
        decoder.decode().unwrap();
        let info = decoder.info().unwrap();
        assert_eq!((info.width, info.height), (10, 3));
        assert_eq!(info.pixel_format, jpeg_decoder::PixelFormat::L8);
    }

    #[test]
    fn rejects_subsampled_input() {
        let mut codec = JpegCompressor::new(Vec::new());
        let mut subsampled = setup(8, 8, 3);
        subsampled.sampling[0] = (2, 2);
        assert!(matches!(
            codec.start_raw(&subsampled),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn finish_requires_every_row() {
        let mut codec = JpegCompressor::new(Vec::new());
        codec.start_raw(&setup(8, 16, 1)).unwrap();
        let data = vec![vec![0u8; 8]; 8];
        let rows = vec![data.iter().map(|r| &r[..]).collect::<Vec<_>>()];
        codec.write_raw_rows(&rows, 8).unwrap();
        assert!(matches!(codec.finish(), Err(CodecError::State(_))));
    }

    #[test]
    fn sink_failure_is_reported_as_sink_error() {
        let mut codec = JpegCompressor::new(FailingWriter::new(io::ErrorKind::BrokenPipe));
        codec.start_raw(&setup(8, 8, 1)).unwrap();
        let data = vec![vec![0u8; 8]; 8];
        let rows = vec![data.iter().map(|r| &r[..]).collect::<Vec<_>>()];
        codec.write_raw_rows(&rows, 8).unwrap();
        assert!(matches!(codec.finish(), Err(CodecError::Sink(_))));
    }
}
