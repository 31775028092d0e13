//! Shared test utilities for the thumber test suite.
//!
//! Provides synthetic JPEG fixtures (encoded on the fly, so no binary files
//! live in the repo) and readers/writers with awkward behaviour for exercising
//! the stream adapters.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = jpeg_fixture(64, 48, SamplingFactor::F_2_2);
//! let image = read_jpeg(&jpeg[..], &DecompressionParameters::default()).unwrap();
//! assert_eq!(image.format(), PixelFormat::Yuv420);
//! ```

use std::io::{self, Read, Write};

use crate::imaging::jpeg_backend::rgb_to_ycbcr;
use crate::imaging::{PixelFormat, PlanarImage};
pub use jpeg_encoder::SamplingFactor;

// =========================================================================
// Fixture images
// =========================================================================

/// Smooth RGB gradient: red across, green down, blue diagonal.
pub fn rgb_gradient(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push(((x + y) * 255 / (width + height).max(1)) as u8);
        }
    }
    data
}

/// Encode an RGB gradient as a JPEG with the given chroma sampling.
pub fn jpeg_fixture(width: u16, height: u16, sampling: SamplingFactor) -> Vec<u8> {
    let pixels = rgb_gradient(width as usize, height as usize);
    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, 90);
    encoder.set_sampling_factor(sampling);
    encoder
        .encode(&pixels, width, height, jpeg_encoder::ColorType::Rgb)
        .unwrap();
    out
}

/// Encode a horizontal gray ramp as a single-component JPEG.
pub fn gray_fixture(width: u16, height: u16) -> Vec<u8> {
    let pixels: Vec<u8> = (0..height as usize)
        .flat_map(|_| (0..width as usize).map(move |x| (x * 255 / width as usize) as u8))
        .collect();
    let mut out = Vec::new();
    let encoder = jpeg_encoder::Encoder::new(&mut out, 90);
    encoder
        .encode(&pixels, width, height, jpeg_encoder::ColorType::Luma)
        .unwrap();
    out
}

/// Build an in-gamut 4:4:4 planar image from an RGB gradient.
pub fn planar_gradient(width: usize, height: usize) -> PlanarImage {
    let rgb = rgb_gradient(width, height);
    let mut image = PlanarImage::new(width, height, PixelFormat::Yuv444);
    for plane in 0..3 {
        image.fill_plane(plane, |x, y| {
            let i = (y * width + x) * 3;
            rgb_to_ycbcr(rgb[i], rgb[i + 1], rgb[i + 2])[plane]
        });
    }
    image
}

// =========================================================================
// Readers and writers
// =========================================================================

/// Reader that returns at most `chunk` bytes per call.
pub struct ChunkedReader {
    data: Vec<u8>,
    chunk: usize,
    pos: usize,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self {
            data,
            chunk,
            pos: 0,
        }
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self
            .chunk
            .min(buf.len())
            .min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Reader that fails every call.
pub struct FailingReader {
    kind: io::ErrorKind,
}

impl FailingReader {
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { kind }
    }
}

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(self.kind, "simulated read failure"))
    }
}

/// Writer that accepts at most `limit` bytes per call and counts calls.
pub struct ChunkedWriter {
    pub data: Vec<u8>,
    pub calls: usize,
    limit: usize,
}

impl ChunkedWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            calls: 0,
            limit,
        }
    }
}

impl Write for ChunkedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.calls += 1;
        let n = self.limit.min(buf.len());
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that fails every call.
pub struct FailingWriter {
    kind: io::ErrorKind,
}

impl FailingWriter {
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { kind }
    }
}

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(self.kind, "simulated write failure"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
