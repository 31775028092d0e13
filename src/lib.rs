//! # Thumber
//!
//! A streaming JPEG thumbnailer. A source JPEG is pulled from any `Read`,
//! decoded straight into planar YCbCr (at a reduced DCT scale when the
//! thumbnail is much smaller than the source), resampled per plane, and
//! re-encoded into any `Write`.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Decode   bytes      →  PlanarImage   (prescaled, native subsampling)
//! 2. Scale    PlanarImage →  PlanarImage   (only when size or layout must change)
//! 3. Encode   PlanarImage →  bytes         (4:4:4 YCbCr or grayscale)
//! ```
//!
//! Each stage is a driver over a narrow trait ([`imaging::Decompressor`],
//! [`imaging::Resampler`], [`imaging::Compressor`]), so the sequencing logic
//! is unit tested against mocks that record every call, and the real codecs
//! are exercised separately.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | The pipeline: planar buffers, stream adapters, codec drivers, scale policy |
//! | [`process`] | File and parallel batch thumbnailing |
//! | [`server`] | HTTP service: thumbnails of upstream images, plus counters |
//! | [`config`] | `config.toml` loading, validation and merging over stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Planar All The Way
//!
//! Thumbnails are produced from the Y, Cb and Cr planes as the JPEG stores
//! them. Chroma stays subsampled until the resampler, which scales each plane
//! independently to the output size. Stages exchange planar buffers only.
//!
//! The codec layer is narrower than that. `jpeg-decoder` hands back the
//! prescaled frame as interleaved RGB, which [`imaging::jpeg_backend::JpegDecompressor`]
//! splits back into planes, and `jpeg-encoder` wants one interleaved buffer
//! at output size. Peak memory is a few copies of the *prescaled* frame, which
//! DCT prescaling keeps small next to the source image.
//!
//! ## DCT Prescaling
//!
//! A 24-megapixel photo thumbnailed to 128×128 does not need to be decoded at
//! full size. The decoder is asked for the smallest `k/8` scale that still
//! covers the requested size (times a configurable prescale factor), which
//! skips most of the IDCT work and shrinks the buffers accordingly.
//!
//! ## Pure Rust
//!
//! Decoding uses `jpeg-decoder`, encoding `jpeg-encoder`, resampling
//! `image::imageops`. No system libraries; the binary is self-contained.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod server;

#[cfg(test)]
pub(crate) mod test_helpers;
