//! Streaming planar JPEG thumbnailing in pure Rust.
//!
//! | Stage | Module | Crate / function |
//! |---|---|---|
//! | **Input** | [`stream`] | fixed 16 KiB pull buffer over any `Read` |
//! | **Header** | `jpeg_header` | marker walker (SOI → SOF), skips APPn/COM in place |
//! | **Decode** | [`decode`] | `jpeg-decoder` with DCT prescale, raw planes out |
//! | **Scale** | [`scale`] + [`resample`] | `image::imageops::resize` per plane, Lanczos3 |
//! | **Encode** | [`encode`] | `jpeg-encoder`, YCbCr 4:4:4 or grayscale |
//! | **Output** | [`stream`] | fixed 16 KiB push buffer over any `Write` |
//!
//! The module is split into:
//! - **Planar buffer**: [`PlanarImage`] and its padded plane geometry
//! - **Calculations**: Pure functions for prescale and aspect math (unit testable)
//! - **Parameters**: Data structures describing decode, scale and encode requests
//! - **Codec**: [`Decompressor`] / [`Compressor`] traits + the `jpeg_backend` implementation
//! - **Drivers**: decode, scale policy, encode
//! - **Operations**: [`make_thumbnail`], the three drivers in sequence

mod calculations;
pub mod codec;
pub mod decode;
pub mod encode;
pub mod jpeg_backend;
mod jpeg_header;
pub mod operations;
mod params;
pub mod planar;
pub mod resample;
pub mod scale;
pub mod stream;

pub use calculations::{fit_aspect, prescale_target, select_scale_numerator};
pub use codec::{CodecError, Compressor, Decompressor};
pub use decode::{DecodeError, decode_with, read_jpeg};
pub use encode::{EncodeError, encode_with, write_jpeg};
pub use operations::{ThumbnailError, ThumbnailOutcome, make_thumbnail, make_thumbnail_with};
pub use params::{
    CompressionParameters, DecompressionParameters, FilterKind, Quality, ScaleOptions,
    ThumbnailParameters,
};
pub use planar::{PixelFormat, PlanarImage};
pub use resample::{Resampler, RustResampler, ScaleError};
pub use scale::{apply_scale, plan_scale};
pub use stream::{SinkError, SourceError, StreamSink, StreamSource};
