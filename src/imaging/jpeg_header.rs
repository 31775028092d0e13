//! Streaming JPEG marker reader.
//!
//! Walks the marker segments from SOI up to the frame header (SOFn) through a
//! [`StreamSource`], without buffering the file. Segments the bitstream
//! decoder needs later (tables, restart interval, JFIF and Adobe markers, the
//! frame header itself) are captured into [`JpegHeader::prefix`] so they can
//! be replayed ahead of the rest of the stream. Other application segments and
//! comments are skipped in place, which keeps large EXIF or ICC blocks out of
//! memory.
//!
//! Marker layout (ITU T.81, B.1.1):
//!
//! ```text
//! FF D8                      SOI
//! FF En  len(2) payload      APPn (len includes its own two bytes)
//! FF FE  len(2) payload      COM
//! FF DB / C4 / DD ...        tables, restart interval
//! FF C0..C2 len(2) frame     SOF: precision, height, width, components
//! ```

use super::codec::{CodecError, ColorSpace};
use super::stream::StreamSource;
use log::{debug, warn};
use std::io::Read;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const TEM: u8 = 0x01;
const APP0: u8 = 0xE0;
const APP14: u8 = 0xEE;
const COM: u8 = 0xFE;

/// One component entry from the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
}

/// Everything learned while reading up to the frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegHeader {
    pub width: u16,
    pub height: u16,
    pub precision: u8,
    pub progressive: bool,
    pub components: Vec<FrameComponent>,
    pub jfif: bool,
    pub adobe_transform: Option<u8>,
    /// Bytes to replay in front of the remaining stream: SOI, kept segments, SOF.
    pub prefix: Vec<u8>,
}

impl JpegHeader {
    /// Colour space of the encoded components, decided the way libjpeg does.
    pub fn color_space(&self) -> ColorSpace {
        match self.components.len() {
            1 => ColorSpace::Grayscale,
            3 => {
                if self.jfif {
                    return ColorSpace::YCbCr;
                }
                match self.adobe_transform {
                    Some(0) => ColorSpace::Rgb,
                    Some(_) => ColorSpace::YCbCr,
                    None => {
                        let ids: Vec<u8> = self.components.iter().map(|c| c.id).collect();
                        if ids == b"RGB" {
                            ColorSpace::Rgb
                        } else {
                            ColorSpace::YCbCr
                        }
                    }
                }
            }
            4 => match self.adobe_transform {
                Some(2) => ColorSpace::Ycck,
                _ => ColorSpace::Cmyk,
            },
            _ => ColorSpace::Unknown,
        }
    }

    /// Largest horizontal and vertical sampling factors.
    pub fn max_sampling(&self) -> (usize, usize) {
        self.components.iter().fold((1, 1), |(h, v), c| {
            (h.max(c.h_samp_factor as usize), v.max(c.v_samp_factor as usize))
        })
    }
}

/// Read markers up to and including the frame header.
pub fn read_header<R: Read>(src: &mut StreamSource<R>) -> Result<JpegHeader, CodecError> {
    let first = src.read_byte()?;
    let second = src.read_byte()?;
    if first != 0xFF || second != SOI {
        return Err(CodecError::Malformed(format!(
            "not a JPEG file: starts with 0x{first:02x} 0x{second:02x}"
        )));
    }

    let mut prefix = vec![0xFF, SOI];
    let mut jfif = false;
    let mut adobe_transform = None;

    loop {
        let marker = next_marker(src)?;
        match marker {
            0xC0..=0xC2 => {
                let segment = read_segment(src)?;
                let frame = parse_frame(&segment[2..])?;
                prefix.extend_from_slice(&[0xFF, marker]);
                prefix.extend_from_slice(&segment);
                debug!(
                    "JPEG frame: {}x{}, {} components, {}",
                    frame.width,
                    frame.height,
                    frame.components.len(),
                    if marker == 0xC2 {
                        "progressive"
                    } else {
                        "sequential"
                    }
                );
                return Ok(JpegHeader {
                    width: frame.width,
                    height: frame.height,
                    precision: frame.precision,
                    progressive: marker == 0xC2,
                    components: frame.components,
                    jfif,
                    adobe_transform,
                    prefix,
                });
            }
            // Lossless, hierarchical and arithmetic-coded processes.
            0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                return Err(CodecError::Unsupported(format!(
                    "JPEG process with SOF marker 0x{marker:02x}"
                )));
            }
            EOI => {
                return Err(CodecError::Malformed("no image in JPEG datastream".into()));
            }
            SOS => {
                return Err(CodecError::Malformed("scan before frame header".into()));
            }
            SOI => {
                return Err(CodecError::Malformed("duplicate SOI marker".into()));
            }
            TEM | 0xD0..=0xD7 => prefix.extend_from_slice(&[0xFF, marker]),
            APP0 => {
                let segment = read_segment(src)?;
                jfif |= segment[2..].starts_with(b"JFIF\0");
                prefix.extend_from_slice(&[0xFF, marker]);
                prefix.extend_from_slice(&segment);
            }
            APP14 => {
                let segment = read_segment(src)?;
                let payload = &segment[2..];
                // "Adobe" + version(2) + flags0(2) + flags1(2) + transform(1)
                if payload.starts_with(b"Adobe") && payload.len() >= 12 {
                    adobe_transform = Some(payload[11]);
                }
                prefix.extend_from_slice(&[0xFF, marker]);
                prefix.extend_from_slice(&segment);
            }
            0xE1..=0xED | 0xEF | COM => {
                let length = read_length(src)?;
                src.skip(length - 2)?;
            }
            _ => {
                let segment = read_segment(src)?;
                prefix.extend_from_slice(&[0xFF, marker]);
                prefix.extend_from_slice(&segment);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Marker scanning
// ---------------------------------------------------------------------------

/// Find the next marker code, skipping fill bytes and any garbage before it.
fn next_marker<R: Read>(src: &mut StreamSource<R>) -> Result<u8, CodecError> {
    let mut discarded = 0usize;
    let mut byte = src.read_byte()?;
    loop {
        while byte != 0xFF {
            discarded += 1;
            byte = src.read_byte()?;
        }
        let mut code = src.read_byte()?;
        while code == 0xFF {
            code = src.read_byte()?;
        }
        if code != 0 {
            if discarded > 0 {
                warn!(
                    "Corrupt JPEG data: {discarded} extraneous bytes before marker 0x{code:02x}"
                );
            }
            return Ok(code);
        }
        // FF 00 is a stuffed data byte, not a marker.
        discarded += 2;
        byte = src.read_byte()?;
    }
}

fn read_length<R: Read>(src: &mut StreamSource<R>) -> Result<usize, CodecError> {
    let hi = src.read_byte()?;
    let lo = src.read_byte()?;
    let length = u16::from_be_bytes([hi, lo]) as usize;
    if length < 2 {
        return Err(CodecError::Malformed(format!(
            "bogus marker length {length}"
        )));
    }
    Ok(length)
}

/// Read a length-prefixed segment, returning the length bytes and payload.
fn read_segment<R: Read>(src: &mut StreamSource<R>) -> Result<Vec<u8>, CodecError> {
    let length = read_length(src)?;
    let mut segment = Vec::with_capacity(length);
    segment.extend_from_slice(&(length as u16).to_be_bytes());
    src.read_into(&mut segment, length - 2)?;
    Ok(segment)
}

// ---------------------------------------------------------------------------
// Frame header
// ---------------------------------------------------------------------------

struct Frame {
    precision: u8,
    width: u16,
    height: u16,
    components: Vec<FrameComponent>,
}

fn parse_frame(payload: &[u8]) -> Result<Frame, CodecError> {
    if payload.len() < 6 {
        return Err(CodecError::Malformed("frame header too short".into()));
    }
    let precision = payload[0];
    let height = u16::from_be_bytes([payload[1], payload[2]]);
    let width = u16::from_be_bytes([payload[3], payload[4]]);
    let count = payload[5] as usize;

    if precision != 8 {
        return Err(CodecError::Unsupported(format!(
            "{precision}-bit sample precision"
        )));
    }
    if count == 0 || payload.len() != 6 + 3 * count {
        return Err(CodecError::Malformed(format!(
            "frame header length does not match {count} components"
        )));
    }
    if width == 0 {
        return Err(CodecError::Malformed("image has zero width".into()));
    }
    if height == 0 {
        return Err(CodecError::Unsupported(
            "image height defined by DNL marker".into(),
        ));
    }

    let components = payload[6..]
        .chunks_exact(3)
        .map(|entry| {
            let component = FrameComponent {
                id: entry[0],
                h_samp_factor: entry[1] >> 4,
                v_samp_factor: entry[1] & 0x0F,
            };
            let valid = 1..=4;
            if valid.contains(&component.h_samp_factor) && valid.contains(&component.v_samp_factor)
            {
                Ok(component)
            } else {
                Err(CodecError::Malformed(format!(
                    "bad sampling factors {}x{} on component {}",
                    component.h_samp_factor, component.v_samp_factor, component.id
                )))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Frame {
        precision,
        width,
        height,
        components,
    })
}
