//! Planar YCbCr / grayscale image buffer.
//!
//! A [`PlanarImage`] holds one plane per component: luma first, then Cb and Cr
//! when the image is colour. Chroma planes may be subsampled horizontally,
//! vertically, or both; [`PixelFormat`] records which.
//!
//! ## Memory layout
//!
//! Every plane is allocated with generous padding so that block-oriented
//! codecs can read and write whole 8×8 (or scaled) blocks past the visible
//! edge without bounds juggling:
//!
//! ```text
//! stride = pad(plane_width, 16) + 16
//! rows   = pad(plane_height, 16) + 16
//! ```
//!
//! Only the top-left `plane_width × plane_height` region is meaningful. The
//! padding exists so that whole row blocks are always addressable.

use std::fmt;

/// Alignment unit for strides and allocated row counts.
pub const ALIGN: usize = 16;

/// Round `value` up to the next multiple of `align`. `align` must be a power of two.
pub fn pad(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Plane layout of a [`PlanarImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Single luma plane.
    Grayscale,
    /// Full-resolution chroma.
    Yuv444,
    /// Chroma halved horizontally.
    Yuv422,
    /// Chroma halved vertically.
    Yuv440,
    /// Chroma halved in both directions.
    Yuv420,
}

impl PixelFormat {
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Grayscale => 1,
            _ => 3,
        }
    }

    /// Horizontal and vertical chroma subsampling divisors.
    pub fn chroma_divisors(self) -> (usize, usize) {
        match self {
            PixelFormat::Grayscale | PixelFormat::Yuv444 => (1, 1),
            PixelFormat::Yuv422 => (2, 1),
            PixelFormat::Yuv440 => (1, 2),
            PixelFormat::Yuv420 => (2, 2),
        }
    }

    /// Whether the JPEG encoder accepts this layout directly.
    pub fn is_encodable(self) -> bool {
        matches!(self, PixelFormat::Grayscale | PixelFormat::Yuv444)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Grayscale => "gray",
            PixelFormat::Yuv444 => "4:4:4",
            PixelFormat::Yuv422 => "4:2:2",
            PixelFormat::Yuv440 => "4:4:0",
            PixelFormat::Yuv420 => "4:2:0",
        };
        f.write_str(name)
    }
}

/// Width of `plane` for an image of the given size and format.
pub fn plane_width(width: usize, format: PixelFormat, plane: usize) -> usize {
    let (h_div, _) = format.chroma_divisors();
    if plane == 0 || h_div == 1 {
        width
    } else {
        width.div_ceil(h_div)
    }
}

/// Height of `plane` for an image of the given size and format.
pub fn plane_height(height: usize, format: PixelFormat, plane: usize) -> usize {
    let (_, v_div) = format.chroma_divisors();
    if plane == 0 || v_div == 1 {
        height
    } else {
        height.div_ceil(v_div)
    }
}

/// One component plane with its allocated stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    stride: usize,
    width: usize,
    height: usize,
}

impl Plane {
    fn allocate(width: usize, height: usize) -> Self {
        let stride = pad(width, ALIGN) + ALIGN;
        let rows = pad(height, ALIGN) + ALIGN;
        Self {
            data: vec![0; stride * rows],
            stride,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of rows actually allocated, padding included.
    pub fn allocated_rows(&self) -> usize {
        self.data.len() / self.stride
    }

    /// Whole backing store, padding included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Visible pixels of row `y`.
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Up to `count` full-stride rows starting at `first`, clipped to the allocation.
    pub fn rows(&self, first: usize, count: usize) -> Vec<&[u8]> {
        let start = (first * self.stride).min(self.data.len());
        self.data[start..]
            .chunks_exact(self.stride)
            .take(count)
            .collect()
    }

    /// Mutable variant of [`Plane::rows`].
    pub fn rows_mut(&mut self, first: usize, count: usize) -> Vec<&mut [u8]> {
        let start = (first * self.stride).min(self.data.len());
        self.data[start..]
            .chunks_exact_mut(self.stride)
            .take(count)
            .collect()
    }

    /// Copy the visible plane into a tightly packed `width × height` buffer.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut packed = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            packed.extend_from_slice(self.row(y));
        }
        packed
    }

    /// Replicate the last visible column and row across the padding.
    pub fn replicate_edges(&mut self) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let (width, stride) = (self.width, self.stride);
        for row in self.data.chunks_exact_mut(stride).take(self.height) {
            let edge = row[width - 1];
            row[width..].fill(edge);
        }
        let last = (self.height - 1) * stride;
        let (visible, padding) = self.data.split_at_mut(last + stride);
        let edge_row = &visible[last..];
        for row in padding.chunks_exact_mut(stride) {
            row.copy_from_slice(edge_row);
        }
    }
}

/// A planar image with padded, independently strided component planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarImage {
    width: usize,
    height: usize,
    format: PixelFormat,
    planes: Vec<Plane>,
}

impl PlanarImage {
    /// Allocate a zeroed image whose plane sizes follow from `format`.
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        let planes = (0..format.plane_count())
            .map(|p| {
                Plane::allocate(
                    plane_width(width, format, p),
                    plane_height(height, format, p),
                )
            })
            .collect();
        Self {
            width,
            height,
            format,
            planes,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane_width(&self, plane: usize) -> usize {
        self.planes[plane].width
    }

    pub fn plane_height(&self, plane: usize) -> usize {
        self.planes[plane].height
    }

    pub fn stride(&self, plane: usize) -> usize {
        self.planes[plane].stride
    }

    pub fn plane(&self, plane: usize) -> &Plane {
        &self.planes[plane]
    }

    pub fn plane_mut(&mut self, plane: usize) -> &mut Plane {
        &mut self.planes[plane]
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// All planes at once, for handing disjoint row slices to a codec.
    pub fn planes_mut(&mut self) -> &mut [Plane] {
        &mut self.planes
    }

    pub fn pixel(&self, plane: usize, x: usize, y: usize) -> u8 {
        self.planes[plane].row(y)[x]
    }

    /// Fill the visible region of `plane` from a function of `(x, y)`.
    pub fn fill_plane(&mut self, plane: usize, f: impl Fn(usize, usize) -> u8) {
        let target = &mut self.planes[plane];
        for y in 0..target.height {
            for (x, value) in target.row_mut(y).iter_mut().enumerate() {
                *value = f(x, y);
            }
        }
    }

    pub fn replicate_edges(&mut self) {
        for plane in &mut self.planes {
            plane.replicate_edges();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // pad / plane geometry
    // =========================================================================

    #[test]
    fn pad_rounds_up_to_alignment() {
        assert_eq!(pad(0, 16), 0);
        assert_eq!(pad(1, 16), 16);
        assert_eq!(pad(16, 16), 16);
        assert_eq!(pad(17, 16), 32);
        assert_eq!(pad(9, 8), 16);
    }

    #[test]
    fn chroma_plane_sizes_round_up() {
        assert_eq!(plane_width(101, PixelFormat::Yuv420, 1), 51);
        assert_eq!(plane_height(75, PixelFormat::Yuv420, 2), 38);
        assert_eq!(plane_width(101, PixelFormat::Yuv440, 1), 101);
        assert_eq!(plane_height(75, PixelFormat::Yuv440, 1), 38);
        assert_eq!(plane_width(101, PixelFormat::Yuv422, 1), 51);
        assert_eq!(plane_height(75, PixelFormat::Yuv422, 1), 75);
    }

    #[test]
    fn luma_plane_is_never_subsampled() {
        for format in [
            PixelFormat::Grayscale,
            PixelFormat::Yuv444,
            PixelFormat::Yuv422,
            PixelFormat::Yuv440,
            PixelFormat::Yuv420,
        ] {
            assert_eq!(plane_width(333, format, 0), 333);
            assert_eq!(plane_height(217, format, 0), 217);
        }
    }

    #[test]
    fn only_gray_and_444_are_encodable() {
        assert!(PixelFormat::Grayscale.is_encodable());
        assert!(PixelFormat::Yuv444.is_encodable());
        assert!(!PixelFormat::Yuv422.is_encodable());
        assert!(!PixelFormat::Yuv440.is_encodable());
        assert!(!PixelFormat::Yuv420.is_encodable());
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    #[test]
    fn allocation_pads_stride_and_rows() {
        let img = PlanarImage::new(100, 75, PixelFormat::Yuv420);
        assert_eq!(img.plane_count(), 3);
        assert_eq!(img.stride(0), 112 + 16);
        assert_eq!(img.plane(0).allocated_rows(), 80 + 16);
        assert_eq!(img.plane_width(1), 50);
        assert_eq!(img.plane_height(1), 38);
        assert_eq!(img.stride(1), 64 + 16);
        assert_eq!(img.plane(1).allocated_rows(), 48 + 16);
    }

    #[test]
    fn grayscale_has_one_plane() {
        let img = PlanarImage::new(10, 10, PixelFormat::Grayscale);
        assert_eq!(img.plane_count(), 1);
    }

    #[test]
    fn rows_are_clipped_to_allocation() {
        let mut img = PlanarImage::new(8, 8, PixelFormat::Grayscale);
        let allocated = img.plane(0).allocated_rows();
        let rows = img.plane_mut(0).rows_mut(allocated - 2, 16);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 32));
    }

    #[test]
    fn rows_start_at_requested_offset() {
        let mut img = PlanarImage::new(4, 4, PixelFormat::Grayscale);
        img.fill_plane(0, |_, y| y as u8 * 10);
        let rows = img.plane(0).rows(2, 2);
        assert_eq!(rows[0][0], 20);
        assert_eq!(rows[1][3], 30);
    }

    #[test]
    fn to_packed_drops_padding() {
        let mut img = PlanarImage::new(3, 2, PixelFormat::Grayscale);
        img.fill_plane(0, |x, y| (y * 3 + x) as u8);
        assert_eq!(img.plane(0).to_packed(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn replicate_edges_fills_padding() {
        let mut img = PlanarImage::new(3, 2, PixelFormat::Grayscale);
        img.fill_plane(0, |x, y| (y * 3 + x + 1) as u8);
        img.replicate_edges();
        let plane = img.plane(0);
        let stride = plane.stride();
        assert!(plane.data()[3..stride].iter().all(|&v| v == 3));
        let last_row = plane.rows(plane.allocated_rows() - 1, 1)[0];
        assert_eq!(&last_row[..4], &[4, 5, 6, 6]);
    }

    #[test]
    fn display_names() {
        assert_eq!(PixelFormat::Yuv420.to_string(), "4:2:0");
        assert_eq!(PixelFormat::Grayscale.to_string(), "gray");
    }
}
