//! Owned RGBA pixel buffers.
//!
//! Every backend and the compositor operate on [`PixelBuffer`]; PNG/JPEG
//! encoding only happens at the disk boundary (see [`super::TileEncoder`]).

use image::imageops::FilterType;
use image::RgbaImage;

use crate::error::CodecError;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A tightly packed, straight-alpha RGBA8 image.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    /// A fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// A buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap tightly packed RGBA8 bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CodecError> {
        Self::from_raw_with_stride(width, height, width as usize * BYTES_PER_PIXEL, data)
    }

    /// Wrap RGBA8 rows that are `stride` bytes apart, repacking if padded.
    pub fn from_raw_with_stride(
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            return Err(CodecError::InvalidBuffer {
                message: format!("stride {} is smaller than row size {}", stride, row_bytes),
            });
        }
        let required = if height == 0 {
            0
        } else {
            stride * (height as usize - 1) + row_bytes
        };
        if data.len() < required {
            return Err(CodecError::InvalidBuffer {
                message: format!(
                    "{}x{} with stride {} needs {} bytes, got {}",
                    width,
                    height,
                    stride,
                    required,
                    data.len()
                ),
            });
        }

        if stride == row_bytes {
            let mut data = data;
            data.truncate(required);
            return Ok(Self {
                width,
                height,
                data,
            });
        }

        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            packed.extend_from_slice(&data[start..start + row_bytes]);
        }
        Ok(Self {
            width,
            height,
            data: packed,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride() + x as usize * BYTES_PER_PIXEL
    }

    /// The pixel at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Set one pixel; writes outside the buffer are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.data[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Copy a `width x height` window starting at `(x, y)`.
    ///
    /// Parts of the window outside this buffer come back transparent.
    pub fn crop(&self, x: i64, y: i64, width: u32, height: u32) -> PixelBuffer {
        let mut out = PixelBuffer::new(width, height);
        out.draw(self, -x, -y);
        out
    }

    /// Copy `source` onto this buffer with its upper-left corner at `(x, y)`.
    ///
    /// Pixels are replaced, not blended; anything falling outside is clipped.
    pub fn draw(&mut self, source: &PixelBuffer, x: i64, y: i64) {
        let dst_x0 = x.max(0);
        let dst_y0 = y.max(0);
        let dst_x1 = (x + i64::from(source.width)).min(i64::from(self.width));
        let dst_y1 = (y + i64::from(source.height)).min(i64::from(self.height));
        if dst_x0 >= dst_x1 || dst_y0 >= dst_y1 {
            return;
        }

        let row_len = (dst_x1 - dst_x0) as usize * BYTES_PER_PIXEL;
        for dst_y in dst_y0..dst_y1 {
            let src_y = (dst_y - y) as u32;
            let src_x = (dst_x0 - x) as u32;
            let src_start = source.offset(src_x, src_y);
            let dst_start = self.offset(dst_x0 as u32, dst_y as u32);
            self.data[dst_start..dst_start + row_len]
                .copy_from_slice(&source.data[src_start..src_start + row_len]);
        }
    }

    /// Resample to `width x height`.
    pub fn resize(&self, width: u32, height: u32) -> PixelBuffer {
        if width == self.width && height == self.height {
            return self.clone();
        }
        match self.to_rgba_image() {
            Some(image) => {
                let resized = image::imageops::resize(&image, width, height, FilterType::Triangle);
                PixelBuffer::from_rgba_image(resized)
            }
            None => PixelBuffer::new(width, height),
        }
    }

    /// View as an `image` crate buffer for codec work.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn from_rgba_image(image: RgbaImage) -> PixelBuffer {
        let (width, height) = image.dimensions();
        PixelBuffer {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
