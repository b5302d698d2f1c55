//! RGBA pixel buffers.
//!
//! [`Image`] is an immutable, tightly packed 8-bit RGBA raster with
//! non-premultiplied alpha. [`AnimatedImage`] pairs an image with the timing
//! and placement of one animation frame.

use crate::error::{Error, Result};

/// Bytes per pixel (R, G, B, A).
pub const CHANNELS: usize = 4;

/// A single RGBA pixel.
pub type Rgba = [u8; 4];

/// An immutable RGBA8 image.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Image {
    /// Wrap raw RGBA bytes.
    ///
    /// Fails with [`Error::InvalidDimensions`] if either dimension is zero or
    /// `data.len() != width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = buffer_len(width, height)?;
        if data.len() != expected {
            return Err(Error::dimensions(format!(
                "{}x{} image needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// An image with every pixel set to `pixel`.
    pub fn filled(width: u32, height: u32, pixel: Rgba) -> Result<Self> {
        let len = buffer_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len / CHANNELS {
            data.extend_from_slice(&pixel);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A fully transparent image.
    pub fn transparent(width: u32, height: u32) -> Result<Self> {
        let len = buffer_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major with no padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the RGBA bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * CHANNELS;
        let px = &self.data[offset..offset + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// One row of RGBA bytes.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> std::slice::Chunks<'_, u8> {
        self.data.chunks(self.stride())
    }

    /// True when every pixel has alpha 255.
    pub fn is_opaque(&self) -> bool {
        self.data.chunks_exact(CHANNELS).all(|px| px[3] == 255)
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Validated byte length of a `width` x `height` RGBA buffer.
pub fn buffer_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::dimensions(format!(
            "image dimensions must be non-zero, got {}x{}",
            width, height
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or_else(|| Error::dimensions(format!("{}x{} image is too large", width, height)))
}

/// One frame of an animation.
///
/// `delay` is in hundredths of a second. `x`/`y` place the image inside the
/// logical canvas; decoders always produce canvas-sized frames at the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimatedImage {
    image: Image,
    /// Display time in hundredths of a second.
    pub delay: u32,
    /// Left offset within the canvas.
    pub x: u32,
    /// Top offset within the canvas.
    pub y: u32,
}

impl AnimatedImage {
    /// A frame placed at the canvas origin.
    pub fn new(image: Image, delay: u32) -> Self {
        Self {
            image,
            delay,
            x: 0,
            y: 0,
        }
    }

    /// Place the frame at `(x, y)`.
    pub fn with_offset(mut self, x: u32, y: u32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// The frame's pixels.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Consume the frame, keeping only its pixels.
    pub fn into_image(self) -> Image {
        self.image
    }

    /// Frame width.
    pub fn width(&self) -> u32 {
        self.image.width
    }

    /// Frame height.
    pub fn height(&self) -> u32 {
        self.image.height
    }

    /// Raw RGBA bytes of the frame.
    pub fn data(&self) -> &[u8] {
        &self.image.data
    }

    /// Pixel at `(x, y)` relative to the frame's own origin.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.image.get_pixel(x, y)
    }

    /// Right edge (exclusive) in canvas coordinates.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.image.width as u64
    }

    /// Bottom edge (exclusive) in canvas coordinates.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.image.height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_new_validates_length() {
        assert!(Image::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            Image::new(2, 2, vec![0; 15]),
            Err(Error::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_image_zero_dimensions() {
        assert!(matches!(
            Image::new(0, 4, vec![]),
            Err(Error::InvalidDimensions(_))
        ));
        assert!(Image::transparent(4, 0).is_err());
    }

    #[test]
    fn test_get_pixel() {
        let mut data = vec![0u8; 2 * 2 * 4];
        data[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let img = Image::new(2, 2, data).unwrap();

        assert_eq!(img.get_pixel(1, 1), Some([1, 2, 3, 4]));
        assert_eq!(img.get_pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(2, 0), None);
        assert_eq!(img.get_pixel(0, 2), None);
    }

    #[test]
    fn test_filled() {
        let img = Image::filled(3, 2, [255, 0, 0, 255]).unwrap();
        assert_eq!(img.data().len(), 24);
        assert!(img.is_opaque());
        assert_eq!(img.row(1), &[255, 0, 0, 255, 255, 0, 0, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn test_animated_image_geometry() {
        let frame = AnimatedImage::new(Image::transparent(4, 3).unwrap(), 10).with_offset(5, 7);
        assert_eq!(frame.right(), 9);
        assert_eq!(frame.bottom(), 10);
        assert_eq!(frame.delay, 10);
    }
}
