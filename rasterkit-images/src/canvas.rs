//! Logical canvas shared by the animated decoders.
//!
//! Both GIF and APNG describe frames as sub-rectangles drawn onto a
//! persistent canvas, with a disposal step that runs before the *next*
//! frame is drawn. [`Compositor`] owns that canvas and the single pending
//! disposal, and hands out a full-canvas snapshot per frame.

use std::mem;

use rasterkit_core::image::{buffer_len, CHANNELS};
use rasterkit_core::pixel::blend_row_over;
use rasterkit_core::{Image, Result};

/// A rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the rectangle lies entirely inside a `width` x `height` area.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    /// The part of the rectangle inside a `width` x `height` area.
    pub fn clip(&self, width: u32, height: u32) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = (self.x as u64 + self.width as u64).min(width as u64) as u32;
        let bottom = (self.y as u64 + self.height as u64).min(height as u64) as u32;
        Rect::new(x, y, right - x, bottom - y)
    }
}

/// How a frame's pixels combine with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    /// Replace the rectangle, alpha included.
    #[default]
    Source,
    /// Alpha-composite over the existing pixels.
    Over,
}

/// What happens to a frame's rectangle before the next frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposal {
    /// Leave the canvas as drawn.
    #[default]
    None,
    /// Clear the rectangle to transparent black.
    Background,
    /// Restore the canvas to how it was before the frame was drawn.
    Previous,
}

/// Disposal owed by the last drawn frame.
enum Pending {
    Nothing,
    Clear(Rect),
    Restore(Vec<u8>),
}

/// Frame-by-frame canvas state.
pub struct Compositor {
    width: u32,
    height: u32,
    canvas: Vec<u8>,
    pending: Pending,
}

impl Compositor {
    /// A fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = buffer_len(width, height)?;
        Ok(Self {
            width,
            height,
            canvas: vec![0; len],
            pending: Pending::Nothing,
        })
    }

    /// Canvas width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Draw one frame and return a snapshot of the resulting canvas.
    ///
    /// `pixels` holds `rect.width * rect.height` RGBA pixels. Parts of
    /// `rect` outside the canvas are clipped. `disposal` is recorded and
    /// applied when the next frame is drawn.
    pub fn draw(
        &mut self,
        rect: Rect,
        pixels: &[u8],
        blend: Blend,
        disposal: Disposal,
    ) -> Result<Image> {
        self.dispose_pending();

        let saved = match disposal {
            Disposal::Previous => Some(self.canvas.clone()),
            _ => None,
        };

        let visible = rect.clip(self.width, self.height);
        let src_stride = rect.width as usize * CHANNELS;
        let dst_stride = self.width as usize * CHANNELS;
        let row_bytes = visible.width as usize * CHANNELS;

        // Clipping only ever trims the right and bottom edges.
        for row in 0..visible.height as usize {
            let src_start = row * src_stride;
            let Some(src) = pixels.get(src_start..src_start + row_bytes) else {
                break;
            };
            let dst_start = (visible.y as usize + row) * dst_stride + visible.x as usize * CHANNELS;
            let dst = &mut self.canvas[dst_start..dst_start + row_bytes];
            match blend {
                Blend::Source => dst.copy_from_slice(src),
                Blend::Over => blend_row_over(src, dst),
            }
        }

        self.pending = match (disposal, saved) {
            (Disposal::Previous, Some(buffer)) => Pending::Restore(buffer),
            (Disposal::Background, _) => Pending::Clear(visible),
            _ => Pending::Nothing,
        };

        Image::new(self.width, self.height, self.canvas.clone())
    }

    /// The current canvas, ignoring any pending disposal.
    pub fn snapshot(&self) -> Result<Image> {
        Image::new(self.width, self.height, self.canvas.clone())
    }

    fn dispose_pending(&mut self) {
        match mem::replace(&mut self.pending, Pending::Nothing) {
            Pending::Nothing => {}
            Pending::Restore(buffer) => self.canvas = buffer,
            Pending::Clear(rect) => {
                let stride = self.width as usize * CHANNELS;
                for y in rect.y..rect.y + rect.height {
                    let start = y as usize * stride + rect.x as usize * CHANNELS;
                    self.canvas[start..start + rect.width as usize * CHANNELS].fill(0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.iter().copied().cycle().take((w * h * 4) as usize).collect()
    }

    #[test]
    fn test_rect_clip() {
        assert_eq!(Rect::new(2, 2, 4, 4).clip(4, 5), Rect::new(2, 2, 2, 3));
        assert!(Rect::new(10, 0, 4, 4).clip(4, 4).is_empty());
        assert!(Rect::new(0, 0, 4, 4).fits_within(4, 4));
        assert!(!Rect::new(1, 0, 4, 4).fits_within(4, 4));
    }

    #[test]
    fn test_draw_source_and_keep() {
        let mut comp = Compositor::new(4, 4).unwrap();
        let red = solid(2, 2, [255, 0, 0, 255]);
        let frame = comp
            .draw(Rect::new(1, 1, 2, 2), &red, Blend::Source, Disposal::None)
            .unwrap();
        assert_eq!(frame.get_pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(frame.get_pixel(0, 0), Some([0, 0, 0, 0]));

        let blue = solid(1, 1, [0, 0, 255, 255]);
        let frame = comp
            .draw(Rect::new(0, 0, 1, 1), &blue, Blend::Source, Disposal::None)
            .unwrap();
        assert_eq!(frame.get_pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(frame.get_pixel(0, 0), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_dispose_background() {
        let mut comp = Compositor::new(3, 3).unwrap();
        let white = solid(3, 3, [255; 4]);
        comp.draw(Rect::new(0, 0, 3, 3), &white, Blend::Source, Disposal::None)
            .unwrap();
        let red = solid(1, 1, [255, 0, 0, 255]);
        comp.draw(Rect::new(1, 1, 1, 1), &red, Blend::Source, Disposal::Background)
            .unwrap();

        let clear = solid(1, 1, [0, 0, 0, 0]);
        let frame = comp
            .draw(Rect::new(0, 0, 1, 1), &clear, Blend::Over, Disposal::None)
            .unwrap();
        assert_eq!(frame.get_pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(frame.get_pixel(2, 2), Some([255; 4]));
    }

    #[test]
    fn test_dispose_previous() {
        let mut comp = Compositor::new(2, 2).unwrap();
        let green = solid(2, 2, [0, 255, 0, 255]);
        comp.draw(Rect::new(0, 0, 2, 2), &green, Blend::Source, Disposal::None)
            .unwrap();
        let red = solid(2, 2, [255, 0, 0, 255]);
        let shown = comp
            .draw(Rect::new(0, 0, 2, 2), &red, Blend::Source, Disposal::Previous)
            .unwrap();
        assert_eq!(shown.get_pixel(0, 0), Some([255, 0, 0, 255]));

        let nothing = solid(1, 1, [0, 0, 0, 0]);
        let frame = comp
            .draw(Rect::new(0, 0, 1, 1), &nothing, Blend::Over, Disposal::None)
            .unwrap();
        assert_eq!(frame.get_pixel(1, 1), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_draw_clips_offscreen_pixels() {
        let mut comp = Compositor::new(2, 2).unwrap();
        let mut pixels = solid(3, 1, [9, 9, 9, 255]);
        pixels[8..12].copy_from_slice(&[1, 2, 3, 255]);
        let frame = comp
            .draw(Rect::new(1, 1, 3, 1), &pixels, Blend::Source, Disposal::None)
            .unwrap();
        assert_eq!(frame.get_pixel(1, 1), Some([9, 9, 9, 255]));
        assert_eq!(frame.get_pixel(0, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_blend_over_keeps_transparent_pixels() {
        let mut comp = Compositor::new(2, 1).unwrap();
        comp.draw(Rect::new(0, 0, 2, 1), &solid(2, 1, [7, 7, 7, 255]), Blend::Source, Disposal::None)
            .unwrap();
        let pixels = [0, 0, 0, 0, 50, 60, 70, 255];
        let frame = comp
            .draw(Rect::new(0, 0, 2, 1), &pixels, Blend::Over, Disposal::None)
            .unwrap();
        assert_eq!(frame.data(), &[7, 7, 7, 255, 50, 60, 70, 255]);
    }
}
