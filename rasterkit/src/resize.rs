//! Bilinear resizing.
//!
//! Sample positions are pixel-centre aligned and clamped to the source edge,
//! so a resize never reads outside the image and never darkens borders.

use rasterkit_core::image::{buffer_len, CHANNELS};
use rasterkit_core::{Error, Image, Result};
use tracing::trace;

/// Where one output column (or row) reads from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    near: u32,
    far: u32,
    weight: f64,
}

/// Height that keeps the aspect ratio at `target_width`, rounded half up,
/// never below 1.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> Result<u32> {
    if width == 0 || height == 0 || target_width == 0 {
        return Err(Error::dimensions(format!(
            "cannot scale {}x{} to width {}",
            width, height, target_width
        )));
    }
    let width = width as u64;
    let scaled = (height as u64 * target_width as u64 + width / 2) / width;
    u32::try_from(scaled.max(1))
        .map_err(|_| Error::dimensions(format!("scaled height {} is too large", scaled)))
}

/// Resize to `target_width`, keeping the aspect ratio.
///
/// Every channel, alpha included, is interpolated independently. A resize
/// to the current width returns an identical copy.
pub fn resize(image: &Image, target_width: u32) -> Result<Image> {
    let target_height = scaled_height(image.width(), image.height(), target_width)?;
    if target_width == image.width() && target_height == image.height() {
        return Ok(image.clone());
    }
    trace!(
        from_width = image.width(),
        from_height = image.height(),
        target_width,
        target_height,
        "bilinear resize"
    );

    let columns = axis_samples(image.width(), target_width);
    let rows = axis_samples(image.height(), target_height);

    let mut data = Vec::with_capacity(buffer_len(target_width, target_height)?);
    for row in &rows {
        let top = image.row(row.near);
        let bottom = image.row(row.far);
        for column in &columns {
            let near = column.near as usize * CHANNELS;
            let far = column.far as usize * CHANNELS;
            for c in 0..CHANNELS {
                let upper = lerp(top[near + c], top[far + c], column.weight);
                let lower = lerp(bottom[near + c], bottom[far + c], column.weight);
                let value = upper + (lower - upper) * row.weight;
                data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    Image::new(target_width, target_height, data)
}

fn axis_samples(source: u32, target: u32) -> Vec<Sample> {
    let ratio = source as f64 / target as f64;
    let last = (source - 1) as f64;
    (0..target)
        .map(|i| {
            let position = ((i as f64 + 0.5) * ratio - 0.5).clamp(0.0, last);
            let near = position.floor() as u32;
            Sample {
                near,
                far: (near + 1).min(source - 1),
                weight: position - near as f64,
            }
        })
        .collect()
}

#[inline]
fn lerp(a: u8, b: u8, t: f64) -> f64 {
    a as f64 + (b as f64 - a as f64) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_row(values: &[u8]) -> Image {
        let data = values.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Image::new(values.len() as u32, 1, data).unwrap()
    }

    #[test]
    fn test_scaled_height() {
        assert_eq!(scaled_height(4, 3, 2).unwrap(), 2);
        assert_eq!(scaled_height(4, 2, 3).unwrap(), 2);
        assert_eq!(scaled_height(100, 1, 10).unwrap(), 1);
        assert_eq!(scaled_height(3, 1, 1).unwrap(), 1);
        assert_eq!(scaled_height(2, 3, 1).unwrap(), 2);
    }

    #[test]
    fn test_zero_target_width() {
        let image = gray_row(&[1, 2]);
        assert!(matches!(resize(&image, 0), Err(Error::InvalidDimensions(_))));
    }

    #[test]
    fn test_same_size_is_identical() {
        let image = gray_row(&[3, 99, 250]);
        assert_eq!(resize(&image, 3).unwrap(), image);
    }

    #[test]
    fn test_upscale_solid_stays_solid() {
        let image = Image::filled(1, 1, [10, 20, 30, 40]).unwrap();
        let out = resize(&image, 4).unwrap();
        assert_eq!((out.width(), out.height()), (4, 4));
        assert!(out.data().chunks_exact(4).all(|p| p == [10, 20, 30, 40]));
    }

    #[test]
    fn test_upscale_gradient() {
        let data = vec![0, 0, 0, 0, 200, 200, 200, 255];
        let image = Image::new(2, 1, data).unwrap();
        let out = resize(&image, 4).unwrap();
        assert_eq!(out.height(), 2);
        let reds: Vec<u8> = out.row(0).chunks_exact(4).map(|p| p[0]).collect();
        let alphas: Vec<u8> = out.row(0).chunks_exact(4).map(|p| p[3]).collect();
        assert_eq!(reds, vec![0, 50, 150, 200]);
        assert_eq!(alphas, vec![0, 64, 191, 255]);
        assert_eq!(out.row(0), out.row(1));
    }

    #[test]
    fn test_downscale_averages_pairs() {
        let mut data = Vec::new();
        for _ in 0..2 {
            for v in [0u8, 100, 200, 40] {
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let image = Image::new(4, 2, data).unwrap();
        let out = resize(&image, 2).unwrap();
        assert_eq!((out.width(), out.height()), (2, 1));
        assert_eq!(out.get_pixel(0, 0), Some([50, 50, 50, 255]));
        assert_eq!(out.get_pixel(1, 0), Some([120, 120, 120, 255]));
    }

    #[test]
    fn test_axis_samples_clamp_to_edges() {
        let samples = axis_samples(2, 4);
        assert_eq!(samples[0], Sample { near: 0, far: 1, weight: 0.0 });
        assert_eq!(samples[3], Sample { near: 1, far: 1, weight: 0.0 });
    }
}
