//! Overlay compositing.

use rasterkit_core::image::CHANNELS;
use rasterkit_core::pixel::blend_row_over;
use rasterkit_core::{Image, Result};
use tracing::trace;

/// Blend `overlay` over `image` with its top-left corner at (`x`, `y`).
///
/// The offset may be negative or reach past the far edge; whatever falls
/// outside `image` is dropped. The result always has `image`'s size.
pub fn composite(image: &Image, overlay: &Image, x: i64, y: i64) -> Result<Image> {
    let mut data = image.data().to_vec();

    let left = x.max(0);
    let top = y.max(0);
    let right = x
        .saturating_add(overlay.width() as i64)
        .min(image.width() as i64);
    let bottom = y
        .saturating_add(overlay.height() as i64)
        .min(image.height() as i64);

    if left >= right || top >= bottom {
        trace!(x, y, "overlay lies entirely outside the image");
        return Ok(image.clone());
    }

    let stride = image.stride();
    let src_start = (left - x) as usize * CHANNELS;
    let src_end = (right - x) as usize * CHANNELS;
    for dst_y in top..bottom {
        let src = &overlay.row((dst_y - y) as u32)[src_start..src_end];
        let offset = dst_y as usize * stride + left as usize * CHANNELS;
        blend_row_over(src, &mut data[offset..offset + src.len()]);
    }

    Image::new(image.width(), image.height(), data)
}
