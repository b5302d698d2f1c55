//! Per-pixel blending.

use crate::image::Rgba;

/// Composite `src` over `dst` (Porter-Duff source-over, straight alpha).
///
/// Integer arithmetic with round-to-nearest, so the result is identical on
/// every platform.
#[inline]
pub fn blend_over(src: Rgba, dst: Rgba) -> Rgba {
    let sa = src[3] as u32;
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = dst[3] as u32;

    // Output alpha scaled by 255.
    let dst_weight = da * (255 - sa);
    let out_a = sa * 255 + dst_weight;

    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = src[c] as u32 * sa * 255 + dst[c] as u32 * dst_weight;
        out[c] = ((v + out_a / 2) / out_a) as u8;
    }
    out[3] = ((out_a + 127) / 255) as u8;
    out
}

/// Blend a row of `src` pixels over `dst` in place.
pub fn blend_row_over(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let out = blend_over([s[0], s[1], s[2], s[3]], [d[0], d[1], d[2], d[3]]);
        d.copy_from_slice(&out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_source_replaces() {
        assert_eq!(blend_over([1, 2, 3, 255], [9, 9, 9, 255]), [1, 2, 3, 255]);
    }

    #[test]
    fn test_transparent_source_keeps_destination() {
        assert_eq!(blend_over([1, 2, 3, 0], [9, 8, 7, 6]), [9, 8, 7, 6]);
    }

    #[test]
    fn test_half_over_opaque() {
        let out = blend_over([255, 0, 0, 128], [0, 0, 255, 255]);
        assert_eq!(out[3], 255);
        assert_eq!(out[0], 128);
        assert_eq!(out[2], 127);
    }

    #[test]
    fn test_over_transparent_destination() {
        // Nothing underneath: colour is the source colour, alpha the source alpha.
        assert_eq!(blend_over([200, 100, 50, 77], [0, 0, 0, 0]), [200, 100, 50, 77]);
    }

    #[test]
    fn test_blend_row() {
        let src = [10, 20, 30, 255, 0, 0, 0, 0];
        let mut dst = [1, 1, 1, 255, 5, 5, 5, 255];
        blend_row_over(&src, &mut dst);
        assert_eq!(dst, [10, 20, 30, 255, 5, 5, 5, 255]);
    }
}
