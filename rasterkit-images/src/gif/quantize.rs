//! Palette construction for the GIF encoder.
//!
//! Images with at most `max_colors` distinct colours get an exact palette.
//! Anything richer is reduced with median cut and mapped to the nearest
//! entry. Pixels with alpha below 128 share one reserved transparent slot.

use std::collections::HashMap;

/// Alpha below this is written as the transparent index.
pub(crate) const ALPHA_THRESHOLD: u8 = 128;

/// Upper bound on pixels fed to median cut; larger inputs are sampled.
const MEDIAN_CUT_SAMPLES: usize = 1 << 18;

#[inline]
fn is_transparent(px: &[u8]) -> bool {
    px[3] < ALPHA_THRESHOLD
}

/// An indexed colour table plus the lookup used to map pixels into it.
#[derive(Debug, Clone)]
pub(crate) struct Palette {
    colors: Vec<[u8; 3]>,
    transparent: Option<u8>,
    lookup: HashMap<[u8; 3], u8>,
}

impl Palette {
    /// Exact palette for every pixel in `images`, in order of first
    /// appearance, or `None` if it would need more than `max_colors` entries.
    pub(crate) fn exact<'a>(
        images: impl IntoIterator<Item = &'a [u8]>,
        max_colors: usize,
    ) -> Option<Self> {
        let mut colors = Vec::new();
        let mut lookup = HashMap::new();
        let mut has_transparent = false;

        for data in images {
            for px in data.chunks_exact(4) {
                if is_transparent(px) {
                    has_transparent = true;
                    continue;
                }
                let rgb = [px[0], px[1], px[2]];
                if !lookup.contains_key(&rgb) {
                    if colors.len() >= max_colors {
                        return None;
                    }
                    lookup.insert(rgb, colors.len() as u8);
                    colors.push(rgb);
                }
            }
        }

        if has_transparent && colors.len() >= max_colors {
            return None;
        }
        Some(Self::finish(colors, lookup, has_transparent))
    }

    /// Median-cut palette for one image.
    pub(crate) fn median_cut(data: &[u8], max_colors: usize) -> Self {
        let has_transparent = data.chunks_exact(4).any(is_transparent);
        let target_boxes = max_colors.saturating_sub(has_transparent as usize).max(1);

        let opaque = data.chunks_exact(4).filter(|px| !is_transparent(px));
        let pixel_count = data.len() / 4;
        let step = (pixel_count / MEDIAN_CUT_SAMPLES).max(1);
        let samples: Vec<[u8; 3]> = opaque.step_by(step).map(|px| [px[0], px[1], px[2]]).collect();

        let mut boxes = vec![ColorBox::new(samples)];
        while boxes.len() < target_boxes {
            let widest = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.colors.len() > 1 && b.widest_range() > 0)
                .max_by_key(|(_, b)| b.colors.len() * b.widest_range() as usize)
                .map(|(i, _)| i);
            let Some(idx) = widest else {
                break;
            };
            let (a, b) = boxes.swap_remove(idx).split();
            boxes.push(a);
            boxes.push(b);
        }

        let mut colors: Vec<[u8; 3]> = Vec::with_capacity(boxes.len());
        let mut lookup = HashMap::new();
        for color in boxes.iter().filter(|b| !b.colors.is_empty()).map(ColorBox::average) {
            if !lookup.contains_key(&color) {
                lookup.insert(color, colors.len() as u8);
                colors.push(color);
            }
        }
        Self::finish(colors, lookup, has_transparent)
    }

    fn finish(mut colors: Vec<[u8; 3]>, lookup: HashMap<[u8; 3], u8>, has_transparent: bool) -> Self {
        let transparent = has_transparent.then(|| {
            colors.push([0, 0, 0]);
            (colors.len() - 1) as u8
        });
        if colors.is_empty() {
            colors.push([0, 0, 0]);
        }
        Self {
            colors,
            transparent,
            lookup,
        }
    }

    /// Palette entries, transparent slot included.
    pub(crate) fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// Index reserved for transparent pixels.
    pub(crate) fn transparent_index(&self) -> Option<u8> {
        self.transparent
    }

    /// Map RGBA pixels to palette indices.
    pub(crate) fn index_pixels(&mut self, data: &[u8]) -> Vec<u8> {
        data.chunks_exact(4).map(|px| self.index_of(px)).collect()
    }

    fn index_of(&mut self, px: &[u8]) -> u8 {
        if is_transparent(px) {
            if let Some(index) = self.transparent {
                return index;
            }
        }
        let rgb = [px[0], px[1], px[2]];
        if let Some(&index) = self.lookup.get(&rgb) {
            return index;
        }
        let index = self.nearest(&rgb);
        self.lookup.insert(rgb, index);
        index
    }

    fn nearest(&self, rgb: &[u8; 3]) -> u8 {
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, p) in self.colors.iter().enumerate() {
            if Some(i as u8) == self.transparent {
                continue;
            }
            let dr = rgb[0] as i32 - p[0] as i32;
            let dg = rgb[1] as i32 - p[1] as i32;
            let db = rgb[2] as i32 - p[2] as i32;
            let dist = (dr * dr + dg * dg + db * db) as u32;
            if dist < best_dist {
                best_dist = dist;
                best = i;
                if dist == 0 {
                    break;
                }
            }
        }
        best as u8
    }
}

/// Color box for median cut quantization.
struct ColorBox {
    colors: Vec<[u8; 3]>,
    range: [u8; 3],
}

impl ColorBox {
    fn new(colors: Vec<[u8; 3]>) -> Self {
        let mut min = [255u8; 3];
        let mut max = [0u8; 3];
        for color in &colors {
            for c in 0..3 {
                min[c] = min[c].min(color[c]);
                max[c] = max[c].max(color[c]);
            }
        }
        let range = [
            max[0].saturating_sub(min[0]),
            max[1].saturating_sub(min[1]),
            max[2].saturating_sub(min[2]),
        ];
        Self { colors, range }
    }

    fn widest_range(&self) -> u8 {
        self.range[0].max(self.range[1]).max(self.range[2])
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let channel = if self.range[0] >= self.range[1] && self.range[0] >= self.range[2] {
            0
        } else if self.range[1] >= self.range[2] {
            1
        } else {
            2
        };
        self.colors.sort_unstable_by_key(|c| c[channel]);
        let upper = self.colors.split_off(self.colors.len() / 2);
        (ColorBox::new(self.colors), ColorBox::new(upper))
    }

    fn average(&self) -> [u8; 3] {
        let mut sum = [0u64; 3];
        for color in &self.colors {
            for c in 0..3 {
                sum[c] += color[c] as u64;
            }
        }
        let n = self.colors.len().max(1) as u64;
        [
            ((sum[0] + n / 2) / n) as u8,
            ((sum[1] + n / 2) / n) as u8,
            ((sum[2] + n / 2) / n) as u8,
        ]
    }
}
