//! PNG scanline filters.
//!
//! Every predictor is computed from the byte to the left (`a`), above (`b`)
//! and upper-left (`c`), with missing neighbours read as zero.

use rasterkit_core::{Error, Result};

/// PNG filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// No filter.
    None = 0,
    /// Sub filter (difference from left pixel).
    Sub = 1,
    /// Up filter (difference from pixel above).
    Up = 2,
    /// Average filter (average of left and above).
    Average = 3,
    /// Paeth filter (predictor based on left, above, upper-left).
    Paeth = 4,
}

impl FilterType {
    const ALL: [FilterType; 5] = [
        FilterType::None,
        FilterType::Sub,
        FilterType::Up,
        FilterType::Average,
        FilterType::Paeth,
    ];

    /// Create from byte value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FilterType::None),
            1 => Some(FilterType::Sub),
            2 => Some(FilterType::Up),
            3 => Some(FilterType::Average),
            4 => Some(FilterType::Paeth),
            _ => None,
        }
    }

    #[inline]
    fn predict(self, a: u8, b: u8, c: u8) -> u8 {
        match self {
            FilterType::None => 0,
            FilterType::Sub => a,
            FilterType::Up => b,
            FilterType::Average => ((a as u16 + b as u16) / 2) as u8,
            FilterType::Paeth => paeth_predictor(a, b, c),
        }
    }
}

/// Filter selection strategy for the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterStrategy {
    /// No filtering.
    None,
    /// Always use Sub filter.
    Sub,
    /// Always use Up filter.
    Up,
    /// Always use Average filter.
    Average,
    /// Always use Paeth filter.
    Paeth,
    /// Per row, the filter with the minimum sum of absolute values.
    #[default]
    Adaptive,
}

impl FilterStrategy {
    fn fixed(self) -> Option<FilterType> {
        match self {
            FilterStrategy::None => Some(FilterType::None),
            FilterStrategy::Sub => Some(FilterType::Sub),
            FilterStrategy::Up => Some(FilterType::Up),
            FilterStrategy::Average => Some(FilterType::Average),
            FilterStrategy::Paeth => Some(FilterType::Paeth),
            FilterStrategy::Adaptive => None,
        }
    }
}

/// Paeth predictor function.
#[inline]
pub fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let pa = (b as i16 - c as i16).abs();
    let pb = (a as i16 - c as i16).abs();
    let pc = (a as i16 + b as i16 - 2 * c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[inline]
fn neighbours(row: &[u8], previous: Option<&[u8]>, i: usize, bpp: usize) -> (u8, u8, u8) {
    let a = if i >= bpp { row[i - bpp] } else { 0 };
    let b = previous.map_or(0, |p| p[i]);
    let c = match previous {
        Some(p) if i >= bpp => p[i - bpp],
        _ => 0,
    };
    (a, b, c)
}

/// Reverse a filter in place. `previous` is the already unfiltered row above.
pub fn unfilter_row(filter: FilterType, current: &mut [u8], previous: Option<&[u8]>, bpp: usize) {
    if filter == FilterType::None {
        return;
    }
    for i in 0..current.len() {
        let (a, b, c) = neighbours(current, previous, i, bpp);
        current[i] = current[i].wrapping_add(filter.predict(a, b, c));
    }
}

/// Apply a filter to `current`, writing into `output`.
pub fn filter_row(
    filter: FilterType,
    current: &[u8],
    previous: Option<&[u8]>,
    bpp: usize,
    output: &mut [u8],
) {
    for i in 0..current.len() {
        let (a, b, c) = neighbours(current, previous, i, bpp);
        output[i] = current[i].wrapping_sub(filter.predict(a, b, c));
    }
}

/// Filter with the minimum sum of absolute (signed) residuals.
pub fn select_filter(current: &[u8], previous: Option<&[u8]>, bpp: usize) -> FilterType {
    let mut best = FilterType::None;
    let mut best_sum = u64::MAX;
    for filter in FilterType::ALL {
        let sum: u64 = (0..current.len())
            .map(|i| {
                let (a, b, c) = neighbours(current, previous, i, bpp);
                let residual = current[i].wrapping_sub(filter.predict(a, b, c));
                (residual as i8).unsigned_abs() as u64
            })
            .sum();
        if sum < best_sum {
            best_sum = sum;
            best = filter;
        }
    }
    best
}

/// Undo filtering on `height` scanlines of `row_bytes` bytes, each led by a
/// filter byte. Returns the raw rows and the number of input bytes used.
pub fn unfilter_scanlines(
    data: &[u8],
    row_bytes: usize,
    height: usize,
    bpp: usize,
) -> Result<(Vec<u8>, usize)> {
    let needed = (row_bytes + 1)
        .checked_mul(height)
        .ok_or_else(|| Error::corrupt("scanline size overflows"))?;
    if data.len() < needed {
        return Err(Error::corrupt(format!(
            "image data truncated: {} of {} bytes",
            data.len(),
            needed
        )));
    }

    let mut output = vec![0u8; row_bytes * height];
    for (y, line) in data[..needed].chunks_exact(row_bytes + 1).enumerate() {
        let filter = FilterType::from_u8(line[0])
            .ok_or_else(|| Error::corrupt(format!("unknown filter type {} in row {}", line[0], y)))?;
        let (done, rest) = output.split_at_mut(y * row_bytes);
        let current = &mut rest[..row_bytes];
        current.copy_from_slice(&line[1..]);
        let previous = (y > 0).then(|| &done[(y - 1) * row_bytes..]);
        unfilter_row(filter, current, previous, bpp);
    }
    Ok((output, needed))
}

/// Filter raw rows of `row_bytes` bytes, prefixing each with its filter byte.
pub fn filter_scanlines(
    data: &[u8],
    row_bytes: usize,
    bpp: usize,
    strategy: FilterStrategy,
) -> Vec<u8> {
    if row_bytes == 0 {
        return Vec::new();
    }
    let rows = data.len() / row_bytes;
    let mut output = Vec::with_capacity(rows * (row_bytes + 1));
    let mut filtered = vec![0u8; row_bytes];
    let mut previous: Option<&[u8]> = None;

    for row in data.chunks_exact(row_bytes) {
        let filter = strategy
            .fixed()
            .unwrap_or_else(|| select_filter(row, previous, bpp));
        filter_row(filter, row, previous, bpp, &mut filtered);
        output.push(filter as u8);
        output.extend_from_slice(&filtered);
        previous = Some(row);
    }
    output
}
