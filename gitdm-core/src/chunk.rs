//! Greedy, order-preserving page planning.

use std::ops::Range;

use crate::size::EstimatedSize;

/// Default soft cap on the estimated size of one page: 1 MiB minus 8 bytes.
pub const MAX_PAGE_BYTES: usize = (1 << 20) - 8;

/// Split `items` into contiguous ranges whose summed estimated size stays
/// within `cap`.
///
/// A range is closed just before the item that would push it over the cap.
/// An item that alone exceeds the cap still gets its own range, so the cap is
/// soft. Ranges cover `0..items.len()` exactly, in order; empty input yields
/// no ranges.
pub fn plan_chunks<T: EstimatedSize>(items: &[T], cap: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut from = 0;
    let mut current = 0usize;

    for (i, item) in items.iter().enumerate() {
        let size = item.estimated_size();
        if i > from && current + size > cap {
            ranges.push(from..i);
            from = i;
            current = 0;
        }
        current += size;
    }
    if from < items.len() {
        ranges.push(from..items.len());
    }
    ranges
}
