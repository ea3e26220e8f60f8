//! 2-D median filtering of the coarse background grid.
//!
//! A small median filter over the tile grid suppresses single-tile outliers
//! (a tile dominated by a bright extended source, for example) before the
//! grid is interpolated back up to image resolution.

use ndarray::{Array2, ArrayView2};

use crate::stats::median;

/// Apply a 2-D median filter to the background grid.
///
/// The window is centered on each cell and truncated at the grid borders;
/// border cells take the median of the in-bounds window cells only. A
/// `(1, 1)` filter is the identity.
///
/// If `threshold` is given, only cells whose value is strictly greater than
/// the threshold are smoothed; cells at or below it pass through unchanged.
/// This keeps genuine low-background regions from being blurred into
/// neighboring higher values.
///
/// # Arguments
/// * `grid` - Coarse background grid (one value per tile)
/// * `filter_size` - Window `(rows, cols)`; both must be odd and positive,
///   which the caller validates
/// * `threshold` - Optional pass-through threshold
///
/// # Returns
/// Filtered grid with the same shape as the input.
pub fn median_filter_grid(
    grid: ArrayView2<f64>,
    filter_size: (usize, usize),
    threshold: Option<f64>,
) -> Array2<f64> {
    if filter_size == (1, 1) {
        return grid.to_owned();
    }

    let (n_rows, n_cols) = grid.dim();
    let half_rows = filter_size.0 / 2;
    let half_cols = filter_size.1 / 2;

    let mut window = Vec::with_capacity(filter_size.0 * filter_size.1);
    let mut filtered = grid.to_owned();

    for row in 0..n_rows {
        for col in 0..n_cols {
            if let Some(threshold) = threshold {
                if grid[[row, col]] <= threshold {
                    continue;
                }
            }

            let row_lo = row.saturating_sub(half_rows);
            let row_hi = (row + half_rows + 1).min(n_rows);
            let col_lo = col.saturating_sub(half_cols);
            let col_hi = (col + half_cols + 1).min(n_cols);

            window.clear();
            for r in row_lo..row_hi {
                for c in col_lo..col_hi {
                    window.push(grid[[r, c]]);
                }
            }
            filtered[[row, col]] = median(&window);
        }
    }

    filtered
}
