//! Upsampling of the smoothed background grid to image resolution.
//!
//! The grid holds one value per tile, anchored at the tile's center in pixel
//! coordinates. Full-resolution values come from separable bilinear
//! interpolation between the surrounding tile centers; pixels outside the
//! outermost centers clamp to the edge tiles. Tile centers need not be
//! evenly spaced, since edge tiles can absorb a remainder and be larger.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, Axis};

/// Interpolate the tile grid up to full image resolution.
///
/// # Arguments
/// * `grid` - Smoothed background grid, shape `(row_centers.len(), col_centers.len())`
/// * `row_centers` - Pixel-space row coordinate of each tile row's center,
///   strictly increasing
/// * `col_centers` - Pixel-space column coordinate of each tile column's
///   center, strictly increasing
/// * `shape` - Output `(height, width)`
///
/// # Returns
/// Full-resolution background, shape `shape`. A constant grid reproduces the
/// constant exactly.
pub fn resample_to_full(
    grid: ArrayView2<f64>,
    row_centers: &[f64],
    col_centers: &[f64],
    shape: (usize, usize),
) -> Array2<f64> {
    let row_weights = axis_weights(row_centers, shape.0);
    let col_weights = axis_weights(col_centers, shape.1);
    let n_rows = grid.nrows();
    let n_cols = grid.ncols();

    let mut background = Array2::zeros(shape);
    background
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut row)| {
            let (row_index, t_row) = row_weights[y];
            let row_next = (row_index + 1).min(n_rows - 1);
            for (x, value) in row.iter_mut().enumerate() {
                let (col_index, t_col) = col_weights[x];
                let col_next = (col_index + 1).min(n_cols - 1);

                let top = lerp(grid[[row_index, col_index]], grid[[row_index, col_next]], t_col);
                let bottom = lerp(grid[[row_next, col_index]], grid[[row_next, col_next]], t_col);
                *value = lerp(top, bottom, t_row);
            }
        });

    background
}

/// Linear interpolation in lerp form, exact at t = 0 and for a == b.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

/// Bracketing interval and interpolation parameter for each output pixel
/// along one axis.
///
/// Pixel `i` at coordinate `i as f64` maps to `(index, t)` such that the
/// interpolated value is `lerp(centers[index], centers[index + 1], t)`.
/// Coordinates before the first center clamp to `t = 0`, coordinates past
/// the last to `t = 1`; a single-center axis is constant.
fn axis_weights(centers: &[f64], n_out: usize) -> Vec<(usize, f64)> {
    (0..n_out)
        .map(|i| {
            let coord = i as f64;
            if centers.len() == 1 || coord <= centers[0] {
                return (0, 0.0);
            }
            let last = centers.len() - 1;
            if coord >= centers[last] {
                return (last - 1, 1.0);
            }
            // First center strictly greater than coord; coord is bracketed
            // by its predecessor.
            let upper = centers.partition_point(|&c| c <= coord);
            let index = upper - 1;
            let t = (coord - centers[index]) / (centers[upper] - centers[index]);
            (index, t)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_constant_grid_is_exact() {
        let grid = Array2::from_elem((2, 2), 5.0);
        let background = resample_to_full(grid.view(), &[2.0, 7.0], &[2.0, 7.0], (10, 10));

        assert_eq!(background.dim(), (10, 10));
        assert!(background.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_gradient_is_linear_between_centers() {
        let grid = arr2(&[[0.0, 10.0]]);
        let background = resample_to_full(grid.view(), &[0.0], &[0.0, 10.0], (1, 11));

        for x in 0..11 {
            assert_relative_eq!(background[[0, x]], x as f64);
        }
    }

    #[test]
    fn test_clamped_outside_outer_centers() {
        let grid = arr2(&[[1.0, 3.0], [5.0, 7.0]]);
        let background = resample_to_full(grid.view(), &[3.0, 6.0], &[3.0, 6.0], (10, 10));

        // Corners beyond the outermost tile centers hold the corner values.
        assert_eq!(background[[0, 0]], 1.0);
        assert_eq!(background[[0, 9]], 3.0);
        assert_eq!(background[[9, 0]], 5.0);
        assert_eq!(background[[9, 9]], 7.0);
    }

    #[test]
    fn test_single_tile_grid_is_flat() {
        let grid = arr2(&[[4.2]]);
        let background = resample_to_full(grid.view(), &[2.0], &[2.0], (5, 7));
        assert_eq!(background.dim(), (5, 7));
        assert!(background.iter().all(|&v| v == 4.2));
    }

    #[test]
    fn test_uneven_center_spacing() {
        // Edge tile absorbed a remainder: centers at 1.0 and 5.0.
        let grid = arr2(&[[0.0, 8.0]]);
        let background = resample_to_full(grid.view(), &[0.0], &[1.0, 5.0], (1, 7));

        assert_eq!(background[[0, 0]], 0.0); // clamped
        assert_relative_eq!(background[[0, 3]], 4.0); // halfway
        assert_eq!(background[[0, 6]], 8.0); // clamped past last center
    }
}
