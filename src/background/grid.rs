//! Tile grid geometry and per-tile background estimation.
//!
//! The image is partitioned into a grid of rectangular tiles sized by
//! `box_size`. When the image dimensions are not exact multiples of the box,
//! the last tile in each dimension absorbs the remainder, so every pixel
//! belongs to exactly one tile.

use log::debug;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::background::BackgroundEstimator;
use crate::stats::{clip_unmasked, SigmaClipConfig};

/// Tile boundaries over a 2-D image.
///
/// `row_edges` and `col_edges` hold the half-open tile boundaries per axis:
/// tile `(i, j)` covers rows `row_edges[i]..row_edges[i + 1]` and columns
/// `col_edges[j]..col_edges[j + 1]`.
#[derive(Debug, Clone)]
pub(crate) struct TileGrid {
    row_edges: Vec<usize>,
    col_edges: Vec<usize>,
}

impl TileGrid {
    /// Build the tile grid for an image shape and box size.
    ///
    /// Assumes `box_size` has already been validated against `shape`
    /// (each dimension in `1..=image dimension`).
    pub fn new(shape: (usize, usize), box_size: (usize, usize)) -> Self {
        Self {
            row_edges: axis_edges(shape.0, box_size.0),
            col_edges: axis_edges(shape.1, box_size.1),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.row_edges.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.col_edges.len() - 1
    }

    /// Half-open pixel bounds of tile `(tile_row, tile_col)` as
    /// `(row_start, row_end, col_start, col_end)`.
    pub fn tile_bounds(&self, tile_row: usize, tile_col: usize) -> (usize, usize, usize, usize) {
        (
            self.row_edges[tile_row],
            self.row_edges[tile_row + 1],
            self.col_edges[tile_col],
            self.col_edges[tile_col + 1],
        )
    }

    /// Pixel-space row coordinate of each tile's center.
    pub fn row_centers(&self) -> Vec<f64> {
        axis_centers(&self.row_edges)
    }

    /// Pixel-space column coordinate of each tile's center.
    pub fn col_centers(&self) -> Vec<f64> {
        axis_centers(&self.col_edges)
    }
}

fn axis_edges(length: usize, box_len: usize) -> Vec<usize> {
    // Floor division, at least one tile; the final edge is clamped to the
    // axis length so the last tile absorbs any remainder.
    let n_tiles = (length / box_len).max(1);
    let mut edges: Vec<usize> = (0..n_tiles).map(|i| i * box_len).collect();
    edges.push(length);
    edges
}

fn axis_centers(edges: &[usize]) -> Vec<f64> {
    edges
        .windows(2)
        .map(|pair| (pair[0] + pair[1]) as f64 / 2.0 - 0.5)
        .collect()
}

/// Coarse background grid computed tile by tile.
pub(crate) struct GridEstimate {
    /// Per-tile background value; NaN marks a fully masked tile.
    pub values: Array2<f64>,
    /// Clipped standard deviation of each valid tile.
    pub tile_noise: Vec<f64>,
    /// Number of tiles with no unmasked samples.
    pub n_invalid: usize,
}

/// Run sigma-clipped estimation inside every tile.
///
/// Tiles are independent, so the loop is parallelized over tile indices;
/// iteration order has no effect on the per-tile results.
pub(crate) fn estimate_grid(
    image: ArrayView2<f64>,
    mask: Option<ArrayView2<bool>>,
    grid: &TileGrid,
    clip: &SigmaClipConfig,
    estimator: BackgroundEstimator,
) -> GridEstimate {
    let n_rows = grid.n_rows();
    let n_cols = grid.n_cols();

    let per_tile: Vec<(f64, f64)> = (0..n_rows * n_cols)
        .into_par_iter()
        .map(|index| {
            let (r0, r1, c0, c1) = grid.tile_bounds(index / n_cols, index % n_cols);

            let mut samples = Vec::with_capacity((r1 - r0) * (c1 - c0));
            for row in r0..r1 {
                for col in c0..c1 {
                    let excluded = mask.map(|m| m[[row, col]]).unwrap_or(false);
                    if !excluded {
                        samples.push(image[[row, col]]);
                    }
                }
            }

            let stats = clip_unmasked(samples, clip);
            if stats.is_no_data() {
                (f64::NAN, f64::NAN)
            } else {
                (estimator.reduce(&stats), stats.std_dev)
            }
        })
        .collect();

    let mut values = Array2::zeros((n_rows, n_cols));
    let mut tile_noise = Vec::new();
    let mut n_invalid = 0;
    for (index, &(value, noise)) in per_tile.iter().enumerate() {
        values[[index / n_cols, index % n_cols]] = value;
        if value.is_nan() {
            n_invalid += 1;
        } else {
            tile_noise.push(noise);
        }
    }

    GridEstimate {
        values,
        tile_noise,
        n_invalid,
    }
}

/// Replace NaN grid cells with the value of the nearest valid tile.
///
/// Searches outward in expanding square rings and takes the Manhattan-nearest
/// valid cell, so isolated masked tiles inherit their neighborhood's
/// background instead of propagating NaN into the smoothing step. Requires at
/// least one valid cell; the caller checks for the all-masked case first.
pub(crate) fn fill_invalid_tiles(grid: &Array2<f64>) -> Array2<f64> {
    let (n_rows, n_cols) = grid.dim();
    let valid = grid.mapv(|v| !v.is_nan());
    let mut filled = grid.clone();
    let mut n_filled = 0usize;

    for row in 0..n_rows {
        for col in 0..n_cols {
            if valid[[row, col]] {
                continue;
            }

            let mut best_dist = usize::MAX;
            let mut best_value = f64::NAN;
            for ring in 1..=n_rows.max(n_cols) {
                let row_lo = row.saturating_sub(ring);
                let row_hi = (row + ring + 1).min(n_rows);
                let col_lo = col.saturating_sub(ring);
                let col_hi = (col + ring + 1).min(n_cols);

                let mut found = false;
                for r in row_lo..row_hi {
                    for c in col_lo..col_hi {
                        if valid[[r, c]] {
                            let dist = row.abs_diff(r) + col.abs_diff(c);
                            if dist < best_dist {
                                best_dist = dist;
                                best_value = grid[[r, c]];
                                found = true;
                            }
                        }
                    }
                }
                if found {
                    break;
                }
            }

            filled[[row, col]] = best_value;
            n_filled += 1;
        }
    }

    debug!("filled {n_filled} fully masked tiles from valid neighbors");
    filled
}
