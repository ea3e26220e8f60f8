//! Tiled 2-D background estimation for astronomical images.
//!
//! The image is partitioned into tiles, each tile gets a sigma-clipped
//! scalar background estimate, the coarse grid is median-filtered, and the
//! result is interpolated back up to full image resolution. Subtracting the
//! returned map from the input frame removes spatially varying sky
//! background while robust per-tile statistics keep stars from biasing the
//! estimate.

pub mod filter;
mod grid;
pub mod interpolate;

use log::debug;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::BackgroundError;
use crate::stats::{median, ClippedStats, SigmaClipConfig};
use filter::median_filter_grid;
use grid::{estimate_grid, fill_invalid_tiles, TileGrid};

/// Scalar reduction applied to each tile's sigma-clipped statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackgroundEstimator {
    /// Clipped mean.
    Mean,

    /// Clipped median.
    Median,

    /// SExtractor mode estimate, `2.5 * median - 1.5 * mean`. Falls back to
    /// the median when the clipped distribution is degenerate (zero std) or
    /// strongly skewed (`|mean - median| > 0.3 * std`).
    #[default]
    SExtractor,
}

impl BackgroundEstimator {
    pub(crate) fn reduce(&self, stats: &ClippedStats) -> f64 {
        match self {
            Self::Mean => stats.mean,
            Self::Median => stats.median,
            Self::SExtractor => {
                if stats.std_dev == 0.0 {
                    return stats.median;
                }
                if (stats.mean - stats.median).abs() > 0.3 * stats.std_dev {
                    return stats.median;
                }
                2.5 * stats.median - 1.5 * stats.mean
            }
        }
    }
}

/// Configuration for tiled background estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Tile size `(rows, cols)`. Each dimension must be at least 1 and no
    /// larger than the corresponding image dimension.
    pub box_size: (usize, usize),

    /// Median filter window `(rows, cols)` applied to the tile grid. Both
    /// dimensions must be odd and positive; `(1, 1)` disables smoothing.
    pub filter_size: (usize, usize),

    /// If set, only grid cells strictly above this value are smoothed.
    pub filter_threshold: Option<f64>,

    /// Sigma clipping applied within each tile.
    pub sigma_clip: SigmaClipConfig,

    /// Per-tile scalar estimator.
    pub estimator: BackgroundEstimator,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            box_size: (64, 64),
            filter_size: (3, 3),
            filter_threshold: None,
            sigma_clip: SigmaClipConfig::default(),
            estimator: BackgroundEstimator::default(),
        }
    }
}

/// Computed background model for one image.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    /// Full-resolution background map, same shape as the input image.
    pub background: Array2<f64>,

    /// Smoothed low-resolution tile grid the map was interpolated from.
    pub grid: Array2<f64>,

    /// Global scalar background level: median of the smoothed grid.
    pub background_level: f64,

    /// Global noise estimate: median of the valid tiles' clipped standard
    /// deviations.
    pub noise_level: f64,
}

impl BackgroundModel {
    /// Subtract the background map from an image elementwise.
    ///
    /// The image must have the same shape as the map the model was built
    /// from.
    pub fn subtract_from(&self, image: ArrayView2<f64>) -> Array2<f64> {
        image.to_owned() - &self.background
    }
}

/// Estimate a 2-D background model for an image.
///
/// Runs the four estimation steps in sequence: tile the image (the last
/// tile per dimension absorbs any remainder), compute a sigma-clipped
/// estimate per tile (fully masked tiles are filled from their nearest valid
/// neighbor), median-filter the tile grid, and interpolate the grid back to
/// full resolution. Inputs are never mutated.
///
/// # Arguments
/// * `image` - Input frame, shape `(height, width)`
/// * `mask` - Optional pixel mask, `true` excluding a pixel from all
///   statistics; must match the image shape
/// * `config` - Tiling, clipping, smoothing, and estimator settings
///
/// # Returns
/// * `Ok(BackgroundModel)` - Background map (same shape as `image`) plus
///   grid and scalar diagnostics
/// * `Err(BackgroundError::InvalidBoxSize)` - Box dimension zero or larger
///   than the image
/// * `Err(BackgroundError::InvalidFilterSize)` - Even or zero filter
///   dimension
/// * `Err(BackgroundError::InvalidSigma)` - Non-positive clipping threshold
/// * `Err(BackgroundError::ShapeMismatch)` - Mask shape differs from image
/// * `Err(BackgroundError::InsufficientData)` - Every tile fully masked
pub fn estimate_background(
    image: ArrayView2<f64>,
    mask: Option<ArrayView2<bool>>,
    config: &BackgroundConfig,
) -> Result<BackgroundModel, BackgroundError> {
    let (height, width) = image.dim();
    let (box_rows, box_cols) = config.box_size;
    let (filter_rows, filter_cols) = config.filter_size;

    if box_rows == 0 || box_cols == 0 || box_rows > height || box_cols > width {
        return Err(BackgroundError::InvalidBoxSize(
            box_rows, box_cols, height, width,
        ));
    }
    if filter_rows % 2 == 0 || filter_cols % 2 == 0 {
        return Err(BackgroundError::InvalidFilterSize(filter_rows, filter_cols));
    }
    config.sigma_clip.validate()?;
    if let Some(mask) = mask {
        if mask.dim() != image.dim() {
            let (mask_rows, mask_cols) = mask.dim();
            return Err(BackgroundError::ShapeMismatch(
                mask_rows, mask_cols, height, width,
            ));
        }
    }

    let tiles = TileGrid::new((height, width), config.box_size);
    debug!(
        "estimating background over a {}x{} tile grid for a {height}x{width} image",
        tiles.n_rows(),
        tiles.n_cols()
    );

    let estimate = estimate_grid(image, mask, &tiles, &config.sigma_clip, config.estimator);
    let n_tiles = tiles.n_rows() * tiles.n_cols();
    if estimate.n_invalid == n_tiles {
        return Err(BackgroundError::InsufficientData);
    }

    let coarse = if estimate.n_invalid > 0 {
        fill_invalid_tiles(&estimate.values)
    } else {
        estimate.values
    };

    let smoothed = median_filter_grid(coarse.view(), config.filter_size, config.filter_threshold);

    let background = interpolate::resample_to_full(
        smoothed.view(),
        &tiles.row_centers(),
        &tiles.col_centers(),
        (height, width),
    );

    let grid_values: Vec<f64> = smoothed.iter().copied().collect();
    Ok(BackgroundModel {
        background,
        grid: smoothed,
        background_level: median(&grid_values),
        noise_level: median(&estimate.tile_noise),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn config_with_box(box_size: (usize, usize)) -> BackgroundConfig {
        BackgroundConfig {
            box_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_constant_image_gives_constant_background() {
        let image = Array2::from_elem((10, 10), 5.0);
        let model = estimate_background(image.view(), None, &config_with_box((5, 5))).unwrap();

        assert_eq!(model.background.dim(), (10, 10));
        assert!(model.background.iter().all(|&v| v == 5.0));
        assert_eq!(model.background_level, 5.0);
        assert_eq!(model.noise_level, 0.0);

        let residual = model.subtract_from(image.view());
        assert!(residual.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_output_shape_matches_image() {
        for &(shape, box_size) in &[
            ((17, 23), (5, 7)),
            ((8, 8), (8, 8)),
            ((30, 10), (7, 3)),
            ((5, 5), (1, 1)),
        ] {
            let image = Array2::from_elem(shape, 1.0);
            let model = estimate_background(image.view(), None, &config_with_box(box_size))
                .unwrap_or_else(|e| panic!("shape {shape:?} box {box_size:?}: {e}"));
            assert_eq!(model.background.dim(), shape);
        }
    }

    #[test]
    fn test_invalid_box_size_rejected() {
        let image = Array2::from_elem((10, 10), 1.0);
        assert_eq!(
            estimate_background(image.view(), None, &config_with_box((0, 5))).unwrap_err(),
            BackgroundError::InvalidBoxSize(0, 5, 10, 10)
        );
        assert!(matches!(
            estimate_background(image.view(), None, &config_with_box((5, 11))),
            Err(BackgroundError::InvalidBoxSize(..))
        ));
    }

    #[test]
    fn test_even_filter_size_rejected() {
        let image = Array2::from_elem((10, 10), 1.0);
        let config = BackgroundConfig {
            box_size: (5, 5),
            filter_size: (2, 3),
            ..Default::default()
        };
        assert_eq!(
            estimate_background(image.view(), None, &config).unwrap_err(),
            BackgroundError::InvalidFilterSize(2, 3)
        );

        let zero = BackgroundConfig {
            filter_size: (3, 0),
            ..config
        };
        assert!(estimate_background(image.view(), None, &zero).is_err());
    }

    #[test]
    fn test_mask_shape_mismatch_rejected() {
        let image = Array2::from_elem((10, 10), 1.0);
        let mask = Array2::from_elem((10, 9), false);
        assert_eq!(
            estimate_background(image.view(), Some(mask.view()), &config_with_box((5, 5)))
                .unwrap_err(),
            BackgroundError::ShapeMismatch(10, 9, 10, 10)
        );
    }

    #[test]
    fn test_all_masked_is_insufficient_data() {
        let image = Array2::from_elem((10, 10), 1.0);
        let mask = Array2::from_elem((10, 10), true);
        assert_eq!(
            estimate_background(image.view(), Some(mask.view()), &config_with_box((5, 5)))
                .unwrap_err(),
            BackgroundError::InsufficientData
        );
    }

    #[test]
    fn test_half_masked_image_fills_from_valid_tiles() {
        // Top half masked out entirely; valid bottom tiles must propagate
        // upward instead of raising an error.
        let image = Array2::from_elem((20, 20), 7.0);
        let mut mask = Array2::from_elem((20, 20), false);
        for row in 0..10 {
            for col in 0..20 {
                mask[[row, col]] = true;
            }
        }

        let model =
            estimate_background(image.view(), Some(mask.view()), &config_with_box((5, 5))).unwrap();
        assert!(model.background.iter().all(|&v| (v - 7.0).abs() < 1e-12));
    }

    #[test]
    fn test_gradient_background_recovered() {
        // Smooth horizontal gradient, no outliers: the model should track it
        // closely away from the clamped borders.
        let image = Array2::from_shape_fn((64, 64), |(_, col)| 100.0 + col as f64);
        let model = estimate_background(image.view(), None, &config_with_box((8, 8))).unwrap();

        for row in 0..64 {
            for col in 8..56 {
                let expected = 100.0 + col as f64;
                assert_relative_eq!(model.background[[row, col]], expected, epsilon = 2.0);
            }
        }
    }

    #[test]
    fn test_estimator_dispatch() {
        let stats = ClippedStats {
            mean: 10.0,
            median: 9.9,
            std_dev: 1.0,
            count: 100,
        };
        assert_eq!(BackgroundEstimator::Mean.reduce(&stats), 10.0);
        assert_eq!(BackgroundEstimator::Median.reduce(&stats), 9.9);
        assert_relative_eq!(
            BackgroundEstimator::SExtractor.reduce(&stats),
            2.5 * 9.9 - 1.5 * 10.0
        );

        // Skewed distribution falls back to the median.
        let skewed = ClippedStats {
            mean: 12.0,
            median: 9.0,
            std_dev: 1.0,
            count: 100,
        };
        assert_eq!(BackgroundEstimator::SExtractor.reduce(&skewed), 9.0);

        // Degenerate (zero-variance) tile also returns the median.
        let flat = ClippedStats {
            mean: 5.0,
            median: 5.0,
            std_dev: 0.0,
            count: 25,
        };
        assert_eq!(BackgroundEstimator::SExtractor.reduce(&flat), 5.0);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let image = Array2::from_shape_fn((12, 12), |(r, c)| (r * 12 + c) as f64);
        let mask = Array2::from_shape_fn((12, 12), |(r, _)| r == 0);
        let image_before = image.clone();
        let mask_before = mask.clone();

        estimate_background(image.view(), Some(mask.view()), &config_with_box((4, 4))).unwrap();
        assert_eq!(image, image_before);
        assert_eq!(mask, mask_before);
    }
}
