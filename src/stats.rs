//! Sigma-clipped statistics over optionally masked sample sets.
//!
//! Sigma clipping iteratively discards samples that sit too far from the
//! running mean, measured in units of the running standard deviation. It is
//! the standard robust estimator for sky background levels in astronomical
//! frames, where bright stars would otherwise drag a plain mean upward.
//!
//! The main entry point is [`sigma_clipped_stats`], which returns the mean,
//! median, and standard deviation of the surviving samples as a
//! [`ClippedStats`].

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::error::BackgroundError;

/// Configuration for iterative sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaClipConfig {
    /// Clipping threshold in units of the working set's standard deviation.
    /// Must be positive.
    pub sigma: f64,

    /// Maximum number of clipping rounds. Zero disables clipping entirely;
    /// the statistics are then computed over all unmasked samples.
    pub max_iterations: usize,
}

impl Default for SigmaClipConfig {
    fn default() -> Self {
        Self {
            sigma: 3.0,
            max_iterations: 5,
        }
    }
}

impl SigmaClipConfig {
    /// Create a config, rejecting non-positive (or NaN) sigma thresholds.
    pub fn new(sigma: f64, max_iterations: usize) -> Result<Self, BackgroundError> {
        let config = Self {
            sigma,
            max_iterations,
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), BackgroundError> {
        if self.sigma > 0.0 {
            Ok(())
        } else {
            Err(BackgroundError::InvalidSigma(self.sigma))
        }
    }
}

/// Statistics of a sigma-clipped sample set.
///
/// When the input contains no unmasked samples, all three statistics are the
/// NaN "no data" sentinel and `count` is zero; see [`ClippedStats::NO_DATA`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedStats {
    /// Mean of the surviving samples.
    pub mean: f64,
    /// Median of the surviving samples.
    pub median: f64,
    /// Population standard deviation of the surviving samples.
    pub std_dev: f64,
    /// Number of samples that survived clipping.
    pub count: usize,
}

impl ClippedStats {
    /// Sentinel returned when there is nothing to measure.
    pub const NO_DATA: ClippedStats = ClippedStats {
        mean: f64::NAN,
        median: f64::NAN,
        std_dev: f64::NAN,
        count: 0,
    };

    /// True if this result is the no-data sentinel.
    pub fn is_no_data(&self) -> bool {
        self.count == 0
    }
}

/// Compute sigma-clipped mean, median, and standard deviation.
///
/// The working set starts as every sample whose mask entry is `false` (or
/// every sample, if no mask is given). Each round computes the mean and
/// standard deviation of the working set and discards samples whose absolute
/// deviation from the mean is strictly greater than `sigma * std`. Clipping
/// stops early once a round discards nothing, and always after
/// `max_iterations` rounds. If a round would empty the working set, the last
/// non-empty set is kept instead.
///
/// # Arguments
/// * `samples` - Sample values; may be empty
/// * `mask` - Optional exclusion mask, `true` meaning "ignore this sample";
///   must have the same length as `samples`
/// * `config` - Clipping threshold and iteration cap
///
/// # Returns
/// * `Ok(ClippedStats)` - Statistics over the final working set, or
///   [`ClippedStats::NO_DATA`] if no unmasked samples exist
/// * `Err(BackgroundError::InvalidSigma)` - Non-positive sigma threshold
/// * `Err(BackgroundError::MaskLengthMismatch)` - Mask/sample length differ
pub fn sigma_clipped_stats(
    samples: &[f64],
    mask: Option<&[bool]>,
    config: &SigmaClipConfig,
) -> Result<ClippedStats, BackgroundError> {
    config.validate()?;

    let working: Vec<f64> = match mask {
        Some(mask) => {
            if mask.len() != samples.len() {
                return Err(BackgroundError::MaskLengthMismatch(
                    mask.len(),
                    samples.len(),
                ));
            }
            samples
                .iter()
                .zip(mask.iter())
                .filter(|(_, &masked)| !masked)
                .map(|(&value, _)| value)
                .collect()
        }
        None => samples.to_vec(),
    };

    Ok(clip_unmasked(working, config))
}

/// Core clipping loop over an already unmasked working set.
///
/// Shared with the tiled estimator, which gathers unmasked tile samples
/// itself and has already validated the config.
pub(crate) fn clip_unmasked(mut working: Vec<f64>, config: &SigmaClipConfig) -> ClippedStats {
    if working.is_empty() {
        return ClippedStats::NO_DATA;
    }

    for _ in 0..config.max_iterations {
        let (mean, std_dev) = mean_and_std(&working);
        let threshold = config.sigma * std_dev;

        // Strict inequality: a sample exactly at sigma*std survives. This
        // also makes a zero-variance set a fixed point immediately.
        let retained: Vec<f64> = working
            .iter()
            .copied()
            .filter(|&value| (value - mean).abs() <= threshold)
            .collect();

        if retained.len() == working.len() {
            break;
        }
        if retained.is_empty() {
            // Keep the last non-empty set rather than clipping to nothing.
            break;
        }
        working = retained;
    }

    let (mean, std_dev) = mean_and_std(&working);
    ClippedStats {
        mean,
        median: median(&working),
        std_dev,
        count: working.len(),
    }
}

/// Mean and population standard deviation of a non-empty slice.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Median of a slice of floats.
///
/// Returns NaN for an empty slice. Even-length inputs return the average of
/// the two middle values.
pub fn median<T: Float>(values: &[T]) -> T {
    if values.is_empty() {
        return T::nan();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / T::from(2.0).unwrap()
    }
}
