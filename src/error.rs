//! Error types for background estimation.

use thiserror::Error;

/// Errors surfaced by the statistics and background estimation routines.
///
/// All failures are structural (bad input); nothing here is transient, so
/// there is no retry semantics attached to any variant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackgroundError {
    #[error("sigma threshold must be positive, got {0}")]
    InvalidSigma(f64),
    #[error("mask length {0} does not match sample length {1}")]
    MaskLengthMismatch(usize, usize),
    #[error("mask shape {0}x{1} does not match image shape {2}x{3}")]
    ShapeMismatch(usize, usize, usize, usize),
    #[error("box size {0}x{1} is out of range for a {2}x{3} image")]
    InvalidBoxSize(usize, usize, usize, usize),
    #[error("filter size {0}x{1} must have odd, positive dimensions")]
    InvalidFilterSize(usize, usize),
    #[error("every tile is fully masked; no background signal to estimate")]
    InsufficientData,
}
