//! Robust background estimation for astronomical images.
//!
//! Astronomical frames carry a sky background that varies slowly across the
//! field and must be removed before photometry or source detection. This
//! crate provides the two standard tools for that job:
//!
//! - [`stats::sigma_clipped_stats`]: iterative sigma clipping for robust
//!   scalar mean/median/standard-deviation estimates over optionally masked
//!   samples.
//! - [`background::estimate_background`]: a tiled 2-D background model. The
//!   image is split into boxes, each box gets a sigma-clipped estimate, the
//!   resulting coarse grid is median-filtered, and the grid is interpolated
//!   back to full resolution.
//!
//! Both are pure functions over their inputs; caller-provided arrays are
//! never mutated.
//!
//! # Example
//!
//! ```
//! use ndarray::Array2;
//! use skysub::{estimate_background, BackgroundConfig};
//!
//! let image = Array2::from_elem((128, 128), 42.0);
//! let config = BackgroundConfig {
//!     box_size: (32, 32),
//!     ..Default::default()
//! };
//!
//! let model = estimate_background(image.view(), None, &config).unwrap();
//! let subtracted = model.subtract_from(image.view());
//! assert!(subtracted.iter().all(|&v| v.abs() < 1e-9));
//! ```

pub mod background;
pub mod error;
pub mod stats;

pub use background::{
    estimate_background, BackgroundConfig, BackgroundEstimator, BackgroundModel,
};
pub use error::BackgroundError;
pub use stats::{sigma_clipped_stats, ClippedStats, SigmaClipConfig};
