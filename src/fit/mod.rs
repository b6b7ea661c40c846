//! Region detection, line fitting and interactive boundary selection.
//!
//! Responsibilities:
//!
//! - propose the most linear stretch of a sweep (`detector`)
//! - fit a line over a boundary pair and derive device parameters (`regression`)
//! - apply operator picks to a per-run session and refit (`selection`)

pub mod detector;
pub mod regression;
pub mod selection;

pub use detector::*;
pub use regression::*;
pub use selection::*;
