//! Plotting for terminal output without the interactive UI.

pub mod ascii;

pub use ascii::*;
