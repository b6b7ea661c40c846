//! `fet-extract` library crate.
//!
//! Extracts field-effect mobility and threshold voltage from transistor
//! transfer sweeps: `sqrt|Id|` against `Vg` is fitted by a line over a linear
//! region that is detected automatically and can be adjusted by hand.
//!
//! The binary (`fetx`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - detection, fitting and selection do not depend on the terminal front-end

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod tui;
