//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - measurement values (`MeasurementPoint`, `Series`)
//! - the boundary pair and fit outputs (`Selection`, `FitResult`)
//! - per-session constants (`DeviceGeometry`) and tuning values
//!   (`DetectorConfig`, `PickTolerance`)

pub mod types;

pub use types::*;
