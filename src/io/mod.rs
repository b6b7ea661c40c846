//! Input/output helpers.
//!
//! - workbook/sheet discovery and series ingestion (`ingest`)
//! - results table and JSON report (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
