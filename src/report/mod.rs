//! Reporting utilities: chart annotation and terminal summaries.

pub mod format;

pub use format::*;
