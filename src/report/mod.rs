//! Reporting utilities: formatted terminal output for batch and fit results.

pub mod format;

pub use format::*;
