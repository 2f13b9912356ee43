//! Batch processing of many spectra.
//!
//! - per-unit work: decode, transform stages, one measurement (`pipeline`)
//! - bounded-parallel fan-out with failure isolation (`orchestrator`)
//! - tabular aggregation of the outcomes (`result`)

pub mod orchestrator;
pub mod pipeline;
pub mod result;

pub use orchestrator::*;
pub use pipeline::*;
pub use result::*;
