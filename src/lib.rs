//! `cmost` library crate.
//!
//! The binary (`cmost`) is a thin wrapper around this library so that:
//!
//! - transforms and measurements are testable without spawning processes
//! - the batch orchestrator can be driven from other Rust code
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod batch;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod indices;
pub mod io;
pub mod math;
pub mod report;
pub mod transform;
