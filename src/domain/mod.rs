//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - header values and the header map (`HeaderValue`, `Header`)
//! - the immutable spectrum value (`SpectrumRecord`)
//! - the narrow accessor trait shared by records and raw tables (`SpectrumSource`)

pub mod types;

pub use types::*;
