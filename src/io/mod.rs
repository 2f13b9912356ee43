//! Input/output helpers.
//!
//! - spectrum file decoding (`decode`)
//! - result exports (CSV/JSON) (`export`)

pub mod decode;
pub mod export;

pub use decode::*;
pub use export::*;
