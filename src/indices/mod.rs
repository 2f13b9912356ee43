//! Lick index definitions and measurement.
//!
//! - band definitions and the builtin reference table (`table`)
//! - the two-point pseudo-continuum index calculator (`calculator`)

pub mod calculator;
pub mod table;

pub use calculator::*;
pub use table::*;
