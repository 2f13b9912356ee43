//! Continuum fitting.
//!
//! Responsibilities:
//!
//! - pick continuum candidates with statistical windows
//! - fit a degree-5 polynomial with iterative sigma clipping
//! - evaluate the continuum over the full input grid

pub mod continuum;
pub mod window;

pub use continuum::*;
pub use window::*;
