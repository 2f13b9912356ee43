//! Numeric building blocks: interpolation, integration, filtering, least squares.

pub mod interp;
pub mod ols;
pub mod poly;
pub mod stats;

pub use interp::*;
pub use ols::*;
pub use poly::*;
pub use stats::*;
