//! Numerical utilities
mod func;

pub use func::*;
