//! Data utilities
mod stat;

pub use self::stat::*;
