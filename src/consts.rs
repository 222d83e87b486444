//! Mathematical constants

/// ln(2π)
pub const LN_2PI: f64 = 1.837_877_066_409_345_3;
