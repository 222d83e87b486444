//! Probability distributions
mod mixture;
mod mvg;

pub use mixture::{Mixture, MixtureError};
pub use mvg::{MvGaussian, MvGaussianError, MvGaussianParameters};
