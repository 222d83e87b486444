//! Expectation-maximization for Gaussian mixture models
//!
//! Fit the means, covariances, and mixing weights of a mixture of
//! multivariate Gaussians to data. The crate is built from a few
//! swappable parts:
//!
//! - [`em::EmFit`]: the EM engine, with unweighted and per-point weighted
//!   fits
//! - [`cluster::Clusterer`]: hard clustering used to seed the model,
//!   [`cluster::KMeans`] by default
//! - [`constraint::CovarianceConstraint`]: a projection applied to every new
//!   covariance
//! - [`observe::EmObserver`]: progress and diagnostics, logged through
//!   `tracing` by default
//!
//! # Example
//!
//! ```
//! use mixem::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::SmallRng::seed_from_u64(0xFEED);
//!
//! let truth = Gmm::new(
//!     vec![0.5, 0.5],
//!     vec![
//!         MvGaussian::new(DVector::from_element(2, -4.0), DMatrix::identity(2, 2)).unwrap(),
//!         MvGaussian::new(DVector::from_element(2, 4.0), DMatrix::identity(2, 2)).unwrap(),
//!     ],
//! )
//! .unwrap();
//! let xs: Vec<DVector<f64>> = truth.sample(500, &mut rng);
//!
//! let mut gmm = Gmm::with_dims(2, 2).unwrap();
//! gmm.fit(&xs, 1, false, &EmFit::default()).unwrap();
//!
//! let left = gmm.classify(&DVector::from_element(2, -4.0));
//! let right = gmm.classify(&DVector::from_element(2, 4.0));
//! assert_ne!(left, right);
//! assert!((gmm.weights()[left] - 0.5).abs() < 0.1);
//! ```
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]

// Test the README
use doc_comment::doctest;
doctest!("../README.md");

#[macro_export]
macro_rules! impl_display {
    ($kind: ty) => {
        impl ::std::fmt::Display for $kind {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", String::from(self))
            }
        }
    };
}

pub mod cluster;
pub mod constraint;
pub mod consts;
pub mod data;
pub mod dist;
pub mod em;
pub mod gmm;
pub mod misc;
pub mod observe;
pub mod prelude;
pub mod traits;

#[cfg(test)]
mod test;
