//! Finite mixture of distributions
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use rand::Rng;
use std::fmt;

use crate::misc::{logsumexp, pflip};
use crate::traits::{HasDensity, Sampleable};

/// Tolerance on the sum of the weights
const WEIGHT_SUM_TOL: f64 = 1E-10;

/// [Mixture distribution](https://en.wikipedia.org/wiki/Mixture_model)
/// Σ w<sub>k</sub> f<sub>k</sub>(x)
///
/// A mixture distribution is a convex combination of distributions.
///
/// # Example
///
/// ```
/// use mixem::dist::{Mixture, MvGaussian};
/// use mixem::traits::*;
/// use nalgebra::{DMatrix, DVector};
///
/// let g1 = MvGaussian::standard(2).unwrap();
/// let g2 = MvGaussian::new(
///     DVector::from_element(2, 4.0),
///     DMatrix::identity(2, 2),
/// ).unwrap();
///
/// let mm = Mixture::new(vec![0.25, 0.75], vec![g1, g2]).unwrap();
///
/// let x = DVector::from_element(2, 4.0);
/// assert!(mm.f(&x) > 0.75 * 0.15);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Mixture<Fx> {
    /// The weights for each component distribution. All entries must be
    /// nonnegative and sum to 1.
    weights: Vec<f64>,
    /// A vector of component distributions.
    components: Vec<Fx>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum MixtureError {
    /// The weights vector is empty
    WeightsEmpty,
    /// The weights do not sum to one
    WeightsDoNotSumToOne { sum: f64 },
    /// One or more weights is less than zero or not finite
    WeightTooLow { ix: usize, weight: f64 },
    /// The components vector is empty
    ComponentsEmpty,
    /// The components vector and the weights vector are different lengths
    ComponentWeightLengthMismatch {
        /// length of the weights vector
        n_weights: usize,
        /// length of the components vector
        n_components: usize,
    },
}

fn validate_weights(weights: &[f64]) -> Result<(), MixtureError> {
    if weights.is_empty() {
        return Err(MixtureError::WeightsEmpty);
    }

    weights.iter().enumerate().try_for_each(|(ix, &weight)| {
        if weight < 0.0 || !weight.is_finite() {
            Err(MixtureError::WeightTooLow { ix, weight })
        } else {
            Ok(())
        }
    })?;

    let sum = weights.iter().sum::<f64>();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOL {
        Err(MixtureError::WeightsDoNotSumToOne { sum })
    } else {
        Ok(())
    }
}

impl<Fx> Mixture<Fx> {
    /// Create a new mixture distribution
    ///
    /// # Arguments
    /// - weights: The weights for each component distribution. All entries
    ///   must be nonnegative and sum to 1.
    /// - components: A vector of the component distributions.
    pub fn new(
        weights: Vec<f64>,
        components: Vec<Fx>,
    ) -> Result<Self, MixtureError> {
        if components.is_empty() {
            Err(MixtureError::ComponentsEmpty)
        } else if components.len() != weights.len() {
            Err(MixtureError::ComponentWeightLengthMismatch {
                n_weights: weights.len(),
                n_components: components.len(),
            })
        } else {
            validate_weights(&weights)?;
            Ok(Mixture {
                weights,
                components,
            })
        }
    }

    /// Creates a new Mixture without checking whether the parameters are
    /// valid.
    #[inline]
    #[must_use]
    pub fn new_unchecked(weights: Vec<f64>, components: Vec<Fx>) -> Self {
        Mixture {
            weights,
            components,
        }
    }

    /// Assume uniform component weights
    ///
    /// Given a n-length vector of components, automatically sets the
    /// component weights to 1/n.
    pub fn uniform(components: Vec<Fx>) -> Result<Self, MixtureError> {
        if components.is_empty() {
            Err(MixtureError::ComponentsEmpty)
        } else {
            let k = components.len();
            let weights = vec![1.0 / k as f64; k];
            Ok(Mixture {
                weights,
                components,
            })
        }
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn k(&self) -> usize {
        self.components.len()
    }

    /// Get a reference to the component weights
    #[inline]
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Get a reference to the components
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[Fx] {
        &self.components
    }

    /// Mutable access to the components and weights at once, for fitting
    /// the mixture in place. The caller is responsible for leaving the
    /// weights nonnegative and summing to 1.
    #[inline]
    pub fn parts_mut(&mut self) -> (&mut [Fx], &mut [f64]) {
        (&mut self.components, &mut self.weights)
    }

    /// Set the weights
    ///
    /// # Example
    ///
    /// ```
    /// # use mixem::dist::{Mixture, MvGaussian};
    /// let mut mm = Mixture::uniform(vec![
    ///     MvGaussian::standard(1).unwrap(),
    ///     MvGaussian::standard(1).unwrap(),
    /// ]).unwrap();
    ///
    /// assert!(mm.set_weights(vec![0.2, 0.8]).is_ok());
    /// assert!(mm.set_weights(vec![0.2, 0.7]).is_err());
    /// assert!(mm.set_weights(vec![1.0]).is_err());
    /// ```
    pub fn set_weights(&mut self, weights: Vec<f64>) -> Result<(), MixtureError> {
        if weights.len() != self.components.len() {
            return Err(MixtureError::ComponentWeightLengthMismatch {
                n_weights: weights.len(),
                n_components: self.components.len(),
            });
        }
        validate_weights(&weights)?;
        self.weights = weights;
        Ok(())
    }
}

impl<X, Fx> HasDensity<X> for Mixture<Fx>
where
    Fx: HasDensity<X>,
{
    fn ln_f(&self, x: &X) -> f64 {
        let lfs: Vec<f64> = self
            .weights
            .iter()
            .zip(self.components.iter())
            .map(|(&w, cpnt)| w.ln() + cpnt.ln_f(x))
            .collect();

        logsumexp(&lfs)
    }

    fn f(&self, x: &X) -> f64 {
        self.weights
            .iter()
            .zip(self.components.iter())
            .fold(0.0, |acc, (&w, cpnt)| w.mul_add(cpnt.f(x), acc))
    }
}

impl<X, Fx> Sampleable<X> for Mixture<Fx>
where
    Fx: Sampleable<X>,
{
    fn draw<R: Rng>(&self, rng: &mut R) -> X {
        let k: usize = pflip(&self.weights, 1, rng)[0];
        self.components[k].draw(rng)
    }

    fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<X> {
        pflip(&self.weights, n, rng)
            .iter()
            .map(|&k| self.components[k].draw(rng))
            .collect()
    }
}

impl std::error::Error for MixtureError {}

impl fmt::Display for MixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeightsEmpty => write!(f, "empty weights vector"),
            Self::ComponentsEmpty => write!(f, "empty components vector"),
            Self::WeightsDoNotSumToOne { sum } => {
                write!(f, "weights sum to {sum} but should sum to one")
            }
            Self::WeightTooLow { ix, weight } => {
                write!(f, "weight at index {ix} was invalid: {weight}")
            }
            Self::ComponentWeightLengthMismatch {
                n_weights,
                n_components,
            } => write!(
                f,
                "weights ({n_weights}) and components ({n_components}) have \
                different lengths"
            ),
        }
    }
}
