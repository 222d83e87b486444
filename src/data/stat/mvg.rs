#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::traits::SuffStat;
use nalgebra::DVector;

/// Running count and Σx of a cluster of vectors.
///
/// Initial clustering folds each labelled point into the statistic for its
/// cluster, then reads the cluster mean back out.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct MvGaussianSuffStat {
    n: usize,
    sum_x: DVector<f64>,
}

impl MvGaussianSuffStat {
    /// An empty statistic over `dims`-dimensional points
    #[inline]
    #[must_use]
    pub fn new(dims: usize) -> Self {
        MvGaussianSuffStat {
            n: 0,
            sum_x: DVector::zeros(dims),
        }
    }

    #[inline]
    #[must_use]
    pub fn dims(&self) -> usize {
        self.sum_x.len()
    }

    #[inline]
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Σx
    #[inline]
    #[must_use]
    pub fn sum_x(&self) -> &DVector<f64> {
        &self.sum_x
    }

    /// The sample mean, dividing by `max(n, 1)` so that an empty statistic
    /// yields the zero vector instead of NaN.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mixem::data::MvGaussianSuffStat;
    /// use mixem::traits::SuffStat;
    /// use nalgebra::DVector;
    ///
    /// let mut stat = MvGaussianSuffStat::new(2);
    /// assert_eq!(stat.mean_clamped(), DVector::zeros(2));
    ///
    /// stat.observe(&DVector::from_column_slice(&[1.0, 2.0]));
    /// stat.observe(&DVector::from_column_slice(&[3.0, 4.0]));
    /// assert_eq!(stat.mean_clamped(), DVector::from_column_slice(&[2.0, 3.0]));
    /// ```
    #[must_use]
    pub fn mean_clamped(&self) -> DVector<f64> {
        &self.sum_x / self.n.max(1) as f64
    }
}

impl SuffStat<DVector<f64>> for MvGaussianSuffStat {
    fn n(&self) -> usize {
        self.n
    }

    fn observe(&mut self, x: &DVector<f64>) {
        self.n += 1;
        self.sum_x += x;
    }
}
