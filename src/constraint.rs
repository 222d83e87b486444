//! Covariance constraint policies
//!
//! A constraint projects a covariance matrix onto a feasible family. Every
//! constraint is deterministic and idempotent: applying it twice gives the
//! same matrix as applying it once.
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use itertools::Itertools;
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Largest condition number allowed by [`PositiveDefiniteConstraint`]
pub const MAX_CONDITION_NUMBER: f64 = 1e5;
/// Smallest eigenvalue allowed by [`PositiveDefiniteConstraint`]
pub const MIN_EIGENVALUE: f64 = 1e-50;

const EIGEN_EPS: f64 = 1e-15;
const EIGEN_MAX_ITERS: usize = 10_000;

/// Projects a covariance matrix onto a family of feasible matrices
pub trait CovarianceConstraint: Send + Sync {
    /// Project `cov` in place
    fn apply(&self, cov: &mut DMatrix<f64>);

    /// Describes the constraint. Built-in constraints return their own
    /// variant, which is also how the fast diagonal path is selected.
    fn config(&self) -> ConstraintConfig {
        ConstraintConfig::Custom {
            name: std::any::type_name::<Self>().to_owned(),
        }
    }
}

/// Serializable description of a covariance constraint
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum ConstraintConfig {
    /// Full covariance, no projection
    Full,
    /// Only the diagonal is kept
    Diagonal,
    /// Positive definite with a bounded condition number
    PositiveDefinite,
    /// Eigenvalues fixed to multiples of the smallest one
    EigenvalueRatio { ratios: Vec<f64> },
    /// A user-defined constraint that cannot be rebuilt from its description
    Custom { name: String },
}

impl ConstraintConfig {
    /// Build the constraint this record describes. Returns `None` for
    /// `Custom` constraints.
    pub fn build(
        &self,
    ) -> Option<Result<Box<dyn CovarianceConstraint>, ConstraintError>> {
        match self {
            Self::Full => Some(Ok(Box::new(NoConstraint))),
            Self::Diagonal => Some(Ok(Box::new(DiagonalConstraint))),
            Self::PositiveDefinite => {
                Some(Ok(Box::new(PositiveDefiniteConstraint)))
            }
            Self::EigenvalueRatio { ratios } => Some(
                EigenvalueRatioConstraint::new(ratios.clone())
                    .map(|c| Box::new(c) as Box<dyn CovarianceConstraint>),
            ),
            Self::Custom { .. } => None,
        }
    }
}

/// Leaves the covariance untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoConstraint;

impl CovarianceConstraint for NoConstraint {
    fn apply(&self, _cov: &mut DMatrix<f64>) {}

    fn config(&self) -> ConstraintConfig {
        ConstraintConfig::Full
    }
}

/// Zeros every off-diagonal entry
///
/// # Example
///
/// ```
/// use mixem::constraint::{CovarianceConstraint, DiagonalConstraint};
/// use nalgebra::DMatrix;
///
/// let mut cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
/// DiagonalConstraint.apply(&mut cov);
///
/// assert_eq!(cov, DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagonalConstraint;

impl CovarianceConstraint for DiagonalConstraint {
    fn apply(&self, cov: &mut DMatrix<f64>) {
        let diag = cov.diagonal();
        *cov = DMatrix::from_diagonal(&diag);
    }

    fn config(&self) -> ConstraintConfig {
        ConstraintConfig::Diagonal
    }
}

/// Forces the covariance to be symmetric positive definite with a condition
/// number no larger than [`MAX_CONDITION_NUMBER`] and eigenvalues no smaller
/// than [`MIN_EIGENVALUE`].
///
/// A matrix that already satisfies the constraint is only symmetrized.
/// Otherwise every eigenvalue is raised to at least
/// `max(λ_max / MAX_CONDITION_NUMBER, MIN_EIGENVALUE)` and the matrix is
/// reassembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositiveDefiniteConstraint;

impl CovarianceConstraint for PositiveDefiniteConstraint {
    fn apply(&self, cov: &mut DMatrix<f64>) {
        cov.fill_lower_triangle_with_upper_triangle();

        let (eigvals, eigvecs) = match sorted_symmetric_eigen(cov) {
            Some(eig) => eig,
            None => return,
        };

        let smallest = eigvals[0];
        let largest = eigvals[eigvals.len() - 1];

        if smallest < 0.0
            || largest / smallest > MAX_CONDITION_NUMBER
            || largest < MIN_EIGENVALUE
        {
            let floor = (largest / MAX_CONDITION_NUMBER).max(MIN_EIGENVALUE);
            let clamped = eigvals.map(|v| v.max(floor));
            *cov = reassemble(&clamped, &eigvecs);
        }
    }

    fn config(&self) -> ConstraintConfig {
        ConstraintConfig::PositiveDefinite
    }
}

/// Fixes the eigenvalues of the covariance to given multiples of its
/// smallest eigenvalue.
///
/// `ratios[i]` is the ratio of the `i`th smallest eigenvalue to the
/// smallest one, so the first ratio is always 1 and the ratios never
/// decrease.
///
/// # Example
///
/// ```
/// use mixem::constraint::{CovarianceConstraint, EigenvalueRatioConstraint};
/// use nalgebra::DMatrix;
///
/// let constraint = EigenvalueRatioConstraint::new(vec![1.0, 4.0]).unwrap();
/// let mut cov = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 1.5]);
/// constraint.apply(&mut cov);
///
/// assert!((cov[(0, 0)] - 6.0).abs() < 1E-10);
/// assert!((cov[(1, 1)] - 1.5).abs() < 1E-10);
///
/// assert!(EigenvalueRatioConstraint::new(vec![0.5, 1.0]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EigenvalueRatioConstraint {
    ratios: DVector<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum ConstraintError {
    /// No eigenvalue ratios were given
    RatiosEmpty,
    /// The first ratio must be exactly one
    FirstRatioNotOne { ratio: f64 },
    /// A ratio is smaller than the one before it
    RatiosDecreasing { ix: usize },
    /// A ratio is infinite or NaN
    RatioNotFinite { ix: usize },
}

impl EigenvalueRatioConstraint {
    pub fn new(ratios: Vec<f64>) -> Result<Self, ConstraintError> {
        if ratios.is_empty() {
            return Err(ConstraintError::RatiosEmpty);
        }
        if let Some(ix) = ratios.iter().position(|r| !r.is_finite()) {
            return Err(ConstraintError::RatioNotFinite { ix });
        }
        if ratios[0] != 1.0 {
            return Err(ConstraintError::FirstRatioNotOne { ratio: ratios[0] });
        }
        if let Some((ix, _)) = ratios
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (a, b))| b < a)
        {
            return Err(ConstraintError::RatiosDecreasing { ix: ix + 1 });
        }

        Ok(EigenvalueRatioConstraint {
            ratios: DVector::from_vec(ratios),
        })
    }

    #[inline]
    #[must_use]
    pub fn ratios(&self) -> &[f64] {
        self.ratios.as_slice()
    }
}

impl CovarianceConstraint for EigenvalueRatioConstraint {
    /// # Panics
    ///
    /// Panics if the number of ratios differs from the dimension of `cov`.
    fn apply(&self, cov: &mut DMatrix<f64>) {
        assert_eq!(
            cov.nrows(),
            self.ratios.len(),
            "one eigenvalue ratio is needed per dimension"
        );
        cov.fill_lower_triangle_with_upper_triangle();

        if let Some((eigvals, eigvecs)) = sorted_symmetric_eigen(cov) {
            let forced = &self.ratios * eigvals[0];
            *cov = reassemble(&forced, &eigvecs);
        }
    }

    fn config(&self) -> ConstraintConfig {
        ConstraintConfig::EigenvalueRatio {
            ratios: self.ratios.as_slice().to_vec(),
        }
    }
}

/// Eigen-decomposition of a symmetric matrix with the eigenvalues in
/// ascending order and the eigenvectors in the matching columns.
fn sorted_symmetric_eigen(
    cov: &DMatrix<f64>,
) -> Option<(DVector<f64>, DMatrix<f64>)> {
    if !cov.iter().all(|x| x.is_finite()) {
        return None;
    }
    let eig = cov.clone().try_symmetric_eigen(EIGEN_EPS, EIGEN_MAX_ITERS)?;

    let n = eig.eigenvalues.len();
    let order: Vec<usize> = (0..n)
        .sorted_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]))
        .collect();

    let eigvals = DVector::from_iterator(n, order.iter().map(|&ix| eig.eigenvalues[ix]));
    let eigvecs = DMatrix::from_fn(n, n, |r, c| eig.eigenvectors[(r, order[c])]);
    Some((eigvals, eigvecs))
}

fn reassemble(eigvals: &DVector<f64>, eigvecs: &DMatrix<f64>) -> DMatrix<f64> {
    let mut cov = eigvecs * DMatrix::from_diagonal(eigvals) * eigvecs.transpose();
    cov.fill_lower_triangle_with_upper_triangle();
    cov
}

impl std::error::Error for ConstraintError {}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RatiosEmpty => write!(f, "no eigenvalue ratios given"),
            Self::FirstRatioNotOne { ratio } => {
                write!(f, "the first eigenvalue ratio must be 1, got {ratio}")
            }
            Self::RatiosDecreasing { ix } => {
                write!(f, "eigenvalue ratio at index {ix} decreases")
            }
            Self::RatioNotFinite { ix } => {
                write!(f, "eigenvalue ratio at index {ix} is not finite")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn symmetric(vals: &[f64], n: usize) -> DMatrix<f64> {
        let m = DMatrix::from_row_slice(n, n, vals);
        (&m + m.transpose()) * 0.5
    }

    fn eigvals_of(cov: &DMatrix<f64>) -> DVector<f64> {
        sorted_symmetric_eigen(cov).unwrap().0
    }

    #[test]
    fn no_constraint_is_identity() {
        let cov = symmetric(&[1.0, 2.0, 3.0, 4.0], 2);
        let mut projected = cov.clone();
        NoConstraint.apply(&mut projected);
        assert_eq!(cov, projected);
    }

    #[test]
    fn diagonal_keeps_only_the_diagonal() {
        let mut cov = symmetric(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0], 3);
        DiagonalConstraint.apply(&mut cov);
        assert_eq!(cov, DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 5.0, 9.0])));
    }

    #[test]
    fn positive_definite_leaves_good_matrix_alone() {
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]);
        let mut projected = cov.clone();
        PositiveDefiniteConstraint.apply(&mut projected);
        assert_eq!(cov, projected);
    }

    #[test]
    fn positive_definite_fixes_indefinite_matrix() {
        let mut cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        PositiveDefiniteConstraint.apply(&mut cov);

        let eigvals = eigvals_of(&cov);
        assert!(eigvals[0] > 0.0);
        assert!(eigvals[1] / eigvals[0] <= MAX_CONDITION_NUMBER * (1.0 + 1E-8));
        assert!(cov.clone().cholesky().is_some());
    }

    #[test]
    fn positive_definite_lifts_zero_matrix() {
        let mut cov = DMatrix::zeros(3, 3);
        PositiveDefiniteConstraint.apply(&mut cov);
        assert_relative_eq!(cov, DMatrix::identity(3, 3) * MIN_EIGENVALUE);
    }

    #[test]
    fn positive_definite_symmetrizes() {
        let mut cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.2, 1.0]);
        PositiveDefiniteConstraint.apply(&mut cov);
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
    }

    #[test]
    fn eigenvalue_ratio_validation() {
        assert_eq!(
            EigenvalueRatioConstraint::new(vec![]),
            Err(ConstraintError::RatiosEmpty)
        );
        assert_eq!(
            EigenvalueRatioConstraint::new(vec![2.0, 3.0]),
            Err(ConstraintError::FirstRatioNotOne { ratio: 2.0 })
        );
        assert_eq!(
            EigenvalueRatioConstraint::new(vec![1.0, 3.0, 2.0]),
            Err(ConstraintError::RatiosDecreasing { ix: 2 })
        );
        assert_eq!(
            EigenvalueRatioConstraint::new(vec![1.0, f64::NAN]),
            Err(ConstraintError::RatioNotFinite { ix: 1 })
        );
    }

    #[test]
    fn eigenvalue_ratio_forces_spectrum() {
        let constraint =
            EigenvalueRatioConstraint::new(vec![1.0, 2.0, 10.0]).unwrap();
        let mut cov = symmetric(&[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0], 3);
        let smallest = eigvals_of(&cov)[0];
        constraint.apply(&mut cov);

        let eigvals = eigvals_of(&cov);
        assert::close(eigvals[0], smallest, 1E-10);
        assert::close(eigvals[1], 2.0 * smallest, 1E-10);
        assert::close(eigvals[2], 10.0 * smallest, 1E-10);
    }

    #[test]
    fn config_round_trips_through_build() {
        let configs = vec![
            ConstraintConfig::Full,
            ConstraintConfig::Diagonal,
            ConstraintConfig::PositiveDefinite,
            ConstraintConfig::EigenvalueRatio {
                ratios: vec![1.0, 3.0],
            },
        ];
        for config in configs {
            let built = config.build().unwrap().unwrap();
            assert_eq!(built.config(), config);
        }
    }

    #[test]
    fn custom_config_cannot_be_built() {
        struct Shrink;
        impl CovarianceConstraint for Shrink {
            fn apply(&self, cov: &mut DMatrix<f64>) {
                *cov *= 0.5;
            }
        }

        let config = Shrink.config();
        assert!(matches!(config, ConstraintConfig::Custom { .. }));
        assert!(config.build().is_none());
    }

    fn arb_cov() -> impl Strategy<Value = DMatrix<f64>> {
        (1_usize..5).prop_flat_map(|n| {
            prop::collection::vec(-10.0_f64..10.0, n * n)
                .prop_map(move |vals| symmetric(&vals, n))
        })
    }

    fn arb_psd_cov() -> impl Strategy<Value = DMatrix<f64>> {
        (1_usize..5).prop_flat_map(|n| {
            prop::collection::vec(-3.0_f64..3.0, n * n).prop_map(move |vals| {
                let a = DMatrix::from_row_slice(n, n, &vals);
                &a * a.transpose()
            })
        })
    }

    fn assert_idempotent(constraint: &dyn CovarianceConstraint, cov: &DMatrix<f64>, tol: f64) {
        let mut once = cov.clone();
        constraint.apply(&mut once);
        let mut twice = once.clone();
        constraint.apply(&mut twice);

        let scale = once.amax().max(1.0);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() <= tol * scale, "{a} != {b}");
        }
    }

    proptest! {
        #[test]
        fn no_constraint_is_idempotent(cov in arb_cov()) {
            assert_idempotent(&NoConstraint, &cov, 1E-12);
        }

        #[test]
        fn diagonal_is_idempotent(cov in arb_cov()) {
            assert_idempotent(&DiagonalConstraint, &cov, 1E-12);
        }

        #[test]
        fn positive_definite_is_idempotent(cov in arb_cov()) {
            assert_idempotent(&PositiveDefiniteConstraint, &cov, 1E-9);
        }

        #[test]
        fn eigenvalue_ratio_is_idempotent(cov in arb_psd_cov()) {
            let n = cov.nrows();
            let ratios: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
            let constraint = EigenvalueRatioConstraint::new(ratios).unwrap();
            assert_idempotent(&constraint, &cov, 1E-9);
        }
    }
}
