//! Multivariate Gaussian distribution over vectors of reals
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use std::fmt;

use crate::consts::LN_2PI;
use crate::traits::{HasDensity, Sampleable};

/// Smallest diagonal perturbation tried when Σ cannot be factored
const PERTURBATION_START: f64 = 1e-30;
/// Perturbation at which factoring is abandoned
const PERTURBATION_LIMIT: f64 = 1e100;

/// [Multivariate Gaussian/Normal Distribution](https://en.wikipedia.org/wiki/Multivariate_normal_distribution),
/// 𝒩(μ, Σ).
///
/// The Cholesky factor of Σ is cached. If Σ is not positive definite a tiny
/// multiple of the identity is added before factoring, growing tenfold until
/// the factorization succeeds. A covariance that cannot be factored at all
/// (e.g. one containing NaN) yields a density of zero everywhere.
///
/// # Example
///
/// ```
/// use mixem::dist::MvGaussian;
/// use mixem::traits::*;
/// use nalgebra::{DMatrix, DVector};
///
/// let mvg = MvGaussian::new(
///     DVector::from_column_slice(&[1.0, -1.0]),
///     DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]),
/// ).unwrap();
///
/// // The density peaks at the mean
/// let at_mean = mvg.ln_f(mvg.mu());
/// let off_mean = mvg.ln_f(&DVector::from_column_slice(&[0.0, 0.0]));
/// assert!(at_mean > off_mean);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(try_from = "MvGaussianParameters"))]
#[cfg_attr(feature = "serde1", serde(into = "MvGaussianParameters"))]
pub struct MvGaussian {
    // Mean vector
    mu: DVector<f64>,
    // Covariance matrix
    cov: DMatrix<f64>,
    // Cached factorization of cov, `None` if it could not be factored
    cache: Option<CovCache>,
}

#[derive(Debug, Clone)]
struct CovCache {
    /// Lower Cholesky factor of Σ (possibly perturbed)
    chol_l: DMatrix<f64>,
    /// ln |Σ|
    ln_det: f64,
}

impl CovCache {
    fn from_cov(cov: &DMatrix<f64>) -> Option<Self> {
        if let Some(chol) = cov.clone().cholesky() {
            return Some(Self::from_l(chol.unpack()));
        }

        let dims = cov.nrows();
        let mut perturbation = PERTURBATION_START;
        while perturbation < PERTURBATION_LIMIT {
            let perturbed = cov + DMatrix::<f64>::identity(dims, dims) * perturbation;
            if let Some(chol) = perturbed.cholesky() {
                return Some(Self::from_l(chol.unpack()));
            }
            perturbation *= 10.0;
        }
        None
    }

    fn from_l(chol_l: DMatrix<f64>) -> Self {
        let ln_det = 2.0 * chol_l.diagonal().iter().map(|d| d.ln()).sum::<f64>();
        CovCache { chol_l, ln_det }
    }
}

impl PartialEq for MvGaussian {
    fn eq(&self, other: &MvGaussian) -> bool {
        self.mu == other.mu && self.cov == other.cov
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct MvGaussianParameters {
    pub mu: DVector<f64>,
    pub cov: DMatrix<f64>,
}

impl TryFrom<MvGaussianParameters> for MvGaussian {
    type Error = MvGaussianError;

    fn try_from(params: MvGaussianParameters) -> Result<Self, Self::Error> {
        MvGaussian::new(params.mu, params.cov)
    }
}

impl From<MvGaussian> for MvGaussianParameters {
    fn from(mvg: MvGaussian) -> Self {
        MvGaussianParameters {
            mu: mvg.mu,
            cov: mvg.cov,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum MvGaussianError {
    /// The number of dimensions in μ and Σ differ
    MuCovDimensionMismatch { n_mu: usize, n_cov: usize },
    /// Σ is not square
    CovNotSquare { nrows: usize, ncols: usize },
    /// The distribution must have at least one dimension
    ZeroDimensions,
    /// μ has an infinite or NaN entry
    MuNotFinite,
    /// Σ has an infinite or NaN entry
    CovNotFinite,
}

impl MvGaussian {
    /// Create a new multivariate Gaussian distribution
    ///
    /// # Arguments
    /// - mu: k-length mean vector
    /// - cov: k-by-k covariance matrix
    pub fn new(
        mu: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self, MvGaussianError> {
        validate_mu_cov(&mu, &cov)?;
        Ok(MvGaussian::new_unchecked(mu, cov))
    }

    /// Creates a new MvGaussian without checking whether the parameters are
    /// valid.
    #[must_use]
    pub fn new_unchecked(mu: DVector<f64>, cov: DMatrix<f64>) -> Self {
        let cache = CovCache::from_cov(&cov);
        MvGaussian { mu, cov, cache }
    }

    /// Create a standard Gaussian distribution with zero mean and identity
    /// covariance.
    ///
    /// # Example
    ///
    /// ```
    /// # use mixem::dist::MvGaussian;
    /// let mvg = MvGaussian::standard(4).unwrap();
    ///
    /// assert_eq!(mvg.dims(), 4);
    /// assert!(MvGaussian::standard(0).is_err());
    /// ```
    pub fn standard(dims: usize) -> Result<Self, MvGaussianError> {
        if dims < 1 {
            Err(MvGaussianError::ZeroDimensions)
        } else {
            let mu = DVector::zeros(dims);
            let cov = DMatrix::identity(dims, dims);
            MvGaussian::new(mu, cov)
        }
    }

    /// Number of dimensions
    #[inline]
    #[must_use]
    pub fn dims(&self) -> usize {
        self.mu.len()
    }

    /// Get a reference to the mean
    #[inline]
    #[must_use]
    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    /// Get a reference to the covariance
    #[inline]
    #[must_use]
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Set the mean
    ///
    /// # Example
    ///
    /// ```
    /// # use mixem::dist::MvGaussian;
    /// # use nalgebra::DVector;
    /// let mut mvg = MvGaussian::standard(2).unwrap();
    ///
    /// assert!(mvg.set_mu(DVector::from_column_slice(&[1.0, 2.0])).is_ok());
    /// assert!(mvg.set_mu(DVector::from_column_slice(&[1.0])).is_err());
    /// assert!(mvg.set_mu(DVector::from_column_slice(&[1.0, f64::NAN])).is_err());
    /// ```
    pub fn set_mu(&mut self, mu: DVector<f64>) -> Result<(), MvGaussianError> {
        validate_mu_cov(&mu, &self.cov)?;
        self.set_mu_unchecked(mu);
        Ok(())
    }

    #[inline]
    pub fn set_mu_unchecked(&mut self, mu: DVector<f64>) {
        self.mu = mu;
    }

    /// Set the covariance and refresh the cached factorization
    pub fn set_cov(&mut self, cov: DMatrix<f64>) -> Result<(), MvGaussianError> {
        validate_mu_cov(&self.mu, &cov)?;
        self.set_cov_unchecked(cov);
        Ok(())
    }

    pub fn set_cov_unchecked(&mut self, cov: DMatrix<f64>) {
        self.cache = CovCache::from_cov(&cov);
        self.cov = cov;
    }

    /// Density of every point in `xs`
    ///
    /// # Example
    ///
    /// ```
    /// # use mixem::dist::MvGaussian;
    /// # use mixem::traits::HasDensity;
    /// # use nalgebra::DVector;
    /// let mvg = MvGaussian::standard(2).unwrap();
    /// let xs = vec![DVector::zeros(2), DVector::from_element(2, 1.0)];
    /// let ps = mvg.probability(&xs);
    ///
    /// assert_eq!(ps.len(), 2);
    /// assert!((ps[1] - mvg.f(&xs[1])).abs() < 1E-14);
    /// ```
    #[must_use]
    pub fn probability(&self, xs: &[DVector<f64>]) -> DVector<f64> {
        DVector::from_iterator(xs.len(), xs.iter().map(|x| self.f(x)))
    }
}

fn validate_mu_cov(
    mu: &DVector<f64>,
    cov: &DMatrix<f64>,
) -> Result<(), MvGaussianError> {
    if cov.nrows() != cov.ncols() {
        Err(MvGaussianError::CovNotSquare {
            nrows: cov.nrows(),
            ncols: cov.ncols(),
        })
    } else if mu.len() != cov.nrows() {
        Err(MvGaussianError::MuCovDimensionMismatch {
            n_mu: mu.len(),
            n_cov: cov.nrows(),
        })
    } else if mu.is_empty() {
        Err(MvGaussianError::ZeroDimensions)
    } else if !mu.iter().all(|x| x.is_finite()) {
        Err(MvGaussianError::MuNotFinite)
    } else if !cov.iter().all(|x| x.is_finite()) {
        Err(MvGaussianError::CovNotFinite)
    } else {
        Ok(())
    }
}

impl From<&MvGaussian> for String {
    fn from(mvg: &MvGaussian) -> String {
        format!("N{}(μ: {:?}, Σ: {:?})", mvg.dims(), mvg.mu.as_slice(), mvg.cov.as_slice())
    }
}

impl_display!(MvGaussian);

impl HasDensity<DVector<f64>> for MvGaussian {
    fn ln_f(&self, x: &DVector<f64>) -> f64 {
        let cache = match self.cache {
            Some(ref cache) => cache,
            None => return f64::NEG_INFINITY,
        };
        let diff = x - &self.mu;
        match cache.chol_l.solve_lower_triangular(&diff) {
            Some(z) => {
                let k = self.dims() as f64;
                -0.5 * (k.mul_add(LN_2PI, cache.ln_det) + z.norm_squared())
            }
            None => f64::NEG_INFINITY,
        }
    }
}

impl Sampleable<DVector<f64>> for MvGaussian {
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let dims = self.dims();
        match self.cache {
            Some(ref cache) => {
                let z: DVector<f64> = DVector::from_iterator(
                    dims,
                    (0..dims).map(|_| rng.sample::<f64, _>(StandardNormal)),
                );
                &self.mu + &cache.chol_l * z
            }
            None => self.mu.clone(),
        }
    }
}

impl std::error::Error for MvGaussianError {}

impl fmt::Display for MvGaussianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MuCovDimensionMismatch { n_mu, n_cov } => write!(
                f,
                "Number of dimensions in μ ({n_mu}) and Σ ({n_cov}) must match"
            ),
            Self::CovNotSquare { nrows, ncols } => {
                write!(f, "Σ must be square, but is {nrows}x{ncols}")
            }
            Self::ZeroDimensions => write!(f, "ndims must be >= 1"),
            Self::MuNotFinite => write!(f, "μ has non-finite entries"),
            Self::CovNotFinite => write!(f, "Σ has non-finite entries"),
        }
    }
}
