//! Diagonal-covariance EM in log space
//!
//! When every covariance is constrained to be diagonal, fitting can skip
//! the full-matrix machinery altogether. [`DiagGmm`] keeps only a mean, a
//! vector of variances, and a weight per component, and evaluates
//! densities in log space.
use nalgebra::{DMatrix, DVector};

use crate::cluster::{lloyd, ClusterError};
use crate::consts::LN_2PI;
use crate::dist::MvGaussian;
use crate::misc::logsumexp;

/// Convergence tolerance on the change in the average log-likelihood
pub const DIAG_TOLERANCE: f64 = 1e-10;

/// Lloyd iterations used to seed from a static subset
pub const DIAG_KMEANS_ITERATIONS: usize = 1000;

/// Smallest variance any component may have
pub const DIAG_VAR_FLOOR: f64 = f64::EPSILON;

/// A Gaussian mixture with diagonal covariances
///
/// # Example
///
/// ```
/// use mixem::em::DiagGmm;
/// use nalgebra::DVector;
///
/// let xs: Vec<DVector<f64>> = [-2.1, -2.0, -1.9, 1.9, 2.0, 2.1]
///     .iter()
///     .map(|&x| DVector::from_element(1, x))
///     .collect();
///
/// let mut gmm = DiagGmm::static_subset(&xs, 2).unwrap();
/// gmm.learn(&xs, 100);
///
/// assert!((gmm.means()[0][0] + 2.0).abs() < 1E-6);
/// assert!((gmm.means()[1][0] - 2.0).abs() < 1E-6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DiagGmm {
    means: Vec<DVector<f64>>,
    dcovs: Vec<DVector<f64>>,
    hefts: Vec<f64>,
}

impl DiagGmm {
    /// Start from an existing model, keeping only the diagonal of each
    /// covariance
    pub fn from_components(components: &[MvGaussian], weights: &[f64]) -> Self {
        DiagGmm {
            means: components.iter().map(|cpnt| cpnt.mu().clone()).collect(),
            dcovs: components
                .iter()
                .map(|cpnt| cpnt.cov().diagonal().map(|v| v.max(DIAG_VAR_FLOOR)))
                .collect(),
            hefts: weights.to_vec(),
        }
    }

    /// Start from `k` evenly spaced points of `xs` refined by k-means.
    ///
    /// The seeds are the points at indices `g * n / k`. After the Lloyd
    /// iterations each component takes the mean and per-dimension variance
    /// of its partition, and its weight is the fraction of points in it.
    /// An empty partition gets unit variances.
    pub fn static_subset(xs: &[DVector<f64>], k: usize) -> Result<Self, ClusterError> {
        let n = xs.len();
        if n == 0 {
            return Err(ClusterError::EmptyData);
        } else if k == 0 {
            return Err(ClusterError::ZeroClusters);
        } else if n < k {
            return Err(ClusterError::TooFewPoints { n, k });
        }

        let mut centroids: Vec<DVector<f64>> =
            (0..k).map(|g| xs[g * n / k].clone()).collect();
        let asgn = lloyd(xs, &mut centroids, DIAG_KMEANS_ITERATIONS);

        let dims = xs[0].len();
        let mut counts = vec![0_usize; k];
        let mut sums = vec![DVector::<f64>::zeros(dims); k];
        let mut sum_sqs = vec![DVector::<f64>::zeros(dims); k];
        xs.iter().zip(asgn.iter()).for_each(|(x, &z)| {
            counts[z] += 1;
            sums[z] += x;
            sum_sqs[z] += x.component_mul(x);
        });

        let mut means = Vec::with_capacity(k);
        let mut dcovs = Vec::with_capacity(k);
        for ((centroid, (sum, sum_sq)), &count) in centroids
            .into_iter()
            .zip(sums.into_iter().zip(sum_sqs))
            .zip(counts.iter())
        {
            if count == 0 {
                means.push(centroid);
                dcovs.push(DVector::from_element(dims, 1.0));
            } else {
                let m = sum / count as f64;
                let var = (sum_sq / count as f64 - m.component_mul(&m))
                    .map(|v| v.max(DIAG_VAR_FLOOR));
                means.push(m);
                dcovs.push(var);
            }
        }

        let hefts = counts
            .iter()
            .map(|&count| (count as f64 / n as f64).max(f64::EPSILON))
            .collect();

        let mut gmm = DiagGmm {
            means,
            dcovs,
            hefts,
        };
        gmm.normalize_hefts();
        Ok(gmm)
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn k(&self) -> usize {
        self.hefts.len()
    }

    #[inline]
    #[must_use]
    pub fn means(&self) -> &[DVector<f64>] {
        &self.means
    }

    /// The diagonal of each covariance
    #[inline]
    #[must_use]
    pub fn dcovs(&self) -> &[DVector<f64>] {
        &self.dcovs
    }

    #[inline]
    #[must_use]
    pub fn hefts(&self) -> &[f64] {
        &self.hefts
    }

    fn normalize_hefts(&mut self) {
        let total: f64 = self.hefts.iter().sum();
        if total > 0.0 {
            self.hefts.iter_mut().for_each(|h| *h /= total);
        }
    }

    fn ln_density(&self, g: usize, x: &DVector<f64>) -> f64 {
        let mu = &self.means[g];
        let var = &self.dcovs[g];
        let (ln_det, mahal) = x
            .iter()
            .zip(mu.iter())
            .zip(var.iter())
            .fold((0.0, 0.0), |(ln_det, mahal), ((x, m), v)| {
                let d = x - m;
                (ln_det + v.ln(), mahal + d * d / v)
            });
        -0.5 * (x.len() as f64).mul_add(LN_2PI, ln_det + mahal)
    }

    /// ln(w<sub>g</sub>) + ln f<sub>g</sub>(x) for every component g
    fn ln_joint(&self, x: &DVector<f64>) -> Vec<f64> {
        self.hefts
            .iter()
            .enumerate()
            .map(|(g, h)| h.ln() + self.ln_density(g, x))
            .collect()
    }

    /// Average log-likelihood of `xs`
    pub fn avg_ln_likelihood(&self, xs: &[DVector<f64>]) -> f64 {
        if xs.is_empty() || self.k() == 0 {
            return f64::NEG_INFINITY;
        }
        let total: f64 = xs.iter().map(|x| logsumexp(&self.ln_joint(x))).sum();
        total / xs.len() as f64
    }

    /// One EM pass. A component that collects no posterior mass keeps its
    /// mean and variances.
    fn em_pass(&mut self, xs: &[DVector<f64>]) {
        let k = self.k();
        let dims = self.means.first().map_or(0, |m| m.len());

        let mut acc_post = vec![0.0; k];
        let mut acc_mean = vec![DVector::<f64>::zeros(dims); k];
        let mut acc_sq = vec![DVector::<f64>::zeros(dims); k];

        for x in xs {
            let lps = self.ln_joint(x);
            let lse = logsumexp(&lps);
            if !lse.is_finite() {
                continue;
            }
            let x_sq = x.component_mul(x);
            for (g, lp) in lps.iter().enumerate() {
                let post = (lp - lse).exp();
                acc_post[g] += post;
                acc_mean[g].axpy(post, x, 1.0);
                acc_sq[g].axpy(post, &x_sq, 1.0);
            }
        }

        // no point had a finite density; keep the previous model
        let total_post: f64 = acc_post.iter().sum();
        if total_post <= 0.0 || !total_post.is_finite() {
            return;
        }

        let n = xs.len() as f64;
        for g in 0..k {
            let post = acc_post[g];
            if post > 0.0 && post.is_finite() {
                let m = &acc_mean[g] / post;
                let var = (&acc_sq[g] / post - m.component_mul(&m))
                    .map(|v| v.max(DIAG_VAR_FLOOR));
                self.means[g] = m;
                self.dcovs[g] = var;
            }
            self.hefts[g] = post / n;
        }
        self.normalize_hefts();
    }

    /// Run at most `max_iterations` EM passes, stopping early once the
    /// average log-likelihood changes by no more than [`DIAG_TOLERANCE`].
    /// Returns the number of passes run.
    pub fn learn(&mut self, xs: &[DVector<f64>], max_iterations: usize) -> usize {
        if xs.is_empty() || self.k() == 0 {
            return 0;
        }

        let mut old = f64::MIN;
        let mut passes = 0;
        for _ in 0..max_iterations {
            self.em_pass(xs);
            passes += 1;

            let new = self.avg_ln_likelihood(xs);
            if !new.is_finite() || (new - old).abs() <= DIAG_TOLERANCE {
                break;
            }
            old = new;
        }
        passes
    }

    /// Copy the model back into full-covariance components
    pub fn write_into(&self, components: &mut [MvGaussian], weights: &mut [f64]) {
        components
            .iter_mut()
            .zip(weights.iter_mut())
            .enumerate()
            .for_each(|(g, (cpnt, w))| {
                cpnt.set_mu_unchecked(self.means[g].clone());
                cpnt.set_cov_unchecked(DMatrix::from_diagonal(&self.dcovs[g]));
                *w = self.hefts[g];
            });
    }
}
