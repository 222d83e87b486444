//! Expectation-maximization for Gaussian mixtures
//!
//! [`EmFit`] fits the means, covariances, and mixing weights of a set of
//! [`MvGaussian`] components to data, optionally with per-point weights.
//! The model is seeded by a [`Clusterer`] (or taken as given), every new
//! covariance passes through a [`CovarianceConstraint`], and progress is
//! reported to an [`EmObserver`].
mod config;
mod diag;
mod init;
mod likelihood;
mod step;

pub use config::{ConfigError, EmFitConfig, EMFIT_CONFIG_VERSION};
pub use diag::{DiagGmm, DIAG_KMEANS_ITERATIONS, DIAG_TOLERANCE, DIAG_VAR_FLOOR};
pub use init::initial_clustering;
pub use likelihood::ln_likelihood;
pub use step::{responsibilities, update_parameters};

use nalgebra::DVector;
use std::fmt;

use crate::cluster::{ClusterError, Clusterer, ClustererConfig, KMeans};
use crate::constraint::{
    ConstraintConfig, CovarianceConstraint, PositiveDefiniteConstraint,
};
use crate::dist::MvGaussian;
use crate::observe::{EmEvent, EmObserver, TracingObserver};

/// Default cap on the iteration counter
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Default convergence tolerance on the change in log-likelihood
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Expectation-maximization fitter for Gaussian mixture models
///
/// # Iteration
///
/// The iteration counter starts at 1 and the loop runs while the change in
/// log-likelihood exceeds `tolerance` and the counter differs from
/// `max_iterations`. So `max_iterations == 1` leaves a supplied model
/// untouched, and `max_iterations == 0` iterates until convergence.
///
/// # Diagonal covariances
///
/// When the constraint is [`DiagonalConstraint`], the unweighted
/// [`estimate`](EmFit::estimate) switches to a log-space diagonal fitter
/// ([`DiagGmm`]) that ignores `tolerance` in favor of
/// [`DIAG_TOLERANCE`]. The switch happens only for the built-in constraint,
/// not for user-defined ones that happen to zero the off-diagonal.
///
/// [`DiagonalConstraint`]: crate::constraint::DiagonalConstraint
///
/// # Example
///
/// ```
/// use mixem::cluster::KMeans;
/// use mixem::constraint::PositiveDefiniteConstraint;
/// use mixem::dist::MvGaussian;
/// use mixem::em::EmFit;
/// use nalgebra::DVector;
///
/// let xs: Vec<DVector<f64>> = (0..40)
///     .map(|i| {
///         let offset = if i % 2 == 0 { 0.0 } else { 10.0 };
///         DVector::from_column_slice(&[offset + (i % 5) as f64 * 0.1, offset])
///     })
///     .collect();
///
/// let fitter = EmFit::new(
///     100,
///     1e-8,
///     KMeans::default().with_seed(5),
///     PositiveDefiniteConstraint,
/// );
///
/// let mut cpnts = vec![MvGaussian::standard(2).unwrap(); 2];
/// let mut weights = vec![0.5; 2];
/// fitter.estimate(&xs, &mut cpnts, &mut weights, false).unwrap();
///
/// assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1E-10);
/// assert!((weights[0] - 0.5).abs() < 1E-10);
/// ```
pub struct EmFit {
    max_iterations: usize,
    tolerance: f64,
    clusterer: Box<dyn Clusterer>,
    constraint: Box<dyn CovarianceConstraint>,
    observer: Box<dyn EmObserver>,
}

impl EmFit {
    pub fn new<C, K>(
        max_iterations: usize,
        tolerance: f64,
        clusterer: C,
        constraint: K,
    ) -> Self
    where
        C: Clusterer + 'static,
        K: CovarianceConstraint + 'static,
    {
        EmFit::from_parts(
            max_iterations,
            tolerance,
            Box::new(clusterer),
            Box::new(constraint),
        )
    }

    pub(crate) fn from_parts(
        max_iterations: usize,
        tolerance: f64,
        clusterer: Box<dyn Clusterer>,
        constraint: Box<dyn CovarianceConstraint>,
    ) -> Self {
        EmFit {
            max_iterations,
            tolerance,
            clusterer,
            constraint,
            observer: Box::new(TracingObserver),
        }
    }

    /// Report events to `observer` instead of [`tracing`]
    #[must_use]
    pub fn with_observer<O: EmObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    #[must_use]
    pub fn with_clusterer<C: Clusterer + 'static>(mut self, clusterer: C) -> Self {
        self.clusterer = Box::new(clusterer);
        self
    }

    #[must_use]
    pub fn with_constraint<K: CovarianceConstraint + 'static>(
        mut self,
        constraint: K,
    ) -> Self {
        self.constraint = Box::new(constraint);
        self
    }

    #[inline]
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[inline]
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    #[inline]
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[inline]
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    #[inline]
    #[must_use]
    pub fn clusterer(&self) -> &dyn Clusterer {
        self.clusterer.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn constraint(&self) -> &dyn CovarianceConstraint {
        self.constraint.as_ref()
    }

    /// A serializable record of the settings
    #[must_use]
    pub fn config(&self) -> EmFitConfig {
        EmFitConfig {
            version: EMFIT_CONFIG_VERSION,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            clusterer: self.clusterer.config(),
            constraint: self.constraint.config(),
        }
    }

    /// Rebuild an engine from a record. Same as `EmFit::try_from`.
    pub fn from_config(config: EmFitConfig) -> Result<Self, ConfigError> {
        EmFit::try_from(config)
    }

    /// Log-likelihood of `xs` under the model, reporting zero-density
    /// points to this fitter's observer
    pub fn ln_likelihood(
        &self,
        xs: &[DVector<f64>],
        components: &[MvGaussian],
        weights: &[f64],
    ) -> f64 {
        ln_likelihood(xs, components, weights, self.observer.as_ref())
    }

    /// Fit `components` and `weights` to `xs` in place.
    ///
    /// If `use_initial_model` is false the model is first seeded by
    /// [`initial_clustering`]; otherwise the given model is the starting
    /// point. `components` and `weights` must have the same length, and
    /// every component must have the dimension of the points.
    ///
    /// The only failure is the clusterer failing, which can only happen
    /// when `use_initial_model` is false.
    pub fn estimate(
        &self,
        xs: &[DVector<f64>],
        components: &mut [MvGaussian],
        weights: &mut [f64],
        use_initial_model: bool,
    ) -> Result<(), ClusterError> {
        if self.constraint.config() == ConstraintConfig::Diagonal {
            self.estimate_diagonal(xs, components, weights, use_initial_model)
        } else {
            self.run(xs, None, components, weights, use_initial_model)
        }
    }

    /// Fit with a nonnegative weight per point.
    ///
    /// Each point's contribution to the M-step is scaled by its weight, and
    /// mixing weights are normalized by the total point weight. Seeding
    /// ignores the point weights. Unit point weights give exactly the same
    /// result as [`estimate`](EmFit::estimate) with a non-diagonal
    /// constraint. There is no diagonal fast path here.
    pub fn estimate_weighted(
        &self,
        xs: &[DVector<f64>],
        point_weights: &[f64],
        components: &mut [MvGaussian],
        weights: &mut [f64],
        use_initial_model: bool,
    ) -> Result<(), ClusterError> {
        self.run(xs, Some(point_weights), components, weights, use_initial_model)
    }

    fn run(
        &self,
        xs: &[DVector<f64>],
        point_weights: Option<&[f64]>,
        components: &mut [MvGaussian],
        weights: &mut [f64],
        use_initial_model: bool,
    ) -> Result<(), ClusterError> {
        if !use_initial_model {
            initial_clustering(
                xs,
                components,
                weights,
                self.clusterer.as_ref(),
                self.constraint.as_ref(),
            )?;
        }

        let mut l = self.ln_likelihood(xs, components, weights);
        let mut l_old = f64::MIN;
        self.observer
            .observe(EmEvent::InitialLogLikelihood { ln_likelihood: l });

        let mut iteration = 1;
        while (l - l_old).abs() > self.tolerance && iteration != self.max_iterations {
            self.observer.observe(EmEvent::Iteration {
                iteration,
                ln_likelihood: l,
            });

            let resp = responsibilities(xs, components, weights);
            update_parameters(
                xs,
                &resp,
                point_weights,
                components,
                weights,
                self.constraint.as_ref(),
            );

            l_old = l;
            l = self.ln_likelihood(xs, components, weights);
            iteration += 1;
        }

        self.observer.observe(EmEvent::Finished {
            iterations: iteration,
            ln_likelihood: l,
        });
        Ok(())
    }

    fn estimate_diagonal(
        &self,
        xs: &[DVector<f64>],
        components: &mut [MvGaussian],
        weights: &mut [f64],
        use_initial_model: bool,
    ) -> Result<(), ClusterError> {
        if self.tolerance != DEFAULT_TOLERANCE {
            self.observer.observe(EmEvent::ToleranceIgnored {
                tolerance: self.tolerance,
            });
        }

        let default_clusterer =
            matches!(self.clusterer.config(), ClustererConfig::KMeans { .. });

        let mut gmm = if !use_initial_model && default_clusterer {
            DiagGmm::static_subset(xs, components.len())?
        } else {
            if !use_initial_model {
                initial_clustering(
                    xs,
                    components,
                    weights,
                    self.clusterer.as_ref(),
                    self.constraint.as_ref(),
                )?;
            }
            DiagGmm::from_components(components, weights)
        };

        let passes = gmm.learn(xs, self.max_iterations);
        gmm.write_into(components, weights);

        self.observer.observe(EmEvent::Finished {
            iterations: passes,
            ln_likelihood: self.ln_likelihood(xs, components, weights),
        });
        Ok(())
    }
}

impl Default for EmFit {
    fn default() -> Self {
        EmFit::new(
            DEFAULT_MAX_ITERATIONS,
            DEFAULT_TOLERANCE,
            KMeans::default(),
            PositiveDefiniteConstraint,
        )
    }
}

impl fmt::Debug for EmFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmFit")
            .field("max_iterations", &self.max_iterations)
            .field("tolerance", &self.tolerance)
            .field("clusterer", &self.clusterer.config())
            .field("constraint", &self.constraint.config())
            .finish_non_exhaustive()
    }
}
