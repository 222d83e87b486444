//! Gaussian mixture models fit by EM
use nalgebra::{DMatrix, DVector};

use crate::cluster::ClusterError;
use crate::dist::{Mixture, MixtureError, MvGaussian};
use crate::em::{responsibilities, EmFit};
use crate::misc::argmax;

/// A mixture of multivariate Gaussians
pub type Gmm = Mixture<MvGaussian>;

impl Mixture<MvGaussian> {
    /// `k` standard Gaussians in `dims` dimensions with uniform weights
    ///
    /// # Example
    ///
    /// ```
    /// use mixem::gmm::Gmm;
    ///
    /// let gmm = Gmm::with_dims(3, 2).unwrap();
    ///
    /// assert_eq!(gmm.k(), 3);
    /// assert_eq!(gmm.dims(), 2);
    /// assert!(Gmm::with_dims(0, 2).is_err());
    /// ```
    pub fn with_dims(k: usize, dims: usize) -> Result<Self, MixtureError> {
        let cpnt = MvGaussian::new_unchecked(
            DVector::zeros(dims),
            DMatrix::identity(dims, dims),
        );
        Mixture::uniform(vec![cpnt; k])
    }

    /// Dimension of the components
    #[must_use]
    pub fn dims(&self) -> usize {
        self.components().first().map_or(0, MvGaussian::dims)
    }

    /// Fit the mixture to `xs` with `fitter`, keeping the best of `trials`
    /// runs by log-likelihood. Returns that log-likelihood.
    ///
    /// Every trial starts from the model as it was before the call. With
    /// `use_existing_model` false each trial seeds itself by clustering, so
    /// trials only differ if the clusterer is randomized.
    ///
    /// # Example
    ///
    /// ```
    /// use mixem::em::EmFit;
    /// use mixem::gmm::Gmm;
    /// use nalgebra::DVector;
    ///
    /// let xs: Vec<DVector<f64>> = (0..60)
    ///     .map(|i| DVector::from_element(1, (i % 3) as f64 + if i < 30 { 0.0 } else { 20.0 }))
    ///     .collect();
    ///
    /// let mut gmm = Gmm::with_dims(2, 1).unwrap();
    /// let ll = gmm.fit(&xs, 3, false, &EmFit::default()).unwrap();
    ///
    /// assert!(ll.is_finite());
    /// assert_ne!(gmm.classify(&xs[0]), gmm.classify(&xs[59]));
    /// ```
    pub fn fit(
        &mut self,
        xs: &[DVector<f64>],
        trials: usize,
        use_existing_model: bool,
        fitter: &EmFit,
    ) -> Result<f64, ClusterError> {
        self.best_of(trials, fitter, xs, |gmm| {
            let (cpnts, weights) = gmm.parts_mut();
            fitter.estimate(xs, cpnts, weights, use_existing_model)
        })
    }

    /// Like [`fit`](Mixture::fit), with a nonnegative weight per point
    pub fn fit_weighted(
        &mut self,
        xs: &[DVector<f64>],
        point_weights: &[f64],
        trials: usize,
        use_existing_model: bool,
        fitter: &EmFit,
    ) -> Result<f64, ClusterError> {
        self.best_of(trials, fitter, xs, |gmm| {
            let (cpnts, weights) = gmm.parts_mut();
            fitter.estimate_weighted(xs, point_weights, cpnts, weights, use_existing_model)
        })
    }

    fn best_of<F>(
        &mut self,
        trials: usize,
        fitter: &EmFit,
        xs: &[DVector<f64>],
        mut fit_once: F,
    ) -> Result<f64, ClusterError>
    where
        F: FnMut(&mut Self) -> Result<(), ClusterError>,
    {
        let start = self.clone();

        fit_once(self)?;
        let mut best = fitter.ln_likelihood(xs, self.components(), self.weights());

        for _ in 1..trials {
            let mut candidate = start.clone();
            fit_once(&mut candidate)?;
            let ln_lik =
                fitter.ln_likelihood(xs, candidate.components(), candidate.weights());
            if ln_lik > best {
                *self = candidate;
                best = ln_lik;
            }
        }

        Ok(best)
    }

    /// Log-likelihood of `xs` under the mixture
    #[must_use]
    pub fn ln_likelihood(&self, xs: &[DVector<f64>]) -> f64 {
        crate::em::ln_likelihood(
            xs,
            self.components(),
            self.weights(),
            &crate::observe::NullObserver,
        )
    }

    /// Posterior probability of each component given `x`. All zeros if
    /// every component gives `x` zero density.
    #[must_use]
    pub fn posterior(&self, x: &DVector<f64>) -> DVector<f64> {
        let resp =
            responsibilities(std::slice::from_ref(x), self.components(), self.weights());
        resp.row(0).transpose()
    }

    /// Index of the most probable component for `x`
    #[must_use]
    pub fn classify(&self, x: &DVector<f64>) -> usize {
        argmax(self.posterior(x).as_slice()).unwrap_or(0)
    }

    /// [`classify`](Mixture::classify) every point in `xs`
    #[must_use]
    pub fn classify_many(&self, xs: &[DVector<f64>]) -> Vec<usize> {
        let resp = responsibilities(xs, self.components(), self.weights());
        resp.row_iter()
            .map(|row| argmax(row.transpose().as_slice()).unwrap_or(0))
            .collect()
    }
}
