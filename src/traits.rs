//! Trait definitions
use rand::Rng;

/// Has a density function
pub trait HasDensity<X> {
    /// Probability function
    ///
    /// # Example
    ///
    /// ```
    /// use mixem::dist::MvGaussian;
    /// use mixem::traits::HasDensity;
    /// use nalgebra::DVector;
    ///
    /// let mvg = MvGaussian::standard(2).unwrap();
    /// let f = mvg.f(&DVector::zeros(2));
    ///
    /// assert!((f - 0.159_154_943_091_895_35).abs() < 1E-12);
    /// ```
    fn f(&self, x: &X) -> f64 {
        self.ln_f(x).exp()
    }

    /// Probability function
    fn ln_f(&self, x: &X) -> f64;
}

/// Can draw random values
pub trait Sampleable<X> {
    /// Single draw from the `Rv`
    fn draw<R: Rng>(&self, rng: &mut R) -> X;

    /// Multiple draws of the `Rv`
    ///
    /// # Example
    ///
    /// ```
    /// use mixem::dist::MvGaussian;
    /// use mixem::traits::Sampleable;
    /// use nalgebra::DVector;
    ///
    /// let mut rng = rand::thread_rng();
    /// let mvg = MvGaussian::standard(3).unwrap();
    /// let xs: Vec<DVector<f64>> = mvg.sample(22, &mut rng);
    ///
    /// assert_eq!(xs.len(), 22);
    /// ```
    fn sample<R: Rng>(&self, n: usize, mut rng: &mut R) -> Vec<X> {
        (0..n).map(|_| self.draw(&mut rng)).collect()
    }
}

/// Sufficient statistic
pub trait SuffStat<X> {
    /// Returns the number of observations
    fn n(&self) -> usize;

    /// Assimilate the datum `x` into the statistic
    fn observe(&mut self, x: &X);

    /// Assimilate several observations
    fn observe_many(&mut self, xs: &[X]) {
        xs.iter().for_each(|x| self.observe(x));
    }
}
