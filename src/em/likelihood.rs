use nalgebra::DVector;

use crate::dist::MvGaussian;
use crate::observe::{EmEvent, EmObserver};

/// Log-likelihood of `xs` under the mixture Σ w<sub>k</sub> f<sub>k</sub>.
///
/// A point with zero mixture density is reported to `observer` as a
/// [`EmEvent::ZeroLikelihood`] and contributes `-∞` to the sum.
///
/// # Example
///
/// ```
/// use mixem::dist::MvGaussian;
/// use mixem::em::ln_likelihood;
/// use mixem::observe::NullObserver;
/// use nalgebra::DVector;
///
/// let cpnts = vec![MvGaussian::standard(2).unwrap()];
/// let xs = vec![DVector::zeros(2)];
/// let ll = ln_likelihood(&xs, &cpnts, &[1.0], &NullObserver);
///
/// // ln(1 / 2π)
/// assert!((ll + 1.837_877_066_409_345_3).abs() < 1E-12);
/// ```
pub fn ln_likelihood(
    xs: &[DVector<f64>],
    components: &[MvGaussian],
    weights: &[f64],
    observer: &dyn EmObserver,
) -> f64 {
    let mut likelihoods = DVector::<f64>::zeros(xs.len());
    components
        .iter()
        .zip(weights.iter())
        .for_each(|(cpnt, &w)| likelihoods.axpy(w, &cpnt.probability(xs), 1.0));

    likelihoods
        .iter()
        .enumerate()
        .map(|(index, &l)| {
            if l == 0.0 {
                observer.observe(EmEvent::ZeroLikelihood { index });
            }
            l.ln()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::LN_2PI;
    use crate::observe::{NullObserver, RecordingObserver};
    use nalgebra::DMatrix;

    const TOL: f64 = 1E-12;

    #[test]
    fn single_component_matches_density() {
        let g = MvGaussian::new(
            DVector::from_column_slice(&[1.0, 2.0]),
            DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]),
        )
        .unwrap();
        let xs = vec![
            DVector::from_column_slice(&[0.0, 0.0]),
            DVector::from_column_slice(&[1.0, 2.5]),
        ];
        let expected: f64 = xs.iter().map(|x| g.probability(&[x.clone()])[0].ln()).sum();
        let ll = ln_likelihood(&xs, &[g], &[1.0], &NullObserver);
        assert::close(ll, expected, TOL);
    }

    #[test]
    fn weights_scale_components() {
        let g = MvGaussian::standard(1).unwrap();
        let xs = vec![DVector::zeros(1)];
        // Two identical halves are the same as one whole
        let ll = ln_likelihood(&xs, &[g.clone(), g], &[0.5, 0.5], &NullObserver);
        assert::close(ll, -0.5 * LN_2PI, TOL);
    }

    #[test]
    fn zero_likelihood_point_is_reported_not_fatal() {
        let g = MvGaussian::standard(2).unwrap();
        let xs = vec![
            DVector::zeros(2),
            DVector::from_element(2, 1e4),
            DVector::from_element(2, 0.5),
        ];
        let obs = RecordingObserver::default();
        let ll = ln_likelihood(&xs, &[g], &[1.0], &obs);

        assert_eq!(ll, f64::NEG_INFINITY);
        assert_eq!(obs.events(), vec![EmEvent::ZeroLikelihood { index: 1 }]);
    }
}
