use nalgebra::{DMatrix, DVector};

use crate::constraint::CovarianceConstraint;
use crate::dist::MvGaussian;

/// The E-step: the N×K matrix whose entry (i, k) is the posterior
/// probability that point i came from component k.
///
/// Each row sums to one, except rows for points that every component gives
/// zero density. Those rows are left as all zeros rather than divided by
/// zero.
pub fn responsibilities(
    xs: &[DVector<f64>],
    components: &[MvGaussian],
    weights: &[f64],
) -> DMatrix<f64> {
    let mut resp = DMatrix::<f64>::zeros(xs.len(), components.len());
    for (k, (cpnt, &w)) in components.iter().zip(weights.iter()).enumerate() {
        resp.set_column(k, &(cpnt.probability(xs) * w));
    }

    for mut row in resp.row_iter_mut() {
        let row_sum = row.sum();
        if row_sum != 0.0 {
            row /= row_sum;
        }
    }

    resp
}

/// The M-step: re-estimate means, covariances, and mixing weights from the
/// responsibilities.
///
/// The effective mass of component k is the sum of column k of `resp`,
/// each entry multiplied by the matching point weight if `point_weights` is
/// given. A component with zero effective mass keeps its mean and
/// covariance. Mixing weights become effective mass over total mass, where
/// the total mass is N, or the sum of the point weights.
///
/// Returns the effective masses.
pub fn update_parameters(
    xs: &[DVector<f64>],
    resp: &DMatrix<f64>,
    point_weights: Option<&[f64]>,
    components: &mut [MvGaussian],
    weights: &mut [f64],
    constraint: &dyn CovarianceConstraint,
) -> Vec<f64> {
    debug_assert!(point_weights.map_or(true, |p| p.len() == xs.len()));

    let total_mass = match point_weights {
        Some(p) => p.iter().sum::<f64>(),
        None => xs.len() as f64,
    };

    let masses: Vec<f64> = components
        .iter_mut()
        .enumerate()
        .map(|(k, cpnt)| {
            let rs: Vec<f64> = match point_weights {
                Some(p) => resp.column(k).iter().zip(p).map(|(r, p)| r * p).collect(),
                None => resp.column(k).iter().copied().collect(),
            };
            let mass: f64 = rs.iter().sum();

            if mass != 0.0 {
                let (mu, mut cov) = weighted_moments(xs, &rs, mass, cpnt.dims());
                constraint.apply(&mut cov);
                cpnt.set_mu_unchecked(mu);
                cpnt.set_cov_unchecked(cov);
            }
            mass
        })
        .collect();

    weights
        .iter_mut()
        .zip(masses.iter())
        .for_each(|(w, mass)| *w = mass / total_mass);

    masses
}

/// Weighted mean and covariance. The covariance is centered on the new
/// mean.
fn weighted_moments(
    xs: &[DVector<f64>],
    rs: &[f64],
    mass: f64,
    dims: usize,
) -> (DVector<f64>, DMatrix<f64>) {
    let mut mu = DVector::<f64>::zeros(dims);
    xs.iter().zip(rs).for_each(|(x, &r)| mu.axpy(r, x, 1.0));
    mu /= mass;

    let mut cov = DMatrix::<f64>::zeros(dims, dims);
    xs.iter().zip(rs).for_each(|(x, &r)| {
        let diff = x - &mu;
        cov.ger(r, &diff, &diff, 1.0);
    });
    cov.fill_lower_triangle_with_upper_triangle();
    cov /= mass;

    (mu, cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{DiagonalConstraint, NoConstraint};

    const TOL: f64 = 1E-9;

    fn line_data() -> Vec<DVector<f64>> {
        (0..20)
            .map(|i| {
                let x = i as f64 / 4.0;
                DVector::from_column_slice(&[x, 0.5 * x + (i % 3) as f64])
            })
            .collect()
    }

    fn two_components() -> (Vec<MvGaussian>, Vec<f64>) {
        let g1 = MvGaussian::new(
            DVector::from_column_slice(&[1.0, 1.0]),
            DMatrix::identity(2, 2),
        )
        .unwrap();
        let g2 = MvGaussian::new(
            DVector::from_column_slice(&[4.0, 3.0]),
            DMatrix::identity(2, 2) * 2.0,
        )
        .unwrap();
        (vec![g1, g2], vec![0.4, 0.6])
    }

    #[test]
    fn rows_sum_to_one() {
        let xs = line_data();
        let (cpnts, weights) = two_components();
        let resp = responsibilities(&xs, &cpnts, &weights);

        assert_eq!(resp.shape(), (20, 2));
        for row in resp.row_iter() {
            assert::close(row.sum(), 1.0, TOL);
        }
    }

    #[test]
    fn zero_row_is_left_as_zero() {
        let mut xs = line_data();
        xs.push(DVector::from_element(2, 1e5));
        let (cpnts, weights) = two_components();
        let resp = responsibilities(&xs, &cpnts, &weights);

        let last = resp.row(xs.len() - 1);
        assert!(last.iter().all(|&r| r == 0.0));
        assert!(resp.iter().all(|r| !r.is_nan()));
    }

    #[test]
    fn m_step_weights_sum_to_one() {
        let xs = line_data();
        let (mut cpnts, mut weights) = two_components();
        let resp = responsibilities(&xs, &cpnts, &weights);
        let masses =
            update_parameters(&xs, &resp, None, &mut cpnts, &mut weights, &NoConstraint);

        assert::close(masses.iter().sum::<f64>(), 20.0, TOL);
        assert::close(weights.iter().sum::<f64>(), 1.0, TOL);
        assert!(weights.iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn single_component_m_step_is_sample_moments() {
        let xs = line_data();
        let mut cpnts = vec![MvGaussian::standard(2).unwrap()];
        let mut weights = vec![1.0];
        let resp = responsibilities(&xs, &cpnts, &weights);
        update_parameters(&xs, &resp, None, &mut cpnts, &mut weights, &NoConstraint);

        let n = xs.len() as f64;
        let mean: DVector<f64> = xs.iter().fold(DVector::zeros(2), |acc, x| acc + x) / n;
        let cov: DMatrix<f64> = xs.iter().fold(DMatrix::zeros(2, 2), |acc, x| {
            let diff = x - &mean;
            acc + &diff * diff.transpose()
        }) / n;

        assert::close(cpnts[0].mu().as_slice().to_vec(), mean.as_slice().to_vec(), TOL);
        assert::close(cpnts[0].cov().as_slice().to_vec(), cov.as_slice().to_vec(), TOL);
        assert::close(weights[0], 1.0, TOL);
    }

    #[test]
    fn constraint_is_applied_to_new_covariance() {
        let xs = line_data();
        let (mut cpnts, mut weights) = two_components();
        let resp = responsibilities(&xs, &cpnts, &weights);
        update_parameters(&xs, &resp, None, &mut cpnts, &mut weights, &DiagonalConstraint);

        for cpnt in &cpnts {
            assert_eq!(cpnt.cov()[(0, 1)], 0.0);
            assert_eq!(cpnt.cov()[(1, 0)], 0.0);
        }
    }

    #[test]
    fn component_with_zero_mass_is_frozen() {
        let xs = line_data();
        let (mut cpnts, mut weights) = two_components();
        let far = MvGaussian::new(
            DVector::from_element(2, 1e4),
            DMatrix::identity(2, 2) * 0.1,
        )
        .unwrap();
        cpnts.push(far.clone());
        weights = vec![0.4, 0.5, 0.1];

        let resp = responsibilities(&xs, &cpnts, &weights);
        let masses =
            update_parameters(&xs, &resp, None, &mut cpnts, &mut weights, &NoConstraint);

        assert_eq!(masses[2], 0.0);
        assert_eq!(cpnts[2], far);
        assert_eq!(weights[2], 0.0);
        assert::close(weights.iter().sum::<f64>(), 1.0, TOL);
    }

    #[test]
    fn unit_point_weights_match_unweighted() {
        let xs = line_data();
        let (mut cpnts_a, mut weights_a) = two_components();
        let (mut cpnts_b, mut weights_b) = two_components();
        let ones = vec![1.0; xs.len()];

        let resp = responsibilities(&xs, &cpnts_a, &weights_a);
        update_parameters(&xs, &resp, None, &mut cpnts_a, &mut weights_a, &NoConstraint);
        update_parameters(
            &xs,
            &resp,
            Some(&ones),
            &mut cpnts_b,
            &mut weights_b,
            &NoConstraint,
        );

        assert_eq!(cpnts_a, cpnts_b);
        assert_eq!(weights_a, weights_b);
    }

    #[test]
    fn point_weights_shift_the_mean() {
        let xs = vec![
            DVector::from_element(1, 0.0),
            DVector::from_element(1, 1.0),
        ];
        let mut cpnts = vec![MvGaussian::standard(1).unwrap()];
        let mut weights = vec![1.0];
        let resp = responsibilities(&xs, &cpnts, &weights);
        update_parameters(
            &xs,
            &resp,
            Some(&[1.0, 3.0]),
            &mut cpnts,
            &mut weights,
            &NoConstraint,
        );

        assert::close(cpnts[0].mu()[0], 0.75, TOL);
        assert::close(cpnts[0].cov()[(0, 0)], 0.1875, TOL);
        assert::close(weights[0], 1.0, TOL);
    }
}
