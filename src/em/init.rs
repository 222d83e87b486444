use nalgebra::{DMatrix, DVector};

use crate::cluster::{ClusterError, Clusterer};
use crate::constraint::CovarianceConstraint;
use crate::data::MvGaussianSuffStat;
use crate::dist::MvGaussian;
use crate::traits::SuffStat;

/// Seed a model from a hard clustering of `xs`.
///
/// The clusterer is asked for `components.len()` clusters. Each component
/// then takes the mean and the (constrained) covariance of its cluster, and
/// its mixing weight becomes the fraction of points in that cluster. An
/// empty cluster yields a zero mean and the constrained zero matrix.
///
/// Labels from the clusterer are checked: a label outside `0..k` or a label
/// vector of the wrong length is an error.
pub fn initial_clustering(
    xs: &[DVector<f64>],
    components: &mut [MvGaussian],
    weights: &mut [f64],
    clusterer: &dyn Clusterer,
    constraint: &dyn CovarianceConstraint,
) -> Result<(), ClusterError> {
    let k = components.len();
    let asgn = clusterer.cluster(xs, k)?;
    validate_labels(&asgn, xs.len(), k)?;

    let mut stats: Vec<MvGaussianSuffStat> = components
        .iter()
        .map(|cpnt| MvGaussianSuffStat::new(cpnt.dims()))
        .collect();
    xs.iter()
        .zip(asgn.iter())
        .for_each(|(x, &z)| stats[z].observe(x));

    let means: Vec<DVector<f64>> =
        stats.iter().map(MvGaussianSuffStat::mean_clamped).collect();

    // Second pass so the covariance is centered on the cluster mean
    let mut covs: Vec<DMatrix<f64>> = components
        .iter()
        .map(|cpnt| DMatrix::zeros(cpnt.dims(), cpnt.dims()))
        .collect();
    xs.iter().zip(asgn.iter()).for_each(|(x, &z)| {
        let diff = x - &means[z];
        covs[z].ger(1.0, &diff, &diff, 1.0);
    });

    let n = xs.len() as f64;
    for (((cpnt, w), (mean, mut cov)), stat) in components
        .iter_mut()
        .zip(weights.iter_mut())
        .zip(means.into_iter().zip(covs))
        .zip(stats.iter())
    {
        cov.fill_lower_triangle_with_upper_triangle();
        cov /= stat.n().max(1) as f64;
        constraint.apply(&mut cov);

        cpnt.set_mu_unchecked(mean);
        cpnt.set_cov_unchecked(cov);
        *w = stat.n() as f64 / n;
    }

    let total: f64 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= total);

    Ok(())
}

fn validate_labels(asgn: &[usize], n: usize, k: usize) -> Result<(), ClusterError> {
    if asgn.len() != n {
        return Err(ClusterError::AssignmentLengthMismatch {
            n_points: n,
            n_labels: asgn.len(),
        });
    }
    asgn.iter().enumerate().try_for_each(|(ix, &label)| {
        if label >= k {
            Err(ClusterError::LabelOutOfRange { ix, label, k })
        } else {
            Ok(())
        }
    })
}
