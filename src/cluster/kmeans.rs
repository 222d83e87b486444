#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::{ClusterError, Clusterer, ClustererConfig};

/// Default cap on the number of Lloyd iterations
pub const DEFAULT_KMEANS_MAX_ITERATIONS: usize = 1000;

/// [k-means](https://en.wikipedia.org/wiki/K-means_clustering) clustering
/// with Lloyd iterations.
///
/// Centroids start at `k` distinct points chosen at random. A centroid that
/// loses all of its points is moved onto the point farthest from its own
/// centroid. Iteration stops when no assignment changes or after
/// `max_iterations` updates.
///
/// # Example
///
/// ```
/// use mixem::cluster::{Clusterer, KMeans};
/// use nalgebra::DVector;
///
/// let xs: Vec<DVector<f64>> = [0.0, 0.1, 0.2, 10.0, 10.1, 10.2]
///     .iter()
///     .map(|&x| DVector::from_element(1, x))
///     .collect();
///
/// let labels = KMeans::default().with_seed(7).cluster(&xs, 2).unwrap();
///
/// assert_eq!(labels[0], labels[1]);
/// assert_eq!(labels[0], labels[2]);
/// assert_eq!(labels[3], labels[5]);
/// assert_ne!(labels[0], labels[3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct KMeans {
    max_iterations: usize,
    seed: Option<u64>,
}

impl KMeans {
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        KMeans {
            max_iterations,
            seed: None,
        }
    }

    /// Seed the centroid selection so that clustering is reproducible
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[inline]
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[inline]
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Default for KMeans {
    fn default() -> Self {
        KMeans::new(DEFAULT_KMEANS_MAX_ITERATIONS)
    }
}

impl Clusterer for KMeans {
    fn cluster(
        &self,
        xs: &[DVector<f64>],
        k: usize,
    ) -> Result<Vec<usize>, ClusterError> {
        let n = xs.len();
        if n == 0 {
            return Err(ClusterError::EmptyData);
        } else if k == 0 {
            return Err(ClusterError::ZeroClusters);
        } else if n < k {
            return Err(ClusterError::TooFewPoints { n, k });
        }

        let mut rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let mut centroids: Vec<DVector<f64>> =
            rand::seq::index::sample(&mut rng, n, k)
                .iter()
                .map(|ix| xs[ix].clone())
                .collect();

        Ok(lloyd(xs, &mut centroids, self.max_iterations))
    }

    fn config(&self) -> ClustererConfig {
        ClustererConfig::KMeans {
            max_iterations: self.max_iterations,
            seed: self.seed,
        }
    }
}

/// Index of the centroid closest to `x`. Ties go to the lowest index.
fn nearest(x: &DVector<f64>, centroids: &[DVector<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (ix, centroid) in centroids.iter().enumerate() {
        let dist = (x - centroid).norm_squared();
        if dist < best_dist {
            best = ix;
            best_dist = dist;
        }
    }
    best
}

fn assign(xs: &[DVector<f64>], centroids: &[DVector<f64>]) -> Vec<usize> {
    xs.iter().map(|x| nearest(x, centroids)).collect()
}

/// Move each centroid to the mean of its points. Empty clusters take the
/// point farthest from its centroid among clusters with more than one point.
fn update_centroids(
    xs: &[DVector<f64>],
    asgn: &mut [usize],
    centroids: &mut [DVector<f64>],
) {
    let k = centroids.len();
    let mut counts = vec![0_usize; k];
    asgn.iter().for_each(|&z| counts[z] += 1);

    for j in 0..k {
        if counts[j] > 0 {
            continue;
        }
        let farthest = xs
            .iter()
            .enumerate()
            .filter(|(ix, _)| counts[asgn[*ix]] > 1)
            .map(|(ix, x)| (ix, (x - &centroids[asgn[ix]]).norm_squared()))
            .fold(None, |best: Option<(usize, f64)>, (ix, dist)| match best {
                Some((_, best_dist)) if best_dist >= dist => best,
                _ => Some((ix, dist)),
            });

        if let Some((ix, _)) = farthest {
            counts[asgn[ix]] -= 1;
            counts[j] += 1;
            asgn[ix] = j;
        }
    }

    let dims = xs[0].len();
    let mut sums = vec![DVector::<f64>::zeros(dims); k];
    xs.iter()
        .zip(asgn.iter())
        .for_each(|(x, &z)| sums[z] += x);

    centroids
        .iter_mut()
        .zip(sums)
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .for_each(|((centroid, sum), count)| *centroid = sum / count as f64);
}

/// Lloyd iterations from the given centroids. Returns the final assignment
/// and leaves the final centroids in `centroids`.
pub(crate) fn lloyd(
    xs: &[DVector<f64>],
    centroids: &mut [DVector<f64>],
    max_iterations: usize,
) -> Vec<usize> {
    let mut asgn = assign(xs, centroids);
    for _ in 0..max_iterations {
        update_centroids(xs, &mut asgn, centroids);
        let next = assign(xs, centroids);
        if next == asgn {
            break;
        }
        asgn = next;
    }
    asgn
}
