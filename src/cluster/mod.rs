//! Hard clustering used to seed a mixture
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::DVector;
use std::fmt;

mod kmeans;

pub use kmeans::{KMeans, DEFAULT_KMEANS_MAX_ITERATIONS};
pub(crate) use kmeans::lloyd;

/// Produces a hard assignment of points to clusters
pub trait Clusterer: Send + Sync {
    /// Assign every point in `xs` a label in `0..k`
    fn cluster(
        &self,
        xs: &[DVector<f64>],
        k: usize,
    ) -> Result<Vec<usize>, ClusterError>;

    /// Describes the clusterer. Built-in clusterers return their own
    /// variant, which is also how the fast diagonal path recognizes the
    /// default clusterer.
    fn config(&self) -> ClustererConfig {
        ClustererConfig::Custom {
            name: std::any::type_name::<Self>().to_owned(),
        }
    }
}

/// Serializable description of a clusterer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum ClustererConfig {
    /// The default k-means clusterer
    KMeans {
        max_iterations: usize,
        seed: Option<u64>,
    },
    /// A user-defined clusterer that cannot be rebuilt from its description
    Custom { name: String },
}

impl ClustererConfig {
    /// Build the clusterer this record describes. Returns `None` for
    /// `Custom` clusterers.
    pub fn build(&self) -> Option<Box<dyn Clusterer>> {
        match self {
            Self::KMeans {
                max_iterations,
                seed,
            } => {
                let km = KMeans::new(*max_iterations);
                let km = match seed {
                    Some(seed) => km.with_seed(*seed),
                    None => km,
                };
                Some(Box::new(km))
            }
            Self::Custom { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum ClusterError {
    /// There are no points to cluster
    EmptyData,
    /// Zero clusters were requested
    ZeroClusters,
    /// Fewer points than clusters
    TooFewPoints { n: usize, k: usize },
    /// The clusterer returned a label outside `0..k`
    LabelOutOfRange { ix: usize, label: usize, k: usize },
    /// The clusterer returned the wrong number of labels
    AssignmentLengthMismatch { n_points: usize, n_labels: usize },
    /// Any other failure in a user-defined clusterer
    Other(String),
}

impl std::error::Error for ClusterError {}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyData => write!(f, "no points to cluster"),
            Self::ZeroClusters => write!(f, "the number of clusters must be > 0"),
            Self::TooFewPoints { n, k } => {
                write!(f, "cannot split {n} points into {k} clusters")
            }
            Self::LabelOutOfRange { ix, label, k } => write!(
                f,
                "point {ix} was assigned label {label}, but there are only {k} clusters"
            ),
            Self::AssignmentLengthMismatch { n_points, n_labels } => write!(
                f,
                "{n_labels} labels were returned for {n_points} points"
            ),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}
