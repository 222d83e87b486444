//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::cluster::{ClusterError, Clusterer, KMeans};
#[doc(no_inline)]
pub use crate::constraint::{
    CovarianceConstraint, DiagonalConstraint, EigenvalueRatioConstraint,
    NoConstraint, PositiveDefiniteConstraint,
};
#[doc(no_inline)]
pub use crate::dist::*;
#[doc(no_inline)]
pub use crate::em::EmFit;
#[doc(no_inline)]
pub use crate::gmm::Gmm;
#[doc(no_inline)]
pub use crate::observe::{EmEvent, EmObserver, NullObserver, TracingObserver};
#[doc(no_inline)]
pub use crate::traits::*;
