//! Diagnostics emitted while fitting
//!
//! The EM engine reports progress and non-fatal numerical problems to an
//! injected [`EmObserver`]. Nothing reported here changes control flow.
use std::sync::Mutex;

/// An event emitted by the EM engine
#[derive(Debug, Clone, PartialEq)]
pub enum EmEvent {
    /// Log-likelihood of the starting model, before any EM pass
    InitialLogLikelihood { ln_likelihood: f64 },
    /// Emitted at the start of every EM pass with the log-likelihood of the
    /// model going into that pass
    Iteration { iteration: usize, ln_likelihood: f64 },
    /// The mixture assigns zero density to the point at `index`. The point
    /// is probably an outlier.
    ZeroLikelihood { index: usize },
    /// The fast diagonal path uses its own tolerance, so the configured one
    /// is not used
    ToleranceIgnored { tolerance: f64 },
    /// The fit has returned. `iterations` is the value of the iteration
    /// counter at exit.
    Finished { iterations: usize, ln_likelihood: f64 },
}

/// Receives [`EmEvent`]s
pub trait EmObserver: Send + Sync {
    fn observe(&self, event: EmEvent);
}

/// Forwards events to [`tracing`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EmObserver for TracingObserver {
    fn observe(&self, event: EmEvent) {
        match event {
            EmEvent::InitialLogLikelihood { ln_likelihood } => {
                tracing::debug!(
                    ln_likelihood,
                    "EmFit::estimate(): initial log-likelihood"
                );
            }
            EmEvent::Iteration {
                iteration,
                ln_likelihood,
            } => {
                tracing::info!(iteration, ln_likelihood, "EmFit::estimate(): iteration");
            }
            EmEvent::ZeroLikelihood { index } => {
                tracing::info!(
                    index,
                    "likelihood of point is 0; it is probably an outlier"
                );
            }
            EmEvent::ToleranceIgnored { tolerance } => {
                tracing::warn!(
                    tolerance,
                    "tolerance ignored when fitting with a diagonal constraint"
                );
            }
            EmEvent::Finished {
                iterations,
                ln_likelihood,
            } => {
                tracing::debug!(iterations, ln_likelihood, "EmFit::estimate(): done");
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl EmObserver for NullObserver {
    fn observe(&self, _event: EmEvent) {}
}

/// Keeps every event in memory
///
/// # Example
///
/// ```
/// use mixem::observe::{EmEvent, EmObserver, RecordingObserver};
///
/// let obs = RecordingObserver::default();
/// obs.observe(EmEvent::ZeroLikelihood { index: 3 });
///
/// assert_eq!(obs.events(), vec![EmEvent::ZeroLikelihood { index: 3 }]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<EmEvent>>,
}

impl RecordingObserver {
    /// A copy of the events seen so far
    pub fn events(&self) -> Vec<EmEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The log-likelihood trace: the initial value, the value at the start
    /// of each pass, and the final value.
    pub fn ln_likelihoods(&self) -> Vec<f64> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                EmEvent::InitialLogLikelihood { ln_likelihood }
                | EmEvent::Finished { ln_likelihood, .. } => Some(*ln_likelihood),
                EmEvent::Iteration {
                    iteration,
                    ln_likelihood,
                } if *iteration > 1 => Some(*ln_likelihood),
                _ => None,
            })
            .collect()
    }
}

impl EmObserver for RecordingObserver {
    fn observe(&self, event: EmEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl<T: EmObserver + ?Sized> EmObserver for std::sync::Arc<T> {
    fn observe(&self, event: EmEvent) {
        (**self).observe(event);
    }
}
