//! Runtime failures and where they are reported
//!
//! A predicate or transform that fails at runtime, or a host that cannot
//! deliver mutations, ends only the branch it happened in. The failure travels
//! down the stream as [`Emission::Error`](crate::Emission::Error) and reaches
//! the runtime's [`DiagnosticSink`] exactly once, at the edge of the pipeline.

use crate::HostError;
use std::fmt;

/// Error type returned by user predicates and transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A runtime failure confined to one branch of a running selector.
#[derive(Debug, thiserror::Error)]
pub enum BranchError {
    /// A `Watch` predicate, `Filter` predicate or `Map` transform returned an error.
    #[error("{step} failed: {source}")]
    Callback {
        /// The step that failed (e.g. `Filter(visible)`).
        step: String,
        /// The error the callback returned.
        #[source]
        source: BoxError,
    },

    /// The host could not enumerate or observe a node.
    #[error("{step} lost its host observation: {source}")]
    Host {
        /// The step whose observation failed.
        step: String,
        /// The host's error.
        #[source]
        source: HostError,
    },
}

impl BranchError {
    /// The step the failure happened in.
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::Callback { step, .. } | Self::Host { step, .. } => step,
        }
    }
}

/// Receives runtime failures.
///
/// The runtime guarantees one `report` per failure. Implementations must not
/// panic; a sink is called from inside mutation delivery.
pub trait DiagnosticSink {
    /// Record one failure.
    fn report(&self, error: BranchError);
}

impl<F: Fn(BranchError)> DiagnosticSink for F {
    fn report(&self, error: BranchError) {
        self(error);
    }
}

/// Default sink: logs each failure at `warn` via `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: BranchError) {
        tracing::warn!(step = error.step(), error = %error, "selector branch failed");
    }
}

impl fmt::Debug for dyn DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DiagnosticSink")
    }
}
