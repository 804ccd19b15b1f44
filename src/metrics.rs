//! Metric helpers for `airharness`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking resolved waits.
pub const WAITS_TOTAL: &str = "airharness_waits_total";
/// Name of the gauge tracking outstanding waits.
pub const WAITS_PENDING: &str = "airharness_waits_pending";
/// Name of the counter tracking credential dispatches.
pub const DISPATCH_TOTAL: &str = "airharness_dispatch_total";

/// How a wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition or transition was observed.
    Satisfied,
    /// The deadline elapsed.
    Timeout,
    /// The transition path was broken.
    Violation,
    /// Any other failure.
    Failed,
}

impl WaitOutcome {
    /// Label value recorded for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WaitOutcome::Satisfied => "satisfied",
            WaitOutcome::Timeout => "timeout",
            WaitOutcome::Violation => "violation",
            WaitOutcome::Failed => "failed",
        }
    }
}

/// How a credential dispatch ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The head agent supplied a credential.
    Answered,
    /// The head agent refused.
    Refused,
    /// No agent was registered.
    NoAgent,
}

impl DispatchOutcome {
    /// Label value recorded for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DispatchOutcome::Answered => "answered",
            DispatchOutcome::Refused => "refused",
            DispatchOutcome::NoAgent => "no_agent",
        }
    }
}

/// Record a resolved wait.
#[cfg(feature = "metrics")]
pub fn inc_waits(outcome: WaitOutcome) {
    counter!(WAITS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Increment the outstanding waits gauge.
#[cfg(feature = "metrics")]
pub fn inc_pending() { gauge!(WAITS_PENDING).increment(1.0); }

/// Decrement the outstanding waits gauge.
#[cfg(feature = "metrics")]
pub fn dec_pending() { gauge!(WAITS_PENDING).decrement(1.0); }

/// Record a credential dispatch.
#[cfg(feature = "metrics")]
pub fn inc_dispatch(outcome: DispatchOutcome) {
    counter!(DISPATCH_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Record a resolved wait.
#[cfg(not(feature = "metrics"))]
pub fn inc_waits(_outcome: WaitOutcome) {}

/// Increment the outstanding waits gauge.
#[cfg(not(feature = "metrics"))]
pub fn inc_pending() {}

/// Decrement the outstanding waits gauge.
#[cfg(not(feature = "metrics"))]
pub fn dec_pending() {}

/// Record a credential dispatch.
#[cfg(not(feature = "metrics"))]
pub fn inc_dispatch(_outcome: DispatchOutcome) {}
