//! Collaborator seams: the recursive solver and the equality-multiplier
//! estimator.
//!
//! The restoration phase re-invokes the full interior-point algorithm on the
//! elastic problem. The solver is modeled as a service taking all mutable
//! state as explicit arguments and returning a termination status, so an
//! instance can safely be re-entered while an outer invocation is still on
//! the call stack, and tests can substitute a stub.

use std::fmt;

use crate::iterate::SolverState;
use crate::options::LayeredOptions;
use crate::problem::Nlp;
use crate::quantities::Quantities;

/// Termination status of an interior-point solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// Converged to a point satisfying the optimality tolerances.
    Success,
    /// Stopped at a point satisfying the acceptable (relaxed) tolerances.
    AcceptableStop,
    /// Search direction became too small to make progress.
    TinyStep,
    /// Iteration limit reached.
    MaxIterExceeded,
    /// CPU time limit reached.
    CpuTimeExceeded,
    /// Wall-clock time limit reached.
    WallTimeExceeded,
    /// Converged to a stationary point of the infeasibility measure.
    LocalInfeasibility,
    /// The solve's own restoration phase failed.
    RestorationFailure,
    /// The step computation failed irrecoverably.
    ErrorInStepComputation,
    /// Stop requested through a user callback.
    UserRequestedStop,
    /// Iterates are diverging.
    DivergingIterates,
    /// NaN or infinity encountered in problem functions.
    InvalidNumberDetected,
    /// Unexpected internal failure.
    InternalError,
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationStatus::Success => "Success",
            TerminationStatus::AcceptableStop => "AcceptableStop",
            TerminationStatus::TinyStep => "TinyStep",
            TerminationStatus::MaxIterExceeded => "MaxIterExceeded",
            TerminationStatus::CpuTimeExceeded => "CpuTimeExceeded",
            TerminationStatus::WallTimeExceeded => "WallTimeExceeded",
            TerminationStatus::LocalInfeasibility => "LocalInfeasibility",
            TerminationStatus::RestorationFailure => "RestorationFailure",
            TerminationStatus::ErrorInStepComputation => "ErrorInStepComputation",
            TerminationStatus::UserRequestedStop => "UserRequestedStop",
            TerminationStatus::DivergingIterates => "DivergingIterates",
            TerminationStatus::InvalidNumberDetected => "InvalidNumberDetected",
            TerminationStatus::InternalError => "InternalError",
        };
        write!(f, "{s}")
    }
}

/// All termination statuses, for exhaustiveness checks in tests.
pub const ALL_TERMINATION_STATUSES: [TerminationStatus; 13] = [
    TerminationStatus::Success,
    TerminationStatus::AcceptableStop,
    TerminationStatus::TinyStep,
    TerminationStatus::MaxIterExceeded,
    TerminationStatus::CpuTimeExceeded,
    TerminationStatus::WallTimeExceeded,
    TerminationStatus::LocalInfeasibility,
    TerminationStatus::RestorationFailure,
    TerminationStatus::ErrorInStepComputation,
    TerminationStatus::UserRequestedStop,
    TerminationStatus::DivergingIterates,
    TerminationStatus::InvalidNumberDetected,
    TerminationStatus::InternalError,
];

/// Recursive interior-point solver.
///
/// `prefix` selects the option namespace of this invocation (the restoration
/// phase passes `"resto."`); `from_restoration` tells the solve it is running
/// on an elastic restoration problem. The call is synchronous and may itself
/// recurse into restoration; each level owns the state passed to it.
pub trait NlpSolver {
    fn optimize(
        &mut self,
        problem: &dyn Nlp,
        state: &mut SolverState,
        quantities: &mut Quantities,
        options: &LayeredOptions,
        prefix: &str,
        from_restoration: bool,
    ) -> TerminationStatus;
}

/// Least-squares estimator for equality and inequality constraint
/// multipliers.
///
/// Updates the trial iterate's `y_c`/`y_d` in place. When the estimate is
/// ill-conditioned or exceeds `reset_threshold` in magnitude, the
/// implementation falls back to leaving the multipliers unchanged; the call
/// itself never fails.
pub trait EqMultiplierEstimator {
    fn estimate(
        &mut self,
        problem: &dyn Nlp,
        state: &mut SolverState,
        quantities: &mut Quantities,
        reset_threshold: f64,
    );
}
