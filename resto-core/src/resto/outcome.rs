//! Outcome taxonomy of a restoration attempt.
//!
//! The nested solve's raw termination status is folded into exactly one
//! [`Outcome`] tag by [`classify`]. The decision table is ordered; the first
//! matching row wins. The match over [`TerminationStatus`] is exhaustive on
//! purpose: a new status added to the solver must be given a row here before
//! the crate compiles again.

use std::fmt;

use crate::solver::TerminationStatus;

/// Result of one restoration attempt, produced once by the classifier and
/// consumed once by the controller's caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Restoration recovered a point the outer algorithm can continue from.
    Success,
    /// Square problem solved to feasibility; the overall run is finished.
    FeasibilityProblemSolved,
    /// Stalled at a point whose infeasibility is small; report "feasible but
    /// not optimal" rather than a hard failure.
    ConvergedToFeasiblePoint,
    /// Converged to a stationary point of the infeasibility measure.
    LocallyInfeasible,
    /// Nested iteration limit reached.
    MaxIterExceeded,
    /// Nested wall-clock budget exhausted.
    WalltimeExceeded,
    /// Nested CPU-time budget exhausted.
    CputimeExceeded,
    /// The nested solve failed without recovering feasibility.
    RestorationFailed,
    /// Stop requested through a user callback during restoration.
    UserStop,
    /// Termination status with no defined recovery; unrecoverable.
    Unclassified,
}

impl Outcome {
    /// True for the two continuable/terminal success tags.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::FeasibilityProblemSolved)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Success => "Success",
            Outcome::FeasibilityProblemSolved => "FeasibilityProblemSolved",
            Outcome::ConvergedToFeasiblePoint => "ConvergedToFeasiblePoint",
            Outcome::LocallyInfeasible => "LocallyInfeasible",
            Outcome::MaxIterExceeded => "MaxIterExceeded",
            Outcome::WalltimeExceeded => "WalltimeExceeded",
            Outcome::CputimeExceeded => "CputimeExceeded",
            Outcome::RestorationFailed => "RestorationFailed",
            Outcome::UserStop => "UserStop",
            Outcome::Unclassified => "Unclassified",
        };
        write!(f, "{s}")
    }
}

/// Violation measures of the outer problem at classification time.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyMetrics {
    /// Unscaled max-norm constraint violation.
    pub unscaled_constraint_violation: f64,
    /// Primal infeasibility (max norm).
    pub primal_infeasibility: f64,
}

/// Tolerances consulted by the classifier.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyThresholds {
    /// Constraint-violation tolerance of the overall run.
    pub constr_viol_tol: f64,
    /// Primal infeasibility below which a stalled restoration still counts
    /// as having reached a feasible point.
    pub failure_feasibility: f64,
}

/// Fold a nested termination status into one outcome tag.
pub fn classify(
    status: TerminationStatus,
    square_problem: bool,
    metrics: &ClassifyMetrics,
    thresholds: &ClassifyThresholds,
) -> Outcome {
    match status {
        TerminationStatus::Success => Outcome::Success,

        TerminationStatus::AcceptableStop
            if square_problem
                && metrics.unscaled_constraint_violation < thresholds.constr_viol_tol =>
        {
            Outcome::FeasibilityProblemSolved
        }

        TerminationStatus::TinyStep | TerminationStatus::AcceptableStop => {
            if metrics.primal_infeasibility <= thresholds.failure_feasibility {
                Outcome::ConvergedToFeasiblePoint
            } else {
                Outcome::LocallyInfeasible
            }
        }

        TerminationStatus::MaxIterExceeded => Outcome::MaxIterExceeded,
        TerminationStatus::CpuTimeExceeded => Outcome::CputimeExceeded,
        TerminationStatus::WallTimeExceeded => Outcome::WalltimeExceeded,
        TerminationStatus::LocalInfeasibility => Outcome::LocallyInfeasible,

        TerminationStatus::RestorationFailure | TerminationStatus::ErrorInStepComputation => {
            Outcome::RestorationFailed
        }

        TerminationStatus::UserRequestedStop => Outcome::UserStop,

        TerminationStatus::DivergingIterates
        | TerminationStatus::InvalidNumberDetected
        | TerminationStatus::InternalError => Outcome::Unclassified,
    }
}
