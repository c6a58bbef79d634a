//! Feasibility restoration phase for an interior-point NLP solver.
//!
//! When the primary interior-point trajectory stalls at an infeasible point
//! or the step computation breaks down, the solver hands control to the
//! restoration phase. This crate implements that component:
//!
//! - **Elastic reformulation**: the original constraints are relaxed with
//!   nonnegative violation variables and the weighted violation is minimized
//!   by a recursive invocation of the same interior-point algorithm.
//! - **Option derivation**: each attempt runs the nested solve under a
//!   layered configuration derived from the caller's immutable snapshot
//!   (time budgets, square-problem and expected-infeasibility tuning).
//! - **Outcome taxonomy**: the nested termination status is folded into one
//!   tagged [`Outcome`](resto::Outcome), distinguishing genuine local
//!   infeasibility from recoverable failure, timeouts, and square-problem
//!   termination.
//! - **Multiplier recovery**: on success the bound multipliers are rebuilt
//!   by a complementarity-consistent pseudo-Newton step, limited by the
//!   fraction-to-the-boundary rule, with a uniform reset fallback.
//!
//! The step computation, globalization, derivative evaluation and linear
//! algebra of the surrounding solver stay behind the trait seams in
//! [`solver`] and [`problem`].

#![warn(clippy::all)]

pub mod iterate;
pub mod options;
pub mod problem;
pub mod quantities;
pub mod resto;
pub mod solver;
pub mod timing;
pub mod vector;

pub use iterate::{Iterate, ProgressInfo, SolverState};
pub use options::{LayeredOptions, OptValue, OptionsError, OptionsSnapshot, OverrideLayer};
pub use problem::{is_square_problem, Bounds, Nlp};
pub use quantities::{curr_tau, dual_frac_to_the_bound, Quantities};
pub use resto::{
    build_restoration_setup, classify, Outcome, RestoNlp, RestoSetup, RestorationError,
    RestorationPhase, RestorationSettings,
};
pub use solver::{EqMultiplierEstimator, NlpSolver, TerminationStatus};
pub use timing::{Clock, TimingStats, WallClock};
pub use vector::{BlockVec, LayoutError};
