//! Iterate containers and per-run solver state.

use crate::problem::Bounds;
use crate::timing::TimingStats;
use crate::vector::BlockVec;

/// One primal-dual point.
///
/// `y_c`/`y_d` are the equality/inequality constraint multipliers; `z_l`/`z_u`
/// the multipliers for lower/upper variable bounds and `v_l`/`v_u` those for
/// lower/upper slack bounds, all in compressed bound order.
#[derive(Debug, Clone)]
pub struct Iterate {
    pub x: BlockVec,
    pub s: BlockVec,
    pub y_c: BlockVec,
    pub y_d: BlockVec,
    pub z_l: BlockVec,
    pub z_u: BlockVec,
    pub v_l: BlockVec,
    pub v_u: BlockVec,
}

impl Iterate {
    /// All-zero dense iterate with the dimensions implied by the problem.
    pub fn zeros(num_vars: usize, num_eq: usize, num_ineq: usize, bounds: &Bounds) -> Self {
        Self {
            x: BlockVec::zeros(num_vars),
            s: BlockVec::zeros(num_ineq),
            y_c: BlockVec::zeros(num_eq),
            y_d: BlockVec::zeros(num_ineq),
            z_l: BlockVec::zeros(bounds.x_lower.len()),
            z_u: BlockVec::zeros(bounds.x_upper.len()),
            v_l: BlockVec::zeros(bounds.s_lower.len()),
            v_u: BlockVec::zeros(bounds.s_upper.len()),
        }
    }
}

/// Diagnostic fields carried between outer and nested runs so that progress
/// reporting stays continuous across a restoration attempt.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Last primal regularization used in the step computation.
    pub regu_x: f64,
    /// Last primal step size.
    pub alpha_primal: f64,
    /// Line-search tag printed next to the primal step size.
    pub alpha_primal_char: char,
    /// Last dual step size.
    pub alpha_dual: f64,
    /// Line-search trial count of the last iteration.
    pub ls_count: usize,
    /// Iterations since the last output header.
    pub iters_since_header: usize,
    /// Iteration number of the last progress line.
    pub last_output: f64,
    /// Suppress the next progress line (it would duplicate the nested run's).
    pub skip_output: bool,
}

impl Default for ProgressInfo {
    fn default() -> Self {
        Self {
            regu_x: 0.0,
            alpha_primal: 0.0,
            alpha_primal_char: ' ',
            alpha_dual: 0.0,
            ls_count: 0,
            iters_since_header: 0,
            last_output: -1.0,
            skip_output: false,
        }
    }
}

/// Mutable state of one solver level: current and trial iterates, barrier
/// parameter, iteration counter, timing stamps and progress bookkeeping.
///
/// Each restoration attempt creates a fresh `SolverState` for the nested
/// level; nothing of it survives the attempt.
#[derive(Debug, Clone)]
pub struct SolverState {
    pub curr: Iterate,
    pub trial: Iterate,
    /// Barrier parameter mu.
    pub mu: f64,
    pub iter_count: usize,
    pub timing: TimingStats,
    pub info: ProgressInfo,
}

impl SolverState {
    pub fn new(curr: Iterate, timing: TimingStats) -> Self {
        let trial = curr.clone();
        Self { curr, trial, mu: 0.1, iter_count: 0, timing, info: ProgressInfo::default() }
    }

    /// Make the trial point the current point.
    pub fn accept_trial_point(&mut self) {
        self.curr = self.trial.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::BlockVec;

    #[test]
    fn test_zeros_dimensions() {
        let bounds = Bounds {
            x_lower: vec![(0, 0.0), (1, 0.0)],
            x_upper: vec![(0, 1.0)],
            s_lower: vec![(0, 0.0)],
            s_upper: vec![],
        };
        let it = Iterate::zeros(3, 2, 1, &bounds);
        assert_eq!(it.x.len(), 3);
        assert_eq!(it.s.len(), 1);
        assert_eq!(it.y_c.len(), 2);
        assert_eq!(it.y_d.len(), 1);
        assert_eq!(it.z_l.len(), 2);
        assert_eq!(it.z_u.len(), 1);
        assert_eq!(it.v_l.len(), 1);
        assert_eq!(it.v_u.len(), 0);
    }

    #[test]
    fn test_accept_trial_point() {
        let bounds = Bounds::default();
        let it = Iterate::zeros(2, 0, 0, &bounds);
        let mut state = SolverState::new(it, TimingStats::default());
        state.trial.x = BlockVec::dense(vec![1.0, 2.0]);
        state.accept_trial_point();
        assert_eq!(state.curr.x.as_dense().unwrap(), &[1.0, 2.0]);
    }
}
