//! Restoration-phase controller.
//!
//! Owns the end-to-end sequence of one restoration attempt: build the
//! elastic problem and a fresh nested state, derive the nested
//! configuration, invoke the recursive solver, classify the result, and on
//! success splice the recovered point back into the outer algorithm's trial
//! iterate together with a pseudo-Newton reconstruction of the bound
//! multipliers.
//!
//! Failure is communicated through the [`Outcome`] tag, never swallowed;
//! before any hard failure propagates, the best available nested point is
//! copied into the outer trial iterate so the caller still gets a
//! diagnostic point.

use tracing::{debug, error, info, warn};

use crate::iterate::{Iterate, SolverState};
use crate::options::{OptionsError, OptionsSnapshot};
use crate::problem::{is_square_problem, Nlp};
use crate::quantities::{curr_tau, dual_frac_to_the_bound, Quantities};
use crate::solver::{EqMultiplierEstimator, NlpSolver, TerminationStatus};
use crate::timing::{Clock, UNBOUNDED_TIME};
use crate::vector::{BlockVec, LayoutError};

use super::adapter::build_restoration_setup;
use super::mult_step::{bound_multiplier_step, inf_norm, step_scaled};
use super::options_override::{derive_options, BudgetError, DeriveInputs};
use super::outcome::{classify, ClassifyMetrics, ClassifyThresholds, Outcome};
use super::{RestorationError, RESTO_PREFIX};

/// Tunables of the restoration phase, read once at initialization and
/// immutable for the life of the solver run.
#[derive(Debug, Clone, Copy)]
pub struct RestorationSettings {
    /// Reset all bound multipliers to 1 when the post-restoration maximum
    /// exceeds this.
    pub bound_mult_reset_threshold: f64,
    /// Threshold gating the least-squares constraint-multiplier estimate.
    pub constr_mult_reset_threshold: f64,
    /// Primal infeasibility below which a stalled restoration still counts
    /// as having reached a feasible point.
    pub resto_failure_feasibility_threshold: f64,
}

impl RestorationSettings {
    /// Read and range-check the three tunables. The failure-feasibility
    /// threshold defaults to `100 * tol` when not set explicitly.
    pub fn from_options(
        options: &OptionsSnapshot,
        prefix: &str,
        tol: f64,
    ) -> Result<Self, OptionsError> {
        let bound_mult_reset_threshold =
            options.number_or(prefix, "bound_mult_reset_threshold", 1e3)?;
        if bound_mult_reset_threshold < 0.0 {
            return Err(OptionsError::OutOfRange {
                name: "bound_mult_reset_threshold".to_owned(),
                value: bound_mult_reset_threshold,
                constraint: "must be >= 0",
            });
        }

        let constr_mult_reset_threshold =
            options.number_or(prefix, "constr_mult_reset_threshold", 0.0)?;
        if constr_mult_reset_threshold < 0.0 {
            return Err(OptionsError::OutOfRange {
                name: "constr_mult_reset_threshold".to_owned(),
                value: constr_mult_reset_threshold,
                constraint: "must be >= 0",
            });
        }

        let resto_failure_feasibility_threshold =
            match options.number(prefix, "resto_failure_feasibility_threshold")? {
                Some(v) if v < 0.0 => {
                    return Err(OptionsError::OutOfRange {
                        name: "resto_failure_feasibility_threshold".to_owned(),
                        value: v,
                        constraint: "must be >= 0",
                    });
                }
                Some(v) => v,
                None => 1e2 * tol,
            };

        Ok(Self {
            bound_mult_reset_threshold,
            constr_mult_reset_threshold,
            resto_failure_feasibility_threshold,
        })
    }
}

/// Orchestrator of restoration attempts.
pub struct RestorationPhase {
    solver: Box<dyn NlpSolver>,
    eq_mult_estimator: Option<Box<dyn EqMultiplierEstimator>>,
    clock: Box<dyn Clock>,
    /// Private copy of the base options used to set up each attempt.
    resto_options: OptionsSnapshot,
    settings: RestorationSettings,
    expect_infeasible_problem: bool,
    constr_viol_tol: f64,
    max_wall_time: f64,
    max_cpu_time: f64,
    penalty_parameter: f64,
    count_restorations: u64,
}

impl RestorationPhase {
    /// Capture the configuration and collaborators for a solver run.
    pub fn new(
        solver: Box<dyn NlpSolver>,
        eq_mult_estimator: Option<Box<dyn EqMultiplierEstimator>>,
        clock: Box<dyn Clock>,
        options: &OptionsSnapshot,
        prefix: &str,
    ) -> Result<Self, OptionsError> {
        let tol = options.number_or(prefix, "tol", 1e-8)?;
        let settings = RestorationSettings::from_options(options, prefix, tol)?;
        let expect_infeasible_problem =
            options.boolean_or(prefix, "expect_infeasible_problem", false)?;
        let constr_viol_tol = options.number_or(prefix, "constr_viol_tol", 1e-4)?;
        let max_wall_time = options.number_or(prefix, "max_wall_time", UNBOUNDED_TIME)?;
        let max_cpu_time = options.number_or(prefix, "max_cpu_time", UNBOUNDED_TIME)?;
        let penalty_parameter = options.number_or(prefix, "resto_penalty_parameter", 1e3)?;
        if penalty_parameter <= 0.0 {
            return Err(OptionsError::OutOfRange {
                name: "resto_penalty_parameter".to_owned(),
                value: penalty_parameter,
                constraint: "must be > 0",
            });
        }

        Ok(Self {
            solver,
            eq_mult_estimator,
            clock,
            resto_options: options.clone(),
            settings,
            expect_infeasible_problem,
            constr_viol_tol,
            max_wall_time,
            max_cpu_time,
            penalty_parameter,
            count_restorations: 0,
        })
    }

    /// Number of restoration attempts so far in this run.
    pub fn restoration_count(&self) -> u64 {
        self.count_restorations
    }

    /// The tunables captured at initialization.
    pub fn settings(&self) -> &RestorationSettings {
        &self.settings
    }

    /// Run one restoration attempt against the outer iterate.
    ///
    /// On [`Outcome::Success`] the outer trial iterate holds the recovered
    /// primal point with updated multipliers and is left for the caller to
    /// accept; [`Outcome::FeasibilityProblemSolved`] is terminal and the
    /// point is already accepted. Every other tag is a failure for the
    /// caller to react to. `Err` is reserved for violated structural
    /// invariants.
    pub fn perform_restoration(
        &mut self,
        problem: &dyn Nlp,
        state: &mut SolverState,
        quantities: &mut Quantities,
    ) -> Result<Outcome, RestorationError> {
        self.count_restorations += 1;
        info!(attempt = self.count_restorations, "starting restoration phase");

        let current_violation =
            quantities.constraint_violation(problem, &state.curr.x, &state.curr.s);
        debug_assert!(current_violation > 0.0, "restoration phase entered at a feasible point");

        let square_problem = is_square_problem(problem);

        let inputs = DeriveInputs {
            square_problem,
            expect_infeasible: self.expect_infeasible_problem,
            first_call: self.count_restorations == 1,
            current_violation,
            remaining_wall: remaining_budget(
                self.max_wall_time,
                state.timing.start_wall,
                self.clock.wall_time(),
            ),
            remaining_cpu: remaining_budget(
                self.max_cpu_time,
                state.timing.start_cpu,
                self.clock.cpu_time(),
            ),
        };
        // fresh per-attempt objects; nothing of these survives the attempt
        let setup = build_restoration_setup(problem, state, self.penalty_parameter);
        let resto_problem = setup.problem;
        let mut resto_state = setup.state;
        let mut resto_quantities = setup.quantities;

        let derived = match derive_options(&self.resto_options, &inputs) {
            Ok(opts) => opts,
            Err(BudgetError::Wall) => {
                warn!("wall-clock time limit exceeded at start of restoration phase");
                return Ok(Outcome::WalltimeExceeded);
            }
            Err(BudgetError::Cpu) => {
                warn!("CPU time limit exceeded at start of restoration phase");
                return Ok(Outcome::CputimeExceeded);
            }
        };

        // keep progress reporting continuous across the nested run
        resto_state.iter_count = state.iter_count + 1;
        resto_state.info.regu_x = state.info.regu_x;
        resto_state.info.alpha_primal = state.info.alpha_primal;
        resto_state.info.alpha_primal_char = state.info.alpha_primal_char;
        resto_state.info.alpha_dual = state.info.alpha_dual;
        resto_state.info.ls_count = state.info.ls_count;
        resto_state.info.iters_since_header = state.info.iters_since_header;
        resto_state.info.last_output = state.info.last_output;

        let status = self.solver.optimize(
            &resto_problem,
            &mut resto_state,
            &mut resto_quantities,
            &derived,
            RESTO_PREFIX,
            true,
        );

        if status != TerminationStatus::Success {
            self.preserve_diagnostic_point(state, &resto_state);
        }

        let metrics = ClassifyMetrics {
            unscaled_constraint_violation: quantities.unscaled_constraint_violation(
                problem,
                &state.curr.x,
                &state.curr.s,
            ),
            primal_infeasibility: quantities.primal_infeasibility(
                problem,
                &state.curr.x,
                &state.curr.s,
            ),
        };
        let thresholds = ClassifyThresholds {
            constr_viol_tol: self.constr_viol_tol,
            failure_feasibility: self.settings.resto_failure_feasibility_threshold,
        };
        match classify(status, square_problem, &metrics, &thresholds) {
            Outcome::Success => {}
            Outcome::FeasibilityProblemSolved => {
                debug!("recursive restoration phase terminated acceptably for square problem");
                return Ok(Outcome::FeasibilityProblemSolved);
            }
            Outcome::ConvergedToFeasiblePoint => {
                warn!("restoration phase converged to a point with small primal infeasibility");
                return Ok(Outcome::ConvergedToFeasiblePoint);
            }
            Outcome::Unclassified => {
                error!(%status, "restoration phase ended with an unclassifiable solver status");
                return Ok(Outcome::Unclassified);
            }
            outcome => {
                debug!(%status, %outcome, "restoration phase did not succeed");
                return Ok(outcome);
            }
        }

        let mut resto_x_flat = vec![0.0; resto_problem.num_vars()];
        resto_state.curr.x.flatten_into(&mut resto_x_flat);
        debug!(
            objective = resto_problem.eval_objective(&resto_x_flat),
            iterations = resto_state.iter_count,
            "restoration phase finished"
        );

        // transfer the recovered primal point into the outer trial iterate
        state.trial.x = resto_state.curr.x.original_block()?.clone();
        state.trial.s = resto_state.curr.s.original_block()?.clone();

        // a square problem is done as soon as the recovered point is
        // sufficiently feasible; there is nothing left to optimize
        if square_problem {
            let trial_violation = quantities.unscaled_constraint_violation(
                problem,
                &state.trial.x,
                &state.trial.s,
            );
            if trial_violation <= self.constr_viol_tol {
                state.accept_trial_point();
                debug!("recursive restoration phase terminated successfully for square problem");
                return Ok(Outcome::FeasibilityProblemSolved);
            }
        }

        self.recover_bound_multipliers(problem, state, quantities)?;

        if let Some(estimator) = self.eq_mult_estimator.as_mut() {
            estimator.estimate(
                problem,
                state,
                quantities,
                self.settings.constr_mult_reset_threshold,
            );
        }

        // the whole attempt is accounted as one outer iteration; the nested
        // run already produced the progress lines
        state.iter_count = resto_state.iter_count.saturating_sub(1);
        state.info.skip_output = true;
        state.info.iters_since_header = resto_state.info.iters_since_header;
        state.info.last_output = resto_state.info.last_output;

        Ok(Outcome::Success)
    }

    /// Update the four bound-multiplier vectors, treating the restoration
    /// phase's primal movement as one Newton step, with a fraction-to-the-
    /// boundary limited step and a uniform reset fallback.
    fn recover_bound_multipliers(
        &self,
        problem: &dyn Nlp,
        state: &mut SolverState,
        quantities: &mut Quantities,
    ) -> Result<(), RestorationError> {
        let mu = state.mu;

        let z_l = flat_of(&state.curr.z_l);
        let z_u = flat_of(&state.curr.z_u);
        let v_l = flat_of(&state.curr.v_l);
        let v_u = flat_of(&state.curr.v_u);

        let s0_x_l = quantities.slack_x_lower(problem, &state.curr.x)?;
        let s1_x_l = quantities.slack_x_lower(problem, &state.trial.x)?;
        let s0_x_u = quantities.slack_x_upper(problem, &state.curr.x)?;
        let s1_x_u = quantities.slack_x_upper(problem, &state.trial.x)?;
        let s0_s_l = quantities.slack_s_lower(problem, &state.curr.s)?;
        let s1_s_l = quantities.slack_s_lower(problem, &state.trial.s)?;
        let s0_s_u = quantities.slack_s_upper(problem, &state.curr.s)?;
        let s1_s_u = quantities.slack_s_upper(problem, &state.trial.s)?;

        let d_z_l = bound_multiplier_step(&z_l, &s0_x_l, &s1_x_l, mu);
        let d_z_u = bound_multiplier_step(&z_u, &s0_x_u, &s1_x_u, mu);
        let d_v_l = bound_multiplier_step(&v_l, &s0_s_l, &s1_s_l, mu);
        let d_v_u = bound_multiplier_step(&v_u, &s0_s_u, &s1_s_u, mu);

        let alpha_dual = dual_frac_to_the_bound(
            curr_tau(mu),
            &[(&z_l, &d_z_l), (&z_u, &d_z_u), (&v_l, &d_v_l), (&v_u, &d_v_u)],
        );
        debug!(alpha_dual, "step size for bound multipliers");

        let new_z_l = step_scaled(&z_l, &d_z_l, alpha_dual);
        let new_z_u = step_scaled(&z_u, &d_z_u, alpha_dual);
        let new_v_l = step_scaled(&v_l, &d_v_l, alpha_dual);
        let new_v_u = step_scaled(&v_u, &d_v_u, alpha_dual);

        state.trial.z_l.copy_from_flat(&new_z_l)?;
        state.trial.z_u.copy_from_flat(&new_z_u)?;
        state.trial.v_l.copy_from_flat(&new_v_l)?;
        state.trial.v_u.copy_from_flat(&new_v_u)?;

        let bound_mult_max = inf_norm(&new_z_l)
            .max(inf_norm(&new_z_u))
            .max(inf_norm(&new_v_l))
            .max(inf_norm(&new_v_u));
        if bound_mult_max > self.settings.bound_mult_reset_threshold {
            warn!(
                max = bound_mult_max,
                "bound multipliers too large after restoration phase, resetting all to 1"
            );
            state.trial.z_l.fill(1.0);
            state.trial.z_u.fill(1.0);
            state.trial.v_l.fill(1.0);
            state.trial.v_u.fill(1.0);
        }

        Ok(())
    }

    /// Best-effort copy of the nested current point into the outer trial
    /// iterate, accepted immediately so it is what the caller sees. Never
    /// fails the attempt on its own.
    fn preserve_diagnostic_point(&self, state: &mut SolverState, resto_state: &SolverState) {
        match diagnostic_trial(state, resto_state) {
            Ok(trial) => {
                state.trial = trial;
                state.accept_trial_point();
            }
            Err(err) => {
                warn!(error = %err, "could not transfer restoration iterate for diagnostics");
            }
        }
    }
}

fn diagnostic_trial(state: &SolverState, resto_state: &SolverState) -> Result<Iterate, LayoutError> {
    let resto = &resto_state.curr;
    let mut trial = state.trial.clone();
    trial.x = resto.x.original_block()?.clone();
    trial.s = resto.s.original_block()?.clone();
    trial.y_c = resto.y_c.original_block()?.clone();
    trial.y_d = resto.y_d.original_block()?.clone();
    trial.z_l = resto.z_l.original_block()?.clone();
    trial.z_u = resto.z_u.original_block()?.clone();
    trial.v_l = resto.v_l.original_block()?.clone();
    trial.v_u = resto.v_u.original_block()?.clone();
    Ok(trial)
}

fn flat_of(v: &BlockVec) -> Vec<f64> {
    let mut out = vec![0.0; v.len()];
    v.flatten_into(&mut out);
    out
}

fn remaining_budget(limit: f64, start: f64, now: f64) -> Option<f64> {
    if limit < UNBOUNDED_TIME {
        Some(limit - (now - start))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let options = OptionsSnapshot::new();
        let settings = RestorationSettings::from_options(&options, "", 1e-8).unwrap();
        assert_eq!(settings.bound_mult_reset_threshold, 1e3);
        assert_eq!(settings.constr_mult_reset_threshold, 0.0);
        assert_eq!(settings.resto_failure_feasibility_threshold, 1e-6);
    }

    #[test]
    fn test_settings_explicit_values() {
        let mut options = OptionsSnapshot::new();
        options.set_number("bound_mult_reset_threshold", 50.0);
        options.set_number("constr_mult_reset_threshold", 2.0);
        options.set_number("resto_failure_feasibility_threshold", 1e-3);
        let settings = RestorationSettings::from_options(&options, "", 1e-8).unwrap();
        assert_eq!(settings.bound_mult_reset_threshold, 50.0);
        assert_eq!(settings.constr_mult_reset_threshold, 2.0);
        assert_eq!(settings.resto_failure_feasibility_threshold, 1e-3);
    }

    #[test]
    fn test_settings_range_checks() {
        let mut options = OptionsSnapshot::new();
        options.set_number("bound_mult_reset_threshold", -1.0);
        assert!(matches!(
            RestorationSettings::from_options(&options, "", 1e-8),
            Err(OptionsError::OutOfRange { .. })
        ));

        let mut options = OptionsSnapshot::new();
        options.set_number("resto_failure_feasibility_threshold", -0.5);
        assert!(matches!(
            RestorationSettings::from_options(&options, "", 1e-8),
            Err(OptionsError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_remaining_budget() {
        assert_eq!(remaining_budget(UNBOUNDED_TIME, 0.0, 50.0), None);
        assert_eq!(remaining_budget(100.0, 10.0, 30.0), Some(80.0));
        assert_eq!(remaining_budget(15.0, 0.0, 20.0), Some(-5.0));
    }

    #[test]
    fn test_flat_of_composite() {
        let v = BlockVec::composite(vec![
            BlockVec::dense(vec![1.0, 2.0]),
            BlockVec::dense(vec![3.0]),
        ]);
        assert_eq!(flat_of(&v), vec![1.0, 2.0, 3.0]);
    }
}
