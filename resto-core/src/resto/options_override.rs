//! Per-attempt option derivation.
//!
//! Each restoration attempt runs the nested solver against a specialized
//! configuration: the caller's snapshot stays untouched, and the attempt
//! stacks override layers on a private copy. The rules are independent and
//! independently testable:
//!
//! - the nested run must not re-enter restoration by user option on its own
//!   first iteration;
//! - the constraint-violation growth factor is effectively removed as a
//!   rejection criterion, unless the caller pinned it;
//! - finite time budgets are passed down as "remaining = budget - elapsed",
//!   and an already-exhausted budget aborts the attempt before the nested
//!   solver is ever invoked;
//! - square problems must run until the violation itself is small, so the
//!   slow-progress exit is disabled;
//! - for problems expected to be infeasible, the nested infeasibility
//!   heuristics are suppressed, and the very first attempt asks for a
//!   minimum infeasibility reduction as an anti-cycling safeguard.

use thiserror::Error;

use crate::options::{LayeredOptions, OptionsSnapshot, OverrideLayer};

/// Growth-tolerance factor installed when the caller did not pin one.
const THETA_MAX_FACT: f64 = 1e8;

/// Violation level above which the first attempt on an expected-infeasible
/// problem asks for a minimum reduction.
const INFEASIBLE_VIOLATION_TRIGGER: f64 = 1e-3;

/// Minimum infeasibility reduction requested in that case.
const INFEASIBLE_REQUIRED_REDUCTION: f64 = 1e-3;

/// A time budget found exhausted at derivation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("wall-clock budget exhausted at start of restoration phase")]
    Wall,
    #[error("CPU-time budget exhausted at start of restoration phase")]
    Cpu,
}

/// Solver-state inputs to the derivation.
#[derive(Debug, Clone, Copy)]
pub struct DeriveInputs {
    pub square_problem: bool,
    pub expect_infeasible: bool,
    /// True on the very first restoration attempt of the run.
    pub first_call: bool,
    /// Current (scaled) constraint violation of the outer iterate.
    pub current_violation: f64,
    /// Remaining wall-clock budget in seconds, `None` if unbounded.
    pub remaining_wall: Option<f64>,
    /// Remaining CPU-time budget in seconds, `None` if unbounded.
    pub remaining_cpu: Option<f64>,
}

/// Derive the nested solve's configuration from the base snapshot.
///
/// The base is copied, never mutated; every rule lands in its own named
/// layer. A key the caller set explicitly (in the base) is never overridden
/// by an if-unset rule.
pub fn derive_options(
    base: &OptionsSnapshot,
    inputs: &DeriveInputs,
) -> Result<LayeredOptions, BudgetError> {
    let mut opts = LayeredOptions::new(base.clone());

    let mut restoration = OverrideLayer::new("restoration");
    restoration.set_boolean("resto.start_with_resto", false);
    if !opts.is_set("resto.theta_max_fact") {
        restoration.set_number("resto.theta_max_fact", THETA_MAX_FACT);
    }
    opts.push(restoration);

    let mut time_budget = OverrideLayer::new("time-budget");
    if let Some(remaining) = inputs.remaining_wall {
        if remaining <= 0.0 {
            return Err(BudgetError::Wall);
        }
        time_budget.set_number("resto.max_wall_time", remaining);
    }
    if let Some(remaining) = inputs.remaining_cpu {
        if remaining <= 0.0 {
            return Err(BudgetError::Cpu);
        }
        time_budget.set_number("resto.max_cpu_time", remaining);
    }
    if !time_budget.is_empty() {
        opts.push(time_budget);
    }

    if inputs.square_problem {
        // the nested solve must not leave restoration on slow progress; it
        // has to run until the violation measure itself is small
        let mut square = OverrideLayer::new("square-problem");
        if !opts.is_set("required_infeasibility_reduction") {
            square.set_number("required_infeasibility_reduction", 0.0);
        }
        if !square.is_empty() {
            opts.push(square);
        }
    } else if inputs.expect_infeasible {
        let mut infeasible = OverrideLayer::new("expect-infeasible");
        if !opts.is_set("resto.expect_infeasible_problem") {
            infeasible.set_boolean("resto.expect_infeasible_problem", false);
        }
        if inputs.first_call
            && inputs.current_violation > INFEASIBLE_VIOLATION_TRIGGER
            && !opts.is_set("required_infeasibility_reduction")
        {
            infeasible.set_number("required_infeasibility_reduction", INFEASIBLE_REQUIRED_REDUCTION);
        }
        if !infeasible.is_empty() {
            opts.push(infeasible);
        }
    }

    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> DeriveInputs {
        DeriveInputs {
            square_problem: false,
            expect_infeasible: false,
            first_call: false,
            current_violation: 1.0,
            remaining_wall: None,
            remaining_cpu: None,
        }
    }

    #[test]
    fn test_base_never_mutated() {
        let base = OptionsSnapshot::new();
        let opts = derive_options(&base, &inputs()).unwrap();
        assert!(!opts.boolean_or("resto.", "start_with_resto", true).unwrap());
        // the caller's snapshot is untouched
        assert!(!base.contains("resto.start_with_resto"));
        assert!(!base.contains("resto.theta_max_fact"));
    }

    #[test]
    fn test_always_rules() {
        let base = OptionsSnapshot::new();
        let opts = derive_options(&base, &inputs()).unwrap();
        assert!(!opts.boolean_or("resto.", "start_with_resto", true).unwrap());
        assert_eq!(opts.number_or("resto.", "theta_max_fact", 0.0).unwrap(), 1e8);
    }

    #[test]
    fn test_theta_max_fact_respects_explicit_setting() {
        let mut base = OptionsSnapshot::new();
        base.set_number("resto.theta_max_fact", 1e4);
        let opts = derive_options(&base, &inputs()).unwrap();
        assert_eq!(opts.number_or("resto.", "theta_max_fact", 0.0).unwrap(), 1e4);
    }

    #[test]
    fn test_time_budget_passed_down() {
        let base = OptionsSnapshot::new();
        let opts = derive_options(
            &base,
            &DeriveInputs { remaining_wall: Some(12.5), remaining_cpu: Some(3.0), ..inputs() },
        )
        .unwrap();
        assert_eq!(opts.number_or("resto.", "max_wall_time", 0.0).unwrap(), 12.5);
        assert_eq!(opts.number_or("resto.", "max_cpu_time", 0.0).unwrap(), 3.0);
    }

    #[test]
    fn test_exhausted_budgets_fail_fast() {
        let base = OptionsSnapshot::new();
        let err = derive_options(&base, &DeriveInputs { remaining_wall: Some(0.0), ..inputs() })
            .unwrap_err();
        assert_eq!(err, BudgetError::Wall);

        let err = derive_options(
            &base,
            &DeriveInputs { remaining_cpu: Some(-5.0), ..inputs() },
        )
        .unwrap_err();
        assert_eq!(err, BudgetError::Cpu);

        // wall is checked before cpu
        let err = derive_options(
            &base,
            &DeriveInputs { remaining_wall: Some(-1.0), remaining_cpu: Some(-1.0), ..inputs() },
        )
        .unwrap_err();
        assert_eq!(err, BudgetError::Wall);
    }

    #[test]
    fn test_square_problem_requires_zero_reduction() {
        let base = OptionsSnapshot::new();
        let opts =
            derive_options(&base, &DeriveInputs { square_problem: true, ..inputs() }).unwrap();
        assert_eq!(opts.number_or("", "required_infeasibility_reduction", 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_square_respects_explicit_reduction() {
        let mut base = OptionsSnapshot::new();
        base.set_number("required_infeasibility_reduction", 0.9);
        let opts =
            derive_options(&base, &DeriveInputs { square_problem: true, ..inputs() }).unwrap();
        assert_eq!(opts.number_or("", "required_infeasibility_reduction", 0.0).unwrap(), 0.9);
    }

    #[test]
    fn test_expect_infeasible_first_call() {
        let base = OptionsSnapshot::new();
        let opts = derive_options(
            &base,
            &DeriveInputs {
                expect_infeasible: true,
                first_call: true,
                current_violation: 0.5,
                ..inputs()
            },
        )
        .unwrap();
        assert!(!opts.boolean_or("resto.", "expect_infeasible_problem", true).unwrap());
        assert_eq!(opts.number_or("", "required_infeasibility_reduction", 0.0).unwrap(), 1e-3);
    }

    #[test]
    fn test_expect_infeasible_later_calls_skip_reduction() {
        let base = OptionsSnapshot::new();
        let opts = derive_options(
            &base,
            &DeriveInputs {
                expect_infeasible: true,
                first_call: false,
                current_violation: 0.5,
                ..inputs()
            },
        )
        .unwrap();
        assert!(!opts.is_set("required_infeasibility_reduction"));
    }

    #[test]
    fn test_expect_infeasible_small_violation_skips_reduction() {
        let base = OptionsSnapshot::new();
        let opts = derive_options(
            &base,
            &DeriveInputs {
                expect_infeasible: true,
                first_call: true,
                current_violation: 1e-4,
                ..inputs()
            },
        )
        .unwrap();
        assert!(!opts.is_set("required_infeasibility_reduction"));
    }

    #[test]
    fn test_square_wins_over_expect_infeasible() {
        let base = OptionsSnapshot::new();
        let opts = derive_options(
            &base,
            &DeriveInputs {
                square_problem: true,
                expect_infeasible: true,
                first_call: true,
                current_violation: 1.0,
                ..inputs()
            },
        )
        .unwrap();
        assert_eq!(opts.number_or("", "required_infeasibility_reduction", 1.0).unwrap(), 0.0);
        assert!(!opts.is_set("resto.expect_infeasible_problem"));
    }
}
