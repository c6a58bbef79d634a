//! Problem interface and bound bookkeeping.
//!
//! The controller works against a general NLP in the form
//!
//! ```text
//! minimize    f(x)
//! subject to  c(x) = 0
//!             d(x) - s = 0,  s in [s_l, s_u]
//!             x in [x_l, x_u]
//! ```
//!
//! where inequality constraints carry explicit slack variables `s`. Bounds
//! are stored compressed: only components with a finite bound appear, as
//! `(index, value)` pairs. The four bound-multiplier vectors of an iterate
//! have exactly the lengths of the four bound lists, in the same order.
//!
//! Derivative evaluation, KKT assembly and the step computation live in the
//! surrounding solver; this interface only exposes what the restoration
//! phase itself consumes.

/// Compressed variable and slack bounds.
#[derive(Debug, Clone, Default)]
pub struct Bounds {
    /// Finite lower bounds on structural variables, `(index, bound)`.
    pub x_lower: Vec<(usize, f64)>,
    /// Finite upper bounds on structural variables.
    pub x_upper: Vec<(usize, f64)>,
    /// Finite lower bounds on inequality slacks.
    pub s_lower: Vec<(usize, f64)>,
    /// Finite upper bounds on inequality slacks.
    pub s_upper: Vec<(usize, f64)>,
}

impl Bounds {
    /// Validate bound indices against the problem dimensions.
    pub fn validate(&self, num_vars: usize, num_ineq: usize) -> Result<(), String> {
        for &(i, _) in self.x_lower.iter().chain(self.x_upper.iter()) {
            if i >= num_vars {
                return Err(format!("bound on variable {} out of range (n={})", i, num_vars));
            }
        }
        for &(j, _) in self.s_lower.iter().chain(self.s_upper.iter()) {
            if j >= num_ineq {
                return Err(format!("bound on slack {} out of range (m_d={})", j, num_ineq));
            }
        }
        Ok(())
    }
}

/// Nonlinear program seen by the restoration phase.
///
/// Evaluation is over flat variable slices; composite iterates are flattened
/// by [`Quantities`](crate::quantities::Quantities) before evaluation. The
/// scaling hooks default to all-ones; the unscaled violation measures bypass
/// them entirely.
pub trait Nlp {
    /// Number of structural variables.
    fn num_vars(&self) -> usize;

    /// Number of equality constraints c(x) = 0.
    fn num_eq_constraints(&self) -> usize;

    /// Number of inequality constraints d(x) - s = 0.
    fn num_ineq_constraints(&self) -> usize;

    /// Compressed bounds on variables and slacks.
    fn bounds(&self) -> &Bounds;

    /// Objective value at `x`.
    fn eval_objective(&self, x: &[f64]) -> f64;

    /// Fill equality constraint values c(x); `out` has length
    /// [`num_eq_constraints`](Nlp::num_eq_constraints).
    fn eval_eq_constraints(&self, x: &[f64], out: &mut [f64]);

    /// Fill inequality constraint values d(x); `out` has length
    /// [`num_ineq_constraints`](Nlp::num_ineq_constraints).
    fn eval_ineq_constraints(&self, x: &[f64], out: &mut [f64]);

    /// Row scaling for the equality constraints.
    fn eq_constraint_scaling(&self, out: &mut [f64]) {
        out.fill(1.0);
    }

    /// Row scaling for the inequality constraints.
    fn ineq_constraint_scaling(&self, out: &mut [f64]) {
        out.fill(1.0);
    }
}

/// A problem with zero degrees of freedom: as many equality constraints as
/// variables and no inequalities. For such problems "optimal" collapses to
/// "feasible".
pub fn is_square_problem(problem: &dyn Nlp) -> bool {
    problem.num_eq_constraints() == problem.num_vars() && problem.num_ineq_constraints() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        n: usize,
        m_c: usize,
        m_d: usize,
        bounds: Bounds,
    }

    impl Nlp for Fixed {
        fn num_vars(&self) -> usize {
            self.n
        }
        fn num_eq_constraints(&self) -> usize {
            self.m_c
        }
        fn num_ineq_constraints(&self) -> usize {
            self.m_d
        }
        fn bounds(&self) -> &Bounds {
            &self.bounds
        }
        fn eval_objective(&self, _x: &[f64]) -> f64 {
            0.0
        }
        fn eval_eq_constraints(&self, _x: &[f64], out: &mut [f64]) {
            out.fill(0.0);
        }
        fn eval_ineq_constraints(&self, _x: &[f64], out: &mut [f64]) {
            out.fill(0.0);
        }
    }

    #[test]
    fn test_square_predicate() {
        let square = Fixed { n: 3, m_c: 3, m_d: 0, bounds: Bounds::default() };
        assert!(is_square_problem(&square));

        let with_dof = Fixed { n: 3, m_c: 2, m_d: 0, bounds: Bounds::default() };
        assert!(!is_square_problem(&with_dof));

        let with_ineq = Fixed { n: 3, m_c: 3, m_d: 1, bounds: Bounds::default() };
        assert!(!is_square_problem(&with_ineq));
    }

    #[test]
    fn test_bounds_validation() {
        let ok = Bounds {
            x_lower: vec![(0, 0.0), (2, -1.0)],
            x_upper: vec![(1, 5.0)],
            s_lower: vec![(0, 0.0)],
            s_upper: vec![],
        };
        assert!(ok.validate(3, 1).is_ok());

        let bad_var = Bounds { x_lower: vec![(3, 0.0)], ..Default::default() };
        assert!(bad_var.validate(3, 1).is_err());

        let bad_slack = Bounds { s_upper: vec![(1, 0.0)], ..Default::default() };
        assert!(bad_slack.validate(3, 1).is_err());
    }
}
