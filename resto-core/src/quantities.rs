//! Derived quantities of a problem/iterate pair.
//!
//! A `Quantities` object owns the evaluation scratch for one solver level; a
//! fresh one is created per restoration attempt and dropped with it. All
//! violation measures are max norms over the combined equality and
//! inequality residuals `(c(x), d(x) - s)`; the scaled variants apply the
//! problem's row scaling, the unscaled ones use raw values.

use crate::problem::Nlp;
use crate::vector::{BlockVec, LayoutError};

/// Lower cap for the fraction-to-the-boundary parameter.
pub const TAU_MIN: f64 = 0.99;

/// Centering parameter for the current barrier parameter:
/// `tau = max(TAU_MIN, 1 - mu)`.
pub fn curr_tau(mu: f64) -> f64 {
    TAU_MIN.max(1.0 - mu)
}

/// Largest step fraction `alpha` in (0, 1] keeping every multiplier within
/// the fraction-to-the-boundary region: `z + alpha * dz >= (1 - tau) * z`
/// componentwise. `pairs` holds `(multipliers, directions)` slices.
pub fn dual_frac_to_the_bound(tau: f64, pairs: &[(&[f64], &[f64])]) -> f64 {
    let mut alpha = 1.0_f64;
    for (z, dz) in pairs {
        debug_assert_eq!(z.len(), dz.len());
        for (zi, dzi) in z.iter().zip(dz.iter()) {
            if *dzi < 0.0 {
                alpha = alpha.min(-tau * zi / dzi);
            }
        }
    }
    alpha
}

/// Evaluation scratch and violation measures for one solver level.
#[derive(Debug)]
pub struct Quantities {
    c_buf: Vec<f64>,
    d_buf: Vec<f64>,
    c_scale: Vec<f64>,
    d_scale: Vec<f64>,
    x_flat: Vec<f64>,
    s_flat: Vec<f64>,
}

impl Quantities {
    /// Scratch sized to the given problem.
    pub fn new(problem: &dyn Nlp) -> Self {
        let m_c = problem.num_eq_constraints();
        let m_d = problem.num_ineq_constraints();
        Self {
            c_buf: vec![0.0; m_c],
            d_buf: vec![0.0; m_d],
            c_scale: vec![1.0; m_c],
            d_scale: vec![1.0; m_d],
            x_flat: vec![0.0; problem.num_vars()],
            s_flat: vec![0.0; m_d],
        }
    }

    fn eval_residuals(&mut self, problem: &dyn Nlp, x: &BlockVec, s: &BlockVec) {
        debug_assert_eq!(x.len(), self.x_flat.len());
        debug_assert_eq!(s.len(), self.s_flat.len());
        x.flatten_into(&mut self.x_flat);
        s.flatten_into(&mut self.s_flat);
        problem.eval_eq_constraints(&self.x_flat, &mut self.c_buf);
        problem.eval_ineq_constraints(&self.x_flat, &mut self.d_buf);
        for (d, s) in self.d_buf.iter_mut().zip(self.s_flat.iter()) {
            *d -= s;
        }
    }

    fn max_residual(&self, scaled: bool) -> f64 {
        let mut viol = 0.0_f64;
        for (i, c) in self.c_buf.iter().enumerate() {
            let w = if scaled { self.c_scale[i] } else { 1.0 };
            viol = viol.max((w * c).abs());
        }
        for (j, r) in self.d_buf.iter().enumerate() {
            let w = if scaled { self.d_scale[j] } else { 1.0 };
            viol = viol.max((w * r).abs());
        }
        viol
    }

    /// Scaled max-norm constraint violation at `(x, s)`.
    pub fn constraint_violation(&mut self, problem: &dyn Nlp, x: &BlockVec, s: &BlockVec) -> f64 {
        problem.eq_constraint_scaling(&mut self.c_scale);
        problem.ineq_constraint_scaling(&mut self.d_scale);
        self.eval_residuals(problem, x, s);
        self.max_residual(true)
    }

    /// Unscaled max-norm constraint violation at `(x, s)`.
    pub fn unscaled_constraint_violation(
        &mut self,
        problem: &dyn Nlp,
        x: &BlockVec,
        s: &BlockVec,
    ) -> f64 {
        self.eval_residuals(problem, x, s);
        self.max_residual(false)
    }

    /// Primal infeasibility (max norm) at `(x, s)`.
    pub fn primal_infeasibility(&mut self, problem: &dyn Nlp, x: &BlockVec, s: &BlockVec) -> f64 {
        self.constraint_violation(problem, x, s)
    }

    /// Slacks to the finite lower variable bounds: `x_i - l_i`.
    pub fn slack_x_lower(
        &mut self,
        problem: &dyn Nlp,
        x: &BlockVec,
    ) -> Result<Vec<f64>, LayoutError> {
        let flat = self.flatten_x(x)?;
        Ok(problem.bounds().x_lower.iter().map(|&(i, b)| flat[i] - b).collect())
    }

    /// Slacks to the finite upper variable bounds: `u_i - x_i`.
    pub fn slack_x_upper(
        &mut self,
        problem: &dyn Nlp,
        x: &BlockVec,
    ) -> Result<Vec<f64>, LayoutError> {
        let flat = self.flatten_x(x)?;
        Ok(problem.bounds().x_upper.iter().map(|&(i, b)| b - flat[i]).collect())
    }

    /// Slacks to the finite lower slack bounds: `s_j - l_j`.
    pub fn slack_s_lower(
        &mut self,
        problem: &dyn Nlp,
        s: &BlockVec,
    ) -> Result<Vec<f64>, LayoutError> {
        let flat = self.flatten_s(s)?;
        Ok(problem.bounds().s_lower.iter().map(|&(j, b)| flat[j] - b).collect())
    }

    /// Slacks to the finite upper slack bounds: `u_j - s_j`.
    pub fn slack_s_upper(
        &mut self,
        problem: &dyn Nlp,
        s: &BlockVec,
    ) -> Result<Vec<f64>, LayoutError> {
        let flat = self.flatten_s(s)?;
        Ok(problem.bounds().s_upper.iter().map(|&(j, b)| b - flat[j]).collect())
    }

    fn flatten_x(&mut self, x: &BlockVec) -> Result<&[f64], LayoutError> {
        if x.len() != self.x_flat.len() {
            return Err(LayoutError::LengthMismatch {
                expected: self.x_flat.len(),
                found: x.len(),
            });
        }
        x.flatten_into(&mut self.x_flat);
        Ok(&self.x_flat)
    }

    fn flatten_s(&mut self, s: &BlockVec) -> Result<&[f64], LayoutError> {
        if s.len() != self.s_flat.len() {
            return Err(LayoutError::LengthMismatch {
                expected: self.s_flat.len(),
                found: s.len(),
            });
        }
        s.flatten_into(&mut self.s_flat);
        Ok(&self.s_flat)
    }
}
