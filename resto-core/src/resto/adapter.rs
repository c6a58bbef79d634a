//! Elastic restoration problem and its fresh per-attempt state.
//!
//! The restoration problem relaxes the original constraints with nonnegative
//! violation variables and minimizes their weighted sum:
//!
//! ```text
//! minimize    rho * sum(n_c + p_c + n_d + p_d)
//!               + (eta/2) * || D_R (x - x_ref) ||^2
//! subject to  c(x) - p_c + n_c = 0
//!             d(x) - s - p_d + n_d = 0,  s in [s_l, s_u]
//!             x in [x_l, x_u],  n_c, p_c, n_d, p_d >= 0
//! ```
//!
//! with `x_ref` the outer iterate at entry and `D_R = 1/max(1, |x_ref|)` a
//! diagonal proximity scaling. A feasible point of the elastic problem with
//! zero violation variables is a feasible point of the original one.
//!
//! The elastic variable vector is composite, `(x, n_c, p_c, n_d, p_d)`, and
//! every restoration-space vector keeps the corresponding original-space
//! vector as block 0, so transferring a result back is block-0 extraction.

use crate::iterate::{Iterate, SolverState};
use crate::problem::{Bounds, Nlp};
use crate::quantities::Quantities;
use crate::vector::BlockVec;

/// Elastic reformulation of an [`Nlp`], with flat variable layout
/// `(x, n_c, p_c, n_d, p_d)`.
pub struct RestoNlp<'a> {
    orig: &'a dyn Nlp,
    n: usize,
    m_c: usize,
    m_d: usize,
    rho: f64,
    eta: f64,
    x_ref: Vec<f64>,
    dr: Vec<f64>,
    bounds: Bounds,
}

impl<'a> RestoNlp<'a> {
    /// Wrap `orig` around the reference point `x_ref` with penalty weight
    /// `rho`; `mu` sets the proximity weight `eta = sqrt(mu)`.
    pub fn new(orig: &'a dyn Nlp, x_ref: Vec<f64>, rho: f64, mu: f64) -> Self {
        let n = orig.num_vars();
        let m_c = orig.num_eq_constraints();
        let m_d = orig.num_ineq_constraints();
        debug_assert_eq!(x_ref.len(), n);

        let dr: Vec<f64> = x_ref.iter().map(|&xi| 1.0 / xi.abs().max(1.0)).collect();

        // original bounds stay; every violation variable gets a zero lower
        // bound, appended in elastic layout order
        let ob = orig.bounds();
        let mut x_lower = ob.x_lower.clone();
        for k in 0..2 * m_c + 2 * m_d {
            x_lower.push((n + k, 0.0));
        }
        let bounds = Bounds {
            x_lower,
            x_upper: ob.x_upper.clone(),
            s_lower: ob.s_lower.clone(),
            s_upper: ob.s_upper.clone(),
        };

        Self { orig, n, m_c, m_d, rho, eta: mu.sqrt(), x_ref, dr, bounds }
    }

    /// Penalty weight on the violation variables.
    pub fn penalty_weight(&self) -> f64 {
        self.rho
    }
}

impl Nlp for RestoNlp<'_> {
    fn num_vars(&self) -> usize {
        self.n + 2 * self.m_c + 2 * self.m_d
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

    fn eval_objective(&self, x: &[f64]) -> f64 {
        let elastic: f64 = x[self.n..].iter().sum();
        let mut proximity = 0.0;
        for i in 0..self.n {
            let scaled = self.dr[i] * (x[i] - self.x_ref[i]);
            proximity += scaled * scaled;
        }
        self.rho * elastic + 0.5 * self.eta * proximity
    }

    fn eval_eq_constraints(&self, x: &[f64], out: &mut [f64]) {
        self.orig.eval_eq_constraints(&x[..self.n], out);
        let n_c = &x[self.n..self.n + self.m_c];
        let p_c = &x[self.n + self.m_c..self.n + 2 * self.m_c];
        for i in 0..self.m_c {
            out[i] += n_c[i] - p_c[i];
        }
    }

    fn eval_ineq_constraints(&self, x: &[f64], out: &mut [f64]) {
        self.orig.eval_ineq_constraints(&x[..self.n], out);
        let off = self.n + 2 * self.m_c;
        let n_d = &x[off..off + self.m_d];
        let p_d = &x[off + self.m_d..off + 2 * self.m_d];
        for j in 0..self.m_d {
            out[j] += n_d[j] - p_d[j];
        }
    }

    fn eq_constraint_scaling(&self, out: &mut [f64]) {
        self.orig.eq_constraint_scaling(out);
    }

    fn ineq_constraint_scaling(&self, out: &mut [f64]) {
        self.orig.ineq_constraint_scaling(out);
    }
}

/// Everything a restoration attempt needs: the elastic problem, a fresh
/// state whose vectors carry the outer iterate as block 0, and fresh
/// evaluation scratch.
pub struct RestoSetup<'a> {
    pub problem: RestoNlp<'a>,
    pub state: SolverState,
    pub quantities: Quantities,
}

/// Split a constraint residual into strictly positive violation variables
/// `(n, p)` with `p - n = residual`, by the complementarity quadratic
/// `rho*(n + p) - mu*log(n) - mu*log(p)` minimized in closed form.
fn elastic_pair(residual: f64, mu: f64, rho: f64) -> (f64, f64) {
    let a = (mu - rho * residual) / (2.0 * rho);
    let n = a + (a * a + mu * residual / (2.0 * rho)).max(0.0).sqrt();
    // cancellation guard; keeps mu/n and mu/p finite
    let n = n.max(f64::EPSILON);
    (n, (residual + n).max(f64::EPSILON))
}

/// Build the elastic problem and a consistent fresh iterate around the outer
/// current point. Construction is total; the caller guarantees the current
/// constraint violation is strictly positive.
pub fn build_restoration_setup<'a>(
    problem: &'a dyn Nlp,
    outer: &SolverState,
    rho: f64,
) -> RestoSetup<'a> {
    let n = problem.num_vars();
    let m_c = problem.num_eq_constraints();
    let m_d = problem.num_ineq_constraints();
    let mu = outer.mu;

    let mut x_ref = vec![0.0; n];
    outer.curr.x.flatten_into(&mut x_ref);
    let mut s_flat = vec![0.0; m_d];
    outer.curr.s.flatten_into(&mut s_flat);

    // residuals at the outer current point
    let mut c = vec![0.0; m_c];
    problem.eval_eq_constraints(&x_ref, &mut c);
    let mut r_d = vec![0.0; m_d];
    problem.eval_ineq_constraints(&x_ref, &mut r_d);
    for (r, s) in r_d.iter_mut().zip(s_flat.iter()) {
        *r -= s;
    }

    let mut n_c = Vec::with_capacity(m_c);
    let mut p_c = Vec::with_capacity(m_c);
    for &ci in &c {
        let (ni, pi) = elastic_pair(ci, mu, rho);
        n_c.push(ni);
        p_c.push(pi);
    }
    let mut n_d = Vec::with_capacity(m_d);
    let mut p_d = Vec::with_capacity(m_d);
    for &rj in &r_d {
        let (nj, pj) = elastic_pair(rj, mu, rho);
        n_d.push(nj);
        p_d.push(pj);
    }

    // complementarity-consistent multipliers for the elastic lower bounds
    let mult = |v: &[f64]| -> BlockVec { BlockVec::dense(v.iter().map(|&vi| mu / vi).collect()) };
    let z_n_c = mult(&n_c);
    let z_p_c = mult(&p_c);
    let z_n_d = mult(&n_d);
    let z_p_d = mult(&p_d);

    let curr = Iterate {
        x: BlockVec::composite(vec![
            outer.curr.x.clone(),
            BlockVec::dense(n_c),
            BlockVec::dense(p_c),
            BlockVec::dense(n_d),
            BlockVec::dense(p_d),
        ]),
        s: BlockVec::composite(vec![outer.curr.s.clone()]),
        y_c: BlockVec::composite(vec![BlockVec::zeros(m_c)]),
        y_d: BlockVec::composite(vec![BlockVec::zeros(m_d)]),
        z_l: BlockVec::composite(vec![outer.curr.z_l.clone(), z_n_c, z_p_c, z_n_d, z_p_d]),
        z_u: BlockVec::composite(vec![outer.curr.z_u.clone()]),
        v_l: BlockVec::composite(vec![outer.curr.v_l.clone()]),
        v_u: BlockVec::composite(vec![outer.curr.v_u.clone()]),
    };

    let resto_nlp = RestoNlp::new(problem, x_ref, rho, mu);
    let quantities = Quantities::new(&resto_nlp);
    let mut state = SolverState::new(curr, outer.timing);
    state.mu = mu;

    RestoSetup { problem: resto_nlp, state, quantities }
}
