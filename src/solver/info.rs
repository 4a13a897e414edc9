use crate::algebra::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Final status of a solve.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverStatus {
    /// no solve has been attempted yet
    #[default]
    Unsolved,
    /// primal and dual residuals met the requested tolerances
    Solved,
    /// the outer iteration budget was exhausted
    MaxIterReached,
}

/// Solver statistics, reported through [`Results`](crate::solver::Results).
///
/// `mu_eq` and `mu_in` are the dual step sizes; `mu_eq_inv` and
/// `mu_in_inv` are the internal penalties they are reciprocals of.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Info<T> {
    pub rho: T,
    pub mu_eq: T,
    pub mu_eq_inv: T,
    pub mu_in: T,
    pub mu_in_inv: T,
    pub nu: T,

    /// total inner iterations
    pub iter: u32,
    /// outer (BCL) iterations
    pub iter_ext: u32,
    /// penalty parameter changes, cold resets included
    pub mu_updates: u32,
    /// proximal parameter changes
    pub rho_updates: u32,

    pub status: SolverStatus,

    /// setup time in microseconds
    pub setup_time: f64,
    /// solve time in microseconds
    pub solve_time: f64,
    /// total of setup and solve times in microseconds
    pub run_time: f64,

    /// objective value at the returned iterate
    pub obj_value: T,
    /// unscaled primal residual norm at the returned iterate
    pub pri_res: T,
    /// unscaled dual residual norm at the returned iterate
    pub dua_res: T,
}

impl<T> Info<T>
where
    T: FloatT,
{
    pub(crate) fn new() -> Self {
        let mut out = Self::default();
        out.nu = T::one();
        out
    }

    // per-solve statistics reset.  Penalty values are reported at the
    // end of the solve, and rho_updates counts explicit overrides since
    // setup, so neither is touched here.
    pub(crate) fn reset_statistics(&mut self) {
        self.iter = 0;
        self.iter_ext = 0;
        self.mu_updates = 0;
        self.status = SolverStatus::MaxIterReached;
        self.obj_value = T::zero();
        self.pri_res = T::zero();
        self.dua_res = T::zero();
        self.solve_time = 0f64;
        self.run_time = 0f64;
    }

    pub(crate) fn save_penalties(&mut self, rho: T, mu_eq: T, mu_in: T) {
        self.rho = rho;
        self.mu_eq_inv = mu_eq;
        self.mu_eq = T::recip(mu_eq);
        self.mu_in_inv = mu_in;
        self.mu_in = T::recip(mu_in);
    }
}
