use crate::algebra::*;
use derive_builder::Builder;

#[cfg(feature = "serde")]
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Solver settings.
///
/// The penalty caps and cold reset values apply to the *internal*
/// penalties, i.e. the quantities that appear as `-1/mu` on the KKT
/// diagonal and grow by `mu_update_factor` on each BCL rejection.  The
/// corresponding dual step sizes reported in
/// [`Info`](crate::solver::Info) are their reciprocals.

#[derive(Builder, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = "T: Serialize + DeserializeOwned"))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings<T: FloatT> {
    ///absolute convergence tolerance
    #[builder(default = "(1e-9).as_T()")]
    pub eps_abs: T,

    ///relative convergence tolerance
    #[builder(default = "T::zero()")]
    pub eps_rel: T,

    ///maximum number of outer (BCL) iterations
    #[builder(default = "10_000")]
    pub max_iter: u32,

    ///maximum number of inner (semi-smooth Newton) iterations per outer step
    #[builder(default = "1500")]
    pub max_iter_in: u32,

    ///BCL tolerance exponent on acceptance
    #[builder(default = "(0.1).as_T()")]
    pub alpha_bcl: T,

    ///BCL tolerance exponent on tightening
    #[builder(default = "(0.9).as_T()")]
    pub beta_bcl: T,

    ///multiplicative penalty increase on BCL rejection
    #[builder(default = "(10.0).as_T()")]
    pub mu_update_factor: T,

    ///cap on the equality penalty
    #[builder(default = "(1e10).as_T()")]
    pub mu_max_eq: T,

    ///cap on the inequality penalty
    #[builder(default = "(1e8).as_T()")]
    pub mu_max_in: T,

    ///equality penalty installed by a cold reset
    #[builder(default = "(1.1).as_T()")]
    pub cold_reset_mu_eq: T,

    ///inequality penalty installed by a cold reset
    #[builder(default = "(1.1).as_T()")]
    pub cold_reset_mu_in: T,

    ///tolerance on factorization coherence after incremental updates
    #[builder(default = "(1e-6).as_T()")]
    pub eps_refact: T,

    ///dual feasibility level below which a refactorization is considered
    #[builder(default = "(1e-2).as_T()")]
    pub refactor_dual_feasibility_threshold: T,

    ///proximal parameter change that forces a refactorization
    #[builder(default = "(1e-7).as_T()")]
    pub refactor_rho_threshold: T,

    ///iterative refinement passes per KKT solve
    #[builder(default = "5")]
    pub nb_iterative_refinement: u32,

    ///primal infeasibility detection tolerance
    #[builder(default = "(1e-14).as_T()")]
    pub eps_primal_inf: T,

    ///dual infeasibility detection tolerance
    #[builder(default = "(1e-14).as_T()")]
    pub eps_dual_inf: T,

    ///start the next solve from the current results
    #[builder(default = "false")]
    pub warm_start: bool,

    ///per-iteration printing
    #[builder(default = "false")]
    pub verbose: bool,

    ///record setup/solve wall clock times
    #[builder(default = "false")]
    pub compute_timings: bool,

    ///maximum equilibration scaling rounds
    #[builder(default = "10")]
    pub equilibrate_max_iter: u32,

    ///equilibration convergence tolerance
    #[builder(default = "(1e-3).as_T()")]
    pub equilibrate_epsilon: T,

    ///scaling of the AMD dense-column threshold
    #[builder(default = "1.5")]
    pub amd_dense_scale: f64,
}

impl<T> Default for Settings<T>
where
    T: FloatT,
{
    fn default() -> Settings<T> {
        SettingsBuilder::<T>::default().build().unwrap()
    }
}

#[test]
fn test_settings_builder() {
    let s = SettingsBuilder::<f64>::default()
        .eps_abs(1e-7)
        .max_iter(25)
        .verbose(true)
        .build()
        .unwrap();
    assert_eq!(s.eps_abs, 1e-7);
    assert_eq!(s.max_iter, 25);
    assert_eq!(s.max_iter_in, 1500);
    assert!(s.verbose);
    assert!(!s.warm_start);
}
