use super::inner::{newton_semi_smooth, PenaltyState};
use super::*;
use crate::algebra::*;
use crate::timers::*;
use itertools::izip;
use std::iter::zip;

/// Sparse QP solver for problems of the form
///
/// ```text
/// minimize    ½ x'Hx + g'x
/// subject to  Ax = b,  l ≤ Cx ≤ u
/// ```
///
/// driven by a proximal augmented-Lagrangian outer loop with a BCL
/// penalty schedule around a primal-dual semi-smooth Newton inner loop.
///
/// __Example usage__:
/// ```no_run
/// use proxal::algebra::CscMatrix;
/// use proxal::solver::QpSolver;
///
/// let H = CscMatrix::from(&[[1., 0.], [0., 1.]]);
/// let g = [-1., -1.];
/// let A = CscMatrix::spalloc(0, 2, 0);
/// let C = CscMatrix::from(&[[1., 1.]]);
///
/// let mut solver = QpSolver::new(2, 0, 1);
/// solver
///     .init(&H, &g, &A, &[], &C, &[-1e20], &[1.], true, None, None, None)
///     .unwrap();
/// solver.solve();
/// println!("{:?}", solver.results.x);
/// ```
pub struct QpSolver<T = f64>
where
    T: FloatT,
{
    pub settings: Settings<T>,
    pub results: Results<T>,

    data: ProblemData<T>,
    precond: Preconditioner<T>,
    kkt: Option<KktSystem<T>>,
    work: Workspace<T>,
    timers: Timers,

    // proximal state, persisted across solves.  mu values are the
    // internal penalties.
    rho: T,
    mu_eq: T,
    mu_in: T,

    warm_start_pending: bool,
    is_setup: bool,
}

impl<T> QpSolver<T>
where
    T: FloatT,
{
    /// A solver with an empty model of the given dimensions.  Call
    /// [`init`](QpSolver::init) to install model values.
    pub fn new(n: usize, m_eq: usize, m_in: usize) -> Self {
        Self {
            settings: Settings::default(),
            results: Results::new(n, m_eq, m_in),
            data: ProblemData::new(n, m_eq, m_in),
            precond: Preconditioner::Identity(IdentityPreconditioner::new()),
            kkt: None,
            work: Workspace::new(n, m_eq, m_in),
            timers: Timers::default(),
            rho: (1e-6).as_T(),
            mu_eq: (1e3).as_T(),
            mu_in: (1e1).as_T(),
            warm_start_pending: false,
            is_setup: false,
        }
    }

    /// A solver whose symbolic factorization is precomputed from the
    /// sparsity patterns alone; values in the pattern arguments are
    /// ignored.  A later [`init`](QpSolver::init) with matching patterns
    /// reuses the symbolic analysis.
    pub fn with_sparsity(
        H_pattern: &CscMatrix<T>,
        A_pattern: &CscMatrix<T>,
        C_pattern: &CscMatrix<T>,
    ) -> Result<Self, SolverError> {
        let n = H_pattern.ncols();
        let m_eq = A_pattern.nrows();
        let m_in = C_pattern.nrows();

        let mut solver = Self::new(n, m_eq, m_in);
        let g = vec![T::zero(); n];
        let b = vec![T::zero(); m_eq];
        let lu = vec![T::zero(); m_in];
        solver
            .data
            .install(H_pattern, &g, A_pattern, &b, C_pattern, &lu, &lu)?;
        solver.data.equilibrate(&mut solver.precond, false);
        solver.build_kkt()?;
        Ok(solver)
    }

    /// Installs the model and performs setup: equilibration (when
    /// `compute_preconditioner`), KKT assembly and symbolic
    /// factorization.  Optional `rho`, `mu_eq`, `mu_in` override the
    /// proximal parameters, given as the dual step sizes reported in
    /// [`Info`](crate::solver::Info) (defaults 1e-6, 1e-3, 1e-1).
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        H: &CscMatrix<T>,
        g: &[T],
        A: &CscMatrix<T>,
        b: &[T],
        C: &CscMatrix<T>,
        l: &[T],
        u: &[T],
        compute_preconditioner: bool,
        rho: Option<T>,
        mu_eq: Option<T>,
        mu_in: Option<T>,
    ) -> Result<(), SolverError> {
        let mut timers = std::mem::take(&mut self.timers);
        timers.reset_timer("setup");

        let mut out = Ok(());
        timeit! {timers => "setup"; {

            out = self.setup_inner(H, g, A, b, C, l, u, compute_preconditioner);
            self.update_proximal_parameters(rho, mu_eq, mu_in);

        }}

        if self.settings.compute_timings {
            self.results.info.setup_time = timers.elapsed_us("setup");
        }
        self.timers = timers;
        out
    }

    /// Updates the model in place.  When the sparsity of every provided
    /// matrix agrees with the installed one this overwrites numeric
    /// values only, re-equilibrating when `update_preconditioner` and
    /// otherwise re-applying the stored scalings; a pattern change falls
    /// back to a full setup.  Proximal parameters are preserved unless
    /// overridden.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        H: Option<&CscMatrix<T>>,
        g: Option<&[T]>,
        A: Option<&CscMatrix<T>>,
        b: Option<&[T]>,
        C: Option<&CscMatrix<T>>,
        l: Option<&[T]>,
        u: Option<&[T]>,
        update_preconditioner: bool,
        rho: Option<T>,
        mu_eq: Option<T>,
        mu_in: Option<T>,
    ) -> Result<(), SolverError> {
        if !self.is_setup {
            return Err(SolverError::ModelNotSetup);
        }

        // a pattern change anywhere forces the full setup path
        let H_triu = H.map(|M| if M.is_triu() { M.clone() } else { M.to_triu() });
        let pattern_change = [
            H_triu
                .as_ref()
                .map(|M| M.check_equal_sparsity(&self.data.H).is_err()),
            A.map(|M| M.transpose().check_equal_sparsity(&self.data.AT).is_err()),
            C.map(|M| M.transpose().check_equal_sparsity(&self.data.CT).is_err()),
        ]
        .iter()
        .any(|c| c.unwrap_or(false));

        if pattern_change {
            let H_eff = H.cloned().unwrap_or_else(|| self.data.H.clone());
            let A_eff = A.cloned().unwrap_or_else(|| self.data.AT.transpose());
            let C_eff = C.cloned().unwrap_or_else(|| self.data.CT.transpose());
            let g_eff = g.map_or_else(|| self.data.g.clone(), |v| v.to_vec());
            let b_eff = b.map_or_else(|| self.data.b.clone(), |v| v.to_vec());
            let l_eff = l.map_or_else(|| self.data.l.clone(), |v| v.to_vec());
            let u_eff = u.map_or_else(|| self.data.u.clone(), |v| v.to_vec());

            return self.init(
                &H_eff,
                &g_eff,
                &A_eff,
                &b_eff,
                &C_eff,
                &l_eff,
                &u_eff,
                update_preconditioner,
                rho,
                mu_eq,
                mu_in,
            );
        }

        let mut timers = std::mem::take(&mut self.timers);
        timers.reset_timer("setup");

        timeit! {timers => "setup"; {

            // numeric overwrite, same patterns
            if let Some(M) = H_triu {
                self.data.H.nzval.copy_from(&M.nzval);
            }
            if let Some(M) = A {
                self.data.AT = M.transpose();
            }
            if let Some(M) = C {
                self.data.CT = M.transpose();
            }
            if let Some(v) = g {
                self.data.g.copy_from(v);
            }
            if let Some(v) = b {
                self.data.b.copy_from(v);
            }
            let infbound: T = get_infinity().as_T();
            if let Some(v) = l {
                self.data.l.scalarop_from(|x| T::max(x, -infbound), v);
            }
            if let Some(v) = u {
                self.data.u.scalarop_from(|x| T::min(x, infbound), v);
            }

            self.update_proximal_parameters(rho, mu_eq, mu_in);
            self.data.equilibrate(&mut self.precond, update_preconditioner);

            let kkt = self.kkt.as_mut().unwrap();
            kkt.update_values(
                &self.data.H_scaled,
                &self.data.AT_scaled,
                &self.data.CT_scaled,
            );

        }}

        if self.settings.compute_timings {
            self.results.info.setup_time = timers.elapsed_us("setup");
        }
        self.timers = timers;
        Ok(())
    }

    /// Installs a warm start to be consumed by the next
    /// [`solve`](QpSolver::solve).  Missing components keep their values
    /// from the current results.
    pub fn warm_start(
        &mut self,
        x: Option<&[T]>,
        y: Option<&[T]>,
        z: Option<&[T]>,
    ) -> Result<(), SolverError> {
        if !self.is_setup {
            return Err(SolverError::ModelNotSetup);
        }
        if x.is_some_and(|v| v.len() != self.data.n)
            || y.is_some_and(|v| v.len() != self.data.m_eq)
            || z.is_some_and(|v| v.len() != self.data.m_in)
        {
            return Err(SolverError::IncompatibleDimension);
        }

        if let Some(v) = x {
            self.results.x.copy_from(v);
        }
        if let Some(v) = y {
            self.results.y.copy_from(v);
        }
        if let Some(v) = z {
            self.results.z.copy_from(v);
        }
        self.warm_start_pending = true;
        Ok(())
    }

    /// Runs the solver to convergence or to the outer iteration budget.
    /// Always completes; callers inspect `results.info.status` and the
    /// residuals.
    pub fn solve(&mut self) {
        if !self.is_setup {
            self.results.info.status = SolverStatus::Unsolved;
            return;
        }

        let mut timers = std::mem::take(&mut self.timers);
        timers.reset_timer("solve");

        timeit! {timers => "solve"; {
            self.solve_inner();
        }}

        if self.settings.compute_timings {
            self.results.info.solve_time = timers.elapsed_us("solve");
            self.results.info.run_time =
                self.results.info.setup_time + self.results.info.solve_time;
        }
        self.timers = timers;
    }

    // ---------------------------------------------------------
    // setup internals
    // ---------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn setup_inner(
        &mut self,
        H: &CscMatrix<T>,
        g: &[T],
        A: &CscMatrix<T>,
        b: &[T],
        C: &CscMatrix<T>,
        l: &[T],
        u: &[T],
        compute_preconditioner: bool,
    ) -> Result<(), SolverError> {
        self.data.install(H, g, A, b, C, l, u)?;

        let (n, m_eq, m_in) = (self.data.n, self.data.m_eq, self.data.m_in);
        self.precond = if compute_preconditioner {
            Preconditioner::Ruiz(RuizEquilibration::new(
                n,
                m_eq,
                m_in,
                self.settings.equilibrate_epsilon,
                self.settings.equilibrate_max_iter,
            ))
        } else {
            Preconditioner::Identity(IdentityPreconditioner::new())
        };
        self.data.equilibrate(&mut self.precond, true);

        self.build_kkt()?;
        self.is_setup = true;
        self.warm_start_pending = false;
        self.results.info.rho_updates = 0;
        Ok(())
    }

    // build the KKT system, reusing the symbolic factorization when the
    // pattern is unchanged
    fn build_kkt(&mut self) -> Result<(), SolverError> {
        let data = &self.data;

        let reusable = self
            .kkt
            .as_ref()
            .is_some_and(|kkt| kkt.matches_pattern(&data.H, &data.AT, &data.CT));

        if reusable {
            let kkt = self.kkt.as_mut().unwrap();
            kkt.update_values(&data.H_scaled, &data.AT_scaled, &data.CT_scaled);
            kkt.reset_active();
        } else {
            self.kkt = Some(KktSystem::new(
                &data.H_scaled,
                &data.AT_scaled,
                &data.CT_scaled,
                self.settings.amd_dense_scale,
            )?);
        }
        Ok(())
    }

    fn update_proximal_parameters(&mut self, rho: Option<T>, mu_eq: Option<T>, mu_in: Option<T>) {
        if let Some(v) = rho {
            if v != self.rho {
                self.results.info.rho_updates += 1;
            }
            self.rho = v;
        }
        if let Some(v) = mu_eq {
            self.mu_eq = T::recip(v);
        }
        if let Some(v) = mu_in {
            self.mu_in = T::recip(v);
        }
    }

    // ---------------------------------------------------------
    // the BCL proximal outer loop
    // ---------------------------------------------------------

    fn solve_inner(&mut self) {
        let Self {
            settings,
            results,
            data,
            precond,
            kkt,
            work,
            rho,
            mu_eq,
            mu_in,
            warm_start_pending,
            ..
        } = self;
        let kkt = kkt.as_mut().unwrap();
        let (n, m_eq, m_in) = (data.n, data.m_eq, data.m_in);

        results.info.reset_statistics();

        let rho_v = *rho;
        let mut mu_eq_v = *mu_eq;
        let mut mu_in_v = *mu_in;

        // relative tolerance reference norms of the unscaled data
        let rhs_1_eq = data.b.norm_inf();
        let rhs_1_in_l = data.l.norm_inf();
        let rhs_1_in_u = data.u.norm_inf();
        let rhs_2 = data.g.norm_inf();

        // BCL tolerance schedule
        let bcl_eta_ext_init = T::powf((0.1).as_T(), settings.alpha_bcl);
        let mut bcl_eta_ext = bcl_eta_ext_init;
        let mut bcl_eta_in = T::one();
        let eps_in_min = T::min(settings.eps_abs, (1e-9).as_T());

        let use_warm = *warm_start_pending || settings.warm_start;
        *warm_start_pending = false;
        if !use_warm {
            kkt.reset_active();
        }
        kkt.set_diagonal(rho_v, mu_eq_v, mu_in_v);
        kkt.refactorize();

        if use_warm {
            work.x.copy_from(&results.x);
            precond.scale_primal(&mut work.x);
            work.y.copy_from(&results.y);
            precond.scale_dual_eq(&mut work.y);
            work.z.copy_from(&results.z);
            precond.scale_dual_in(&mut work.z);
        } else {
            // the regularized unconstrained minimum as initial iterate,
            // with extra refinement polish
            let dw = &mut work.dw;
            dw[0..n].scalarop_from(|gi| -gi, &data.g_scaled);
            dw[n..n + m_eq].copy_from(&data.b_scaled);
            dw[n + m_eq..].set(T::zero());
            kkt.solve_in_place(dw, 10);

            work.x.copy_from(&dw[0..n]);
            work.y.copy_from(&dw[n..n + m_eq]);
            work.z.copy_from(&dw[n + m_eq..]);
        }

        let mut status = SolverStatus::MaxIterReached;

        for iter in 0..settings.max_iter {
            let mut new_mu_eq = mu_eq_v;
            let mut new_mu_in = mu_in_v;

            let (pri_fea, eq_rhs_0, in_rhs_0) = primal_feasibility(data, precond, work);
            let (dua_fea, dua_rhs_0, dua_rhs_1, dua_rhs_3) =
                dual_feasibility(data, precond, work);

            if settings.verbose {
                println!(
                    "iter {:4}  mu_in {:9.2e}  pri_res {:9.2e}  dua_res {:9.2e}",
                    results.info.iter_ext,
                    T::recip(mu_in_v),
                    pri_fea,
                    dua_fea
                );
            }

            let is_pri_feasible = pri_fea
                <= feasibility_rhs(
                    settings,
                    &[eq_rhs_0, in_rhs_0, rhs_1_eq, rhs_1_in_l, rhs_1_in_u],
                );
            let is_dua_feasible = dua_fea
                <= feasibility_rhs(settings, &[dua_rhs_0, dua_rhs_1, rhs_2, dua_rhs_3]);
            if is_pri_feasible && is_dua_feasible {
                status = SolverStatus::Solved;
                break;
            }

            results.info.iter_ext += 1;

            work.x_prev.copy_from(&work.x);
            work.y_prev.copy_from(&work.y);
            work.z_prev.copy_from(&work.z);

            // shift the cached inequality residuals into the semi-smooth
            // form that the inner loop maintains.  r_up holds scaled Cx
            // at this point.
            let mu_in_inv = T::recip(mu_in_v);
            for (rl, ru, &zi, &li, &ui) in izip!(
                work.primal_residual_in_lo.iter_mut(),
                work.primal_residual_in_up.iter_mut(),
                work.z.iter(),
                data.l_scaled.iter(),
                data.u_scaled.iter()
            ) {
                let shifted = *ru + mu_in_inv * zi;
                *rl = shifted - li;
                *ru = shifted - ui;
            }

            newton_semi_smooth(
                data,
                kkt,
                work,
                PenaltyState {
                    rho: rho_v,
                    mu_eq: mu_eq_v,
                    mu_in: mu_in_v,
                },
                bcl_eta_in,
                iter,
                settings,
                &mut results.info,
            );

            let (pri_fea_new, eq_rhs_0, in_rhs_0) = primal_feasibility(data, precond, work);
            let (dua_fea_new, dua_rhs_0, dua_rhs_1, dua_rhs_3) =
                dual_feasibility(data, precond, work);

            let is_pri_feasible = pri_fea_new
                <= feasibility_rhs(
                    settings,
                    &[eq_rhs_0, in_rhs_0, rhs_1_eq, rhs_1_in_l, rhs_1_in_u],
                );
            let is_dua_feasible = dua_fea_new
                <= feasibility_rhs(settings, &[dua_rhs_0, dua_rhs_1, rhs_2, dua_rhs_3]);
            if is_pri_feasible && is_dua_feasible {
                status = SolverStatus::Solved;
                break;
            }

            // BCL: accept and tighten, or reject the dual step and
            // stiffen the penalties
            if pri_fea_new <= bcl_eta_ext {
                bcl_eta_ext *= mu_in_v.powf(-settings.beta_bcl);
                bcl_eta_in = T::max(bcl_eta_in / mu_in_v, eps_in_min);
            } else {
                work.y.copy_from(&work.y_prev);
                work.z.copy_from(&work.z_prev);
                new_mu_in = T::min(mu_in_v * settings.mu_update_factor, settings.mu_max_in);
                new_mu_eq = T::min(mu_eq_v * settings.mu_update_factor, settings.mu_max_eq);
                bcl_eta_ext = bcl_eta_ext_init * new_mu_in.powf(-settings.alpha_bcl);
                bcl_eta_in = T::recip(T::max(new_mu_in, eps_in_min));
            }

            // cold reset when neither residual improved at high penalty
            let dua_fea_post = dual_feasibility(data, precond, work).0;
            if pri_fea_new >= pri_fea && dua_fea_post >= dua_fea && mu_in_v >= (1e5).as_T() {
                new_mu_in = settings.cold_reset_mu_in;
                new_mu_eq = settings.cold_reset_mu_eq;
            }

            if new_mu_in != mu_in_v || new_mu_eq != mu_eq_v {
                results.info.mu_updates += 1;
                mu_eq_v = new_mu_eq;
                mu_in_v = new_mu_in;
                kkt.set_diagonal(rho_v, mu_eq_v, mu_in_v);
                kkt.refactorize();
            }
        }

        // unscale the iterates into the results
        results.x.copy_from(&work.x);
        precond.unscale_primal(&mut results.x);
        results.y.copy_from(&work.y);
        precond.unscale_dual_eq(&mut results.y);
        results.z.copy_from(&work.z);
        precond.unscale_dual_in(&mut results.z);
        results.active_constraints.copy_from_slice(&kkt.active);

        let (pri_fea, _, _) = primal_feasibility(data, precond, work);
        let (dua_fea, _, _, _) = dual_feasibility(data, precond, work);

        results.info.status = status;
        results.info.pri_res = pri_fea;
        results.info.dua_res = dua_fea;
        results.info.obj_value = data.objective(&results.x);
        results.info.save_penalties(rho_v, mu_eq_v, mu_in_v);

        *mu_eq = mu_eq_v;
        *mu_in = mu_in_v;
    }
}

// eps_abs + eps_rel * max(reference norms)
fn feasibility_rhs<T: FloatT>(settings: &Settings<T>, refs: &[T]) -> T {
    let mut rhs = settings.eps_abs;
    if settings.eps_rel != T::zero() {
        let m = refs.iter().fold(T::zero(), |acc, &r| T::max(acc, r));
        rhs += settings.eps_rel * m;
    }
    rhs
}

// Unscaled primal feasibility at the current iterate.  On return the
// caches hold the scaled `Ax - b` and the scaled `Cx`, and the returned
// tuple carries the feasibility norm and the reference norms of the
// unscaled `Ax` and `Cx`.
fn primal_feasibility<T: FloatT>(
    data: &ProblemData<T>,
    precond: &Preconditioner<T>,
    work: &mut Workspace<T>,
) -> (T, T, T) {
    let Workspace {
        x,
        primal_residual_eq: r_eq,
        primal_residual_in_lo: r_lo,
        primal_residual_in_up: r_up,
        ..
    } = work;

    data.AT_scaled.t().gemv(r_eq, x, T::one(), T::zero());
    data.CT_scaled.t().gemv(r_up, x, T::one(), T::zero());

    precond.unscale_primal_residual_eq(r_eq);
    let eq_rhs_0 = r_eq.norm_inf();
    precond.unscale_primal_residual_in(r_up);
    let in_rhs_0 = r_up.norm_inf();

    // bound violation, two sided
    for (rl, &ru, &li, &ui) in izip!(r_lo.iter_mut(), r_up.iter(), data.l.iter(), data.u.iter())
    {
        *rl = T::max(ru - ui, T::zero()) + T::min(ru - li, T::zero());
    }
    for (re, &bi) in zip(r_eq.iter_mut(), data.b.iter()) {
        *re -= bi;
    }

    let pri_fea = T::max(r_eq.norm_inf(), r_lo.norm_inf());

    precond.scale_primal_residual_eq(r_eq);
    precond.scale_primal_residual_in(r_up);

    (pri_fea, eq_rhs_0, in_rhs_0)
}

// Unscaled dual feasibility at the current iterate.  On return the cache
// holds the scaled dual residual; the returned tuple carries the
// feasibility norm and the reference norms of the unscaled `Hx`, `A'y`
// and `C'z`.
fn dual_feasibility<T: FloatT>(
    data: &ProblemData<T>,
    precond: &Preconditioner<T>,
    work: &mut Workspace<T>,
) -> (T, T, T, T) {
    let Workspace {
        x,
        y,
        z,
        dual_residual,
        tmp_n,
        ..
    } = work;

    dual_residual.copy_from(&data.g_scaled);

    data.H_scaled.sym().symv(tmp_n, x, T::one(), T::zero());
    dual_residual.axpby(T::one(), tmp_n, T::one());
    precond.unscale_dual_residual(tmp_n);
    let dua_rhs_0 = tmp_n.norm_inf();

    data.AT_scaled.gemv(tmp_n, y, T::one(), T::zero());
    dual_residual.axpby(T::one(), tmp_n, T::one());
    precond.unscale_dual_residual(tmp_n);
    let dua_rhs_1 = tmp_n.norm_inf();

    data.CT_scaled.gemv(tmp_n, z, T::one(), T::zero());
    dual_residual.axpby(T::one(), tmp_n, T::one());
    precond.unscale_dual_residual(tmp_n);
    let dua_rhs_3 = tmp_n.norm_inf();

    precond.unscale_dual_residual(dual_residual);
    let dua_fea = dual_residual.norm_inf();
    precond.scale_dual_residual(dual_residual);

    (dua_fea, dua_rhs_0, dua_rhs_1, dua_rhs_3)
}
