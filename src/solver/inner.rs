use super::linesearch::{exact_step, MeritData};
use super::{Info, KktSystem, ProblemData, Settings, Workspace};
use crate::algebra::*;
use itertools::izip;

/// The penalties the inner loop runs under.  `mu_eq` and `mu_in` are the
/// internal penalties, i.e. the quantities appearing as `-1/mu` on the
/// KKT diagonal.
#[derive(Clone, Copy)]
pub(crate) struct PenaltyState<T> {
    pub rho: T,
    pub mu_eq: T,
    pub mu_in: T,
}

/// Primal-dual semi-smooth Newton loop.
///
/// Expects the residual caches in the workspace to hold the scaled dual
/// residual, the scaled `Ax - b`, and the shifted inequality pair
/// `Cx - l + z/mu_in` / `Cx - u + z/mu_in`; maintains all of them
/// incrementally across its iterations.
#[allow(clippy::too_many_arguments)]
pub(crate) fn newton_semi_smooth<T: FloatT>(
    data: &ProblemData<T>,
    kkt: &mut KktSystem<T>,
    work: &mut Workspace<T>,
    pen: PenaltyState<T>,
    eta_in: T,
    outer_iter: u32,
    settings: &Settings<T>,
    info: &mut Info<T>,
) {
    let (n, m_eq, m_in) = (data.n, data.m_eq, data.m_in);
    let mu_eq_inv = T::recip(pen.mu_eq);
    let mu_in_inv = T::recip(pen.mu_in);

    for _ in 0..settings.max_iter_in {
        info.iter += 1;

        let Workspace {
            x,
            y,
            z,
            x_prev,
            dual_residual,
            primal_residual_eq: r_eq,
            primal_residual_in_lo: r_lo,
            primal_residual_in_up: r_up,
            dw,
            Hdx,
            Adx,
            Cdx,
            ATdy,
            CTdz,
            active_set_lo,
            active_set_up,
            alphas,
            ..
        } = &mut *work;

        // semi-smooth prediction of the active set at the current point
        for (lo, up, &rl, &ru) in izip!(
            active_set_lo.iter_mut(),
            active_set_up.iter_mut(),
            r_lo.iter(),
            r_up.iter()
        ) {
            *lo = rl <= T::zero();
            *up = ru >= T::zero();
        }

        // reconcile the factorization with the prediction; all flips are
        // applied incrementally, then a single numeric refactorization
        // guards the incremental updates against drift
        let mut changed = false;
        for i in 0..m_in {
            let is_active = active_set_lo[i] || active_set_up[i];
            if is_active && !kkt.active[i] {
                kkt.activate(i, pen.mu_in);
                changed = true;
            } else if !is_active && kkt.active[i] {
                kkt.deactivate(i);
                changed = true;
            }
        }
        if changed {
            kkt.refactorize();
        }

        // Newton right-hand side
        dw[0..n].scalarop_from(|r| -r, dual_residual);
        dw[n..n + m_eq].scalarop_from(|r| -r, r_eq);
        for i in 0..m_in {
            let row = n + m_eq + i;
            if active_set_up[i] {
                dw[row] = mu_in_inv * z[i] - r_up[i];
            } else if active_set_lo[i] {
                dw[row] = mu_in_inv * z[i] - r_lo[i];
            } else {
                dw[row] = -z[i];
                // restore the C'z term the dual residual cache carries
                // for this constraint, which drops out when inactive
                let CT = &data.CT_scaled;
                for p in CT.colptr[i]..CT.colptr[i + 1] {
                    dw[CT.rowval[p]] += z[i] * CT.nzval[p];
                }
            }
        }

        kkt.solve_in_place(dw, settings.nb_iterative_refinement);
        let dw_norm = dw.norm_inf();

        let (dx, rest) = dw.split_at(n);
        let (dy, dz) = rest.split_at(m_eq);

        data.H_scaled.sym().symv(Hdx, dx, T::one(), T::zero());
        data.AT_scaled.t().gemv(Adx, dx, T::one(), T::zero());
        data.AT_scaled.gemv(ATdy, dy, T::one(), T::zero());
        data.CT_scaled.t().gemv(Cdx, dx, T::one(), T::zero());
        data.CT_scaled.gemv(CTdz, dz, T::one(), T::zero());

        // exact merit line search over the inequality breakpoints
        let mut alpha = T::one();
        if m_in > 0 {
            let merit = MeritData {
                x,
                x_prev,
                g: &data.g_scaled,
                y,
                z,
                dx,
                dy,
                dz,
                Hdx,
                Adx,
                Cdx,
                r_eq,
                r_lo,
                r_up,
                rho: pen.rho,
                mu_eq: pen.mu_eq,
                mu_in: pen.mu_in,
            };
            alpha = exact_step(&merit, alphas);
        }

        if alpha * dw_norm < (1e-11).as_T() && outer_iter > 0 {
            return;
        }

        x.axpby(alpha, dx, T::one());
        y.axpby(alpha, dy, T::one());
        z.axpby(alpha, dz, T::one());

        // update the residual caches by axpy rather than re-evaluation
        for (rd, &hdx, &atdy, &ctdz, &dxi) in izip!(
            dual_residual.iter_mut(),
            Hdx.iter(),
            ATdy.iter(),
            CTdz.iter(),
            dx.iter()
        ) {
            *rd += alpha * (hdx + atdy + ctdz + pen.rho * dxi);
        }
        for (re, &adx, &dyi) in izip!(r_eq.iter_mut(), Adx.iter(), dy.iter()) {
            *re += alpha * (adx - mu_eq_inv * dyi);
        }
        for (rl, ru, &cdx) in izip!(r_lo.iter_mut(), r_up.iter_mut(), Cdx.iter()) {
            *rl += alpha * cdx;
            *ru += alpha * cdx;
        }

        // inner stopping test on the semi-smooth optimality system
        let mut err_in = T::max(r_eq.norm_inf(), dual_residual.norm_inf());
        for (&rl, &ru, &zi) in izip!(r_lo.iter(), r_up.iter(), z.iter()) {
            let v = T::min(rl, T::zero()) + T::max(ru, T::zero()) - mu_in_inv * zi;
            err_in = T::max(err_in, T::abs(v));
        }
        if err_in <= eta_in {
            return;
        }
    }
}
