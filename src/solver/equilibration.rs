use crate::algebra::*;
use enum_dispatch::*;
use std::iter::zip;
use std::marker::PhantomData;

/// Capability interface of the model preconditioner.
///
/// The solver loops never assume which implementation is installed: they
/// only scale and unscale variables and residuals through this trait.
/// Scaled quantities relate to unscaled ones through the accumulated
/// diagonal `delta = (delta_primal, delta_eq, delta_in)` and the cost
/// scale `c`:
///
/// ```text
/// x = delta_primal .* x_scaled          y = (delta_eq ./ c) .* y_scaled
/// (Ax-b) = r_eq_scaled ./ delta_eq      (Hx+g+..) = r_dual_scaled ./ (c .* delta_primal)
/// ```
#[enum_dispatch]
pub trait ScalingKind<T: FloatT> {
    /// Equilibrate the model in place, accumulating the scalings.
    #[allow(clippy::too_many_arguments)]
    fn scale_qp_in_place(
        &mut self,
        H: &mut CscMatrix<T>,
        g: &mut [T],
        AT: &mut CscMatrix<T>,
        b: &mut [T],
        CT: &mut CscMatrix<T>,
        l: &mut [T],
        u: &mut [T],
    );

    /// Re-apply previously accumulated scalings to fresh model values.
    #[allow(clippy::too_many_arguments)]
    fn apply_existing(
        &self,
        H: &mut CscMatrix<T>,
        g: &mut [T],
        AT: &mut CscMatrix<T>,
        b: &mut [T],
        CT: &mut CscMatrix<T>,
        l: &mut [T],
        u: &mut [T],
    );

    fn scale_primal(&self, x: &mut [T]);
    fn unscale_primal(&self, x: &mut [T]);

    fn scale_dual_eq(&self, y: &mut [T]);
    fn unscale_dual_eq(&self, y: &mut [T]);

    fn scale_dual_in(&self, z: &mut [T]);
    fn unscale_dual_in(&self, z: &mut [T]);

    fn scale_primal_residual_eq(&self, r: &mut [T]);
    fn unscale_primal_residual_eq(&self, r: &mut [T]);

    fn scale_primal_residual_in(&self, r: &mut [T]);
    fn unscale_primal_residual_in(&self, r: &mut [T]);

    fn scale_dual_residual(&self, r: &mut [T]);
    fn unscale_dual_residual(&self, r: &mut [T]);

    /// accumulated cost scaling
    fn cost_scale(&self) -> T;
}

/// The preconditioners the solver can install.
#[enum_dispatch(ScalingKind<T>)]
pub enum Preconditioner<T: FloatT> {
    Ruiz(RuizEquilibration<T>),
    Identity(IdentityPreconditioner<T>),
}

// ---------------------------------------------------------
// Ruiz equilibration
// ---------------------------------------------------------

/// Iterative row/column scaling equalizing the infinity norms of the
/// rows of the stacked matrix `[H A' C']`, symmetric-upper aware in H,
/// with a per-round normalization of the cost by the mean column norm
/// of H.
pub struct RuizEquilibration<T> {
    // accumulated scalings, length n + m_eq + m_in
    delta: Vec<T>,
    // per-round scalings
    delta_work: Vec<T>,
    // per-row norm scratch, length n
    norm_work: Vec<T>,
    n: usize,
    m_eq: usize,
    c: T,
    epsilon: T,
    max_iter: u32,
}

impl<T> RuizEquilibration<T>
where
    T: FloatT,
{
    pub fn new(n: usize, m_eq: usize, m_in: usize, epsilon: T, max_iter: u32) -> Self {
        Self {
            delta: vec![T::one(); n + m_eq + m_in],
            delta_work: vec![T::zero(); n + m_eq + m_in],
            norm_work: vec![T::zero(); n],
            n,
            m_eq,
            c: T::one(),
            epsilon,
            max_iter,
        }
    }

    fn delta_primal(&self) -> &[T] {
        &self.delta[..self.n]
    }
    fn delta_eq(&self) -> &[T] {
        &self.delta[self.n..self.n + self.m_eq]
    }
    fn delta_in(&self) -> &[T] {
        &self.delta[self.n + self.m_eq..]
    }
}

impl<T> ScalingKind<T> for RuizEquilibration<T>
where
    T: FloatT,
{
    fn scale_qp_in_place(
        &mut self,
        H: &mut CscMatrix<T>,
        g: &mut [T],
        AT: &mut CscMatrix<T>,
        b: &mut [T],
        CT: &mut CscMatrix<T>,
        l: &mut [T],
        u: &mut [T],
    ) {
        let (n, m_eq) = (self.n, self.m_eq);
        let machine_eps = T::epsilon();

        self.delta.fill(T::one());
        self.delta_work.fill(T::zero());
        self.c = T::one();

        let mut iter = 1;
        loop {
            let dev = self
                .delta_work
                .iter()
                .fold(T::zero(), |acc, &d| T::max(acc, T::abs(T::one() - d)));
            if dev <= self.epsilon || iter == self.max_iter {
                break;
            }
            iter += 1;

            // row infinity norms of [H A' C'] over the primal rows, with
            // a single symmetric-upper pass for H
            let (dp, rest) = self.delta_work.split_at_mut(n);
            let (de, di) = rest.split_at_mut(m_eq);

            H.col_norms_sym(&mut self.norm_work);
            AT.row_norms_no_reset(&mut self.norm_work);
            CT.row_norms_no_reset(&mut self.norm_work);

            dp.scalarop_from(|r| T::recip(machine_eps + T::sqrt(r)), &self.norm_work);

            // per-constraint norms are the column norms of A' and C'
            AT.col_norms(de);
            de.scalarop(|r| T::recip(machine_eps + T::sqrt(r)));
            CT.col_norms(di);
            di.scalarop(|r| T::recip(machine_eps + T::sqrt(r)));

            // scale the data
            H.lrscale(dp, dp);
            AT.lrscale(dp, de);
            CT.lrscale(dp, di);
            g.hadamard(dp);
            b.hadamard(de);
            l.hadamard(di);
            u.hadamard(di);

            // cost normalization by the mean column norm of H
            H.col_norms_sym(&mut self.norm_work);
            let avg = self.norm_work.mean();
            let gamma = T::recip(T::max(avg, T::one()));
            g.scale(gamma);
            H.scale(gamma);

            self.delta.hadamard(&self.delta_work);
            self.c *= gamma;
        }
    }

    fn apply_existing(
        &self,
        H: &mut CscMatrix<T>,
        g: &mut [T],
        AT: &mut CscMatrix<T>,
        b: &mut [T],
        CT: &mut CscMatrix<T>,
        l: &mut [T],
        u: &mut [T],
    ) {
        let (dp, de, di) = (self.delta_primal(), self.delta_eq(), self.delta_in());

        H.lrscale(dp, dp);
        H.scale(self.c);
        AT.lrscale(dp, de);
        CT.lrscale(dp, di);

        g.hadamard(dp);
        g.scale(self.c);
        b.hadamard(de);
        l.hadamard(di);
        u.hadamard(di);
    }

    fn scale_primal(&self, x: &mut [T]) {
        for (x, &d) in zip(x.iter_mut(), self.delta_primal()) {
            *x /= d;
        }
    }
    fn unscale_primal(&self, x: &mut [T]) {
        x.hadamard(self.delta_primal());
    }

    fn scale_dual_eq(&self, y: &mut [T]) {
        let c = self.c;
        for (y, &d) in zip(y.iter_mut(), self.delta_eq()) {
            *y = *y / d * c;
        }
    }
    fn unscale_dual_eq(&self, y: &mut [T]) {
        let cinv = T::recip(self.c);
        for (y, &d) in zip(y.iter_mut(), self.delta_eq()) {
            *y = *y * d * cinv;
        }
    }

    fn scale_dual_in(&self, z: &mut [T]) {
        let c = self.c;
        for (z, &d) in zip(z.iter_mut(), self.delta_in()) {
            *z = *z / d * c;
        }
    }
    fn unscale_dual_in(&self, z: &mut [T]) {
        let cinv = T::recip(self.c);
        for (z, &d) in zip(z.iter_mut(), self.delta_in()) {
            *z = *z * d * cinv;
        }
    }

    fn scale_primal_residual_eq(&self, r: &mut [T]) {
        r.hadamard(self.delta_eq());
    }
    fn unscale_primal_residual_eq(&self, r: &mut [T]) {
        for (r, &d) in zip(r.iter_mut(), self.delta_eq()) {
            *r /= d;
        }
    }

    fn scale_primal_residual_in(&self, r: &mut [T]) {
        r.hadamard(self.delta_in());
    }
    fn unscale_primal_residual_in(&self, r: &mut [T]) {
        for (r, &d) in zip(r.iter_mut(), self.delta_in()) {
            *r /= d;
        }
    }

    fn scale_dual_residual(&self, r: &mut [T]) {
        let c = self.c;
        for (r, &d) in zip(r.iter_mut(), self.delta_primal()) {
            *r = *r * d * c;
        }
    }
    fn unscale_dual_residual(&self, r: &mut [T]) {
        let cinv = T::recip(self.c);
        for (r, &d) in zip(r.iter_mut(), self.delta_primal()) {
            *r = *r / d * cinv;
        }
    }

    fn cost_scale(&self) -> T {
        self.c
    }
}

// ---------------------------------------------------------
// identity preconditioner
// ---------------------------------------------------------

/// A no-op implementation of the scaling interface.
#[derive(Default)]
pub struct IdentityPreconditioner<T> {
    phantom: PhantomData<T>,
}

impl<T> IdentityPreconditioner<T>
where
    T: FloatT,
{
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> ScalingKind<T> for IdentityPreconditioner<T>
where
    T: FloatT,
{
    fn scale_qp_in_place(
        &mut self,
        _H: &mut CscMatrix<T>,
        _g: &mut [T],
        _AT: &mut CscMatrix<T>,
        _b: &mut [T],
        _CT: &mut CscMatrix<T>,
        _l: &mut [T],
        _u: &mut [T],
    ) {
    }

    fn apply_existing(
        &self,
        _H: &mut CscMatrix<T>,
        _g: &mut [T],
        _AT: &mut CscMatrix<T>,
        _b: &mut [T],
        _CT: &mut CscMatrix<T>,
        _l: &mut [T],
        _u: &mut [T],
    ) {
    }

    fn scale_primal(&self, _x: &mut [T]) {}
    fn unscale_primal(&self, _x: &mut [T]) {}
    fn scale_dual_eq(&self, _y: &mut [T]) {}
    fn unscale_dual_eq(&self, _y: &mut [T]) {}
    fn scale_dual_in(&self, _z: &mut [T]) {}
    fn unscale_dual_in(&self, _z: &mut [T]) {}
    fn scale_primal_residual_eq(&self, _r: &mut [T]) {}
    fn unscale_primal_residual_eq(&self, _r: &mut [T]) {}
    fn scale_primal_residual_in(&self, _r: &mut [T]) {}
    fn unscale_primal_residual_in(&self, _r: &mut [T]) {}
    fn scale_dual_residual(&self, _r: &mut [T]) {}
    fn unscale_dual_residual(&self, _r: &mut [T]) {}

    fn cost_scale(&self) -> T {
        T::one()
    }
}

// ---------------------------------------------------------
// tests
// ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn badly_scaled_qp() -> (
        CscMatrix<f64>,
        Vec<f64>,
        CscMatrix<f64>,
        Vec<f64>,
        CscMatrix<f64>,
        Vec<f64>,
        Vec<f64>,
    ) {
        // H = [1e4  1e2; 1e2  1e-2] (upper), A = [1e3 1], C = [1e-2 10]
        let H = CscMatrix::new(2, 2, vec![0, 1, 3], vec![0, 0, 1], vec![1e4, 1e2, 1e-2]);
        let AT = CscMatrix::new(2, 1, vec![0, 2], vec![0, 1], vec![1e3, 1.]);
        let CT = CscMatrix::new(2, 1, vec![0, 2], vec![0, 1], vec![1e-2, 10.]);
        let g = vec![1., 2.];
        let b = vec![3.];
        let l = vec![-1.];
        let u = vec![1.];
        (H, g, AT, b, CT, l, u)
    }

    #[test]
    fn test_ruiz_equalizes_row_norms() {
        let (mut H, mut g, mut AT, mut b, mut CT, mut l, mut u) = badly_scaled_qp();
        let mut ruiz = RuizEquilibration::<f64>::new(2, 1, 1, 1e-3, 10);
        ruiz.scale_qp_in_place(&mut H, &mut g, &mut AT, &mut b, &mut CT, &mut l, &mut u);

        // row norms of the scaled stack [H A' C'] land near one
        let mut norms = vec![0.0; 2];
        H.col_norms_sym(&mut norms);
        AT.row_norms_no_reset(&mut norms);
        CT.row_norms_no_reset(&mut norms);
        for &nrm in norms.iter() {
            assert!((0.5..=2.0).contains(&nrm), "row norm {nrm}");
        }
        assert!(ruiz.cost_scale() > 0.);
    }

    #[test]
    fn test_scale_unscale_roundtrip() {
        let (mut H, mut g, mut AT, mut b, mut CT, mut l, mut u) = badly_scaled_qp();
        let mut ruiz = RuizEquilibration::<f64>::new(2, 1, 1, 1e-3, 10);
        ruiz.scale_qp_in_place(&mut H, &mut g, &mut AT, &mut b, &mut CT, &mut l, &mut u);

        let x0 = vec![1.25, -3.5];
        let mut x = x0.clone();
        ruiz.scale_primal(&mut x);
        ruiz.unscale_primal(&mut x);
        assert!(x.norm_inf_diff(&x0) <= 1e-12 * x0.norm_inf());

        let y0 = vec![0.7];
        let mut y = y0.clone();
        ruiz.scale_dual_eq(&mut y);
        ruiz.unscale_dual_eq(&mut y);
        assert!(y.norm_inf_diff(&y0) <= 1e-12 * y0.norm_inf());

        let z0 = vec![-0.3];
        let mut z = z0.clone();
        ruiz.scale_dual_in(&mut z);
        ruiz.unscale_dual_in(&mut z);
        assert!(z.norm_inf_diff(&z0) <= 1e-12 * z0.norm_inf());

        let r0 = vec![0.1, 0.9];
        let mut r = r0.clone();
        ruiz.scale_dual_residual(&mut r);
        ruiz.unscale_dual_residual(&mut r);
        assert!(r.norm_inf_diff(&r0) <= 1e-12 * r0.norm_inf());
    }

    #[test]
    fn test_ruiz_rounds_contract() {
        // running with a round budget of k+1 never yields a worse final
        // per-round deviation than a budget of k
        let mut prev_dev = f64::INFINITY;
        for rounds in 2..6u32 {
            let (mut H, mut g, mut AT, mut b, mut CT, mut l, mut u) = badly_scaled_qp();
            let mut ruiz = RuizEquilibration::<f64>::new(2, 1, 1, 0.0, rounds);
            ruiz.scale_qp_in_place(&mut H, &mut g, &mut AT, &mut b, &mut CT, &mut l, &mut u);

            let dev = ruiz
                .delta_work
                .iter()
                .fold(0.0f64, |acc, &d| acc.max((1.0 - d).abs()));
            assert!(dev <= prev_dev + 1e-12, "{dev} vs {prev_dev}");
            prev_dev = dev;
        }
    }

    #[test]
    fn test_identity_is_noop() {
        let (mut H, mut g, mut AT, mut b, mut CT, mut l, mut u) = badly_scaled_qp();
        let H0 = H.clone();
        let mut id = IdentityPreconditioner::<f64>::new();
        id.scale_qp_in_place(&mut H, &mut g, &mut AT, &mut b, &mut CT, &mut l, &mut u);
        assert_eq!(H.nzval, H0.nzval);
        assert_eq!(id.cost_scale(), 1.0);
    }
}
