use crate::algebra::*;
use itertools::izip;

/// Everything the merit gradient needs about the current iterate and
/// Newton direction, all in the scaled space.
pub(crate) struct MeritData<'a, T> {
    pub x: &'a [T],
    pub x_prev: &'a [T],
    pub g: &'a [T],
    pub y: &'a [T],
    pub z: &'a [T],
    pub dx: &'a [T],
    pub dy: &'a [T],
    pub dz: &'a [T],
    pub Hdx: &'a [T],
    pub Adx: &'a [T],
    pub Cdx: &'a [T],
    pub r_eq: &'a [T],
    pub r_lo: &'a [T],
    pub r_up: &'a [T],
    pub rho: T,
    pub mu_eq: T,
    pub mu_in: T,
}

pub(crate) struct GradResult<T> {
    pub a: T,
    pub b: T,
    pub grad: T,
}

/// Directional derivative of the primal-dual merit function at step
/// length `alpha`, returned with the slope and intercept of the affine
/// piece it was evaluated on.  The inequality contributions switch with
/// the active set predicted at `alpha`.
pub(crate) fn merit_gradient<T: FloatT>(d: &MeritData<T>, alpha: T) -> GradResult<T> {
    let zero = T::zero();
    let nu = T::one();

    let mut a = d.dx.dot(d.Hdx) + d.rho * d.dx.sumsq() + d.mu_eq * d.Adx.sumsq();

    let mut b = d.x.dot(d.Hdx);
    for (&dxi, &xi, &xpi, &gi) in izip!(d.dx, d.x, d.x_prev, d.g) {
        b += (d.rho * (xi - xpi) + gi) * dxi;
    }

    for (&adx, &req, &yi, &dyi) in izip!(d.Adx, d.r_eq, d.y, d.dy) {
        let t = d.mu_eq * adx - dyi;
        a += nu / d.mu_eq * t * t;
        b += adx * (d.mu_eq * req + yi) + nu * req * t;
    }

    let mu_in_inv = T::recip(d.mu_in);
    for (&cdx, &rl, &ru, &zi, &dzi) in izip!(d.Cdx, d.r_lo, d.r_up, d.z, d.dz) {
        let tl = rl + alpha * cdx;
        let tu = ru + alpha * cdx;

        let cdx_active = if tl < zero || tu > zero { cdx } else { zero };
        let ztilde =
            (if tl < zero { rl } else { zero }) + (if tu > zero { ru } else { zero });

        let t = d.mu_in * cdx_active - dzi;
        a += d.mu_in * cdx_active * cdx_active + nu * mu_in_inv * t * t;
        b += d.mu_in * cdx_active * ztilde + nu * (ztilde - mu_in_inv * zi) * t;
    }

    GradResult {
        a,
        b,
        grad: a * alpha + b,
    }
}

/// Exact step length: walk the sorted unique positive breakpoints of the
/// piecewise-affine merit gradient until it turns nonnegative, then
/// interpolate the root within the bracketing pair.  Past the last
/// breakpoint the gradient is globally affine and the root is taken
/// directly.
pub(crate) fn exact_step<T: FloatT>(d: &MeritData<T>, alphas: &mut Vec<T>) -> T {
    let zero = T::zero();

    alphas.clear();
    for (&cdx, &rl, &ru) in izip!(d.Cdx, d.r_lo, d.r_up) {
        if cdx != zero {
            for cand in [-rl / cdx, -ru / cdx] {
                if cand > zero {
                    alphas.push(cand);
                }
            }
        }
    }
    alphas.sort_by(|p, q| p.partial_cmp(q).unwrap());
    alphas.dedup();

    if alphas.is_empty() || alphas[0] > T::one() {
        return T::one();
    }

    let infty = T::infinity();
    let mut last_neg_grad = zero;
    let mut alpha_last_neg = zero;
    let mut first_pos_grad = zero;
    let mut alpha_first_pos = infty;

    for &alpha_cur in alphas.iter() {
        let gr = merit_gradient(d, alpha_cur).grad;
        if gr < zero {
            alpha_last_neg = alpha_cur;
            last_neg_grad = gr;
        } else {
            first_pos_grad = gr;
            alpha_first_pos = alpha_cur;
            break;
        }
    }

    if alpha_last_neg == zero {
        last_neg_grad = merit_gradient(d, alpha_last_neg).grad;
    }

    if alpha_first_pos == infty {
        // still descending past the last breakpoint
        let two: T = (2.0).as_T();
        let res = merit_gradient(d, two * alpha_last_neg + T::one());
        -res.b / res.a
    } else {
        let mut alpha = alpha_last_neg
            - last_neg_grad * (alpha_first_pos - alpha_last_neg)
                / (first_pos_grad - last_neg_grad);
        if alpha_last_neg == zero && alpha_first_pos < T::one() {
            alpha = alpha_first_pos;
        }
        alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // one variable, one inequality, no equalities
    fn fixture<'a>() -> MeritData<'a, f64> {
        MeritData {
            x: &[0.0],
            x_prev: &[0.0],
            g: &[-1.0],
            y: &[],
            z: &[0.0],
            dx: &[1.0],
            dy: &[],
            dz: &[0.5],
            Hdx: &[1.0],
            Adx: &[],
            Cdx: &[1.0],
            r_eq: &[],
            r_lo: &[-10.0],
            r_up: &[-0.5],
            rho: 1e-6,
            mu_eq: 1e3,
            mu_in: 10.0,
        }
    }

    #[test]
    fn test_gradient_is_piecewise_affine() {
        let d = fixture();
        // within one piece the gradient is exactly a*alpha + b
        let g1 = merit_gradient(&d, 0.1);
        let g2 = merit_gradient(&d, 0.3);
        assert_eq!(g1.a, g2.a);
        assert_eq!(g1.b, g2.b);
        assert!((g2.grad - (g1.a * 0.3 + g1.b)).abs() <= 1e-12);
    }

    #[test]
    fn test_step_bracket() {
        let d = fixture();
        let mut alphas = Vec::new();
        let alpha = exact_step(&d, &mut alphas);
        assert!(alpha > 0.0);

        // the chosen step's gradient is no larger in magnitude than the
        // smaller of the bracketing gradients
        let g_star = merit_gradient(&d, alpha).grad.abs();
        let brackets: Vec<f64> = alphas
            .iter()
            .map(|&a| merit_gradient(&d, a).grad)
            .collect();
        let lo = brackets
            .iter()
            .filter(|g| **g < 0.0)
            .fold(f64::INFINITY, |acc, g| acc.min(g.abs()));
        let hi = brackets
            .iter()
            .filter(|g| **g >= 0.0)
            .fold(f64::INFINITY, |acc, g| acc.min(g.abs()));
        assert!(g_star <= lo.min(hi) + 1e-9);
    }

    #[test]
    fn test_no_breakpoints_gives_unit_step() {
        let mut d = fixture();
        d.Cdx = &[0.0];
        let mut alphas = Vec::new();
        assert_eq!(exact_step(&d, &mut alphas), 1.0);
    }
}
