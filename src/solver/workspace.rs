use crate::algebra::*;

/// Scratch storage for the solver loops, sized once at setup.  Every
/// distinct use gets its own buffer; in particular the cached residuals
/// never alias the Newton right-hand side or the product buffers.
pub(crate) struct Workspace<T> {
    // iterates in the scaled space
    pub x: Vec<T>,
    pub y: Vec<T>,
    pub z: Vec<T>,

    // snapshots at the start of the current outer iteration
    pub x_prev: Vec<T>,
    pub y_prev: Vec<T>,
    pub z_prev: Vec<T>,

    // cached residuals, scaled; the inequality pair is kept in the
    // shifted semi-smooth form between outer steps
    pub dual_residual: Vec<T>,
    pub primal_residual_eq: Vec<T>,
    pub primal_residual_in_lo: Vec<T>,
    pub primal_residual_in_up: Vec<T>,

    // Newton step and right-hand side (shared storage, dim n+m_eq+m_in)
    pub dw: Vec<T>,

    // matrix-vector products of the step direction
    pub Hdx: Vec<T>,
    pub Adx: Vec<T>,
    pub Cdx: Vec<T>,
    pub ATdy: Vec<T>,
    pub CTdz: Vec<T>,

    // semi-smooth active set prediction
    pub active_set_lo: Vec<bool>,
    pub active_set_up: Vec<bool>,

    // line search breakpoints
    pub alphas: Vec<T>,

    // residual evaluation scratch
    pub tmp_n: Vec<T>,
}

impl<T> Workspace<T>
where
    T: FloatT,
{
    pub fn new(n: usize, m_eq: usize, m_in: usize) -> Self {
        let n_tot = n + m_eq + m_in;
        Self {
            x: vec![T::zero(); n],
            y: vec![T::zero(); m_eq],
            z: vec![T::zero(); m_in],
            x_prev: vec![T::zero(); n],
            y_prev: vec![T::zero(); m_eq],
            z_prev: vec![T::zero(); m_in],
            dual_residual: vec![T::zero(); n],
            primal_residual_eq: vec![T::zero(); m_eq],
            primal_residual_in_lo: vec![T::zero(); m_in],
            primal_residual_in_up: vec![T::zero(); m_in],
            dw: vec![T::zero(); n_tot],
            Hdx: vec![T::zero(); n],
            Adx: vec![T::zero(); m_eq],
            Cdx: vec![T::zero(); m_in],
            ATdy: vec![T::zero(); n],
            CTdz: vec![T::zero(); n],
            active_set_lo: vec![false; m_in],
            active_set_up: vec![false; m_in],
            alphas: Vec::with_capacity(2 * m_in),
            tmp_n: vec![T::zero(); n],
        }
    }
}
