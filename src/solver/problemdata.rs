use super::{get_infinity, Preconditioner, ScalingKind, SolverError};
use crate::algebra::*;

/// Internal copy of the model, kept twice over: the values as installed
/// (bounds capped at the infinity constant), and the equilibrated copy
/// the solver loops operate on.  A and C are stored transposed so their
/// columns are the constraints.
pub(crate) struct ProblemData<T> {
    pub n: usize,
    pub m_eq: usize,
    pub m_in: usize,

    // installed model, unscaled
    pub H: CscMatrix<T>,
    pub g: Vec<T>,
    pub AT: CscMatrix<T>,
    pub b: Vec<T>,
    pub CT: CscMatrix<T>,
    pub l: Vec<T>,
    pub u: Vec<T>,

    // equilibrated working copy
    pub H_scaled: CscMatrix<T>,
    pub g_scaled: Vec<T>,
    pub AT_scaled: CscMatrix<T>,
    pub b_scaled: Vec<T>,
    pub CT_scaled: CscMatrix<T>,
    pub l_scaled: Vec<T>,
    pub u_scaled: Vec<T>,
}

impl<T> ProblemData<T>
where
    T: FloatT,
{
    /// an empty model of the given dimensions
    pub fn new(n: usize, m_eq: usize, m_in: usize) -> Self {
        Self {
            n,
            m_eq,
            m_in,
            H: CscMatrix::spalloc(n, n, 0),
            g: vec![T::zero(); n],
            AT: CscMatrix::spalloc(n, m_eq, 0),
            b: vec![T::zero(); m_eq],
            CT: CscMatrix::spalloc(n, m_in, 0),
            l: vec![T::zero(); m_in],
            u: vec![T::zero(); m_in],
            H_scaled: CscMatrix::spalloc(n, n, 0),
            g_scaled: vec![T::zero(); n],
            AT_scaled: CscMatrix::spalloc(n, m_eq, 0),
            b_scaled: vec![T::zero(); m_eq],
            CT_scaled: CscMatrix::spalloc(n, m_in, 0),
            l_scaled: vec![T::zero(); m_in],
            u_scaled: vec![T::zero(); m_in],
        }
    }

    /// Installs model values, checking shapes against the solver
    /// dimensions.  H is reduced to its upper triangle; A and C are
    /// transposed; l and u are capped at the infinity bound.
    #[allow(clippy::too_many_arguments)]
    pub fn install(
        &mut self,
        H: &CscMatrix<T>,
        g: &[T],
        A: &CscMatrix<T>,
        b: &[T],
        C: &CscMatrix<T>,
        l: &[T],
        u: &[T],
    ) -> Result<(), SolverError> {
        let (n, m_eq, m_in) = (self.n, self.m_eq, self.m_in);

        if !H.is_square()
            || H.nrows() != n
            || g.len() != n
            || A.size() != (m_eq, n)
            || b.len() != m_eq
            || C.size() != (m_in, n)
            || l.len() != m_in
            || u.len() != m_in
        {
            return Err(SolverError::IncompatibleDimension);
        }
        H.check_format()?;
        A.check_format()?;
        C.check_format()?;

        self.H = if H.is_triu() { H.clone() } else { H.to_triu() };
        self.AT = A.transpose();
        self.CT = C.transpose();
        self.g.copy_from(g);
        self.b.copy_from(b);
        self.l.copy_from(l);
        self.u.copy_from(u);

        let infbound: T = get_infinity().as_T();
        self.l.scalarop(|x| T::max(x, -infbound));
        self.u.scalarop(|x| T::min(x, infbound));

        Ok(())
    }

    /// Refresh the scaled copy from the installed values and equilibrate
    /// it.  With `execute` the preconditioner recomputes its scalings;
    /// otherwise the previously accumulated ones are re-applied.
    pub fn equilibrate(&mut self, precond: &mut Preconditioner<T>, execute: bool) {
        self.H_scaled = self.H.clone();
        self.AT_scaled = self.AT.clone();
        self.CT_scaled = self.CT.clone();
        self.g_scaled.copy_from(&self.g);
        self.b_scaled.copy_from(&self.b);
        self.l_scaled.copy_from(&self.l);
        self.u_scaled.copy_from(&self.u);

        if execute {
            precond.scale_qp_in_place(
                &mut self.H_scaled,
                &mut self.g_scaled,
                &mut self.AT_scaled,
                &mut self.b_scaled,
                &mut self.CT_scaled,
                &mut self.l_scaled,
                &mut self.u_scaled,
            );
        } else {
            precond.apply_existing(
                &mut self.H_scaled,
                &mut self.g_scaled,
                &mut self.AT_scaled,
                &mut self.b_scaled,
                &mut self.CT_scaled,
                &mut self.l_scaled,
                &mut self.u_scaled,
            );
        }
    }

    /// objective value ½ x'Hx + g'x on the installed (unscaled) data
    pub fn objective(&self, x: &[T]) -> T {
        let half: T = (0.5).as_T();
        half * self.H.quad_form(x, x) + self.g.dot(x)
    }
}
