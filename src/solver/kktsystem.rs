use super::SolverError;
use crate::algebra::*;
use crate::ldl::LdlFactorisation;
use std::iter::zip;

/// The KKT matrix and its factorization, with active-set bookkeeping.
///
/// K is upper triangular in elastic CSC storage: columns `0..n` hold H,
/// the next `m_eq` hold A', and the trailing `m_in` hold C'.  An
/// inequality column is in use exactly when its constraint is active;
/// inactive columns keep their values staged in the capacity span so
/// that activation is a counter flip plus a factorization row insert.
/// The penalty diagonal is never stored in K: it is carried separately
/// and supplied to the factorization as an additive offset.
pub(crate) struct KktSystem<T> {
    n: usize,
    m_eq: usize,
    m_in: usize,

    pub K: ElasticCsc<T>,
    pub active: Vec<bool>,
    pub ldl: LdlFactorisation<T>,
    diag: Vec<T>,

    // iterative refinement scratch
    err: Vec<T>,
    sol: Vec<T>,
}

impl<T> KktSystem<T>
where
    T: FloatT,
{
    pub fn new(
        H: &CscMatrix<T>,
        AT: &CscMatrix<T>,
        CT: &CscMatrix<T>,
        amd_dense_scale: f64,
    ) -> Result<Self, SolverError> {
        let n = H.ncols();
        let m_eq = AT.ncols();
        let m_in = CT.ncols();
        let n_tot = n + m_eq + m_in;

        let mut caps = Vec::with_capacity(n_tot);
        for M in [H, AT, CT] {
            for j in 0..M.ncols() {
                caps.push(M.colptr[j + 1] - M.colptr[j]);
            }
        }

        let mut K = ElasticCsc::with_capacities(n_tot, n_tot, &caps);
        for j in 0..n {
            for p in H.colptr[j]..H.colptr[j + 1] {
                K.push_in_col(j, H.rowval[p], H.nzval[p]);
            }
        }
        for j in 0..m_eq {
            for p in AT.colptr[j]..AT.colptr[j + 1] {
                K.push_in_col(n + j, AT.rowval[p], AT.nzval[p]);
            }
        }
        for j in 0..m_in {
            for p in CT.colptr[j]..CT.colptr[j + 1] {
                K.push_in_col(n + m_eq + j, CT.rowval[p], CT.nzval[p]);
            }
        }
        // inequalities start out inactive, values staged in the spans
        for j in 0..m_in {
            K.col_nnz[n + m_eq + j] = 0;
        }

        let ldl = LdlFactorisation::new(&K, amd_dense_scale)?;

        Ok(Self {
            n,
            m_eq,
            m_in,
            K,
            active: vec![false; m_in],
            ldl,
            diag: vec![T::one(); n_tot],
            err: vec![T::zero(); n_tot],
            sol: vec![T::zero(); n_tot],
        })
    }

    /// true when the given blocks have exactly the sparsity this system
    /// was assembled from
    pub fn matches_pattern(&self, H: &CscMatrix<T>, AT: &CscMatrix<T>, CT: &CscMatrix<T>) -> bool {
        if H.ncols() != self.n || AT.ncols() != self.m_eq || CT.ncols() != self.m_in {
            return false;
        }

        let mut col = 0;
        let mut base = 0;
        for M in [H, AT, CT] {
            for j in 0..M.ncols() {
                let (first, last) = (M.colptr[j], M.colptr[j + 1]);
                if self.K.col_capacity(col) != last - first {
                    return false;
                }
                let kfirst = self.K.colptr[col];
                if self.K.rowval[kfirst..kfirst + (last - first)] != M.rowval[first..last] {
                    return false;
                }
                col += 1;
            }
            base += M.nnz();
        }
        debug_assert_eq!(base, self.K.capacity());
        true
    }

    /// overwrite the numeric values of all three blocks, active or not
    pub fn update_values(&mut self, H: &CscMatrix<T>, AT: &CscMatrix<T>, CT: &CscMatrix<T>) {
        debug_assert!(self.matches_pattern(H, AT, CT));

        let mut base = 0;
        for M in [H, AT, CT] {
            self.K.nzval[base..base + M.nnz()].copy_from(&M.nzval);
            base += M.nnz();
        }
    }

    /// set the penalty diagonal per the current active set
    pub fn set_diagonal(&mut self, rho: T, mu_eq: T, mu_in: T) {
        let (n, m_eq) = (self.n, self.m_eq);

        self.diag[0..n].set(rho);
        self.diag[n..n + m_eq].set(-T::recip(mu_eq));
        for (d, &is_active) in zip(self.diag[n + m_eq..].iter_mut(), self.active.iter()) {
            *d = if is_active { -T::recip(mu_in) } else { T::one() };
        }
    }

    /// full numeric refactorization of the active system
    pub fn refactorize(&mut self) {
        self.ldl.refactor(&self.K, &self.diag);
    }

    /// bring inequality `i` into the factored system
    pub fn activate(&mut self, i: usize, mu_in: T) {
        if self.active[i] {
            return;
        }
        let slot = self.n + self.m_eq + i;
        self.K.col_nnz[slot] = self.K.col_capacity(slot);

        let d = -T::recip(mu_in);
        self.diag[slot] = d;

        let rng = self.K.col_range(slot);
        self.ldl
            .add_row(slot, &self.K.rowval[rng.clone()], &self.K.nzval[rng], d);
        self.active[i] = true;
    }

    /// drop inequality `i` from the factored system
    pub fn deactivate(&mut self, i: usize) {
        if !self.active[i] {
            return;
        }
        let slot = self.n + self.m_eq + i;
        self.ldl.delete_row(slot);

        self.K.col_nnz[slot] = 0;
        self.diag[slot] = T::one();
        self.active[i] = false;
    }

    /// mark every inequality inactive.  The factorization is stale until
    /// the next refactorize call.
    pub fn reset_active(&mut self) {
        for i in 0..self.m_in {
            let slot = self.n + self.m_eq + i;
            self.K.col_nnz[slot] = 0;
            self.diag[slot] = T::one();
            self.active[i] = false;
        }
    }

    /// Solve `K_active w = rhs` in place with iterative refinement,
    /// stopping early when the residual norm stops decreasing.
    pub fn solve_in_place(&mut self, rhs: &mut [T], nb_refine: u32) {
        let Self {
            K,
            ldl,
            diag,
            err,
            sol,
            ..
        } = self;

        sol.fill(T::zero());
        let mut prev_norm = T::infinity();

        for it in 0..nb_refine {
            // err = (K + diag)*sol - rhs, zero sol on the first pass
            err.scalarop_from(|r| -r, rhs);
            if it > 0 {
                K.symv(err, sol, T::one(), T::one());
                for (e, (&d, &s)) in zip(err.iter_mut(), zip(diag.iter(), sol.iter())) {
                    *e += d * s;
                }
            }

            let norm = err.norm_inf();
            if norm > prev_norm {
                break;
            }
            prev_norm = norm;

            ldl.solve_in_place(err);
            sol.axpby(-T::one(), err, T::one());
        }

        rhs.copy_from(sol);
    }
}
