#![allow(non_snake_case)]

//! LDL' factorization of sparse symmetric quasidefinite matrices, with
//! incremental row insertion, row deletion and rank-1 modification.
//!
//! The factors satisfy `L D L' = P (K + diag) P'` for a fill-reducing
//! permutation P fixed at symbolic analysis time.  Storage for L is
//! elastic: column capacities are sized once from the densest pattern the
//! caller will ever factor, so that row modifications never reallocate.
//! D is kept on the diagonal slot at the head of each column of L.

use crate::algebra::*;
use std::iter::zip;
use thiserror::Error;

/// elimination tree sentinel for "no parent"
const NONE: usize = usize::MAX;

/// Error codes returnable from [`LdlFactorisation`] construction
#[derive(Error, Debug)]
pub enum LdlError {
    #[error("Matrix dimension fields are incompatible")]
    IncompatibleDimension,
    #[error("Matrix is not upper triangular")]
    NotUpperTriangular,
}

/// Maintains `L D L' = P (K + diag) P'` under numeric refactorization,
/// rank-1 updates and row insertion/deletion.
///
/// The matrix passed at construction defines the *maximal* sparsity
/// pattern: the whole capacity span of each of its columns is read.
/// Later calls to [`refactor`](LdlFactorisation::refactor) may present
/// any sub-pattern of it (columns using fewer entries), and the row
/// modification operations may re-grow columns up to that maximum.
#[derive(Debug)]
pub struct LdlFactorisation<T = f64> {
    n: usize,
    /// fill reducing permutation and its inverse
    pub perm: Vec<usize>,
    pub perm_inv: Vec<usize>,
    /// elimination tree of the currently factored pattern
    etree: Vec<usize>,
    /// L, with D stored on the diagonal slot at the head of each column
    pub ld: ElasticCsc<T>,

    // permuted copy of the matrix being factored
    pkpt: ElasticCsc<T>,
    diag_perm: Vec<T>,

    // workspace
    Lnz: Vec<usize>,
    dinv: Vec<T>,
    iwork: Vec<usize>,
    bwork: Vec<bool>,
    fwork: Vec<T>,
    solwork: Vec<T>,
    wpat: Vec<usize>,
    pattern: Vec<usize>,
    colbuf: Vec<usize>,
}

impl<T> LdlFactorisation<T>
where
    T: FloatT,
{
    /// Symbolic analysis of the maximal pattern of `K` (upper triangle,
    /// full capacity span of every column).  No numeric work is done;
    /// call [`refactor`](LdlFactorisation::refactor) before solving.
    pub fn new(K: &ElasticCsc<T>, amd_dense_scale: f64) -> Result<Self, LdlError> {
        let n = K.ncols();
        if !K.is_square() {
            return Err(LdlError::IncompatibleDimension);
        }
        for j in 0..n {
            let rows = &K.rowval[K.colptr[j]..K.colptr[j + 1]];
            if rows.iter().any(|&i| i > j) {
                return Err(LdlError::NotUpperTriangular);
            }
        }

        let (perm, perm_inv) = _get_amd_ordering(n, &K.colptr, &K.rowval, amd_dense_scale);

        // per-column entry counts of the permuted maximal pattern
        let mut counts = vec![0usize; n];
        for j in 0..n {
            for p in K.colptr[j]..K.colptr[j + 1] {
                let i = K.rowval[p];
                counts[usize::max(perm_inv[i], perm_inv[j])] += 1;
            }
        }
        let mut pkpt = ElasticCsc::with_capacities(n, n, &counts);
        _permute_symmetric(K, &perm_inv, &mut pkpt, true);

        // elimination tree and column fill counts of the maximal pattern
        // give the fixed column capacities of L (one extra slot for D)
        let mut etree = vec![NONE; n];
        let mut Lnz = vec![0usize; n];
        let mut iwork = vec![0usize; 2 * n];
        _etree(&pkpt, &mut iwork[0..n], &mut Lnz, &mut etree);

        let ldcaps: Vec<usize> = Lnz.iter().map(|&lnz| lnz + 1).collect();
        let ld = ElasticCsc::with_capacities(n, n, &ldcaps);

        Ok(Self {
            n,
            perm,
            perm_inv,
            etree,
            ld,
            pkpt,
            diag_perm: vec![T::zero(); n],
            Lnz,
            dinv: vec![T::zero(); n],
            iwork,
            bwork: vec![false; n],
            fwork: vec![T::zero(); n],
            solwork: vec![T::zero(); n],
            wpat: vec![0; n],
            pattern: vec![0; n],
            colbuf: vec![0; n],
        })
    }

    /// Full numeric refactorization of `K + diag(diag)`, where only the
    /// entries in use in each column of `K` participate.  The elimination
    /// tree is re-derived for the presented pattern.
    pub fn refactor(&mut self, K: &ElasticCsc<T>, diag: &[T]) {
        assert_eq!(K.ncols(), self.n);
        assert_eq!(diag.len(), self.n);

        _permute_symmetric(K, &self.perm_inv, &mut self.pkpt, false);
        for (i, &d) in diag.iter().enumerate() {
            self.diag_perm[self.perm_inv[i]] = d;
        }

        _etree(
            &self.pkpt,
            &mut self.iwork[0..self.n],
            &mut self.Lnz,
            &mut self.etree,
        );
        debug_assert!((0..self.n).all(|j| self.Lnz[j] + 1 <= self.ld.col_capacity(j)));

        _factor(
            &self.pkpt,
            &self.diag_perm,
            &mut self.ld,
            &self.etree,
            &mut self.dinv,
            &mut self.bwork,
            &mut self.iwork,
            &mut self.fwork,
        );
    }

    /// Solves `(K + diag) x = b` in place, with `b` in the unpermuted space.
    pub fn solve_in_place(&mut self, b: &mut [T]) {
        assert_eq!(b.len(), self.n);

        let tmp = &mut self.solwork;
        for (p, t) in zip(&self.perm, tmp.iter_mut()) {
            *t = b[*p];
        }

        _lsolve(&self.ld, tmp);
        for i in 0..self.n {
            tmp[i] /= self.ld.nzval[self.ld.colptr[i]];
        }
        _ltsolve(&self.ld, tmp);

        for (p, t) in zip(&self.perm, tmp.iter()) {
            b[*p] = *t;
        }
    }

    /// Rank-1 modification `L D L' += alpha * u u'`, with `u` given as a
    /// sparse vector in the unpermuted space.  The fill produced by the
    /// update must be representable within the column capacities fixed at
    /// symbolic analysis, which holds whenever `u`'s pattern is drawn
    /// from columns of the maximal `K` pattern.
    pub fn rank1_update(&mut self, rows: &[usize], vals: &[T], alpha: T) {
        assert_eq!(rows.len(), vals.len());
        if rows.is_empty() {
            return;
        }

        for (q, &r) in rows.iter().enumerate() {
            self.wpat[q] = self.perm_inv[r];
        }
        self.wpat[..rows.len()].sort_unstable();
        for (&r, &v) in zip(rows, vals) {
            self.fwork[self.perm_inv[r]] = v;
        }

        self._rank1_inner(rows.len(), alpha);
    }

    /// Inserts row and column `pos` into the factored matrix.  The
    /// off-diagonal entries are `(rows, vals)` in the unpermuted space
    /// (`rows` must not contain `pos`); the diagonal entry is `diag`.
    /// The slot at `pos` must currently be trivial, i.e. as left behind
    /// by [`delete_row`](LdlFactorisation::delete_row) or by a
    /// refactorization with an empty column and unit diagonal.
    pub fn add_row(&mut self, pos: usize, rows: &[usize], vals: &[T], mut diag: T) {
        assert_eq!(rows.len(), vals.len());
        let ppos = self.perm_inv[pos];
        debug_assert_eq!(self.ld.col_nnz[ppos], 1);

        // permuted indices of the incoming column, sorted
        let cnt = rows.len();
        for (q, &r) in rows.iter().enumerate() {
            self.wpat[q] = self.perm_inv[r];
        }
        self.wpat[..cnt].sort_unstable();

        // nonzero pattern of the new row of L: the reach of the incoming
        // column through the elimination subtree below ppos
        let mut patlen = 0;
        for q in 0..cnt {
            let mut j = self.wpat[q];
            if j >= ppos {
                break;
            }
            while !self.bwork[j] {
                self.bwork[j] = true;
                self.pattern[patlen] = j;
                patlen += 1;

                let parent = self.etree[j];
                if parent == NONE || parent >= ppos || self.bwork[parent] {
                    break;
                }
                j = parent;
            }
        }
        for q in 0..patlen {
            self.bwork[self.pattern[q]] = false;
        }
        self.pattern[..patlen].sort_unstable();

        // clear the solve workspace over the pattern, then scatter the
        // incoming column
        for q in 0..patlen {
            self.fwork[self.pattern[q]] = T::zero();
        }
        for (&r, &v) in zip(rows, vals) {
            self.fwork[self.perm_inv[r]] = v;
        }

        // the part of the incoming column below ppos seeds column ppos of L
        for q in 0..cnt {
            let pj = self.wpat[q];
            if pj > ppos {
                let dest = self.ld.colptr[ppos] + self.ld.col_nnz[ppos];
                debug_assert!(self.ld.col_nnz[ppos] < self.ld.col_capacity(ppos));
                self.ld.rowval[dest] = pj;
                self.ld.col_nnz[ppos] += 1;
            }
        }

        // forward solve for the new row through the pattern columns,
        // simultaneously accumulating the product against the rows below
        // ppos and growing column ppos with the fill each column carries
        for q in 0..patlen {
            let j = self.pattern[q];

            let mut nb = 0;
            for p in _offdiag_range(&self.ld, j) {
                let i = self.ld.rowval[p];
                if i > ppos {
                    self.colbuf[nb] = i;
                    nb += 1;
                }
            }
            _merge_rows_into_col(&mut self.ld, ppos, &self.colbuf[..nb], Some(&mut self.fwork));

            let xj = self.fwork[j];
            for p in _offdiag_range(&self.ld, j) {
                let i = self.ld.rowval[p];
                self.fwork[i] -= self.ld.nzval[p] * xj;
            }
        }

        // insert the new row of L, updating the diagonal pivot as we go
        for q in 0..patlen {
            let j = self.pattern[q];
            let d = self.ld.nzval[self.ld.colptr[j]];
            let l12 = self.fwork[j];
            self.fwork[j] = T::zero();
            diag -= l12 * l12 / d;

            let start = self.ld.colptr[j] + 1;
            let used = self.ld.col_nnz[j] - 1;
            let off = self.ld.rowval[start..start + used]
                .binary_search(&ppos)
                .unwrap_err();

            debug_assert!(used + 2 <= self.ld.col_capacity(j));
            for t in (off..used).rev() {
                self.ld.rowval[start + t + 1] = self.ld.rowval[start + t];
                self.ld.nzval[start + t + 1] = self.ld.nzval[start + t];
            }
            self.ld.rowval[start + off] = ppos;
            self.ld.nzval[start + off] = l12 / d;
            self.ld.col_nnz[j] += 1;

            // ppos becomes the parent of j if it leads its subdiagonal
            if off == 0 {
                self.etree[j] = ppos;
            }
        }

        // write column ppos of L and its diagonal
        let start = self.ld.colptr[ppos];
        let used = self.ld.col_nnz[ppos];
        debug_assert!(diag != T::zero());
        self.ld.nzval[start] = diag;
        for p in (start + 1)..(start + used) {
            let i = self.ld.rowval[p];
            self.ld.nzval[p] = self.fwork[i] / diag;
        }
        self.etree[ppos] = if used > 1 {
            self.ld.rowval[start + 1]
        } else {
            NONE
        };

        // trailing submatrix correction with the newly written column
        let wlen = used - 1;
        if wlen > 0 {
            for (t, p) in ((start + 1)..(start + used)).enumerate() {
                let i = self.ld.rowval[p];
                self.wpat[t] = i;
                self.fwork[i] = self.ld.nzval[p];
            }
            self._rank1_inner(wlen, -diag);
        }
    }

    /// Removes row and column `pos` from the factored matrix, leaving a
    /// trivial slot (unit diagonal, empty column) behind.
    pub fn delete_row(&mut self, pos: usize) {
        let ppos = self.perm_inv[pos];

        // remove row ppos from every earlier column
        for j in 0..ppos {
            let start = self.ld.colptr[j] + 1;
            let used = self.ld.col_nnz[j] - 1;
            if used == 0 {
                continue;
            }
            if let Ok(off) = self.ld.rowval[start..start + used].binary_search(&ppos) {
                for t in off..(used - 1) {
                    self.ld.rowval[start + t] = self.ld.rowval[start + t + 1];
                    self.ld.nzval[start + t] = self.ld.nzval[start + t + 1];
                }
                self.ld.col_nnz[j] -= 1;

                if self.etree[j] == ppos {
                    self.etree[j] = if used > 1 { self.ld.rowval[start] } else { NONE };
                }
            }
        }

        // neutralize the pivot, then push the deleted column back into
        // the trailing submatrix as a rank-1 correction
        let pstart = self.ld.colptr[ppos];
        let d_old = self.ld.nzval[pstart];
        self.ld.nzval[pstart] = T::one();

        let wlen = self.ld.col_nnz[ppos] - 1;
        for (t, p) in ((pstart + 1)..(pstart + 1 + wlen)).enumerate() {
            let i = self.ld.rowval[p];
            self.wpat[t] = i;
            self.fwork[i] = self.ld.nzval[p];
        }

        self.ld.col_nnz[ppos] = 1;
        self.etree[ppos] = NONE;

        if wlen > 0 {
            self._rank1_inner(wlen, d_old);
        }
    }

    // rank-1 modification in the permuted space.  Expects the sorted
    // index pattern in wpat[0..wlen] and the values scattered in fwork;
    // consumes both, leaving fwork zeroed.
    fn _rank1_inner(&mut self, mut wlen: usize, mut alpha: T) {
        while wlen > 0 {
            let j = self.wpat[0];

            // fill the pattern of the remaining direction into column j
            {
                let rest = &self.wpat[1..wlen];
                _merge_rows_into_col(&mut self.ld, j, rest, None);
            }

            let dstart = self.ld.colptr[j];
            let dj = self.ld.nzval[dstart];
            let wj = self.fwork[j];
            self.fwork[j] = T::zero();

            let dnew = dj + alpha * wj * wj;
            debug_assert!(dnew != T::zero());
            let gamma = alpha * wj / dnew;
            let alpha_next = alpha * dj / dnew;
            self.ld.nzval[dstart] = dnew;

            for p in _offdiag_range(&self.ld, j) {
                let i = self.ld.rowval[p];
                self.fwork[i] -= wj * self.ld.nzval[p];
                self.ld.nzval[p] += gamma * self.fwork[i];
            }

            // the merge may have changed the parent of j
            self.etree[j] = if self.ld.col_nnz[j] > 1 {
                self.ld.rowval[dstart + 1]
            } else {
                NONE
            };

            // the update continues through the subdiagonal of column j
            wlen = self.ld.col_nnz[j] - 1;
            let rng = _offdiag_range(&self.ld, j);
            self.wpat[..wlen].copy_from_slice(&self.ld.rowval[rng]);
            alpha = alpha_next;
        }
    }
}

#[inline]
fn _offdiag_range<T>(ld: &ElasticCsc<T>, j: usize) -> std::ops::Range<usize> {
    (ld.colptr[j] + 1)..(ld.colptr[j] + ld.col_nnz[j])
}

// Insert the sorted indices `extra` (all strictly below the diagonal of
// column j) into column j's sorted off-diagonal row list.  New entries
// take a zero value in L; if `fzero` is given, the dense workspace is
// also zeroed at the inserted indices.
fn _merge_rows_into_col<T: FloatT>(
    ld: &mut ElasticCsc<T>,
    j: usize,
    extra: &[usize],
    mut fzero: Option<&mut [T]>,
) {
    if extra.is_empty() {
        return;
    }

    let start = ld.colptr[j] + 1;
    let used = ld.col_nnz[j] - 1;

    // count the extras not already present
    let mut missing = 0;
    {
        let rows = &ld.rowval[start..start + used];
        let mut p = 0;
        for &e in extra {
            while p < rows.len() && rows[p] < e {
                p += 1;
            }
            if p == rows.len() || rows[p] != e {
                missing += 1;
            }
        }
    }
    if missing == 0 {
        return;
    }
    assert!(used + missing + 1 <= ld.col_capacity(j));

    // merge from the back so existing entries shift at most once
    let mut w = used + missing;
    let mut p = used;
    let mut q = extra.len();
    while q > 0 {
        let e = extra[q - 1];
        if p > 0 && ld.rowval[start + p - 1] > e {
            ld.rowval[start + w - 1] = ld.rowval[start + p - 1];
            ld.nzval[start + w - 1] = ld.nzval[start + p - 1];
            p -= 1;
            w -= 1;
        } else if p > 0 && ld.rowval[start + p - 1] == e {
            ld.rowval[start + w - 1] = ld.rowval[start + p - 1];
            ld.nzval[start + w - 1] = ld.nzval[start + p - 1];
            p -= 1;
            w -= 1;
            q -= 1;
        } else {
            ld.rowval[start + w - 1] = e;
            ld.nzval[start + w - 1] = T::zero();
            if let Some(f) = fzero.as_deref_mut() {
                f[e] = T::zero();
            }
            w -= 1;
            q -= 1;
        }
    }

    ld.col_nnz[j] += missing;
}

// Compute the elimination tree and per-column subdiagonal counts of an
// upper triangular pattern, using only the entries in use per column.
fn _etree<T: FloatT>(A: &ElasticCsc<T>, work: &mut [usize], Lnz: &mut [usize], etree: &mut [usize]) {
    work.fill(0);
    Lnz.fill(0);
    etree.fill(NONE);

    for j in 0..A.n {
        work[j] = j;
        for p in A.col_range(j) {
            let mut i = A.rowval[p];

            while work[i] != j {
                if etree[i] == NONE {
                    etree[i] = j;
                }
                Lnz[i] += 1; // nonzeros in this column
                work[i] = j;
                i = etree[i];
            }
        }
    }
}

// Up-looking numeric factorization into elastic storage.  For each row k
// we solve y = L(0:k-1,0:k-1) \ b with b the k-th column of A above the
// diagonal; y is then the k-th row of L, with the pivot folded into D.
#[allow(clippy::too_many_arguments)]
fn _factor<T: FloatT>(
    A: &ElasticCsc<T>,
    diag: &[T],
    L: &mut ElasticCsc<T>,
    etree: &[usize],
    dinv: &mut [T],
    bwork: &mut [bool],
    iwork: &mut [usize],
    fwork: &mut [T],
) {
    let n = A.n;

    // reset every column of L to just its diagonal slot
    for j in 0..n {
        L.col_nnz[j] = 1;
        L.rowval[L.colptr[j]] = j;
    }
    bwork.fill(false);
    fwork.fill(T::zero());

    let (y_idx, elim_buffer) = iwork.split_at_mut(n);
    let y_markers = bwork;
    let y_vals = fwork;

    for k in 0..n {
        let mut Dk = diag[k];

        // number of nonzeros in this row of L
        let mut nnz_y = 0;

        // scatter the column of A above the diagonal and find where the
        // nonzeros of row k of L will go, using the elimination tree
        for p in A.col_range(k) {
            let bidx = A.rowval[p];
            if bidx == k {
                Dk += A.nzval[p];
                continue;
            }

            y_vals[bidx] = A.nzval[p];

            if !y_markers[bidx] {
                y_markers[bidx] = true;
                elim_buffer[0] = bidx;
                let mut nnz_e = 1;

                let mut next_idx = etree[bidx];
                while next_idx != NONE && next_idx < k {
                    if y_markers[next_idx] {
                        break;
                    }
                    y_markers[next_idx] = true;
                    elim_buffer[nnz_e] = next_idx;
                    next_idx = etree[next_idx];
                    nnz_e += 1;
                }

                // drain the buffered path in reverse into the ordering
                while nnz_e != 0 {
                    nnz_e -= 1;
                    y_idx[nnz_y] = elim_buffer[nnz_e];
                    nnz_y += 1;
                }
            }
        }

        // eliminate, placing the values of row k of L column by column
        for i in (0..nnz_y).rev() {
            let cidx = y_idx[i];
            let yvals_cidx = y_vals[cidx];

            for p in _offdiag_range(L, cidx) {
                y_vals[L.rowval[p]] -= L.nzval[p] * yvals_cidx;
            }

            debug_assert!(L.col_nnz[cidx] < L.col_capacity(cidx));
            let dest = L.colptr[cidx] + L.col_nnz[cidx];
            let lki = yvals_cidx * dinv[cidx];
            L.rowval[dest] = k;
            L.nzval[dest] = lki;
            L.col_nnz[cidx] += 1;

            Dk -= yvals_cidx * lki;

            y_vals[cidx] = T::zero();
            y_markers[cidx] = false;
        }

        // K has controlled signature, so the pivot never vanishes
        debug_assert!(Dk != T::zero());
        L.nzval[L.colptr[k]] = Dk;
        dinv[k] = T::recip(Dk);
    }
}

// Solves (L+I)x = b in place
fn _lsolve<T: FloatT>(L: &ElasticCsc<T>, x: &mut [T]) {
    for i in 0..x.len() {
        let xi = x[i];
        if xi != T::zero() {
            for p in _offdiag_range(L, i) {
                x[L.rowval[p]] -= L.nzval[p] * xi;
            }
        }
    }
}

// Solves (L+I)'x = b in place
fn _ltsolve<T: FloatT>(L: &ElasticCsc<T>, x: &mut [T]) {
    for i in (0..x.len()).rev() {
        let mut s = T::zero();
        for p in _offdiag_range(L, i) {
            s += L.nzval[p] * x[L.rowval[p]];
        }
        x[i] -= s;
    }
}

// Permute the used entries of the upper triangular `src` into `dst` so
// that `dst = P src P'` stays upper triangular.  Column entries land
// unsorted, which the factorization tolerates.  With `full` set, the
// whole capacity span of every column participates.
fn _permute_symmetric<T: FloatT>(
    src: &ElasticCsc<T>,
    perm_inv: &[usize],
    dst: &mut ElasticCsc<T>,
    full: bool,
) {
    dst.col_nnz.fill(0);

    for j in 0..src.n {
        let rng = if full {
            src.colptr[j]..src.colptr[j + 1]
        } else {
            src.col_range(j)
        };
        let cj = perm_inv[j];
        for p in rng {
            let ci = perm_inv[src.rowval[p]];
            let col = usize::max(ci, cj);
            let row = usize::min(ci, cj);

            let dest = dst.colptr[col] + dst.col_nnz[col];
            dst.rowval[dest] = row;
            dst.nzval[dest] = src.nzval[p];
            dst.col_nnz[col] += 1;
        }
    }
}

// AMD fill reducing ordering of the maximal pattern
fn _get_amd_ordering(
    n: usize,
    colptr: &[usize],
    rowval: &[usize],
    amd_dense_scale: f64,
) -> (Vec<usize>, Vec<usize>) {
    let mut control = amd::Control::default();
    control.dense *= amd_dense_scale;
    let (perm, perm_inv, _info) = amd::order(n, colptr, rowval, &control).unwrap();
    (perm, perm_inv)
}

//configure tests of internals
#[path = "test.rs"]
#[cfg(test)]
mod test;
