#![allow(non_snake_case)]

use crate::algebra::{FloatT, ShapedMatrix, VectorMath};
use std::iter::zip;
use std::ops::Range;

/// Sparse CSC storage whose columns may use less than their allocated
/// capacity.
///
/// `colptr` fixes each column's storage span once at allocation and never
/// changes; `col_nnz` says how many leading entries of the span are in
/// use.  Columns can therefore grow and shrink in place, which is what
/// the KKT matrix needs when inequality constraints toggle between active
/// and inactive, and what the LDL' factors need under row insertion,
/// deletion and rank-1 modification.

#[derive(Debug, Clone)]
pub struct ElasticCsc<T = f64> {
    /// number of rows
    pub m: usize,
    /// number of columns
    pub n: usize,
    /// column capacity boundaries, length `n+1`, fixed after allocation
    pub colptr: Vec<usize>,
    /// entries in use at the head of each column's span
    pub col_nnz: Vec<usize>,
    /// row indices, length `colptr[n]`
    pub rowval: Vec<usize>,
    /// values, length `colptr[n]`
    pub nzval: Vec<T>,
}

impl<T> ElasticCsc<T>
where
    T: FloatT,
{
    /// Allocate an m x n matrix whose column `j` owns `caps[j]` entries,
    /// all initially unused.
    pub fn with_capacities(m: usize, n: usize, caps: &[usize]) -> Self {
        assert_eq!(caps.len(), n);

        let mut colptr = vec![0; n + 1];
        for (p, &c) in zip(&mut colptr[1..], caps) {
            *p = c;
        }
        let mut acc = 0;
        for p in colptr.iter_mut() {
            acc += *p;
            *p = acc;
        }

        let nnz_max = colptr[n];
        Self {
            m,
            n,
            colptr,
            col_nnz: vec![0; n],
            rowval: vec![0; nnz_max],
            nzval: vec![T::zero(); nnz_max],
        }
    }

    /// total entries in use
    pub fn nnz(&self) -> usize {
        self.col_nnz.iter().sum()
    }

    /// total allocated entries
    pub fn capacity(&self) -> usize {
        self.colptr[self.n]
    }

    #[inline]
    pub fn col_capacity(&self, j: usize) -> usize {
        self.colptr[j + 1] - self.colptr[j]
    }

    /// span of the entries in use in column `j`
    #[inline]
    pub fn col_range(&self, j: usize) -> Range<usize> {
        let first = self.colptr[j];
        first..(first + self.col_nnz[j])
    }

    pub fn col_rows(&self, j: usize) -> &[usize] {
        &self.rowval[self.col_range(j)]
    }

    pub fn col_values(&self, j: usize) -> &[T] {
        &self.nzval[self.col_range(j)]
    }

    /// append an entry to column `j`
    ///
    /// # Panics
    /// Panics if the column is already at capacity.
    pub fn push_in_col(&mut self, j: usize, row: usize, val: T) {
        let nnz = self.col_nnz[j];
        assert!(nnz < self.col_capacity(j));

        let dest = self.colptr[j] + nnz;
        self.rowval[dest] = row;
        self.nzval[dest] = val;
        self.col_nnz[j] = nnz + 1;
    }

    pub fn clear_col(&mut self, j: usize) {
        self.col_nnz[j] = 0;
    }

    /// `y = a*M*x + b*y`, treating the entries in use as the upper
    /// triangle of a symmetric matrix.
    pub fn symv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        assert!(x.len() == self.n);
        assert!(y.len() == self.n);
        assert!(self.n == self.m);

        y.scale(b);

        for (col, &xcol) in x.iter().enumerate() {
            for p in self.col_range(col) {
                let row = self.rowval[p];
                let Mij = self.nzval[p];
                y[row] += a * Mij * xcol;

                if row != col {
                    //don't double up on the diagonal
                    y[col] += a * Mij * x[row];
                }
            }
        }
    }
}

impl<T> ShapedMatrix for ElasticCsc<T> {
    fn nrows(&self) -> usize {
        self.m
    }
    fn ncols(&self) -> usize {
        self.n
    }
}

#[test]
fn test_elastic_push_and_clear() {
    let mut M = ElasticCsc::<f64>::with_capacities(3, 3, &[2, 1, 3]);
    assert_eq!(M.capacity(), 6);
    assert_eq!(M.nnz(), 0);

    M.push_in_col(0, 0, 1.);
    M.push_in_col(0, 2, 2.);
    M.push_in_col(2, 2, 3.);
    assert_eq!(M.nnz(), 3);
    assert_eq!(M.col_rows(0), &[0, 2]);

    M.clear_col(0);
    assert_eq!(M.nnz(), 1);
    assert_eq!(M.col_values(2), &[3.]);
}

#[test]
#[should_panic]
fn test_elastic_capacity_overflow() {
    let mut M = ElasticCsc::<f64>::with_capacities(2, 2, &[1, 1]);
    M.push_in_col(0, 0, 1.);
    M.push_in_col(0, 1, 1.);
}

#[test]
fn test_elastic_symv() {
    // M = [1 2; 2 4] stored as its upper triangle, with slack capacity
    let mut M = ElasticCsc::<f64>::with_capacities(2, 2, &[2, 3]);
    M.push_in_col(0, 0, 1.);
    M.push_in_col(1, 0, 2.);
    M.push_in_col(1, 1, 4.);

    let mut y = vec![1., -1.];
    M.symv(&mut y, &[1., 1.], 1., 2.);
    assert_eq!(y, vec![5., 4.]);
}
