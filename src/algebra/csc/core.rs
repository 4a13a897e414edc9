#![allow(non_snake_case)]

use crate::algebra::{Adjoint, FloatT, ShapedMatrix, SparseFormatError, Symmetric};

/// Sparse matrix in standard Compressed Sparse Column (CSC) format
///
/// __Example usage__ : To construct the 3 x 3 matrix
/// ```text
/// A = [1.  3.  5.]
///     [2.  0.  6.]
///     [0.  4.  7.]
/// ```
///
/// ```no_run
/// use proxal::algebra::CscMatrix;
///
/// let A : CscMatrix<f64> = CscMatrix::new(
///    3,                                // m
///    3,                                // n
///    vec![0, 2, 4, 7],                 // colptr
///    vec![0, 1, 0, 2, 0, 1, 2],        // rowval
///    vec![1., 2., 3., 4., 5., 6., 7.], // nzval
///  );
///
/// // optional correctness check
/// assert!(A.check_format().is_ok());
/// ```

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CscMatrix<T = f64> {
    /// number of rows
    pub m: usize,
    /// number of columns
    pub n: usize,
    /// CSC format column pointer.
    ///
    /// This field should have length `n+1`. The last entry corresponds
    /// to the number of nonzeros and should agree with the lengths
    /// of the `rowval` and `nzval` fields.
    pub colptr: Vec<usize>,
    /// vector of row indices
    pub rowval: Vec<usize>,
    /// vector of non-zero matrix elements
    pub nzval: Vec<T>,
}

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// `CscMatrix` constructor.
    ///
    /// # Panics
    /// Makes rudimentary dimensional compatibility checks and panics on
    /// failure.   This constructor does __not__ ensure that row indices
    /// are all in bounds or that data is arranged such that entries within
    /// each column appear in order of increasing row index.   Responsibility
    /// for ensuring these conditions hold is left to the caller; see also
    /// [`check_format`](CscMatrix::check_format).

    pub fn new(m: usize, n: usize, colptr: Vec<usize>, rowval: Vec<usize>, nzval: Vec<T>) -> Self {
        assert_eq!(rowval.len(), nzval.len());
        assert_eq!(colptr.len(), n + 1);
        assert_eq!(colptr[n], rowval.len());
        CscMatrix {
            m,
            n,
            colptr,
            rowval,
            nzval,
        }
    }

    /// allocate space for an m x n matrix with `nnz` structural entries
    pub fn spalloc(m: usize, n: usize, nnz: usize) -> Self {
        let mut colptr = vec![0; n + 1];
        let rowval = vec![0; nnz];
        let nzval = vec![T::zero(); nnz];
        colptr[n] = nnz;

        CscMatrix::new(m, n, colptr, rowval, nzval)
    }

    /// Identity matrix of size `n`
    pub fn identity(n: usize) -> Self {
        let colptr = (0usize..=n).collect();
        let rowval = (0usize..n).collect();
        let nzval = vec![T::one(); n];

        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    /// number of nonzeros
    pub fn nnz(&self) -> usize {
        self.colptr[self.n]
    }

    /// transpose view
    pub fn t(&self) -> Adjoint<'_, Self> {
        Adjoint { src: self }
    }

    /// symmetric view.  The matrix must be upper triangular.
    pub fn sym(&self) -> Symmetric<'_, Self> {
        debug_assert!(self.is_triu());
        Symmetric { src: self }
    }

    /// Check that matrix data is correctly formatted.
    pub fn check_format(&self) -> Result<(), SparseFormatError> {
        if self.rowval.len() != self.nzval.len() {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        if self.colptr.is_empty()
            || (self.colptr.len() - 1) != self.n
            || self.colptr[self.n] != self.rowval.len()
        {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        // colptr monotonicity
        if self.colptr.windows(2).any(|c| c[0] > c[1]) {
            return Err(SparseFormatError::BadColptr);
        }

        // rowval monotonicity within each column
        for col in 0..self.n {
            let rng = self.colptr[col]..self.colptr[col + 1];
            if self.rowval[rng].windows(2).any(|c| c[0] >= c[1]) {
                return Err(SparseFormatError::BadRowOrdering);
            }
        }

        // row values out of bounds
        if !self.rowval.iter().all(|r| r < &self.m) {
            return Err(SparseFormatError::BadRowval);
        }

        Ok(())
    }

    /// Check that `other` has exactly the same size and sparsity pattern.
    pub fn check_equal_sparsity(&self, other: &Self) -> Result<(), SparseFormatError> {
        if self.size() != other.size()
            || self.colptr != other.colptr
            || self.rowval != other.rowval
        {
            return Err(SparseFormatError::PatternMismatch);
        }
        Ok(())
    }

    /// Allocates a new matrix containing only entries from the upper triangular part
    pub fn to_triu(&self) -> Self {
        assert_eq!(self.m, self.n);
        let (m, n) = (self.m, self.n);
        let mut colptr = vec![0; n + 1];
        let mut nnz = 0;

        // count the number of entries in the upper triangle
        // and place the totals into colptr

        for col in 0..n {
            let first = self.colptr[col];
            let last = self.colptr[col + 1];
            let rows = &self.rowval[first..last];

            // number of entries on or above the diagonal in this column,
            // shifted by 1 (i.e. colptr keeps a 0 in the first column)
            colptr[col + 1] = rows.iter().filter(|&row| *row <= col).count();
            nnz += colptr[col + 1];
        }

        // copy the upper triangle entries of each column into the new
        // value vector.  Assumes entries within each column appear with
        // monotonically increasing row numbers.
        let mut rowval = vec![0; nnz];
        let mut nzval = vec![T::zero(); nnz];

        for col in 0..n {
            let ntriu = colptr[col + 1];

            let fdest = colptr[col];
            let ldest = fdest + ntriu;

            let fsrc = self.colptr[col];
            let lsrc = fsrc + ntriu;

            rowval[fdest..ldest].copy_from_slice(&self.rowval[fsrc..lsrc]);
            nzval[fdest..ldest].copy_from_slice(&self.nzval[fsrc..lsrc]);

            // this is now the cumsum of the counts
            colptr[col + 1] = ldest;
        }
        CscMatrix::new(m, n, colptr, rowval, nzval)
    }

    /// True if the matrix is upper triangular
    pub fn is_triu(&self) -> bool {
        // check the lower triangle for structural entries, regardless
        // of the values that may be assigned to them
        for col in 0..self.ncols() {
            let first = self.colptr[col];
            let last = self.colptr[col + 1];
            let rows = &self.rowval[first..last];

            if rows.iter().any(|&row| row > col) {
                return false;
            }
        }
        true
    }

    /// Returns the value at the given (row,col) index as an Option.
    /// Returns None if the given index is not a structural nonzero.
    ///
    /// # Panics
    /// Panics if the given index is out of bounds.
    pub fn get_entry(&self, idx: (usize, usize)) -> Option<T> {
        let (row, col) = idx;
        assert!(row < self.nrows() && col < self.ncols());

        let first = self.colptr[col];
        let last = self.colptr[col + 1];
        let rows_in_this_column = &self.rowval[first..last];
        match rows_in_this_column.binary_search(&row) {
            Ok(idx) => Some(self.nzval[first + idx]),
            Err(_) => None,
        }
    }
}

impl<T> ShapedMatrix for CscMatrix<T> {
    fn nrows(&self) -> usize {
        self.m
    }
    fn ncols(&self) -> usize {
        self.n
    }
}

#[test]
fn test_csc_get_entry() {
    // A =
    //[ ⋅   4.0    ⋅ ]
    //[1.0  5.0    ⋅ ]
    //[ ⋅   6.0  7.0 ]

    let A = CscMatrix::new(
        3,
        3,
        vec![0, 1, 4, 5],
        vec![1, 0, 1, 2, 2],
        vec![1., 4., 5., 6., 7.],
    );

    assert_eq!(A.get_entry((1, 0)).unwrap(), 1.);
    assert_eq!(A.get_entry((0, 1)).unwrap(), 4.);
    assert_eq!(A.get_entry((2, 2)).unwrap(), 7.);
    assert!(A.get_entry((0, 0)).is_none());
    assert!(A.get_entry((2, 0)).is_none());
    assert!(A.get_entry((0, 2)).is_none());
}

#[test]
fn test_csc_to_triu() {
    let A = CscMatrix::from(&[[1., 2.], [2., 3.]]);
    let B = A.to_triu();
    assert!(B.is_triu());
    assert_eq!(B.nnz(), 3);
    assert_eq!(B.get_entry((0, 1)).unwrap(), 2.);
}
