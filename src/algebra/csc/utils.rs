use crate::algebra::{CscMatrix, FloatT};

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// Allocating transpose.
    pub fn transpose(&self) -> Self {
        let (m, n) = (self.m, self.n);
        let mut out = CscMatrix::spalloc(n, m, self.nnz());

        // count entries in each row, accumulated into the new colptr
        out.colptr.fill(0);
        for &row in self.rowval.iter() {
            out.colptr[row + 1] += 1;
        }
        let mut acc = 0;
        for p in out.colptr.iter_mut() {
            acc += *p;
            *p = acc;
        }

        // scatter, tracking the next free slot in each destination column
        let mut next = out.colptr[0..m].to_vec();
        for col in 0..n {
            for p in self.colptr[col]..self.colptr[col + 1] {
                let row = self.rowval[p];
                let dest = next[row];
                out.rowval[dest] = col;
                out.nzval[dest] = self.nzval[p];
                next[row] += 1;
            }
        }
        out
    }
}

/// Construct from a dense row-major array of arrays, dropping zeros.
/// Intended for small fixture matrices in examples and tests.
impl<T, const R: usize, const C: usize> From<&[[T; C]; R]> for CscMatrix<T>
where
    T: FloatT,
{
    fn from(rows: &[[T; C]; R]) -> Self {
        let mut colptr = Vec::with_capacity(C + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();

        colptr.push(0);
        for j in 0..C {
            for (i, row) in rows.iter().enumerate() {
                if row[j] != T::zero() {
                    rowval.push(i);
                    nzval.push(row[j]);
                }
            }
            colptr.push(rowval.len());
        }

        CscMatrix::new(R, C, colptr, rowval, nzval)
    }
}

#[test]
fn test_transpose() {
    let A = CscMatrix::from(&[[1., 2., 0.], [0., 3., 4.]]);
    let At = A.transpose();
    assert_eq!(At.size(), (3, 2));
    assert_eq!(At.get_entry((1, 0)).unwrap(), 2.);
    assert_eq!(At.get_entry((2, 1)).unwrap(), 4.);
    assert!(At.get_entry((0, 1)).is_none());
    assert!(At.check_format().is_ok());

    use crate::algebra::ShapedMatrix;
    assert_eq!(At.transpose().size(), A.size());
}
