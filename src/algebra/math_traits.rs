/// Dimension and shape queries common to all matrix types.
pub trait ShapedMatrix {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    fn size(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
    fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }
}

/// Adjoint (transpose) view of a matrix.
pub struct Adjoint<'a, M> {
    pub src: &'a M,
}

/// Symmetric view of a matrix held as its upper triangle.
pub struct Symmetric<'a, M> {
    pub src: &'a M,
}

/// Elementwise and reduction operations on dense slices.
pub trait VectorMath {
    type T;

    /// copy from `src`, which must have the same length
    fn copy_from(&mut self, src: &Self) -> &mut Self;

    /// apply `op` to every element in place
    fn scalarop(&mut self, op: impl Fn(Self::T) -> Self::T) -> &mut Self;

    /// elementwise set `self[i] = op(v[i])`
    fn scalarop_from(&mut self, op: impl Fn(Self::T) -> Self::T, v: &Self) -> &mut Self;

    fn set(&mut self, c: Self::T) -> &mut Self;

    fn scale(&mut self, c: Self::T) -> &mut Self;

    fn negate(&mut self) -> &mut Self;

    /// elementwise product `self[i] *= y[i]`
    fn hadamard(&mut self, y: &Self) -> &mut Self;

    fn dot(&self, y: &Self) -> Self::T;

    /// sum of squares, i.e. `self.dot(self)`
    fn sumsq(&self) -> Self::T;

    fn mean(&self) -> Self::T;

    fn norm_inf(&self) -> Self::T;

    /// maximum absolute elementwise difference
    fn norm_inf_diff(&self, b: &Self) -> Self::T;

    fn is_finite(&self) -> bool;

    /// `self = a*x + b*self`
    fn axpby(&mut self, a: Self::T, x: &Self, b: Self::T) -> &mut Self;
}

/// Scalar-mutating and norm operations on sparse matrices.
pub trait MatrixMath {
    type T;

    fn scale(&mut self, c: Self::T);

    /// column-wise infinity norms
    fn col_norms(&self, norms: &mut [Self::T]);
    fn col_norms_no_reset(&self, norms: &mut [Self::T]);

    /// row norms of a symmetric matrix stored as its upper triangle.
    /// Each stored entry is visited once, updating both the column
    /// and the mirrored row.
    fn col_norms_sym(&self, norms: &mut [Self::T]);
    fn col_norms_sym_no_reset(&self, norms: &mut [Self::T]);

    /// row-wise infinity norms
    fn row_norms(&self, norms: &mut [Self::T]);
    fn row_norms_no_reset(&self, norms: &mut [Self::T]);

    /// two sided diagonal scaling, `self = diag(l)*self*diag(r)`
    fn lrscale(&mut self, l: &[Self::T], r: &[Self::T]);

    /// `y'*self*x`, with `self` in upper triangular form
    fn quad_form(&self, y: &[Self::T], x: &[Self::T]) -> Self::T;
}

/// `y = a*self*x + b*y`
pub trait MatrixVectorMultiply {
    type T;
    fn gemv(&self, y: &mut [Self::T], x: &[Self::T], a: Self::T, b: Self::T);
}

/// `y = a*self*x + b*y` for a symmetric matrix view
pub trait SymMatrixVectorMultiply {
    type T;
    fn symv(&self, y: &mut [Self::T], x: &[Self::T], a: Self::T, b: Self::T);
}
