use super::{FloatT, VectorMath};
use std::iter::zip;

impl<T: FloatT> VectorMath for [T] {
    type T = T;

    fn copy_from(&mut self, src: &[T]) -> &mut Self {
        self.copy_from_slice(src);
        self
    }

    fn scalarop(&mut self, op: impl Fn(T) -> T) -> &mut Self {
        for x in &mut *self {
            *x = op(*x);
        }
        self
    }

    fn scalarop_from(&mut self, op: impl Fn(T) -> T, v: &[T]) -> &mut Self {
        for (x, v) in zip(&mut *self, v) {
            *x = op(*v);
        }
        self
    }

    fn set(&mut self, c: T) -> &mut Self {
        self.scalarop(|_x| c)
    }

    fn scale(&mut self, c: T) -> &mut Self {
        self.scalarop(|x| x * c)
    }

    fn negate(&mut self) -> &mut Self {
        self.scalarop(|x| -x)
    }

    fn hadamard(&mut self, y: &[T]) -> &mut Self {
        zip(&mut *self, y).for_each(|(x, y)| *x *= *y);
        self
    }

    fn dot(&self, y: &[T]) -> T {
        assert_eq!(self.len(), y.len());
        zip(self, y).fold(T::zero(), |acc, (&x, &y)| acc + x * y)
    }

    fn sumsq(&self) -> T {
        self.dot(self)
    }

    fn mean(&self) -> T {
        if self.is_empty() {
            T::zero()
        } else {
            let num = self.iter().fold(T::zero(), |acc, &x| acc + x);
            let den = T::from_usize(self.len()).unwrap();
            num / den
        }
    }

    fn norm_inf(&self) -> T {
        let mut out = T::zero();
        for v in self.iter().map(|v| v.abs()) {
            if v.is_nan() {
                return T::nan();
            }
            out = if v > out { v } else { out };
        }
        out
    }

    fn norm_inf_diff(&self, b: &[T]) -> T {
        zip(self, b).fold(T::zero(), |acc, (x, y)| T::max(acc, T::abs(*x - *y)))
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|&x| T::is_finite(x))
    }

    fn axpby(&mut self, a: T, x: &[T], b: T) -> &mut Self {
        assert_eq!(self.len(), x.len());
        zip(&mut *self, x).for_each(|(y, x)| *y = a * (*x) + b * (*y));
        self
    }
}

#[test]
fn test_dot_and_sumsq() {
    let x = vec![1., 2., 3., 4.];
    let y = vec![4., 5., 6., 7.];
    assert_eq!(x.dot(&y), 60.);
    assert_eq!(x.sumsq(), 30.);
}

#[test]
fn test_norm_inf() {
    let x = vec![1., -7., 3.];
    assert_eq!(x.norm_inf(), 7.);
    assert_eq!([0f64; 0].norm_inf(), 0.);
    assert!([1., f64::NAN].norm_inf().is_nan());
}

#[test]
fn test_axpby() {
    let mut y = vec![1., 1., 1.];
    let x = vec![1., 2., 3.];
    y.axpby(2., &x, -1.);
    assert_eq!(y, vec![1., 3., 5.]);
}
