use num_traits::{Float, FloatConst, FromPrimitive, NumAssign};

/// Scalar type over which all solver arithmetic is defined.
///
/// Implementations are provided for `f32` and `f64`.  The solver is
/// generic in its scalar, so any other type satisfying these bounds
/// will also work.

pub trait FloatT:
    'static
    + Float
    + FloatConst
    + NumAssign
    + Default
    + FromPrimitive
    + std::fmt::Display
    + std::fmt::LowerExp
    + std::fmt::Debug
{
}
impl FloatT for f32 {}
impl FloatT for f64 {}

/// Conversion of numeric literals to [`FloatT`] values.
///
/// Lets defaults and internal constants be written `(0.1).as_T()`
/// rather than `T::from_f64(0.1).unwrap()`.

#[allow(non_snake_case)]
pub trait AsFloatT<T>: 'static {
    fn as_T(&self) -> T;
}

macro_rules! impl_as_T {
    ($ty:ty, $ident:ident) => {
        impl<T> AsFloatT<T> for $ty
        where
            T: FromPrimitive + 'static,
        {
            #[inline]
            fn as_T(&self) -> T {
                T::$ident(*self).unwrap()
            }
        }
    };
}
impl_as_T!(u32, from_u32);
impl_as_T!(usize, from_usize);
impl_as_T!(f32, from_f32);
impl_as_T!(f64, from_f64);
