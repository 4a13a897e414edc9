use super::Info;
use crate::algebra::*;

/// Solution iterates and statistics of the most recent solve.
#[derive(Debug, Clone)]
pub struct Results<T = f64> {
    /// primal solution
    pub x: Vec<T>,
    /// equality multipliers
    pub y: Vec<T>,
    /// inequality multipliers
    pub z: Vec<T>,
    /// inequality constraints held active at termination
    pub active_constraints: Vec<bool>,
    /// solver statistics
    pub info: Info<T>,
}

impl<T> Results<T>
where
    T: FloatT,
{
    pub(crate) fn new(n: usize, m_eq: usize, m_in: usize) -> Self {
        Self {
            x: vec![T::zero(); n],
            y: vec![T::zero(); m_eq],
            z: vec![T::zero(); m_in],
            active_constraints: vec![false; m_in],
            info: Info::new(),
        }
    }
}
