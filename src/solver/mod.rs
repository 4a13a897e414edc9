//! The QP solver: problem data and equilibration, KKT system with
//! active-set bookkeeping, semi-smooth Newton inner loop, BCL proximal
//! outer loop, and the public [`QpSolver`] surface.

#![allow(non_snake_case)]

mod equilibration;
mod infbounds;
mod info;
mod inner;
mod kktsystem;
mod linesearch;
mod problemdata;
mod results;
mod settings;
mod solver;
mod workspace;

pub use equilibration::*;
pub use infbounds::*;
pub use info::*;
pub use results::*;
pub use settings::*;
pub use solver::*;

pub(crate) use kktsystem::*;
pub(crate) use problemdata::*;
pub(crate) use workspace::*;

use thiserror::Error;

/// Error type returned by model installation and update operations.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Model dimension fields are incompatible")]
    IncompatibleDimension,
    #[error("No model has been installed")]
    ModelNotSetup,
    #[error("Sparse input is malformed: {0}")]
    BadSparseFormat(#[from] crate::algebra::SparseFormatError),
    #[error("Symbolic factorization failed: {0}")]
    BadFactorization(#[from] crate::ldl::LdlError),
}
