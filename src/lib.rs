//! # proxal
//!
//! Proximal augmented-Lagrangian solver for convex quadratic programs
//! with linear equality and two-sided inequality constraints,
//!
//! ```text
//! minimize    ½ x'Hx + g'x
//! subject to  Ax = b,  l ≤ Cx ≤ u
//! ```
//!
//! with H symmetric positive semidefinite and all matrices sparse.  The
//! solver runs a BCL-style proximal outer loop around a primal-dual
//! semi-smooth Newton inner loop, maintaining an LDL' factorization of the
//! KKT system incrementally as inequality constraints activate and
//! deactivate.
//!
//! The main entry point is [`QpSolver`](crate::solver::QpSolver).

pub mod algebra;
pub mod ldl;
pub mod solver;
pub mod timers;
