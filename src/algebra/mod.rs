//! Linear algebra substrate: dense slice operations, standard CSC sparse
//! matrices, and CSC storage with elastic columns.

#![allow(non_snake_case)]

mod csc;
mod elastic;
mod error_types;
mod floats;
mod math_traits;
mod vecmath;

pub use csc::*;
pub use elastic::*;
pub use error_types::*;
pub use floats::*;
pub use math_traits::*;
