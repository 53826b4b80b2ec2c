//! Runtime-domain modules: the boundary contract and an in-process runtime.

pub mod boundary;
pub mod local;

pub use boundary::*;
pub use local::*;
