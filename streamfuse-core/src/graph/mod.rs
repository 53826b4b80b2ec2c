//! Graph-domain modules: stream nodes, fusion of transformations, and lazy
//! materialization against the runtime.

pub mod fusion;
pub mod materialize;
pub mod node;

pub use fusion::*;
pub use materialize::MaterializationState;
pub use node::*;
