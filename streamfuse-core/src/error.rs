//! Error types for graph construction, closure capture and the runtime boundary.
//!
//! Building a graph never fails. Everything here surfaces when a node is
//! materialized, or on the runtime side when a function plan is decoded.

use thiserror::Error;

use crate::types::{NodeId, RuntimeHandle};

/// A transformation step could not be captured into a self-contained encoding.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("step `{udf_id}` closes over state that cannot leave this process")]
    NotCapturable { udf_id: String },

    #[error("failed to encode state of step `{udf_id}`: {source}")]
    Encode {
        udf_id: String,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to encode function plan: {0}")]
    Plan(#[source] bincode::Error),
}

/// A serialized function plan could not be turned back into a function.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("malformed function plan: {0}")]
    Malformed(#[from] bincode::Error),

    #[error("function plan has no steps")]
    Empty,

    #[error("step references unknown udf_id: {0}")]
    UnknownUdf(String),

    #[error("failed to decode config of step `{udf_id}`: {source}")]
    Config {
        udf_id: String,
        #[source]
        source: bincode::Error,
    },
}

/// Errors reported by a runtime boundary implementation.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("runtime rejected request: {0}")]
    Rejected(String),

    #[error("unknown runtime handle {0}")]
    UnknownHandle(RuntimeHandle),

    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Errors surfaced when a stream node is materialized.
#[derive(Error, Debug)]
pub enum FuseError {
    #[error("node {node} holds a non-serializable function (depth {depth}): {source}")]
    NonSerializableClosure {
        node: NodeId,
        depth: usize,
        #[source]
        source: CaptureError,
    },

    #[error("runtime handshake failed for node {node}: {source}")]
    RuntimeHandshakeFailure {
        node: NodeId,
        #[source]
        source: RuntimeError,
    },
}

impl FuseError {
    /// Node whose materialization failed.
    pub fn node(&self) -> NodeId {
        match self {
            FuseError::NonSerializableClosure { node, .. }
            | FuseError::RuntimeHandshakeFailure { node, .. } => *node,
        }
    }
}

pub type FuseResult<T> = std::result::Result<T, FuseError>;
