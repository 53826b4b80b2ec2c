//! # streamfuse Core
//!
//! Client-side graph composition for micro-batch streams.
//!
//! A chain of per-batch transformations `(time, batch) -> batch` is fused into
//! one composite function while the graph is built, and each node is
//! materialized lazily: on first use its function is serialized once and handed
//! to the runtime in exchange for a runtime handle.
//!
//! - [`types`] — [`RuntimeHandle`](types::RuntimeHandle),
//!   [`SerializationMode`](types::SerializationMode), ids and batch time.
//! - [`function`] — [`BatchStep`](function::BatchStep),
//!   [`TransformFn`](function::TransformFn) and its serializable
//!   [`FunctionPlan`](function::FunctionPlan).
//! - [`graph`] — [`StreamNode`](graph::StreamNode), the fusion composer and
//!   materialization.
//! - [`runtime`] — the [`RuntimeBoundary`](runtime::RuntimeBoundary) contract and
//!   [`LocalRuntime`](runtime::LocalRuntime).

pub mod config;
pub mod context;
pub mod error;
pub mod function;
pub mod graph;
pub mod runtime;
pub mod types;

pub use config::StreamingConfig;
pub use context::StreamingContext;
pub use error::{CaptureError, FuseError, FuseResult, PlanError, RuntimeError};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
