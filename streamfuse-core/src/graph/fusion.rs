//! Fusion of consecutive per-batch transformations.
//!
//! Runs when a transformed node is constructed. If the predecessor is itself
//! a transformed node that is neither cached nor checkpointed, the new step is
//! composed onto the predecessor's function and the new node depends on the
//! predecessor's upstream. Otherwise the predecessor stays a real stage and
//! becomes the upstream.
//!
//! Only the immediate predecessor's marks are consulted.

use std::sync::Arc;

use crate::function::{BatchStep, TransformFn};
use crate::graph::node::{NodeKind, StreamNode};
use crate::types::SerializationMode;

/// Outcome of the eligibility check. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionDecision {
    /// The predecessor's function was absorbed.
    Fused,
    /// The predecessor is a materialization boundary.
    Ineligible(IneligibleReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    /// Predecessor is an input or another non-transform operation.
    NotTransformed,
    Cached,
    Checkpointed,
}

/// What the new node stores.
pub struct Composition<B> {
    pub function: Arc<TransformFn<B>>,
    pub upstream: Arc<StreamNode<B>>,
    pub upstream_mode: SerializationMode,
    pub decision: FusionDecision,
}

/// Whether a step derived from `prev` may be fused with it.
pub fn fusion_decision<B: 'static>(prev: &StreamNode<B>) -> FusionDecision {
    match prev.kind() {
        NodeKind::Transformed(_) if prev.is_cached() => {
            FusionDecision::Ineligible(IneligibleReason::Cached)
        }
        NodeKind::Transformed(_) if prev.is_checkpointed() => {
            FusionDecision::Ineligible(IneligibleReason::Checkpointed)
        }
        NodeKind::Transformed(_) => FusionDecision::Fused,
        NodeKind::Materialized { .. } | NodeKind::Other(_) => {
            FusionDecision::Ineligible(IneligibleReason::NotTransformed)
        }
    }
}

/// Decide the function and upstream for a node applying `step` after `prev`.
///
/// Pure: builds in-memory values only.
pub fn compose<B: 'static>(
    step: Arc<dyn BatchStep<B>>,
    prev: &Arc<StreamNode<B>>,
) -> Composition<B> {
    let decision = fusion_decision(prev);
    match prev.kind() {
        NodeKind::Transformed(t) if decision == FusionDecision::Fused => Composition {
            function: Arc::new(TransformFn::fuse(Arc::clone(&t.function), step)),
            upstream: Arc::clone(&t.upstream),
            upstream_mode: t.upstream_mode,
            decision,
        },
        _ => Composition {
            function: Arc::new(TransformFn::single(step)),
            upstream: Arc::clone(prev),
            upstream_mode: prev.output_mode(),
            decision,
        },
    }
}

#[cfg(test)]
#[path = "tests/fusion_tests.rs"]
mod tests;
