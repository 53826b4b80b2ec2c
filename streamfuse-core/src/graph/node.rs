use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::context::StreamingContext;
use crate::error::{FuseError, FuseResult};
use crate::function::{BatchStep, TransformFn};
use crate::graph::fusion::{self, FusionDecision};
use crate::graph::materialize::{HandleCell, MaterializationState};
use crate::types::{NodeId, RuntimeHandle, SerializationMode, StorageLevel};

/// A vertex of the logical dataflow graph: the stream as of one step.
///
/// Nodes are immutable after construction apart from the write-once runtime
/// handle and the cache/checkpoint marks.
pub struct StreamNode<B> {
    id: NodeId,
    context: Arc<StreamingContext>,
    output_mode: SerializationMode,
    marks: BoundaryMarks,
    pub(crate) handle: HandleCell,
    kind: NodeKind<B>,
}

/// What a node is, and the data needed to materialize it.
pub enum NodeKind<B> {
    /// A stream the runtime created on its own, e.g. an input source.
    Materialized { handle: RuntimeHandle },
    /// A per-batch transformation, possibly fused with its predecessors.
    Transformed(TransformedNode<B>),
    /// Any other operation. Never fusable.
    Other(OtherNode<B>),
}

pub struct TransformedNode<B> {
    pub(crate) function: Arc<TransformFn<B>>,
    pub(crate) upstream: Arc<StreamNode<B>>,
    pub(crate) upstream_mode: SerializationMode,
    pub(crate) decision: FusionDecision,
}

impl<B: 'static> TransformedNode<B> {
    /// The effective function: this node's step, plus every fused predecessor step.
    pub fn function(&self) -> &Arc<TransformFn<B>> {
        &self.function
    }

    /// Nearest ancestor that was not fused away.
    pub fn upstream(&self) -> &Arc<StreamNode<B>> {
        &self.upstream
    }

    /// Declared output mode of [`upstream`](Self::upstream).
    pub fn upstream_mode(&self) -> SerializationMode {
        self.upstream_mode
    }

    pub fn decision(&self) -> FusionDecision {
        self.decision
    }

    pub fn is_fused(&self) -> bool {
        self.decision == FusionDecision::Fused
    }
}

pub enum OtherNode<B> {
    Union {
        inputs: Vec<Arc<StreamNode<B>>>,
    },
    Window {
        upstream: Arc<StreamNode<B>>,
        window: Duration,
        slide: Option<Duration>,
    },
}

/// Cache/checkpoint marks. The first mark of each kind wins.
#[derive(Debug, Default)]
struct BoundaryMarks {
    cached: OnceLock<StorageLevel>,
    checkpoint_interval: OnceLock<Duration>,
}

impl<B: 'static> StreamNode<B> {
    fn build(
        context: &Arc<StreamingContext>,
        output_mode: SerializationMode,
        handle: HandleCell,
        kind: NodeKind<B>,
    ) -> Self {
        Self {
            id: context.next_node_id(),
            context: Arc::clone(context),
            output_mode,
            marks: BoundaryMarks::default(),
            handle,
            kind,
        }
    }

    /// A node for a stream the runtime already created.
    pub fn input(
        context: &Arc<StreamingContext>,
        handle: RuntimeHandle,
        output_mode: SerializationMode,
    ) -> Arc<Self> {
        Arc::new(Self::build(
            context,
            output_mode,
            HandleCell::materialized(handle),
            NodeKind::Materialized { handle },
        ))
    }

    /// Derive a node that applies `step` to every batch of `prev`.
    ///
    /// Output mode comes from the context's config.
    pub fn transformed(prev: &Arc<Self>, step: Arc<dyn BatchStep<B>>) -> Arc<Self> {
        let mode = prev.context.config().transform_output_mode;
        Self::transformed_with_mode(prev, step, mode)
    }

    /// Like [`transformed`](Self::transformed) with an explicit output mode.
    pub fn transformed_with_mode(
        prev: &Arc<Self>,
        step: Arc<dyn BatchStep<B>>,
        output_mode: SerializationMode,
    ) -> Arc<Self> {
        let composed = fusion::compose(step, prev);
        let node = Self::build(
            &prev.context,
            output_mode,
            HandleCell::new(),
            NodeKind::Transformed(TransformedNode {
                function: composed.function,
                upstream: composed.upstream,
                upstream_mode: composed.upstream_mode,
                decision: composed.decision,
            }),
        );
        if let NodeKind::Transformed(t) = &node.kind {
            tracing::debug!(
                "node {} derived from node {}: {:?}, depth {}, upstream node {}",
                node.id,
                prev.id,
                t.decision,
                t.function.depth(),
                t.upstream.id
            );
        }
        Arc::new(node)
    }

    /// Union of `first` and `others`, batch by batch.
    pub fn union(first: &Arc<Self>, others: &[Arc<Self>]) -> Arc<Self> {
        let mut inputs = Vec::with_capacity(others.len() + 1);
        inputs.push(Arc::clone(first));
        inputs.extend(others.iter().cloned());
        Arc::new(Self::build(
            &first.context,
            first.output_mode,
            HandleCell::new(),
            NodeKind::Other(OtherNode::Union { inputs }),
        ))
    }

    /// Sliding window of length `window` over `prev`.
    pub fn window(prev: &Arc<Self>, window: Duration, slide: Option<Duration>) -> Arc<Self> {
        Arc::new(Self::build(
            &prev.context,
            prev.output_mode,
            HandleCell::new(),
            NodeKind::Other(OtherNode::Window {
                upstream: Arc::clone(prev),
                window,
                slide,
            }),
        ))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn context(&self) -> &Arc<StreamingContext> {
        &self.context
    }

    pub fn kind(&self) -> &NodeKind<B> {
        &self.kind
    }

    pub fn output_mode(&self) -> SerializationMode {
        self.output_mode
    }

    pub fn is_cached(&self) -> bool {
        self.marks.cached.get().is_some()
    }

    pub fn is_checkpointed(&self) -> bool {
        self.marks.checkpoint_interval.get().is_some()
    }

    pub fn storage_level(&self) -> Option<StorageLevel> {
        self.marks.cached.get().copied()
    }

    pub fn checkpoint_interval(&self) -> Option<Duration> {
        self.marks.checkpoint_interval.get().copied()
    }

    /// The function this node holds, if it is a transformed node.
    pub fn effective_function(&self) -> Option<&Arc<TransformFn<B>>> {
        match &self.kind {
            NodeKind::Transformed(t) => Some(&t.function),
            _ => None,
        }
    }

    pub fn state(&self) -> MaterializationState {
        self.handle.state()
    }

    /// The runtime handle, if this node has been materialized.
    pub fn materialized_handle(&self) -> Option<RuntimeHandle> {
        self.handle.get()
    }

    /// Mark this node as cached at `level`.
    ///
    /// Nodes derived afterwards will not fuse across it. If the node is
    /// already materialized the runtime is asked to persist it right away;
    /// otherwise that happens when it is materialized.
    pub fn mark_cached(&self, level: StorageLevel) -> FuseResult<()> {
        let _guard = self.handle.lock();
        if let Some(existing) = self.marks.cached.get() {
            tracing::debug!("node {} already cached at {:?}", self.id, existing);
            return Ok(());
        }
        if let Some(handle) = self.handle.get() {
            self.context
                .runtime()
                .persist(handle, level)
                .map_err(|source| FuseError::RuntimeHandshakeFailure {
                    node: self.id,
                    source,
                })?;
        }
        let _ = self.marks.cached.set(level);
        Ok(())
    }

    /// Mark this node as checkpointed every `interval`.
    ///
    /// Same timing rules as [`mark_cached`](Self::mark_cached).
    pub fn mark_checkpointed(&self, interval: Duration) -> FuseResult<()> {
        let _guard = self.handle.lock();
        if let Some(existing) = self.marks.checkpoint_interval.get() {
            tracing::debug!("node {} already checkpointed every {:?}", self.id, existing);
            return Ok(());
        }
        if let Some(handle) = self.handle.get() {
            self.context
                .runtime()
                .checkpoint(handle, interval)
                .map_err(|source| FuseError::RuntimeHandshakeFailure {
                    node: self.id,
                    source,
                })?;
        }
        let _ = self.marks.checkpoint_interval.set(interval);
        Ok(())
    }

    /// Render the physical plan rooted at this node, one node per line.
    pub fn explain(&self) -> String {
        let mut lines = Vec::new();
        self.explain_into(0, &mut lines);
        lines.join("\n")
    }

    fn explain_into(&self, indent: usize, lines: &mut Vec<String>) {
        let pad = "  ".repeat(indent);
        let mut marks = String::new();
        if let Some(level) = self.storage_level() {
            marks.push_str(&format!(" cached={level:?}"));
        }
        if let Some(interval) = self.checkpoint_interval() {
            marks.push_str(&format!(" checkpoint={}ms", interval.as_millis()));
        }
        let handle = self
            .handle
            .get()
            .map(|h| format!(" {h}"))
            .unwrap_or_default();

        match &self.kind {
            NodeKind::Materialized { .. } => {
                lines.push(format!(
                    "{pad}#{} input mode={}{handle}{marks}",
                    self.id, self.output_mode
                ));
            }
            NodeKind::Transformed(t) => {
                lines.push(format!(
                    "{pad}#{} transform [{}] mode={} upstream_mode={}{handle}{marks}",
                    self.id,
                    t.function.udf_ids().join(" -> "),
                    self.output_mode,
                    t.upstream_mode
                ));
                t.upstream.explain_into(indent + 1, lines);
            }
            NodeKind::Other(OtherNode::Union { inputs }) => {
                lines.push(format!("{pad}#{} union{handle}{marks}", self.id));
                for input in inputs {
                    input.explain_into(indent + 1, lines);
                }
            }
            NodeKind::Other(OtherNode::Window {
                upstream,
                window,
                slide,
            }) => {
                let slide = slide
                    .map(|s| format!(" slide={}ms", s.as_millis()))
                    .unwrap_or_default();
                lines.push(format!(
                    "{pad}#{} window={}ms{slide}{handle}{marks}",
                    self.id,
                    window.as_millis()
                ));
                upstream.explain_into(indent + 1, lines);
            }
        }
    }
}

impl<B: 'static> fmt::Debug for StreamNode<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            NodeKind::Materialized { .. } => "Materialized",
            NodeKind::Transformed(_) => "Transformed",
            NodeKind::Other(OtherNode::Union { .. }) => "Union",
            NodeKind::Other(OtherNode::Window { .. }) => "Window",
        };
        f.debug_struct("StreamNode")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("output_mode", &self.output_mode)
            .field("cached", &self.is_cached())
            .field("checkpointed", &self.is_checkpointed())
            .field("state", &self.state())
            .finish()
    }
}
