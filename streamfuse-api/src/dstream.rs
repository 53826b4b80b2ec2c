use std::sync::Arc;
use std::time::Duration;

use streamfuse_core::FuseResult;
use streamfuse_core::function::{BatchStep, ClosureStep, Udf, UdfFunction};
use streamfuse_core::graph::{NodeKind, StreamNode};
use streamfuse_core::types::{BatchTime, NodeId, RuntimeHandle, SerializationMode, StorageLevel};

/// A discretized stream: one batch of type `B` per batch time.
///
/// Created by [`StreamingEnvironment::input_stream`].
/// Deriving a stream never talks to the runtime; consecutive transformations
/// are fused into one function and handed over on the first
/// [`runtime_handle`](Self::runtime_handle).
///
/// [`StreamingEnvironment::input_stream`]: crate::environment::StreamingEnvironment::input_stream
pub struct DStream<B> {
    node: Arc<StreamNode<B>>,
}

impl<B> Clone for DStream<B> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<B: 'static> DStream<B> {
    pub fn from_node(node: Arc<StreamNode<B>>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Arc<StreamNode<B>> {
        &self.node
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// Apply `step` to every batch.
    pub fn transform(&self, step: Arc<dyn BatchStep<B>>) -> Self {
        Self::from_node(StreamNode::transformed(&self.node, step))
    }

    /// Apply `step` and declare `mode` as the output mode of the new stream.
    pub fn transform_with_mode(
        &self,
        step: Arc<dyn BatchStep<B>>,
        mode: SerializationMode,
    ) -> Self {
        Self::from_node(StreamNode::transformed_with_mode(&self.node, step, mode))
    }

    /// Apply a serializable UDF to every batch.
    pub fn transform_udf<F: UdfFunction<B>>(&self, function: F) -> Self {
        self.transform(Arc::new(Udf(function)))
    }

    /// Apply a process-local closure to every batch.
    ///
    /// The graph can be built, but materializing any stream whose fused
    /// function contains the closure fails with
    /// [`FuseError::NonSerializableClosure`](streamfuse_core::FuseError::NonSerializableClosure).
    pub fn transform_local<F>(&self, name: &str, f: F) -> Self
    where
        F: Fn(BatchTime, B) -> B + Send + Sync + 'static,
    {
        self.transform(Arc::new(ClosureStep::new(name, f)))
    }

    /// Cache at the configured default storage level.
    pub fn cache(&self) -> FuseResult<Self> {
        let level = self.node.context().config().default_storage_level;
        self.persist(level)
    }

    pub fn persist(&self, level: StorageLevel) -> FuseResult<Self> {
        self.node.mark_cached(level)?;
        Ok(self.clone())
    }

    /// Checkpoint at the configured default interval.
    pub fn checkpoint(&self) -> FuseResult<Self> {
        let interval = self.node.context().config().default_checkpoint_interval();
        self.checkpoint_every(interval)
    }

    pub fn checkpoint_every(&self, interval: Duration) -> FuseResult<Self> {
        self.node.mark_checkpointed(interval)?;
        Ok(self.clone())
    }

    /// Sliding window over the last `window` of batches. A `slide` of `None`
    /// slides by one batch interval.
    pub fn window(&self, window: Duration, slide: Option<Duration>) -> Self {
        Self::from_node(StreamNode::window(&self.node, window, slide))
    }

    pub fn union(&self, others: &[DStream<B>]) -> Self {
        let others: Vec<_> = others.iter().map(|s| Arc::clone(&s.node)).collect();
        Self::from_node(StreamNode::union(&self.node, &others))
    }

    /// The runtime handle of this stream, materializing it on first use.
    pub fn runtime_handle(&self) -> FuseResult<RuntimeHandle> {
        self.node.runtime_handle()
    }

    /// Whether this stream absorbed its predecessor's function.
    pub fn is_fused(&self) -> bool {
        matches!(self.node.kind(), NodeKind::Transformed(t) if t.is_fused())
    }

    /// Number of user steps this stream's function runs, 0 for non-transform streams.
    pub fn fused_depth(&self) -> usize {
        self.node.effective_function().map_or(0, |f| f.depth())
    }

    pub fn explain(&self) -> String {
        self.node.explain()
    }
}

impl<B: 'static> std::fmt::Debug for DStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DStream").field(&self.node).finish()
    }
}
