use std::sync::Arc;

use streamfuse_core::graph::StreamNode;
use streamfuse_core::runtime::RuntimeBoundary;
use streamfuse_core::types::{RuntimeHandle, SerializationMode};
use streamfuse_core::{StreamingConfig, StreamingContext};

use crate::dstream::DStream;

/// The entry point for building a streaming graph.
///
/// Wraps one [`StreamingContext`]. Every stream created through the
/// environment, and every stream derived from those, shares it.
#[derive(Debug, Clone)]
pub struct StreamingEnvironment {
    context: Arc<StreamingContext>,
}

impl StreamingEnvironment {
    /// Create an environment with the default [`StreamingConfig`].
    pub fn new(app_name: &str, runtime: Arc<dyn RuntimeBoundary>) -> Self {
        Self::with_config(app_name, StreamingConfig::default(), runtime)
    }

    pub fn with_config(
        app_name: &str,
        config: StreamingConfig,
        runtime: Arc<dyn RuntimeBoundary>,
    ) -> Self {
        tracing::debug!("creating streaming environment `{}`: {:?}", app_name, config);
        Self {
            context: StreamingContext::new(app_name, config, runtime),
        }
    }

    pub fn context(&self) -> &Arc<StreamingContext> {
        &self.context
    }

    pub fn config(&self) -> &StreamingConfig {
        self.context.config()
    }

    /// Wrap a stream the runtime already created, e.g. an input source.
    pub fn input_stream<B: 'static>(
        &self,
        handle: RuntimeHandle,
        mode: SerializationMode,
    ) -> DStream<B> {
        DStream::from_node(StreamNode::input(&self.context, handle, mode))
    }

    /// Union of several streams, or `None` if `streams` is empty.
    pub fn union<B: 'static>(&self, streams: &[DStream<B>]) -> Option<DStream<B>> {
        let (first, rest) = streams.split_first()?;
        Some(first.union(rest))
    }
}
