use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::StreamingConfig;
use crate::runtime::RuntimeBoundary;
use crate::types::NodeId;

/// The streaming session every node of one graph belongs to.
///
/// Shared by reference between nodes and read-only once created, apart from
/// the node id counter.
pub struct StreamingContext {
    app_name: String,
    config: StreamingConfig,
    runtime: Arc<dyn RuntimeBoundary>,
    next_node_id: AtomicU32,
}

impl StreamingContext {
    pub fn new(
        app_name: impl Into<String>,
        config: StreamingConfig,
        runtime: Arc<dyn RuntimeBoundary>,
    ) -> Arc<Self> {
        Arc::new(Self {
            app_name: app_name.into(),
            config,
            runtime,
            next_node_id: AtomicU32::new(0),
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn runtime(&self) -> &dyn RuntimeBoundary {
        self.runtime.as_ref()
    }

    pub(crate) fn next_node_id(&self) -> NodeId {
        self.next_node_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for StreamingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingContext")
            .field("app_name", &self.app_name)
            .field("config", &self.config)
            .field("nodes", &self.next_node_id.load(Ordering::Relaxed))
            .finish()
    }
}
