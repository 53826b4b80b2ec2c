use std::path::PathBuf;
use std::time::Duration;

use crate::types::{SerializationMode, StorageLevel};

const MIN_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(10);

/// Settings shared by every node of one streaming session.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Length of one scheduling tick.
    pub batch_interval: Duration,
    /// Output mode declared by transformed nodes unless overridden per node.
    pub transform_output_mode: SerializationMode,
    /// Storage level used by `cache()`.
    pub default_storage_level: StorageLevel,
    /// Directory the runtime checkpoints into, if any.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_secs(1),
            transform_output_mode: SerializationMode::Byte,
            default_storage_level: StorageLevel::MemoryOnlySer,
            checkpoint_dir: None,
        }
    }
}

impl StreamingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    pub fn with_transform_output_mode(mut self, mode: SerializationMode) -> Self {
        self.transform_output_mode = mode;
        self
    }

    pub fn with_storage_level(mut self, level: StorageLevel) -> Self {
        self.default_storage_level = level;
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// Checkpoint interval used when none is given: the smallest multiple of
    /// the batch interval that is at least ten seconds.
    pub fn default_checkpoint_interval(&self) -> Duration {
        let batch_ms = self.batch_interval.as_millis().max(1);
        let min_ms = MIN_CHECKPOINT_INTERVAL.as_millis();
        let ticks = min_ms.div_ceil(batch_ms);
        Duration::from_millis((ticks * batch_ms) as u64)
    }
}
