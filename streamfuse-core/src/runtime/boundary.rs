use std::time::Duration;

use crate::error::RuntimeError;
use crate::types::{RuntimeHandle, SerializationMode, StorageLevel};

/// The calls this crate makes into the distributed runtime.
///
/// Every call is a blocking request/response from the caller's point of view.
/// Implementations own the handles they return; retry policy, if any, lives
/// behind this trait.
pub trait RuntimeBoundary: Send + Sync {
    /// Create a stream that applies `serialized_fn` to every batch of `upstream`.
    ///
    /// `serialized_fn` is the bincode encoding of a
    /// [`FunctionPlan`](crate::function::FunctionPlan); `upstream_mode` tells
    /// the runtime how the upstream batches are encoded.
    fn create_derived_handle(
        &self,
        upstream: RuntimeHandle,
        serialized_fn: &[u8],
        upstream_mode: SerializationMode,
    ) -> Result<RuntimeHandle, RuntimeError>;

    /// Create a stream whose batches are the union of the inputs' batches.
    fn create_union(&self, _inputs: &[RuntimeHandle]) -> Result<RuntimeHandle, RuntimeError> {
        Err(RuntimeError::Rejected("union streams not supported".to_string()))
    }

    /// Create a sliding-window stream over `upstream`.
    ///
    /// `slide` of `None` slides by one batch interval.
    fn create_window(
        &self,
        _upstream: RuntimeHandle,
        _window: Duration,
        _slide: Option<Duration>,
    ) -> Result<RuntimeHandle, RuntimeError> {
        Err(RuntimeError::Rejected("window streams not supported".to_string()))
    }

    /// Keep the batches of `handle` at `level` once computed.
    ///
    /// Default implementation is a no-op.
    fn persist(&self, _handle: RuntimeHandle, _level: StorageLevel) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Checkpoint the batches of `handle` every `interval`.
    ///
    /// Default implementation is a no-op.
    fn checkpoint(&self, _handle: RuntimeHandle, _interval: Duration) -> Result<(), RuntimeError> {
        Ok(())
    }
}
