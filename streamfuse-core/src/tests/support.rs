//! Fixtures shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::StreamingConfig;
use crate::context::StreamingContext;
use crate::error::RuntimeError;
use crate::function::{BatchStep, FunctionPlan, Udf, UdfFunction};
use crate::runtime::RuntimeBoundary;
use crate::types::{BatchTime, RuntimeHandle, SerializationMode, StorageLevel};

/// Appends its tag to the batch, so the output records application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag(pub u32);

impl UdfFunction<Vec<u32>> for Tag {
    const UDF_ID: &'static str = "test::tag";

    fn call(&self, _time: BatchTime, mut batch: Vec<u32>) -> Vec<u32> {
        batch.push(self.0);
        batch
    }
}

/// Appends the batch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampTime;

impl UdfFunction<Vec<u32>> for StampTime {
    const UDF_ID: &'static str = "test::stamp_time";

    fn call(&self, time: BatchTime, mut batch: Vec<u32>) -> Vec<u32> {
        batch.push(time as u32);
        batch
    }
}

pub fn tag(n: u32) -> Arc<dyn BatchStep<Vec<u32>>> {
    Arc::new(Udf(Tag(n)))
}

/// One `create_derived_handle` request as seen by the runtime.
#[derive(Debug, Clone)]
pub struct DerivedCall {
    pub upstream: RuntimeHandle,
    pub plan: FunctionPlan,
    pub upstream_mode: SerializationMode,
    pub result: RuntimeHandle,
}

/// Runtime double that records every request and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    next_handle: AtomicU64,
    fail_next: AtomicUsize,
    fail_persist: AtomicBool,
    delay: Option<Duration>,
    derived: Mutex<Vec<DerivedCall>>,
    unions: Mutex<Vec<Vec<RuntimeHandle>>>,
    windows: Mutex<Vec<(RuntimeHandle, Duration, Option<Duration>)>>,
    persisted: Mutex<Vec<(RuntimeHandle, StorageLevel)>>,
    checkpointed: Mutex<Vec<(RuntimeHandle, Duration)>>,
}

impl RecordingRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU64::new(100),
            ..Self::default()
        })
    }

    /// Sleep inside every derived call, to widen race windows.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU64::new(100),
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Reject the next `n` requests.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Reject the next `persist` request only.
    pub fn fail_next_persist(&self) {
        self.fail_persist.store(true, Ordering::SeqCst);
    }

    /// A handle for an input stream, as the runtime would hand out.
    pub fn input_handle(&self) -> RuntimeHandle {
        RuntimeHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    pub fn derived_calls(&self) -> Vec<DerivedCall> {
        self.derived.lock().unwrap().clone()
    }

    pub fn union_calls(&self) -> Vec<Vec<RuntimeHandle>> {
        self.unions.lock().unwrap().clone()
    }

    pub fn window_calls(&self) -> Vec<(RuntimeHandle, Duration, Option<Duration>)> {
        self.windows.lock().unwrap().clone()
    }

    pub fn persist_calls(&self) -> Vec<(RuntimeHandle, StorageLevel)> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn checkpoint_calls(&self) -> Vec<(RuntimeHandle, Duration)> {
        self.checkpointed.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), RuntimeError> {
        let failed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(RuntimeError::Rejected("injected failure".to_string()));
        }
        Ok(())
    }
}

impl RuntimeBoundary for RecordingRuntime {
    fn create_derived_handle(
        &self,
        upstream: RuntimeHandle,
        serialized_fn: &[u8],
        upstream_mode: SerializationMode,
    ) -> Result<RuntimeHandle, RuntimeError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.check_failure()?;
        let plan = FunctionPlan::from_bytes(serialized_fn)?;
        let result = RuntimeHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.derived.lock().unwrap().push(DerivedCall {
            upstream,
            plan,
            upstream_mode,
            result,
        });
        Ok(result)
    }

    fn create_union(&self, inputs: &[RuntimeHandle]) -> Result<RuntimeHandle, RuntimeError> {
        self.check_failure()?;
        self.unions.lock().unwrap().push(inputs.to_vec());
        Ok(RuntimeHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn create_window(
        &self,
        upstream: RuntimeHandle,
        window: Duration,
        slide: Option<Duration>,
    ) -> Result<RuntimeHandle, RuntimeError> {
        self.check_failure()?;
        self.windows.lock().unwrap().push((upstream, window, slide));
        Ok(RuntimeHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn persist(&self, handle: RuntimeHandle, level: StorageLevel) -> Result<(), RuntimeError> {
        self.check_failure()?;
        if self.fail_persist.swap(false, Ordering::SeqCst) {
            return Err(RuntimeError::Unavailable("storage offline".to_string()));
        }
        self.persisted.lock().unwrap().push((handle, level));
        Ok(())
    }

    fn checkpoint(&self, handle: RuntimeHandle, interval: Duration) -> Result<(), RuntimeError> {
        self.check_failure()?;
        self.checkpointed.lock().unwrap().push((handle, interval));
        Ok(())
    }
}

pub fn context(runtime: &Arc<RecordingRuntime>) -> Arc<StreamingContext> {
    let runtime: Arc<dyn RuntimeBoundary> = runtime.clone();
    StreamingContext::new("test", StreamingConfig::default(), runtime)
}
