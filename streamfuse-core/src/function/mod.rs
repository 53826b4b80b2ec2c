//! Per-batch transformation functions and their serializable form.
//!
//! A [`BatchStep`] is one user transformation `(time, batch) -> batch`. A
//! [`TransformFn`] is what a node actually holds: a single step, or a step
//! fused onto an earlier composite. Serializing a `TransformFn` produces a
//! [`FunctionPlan`] listing every step's `udf_id` and captured state in
//! application order; the runtime rebuilds the function from it with a
//! [`UdfRegistry`].

use std::fmt;
use std::sync::Arc;

use crate::error::CaptureError;
use crate::types::BatchTime;

pub mod plan;
pub mod registry;
pub mod udf;

pub use plan::*;
pub use registry::*;
pub use udf::*;

/// One transformation applied to each batch of a stream.
pub trait BatchStep<B>: Send + Sync + 'static {
    /// Identifier the runtime uses to find the implementation of this step.
    fn udf_id(&self) -> &str;

    /// Transform the batch produced at `time`.
    fn apply(&self, time: BatchTime, batch: B) -> B;

    /// Encode the state this step closes over.
    ///
    /// Steps backed by process-local closures return
    /// [`CaptureError::NotCapturable`].
    fn capture(&self) -> Result<Vec<u8>, CaptureError>;
}

/// The function a transformed node holds.
///
/// `Fused { inner, outer }` applies `inner` first and `outer` to its result,
/// so a chain built by repeated fusion always runs oldest step first.
pub enum TransformFn<B> {
    Step(Arc<dyn BatchStep<B>>),
    Fused {
        inner: Arc<TransformFn<B>>,
        outer: Arc<dyn BatchStep<B>>,
    },
}

impl<B: 'static> TransformFn<B> {
    /// A function consisting of one step.
    pub fn single(step: Arc<dyn BatchStep<B>>) -> Self {
        TransformFn::Step(step)
    }

    /// Compose `outer` after `inner`: `h(t, b) = outer(t, inner(t, b))`.
    pub fn fuse(inner: Arc<TransformFn<B>>, outer: Arc<dyn BatchStep<B>>) -> Self {
        TransformFn::Fused { inner, outer }
    }

    /// Number of user steps folded into this function.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self;
        while let TransformFn::Fused { inner, .. } = current {
            depth += 1;
            current = inner;
        }
        depth
    }

    /// Steps in application order (oldest first).
    pub fn steps(&self) -> Vec<&Arc<dyn BatchStep<B>>> {
        let mut steps = Vec::with_capacity(self.depth());
        let mut current = self;
        loop {
            match current {
                TransformFn::Step(step) => {
                    steps.push(step);
                    break;
                }
                TransformFn::Fused { inner, outer } => {
                    steps.push(outer);
                    current = inner;
                }
            }
        }
        steps.reverse();
        steps
    }

    /// `udf_id` of every step in application order.
    pub fn udf_ids(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .map(|s| s.udf_id().to_string())
            .collect()
    }

    /// Run the function on one batch.
    pub fn apply(&self, time: BatchTime, batch: B) -> B {
        self.steps()
            .into_iter()
            .fold(batch, |acc, step| step.apply(time, acc))
    }

    /// Capture every step into a [`FunctionPlan`].
    pub fn to_plan(&self) -> Result<FunctionPlan, CaptureError> {
        let steps = self
            .steps()
            .into_iter()
            .map(|step| {
                Ok(StepDescriptor {
                    udf_id: step.udf_id().to_string(),
                    config: step.capture()?,
                })
            })
            .collect::<Result<Vec<_>, CaptureError>>()?;
        Ok(FunctionPlan { steps })
    }

    /// Self-contained byte encoding of this function, as handed to the runtime.
    pub fn serialize(&self) -> Result<Vec<u8>, CaptureError> {
        self.to_plan()?.to_bytes().map_err(CaptureError::Plan)
    }
}

// Unlinks uniquely owned `Fused` links one at a time, so dropping a chain
// uses constant stack whatever its depth.
impl<B> Drop for TransformFn<B> {
    fn drop(&mut self) {
        let TransformFn::Fused { inner, outer } = self else {
            return;
        };
        if Arc::strong_count(inner) > 1 {
            return;
        }
        let detached = Arc::new(TransformFn::Step(Arc::clone(outer)));
        let mut next = std::mem::replace(inner, Arc::clone(&detached));
        while let Some(mut link) = Arc::into_inner(next) {
            match &mut link {
                TransformFn::Fused { inner, .. } => {
                    next = std::mem::replace(inner, Arc::clone(&detached));
                }
                TransformFn::Step(_) => break,
            }
        }
    }
}

impl<B: 'static> fmt::Debug for TransformFn<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformFn")
            .field("steps", &self.udf_ids())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/transform_fn_tests.rs"]
mod tests;
