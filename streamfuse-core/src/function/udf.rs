use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CaptureError;
use crate::function::BatchStep;
use crate::types::BatchTime;

/// A transformation whose captured environment is its own serde state.
///
/// The struct's fields are what the function closes over. They are encoded
/// with bincode when the node is materialized, and decoded on the runtime side
/// by a [`UdfRegistry`](crate::function::UdfRegistry) that knows `UDF_ID`.
pub trait UdfFunction<B>: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable identifier shared by the driver and the runtime.
    const UDF_ID: &'static str;

    fn call(&self, time: BatchTime, batch: B) -> B;
}

/// Adapts a [`UdfFunction`] into a [`BatchStep`].
#[derive(Debug, Clone)]
pub struct Udf<F>(pub F);

impl<B, F> BatchStep<B> for Udf<F>
where
    F: UdfFunction<B>,
{
    fn udf_id(&self) -> &str {
        F::UDF_ID
    }

    #[inline]
    fn apply(&self, time: BatchTime, batch: B) -> B {
        self.0.call(time, batch)
    }

    fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        bincode::serialize(&self.0).map_err(|source| CaptureError::Encode {
            udf_id: F::UDF_ID.to_string(),
            source,
        })
    }
}

/// A step backed by an arbitrary closure.
///
/// Usable for graph construction and in-process evaluation, but it has no
/// portable encoding: materializing a node that contains one fails with
/// [`FuseError::NonSerializableClosure`](crate::error::FuseError::NonSerializableClosure).
pub struct ClosureStep<F> {
    name: String,
    f: F,
}

impl<F> ClosureStep<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for ClosureStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureStep")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<B, F> BatchStep<B> for ClosureStep<F>
where
    F: Fn(BatchTime, B) -> B + Send + Sync + 'static,
{
    fn udf_id(&self) -> &str {
        &self.name
    }

    #[inline]
    fn apply(&self, time: BatchTime, batch: B) -> B {
        (self.f)(time, batch)
    }

    fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        Err(CaptureError::NotCapturable {
            udf_id: self.name.clone(),
        })
    }
}
