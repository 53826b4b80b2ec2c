//! # streamfuse API
//!
//! User-facing builder API for micro-batch streams.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use serde::{Deserialize, Serialize};
//! use streamfuse_api::environment::StreamingEnvironment;
//! use streamfuse_core::function::{UdfFunction, UdfRegistry};
//! use streamfuse_core::runtime::LocalRuntime;
//! use streamfuse_core::types::{BatchTime, SerializationMode};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Offset(i64);
//!
//! impl UdfFunction<Vec<i64>> for Offset {
//!     const UDF_ID: &'static str = "demo::offset";
//!     fn call(&self, _time: BatchTime, batch: Vec<i64>) -> Vec<i64> {
//!         batch.into_iter().map(|x| x + self.0).collect()
//!     }
//! }
//!
//! let runtime = Arc::new(LocalRuntime::<Vec<i64>>::new(
//!     UdfRegistry::new().with_udf::<Offset>(),
//!     Duration::from_secs(1),
//! ));
//! let env = StreamingEnvironment::new("quickstart", runtime.clone());
//! let source = runtime.create_input().unwrap();
//!
//! let out = env
//!     .input_stream::<Vec<i64>>(source, SerializationMode::Object)
//!     .transform_udf(Offset(1))
//!     .transform_udf(Offset(10));
//!
//! // One runtime stream for both steps.
//! let handle = out.runtime_handle().unwrap();
//! runtime.push_batch(source, 0, vec![1, 2]).unwrap();
//! assert_eq!(runtime.compute(handle, 0).unwrap(), Some(vec![12, 13]));
//! ```
//!
//! - [`environment`] — [`StreamingEnvironment`](environment::StreamingEnvironment):
//!   owns the streaming context and creates input streams.
//! - [`dstream`] — [`DStream`](dstream::DStream): fluent transformations,
//!   cache/checkpoint marks and lazy materialization.

pub mod dstream;
pub mod environment;

pub use streamfuse_core;
