//! `streamfuse run-local`: a demonstration pipeline on the in-process runtime.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use streamfuse_api::environment::StreamingEnvironment;
use streamfuse_core::StreamingConfig;
use streamfuse_core::function::{UdfFunction, UdfRegistry};
use streamfuse_core::runtime::LocalRuntime;
use streamfuse_core::types::{BatchTime, SerializationMode};

#[derive(Args, Debug, Clone)]
pub struct RunLocalArgs {
    /// Number of batches to push and compute.
    #[arg(long, default_value_t = 3)]
    pub ticks: u32,
    #[arg(long, default_value_t = 1000)]
    pub batch_interval_ms: u64,
    /// Number of chained transformations.
    #[arg(long, default_value_t = 4)]
    pub chain_len: usize,
    /// Cache the stream after this step (0-based).
    #[arg(long)]
    pub cache_at: Option<usize>,
    #[arg(long, default_value_t = SerializationMode::Byte)]
    pub output_mode: SerializationMode,
}

/// Adds a constant to every element.
#[derive(Debug, Serialize, Deserialize)]
struct Offset(i64);

impl UdfFunction<Vec<i64>> for Offset {
    const UDF_ID: &'static str = "demo::offset";

    fn call(&self, _time: BatchTime, batch: Vec<i64>) -> Vec<i64> {
        batch.into_iter().map(|x| x + self.0).collect()
    }
}

pub fn run(args: &RunLocalArgs) -> anyhow::Result<()> {
    if args.chain_len == 0 {
        anyhow::bail!("--chain-len must be at least 1");
    }
    let interval = Duration::from_millis(args.batch_interval_ms.max(1));
    let runtime = Arc::new(LocalRuntime::new(
        UdfRegistry::<Vec<i64>>::new().with_udf::<Offset>(),
        interval,
    ));
    let config = StreamingConfig::default()
        .with_batch_interval(interval)
        .with_transform_output_mode(args.output_mode);
    let env = StreamingEnvironment::with_config("run-local", config, runtime.clone());

    let source = runtime.create_input()?;
    let mut stream = env.input_stream::<Vec<i64>>(source, SerializationMode::Object);
    for step in 0..args.chain_len {
        stream = stream.transform_udf(Offset(step as i64 + 1));
        if args.cache_at == Some(step) {
            stream = stream.cache()?;
        }
    }

    let handle = stream.runtime_handle()?;
    println!("plan:\n{}", stream.explain());

    let interval_ms = i64::try_from(interval.as_millis())?;
    for tick in 0..args.ticks {
        let time = i64::from(tick) * interval_ms;
        let base = i64::from(tick) * 10;
        runtime.push_batch(source, time, vec![base, base + 1])?;
        let output = runtime.compute(handle, time)?;
        println!("t={time}ms output={output:?}");
    }

    let stats = runtime.stats();
    println!(
        "derived streams={} function evaluations={} persisted hits={}",
        stats.derived_handles, stats.function_evaluations, stats.persisted_hits
    );
    Ok(())
}
