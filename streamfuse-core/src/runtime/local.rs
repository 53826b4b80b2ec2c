//! In-process runtime.
//!
//! Keeps every stream in a table keyed by handle and evaluates batches on
//! demand with [`LocalRuntime::compute`]. Functions arrive as serialized
//! plans and are rebuilt with a [`UdfRegistry`], the same way a remote
//! runtime would.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;

use crate::error::RuntimeError;
use crate::function::{TransformFn, UdfRegistry};
use crate::runtime::RuntimeBoundary;
use crate::types::{BatchTime, RuntimeHandle, SerializationMode, StorageLevel};

/// Merge several batches into one, for unions and windows.
pub trait CombineBatches: Sized {
    fn combine(parts: Vec<Self>) -> Self;
}

impl<T> CombineBatches for Vec<T> {
    fn combine(parts: Vec<Self>) -> Self {
        parts.into_iter().flatten().collect()
    }
}

enum LocalStream<B> {
    Input {
        batches: BTreeMap<BatchTime, B>,
    },
    Derived {
        upstream: RuntimeHandle,
        function: Arc<TransformFn<B>>,
        upstream_mode: SerializationMode,
    },
    Union {
        inputs: Vec<RuntimeHandle>,
    },
    Window {
        upstream: RuntimeHandle,
        window_ms: i64,
        slide_ms: i64,
    },
}

/// What [`LocalRuntime::compute`] has to do next, copied out of the lock.
enum Plan<B> {
    Ready(Option<B>),
    Derived(RuntimeHandle, Arc<TransformFn<B>>),
    Union(Vec<RuntimeHandle>),
    Window(RuntimeHandle, i64, i64),
}

/// Counters for the requests a [`LocalRuntime`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalStats {
    pub derived_handles: usize,
    pub union_handles: usize,
    pub window_handles: usize,
    /// Times a derived stream's function ran on a batch.
    pub function_evaluations: usize,
    pub persisted_hits: usize,
}

#[derive(Default)]
struct Counters {
    derived_handles: AtomicUsize,
    union_handles: AtomicUsize,
    window_handles: AtomicUsize,
    function_evaluations: AtomicUsize,
    persisted_hits: AtomicUsize,
}

/// A [`RuntimeBoundary`] that runs everything in the calling process.
///
/// Batch times are milliseconds; the batch interval decides which times a
/// window covers.
///
/// Batches of persisted streams are memoized only as far back as the widest
/// window can reach; older ones are evicted as newer times are computed.
pub struct LocalRuntime<B> {
    registry: UdfRegistry<B>,
    batch_interval: Duration,
    streams: Mutex<AHashMap<RuntimeHandle, LocalStream<B>>>,
    persisted: Mutex<AHashMap<RuntimeHandle, StorageLevel>>,
    checkpointed: Mutex<AHashMap<RuntimeHandle, Duration>>,
    memo: Mutex<AHashMap<RuntimeHandle, BTreeMap<BatchTime, B>>>,
    /// How far behind the newest memoized time a batch is kept.
    retention_ms: AtomicI64,
    /// Sum of all window lengths; no stream has a batch later than the last
    /// input batch plus this.
    window_reach_ms: AtomicI64,
    next_handle: AtomicU64,
    counters: Counters,
}

type Streams<B> = AHashMap<RuntimeHandle, LocalStream<B>>;

fn poisoned<T>(_: T) -> RuntimeError {
    RuntimeError::Unavailable("local runtime state poisoned".to_string())
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl<B> LocalRuntime<B>
where
    B: Clone + CombineBatches + Send + Sync + 'static,
{
    pub fn new(registry: UdfRegistry<B>, batch_interval: Duration) -> Self {
        Self {
            registry,
            batch_interval,
            streams: Mutex::new(AHashMap::new()),
            persisted: Mutex::new(AHashMap::new()),
            checkpointed: Mutex::new(AHashMap::new()),
            memo: Mutex::new(AHashMap::new()),
            retention_ms: AtomicI64::new(duration_ms(batch_interval).max(1)),
            window_reach_ms: AtomicI64::new(0),
            next_handle: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    pub fn batch_interval(&self) -> Duration {
        self.batch_interval
    }

    fn streams(&self) -> Result<MutexGuard<'_, Streams<B>>, RuntimeError> {
        self.streams.lock().map_err(poisoned)
    }

    fn register(&self, stream: LocalStream<B>) -> Result<RuntimeHandle, RuntimeError> {
        let handle = RuntimeHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.streams()?.insert(handle, stream);
        Ok(handle)
    }

    fn ensure_known(&self, handle: RuntimeHandle) -> Result<(), RuntimeError> {
        if self.streams()?.contains_key(&handle) {
            Ok(())
        } else {
            Err(RuntimeError::UnknownHandle(handle))
        }
    }

    /// Register a new input stream.
    pub fn create_input(&self) -> Result<RuntimeHandle, RuntimeError> {
        let handle = self.register(LocalStream::Input {
            batches: BTreeMap::new(),
        })?;
        tracing::debug!("created input stream {}", handle);
        Ok(handle)
    }

    /// Feed the batch of an input stream for `time`, replacing any earlier one.
    pub fn push_batch(
        &self,
        handle: RuntimeHandle,
        time: BatchTime,
        batch: B,
    ) -> Result<(), RuntimeError> {
        let mut streams = self.streams()?;
        match streams.get_mut(&handle) {
            Some(LocalStream::Input { batches }) => {
                batches.insert(time, batch);
                Ok(())
            }
            Some(_) => Err(RuntimeError::Rejected(format!(
                "{handle} is not an input stream"
            ))),
            None => Err(RuntimeError::UnknownHandle(handle)),
        }
    }

    /// The batch of `handle` at `time`, or `None` if the stream has no batch
    /// then.
    pub fn compute(
        &self,
        handle: RuntimeHandle,
        time: BatchTime,
    ) -> Result<Option<B>, RuntimeError> {
        let persisted = self.is_persisted(handle)?;
        if persisted {
            let memo = self.memo.lock().map_err(poisoned)?;
            if let Some(batch) = memo.get(&handle).and_then(|batches| batches.get(&time)) {
                self.counters.persisted_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(batch.clone()));
            }
        }

        let batch = match self.plan(handle, time)? {
            Plan::Ready(batch) => batch,
            Plan::Derived(upstream, function) => match self.compute(upstream, time)? {
                Some(input) => {
                    self.counters
                        .function_evaluations
                        .fetch_add(1, Ordering::Relaxed);
                    Some(function.apply(time, input))
                }
                None => None,
            },
            Plan::Union(inputs) => {
                let mut parts = Vec::with_capacity(inputs.len());
                for input in inputs {
                    if let Some(batch) = self.compute(input, time)? {
                        parts.push(batch);
                    }
                }
                (!parts.is_empty()).then(|| B::combine(parts))
            }
            Plan::Window(upstream, window_ms, slide_ms) => {
                self.compute_window(upstream, time, window_ms, slide_ms)?
            }
        };

        if persisted {
            if let Some(batch) = &batch {
                self.remember(handle, time, batch.clone())?;
            }
        }
        Ok(batch)
    }

    fn remember(
        &self,
        handle: RuntimeHandle,
        time: BatchTime,
        batch: B,
    ) -> Result<(), RuntimeError> {
        let mut memo = self.memo.lock().map_err(poisoned)?;
        let batches = memo.entry(handle).or_default();
        batches.insert(time, batch);
        if let Some((&newest, _)) = batches.last_key_value() {
            let retention = self.retention_ms.load(Ordering::Relaxed);
            let cutoff = newest.saturating_sub(retention);
            batches.retain(|t, _| *t > cutoff);
        }
        Ok(())
    }

    /// Number of batches currently memoized for a persisted stream.
    pub fn memoized_batches(&self, handle: RuntimeHandle) -> usize {
        self.memo
            .lock()
            .map(|memo| memo.get(&handle).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn plan(&self, handle: RuntimeHandle, time: BatchTime) -> Result<Plan<B>, RuntimeError> {
        let streams = self.streams()?;
        let stream = streams
            .get(&handle)
            .ok_or(RuntimeError::UnknownHandle(handle))?;
        Ok(match stream {
            LocalStream::Input { batches } => Plan::Ready(batches.get(&time).cloned()),
            LocalStream::Derived {
                upstream, function, ..
            } => Plan::Derived(*upstream, Arc::clone(function)),
            LocalStream::Union { inputs } => Plan::Union(inputs.clone()),
            LocalStream::Window {
                upstream,
                window_ms,
                slide_ms,
            } => Plan::Window(*upstream, *window_ms, *slide_ms),
        })
    }

    fn compute_window(
        &self,
        upstream: RuntimeHandle,
        time: BatchTime,
        window_ms: i64,
        slide_ms: i64,
    ) -> Result<Option<B>, RuntimeError> {
        if time.rem_euclid(slide_ms) != 0 {
            return Ok(None);
        }
        let Some((first, last)) = self.input_span()? else {
            return Ok(None);
        };

        // Walk (time - window, time] in batch steps, skipping the part that
        // lies before the first input batch or after the last reachable one.
        let step = i128::from(duration_ms(self.batch_interval).max(1));
        let mut t = i128::from(time) - i128::from(window_ms) + step;
        let first = i128::from(first);
        if t < first {
            t += (first - t + step - 1) / step * step;
        }
        let reach = i128::from(self.window_reach_ms.load(Ordering::Relaxed));
        let end = i128::from(time).min(i128::from(last) + reach);

        let mut parts = Vec::new();
        while t <= end {
            let Ok(at) = BatchTime::try_from(t) else {
                break;
            };
            if let Some(batch) = self.compute(upstream, at)? {
                parts.push(batch);
            }
            t += step;
        }
        Ok((!parts.is_empty()).then(|| B::combine(parts)))
    }

    /// Earliest and latest time of any input batch.
    fn input_span(&self) -> Result<Option<(BatchTime, BatchTime)>, RuntimeError> {
        let streams = self.streams()?;
        let span = streams
            .values()
            .filter_map(|stream| match stream {
                LocalStream::Input { batches } => {
                    let (first, _) = batches.first_key_value()?;
                    let (last, _) = batches.last_key_value()?;
                    Some((*first, *last))
                }
                _ => None,
            })
            .reduce(|(lo, hi), (first, last)| (lo.min(first), hi.max(last)));
        Ok(span)
    }

    fn is_persisted(&self, handle: RuntimeHandle) -> Result<bool, RuntimeError> {
        Ok(self.persisted.lock().map_err(poisoned)?.contains_key(&handle))
    }

    pub fn storage_level(&self, handle: RuntimeHandle) -> Option<StorageLevel> {
        self.persisted.lock().ok()?.get(&handle).copied()
    }

    pub fn checkpoint_interval(&self, handle: RuntimeHandle) -> Option<Duration> {
        self.checkpointed.lock().ok()?.get(&handle).copied()
    }

    /// Serialization mode the derived stream was told its upstream uses.
    pub fn upstream_mode(&self, handle: RuntimeHandle) -> Option<SerializationMode> {
        match self.streams.lock().ok()?.get(&handle)? {
            LocalStream::Derived { upstream_mode, .. } => Some(*upstream_mode),
            _ => None,
        }
    }

    /// `udf_id`s of a derived stream's function, in application order.
    pub fn function_steps(&self, handle: RuntimeHandle) -> Option<Vec<String>> {
        match self.streams.lock().ok()?.get(&handle)? {
            LocalStream::Derived { function, .. } => Some(function.udf_ids()),
            _ => None,
        }
    }

    pub fn stats(&self) -> LocalStats {
        let c = &self.counters;
        LocalStats {
            derived_handles: c.derived_handles.load(Ordering::Relaxed),
            union_handles: c.union_handles.load(Ordering::Relaxed),
            window_handles: c.window_handles.load(Ordering::Relaxed),
            function_evaluations: c.function_evaluations.load(Ordering::Relaxed),
            persisted_hits: c.persisted_hits.load(Ordering::Relaxed),
        }
    }

    fn ticks(&self, what: &str, d: Duration) -> Result<i64, RuntimeError> {
        let step = duration_ms(self.batch_interval).max(1);
        let ms = duration_ms(d);
        if ms <= 0 || ms % step != 0 {
            return Err(RuntimeError::Rejected(format!(
                "{what} {d:?} is not a positive multiple of the batch interval {:?}",
                self.batch_interval
            )));
        }
        Ok(ms)
    }
}

impl<B> RuntimeBoundary for LocalRuntime<B>
where
    B: Clone + CombineBatches + Send + Sync + 'static,
{
    fn create_derived_handle(
        &self,
        upstream: RuntimeHandle,
        serialized_fn: &[u8],
        upstream_mode: SerializationMode,
    ) -> Result<RuntimeHandle, RuntimeError> {
        self.ensure_known(upstream)?;
        let function = self.registry.decode(serialized_fn)?;
        let depth = function.depth();
        let handle = self.register(LocalStream::Derived {
            upstream,
            function: Arc::new(function),
            upstream_mode,
        })?;
        self.counters.derived_handles.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "created derived stream {} over {} ({} step(s), upstream mode {})",
            handle,
            upstream,
            depth,
            upstream_mode
        );
        Ok(handle)
    }

    fn create_union(&self, inputs: &[RuntimeHandle]) -> Result<RuntimeHandle, RuntimeError> {
        if inputs.is_empty() {
            return Err(RuntimeError::Rejected("union of no streams".to_string()));
        }
        for input in inputs {
            self.ensure_known(*input)?;
        }
        let handle = self.register(LocalStream::Union {
            inputs: inputs.to_vec(),
        })?;
        self.counters.union_handles.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    fn create_window(
        &self,
        upstream: RuntimeHandle,
        window: Duration,
        slide: Option<Duration>,
    ) -> Result<RuntimeHandle, RuntimeError> {
        self.ensure_known(upstream)?;
        let window_ms = self.ticks("window", window)?;
        let slide_ms = self.ticks("slide", slide.unwrap_or(self.batch_interval))?;
        let handle = self.register(LocalStream::Window {
            upstream,
            window_ms,
            slide_ms,
        })?;
        self.retention_ms.fetch_max(window_ms, Ordering::Relaxed);
        let _ = self
            .window_reach_ms
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |reach| {
                Some(reach.saturating_add(window_ms))
            });
        self.counters.window_handles.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    fn persist(&self, handle: RuntimeHandle, level: StorageLevel) -> Result<(), RuntimeError> {
        self.ensure_known(handle)?;
        self.persisted.lock().map_err(poisoned)?.insert(handle, level);
        tracing::debug!("persisting {} at {:?}", handle, level);
        Ok(())
    }

    fn checkpoint(&self, handle: RuntimeHandle, interval: Duration) -> Result<(), RuntimeError> {
        self.ensure_known(handle)?;
        self.checkpointed
            .lock()
            .map_err(poisoned)?
            .insert(handle, interval);
        tracing::debug!("checkpointing {} every {:?}", handle, interval);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/local_tests.rs"]
mod tests;
