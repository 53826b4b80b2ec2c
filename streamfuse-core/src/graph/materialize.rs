//! Lazy, memoized materialization of stream nodes.
//!
//! A node's runtime handle is created on the first call to
//! [`StreamNode::runtime_handle`]: the effective function is serialized, the
//! upstream handle is resolved (materializing the upstream if needed) and the
//! runtime is asked for a derived handle. The first caller does this while
//! holding the node's init lock; concurrent callers block on the lock and then
//! read the stored handle. Once set, the handle is read without locking.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::{FuseError, FuseResult, RuntimeError};
use crate::graph::node::{NodeKind, OtherNode, StreamNode};
use crate::types::RuntimeHandle;

const UNMATERIALIZED: u8 = 0;
const MATERIALIZING: u8 = 1;
const MATERIALIZED: u8 = 2;

/// Per-node materialization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializationState {
    Unmaterialized,
    Materializing,
    Materialized,
}

/// Write-once handle slot guarded by a per-node lock.
///
/// A materializer that panics leaves the slot empty and the state
/// `Unmaterialized`; the lock guards no data, so its poison flag is ignored
/// and a later call retries.
#[derive(Debug, Default)]
pub(crate) struct HandleCell {
    handle: OnceLock<RuntimeHandle>,
    init: Mutex<()>,
    state: AtomicU8,
}

impl HandleCell {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn materialized(handle: RuntimeHandle) -> Self {
        let cell = Self {
            handle: OnceLock::new(),
            init: Mutex::new(()),
            state: AtomicU8::new(MATERIALIZED),
        };
        let _ = cell.handle.set(handle);
        cell
    }

    pub(crate) fn get(&self) -> Option<RuntimeHandle> {
        self.handle.get().copied()
    }

    pub(crate) fn state(&self) -> MaterializationState {
        match self.state.load(Ordering::Acquire) {
            MATERIALIZED => MaterializationState::Materialized,
            MATERIALIZING => MaterializationState::Materializing,
            _ => MaterializationState::Unmaterialized,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.init.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the stored handle, or run `init` exactly once to create it.
    ///
    /// A failed or panicking `init` leaves the cell empty so a later call can
    /// retry.
    pub(crate) fn get_or_try_init<F>(&self, init: F) -> FuseResult<RuntimeHandle>
    where
        F: FnOnce() -> FuseResult<RuntimeHandle>,
    {
        if let Some(handle) = self.get() {
            return Ok(handle);
        }
        let _guard = self.lock();
        if let Some(handle) = self.get() {
            return Ok(handle);
        }

        self.state.store(MATERIALIZING, Ordering::Release);
        let reset = ResetState(&self.state);
        let handle = init()?;
        let _ = self.handle.set(handle);
        self.state.store(MATERIALIZED, Ordering::Release);
        std::mem::forget(reset);
        Ok(handle)
    }
}

/// Puts the state back to `Unmaterialized` when `init` fails or unwinds.
struct ResetState<'a>(&'a AtomicU8);

impl Drop for ResetState<'_> {
    fn drop(&mut self) {
        self.0.store(UNMATERIALIZED, Ordering::Release);
    }
}

impl<B: 'static> StreamNode<B> {
    /// The node's runtime handle, created on first use.
    ///
    /// Triggers at most one runtime call per node, however many threads ask.
    pub fn runtime_handle(&self) -> FuseResult<RuntimeHandle> {
        self.handle
            .get_or_try_init(|| self.materialize())
            .inspect_err(|err| {
                if err.node() == self.id() {
                    tracing::warn!("materialization of node {} failed: {}", self.id(), err);
                }
            })
    }

    /// Runs under the node's init lock.
    fn materialize(&self) -> FuseResult<RuntimeHandle> {
        let runtime = self.context().runtime();
        let handshake = |source: RuntimeError| FuseError::RuntimeHandshakeFailure {
            node: self.id(),
            source,
        };

        let handle = match self.kind() {
            NodeKind::Materialized { handle } => *handle,
            NodeKind::Transformed(t) => {
                let serialized =
                    t.function
                        .serialize()
                        .map_err(|source| FuseError::NonSerializableClosure {
                            node: self.id(),
                            depth: t.function.depth(),
                            source,
                        })?;
                let upstream = t.upstream.runtime_handle()?;
                let handle = runtime
                    .create_derived_handle(upstream, &serialized, t.upstream_mode)
                    .map_err(handshake)?;
                tracing::info!(
                    "materialized node {} as {} ({} step(s) over {}, {} bytes)",
                    self.id(),
                    handle,
                    t.function.depth(),
                    upstream,
                    serialized.len()
                );
                handle
            }
            NodeKind::Other(OtherNode::Union { inputs }) => {
                let handles = inputs
                    .iter()
                    .map(|input| input.runtime_handle())
                    .collect::<FuseResult<Vec<_>>>()?;
                let handle = runtime.create_union(&handles).map_err(handshake)?;
                tracing::info!(
                    "materialized union node {} as {} over {} input(s)",
                    self.id(),
                    handle,
                    handles.len()
                );
                handle
            }
            NodeKind::Other(OtherNode::Window {
                upstream,
                window,
                slide,
            }) => {
                let upstream = upstream.runtime_handle()?;
                let handle = runtime
                    .create_window(upstream, *window, *slide)
                    .map_err(handshake)?;
                tracing::info!("materialized window node {} as {}", self.id(), handle);
                handle
            }
        };

        if let Some(level) = self.storage_level() {
            runtime.persist(handle, level).map_err(handshake)?;
        }
        if let Some(interval) = self.checkpoint_interval() {
            runtime.checkpoint(handle, interval).map_err(handshake)?;
        }
        Ok(handle)
    }
}

#[cfg(test)]
#[path = "tests/materialize_tests.rs"]
mod tests;
