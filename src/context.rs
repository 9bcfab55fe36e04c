//! Render cycles.
//!
//! A [`RenderContext`] is one independently re-runnable render cycle. The
//! render function brackets each pass with [`start`](RenderContext::start)
//! and [`stop`](RenderContext::stop) and reads data through
//! [`get`](RenderContext::get) / [`req`](RenderContext::req); every resource
//! a read walks through is recorded as a dependency of the pass, and the
//! store wakes the context (coalesced) whenever one of those resources
//! settles.
//!
//! Reads never block on the network: an unresolved path yields the fallback
//! (and marks the pass incomplete), a cached fetch error fails the read.
//!
//! [`ContextReader`] is the clonable read capability handed to render
//! closures; see [`HyperStore::get_async`](crate::HyperStore::get_async).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::client::ClientError;
use crate::error::StoreError;
use crate::path::Path;
use crate::store::message::StoreRequest;

/// Identity of one render cycle inside its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx_{}", self.0)
    }
}

/// A coalesced re-render wake-up: the most recent settlement that touched a
/// resource this context references.
#[derive(Debug, Clone)]
pub struct RenderSignal {
    /// The resource id as originally requested.
    pub id: String,
    pub value: Option<Value>,
    pub error: Option<ClientError>,
}

/// The full result of one path resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The resolved value; `None` when blocked or when the final member is
    /// absent.
    pub value: Option<Value>,
    /// Whether every resource the walk needed was cached.
    pub is_loaded: bool,
    /// Whether the walk ran to completion. Tracks `is_loaded` for a fully
    /// cached graph.
    pub completed: bool,
    /// The originating request.
    pub path: Path,
}

#[derive(Debug)]
struct CycleState {
    started: AtomicBool,
    loaded: AtomicBool,
}

impl CycleState {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            loaded: AtomicBool::new(true),
        }
    }
}

/// Clonable read capability of a render cycle.
///
/// All clones share the cycle's started/loaded state, so nested reads in a
/// render closure accumulate into the same sweep.
#[derive(Clone)]
pub struct ContextReader {
    store: mpsc::Sender<StoreRequest>,
    actor: ActorId,
    state: Arc<CycleState>,
}

impl ContextReader {
    /// Reads `path` in `scope`, substituting `fallback` while data is still
    /// loading or the resolved member is absent.
    ///
    /// Only a blocked resolution marks the cycle incomplete; a resolved but
    /// absent member does not. A cached fetch error fails the read.
    pub async fn get(
        &self,
        path: impl Into<Path>,
        scope: Option<&Value>,
        fallback: Option<Value>,
    ) -> Result<Option<Value>, StoreError> {
        let resolution = self.resolve(path.into(), scope).await?;
        if resolution.is_loaded {
            Ok(resolution.value.or(fallback))
        } else {
            self.state.loaded.store(false, Ordering::SeqCst);
            Ok(fallback)
        }
    }

    /// Reads `path` in `scope`, returning the full [`Resolution`] without
    /// fallback substitution.
    pub async fn req(
        &self,
        path: impl Into<Path>,
        scope: Option<&Value>,
    ) -> Result<Resolution, StoreError> {
        let resolution = self.resolve(path.into(), scope).await?;
        if !resolution.is_loaded {
            self.state.loaded.store(false, Ordering::SeqCst);
        }
        Ok(resolution)
    }

    async fn resolve(&self, path: Path, scope: Option<&Value>) -> Result<Resolution, StoreError> {
        if !self.state.started.load(Ordering::SeqCst) {
            return Err(StoreError::NotStarted);
        }
        let (respond_to, response) = oneshot::channel();
        self.store
            .send(StoreRequest::Resolve {
                actor: self.actor,
                path,
                scope: scope.cloned(),
                respond_to,
            })
            .await
            .map_err(|_| StoreError::StoreClosed)?;
        match response.await.map_err(|_| StoreError::StoreDropped)? {
            Ok(resolution) => Ok(resolution),
            Err(error) => {
                self.state.loaded.store(false, Ordering::SeqCst);
                Err(error)
            }
        }
    }
}

/// One render cycle: `Idle → Started → Stopped`, reusable across passes.
pub struct RenderContext {
    reader: ContextReader,
    wake_tx: mpsc::Sender<RenderSignal>,
    wake_rx: mpsc::Receiver<RenderSignal>,
    destroyed: bool,
}

impl RenderContext {
    pub(crate) fn new(store: mpsc::Sender<StoreRequest>, actor: ActorId) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(16);
        Self {
            reader: ContextReader {
                store,
                actor,
                state: Arc::new(CycleState::new()),
            },
            wake_tx,
            wake_rx,
            destroyed: false,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.reader.actor
    }

    /// Whether every read so far in the current pass was served from cache.
    pub fn is_loaded(&self) -> bool {
        self.reader.state.loaded.load(Ordering::SeqCst)
    }

    /// A clonable read capability sharing this cycle's state.
    pub fn reader(&self) -> ContextReader {
        self.reader.clone()
    }

    /// Begins a pass: opens a fresh sweep (the previous pass's dependency set
    /// is replaced, not merged) and resets the loaded flag.
    pub async fn start(&mut self) -> Result<(), StoreError> {
        self.reader.state.loaded.store(true, Ordering::SeqCst);
        self.reader
            .store
            .send(StoreRequest::Start {
                actor: self.reader.actor,
                wake: self.wake_tx.clone(),
            })
            .await
            .map_err(|_| StoreError::StoreClosed)?;
        self.reader.state.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// See [`ContextReader::get`].
    pub async fn get(
        &self,
        path: impl Into<Path>,
        scope: Option<&Value>,
        fallback: Option<Value>,
    ) -> Result<Option<Value>, StoreError> {
        self.reader.get(path, scope, fallback).await
    }

    /// See [`ContextReader::req`].
    pub async fn req(
        &self,
        path: impl Into<Path>,
        scope: Option<&Value>,
    ) -> Result<Resolution, StoreError> {
        self.reader.req(path, scope).await
    }

    /// Ends the pass: finalizes the sweep and returns whether every read was
    /// served a cached, non-error value.
    pub async fn stop(&mut self) -> Result<bool, StoreError> {
        if !self.reader.state.started.swap(false, Ordering::SeqCst) {
            return Err(StoreError::NotStarted);
        }
        let (respond_to, response) = oneshot::channel();
        self.reader
            .store
            .send(StoreRequest::Stop {
                actor: self.reader.actor,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::StoreClosed)?;
        response.await.map_err(|_| StoreError::StoreDropped)?;
        Ok(self.reader.state.loaded.load(Ordering::SeqCst))
    }

    /// Waits for the next coalesced wake-up. Returns `None` once the store is
    /// gone.
    pub async fn wake(&mut self) -> Option<RenderSignal> {
        tokio::select! {
            signal = self.wake_rx.recv() => signal,
            _ = self.reader.store.closed() => None,
        }
    }

    /// Tears the cycle down, releasing all its referenced resources (eviction
    /// of shared resources still goes through the grace-window GC pass).
    pub async fn destroy(mut self) {
        self.destroyed = true;
        let _ = self
            .reader
            .store
            .send(StoreRequest::Destroy {
                actor: self.reader.actor,
            })
            .await;
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if !self.destroyed {
            let _ = self.reader.store.try_send(StoreRequest::Destroy {
                actor: self.reader.actor,
            });
        }
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("actor", &self.reader.actor)
            .field("is_loaded", &self.is_loaded())
            .finish()
    }
}
