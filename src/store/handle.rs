//! # The Store Handle
//!
//! [`HyperStore`] is the client half of the store: a cheap-to-clone handle
//! holding the request sender, the event channel, and a built-in global
//! render context for simple single-view applications. Constructing a store
//! spawns its actor task; the store shuts down once every handle, context,
//! and in-flight fetch has released its sender.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

use crate::client::HyperClient;
use crate::config::StoreConfig;
use crate::context::{ActorId, ContextReader, RenderContext, Resolution};
use crate::error::StoreError;
use crate::event::StoreEvent;
use crate::path::Path;
use crate::store::core::StoreActor;
use crate::store::message::StoreRequest;

/// A reactive cache over a hypermedia resource graph.
///
/// Cloning shares the same underlying store: resources fetched for one
/// context are immediately visible to every other, with no duplicate fetch.
///
/// # Example
///
/// ```
/// use hyper_store::{mock::MockHyperClient, HyperStore};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), hyper_store::StoreError> {
/// let client = MockHyperClient::new();
/// client.insert_root(json!({"users": {"href": "/users"}}));
/// client.insert("/users", json!({"collection": [{"href": "/users/1"}]}));
/// client.insert("/users/1", json!({"name": "Mike"}));
///
/// let store = HyperStore::new(client);
/// let name = store
///     .get_async(|ctx| async move { ctx.get(".users.collection.0.name", None, None).await })
///     .await?;
/// assert_eq!(name, Some(json!("Mike")));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HyperStore {
    sender: mpsc::Sender<StoreRequest>,
    events: broadcast::Sender<StoreEvent>,
    next_actor: Arc<AtomicU64>,
    global: Arc<Mutex<RenderContext>>,
}

impl HyperStore {
    /// Creates a store over `client` with default timings.
    pub fn new<C: HyperClient>(client: C) -> Self {
        Self::with_config(client, StoreConfig::default())
    }

    /// Creates a store over `client` and spawns its actor task.
    pub fn with_config<C: HyperClient>(client: C, config: StoreConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.request_buffer);
        let (events, _) = broadcast::channel(config.event_capacity);
        let actor = StoreActor::new(
            receiver,
            sender.clone(),
            Arc::new(client),
            config,
            events.clone(),
        );
        tokio::spawn(actor.run());

        let next_actor = Arc::new(AtomicU64::new(0));
        let global = RenderContext::new(
            sender.clone(),
            ActorId::from_raw(next_actor.fetch_add(1, Ordering::SeqCst)),
        );
        Self {
            sender,
            events,
            next_actor,
            global: Arc::new(Mutex::new(global)),
        }
    }

    /// Creates an independent render cycle.
    pub fn context(&self) -> RenderContext {
        RenderContext::new(
            self.sender.clone(),
            ActorId::from_raw(self.next_actor.fetch_add(1, Ordering::SeqCst)),
        )
    }

    /// Subscribes to [`StoreEvent`]s (`Change` per settlement, `Complete` on
    /// quiescence).
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Begins a pass on the built-in global context.
    pub async fn start(&self) -> Result<(), StoreError> {
        self.global.lock().await.start().await
    }

    /// Ends the global pass, returning whether it was fully loaded.
    pub async fn stop(&self) -> Result<bool, StoreError> {
        self.global.lock().await.stop().await
    }

    /// Convenience read on the global context (which must be started).
    pub async fn get(
        &self,
        path: impl Into<Path>,
        scope: Option<&Value>,
    ) -> Result<Resolution, StoreError> {
        self.global.lock().await.req(path, scope).await
    }

    /// Forces a fresh fetch for `id`, even though a valid cached entry
    /// exists. No-op for ids never requested or currently flagged as
    /// garbage.
    pub async fn reload(&self, id: &str) -> Result<(), StoreError> {
        self.sender
            .send(StoreRequest::Reload { id: id.to_owned() })
            .await
            .map_err(|_| StoreError::StoreClosed)
    }

    /// Runs a GC pass now, returning how many resources were evicted.
    pub async fn gc(&self) -> Result<usize, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Gc {
                respond_to: Some(respond_to),
            })
            .await
            .map_err(|_| StoreError::StoreClosed)?;
        response.await.map_err(|_| StoreError::StoreDropped)
    }

    /// Runs `render` repeatedly (once immediately, then again on every
    /// coalesced wake) until a pass completes fully loaded, then tears the
    /// cycle down and resolves once with the final result.
    ///
    /// A render error ends the loop and is returned as-is; cached fetch
    /// errors surface this way on the pass after the failing settlement.
    pub async fn get_async<T, F, Fut>(&self, mut render: F) -> Result<T, StoreError>
    where
        F: FnMut(ContextReader) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut context = self.context();
        loop {
            context.start().await?;
            let output = render(context.reader()).await;
            // finalize the sweep even when the render failed, so partial
            // counts commit instead of leaving the sweep open
            let loaded = context.stop().await?;
            match output {
                Err(error) => {
                    context.destroy().await;
                    return Err(error);
                }
                Ok(value) if loaded => {
                    context.destroy().await;
                    return Ok(value);
                }
                Ok(_) => {
                    if context.wake().await.is_none() {
                        return Err(StoreError::StoreClosed);
                    }
                }
            }
        }
    }
}
