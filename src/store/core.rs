//! # The Store Actor
//!
//! One `StoreActor` task owns every piece of shared state: the resource
//! table, the reference counter, the pending-garbage flags, the pending-fetch
//! counter, and the scheduler generations. It processes [`StoreRequest`]
//! messages strictly sequentially, so no mutation ever races another:
//! the single-threaded-callback model without locks.
//!
//! Anything asynchronous (fetches, debounce windows, the quiet window, GC
//! ticks) runs as a spawned task that posts a message back into the loop.
//! Timer resets are generation counters: bumping the generation strands the
//! in-flight timer task, whose firing message no longer matches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::client::{canonical_id, FetchOutcome, HyperClient, ROOT_RESOURCE};
use crate::config::StoreConfig;
use crate::context::{ActorId, RenderSignal, Resolution};
use crate::counter::ReferenceCounter;
use crate::error::StoreError;
use crate::event::{ChangeNotice, StoreEvent};
use crate::path::Path;
use crate::resolve;
use crate::store::message::StoreRequest;
use crate::store::table::{ResourceEntry, ResourceTable};

#[derive(Debug, Default)]
struct DebounceState {
    generation: u64,
    signal: Option<RenderSignal>,
}

// =============================================================================
// 1. THE ACTOR
// =============================================================================

/// The server half of the store.
///
/// Created by [`HyperStore::with_config`](crate::HyperStore::with_config) and
/// consumed by [`run`](StoreActor::run) in its own task. The loop ends when
/// every handle, context, and in-flight fetch has released its sender;
/// dropping the table then tears down all remaining subscriptions.
pub(crate) struct StoreActor<C: HyperClient> {
    receiver: mpsc::Receiver<StoreRequest>,
    sender: mpsc::Sender<StoreRequest>,
    client: Arc<C>,
    config: StoreConfig,
    table: ResourceTable,
    counter: ReferenceCounter,
    garbage: HashSet<String>,
    pending: usize,
    wakes: HashMap<ActorId, mpsc::Sender<RenderSignal>>,
    debounce: HashMap<ActorId, DebounceState>,
    quiet_generation: u64,
    events: broadcast::Sender<StoreEvent>,
}

impl<C: HyperClient> StoreActor<C> {
    pub fn new(
        receiver: mpsc::Receiver<StoreRequest>,
        sender: mpsc::Sender<StoreRequest>,
        client: Arc<C>,
        config: StoreConfig,
        events: broadcast::Sender<StoreEvent>,
    ) -> Self {
        Self {
            receiver,
            sender,
            client,
            config,
            table: ResourceTable::default(),
            counter: ReferenceCounter::default(),
            garbage: HashSet::new(),
            pending: 0,
            wakes: HashMap::new(),
            debounce: HashMap::new(),
            quiet_generation: 0,
            events,
        }
    }

    /// Runs the message loop until the channel closes.
    pub async fn run(mut self) {
        info!("store started");
        self.spawn_gc_ticker();
        while let Some(msg) = self.receiver.recv().await {
            self.handle(msg);
        }
        info!(resources = self.table.len(), "store shutdown");
    }

    fn handle(&mut self, msg: StoreRequest) {
        match msg {
            StoreRequest::Start { actor, wake } => self.handle_start(actor, wake),
            StoreRequest::Resolve {
                actor,
                path,
                scope,
                respond_to,
            } => self.handle_resolve(actor, path, scope, respond_to),
            StoreRequest::Stop { actor, respond_to } => self.handle_stop(actor, respond_to),
            StoreRequest::Destroy { actor } => self.handle_destroy(actor),
            StoreRequest::Reload { id } => self.handle_reload(id),
            StoreRequest::Gc { respond_to } => {
                let evicted = self.run_gc();
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(evicted);
                }
            }
            StoreRequest::Settled {
                id,
                outcome,
                dispatched_at,
            } => self.handle_settled(id, outcome, dispatched_at),
            StoreRequest::DebounceFired { actor, generation } => {
                self.handle_debounce_fired(actor, generation)
            }
            StoreRequest::QuietFired { generation } => self.handle_quiet_fired(generation),
            StoreRequest::GcTick => {
                self.run_gc();
            }
        }
    }

    // =========================================================================
    // 2. RENDER CYCLES & RESOLUTION
    // =========================================================================

    fn handle_start(&mut self, actor: ActorId, wake: mpsc::Sender<RenderSignal>) {
        self.wakes.insert(actor, wake);
        for id in self.counter.begin_sweep(actor) {
            self.flag_garbage(id);
        }
        trace!(%actor, "sweep opened");
    }

    fn handle_resolve(
        &mut self,
        actor: ActorId,
        path: Path,
        scope: Option<Value>,
        respond_to: oneshot::Sender<Result<Resolution, StoreError>>,
    ) {
        if !self.counter.is_open(actor) {
            let _ = respond_to.send(Err(StoreError::NotStarted));
            return;
        }
        let outcome = resolve::resolve(&path, scope.as_ref(), &self.table);
        for touched in &outcome.touched {
            self.table.record_alias(&touched.canonical, &touched.requested);
            if self.counter.count(actor, &touched.canonical) {
                self.first_reference(&touched.canonical);
            }
        }
        let result = match outcome.error {
            Some((id, source)) => {
                let id = self.table.requested_id(&id).to_owned();
                Err(StoreError::Fetch { id, source })
            }
            None => Ok(Resolution {
                value: outcome.value,
                is_loaded: outcome.is_loaded,
                completed: outcome.is_loaded,
                path,
            }),
        };
        let _ = respond_to.send(result);
    }

    fn handle_stop(&mut self, actor: ActorId, respond_to: oneshot::Sender<()>) {
        for id in self.counter.finish_sweep(actor) {
            self.flag_garbage(id);
        }
        self.arm_quiet();
        trace!(%actor, "sweep finalized");
        let _ = respond_to.send(());
    }

    fn handle_destroy(&mut self, actor: ActorId) {
        self.wakes.remove(&actor);
        self.debounce.remove(&actor);
        for id in self.counter.destroy(actor) {
            self.flag_garbage(id);
        }
        debug!(%actor, "context destroyed");
    }

    // =========================================================================
    // 3. FETCH DISPATCH & SETTLEMENT
    // =========================================================================

    fn first_reference(&mut self, canonical: &str) {
        if self.garbage.remove(canonical) {
            // the entry and its subscription are still live; no re-dispatch
            debug!(id = %canonical, "resurrected before eviction");
            return;
        }
        self.dispatch(canonical, false);
    }

    fn dispatch(&mut self, canonical: &str, reload: bool) {
        let requested = self.table.requested_id(canonical).to_owned();
        self.table.open(canonical);
        self.pending += 1;
        // a new fetch cancels any armed completion timer
        self.quiet_generation += 1;
        debug!(id = %requested, reload, pending = self.pending, "fetch dispatched");

        let client = self.client.clone();
        let tx = self.sender.clone();
        let id = canonical.to_owned();
        let is_root = canonical == ROOT_RESOURCE;
        tokio::spawn(async move {
            if reload {
                client.clear(&requested).await;
            }
            let dispatched_at = Instant::now();
            let outcome = if is_root {
                client.root().await
            } else {
                client.get(&requested).await
            };
            let _ = tx
                .send(StoreRequest::Settled {
                    id,
                    outcome,
                    dispatched_at,
                })
                .await;
        });
    }

    fn handle_settled(&mut self, id: String, outcome: FetchOutcome, dispatched_at: Instant) {
        self.pending = self.pending.saturating_sub(1);
        let latency = dispatched_at.elapsed();
        let requested = self.table.requested_id(&id).to_owned();
        let (value, error) = match outcome.body {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        let entry = ResourceEntry {
            value: value.clone(),
            error: error.clone(),
            fetched_at: Instant::now(),
        };
        if self.table.settle(&id, entry, outcome.subscription) {
            match &error {
                Some(error) => warn!(id = %requested, %error, ?latency, "fetch failed"),
                None => debug!(id = %requested, ?latency, pending = self.pending, "fetch settled"),
            }
            for actor in self.counter.holders(&id) {
                self.schedule_debounce(
                    actor,
                    RenderSignal {
                        id: requested.clone(),
                        value: value.clone(),
                        error: error.clone(),
                    },
                );
            }
        } else {
            // evicted while in flight: the fresh subscription just dropped
            debug!(id = %requested, "settlement after eviction discarded");
        }
        let _ = self.events.send(StoreEvent::Change(ChangeNotice {
            id: requested,
            latency,
            error,
        }));
        self.arm_quiet();
    }

    fn handle_reload(&mut self, id: String) {
        let canonical = canonical_id(&id).to_owned();
        if self.garbage.contains(&canonical) {
            debug!(id = %canonical, "reload skipped: flagged for collection");
            return;
        }
        if !self.table.is_open(&canonical) {
            debug!(id = %canonical, "reload skipped: never requested");
            return;
        }
        self.dispatch(&canonical, true);
    }

    // =========================================================================
    // 4. SCHEDULER (debounce + quiescence)
    // =========================================================================

    fn schedule_debounce(&mut self, actor: ActorId, signal: RenderSignal) {
        if !self.wakes.contains_key(&actor) {
            return;
        }
        let state = self.debounce.entry(actor).or_default();
        state.generation += 1;
        state.signal = Some(signal);
        let generation = state.generation;
        let window = self.config.debounce_window;
        let tx = self.sender.clone();
        tokio::spawn(async move {
            sleep(window).await;
            let _ = tx
                .send(StoreRequest::DebounceFired { actor, generation })
                .await;
        });
    }

    fn handle_debounce_fired(&mut self, actor: ActorId, generation: u64) {
        let Some(state) = self.debounce.get_mut(&actor) else {
            return;
        };
        if state.generation != generation {
            return;
        }
        let Some(signal) = state.signal.take() else {
            return;
        };
        if let Some(wake) = self.wakes.get(&actor) {
            if wake.try_send(signal).is_err() {
                trace!(%actor, "wake dropped: receiver saturated or gone");
            }
        }
    }

    fn arm_quiet(&mut self) {
        self.quiet_generation += 1;
        let generation = self.quiet_generation;
        let window = self.config.quiet_window;
        let tx = self.sender.clone();
        tokio::spawn(async move {
            sleep(window).await;
            let _ = tx.send(StoreRequest::QuietFired { generation }).await;
        });
    }

    fn handle_quiet_fired(&mut self, generation: u64) {
        if generation != self.quiet_generation || self.pending != 0 {
            return;
        }
        debug!("network quiescent");
        let _ = self.events.send(StoreEvent::Complete);
    }

    // =========================================================================
    // 5. GARBAGE COLLECTION
    // =========================================================================

    fn flag_garbage(&mut self, id: String) {
        debug!(id = %id, "unreferenced, flagged for collection");
        self.garbage.insert(id);
    }

    /// Evicts everything still flagged. Deferred while any sweep is open so
    /// eviction never interleaves with in-progress counting; the next tick
    /// (or manual call) retries.
    fn run_gc(&mut self) -> usize {
        if self.counter.has_open_sweeps() {
            debug!("gc deferred: sweep in progress");
            return 0;
        }
        let flagged: Vec<String> = self.garbage.drain().collect();
        for id in &flagged {
            self.table.evict(id);
            debug!(id = %id, "evicted");
        }
        if !flagged.is_empty() {
            info!(evicted = flagged.len(), resources = self.table.len(), "gc pass complete");
        }
        flagged.len()
    }

    fn spawn_gc_ticker(&self) {
        let weak = self.sender.downgrade();
        let period = self.config.gc_interval;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(tx) = weak.upgrade() else { break };
                if tx.send(StoreRequest::GcTick).await.is_err() {
                    break;
                }
            }
        });
    }
}
