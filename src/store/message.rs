//! Messages processed by the store actor.
//!
//! Everything that mutates store state arrives through this enum, so every
//! mutation happens inside one sequential message turn. Alongside the
//! requests sent by handles and contexts, the actor posts itself the
//! callbacks of its spawned tasks: fetch settlements and timer firings
//! (guarded by generation counters so a reset invalidates in-flight timers).

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use serde_json::Value;

use crate::client::FetchOutcome;
use crate::context::{ActorId, RenderSignal, Resolution};
use crate::error::StoreError;
use crate::path::Path;

#[derive(Debug)]
pub(crate) enum StoreRequest {
    /// Open a sweep for an actor, (re-)registering its wake channel.
    Start {
        actor: ActorId,
        wake: mpsc::Sender<RenderSignal>,
    },
    /// Resolve a path, counting touched resources into the open sweep.
    Resolve {
        actor: ActorId,
        path: Path,
        scope: Option<Value>,
        respond_to: oneshot::Sender<Result<Resolution, StoreError>>,
    },
    /// Finalize an actor's sweep.
    Stop {
        actor: ActorId,
        respond_to: oneshot::Sender<()>,
    },
    /// Remove an actor, releasing its references.
    Destroy { actor: ActorId },
    /// Force a fresh fetch for a cached resource.
    Reload { id: String },
    /// Run a GC pass now. `respond_to` reports how many ids were evicted.
    Gc {
        respond_to: Option<oneshot::Sender<usize>>,
    },
    /// A dispatched fetch produced its result.
    Settled {
        id: String,
        outcome: FetchOutcome,
        dispatched_at: Instant,
    },
    /// An actor's debounce window elapsed.
    DebounceFired { actor: ActorId, generation: u64 },
    /// The process-wide quiet window elapsed.
    QuietFired { generation: u64 },
    /// Periodic GC tick.
    GcTick,
}
