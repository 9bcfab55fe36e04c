//! # Hyper Store
//!
//! > **A render-cycle-synchronized cache over a hypermedia resource graph.**
//!
//! Rendering code declares its data dependencies by *path expression*
//! (`.users.collection.0.name`) and the store fetches, caches, and re-wakes
//! the renderer as resources arrive asynchronously, out of order, across
//! overlapping render cycles, while reference-counted garbage collection
//! reclaims whatever no cycle references anymore.
//!
//! ## 🏗️ Design
//!
//! All shared state lives in a single **store actor** task that processes
//! requests sequentially: no locks, no data races, and every invariant is
//! maintained inside one message turn. Render contexts and store handles are
//! thin, clonable channel clients.
//!
//! - **Reads never block on the network.** `get` returns the cached value,
//!   or the fallback while data is loading (marking the pass incomplete).
//! - **Fetch-on-demand, exactly once.** The first cycle to walk through a
//!   link triggers the fetch; concurrent cycles share it.
//! - **Coalesced re-renders.** Settlements within a debounce window collapse
//!   into one wake per context; a process-wide quiet window yields a single
//!   `Complete` event when the network settles.
//! - **Grace-window GC.** Resources dropped by every cycle are flagged, not
//!   evicted; re-referencing before the next pass resurrects them for free.
//!
//! ## 🗺️ Module Tour
//!
//! - [`store`]: the actor, its [`HyperStore`] handle, the message loop, and
//!   the resource table.
//! - [`context`]: render cycles ([`RenderContext`], [`ContextReader`]).
//! - [`path`]: path expressions ([`Path`], [`PathSegment`]).
//! - [`client`]: the consumed [`HyperClient`] boundary and the [`mock`]
//!   test double.
//! - [`config`], [`event`], [`error`], [`lifecycle`]: tuning, events,
//!   errors, tracing setup.
//!
//! ## 🚀 Quick Start
//!
//! ```
//! use hyper_store::{mock::MockHyperClient, HyperStore};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), hyper_store::StoreError> {
//! let client = MockHyperClient::new();
//! client.insert_root(json!({"users": {"href": "/users"}}));
//! client.insert("/users", json!({"collection": [{"href": "/users/1"}]}));
//! client.insert("/users/1", json!({"name": "Mike"}));
//!
//! let store = HyperStore::new(client);
//! let name = store
//!     .get_async(|ctx| async move { ctx.get(".users.collection.0.name", None, None).await })
//!     .await?;
//! assert_eq!(name, Some(json!("Mike")));
//! # Ok(())
//! # }
//! ```
//!
//! Driving a cycle by hand:
//!
//! ```ignore
//! let mut ctx = store.context();
//! loop {
//!     ctx.start().await?;
//!     let title = ctx.get(".quizzes.trending.0.title", None, None).await?;
//!     render(title);
//!     if ctx.stop().await? {
//!         break;
//!     }
//!     ctx.wake().await;
//! }
//! ```
//!
//! ## 🧪 Testing
//!
//! [`mock::MockHyperClient`] serves a seeded resource graph with simulated
//! latencies and records every dispatch, clear, and unsubscribe. Combined
//! with tokio's paused clock, the debounce, quiet, and GC windows become
//! fully deterministic.

pub mod client;
pub mod config;
pub mod context;
mod counter;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod path;
mod resolve;
pub mod store;

pub use client::mock;
pub use client::{
    canonical_id, ClientError, FetchOutcome, HyperClient, Subscription, ROOT_RESOURCE,
};
pub use config::StoreConfig;
pub use context::{ActorId, ContextReader, RenderContext, RenderSignal, Resolution};
pub use error::StoreError;
pub use event::{ChangeNotice, StoreEvent};
pub use path::{Path, PathSegment};
pub use store::HyperStore;
