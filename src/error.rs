//! Error types for the store.

use thiserror::Error;

use crate::client::ClientError;

/// Errors surfaced by [`HyperStore`](crate::HyperStore) and
/// [`RenderContext`](crate::RenderContext) operations.
///
/// Two families live here: **fetch errors** (`Fetch`), which were reported by
/// the hypermedia client, cached alongside the resource, and re-surfaced on
/// every read of that resource until it is reloaded or evicted; and
/// **configuration errors** (everything else), which indicate the caller used
/// the API out of order.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The cached fetch result for this resource is a failure.
    #[error("fetch for {id} failed: {source}")]
    Fetch {
        /// The resource id as it was originally requested.
        id: String,
        #[source]
        source: ClientError,
    },

    /// A cycle method was called before `start()`.
    #[error("the context has not been started")]
    NotStarted,

    /// The store actor is gone (every handle and task released it).
    #[error("store closed")]
    StoreClosed,

    /// The store actor dropped the response channel.
    #[error("store dropped response channel")]
    StoreDropped,
}
