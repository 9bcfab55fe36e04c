//! # Hypermedia Client Boundary
//!
//! The store does no network I/O itself. It consumes a [`HyperClient`]: an
//! async trait the application implements over its actual transport (HTTP,
//! websocket, whatever serves the hypermedia graph). The store guarantees it
//! dispatches at most one fetch per resource while a subscription is open,
//! and tears the subscription down exactly once when the resource is evicted.
//!
//! # Testing
//!
//! See the [`mock`] module for a scriptable in-memory client used throughout
//! the test suite.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub mod mock;

/// Canonical id of the distinguished root resource.
pub const ROOT_RESOURCE: &str = "__root__";

/// Strips any `scheme:` prefix from a resource id.
///
/// The same logical resource may be requested as `proto:/users` by one
/// document and `/users` by another; the cache keys on the canonical form and
/// keeps the original spelling in its alias map for dispatch.
pub fn canonical_id(href: &str) -> &str {
    match href.split_once(':') {
        Some((scheme, rest)) if !scheme.is_empty() => rest,
        _ => href,
    }
}

/// Errors a [`HyperClient`] may report for a fetch.
///
/// These are cached per resource and re-surfaced synchronously on every read
/// of that resource (as [`StoreError::Fetch`](crate::StoreError::Fetch))
/// until it is reloaded or evicted. Retry policy belongs to the client, not
/// the store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// The resource does not exist upstream.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The transport failed before a response was produced.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status} for {id}")]
    Status { id: String, status: u16 },
}

/// A live subscription to a resource, torn down exactly once.
///
/// Teardown runs either through [`unsubscribe`](Subscription::unsubscribe) or
/// when the handle is dropped (which covers store shutdown), whichever comes
/// first.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Runs the teardown now.
    pub fn unsubscribe(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("armed", &self.teardown.is_some())
            .finish()
    }
}

/// The result of one dispatched fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The resource body, or the error the client reports for it.
    pub body: Result<Value, ClientError>,
    /// Handle keeping any underlying transport subscription open. `None` for
    /// one-shot transports.
    pub subscription: Option<Subscription>,
}

impl FetchOutcome {
    pub fn value(body: Value) -> Self {
        Self {
            body: Ok(body),
            subscription: None,
        }
    }

    pub fn error(error: ClientError) -> Self {
        Self {
            body: Err(error),
            subscription: None,
        }
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }
}

/// The external hypermedia client the store fetches through.
///
/// Each call produces exactly one [`FetchOutcome`]. The store invokes `root`
/// for the [`ROOT_RESOURCE`] sentinel and `get` for everything else, always
/// with the originally requested spelling of the id (scheme prefix intact).
#[async_trait]
pub trait HyperClient: Send + Sync + 'static {
    /// Fetch the root resource of the graph.
    async fn root(&self) -> FetchOutcome;

    /// Fetch the resource at `href`.
    async fn get(&self, href: &str) -> FetchOutcome;

    /// Purge any transport-level cache for `href` before a reload.
    ///
    /// The store calls this ahead of every reload dispatch; transports
    /// without their own cache keep the default no-op.
    async fn clear(&self, _href: &str) {}
}
