//! # Mock Hypermedia Client
//!
//! A scriptable in-memory [`HyperClient`] for testing stores without a
//! network. Seed it with a resource graph, optionally give hrefs individual
//! latencies, and assert on the operation log afterwards.
//!
//! # Testing Strategy
//!
//! Fetches resolve after a simulated latency on the tokio clock, so tests
//! running under `tokio::time::pause` stay fully deterministic while still
//! exercising real orderings (debounce windows, the quiet window, out-of-
//! order settlements).
//!
//! # Example
//! ```
//! use hyper_store::mock::MockHyperClient;
//! use serde_json::json;
//!
//! let client = MockHyperClient::new();
//! client.insert_root(json!({"users": {"href": "/users"}}));
//! client.insert("/users", json!({"collection": []}));
//! assert_eq!(client.dispatch_count("/users"), 0);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;

use super::{ClientError, FetchOutcome, HyperClient, Subscription, ROOT_RESOURCE};

/// One recorded client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Root,
    Get(String),
    Clear(String),
}

#[derive(Default)]
struct MockInner {
    resources: Mutex<HashMap<String, Result<Value, ClientError>>>,
    latencies: Mutex<HashMap<String, Duration>>,
    default_latency: Mutex<Duration>,
    log: Mutex<Vec<MockOp>>,
    unsubscribed: Mutex<Vec<String>>,
    open_subscriptions: AtomicUsize,
}

/// A clonable mock client; clones share one resource graph and one log.
#[derive(Clone, Default)]
pub struct MockHyperClient {
    inner: Arc<MockInner>,
}

impl MockHyperClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds (or replaces) the body served for `href`.
    pub fn insert(&self, href: impl Into<String>, body: Value) {
        self.inner
            .resources
            .lock()
            .unwrap()
            .insert(href.into(), Ok(body));
    }

    /// Seeds the root resource body.
    pub fn insert_root(&self, body: Value) {
        self.insert(ROOT_RESOURCE, body);
    }

    /// Makes fetches of `href` fail with `error`.
    pub fn fail(&self, href: impl Into<String>, error: ClientError) {
        self.inner
            .resources
            .lock()
            .unwrap()
            .insert(href.into(), Err(error));
    }

    /// Simulated latency applied to every fetch without an override.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.default_latency.lock().unwrap() = latency;
    }

    /// Per-href latency override, for forcing out-of-order settlements.
    pub fn set_latency_for(&self, href: impl Into<String>, latency: Duration) {
        self.inner
            .latencies
            .lock()
            .unwrap()
            .insert(href.into(), latency);
    }

    /// Every operation dispatched so far, in order.
    pub fn operations(&self) -> Vec<MockOp> {
        self.inner.log.lock().unwrap().clone()
    }

    /// How many fetches were dispatched for `href` (use [`ROOT_RESOURCE`]
    /// for the root).
    pub fn dispatch_count(&self, href: &str) -> usize {
        self.inner
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|op| match op {
                MockOp::Root => href == ROOT_RESOURCE,
                MockOp::Get(h) => h == href,
                MockOp::Clear(_) => false,
            })
            .count()
    }

    /// How many times `clear` was invoked for `href`.
    pub fn clear_count(&self, href: &str) -> usize {
        self.inner
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, MockOp::Clear(h) if h == href))
            .count()
    }

    /// How many subscriptions to `href` were torn down.
    pub fn unsubscribe_count(&self, href: &str) -> usize {
        self.inner
            .unsubscribed
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.as_str() == href)
            .count()
    }

    /// Subscriptions handed out and not yet torn down.
    pub fn open_subscriptions(&self) -> usize {
        self.inner.open_subscriptions.load(Ordering::SeqCst)
    }

    async fn fetch(&self, href: &str, op: MockOp) -> FetchOutcome {
        self.inner.log.lock().unwrap().push(op);
        let latency = {
            let latencies = self.inner.latencies.lock().unwrap();
            latencies
                .get(href)
                .copied()
                .unwrap_or(*self.inner.default_latency.lock().unwrap())
        };
        if !latency.is_zero() {
            sleep(latency).await;
        }
        let body = self
            .inner
            .resources
            .lock()
            .unwrap()
            .get(href)
            .cloned()
            .unwrap_or_else(|| Err(ClientError::NotFound(href.to_owned())));

        self.inner.open_subscriptions.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        let subscribed = href.to_owned();
        let subscription = Subscription::new(move || {
            inner.unsubscribed.lock().unwrap().push(subscribed);
            inner.open_subscriptions.fetch_sub(1, Ordering::SeqCst);
        });

        FetchOutcome {
            body,
            subscription: Some(subscription),
        }
    }
}

#[async_trait]
impl HyperClient for MockHyperClient {
    async fn root(&self) -> FetchOutcome {
        self.fetch(ROOT_RESOURCE, MockOp::Root).await
    }

    async fn get(&self, href: &str) -> FetchOutcome {
        self.fetch(href, MockOp::Get(href.to_owned())).await
    }

    async fn clear(&self, href: &str) {
        self.inner
            .log
            .lock()
            .unwrap()
            .push(MockOp::Clear(href.to_owned()));
    }
}
