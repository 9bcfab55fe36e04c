//! Events the store broadcasts to observers.

use std::time::Duration;

use crate::client::ClientError;

/// One settlement, as observed on the event channel.
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    /// The settled resource, in its originally requested spelling.
    pub id: String,
    /// Time from dispatch to settlement.
    pub latency: Duration,
    /// The failure the client reported, if any.
    pub error: Option<ClientError>,
}

/// Store lifecycle events, delivered via
/// [`HyperStore::subscribe`](crate::HyperStore::subscribe).
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A render-triggering mutation occurred (a fetch settled).
    Change(ChangeNotice),
    /// No fetch has been in flight for the full quiet window.
    Complete,
}
