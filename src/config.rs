//! Store tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and capacity configuration for a [`HyperStore`](crate::HyperStore).
///
/// All timers run on the tokio clock, so tests can pause and advance time
/// deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Per-context coalescing window: settlements touching one context
    /// within this window collapse into a single wake.
    pub debounce_window: Duration,
    /// Process-wide quiet window: `Complete` fires once no fetch has been
    /// in flight for this long.
    pub quiet_window: Duration,
    /// Period of the garbage-collection pass.
    pub gc_interval: Duration,
    /// Capacity of the store actor's request channel.
    pub request_buffer: usize,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(10),
            quiet_window: Duration::from_millis(50),
            gc_interval: Duration::from_millis(1000),
            request_buffer: 64,
            event_capacity: 64,
        }
    }
}
