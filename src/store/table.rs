//! Keyed storage for fetched resources, their aliases, and their
//! subscriptions.
//!
//! One [`ResourceTable`] is owned by the store actor. Entries are keyed by
//! canonical id; the alias map remembers the spelling each resource was first
//! requested under so dispatch and events use the form the client expects.

use std::collections::HashMap;

use serde_json::Value;
use tokio::time::Instant;

use crate::client::{ClientError, Subscription};
use crate::resolve::ResourceView;

/// A cached fetch result.
///
/// Both the value and the error slot are populated from settlement, so a
/// failed fetch yields a readable error instead of a retry loop.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub value: Option<Value>,
    pub error: Option<ClientError>,
    pub fetched_at: Instant,
}

/// Resource entries, alias map, and subscription registry.
///
/// Invariants: at most one entry per canonical id; an entry is present only
/// while its subscription slot is (the slot holds `None` while the fetch is
/// in flight); a subscription is torn down exactly once, on eviction or
/// replacement.
#[derive(Debug, Default)]
pub(crate) struct ResourceTable {
    entries: HashMap<String, ResourceEntry>,
    aliases: HashMap<String, String>,
    subscriptions: HashMap<String, Option<Subscription>>,
}

impl ResourceTable {
    /// Remembers the originally requested spelling for a canonical id.
    /// First spelling wins.
    pub fn record_alias(&mut self, canonical: &str, requested: &str) {
        if !self.aliases.contains_key(canonical) {
            self.aliases
                .insert(canonical.to_owned(), requested.to_owned());
        }
    }

    /// The spelling to dispatch and report for a canonical id.
    pub fn requested_id<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.aliases
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    /// Opens a subscription slot ahead of a fetch. Keeps an existing slot
    /// (reload) untouched.
    pub fn open(&mut self, canonical: &str) {
        self.subscriptions.entry(canonical.to_owned()).or_insert(None);
    }

    /// Whether a slot exists (entry cached or fetch in flight).
    pub fn is_open(&self, canonical: &str) -> bool {
        self.subscriptions.contains_key(canonical)
    }

    /// Records a settlement. Returns `false` if the id was evicted while the
    /// fetch was in flight; the entry is not re-created and `subscription`
    /// is dropped, which tears it down.
    pub fn settle(
        &mut self,
        canonical: &str,
        entry: ResourceEntry,
        subscription: Option<Subscription>,
    ) -> bool {
        let Some(slot) = self.subscriptions.get_mut(canonical) else {
            return false;
        };
        if subscription.is_some() {
            *slot = subscription;
        }
        self.entries.insert(canonical.to_owned(), entry);
        true
    }

    pub fn get(&self, canonical: &str) -> Option<&ResourceEntry> {
        self.entries.get(canonical)
    }

    /// Removes entry, alias, and subscription for an id. The subscription
    /// teardown runs here. Returns whether anything was removed.
    pub fn evict(&mut self, canonical: &str) -> bool {
        let entry = self.entries.remove(canonical).is_some();
        self.aliases.remove(canonical);
        match self.subscriptions.remove(canonical) {
            Some(Some(subscription)) => {
                subscription.unsubscribe();
                true
            }
            Some(None) => true,
            None => entry,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl ResourceView for ResourceTable {
    fn lookup(&self, canonical: &str) -> Option<&ResourceEntry> {
        self.entries.get(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entry(value: Value) -> ResourceEntry {
        ResourceEntry {
            value: Some(value),
            error: None,
            fetched_at: Instant::now(),
        }
    }

    fn counted_subscription(fired: &Arc<AtomicUsize>) -> Subscription {
        let fired = fired.clone();
        Subscription::new(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn settle_requires_an_open_slot() {
        let mut table = ResourceTable::default();
        let fired = Arc::new(AtomicUsize::new(0));

        // never opened: settlement is discarded and its subscription torn down
        let accepted = table.settle(
            "/users",
            entry(json!({"a": 1})),
            Some(counted_subscription(&fired)),
        );
        assert!(!accepted);
        assert!(table.get("/users").is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        table.open("/users");
        let accepted = table.settle(
            "/users",
            entry(json!({"a": 1})),
            Some(counted_subscription(&fired)),
        );
        assert!(accepted);
        assert!(table.get("/users").is_some());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evict_tears_down_exactly_once() {
        let mut table = ResourceTable::default();
        let fired = Arc::new(AtomicUsize::new(0));

        table.record_alias("/users", "proto:/users");
        table.open("/users");
        table.settle(
            "/users",
            entry(json!({})),
            Some(counted_subscription(&fired)),
        );

        assert!(table.evict("/users"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!table.is_open("/users"));
        assert_eq!(table.requested_id("/users"), "/users");

        assert!(!table.evict("/users"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reload_settlement_replaces_the_subscription() {
        let mut table = ResourceTable::default();
        let fired = Arc::new(AtomicUsize::new(0));

        table.open("/users");
        table.settle(
            "/users",
            entry(json!({"rev": 1})),
            Some(counted_subscription(&fired)),
        );
        // second settlement (reload): old handle is dropped, new one adopted
        table.settle(
            "/users",
            entry(json!({"rev": 2})),
            Some(counted_subscription(&fired)),
        );
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(
            table.get("/users").and_then(|e| e.value.clone()),
            Some(json!({"rev": 2}))
        );

        table.evict("/users");
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn first_alias_wins() {
        let mut table = ResourceTable::default();
        table.record_alias("/users", "proto:/users");
        table.record_alias("/users", "/users");
        assert_eq!(table.requested_id("/users"), "proto:/users");
    }
}
