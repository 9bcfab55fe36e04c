//! Reference counting of resources across render cycles.
//!
//! The counter keeps, per actor, the set of resource ids its last finished
//! sweep touched (`committed`) and the set the in-progress sweep is touching
//! (`staging`), plus a `holders` index over their union. First-reference and
//! garbage transitions fall out of pure set membership: an id becomes
//! referenced when its holder set goes empty → non-empty (the fetch trigger)
//! and becomes garbage when it goes non-empty → empty.
//!
//! No events and no hidden iteration order: transitions are returned as values
//! from the operation that caused them.

use std::collections::{HashMap, HashSet};

use crate::context::ActorId;

#[derive(Debug, Default)]
pub(crate) struct ReferenceCounter {
    committed: HashMap<ActorId, HashSet<String>>,
    staging: HashMap<ActorId, HashSet<String>>,
    holders: HashMap<String, HashSet<ActorId>>,
}

impl ReferenceCounter {
    /// Opens a new sweep for `actor`, replacing any unfinished one.
    ///
    /// Ids only the discarded sweep was holding drop their references; the
    /// returned ids fell to zero holders.
    pub fn begin_sweep(&mut self, actor: ActorId) -> Vec<String> {
        let discarded = self.staging.insert(actor, HashSet::new());
        let mut garbage = Vec::new();
        if let Some(discarded) = discarded {
            let kept = self.committed.get(&actor);
            let dropped: Vec<String> = discarded
                .into_iter()
                .filter(|id| !kept.is_some_and(|set| set.contains(id)))
                .collect();
            for id in dropped {
                if self.release(&id, actor) {
                    garbage.push(id);
                }
            }
        }
        garbage
    }

    /// Marks `id` as touched by `actor`'s open sweep. Idempotent within one
    /// sweep. Returns `true` when this is the id's first reference anywhere.
    pub fn count(&mut self, actor: ActorId, id: &str) -> bool {
        let Some(staging) = self.staging.get_mut(&actor) else {
            return false;
        };
        if !staging.insert(id.to_owned()) {
            return false;
        }
        let holders = self.holders.entry(id.to_owned()).or_default();
        let first = holders.is_empty();
        holders.insert(actor);
        first
    }

    /// Finalizes `actor`'s open sweep: the staged set replaces the committed
    /// one. Returns every id that dropped to zero holders.
    pub fn finish_sweep(&mut self, actor: ActorId) -> Vec<String> {
        let Some(new) = self.staging.remove(&actor) else {
            return Vec::new();
        };
        let old = self.committed.insert(actor, new).unwrap_or_default();
        let kept = &self.committed[&actor];
        let dropped: Vec<String> = old.into_iter().filter(|id| !kept.contains(id)).collect();
        let mut garbage = Vec::new();
        for id in dropped {
            if self.release(&id, actor) {
                garbage.push(id);
            }
        }
        garbage
    }

    /// Removes `actor` entirely, releasing everything it held.
    pub fn destroy(&mut self, actor: ActorId) -> Vec<String> {
        let mut held: HashSet<String> = self.committed.remove(&actor).unwrap_or_default();
        held.extend(self.staging.remove(&actor).unwrap_or_default());
        let mut garbage = Vec::new();
        for id in held {
            if self.release(&id, actor) {
                garbage.push(id);
            }
        }
        garbage
    }

    /// Whether `actor` has an open sweep.
    pub fn is_open(&self, actor: ActorId) -> bool {
        self.staging.contains_key(&actor)
    }

    /// Whether any actor has an open sweep.
    pub fn has_open_sweeps(&self) -> bool {
        !self.staging.is_empty()
    }

    /// Actors whose committed or staged set holds `id`.
    pub fn holders(&self, id: &str) -> Vec<ActorId> {
        self.holders
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn release(&mut self, id: &str, actor: ActorId) -> bool {
        let Some(holders) = self.holders.get_mut(id) else {
            return false;
        };
        holders.remove(&actor);
        if holders.is_empty() {
            self.holders.remove(id);
            true
        } else {
            false
        }
    }
}
