//! The `RequestStore`: every live service request plus this tick's staged
//! creations and removals.
//!
//! # Dedup
//!
//! `index` maps `(target, kind, reversed)` to the one request allowed for
//! that key, across both live and staged records.  A second submission for
//! the same key merges into the existing record instead of creating one.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

use sd_core::{EntityId, RequestId, RequestKind, Tick};

use crate::request::{NewRequest, ServiceRequest};
use crate::validate::DropReason;
use crate::{RequestError, RequestResult};

type DedupKey = (EntityId, RequestKind, bool);

/// Outcome of [`RequestStore::submit`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(RequestId),
    Merged(RequestId),
}

impl SubmitOutcome {
    pub fn id(self) -> RequestId {
        match self {
            SubmitOutcome::Created(id) | SubmitOutcome::Merged(id) => id,
        }
    }
}

/// Why a request leaves the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Removal {
    Serviced,
    Dropped(DropReason),
}

/// What a `commit` made visible or removed.
#[derive(Debug, Default)]
pub struct CommitSummary {
    pub created: Vec<RequestId>,
    pub removed: Vec<(ServiceRequest, Removal)>,
}

#[derive(Debug)]
pub struct RequestStore {
    live:     BTreeMap<RequestId, ServiceRequest>,
    staged:   BTreeMap<RequestId, ServiceRequest>,
    removals: BTreeMap<RequestId, Removal>,
    index:    HashMap<DedupKey, RequestId>,
    next_id:  RequestId,
}

impl RequestStore {
    pub fn new() -> Self {
        Self {
            live:     BTreeMap::new(),
            staged:   BTreeMap::new(),
            removals: BTreeMap::new(),
            index:    HashMap::new(),
            next_id:  RequestId(0),
        }
    }

    /// Rebuild a store from persisted requests.  Everything is live.
    pub fn from_requests(requests: Vec<ServiceRequest>, next_id: RequestId) -> Self {
        let mut store = Self::new();
        for request in requests {
            store.index.insert(key_of(&request), request.id);
            if request.id >= store.next_id {
                store.next_id = request.id.next();
            }
            store.live.insert(request.id, request);
        }
        if next_id > store.next_id {
            store.next_id = next_id;
        }
        store
    }

    // ── Producer side ─────────────────────────────────────────────────────

    /// Create a request, or merge into the existing one for the same target,
    /// kind and direction.  New requests become visible at the next commit.
    pub fn submit(&mut self, new: NewRequest, default_group: u32, now: Tick) -> SubmitOutcome {
        let key = (new.target, new.kind, new.reversed);
        if let Some(&id) = self.index.get(&key) {
            if !self.removals.contains_key(&id) {
                if let Some(existing) = self.staged.get_mut(&id).or_else(|| self.live.get_mut(&id)) {
                    existing.merge(&new);
                    debug!("merged {} request for {} into {id}", new.kind, new.target);
                    return SubmitOutcome::Merged(id);
                }
            }
        }

        let id = self.next_id;
        self.next_id = id.next();
        let request = ServiceRequest {
            id,
            target: new.target,
            kind: new.kind,
            priority: new.priority,
            source_binding: None,
            fail_count: 0,
            cooldown: 0,
            reversed: new.reversed,
            group_size: new.group_size.unwrap_or(default_group).max(1),
            detected: new.detected,
            created: now,
            search: None,
        };
        self.index.insert(key, id);
        self.staged.insert(id, request);
        SubmitOutcome::Created(id)
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    /// A committed request.  Staged requests are not visible yet.
    pub fn get(&self, id: RequestId) -> Option<&ServiceRequest> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut ServiceRequest> {
        self.live.get_mut(&id)
    }

    /// Live and not scheduled for removal.
    pub fn is_alive(&self, id: RequestId) -> bool {
        self.live.contains_key(&id) && !self.removals.contains_key(&id)
    }

    /// Committed requests in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceRequest> {
        self.live.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ServiceRequest> {
        self.live.values_mut()
    }

    /// Request (live or staged) holding the dedup slot for this key.
    pub fn find(&self, target: EntityId, kind: RequestKind, reversed: bool) -> Option<RequestId> {
        self.index
            .get(&(target, kind, reversed))
            .copied()
            .filter(|id| !self.removals.contains_key(id))
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn next_id(&self) -> RequestId {
        self.next_id
    }

    // ── Binding ───────────────────────────────────────────────────────────

    /// Bind a request to a dispatch source.  Rebinding to the same source is
    /// a no-op; binding to a different one fails.
    pub fn bind(&mut self, id: RequestId, source: EntityId) -> RequestResult<()> {
        let request = self.live.get_mut(&id).ok_or(RequestError::NotFound(id))?;
        match request.source_binding {
            Some(bound_to) if bound_to != source => {
                Err(RequestError::AlreadyBound { request: id, bound_to, candidate: source })
            }
            _ => {
                request.source_binding = Some(source);
                request.search = None;
                Ok(())
            }
        }
    }

    /// Move an existing binding to another source (station handing a
    /// dispatch to the vehicle it spawned).
    pub fn rebind(&mut self, id: RequestId, from: EntityId, to: EntityId) -> RequestResult<()> {
        let request = self.live.get_mut(&id).ok_or(RequestError::NotFound(id))?;
        match request.source_binding {
            Some(bound_to) if bound_to == from => {
                request.source_binding = Some(to);
                Ok(())
            }
            Some(bound_to) => Err(RequestError::AlreadyBound { request: id, bound_to, candidate: to }),
            None => {
                request.source_binding = Some(to);
                Ok(())
            }
        }
    }

    /// Clear the binding so matching can retry.  Returns the old source.
    pub fn unbind(&mut self, id: RequestId) -> Option<EntityId> {
        let request = self.live.get_mut(&id)?;
        request.search = None;
        request.source_binding.take()
    }

    // ── Removal & commit ──────────────────────────────────────────────────

    /// Stage removal of a live or staged request.  The first reason wins.
    /// Returns `false` if the request is unknown.
    pub fn schedule_removal(&mut self, id: RequestId, removal: Removal) -> bool {
        if !self.live.contains_key(&id) && !self.staged.contains_key(&id) {
            warn!("removal scheduled for unknown request {id}");
            return false;
        }
        self.removals.entry(id).or_insert(removal);
        true
    }

    pub fn is_pending_removal(&self, id: RequestId) -> bool {
        self.removals.contains_key(&id)
    }

    /// Apply staged removals, then publish staged creations.
    pub fn commit(&mut self) -> CommitSummary {
        let mut summary = CommitSummary::default();

        for (id, removal) in std::mem::take(&mut self.removals) {
            let request = self.live.remove(&id).or_else(|| self.staged.remove(&id));
            if let Some(request) = request {
                let key = key_of(&request);
                if self.index.get(&key) == Some(&id) {
                    self.index.remove(&key);
                }
                summary.removed.push((request, removal));
            }
        }

        for (id, request) in std::mem::take(&mut self.staged) {
            summary.created.push(id);
            self.live.insert(id, request);
        }

        summary
    }

    /// Clone of every live request, in id order, for persistence.
    pub fn to_vec(&self) -> Vec<ServiceRequest> {
        self.live.values().cloned().collect()
    }
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key_of(request: &ServiceRequest) -> DedupKey {
    (request.target, request.kind, request.reversed)
}
