//! The service request record.

use sd_core::{EntityId, KindConfig, QueryId, RequestId, RequestKind, Tick};

/// A live request for service.
///
/// Forward requests point at the site needing service.  Reversed requests
/// are advertisements: `target` is the station or vehicle with spare
/// capacity, and matching searches outward for unmet forward requests.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceRequest {
    pub id:             RequestId,
    pub target:         EntityId,
    pub kind:           RequestKind,
    pub priority:       f32,
    pub source_binding: Option<EntityId>,
    pub fail_count:     u8,
    /// Matching passes left to skip before the next search.
    pub cooldown:       u8,
    pub reversed:       bool,
    #[cfg_attr(feature = "serde", serde(default = "default_group_size"))]
    pub group_size:     u32,
    /// Sticky marker (crime detected, site secured); survives merges.
    #[cfg_attr(feature = "serde", serde(default))]
    pub detected:       bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created:        Tick,
    /// In-flight candidate search; never persisted.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub search:         Option<Search>,
}

#[cfg(feature = "serde")]
fn default_group_size() -> u32 {
    1
}

impl ServiceRequest {
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.source_binding.is_some()
    }

    /// Record a failed search.  Returns `true` once the request has failed
    /// `max_fail_count` times and must be dropped; otherwise arms the
    /// doubling cooldown.
    pub fn record_failure(&mut self, config: &KindConfig) -> bool {
        self.fail_count = self.fail_count.saturating_add(1);
        self.search = None;
        if self.fail_count >= config.max_fail_count {
            return true;
        }
        self.cooldown = config.cooldown_after(self.fail_count);
        false
    }

    /// Merge a duplicate submission into this record.
    pub fn merge(&mut self, other: &NewRequest) {
        if other.priority > self.priority {
            self.priority = other.priority;
        }
        self.detected |= other.detected;
        if let Some(size) = other.group_size {
            self.group_size = self.group_size.max(size);
        }
    }
}

// ── NewRequest ────────────────────────────────────────────────────────────────

/// Priority floor of a detected request.
pub const DETECTED_PRIORITY: f32 = 1.0;

/// What producers hand to `RequestStore::submit`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NewRequest {
    pub target:     EntityId,
    pub kind:       RequestKind,
    pub priority:   f32,
    pub reversed:   bool,
    pub detected:   bool,
    /// Candidate batch; `None` takes the kind's default.
    pub group_size: Option<u32>,
}

impl NewRequest {
    pub fn forward(target: EntityId, kind: RequestKind, priority: f32) -> Self {
        Self { target, kind, priority, reversed: false, detected: false, group_size: None }
    }

    /// Advertisement of spare capacity by `source`.
    pub fn reversed(source: EntityId, kind: RequestKind, priority: f32) -> Self {
        Self { target: source, kind, priority, reversed: true, detected: false, group_size: None }
    }

    /// Mark the request detected, raising its priority to at least
    /// [`DETECTED_PRIORITY`].
    pub fn detected(mut self) -> Self {
        self.detected = true;
        self.priority = self.priority.max(DETECTED_PRIORITY);
        self
    }

    pub fn with_group_size(mut self, size: u32) -> Self {
        self.group_size = Some(size.max(1));
        self
    }
}

// ── Search ────────────────────────────────────────────────────────────────────

/// A scored match option produced from a path cost result.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Candidate {
    /// The dispatching source (station or vehicle).
    pub source:   EntityId,
    /// The forward request that would be bound.
    pub request:  RequestId,
    /// Entity compared on equal cost: the source for forward searches, the
    /// target for reversed ones.
    pub tie_key:  EntityId,
    pub cost:     f32,
    pub duration: u64,
}

/// Path cost queries issued for one matching attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct Search {
    pub submitted: Tick,
    /// Queries still outstanding, with the candidate each one scores.
    pub pending:   Vec<(QueryId, Candidate)>,
    pub results:   Vec<Candidate>,
}

impl Search {
    pub fn new(submitted: Tick) -> Self {
        Self { submitted, pending: Vec::new(), results: Vec::new() }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Settle one query.  `cost` is `None` when the path failed; the
    /// candidate is then discarded.  Returns `false` for an unknown query.
    pub fn settle(&mut self, query: QueryId, cost: Option<(f32, u64)>) -> bool {
        let Some(pos) = self.pending.iter().position(|(q, _)| *q == query) else {
            return false;
        };
        let (_, mut candidate) = self.pending.remove(pos);
        if let Some((cost, duration)) = cost {
            candidate.cost = cost;
            candidate.duration = duration;
            self.results.push(candidate);
        }
        true
    }
}
