//! Per-tick request validation.
//!
//! `validate` is a pure read of the world; the engine turns its verdict into
//! commands applied after the parallel pass.

use sd_core::{EntityId, Position, RequestId, RequestKind};

use crate::request::ServiceRequest;
use crate::store::RequestStore;

/// Why a request was dropped without being serviced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DropReason {
    /// The target entity no longer exists.
    TargetGone,
    /// The target no longer needs this kind of service.
    NoLongerNeeded,
    /// Another live request claims the same target.
    Superseded,
    /// Repeated searches found no source.
    NoCandidate,
    /// The advertising source of a reversed request went away or filled up.
    SourceUnavailable,
    /// The vehicle carrying the request was force-cancelled.
    Cancelled,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::TargetGone        => "target_gone",
            DropReason::NoLongerNeeded    => "no_longer_needed",
            DropReason::Superseded        => "superseded",
            DropReason::NoCandidate       => "no_candidate",
            DropReason::SourceUnavailable => "source_unavailable",
            DropReason::Cancelled         => "cancelled",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only world queries validation and matching depend on.
pub trait WorldView: Sync {
    /// Position of a target, or `None` if it no longer exists.
    fn target_position(&self, target: EntityId) -> Option<Position>;

    /// Target exists and its need for `kind` exceeds the kind's threshold.
    fn needs_service(&self, target: EntityId, kind: RequestKind) -> bool;

    /// Request currently claiming `target` for `kind`.
    fn target_claim(&self, target: EntityId, kind: RequestKind) -> Option<RequestId>;

    /// Station or vehicle still exists and is not disabled.
    fn source_alive(&self, source: EntityId) -> bool;

    /// Source could take on another request of `kind` right now.
    fn source_has_capacity(&self, source: EntityId, kind: RequestKind) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// Bound source is gone; clear the binding and retry matching.
    ClearBinding,
    Drop(DropReason),
}

pub fn validate<W: WorldView + ?Sized>(
    request: &ServiceRequest,
    world: &W,
    store: &RequestStore,
) -> Validation {
    if request.reversed {
        return if world.source_alive(request.target)
            && world.source_has_capacity(request.target, request.kind)
        {
            Validation::Valid
        } else {
            Validation::Drop(DropReason::SourceUnavailable)
        };
    }

    if world.target_position(request.target).is_none() {
        return Validation::Drop(DropReason::TargetGone);
    }
    if let Some(other) = world.target_claim(request.target, request.kind) {
        if other != request.id && store.is_alive(other) {
            return Validation::Drop(DropReason::Superseded);
        }
    }
    match request.source_binding {
        Some(source) if !world.source_alive(source) => Validation::ClearBinding,
        // A bound source settles a cleared target itself when it gets there.
        Some(_) => Validation::Valid,
        None if !world.needs_service(request.target, request.kind) => {
            Validation::Drop(DropReason::NoLongerNeeded)
        }
        None => Validation::Valid,
    }
}
