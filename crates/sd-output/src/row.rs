//! Plain data row types written by output backends.

use sd_core::{EntityId, RequestKind};
use sd_engine::{Binding, KindMetrics, TickSummary};
use sd_request::{DropReason, ServiceRequest};
use sd_vehicle::DisableReason;

/// What happened in a [`DispatchEventRow`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Bound,
    Serviced,
    Dropped,
    Spawned,
    Disabled,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Bound    => "bound",
            EventKind::Serviced => "serviced",
            EventKind::Dropped  => "dropped",
            EventKind::Spawned  => "spawned",
            EventKind::Disabled => "disabled",
        }
    }
}

/// One dispatch event.
///
/// Columns that do not apply to an event hold `u32::MAX` (ids) or an empty
/// string (kind, detail).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchEventRow {
    pub tick:    u64,
    pub event:   EventKind,
    pub request: u32,
    pub kind:    Option<RequestKind>,
    /// Target site for request events, home station for vehicle events.
    pub target:  u32,
    /// Bound source for request events, the vehicle itself for vehicle events.
    pub source:  u32,
    pub detail:  &'static str,
}

impl DispatchEventRow {
    pub fn bound(tick: u64, binding: &Binding) -> Self {
        Self {
            tick,
            event:   EventKind::Bound,
            request: binding.request.0,
            kind:    Some(binding.kind),
            target:  binding.target.0,
            source:  binding.source.0,
            detail:  if binding.via_advert { "advert" } else { "" },
        }
    }

    pub fn serviced(tick: u64, request: &ServiceRequest) -> Self {
        Self {
            tick,
            event:   EventKind::Serviced,
            request: request.id.0,
            kind:    Some(request.kind),
            target:  request.target.0,
            source:  request.source_binding.unwrap_or(EntityId::INVALID).0,
            detail:  "",
        }
    }

    pub fn dropped(tick: u64, request: &ServiceRequest, reason: DropReason) -> Self {
        Self {
            tick,
            event:   EventKind::Dropped,
            request: request.id.0,
            kind:    Some(request.kind),
            target:  request.target.0,
            source:  request.source_binding.unwrap_or(EntityId::INVALID).0,
            detail:  drop_reason_str(reason),
        }
    }

    pub fn spawned(tick: u64, vehicle: EntityId, station: EntityId) -> Self {
        Self {
            tick,
            event:   EventKind::Spawned,
            request: u32::MAX,
            kind:    None,
            target:  station.0,
            source:  vehicle.0,
            detail:  "",
        }
    }

    pub fn disabled(tick: u64, vehicle: EntityId, reason: DisableReason) -> Self {
        Self {
            tick,
            event:   EventKind::Disabled,
            request: u32::MAX,
            kind:    None,
            target:  u32::MAX,
            source:  vehicle.0,
            detail:  disable_reason_str(reason),
        }
    }

    /// `kind` column text.
    pub fn kind_str(&self) -> &'static str {
        self.kind.map_or("", RequestKind::as_str)
    }
}

pub fn drop_reason_str(reason: DropReason) -> &'static str {
    match reason {
        DropReason::TargetGone        => "target_gone",
        DropReason::NoLongerNeeded    => "no_longer_needed",
        DropReason::Superseded        => "superseded",
        DropReason::NoCandidate       => "no_candidate",
        DropReason::SourceUnavailable => "source_unavailable",
        DropReason::Cancelled         => "cancelled",
    }
}

pub fn disable_reason_str(reason: DisableReason) -> &'static str {
    match reason {
        DisableReason::PathFailure => "path_failure",
        DisableReason::NoFreeSlot  => "no_free_slot",
        DisableReason::Orphaned    => "orphaned",
        DisableReason::Cancelled   => "cancelled",
    }
}

/// Engine-wide counts at one summary tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummaryRow {
    pub tick:              u64,
    pub live_requests:     u64,
    pub bound_requests:    u64,
    pub reversed_requests: u64,
    pub vehicles_idle:     u64,
    pub vehicles_busy:     u64,
    pub vehicles_disabled: u64,
    pub queries_in_flight: u64,
}

impl From<&TickSummary> for TickSummaryRow {
    fn from(s: &TickSummary) -> Self {
        Self {
            tick:              s.tick.0,
            live_requests:     s.live_requests as u64,
            bound_requests:    s.bound_requests as u64,
            reversed_requests: s.reversed_requests as u64,
            vehicles_idle:     s.vehicles_idle as u64,
            vehicles_busy:     s.vehicles_busy as u64,
            vehicles_disabled: s.vehicles_disabled as u64,
            queries_in_flight: s.queries_in_flight as u64,
        }
    }
}

/// Final per-kind totals, written once at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindMetricsRow {
    pub kind:            RequestKind,
    pub bindings:        u32,
    pub serviced:        u32,
    pub dropped:         u32,
    pub failed_searches: u32,
    pub avg_response:    f32,
}

impl KindMetricsRow {
    pub fn new(kind: RequestKind, m: &KindMetrics) -> Self {
        Self {
            kind,
            bindings:        m.bindings,
            serviced:        m.serviced,
            dropped:         m.dropped,
            failed_searches: m.failed_searches,
            avg_response:    m.avg_response(),
        }
    }
}
