//! Engine observer trait for progress reporting and data collection.

use sd_core::{EntityId, RequestId, RequestKind, Tick};
use sd_request::{DropReason, ServiceRequest};
use sd_vehicle::DisableReason;

use crate::DispatchMetrics;

/// A committed request → source pairing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Binding {
    pub request: RequestId,
    pub kind:    RequestKind,
    pub target:  EntityId,
    pub source:  EntityId,
    /// Matched by a reversed request (the source advertised first).
    pub via_advert: bool,
}

/// Point-in-time counts reported every `output_interval_ticks`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TickSummary {
    pub tick:              Tick,
    pub live_requests:     usize,
    pub bound_requests:    usize,
    pub reversed_requests: usize,
    pub vehicles_idle:     usize,
    pub vehicles_busy:     usize,
    pub vehicles_disabled: usize,
    pub queries_in_flight: usize,
}

/// Callbacks invoked by [`Engine::run`][crate::Engine::run].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Event hooks for a tick fire after
/// that tick's commit, in the order: bindings, spawns, disables, removals.
pub trait DispatchObserver {
    /// Called at the very start of each tick, before any processing.
    fn on_tick_start(&mut self, _tick: Tick) {}

    fn on_bound(&mut self, _tick: Tick, _binding: &Binding) {}

    /// A forward request was completed with service delivered.
    fn on_serviced(&mut self, _tick: Tick, _request: &ServiceRequest) {}

    /// A request left the store without being serviced.
    fn on_request_dropped(&mut self, _tick: Tick, _request: &ServiceRequest, _reason: DropReason) {}

    fn on_vehicle_spawned(&mut self, _tick: Tick, _vehicle: EntityId, _station: EntityId) {}

    fn on_vehicle_disabled(&mut self, _tick: Tick, _vehicle: EntityId, _reason: DisableReason) {}

    /// Called at the end of each tick.
    fn on_tick_end(&mut self, _tick: Tick) {}

    /// Called every `config.output_interval_ticks` ticks.
    fn on_summary(&mut self, _summary: &TickSummary) {}

    /// Called once after the final tick completes.
    fn on_sim_end(&mut self, _final_tick: Tick, _metrics: &DispatchMetrics) {}
}

/// A [`DispatchObserver`] that does nothing.
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {}
