//! The per-vehicle state machine step.

use log::{debug, trace};

use sd_core::{EntityId, KindConfig, Position, RequestId, RequestKind, Tick};

use crate::{DisableReason, Vehicle, VehicleState};

/// Consecutive path failures that park a vehicle for good.
const MAX_PATH_FAILURES: u8 = 2;

/// Snapshot of a live request as the vehicle needs it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RequestInfo {
    pub target:   EntityId,
    pub kind:     RequestKind,
    pub priority: f32,
}

/// Read-only world queries a vehicle step depends on.
pub trait VehicleWorld: Sync {
    fn config(&self, kind: RequestKind) -> &KindConfig;

    /// A live request not scheduled for removal.
    fn request(&self, id: RequestId) -> Option<RequestInfo>;

    fn target_position(&self, target: EntityId) -> Option<Position>;

    /// Current need of `target` for `kind`, `None` if the target is gone.
    fn target_need(&self, target: EntityId, kind: RequestKind) -> Option<f32>;

    fn home_position(&self, station: EntityId) -> Option<Position>;

    /// Station would give `vehicle` an active slot if it parked now.
    fn home_has_free_slot(&self, station: EntityId, vehicle: EntityId) -> bool;

    /// `source` already has a live reversed request of `kind`.
    fn advertising(&self, source: EntityId, kind: RequestKind) -> bool;
}

/// Cross-entity consequences of a step, applied serially by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum VehicleEffect {
    /// Ask the pathfinder for the next leg.
    PlanPath { destination: Position, kind: RequestKind },
    /// Lower a target's need.
    ReduceNeed { target: EntityId, kind: RequestKind, amount: f32 },
    /// The vehicle is done with `request`; `serviced` is `false` when the
    /// target had nothing left to do on arrival.
    Complete { request: RequestId, serviced: bool },
    /// The vehicle gives `request` back; unbind it so matching retries.
    Release { request: RequestId },
    /// Arrived home; `accepted` is `false` when parked disabled.
    Parked { station: EntityId, accepted: bool },
    Disabled { reason: DisableReason },
    /// Advertise spare capacity for `kind`.
    EmitReversed { kind: RequestKind },
    /// Mark `target` secured.
    Secure { target: EntityId },
}

/// Advance `vehicle` by one step.
///
/// The step never waits at a cleared target: arriving at a site with no
/// need left completes the request and moves on in the same call.
pub fn step<W: VehicleWorld + ?Sized>(vehicle: &mut Vehicle, world: &W, now: Tick) -> Vec<VehicleEffect> {
    let mut fx = Vec::new();
    let before = vehicle.state.label();

    match vehicle.state {
        VehicleState::Disabled { .. } => {}

        VehicleState::Idle { .. } => {
            if !vehicle.assigned_requests.is_empty() {
                select_next_or_return(vehicle, world, now, &mut fx);
            }
        }

        VehicleState::EnRoute { request, eta } => match world.request(request) {
            None => select_next_or_return(vehicle, world, now, &mut fx),
            Some(_) if vehicle.path_failed => on_path_failure(vehicle, world, now, &mut fx),
            Some(info) => match eta {
                Some(eta) if now >= eta => arrive(vehicle, request, info, world, now, &mut fx),
                Some(_) => {}
                None if vehicle.pending_query.is_none() => plan_to_target(vehicle, info, world, now, &mut fx),
                None => {}
            },
        },

        VehicleState::Servicing { request, progress } => {
            service(vehicle, request, progress, world, now, &mut fx);
        }

        VehicleState::Returning { eta } => {
            if vehicle.path_failed {
                on_path_failure(vehicle, world, now, &mut fx);
            } else {
                match eta {
                    Some(eta) if now >= eta => park_at_home(vehicle, world, &mut fx),
                    Some(_) => advertise_if_due(vehicle, world, now, &mut fx),
                    None if vehicle.pending_query.is_none() => plan_home(vehicle, world, &mut fx),
                    None => {}
                }
            }
        }
    }

    if before != vehicle.state.label() {
        debug!("vehicle {} {} -> {} at {now}", vehicle.id, before, vehicle.state.label());
    }
    fx
}

fn needs_service<W: VehicleWorld + ?Sized>(world: &W, info: RequestInfo) -> bool {
    world
        .target_need(info.target, info.kind)
        .is_some_and(|need| need > world.config(info.kind).need_threshold)
}

fn plan_to_target<W: VehicleWorld + ?Sized>(
    vehicle: &mut Vehicle,
    info: RequestInfo,
    world: &W,
    now: Tick,
    fx: &mut Vec<VehicleEffect>,
) {
    match world.target_position(info.target) {
        Some(destination) => fx.push(VehicleEffect::PlanPath { destination, kind: info.kind }),
        // Target vanished between validation and now; the request pass
        // will drop the record, so just move on.
        None => select_next_or_return(vehicle, world, now, fx),
    }
}

fn plan_home<W: VehicleWorld + ?Sized>(vehicle: &mut Vehicle, world: &W, fx: &mut Vec<VehicleEffect>) {
    match world.home_position(vehicle.home_station) {
        Some(destination) => fx.push(VehicleEffect::PlanPath { destination, kind: vehicle.kind }),
        None => disable(vehicle, DisableReason::Orphaned, fx),
    }
}

/// Pop queued requests until one still needs service; otherwise go home.
fn select_next_or_return<W: VehicleWorld + ?Sized>(vehicle: &mut Vehicle, world: &W, now: Tick, fx: &mut Vec<VehicleEffect>) {
    while let Some(next) = vehicle.assigned_requests.pop_front() {
        let Some(info) = world.request(next) else {
            continue;
        };
        if vehicle.service_accumulator <= 0.0 {
            fx.push(VehicleEffect::Release { request: next });
            continue;
        }
        if !needs_service(world, info) {
            fx.push(VehicleEffect::Complete { request: next, serviced: false });
            continue;
        }
        vehicle.head_out(next, now);
        plan_to_target(vehicle, info, world, now, fx);
        return;
    }
    vehicle.head_home(now);
    plan_home(vehicle, world, fx);
}

fn arrive<W: VehicleWorld + ?Sized>(
    vehicle: &mut Vehicle,
    request: RequestId,
    info: RequestInfo,
    world: &W,
    now: Tick,
    fx: &mut Vec<VehicleEffect>,
) {
    vehicle.finish_trip();
    let config = world.config(info.kind);
    let on_site = world
        .target_position(info.target)
        .is_some_and(|pos| vehicle.position.within(pos, config.proximity));

    if !needs_service(world, info) {
        trace!("vehicle {} found {} already cleared", vehicle.id, info.target);
        fx.push(VehicleEffect::Complete { request, serviced: false });
        select_next_or_return(vehicle, world, now, fx);
    } else if on_site {
        vehicle.path_failures = 0;
        vehicle.state = VehicleState::Servicing { request, progress: 0.0 };
        if config.secures_on_arrival {
            fx.push(VehicleEffect::Secure { target: info.target });
        }
    } else {
        // The road ends too far from the site: as good as no route.
        vehicle.path_failed = true;
        on_path_failure(vehicle, world, now, fx);
    }
}

fn service<W: VehicleWorld + ?Sized>(
    vehicle: &mut Vehicle,
    request: RequestId,
    progress: f32,
    world: &W,
    now: Tick,
    fx: &mut Vec<VehicleEffect>,
) {
    let Some(info) = world.request(request) else {
        select_next_or_return(vehicle, world, now, fx);
        return;
    };
    let config = world.config(info.kind);
    let need = world.target_need(info.target, info.kind).unwrap_or(0.0);

    if need <= config.need_threshold {
        fx.push(VehicleEffect::Complete { request, serviced: progress > 0.0 });
        select_next_or_return(vehicle, world, now, fx);
        return;
    }
    if vehicle.service_accumulator <= 0.0 {
        fx.push(VehicleEffect::Release { request });
        select_next_or_return(vehicle, world, now, fx);
        return;
    }

    let amount = config.service_rate.min(need).min(vehicle.service_accumulator);
    vehicle.service_accumulator -= amount;
    vehicle.state = VehicleState::Servicing { request, progress: progress + amount };
    fx.push(VehicleEffect::ReduceNeed { target: info.target, kind: info.kind, amount });
}

fn on_path_failure<W: VehicleWorld + ?Sized>(vehicle: &mut Vehicle, world: &W, now: Tick, fx: &mut Vec<VehicleEffect>) {
    vehicle.path_failed = false;
    vehicle.path_failures = vehicle.path_failures.saturating_add(1);
    let held: Vec<_> = vehicle.held_requests().collect();
    for request in held {
        fx.push(VehicleEffect::Release { request });
    }
    vehicle.assigned_requests.clear();

    if vehicle.path_failures >= MAX_PATH_FAILURES {
        vehicle.stop_where_you_are(now);
        disable(vehicle, DisableReason::PathFailure, fx);
    } else {
        vehicle.head_home(now);
        plan_home(vehicle, world, fx);
    }
}

fn park_at_home<W: VehicleWorld + ?Sized>(vehicle: &mut Vehicle, world: &W, fx: &mut Vec<VehicleEffect>) {
    let accepted = world.home_has_free_slot(vehicle.home_station, vehicle.id);
    let disabled = (!accepted).then_some(DisableReason::NoFreeSlot);
    vehicle.park(disabled);
    fx.push(VehicleEffect::Parked { station: vehicle.home_station, accepted });
    if let Some(reason) = disabled {
        fx.push(VehicleEffect::Disabled { reason });
    }
}

fn disable(vehicle: &mut Vehicle, reason: DisableReason, fx: &mut Vec<VehicleEffect>) {
    vehicle.pending_query = None;
    vehicle.state = VehicleState::Disabled { reason };
    fx.push(VehicleEffect::Disabled { reason });
}

fn advertise_if_due<W: VehicleWorld + ?Sized>(vehicle: &Vehicle, world: &W, now: Tick, fx: &mut Vec<VehicleEffect>) {
    let config = world.config(vehicle.kind);
    let due = config.vehicle_reversed_stride.is_some_and(|stride| stride.fires(now));
    if due
        && vehicle.assigned_requests.is_empty()
        && vehicle.service_accumulator > 0.0
        && !world.advertising(vehicle.id, vehicle.kind)
    {
        fx.push(VehicleEffect::EmitReversed { kind: vehicle.kind });
    }
}
