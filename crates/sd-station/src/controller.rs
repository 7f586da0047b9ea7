//! The station controller: one call per station per tick.

use log::{debug, trace};

use sd_core::{EntityId, KindConfig, RequestId, RequestKind, Tick};

use crate::{PoolStatus, Station};

/// Read-only world queries the controller depends on.
pub trait StationWorld {
    fn config(&self, kind: RequestKind) -> &KindConfig;

    /// The request record still exists and is not scheduled for removal.
    fn request_alive(&self, request: RequestId) -> bool;

    /// `vehicle` is parked idle and can take a dispatch.
    fn vehicle_idle(&self, vehicle: EntityId) -> bool;

    /// `vehicle` was parked disabled for lack of a slot and may come back.
    fn vehicle_reactivatable(&self, vehicle: EntityId) -> bool;

    /// `station` already has a live reversed request of `kind`.
    fn advertising(&self, station: EntityId, kind: RequestKind) -> bool;
}

/// Work for the engine; applied in the order returned.
#[derive(Clone, Debug, PartialEq)]
pub enum StationEffect {
    /// Bring a slot-disabled vehicle back into service.
    Reactivate { vehicle: EntityId },
    /// Hand `request` to the pooled `vehicle`.
    Assign { request: RequestId, vehicle: EntityId },
    /// Spawn a fresh vehicle for `request`.
    Spawn { request: RequestId },
    /// `request` vanished while pending; nothing to do but forget it.
    DiscardPending { request: RequestId },
    /// Advertise spare capacity for `kind`.
    EmitReversed { kind: RequestKind },
}

/// Run the station controller once.
///
/// Pool tags are updated in place so later effects in the same tick see
/// assigned vehicles as busy; spawned vehicles are added to the pool by the
/// engine when it applies the `Spawn`.
pub fn tick<W: StationWorld + ?Sized>(station: &mut Station, world: &W, now: Tick) -> Vec<StationEffect> {
    let mut fx = Vec::new();
    reactivate(station, world, &mut fx);
    dispatch_pending(station, world, &mut fx);
    advertise(station, world, now, &mut fx);
    fx
}

fn reactivate<W: StationWorld + ?Sized>(station: &mut Station, world: &W, fx: &mut Vec<StationEffect>) {
    let parked: Vec<EntityId> = station
        .pool
        .iter()
        .filter(|(_, s)| **s == PoolStatus::Disabled)
        .map(|(id, _)| *id)
        .collect();
    for vehicle in parked {
        if station.active_count() >= station.active_limit {
            break;
        }
        if world.vehicle_reactivatable(vehicle) {
            station.pool.insert(vehicle, PoolStatus::Available);
            debug!("station {} reactivates {vehicle}", station.id);
            fx.push(StationEffect::Reactivate { vehicle });
        }
    }
}

fn dispatch_pending<W: StationWorld + ?Sized>(station: &mut Station, world: &W, fx: &mut Vec<StationEffect>) {
    // Spawns are applied after this call returns; count them against the
    // slot budget here.
    let mut spawned = 0u32;
    while let Some(&request) = station.pending_dispatch.front() {
        if !world.request_alive(request) {
            station.pending_dispatch.pop_front();
            trace!("station {} discards vanished {request}", station.id);
            fx.push(StationEffect::DiscardPending { request });
            continue;
        }

        let idle = station
            .pool
            .iter()
            .find(|(id, s)| **s == PoolStatus::Available && world.vehicle_idle(**id))
            .map(|(id, _)| *id);

        if let Some(vehicle) = idle {
            station.pending_dispatch.pop_front();
            station.pool.insert(vehicle, PoolStatus::Busy);
            fx.push(StationEffect::Assign { request, vehicle });
        } else if can_spawn_more(station, spawned) {
            station.pending_dispatch.pop_front();
            spawned += 1;
            fx.push(StationEffect::Spawn { request });
        } else {
            // No vehicle and no room; the rest of the queue waits too.
            break;
        }
    }
}

fn can_spawn_more(station: &Station, spawned: u32) -> bool {
    let pooled = station.pool.len() as u32 + spawned;
    let active = station.active_count() + spawned;
    pooled < station.capacity && active < station.active_limit
}

fn advertise<W: StationWorld + ?Sized>(station: &Station, world: &W, now: Tick, fx: &mut Vec<StationEffect>) {
    if station.available_count() == 0 || !station.pending_dispatch.is_empty() {
        return;
    }
    for kind in station.purpose_mask.iter() {
        let due = world
            .config(kind)
            .station_reversed_stride
            .is_some_and(|stride| stride.fires(now));
        if due && !world.advertising(station.id, kind) {
            fx.push(StationEffect::EmitReversed { kind });
        }
    }
}
