//! Read-only views of engine state handed to the component crates.
//!
//! Each pass borrows only what it reads, so the vehicle pass can hold the
//! vehicle map mutably while [`FleetView`] reads everything else.

use sd_core::{EntityId, KindConfig, KindTable, Position, RequestId, RequestKind, Tick};
use sd_request::{RequestStore, TargetStore, WorldView};
use sd_station::{StationStore, StationWorld};
use sd_vehicle::{DisableReason, RequestInfo, Vehicle, VehicleState, VehicleStore, VehicleWorld};

/// Everything, read-only: the request pass.
pub(crate) struct MatchView<'a> {
    pub kinds:    &'a KindTable,
    pub targets:  &'a TargetStore,
    pub requests: &'a RequestStore,
    pub vehicles: &'a VehicleStore,
    pub stations: &'a StationStore,
    pub now:      Tick,
}

impl MatchView<'_> {
    /// Priority of the request `vehicle` is currently driving to.
    pub fn current_priority(&self, vehicle: &Vehicle) -> Option<f32> {
        vehicle
            .state
            .current_request()
            .and_then(|r| self.requests.get(r))
            .map(|r| r.priority)
    }

    pub fn vehicle_position(&self, vehicle: &Vehicle) -> Position {
        vehicle.position_at(self.now)
    }

    /// District of a source; vehicles inherit their home station's.
    pub fn source_district(&self, source: EntityId) -> Option<sd_core::DistrictId> {
        let station = match self.vehicles.get(source) {
            Some(v) => v.home_station,
            None => source,
        };
        self.stations.get(station).and_then(|s| s.district)
    }

    pub fn source_position(&self, source: EntityId) -> Option<Position> {
        match self.vehicles.get(source) {
            Some(v) => Some(self.vehicle_position(v)),
            None => self.stations.get(source).map(|s| s.position),
        }
    }

    /// Could `source` take a `kind` request of `priority` right now?
    pub fn can_accept(&self, source: EntityId, kind: RequestKind, priority: f32) -> bool {
        let config = self.kinds.get(kind);
        if let Some(v) = self.vehicles.get(source) {
            return v.accepts(kind, priority, config, self.current_priority(v));
        }
        self.stations
            .get(source)
            .is_some_and(|s| s.serves(kind) && s.can_take_dispatch())
    }
}

impl WorldView for MatchView<'_> {
    fn target_position(&self, target: EntityId) -> Option<Position> {
        self.targets.get(target).map(|t| t.position)
    }

    fn needs_service(&self, target: EntityId, kind: RequestKind) -> bool {
        self.targets.needs_service(target, kind, self.kinds.get(kind))
    }

    fn target_claim(&self, target: EntityId, kind: RequestKind) -> Option<RequestId> {
        self.targets.get(target).and_then(|t| t.claim(kind))
    }

    fn source_alive(&self, source: EntityId) -> bool {
        match self.vehicles.get(source) {
            Some(v) => !v.state.is_disabled(),
            None => self.stations.contains(source),
        }
    }

    fn source_has_capacity(&self, source: EntityId, kind: RequestKind) -> bool {
        match self.vehicles.get(source) {
            Some(v) => v.accepts(kind, f32::MIN, self.kinds.get(kind), None),
            None => self
                .stations
                .get(source)
                .is_some_and(|s| s.serves(kind) && s.available_count() > 0),
        }
    }
}

/// The vehicle pass: everything but the vehicles themselves.
pub(crate) struct FleetView<'a> {
    pub kinds:    &'a KindTable,
    pub targets:  &'a TargetStore,
    pub requests: &'a RequestStore,
    pub stations: &'a StationStore,
}

impl VehicleWorld for FleetView<'_> {
    fn config(&self, kind: RequestKind) -> &KindConfig {
        self.kinds.get(kind)
    }

    fn request(&self, id: RequestId) -> Option<RequestInfo> {
        if !self.requests.is_alive(id) {
            return None;
        }
        self.requests
            .get(id)
            .map(|r| RequestInfo { target: r.target, kind: r.kind, priority: r.priority })
    }

    fn target_position(&self, target: EntityId) -> Option<Position> {
        self.targets.get(target).map(|t| t.position)
    }

    fn target_need(&self, target: EntityId, kind: RequestKind) -> Option<f32> {
        let config = self.kinds.get(kind);
        self.targets.get(target).map(|t| {
            if config.clears_on_secure && t.secured { 0.0 } else { t.need(kind) }
        })
    }

    fn home_position(&self, station: EntityId) -> Option<Position> {
        self.stations.get(station).map(|s| s.position)
    }

    fn home_has_free_slot(&self, station: EntityId, vehicle: EntityId) -> bool {
        self.stations.get(station).is_some_and(|s| s.has_free_slot(vehicle))
    }

    fn advertising(&self, source: EntityId, kind: RequestKind) -> bool {
        self.requests.find(source, kind, true).is_some()
    }
}

/// The station pass: stations are borrowed one at a time, mutably.
pub(crate) struct DepotView<'a> {
    pub kinds:    &'a KindTable,
    pub requests: &'a RequestStore,
    pub vehicles: &'a VehicleStore,
}

impl StationWorld for DepotView<'_> {
    fn config(&self, kind: RequestKind) -> &KindConfig {
        self.kinds.get(kind)
    }

    fn request_alive(&self, request: RequestId) -> bool {
        self.requests.is_alive(request)
    }

    fn vehicle_idle(&self, vehicle: EntityId) -> bool {
        self.vehicles
            .get(vehicle)
            .is_some_and(|v| v.state.is_idle() && v.service_accumulator > 0.0)
    }

    fn vehicle_reactivatable(&self, vehicle: EntityId) -> bool {
        self.vehicles.get(vehicle).is_some_and(|v| {
            v.state == VehicleState::Disabled { reason: DisableReason::NoFreeSlot }
        })
    }

    fn advertising(&self, station: EntityId, kind: RequestKind) -> bool {
        self.requests.find(station, kind, true).is_some()
    }
}
