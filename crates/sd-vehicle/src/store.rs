//! The `VehicleStore`: every vehicle in the world, keyed by entity id.
//!
//! A `BTreeMap` keeps iteration in ascending id order, which is the order
//! the engine applies vehicle effects in.

use std::collections::BTreeMap;

use sd_core::{EntityId, RequestKind};

use crate::{Vehicle, VehicleError, VehicleResult};

#[derive(Clone, Debug, Default)]
pub struct VehicleStore {
    pub vehicles: BTreeMap<EntityId, Vehicle>,
}

impl VehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, vehicle: Vehicle) -> Option<Vehicle> {
        self.vehicles.insert(vehicle.id, vehicle)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Vehicle> {
        self.vehicles.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&id)
    }

    pub fn try_get_mut(&mut self, id: EntityId) -> VehicleResult<&mut Vehicle> {
        self.vehicles.get_mut(&id).ok_or(VehicleError::NotFound(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.vehicles.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> {
        self.vehicles.values_mut()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Vehicles parked idle at `station`, ascending id.
    pub fn idle_at(&self, station: EntityId) -> impl Iterator<Item = &Vehicle> {
        self.vehicles
            .values()
            .filter(move |v| v.home_station == station && v.state.is_idle())
    }

    /// Number of non-disabled vehicles serving `kind`.
    pub fn active_count(&self, kind: RequestKind) -> usize {
        self.vehicles
            .values()
            .filter(|v| v.serves.contains(kind) && !v.state.is_disabled())
            .count()
    }

    pub fn to_vec(&self) -> Vec<Vehicle> {
        self.vehicles.values().cloned().collect()
    }
}

impl FromIterator<Vehicle> for VehicleStore {
    fn from_iter<I: IntoIterator<Item = Vehicle>>(iter: I) -> Self {
        Self { vehicles: iter.into_iter().map(|v| (v.id, v)).collect() }
    }
}
