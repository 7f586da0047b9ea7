//! Station records and the station store.

use std::collections::{BTreeMap, VecDeque};

use log::warn;

use sd_core::{DistrictId, EntityId, KindSet, Position, RequestId, RequestKind};

use crate::{StationError, StationResult};

/// Pool tag for a vehicle homed at a station.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoolStatus {
    /// Parked idle at the station.
    Available,
    /// Out on a job or driving home.
    Busy,
    /// Parked disabled; holds no active slot.
    Disabled,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Station {
    pub id:               EntityId,
    pub position:         Position,
    #[cfg_attr(feature = "serde", serde(default))]
    pub district:         Option<DistrictId>,
    /// Kind of the vehicles this station spawns.
    pub vehicle_kind:     RequestKind,
    /// Kinds the station (and its vehicles) can be dispatched for.
    pub purpose_mask:     KindSet,
    /// Vehicle slots.
    pub capacity:         u32,
    /// Slots currently funded; vehicles beyond it park disabled.
    pub active_limit:     u32,
    pub pool:             BTreeMap<EntityId, PoolStatus>,
    /// Requests committed to the station, waiting for a vehicle.
    pub pending_dispatch: VecDeque<RequestId>,
}

impl Station {
    pub fn new(id: EntityId, position: Position, vehicle_kind: RequestKind, capacity: u32) -> Self {
        Self {
            id,
            position,
            district: None,
            vehicle_kind,
            purpose_mask: KindSet::only(vehicle_kind),
            capacity,
            active_limit: capacity,
            pool: BTreeMap::new(),
            pending_dispatch: VecDeque::new(),
        }
    }

    pub fn with_district(mut self, district: DistrictId) -> Self {
        self.district = Some(district);
        self
    }

    /// Serve `kind` in addition to the vehicle kind.
    pub fn serving(mut self, kind: RequestKind) -> Self {
        self.purpose_mask = self.purpose_mask.with(kind);
        self
    }

    pub fn with_active_limit(mut self, limit: u32) -> Self {
        self.active_limit = limit.min(self.capacity);
        self
    }

    #[inline]
    pub fn serves(&self, kind: RequestKind) -> bool {
        self.purpose_mask.contains(kind)
    }

    fn count(&self, status: PoolStatus) -> u32 {
        self.pool.values().filter(|s| **s == status).count() as u32
    }

    pub fn available_count(&self) -> u32 {
        self.count(PoolStatus::Available)
    }

    /// Vehicles holding an active slot (available or busy).
    pub fn active_count(&self) -> u32 {
        self.pool.len() as u32 - self.count(PoolStatus::Disabled)
    }

    /// Vehicles that could still be spawned: free slots that are also funded.
    pub fn spawn_room(&self) -> u32 {
        let free = self.capacity.saturating_sub(self.pool.len() as u32);
        let funded = self.active_limit.saturating_sub(self.active_count());
        free.min(funded)
    }

    /// Room for one more committed dispatch beyond those already pending.
    pub fn can_take_dispatch(&self) -> bool {
        self.spawn_room() as usize > self.pending_dispatch.len()
    }

    /// Like [`can_take_dispatch`](Self::can_take_dispatch) but also counts
    /// parked vehicles.  Used when answering the station's own advert.
    pub fn can_take_advertised(&self) -> bool {
        (self.available_count() + self.spawn_room()) as usize > self.pending_dispatch.len()
    }

    /// Would `vehicle` keep an active slot if it parked now?
    pub fn has_free_slot(&self, vehicle: EntityId) -> bool {
        let others = match self.pool.get(&vehicle) {
            Some(PoolStatus::Available | PoolStatus::Busy) => self.active_count() - 1,
            _ => self.active_count(),
        };
        others < self.active_limit
    }

    pub fn add_vehicle(&mut self, vehicle: EntityId, status: PoolStatus) -> StationResult<()> {
        if !self.pool.contains_key(&vehicle) && self.pool.len() as u32 >= self.capacity {
            return Err(StationError::Full { station: self.id, capacity: self.capacity });
        }
        self.pool.insert(vehicle, status);
        Ok(())
    }

    pub fn remove_vehicle(&mut self, vehicle: EntityId) -> bool {
        self.pool.remove(&vehicle).is_some()
    }

    pub fn set_status(&mut self, vehicle: EntityId, status: PoolStatus) -> StationResult<()> {
        match self.pool.get_mut(&vehicle) {
            Some(slot) => {
                *slot = status;
                Ok(())
            }
            None => Err(StationError::NotPooled { station: self.id, vehicle }),
        }
    }

    #[inline]
    pub fn status(&self, vehicle: EntityId) -> Option<PoolStatus> {
        self.pool.get(&vehicle).copied()
    }

    /// Queue `request` for the next controller tick; duplicates are ignored.
    pub fn queue_dispatch(&mut self, request: RequestId) -> bool {
        if self.pending_dispatch.contains(&request) {
            warn!("station {}: {request} already pending", self.id);
            return false;
        }
        self.pending_dispatch.push_back(request);
        true
    }

    pub fn unqueue_dispatch(&mut self, request: RequestId) -> bool {
        let before = self.pending_dispatch.len();
        self.pending_dispatch.retain(|r| *r != request);
        before != self.pending_dispatch.len()
    }

    /// Change the funded slot count; clamped to capacity.
    pub fn set_active_limit(&mut self, limit: u32) {
        self.active_limit = limit.min(self.capacity);
    }
}

// ── StationStore ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct StationStore {
    stations: BTreeMap<EntityId, Station>,
}

impl StationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, station: Station) -> Option<Station> {
        self.stations.insert(station.id, station)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Station> {
        self.stations.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Station> {
        self.stations.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Station> {
        self.stations.get_mut(&id)
    }

    pub fn try_get_mut(&mut self, id: EntityId) -> StationResult<&mut Station> {
        self.stations.get_mut(&id).ok_or(StationError::NotFound(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.stations.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Station> {
        self.stations.values_mut()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.stations.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Station> {
        self.stations.values().cloned().collect()
    }
}

impl FromIterator<Station> for StationStore {
    fn from_iter<I: IntoIterator<Item = Station>>(iter: I) -> Self {
        Self { stations: iter.into_iter().map(|s| (s.id, s)).collect() }
    }
}
