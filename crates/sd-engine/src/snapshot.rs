//! Save and restore engine state.
//!
//! A snapshot holds the world (targets, requests, vehicles, stations) and
//! the counters needed to keep ids unique after a restore.  Configuration,
//! producers and the pathfinder are not part of it: restore into an engine
//! built with the same config.
//!
//! Path queries in flight are not persisted.  On restore, unfinished
//! candidate searches are cleared and vehicles waiting on a plan ask again
//! at their next step.

use log::info;
use serde::{Deserialize, Serialize};

use sd_core::{EntityId, RequestId, SimRng, Tick};
use sd_request::{RequestStore, ServiceRequest, Target, TargetStore};
use sd_spatial::Pathfinder;
use sd_station::{Station, StationStore};
use sd_vehicle::{Vehicle, VehicleStore};

use crate::{DispatchMetrics, Engine, EngineError, EngineResult};

/// Format version written by this build.  Snapshots from newer builds are
/// rejected; older ones load with defaults for missing fields.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version:      u32,
    pub tick:         Tick,
    pub next_entity:  EntityId,
    pub next_request: RequestId,
    pub targets:      Vec<Target>,
    pub requests:     Vec<ServiceRequest>,
    pub vehicles:     Vec<Vehicle>,
    pub stations:     Vec<Station>,
    #[serde(default)]
    pub metrics:      DispatchMetrics,
}

impl<P: Pathfinder> Engine<P> {
    /// Capture the current state.  Take snapshots between ticks; requests
    /// emitted since the last commit are not included.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            version:      SNAPSHOT_VERSION,
            tick:         self.now(),
            next_entity:  self.next_entity,
            next_request: self.requests.next_id(),
            targets:      self.targets.to_vec(),
            requests:     self.requests.to_vec(),
            vehicles:     self.vehicles.to_vec(),
            stations:     self.stations.to_vec(),
            metrics:      self.metrics.clone(),
        }
    }

    /// Replace all world state with `snapshot`.
    pub fn restore(&mut self, snapshot: EngineSnapshot) -> EngineResult<()> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(EngineError::SnapshotVersion {
                found:     snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let mut requests = snapshot.requests;
        for request in &mut requests {
            request.search = None;
        }
        let mut vehicles = snapshot.vehicles;
        for vehicle in &mut vehicles {
            vehicle.pending_query = None;
        }

        self.clock.current_tick = snapshot.tick;
        self.rng = SimRng::new(self.config.seed).child(snapshot.tick.0);
        self.targets = snapshot.targets.into_iter().collect::<TargetStore>();
        self.requests = RequestStore::from_requests(requests, snapshot.next_request);
        self.vehicles = vehicles.into_iter().collect::<VehicleStore>();
        self.stations = snapshot.stations.into_iter().collect::<StationStore>();
        self.metrics = snapshot.metrics;
        self.reset_queries();

        // Never hand out an id already in use, whatever the snapshot says.
        let max_id = self
            .targets
            .iter()
            .map(|t| t.id)
            .chain(self.vehicles.iter().map(|v| v.id))
            .chain(self.stations.ids())
            .max();
        self.next_entity = match max_id {
            Some(id) if id >= snapshot.next_entity => id.next(),
            _ => snapshot.next_entity,
        };

        info!(
            "restored snapshot at {}: {} targets, {} requests, {} vehicles, {} stations",
            self.now(),
            self.targets.len(),
            self.requests.len(),
            self.vehicles.len(),
            self.stations.len()
        );
        Ok(())
    }
}
