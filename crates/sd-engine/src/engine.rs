//! The `Engine` struct and its tick loop.

use std::mem;

use log::{debug, info, trace, warn};

use sd_core::{
    DistrictId, EngineConfig, EntityId, Position, QueryId, RequestId, RequestKind, SimClock, SimRng, Tick,
};
use sd_request::{
    CommitSummary, DropReason, NewRequest, Removal, RequestStore, Search, ServiceRequest, SubmitOutcome,
    Target, TargetStore,
};
use sd_spatial::{EntityIndex, PathQuery, Pathfinder};
use sd_station::{PoolStatus, Station, StationEffect, StationStore};
use sd_vehicle::{DisableReason, Vehicle, VehicleEffect, VehicleState, VehicleStore};

use crate::command::{Command, plan_request};
use crate::finder::{CandidateQuery, find_requests, find_sources};
use crate::world::{DepotView, FleetView, MatchView};
use crate::{
    Binding, DispatchMetrics, DispatchObserver, EngineError, EngineResult, RequestProducer, TickSummary,
};

#[cfg(feature = "fx-hash")]
type QueryMap = rustc_hash::FxHashMap<QueryId, QueryOwner>;
#[cfg(not(feature = "fx-hash"))]
type QueryMap = std::collections::HashMap<QueryId, QueryOwner>;

/// Who asked for an in-flight path query.
#[derive(Copy, Clone, Debug)]
enum QueryOwner {
    /// Scores one candidate of `request`'s search.
    Candidate { request: RequestId },
    /// Plans `vehicle`'s next leg.
    Trip { vehicle: EntityId },
}

/// Events gathered during a tick and reported to the observer after commit.
#[derive(Default)]
struct TickLog {
    bindings: Vec<Binding>,
    spawned:  Vec<(EntityId, EntityId)>,
    disabled: Vec<(EntityId, DisableReason)>,
}

struct TickReport {
    log:    TickLog,
    commit: CommitSummary,
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// The dispatch engine.
///
/// `Engine<P>` holds all world state and drives the tick loop:
///
/// 1. **Paths**: poll finished path queries; settle candidate searches and
///    hand trip plans to their vehicles.
/// 2. **Produce**: producers raise needs and submit requests (staged).
/// 3. **Index**: rebuild the source index (stations, live vehicles) and,
///    when any reversed request is live, the open-request index.
/// 4. **Requests** (parallel with the `parallel` feature): validate each
///    live request and decide on a [`Command`]; apply in ascending id.
/// 5. **Vehicles** (parallel): step every vehicle whose cadence fires;
///    apply the effects in ascending vehicle id.
/// 6. **Stations**: run each station controller; apply its effects.
/// 7. **Commit**: publish staged requests, remove finished ones, notify
///    producers.
///
/// Create via [`EngineBuilder`][crate::EngineBuilder].
pub struct Engine<P: Pathfinder> {
    pub config:     EngineConfig,
    pub clock:      SimClock,
    pub targets:    TargetStore,
    pub requests:   RequestStore,
    pub vehicles:   VehicleStore,
    pub stations:   StationStore,
    pub pathfinder: P,
    pub metrics:    DispatchMetrics,

    pub(crate) producers:   Vec<Box<dyn RequestProducer>>,
    pub(crate) rng:         SimRng,
    pub(crate) next_entity: EntityId,
    sources: EntityIndex,
    open:    EntityIndex,
    owners:  QueryMap,
    log:     TickLog,
}

impl<P: Pathfinder> Engine<P> {
    pub(crate) fn from_parts(
        config: EngineConfig,
        pathfinder: P,
        producers: Vec<Box<dyn RequestProducer>>,
        targets: TargetStore,
        next_entity: EntityId,
    ) -> Self {
        Self {
            clock: config.make_clock(),
            rng: SimRng::new(config.seed),
            config,
            targets,
            requests: RequestStore::new(),
            vehicles: VehicleStore::new(),
            stations: StationStore::new(),
            pathfinder,
            metrics: DispatchMetrics::default(),
            producers,
            next_entity,
            sources: EntityIndex::new(),
            open: EntityIndex::new(),
            owners: QueryMap::default(),
            log: TickLog::default(),
        }
    }

    // ── Running ───────────────────────────────────────────────────────────

    /// Run from the current tick to `config.end_tick()`.
    pub fn run<O: DispatchObserver>(&mut self, observer: &mut O) -> EngineResult<()> {
        while self.clock.current_tick < self.config.end_tick() {
            self.run_one(observer)?;
        }
        info!(
            "run finished at {}: {} serviced, {} dropped",
            self.clock.current_tick,
            self.metrics.total_serviced(),
            self.metrics.total_dropped()
        );
        observer.on_sim_end(self.clock.current_tick, &self.metrics);
        Ok(())
    }

    /// Run exactly `n` ticks from the current position (ignores `end_tick`).
    pub fn run_ticks<O: DispatchObserver>(&mut self, n: u64, observer: &mut O) -> EngineResult<()> {
        for _ in 0..n {
            self.run_one(observer)?;
        }
        Ok(())
    }

    fn run_one<O: DispatchObserver>(&mut self, observer: &mut O) -> EngineResult<()> {
        let now = self.clock.current_tick;
        observer.on_tick_start(now);
        let report = self.process_tick(now);

        for binding in &report.log.bindings {
            observer.on_bound(now, binding);
        }
        for &(vehicle, station) in &report.log.spawned {
            observer.on_vehicle_spawned(now, vehicle, station);
        }
        for &(vehicle, reason) in &report.log.disabled {
            observer.on_vehicle_disabled(now, vehicle, reason);
        }
        for (request, removal) in report.commit.removed.iter().filter(|(r, _)| !r.reversed) {
            match removal {
                Removal::Serviced => observer.on_serviced(now, request),
                Removal::Dropped(reason) => observer.on_request_dropped(now, request, *reason),
            }
        }
        observer.on_tick_end(now);
        if now.0 % self.config.output_interval_ticks.max(1) == 0 {
            observer.on_summary(&self.summary());
        }

        self.clock.advance();
        Ok(())
    }

    /// Current tick.
    #[inline]
    pub fn now(&self) -> Tick {
        self.clock.current_tick
    }

    // ── World setup ───────────────────────────────────────────────────────

    fn alloc_entity(&mut self) -> EntityId {
        let id = self.next_entity;
        self.next_entity = id.next();
        id
    }

    pub fn add_target(&mut self, position: Position, district: Option<DistrictId>) -> EntityId {
        let id = self.alloc_entity();
        self.targets.insert(Target::new(id, position, district));
        id
    }

    /// Remove a target.  Requests on it drop with `TargetGone` at their
    /// next validation.
    pub fn remove_target(&mut self, id: EntityId) -> Option<Target> {
        self.targets.remove(id)
    }

    pub fn set_need(&mut self, target: EntityId, kind: RequestKind, need: f32) -> EngineResult<()> {
        let t = self.targets.get_mut(target).ok_or(EngineError::UnknownTarget(target))?;
        t.set_need(kind, need);
        Ok(())
    }

    pub fn add_need(&mut self, target: EntityId, kind: RequestKind, amount: f32) -> EngineResult<()> {
        let t = self.targets.get_mut(target).ok_or(EngineError::UnknownTarget(target))?;
        t.add_need(kind, amount);
        Ok(())
    }

    /// Mark a target secured; kinds with `clears_on_secure` stop needing it.
    pub fn secure_target(&mut self, target: EntityId) -> EngineResult<()> {
        let t = self.targets.get_mut(target).ok_or(EngineError::UnknownTarget(target))?;
        t.secured = true;
        Ok(())
    }

    /// Add an empty station; configure it further through `stations`.
    pub fn add_station(&mut self, position: Position, vehicle_kind: RequestKind, capacity: u32) -> EntityId {
        let id = self.alloc_entity();
        self.stations.insert(Station::new(id, position, vehicle_kind, capacity));
        id
    }

    pub fn set_active_limit(&mut self, station: EntityId, limit: u32) -> EngineResult<()> {
        self.stations.try_get_mut(station)?.set_active_limit(limit);
        Ok(())
    }

    /// Park a fresh idle vehicle at `station`.
    pub fn add_vehicle(&mut self, station: EntityId) -> EngineResult<EntityId> {
        let position = self.stations.get(station).map(|s| s.position);
        let position = position.ok_or(sd_station::StationError::NotFound(station))?;
        self.add_vehicle_at(station, position)
    }

    /// Add an idle vehicle homed at `station` but standing at `position`.
    pub fn add_vehicle_at(&mut self, station: EntityId, position: Position) -> EngineResult<EntityId> {
        self.spawn_vehicle(station, Some(position), PoolStatus::Available)
    }

    fn spawn_vehicle(
        &mut self,
        station: EntityId,
        position: Option<Position>,
        status: PoolStatus,
    ) -> EngineResult<EntityId> {
        let id = self.alloc_entity();
        let st = self.stations.try_get_mut(station)?;
        st.add_vehicle(id, status)?;
        let capacity = self.config.kinds.get(st.vehicle_kind).capacity;
        let vehicle = Vehicle::new(
            id,
            st.vehicle_kind,
            st.purpose_mask,
            station,
            position.unwrap_or(st.position),
            capacity,
        );
        self.vehicles.insert(vehicle);
        self.metrics.vehicles_spawned += 1;
        debug!("station {station} spawned {id}");
        Ok(id)
    }

    /// Force-cancel a vehicle: it parks disabled and every request it held
    /// is released for re-matching.  Returns the released requests.
    pub fn cancel_vehicle(&mut self, id: EntityId) -> EngineResult<Vec<RequestId>> {
        let now = self.now();
        let vehicle = self.vehicles.try_get_mut(id)?;
        let held = vehicle.cancel(DisableReason::Cancelled, now);
        let home = vehicle.home_station;
        for &request in &held {
            self.release_request(request);
        }
        if let Some(station) = self.stations.get_mut(home) {
            if station.set_status(id, PoolStatus::Disabled).is_err() {
                warn!("cancelled {id} missing from station {home} pool");
            }
        }
        self.metrics.vehicles_disabled += 1;
        self.log.disabled.push((id, DisableReason::Cancelled));
        Ok(held)
    }

    /// Cancel and remove a vehicle entirely.
    pub fn despawn_vehicle(&mut self, id: EntityId) -> EngineResult<()> {
        self.cancel_vehicle(id)?;
        if let Some(vehicle) = self.vehicles.remove(id) {
            if let Some(station) = self.stations.get_mut(vehicle.home_station) {
                station.remove_vehicle(id);
            }
        }
        self.drop_adverts(id);
        Ok(())
    }

    /// Remove a station together with its vehicles.  Pending dispatches are
    /// released for re-matching.
    pub fn remove_station(&mut self, id: EntityId) -> EngineResult<()> {
        let station = self.stations.remove(id).ok_or(sd_station::StationError::NotFound(id))?;
        let now = self.now();
        for &vehicle in station.pool.keys() {
            let held = match self.vehicles.remove(vehicle) {
                Some(mut v) => v.cancel(DisableReason::Orphaned, now),
                None => continue,
            };
            for request in held {
                self.release_request(request);
            }
            self.drop_adverts(vehicle);
        }
        for &request in &station.pending_dispatch {
            self.release_request(request);
        }
        self.drop_adverts(id);
        Ok(())
    }

    fn drop_adverts(&mut self, source: EntityId) {
        for kind in RequestKind::ALL {
            if let Some(advert) = self.requests.find(source, kind, true) {
                self.requests
                    .schedule_removal(advert, Removal::Dropped(DropReason::SourceUnavailable));
            }
        }
    }

    pub fn add_producer(&mut self, producer: Box<dyn RequestProducer>) {
        self.producers.push(producer);
    }

    // ── Requests ──────────────────────────────────────────────────────────

    /// Submit a request from outside the producer phase.  Visible at the
    /// end of the current tick.
    pub fn emit_request(&mut self, request: NewRequest) -> SubmitOutcome {
        let now = self.now();
        self.submit(request, now)
    }

    fn submit(&mut self, request: NewRequest, now: Tick) -> SubmitOutcome {
        let group = self.config.kinds.get(request.kind).group_size;
        let outcome = self.requests.submit(request, group, now);
        trace!("submit {} for {}: {outcome:?}", request.kind, request.target);
        outcome
    }

    /// Cancel a request.  A vehicle driving to it moves on at its next step.
    pub fn cancel_request(&mut self, id: RequestId) -> bool {
        self.requests.schedule_removal(id, Removal::Dropped(DropReason::Cancelled))
    }

    /// Candidate queries `request` would issue right now.
    pub fn find_sources(&self, request: RequestId) -> Vec<CandidateQuery> {
        let Some(request) = self.requests.get(request) else {
            return Vec::new();
        };
        let view = self.match_view(self.now());
        if request.reversed {
            find_requests(request, &view, &self.open)
        } else {
            find_sources(request, &view, &self.sources)
        }
    }

    fn match_view(&self, now: Tick) -> MatchView<'_> {
        MatchView {
            kinds:    &self.config.kinds,
            targets:  &self.targets,
            requests: &self.requests,
            vehicles: &self.vehicles,
            stations: &self.stations,
            now,
        }
    }

    // ── Reporting ─────────────────────────────────────────────────────────

    pub fn summary(&self) -> TickSummary {
        let mut s = TickSummary { tick: self.now(), ..TickSummary::default() };
        for r in self.requests.iter() {
            s.live_requests += 1;
            s.bound_requests += usize::from(r.is_bound());
            s.reversed_requests += usize::from(r.reversed);
        }
        for v in self.vehicles.iter() {
            match v.state {
                VehicleState::Idle { .. } => s.vehicles_idle += 1,
                VehicleState::Disabled { .. } => s.vehicles_disabled += 1,
                _ => s.vehicles_busy += 1,
            }
        }
        s.queries_in_flight = self.pathfinder.in_flight();
        s
    }

    // ── Core tick processing ──────────────────────────────────────────────

    fn process_tick(&mut self, now: Tick) -> TickReport {
        // ── Phase 1: path results ─────────────────────────────────────────
        self.poll_paths(now);

        // ── Phase 2: producers ────────────────────────────────────────────
        let mut emitted = Vec::new();
        for producer in self.producers.iter_mut() {
            emitted.extend(producer.produce(now, &mut self.targets, &mut self.rng));
        }
        for request in emitted {
            self.submit(request, now);
        }

        // ── Phase 3: spatial indexes ──────────────────────────────────────
        self.rebuild_indexes(now);

        // ── Phase 4: request pass, then apply in ascending request id ─────
        let commands = self.plan_requests(now);
        for (request, command) in commands {
            self.apply_command(request, command, now);
        }

        // ── Phase 5: vehicle pass, then apply in ascending vehicle id ─────
        let effects = self.step_vehicles(now);
        for (vehicle, fx) in effects {
            for effect in fx {
                self.apply_vehicle_effect(vehicle, effect, now);
            }
        }

        // ── Phase 6: stations ─────────────────────────────────────────────
        let effects = self.tick_stations(now);
        for (station, fx) in effects {
            for effect in fx {
                self.apply_station_effect(station, effect, now);
            }
        }

        // ── Phase 7: commit ───────────────────────────────────────────────
        let commit = self.requests.commit();
        self.settle_removals(&commit, now);

        TickReport { log: mem::take(&mut self.log), commit }
    }

    fn poll_paths(&mut self, now: Tick) {
        for result in self.pathfinder.poll(now) {
            let Some(owner) = self.owners.remove(&result.query) else {
                trace!("dropping result for forgotten {}", result.query);
                continue;
            };
            match owner {
                QueryOwner::Candidate { request } => {
                    let cost = result
                        .outcome
                        .ok()
                        .map(|c| (c.cost, self.clock.ticks_for_secs(c.travel_secs)));
                    let search = self.requests.get_mut(request).and_then(|r| r.search.as_mut());
                    if let Some(search) = search {
                        search.settle(result.query, cost);
                    }
                }
                QueryOwner::Trip { vehicle } => {
                    if let Some(v) = self.vehicles.get_mut(vehicle) {
                        v.on_path_result(result.query, result.outcome, now, &self.clock);
                    }
                }
            }
        }
    }

    fn rebuild_indexes(&mut self, now: Tick) {
        let stations = self.stations.iter().map(|s| (s.id, s.position));
        let vehicles = self
            .vehicles
            .iter()
            .filter(|v| !v.state.is_disabled())
            .map(|v| (v.id, v.position_at(now)));
        let sources: Vec<_> = stations.chain(vehicles).collect();
        self.sources.rebuild(sources);

        let mut open: Vec<(EntityId, Position)> = Vec::new();
        if self.requests.iter().any(|r| r.reversed) {
            open = self
                .requests
                .iter()
                .filter(|r| !r.reversed && !r.is_bound() && r.search.is_none())
                .filter_map(|r| self.targets.get(r.target).map(|t| (t.id, t.position)))
                .collect();
            open.sort_by_key(|(id, _)| *id);
            open.dedup_by_key(|(id, _)| *id);
        }
        self.open.rebuild(open);
    }

    fn plan_requests(&self, now: Tick) -> Vec<(RequestId, Command)> {
        let view = self.match_view(now);
        let (sources, open) = (&self.sources, &self.open);
        let live: Vec<&ServiceRequest> = self.requests.iter().collect();

        #[cfg(not(feature = "parallel"))]
        {
            live.iter()
                .filter_map(|r| plan_request(r, &view, sources, open).map(|c| (r.id, c)))
                .collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            // Indexed collect keeps ascending request order.
            live.par_iter()
                .filter_map(|r| plan_request(r, &view, sources, open).map(|c| (r.id, c)))
                .collect()
        }
    }

    // ── Request apply ─────────────────────────────────────────────────────

    fn apply_command(&mut self, id: RequestId, command: Command, now: Tick) {
        if !self.requests.is_alive(id) {
            return;
        }
        match command {
            Command::Drop(reason) => self.drop_request(id, reason),
            Command::ClearBinding => {
                debug!("{id}: bound source gone, re-matching");
                self.release_request(id);
            }
            Command::CooldownTick => {
                if let Some(r) = self.requests.get_mut(id) {
                    r.cooldown = r.cooldown.saturating_sub(1);
                }
            }
            Command::Search(queries) => {
                let mut search = Search::new(now);
                for cq in queries {
                    let query = self.pathfinder.submit(cq.query, now);
                    self.owners.insert(query, QueryOwner::Candidate { request: id });
                    search.pending.push((query, cq.candidate));
                }
                trace!("{id}: {} candidate queries", search.pending.len());
                if let Some(r) = self.requests.get_mut(id) {
                    r.search = Some(search);
                }
            }
            Command::SearchFailed => self.fail_search(id),
            Command::Commit(ranked) => self.commit_binding(id, &ranked, now),
        }
    }

    fn drop_request(&mut self, id: RequestId, reason: DropReason) {
        match reason {
            DropReason::TargetGone | DropReason::NoCandidate => warn!("dropping {id}: {reason}"),
            _ => debug!("dropping {id}: {reason}"),
        }
        self.requests.schedule_removal(id, Removal::Dropped(reason));
    }

    fn fail_search(&mut self, id: RequestId) {
        let Some(r) = self.requests.get_mut(id) else {
            return;
        };
        let kind = r.kind;
        if r.reversed {
            r.search = None;
            trace!("advert {id} found nothing");
            self.requests.schedule_removal(id, Removal::Dropped(DropReason::NoCandidate));
            return;
        }
        self.metrics.record_failed_search(kind);
        if r.record_failure(self.config.kinds.get(kind)) {
            self.drop_request(id, DropReason::NoCandidate);
        } else {
            debug!("{id}: no candidate, fail {} cooldown {}", r.fail_count, r.cooldown);
        }
    }

    fn commit_binding(&mut self, id: RequestId, ranked: &[sd_request::Candidate], now: Tick) {
        let Some(r) = self.requests.get(id) else {
            return;
        };
        if r.is_bound() {
            return;
        }
        let reversed = r.reversed;

        for candidate in ranked {
            let done = if reversed {
                self.answer_advert(id, candidate.request, candidate.source, now)
            } else {
                self.try_dispatch(id, candidate.source, false, now)
            };
            if done {
                return;
            }
        }
        if let Some(r) = self.requests.get_mut(id) {
            r.search = None;
        }
        self.fail_search(id);
    }

    /// Bind the forward `request` to the `source` that advertised, and
    /// retire the advertisement.
    fn answer_advert(&mut self, advert: RequestId, request: RequestId, source: EntityId, now: Tick) -> bool {
        let open = self
            .requests
            .get(request)
            .is_some_and(|r| !r.reversed && !r.is_bound() && self.requests.is_alive(request));
        if !open || !self.try_dispatch(request, source, true, now) {
            return false;
        }
        self.requests.schedule_removal(advert, Removal::Serviced);
        true
    }

    /// Commit `request` to `source` if the source still accepts.
    fn try_dispatch(&mut self, request: RequestId, source: EntityId, via_advert: bool, now: Tick) -> bool {
        let Some(r) = self.requests.get(request) else {
            return false;
        };
        let (kind, priority, target) = (r.kind, r.priority, r.target);
        let Some(position) = self.targets.get(target).map(|t| t.position) else {
            return false;
        };

        if self.vehicles.contains(source) {
            let current = self
                .vehicles
                .get(source)
                .and_then(|v| v.state.current_request())
                .and_then(|c| self.requests.get(c))
                .map(|c| c.priority);
            let config = self.config.kinds.get(kind);
            let Some(vehicle) = self.vehicles.get_mut(source) else {
                return false;
            };
            if !vehicle.accepts(kind, priority, config, current) {
                return false;
            }
            if let Err(e) = self.requests.bind(request, source) {
                warn!("skipping commit: {e}");
                return false;
            }
            let outcome = match vehicle.accept(request, kind, priority, config, current, now) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{source} refused {request} after accepting: {e}");
                    self.requests.unbind(request);
                    return false;
                }
            };
            let home = vehicle.home_station;
            if let Some(station) = self.stations.get_mut(home) {
                if station.status(source) == Some(PoolStatus::Available) {
                    if let Err(e) = station.set_status(source, PoolStatus::Busy) {
                        warn!("{source} dispatched but {home} could not mark it busy: {e}");
                    }
                }
            }
            match outcome {
                sd_vehicle::AcceptOutcome::PreemptedAndReleased { displaced } => self.release_request(displaced),
                sd_vehicle::AcceptOutcome::Preempted { displaced } => debug!("{source}: {request} preempts {displaced}"),
                _ => {}
            }
            if outcome.needs_path() {
                self.plan_trip(source, position, kind, now);
            }
        } else {
            let Some(station) = self.stations.get_mut(source) else {
                return false;
            };
            let room = if via_advert { station.can_take_advertised() } else { station.can_take_dispatch() };
            if !station.serves(kind) || !room {
                return false;
            }
            if let Err(e) = self.requests.bind(request, source) {
                warn!("skipping commit: {e}");
                return false;
            }
            station.queue_dispatch(request);
        }

        if let Some(t) = self.targets.get_mut(target) {
            t.set_claim(kind, request);
        }
        self.metrics.record_binding(kind);
        self.log.bindings.push(Binding { request, kind, target, source, via_advert });
        debug!("bound {request} ({kind}) to {source}");
        true
    }

    /// Unbind `request` and free its target claim so matching retries.
    fn release_request(&mut self, request: RequestId) {
        if let Some(source) = self.requests.unbind(request) {
            if let Some(station) = self.stations.get_mut(source) {
                station.unqueue_dispatch(request);
            } else if let Some(vehicle) = self.vehicles.get_mut(source) {
                vehicle.forget(request);
            }
        }
        if let Some(r) = self.requests.get(request) {
            if let Some(t) = self.targets.get_mut(r.target) {
                t.release_claim(r.kind, request);
            }
        }
    }

    /// Ask the pathfinder for `vehicle`'s next leg.
    fn plan_trip(&mut self, vehicle: EntityId, destination: Position, kind: RequestKind, now: Tick) {
        let config = self.config.kinds.get(kind);
        let Some(v) = self.vehicles.get_mut(vehicle) else {
            return;
        };
        let mut query = PathQuery::new(v.position, destination, config.weights, config.max_speed);
        if matches!(v.state, VehicleState::Returning { .. }) {
            query = query.with_random_cost(self.config.return_random_cost);
        }
        let id: QueryId = self.pathfinder.submit(query, now);
        v.begin_plan(id);
        self.owners.insert(id, QueryOwner::Trip { vehicle });
    }

    // ── Vehicle pass ──────────────────────────────────────────────────────

    fn step_vehicles(&mut self, now: Tick) -> Vec<(EntityId, Vec<VehicleEffect>)> {
        // Explicit field borrows so the borrow checker sees disjoint access.
        let kinds = &self.config.kinds;
        let view = FleetView {
            kinds,
            targets:  &self.targets,
            requests: &self.requests,
            stations: &self.stations,
        };
        let due = |v: &Vehicle| kinds.get(v.kind).vehicle_interval.fires(now);
        let vehicles = &mut self.vehicles.vehicles;

        #[cfg(not(feature = "parallel"))]
        {
            vehicles
                .iter_mut()
                .filter(|(_, v)| due(v))
                .map(|(id, v)| (*id, sd_vehicle::step(v, &view, now)))
                .filter(|(_, fx)| !fx.is_empty())
                .collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let mut out: Vec<_> = vehicles
                .par_iter_mut()
                .filter(|(_, v)| due(v))
                .map(|(id, v)| (*id, sd_vehicle::step(v, &view, now)))
                .filter(|(_, fx)| !fx.is_empty())
                .collect();
            out.sort_by_key(|(id, _)| *id);
            out
        }
    }

    fn apply_vehicle_effect(&mut self, vehicle: EntityId, effect: VehicleEffect, now: Tick) {
        match effect {
            VehicleEffect::PlanPath { destination, kind } => self.plan_trip(vehicle, destination, kind, now),

            VehicleEffect::ReduceNeed { target, kind, amount } => {
                if let Some(t) = self.targets.get_mut(target) {
                    t.reduce_need(kind, amount);
                }
            }

            VehicleEffect::Complete { request, serviced } => {
                let removal = if serviced {
                    Removal::Serviced
                } else {
                    Removal::Dropped(DropReason::NoLongerNeeded)
                };
                self.requests.schedule_removal(request, removal);
            }

            VehicleEffect::Release { request } => {
                debug!("{vehicle} releases {request}");
                self.release_request(request);
            }

            VehicleEffect::Parked { station, accepted } => {
                let status = if accepted { PoolStatus::Available } else { PoolStatus::Disabled };
                if let Some(st) = self.stations.get_mut(station) {
                    if st.set_status(vehicle, status).is_err() {
                        warn!("{vehicle} parked at {station} but is not in its pool");
                    }
                }
            }

            VehicleEffect::Disabled { reason } => {
                info!("{vehicle} disabled: {reason:?}");
                let home = self.vehicles.get(vehicle).map(|v| v.home_station);
                if let Some(st) = home.and_then(|h| self.stations.get_mut(h)) {
                    if st.set_status(vehicle, PoolStatus::Disabled).is_err() {
                        warn!("{vehicle} disabled but is not in its home pool");
                    }
                }
                self.metrics.vehicles_disabled += 1;
                self.log.disabled.push((vehicle, reason));
            }

            VehicleEffect::EmitReversed { kind } => {
                self.submit(NewRequest::reversed(vehicle, kind, 0.0), now);
            }

            VehicleEffect::Secure { target } => {
                if let Some(t) = self.targets.get_mut(target) {
                    if !t.secured {
                        info!("{vehicle} secured {target}");
                        t.secured = true;
                    }
                }
            }
        }
    }

    // ── Station pass ──────────────────────────────────────────────────────

    fn tick_stations(&mut self, now: Tick) -> Vec<(EntityId, Vec<StationEffect>)> {
        let view = DepotView {
            kinds:    &self.config.kinds,
            requests: &self.requests,
            vehicles: &self.vehicles,
        };
        let mut out = Vec::new();
        for station in self.stations.iter_mut() {
            let fx = sd_station::tick(station, &view, now);
            if !fx.is_empty() {
                out.push((station.id, fx));
            }
        }
        out
    }

    fn apply_station_effect(&mut self, station: EntityId, effect: StationEffect, now: Tick) {
        match effect {
            StationEffect::Reactivate { vehicle } => {
                if let Some(v) = self.vehicles.get_mut(vehicle) {
                    v.reactivate();
                    debug!("{vehicle} reactivated at {station}");
                }
            }
            StationEffect::Assign { request, vehicle } => self.hand_over(station, request, vehicle, now),
            StationEffect::Spawn { request } => match self.spawn_vehicle(station, None, PoolStatus::Busy) {
                Ok(vehicle) => {
                    self.log.spawned.push((vehicle, station));
                    self.hand_over(station, request, vehicle, now);
                }
                Err(e) => {
                    warn!("station {station} could not spawn for {request}: {e}");
                    self.release_request(request);
                }
            },
            StationEffect::DiscardPending { request } => trace!("{station} discards {request}"),
            StationEffect::EmitReversed { kind } => {
                self.submit(NewRequest::reversed(station, kind, 0.0), now);
            }
        }
    }

    /// Move a station-bound request onto one of its vehicles.
    fn hand_over(&mut self, station: EntityId, request: RequestId, vehicle: EntityId, now: Tick) {
        let Some(r) = self.requests.get(request) else {
            return;
        };
        let (kind, priority, target) = (r.kind, r.priority, r.target);
        if let Err(e) = self.requests.rebind(request, station, vehicle) {
            warn!("cannot hand {request} to {vehicle}: {e}");
            return;
        }
        let config = self.config.kinds.get(kind);
        let accepted = self
            .vehicles
            .get_mut(vehicle)
            .map(|v| v.accept(request, kind, priority, config, None, now));
        match accepted {
            Some(Ok(outcome)) => {
                if outcome.needs_path() {
                    if let Some(position) = self.targets.get(target).map(|t| t.position) {
                        self.plan_trip(vehicle, position, kind, now);
                    }
                }
            }
            Some(Err(e)) => {
                warn!("{vehicle} refused {request} from {station}: {e}");
                self.release_request(request);
                if let Some(st) = self.stations.get_mut(station) {
                    if let Err(e) = st.set_status(vehicle, PoolStatus::Available) {
                        warn!("{vehicle} refused a hand-over but {station} could not free it: {e}");
                    }
                }
            }
            None => self.release_request(request),
        }
    }

    /// Cancel every in-flight query and forget its owner.
    pub(crate) fn reset_queries(&mut self) {
        for (query, _) in self.owners.drain() {
            self.pathfinder.cancel(query);
        }
    }

    // ── Commit follow-up ──────────────────────────────────────────────────

    fn settle_removals(&mut self, commit: &CommitSummary, now: Tick) {
        for (request, removal) in &commit.removed {
            if let Some(search) = &request.search {
                for (query, _) in &search.pending {
                    self.pathfinder.cancel(*query);
                    self.owners.remove(query);
                }
            }
            if let Some(t) = self.targets.get_mut(request.target) {
                t.release_claim(request.kind, request.id);
            }
            if let Some(source) = request.source_binding {
                if let Some(station) = self.stations.get_mut(source) {
                    station.unqueue_dispatch(request.id);
                } else if let Some(vehicle) = self.vehicles.get_mut(source) {
                    vehicle.forget(request.id);
                }
            }

            if request.reversed {
                continue;
            }
            match removal {
                Removal::Serviced => {
                    let response = now.since(request.created);
                    self.metrics.record_serviced(request.kind, response);
                    for producer in self.producers.iter_mut() {
                        producer.on_serviced(request, now);
                    }
                }
                Removal::Dropped(reason) => {
                    self.metrics.record_dropped(request.kind);
                    for producer in self.producers.iter_mut() {
                        producer.on_dropped(request, *reason, now);
                    }
                }
            }
        }
    }
}
