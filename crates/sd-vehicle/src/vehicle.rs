//! The vehicle record and the mutations the engine applies to it directly.

use std::collections::VecDeque;

use log::debug;

use sd_core::{EntityId, KindConfig, KindSet, Position, QueryId, RequestId, RequestKind, SimClock, Tick};
use sd_spatial::{PathCost, PathFailure};

use crate::{DisableReason, Trip, VehicleError, VehicleResult, VehicleState};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vehicle {
    pub id:                 EntityId,
    /// Kind that sets capacity and cadence.
    pub kind:               RequestKind,
    /// Every kind the vehicle may be dispatched for.
    pub serves:             KindSet,
    pub home_station:       EntityId,
    pub position:           Position,
    pub state:              VehicleState,
    /// Requests waiting behind the current one.
    pub assigned_requests:  VecDeque<RequestId>,
    pub service_accumulator: f32,
    pub capacity:           f32,
    /// Consecutive path failures since the last successful arrival.
    #[cfg_attr(feature = "serde", serde(default))]
    pub path_failures:      u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trip:               Option<Trip>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub pending_query:      Option<QueryId>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub path_failed:        bool,
}

/// What `accept` did with a newly committed request.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AcceptOutcome {
    /// Became the current request; the vehicle needs a path plan.
    Dispatched,
    /// Became the current request ahead of `displaced`, which went back to
    /// the front of the queue.  Needs a path plan.
    Preempted { displaced: RequestId },
    /// Became the current request; `displaced` did not fit in the queue and
    /// must be released for re-matching.  Needs a path plan.
    PreemptedAndReleased { displaced: RequestId },
    /// Appended behind the current request.
    Queued,
}

impl AcceptOutcome {
    pub fn needs_path(self) -> bool {
        !matches!(self, AcceptOutcome::Queued)
    }
}

impl Vehicle {
    /// A fresh vehicle parked at `position` with a full accumulator.
    pub fn new(id: EntityId, kind: RequestKind, serves: KindSet, home_station: EntityId, position: Position, capacity: f32) -> Self {
        Self {
            id,
            kind,
            serves: serves.with(kind),
            home_station,
            position,
            state: VehicleState::Idle { capacity_left: capacity },
            assigned_requests: VecDeque::new(),
            service_accumulator: capacity,
            capacity,
            path_failures: 0,
            trip: None,
            pending_query: None,
            path_failed: false,
        }
    }

    /// Requests held, the current one included.
    pub fn load(&self) -> usize {
        self.assigned_requests.len() + usize::from(self.state.current_request().is_some())
    }

    /// Every request the vehicle is carrying, current first.
    pub fn held_requests(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.state.current_request().into_iter().chain(self.assigned_requests.iter().copied())
    }

    pub fn position_at(&self, now: Tick) -> Position {
        match &self.trip {
            Some(trip) => trip.position_at(now),
            None => self.position,
        }
    }

    /// Could the vehicle take a `kind` request of `priority` right now?
    /// `current_priority` is the priority of the request it is driving to.
    pub fn accepts(&self, kind: RequestKind, priority: f32, config: &KindConfig, current_priority: Option<f32>) -> bool {
        self.check_accept(kind, priority, config, current_priority).is_ok()
    }

    fn check_accept(&self, kind: RequestKind, priority: f32, config: &KindConfig, current_priority: Option<f32>) -> VehicleResult<()> {
        if self.state.is_disabled() {
            return Err(VehicleError::Disabled(self.id));
        }
        if !self.serves.contains(kind) {
            return Err(VehicleError::WrongKind { vehicle: self.id, kind });
        }
        if self.service_accumulator <= 0.0 {
            return Err(VehicleError::Empty(self.id));
        }
        let load = self.load();
        if load < usize::from(config.max_concurrency) || self.can_preempt(priority, config, current_priority) {
            Ok(())
        } else {
            Err(VehicleError::AtCapacity { vehicle: self.id, load })
        }
    }

    fn can_preempt(&self, priority: f32, config: &KindConfig, current_priority: Option<f32>) -> bool {
        config.preemptive
            && matches!(self.state, VehicleState::EnRoute { .. })
            && current_priority.is_some_and(|p| priority > p)
    }

    /// Take on a committed request.
    ///
    /// Idle and returning vehicles head out at once from wherever they are
    /// at `now`.  An en-route vehicle
    /// switches to a strictly higher-priority request when the kind allows
    /// preemption; a servicing vehicle is never interrupted, so anything
    /// else is queued.
    pub fn accept(
        &mut self,
        request: RequestId,
        kind: RequestKind,
        priority: f32,
        config: &KindConfig,
        current_priority: Option<f32>,
        now: Tick,
    ) -> VehicleResult<AcceptOutcome> {
        self.check_accept(kind, priority, config, current_priority)?;
        let has_room = self.load() < usize::from(config.max_concurrency);

        let outcome = match self.state {
            VehicleState::Idle { .. } | VehicleState::Returning { .. } => {
                self.head_out(request, now);
                AcceptOutcome::Dispatched
            }
            VehicleState::EnRoute { request: current, .. } if self.can_preempt(priority, config, current_priority) => {
                self.head_out(request, now);
                if has_room {
                    self.assigned_requests.push_front(current);
                    AcceptOutcome::Preempted { displaced: current }
                } else {
                    AcceptOutcome::PreemptedAndReleased { displaced: current }
                }
            }
            _ => {
                self.assigned_requests.push_back(request);
                AcceptOutcome::Queued
            }
        };
        debug!("vehicle {} accepted {request}: {outcome:?}", self.id);
        Ok(outcome)
    }

    /// Start driving to `request`, abandoning any trip in progress.
    pub(crate) fn head_out(&mut self, request: RequestId, now: Tick) {
        self.state = VehicleState::EnRoute { request, eta: None };
        self.stop_where_you_are(now);
    }

    /// Start driving home.
    pub(crate) fn head_home(&mut self, now: Tick) {
        self.state = VehicleState::Returning { eta: None };
        self.stop_where_you_are(now);
    }

    /// Cut the current trip short at its interpolated point.  Any pending
    /// plan is superseded and its result will be ignored.
    pub(crate) fn stop_where_you_are(&mut self, now: Tick) {
        if let Some(trip) = self.trip.take() {
            self.position = trip.position_at(now);
        }
        self.pending_query = None;
        self.path_failed = false;
    }

    /// Record the query issued for this vehicle's next leg.
    pub fn begin_plan(&mut self, query: QueryId) {
        self.pending_query = Some(query);
        self.path_failed = false;
    }

    /// Feed a path result back.  Results for superseded queries are ignored
    /// and `false` is returned.
    pub fn on_path_result(
        &mut self,
        query: QueryId,
        outcome: Result<PathCost, PathFailure>,
        now: Tick,
        clock: &SimClock,
    ) -> bool {
        if self.pending_query != Some(query) {
            return false;
        }
        self.pending_query = None;
        match outcome {
            Ok(cost) => {
                let arrival = now.offset(clock.ticks_for_secs(cost.travel_secs));
                self.trip = Some(Trip { from: self.position, to: cost.end, departure: now, arrival });
                self.state.set_eta(arrival);
            }
            Err(_) => self.path_failed = true,
        }
        true
    }

    /// Complete the current trip: the vehicle is now at its end point.
    pub(crate) fn finish_trip(&mut self) {
        if let Some(trip) = self.trip.take() {
            self.position = trip.to;
        }
    }

    /// Refill and park.  The caller decides between idle and disabled.
    pub(crate) fn park(&mut self, disabled: Option<DisableReason>) {
        self.finish_trip();
        self.service_accumulator = self.capacity;
        self.path_failures = 0;
        self.state = match disabled {
            Some(reason) => VehicleState::Disabled { reason },
            None => VehicleState::Idle { capacity_left: self.capacity },
        };
    }

    /// Stop everything where the vehicle stands at `now`: clears the queue
    /// and returns every request held so the caller can release their
    /// bindings.
    pub fn cancel(&mut self, reason: DisableReason, now: Tick) -> Vec<RequestId> {
        let held: Vec<_> = self.held_requests().collect();
        self.assigned_requests.clear();
        self.stop_where_you_are(now);
        self.state = VehicleState::Disabled { reason };
        held
    }

    /// Bring a disabled vehicle parked at home back into service.
    pub fn reactivate(&mut self) -> bool {
        if !self.state.is_disabled() {
            return false;
        }
        self.path_failures = 0;
        self.service_accumulator = self.capacity;
        self.state = VehicleState::Idle { capacity_left: self.capacity };
        true
    }

    /// Drop `request` from the queue (not the current one).
    pub fn forget(&mut self, request: RequestId) -> bool {
        let before = self.assigned_requests.len();
        self.assigned_requests.retain(|r| *r != request);
        before != self.assigned_requests.len()
    }
}
