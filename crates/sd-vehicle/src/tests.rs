//! Unit tests for sd-vehicle.

#[cfg(test)]
mod helpers {
    use std::collections::HashMap;

    use sd_core::{EntityId, KindConfig, KindSet, KindTable, Position, RequestId, RequestKind};

    use crate::{RequestInfo, Vehicle, VehicleWorld};

    pub const HOME: EntityId = EntityId(100);
    pub const KIND: RequestKind = RequestKind::Rescue;

    pub struct FakeWorld {
        pub kinds:     KindTable,
        pub requests:  HashMap<RequestId, RequestInfo>,
        pub targets:   HashMap<EntityId, (Position, f32)>,
        pub free_slot: bool,
        pub advertising: bool,
    }

    impl FakeWorld {
        pub fn new() -> Self {
            Self {
                kinds: KindTable::every_tick(),
                requests: HashMap::new(),
                targets: HashMap::new(),
                free_slot: true,
                advertising: false,
            }
        }

        /// Register a target at `(x, 0)` with `need`, plus a request for it.
        pub fn site(&mut self, request: u32, target: u32, x: f32, need: f32, priority: f32) -> RequestId {
            let id = RequestId(request);
            let target = EntityId(target);
            self.targets.insert(target, (Position::new(x, 0.0), need));
            self.requests.insert(id, RequestInfo { target, kind: KIND, priority });
            id
        }

        pub fn set_need(&mut self, target: u32, need: f32) {
            self.targets.get_mut(&EntityId(target)).unwrap().1 = need;
        }

        pub fn cfg(&self) -> KindConfig {
            self.kinds.get(KIND).clone()
        }
    }

    impl VehicleWorld for FakeWorld {
        fn config(&self, kind: RequestKind) -> &KindConfig {
            self.kinds.get(kind)
        }
        fn request(&self, id: RequestId) -> Option<RequestInfo> {
            self.requests.get(&id).copied()
        }
        fn target_position(&self, target: EntityId) -> Option<Position> {
            self.targets.get(&target).map(|t| t.0)
        }
        fn target_need(&self, target: EntityId, _kind: RequestKind) -> Option<f32> {
            self.targets.get(&target).map(|t| t.1)
        }
        fn home_position(&self, station: EntityId) -> Option<Position> {
            (station == HOME).then(|| Position::new(0.0, 0.0))
        }
        fn home_has_free_slot(&self, _station: EntityId, _vehicle: EntityId) -> bool {
            self.free_slot
        }
        fn advertising(&self, _source: EntityId, _kind: RequestKind) -> bool {
            self.advertising
        }
    }

    pub fn truck() -> Vehicle {
        Vehicle::new(EntityId(1), KIND, KindSet::EMPTY, HOME, Position::new(0.0, 0.0), 40.0)
    }
}

// ── Acceptance & preemption ────────────────────────────────────────────────────

#[cfg(test)]
mod accept {
    use sd_core::{RequestId, RequestKind, Tick};

    use super::helpers::{FakeWorld, KIND, truck};
    use crate::{AcceptOutcome, DisableReason, VehicleError, VehicleState};

    #[test]
    fn idle_vehicle_heads_out() {
        let world = FakeWorld::new();
        let mut v = truck();
        let out = v.accept(RequestId(1), KIND, 1.0, &world.cfg(), None, Tick(0)).unwrap();
        assert_eq!(out, AcceptOutcome::Dispatched);
        assert!(out.needs_path());
        assert_eq!(v.state, VehicleState::EnRoute { request: RequestId(1), eta: None });
        assert_eq!(v.load(), 1);
    }

    #[test]
    fn full_vehicle_refuses_equal_priority() {
        let world = FakeWorld::new();
        let cfg = world.cfg(); // rescue: max_concurrency 1, preemptive
        let mut v = truck();
        v.accept(RequestId(1), KIND, 1.0, &cfg, None, Tick(0)).unwrap();
        let err = v.accept(RequestId(2), KIND, 1.0, &cfg, Some(1.0), Tick(0)).unwrap_err();
        assert_eq!(err, VehicleError::AtCapacity { vehicle: v.id, load: 1 });
    }

    #[test]
    fn preempt_releases_when_no_room() {
        let world = FakeWorld::new();
        let cfg = world.cfg();
        let mut v = truck();
        v.accept(RequestId(1), KIND, 1.0, &cfg, None, Tick(0)).unwrap();
        let out = v.accept(RequestId(2), KIND, 5.0, &cfg, Some(1.0), Tick(0)).unwrap();
        assert_eq!(out, AcceptOutcome::PreemptedAndReleased { displaced: RequestId(1) });
        assert_eq!(v.state.current_request(), Some(RequestId(2)));
        assert!(v.assigned_requests.is_empty());
    }

    #[test]
    fn preempt_requeues_when_room() {
        let world = FakeWorld::new();
        let cfg = sd_core::KindConfig { max_concurrency: 2, ..world.cfg() };
        let mut v = truck();
        v.accept(RequestId(1), KIND, 1.0, &cfg, None, Tick(0)).unwrap();
        let out = v.accept(RequestId(2), KIND, 5.0, &cfg, Some(1.0), Tick(0)).unwrap();
        assert_eq!(out, AcceptOutcome::Preempted { displaced: RequestId(1) });
        assert_eq!(v.assigned_requests.front(), Some(&RequestId(1)));
        assert_eq!(v.load(), 2);
    }

    #[test]
    fn servicing_is_never_preempted() {
        let world = FakeWorld::new();
        let cfg = sd_core::KindConfig { max_concurrency: 2, ..world.cfg() };
        let mut v = truck();
        v.state = VehicleState::Servicing { request: RequestId(1), progress: 0.0 };
        let out = v.accept(RequestId(2), KIND, 99.0, &cfg, Some(1.0), Tick(0)).unwrap();
        assert_eq!(out, AcceptOutcome::Queued);
        assert_eq!(v.state.current_request(), Some(RequestId(1)));
    }

    #[test]
    fn disabled_empty_or_wrong_kind_never_accepts() {
        let world = FakeWorld::new();
        let cfg = world.cfg();

        let mut disabled = truck();
        disabled.state = VehicleState::Disabled { reason: DisableReason::NoFreeSlot };
        assert!(!disabled.accepts(KIND, 1.0, &cfg, None));

        let mut empty = truck();
        empty.service_accumulator = 0.0;
        assert!(!empty.accepts(KIND, 1.0, &cfg, None));

        let v = truck();
        assert!(!v.accepts(RequestKind::Delivery, 1.0, &cfg, None));
        assert!(v.accepts(KIND, 1.0, &cfg, None));
    }
}

// ── Path results ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod paths {
    use sd_core::{Position, QueryId, RequestId, SimClock, Tick};
    use sd_spatial::{PathCost, PathFailure};

    use super::helpers::{FakeWorld, KIND, truck};
    use crate::VehicleState;

    fn cost(secs: f32) -> PathCost {
        PathCost { cost: 1.0, distance_m: 1.0, travel_secs: secs, end: Position::new(50.0, 0.0) }
    }

    #[test]
    fn result_sets_eta_and_trip() {
        let world = FakeWorld::new();
        let mut v = truck();
        v.accept(RequestId(1), KIND, 1.0, &world.cfg(), None, Tick(0)).unwrap();
        v.begin_plan(QueryId(7));
        assert!(v.on_path_result(QueryId(7), Ok(cost(3.5)), Tick(10), &SimClock::new(1.0)));
        assert_eq!(v.state, VehicleState::EnRoute { request: RequestId(1), eta: Some(Tick(14)) });
        let trip = v.trip.unwrap();
        assert_eq!(v.position_at(Tick(12)), trip.from.lerp(trip.to, 0.5));
    }

    #[test]
    fn redirect_mid_trip_departs_from_current_point() {
        let world = FakeWorld::new();
        let mut v = truck();
        v.position = Position::new(100.0, 0.0);
        v.head_home(Tick(0));
        v.begin_plan(QueryId(1));
        let home = PathCost { cost: 1.0, distance_m: 100.0, travel_secs: 10.0, end: Position::new(0.0, 0.0) };
        v.on_path_result(QueryId(1), Ok(home), Tick(0), &SimClock::new(1.0));

        v.accept(RequestId(5), KIND, 1.0, &world.cfg(), None, Tick(5)).unwrap();
        assert_eq!(v.position, Position::new(50.0, 0.0));
        assert!(v.trip.is_none());
        assert_eq!(v.state, VehicleState::EnRoute { request: RequestId(5), eta: None });

        // The next leg starts where the vehicle was cut off.
        v.begin_plan(QueryId(2));
        v.on_path_result(QueryId(2), Ok(cost(1.0)), Tick(5), &SimClock::new(1.0));
        assert_eq!(v.trip.unwrap().from, Position::new(50.0, 0.0));
    }

    #[test]
    fn stale_result_ignored() {
        let mut v = truck();
        v.begin_plan(QueryId(2));
        assert!(!v.on_path_result(QueryId(1), Err(PathFailure::NoRoute), Tick(0), &SimClock::default()));
        assert!(!v.path_failed);
        assert!(v.on_path_result(QueryId(2), Err(PathFailure::NoRoute), Tick(0), &SimClock::default()));
        assert!(v.path_failed);
    }
}

// ── State machine ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod machine {
    use sd_core::{EntityId, Position, QueryId, RequestId, RequestKind, SimClock, Tick};
    use sd_spatial::{PathCost, PathFailure};

    use super::helpers::{FakeWorld, HOME, KIND, truck};
    use crate::{DisableReason, Vehicle, VehicleEffect, VehicleState, step};

    /// Dispatch `v` to `request` and deliver a path that ends at `end`.
    fn drive(v: &mut Vehicle, world: &FakeWorld, request: RequestId, end: Position, now: Tick) {
        let priority = world.requests[&request].priority;
        v.accept(request, KIND, priority, &world.cfg(), None, now).unwrap();
        v.begin_plan(QueryId(request.0));
        let cost = PathCost { cost: 1.0, distance_m: 1.0, travel_secs: 2.0, end };
        v.on_path_result(QueryId(request.0), Ok(cost), now, &SimClock::new(1.0));
    }

    #[test]
    fn en_route_waits_until_eta() {
        let mut world = FakeWorld::new();
        let r = world.site(1, 10, 50.0, 6.0, 1.0);
        let mut v = truck();
        drive(&mut v, &world, r, Position::new(50.0, 0.0), Tick(0));
        assert!(step(&mut v, &world, Tick(1)).is_empty());
        assert!(matches!(v.state, VehicleState::EnRoute { .. }));
        step(&mut v, &world, Tick(2));
        assert_eq!(v.state, VehicleState::Servicing { request: r, progress: 0.0 });
        assert_eq!(v.position, Position::new(50.0, 0.0));
    }

    #[test]
    fn services_then_returns_the_tick_after_need_hits_zero() {
        let mut world = FakeWorld::new();
        let r = world.site(1, 10, 50.0, 3.0, 1.0);
        let mut v = truck();
        drive(&mut v, &world, r, Position::new(50.0, 0.0), Tick(0));
        step(&mut v, &world, Tick(2));

        // service_rate 2.0 (rescue): 3.0 -> 1.0 -> 0.0
        let fx = step(&mut v, &world, Tick(3));
        assert_eq!(fx, vec![VehicleEffect::ReduceNeed { target: EntityId(10), kind: KIND, amount: 2.0 }]);
        world.set_need(10, 1.0);
        let fx = step(&mut v, &world, Tick(4));
        assert_eq!(fx, vec![VehicleEffect::ReduceNeed { target: EntityId(10), kind: KIND, amount: 1.0 }]);
        world.set_need(10, 0.0);
        assert_eq!(v.service_accumulator, 37.0);

        let fx = step(&mut v, &world, Tick(5));
        assert_eq!(fx[0], VehicleEffect::Complete { request: r, serviced: true });
        assert!(matches!(fx[1], VehicleEffect::PlanPath { .. }));
        assert_eq!(v.state, VehicleState::Returning { eta: None });
    }

    #[test]
    fn no_wait_at_cleared_target() {
        let mut world = FakeWorld::new();
        let first = world.site(1, 10, 50.0, 5.0, 1.0);
        let second = world.site(2, 11, 80.0, 5.0, 1.0);
        let mut cfg = world.cfg();
        cfg.max_concurrency = 2;
        world.kinds.set(KIND, cfg);

        let mut v = truck();
        drive(&mut v, &world, first, Position::new(50.0, 0.0), Tick(0));
        v.accept(second, KIND, 1.0, &world.cfg(), Some(1.0), Tick(0)).unwrap();

        // A competitor clears the first site while we drive.
        world.set_need(10, 0.0);
        let fx = step(&mut v, &world, Tick(2));
        assert_eq!(fx[0], VehicleEffect::Complete { request: first, serviced: false });
        assert_eq!(fx[1], VehicleEffect::PlanPath { destination: Position::new(80.0, 0.0), kind: KIND });
        assert_eq!(v.state, VehicleState::EnRoute { request: second, eta: None });
    }

    #[test]
    fn cleared_target_with_empty_queue_returns_same_step() {
        let mut world = FakeWorld::new();
        let r = world.site(1, 10, 50.0, 5.0, 1.0);
        let mut v = truck();
        drive(&mut v, &world, r, Position::new(50.0, 0.0), Tick(0));
        world.set_need(10, 0.0);
        step(&mut v, &world, Tick(2));
        assert_eq!(v.state, VehicleState::Returning { eta: None });
    }

    #[test]
    fn cancelled_request_moves_on() {
        let mut world = FakeWorld::new();
        let r = world.site(1, 10, 50.0, 5.0, 1.0);
        let mut v = truck();
        drive(&mut v, &world, r, Position::new(50.0, 0.0), Tick(0));
        step(&mut v, &world, Tick(2));
        world.requests.clear();
        let fx = step(&mut v, &world, Tick(3));
        assert!(matches!(fx[0], VehicleEffect::PlanPath { .. }));
        assert_eq!(v.state, VehicleState::Returning { eta: None });
    }

    #[test]
    fn two_path_failures_disable() {
        let mut world = FakeWorld::new();
        let r = world.site(1, 10, 50.0, 5.0, 1.0);
        let mut v = truck();
        v.accept(r, KIND, 1.0, &world.cfg(), None, Tick(0)).unwrap();
        v.begin_plan(QueryId(1));
        v.on_path_result(QueryId(1), Err(PathFailure::NoRoute), Tick(0), &SimClock::default());

        let fx = step(&mut v, &world, Tick(1));
        assert_eq!(fx[0], VehicleEffect::Release { request: r });
        assert_eq!(v.state, VehicleState::Returning { eta: None });

        v.begin_plan(QueryId(2));
        v.on_path_result(QueryId(2), Err(PathFailure::NoRoute), Tick(1), &SimClock::default());
        let fx = step(&mut v, &world, Tick(2));
        assert_eq!(fx, vec![VehicleEffect::Disabled { reason: DisableReason::PathFailure }]);
        assert!(v.state.is_disabled());
        world.requests.clear();
        assert!(step(&mut v, &world, Tick(3)).is_empty());
    }

    #[test]
    fn arriving_off_site_counts_as_path_failure() {
        let mut world = FakeWorld::new();
        let r = world.site(1, 10, 500.0, 5.0, 1.0);
        let mut v = truck();
        // Path ends 100 m short; proximity is 30 m.
        drive(&mut v, &world, r, Position::new(400.0, 0.0), Tick(0));
        let fx = step(&mut v, &world, Tick(2));
        assert_eq!(fx[0], VehicleEffect::Release { request: r });
        assert_eq!(v.path_failures, 1);
        assert_eq!(v.state, VehicleState::Returning { eta: None });
    }

    #[test]
    fn securing_kind_secures_on_arrival() {
        let mut world = FakeWorld::new();
        let r = world.site(1, 10, 50.0, 6.0, 1.0);
        let mut v = truck();
        drive(&mut v, &world, r, Position::new(50.0, 0.0), Tick(0));
        assert!(step(&mut v, &world, Tick(2)).is_empty());

        let mut cfg = world.cfg();
        cfg.secures_on_arrival = true;
        world.kinds.set(KIND, cfg);
        let mut v = truck();
        drive(&mut v, &world, r, Position::new(50.0, 0.0), Tick(0));
        let fx = step(&mut v, &world, Tick(2));
        assert_eq!(fx, vec![VehicleEffect::Secure { target: EntityId(10) }]);
        assert_eq!(v.state, VehicleState::Servicing { request: r, progress: 0.0 });
    }

    #[test]
    fn park_refills_or_disables() {
        let mut world = FakeWorld::new();
        for free_slot in [true, false] {
            world.free_slot = free_slot;
            let mut v = truck();
            v.service_accumulator = 3.0;
            v.state = VehicleState::Returning { eta: Some(Tick(5)) };
            let fx = step(&mut v, &world, Tick(5));
            assert_eq!(fx[0], VehicleEffect::Parked { station: HOME, accepted: free_slot });
            assert_eq!(v.service_accumulator, v.capacity);
            if free_slot {
                assert_eq!(v.state, VehicleState::Idle { capacity_left: 40.0 });
            } else {
                assert_eq!(v.state, VehicleState::Disabled { reason: DisableReason::NoFreeSlot });
                assert!(v.reactivate());
                assert!(v.state.is_idle());
            }
        }
    }

    #[test]
    fn returning_vehicle_advertises_once() {
        let mut world = FakeWorld::new();
        let mut v = truck();
        v.state = VehicleState::Returning { eta: Some(Tick(1_000)) };
        // rescue vehicle stride is 64 (+4)
        assert!(step(&mut v, &world, Tick(3)).is_empty());
        assert_eq!(step(&mut v, &world, Tick(68)), vec![VehicleEffect::EmitReversed { kind: KIND }]);
        world.advertising = true;
        assert!(step(&mut v, &world, Tick(132)).is_empty());
    }

    #[test]
    fn cancel_clears_everything() {
        let mut world = FakeWorld::new();
        let a = world.site(1, 10, 50.0, 5.0, 1.0);
        let b = world.site(2, 11, 60.0, 5.0, 1.0);
        let mut cfg = world.cfg();
        cfg.max_concurrency = 2;
        world.kinds.set(KIND, cfg);
        let mut v = truck();
        v.accept(a, KIND, 1.0, &world.cfg(), None, Tick(0)).unwrap();
        v.accept(b, KIND, 1.0, &world.cfg(), Some(1.0), Tick(0)).unwrap();
        let held = v.cancel(DisableReason::Cancelled, Tick(0));
        assert_eq!(held, vec![a, b]);
        assert!(v.assigned_requests.is_empty());
        assert_eq!(v.load(), 0);
        assert!(!v.accepts(RequestKind::Rescue, 1.0, &world.cfg(), None));
    }
}
