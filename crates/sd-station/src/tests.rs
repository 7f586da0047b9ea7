//! Unit tests for sd-station.

#[cfg(test)]
mod helpers {
    use std::collections::HashSet;

    use sd_core::{EntityId, KindConfig, KindTable, Position, RequestId, RequestKind, UpdateInterval};

    use crate::{Station, StationWorld};

    pub struct FakeWorld {
        pub kinds:         KindTable,
        pub alive:         HashSet<RequestId>,
        pub busy:          HashSet<EntityId>,
        pub reactivatable: HashSet<EntityId>,
        pub advertising:   bool,
    }

    impl FakeWorld {
        pub fn new() -> Self {
            let mut kinds = KindTable::default();
            kinds.get_mut(RequestKind::Patrol).station_reversed_stride = Some(UpdateInterval::new(8, 2));
            Self {
                kinds,
                alive: HashSet::new(),
                busy: HashSet::new(),
                reactivatable: HashSet::new(),
                advertising: false,
            }
        }
    }

    impl StationWorld for FakeWorld {
        fn config(&self, kind: RequestKind) -> &KindConfig {
            self.kinds.get(kind)
        }
        fn request_alive(&self, request: RequestId) -> bool {
            self.alive.contains(&request)
        }
        fn vehicle_idle(&self, vehicle: EntityId) -> bool {
            !self.busy.contains(&vehicle)
        }
        fn vehicle_reactivatable(&self, vehicle: EntityId) -> bool {
            self.reactivatable.contains(&vehicle)
        }
        fn advertising(&self, _station: EntityId, _kind: RequestKind) -> bool {
            self.advertising
        }
    }

    pub fn station(kind: RequestKind, capacity: u32) -> Station {
        Station::new(EntityId(1), Position::new(0.0, 0.0), kind, capacity)
    }
}

// ── Station bookkeeping ────────────────────────────────────────────────────────

#[cfg(test)]
mod pool {
    use sd_core::{EntityId, RequestId, RequestKind};

    use super::helpers::station;
    use crate::{PoolStatus, StationError};

    #[test]
    fn slots_and_limits() {
        let mut s = station(RequestKind::Collection, 2);
        assert_eq!(s.spawn_room(), 2);
        s.add_vehicle(EntityId(10), PoolStatus::Busy).unwrap();
        s.add_vehicle(EntityId(11), PoolStatus::Available).unwrap();
        assert_eq!(s.spawn_room(), 0);
        assert_eq!(
            s.add_vehicle(EntityId(12), PoolStatus::Busy),
            Err(StationError::Full { station: EntityId(1), capacity: 2 })
        );
        assert_eq!(s.available_count(), 1);
        assert_eq!(s.status(EntityId(11)), Some(PoolStatus::Available));
    }

    #[test]
    fn dispatch_room_counts_pending() {
        let mut s = station(RequestKind::Rescue, 2);
        s.add_vehicle(EntityId(10), PoolStatus::Busy).unwrap();
        assert_eq!(s.spawn_room(), 1);
        assert!(s.can_take_dispatch());
        s.queue_dispatch(RequestId(1));
        assert!(!s.can_take_dispatch());
    }

    #[test]
    fn parked_vehicles_count_when_answering_an_advert() {
        let mut s = station(RequestKind::Patrol, 1);
        s.add_vehicle(EntityId(10), PoolStatus::Available).unwrap();
        assert!(!s.can_take_dispatch());
        assert!(s.can_take_advertised());
        s.queue_dispatch(RequestId(1));
        assert!(!s.can_take_advertised());
    }

    #[test]
    fn lowered_limit_denies_returning_vehicle_a_slot() {
        let mut s = station(RequestKind::Collection, 3);
        s.add_vehicle(EntityId(10), PoolStatus::Available).unwrap();
        s.add_vehicle(EntityId(11), PoolStatus::Busy).unwrap();
        assert!(s.has_free_slot(EntityId(11)));
        s.set_active_limit(1);
        assert!(!s.has_free_slot(EntityId(11)));
        s.set_active_limit(9);
        assert_eq!(s.active_limit, 3);
    }

    #[test]
    fn pending_queue_ignores_duplicates() {
        let mut s = station(RequestKind::Emergency, 1);
        assert!(s.queue_dispatch(RequestId(1)));
        assert!(!s.queue_dispatch(RequestId(1)));
        assert!(s.unqueue_dispatch(RequestId(1)));
        assert!(s.pending_dispatch.is_empty());
    }

    #[test]
    fn status_of_unknown_vehicle_errors() {
        let mut s = station(RequestKind::Emergency, 1);
        assert!(s.set_status(EntityId(5), PoolStatus::Busy).is_err());
    }
}

// ── Controller ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod controller {
    use sd_core::{EntityId, RequestId, RequestKind, Tick};

    use super::helpers::{FakeWorld, station};
    use crate::{PoolStatus, StationEffect, tick};

    #[test]
    fn empty_pool_spawns_for_pending_dispatch() {
        let mut world = FakeWorld::new();
        world.alive.insert(RequestId(1));
        let mut s = station(RequestKind::Emergency, 2);
        s.queue_dispatch(RequestId(1));
        let fx = tick(&mut s, &world, Tick(0));
        assert_eq!(fx, vec![StationEffect::Spawn { request: RequestId(1) }]);
        assert!(s.pending_dispatch.is_empty());
    }

    #[test]
    fn spawns_stop_at_capacity() {
        let mut world = FakeWorld::new();
        let mut s = station(RequestKind::Emergency, 2);
        for r in 1..=3 {
            world.alive.insert(RequestId(r));
            s.queue_dispatch(RequestId(r));
        }
        let fx = tick(&mut s, &world, Tick(0));
        assert_eq!(fx.len(), 2);
        assert_eq!(s.pending_dispatch, [RequestId(3)]);
    }

    #[test]
    fn idle_vehicle_preferred_over_spawn() {
        let mut world = FakeWorld::new();
        world.alive.insert(RequestId(1));
        world.busy.insert(EntityId(10));
        let mut s = station(RequestKind::Emergency, 3);
        s.add_vehicle(EntityId(10), PoolStatus::Available).unwrap();
        s.add_vehicle(EntityId(11), PoolStatus::Available).unwrap();
        s.queue_dispatch(RequestId(1));
        let fx = tick(&mut s, &world, Tick(0));
        assert_eq!(fx, vec![StationEffect::Assign { request: RequestId(1), vehicle: EntityId(11) }]);
        assert_eq!(s.status(EntityId(11)), Some(PoolStatus::Busy));
    }

    #[test]
    fn vanished_requests_are_discarded() {
        let world = FakeWorld::new();
        let mut s = station(RequestKind::Emergency, 0);
        s.queue_dispatch(RequestId(4));
        let fx = tick(&mut s, &world, Tick(0));
        assert_eq!(fx, vec![StationEffect::DiscardPending { request: RequestId(4) }]);
        assert!(s.pending_dispatch.is_empty());
    }

    #[test]
    fn advertises_on_stride_only_when_free() {
        let mut world = FakeWorld::new();
        let mut s = station(RequestKind::Patrol, 2);
        assert!(tick(&mut s, &world, Tick(2)).is_empty(), "no available vehicle");

        s.add_vehicle(EntityId(10), PoolStatus::Available).unwrap();
        assert!(tick(&mut s, &world, Tick(3)).is_empty(), "off stride");
        assert_eq!(tick(&mut s, &world, Tick(10)), vec![StationEffect::EmitReversed { kind: RequestKind::Patrol }]);

        world.advertising = true;
        assert!(tick(&mut s, &world, Tick(18)).is_empty(), "already advertising");
    }

    #[test]
    fn no_advert_while_dispatch_pending() {
        let mut world = FakeWorld::new();
        world.busy.insert(EntityId(10));
        world.alive.insert(RequestId(1));
        let mut s = station(RequestKind::Patrol, 1);
        s.add_vehicle(EntityId(10), PoolStatus::Available).unwrap();
        s.queue_dispatch(RequestId(1));
        assert!(tick(&mut s, &world, Tick(2)).is_empty());
        assert_eq!(s.pending_dispatch.len(), 1);
    }

    #[test]
    fn raised_limit_reactivates_parked_vehicles() {
        let mut world = FakeWorld::new();
        let mut s = station(RequestKind::Collection, 3).with_active_limit(1);
        s.add_vehicle(EntityId(10), PoolStatus::Busy).unwrap();
        s.add_vehicle(EntityId(11), PoolStatus::Disabled).unwrap();
        s.add_vehicle(EntityId(12), PoolStatus::Disabled).unwrap();
        world.reactivatable.extend([EntityId(11), EntityId(12)]);

        assert!(tick(&mut s, &world, Tick(1)).is_empty());
        s.set_active_limit(2);
        let fx = tick(&mut s, &world, Tick(2));
        assert_eq!(fx, vec![StationEffect::Reactivate { vehicle: EntityId(11) }]);
        assert_eq!(s.status(EntityId(12)), Some(PoolStatus::Disabled));
    }
}
