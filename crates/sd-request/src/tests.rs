//! Unit tests for sd-request.

#[cfg(test)]
mod helpers {
    use std::collections::HashSet;

    use sd_core::{EntityId, KindConfig, Position, RequestId, RequestKind};

    use crate::{Target, TargetStore, WorldView};

    /// Targets plus a hand-maintained set of live sources.
    pub struct FakeWorld {
        pub targets: TargetStore,
        pub alive:   HashSet<EntityId>,
        pub full:    HashSet<EntityId>,
    }

    impl FakeWorld {
        pub fn new() -> Self {
            Self { targets: TargetStore::new(), alive: HashSet::new(), full: HashSet::new() }
        }

        pub fn add_target(&mut self, id: u32, kind: RequestKind, need: f32) -> EntityId {
            let id = EntityId(id);
            let mut t = Target::new(id, Position::new(id.0 as f32, 0.0), None);
            t.set_need(kind, need);
            self.targets.insert(t);
            id
        }
    }

    impl WorldView for FakeWorld {
        fn target_position(&self, target: EntityId) -> Option<Position> {
            self.targets.get(target).map(|t| t.position)
        }
        fn needs_service(&self, target: EntityId, kind: RequestKind) -> bool {
            self.targets.needs_service(target, kind, &KindConfig::default_for(kind))
        }
        fn target_claim(&self, target: EntityId, kind: RequestKind) -> Option<RequestId> {
            self.targets.get(target).and_then(|t| t.claim(kind))
        }
        fn source_alive(&self, source: EntityId) -> bool {
            self.alive.contains(&source)
        }
        fn source_has_capacity(&self, source: EntityId, _kind: RequestKind) -> bool {
            !self.full.contains(&source)
        }
    }
}

// ── Store: dedup, merge, staging ───────────────────────────────────────────────

#[cfg(test)]
mod store {
    use sd_core::{EntityId, RequestKind, Tick};

    use crate::{DETECTED_PRIORITY, DropReason, NewRequest, Removal, RequestStore, SubmitOutcome};

    const FIRE: RequestKind = RequestKind::Rescue;

    #[test]
    fn same_tick_duplicates_merge() {
        let mut store = RequestStore::new();
        let a = store.submit(NewRequest::forward(EntityId(5), FIRE, 1.0), 4, Tick(0));
        let b = store.submit(NewRequest::forward(EntityId(5), FIRE, 3.0).detected(), 4, Tick(0));
        assert!(matches!(a, SubmitOutcome::Created(_)));
        assert_eq!(b, SubmitOutcome::Merged(a.id()));

        store.commit();
        assert_eq!(store.len(), 1);
        let r = store.get(a.id()).unwrap();
        assert_eq!(r.priority, 3.0);
        assert!(r.detected);
    }

    #[test]
    fn merge_keeps_higher_priority_and_sticky_flag() {
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(1), FIRE, 5.0).detected(), 4, Tick(0)).id();
        store.commit();
        store.submit(NewRequest::forward(EntityId(1), FIRE, 2.0).with_group_size(9), 4, Tick(1));
        let r = store.get(id).unwrap();
        assert_eq!(r.priority, 5.0);
        assert!(r.detected, "merge must not clear the sticky flag");
        assert_eq!(r.group_size, 9);
    }

    #[test]
    fn detected_request_is_raised_to_the_floor() {
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(2), FIRE, 0.25), 4, Tick(0)).id();
        store.submit(NewRequest::forward(EntityId(2), FIRE, 0.1).detected(), 4, Tick(0));
        store.commit();
        let r = store.get(id).unwrap();
        assert_eq!(r.priority, DETECTED_PRIORITY);
        assert!(r.detected);
    }

    #[test]
    fn different_kind_or_direction_is_not_a_duplicate() {
        let mut store = RequestStore::new();
        let t = EntityId(1);
        let a = store.submit(NewRequest::forward(t, FIRE, 1.0), 4, Tick(0)).id();
        let b = store.submit(NewRequest::forward(t, RequestKind::Emergency, 1.0), 4, Tick(0)).id();
        let c = store.submit(NewRequest::reversed(t, FIRE, 1.0), 4, Tick(0)).id();
        assert_ne!(a, b);
        assert_ne!(a, c);
        store.commit();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn staged_requests_invisible_until_commit() {
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(1), FIRE, 1.0), 4, Tick(0)).id();
        assert!(store.get(id).is_none());
        assert_eq!(store.staged_len(), 1);
        assert_eq!(store.find(EntityId(1), FIRE, false), Some(id));
        let summary = store.commit();
        assert_eq!(summary.created, vec![id]);
        assert!(store.get(id).is_some());
    }

    #[test]
    fn removal_applies_at_commit_and_frees_dedup_slot() {
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(1), FIRE, 1.0), 4, Tick(0)).id();
        store.commit();

        assert!(store.schedule_removal(id, Removal::Dropped(DropReason::NoCandidate)));
        assert!(store.get(id).is_some(), "still visible until commit");
        assert!(!store.is_alive(id));

        // A fresh submission while the old one is on its way out starts anew.
        let fresh = store.submit(NewRequest::forward(EntityId(1), FIRE, 1.0), 4, Tick(1));
        assert!(matches!(fresh, SubmitOutcome::Created(_)));

        let summary = store.commit();
        assert_eq!(summary.removed.len(), 1);
        assert_eq!(summary.removed[0].1, Removal::Dropped(DropReason::NoCandidate));
        assert!(store.get(id).is_none());
        assert_eq!(store.find(EntityId(1), FIRE, false), Some(fresh.id()));
    }

    #[test]
    fn first_removal_reason_wins() {
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(1), FIRE, 1.0), 4, Tick(0)).id();
        store.commit();
        store.schedule_removal(id, Removal::Serviced);
        store.schedule_removal(id, Removal::Dropped(DropReason::TargetGone));
        let summary = store.commit();
        assert_eq!(summary.removed[0].1, Removal::Serviced);
    }

    #[test]
    fn default_group_size_applies() {
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(1), RequestKind::Patrol, 1.0), 32, Tick(0)).id();
        store.commit();
        assert_eq!(store.get(id).unwrap().group_size, 32);
    }
}

// ── Binding ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod binding {
    use sd_core::{EntityId, RequestId, RequestKind, Tick};

    use crate::{NewRequest, RequestError, RequestStore};

    fn store_with_one() -> (RequestStore, RequestId) {
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(1), RequestKind::Collection, 1.0), 4, Tick(0)).id();
        store.commit();
        (store, id)
    }

    #[test]
    fn second_bind_to_other_source_fails() {
        let (mut store, id) = store_with_one();
        assert!(store.bind(id, EntityId(10)).is_ok());
        assert!(store.bind(id, EntityId(10)).is_ok(), "same source is idempotent");
        let err = store.bind(id, EntityId(11)).unwrap_err();
        assert_eq!(
            err,
            RequestError::AlreadyBound { request: id, bound_to: EntityId(10), candidate: EntityId(11) }
        );
    }

    #[test]
    fn unbind_and_rebind() {
        let (mut store, id) = store_with_one();
        store.bind(id, EntityId(10)).unwrap();
        store.rebind(id, EntityId(10), EntityId(20)).unwrap();
        assert_eq!(store.get(id).unwrap().source_binding, Some(EntityId(20)));
        assert!(store.rebind(id, EntityId(10), EntityId(30)).is_err());
        assert_eq!(store.unbind(id), Some(EntityId(20)));
        assert!(!store.get(id).unwrap().is_bound());
    }

    #[test]
    fn bind_unknown_request() {
        let mut store = RequestStore::new();
        assert_eq!(store.bind(RequestId(3), EntityId(1)), Err(RequestError::NotFound(RequestId(3))));
    }
}

// ── Retry policy ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod retry {
    use sd_core::{EntityId, KindConfig, RequestKind, Tick};

    use crate::{NewRequest, RequestStore};

    #[test]
    fn dropped_after_exactly_max_fail_count() {
        let cfg = KindConfig { max_fail_count: 3, base_cooldown: 1, max_cooldown: 8, ..KindConfig::default_for(RequestKind::Delivery) };
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(1), RequestKind::Delivery, 1.0), 4, Tick(0)).id();
        store.commit();
        let r = store.get_mut(id).unwrap();

        assert!(!r.record_failure(&cfg));
        assert_eq!((r.fail_count, r.cooldown), (1, 1));
        assert!(!r.record_failure(&cfg));
        assert_eq!((r.fail_count, r.cooldown), (2, 2));
        assert!(r.record_failure(&cfg), "third failure exhausts the request");
        assert_eq!(r.fail_count, 3);
    }
}

// ── Search bookkeeping ─────────────────────────────────────────────────────────

#[cfg(test)]
mod search {
    use sd_core::{EntityId, QueryId, RequestId, Tick};

    use crate::{Candidate, Search};

    fn candidate(source: u32) -> Candidate {
        Candidate { source: EntityId(source), request: RequestId(0), tie_key: EntityId(source), cost: 0.0, duration: 0 }
    }

    #[test]
    fn settles_until_complete() {
        let mut s = Search::new(Tick(4));
        s.pending.push((QueryId(1), candidate(7)));
        s.pending.push((QueryId(2), candidate(8)));
        assert!(!s.is_complete());

        assert!(s.settle(QueryId(2), Some((12.5, 3))));
        assert!(s.settle(QueryId(1), None));
        assert!(!s.settle(QueryId(9), None));
        assert!(s.is_complete());
        assert_eq!(s.results.len(), 1);
        assert_eq!(s.results[0].source, EntityId(8));
        assert_eq!(s.results[0].cost, 12.5);
    }
}

// ── Validation ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod validation {
    use sd_core::{EntityId, RequestKind, Tick};

    use super::helpers::FakeWorld;
    use crate::{DropReason, NewRequest, RequestStore, Validation, validate};

    const KIND: RequestKind = RequestKind::Emergency;

    #[test]
    fn missing_target_is_dropped_with_reason() {
        let world = FakeWorld::new();
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(EntityId(99), KIND, 1.0), 4, Tick(0)).id();
        store.commit();
        let r = store.get(id).unwrap();
        assert_eq!(validate(r, &world, &store), Validation::Drop(DropReason::TargetGone));
    }

    #[test]
    fn cleared_unbound_target_is_dropped() {
        let mut world = FakeWorld::new();
        let t = world.add_target(1, KIND, 0.0);
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(t, KIND, 1.0), 4, Tick(0)).id();
        store.commit();
        assert_eq!(validate(store.get(id).unwrap(), &world, &store), Validation::Drop(DropReason::NoLongerNeeded));
    }

    #[test]
    fn dead_source_clears_binding() {
        let mut world = FakeWorld::new();
        let t = world.add_target(1, KIND, 5.0);
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(t, KIND, 1.0), 4, Tick(0)).id();
        store.commit();
        store.bind(id, EntityId(50)).unwrap();

        world.alive.insert(EntityId(50));
        assert_eq!(validate(store.get(id).unwrap(), &world, &store), Validation::Valid);
        world.alive.clear();
        assert_eq!(validate(store.get(id).unwrap(), &world, &store), Validation::ClearBinding);
    }

    #[test]
    fn bound_request_survives_cleared_target() {
        let mut world = FakeWorld::new();
        let t = world.add_target(1, KIND, 0.0);
        world.alive.insert(EntityId(50));
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::forward(t, KIND, 1.0), 4, Tick(0)).id();
        store.commit();
        store.bind(id, EntityId(50)).unwrap();
        assert_eq!(validate(store.get(id).unwrap(), &world, &store), Validation::Valid);
    }

    #[test]
    fn superseded_by_other_live_claim() {
        let mut world = FakeWorld::new();
        let t = world.add_target(1, KIND, 5.0);
        let mut store = RequestStore::new();
        let a = store.submit(NewRequest::forward(t, KIND, 1.0), 4, Tick(0)).id();
        let b = store.submit(NewRequest::forward(EntityId(2), KIND, 1.0), 4, Tick(0)).id();
        store.commit();
        // Simulate a stale claim pointing at some other live request.
        world.targets.get_mut(t).unwrap().set_claim(KIND, b);
        assert_eq!(validate(store.get(a).unwrap(), &world, &store), Validation::Drop(DropReason::Superseded));
    }

    #[test]
    fn reversed_needs_live_source_with_capacity() {
        let mut world = FakeWorld::new();
        let src = EntityId(7);
        world.alive.insert(src);
        let mut store = RequestStore::new();
        let id = store.submit(NewRequest::reversed(src, RequestKind::Patrol, 0.0), 32, Tick(0)).id();
        store.commit();
        assert_eq!(validate(store.get(id).unwrap(), &world, &store), Validation::Valid);
        world.full.insert(src);
        assert_eq!(
            validate(store.get(id).unwrap(), &world, &store),
            Validation::Drop(DropReason::SourceUnavailable)
        );
    }
}

// ── Targets ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod targets {
    use sd_core::{EntityId, KindConfig, Position, RequestId, RequestKind};

    use crate::{Target, TargetStore};

    #[test]
    fn need_never_goes_negative() {
        let mut t = Target::new(EntityId(1), Position::new(0.0, 0.0), None);
        t.set_need(RequestKind::Collection, 10.0);
        assert_eq!(t.reduce_need(RequestKind::Collection, 4.0), 4.0);
        assert_eq!(t.reduce_need(RequestKind::Collection, 100.0), 6.0);
        assert_eq!(t.need(RequestKind::Collection), 0.0);
        t.add_need(RequestKind::Collection, -5.0);
        assert_eq!(t.need(RequestKind::Collection), 0.0);
    }

    #[test]
    fn claim_release_is_conditional() {
        let mut t = Target::new(EntityId(1), Position::new(0.0, 0.0), None);
        t.set_claim(RequestKind::Patrol, RequestId(4));
        assert!(!t.release_claim(RequestKind::Patrol, RequestId(5)));
        assert_eq!(t.claim(RequestKind::Patrol), Some(RequestId(4)));
        assert!(t.release_claim(RequestKind::Patrol, RequestId(4)));
        assert_eq!(t.claim(RequestKind::Patrol), None);
    }

    #[test]
    fn needs_service_threshold() {
        let mut config = KindConfig::default_for(RequestKind::Collection);
        let mut t = Target::new(EntityId(1), Position::new(0.0, 0.0), None);
        t.set_need(RequestKind::Collection, 20.0);
        let store: TargetStore = [t].into_iter().collect();
        assert!(!store.needs_service(EntityId(1), RequestKind::Collection, &config));
        config.need_threshold = 19.0;
        assert!(store.needs_service(EntityId(1), RequestKind::Collection, &config));
        assert!(!store.needs_service(EntityId(2), RequestKind::Collection, &config));
    }

    #[test]
    fn securing_clears_patrol_only() {
        let patrol = KindConfig::default_for(RequestKind::Patrol);
        let rescue = KindConfig::default_for(RequestKind::Rescue);
        let mut t = Target::new(EntityId(1), Position::new(0.0, 0.0), None);
        t.set_need(RequestKind::Patrol, 5.0);
        t.set_need(RequestKind::Rescue, 5.0);
        t.secured = true;
        assert!(!t.needs_service(RequestKind::Patrol, &patrol));
        assert!(t.needs_service(RequestKind::Rescue, &rescue));
    }
}
