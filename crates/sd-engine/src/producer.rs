//! Request producers: the incident side of the engine.
//!
//! Producers own whatever model decides that a site needs service.  Each
//! tick they may raise target needs and return new requests; the engine
//! tells them when their requests are serviced or dropped.

use sd_core::{KindSet, KindTable, RequestKind, SimRng, Tick, UpdateInterval};
use sd_request::{DropReason, NewRequest, ServiceRequest, TargetStore};

pub trait RequestProducer: Send {
    /// Called once per tick before matching.  Requests returned here are
    /// staged and become visible at the end of the tick.
    fn produce(&mut self, now: Tick, targets: &mut TargetStore, rng: &mut SimRng) -> Vec<NewRequest>;

    fn on_serviced(&mut self, _request: &ServiceRequest, _tick: Tick) {}

    fn on_dropped(&mut self, _request: &ServiceRequest, _reason: DropReason, _tick: Tick) {}
}

/// A producer that never produces anything.
pub struct NoopProducer;

impl RequestProducer for NoopProducer {
    fn produce(&mut self, _now: Tick, _targets: &mut TargetStore, _rng: &mut SimRng) -> Vec<NewRequest> {
        Vec::new()
    }
}

/// Raises a forward request for every unclaimed target whose need for one
/// of `kinds` exceeds that kind's threshold.  Priority is the current need.
pub struct NeedScanner {
    kinds:      KindSet,
    thresholds: [f32; RequestKind::COUNT],
    /// Kinds a secured target no longer needs.
    cleared:    KindSet,
    interval:   UpdateInterval,
}

impl NeedScanner {
    pub fn new(kinds: KindSet, table: &KindTable, interval: UpdateInterval) -> Self {
        let mut thresholds = [0.0; RequestKind::COUNT];
        for (kind, config) in table.iter() {
            thresholds[kind.index()] = config.need_threshold;
        }
        let cleared = table.iter().filter(|(_, c)| c.clears_on_secure).map(|(k, _)| k).collect();
        Self { kinds, thresholds, cleared, interval }
    }
}

impl RequestProducer for NeedScanner {
    fn produce(&mut self, now: Tick, targets: &mut TargetStore, _rng: &mut SimRng) -> Vec<NewRequest> {
        if !self.interval.fires(now) {
            return Vec::new();
        }
        let mut out = Vec::new();
        for target in targets.iter() {
            for kind in self.kinds.iter() {
                if target.secured && self.cleared.contains(kind) {
                    continue;
                }
                let need = target.need(kind);
                if need > self.thresholds[kind.index()] && target.claim(kind).is_none() {
                    let mut request = NewRequest::forward(target.id, kind, need);
                    if target.secured {
                        request = request.detected();
                    }
                    out.push(request);
                }
            }
        }
        out
    }
}
