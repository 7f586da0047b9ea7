//! Run-level dispatch counters.

use serde::{Deserialize, Serialize};

use sd_core::RequestKind;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KindMetrics {
    pub bindings:             u32,
    pub serviced:             u32,
    pub dropped:              u32,
    pub failed_searches:      u32,
    /// Creation-to-completion ticks summed over serviced requests.
    pub total_response_ticks: u64,
}

impl KindMetrics {
    pub fn avg_response(&self) -> f32 {
        if self.serviced == 0 {
            0.0
        } else {
            self.total_response_ticks as f32 / self.serviced as f32
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchMetrics {
    per_kind: [KindMetrics; RequestKind::COUNT],
    pub vehicles_spawned:  u32,
    pub vehicles_disabled: u32,
}

impl DispatchMetrics {
    #[inline]
    pub fn kind(&self, kind: RequestKind) -> &KindMetrics {
        &self.per_kind[kind.index()]
    }

    fn kind_mut(&mut self, kind: RequestKind) -> &mut KindMetrics {
        &mut self.per_kind[kind.index()]
    }

    pub fn avg_response(&self, kind: RequestKind) -> f32 {
        self.kind(kind).avg_response()
    }

    pub fn record_binding(&mut self, kind: RequestKind) {
        self.kind_mut(kind).bindings += 1;
    }

    pub fn record_serviced(&mut self, kind: RequestKind, response_ticks: u64) {
        let m = self.kind_mut(kind);
        m.serviced += 1;
        m.total_response_ticks += response_ticks;
    }

    pub fn record_dropped(&mut self, kind: RequestKind) {
        self.kind_mut(kind).dropped += 1;
    }

    pub fn record_failed_search(&mut self, kind: RequestKind) {
        self.kind_mut(kind).failed_searches += 1;
    }

    pub fn total_serviced(&self) -> u32 {
        self.per_kind.iter().map(|m| m.serviced).sum()
    }

    pub fn total_dropped(&self) -> u32 {
        self.per_kind.iter().map(|m| m.dropped).sum()
    }

    /// `(kind, metrics)` for every kind, in `RequestKind::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (RequestKind, &KindMetrics)> {
        RequestKind::ALL.into_iter().zip(self.per_kind.iter())
    }
}
