//! `QueryQueue`: in-flight path queries bucketed by the tick their result
//! becomes readable.
//!
//! A query submitted on tick `T` with latency `L` is due on `T + L`; polling
//! on any tick `>= T + L` drains it.  Draining everything up to `now`, not
//! only `now` itself, means a host that skips a poll never strands queries.

use std::collections::BTreeMap;

use sd_core::{QueryId, Tick};

#[derive(Debug)]
pub struct QueryQueue<Q> {
    inner: BTreeMap<Tick, Vec<(QueryId, Q)>>,
    /// Cached total entry count for O(1) `len()`.
    total: usize,
}

impl<Q> QueryQueue<Q> {
    pub fn new() -> Self {
        Self { inner: BTreeMap::new(), total: 0 }
    }

    pub fn push(&mut self, due: Tick, id: QueryId, query: Q) {
        self.inner.entry(due).or_default().push((id, query));
        self.total += 1;
    }

    /// Remove and return every entry due at or before `now`, ordered by due
    /// tick then submission order.
    pub fn drain_due(&mut self, now: Tick) -> Vec<(QueryId, Q)> {
        let later = self.inner.split_off(&now.offset(1));
        let due = std::mem::replace(&mut self.inner, later);
        let out: Vec<_> = due.into_values().flatten().collect();
        self.total -= out.len();
        out
    }

    /// Drop a queued entry.  Returns `false` if it was not queued.
    pub fn cancel(&mut self, id: QueryId) -> bool {
        let mut emptied = None;
        let mut found = false;
        for (tick, bucket) in self.inner.iter_mut() {
            if let Some(pos) = bucket.iter().position(|(q, _)| *q == id) {
                bucket.remove(pos);
                found = true;
                if bucket.is_empty() {
                    emptied = Some(*tick);
                }
                break;
            }
        }
        if let Some(tick) = emptied {
            self.inner.remove(&tick);
        }
        if found {
            self.total -= 1;
        }
        found
    }

    /// Earliest due tick, or `None` if empty.
    pub fn next_due(&self) -> Option<Tick> {
        self.inner.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl<Q> Default for QueryQueue<Q> {
    fn default() -> Self {
        Self::new()
    }
}
