//! Asynchronous path cost queries.
//!
//! The dispatch engine never blocks on routing.  It `submit`s a
//! [`PathQuery`] during one tick's apply phase and reads the matching
//! [`PathResult`] from `poll` on a later tick.  The two shipped
//! implementations resolve queries lazily when they come due:
//!
//! - [`QueuedPathfinder`] routes over a [`RoadNetwork`] with any [`Router`].
//! - [`CrowFliesPathfinder`] uses straight lines at a fixed speed, with
//!   optional blocked zones that make destinations unreachable.

use log::trace;

use sd_core::{PathWeights, Position, QueryId, SimRng, Tick};

use crate::error::PathFailure;
use crate::network::RoadNetwork;
use crate::queue::QueryQueue;
use crate::router::{RouteProfile, Router};

// ── Query / result types ──────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PathQuery {
    pub origin:      Position,
    pub destination: Position,
    pub weights:     PathWeights,
    pub max_speed:   f32,
    /// Upper bound of uniform jitter added to the cost.
    pub random_cost: f32,
}

impl PathQuery {
    pub fn new(origin: Position, destination: Position, weights: PathWeights, max_speed: f32) -> Self {
        Self { origin, destination, weights, max_speed, random_cost: 0.0 }
    }

    pub fn with_random_cost(mut self, random_cost: f32) -> Self {
        self.random_cost = random_cost;
        self
    }
}

/// Successful query outcome.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathCost {
    /// Weighted cost used for ranking candidates.
    pub cost: f32,
    pub distance_m: f32,
    pub travel_secs: f32,
    /// Where the traveller actually ends up (the road node nearest the
    /// destination for network routing).
    pub end: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    pub query:   QueryId,
    pub outcome: Result<PathCost, PathFailure>,
}

// ── Pathfinder trait ─────────────────────────────────────────────────────────

pub trait Pathfinder: Send {
    /// Enqueue a query; its result becomes readable no earlier than the
    /// next tick.
    fn submit(&mut self, query: PathQuery, now: Tick) -> QueryId;

    /// Results for every query due at or before `now`, in submission order.
    fn poll(&mut self, now: Tick) -> Vec<PathResult>;

    /// Forget a query whose owner went away.  Returns `false` if the query
    /// was unknown or already delivered.
    fn cancel(&mut self, query: QueryId) -> bool;

    /// Number of queries submitted but not yet polled.
    fn in_flight(&self) -> usize;

    /// Ticks between submitting a query and its result coming due.  Queries
    /// already in flight keep their due tick.
    fn set_latency(&mut self, ticks: u64);
}

/// Ticks until a query submitted now comes due; never zero.
fn due_tick(now: Tick, latency: u64) -> Tick {
    now.offset(latency.max(1))
}

fn next_query_id(next: &mut QueryId) -> QueryId {
    let id = *next;
    *next = next.next();
    id
}

// ── QueuedPathfinder ─────────────────────────────────────────────────────────

/// Network-routed pathfinder.  Origins and destinations are snapped to the
/// nearest road node; the straight access legs count towards distance and
/// cost at the distance weight.
pub struct QueuedPathfinder<R: Router> {
    network: RoadNetwork,
    router:  R,
    latency: u64,
    queue:   QueryQueue<PathQuery>,
    next_id: QueryId,
    rng:     SimRng,
}

impl<R: Router> QueuedPathfinder<R> {
    pub fn new(network: RoadNetwork, router: R, latency: u64, seed: u64) -> Self {
        Self {
            network,
            router,
            latency,
            queue: QueryQueue::new(),
            next_id: QueryId(0),
            rng: SimRng::new(seed),
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    fn resolve(&mut self, query: &PathQuery) -> Result<PathCost, PathFailure> {
        let from = self.network.snap_to_node(query.origin).ok_or(PathFailure::EmptyNetwork)?;
        let to = self.network.snap_to_node(query.destination).ok_or(PathFailure::EmptyNetwork)?;
        let profile = RouteProfile::new(query.weights, query.max_speed);
        let route = self
            .router
            .route(&self.network, from, to, &profile)
            .map_err(|e| PathFailure::from(&e))?;

        let end = self.network.position(to).ok_or(PathFailure::NoRoute)?;
        let start = self.network.position(from).ok_or(PathFailure::NoRoute)?;
        let access = query.origin.distance(start) + end.distance(query.destination);
        let jitter = self.rng.jitter(query.random_cost);
        Ok(PathCost {
            cost: route.cost + access * query.weights.distance + jitter,
            distance_m: route.length_m + query.origin.distance(start),
            travel_secs: route.travel_secs + query.origin.distance(start) / profile.speed(query.max_speed),
            end,
        })
    }
}

impl<R: Router> Pathfinder for QueuedPathfinder<R> {
    fn submit(&mut self, query: PathQuery, now: Tick) -> QueryId {
        let id = next_query_id(&mut self.next_id);
        self.queue.push(due_tick(now, self.latency), id, query);
        id
    }

    fn poll(&mut self, now: Tick) -> Vec<PathResult> {
        let due = self.queue.drain_due(now);
        let mut results = Vec::with_capacity(due.len());
        for (id, query) in due {
            let outcome = self.resolve(&query);
            trace!("path query {id} resolved at {now}: {outcome:?}");
            results.push(PathResult { query: id, outcome });
        }
        results
    }

    fn cancel(&mut self, query: QueryId) -> bool {
        self.queue.cancel(query)
    }

    fn in_flight(&self) -> usize {
        self.queue.len()
    }

    fn set_latency(&mut self, ticks: u64) {
        self.latency = ticks;
    }
}

// ── CrowFliesPathfinder ──────────────────────────────────────────────────────

/// Straight-line pathfinder for maps without a road graph.
pub struct CrowFliesPathfinder {
    speed_mps: f32,
    latency:   u64,
    blocked:   Vec<(Position, f32)>,
    queue:     QueryQueue<PathQuery>,
    next_id:   QueryId,
    rng:       SimRng,
}

impl CrowFliesPathfinder {
    pub fn new(speed_mps: f32, latency: u64, seed: u64) -> Self {
        Self {
            speed_mps,
            latency,
            blocked: Vec::new(),
            queue: QueryQueue::new(),
            next_id: QueryId(0),
            rng: SimRng::new(seed),
        }
    }

    /// Make every destination within `radius` of `center` unreachable.
    pub fn block(&mut self, center: Position, radius: f32) {
        self.blocked.push((center, radius));
    }

    pub fn clear_blocks(&mut self) {
        self.blocked.clear();
    }

    fn resolve(&mut self, query: &PathQuery) -> Result<PathCost, PathFailure> {
        if self.blocked.iter().any(|(c, r)| c.within(query.destination, *r)) {
            return Err(PathFailure::NoRoute);
        }
        let distance_m = query.origin.distance(query.destination);
        let speed = self.speed_mps.min(query.max_speed).max(0.1);
        let travel_secs = distance_m / speed;
        let w = &query.weights;
        let cost = w.distance * distance_m + w.time * travel_secs + self.rng.jitter(query.random_cost);
        Ok(PathCost { cost, distance_m, travel_secs, end: query.destination })
    }
}

impl Pathfinder for CrowFliesPathfinder {
    fn submit(&mut self, query: PathQuery, now: Tick) -> QueryId {
        let id = next_query_id(&mut self.next_id);
        self.queue.push(due_tick(now, self.latency), id, query);
        id
    }

    fn poll(&mut self, now: Tick) -> Vec<PathResult> {
        let due = self.queue.drain_due(now);
        let mut results = Vec::with_capacity(due.len());
        for (id, query) in due {
            let outcome = self.resolve(&query);
            results.push(PathResult { query: id, outcome });
        }
        results
    }

    fn cancel(&mut self, query: QueryId) -> bool {
        self.queue.cancel(query)
    }

    fn in_flight(&self) -> usize {
        self.queue.len()
    }

    fn set_latency(&mut self, ticks: u64) {
        self.latency = ticks;
    }
}
