//! Routing trait and default weighted Dijkstra implementation.
//!
//! # Cost model
//!
//! Each edge contributes
//!
//! ```text
//! w.distance   * length_m
//! + w.time       * length_m / min(speed, max_speed)
//! + w.road_class * length_m * class.penalty()
//! + w.comfort    * SEGMENT_COST
//! ```
//!
//! so an emergency profile `(1,0,0,0)` finds the geometrically shortest path
//! and a routine profile `(1,1,1,1)` trades distance against speed, road
//! hierarchy and the number of turns.  Costs are accumulated in integer
//! milli-units in the heap so tie-breaking on `NodeId` stays deterministic.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use sd_core::{EdgeId, NodeId, PathWeights};

use crate::network::RoadNetwork;
use crate::SpatialError;

/// Flat cost per traversed segment under the `comfort` weight.
const SEGMENT_COST: f32 = 10.0;

// ── RouteProfile ─────────────────────────────────────────────────────────────

/// Per-query cost weighting and speed cap.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RouteProfile {
    pub weights:   PathWeights,
    pub max_speed: f32,
}

impl RouteProfile {
    pub fn new(weights: PathWeights, max_speed: f32) -> Self {
        Self { weights, max_speed }
    }

    /// Effective speed on an edge, m/s.
    #[inline]
    pub fn speed(&self, posted_mps: f32) -> f32 {
        posted_mps.min(self.max_speed).max(0.1)
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Edges to traverse in order, from source to destination.
    pub edges: Vec<EdgeId>,
    pub length_m: f32,
    pub travel_secs: f32,
    /// Weighted cost under the profile the route was computed with.
    pub cost: f32,
}

impl Route {
    pub fn trivial() -> Self {
        Route { edges: Vec::new(), length_m: 0.0, travel_secs: 0.0, cost: 0.0 }
    }

    /// `true` if the source and destination are the same node.
    pub fn is_trivial(&self) -> bool {
        self.edges.is_empty()
    }
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing engine.
///
/// Implementations must be `Send + Sync` so a pathfinder holding one can be
/// shared with worker threads.
pub trait Router: Send + Sync {
    fn route(
        &self,
        network: &RoadNetwork,
        from: NodeId,
        to: NodeId,
        profile: &RouteProfile,
    ) -> Result<Route, SpatialError>;
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Dijkstra's algorithm over the CSR road graph with weighted edge costs.
pub struct DijkstraRouter;

impl Router for DijkstraRouter {
    fn route(
        &self,
        network: &RoadNetwork,
        from: NodeId,
        to: NodeId,
        profile: &RouteProfile,
    ) -> Result<Route, SpatialError> {
        dijkstra(network, from, to, profile)
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

#[inline]
fn edge_travel_secs(network: &RoadNetwork, edge: EdgeId, profile: &RouteProfile) -> f32 {
    network.edge_length_m[edge.index()] / profile.speed(network.edge_speed_mps[edge.index()])
}

#[inline]
fn edge_cost(network: &RoadNetwork, edge: EdgeId, profile: &RouteProfile) -> f32 {
    let w = &profile.weights;
    let length = network.edge_length_m[edge.index()];
    w.distance * length
        + w.time * edge_travel_secs(network, edge, profile)
        + w.road_class * length * network.edge_class[edge.index()].penalty()
        + w.comfort * SEGMENT_COST
}

#[inline]
fn to_milli(cost: f32) -> u64 {
    (cost.max(0.0) * 1000.0) as u64
}

fn dijkstra(
    network: &RoadNetwork,
    from: NodeId,
    to: NodeId,
    profile: &RouteProfile,
) -> Result<Route, SpatialError> {
    let n = network.node_count();
    if n == 0 {
        return Err(SpatialError::EmptyNetwork);
    }
    for node in [from, to] {
        if node.index() >= n {
            return Err(SpatialError::NodeNotFound(node));
        }
    }
    if from == to {
        return Ok(Route::trivial());
    }

    let mut dist      = vec![u64::MAX; n];
    let mut prev_edge = vec![EdgeId::INVALID; n];
    dist[from.index()] = 0;

    // Reverse turns the max-heap into a min-heap; NodeId breaks cost ties.
    let mut heap: BinaryHeap<Reverse<(u64, NodeId)>> = BinaryHeap::new();
    heap.push(Reverse((0, from)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        if node == to {
            return Ok(reconstruct(network, &prev_edge, to, profile));
        }
        if cost > dist[node.index()] {
            continue;
        }
        for edge in network.out_edges(node) {
            let neighbor = network.edge_to[edge.index()];
            let new_cost = cost.saturating_add(to_milli(edge_cost(network, edge, profile)));
            if new_cost < dist[neighbor.index()] {
                dist[neighbor.index()] = new_cost;
                prev_edge[neighbor.index()] = edge;
                heap.push(Reverse((new_cost, neighbor)));
            }
        }
    }

    Err(SpatialError::NoRoute { from, to })
}

fn reconstruct(
    network: &RoadNetwork,
    prev_edge: &[EdgeId],
    to: NodeId,
    profile: &RouteProfile,
) -> Route {
    let mut edges = Vec::new();
    let mut cur = to;
    loop {
        let e = prev_edge[cur.index()];
        if e == EdgeId::INVALID {
            break;
        }
        edges.push(e);
        cur = network.edge_from[e.index()];
    }
    edges.reverse();

    let mut route = Route::trivial();
    for &e in &edges {
        route.length_m += network.edge_length_m[e.index()];
        route.travel_secs += edge_travel_secs(network, e, profile);
        route.cost += edge_cost(network, e, profile);
    }
    route.edges = edges;
    route
}
