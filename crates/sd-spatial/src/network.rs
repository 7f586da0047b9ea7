//! Road network representation and builder.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format for outgoing edges.
//! Given a `NodeId n`, its outgoing edges occupy the slice:
//!
//! ```text
//! edge_to[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! All edge arrays are sorted by source node and indexed by `EdgeId`, so a
//! node's outgoing edges are a contiguous memory scan in Dijkstra's inner
//! loop.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps planar positions to the nearest `NodeId`.
//! Path queries start and end at arbitrary positions and are snapped onto
//! the graph through it.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use sd_core::{EdgeId, NodeId, Position};

// ── RoadClass ─────────────────────────────────────────────────────────────────

/// Functional class of a road segment.  Routine services weigh against
/// small roads through the `road_class` path weight.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoadClass {
    Highway,
    Arterial,
    #[default]
    Local,
    Service,
}

impl RoadClass {
    /// Penalty per metre applied when the `road_class` weight is non-zero.
    pub fn penalty(self) -> f32 {
        match self {
            RoadClass::Highway  => 0.0,
            RoadClass::Arterial => 0.25,
            RoadClass::Local    => 0.5,
            RoadClass::Service  => 1.0,
        }
    }
}

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f32; 2],
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Directed road graph in CSR format plus a spatial index for node snapping.
///
/// Do not construct directly; use [`RoadNetworkBuilder`].
pub struct RoadNetwork {
    // ── Node data ─────────────────────────────────────────────────────────
    pub node_pos: Vec<Position>,

    // ── CSR edge adjacency ────────────────────────────────────────────────
    /// Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    // ── Edge data (indexed by EdgeId = position in sorted order) ──────────
    /// Source node of each edge; needed to trace routes back to the origin.
    pub edge_from: Vec<NodeId>,
    pub edge_to: Vec<NodeId>,
    pub edge_length_m: Vec<f32>,
    /// Posted speed, metres per second.
    pub edge_speed_mps: Vec<f32>,
    pub edge_class: Vec<RoadClass>,

    spatial_idx: RTree<NodeEntry>,
}

impl RoadNetwork {
    /// A network with no nodes; every query against it fails.
    pub fn empty() -> Self {
        RoadNetworkBuilder::new().build()
    }

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    /// Iterator over the `EdgeId`s of all outgoing edges from `node`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        end - start
    }

    pub fn position(&self, node: NodeId) -> Option<Position> {
        self.node_pos.get(node.index()).copied()
    }

    /// Nearest road node to `pos`.  `None` only if the network has no nodes.
    pub fn snap_to_node(&self, pos: Position) -> Option<NodeId> {
        self.spatial_idx.nearest_neighbor(&pos.as_array()).map(|e| e.id)
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use sd_core::Position;
/// use sd_spatial::{RoadClass, RoadNetworkBuilder};
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_node(Position::new(0.0, 0.0));
/// let c = b.add_node(Position::new(1_200.0, 0.0));
/// b.add_road(a, c, 13.9, RoadClass::Arterial);
/// let net = b.build();
/// assert_eq!(net.node_count(), 2);
/// assert_eq!(net.edge_count(), 2); // bidirectional
/// ```
pub struct RoadNetworkBuilder {
    nodes:     Vec<Position>,
    raw_edges: Vec<RawEdge>,
}

struct RawEdge {
    from:      NodeId,
    to:        NodeId,
    length_m:  f32,
    speed_mps: f32,
    class:     RoadClass,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), raw_edges: Vec::new() }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes:     Vec::with_capacity(nodes),
            raw_edges: Vec::with_capacity(edges),
        }
    }

    /// Add a road node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        id
    }

    /// Add a **directed** edge with an explicit length.
    pub fn add_directed_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        length_m: f32,
        speed_mps: f32,
        class: RoadClass,
    ) {
        self.raw_edges.push(RawEdge { from, to, length_m, speed_mps, class });
    }

    /// Add edges in both directions; length is the straight-line distance
    /// between the two nodes.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, speed_mps: f32, class: RoadClass) {
        let length_m = self.node_pos(a).distance(self.node_pos(b));
        self.add_directed_edge(a, b, length_m, speed_mps, class);
        self.add_directed_edge(b, a, length_m, speed_mps, class);
    }

    pub fn node_pos(&self, id: NodeId) -> Position {
        self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.raw_edges.len() }

    /// Consume the builder and produce a [`RoadNetwork`].
    pub fn build(self) -> RoadNetwork {
        let node_count = self.nodes.len();
        let edge_count = self.raw_edges.len();

        // Stable sort keeps insertion order among a node's edges.
        let mut raw = self.raw_edges;
        raw.sort_by_key(|e| e.from.0);

        let edge_from:      Vec<NodeId>    = raw.iter().map(|e| e.from).collect();
        let edge_to:        Vec<NodeId>    = raw.iter().map(|e| e.to).collect();
        let edge_length_m:  Vec<f32>       = raw.iter().map(|e| e.length_m).collect();
        let edge_speed_mps: Vec<f32>       = raw.iter().map(|e| e.speed_mps).collect();
        let edge_class:     Vec<RoadClass> = raw.iter().map(|e| e.class).collect();

        let mut node_out_start = vec![0u32; node_count + 1];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, edge_count);

        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &pos)| NodeEntry { point: pos.as_array(), id: NodeId(i as u32) })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        RoadNetwork {
            node_pos: self.nodes,
            node_out_start,
            edge_from,
            edge_to,
            edge_length_m,
            edge_speed_mps,
            edge_class,
            spatial_idx,
        }
    }
}

impl Default for RoadNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
