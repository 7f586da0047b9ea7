//! Synthetic grid road network for the city demo.

use sd_core::{NodeId, Position};
use sd_spatial::{RoadClass, RoadNetwork, RoadNetworkBuilder};

/// Blocks per side.
pub const GRID: usize = 12;
/// Metres between intersections.
pub const SPACING: f32 = 250.0;

/// Build a `GRID × GRID` street grid.  Every fourth street is an arterial,
/// the outer ring is a highway.
///
/// Returns the network and the intersection ids in row-major order.
pub fn build_grid() -> (RoadNetwork, Vec<NodeId>) {
    let mut b = RoadNetworkBuilder::with_capacity(GRID * GRID, GRID * GRID * 4);
    let mut nodes = Vec::with_capacity(GRID * GRID);
    for row in 0..GRID {
        for col in 0..GRID {
            nodes.push(b.add_node(Position::new(col as f32 * SPACING, row as f32 * SPACING)));
        }
    }

    let class_of = |line: usize| {
        if line == 0 || line == GRID - 1 {
            (RoadClass::Highway, 25.0)
        } else if line % 4 == 0 {
            (RoadClass::Arterial, 16.7)
        } else {
            (RoadClass::Local, 11.1)
        }
    };

    for row in 0..GRID {
        for col in 0..GRID {
            let here = nodes[row * GRID + col];
            if col + 1 < GRID {
                let (class, speed) = class_of(row);
                b.add_road(here, nodes[row * GRID + col + 1], speed, class);
            }
            if row + 1 < GRID {
                let (class, speed) = class_of(col);
                b.add_road(here, nodes[(row + 1) * GRID + col], speed, class);
            }
        }
    }

    (b.build(), nodes)
}
