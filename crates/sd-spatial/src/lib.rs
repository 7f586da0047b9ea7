//! `sd-spatial` — road network, spatial indexing, and path cost queries.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`network`]    | `RoadNetwork` (CSR + R-tree), `RoadNetworkBuilder`, `RoadClass` |
//! | [`router`]     | `Router` trait, `RouteProfile`, `Route`, `DijkstraRouter`  |
//! | [`index`]      | `SpatialIndex` trait, `EntityIndex` (R-tree over entities) |
//! | [`queue`]      | `QueryQueue`: due-tick bucket of in-flight queries        |
//! | [`pathfinder`] | `Pathfinder` trait, `QueuedPathfinder`, `CrowFliesPathfinder` |
//! | [`error`]      | `SpatialError`, `SpatialResult<T>`, `PathFailure`          |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on public value types.     |

pub mod error;
pub mod index;
pub mod network;
pub mod pathfinder;
pub mod queue;
pub mod router;


pub use error::{PathFailure, SpatialError, SpatialResult};
pub use index::{EntityIndex, SpatialIndex};
pub use network::{RoadClass, RoadNetwork, RoadNetworkBuilder};
pub use pathfinder::{CrowFliesPathfinder, PathCost, PathQuery, PathResult, Pathfinder, QueuedPathfinder};
pub use queue::QueryQueue;
pub use router::{DijkstraRouter, Route, RouteProfile, Router};
