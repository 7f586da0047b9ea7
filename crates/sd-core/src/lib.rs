//! `sd-core` — foundational types for the service dispatch engine.
//!
//! This crate is a dependency of every other `sd-*` crate.  It has no `sd-*`
//! dependencies and minimal external ones (only `rand` and `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`ids`]         | `EntityId`, `RequestId`, `QueryId`, `DistrictId`, `NodeId`, `EdgeId` |
//! | [`geo`]         | `Position`, planar distance                               |
//! | [`time`]        | `Tick`, `UpdateInterval`, `SimClock`                      |
//! | [`kind`]        | `RequestKind`, `KindSet`                                  |
//! | [`config`]      | `PathWeights`, `KindConfig`, `KindTable`, `EngineConfig`  |
//! | [`rng`]         | `SimRng`                                                  |
//! | [`error`]       | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod kind;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{EngineConfig, KindConfig, KindTable, PathWeights};
pub use error::{CoreError, CoreResult};
pub use geo::Position;
pub use ids::{DistrictId, EdgeId, EntityId, NodeId, QueryId, RequestId};
pub use kind::{KindSet, RequestKind};
pub use rng::SimRng;
pub use time::{SimClock, Tick, UpdateInterval};
