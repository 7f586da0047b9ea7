//! `sd-engine` — the tick loop that ties the dispatch components together.
//!
//! # Tick loop
//!
//! ```text
//! for tick in now..config.end_tick():
//!   ① Paths     — poll the pathfinder; settle candidate searches and give
//!                 vehicles their trip plans.
//!   ② Produce   — request producers raise needs and submit requests.
//!   ③ Index     — rebuild the source index and the open-request index.
//!   ④ Requests  — validate each live request and pick a command
//!                 (parallel with the `parallel` feature); apply them in
//!                 ascending RequestId order:
//!                   Search     → submit candidate path queries
//!                   Commit     → bind to the best source that still accepts
//!                   Failed     → back off, or drop after max_fail_count
//!   ⑤ Vehicles  — step each vehicle whose cadence fires (parallel);
//!                 apply effects in ascending EntityId order.
//!   ⑥ Stations  — reactivate, hand pending work to idle vehicles or spawn,
//!                 advertise spare capacity.
//!   ⑦ Commit    — publish new requests, retire finished ones, release
//!                 their claims and tell producers.
//! ```
//!
//! Every phase that runs in parallel only reads shared state and returns
//! commands; all mutation happens serially in id order, so a run is
//! reproducible from its seed regardless of thread count.
//!
//! # Modules
//!
//! | Module       | Contents                                              |
//! |--------------|-------------------------------------------------------|
//! | [`engine`]   | [`Engine`]: world state and the tick loop             |
//! | [`builder`]  | [`EngineBuilder`]                                     |
//! | [`finder`]   | Candidate search for forward and reversed requests    |
//! | [`resolver`] | Candidate ranking                                     |
//! | [`producer`] | [`RequestProducer`], [`NeedScanner`]                  |
//! | [`observer`] | [`DispatchObserver`], [`Binding`], [`TickSummary`]    |
//! | [`metrics`]  | [`DispatchMetrics`]                                   |
//! | [`snapshot`] | [`EngineSnapshot`], save / restore                    |
//! | [`loader`]   | Per-kind tuning from CSV                              |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                    |
//! |------------|-----------------------------------------------------------|
//! | `parallel` | Runs the request and vehicle passes on Rayon's pool.      |
//! | `fx-hash`  | FxHash for the in-flight path query map.                  |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use sd_core::{EngineConfig, KindSet, Position, RequestKind, UpdateInterval};
//! use sd_engine::{EngineBuilder, NeedScanner, NoopObserver};
//! use sd_spatial::CrowFliesPathfinder;
//!
//! let config = EngineConfig::default();
//! let scanner = NeedScanner::new(KindSet::only(RequestKind::Rescue), &config.kinds, UpdateInterval::new(16, 0));
//! let mut engine = EngineBuilder::new(config, CrowFliesPathfinder::new(10.0, 1, 0))
//!     .producer(Box::new(scanner))
//!     .build()?;
//! let depot = engine.add_station(Position::new(0.0, 0.0), RequestKind::Rescue, 4);
//! engine.add_vehicle(depot)?;
//! engine.run(&mut NoopObserver)?;
//! ```

pub mod builder;
mod command;
pub mod engine;
pub mod error;
pub mod finder;
pub mod loader;
pub mod metrics;
pub mod observer;
pub mod producer;
pub mod resolver;
pub mod snapshot;
mod world;


pub use builder::EngineBuilder;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use finder::CandidateQuery;
pub use loader::{load_kind_table_csv, load_kind_table_reader};
pub use metrics::{DispatchMetrics, KindMetrics};
pub use observer::{Binding, DispatchObserver, NoopObserver, TickSummary};
pub use producer::{NeedScanner, NoopProducer, RequestProducer};
pub use resolver::{rank, resolve};
pub use snapshot::{EngineSnapshot, SNAPSHOT_VERSION};
