//! `sd-station` — stations and the station controller.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`station`]    | `Station`, `PoolStatus`, `StationStore`                    |
//! | [`controller`] | `StationWorld` trait, `StationEffect`, `tick`              |
//! | [`error`]      | `StationError`, `StationResult<T>`                         |
//!
//! A station owns its pool bookkeeping and its pending-dispatch queue.  The
//! controller may change those directly; spawning, assigning and
//! reactivating vehicles leave as [`StationEffect`]s for the engine.

pub mod controller;
pub mod error;
pub mod station;

#[cfg(test)]
mod tests;

pub use controller::{StationEffect, StationWorld, tick};
pub use error::{StationError, StationResult};
pub use station::{PoolStatus, Station, StationStore};
