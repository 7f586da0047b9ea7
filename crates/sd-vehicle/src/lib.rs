//! `sd-vehicle` — service vehicles and their state machine.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                       |
//! |-------------|----------------------------------------------------------------|
//! | [`state`]   | `VehicleState`, `DisableReason`                                |
//! | [`trip`]    | `Trip`: teleport-at-arrival travel record                     |
//! | [`vehicle`] | `Vehicle`, `AcceptOutcome`                                     |
//! | [`machine`] | `VehicleWorld` trait, `RequestInfo`, `VehicleEffect`, `step`   |
//! | [`store`]   | `VehicleStore`                                                 |
//! | [`error`]   | `VehicleError`, `VehicleResult<T>`                             |
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──bind──▶ EnRoute ──arrive──▶ Servicing ──done──▶ EnRoute (next) | Returning
//!   ▲                                                                   │
//!   └──────────────────────── park (free slot) ◀────────────────────────┘
//! any ──path fails twice / no slot / cancel──▶ Disabled
//! ```
//!
//! A step may mutate only its own vehicle.  Anything that touches another
//! entity (targets, requests, the pathfinder) leaves as a [`VehicleEffect`]
//! for the engine's serial apply phase.

pub mod error;
pub mod machine;
pub mod state;
pub mod store;
pub mod trip;
pub mod vehicle;

#[cfg(test)]
mod tests;

pub use error::{VehicleError, VehicleResult};
pub use machine::{RequestInfo, VehicleEffect, VehicleWorld, step};
pub use state::{DisableReason, VehicleState};
pub use store::VehicleStore;
pub use trip::Trip;
pub use vehicle::{AcceptOutcome, Vehicle};
