//! `sd-request` — the request store and the targets requests point at.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                    |
//! |--------------|-------------------------------------------------------------|
//! | [`request`]  | `ServiceRequest`, `NewRequest`, `Search`, `Candidate`       |
//! | [`store`]    | `RequestStore`: dedup/merge, binding, staged commit        |
//! | [`target`]   | `Target`, `TargetStore`: per-kind need and claims          |
//! | [`validate`] | `WorldView` trait, `validate`, `Validation`, `DropReason`   |
//! | [`error`]    | `RequestError`, `RequestResult<T>`                          |
//!
//! # Visibility rule
//!
//! Requests submitted and removals scheduled during a tick are staged; they
//! become visible to `get`/`iter` only after [`RequestStore::commit`].
//! Dedup already sees staged entries, so two producers raising the same
//! target in one tick end up with one merged request.

pub mod error;
pub mod request;
pub mod store;
pub mod target;
pub mod validate;

#[cfg(test)]
mod tests;

pub use error::{RequestError, RequestResult};
pub use request::{Candidate, DETECTED_PRIORITY, NewRequest, Search, ServiceRequest};
pub use store::{CommitSummary, Removal, RequestStore, SubmitOutcome};
pub use target::{Target, TargetStore};
pub use validate::{DropReason, Validation, WorldView, validate};
