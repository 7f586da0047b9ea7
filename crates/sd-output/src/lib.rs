//! `sd-output` — output writers for the service dispatch engine.
//!
//! Two backends are provided:
//!
//! | Feature   | Backend | Files created                                                  |
//! |-----------|---------|----------------------------------------------------------------|
//! | *(none)*  | CSV     | `dispatch_events.csv`, `tick_summaries.csv`, `kind_metrics.csv` |
//! | `sqlite`  | SQLite  | `dispatch.db`                                                  |
//!
//! Both implement [`OutputWriter`] and are driven by
//! [`DispatchOutputObserver`], which implements `sd_engine::DispatchObserver`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sd_output::{CsvWriter, DispatchOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = DispatchOutputObserver::new(writer);
//! engine.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use crate::csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::DispatchOutputObserver;
pub use row::{DispatchEventRow, EventKind, KindMetricsRow, TickSummaryRow};
pub use writer::OutputWriter;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWriter;
