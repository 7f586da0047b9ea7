//! The `OutputWriter` trait implemented by all backend writers.

use crate::{DispatchEventRow, KindMetricsRow, OutputResult, TickSummaryRow};

/// Trait implemented by the CSV and SQLite writers.
///
/// The observer never sees these errors directly; it stores the first one
/// for [`DispatchOutputObserver::take_error`][crate::DispatchOutputObserver::take_error].
pub trait OutputWriter {
    /// Write a batch of dispatch events.
    fn write_events(&mut self, rows: &[DispatchEventRow]) -> OutputResult<()>;

    /// Write one tick summary row.
    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()>;

    /// Write the end-of-run per-kind totals.
    fn write_kind_metrics(&mut self, rows: &[KindMetricsRow]) -> OutputResult<()>;

    /// Flush and close all underlying handles.  Safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
