//! CSV output backend.
//!
//! Creates three files in the configured output directory:
//! - `dispatch_events.csv`
//! - `tick_summaries.csv`
//! - `kind_metrics.csv`

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{DispatchEventRow, KindMetricsRow, OutputResult, TickSummaryRow};

pub const EVENT_HEADER: [&str; 7] =
    ["tick", "event", "request_id", "kind", "target_id", "source_id", "detail"];

pub const SUMMARY_HEADER: [&str; 8] = [
    "tick",
    "live_requests",
    "bound_requests",
    "reversed_requests",
    "vehicles_idle",
    "vehicles_busy",
    "vehicles_disabled",
    "queries_in_flight",
];

pub const METRICS_HEADER: [&str; 6] =
    ["kind", "bindings", "serviced", "dropped", "failed_searches", "avg_response_ticks"];

/// Writes dispatch output to three CSV files.
pub struct CsvWriter {
    events:    Writer<File>,
    summaries: Writer<File>,
    metrics:   Writer<File>,
    finished:  bool,
}

impl CsvWriter {
    /// Create the CSV files in `dir` and write their header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let mut events = Writer::from_path(dir.join("dispatch_events.csv"))?;
        events.write_record(EVENT_HEADER)?;

        let mut summaries = Writer::from_path(dir.join("tick_summaries.csv"))?;
        summaries.write_record(SUMMARY_HEADER)?;

        let mut metrics = Writer::from_path(dir.join("kind_metrics.csv"))?;
        metrics.write_record(METRICS_HEADER)?;

        Ok(Self { events, summaries, metrics, finished: false })
    }
}

/// Empty for the `u32::MAX` "not applicable" sentinel.
fn id_field(id: u32) -> String {
    if id == u32::MAX { String::new() } else { id.to_string() }
}

impl OutputWriter for CsvWriter {
    fn write_events(&mut self, rows: &[DispatchEventRow]) -> OutputResult<()> {
        for row in rows {
            self.events.write_record(&[
                row.tick.to_string(),
                row.event.as_str().to_owned(),
                id_field(row.request),
                row.kind_str().to_owned(),
                id_field(row.target),
                id_field(row.source),
                row.detail.to_owned(),
            ])?;
        }
        Ok(())
    }

    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()> {
        self.summaries.write_record(&[
            row.tick.to_string(),
            row.live_requests.to_string(),
            row.bound_requests.to_string(),
            row.reversed_requests.to_string(),
            row.vehicles_idle.to_string(),
            row.vehicles_busy.to_string(),
            row.vehicles_disabled.to_string(),
            row.queries_in_flight.to_string(),
        ])?;
        Ok(())
    }

    fn write_kind_metrics(&mut self, rows: &[KindMetricsRow]) -> OutputResult<()> {
        for row in rows {
            self.metrics.write_record(&[
                row.kind.as_str().to_owned(),
                row.bindings.to_string(),
                row.serviced.to_string(),
                row.dropped.to_string(),
                row.failed_searches.to_string(),
                format!("{:.2}", row.avg_response),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.events.flush()?;
        self.summaries.flush()?;
        self.metrics.flush()?;
        Ok(())
    }
}
