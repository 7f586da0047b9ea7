//! `DispatchOutputObserver<W>` bridges `DispatchObserver` to an `OutputWriter`.

use log::warn;
use sd_core::{EntityId, RequestKind, Tick};
use sd_engine::{Binding, DispatchMetrics, DispatchObserver, TickSummary};
use sd_request::{DropReason, ServiceRequest};
use sd_vehicle::DisableReason;

use crate::row::{DispatchEventRow, KindMetricsRow, TickSummaryRow};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`DispatchObserver`] that writes dispatch events, tick summaries, and
/// final per-kind totals to any [`OutputWriter`] backend.
///
/// Events are buffered for the duration of a tick and written as one batch
/// from `on_tick_end`.  Writer errors are stored because observer hooks have
/// no return value; check [`take_error`][Self::take_error] after the run.
pub struct DispatchOutputObserver<W: OutputWriter> {
    writer:     W,
    pending:    Vec<DispatchEventRow>,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> DispatchOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, pending: Vec::new(), last_error: None }
    }

    /// Take the stored write error, if any.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                warn!("output writer failed: {e}");
                self.last_error = Some(e);
            }
        }
    }

    fn flush_events(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let result = self.writer.write_events(&self.pending);
        self.pending.clear();
        self.store_err(result);
    }
}

impl<W: OutputWriter> DispatchObserver for DispatchOutputObserver<W> {
    fn on_bound(&mut self, tick: Tick, binding: &Binding) {
        self.pending.push(DispatchEventRow::bound(tick.0, binding));
    }

    fn on_serviced(&mut self, tick: Tick, request: &ServiceRequest) {
        self.pending.push(DispatchEventRow::serviced(tick.0, request));
    }

    fn on_request_dropped(&mut self, tick: Tick, request: &ServiceRequest, reason: DropReason) {
        self.pending.push(DispatchEventRow::dropped(tick.0, request, reason));
    }

    fn on_vehicle_spawned(&mut self, tick: Tick, vehicle: EntityId, station: EntityId) {
        self.pending.push(DispatchEventRow::spawned(tick.0, vehicle, station));
    }

    fn on_vehicle_disabled(&mut self, tick: Tick, vehicle: EntityId, reason: DisableReason) {
        self.pending.push(DispatchEventRow::disabled(tick.0, vehicle, reason));
    }

    fn on_tick_end(&mut self, _tick: Tick) {
        self.flush_events();
    }

    fn on_summary(&mut self, summary: &TickSummary) {
        let result = self.writer.write_tick_summary(&TickSummaryRow::from(summary));
        self.store_err(result);
    }

    fn on_sim_end(&mut self, _final_tick: Tick, metrics: &DispatchMetrics) {
        self.flush_events();
        let rows: Vec<KindMetricsRow> = RequestKind::ALL
            .iter()
            .map(|&kind| KindMetricsRow::new(kind, metrics.kind(kind)))
            .collect();
        let result = self.writer.write_kind_metrics(&rows);
        self.store_err(result);
        let result = self.writer.finish();
        self.store_err(result);
    }
}
