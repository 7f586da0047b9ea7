//! Integration tests for sd-output.

#[cfg(test)]
mod csv_tests {
    use sd_core::RequestKind;
    use tempfile::TempDir;

    use crate::csv::CsvWriter;
    use crate::row::{DispatchEventRow, EventKind, KindMetricsRow, TickSummaryRow};
    use crate::writer::OutputWriter;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn bound_row(tick: u64, request: u32) -> DispatchEventRow {
        DispatchEventRow {
            tick,
            event:   EventKind::Bound,
            request,
            kind:    Some(RequestKind::Rescue),
            target:  10,
            source:  20,
            detail:  "",
        }
    }

    fn read(dir: &TempDir, name: &str) -> Vec<csv::StringRecord> {
        let mut rdr = csv::Reader::from_path(dir.path().join(name)).unwrap();
        rdr.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn csv_files_created() {
        let dir = tmp();
        let _w = CsvWriter::new(dir.path()).unwrap();
        assert!(dir.path().join("dispatch_events.csv").exists());
        assert!(dir.path().join("tick_summaries.csv").exists());
        assert!(dir.path().join("kind_metrics.csv").exists());
    }

    #[test]
    fn csv_headers_correct() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("dispatch_events.csv")).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, ["tick", "event", "request_id", "kind", "target_id", "source_id", "detail"]);

        let mut rdr = csv::Reader::from_path(dir.path().join("tick_summaries.csv")).unwrap();
        assert_eq!(rdr.headers().unwrap().len(), 8);
    }

    #[test]
    fn csv_events_written_in_order() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_events(&[bound_row(2, 0), bound_row(2, 1), bound_row(3, 5)]).unwrap();
        w.finish().unwrap();

        let rows = read(&dir, "dispatch_events.csv");
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][1], "bound");
        assert_eq!(&rows[0][3], "rescue");
        assert_eq!(&rows[1][2], "1");
        assert_eq!(&rows[2][0], "3");
    }

    #[test]
    fn csv_missing_ids_are_blank() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        let row = DispatchEventRow::disabled(4, sd_core::EntityId(9), sd_vehicle::DisableReason::NoFreeSlot);
        w.write_events(&[row]).unwrap();
        w.finish().unwrap();

        let rows = read(&dir, "dispatch_events.csv");
        assert_eq!(&rows[0][2], "");
        assert_eq!(&rows[0][3], "");
        assert_eq!(&rows[0][4], "");
        assert_eq!(&rows[0][5], "9");
        assert_eq!(&rows[0][6], "no_free_slot");
    }

    #[test]
    fn csv_tick_summary_round_trip() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_tick_summary(&TickSummaryRow {
            tick:              7,
            live_requests:     3,
            bound_requests:    2,
            reversed_requests: 1,
            vehicles_idle:     4,
            vehicles_busy:     2,
            vehicles_disabled: 0,
            queries_in_flight: 5,
        }).unwrap();
        w.finish().unwrap();

        let rows = read(&dir, "tick_summaries.csv");
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "7");
        assert_eq!(&rows[0][1], "3");
        assert_eq!(&rows[0][7], "5");
    }

    #[test]
    fn csv_kind_metrics_avg_is_rounded() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_kind_metrics(&[KindMetricsRow {
            kind:            RequestKind::Collection,
            bindings:        3,
            serviced:        3,
            dropped:         0,
            failed_searches: 1,
            avg_response:    10.0 / 3.0,
        }]).unwrap();
        w.finish().unwrap();

        let rows = read(&dir, "kind_metrics.csv");
        assert_eq!(&rows[0][0], "collection");
        assert_eq!(&rows[0][5], "3.33");
    }

    #[test]
    fn csv_finish_idempotent() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
    }

    #[test]
    fn csv_empty_batch_ok() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_events(&[]).unwrap();
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod observer_tests {
    use std::io;

    use sd_core::{EngineConfig, KindTable, Position, RequestKind};
    use sd_engine::EngineBuilder;
    use sd_request::NewRequest;
    use sd_spatial::CrowFliesPathfinder;
    use tempfile::TempDir;

    use crate::csv::CsvWriter;
    use crate::observer::DispatchOutputObserver;
    use crate::row::{DispatchEventRow, KindMetricsRow, TickSummaryRow};
    use crate::writer::OutputWriter;
    use crate::{OutputError, OutputResult};

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn config(total_ticks: u64, output_interval_ticks: u64) -> EngineConfig {
        EngineConfig {
            seed:                  42,
            total_ticks,
            tick_duration_secs:    1.0,
            path_latency_ticks:    1,
            return_random_cost:    0.0,
            output_interval_ticks,
            num_threads:           Some(1),
            kinds:                 KindTable::every_tick(),
        }
    }

    /// Counts calls and fails every `write_events`.
    #[derive(Default)]
    struct FailingWriter {
        event_calls: usize,
        finished:    bool,
    }

    impl OutputWriter for FailingWriter {
        fn write_events(&mut self, _rows: &[DispatchEventRow]) -> OutputResult<()> {
            self.event_calls += 1;
            Err(OutputError::Io(io::Error::other(format!("write {}", self.event_calls))))
        }
        fn write_tick_summary(&mut self, _row: &TickSummaryRow) -> OutputResult<()> {
            Ok(())
        }
        fn write_kind_metrics(&mut self, _rows: &[KindMetricsRow]) -> OutputResult<()> {
            Ok(())
        }
        fn finish(&mut self) -> OutputResult<()> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn integration_csv() {
        let mut engine = EngineBuilder::new(config(20, 5), CrowFliesPathfinder::new(10.0, 1, 7))
            .build()
            .unwrap();
        let station = engine.add_station(Position::new(0.0, 0.0), RequestKind::Rescue, 1);
        let vehicle = engine.add_vehicle(station).unwrap();
        let target = engine.add_target(Position::new(50.0, 0.0), None);
        engine.set_need(target, RequestKind::Rescue, 6.0).unwrap();
        let request = engine.emit_request(NewRequest::forward(target, RequestKind::Rescue, 1.0)).id();

        let dir = tmp();
        let mut obs = DispatchOutputObserver::new(CsvWriter::new(dir.path()).unwrap());
        engine.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none(), "no write errors expected");

        let mut rdr = csv::Reader::from_path(dir.path().join("dispatch_events.csv")).unwrap();
        let events: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        let req = request.0.to_string();
        let bound: Vec<_> = events.iter().filter(|r| &r[1] == "bound").collect();
        assert_eq!(bound.len(), 1);
        assert_eq!(&bound[0][0], "2");
        assert_eq!(bound[0][2], req);
        assert_eq!(bound[0][5], vehicle.0.to_string());
        let serviced: Vec<_> = events.iter().filter(|r| &r[1] == "serviced").collect();
        assert_eq!(serviced.len(), 1);
        assert_eq!(&serviced[0][0], "12");

        // output_interval = 5 → summaries at ticks 0, 5, 10, 15.
        let mut rdr = csv::Reader::from_path(dir.path().join("tick_summaries.csv")).unwrap();
        let ticks: Vec<String> = rdr.records().map(|r| r.unwrap()[0].to_owned()).collect();
        assert_eq!(ticks, ["0", "5", "10", "15"]);

        let mut rdr = csv::Reader::from_path(dir.path().join("kind_metrics.csv")).unwrap();
        let metrics: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(metrics.len(), RequestKind::COUNT);
        let rescue = metrics.iter().find(|r| &r[0] == "rescue").unwrap();
        assert_eq!(&rescue[2], "1");
        assert_eq!(&rescue[5], "12.00");
    }

    #[test]
    fn first_error_is_kept() {
        let mut engine = EngineBuilder::new(config(6, 1), CrowFliesPathfinder::new(10.0, 1, 7))
            .build()
            .unwrap();
        engine.add_station(Position::new(0.0, 0.0), RequestKind::Rescue, 2);
        for x in [20.0, 40.0] {
            let target = engine.add_target(Position::new(x, 0.0), None);
            engine.set_need(target, RequestKind::Rescue, 3.0).unwrap();
            engine.emit_request(NewRequest::forward(target, RequestKind::Rescue, 1.0));
        }

        let mut obs = DispatchOutputObserver::new(FailingWriter::default());
        engine.run(&mut obs).unwrap();

        let err = obs.take_error().expect("write error stored");
        assert_eq!(err.to_string(), "I/O error: write 1");
        assert!(obs.take_error().is_none());
        let writer = obs.into_writer();
        assert!(writer.event_calls >= 1);
        assert!(writer.finished, "finish still runs after a failed write");
    }

    #[test]
    fn quiet_ticks_write_no_events() {
        let mut engine = EngineBuilder::new(config(4, 1), CrowFliesPathfinder::new(10.0, 1, 7))
            .build()
            .unwrap();
        let mut obs = DispatchOutputObserver::new(FailingWriter::default());
        engine.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none());
        assert_eq!(obs.into_writer().event_calls, 0);
    }
}

// ── SQLite tests ──────────────────────────────────────────────────────────────

#[cfg(all(test, feature = "sqlite"))]
mod sqlite_tests {
    use sd_core::{EntityId, RequestKind};
    use sd_vehicle::DisableReason;
    use tempfile::TempDir;

    use crate::row::{DispatchEventRow, EventKind, KindMetricsRow, TickSummaryRow};
    use crate::sqlite::SqliteWriter;
    use crate::writer::OutputWriter;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn sqlite_db_created() {
        let dir = tmp();
        let _w = SqliteWriter::new(dir.path()).unwrap();
        assert!(dir.path().join("dispatch.db").exists());
    }

    #[test]
    fn sqlite_event_count() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        let rows: Vec<_> = (0..3)
            .map(|i| DispatchEventRow {
                tick:    1,
                event:   EventKind::Serviced,
                request: i,
                kind:    Some(RequestKind::Delivery),
                target:  100 + i,
                source:  200,
                detail:  "",
            })
            .collect();
        w.write_events(&rows).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("dispatch.db")).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM dispatch_events WHERE event = 'serviced'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn sqlite_missing_ids_are_null() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_events(&[DispatchEventRow::disabled(2, EntityId(4), DisableReason::Orphaned)]).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("dispatch.db")).unwrap();
        let (request, source, detail): (Option<i64>, Option<i64>, String) = conn
            .query_row(
                "SELECT request_id, source_id, detail FROM dispatch_events",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(request, None);
        assert_eq!(source, Some(4));
        assert_eq!(detail, "orphaned");
    }

    #[test]
    fn sqlite_tick_summary_and_metrics() {
        let dir = tmp();
        let mut w = SqliteWriter::new(dir.path()).unwrap();
        w.write_tick_summary(&TickSummaryRow {
            tick:              9,
            live_requests:     4,
            bound_requests:    1,
            reversed_requests: 0,
            vehicles_idle:     2,
            vehicles_busy:     1,
            vehicles_disabled: 0,
            queries_in_flight: 3,
        }).unwrap();
        w.write_kind_metrics(&[KindMetricsRow {
            kind:            RequestKind::Rescue,
            bindings:        2,
            serviced:        2,
            dropped:         1,
            failed_searches: 4,
            avg_response:    8.5,
        }]).unwrap();
        w.finish().unwrap();

        let conn = rusqlite::Connection::open(dir.path().join("dispatch.db")).unwrap();
        let live: i64 = conn
            .query_row("SELECT live_requests FROM tick_summaries WHERE tick = 9", [], |r| r.get(0))
            .unwrap();
        assert_eq!(live, 4);
        let avg: f64 = conn
            .query_row("SELECT avg_response_ticks FROM kind_metrics WHERE kind = 'rescue'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(avg, 8.5);
    }
}
