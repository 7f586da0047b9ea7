//! CSV loader for per-kind tuning.
//!
//! # CSV format
//!
//! One row per kind to override; every column but `kind` may be left empty
//! to keep the base value.  Rows for the same kind apply in file order.
//!
//! ```csv
//! kind,max_speed,max_concurrency,service_rate,capacity,match_interval,match_offset,group_size,preemptive
//! rescue,90,1,2,40,8,2,,true
//! collection,,,60,,,,24,
//! ```
//!
//! | Column                                            | Field                     |
//! |---------------------------------------------------|---------------------------|
//! | `weight_distance` … `weight_comfort`              | `weights`                 |
//! | `match_interval`, `match_offset`                  | `match_interval`          |
//! | `vehicle_interval`, `vehicle_offset`              | `vehicle_interval`        |
//! | `station_stride`, `station_stride_offset`         | `station_reversed_stride` |
//! | `vehicle_stride`, `vehicle_stride_offset`         | `vehicle_reversed_stride` |
//!
//! A stride of `0` disables that kind of advertising.  A `search_radius` of
//! `0` removes the radius limit.  Other columns share the field's name.

use std::io::Read;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use sd_core::{KindConfig, KindTable, RequestKind, UpdateInterval};

use crate::{EngineError, EngineResult};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Default, Deserialize)]
#[serde(default)]
struct KindRecord {
    kind:                  String,
    weight_distance:       Option<f32>,
    weight_time:           Option<f32>,
    weight_road_class:     Option<f32>,
    weight_comfort:        Option<f32>,
    max_speed:             Option<f32>,
    max_concurrency:       Option<u8>,
    proximity:             Option<f32>,
    service_rate:          Option<f32>,
    capacity:              Option<f32>,
    need_threshold:        Option<f32>,
    match_interval:        Option<u64>,
    match_offset:          Option<u64>,
    vehicle_interval:      Option<u64>,
    vehicle_offset:        Option<u64>,
    station_stride:        Option<u64>,
    station_stride_offset: Option<u64>,
    vehicle_stride:        Option<u64>,
    vehicle_stride_offset: Option<u64>,
    max_fail_count:        Option<u8>,
    base_cooldown:         Option<u8>,
    max_cooldown:          Option<u8>,
    group_size:            Option<u32>,
    search_radius:         Option<f32>,
    preemptive:            Option<bool>,
    clears_on_secure:      Option<bool>,
    secures_on_arrival:    Option<bool>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load kind overrides from a CSV file on top of `base`.
pub fn load_kind_table_csv(path: &Path, base: KindTable) -> EngineResult<KindTable> {
    let file = std::fs::File::open(path)?;
    load_kind_table_reader(file, base)
}

/// Like [`load_kind_table_csv`] but accepts any `Read` source.
pub fn load_kind_table_reader<R: Read>(reader: R, base: KindTable) -> EngineResult<KindTable> {
    let mut table = base;
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    for (row, result) in csv_reader.deserialize::<KindRecord>().enumerate() {
        let record = result?;
        let kind: RequestKind = record
            .kind
            .parse()
            .map_err(|e| EngineError::Parse(format!("row {}: {e}", row + 1)))?;
        apply(table.get_mut(kind), &record);
        table.get(kind).validate(kind)?;
        debug!("kind table: applied row {} for {kind}", row + 1);
    }
    Ok(table)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn apply(config: &mut KindConfig, r: &KindRecord) {
    let w = &mut config.weights;
    set(&mut w.distance, r.weight_distance);
    set(&mut w.time, r.weight_time);
    set(&mut w.road_class, r.weight_road_class);
    set(&mut w.comfort, r.weight_comfort);

    set(&mut config.max_speed, r.max_speed);
    set(&mut config.max_concurrency, r.max_concurrency);
    set(&mut config.proximity, r.proximity);
    set(&mut config.service_rate, r.service_rate);
    set(&mut config.capacity, r.capacity);
    set(&mut config.need_threshold, r.need_threshold);
    set(&mut config.max_fail_count, r.max_fail_count);
    set(&mut config.base_cooldown, r.base_cooldown);
    set(&mut config.max_cooldown, r.max_cooldown);
    set(&mut config.group_size, r.group_size);
    set(&mut config.preemptive, r.preemptive);
    set(&mut config.clears_on_secure, r.clears_on_secure);
    set(&mut config.secures_on_arrival, r.secures_on_arrival);

    interval(&mut config.match_interval, r.match_interval, r.match_offset);
    interval(&mut config.vehicle_interval, r.vehicle_interval, r.vehicle_offset);
    stride(&mut config.station_reversed_stride, r.station_stride, r.station_stride_offset);
    stride(&mut config.vehicle_reversed_stride, r.vehicle_stride, r.vehicle_stride_offset);

    if let Some(radius) = r.search_radius {
        config.search_radius = (radius > 0.0).then_some(radius);
    }
}

fn set<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *field = v;
    }
}

fn interval(field: &mut UpdateInterval, every: Option<u64>, offset: Option<u64>) {
    set(&mut field.interval, every);
    set(&mut field.offset, offset);
}

fn stride(field: &mut Option<UpdateInterval>, every: Option<u64>, offset: Option<u64>) {
    match (every, field.as_mut()) {
        (Some(0), _) => *field = None,
        (Some(n), Some(current)) => {
            current.interval = n;
            set(&mut current.offset, offset);
        }
        (Some(n), None) => *field = Some(UpdateInterval::new(n, offset.unwrap_or(0))),
        (None, Some(current)) => set(&mut current.offset, offset),
        (None, None) => {}
    }
}
