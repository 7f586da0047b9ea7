//! Per-kind dispatch configuration.
//!
//! One `KindConfig` row per [`RequestKind`] replaces the per-vehicle-type
//! system copies: matching cadence, path weighting, concurrency, service
//! rate and retry policy are all data.  The defaults reproduce the stock
//! city tuning; applications override rows from CSV (see `sd-engine`'s
//! loader) or in code.

use crate::{CoreError, CoreResult, RequestKind, SimClock, Tick, UpdateInterval};

// ── PathWeights ───────────────────────────────────────────────────────────────

/// Weight vector for the path cost query.
///
/// Emergencies weigh distance only; routine services blend in travel time,
/// road-class preference and comfort (number of segments).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathWeights {
    pub distance:   f32,
    pub time:       f32,
    pub road_class: f32,
    pub comfort:    f32,
}

impl PathWeights {
    pub const DISTANCE_ONLY: PathWeights =
        PathWeights { distance: 1.0, time: 0.0, road_class: 0.0, comfort: 0.0 };

    pub const BLENDED: PathWeights =
        PathWeights { distance: 1.0, time: 1.0, road_class: 1.0, comfort: 1.0 };

    pub const fn new(distance: f32, time: f32, road_class: f32, comfort: f32) -> Self {
        Self { distance, time, road_class, comfort }
    }

    /// All weights finite and non-negative, and at least one positive.
    pub fn is_valid(&self) -> bool {
        let w = [self.distance, self.time, self.road_class, self.comfort];
        w.iter().all(|v| v.is_finite() && *v >= 0.0) && w.iter().any(|v| *v > 0.0)
    }
}

impl Default for PathWeights {
    fn default() -> Self {
        Self::DISTANCE_ONLY
    }
}

// ── KindConfig ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KindConfig {
    /// Cost weighting for candidate and trip path queries.
    pub weights: PathWeights,
    /// Speed cap (m/s) applied by the router for this kind's vehicles.
    pub max_speed: f32,
    /// Requests a single vehicle may hold at once, current one included.
    pub max_concurrency: u8,
    /// Arrival radius around the target, metres.
    pub proximity: f32,
    /// Need removed per servicing step.
    pub service_rate: f32,
    /// Full service accumulator of a fresh vehicle.
    pub capacity: f32,
    /// A target needs service while its need exceeds this.
    pub need_threshold: f32,
    /// Matching cadence for requests of this kind.
    pub match_interval: UpdateInterval,
    /// Vehicle state machine cadence.
    pub vehicle_interval: UpdateInterval,
    /// Station reversed-request stride; `None` disables station advertising.
    pub station_reversed_stride: Option<UpdateInterval>,
    /// Returning-vehicle reversed-request stride; `None` disables it.  Only
    /// checked on vehicle ticks, so it must line up with `vehicle_interval`.
    pub vehicle_reversed_stride: Option<UpdateInterval>,
    /// Failed searches before a forward request is dropped.
    pub max_fail_count: u8,
    /// Cooldown (matching passes) after the first failure; doubles per failure.
    pub base_cooldown: u8,
    pub max_cooldown: u8,
    /// Default candidate batch admitted per search.
    pub group_size: u32,
    /// Candidate search radius, metres; `None` is unbounded.
    pub search_radius: Option<f32>,
    /// Higher-priority requests may displace an en-route head.
    pub preemptive: bool,
    /// A secured target stops needing this kind regardless of its need.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clears_on_secure: bool,
    /// Vehicles of this kind secure the target when they reach it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub secures_on_arrival: bool,
}

impl KindConfig {
    /// Stock tuning for `kind`.
    pub fn default_for(kind: RequestKind) -> Self {
        let base = KindConfig {
            weights:                 PathWeights::BLENDED,
            max_speed:               277.78,
            max_concurrency:         2,
            proximity:               30.0,
            service_rate:            1.0,
            capacity:                10.0,
            need_threshold:          0.0,
            match_interval:          UpdateInterval::new(16, 0),
            vehicle_interval:        UpdateInterval::new(16, 5),
            station_reversed_stride: None,
            vehicle_reversed_stride: None,
            max_fail_count:          3,
            base_cooldown:           2,
            max_cooldown:            16,
            group_size:              4,
            search_radius:           None,
            preemptive:              false,
            clears_on_secure:        false,
            secures_on_arrival:      false,
        };
        match kind {
            RequestKind::Patrol => KindConfig {
                match_interval: UpdateInterval::new(16, 0),
                station_reversed_stride: Some(UpdateInterval::new(512, 128)),
                vehicle_reversed_stride: Some(UpdateInterval::new(512, 5)),
                group_size: 32,
                search_radius: Some(2_000.0),
                clears_on_secure: true,
                ..base
            },
            RequestKind::Emergency => KindConfig {
                weights: PathWeights::DISTANCE_ONLY,
                max_speed: 111.11,
                max_concurrency: 1,
                service_rate: 1.0,
                capacity: 4.0,
                match_interval: UpdateInterval::new(16, 1),
                vehicle_reversed_stride: Some(UpdateInterval::new(64, 5)),
                preemptive: true,
                secures_on_arrival: true,
                ..base
            },
            RequestKind::Rescue => KindConfig {
                weights: PathWeights::DISTANCE_ONLY,
                max_speed: 111.11,
                max_concurrency: 1,
                service_rate: 2.0,
                capacity: 40.0,
                match_interval: UpdateInterval::new(16, 2),
                vehicle_interval: UpdateInterval::new(16, 4),
                vehicle_reversed_stride: Some(UpdateInterval::new(64, 4)),
                preemptive: true,
                ..base
            },
            RequestKind::Collection => KindConfig {
                service_rate: 50.0,
                capacity: 2_000.0,
                need_threshold: 20.0,
                match_interval: UpdateInterval::new(64, 3),
                station_reversed_stride: Some(UpdateInterval::new(256, 32)),
                vehicle_reversed_stride: Some(UpdateInterval::new(256, 5)),
                group_size: 16,
                search_radius: Some(3_000.0),
                ..base
            },
            RequestKind::Delivery => KindConfig {
                service_rate: 20.0,
                capacity: 500.0,
                match_interval: UpdateInterval::new(64, 4),
                station_reversed_stride: Some(UpdateInterval::new(256, 64)),
                vehicle_reversed_stride: Some(UpdateInterval::new(256, 21)),
                group_size: 16,
                search_radius: Some(3_000.0),
                ..base
            },
            RequestKind::Boarding => KindConfig {
                max_concurrency: 1,
                service_rate: 10.0,
                capacity: 60.0,
                match_interval: UpdateInterval::new(16, 5),
                ..base
            },
        }
    }

    /// Cooldown to apply after the `fail_count`-th failed search:
    /// `base << (fail_count - 1)`, capped at `max_cooldown`.
    pub fn cooldown_after(&self, fail_count: u8) -> u8 {
        if fail_count == 0 {
            return 0;
        }
        let shift = u32::from(fail_count - 1).min(7);
        let cooldown = u32::from(self.base_cooldown) << shift;
        cooldown.min(u32::from(self.max_cooldown)) as u8
    }

    /// Same row with every cadence set to fire each tick.
    pub fn every_tick(mut self) -> Self {
        self.match_interval = UpdateInterval::EVERY_TICK;
        self.vehicle_interval = UpdateInterval::EVERY_TICK;
        self
    }

    pub fn validate(&self, kind: RequestKind) -> CoreResult<()> {
        let invalid = |reason: &str| CoreError::InvalidKind { kind, reason: reason.to_owned() };
        if !self.weights.is_valid() {
            return Err(invalid("path weights must be finite, non-negative and not all zero"));
        }
        if !(1..=2).contains(&self.max_concurrency) {
            return Err(invalid("max_concurrency must be 1 or 2"));
        }
        if self.max_fail_count == 0 {
            return Err(invalid("max_fail_count must be at least 1"));
        }
        if self.service_rate <= 0.0 || self.capacity <= 0.0 {
            return Err(invalid("service_rate and capacity must be positive"));
        }
        if self.proximity < 0.0 || self.max_speed <= 0.0 {
            return Err(invalid("proximity must be non-negative and max_speed positive"));
        }
        if self.group_size == 0 {
            return Err(invalid("group_size must be at least 1"));
        }
        if self.match_interval.interval == 0 || self.vehicle_interval.interval == 0 {
            return Err(invalid("update intervals must be non-zero"));
        }
        Ok(())
    }
}

// ── KindTable ─────────────────────────────────────────────────────────────────

/// One `KindConfig` per `RequestKind`, indexed densely.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KindTable {
    rows: [KindConfig; RequestKind::COUNT],
}

impl KindTable {
    #[inline]
    pub fn get(&self, kind: RequestKind) -> &KindConfig {
        &self.rows[kind.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, kind: RequestKind) -> &mut KindConfig {
        &mut self.rows[kind.index()]
    }

    pub fn set(&mut self, kind: RequestKind, config: KindConfig) {
        self.rows[kind.index()] = config;
    }

    pub fn iter(&self) -> impl Iterator<Item = (RequestKind, &KindConfig)> {
        RequestKind::ALL.into_iter().zip(self.rows.iter())
    }

    /// Every row with all cadences set to one tick, handy for tests and
    /// small demos where waiting on 16-tick slots only adds noise.
    pub fn every_tick() -> Self {
        let mut table = Self::default();
        for row in table.rows.iter_mut() {
            *row = row.clone().every_tick();
        }
        table
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.iter().try_for_each(|(kind, row)| row.validate(kind))
    }
}

impl Default for KindTable {
    fn default() -> Self {
        Self { rows: RequestKind::ALL.map(KindConfig::default_for) }
    }
}

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Top-level engine configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,
    /// Ticks simulated by `Engine::run`.
    pub total_ticks: u64,
    /// Simulated seconds per tick (converts path durations into ETAs).
    pub tick_duration_secs: f32,
    /// Ticks between submitting a path query and reading its result (>= 1).
    pub path_latency_ticks: u64,
    /// Maximum random cost added to return-home trips so parked fleets do
    /// not all pick the same route.
    pub return_random_cost: f32,
    /// Report a tick summary to observers every N ticks.
    pub output_interval_ticks: u64,
    /// Worker thread count passed to Rayon.  `None` uses all logical cores.
    pub num_threads: Option<usize>,
    pub kinds: KindTable,
}

impl EngineConfig {
    /// The tick at which `Engine::run` stops (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> Tick {
        Tick(self.total_ticks)
    }

    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.tick_duration_secs)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.path_latency_ticks == 0 {
            return Err(CoreError::Config("path_latency_ticks must be at least 1".into()));
        }
        if self.tick_duration_secs <= 0.0 {
            return Err(CoreError::Config("tick_duration_secs must be positive".into()));
        }
        if self.output_interval_ticks == 0 {
            return Err(CoreError::Config("output_interval_ticks must be at least 1".into()));
        }
        self.kinds.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed:                  0,
            total_ticks:           4_096,
            tick_duration_secs:    1.0,
            path_latency_ticks:    1,
            return_random_cost:    30.0,
            output_interval_ticks: 64,
            num_threads:           None,
            kinds:                 KindTable::default(),
        }
    }
}
