//! Fluent builder for constructing an [`Engine`].

use sd_core::{EngineConfig, EntityId};
use sd_request::{Target, TargetStore};
use sd_spatial::Pathfinder;

use crate::{Engine, EngineError, EngineResult, RequestProducer};

/// Fluent builder for [`Engine<P>`].
///
/// # Required inputs
///
/// - [`EngineConfig`]: seed, tick length, path latency, per-kind table
/// - `P: Pathfinder`: e.g. [`sd_spatial::QueuedPathfinder`] over a road
///   network, or [`sd_spatial::CrowFliesPathfinder`] for tests
///
/// # Optional inputs (have defaults)
///
/// | Method            | Default              |
/// |-------------------|----------------------|
/// | `.producer(p)`    | no producers         |
/// | `.targets(v)`     | no targets           |
///
/// Stations and vehicles are added after `build()` through
/// [`Engine::add_station`] and [`Engine::add_vehicle`].
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = EngineBuilder::new(config, CrowFliesPathfinder::new(10.0, 1, 0))
///     .producer(Box::new(scanner))
///     .build()?;
/// let station = engine.add_station(Position::new(0.0, 0.0), RequestKind::Rescue, 4);
/// engine.add_vehicle(station)?;
/// engine.run(&mut NoopObserver)?;
/// ```
pub struct EngineBuilder<P: Pathfinder> {
    config:     EngineConfig,
    pathfinder: P,
    producers:  Vec<Box<dyn RequestProducer>>,
    targets:    Vec<Target>,
}

impl<P: Pathfinder> EngineBuilder<P> {
    pub fn new(config: EngineConfig, pathfinder: P) -> Self {
        Self { config, pathfinder, producers: Vec::new(), targets: Vec::new() }
    }

    /// Register a request producer.  Producers run in registration order.
    pub fn producer(mut self, producer: Box<dyn RequestProducer>) -> Self {
        self.producers.push(producer);
        self
    }

    /// Pre-populate the target store.  Target ids must be unique; entity
    /// ids handed out later start above the largest one.
    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    /// Validate inputs and return a ready-to-run [`Engine`] at tick 0.
    /// The pathfinder's latency is overridden by
    /// [`EngineConfig::path_latency_ticks`].
    pub fn build(mut self) -> EngineResult<Engine<P>> {
        self.config.validate()?;
        self.pathfinder.set_latency(self.config.path_latency_ticks);

        let mut store = TargetStore::new();
        let mut next_entity = EntityId(0);
        for target in self.targets {
            let id = target.id;
            if store.insert(target).is_some() {
                return Err(EngineError::Config(format!("duplicate target id {id}")));
            }
            if id >= next_entity {
                next_entity = id.next();
            }
        }

        Ok(Engine::from_parts(self.config, self.pathfinder, self.producers, store, next_entity))
    }
}
