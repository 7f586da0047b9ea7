//! city — service dispatch demo on a synthetic street grid.
//!
//! Police, fire, and sanitation stations serve a 12 × 12 grid of sites.
//! A scripted producer raises emergencies and fires at random sites, while
//! garbage accumulates everywhere and a `NeedScanner` turns full bins into
//! collection requests.  Output lands in `output/city/`.
//!
//! Usage: `city [kind_table.csv]`

mod network;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info};

use sd_core::{EngineConfig, EntityId, KindSet, KindTable, RequestKind, SimRng, Tick, UpdateInterval};
use sd_engine::{EngineBuilder, NeedScanner, RequestProducer, load_kind_table_csv};
use sd_output::{CsvWriter, DispatchOutputObserver};
use sd_request::{DropReason, NewRequest, ServiceRequest, TargetStore};
use sd_spatial::{DijkstraRouter, QueuedPathfinder};

use network::{GRID, build_grid};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:                  u64 = 42;
const TOTAL_TICKS:           u64 = 4_096;
const OUTPUT_INTERVAL_TICKS: u64 = 64;
const PATH_LATENCY_TICKS:    u64 = 2;
const OUTPUT_DIR:            &str = "output/city";

/// Per-tick chance that some site raises an incident of each kind.
const INCIDENTS: [(RequestKind, f32, f32); 2] = [
    (RequestKind::Emergency, 0.02, 4.0),
    (RequestKind::Rescue,    0.01, 8.0),
];

/// Garbage added to every site each time the bins fill.
const GARBAGE_INTERVAL: UpdateInterval = UpdateInterval::new(32, 7);

// ── Incident script ───────────────────────────────────────────────────────────

/// Raises random emergencies and fires, and lets garbage pile up.
struct IncidentScript {
    sites: Vec<EntityId>,
}

impl RequestProducer for IncidentScript {
    fn produce(&mut self, now: Tick, targets: &mut TargetStore, rng: &mut SimRng) -> Vec<NewRequest> {
        let mut out = Vec::new();
        for (kind, rate, need) in INCIDENTS {
            if rng.random::<f32>() >= rate {
                continue;
            }
            let site = self.sites[rng.gen_range(0..self.sites.len())];
            let Some(target) = targets.get_mut(site) else { continue };
            if target.claim(kind).is_some() {
                continue;
            }
            target.add_need(kind, need);
            out.push(NewRequest::forward(site, kind, target.need(kind)));
        }

        if GARBAGE_INTERVAL.fires(now) {
            for &site in &self.sites {
                let amount = rng.gen_range(1.0..6.0);
                if let Some(target) = targets.get_mut(site) {
                    target.add_need(RequestKind::Collection, amount);
                }
            }
        }
        out
    }

    fn on_dropped(&mut self, request: &ServiceRequest, reason: DropReason, tick: Tick) {
        debug!("{tick}: {} at {} dropped ({reason})", request.kind, request.target);
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let kinds = match std::env::args().nth(1) {
        Some(path) => load_kind_table_csv(Path::new(&path), KindTable::default())
            .with_context(|| format!("loading kind table from {path}"))?,
        None => KindTable::default(),
    };

    let config = EngineConfig {
        seed:                  SEED,
        total_ticks:           TOTAL_TICKS,
        tick_duration_secs:    1.0,
        path_latency_ticks:    PATH_LATENCY_TICKS,
        return_random_cost:    30.0,
        output_interval_ticks: OUTPUT_INTERVAL_TICKS,
        num_threads:           None,
        kinds,
    };
    if let Some(n) = config.num_threads {
        rayon::ThreadPoolBuilder::new().num_threads(n).build_global()?;
    }

    println!("=== city — service dispatch engine ===");

    // 1. Road network.
    let (network, nodes) = build_grid();
    println!("Road network: {} nodes, {} edges", network.node_count(), network.edge_count());
    let positions: Vec<_> = nodes.iter().filter_map(|&n| network.position(n)).collect();
    let pathfinder = QueuedPathfinder::new(network, DijkstraRouter, PATH_LATENCY_TICKS, SEED);

    // 2. Engine with the garbage scanner; sites and stations are added below.
    let scanner = NeedScanner::new(
        KindSet::only(RequestKind::Collection),
        &config.kinds,
        UpdateInterval::new(16, 3),
    );
    let mut engine = EngineBuilder::new(config, pathfinder)
        .producer(Box::new(scanner))
        .build()?;

    // 3. Stations: one police and one fire station per quadrant, a single depot.
    let quarter = GRID / 4;
    for (row, col) in [(quarter, quarter), (quarter, 3 * quarter), (3 * quarter, quarter), (3 * quarter, 3 * quarter)] {
        let pos = positions[row * GRID + col];
        let police = engine.add_station(pos, RequestKind::Emergency, 3);
        engine.add_vehicle(police)?;
        let fire = engine.add_station(pos, RequestKind::Rescue, 2);
        engine.add_vehicle(fire)?;
    }
    let depot = engine.add_station(positions[(GRID / 2) * GRID + GRID / 2], RequestKind::Collection, 6);
    for _ in 0..2 {
        engine.add_vehicle(depot)?;
    }

    // 4. A site at every intersection.
    let sites: Vec<EntityId> = positions.iter().map(|&pos| engine.add_target(pos, None)).collect();
    println!("Sites: {}  |  Stations: {}  |  Vehicles: {}", sites.len(), engine.stations.len(), engine.vehicles.len());
    engine.add_producer(Box::new(IncidentScript { sites }));

    // 5. Output.
    std::fs::create_dir_all(OUTPUT_DIR)?;
    let mut obs = DispatchOutputObserver::new(CsvWriter::new(Path::new(OUTPUT_DIR))?);

    // 6. Run.
    let t0 = Instant::now();
    engine.run(&mut obs)?;
    let elapsed = t0.elapsed();
    if let Some(e) = obs.take_error() {
        eprintln!("output error: {e}");
    }
    info!("simulation complete in {:.3} s", elapsed.as_secs_f64());

    // 7. Snapshot of the final state.
    let snapshot_path = Path::new(OUTPUT_DIR).join("snapshot.json");
    let file = File::create(&snapshot_path)?;
    serde_json::to_writer(BufWriter::new(file), &engine.snapshot())?;
    println!("Snapshot written to {}", snapshot_path.display());
    println!();

    // 8. Per-kind table.
    println!("{:<12} {:>8} {:>8} {:>8} {:>8} {:>10}", "Kind", "Bound", "Done", "Dropped", "Failed", "Avg ticks");
    println!("{}", "-".repeat(60));
    for (kind, m) in engine.metrics.iter() {
        if m.bindings == 0 && m.dropped == 0 {
            continue;
        }
        println!(
            "{:<12} {:>8} {:>8} {:>8} {:>8} {:>10.1}",
            kind.as_str(),
            m.bindings,
            m.serviced,
            m.dropped,
            m.failed_searches,
            m.avg_response(),
        );
    }
    println!();
    println!(
        "Vehicles spawned: {}  |  disabled: {}",
        engine.metrics.vehicles_spawned, engine.metrics.vehicles_disabled
    );

    Ok(())
}
