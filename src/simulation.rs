use async_stream::stream;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{Stream, StreamExt};
use lode_purge::{
    ActivityQuery, MemoryActivityStore, PurgeConfig, PurgeError, PurgeQueue, PurgeResult,
    TaskScheduler, TokioScheduler,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const ACTIONS: [&str; 6] = [
    "block-break",
    "block-place",
    "container-open",
    "entity-kill",
    "item-drop",
    "player-join",
];

/// Parameters for one purge simulation.
#[derive(Clone, Debug)]
pub struct SimulationParams {
    pub records: usize,
    pub worlds: usize,
    pub retention_days: i64,
    pub history_days: i64,
    pub seed: Option<u64>,
}

/// Statistics collected during a simulation run
#[derive(Clone, Debug)]
pub struct SimulationStats {
    pub records_seeded: usize,
    pub queries: usize,
    pub expected_deletes: usize,
    pub cycles: usize,
    pub deleted: u64,
    pub remaining: usize,
    pub seed_time: Duration,
    pub purge_time: Duration,
}

impl SimulationStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Purge Simulation Statistics                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Records Seeded:            {:>30} ║", self.records_seeded);
        println!("║  Retention Queries:         {:>30} ║", self.queries);
        println!("║  Expected Deletes:          {:>30} ║", self.expected_deletes);
        println!("║  Purge Cycles:              {:>30} ║", self.cycles);
        println!("║  Records Deleted:           {:>30} ║", self.deleted);
        println!("║  Records Remaining:         {:>30} ║", self.remaining);
        println!("║  Seed Time:                 {:>29}s ║", format!("{:.3}", self.seed_time.as_secs_f64()));
        println!("║  Purge Time:                {:>29}s ║", format!("{:.3}", self.purge_time.as_secs_f64()));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

fn world_name(index: usize) -> String {
    match index {
        0 => "world".to_string(),
        1 => "world_nether".to_string(),
        2 => "world_the_end".to_string(),
        n => format!("world_{}", n),
    }
}

/// Generator that yields random activities spread over the history window
fn activity_generator(
    params: SimulationParams,
    now: DateTime<Utc>,
) -> impl Stream<Item = (String, &'static str, i64)> {
    stream! {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let history_secs = ChronoDuration::days(params.history_days.max(1)).num_seconds();
        for _ in 0..params.records {
            let world = world_name(rng.gen_range(0..params.worlds.max(1)));
            let action = ACTIONS[rng.gen_range(0..ACTIONS.len())];
            let age = rng.gen_range(0..history_secs);
            yield (world, action, now.timestamp() - age);
        }
    }
}

/// Seed an in-memory store with random activity, then purge everything
/// older than the retention window, one query per world.
pub async fn run_simulation(
    params: SimulationParams,
    config: PurgeConfig,
) -> Result<SimulationStats, PurgeError> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Retention Purge Simulation                          ║");
    println!(
        "║  Records: {} | Worlds: {} | Retention: {}d | Limit: {} ║",
        params.records, params.worlds, params.retention_days, config.limit
    );
    println!("╚════════════════════════════════════════════════════════════╝");

    let store = Arc::new(MemoryActivityStore::new());
    let now = Utc::now();
    let cutoff = (now - ChronoDuration::days(params.retention_days)).timestamp();

    println!("\n[Phase 1/2] Seeding activity records...");
    let seed_start = Instant::now();

    let mut activities = Box::pin(activity_generator(params.clone(), now));
    let mut seeded = 0;
    while let Some((world, action, timestamp)) = activities.next().await {
        store.insert(world, action, timestamp);
        seeded += 1;

        if seeded % 1000 == 0 {
            println!("  Records seeded: {}/{}", seeded, params.records);
            tokio::task::yield_now().await;
        }
    }
    let seed_time = seed_start.elapsed();

    let queries: Vec<ActivityQuery> = (0..params.worlds.max(1))
        .map(|i| ActivityQuery::new().in_world(world_name(i)).before(cutoff))
        .collect();
    let expected_deletes: usize = queries.iter().map(|q| store.count_matching(q)).sum();

    println!("[Phase 1/2] ✓ Completed");
    println!("[Phase 2/2] Purging records older than {}...", cutoff);

    let (cycle_tx, mut cycle_rx) = mpsc::unbounded_channel();
    let (end_tx, mut end_rx) = mpsc::unbounded_channel::<PurgeResult>();
    let (error_tx, mut error_rx) = mpsc::unbounded_channel::<PurgeError>();

    let scheduler: Arc<dyn TaskScheduler> =
        Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
    let queue = PurgeQueue::builder(Arc::clone(&store), scheduler)
        .config(config)
        .on_cycle(move |cycle| {
            let _ = cycle_tx.send(cycle);
        })
        .on_end(move |result| {
            let _ = end_tx.send(result);
        })
        .on_error(move |err| {
            let _ = error_tx.send(err.clone());
        })
        .build()?;

    for query in queries.iter().cloned() {
        queue.add(query);
    }

    let purge_start = Instant::now();
    queue.start()?;

    let mut cycles = 0;
    let result = loop {
        tokio::select! {
            Some(cycle) = cycle_rx.recv() => {
                cycles += 1;
                println!(
                    "  Cycle {}: deleted {} (keys {}-{})",
                    cycles, cycle.deleted, cycle.min_primary_key, cycle.max_primary_key
                );
            }
            Some(result) = end_rx.recv() => break result,
            Some(err) = error_rx.recv() => return Err(err),
        }
    };

    // Cycle reports sent before the end signal
    while let Ok(cycle) = cycle_rx.try_recv() {
        cycles += 1;
        tracing::debug!(deleted = cycle.deleted, "Late cycle report");
    }

    println!("[Phase 2/2] ✓ Completed");

    Ok(SimulationStats {
        records_seeded: seeded,
        queries: queries.len(),
        expected_deletes,
        cycles,
        deleted: result.deleted,
        remaining: store.len(),
        seed_time,
        purge_time: purge_start.elapsed(),
    })
}
