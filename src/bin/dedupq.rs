//! dedupq CLI: drive a queue with synthetic producers and a worker pool.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use dedupq::config::Config;
use dedupq::telemetry::{TelemetryConfig, init_telemetry};
use dedupq::worker::WorkerPool;
use dedupq::{DedupQueue, QueueConfig};
use parking_lot::Mutex;
use tracing::info;

#[derive(Parser)]
#[command(name = "dedupq", about = "Deduplicating work queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run producers and a worker pool against one queue, then drain it
    Run {
        /// Queue name (used in logs and metric attributes)
        #[arg(long, default_value = "demo")]
        name: String,
        /// Number of distinct keys producers cycle through
        #[arg(long, default_value_t = 16)]
        keys: usize,
        /// Concurrent producers
        #[arg(long, default_value_t = 2)]
        producers: usize,
        /// How many times each producer adds every key
        #[arg(long, default_value_t = 10)]
        rounds: usize,
        /// Simulated processing time per key, in milliseconds
        #[arg(long, default_value_t = 5)]
        work_ms: u64,
        /// Consumer threads (defaults to DEDUPQ_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "dedupq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Run {
            name,
            keys,
            producers,
            rounds,
            work_ms,
            workers,
        } => {
            let workers = workers.unwrap_or(config.workers);
            cmd_run(&config, name, keys, producers, rounds, work_ms, workers).await
        }
    }
}

async fn cmd_run(
    config: &Config,
    name: String,
    keys: usize,
    producers: usize,
    rounds: usize,
    work_ms: u64,
    workers: usize,
) -> anyhow::Result<()> {
    if keys == 0 {
        anyhow::bail!("--keys must be at least 1");
    }

    let queue = DedupQueue::with_config(
        QueueConfig::<String>::named(name)
            .unfinished_work_update_period(config.unfinished_work_update_period)
            .otel_metrics(),
    );

    let counts: Arc<Mutex<BTreeMap<String, u64>>> = Arc::default();
    let work = Duration::from_millis(work_ms);

    let pool = {
        let counts = Arc::clone(&counts);
        WorkerPool::spawn(&queue, workers, move |key: &String| {
            std::thread::sleep(work);
            *counts.lock().entry(key.clone()).or_default() += 1;
            Ok::<(), std::convert::Infallible>(())
        })?
    };

    let q = queue.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("interrupt received, draining queue");
        q.shut_down();
    });

    let started = Instant::now();
    let mut tasks = Vec::with_capacity(producers);
    for producer in 0..producers {
        let q = queue.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            for _ in 0..rounds {
                if q.is_shutting_down() {
                    break;
                }
                for k in 0..keys {
                    q.add(format!("key-{k:04}"));
                }
                std::thread::sleep(work);
            }
            info!(producer, "producer finished");
        }));
    }
    for task in tasks {
        task.await?;
    }

    let q = queue.clone();
    tokio::task::spawn_blocking(move || q.shut_down_with_drain()).await?;
    let stats = tokio::task::spawn_blocking(move || pool.join()).await??;

    let counts = counts.lock();
    println!("{:<10}  PROCESSED", "KEY");
    println!("{}", "-".repeat(21));
    for (key, n) in counts.iter() {
        println!("{key:<10}  {n}");
    }
    println!(
        "\n{} key(s), {} adds offered, {} processed, {} failed, {} panicked in {:.2?}",
        counts.len(),
        keys * producers * rounds,
        stats.processed,
        stats.failed,
        stats.panicked,
        started.elapsed()
    );
    Ok(())
}
