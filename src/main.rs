mod backend;
mod configuration;
mod distribution;
mod memory;
mod procedures;
mod records;
mod run;
mod sharded_histogram;

use anyhow::Result;

use crate::backend::worker_gen;
use crate::memory::MemoryBackend;
use crate::procedures::ProcedureGenerator;
use crate::run::Worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = match configuration::parse_args(std::env::args())? {
        Some(config) => config,
        None => return Ok(()),
    };

    let store = MemoryBackend::new();
    let mut loader_session = store.session();
    let loaded =
        backend::load_records(&mut loader_session, config.n_subscriber_records, config.seed)
            .await?;
    tracing::info!(
        records = loaded,
        subscribers = config.n_subscriber_records,
        "database loaded"
    );

    let workers = (0..config.worker_count.get())
        .map(|i| {
            Worker::new(
                store.session(),
                ProcedureGenerator::new(config.n_subscriber_records, worker_gen(config.seed, i)),
            )
        })
        .collect();

    let report = run::run(workers, config.phases).await?;

    tracing::info!(
        success = report.counts.success,
        not_found = report.counts.not_found,
        conflict = report.counts.conflict,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "run finished"
    );
    if let Some(latency) = report.latency {
        tracing::info!(
            p50_us = latency.p50,
            p95_us = latency.p95,
            p99_us = latency.p99,
            max_us = latency.max,
            "call latency"
        );
    }
    println!("{}", report.throughput);

    Ok(())
}
