use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::try_join_all;
use tokio::sync::Barrier;
use tokio::time::Instant;

use crate::backend::{Backend, Outcome};
use crate::configuration::Phases;
use crate::procedures::ProcedureGenerator;
use crate::sharded_histogram::{LatencySummary, ShardedHistogram};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Completed transactions by outcome class. All classes count toward
/// throughput; they are kept apart for the final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub success: u64,
    pub not_found: u64,
    pub conflict: u64,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::NotFound => self.not_found += 1,
            Outcome::ConstraintConflict => self.conflict += 1,
        }
    }

    fn add(&mut self, other: OutcomeCounts) {
        self.success += other.success;
        self.not_found += other.not_found;
        self.conflict += other.conflict;
    }

    pub fn completed(&self) -> u64 {
        self.success + self.not_found + self.conflict
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub counts: OutcomeCounts,
    pub elapsed: Duration,
    pub throughput: f64,
    pub latency: Option<LatencySummary>,
}

/// Coordination shared by the runner and all workers. The barriers separate
/// warmup from measurement and measurement from shutdown; everything else is
/// monotonic counters and flags.
struct PhaseSync {
    measure_start: Barrier,
    measure_end: Barrier,
    warmup_over: AtomicBool,
    measure_over: AtomicBool,
    measured_ops: AtomicU64,
    latencies: ShardedHistogram,
}

impl PhaseSync {
    fn new(worker_count: usize) -> Self {
        // The runner itself is the extra party at each barrier.
        Self {
            measure_start: Barrier::new(worker_count + 1),
            measure_end: Barrier::new(worker_count + 1),
            warmup_over: AtomicBool::new(false),
            measure_over: AtomicBool::new(false),
            measured_ops: AtomicU64::new(0),
            latencies: ShardedHistogram::for_latencies(),
        }
    }
}

/// One benchmark worker: a backend session plus its own procedure stream.
/// Procedures are strictly sequential within a worker; each call completes
/// before the next one is issued.
pub struct Worker<B> {
    backend: B,
    procedures: ProcedureGenerator,
}

impl<B: Backend> Worker<B> {
    pub fn new(backend: B, procedures: ProcedureGenerator) -> Self {
        Self {
            backend,
            procedures,
        }
    }

    /// Executes exactly one transaction and classifies its outcome.
    pub async fn run_one(&mut self) -> Result<Outcome> {
        let procedure = self.procedures.next_procedure();
        self.backend.execute(&procedure).await
    }

    async fn warmup(&mut self, phases: Phases, sync: &PhaseSync) -> Result<()> {
        match phases {
            Phases::Count { warmup, .. } => {
                for _ in 0..warmup {
                    self.run_one().await?;
                }
            }
            Phases::Duration { .. } => {
                while !sync.warmup_over.load(Ordering::Acquire) {
                    self.run_one().await?;
                    // Backends that complete without suspending would
                    // otherwise starve the runner's phase timer.
                    tokio::task::yield_now().await;
                }
            }
        }
        Ok(())
    }

    async fn measure_one(&mut self, sync: &PhaseSync, counts: &mut OutcomeCounts) -> Result<()> {
        let started = Instant::now();
        let outcome = self.run_one().await?;
        sync.latencies
            .record_micros(started.elapsed().as_micros() as u64);
        counts.record(outcome);
        sync.measured_ops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn measure(&mut self, phases: Phases, sync: &PhaseSync) -> Result<OutcomeCounts> {
        let mut counts = OutcomeCounts::default();
        match phases {
            Phases::Count { measure, .. } => {
                for _ in 0..measure {
                    self.measure_one(sync, &mut counts).await?;
                }
            }
            Phases::Duration { .. } => {
                // The flag is checked before each call, so only calls started
                // before the boundary are counted; at most one in-flight call
                // finishes past it.
                while !sync.measure_over.load(Ordering::Acquire) {
                    self.measure_one(sync, &mut counts).await?;
                    tokio::task::yield_now().await;
                }
            }
        }
        Ok(counts)
    }

    async fn run_phases(mut self, phases: Phases, sync: Arc<PhaseSync>) -> Result<OutcomeCounts> {
        // A worker that hits a fatal backend error still shows up at both
        // barriers, so the other parties are never left waiting on it.
        let mut fatal = self.warmup(phases, &sync).await.err();

        sync.measure_start.wait().await;

        let counts = if fatal.is_none() {
            match self.measure(phases, &sync).await {
                Ok(counts) => counts,
                Err(err) => {
                    fatal = Some(err);
                    OutcomeCounts::default()
                }
            }
        } else {
            OutcomeCounts::default()
        };

        sync.measure_end.wait().await;

        match fatal {
            Some(err) => Err(err),
            None => Ok(counts),
        }
    }
}

struct ProgressReporter {
    sync: Arc<PhaseSync>,
    previous_ops: u64,
    previous_report_time: Instant,
}

impl ProgressReporter {
    fn new(sync: Arc<PhaseSync>, start_time: Instant) -> Self {
        Self {
            sync,
            previous_ops: 0,
            previous_report_time: start_time,
        }
    }

    async fn wait_and_report(&mut self) {
        let next = self.previous_report_time + REPORT_INTERVAL;
        tokio::time::sleep_until(next).await;
        self.report(next);
    }

    fn report(&mut self, now: Instant) {
        let ops_done = self.sync.measured_ops.load(Ordering::Relaxed);
        let ops_delta = ops_done - self.previous_ops;
        let time_delta = now - self.previous_report_time;
        let rate = ops_delta as f64 / time_delta.as_secs_f64();

        tracing::info!(completed = ops_done, "{:.0} op/s", rate);

        self.previous_ops = ops_done;
        self.previous_report_time = now;
    }
}

async fn report_progress(sync: Arc<PhaseSync>, start_time: Instant) {
    let mut reporter = ProgressReporter::new(sync, start_time);
    loop {
        reporter.wait_and_report().await;
    }
}

/// Drives all workers through warmup and measurement and reports aggregate
/// throughput. The first fatal worker error fails the whole run.
pub async fn run<B>(workers: Vec<Worker<B>>, phases: Phases) -> Result<RunReport>
where
    B: Backend + Send + 'static,
{
    anyhow::ensure!(!workers.is_empty(), "at least one worker is required");

    let sync = Arc::new(PhaseSync::new(workers.len()));
    let mut handles = Vec::with_capacity(workers.len());
    for worker in workers {
        let sync = sync.clone();
        handles.push(tokio::spawn(worker.run_phases(phases, sync)));
    }

    if let Phases::Duration { warmup, .. } = phases {
        tokio::time::sleep(warmup).await;
        sync.warmup_over.store(true, Ordering::Release);
    }

    sync.measure_start.wait().await;
    let measure_start = Instant::now();
    let reporter = tokio::spawn(report_progress(sync.clone(), measure_start));

    let measure_end = match phases {
        Phases::Count { .. } => {
            sync.measure_end.wait().await;
            Instant::now()
        }
        Phases::Duration { measure, .. } => {
            tokio::time::sleep(measure).await;
            sync.measure_over.store(true, Ordering::Release);
            let boundary = Instant::now();
            sync.measure_end.wait().await;
            boundary
        }
    };
    reporter.abort();

    let mut counts = OutcomeCounts::default();
    for result in try_join_all(handles).await? {
        counts.add(result?);
    }

    let elapsed = measure_end - measure_start;
    let throughput = counts.completed() as f64 / elapsed.as_secs_f64();
    Ok(RunReport {
        counts,
        elapsed,
        throughput,
        latency: sync.latencies.summary_and_clear(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::worker_gen;
    use crate::procedures::Procedure;
    use crate::records::Record;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct StubBackend {
        outcome: Outcome,
        calls: Arc<AtomicU64>,
        fail_after: Option<u64>,
    }

    impl StubBackend {
        fn always(outcome: Outcome) -> Self {
            Self {
                outcome,
                calls: Arc::new(AtomicU64::new(0)),
                fail_after: None,
            }
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        async fn load(&mut self, _record: Record) -> Result<()> {
            Ok(())
        }

        async fn execute(&mut self, _procedure: &Procedure) -> Result<Outcome> {
            let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(limit) = self.fail_after {
                if calls > limit {
                    anyhow::bail!("backend went away after {} calls", limit);
                }
            }
            Ok(self.outcome)
        }
    }

    fn workers(backend: &StubBackend, count: usize) -> Vec<Worker<StubBackend>> {
        (0..count)
            .map(|i| {
                Worker::new(
                    backend.clone(),
                    ProcedureGenerator::new(1000, worker_gen(42, i)),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn count_mode_issues_exact_call_totals() {
        let backend = StubBackend::always(Outcome::Success);
        let report = run(
            workers(&backend, 4),
            Phases::Count {
                warmup: 1000,
                measure: 2000,
            },
        )
        .await
        .expect("run succeeds");

        assert_eq!(backend.calls.load(Ordering::Relaxed), 4 * (1000 + 2000));
        assert_eq!(report.counts.completed(), 8000);
        assert_eq!(report.counts.success, 8000);
        assert!(report.elapsed > Duration::from_secs(0));
        let expected = 8000.0 / report.elapsed.as_secs_f64();
        assert!((report.throughput - expected).abs() < 1e-6);
        let latency = report.latency.expect("latencies recorded");
        assert_eq!(latency.samples, 8000);
    }

    #[tokio::test]
    async fn conflicts_count_as_completed_but_not_as_successes() {
        let backend = StubBackend::always(Outcome::ConstraintConflict);
        let report = run(
            workers(&backend, 1),
            Phases::Count {
                warmup: 10,
                measure: 50,
            },
        )
        .await
        .expect("run succeeds");

        assert_eq!(report.counts.conflict, 50);
        assert_eq!(report.counts.success, 0);
        assert_eq!(report.counts.completed(), 50);
        assert!(report.throughput > 0.0);
    }

    #[tokio::test]
    async fn not_found_counts_as_completed() {
        let backend = StubBackend::always(Outcome::NotFound);
        let report = run(
            workers(&backend, 2),
            Phases::Count {
                warmup: 5,
                measure: 25,
            },
        )
        .await
        .expect("run succeeds");

        assert_eq!(report.counts.not_found, 50);
        assert_eq!(report.counts.completed(), 50);
    }

    #[tokio::test]
    async fn fatal_backend_error_fails_the_run_without_deadlock() {
        let mut backend = StubBackend::always(Outcome::Success);
        backend.fail_after = Some(5);
        let result = run(
            workers(&backend, 2),
            Phases::Count {
                warmup: 100,
                measure: 100,
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duration_mode_respects_the_measurement_window() {
        let backend = StubBackend::always(Outcome::Success);
        let report = run(
            workers(&backend, 2),
            Phases::Duration {
                warmup: Duration::from_millis(20),
                measure: Duration::from_millis(100),
            },
        )
        .await
        .expect("run succeeds");

        assert!(report.counts.completed() > 0);
        assert!(report.elapsed >= Duration::from_millis(100));
        assert!(report.throughput > 0.0);
    }
}
