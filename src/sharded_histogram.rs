use std::sync::Arc;

use histogram::Histogram;
use parking_lot::{Mutex, MutexGuard};
use thread_local::ThreadLocal;

/// Percentiles of the combined latency histogram, in microseconds.
#[derive(Debug, Clone, Copy)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
}

/// A sharded latency histogram.
///
/// Workers record into a per-thread shard, each behind its own
/// parking_lot::Mutex; since the combined view is read once at the end of the
/// run, the shard locks are uncontended on the hot path. Reading locks the
/// shards one at a time and merges them into a single histogram.
pub struct ShardedHistogram {
    shards: ThreadLocal<Arc<Mutex<Histogram>>>,
    all: Mutex<Vec<Arc<Mutex<Histogram>>>>,
    config: histogram::Config,
}

impl ShardedHistogram {
    pub fn new(config: histogram::Config) -> Self {
        Self {
            shards: ThreadLocal::new(),
            all: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Histogram sized for call latencies: microsecond values up to a minute.
    pub fn for_latencies() -> Self {
        Self::new(Histogram::configure().max_value(60_000_000))
    }

    pub fn record_micros(&self, micros: u64) {
        let _ = self.get_shard_mut().increment(micros.max(1));
    }

    fn get_shard_mut(&self) -> MutexGuard<'_, Histogram> {
        self.shards
            .get_or(|| {
                let shard = Arc::new(Mutex::new(self.config.build().unwrap()));
                self.all.lock().push(shard.clone());
                shard
            })
            .lock()
    }

    /// Merges all shards and reports percentiles; `None` before any sample
    /// was recorded. The shards are cleared in the process.
    pub fn summary_and_clear(&self) -> Option<LatencySummary> {
        let mut combined = self.config.build().unwrap();
        for shard in self.all.lock().iter() {
            let shard = &mut shard.lock();
            combined.merge(shard);
            shard.clear();
        }
        if combined.entries() == 0 {
            return None;
        }
        Some(LatencySummary {
            samples: combined.entries(),
            p50: combined.percentile(50.0).unwrap_or(0),
            p95: combined.percentile(95.0).unwrap_or(0),
            p99: combined.percentile(99.0).unwrap_or(0),
            max: combined.maximum().unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_orders_percentiles() {
        let hist = ShardedHistogram::for_latencies();
        for micros in 1..=1000u64 {
            hist.record_micros(micros);
        }
        let summary = hist.summary_and_clear().expect("samples recorded");
        assert_eq!(summary.samples, 1000);
        assert!(summary.p50 <= summary.p95);
        assert!(summary.p95 <= summary.p99);
        assert!(summary.p99 <= summary.max);
        // Cleared by the read.
        assert!(hist.summary_and_clear().is_none());
    }

    #[test]
    fn zero_latency_is_clamped_into_range() {
        let hist = ShardedHistogram::for_latencies();
        hist.record_micros(0);
        let summary = hist.summary_and_clear().expect("sample recorded");
        assert_eq!(summary.samples, 1);
    }
}
