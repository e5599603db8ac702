use anyhow::Result;
use async_trait::async_trait;

use crate::distribution::{seeded_gen, RngGen};
use crate::procedures::Procedure;
use crate::records::{Record, RecordGenerator};

/// Random stream index reserved for the loader; workers use `1..`.
pub const LOADER_STREAM: u64 = 0;

/// Classification of a completed transaction.
///
/// All three variants count toward throughput; only an `Err` from the backend
/// is fatal. `NotFound` covers the benchmark-accepted zero-row outcomes
/// (e.g. a destination query matching nothing, or a delete removing no row),
/// and `ConstraintConflict` covers a call-forwarding insert colliding with an
/// existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotFound,
    ConstraintConflict,
}

/// One session against the backing data store.
///
/// Each worker owns exactly one session; sessions are never shared. The
/// driver never interprets the store's query language and never retries:
/// expected non-success outcomes are reported as [`Outcome`] values and any
/// other failure is propagated as an error.
#[async_trait]
pub trait Backend {
    async fn load(&mut self, record: Record) -> Result<()>;
    async fn execute(&mut self, procedure: &Procedure) -> Result<Outcome>;
}

/// Worker stream index for the given worker position.
pub fn worker_gen(base_seed: u64, worker_index: usize) -> RngGen {
    seeded_gen(base_seed, worker_index as u64 + 1)
}

/// Persists the whole generated record stream, in sequence, through one
/// session. Returns the number of records loaded.
pub async fn load_records<B: Backend>(
    backend: &mut B,
    n_subscriber_records: u64,
    seed: u64,
) -> Result<u64> {
    let generator = RecordGenerator::new(n_subscriber_records, seeded_gen(seed, LOADER_STREAM));
    let mut loaded = 0;
    for record in generator {
        backend.load(record).await?;
        loaded += 1;
    }
    Ok(loaded)
}
