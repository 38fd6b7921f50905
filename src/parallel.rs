//! Worker-pool sizing, iteration chunking, per-worker RNG seeding and
//! cooperative cancellation shared by the equity engine and bulk solver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{GtoError, GtoResult};

/// Iterations a chunk runs between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u32 = 1024;

/// Shared flag the job layer flips to stop a running call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> GtoResult<()> {
        if self.is_cancelled() {
            Err(GtoError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

/// Roughly 75% of the cores, kept within [2, 12].
pub fn multi_hand_workers() -> usize {
    (available_cores() * 3 / 4).clamp(2, 12)
}

/// `min(cores, 8)` for single-hero estimated equity.
pub fn estimate_workers() -> usize {
    available_cores().min(8)
}

/// Splits `total` into `workers` near-equal parts; the first
/// `total % workers` parts get one extra iteration. Empty parts are dropped.
pub fn chunk_iterations(total: u32, workers: usize) -> Vec<u32> {
    let workers = workers.max(1) as u32;
    let base = total / workers;
    let extra = total % workers;
    (0..workers)
        .map(|i| base + u32::from(i < extra))
        .filter(|&n| n > 0)
        .collect()
}

/// Independent RNG for one chunk. With a seed, chunk streams are distinct
/// but reproducible; without one, each chunk draws from OS entropy.
pub fn chunk_rng(seed: Option<u64>, chunk: usize) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s ^ (chunk as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_entropy(),
    }
}

pub fn build_pool(workers: usize) -> GtoResult<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?)
}
