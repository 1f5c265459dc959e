//! Per-worker random number generation.
//!
//! Every random stage takes its generator as an explicit `&mut R` argument.
//! Callers that run samples on a pool of worker threads and do not want to
//! thread a generator through themselves can instead seed a thread-local
//! `StdRng` once per worker; [`with_worker_rng`] hands that generator out,
//! falling back to the thread RNG when the worker was never seeded.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::cell::RefCell;

thread_local! {
    /// Thread-local RNG for deterministic randomness in workers
    pub static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Seed formula: `base_seed + (epoch << 32) + worker_id`.
/// Distinct workers and epochs get distinct but reproducible streams.
pub fn worker_seed(worker_id: usize, epoch: usize, base_seed: u64) -> u64 {
    base_seed
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(worker_id as u64)
}

/// Seeds the calling thread's RNG for `worker_id` in `epoch`.
pub fn init_worker_rng(worker_id: usize, epoch: usize, base_seed: u64) {
    WORKER_RNG.with(|rng| {
        *rng.borrow_mut() = Some(StdRng::seed_from_u64(worker_seed(
            worker_id, epoch, base_seed,
        )));
    })
}

/// Drops the thread-local RNG; later draws use the thread RNG again.
pub fn reset_worker_rng() {
    WORKER_RNG.with(|rng| *rng.borrow_mut() = None);
}

/// Runs `f` with the worker RNG, or with the thread RNG if this thread was
/// never initialized. `f` must not call back into `with_worker_rng`.
pub fn with_worker_rng<T>(f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
    WORKER_RNG.with(|cell| {
        let mut slot = cell.borrow_mut();
        match slot.as_mut() {
            Some(rng) => f(rng),
            None => f(&mut rand::rng()),
        }
    })
}
