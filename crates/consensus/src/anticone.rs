//! Anticone-size bound (the PHANTOM `k` parameter) derived from network timing.
//!
//! Blocks created within one propagation delay of each other end up in each
//! other's anticone. With block creation modelled as a Poisson process, the
//! smallest `k` whose tail probability `P[X > k]` falls below the security
//! level is the bound honest blocks are expected to respect.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Upper bound on network propagation delay, in seconds.
pub const BLOCK_DELAY_SECS: f64 = 15.0;
/// Accepted probability that an honest block exceeds the bound.
pub const SECURITY_LEVEL: f64 = 0.01;
/// Returned when no `k` below it satisfies the security level.
pub const MAX_ANTICONE_SIZE: u32 = 1000;

const TAIL_TERMS: u32 = 99;

/// Smallest `k` such that the Poisson tail beyond `k` is below `security_level`.
///
/// `block_rate` is blocks per second. The Poisson mean is
/// `2 * block_delay * block_rate`: a block's anticone collects blocks mined up
/// to one delay before and after it.
pub fn anticone_bound(block_delay: f64, block_rate: f64, security_level: f64) -> u32 {
    let mean = 2.0 * block_delay * block_rate;
    let base = (-mean).exp();

    for k in 0..MAX_ANTICONE_SIZE {
        // P[X = k + 1]
        let mut term = base;
        for j in 1..=k + 1 {
            term *= mean / f64::from(j);
        }

        let mut tail = 0.0;
        for j in (k + 1)..(k + 1 + TAIL_TERMS) {
            tail += term;
            term *= mean / f64::from(j + 1);
        }

        if tail < security_level {
            return k;
        }
    }

    MAX_ANTICONE_SIZE
}

/// Memoising front for [`anticone_bound`].
#[derive(Debug, Default)]
pub struct AnticoneEstimator {
    cache: Mutex<HashMap<(u64, u64, u64), u32>>,
}

impl AnticoneEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bound(&self, block_delay: f64, block_rate: f64, security_level: f64) -> u32 {
        let key = (
            block_delay.to_bits(),
            block_rate.to_bits(),
            security_level.to_bits(),
        );
        *self
            .cache
            .lock()
            .entry(key)
            .or_insert_with(|| anticone_bound(block_delay, block_rate, security_level))
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }
}
