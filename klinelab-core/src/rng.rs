//! Deterministic seed derivation for the fallback forecaster.
//!
//! A master seed is expanded into one sub-seed per `(symbol, last candle
//! date)` via BLAKE3, so the same input series always draws the same noise.

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for a symbol's series ending at `last_date`.
    pub fn sub_seed(&self, symbol: &str, last_date: NaiveDate) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(&last_date.num_days_from_ce().to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, symbol: &str, last_date: NaiveDate) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(symbol, last_date))
    }
}
