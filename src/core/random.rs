//! Random number port used by every loot roll, damage roll and giveaway draw.

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// Produces uniformly distributed floats in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    /// Next draw in `[0, 1)`.
    fn next_f64(&self) -> f64;
}

/// Inclusive integer draw: `floor(r * (max - min + 1)) + min`.
///
/// Both bounds are floored first. A reversed range collapses to `min`.
#[must_use]
pub fn uniform_int(rng: &dyn RandomSource, min: f64, max: f64) -> i64 {
    let low = min.floor();
    let high = max.floor();
    if high < low {
        #[allow(clippy::cast_possible_truncation)]
        return low as i64;
    }
    // Ranges are small game constants; truncation is the intended floor.
    #[allow(clippy::cast_possible_truncation)]
    let value = (rng.next_f64() * (high - low + 1.0)).floor() + low;
    #[allow(clippy::cast_possible_truncation)]
    let value = value.min(high) as i64;
    value
}

/// Thread-local RNG from `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }
}

/// Deterministic RNG seeded once, for reproducible simulations.
#[derive(Debug)]
pub struct SeededRandom {
    inner: Mutex<StdRng>,
}

impl SeededRandom {
    /// Creates a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        match self.inner.lock() {
            Ok(mut rng) => rng.r#gen::<f64>(),
            Err(poisoned) => poisoned.into_inner().r#gen::<f64>(),
        }
    }
}

/// Always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Cycles through a fixed list of draws.
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

impl SequenceRandom {
    /// Creates a source that replays `values` forever. An empty list yields 0.
    #[must_use]
    pub const fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.values.len();
        self.values[index]
    }
}
