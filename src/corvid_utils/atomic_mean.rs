//! A weighted running mean with a cap, packed into a single `AtomicU64` so
//! that the mean and its weight are always observed and updated together --
//! splitting them into two atomics (as a literal reading of the node layout
//! would suggest) lets a reader see a mean computed against a weight that
//! hasn't been published yet, or vice versa.

use std::sync::atomic::{AtomicU64, Ordering};

fn pack(mean: f32, weight: i32) -> u64 {
    ((mean.to_bits() as u64) << 32) | (weight as u32 as u64)
}

fn unpack(bits: u64) -> (f32, i32) {
    let mean = f32::from_bits((bits >> 32) as u32);
    let weight = (bits & 0xffff_ffff) as u32 as i32;
    (mean, weight)
}

#[derive(Debug)]
pub struct AtomicMean(AtomicU64);

impl AtomicMean {
    pub fn new(initial_mean: f32) -> Self {
        Self(AtomicU64::new(pack(initial_mean, 0)))
    }

    pub fn load(&self, order: Ordering) -> (f32, i32) {
        unpack(self.0.load(order))
    }

    /// Folds `sample` into the running mean with weight `k`, growing the
    /// stored weight by `k` up to `cap`. The *denominator* used for the
    /// mean update plateaus at `build` even if the stored weight keeps
    /// climbing toward `cap` -- below `build` samples the mean behaves as a
    /// plain running average, beyond it as an exponential one, so a few
    /// early evaluations aren't washed out by later noise while the tree is
    /// still shallow.
    pub fn update(&self, sample: f32, k: i32, build: i32, cap: i32) -> (f32, i32) {
        debug_assert!(k > 0);

        loop {
            let old = self.0.load(Ordering::Acquire);
            let (old_mean, old_weight) = unpack(old);

            let new_weight = (old_weight + k).min(cap);
            let denom = new_weight.min(build).max(1);
            let new_mean = old_mean + (k as f32) * (sample - old_mean) / (denom as f32);

            let new = pack(new_mean, new_weight);

            if self.0.compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                return (new_mean, new_weight);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_towards_repeated_sample() {
        let mean = AtomicMean::new(0.5);

        for _ in 0..50 {
            mean.update(1.0, 1, 8, 64);
        }

        let (value, weight) = mean.load(Ordering::Acquire);
        assert!(value > 0.99, "expected convergence close to 1.0, got {}", value);
        assert_eq!(weight, 64);
    }

    #[test]
    fn weight_never_exceeds_cap() {
        let mean = AtomicMean::new(0.0);

        for _ in 0..1000 {
            mean.update(0.3, 3, 10, 20);
        }

        let (_, weight) = mean.load(Ordering::Acquire);
        assert_eq!(weight, 20);
    }

    #[test]
    fn stays_within_unit_interval_for_unit_samples() {
        let mean = AtomicMean::new(0.5);

        for i in 0..20 {
            let sample = if i % 2 == 0 { 1.0 } else { 0.0 };
            mean.update(sample, 1, 8, 32);
        }

        let (value, _) = mean.load(Ordering::Acquire);
        assert!((0.0..=1.0).contains(&value));
    }
}
