//! Sharded prediction cache (spec §4.D): fingerprint -> (value, priors),
//! chunked by the low-order bits of the fingerprint so concurrent lookups
//! against different chunks never contend. Advisory only -- a miss or a
//! contended chunk simply falls through to a real predictor call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SLOTS_PER_CHUNK: usize = 4;
const MIN_RESET_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Slot {
    fingerprint: u64,
    occupied: bool,
    reserved: bool,
    value: f32,
    priors: Vec<f32>,
}

impl Slot {
    fn empty() -> Self {
        Self { fingerprint: 0, occupied: false, reserved: false, value: 0.5, priors: Vec::new() }
    }
}

struct Chunk {
    slots: Vec<Slot>,
    write_index: usize,
}

impl Chunk {
    fn new() -> Self {
        Self { slots: vec![Slot::empty(); SLOTS_PER_CHUNK], write_index: 0 }
    }

    fn find(&self, fingerprint: u64) -> Option<usize> {
        self.slots.iter().position(|slot| slot.occupied && slot.fingerprint == fingerprint)
    }
}

/// Returned by `reserve` so the caller can publish a predictor result
/// without rescanning the chunk. `None` from `reserve` means the chunk was
/// contended; the caller proceeds uncached.
pub struct ReservationHandle {
    chunk_index: usize,
    slot_index: usize,
    fingerprint: u64,
}

impl ReservationHandle {
    pub fn publish(self, cache: &PredictionCache, value: f32, priors: Vec<f32>) {
        let mut chunk = cache.chunks[self.chunk_index].lock().expect("prediction cache chunk poisoned");
        let slot = &mut chunk.slots[self.slot_index];

        slot.fingerprint = self.fingerprint;
        slot.occupied = true;
        slot.reserved = false;
        slot.value = value;
        slot.priors = priors;
    }
}

pub struct PredictionCache {
    chunks: Vec<Mutex<Chunk>>,
    mask: u64,
    last_reset: AtomicU64,
    epoch: Instant,
}

impl PredictionCache {
    /// `slot_count` is derived by the caller from `Config::cache_slot_count`;
    /// rounded up to a power of two chunk count so the fingerprint mask is a
    /// cheap `&`.
    pub fn new(slot_count: usize) -> Self {
        let chunk_count = (slot_count / SLOTS_PER_CHUNK).max(1).next_power_of_two();
        let chunks = (0..chunk_count).map(|_| Mutex::new(Chunk::new())).collect();

        Self { chunks, mask: (chunk_count as u64) - 1, last_reset: AtomicU64::new(0), epoch: Instant::now() }
    }

    fn chunk_index(&self, fingerprint: u64) -> usize {
        (fingerprint & self.mask) as usize
    }

    pub fn lookup(&self, fingerprint: u64) -> Option<(f32, Vec<f32>)> {
        let chunk_index = self.chunk_index(fingerprint);
        let chunk = self.chunks[chunk_index].lock().expect("prediction cache chunk poisoned");
        let slot_index = chunk.find(fingerprint)?;
        let slot = &chunk.slots[slot_index];

        Some((slot.value, slot.priors.clone()))
    }

    /// Reserves a slot to store `fingerprint`'s eventual prediction,
    /// evicting the oldest (circular write index) unreserved slot in the
    /// chunk. Returns `None` if every slot in the chunk is already reserved
    /// by another in-flight request.
    pub fn reserve(&self, fingerprint: u64) -> Option<ReservationHandle> {
        let chunk_index = self.chunk_index(fingerprint);
        let mut chunk = self.chunks[chunk_index].lock().expect("prediction cache chunk poisoned");

        if let Some(slot_index) = chunk.find(fingerprint) {
            return Some(ReservationHandle { chunk_index, slot_index, fingerprint });
        }

        let start = chunk.write_index;
        for offset in 0..chunk.slots.len() {
            let candidate = (start + offset) % chunk.slots.len();
            if !chunk.slots[candidate].reserved {
                chunk.slots[candidate].reserved = true;
                chunk.write_index = (candidate + 1) % chunk.slots.len();
                return Some(ReservationHandle { chunk_index, slot_index: candidate, fingerprint });
            }
        }

        None
    }

    /// Empties every chunk, throttled so a burst of configuration changes
    /// cannot thrash the cache more than once per `MIN_RESET_INTERVAL`.
    pub fn reset(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_reset.load(Ordering::Relaxed);

        if now.saturating_sub(last) < MIN_RESET_INTERVAL.as_millis() as u64 {
            return;
        }

        if self.last_reset.compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed).is_err() {
            return;
        }

        for chunk in &self.chunks {
            let mut chunk = chunk.lock().expect("prediction cache chunk poisoned");
            *chunk = Chunk::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_reserved_value() {
        let cache = PredictionCache::new(64);
        let handle = cache.reserve(42).expect("fresh cache should never be contended");
        handle.publish(&cache, 0.75, vec![0.1, 0.2, 0.7]);

        let (value, priors) = cache.lookup(42).expect("value should be present after publish");
        assert_eq!(value, 0.75);
        assert_eq!(priors, vec![0.1, 0.2, 0.7]);
    }

    #[test]
    fn miss_on_unknown_fingerprint() {
        let cache = PredictionCache::new(64);
        assert!(cache.lookup(999).is_none());
    }

    #[test]
    fn reserve_is_idempotent_for_the_same_fingerprint() {
        let cache = PredictionCache::new(64);
        let first = cache.reserve(7).unwrap();
        let second = cache.reserve(7).unwrap();
        first.publish(&cache, 0.6, vec![1.0]);

        let (value, _) = cache.lookup(7).unwrap();
        assert_eq!(value, 0.6);

        // second handle targets the same slot, so publishing through it
        // just overwrites with the same fingerprint rather than corrupting
        // another entry.
        second.publish(&cache, 0.6, vec![1.0]);
        assert_eq!(cache.lookup(7).unwrap().0, 0.6);
    }

    #[test]
    fn eviction_is_circular_within_a_chunk() {
        // slot_count of SLOTS_PER_CHUNK forces a single chunk, so filling
        // it past capacity exercises the circular write index.
        let cache = PredictionCache::new(SLOTS_PER_CHUNK);

        for i in 0..(SLOTS_PER_CHUNK as u64 * 2) {
            let fingerprint = i * (cache.mask + 1);
            let handle = cache.reserve(fingerprint).expect("single chunk always has room once evicted");
            handle.publish(&cache, 0.5, vec![]);
        }
    }
}
