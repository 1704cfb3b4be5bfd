//! Random seeds that are deliberately reused across layers and batches.
//!
//! LABOR draws its per-source variates from a seed that stays fixed for
//! `batch_dependency` consecutive batches, so overlapping samples in that
//! window are positively correlated. The state rotates in a fresh seed on a
//! fixed cadence to bound how long the correlation lasts.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::error::{Result, SamplingError};

/// Seeds handed to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSeeds {
    pub seed: u64,
    /// Position of the batch in the sampler's lifetime.
    pub batch_index: u64,
}

impl BatchSeeds {
    /// Seed for sampling iteration `iteration` (0 = the layer nearest the
    /// output). With layer dependency every iteration shares the batch seed.
    pub fn layer_seed(&self, iteration: usize, layer_dependency: bool) -> u64 {
        if layer_dependency {
            self.seed
        } else {
            self.seed.wrapping_add(iteration as u64)
        }
    }

    /// Generator for node-level schemes at `iteration`.
    pub fn node_rng(&self, iteration: usize) -> Pcg64 {
        Pcg64::new(
            self.layer_seed(iteration, false) as u128,
            self.batch_index as u128,
        )
    }
}

/// Two seed slots, a batch counter, and the rotation period.
#[derive(Debug, Clone)]
pub struct CorrelationState {
    slots: [u64; 2],
    counter: u64,
    batch_dependency: u64,
    rng: Pcg64,
}

impl CorrelationState {
    /// State seeded from OS entropy.
    pub fn new(batch_dependency: u64) -> Result<Self> {
        Self::from_rng(batch_dependency, Pcg64::from_entropy())
    }

    /// Reproducible state: the same seed yields the same seed sequence.
    pub fn with_seed(batch_dependency: u64, seed: u64) -> Result<Self> {
        Self::from_rng(batch_dependency, Pcg64::seed_from_u64(seed))
    }

    fn from_rng(batch_dependency: u64, mut rng: Pcg64) -> Result<Self> {
        if batch_dependency == 0 {
            return Err(SamplingError::invalid_parameter(
                "batch_dependency must be at least 1",
            ));
        }
        let slots = [rng.gen(), rng.gen()];
        Ok(Self {
            slots,
            counter: 0,
            batch_dependency,
            rng,
        })
    }

    /// Seeds for the next batch, then advance the counter and rotate the
    /// slots whenever it reaches a multiple of the period.
    pub fn begin_batch(&mut self) -> BatchSeeds {
        let seeds = self.current_seeds();
        self.counter += 1;
        if self.counter % self.batch_dependency == 0 {
            self.slots[0] = self.slots[1];
            self.slots[1] = self.rng.gen();
            log::trace!(
                "rotated correlation seed after {} batches",
                self.counter
            );
        }
        seeds
    }

    /// Seeds the next call to [`begin_batch`](Self::begin_batch) will return.
    pub fn current_seeds(&self) -> BatchSeeds {
        BatchSeeds {
            seed: self.slots[0],
            batch_index: self.counter,
        }
    }

    pub fn batch_count(&self) -> u64 {
        self.counter
    }

    pub fn batch_dependency(&self) -> u64 {
        self.batch_dependency
    }
}

/// A [`CorrelationState`] shared by concurrent batch workers.
///
/// Every worker takes its seeds through the same lock, so batches observe one
/// consistent rotation order.
#[derive(Debug)]
pub struct SharedCorrelation {
    inner: Mutex<CorrelationState>,
}

impl SharedCorrelation {
    pub fn new(state: CorrelationState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    pub fn begin_batch(&self) -> BatchSeeds {
        self.inner.lock().begin_batch()
    }

    /// Reserve seeds for `count` consecutive batches in one critical section.
    pub fn begin_batches(&self, count: usize) -> Vec<BatchSeeds> {
        let mut state = self.inner.lock();
        (0..count).map(|_| state.begin_batch()).collect()
    }

    pub fn batch_count(&self) -> u64 {
        self.inner.lock().batch_count()
    }

    pub fn into_inner(self) -> CorrelationState {
        self.inner.into_inner()
    }
}

impl From<CorrelationState> for SharedCorrelation {
    fn from(state: CorrelationState) -> Self {
        Self::new(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_rotation_cadence() {
        let mut state = CorrelationState::with_seed(3, 17).unwrap();
        let seeds: Vec<u64> = (0..10).map(|_| state.begin_batch().seed).collect();

        // Windows {0,1,2} {3,4,5} {6,7,8} {9}
        for window in [&seeds[0..3], &seeds[3..6], &seeds[6..9]] {
            assert!(window.iter().all(|&s| s == window[0]));
        }
        assert_ne!(seeds[2], seeds[3]);
        assert_ne!(seeds[5], seeds[6]);
        assert_ne!(seeds[8], seeds[9]);
        assert_eq!(state.batch_count(), 10);
    }

    #[test]
    fn test_next_slot_is_promoted() {
        let mut state = CorrelationState::with_seed(2, 5).unwrap();
        let upcoming = state.slots[1];
        state.begin_batch();
        assert_eq!(state.current_seeds().seed, state.slots[0]);
        state.begin_batch();
        assert_eq!(state.current_seeds().seed, upcoming);
    }

    #[test]
    fn test_period_one_rotates_every_batch() {
        let mut state = CorrelationState::with_seed(1, 8).unwrap();
        let a = state.begin_batch();
        let b = state.begin_batch();
        assert_ne!(a.seed, b.seed);
        assert_eq!((a.batch_index, b.batch_index), (0, 1));
    }

    #[test]
    fn test_same_master_seed_same_sequence() {
        let mut a = CorrelationState::with_seed(2, 99).unwrap();
        let mut b = CorrelationState::with_seed(2, 99).unwrap();
        for _ in 0..6 {
            assert_eq!(a.begin_batch(), b.begin_batch());
        }
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(matches!(
            CorrelationState::with_seed(0, 1),
            Err(SamplingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_layer_seeds() {
        let seeds = BatchSeeds {
            seed: u64::MAX,
            batch_index: 0,
        };
        assert_eq!(seeds.layer_seed(0, false), u64::MAX);
        assert_eq!(seeds.layer_seed(1, false), 0);
        assert_eq!(seeds.layer_seed(1, true), u64::MAX);

        let mut a = seeds.node_rng(2);
        let mut b = seeds.node_rng(2);
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_shared_state_hands_out_each_batch_once() {
        let shared = Arc::new(SharedCorrelation::new(CorrelationState::with_seed(4, 3).unwrap()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || (0..25).map(|_| shared.begin_batch().batch_index).collect::<Vec<_>>())
            })
            .collect();
        let mut indices: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        indices.sort_unstable();

        assert_eq!(indices, (0..100).collect::<Vec<_>>());
        assert_eq!(shared.batch_count(), 100);
    }

    #[test]
    fn test_begin_batches_matches_sequential_calls() {
        let shared = SharedCorrelation::from(CorrelationState::with_seed(3, 21).unwrap());
        let mut sequential = CorrelationState::with_seed(3, 21).unwrap();

        let reserved = shared.begin_batches(7);
        let expected: Vec<BatchSeeds> = (0..7).map(|_| sequential.begin_batch()).collect();
        assert_eq!(reserved, expected);
        assert_eq!(shared.into_inner().batch_count(), 7);
    }
}
