//! Content selection policies
//!
//! The back-to-back bias and the pooled picks are routed through a
//! pluggable policy so the daily builder can be driven by a fixed
//! policy in tests. The default policy draws from a ChaCha8 generator
//! seeded from (channel, broadcast date), which makes a rebuild with
//! unchanged inputs reproduce the same schedule.

use chrono::{Datelike, NaiveDate};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::error::{SchedulerError, SchedulerResult};

/// Default run-length weights: (episodes in a row, weight).
///
/// Two-episode runs dominate; longer binge runs taper off quickly.
pub const DEFAULT_RUN_WEIGHTS: &[(u32, u32)] = &[(2, 80), (3, 10), (4, 5), (5, 3), (6, 2)];

/// Selection decisions the daily builder delegates
pub trait SelectionPolicy: Send {
    /// How many sequential episodes to air when a same-series run starts
    fn run_length(&mut self) -> u32;

    /// Episode index to jump to when a run ends (0-based)
    fn jump_index(&mut self, episode_count: usize) -> usize;

    /// Uniform pick from a pool of the given size (0-based)
    fn pick(&mut self, count: usize) -> usize;
}

// ============================================================================
// Weighted policy
// ============================================================================

/// Deterministic weighted policy seeded per (channel, date)
pub struct WeightedSelection {
    rng: ChaCha8Rng,
    lengths: Vec<u32>,
    dist: WeightedIndex<u32>,
}

impl WeightedSelection {
    /// Create a policy from explicit run-length weights and a seed
    pub fn new(weights: &[(u32, u32)], seed: u64) -> SchedulerResult<Self> {
        let lengths: Vec<u32> = weights.iter().map(|(len, _)| *len).collect();
        let dist = WeightedIndex::new(weights.iter().map(|(_, w)| *w)).map_err(|err| {
            SchedulerError::trigger_config("back_to_back_weights", err.to_string())
        })?;

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            lengths,
            dist,
        })
    }

    /// Policy for a channel's build of one broadcast date
    pub fn for_channel_day(
        weights: &[(u32, u32)],
        channel: &str,
        date: NaiveDate,
    ) -> SchedulerResult<Self> {
        Self::new(weights, seed_for(channel, date))
    }
}

impl SelectionPolicy for WeightedSelection {
    fn run_length(&mut self) -> u32 {
        self.lengths[self.dist.sample(&mut self.rng)]
    }

    fn jump_index(&mut self, episode_count: usize) -> usize {
        if episode_count <= 1 {
            return 0;
        }
        self.rng.gen_range(0..episode_count)
    }

    fn pick(&mut self, count: usize) -> usize {
        if count <= 1 {
            return 0;
        }
        self.rng.gen_range(0..count)
    }
}

/// Deterministic seed for a (channel, date) pair.
///
/// The day count keeps seeds unique across dates; the channel id is
/// folded in so channels sharing a date do not share a stream.
pub fn seed_for(channel: &str, date: NaiveDate) -> u64 {
    let mut seed = date.num_days_from_ce() as u64;
    for byte in channel.bytes() {
        seed = seed.wrapping_mul(31).wrapping_add(byte as u64);
    }
    seed
}

// ============================================================================
// Fixed policy (tests)
// ============================================================================

/// Policy with no randomness: fixed run length, always the first pick
#[derive(Debug, Clone)]
pub struct FixedSelection {
    run: u32,
}

impl FixedSelection {
    pub fn new(run: u32) -> Self {
        Self { run }
    }
}

impl SelectionPolicy for FixedSelection {
    fn run_length(&mut self) -> u32 {
        self.run
    }

    fn jump_index(&mut self, _episode_count: usize) -> usize {
        0
    }

    fn pick(&mut self, _count: usize) -> usize {
        0
    }
}
