// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Bounded jitter so repeated strikes never sound identical.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniformly distributed values used to vary playback.
pub trait Randomizer: Send {
    /// Returns a value uniformly distributed in [low, high].
    fn between(&mut self, low: f32, high: f32) -> f32;

    /// Multiplies the base gain by a random factor in [low, high].
    fn jittered_gain(&mut self, base: f32, low: f32, high: f32) -> f32 {
        base * self.between(low, high)
    }

    /// Picks an index below len. len must be non-zero.
    fn pick(&mut self, len: usize) -> usize {
        let index = (self.between(0.0, 1.0) * len as f32) as usize;
        index.min(len.saturating_sub(1))
    }
}

/// The randomizer used for performances, optionally seeded for reproducible renders.
pub struct SeededRandomizer {
    rng: StdRng,
}

impl SeededRandomizer {
    /// Creates a randomizer. Without a seed, it is seeded from the operating system.
    pub fn new(seed: Option<u64>) -> SeededRandomizer {
        SeededRandomizer {
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }
}

impl Randomizer for SeededRandomizer {
    fn between(&mut self, low: f32, high: f32) -> f32 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

/// Always lands at the same fraction of the requested interval.
#[derive(Clone, Copy, Debug)]
pub struct FixedRandomizer {
    fraction: f32,
}

impl FixedRandomizer {
    /// Creates a fixed randomizer. The fraction is clamped to [0, 1]; 1.0 always yields `high`.
    pub fn new(fraction: f32) -> FixedRandomizer {
        FixedRandomizer {
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

impl Randomizer for FixedRandomizer {
    fn between(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.fraction
    }
}
