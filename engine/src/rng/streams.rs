//! Named, independent random streams.
//!
//! Every stochastic subsystem gets its own generator, spawned once from the
//! master seed. Keeping the streams separate means that adding a sample in
//! one subsystem (say, pipe friction decay) cannot shift the sequence seen
//! by another (say, pump lifetimes), a prerequisite for byte-identical
//! replay across code changes that only touch one subsystem.
//!
//! # Historical period
//!
//! When the simulated horizon ends inside the historical period, the
//! `pipes-lifetime` and `pumps-lifetime` streams do not sample at all: the
//! decommission dates of historical assets were already decided when the
//! input data was produced, so those two streams hand out a fixed constant
//! lifetime instead. This applies to exactly these two names.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::settings::{SimulationSettings, HISTORICAL_FIXED_LIFETIME};
use crate::rng::xorshift::Xorshift64Star;

/// The fixed set of named streams.
///
/// Requesting any other name is an error: stream names are part of the
/// reproducibility contract, not an open namespace.
pub const STREAM_NAMES: [&str; 7] = [
    "municipal-weights",
    "nrw-demand",
    "nrw-success",
    "demand-modulation",
    "pipes-friction-decay",
    "pipes-lifetime",
    "pumps-lifetime",
];

/// Streams that return a fixed lifetime during a historical-period run.
const HISTORICAL_LIFETIME_STREAMS: [&str; 2] = ["pipes-lifetime", "pumps-lifetime"];

/// Errors raised by stream lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Unknown random stream: {0}")]
    UnknownStream(String),
}

/// Centralized random stream management.
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::rng::RandomStreamManager;
///
/// let mut streams = RandomStreamManager::new(128);
/// let v1 = streams.get_mut("pipes-lifetime").unwrap().next_u64();
///
/// // Same master seed reproduces the same stream, independently of
/// // whatever the other streams were asked for in between.
/// let mut replay = RandomStreamManager::new(128);
/// replay.get_mut("nrw-success").unwrap().next_f64();
/// assert_eq!(replay.get_mut("pipes-lifetime").unwrap().next_u64(), v1);
/// ```
#[derive(Debug, Clone)]
pub struct RandomStreamManager {
    master_seed: u64,
    generators: BTreeMap<&'static str, Xorshift64Star>,
}

impl RandomStreamManager {
    /// Spawn one independent generator per known stream name.
    pub fn new(master_seed: u64) -> Self {
        let generators = STREAM_NAMES
            .iter()
            .map(|name| (*name, Xorshift64Star::new(spawn_seed(master_seed, name))))
            .collect();

        Self {
            master_seed,
            generators,
        }
    }

    /// Master seed this manager was spawned from.
    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Get the generator for a named stream.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Xorshift64Star, StreamError> {
        self.generators
            .get_mut(name)
            .ok_or_else(|| StreamError::UnknownStream(name.to_string()))
    }

    /// Get the lifetime sampler for a named lifetime stream, honoring the
    /// historical-period rule.
    pub fn lifetime_sampler(
        &mut self,
        name: &str,
        settings: &SimulationSettings,
    ) -> Result<LifetimeSampler<'_>, StreamError> {
        if settings.is_historical_period() && HISTORICAL_LIFETIME_STREAMS.contains(&name) {
            return Ok(LifetimeSampler::Fixed(HISTORICAL_FIXED_LIFETIME));
        }

        Ok(LifetimeSampler::Stream(self.get_mut(name)?))
    }
}

/// Derive a stream seed from the master seed and the stream name.
///
/// SHA-256 over (seed bytes || name) keeps the streams statistically
/// unrelated while staying a pure function of its inputs.
fn spawn_seed(master_seed: u64, name: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_le_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().unwrap())
}

/// Samples integer lifetimes for newly installed assets.
///
/// Either a real stream (uniform over the catalog option's bounds, lower
/// inclusive, upper exclusive) or the historical fixed constant.
#[derive(Debug)]
pub enum LifetimeSampler<'a> {
    /// Uniform sampling from a named stream
    Stream(&'a mut Xorshift64Star),
    /// Fixed lifetime (historical period replay)
    Fixed(u32),
}

impl LifetimeSampler<'_> {
    /// Sample a lifetime in `[bounds.0, bounds.1)` years.
    ///
    /// # Panics
    /// Panics if the bounds are inverted or empty.
    pub fn sample(&mut self, bounds: (u32, u32)) -> u32 {
        match self {
            LifetimeSampler::Stream(rng) => rng.range(bounds.0 as i64, bounds.1 as i64) as u32,
            LifetimeSampler::Fixed(value) => *value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stream_rejected() {
        let mut streams = RandomStreamManager::new(1);
        let err = streams.get_mut("solar-lifetime").unwrap_err();
        assert_eq!(err, StreamError::UnknownStream("solar-lifetime".to_string()));
    }

    #[test]
    fn test_streams_are_independent() {
        let mut a = RandomStreamManager::new(42);
        let mut b = RandomStreamManager::new(42);

        // Drain one stream heavily in `a` only; the others must not move.
        for _ in 0..100 {
            a.get_mut("nrw-demand").unwrap().next_u64();
        }

        assert_eq!(
            a.get_mut("pipes-lifetime").unwrap().next_u64(),
            b.get_mut("pipes-lifetime").unwrap().next_u64()
        );
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = RandomStreamManager::new(1);
        let mut b = RandomStreamManager::new(2);
        assert_ne!(
            a.get_mut("pumps-lifetime").unwrap().next_u64(),
            b.get_mut("pumps-lifetime").unwrap().next_u64()
        );
    }

    #[test]
    fn test_historical_period_returns_fixed_lifetime() {
        let settings = SimulationSettings::new(2000, 2024, 9);
        let mut streams = RandomStreamManager::new(9);

        let mut sampler = streams.lifetime_sampler("pipes-lifetime", &settings).unwrap();
        assert_eq!(sampler.sample((40, 60)), HISTORICAL_FIXED_LIFETIME);

        // Non-lifetime streams keep sampling even in the historical period.
        let mut other = streams.lifetime_sampler("nrw-success", &settings).unwrap();
        let sampled = other.sample((40, 60));
        assert!((40..60).contains(&sampled));
    }

    #[test]
    fn test_forward_run_samples_within_bounds() {
        let settings = SimulationSettings::new(2025, 2050, 9);
        let mut streams = RandomStreamManager::new(9);

        let mut sampler = streams.lifetime_sampler("pumps-lifetime", &settings).unwrap();
        for _ in 0..200 {
            let lifetime = sampler.sample((10, 15));
            assert!((10..15).contains(&lifetime));
        }
    }
}
