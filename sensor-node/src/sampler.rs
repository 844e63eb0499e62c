//! Value sources for producers.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const TEMPERATURE_RANGE: Range<f64> = 20.0..30.0;
pub const HUMIDITY_RANGE: Range<f64> = 40.0..90.0;

pub trait Sampler: Send {
    fn sample(&mut self) -> f64;
}

/// Uniformly distributed values over a half-open range.
#[derive(Debug)]
pub struct UniformSampler {
    rng: StdRng,
    range: Range<f64>,
}

impl UniformSampler {
    pub fn new(range: Range<f64>) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            range,
        }
    }

    pub fn seeded(range: Range<f64>, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            range,
        }
    }
}

impl Sampler for UniformSampler {
    fn sample(&mut self) -> f64 {
        self.rng.gen_range(self.range.clone())
    }
}

/// Replays a fixed sequence of values, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    values: Vec<f64>,
    next: usize,
}

impl ScriptedSampler {
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let values = values.into();
        assert!(!values.is_empty(), "ScriptedSampler needs at least one value");
        Self { values, next: 0 }
    }
}

impl Sampler for ScriptedSampler {
    fn sample(&mut self) -> f64 {
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_range() {
        let mut sampler = UniformSampler::seeded(HUMIDITY_RANGE, 7);
        for _ in 0..10_000 {
            let v = sampler.sample();
            assert!((40.0..90.0).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn seeded_samplers_repeat() {
        let mut a = UniformSampler::seeded(TEMPERATURE_RANGE, 42);
        let mut b = UniformSampler::seeded(TEMPERATURE_RANGE, 42);
        for _ in 0..16 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn scripted_cycles() {
        let mut s = ScriptedSampler::new([1.0, 2.0]);
        let got: Vec<f64> = (0..5).map(|_| s.sample()).collect();
        assert_eq!(got, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    #[should_panic(expected = "at least one value")]
    fn scripted_rejects_empty_script() {
        ScriptedSampler::new(Vec::<f64>::new());
    }
}
