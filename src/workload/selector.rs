use std::collections::BTreeSet;

use rand::Rng;

use crate::TxnLabError;

/// Hot/cold partition of the key space.
///
/// A draw lands in the hot set (`[0, hotset_size)`) with
/// `hotset_probability`, otherwise anywhere in `[0, total_keys)`. Skewing
/// the hot set up or down is how a workload dials contention.
#[derive(Debug, Clone)]
pub struct ContentionConfig {
    pub total_keys: usize,
    pub hotset_size: usize,
    pub hotset_probability: f64,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            total_keys: 1000,
            hotset_size: 10,
            hotset_probability: 0.5,
        }
    }
}

impl ContentionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_keys(mut self, n: usize) -> Self {
        self.total_keys = n;
        self
    }

    pub fn hotset_size(mut self, n: usize) -> Self {
        self.hotset_size = n;
        self
    }

    pub fn hotset_probability(mut self, p: f64) -> Self {
        self.hotset_probability = p;
        self
    }

    /// Reject configurations the selector cannot serve. `max_input_keys` is
    /// the largest distinct-key request any template will make; asking for
    /// more distinct keys than exist would loop forever.
    pub fn validate(&self, max_input_keys: usize) -> Result<(), TxnLabError> {
        if self.total_keys == 0 {
            return Err(TxnLabError::Config("total_keys must be at least 1".into()));
        }
        if self.hotset_size == 0 || self.hotset_size > self.total_keys {
            return Err(TxnLabError::Config(format!(
                "hotset_size must be in 1..={}, got {}",
                self.total_keys, self.hotset_size
            )));
        }
        if !(0.0..=1.0).contains(&self.hotset_probability) {
            return Err(TxnLabError::Config(format!(
                "hotset_probability must be in [0, 1], got {}",
                self.hotset_probability
            )));
        }
        if max_input_keys > self.total_keys {
            return Err(TxnLabError::Config(format!(
                "a template needs {max_input_keys} distinct keys but only {} exist",
                self.total_keys
            )));
        }
        Ok(())
    }
}

/// Draws keys against a validated [`ContentionConfig`] using a
/// caller-supplied PRNG, so each worker thread owns its own generator.
#[derive(Debug, Clone)]
pub struct KeySelector {
    config: ContentionConfig,
}

pub fn account_key(index: usize) -> String {
    format!("account_{index}")
}

impl KeySelector {
    pub fn new(config: ContentionConfig) -> Self {
        Self { config }
    }

    pub fn select_key<R: Rng>(&self, rng: &mut R) -> String {
        let index = if rng.gen::<f64>() < self.config.hotset_probability {
            rng.gen_range(0..self.config.hotset_size)
        } else {
            rng.gen_range(0..self.config.total_keys)
        };
        account_key(index)
    }

    /// Draw until `n` distinct keys are collected; returned in ascending key
    /// order.
    pub fn select_distinct<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<String> {
        let mut keys = BTreeSet::new();
        while keys.len() < n {
            keys.insert(self.select_key(rng));
        }
        keys.into_iter().collect()
    }
}
