//! Seeded parameter fuzzer.
//!
//! Produces an endless, reproducible stream of [`JobConfig`]s from a
//! [`ParameterDomain`]. Each trial:
//! 1. picks a subset size `k` uniformly from `[1, m]` (`m` = domain size),
//! 2. picks `k` distinct parameter names without replacement,
//! 3. picks one candidate value for each chosen name (possibly `Unset`).
//!
//! Parameters not picked are absent from the config, so the job kind's own
//! defaults apply. The generator is owned by the fuzzer and seeded
//! explicitly; nothing else in the process can perturb the stream.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use cloudfuzz_types::{DomainError, JobConfig, JobKind, ParamValue, ParameterDomain};

/// Deterministic job-config generator.
///
/// Same `(domain, seed)` ⇒ same sequence. A failing trial is reproduced with
/// [`ParameterFuzzer::trial`].
#[derive(Debug, Clone)]
pub struct ParameterFuzzer {
    kind: JobKind,
    domain: ParameterDomain,
    seed: u64,
    rng: ChaCha8Rng,
    next_index: u64,
}

impl ParameterFuzzer {
    /// Create a fuzzer over a non-empty domain.
    pub fn new(kind: JobKind, domain: ParameterDomain, seed: u64) -> Result<Self, DomainError> {
        if domain.is_empty() {
            return Err(DomainError::EmptyDomain);
        }
        Ok(Self {
            kind,
            domain,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_index: 0,
        })
    }

    /// Seed this stream was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Index the next generated config will carry.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Job kind every generated config targets.
    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// Generate the next trial's config.
    pub fn next_config(&mut self) -> JobConfig {
        let params = self.sample();
        let index = self.next_index;
        self.next_index += 1;
        JobConfig::from_trial(self.kind.clone(), self.seed, index, params)
    }

    /// Rewind to trial 0.
    pub fn restart(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.next_index = 0;
    }

    /// Position the stream so the next config is trial `index`.
    ///
    /// Seeking backwards rewinds to trial 0 first.
    pub fn seek(&mut self, index: u64) {
        if index < self.next_index {
            self.restart();
        }
        while self.next_index < index {
            self.sample();
            self.next_index += 1;
        }
    }

    /// Reproduce the config of trial `index` without disturbing this stream.
    pub fn trial(&self, index: u64) -> JobConfig {
        let mut replay = self.clone();
        replay.seek(index);
        replay.next_config()
    }

    fn sample(&mut self) -> BTreeMap<String, ParamValue> {
        let m = self.domain.len();
        let k = self.rng.gen_range(1..=m);

        // Partial Fisher-Yates over insertion order: the first k slots end up
        // holding k distinct indices.
        let mut order: Vec<usize> = (0..m).collect();
        for i in 0..k {
            let j = self.rng.gen_range(i..m);
            order.swap(i, j);
        }

        let mut params = BTreeMap::new();
        for &idx in &order[..k] {
            if let Some((name, candidates)) = self.domain.entry(idx) {
                let pick = self.rng.gen_range(0..candidates.len());
                params.insert(name.to_string(), candidates[pick].clone());
            }
        }
        params
    }
}

impl Iterator for ParameterFuzzer {
    type Item = JobConfig;

    /// Never returns `None`; bound the trial count with `take`.
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_config())
    }
}
