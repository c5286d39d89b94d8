use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::Error;

use super::{Configuration, ConfigurationSpace, Evidence, TuningStrategy};
use super::{fastest, no_evidence, empty_space};

/// Maximal number of attempts to draw a configuration which was not measured
/// yet in an infinite space
const MAX_SAMPLING_ATTEMPTS: usize = 1000;

/// Measure `max_evidence` configurations drawn uniformly at random from the
/// search space in each tuning phase, without repetition.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: ConfigurationSpace,
    rng: ChaCha8Rng,
    max_evidence: usize,
    current: Option<Configuration>,
    measurements: BTreeMap<Configuration, u64>,
}

impl RandomSearch {
    pub fn new(space: ConfigurationSpace, max_evidence: usize, seed: u64) -> Result<RandomSearch, Error> {
        if max_evidence == 0 {
            return Err(Error::InvalidParameter("max_evidence must be at least 1".into()));
        }

        Ok(RandomSearch {
            space: space,
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_evidence: max_evidence,
            current: None,
            measurements: BTreeMap::new(),
        })
    }

    /// Draw a configuration which was not measured in this phase
    fn sample(&mut self) -> Option<Configuration> {
        if self.space.is_finite() {
            let candidates = self.space.configurations().ok()?.into_iter()
                .filter(|c| !self.measurements.contains_key(c))
                .collect::<Vec<_>>();
            if candidates.is_empty() {
                return None;
            }
            return Some(candidates[self.rng.gen_range(0..candidates.len())]);
        }

        for _ in 0..MAX_SAMPLING_ATTEMPTS {
            let configuration = self.space.sample(&mut self.rng)?;
            if !self.measurements.contains_key(&configuration) {
                return Some(configuration);
            }
        }
        return None;
    }
}

impl TuningStrategy for RandomSearch {
    fn name(&self) -> &'static str {
        "random search"
    }

    fn reset(&mut self, _: usize, _: usize) -> Result<(), Error> {
        self.measurements.clear();
        self.current = None;
        if self.space.is_empty() {
            return Err(empty_space(self.name()));
        }
        return Ok(());
    }

    fn next_configuration(&mut self) -> Option<Configuration> {
        if self.current.is_none() && self.measurements.len() < self.max_evidence {
            self.current = self.sample();
        }
        return self.current;
    }

    fn add_evidence(&mut self, configuration: Configuration, evidence: Evidence) {
        self.measurements.insert(configuration, evidence.value);
        if self.current == Some(configuration) {
            self.current = None;
        }
    }

    fn needs_more_tuning(&self) -> bool {
        if self.measurements.len() >= self.max_evidence {
            return false;
        }

        if self.current.is_some() {
            return true;
        }

        return match self.space.len() {
            Some(size) => self.measurements.len() < size,
            None => true,
        };
    }

    fn optimum(&self) -> Result<Configuration, Error> {
        fastest(self.measurements.iter().map(|(c, &time)| (c, time)))
            .ok_or_else(|| no_evidence(self.name()))
    }

    fn reject_configuration(&mut self, configuration: &Configuration) -> Result<(), Error> {
        self.space.remove_category(configuration);
        let category = configuration.category();
        self.measurements.retain(|c, _| c.category() != category);
        if self.current.map_or(false, |c| c.category() == category) {
            self.current = None;
        }

        if self.space.is_empty() {
            return Err(empty_space(self.name()));
        }
        return Ok(());
    }

    fn search_space(&self) -> &ConfigurationSpace {
        &self.space
    }
}
