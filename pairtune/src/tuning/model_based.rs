use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::Error;

use super::configuration::Category;
use super::{Configuration, ConfigurationSpace, Evidence, TuningStrategy};
use super::{fastest, no_evidence, empty_space};

/// Number of random candidates evaluated by the acquisition function in
/// infinite search spaces
const NUMBER_OF_CANDIDATES: usize = 200;

/// Bandwidth of the gaussian kernel over cell size factors
const BANDWIDTH: f64 = 0.25;

/// Weight of the uncertainty in the lower confidence bound
const EXPLORATION_WEIGHT: f64 = 2.0;

/// Model based search: the time of each configuration is predicted with a
/// kernel regression over the cell size factor, separately for each
/// combination of container, traversal, data layout and Newton3 setting.
/// The next configuration to measure is the one minimizing the lower
/// confidence bound `mean - weight * uncertainty` of the prediction, which
/// favors both configurations predicted to be fast and configurations with
/// few measurements nearby.
#[derive(Debug, Clone)]
pub struct ModelBasedSearch {
    space: ConfigurationSpace,
    rng: ChaCha8Rng,
    max_evidence: usize,
    current: Option<Configuration>,
    measurements: BTreeMap<Configuration, u64>,
}

/// Prediction of the model for a single configuration
#[derive(Debug, Clone, Copy, PartialEq)]
struct Prediction {
    mean: f64,
    uncertainty: f64,
}

impl ModelBasedSearch {
    pub fn new(space: ConfigurationSpace, max_evidence: usize, seed: u64) -> Result<ModelBasedSearch, Error> {
        if max_evidence == 0 {
            return Err(Error::InvalidParameter("max_evidence must be at least 1".into()));
        }

        Ok(ModelBasedSearch {
            space: space,
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_evidence: max_evidence,
            current: None,
            measurements: BTreeMap::new(),
        })
    }

    /// Predict the time of `configuration` from the measurements of the
    /// current phase
    fn predict(&self, configuration: &Configuration) -> Prediction {
        let values = self.measurements.values().map(|&v| v as f64).collect::<Vec<_>>();
        let (prior_mean, prior_std) = if values.is_empty() {
            (0.0, 1.0)
        } else {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
            (mean, variance.sqrt().max(0.1 * mean).max(1.0))
        };

        let category = configuration.category();
        let mut weights = 0.0;
        let mut weighted = 0.0;
        for (other, &time) in &self.measurements {
            if other.category() != category {
                continue;
            }
            let delta = (configuration.cell_size_factor - other.cell_size_factor) / BANDWIDTH;
            let weight = f64::exp(-0.5 * delta * delta);
            weights += weight;
            weighted += weight * time as f64;
        }

        let mean = if weights > 1e-12 { weighted / weights } else { prior_mean };
        return Prediction {
            mean: mean,
            uncertainty: prior_std / f64::sqrt(1.0 + weights),
        };
    }

    /// Candidate configurations for the next measurement
    fn candidates(&mut self) -> Vec<Configuration> {
        let mut candidates = if self.space.is_finite() {
            self.space.configurations().unwrap_or_default()
        } else {
            let categories = self.space.categories().copied().collect::<Vec<Category>>();
            let mut candidates = Vec::with_capacity(NUMBER_OF_CANDIDATES);
            for i in 0..NUMBER_OF_CANDIDATES {
                let category = categories[i % categories.len()];
                let cell_size_factor = self.space.sample_cell_size_factor(category.0, &mut self.rng);
                candidates.push(Configuration::from_category(category, cell_size_factor));
            }
            candidates
        };

        candidates.retain(|c| !self.measurements.contains_key(c));
        return candidates;
    }

    /// Select the candidate with the lowest confidence bound
    fn acquire(&mut self) -> Option<Configuration> {
        let candidates = self.candidates();
        let mut best: Option<(f64, Configuration)> = None;
        for candidate in candidates {
            let prediction = self.predict(&candidate);
            let score = prediction.mean - EXPLORATION_WEIGHT * prediction.uncertainty;
            let better = match best {
                None => true,
                Some((best_score, best_configuration)) => {
                    score.total_cmp(&best_score).then_with(|| candidate.cmp(&best_configuration)).is_lt()
                }
            };
            if better {
                best = Some((score, candidate));
            }
        }
        return best.map(|(_, configuration)| configuration);
    }
}

impl TuningStrategy for ModelBasedSearch {
    fn name(&self) -> &'static str {
        "model based search"
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
            self.current = self.acquire();
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

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use approx::assert_relative_eq;

    use crate::options::{NumberSet, TraversalOption};

    use super::*;
    use super::super::tests::{linked_cells_space, run_phase, synthetic_time};

    #[test]
    fn kernel_regression() {
        let space = linked_cells_space(NumberSet::Interval { min: 0.5, max: 3.0 });
        let mut strategy = ModelBasedSearch::new(space, 10, 0).unwrap();
        strategy.reset(0, 0).unwrap();

        let configuration = strategy.next_configuration().unwrap();
        strategy.add_evidence(configuration, Evidence { iteration: 0, tuning_phase: 0, value: 500 });

        // a single measurement is predicted exactly at the same point
        let prediction = strategy.predict(&configuration);
        assert_relative_eq!(prediction.mean, 500.0);

        // uncertainty grows away from the measurement
        let mut far = configuration;
        far.cell_size_factor += 1.0;
        assert!(strategy.predict(&far).uncertainty > prediction.uncertainty);

        // other categories use the prior
        let mut other = configuration;
        other.traversal = if other.traversal == TraversalOption::LcC18 { TraversalOption::LcC08 } else { TraversalOption::LcC18 };
        other.newton3 = crate::options::Newton3Option::Enabled;
        assert_relative_eq!(strategy.predict(&other).mean, 500.0);
    }

    #[test]
    fn finite_space() {
        let space = linked_cells_space(NumberSet::Finite(vec![0.5, 1.0, 2.0]));
        let mut strategy = ModelBasedSearch::new(space, 12, 5).unwrap();
        let measured = run_phase(&mut strategy, 0);
        assert_eq!(measured.len(), 12);
        assert_eq!(measured.iter().collect::<BTreeSet<_>>().len(), 12);

        let optimum = strategy.optimum().unwrap();
        assert!(measured.iter().all(|c| synthetic_time(&optimum) <= synthetic_time(c)));
    }

    #[test]
    fn interval_space() {
        let space = linked_cells_space(NumberSet::Interval { min: 0.5, max: 2.0 });
        let mut strategy = ModelBasedSearch::new(space, 25, 5).unwrap();
        let measured = run_phase(&mut strategy, 0);
        assert_eq!(measured.len(), 25);
        assert!(measured.iter().all(|c| strategy.search_space().contains(c)));
    }
}
