use std::collections::{BTreeMap, VecDeque};

use log::{debug, info};

use crate::options::ExtrapolationMethodOption;
use crate::Error;

use super::{Configuration, ConfigurationSpace, Evidence, EvidenceHistory, TunerOptions, TuningStrategy};
use super::{extrapolate, fastest, no_evidence, empty_space};

/// Marker for configurations without a prediction
const PREDICTION_UNAVAILABLE: u64 = u64::MAX;

/// Predictive tuning: the time of each configuration in the next phase is
/// extrapolated from its measurements in previous phases, and only the
/// configurations predicted to be close to the optimum are measured.
///
/// Configurations are measured regardless of their prediction if they have
/// not enough history for a prediction, or if they were not measured for
/// `max_tuning_phases_without_test` phases.
#[derive(Debug, Clone)]
pub struct PredictiveTuning {
    space: ConfigurationSpace,
    method: ExtrapolationMethodOption,
    relative_optimum_range: f64,
    max_tuning_phases_without_test: usize,
    relative_blacklist_range: f64,
    evidence_first_prediction: usize,
    /// measurements from previous phases, in a window of
    /// `evidence_first_prediction` points per configuration
    history: EvidenceHistory,
    /// tuning phase in which each configuration was measured for the last
    /// time
    last_tested: BTreeMap<Configuration, usize>,
    /// predictions for the current phase
    predictions: BTreeMap<Configuration, u64>,
    /// configurations to measure in the current phase
    queue: VecDeque<Configuration>,
    /// measurements of the current phase
    measurements: BTreeMap<Configuration, u64>,
    tuning_phase: usize,
    /// Are all configurations measured in the current phase?
    testing_all: bool,
    blacklist_applied: bool,
}

impl PredictiveTuning {
    pub fn new(space: ConfigurationSpace, options: &TunerOptions) -> Result<PredictiveTuning, Error> {
        if !space.is_finite() {
            return Err(Error::InvalidParameter(
                "predictive tuning requires a finite set of cell size factors".into()
            ));
        }

        if !(options.relative_optimum_range >= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "relative_optimum_range must be at least 1, got {}", options.relative_optimum_range
            )));
        }

        if options.relative_blacklist_range != 0.0 && !(options.relative_blacklist_range >= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "relative_blacklist_range must be 0 or at least 1, got {}", options.relative_blacklist_range
            )));
        }

        if options.evidence_first_prediction < 2 {
            return Err(Error::InvalidParameter(format!(
                "evidence_first_prediction must be at least 2, got {}", options.evidence_first_prediction
            )));
        }

        Ok(PredictiveTuning {
            space: space,
            method: options.extrapolation_method,
            relative_optimum_range: options.relative_optimum_range,
            max_tuning_phases_without_test: options.max_tuning_phases_without_test,
            relative_blacklist_range: options.relative_blacklist_range,
            evidence_first_prediction: options.evidence_first_prediction,
            history: EvidenceHistory::new(options.evidence_first_prediction),
            last_tested: BTreeMap::new(),
            predictions: BTreeMap::new(),
            queue: VecDeque::new(),
            measurements: BTreeMap::new(),
            tuning_phase: 0,
            testing_all: false,
            blacklist_applied: false,
        })
    }

    /// Predict the time of `configuration` at `iteration`
    fn predict(&self, configuration: &Configuration, iteration: usize) -> u64 {
        let evidence = match self.history.get(configuration) {
            Some(evidence) if evidence.len() >= self.evidence_first_prediction => evidence,
            _ => return PREDICTION_UNAVAILABLE,
        };

        let points = evidence.iter()
            .map(|e| (e.iteration as f64, e.value as f64))
            .collect::<Vec<_>>();

        match extrapolate(self.method, &points, iteration as f64) {
            Some(value) => value.clamp(1.0, (PREDICTION_UNAVAILABLE - 1) as f64) as u64,
            None => PREDICTION_UNAVAILABLE,
        }
    }

    /// Remove configurations much slower than the optimum of the current
    /// phase from the search space
    fn apply_blacklist(&mut self) {
        self.blacklist_applied = true;
        let best = match self.measurements.values().min() {
            Some(&best) => best as f64,
            None => return,
        };

        let limit = best * self.relative_blacklist_range;
        let blacklisted = self.measurements.iter()
            .filter(|(_, &time)| time as f64 > limit)
            .map(|(&configuration, _)| configuration)
            .collect::<Vec<_>>();

        for configuration in &blacklisted {
            info!("blacklisting {}, slower than {} times the optimum", configuration, self.relative_blacklist_range);
            self.space.remove(configuration);
            self.history.remove(configuration);
            self.last_tested.remove(configuration);
        }
    }
}

impl TuningStrategy for PredictiveTuning {
    fn name(&self) -> &'static str {
        "predictive tuning"
    }

    fn reset(&mut self, iteration: usize, tuning_phase: usize) -> Result<(), Error> {
        self.tuning_phase = tuning_phase;
        self.measurements.clear();

        let configurations = self.space.configurations()?;
        if configurations.is_empty() {
            return Err(empty_space(self.name()));
        }

        self.predictions = configurations.iter()
            .map(|configuration| (*configuration, self.predict(configuration, iteration)))
            .collect();

        let optimum = self.predictions.values().copied().filter(|&p| p != PREDICTION_UNAVAILABLE).min();
        let optimum = match optimum {
            Some(optimum) => optimum as f64,
            None => {
                self.testing_all = true;
                self.queue = configurations.into();
                return Ok(());
            }
        };

        let limit = optimum * self.relative_optimum_range;
        self.queue = configurations.into_iter().filter(|configuration| {
            let prediction = self.predictions[configuration];
            if prediction == PREDICTION_UNAVAILABLE || prediction as f64 <= limit {
                return true;
            }

            let last_tested = self.last_tested.get(configuration).copied().unwrap_or(0);
            return tuning_phase.saturating_sub(last_tested) >= self.max_tuning_phases_without_test;
        }).collect();

        self.testing_all = self.queue.len() == self.predictions.len();
        debug!(
            "predictive tuning will test {} out of {} configurations in phase {}",
            self.queue.len(), self.predictions.len(), tuning_phase
        );

        return Ok(());
    }

    fn next_configuration(&mut self) -> Option<Configuration> {
        self.queue.front().copied()
    }

    fn add_evidence(&mut self, configuration: Configuration, evidence: Evidence) {
        self.queue.retain(|c| *c != configuration);
        self.measurements.insert(configuration, evidence.value);
        self.history.push(configuration, evidence);
        self.last_tested.insert(configuration, evidence.tuning_phase);

        let blacklist = self.relative_blacklist_range > 0.0 && !self.blacklist_applied;
        if self.queue.is_empty() && self.testing_all && blacklist {
            self.apply_blacklist();
        }
    }

    fn needs_more_tuning(&self) -> bool {
        !self.queue.is_empty()
    }

    fn optimum(&self) -> Result<Configuration, Error> {
        fastest(self.measurements.iter().map(|(c, &time)| (c, time)))
            .ok_or_else(|| no_evidence(self.name()))
    }

    fn reject_configuration(&mut self, configuration: &Configuration) -> Result<(), Error> {
        self.space.remove_category(configuration);
        let category = configuration.category();
        self.queue.retain(|c| c.category() != category);
        self.measurements.retain(|c, _| c.category() != category);
        self.predictions.retain(|c, _| c.category() != category);
        self.last_tested.retain(|c, _| c.category() != category);

        let removed = self.history.iter()
            .map(|(c, _)| *c)
            .filter(|c| c.category() == category)
            .collect::<Vec<_>>();
        for configuration in &removed {
            self.history.remove(configuration);
        }

        if self.space.is_empty() {
            return Err(empty_space(self.name()));
        }

        if self.queue.is_empty() && self.measurements.is_empty() {
            // every selected configuration was rejected, fall back to
            // measuring the remaining space in this phase
            debug!("no configuration left to measure in phase {}, testing all remaining ones", self.tuning_phase);
            self.queue = self.space.configurations()?.into();
            self.testing_all = true;
        }
        return Ok(());
    }

    fn search_space(&self) -> &ConfigurationSpace {
        &self.space
    }

    fn predictions(&self) -> Option<Vec<(Configuration, Option<u64>)>> {
        let predictions = self.predictions.iter().map(|(&configuration, &prediction)| {
            if prediction == PREDICTION_UNAVAILABLE {
                (configuration, None)
            } else {
                (configuration, Some(prediction))
            }
        });
        return Some(predictions.collect());
    }
}

#[cfg(test)]
mod tests {
    use crate::options::{ContainerOption, DataLayoutOption, Newton3Option, NumberSet, TraversalOption};

    use super::*;
    use super::super::SearchSpaceOptions;

    fn direct_sum_space() -> ConfigurationSpace {
        let options = SearchSpaceOptions {
            containers: [ContainerOption::DirectSum].into_iter().collect(),
            cell_size_factors: NumberSet::default(),
            ..Default::default()
        };
        ConfigurationSpace::new(&options).unwrap()
    }

    fn options() -> TunerOptions {
        TunerOptions {
            relative_optimum_range: 1.2,
            max_tuning_phases_without_test: 3,
            evidence_first_prediction: 2,
            extrapolation_method: ExtrapolationMethodOption::LinePrediction,
            ..Default::default()
        }
    }

    /// Times for the 4 direct sum configurations: aos newton3 is fast, soa
    /// newton3 is close to it, the others are much slower
    fn time(configuration: &Configuration) -> u64 {
        match (configuration.data_layout, configuration.newton3) {
            (DataLayoutOption::Aos, Newton3Option::Enabled) => 100,
            (DataLayoutOption::Soa, Newton3Option::Enabled) => 110,
            (DataLayoutOption::Aos, Newton3Option::Disabled) => 200,
            _ => 400,
        }
    }

    fn run_phase(strategy: &mut PredictiveTuning, phase: usize) -> Vec<Configuration> {
        strategy.reset(100 * phase, phase).unwrap();
        let mut measured = Vec::new();
        while let Some(configuration) = strategy.next_configuration() {
            let evidence = Evidence { iteration: 100 * phase + measured.len(), tuning_phase: phase, value: time(&configuration) };
            strategy.add_evidence(configuration, evidence);
            measured.push(configuration);
        }
        assert!(!strategy.needs_more_tuning());
        return measured;
    }

    #[test]
    fn only_test_close_to_optimum() {
        let mut strategy = PredictiveTuning::new(direct_sum_space(), &options()).unwrap();

        // not enough evidence for predictions in the first two phases
        assert_eq!(run_phase(&mut strategy, 0).len(), 4);
        assert!(strategy.predictions().unwrap().iter().all(|(_, p)| p.is_none()));
        assert_eq!(run_phase(&mut strategy, 1).len(), 4);

        let measured = run_phase(&mut strategy, 2);
        assert_eq!(measured.len(), 2);
        assert!(measured.iter().all(|c| c.newton3 == Newton3Option::Enabled));
        assert_eq!(strategy.optimum().unwrap().data_layout, DataLayoutOption::Aos);

        let predictions = strategy.predictions().unwrap();
        assert!(predictions.iter().all(|(_, p)| p.is_some()));

        // configurations untested for too long are tested again
        assert_eq!(run_phase(&mut strategy, 3).len(), 2);
        assert_eq!(run_phase(&mut strategy, 4).len(), 4);
    }

    #[test]
    fn blacklist() {
        let mut options = options();
        options.relative_blacklist_range = 1.5;
        let mut strategy = PredictiveTuning::new(direct_sum_space(), &options).unwrap();

        assert_eq!(run_phase(&mut strategy, 0).len(), 4);
        let space = strategy.search_space().configurations().unwrap();
        assert_eq!(space.len(), 2);
        assert!(space.iter().all(|c| time(c) <= 150));
    }

    #[test]
    fn reject_all_selected_configurations() {
        let mut strategy = PredictiveTuning::new(direct_sum_space(), &options()).unwrap();
        run_phase(&mut strategy, 0);
        run_phase(&mut strategy, 1);

        // only the two newton3 configurations are predicted to be fast
        strategy.reset(200, 2).unwrap();
        for _ in 0..2 {
            let configuration = strategy.next_configuration().unwrap();
            assert_eq!(configuration.newton3, Newton3Option::Enabled);
            strategy.reject_configuration(&configuration).unwrap();
        }

        // the remaining configurations are measured instead
        let mut measured = 0;
        while let Some(configuration) = strategy.next_configuration() {
            assert_eq!(configuration.newton3, Newton3Option::Disabled);
            let evidence = Evidence { iteration: 200 + measured, tuning_phase: 2, value: time(&configuration) };
            strategy.add_evidence(configuration, evidence);
            measured += 1;
        }
        assert_eq!(measured, 2);
        assert!(!strategy.needs_more_tuning());

        let optimum = strategy.optimum().unwrap();
        assert_eq!(optimum.data_layout, DataLayoutOption::Aos);
        assert_eq!(optimum.newton3, Newton3Option::Disabled);
    }

    #[test]
    fn invalid_options() {
        let mut options = options();
        options.relative_optimum_range = 0.5;
        assert!(PredictiveTuning::new(direct_sum_space(), &options).is_err());

        let mut options = self::options();
        options.evidence_first_prediction = 1;
        assert!(PredictiveTuning::new(direct_sum_space(), &options).is_err());

        let options = SearchSpaceOptions {
            containers: [ContainerOption::LinkedCells].into_iter().collect(),
            traversals: [TraversalOption::LcC08].into_iter().collect(),
            cell_size_factors: NumberSet::Interval { min: 1.0, max: 2.0 },
            ..Default::default()
        };
        let space = ConfigurationSpace::new(&options).unwrap();
        assert!(PredictiveTuning::new(space, &self::options()).is_err());
    }
}
