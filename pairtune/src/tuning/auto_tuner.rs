use std::time::Duration;

use log::{debug, info, warn};

use crate::options::{ExtrapolationMethodOption, TuningStrategyOption};
use crate::Error;

use super::{Configuration, ConfigurationSpace, Evidence, TuningStrategy};
use super::{FullSearch, RandomSearch, ModelBasedSearch, PredictiveTuning};
use super::{TuningResultLogger, PredictionLogger};

fn default_tuning_interval() -> usize { 100 }
fn default_num_samples() -> usize { 3 }
fn default_max_evidence() -> usize { 10 }
fn default_relative_optimum_range() -> f64 { 1.2 }
fn default_max_tuning_phases_without_test() -> usize { 5 }
fn default_evidence_first_prediction() -> usize { 3 }
fn default_extrapolation_method() -> ExtrapolationMethodOption { ExtrapolationMethodOption::LinePrediction }
fn default_seed() -> u64 { 42 }

/// Parameters of the auto-tuner
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TunerOptions {
    /// Strategy used to explore the search space
    #[serde(default)]
    pub strategy: TuningStrategyOption,
    /// Number of iterations between the end of a tuning phase and the start
    /// of the next one
    #[serde(default = "default_tuning_interval")]
    pub tuning_interval: usize,
    /// Number of measurements for each configuration in a tuning phase,
    /// the fastest one is used as evidence
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    /// Maximal number of configurations measured in a tuning phase by the
    /// random and model based strategies
    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,
    /// Predictive tuning measures configurations predicted to be within this
    /// factor of the best prediction
    #[serde(default = "default_relative_optimum_range")]
    pub relative_optimum_range: f64,
    /// Predictive tuning measures configurations not measured for this many
    /// tuning phases, regardless of their prediction
    #[serde(default = "default_max_tuning_phases_without_test")]
    pub max_tuning_phases_without_test: usize,
    /// Predictive tuning removes configurations slower than this factor of
    /// the optimum after the first phase. Use 0 to disable.
    #[serde(default)]
    pub relative_blacklist_range: f64,
    /// Number of past measurements needed for predictive tuning to make a
    /// prediction
    #[serde(default = "default_evidence_first_prediction")]
    pub evidence_first_prediction: usize,
    /// Extrapolation method used by predictive tuning
    #[serde(default = "default_extrapolation_method")]
    pub extrapolation_method: ExtrapolationMethodOption,
    /// Seed for the random number generators of the random and model based
    /// strategies
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TuningStrategyOption {
    fn default() -> TuningStrategyOption {
        TuningStrategyOption::FullSearch
    }
}

impl Default for TunerOptions {
    fn default() -> TunerOptions {
        TunerOptions {
            strategy: TuningStrategyOption::default(),
            tuning_interval: default_tuning_interval(),
            num_samples: default_num_samples(),
            max_evidence: default_max_evidence(),
            relative_optimum_range: default_relative_optimum_range(),
            max_tuning_phases_without_test: default_max_tuning_phases_without_test(),
            relative_blacklist_range: 0.0,
            evidence_first_prediction: default_evidence_first_prediction(),
            extrapolation_method: default_extrapolation_method(),
            seed: default_seed(),
        }
    }
}

impl TunerOptions {
    fn validate(&self) -> Result<(), Error> {
        if self.num_samples == 0 {
            return Err(Error::InvalidParameter("num_samples must be at least 1".into()));
        }
        return Ok(());
    }
}

/// Create the tuning strategy requested in `options`, exploring `space`
pub fn create_strategy(options: &TunerOptions, space: ConfigurationSpace) -> Result<Box<dyn TuningStrategy>, Error> {
    let strategy: Box<dyn TuningStrategy> = match options.strategy {
        TuningStrategyOption::FullSearch => Box::new(FullSearch::new(space)?),
        TuningStrategyOption::RandomSearch => {
            Box::new(RandomSearch::new(space, options.max_evidence, options.seed)?)
        }
        TuningStrategyOption::ModelBased => {
            Box::new(ModelBasedSearch::new(space, options.max_evidence, options.seed)?)
        }
        TuningStrategyOption::PredictiveTuning => Box::new(PredictiveTuning::new(space, options)?),
    };
    return Ok(strategy);
}

/// State of the auto-tuner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerState {
    /// Measuring configurations proposed by the strategy
    Training,
    /// All measurements are done, the best configuration is being selected
    Selecting,
    /// Using the selected configuration until the next tuning phase
    Steady,
}

/// The auto-tuner selects which configuration to use at each iteration.
///
/// Every iteration starts with a call to [`AutoTuner::tune`], and the time
/// taken by the iteration is given back to the tuner with
/// [`AutoTuner::report_result`]. A new tuning phase starts every
/// `tuning_interval` iterations, or when requested with
/// [`AutoTuner::force_retune`].
pub struct AutoTuner {
    options: TunerOptions,
    strategy: Box<dyn TuningStrategy>,
    state: TunerState,
    /// configuration used for the current iteration
    current: Configuration,
    /// samples collected for the current configuration
    samples: Vec<u64>,
    /// index of the current iteration
    iteration: usize,
    /// number of calls to `tune`
    calls: usize,
    iterations_since_tuning: usize,
    /// index of the current (or last) tuning phase
    tuning_phase: usize,
    completed_phases: usize,
    phase_time: Duration,
    total_tuning_time: Duration,
    result_logger: Option<TuningResultLogger>,
    prediction_logger: Option<PredictionLogger>,
}

impl std::fmt::Debug for AutoTuner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoTuner")
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .field("current", &self.current)
            .field("iteration", &self.iteration)
            .field("tuning_phase", &self.tuning_phase)
            .finish_non_exhaustive()
    }
}

impl AutoTuner {
    /// Create a new tuner exploring `space` with the strategy defined in
    /// `options`
    pub fn new(options: TunerOptions, space: ConfigurationSpace) -> Result<AutoTuner, Error> {
        options.validate()?;
        let strategy = create_strategy(&options, space)?;
        return AutoTuner::with_strategy(options, strategy);
    }

    /// Create a new tuner using a custom `strategy`
    pub fn with_strategy(options: TunerOptions, mut strategy: Box<dyn TuningStrategy>) -> Result<AutoTuner, Error> {
        options.validate()?;

        strategy.reset(0, 0)?;
        let current = strategy.next_configuration().ok_or_else(|| {
            Error::EmptySearchSpace(format!("{} has no configuration to test", strategy.name()))
        })?;

        let mut tuner = AutoTuner {
            options: options,
            strategy: strategy,
            state: TunerState::Training,
            current: current,
            samples: Vec::new(),
            iteration: 0,
            calls: 0,
            iterations_since_tuning: 0,
            tuning_phase: 0,
            completed_phases: 0,
            phase_time: Duration::ZERO,
            total_tuning_time: Duration::ZERO,
            result_logger: None,
            prediction_logger: None,
        };
        info!("starting tuning phase 0 with {}", tuner.strategy.name());
        tuner.log_predictions()?;

        return Ok(tuner);
    }

    /// Write the result of all tuning phases to the given logger
    pub fn set_result_logger(&mut self, logger: TuningResultLogger) {
        self.result_logger = Some(logger);
    }

    /// Write the predictions made at the start of tuning phases to the given
    /// logger
    pub fn set_prediction_logger(&mut self, logger: PredictionLogger) {
        self.prediction_logger = Some(logger);
    }

    pub fn state(&self) -> TunerState {
        self.state
    }

    /// Is a tuning phase running?
    pub fn is_tuning(&self) -> bool {
        self.state == TunerState::Training
    }

    /// Configuration used for the current iteration
    pub fn current_configuration(&self) -> Configuration {
        self.current
    }

    /// Index of the current iteration
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Index of the current (or last) tuning phase
    pub fn tuning_phase(&self) -> usize {
        self.tuning_phase
    }

    /// Number of tuning phases which selected a configuration
    pub fn completed_tuning_phases(&self) -> usize {
        self.completed_phases
    }

    /// Total time spent in iterations measured for tuning
    pub fn total_tuning_time(&self) -> Duration {
        self.total_tuning_time
    }

    /// Get the configuration to use for the next iteration
    #[time_graph::instrument(name = "AutoTuner::tune")]
    pub fn tune(&mut self) -> Result<Configuration, Error> {
        self.iteration = self.calls;
        self.calls += 1;

        if self.state == TunerState::Steady {
            if self.iterations_since_tuning >= self.options.tuning_interval {
                self.start_phase()?;
            } else {
                self.iterations_since_tuning += 1;
            }
        }

        return Ok(self.current);
    }

    /// Report the time taken by the current iteration, using the
    /// configuration returned by the last call to `tune`
    pub fn report_result(&mut self, time: Duration) -> Result<(), Error> {
        if self.state != TunerState::Training {
            return Ok(());
        }

        self.phase_time += time;
        self.total_tuning_time += time;
        self.samples.push(u64::try_from(time.as_nanos()).unwrap_or(u64::MAX));
        if self.samples.len() < self.options.num_samples {
            return Ok(());
        }

        let value = self.samples.iter().copied().min().unwrap_or(u64::MAX);
        self.samples.clear();
        debug!("{} took {} ns (iteration {})", self.current, value, self.iteration);

        let evidence = Evidence {
            iteration: self.iteration,
            tuning_phase: self.tuning_phase,
            value: value,
        };
        self.strategy.add_evidence(self.current, evidence);

        return self.advance();
    }

    /// Remove `configuration` from the search space, after it was found to
    /// be inapplicable. Returns the configuration to use instead.
    pub fn reject_configuration(&mut self, configuration: &Configuration) -> Result<Configuration, Error> {
        warn!("rejecting {}, it can not be used with this functor", configuration);
        self.strategy.reject_configuration(configuration)?;
        self.samples.clear();

        if self.state == TunerState::Training {
            self.advance()?;
        } else {
            self.start_phase()?;
        }

        return Ok(self.current);
    }

    /// Start a new tuning phase at the next call to `tune`, if the tuner is
    /// not already tuning
    pub fn force_retune(&mut self) {
        if self.state == TunerState::Steady {
            debug!("forcing a new tuning phase");
            self.iterations_since_tuning = self.options.tuning_interval;
        }
    }

    fn start_phase(&mut self) -> Result<(), Error> {
        self.tuning_phase += 1;
        info!("starting tuning phase {} at iteration {}", self.tuning_phase, self.iteration);

        self.strategy.reset(self.iteration, self.tuning_phase)?;
        self.state = TunerState::Training;
        self.samples.clear();
        self.phase_time = Duration::ZERO;
        self.current = self.strategy.next_configuration().ok_or_else(|| {
            Error::EmptySearchSpace(format!("{} has no configuration to test", self.strategy.name()))
        })?;

        self.log_predictions()?;
        return Ok(());
    }

    /// Move to the next configuration, or end the tuning phase
    fn advance(&mut self) -> Result<(), Error> {
        if self.strategy.needs_more_tuning() {
            if let Some(next) = self.strategy.next_configuration() {
                self.current = next;
                return Ok(());
            }
        }

        self.state = TunerState::Selecting;
        let optimum = self.strategy.optimum()?;
        self.current = optimum;
        info!(
            "tuning phase {} selected {} after {:?} of measurements",
            self.tuning_phase, optimum, self.phase_time
        );

        if let Some(logger) = &mut self.result_logger {
            logger.log_tuning_result(&optimum, self.iteration, self.phase_time.as_nanos())?;
        }

        self.completed_phases += 1;
        self.iterations_since_tuning = 0;
        self.state = TunerState::Steady;
        return Ok(());
    }

    fn log_predictions(&mut self) -> Result<(), Error> {
        if let Some(logger) = &mut self.prediction_logger {
            if let Some(predictions) = self.strategy.predictions() {
                logger.log_predictions(self.tuning_phase, &predictions)?;
            }
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use crate::options::{ContainerOption, DataLayoutOption, Newton3Option, NumberSet, TraversalOption};

    use super::*;
    use super::super::SearchSpaceOptions;
    use super::super::logger::tests::SharedBuffer;
    use super::super::tests::{linked_cells_space, synthetic_time};

    fn options(num_samples: usize) -> TunerOptions {
        TunerOptions {
            tuning_interval: 5,
            num_samples: num_samples,
            ..Default::default()
        }
    }

    /// Run the tuner until the end of the current phase, returning the
    /// number of iterations
    fn finish_phase(tuner: &mut AutoTuner) -> usize {
        let mut iterations = 0;
        while tuner.is_tuning() {
            let configuration = tuner.tune().unwrap();
            tuner.report_result(Duration::from_nanos(synthetic_time(&configuration))).unwrap();
            iterations += 1;
        }
        return iterations;
    }

    #[test]
    fn state_machine() {
        let space = linked_cells_space(NumberSet::default());
        let size = space.len().unwrap();
        let mut tuner = AutoTuner::new(options(2), space).unwrap();
        assert_eq!(tuner.state(), TunerState::Training);

        assert_eq!(finish_phase(&mut tuner), 2 * size);
        assert_eq!(tuner.state(), TunerState::Steady);
        assert_eq!(tuner.completed_tuning_phases(), 1);

        let optimum = tuner.current_configuration();
        assert_eq!(optimum.traversal, TraversalOption::LcC08);

        // the optimum is used for `tuning_interval` iterations
        for _ in 0..5 {
            assert_eq!(tuner.tune().unwrap(), optimum);
            tuner.report_result(Duration::from_nanos(1)).unwrap();
            assert!(!tuner.is_tuning());
        }

        tuner.tune().unwrap();
        assert!(tuner.is_tuning());
        assert_eq!(tuner.tuning_phase(), 1);
        assert_eq!(tuner.iteration(), 2 * size + 5);
    }

    #[test]
    fn samples_use_minimum() {
        let space = linked_cells_space(NumberSet::default());
        let mut tuner = AutoTuner::new(options(3), space).unwrap();
        let first = tuner.tune().unwrap();
        tuner.report_result(Duration::from_nanos(500)).unwrap();
        assert_eq!(tuner.tune().unwrap(), first);
        tuner.report_result(Duration::from_nanos(100)).unwrap();
        assert_eq!(tuner.tune().unwrap(), first);
        tuner.report_result(Duration::from_nanos(300)).unwrap();
        assert_ne!(tuner.tune().unwrap(), first);
        assert_eq!(tuner.total_tuning_time(), Duration::from_nanos(900));
    }

    #[test]
    fn force_retune() {
        let space = linked_cells_space(NumberSet::default());
        let mut tuner = AutoTuner::new(options(1), space).unwrap();

        // no effect while tuning
        tuner.force_retune();
        finish_phase(&mut tuner);
        assert_eq!(tuner.completed_tuning_phases(), 1);

        tuner.tune().unwrap();
        tuner.force_retune();
        tuner.tune().unwrap();
        assert!(tuner.is_tuning());
        assert_eq!(tuner.tuning_phase(), 1);
    }

    #[test]
    fn reject() {
        let space = linked_cells_space(NumberSet::default());
        let mut tuner = AutoTuner::new(options(1), space).unwrap();
        let first = tuner.tune().unwrap();
        let next = tuner.reject_configuration(&first).unwrap();
        assert_ne!(next.category(), first.category());

        finish_phase(&mut tuner);
        assert_ne!(tuner.current_configuration().category(), first.category());
    }

    #[test]
    fn reject_predicted_optimum() {
        let space = ConfigurationSpace::new(&SearchSpaceOptions {
            containers: [ContainerOption::DirectSum].into_iter().collect(),
            ..Default::default()
        }).unwrap();
        let options = TunerOptions {
            strategy: TuningStrategyOption::PredictiveTuning,
            tuning_interval: 0,
            num_samples: 1,
            evidence_first_prediction: 2,
            ..Default::default()
        };
        let mut tuner = AutoTuner::new(options, space).unwrap();

        let time = |configuration: &Configuration| {
            if configuration.data_layout == DataLayoutOption::Aos && configuration.newton3 == Newton3Option::Enabled {
                100
            } else {
                1000
            }
        };

        let run_phase = |tuner: &mut AutoTuner| loop {
            let configuration = tuner.tune().unwrap();
            tuner.report_result(Duration::from_nanos(time(&configuration))).unwrap();
            if !tuner.is_tuning() {
                break;
            }
        };
        run_phase(&mut tuner);
        run_phase(&mut tuner);
        assert_eq!(tuner.completed_tuning_phases(), 2);

        // the third phase only measures the predicted optimum
        let rejected = tuner.tune().unwrap();
        assert!(tuner.is_tuning());
        assert_eq!(rejected.data_layout, DataLayoutOption::Aos);
        assert_eq!(rejected.newton3, Newton3Option::Enabled);

        let next = tuner.reject_configuration(&rejected).unwrap();
        assert!(tuner.is_tuning());
        assert_ne!(next.category(), rejected.category());

        while tuner.is_tuning() {
            let configuration = tuner.current_configuration();
            tuner.report_result(Duration::from_nanos(time(&configuration))).unwrap();
            if tuner.is_tuning() {
                tuner.tune().unwrap();
            }
        }
        assert_eq!(tuner.completed_tuning_phases(), 3);
        assert_ne!(tuner.current_configuration().category(), rejected.category());
    }

    #[test]
    fn result_logger() {
        let buffer = SharedBuffer::default();
        let space = linked_cells_space(NumberSet::default());
        let mut tuner = AutoTuner::new(options(1), space).unwrap();
        tuner.set_result_logger(TuningResultLogger::new(Box::new(buffer.clone())).unwrap());
        finish_phase(&mut tuner);

        let content = buffer.content();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Iteration,Container"));
        assert!(lines[1].contains("lc-c08,soa,enabled"));
    }

    #[test]
    fn json_options() {
        let options: TunerOptions = serde_json::from_str(r#"{
            "strategy": "predictive-tuning",
            "extrapolation_method": "newton",
            "tuning_interval": 1000
        }"#).unwrap();
        assert_eq!(options.strategy, TuningStrategyOption::PredictiveTuning);
        assert_eq!(options.extrapolation_method, ExtrapolationMethodOption::Newton);
        assert_eq!(options.num_samples, 3);

        assert!(serde_json::from_str::<TunerOptions>(r#"{"unknown": 3}"#).is_err());

        let options = TunerOptions { num_samples: 0, ..Default::default() };
        assert!(AutoTuner::new(options, linked_cells_space(NumberSet::default())).is_err());
    }
}
