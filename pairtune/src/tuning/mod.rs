//! Auto-tuning of the configuration used to compute pairwise interactions.
//!
//! The [`AutoTuner`] runs tuning phases at regular intervals. During a phase,
//! a [`TuningStrategy`] proposes configurations to measure; at the end of the
//! phase the fastest configuration is selected and used until the next phase.

use crate::Error;

mod configuration;
pub use self::configuration::Configuration;

mod space;
pub use self::space::{ConfigurationSpace, SearchSpaceOptions};

mod evidence;
pub use self::evidence::{Evidence, EvidenceHistory};

mod extrapolation;
pub use self::extrapolation::extrapolate;

mod full_search;
pub use self::full_search::FullSearch;

mod random_search;
pub use self::random_search::RandomSearch;

mod model_based;
pub use self::model_based::ModelBasedSearch;

mod predictive;
pub use self::predictive::PredictiveTuning;

mod logger;
pub use self::logger::{TuningResultLogger, PredictionLogger};

mod auto_tuner;
pub use self::auto_tuner::{AutoTuner, TunerOptions, TunerState, create_strategy};

/// A `TuningStrategy` decides which configurations are measured during a
/// tuning phase, and which one is the best at the end of the phase.
pub trait TuningStrategy: Send {
    /// Name of this strategy
    fn name(&self) -> &'static str;

    /// Start a new tuning phase at the given iteration
    fn reset(&mut self, iteration: usize, tuning_phase: usize) -> Result<(), Error>;

    /// Get the configuration to measure next. Calling this multiple times
    /// without adding evidence in between returns the same configuration.
    /// Returns `None` if there is nothing left to measure in this phase.
    fn next_configuration(&mut self) -> Option<Configuration>;

    /// Record a measurement for `configuration`
    fn add_evidence(&mut self, configuration: Configuration, evidence: Evidence);

    /// Does this strategy need more measurements in the current phase?
    fn needs_more_tuning(&self) -> bool;

    /// Get the best configuration of the current phase
    fn optimum(&self) -> Result<Configuration, Error>;

    /// Remove a configuration found to be inapplicable at dispatch time
    /// from the search space. This fails if the space becomes empty.
    fn reject_configuration(&mut self, configuration: &Configuration) -> Result<(), Error>;

    /// Get the current search space
    fn search_space(&self) -> &ConfigurationSpace;

    /// Get the predicted time of all configurations for the current phase,
    /// if this strategy makes predictions. `None` inside the vector marks
    /// configurations without prediction.
    fn predictions(&self) -> Option<Vec<(Configuration, Option<u64>)>> {
        None
    }
}

/// Get the fastest configuration among `measurements`, breaking ties with
/// the ordering of configurations
fn fastest<'a>(measurements: impl IntoIterator<Item = (&'a Configuration, u64)>) -> Option<Configuration> {
    measurements.into_iter()
        .min_by(|(a, time_a), (b, time_b)| time_a.cmp(time_b).then_with(|| a.cmp(b)))
        .map(|(configuration, _)| *configuration)
}

/// Error for a strategy without any measurement in the current phase
fn no_evidence(strategy: &str) -> Error {
    Error::Internal(format!("{} has no evidence in the current tuning phase", strategy))
}

/// Error for a strategy whose search space became empty
fn empty_space(strategy: &str) -> Error {
    Error::EmptySearchSpace(format!("all configurations were rejected by {}", strategy))
}
