use std::collections::{BTreeMap, VecDeque};

use crate::Error;

use super::{Configuration, ConfigurationSpace, Evidence, TuningStrategy};
use super::{fastest, no_evidence, empty_space};

/// Measure every configuration of the search space, in order, once per
/// tuning phase.
#[derive(Debug, Clone)]
pub struct FullSearch {
    space: ConfigurationSpace,
    /// configurations still to be measured in this phase
    queue: VecDeque<Configuration>,
    /// measurements of the current phase
    measurements: BTreeMap<Configuration, u64>,
}

impl FullSearch {
    /// Create a new full search over `space`, which must be finite
    pub fn new(space: ConfigurationSpace) -> Result<FullSearch, Error> {
        if !space.is_finite() {
            return Err(Error::InvalidParameter(
                "full search requires a finite set of cell size factors".into()
            ));
        }

        Ok(FullSearch {
            space: space,
            queue: VecDeque::new(),
            measurements: BTreeMap::new(),
        })
    }
}

impl TuningStrategy for FullSearch {
    fn name(&self) -> &'static str {
        "full search"
    }

    fn reset(&mut self, _: usize, _: usize) -> Result<(), Error> {
        self.measurements.clear();
        self.queue = self.space.configurations()?.into();
        if self.queue.is_empty() {
            return Err(empty_space(self.name()));
        }
        return Ok(());
    }

    fn next_configuration(&mut self) -> Option<Configuration> {
        self.queue.front().copied()
    }

    fn add_evidence(&mut self, configuration: Configuration, evidence: Evidence) {
        self.queue.retain(|c| *c != configuration);
        self.measurements.insert(configuration, evidence.value);
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

        if self.space.is_empty() {
            return Err(empty_space(self.name()));
        }

        if self.queue.is_empty() && self.measurements.is_empty() {
            self.queue = self.space.configurations()?.into();
        }
        return Ok(());
    }

    fn search_space(&self) -> &ConfigurationSpace {
        &self.space
    }
}
