use std::collections::{BTreeMap, VecDeque};

use super::Configuration;

/// A single measurement of the time taken by a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evidence {
    /// Iteration at which the measurement was done
    pub iteration: usize,
    /// Tuning phase during which the measurement was done
    pub tuning_phase: usize,
    /// Measured time, in nanoseconds
    pub value: u64,
}

/// History of the evidence collected for each configuration, keeping at most
/// `capacity` evidence per configuration (the oldest are pruned first).
#[derive(Debug, Clone)]
pub struct EvidenceHistory {
    capacity: usize,
    history: BTreeMap<Configuration, VecDeque<Evidence>>,
}

impl EvidenceHistory {
    pub fn new(capacity: usize) -> EvidenceHistory {
        EvidenceHistory {
            capacity: capacity.max(1),
            history: BTreeMap::new(),
        }
    }

    /// Add a new evidence for `configuration`, pruning the oldest one if the
    /// history is full
    pub fn push(&mut self, configuration: Configuration, evidence: Evidence) {
        let history = self.history.entry(configuration).or_default();
        history.push_back(evidence);
        while history.len() > self.capacity {
            history.pop_front();
        }
    }

    /// Get the evidence of `configuration`, oldest first
    pub fn get(&self, configuration: &Configuration) -> Option<&VecDeque<Evidence>> {
        self.history.get(configuration)
    }

    /// Get the last evidence of `configuration`
    pub fn last(&self, configuration: &Configuration) -> Option<&Evidence> {
        self.history.get(configuration).and_then(VecDeque::back)
    }

    /// Forget about `configuration`
    pub fn remove(&mut self, configuration: &Configuration) {
        self.history.remove(configuration);
    }

    /// Iterate over all configurations and their evidence
    pub fn iter(&self) -> impl Iterator<Item = (&Configuration, &VecDeque<Evidence>)> {
        self.history.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
