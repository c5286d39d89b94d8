//! Sets of options defining the algorithmic choices available to the tuner.
//!
//! Each option type can be converted to and from its name (as used in JSON
//! configuration and in the CSV tuning logs), and can list all its values in
//! a deterministic order.

use std::collections::BTreeSet;

use crate::Error;

/// Define an enum of options, with names used for parsing and display.
macro_rules! define_option {
    (
        $(#[$meta:meta])*
        pub enum $Name:ident {
            $($(#[$variant_meta:meta])* $Variant:ident => $name:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
        pub enum $Name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $name)]
                $Variant,
            )+
        }

        impl $Name {
            /// Get all possible values of this option, in order
            pub fn all() -> Vec<$Name> {
                vec![$($Name::$Variant,)+]
            }

            /// Get the name of this option
            pub fn name(self) -> &'static str {
                match self {
                    $($Name::$Variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.name())
            }
        }

        impl std::str::FromStr for $Name {
            type Err = Error;

            fn from_str(value: &str) -> Result<$Name, Error> {
                let lowercase = value.trim().to_ascii_lowercase();
                $(
                    if lowercase == $name {
                        return Ok($Name::$Variant);
                    }
                )+

                return Err(Error::InvalidParameter(format!(
                    "unknown {} '{}', expected one of {}",
                    stringify!($Name), value, [$($name,)+].join(", ")
                )));
            }
        }
    };
}

define_option! {
    /// Spatial containers storing the particles
    pub enum ContainerOption {
        /// All-pairs interactions between one domain cell and one halo cell
        DirectSum => "direct-sum",
        /// Regular grid of cells
        LinkedCells => "linked-cells",
        /// Linked cells with one neighbor list for each particle
        VerletListsCells => "verlet-lists-cells",
        /// Linked cells with one neighbor list for each pair of cells
        PairwiseVerletLists => "pairwise-verlet-lists",
        /// Towers of fixed-size clusters of particles
        VerletClusterLists => "verlet-cluster-lists",
    }
}

impl ContainerOption {
    /// Does this container use neighbor lists that need to be rebuilt when
    /// particles move?
    pub fn is_verlet_based(self) -> bool {
        match self {
            ContainerOption::DirectSum | ContainerOption::LinkedCells => false,
            ContainerOption::VerletListsCells |
            ContainerOption::PairwiseVerletLists |
            ContainerOption::VerletClusterLists => true,
        }
    }
}

define_option! {
    /// Traversals defining in which order cells (or clusters) are processed
    pub enum TraversalOption {
        /// Sequential traversal of the direct sum container
        DsSequential => "ds-sequential",
        /// One color, each cell computes all interactions of its own particles
        LcC01 => "lc-c01",
        /// Base step on blocks of `overlap + 1` cells per dimension
        LcC08 => "lc-c08",
        /// Base step on a cell and its forward neighbors
        LcC18 => "lc-c18",
        /// One color over per-particle neighbor lists
        VlcC01 => "vlc-c01",
        /// Forward-neighbor coloring over per-particle neighbor lists
        VlcC18 => "vlc-c18",
        /// One color over per-cell-pair neighbor lists
        VlpC01 => "vlp-c01",
        /// Forward-neighbor coloring over per-cell-pair neighbor lists
        VlpC18 => "vlp-c18",
        /// Each cluster computes the interactions of its own particles
        VclClusterIteration => "vcl-cluster-iteration",
        /// Forward-neighbor coloring over the towers of clusters
        VclC06 => "vcl-c06",
    }
}

impl TraversalOption {
    /// Get the container this traversal can run on
    pub fn container(self) -> ContainerOption {
        match self {
            TraversalOption::DsSequential => ContainerOption::DirectSum,
            TraversalOption::LcC01 |
            TraversalOption::LcC08 |
            TraversalOption::LcC18 => ContainerOption::LinkedCells,
            TraversalOption::VlcC01 |
            TraversalOption::VlcC18 => ContainerOption::VerletListsCells,
            TraversalOption::VlpC01 |
            TraversalOption::VlpC18 => ContainerOption::PairwiseVerletLists,
            TraversalOption::VclClusterIteration |
            TraversalOption::VclC06 => ContainerOption::VerletClusterLists,
        }
    }

    /// Get all traversals compatible with the given container
    pub fn compatible_with(container: ContainerOption) -> Vec<TraversalOption> {
        TraversalOption::all().into_iter()
            .filter(|traversal| traversal.container() == container)
            .collect()
    }

    /// Can this traversal use Newton's third law? Single color traversals
    /// only write to the particles they own, and can not.
    pub fn supports_newton3(self) -> bool {
        !matches!(self,
            TraversalOption::LcC01 |
            TraversalOption::VlcC01 |
            TraversalOption::VlpC01 |
            TraversalOption::VclClusterIteration
        )
    }

    /// Can this traversal run without Newton's third law?
    pub fn supports_non_newton3(self) -> bool {
        true
    }

    /// Does this traversal need the particles to support clustering?
    pub fn requires_clusters(self) -> bool {
        self.container() == ContainerOption::VerletClusterLists
    }
}

define_option! {
    /// Memory layout of the particle data during a traversal
    pub enum DataLayoutOption {
        /// Array of structs, the particles themselves
        Aos => "aos",
        /// Structure of arrays, one buffer per particle property
        Soa => "soa",
        /// Structure of arrays copied to an accelerator device
        Device => "device",
    }
}

define_option! {
    /// Should the pairwise interactions use Newton's third law?
    pub enum Newton3Option {
        /// Compute both `i -> j` and `j -> i` independently
        Disabled => "disabled",
        /// Compute each pair once, and apply the opposite force
        Enabled => "enabled",
    }
}

impl Newton3Option {
    /// Get this option as a boolean flag
    pub fn enabled(self) -> bool {
        self == Newton3Option::Enabled
    }
}

impl From<bool> for Newton3Option {
    fn from(enabled: bool) -> Newton3Option {
        if enabled {
            Newton3Option::Enabled
        } else {
            Newton3Option::Disabled
        }
    }
}

define_option! {
    /// Algorithm used to search the configuration space
    pub enum TuningStrategyOption {
        /// Test every configuration in every tuning phase
        FullSearch => "full-search",
        /// Test randomly sampled configurations
        RandomSearch => "random-search",
        /// Sample configurations using a performance model
        ModelBased => "model-based",
        /// Only test configurations predicted to be close to the optimum
        PredictiveTuning => "predictive-tuning",
    }
}

define_option! {
    /// Extrapolation used by predictive tuning
    pub enum ExtrapolationMethodOption {
        /// Line through the last two data points
        LinePrediction => "line-prediction",
        /// Least-squares line through all data points
        LinearRegression => "linear-regression",
        /// Polynomial through the data points using Lagrange interpolation
        Lagrange => "lagrange",
        /// Polynomial through the data points using Newton's divided
        /// differences
        Newton => "newton",
    }
}

define_option! {
    /// How the time of an iteration is measured
    pub enum TimingOption {
        /// Wall-clock time between the start and the end of the iteration
        WallClock => "wall-clock",
        /// Smallest CPU time used by any of the threads in the rayon pool
        /// during the iteration
        ThreadTime => "thread-time",
    }
}

impl Default for TimingOption {
    fn default() -> TimingOption {
        TimingOption::WallClock
    }
}

/// A set of real numbers, either finite or a continuous interval. This is
/// used for the cell size factors.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub enum NumberSet {
    /// A finite set of values
    Finite(Vec<f64>),
    /// All values between `min` and `max` (included)
    Interval {
        min: f64,
        max: f64,
    },
}

impl Default for NumberSet {
    fn default() -> NumberSet {
        NumberSet::Finite(vec![1.0])
    }
}

impl NumberSet {
    /// Check that all values in this set are finite and strictly positive
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        let valid = |value: f64| value.is_finite() && value > 0.0;
        match self {
            NumberSet::Finite(values) => {
                if values.is_empty() {
                    return Err(Error::InvalidParameter(format!("{} can not be empty", name)));
                }
                if let Some(value) = values.iter().find(|&&v| !valid(v)) {
                    return Err(Error::InvalidParameter(format!(
                        "{} must be positive, got {}", name, value
                    )));
                }
            }
            NumberSet::Interval { min, max } => {
                if !valid(*min) || !valid(*max) || min > max {
                    return Err(Error::InvalidParameter(format!(
                        "{} interval must satisfy 0 < min <= max, got [{}, {}]", name, min, max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Is this set finite?
    pub fn is_finite(&self) -> bool {
        matches!(self, NumberSet::Finite(_))
    }

    /// Get the sorted, deduplicated values of a finite set. For intervals,
    /// this returns the two bounds.
    pub fn values(&self) -> Vec<f64> {
        let mut values = match self {
            NumberSet::Finite(values) => values.clone(),
            NumberSet::Interval { min, max } => vec![*min, *max],
        };
        values.sort_by(f64::total_cmp);
        values.dedup();
        return values;
    }

    /// Smallest value in this set
    pub fn min(&self) -> f64 {
        self.values().first().copied().unwrap_or(f64::NAN)
    }

    /// Largest value in this set
    pub fn max(&self) -> f64 {
        self.values().last().copied().unwrap_or(f64::NAN)
    }

    /// Does this set contain the given value?
    pub fn contains(&self, value: f64) -> bool {
        match self {
            NumberSet::Finite(values) => values.iter().any(|&v| v == value),
            NumberSet::Interval { min, max } => *min <= value && value <= *max,
        }
    }
}

/// Parse a comma separated list of option names into a set of options
pub fn parse_options<T>(list: &str) -> Result<BTreeSet<T>, Error>
    where T: std::str::FromStr<Err=Error> + Ord
{
    list.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        for option in TraversalOption::all() {
            assert_eq!(option.name().parse::<TraversalOption>().unwrap(), option);
        }

        assert_eq!("Linked-Cells".parse::<ContainerOption>().unwrap(), ContainerOption::LinkedCells);
        let error = "linked-balls".parse::<ContainerOption>().unwrap_err();
        assert!(error.to_string().contains("unknown ContainerOption 'linked-balls'"));

        let json = serde_json::to_string(&DataLayoutOption::Soa).unwrap();
        assert_eq!(json, "\"soa\"");
    }

    #[test]
    fn parse_lists() {
        let layouts = parse_options::<DataLayoutOption>("aos, soa").unwrap();
        assert_eq!(layouts.into_iter().collect::<Vec<_>>(), [DataLayoutOption::Aos, DataLayoutOption::Soa]);

        assert!(parse_options::<DataLayoutOption>("aos, simd").is_err());
    }

    #[test]
    fn traversal_compatibility() {
        assert_eq!(
            TraversalOption::compatible_with(ContainerOption::LinkedCells),
            [TraversalOption::LcC01, TraversalOption::LcC08, TraversalOption::LcC18]
        );

        for container in ContainerOption::all() {
            assert!(!TraversalOption::compatible_with(container).is_empty());
        }

        assert!(!TraversalOption::LcC01.supports_newton3());
        assert!(TraversalOption::LcC08.supports_newton3());
    }

    #[test]
    fn number_sets() {
        let set = NumberSet::Finite(vec![2.0, 1.0, 2.0]);
        assert_eq!(set.values(), [1.0, 2.0]);
        assert!(set.validate("cell size factors").is_ok());
        assert!(set.contains(2.0));
        assert!(!set.contains(1.5));

        let interval = NumberSet::Interval { min: 0.5, max: 2.0 };
        assert!(interval.contains(1.5));
        assert_eq!(interval.min(), 0.5);
        assert!(!interval.is_finite());

        assert!(NumberSet::Finite(vec![]).validate("csf").is_err());
        assert!(NumberSet::Finite(vec![-1.0]).validate("csf").is_err());
        assert!(NumberSet::Interval { min: 2.0, max: 1.0 }.validate("csf").is_err());
    }
}
