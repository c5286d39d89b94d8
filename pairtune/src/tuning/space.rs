use std::collections::BTreeSet;

use log::warn;
use rand::Rng;

use crate::options::{ContainerOption, DataLayoutOption, Newton3Option, NumberSet, TraversalOption};
use crate::Error;

use super::configuration::{Category, Configuration};

fn default_containers() -> BTreeSet<ContainerOption> {
    ContainerOption::all().into_iter().collect()
}

fn default_traversals() -> BTreeSet<TraversalOption> {
    TraversalOption::all().into_iter().collect()
}

fn default_data_layouts() -> BTreeSet<DataLayoutOption> {
    [DataLayoutOption::Aos, DataLayoutOption::Soa].into_iter().collect()
}

fn default_newton3() -> BTreeSet<Newton3Option> {
    Newton3Option::all().into_iter().collect()
}

/// Options allowed in the search space of the tuner
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchSpaceOptions {
    /// Allowed containers
    #[serde(default = "default_containers")]
    pub containers: BTreeSet<ContainerOption>,
    /// Allowed traversals
    #[serde(default = "default_traversals")]
    pub traversals: BTreeSet<TraversalOption>,
    /// Allowed data layouts
    #[serde(default = "default_data_layouts")]
    pub data_layouts: BTreeSet<DataLayoutOption>,
    /// Allowed settings for the use of Newton's third law
    #[serde(default = "default_newton3")]
    pub newton3: BTreeSet<Newton3Option>,
    /// Allowed cell size factors for containers based on linked cells
    #[serde(default)]
    pub cell_size_factors: NumberSet,
}

impl Default for SearchSpaceOptions {
    fn default() -> SearchSpaceOptions {
        SearchSpaceOptions {
            containers: default_containers(),
            traversals: default_traversals(),
            data_layouts: default_data_layouts(),
            newton3: default_newton3(),
            cell_size_factors: NumberSet::default(),
        }
    }
}

/// Does this container use the cell size factor?
fn uses_cell_size_factor(container: ContainerOption) -> bool {
    !matches!(container, ContainerOption::DirectSum | ContainerOption::VerletClusterLists)
}

/// Set of all valid configurations the tuner can choose from.
///
/// The space is the cartesian product of the allowed options, filtered to
/// keep only consistent configurations. When the cell size factors are given
/// as an interval, the space is continuous along this dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSpace {
    categories: BTreeSet<Category>,
    cell_size_factors: NumberSet,
    /// configurations removed individually from the space
    excluded: BTreeSet<Configuration>,
}

impl ConfigurationSpace {
    /// Create the search space corresponding to the given `options`
    pub fn new(options: &SearchSpaceOptions) -> Result<ConfigurationSpace, Error> {
        options.cell_size_factors.validate("cell size factors")?;

        let mut data_layouts = options.data_layouts.clone();
        if data_layouts.remove(&DataLayoutOption::Device) {
            if data_layouts.is_empty() {
                return Err(Error::Unsupported(
                    "only the device data layout was requested, but device support is not available".into()
                ));
            }
            warn!("ignoring the device data layout in the search space, device support is not available");
        }

        let mut categories = BTreeSet::new();
        for &traversal in &options.traversals {
            let container = traversal.container();
            if !options.containers.contains(&container) {
                continue;
            }

            for &data_layout in &data_layouts {
                for &newton3 in &options.newton3 {
                    let supported = if newton3.enabled() {
                        traversal.supports_newton3()
                    } else {
                        traversal.supports_non_newton3()
                    };

                    if supported {
                        categories.insert((container, traversal, data_layout, newton3));
                    }
                }
            }
        }

        if categories.is_empty() {
            return Err(Error::EmptySearchSpace(format!(
                "no valid configuration for containers [{}] and traversals [{}]",
                join(&options.containers), join(&options.traversals),
            )));
        }

        Ok(ConfigurationSpace {
            categories: categories,
            cell_size_factors: options.cell_size_factors.clone(),
            excluded: BTreeSet::new(),
        })
    }

    /// Allowed cell size factors
    pub fn cell_size_factors(&self) -> &NumberSet {
        &self.cell_size_factors
    }

    /// Does this space contain a finite number of configurations?
    pub fn is_finite(&self) -> bool {
        self.cell_size_factors.is_finite()
            || self.categories.iter().all(|category| !uses_cell_size_factor(category.0))
    }

    /// Is this space empty?
    pub fn is_empty(&self) -> bool {
        if self.is_finite() {
            return self.configurations().map_or(true, |configurations| configurations.is_empty());
        }
        return self.categories.is_empty();
    }

    /// Cell size factors to use for the given `container`
    fn factors_for(&self, container: ContainerOption) -> Vec<f64> {
        if uses_cell_size_factor(container) {
            self.cell_size_factors.values()
        } else {
            vec![self.cell_size_factors.min()]
        }
    }

    /// Get all configurations in this space, in order. This fails if the space
    /// is not finite.
    pub fn configurations(&self) -> Result<Vec<Configuration>, Error> {
        if !self.is_finite() {
            return Err(Error::InvalidParameter(
                "can not enumerate configurations with an interval of cell size factors".into()
            ));
        }

        let mut configurations = Vec::new();
        for &category in &self.categories {
            for cell_size_factor in self.factors_for(category.0) {
                let configuration = Configuration::from_category(category, cell_size_factor);
                if !self.excluded.contains(&configuration) {
                    configurations.push(configuration);
                }
            }
        }
        configurations.sort();
        return Ok(configurations);
    }

    /// Number of configurations in this space, `None` for infinite spaces
    pub fn len(&self) -> Option<usize> {
        self.configurations().ok().map(|configurations| configurations.len())
    }

    /// Get all the categories (everything but the cell size factor) in this
    /// space
    pub(crate) fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Does this space contain `configuration`?
    pub fn contains(&self, configuration: &Configuration) -> bool {
        if !self.categories.contains(&configuration.category()) || self.excluded.contains(configuration) {
            return false;
        }

        if uses_cell_size_factor(configuration.container) {
            return self.cell_size_factors.contains(configuration.cell_size_factor);
        }
        return configuration.cell_size_factor == self.cell_size_factors.min();
    }

    /// Draw a random configuration in this space, sampling the cell size
    /// factor uniformly for intervals. Returns `None` if the space is empty.
    pub fn sample(&self, rng: &mut impl Rng) -> Option<Configuration> {
        if self.is_finite() {
            let configurations = self.configurations().ok()?;
            if configurations.is_empty() {
                return None;
            }
            return Some(configurations[rng.gen_range(0..configurations.len())]);
        }

        let categories = self.categories.iter().collect::<Vec<_>>();
        if categories.is_empty() {
            return None;
        }
        let category = *categories[rng.gen_range(0..categories.len())];
        return Some(Configuration::from_category(category, self.sample_cell_size_factor(category.0, rng)));
    }

    /// Draw a random cell size factor for the given container
    pub(crate) fn sample_cell_size_factor(&self, container: ContainerOption, rng: &mut impl Rng) -> f64 {
        if !uses_cell_size_factor(container) {
            return self.cell_size_factors.min();
        }

        match &self.cell_size_factors {
            NumberSet::Finite(_) => {
                let values = self.cell_size_factors.values();
                values[rng.gen_range(0..values.len())]
            }
            NumberSet::Interval { min, max } => {
                if min == max {
                    *min
                } else {
                    rng.gen_range(*min..=*max)
                }
            }
        }
    }

    /// Remove a single configuration from this space. For spaces continuous
    /// along the cell size factor, this removes all configurations sharing
    /// the same container, traversal, data layout and Newton3 setting.
    pub fn remove(&mut self, configuration: &Configuration) {
        if uses_cell_size_factor(configuration.container) && !self.cell_size_factors.is_finite() {
            self.categories.remove(&configuration.category());
        } else {
            self.excluded.insert(*configuration);
        }
    }

    /// Remove all configurations sharing the container, traversal, data
    /// layout and Newton3 setting of `configuration`
    pub fn remove_category(&mut self, configuration: &Configuration) {
        self.categories.remove(&configuration.category());
    }
}

fn join<T: std::fmt::Display>(values: &BTreeSet<T>) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn options(containers: &[ContainerOption], cell_size_factors: NumberSet) -> SearchSpaceOptions {
        SearchSpaceOptions {
            containers: containers.iter().copied().collect(),
            cell_size_factors: cell_size_factors,
            ..Default::default()
        }
    }

    #[test]
    fn enumerate() {
        let space = ConfigurationSpace::new(&options(
            &[ContainerOption::LinkedCells, ContainerOption::DirectSum],
            NumberSet::Finite(vec![1.0, 2.0]),
        )).unwrap();

        let configurations = space.configurations().unwrap();
        // ds: 2 layouts x 2 newton3; lc-c01: 2 layouts; lc-c08/c18: 2 x 2;
        // cell size factors only for linked cells
        assert_eq!(configurations.len(), 4 + 2 * (2 + 2 * 4));
        assert!(configurations.windows(2).all(|w| w[0] < w[1]));
        assert!(configurations.iter().all(Configuration::is_valid));

        let direct_sum = configurations.iter().filter(|c| c.container == ContainerOption::DirectSum);
        assert!(direct_sum.clone().all(|c| c.cell_size_factor == 1.0));
        assert_eq!(direct_sum.count(), 4);
        assert_eq!(space.len(), Some(24));
    }

    #[test]
    fn ignored_cell_size_factor() {
        let space = ConfigurationSpace::new(&options(
            &[ContainerOption::DirectSum, ContainerOption::VerletClusterLists],
            NumberSet::Finite(vec![2.0, 0.5, 1.5]),
        )).unwrap();

        let configurations = space.configurations().unwrap();
        assert!(!configurations.is_empty());
        assert!(configurations.iter().all(|c| c.cell_size_factor == 0.5));
    }

    #[test]
    fn empty() {
        let mut options = options(&[ContainerOption::LinkedCells], NumberSet::default());
        options.traversals = [TraversalOption::VlcC18].into_iter().collect();
        let error = ConfigurationSpace::new(&options).unwrap_err();
        assert!(matches!(error, Error::EmptySearchSpace(_)));

        let mut options = SearchSpaceOptions::default();
        options.traversals = [TraversalOption::LcC01].into_iter().collect();
        options.newton3 = [Newton3Option::Enabled].into_iter().collect();
        assert!(matches!(ConfigurationSpace::new(&options), Err(Error::EmptySearchSpace(_))));
    }

    #[test]
    fn device() {
        let mut options = SearchSpaceOptions::default();
        options.data_layouts = [DataLayoutOption::Device].into_iter().collect();
        assert!(matches!(ConfigurationSpace::new(&options), Err(Error::Unsupported(_))));

        options.data_layouts.insert(DataLayoutOption::Aos);
        let space = ConfigurationSpace::new(&options).unwrap();
        let configurations = space.configurations().unwrap();
        assert!(configurations.iter().all(|c| c.data_layout == DataLayoutOption::Aos));
    }

    #[test]
    fn interval() {
        let mut space = ConfigurationSpace::new(&options(
            &[ContainerOption::LinkedCells],
            NumberSet::Interval { min: 0.5, max: 2.0 },
        )).unwrap();
        assert!(!space.is_finite());
        assert!(space.configurations().is_err());
        assert_eq!(space.len(), None);

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..20 {
            let configuration = space.sample(&mut rng).unwrap();
            assert!(space.contains(&configuration));
            assert!((0.5..=2.0).contains(&configuration.cell_size_factor));
        }

        let configuration = space.sample(&mut rng).unwrap();
        space.remove(&configuration);
        let mut other = configuration;
        other.cell_size_factor = 1.7;
        assert!(!space.contains(&other));
    }

    #[test]
    fn remove() {
        let mut space = ConfigurationSpace::new(&options(&[ContainerOption::DirectSum], NumberSet::default())).unwrap();
        let configurations = space.configurations().unwrap();
        assert_eq!(configurations.len(), 4);

        space.remove(&configurations[0]);
        assert!(!space.contains(&configurations[0]));
        assert_eq!(space.len(), Some(3));

        space.remove_category(&configurations[1]);
        assert_eq!(space.len(), Some(2));
        assert!(!space.is_empty());
    }

    #[test]
    fn json() {
        let options: SearchSpaceOptions = serde_json::from_str(r#"{
            "containers": ["linked-cells"],
            "cell_size_factors": {"Interval": {"min": 1.0, "max": 2.0}}
        }"#).unwrap();
        assert_eq!(options.containers.len(), 1);
        assert_eq!(options.data_layouts, default_data_layouts());
        assert_eq!(options.cell_size_factors, NumberSet::Interval { min: 1.0, max: 2.0 });
    }
}
