use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::options::{ContainerOption, DataLayoutOption, Newton3Option, TraversalOption};

/// The categorical part of a configuration, i.e. everything except the cell
/// size factor
pub(crate) type Category = (ContainerOption, TraversalOption, DataLayoutOption, Newton3Option);

/// A single algorithmic choice for the computation of pairwise interactions.
///
/// Configurations are totally ordered, comparing fields in declaration order
/// (the cell size factor is compared with `f64::total_cmp`).
#[derive(Debug, Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Configuration {
    pub container: ContainerOption,
    pub traversal: TraversalOption,
    pub data_layout: DataLayoutOption,
    pub newton3: Newton3Option,
    pub cell_size_factor: f64,
}

impl Configuration {
    pub fn new(
        container: ContainerOption,
        traversal: TraversalOption,
        data_layout: DataLayoutOption,
        newton3: Newton3Option,
        cell_size_factor: f64,
    ) -> Configuration {
        Configuration {
            container: container,
            traversal: traversal,
            data_layout: data_layout,
            newton3: newton3,
            cell_size_factor: cell_size_factor,
        }
    }

    pub(crate) fn from_category(category: Category, cell_size_factor: f64) -> Configuration {
        let (container, traversal, data_layout, newton3) = category;
        Configuration::new(container, traversal, data_layout, newton3, cell_size_factor)
    }

    pub(crate) fn category(&self) -> Category {
        (self.container, self.traversal, self.data_layout, self.newton3)
    }

    /// Is this configuration internally consistent? This checks that the
    /// traversal runs on the container and supports the Newton3 setting,
    /// but not if the traversal is applicable to a specific functor.
    pub fn is_valid(&self) -> bool {
        let newton3 = if self.newton3.enabled() {
            self.traversal.supports_newton3()
        } else {
            self.traversal.supports_non_newton3()
        };

        return newton3
            && self.traversal.container() == self.container
            && self.cell_size_factor.is_finite()
            && self.cell_size_factor > 0.0;
    }

    /// Header of the CSV representation of configurations
    pub fn csv_header() -> &'static str {
        "Container,Traversal,Data Layout,Newton 3,Cell Size Factor"
    }

    /// CSV representation of this configuration, matching `csv_header`
    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.container, self.traversal, self.data_layout, self.newton3, self.cell_size_factor
        )
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f, "{{container: {}, traversal: {}, layout: {}, newton3: {}, cell size factor: {}}}",
            self.container, self.traversal, self.data_layout, self.newton3, self.cell_size_factor
        )
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Configuration) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Configuration {}

impl PartialOrd for Configuration {
    fn partial_cmp(&self, other: &Configuration) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Configuration {
    fn cmp(&self, other: &Configuration) -> Ordering {
        self.category().cmp(&other.category())
            .then_with(|| self.cell_size_factor.total_cmp(&other.cell_size_factor))
    }
}

impl Hash for Configuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.category().hash(state);
        self.cell_size_factor.to_bits().hash(state);
    }
}
