use crate::options::{DataLayoutOption, TraversalOption};
use crate::{Error, PairwiseFunctor};

use super::{ClusterTraversal, DirectSumTraversal, LinkedCellsTraversal, VerletCellsTraversal};
use super::{Traversal, TraversalSelectorInfo};

/// Create the traversal corresponding to `option`, using the given data
/// layout and Newton's third law setting, for a container described by
/// `info`.
///
/// The traversal is always created, but might not be applicable (see
/// [`Traversal::is_applicable`]) if the functor or the traversal do not
/// support the requested settings.
pub fn generate_traversal(
    option: TraversalOption,
    data_layout: DataLayoutOption,
    newton3: bool,
    info: &TraversalSelectorInfo,
    functor: &dyn PairwiseFunctor,
) -> Result<Box<dyn Traversal>, Error> {
    if data_layout == DataLayoutOption::Device {
        return Err(Error::Unsupported(format!(
            "{} can not use the device data layout, device support is not available", option
        )));
    }

    let mut applicable = if newton3 {
        option.supports_newton3() && functor.allows_newton3()
    } else {
        option.supports_non_newton3() && functor.allows_non_newton3()
    };

    if option.requires_clusters() {
        applicable &= info.cluster_size > 0 && functor.is_appropriate_cluster_size(info.cluster_size, data_layout);
    }

    let traversal: Box<dyn Traversal> = match option {
        TraversalOption::DsSequential => {
            Box::new(DirectSumTraversal::new(data_layout, newton3, applicable))
        }
        TraversalOption::LcC01 | TraversalOption::LcC08 | TraversalOption::LcC18 => {
            Box::new(LinkedCellsTraversal::new(option, data_layout, newton3, applicable)?)
        }
        TraversalOption::VlcC01 | TraversalOption::VlcC18 |
        TraversalOption::VlpC01 | TraversalOption::VlpC18 => {
            Box::new(VerletCellsTraversal::new(option, data_layout, newton3, applicable)?)
        }
        TraversalOption::VclClusterIteration | TraversalOption::VclC06 => {
            Box::new(ClusterTraversal::new(option, data_layout, newton3, applicable)?)
        }
    };

    return Ok(traversal);
}
