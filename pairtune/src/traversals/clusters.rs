use rayon::prelude::*;

use crate::containers::{ClusterTowers, uses_half_lists};
use crate::options::{DataLayoutOption, TraversalOption};
use crate::{Error, PairwiseFunctor};

use super::cell_functor::CellFunctor;
use super::coloring::{SharedCells, colored_sweep, c18_stride};
use super::{Traversal, TraversalTarget, wrong_target};

/// Traversals of the verlet cluster lists container.
///
/// - `vcl-cluster-iteration` processes all clusters in parallel without
///   coloring, each cluster computing the forces on its own particles only.
///   It uses full neighbor lists and can not use Newton's third law.
/// - `vcl-c06` uses half neighbor lists and colors the towers, so that a
///   tower and its forward neighbors are never processed at the same time as
///   another tower of the same color. Both clusters of a pair are updated,
///   with or without Newton's third law.
#[derive(Debug, Clone)]
pub struct ClusterTraversal {
    option: TraversalOption,
    data_layout: DataLayoutOption,
    newton3: bool,
    applicable: bool,
}

impl ClusterTraversal {
    pub fn new(option: TraversalOption, data_layout: DataLayoutOption, newton3: bool, applicable: bool) -> Result<ClusterTraversal, Error> {
        if !matches!(option, TraversalOption::VclClusterIteration | TraversalOption::VclC06) {
            return Err(Error::InvalidParameter(format!(
                "{} is not a verlet cluster lists traversal", option
            )));
        }

        Ok(ClusterTraversal {
            option: option,
            data_layout: data_layout,
            newton3: newton3,
            applicable: applicable,
        })
    }

    /// Each cluster computes the forces on its own particles from the full
    /// lists, only reading the other clusters. The forces are added to the
    /// clusters once all of them are computed.
    fn traverse_clusters(&self, towers: &mut ClusterTowers, cell_functor: &CellFunctor) {
        let shared = &*towers;
        let forces = (0..shared.clusters().len()).into_par_iter().map(|cluster| {
            let clusters = shared.clusters();
            let neighbors = shared.neighbors(cluster).iter().map(|&other| &clusters[other]);
            cell_functor.one_way_forces(&clusters[cluster], neighbors)
        }).collect::<Vec<_>>();

        towers.clusters_mut().par_iter_mut().zip(&forces).for_each(|(cluster, forces)| {
            cell_functor.add_forces(cluster, forces);
        });
    }

    /// Towers are processed with the c18 coloring in 2D, each cluster
    /// interacting with the clusters in its half list
    fn traverse_c06(&self, towers: &mut ClusterTowers, cell_functor: &CellFunctor) {
        let [tx, ty] = towers.towers_per_dimension();
        let [ox, oy] = towers.overlap();
        let stride = c18_stride([ox, oy, 0]);

        let ranges = (0..tx * ty).map(|flat| towers.tower([flat / ty, flat % ty])).collect::<Vec<_>>();
        let (clusters, neighbors) = towers.clusters_mut_with_neighbors();
        let clusters = SharedCells::new(clusters);

        colored_sweep([tx, ty, 1], stride, |base| {
            let tower = base[0] * ty + base[1];
            for cluster in ranges[tower].clone() {
                // SAFETY: the neighbors of clusters in this tower are in the
                // tower itself or in forward towers, which the coloring keeps
                // disjoint for all the towers of the same color.
                cell_functor.process_cell(unsafe { clusters.get(cluster) });
                for &other in &neighbors[cluster] {
                    let (first, second) = unsafe { clusters.get_pair(cluster, other) };
                    cell_functor.process_pair(first, second);
                }
            }
        });
    }
}

impl Traversal for ClusterTraversal {
    fn option(&self) -> TraversalOption {
        self.option
    }

    fn data_layout(&self) -> DataLayoutOption {
        self.data_layout
    }

    fn use_newton3(&self) -> bool {
        self.newton3
    }

    fn is_applicable(&self) -> bool {
        self.applicable
    }

    #[time_graph::instrument(name = "ClusterTraversal::traverse")]
    fn traverse(&self, target: TraversalTarget<'_>, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        let towers = match target {
            TraversalTarget::Clusters(towers) => towers,
            target => return Err(wrong_target(self.option, &target)),
        };

        if towers.half_lists() != Some(uses_half_lists(self.option)) {
            return Err(Error::Internal(format!("cluster lists are not built for {}", self.signature())));
        }

        let cell_functor = CellFunctor::new(functor, self.data_layout, self.newton3)?;
        match self.option {
            TraversalOption::VclClusterIteration => {
                if self.newton3 {
                    return Err(Error::InvalidParameter("vcl-cluster-iteration does not support newton3".into()));
                }
                self.traverse_clusters(towers, &cell_functor);
            }
            TraversalOption::VclC06 => self.traverse_c06(towers, &cell_functor),
            _ => return Err(Error::Internal(format!("unexpected verlet cluster lists traversal {}", self.option))),
        }

        return Ok(());
    }
}
