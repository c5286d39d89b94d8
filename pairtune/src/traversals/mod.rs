//! Traversals define in which order and in which memory layout the pairs of
//! particles stored in a container are passed to a [`PairwiseFunctor`].
//!
//! Parallel traversals use a coloring of the cells: cells of the same color
//! are far enough apart that they never write to the same particles, and can
//! be processed in parallel. The colors are processed one after the other.

use crate::containers::{CellBlock, CellNeighborList, ClusterTowers};
use crate::options::{DataLayoutOption, Newton3Option, TraversalOption};
use crate::particles::ParticleCell;
use crate::{Error, PairwiseFunctor};

mod coloring;
mod cell_functor;

mod converter;
pub use self::converter::DataLayoutConverter;

mod direct_sum;
pub use self::direct_sum::DirectSumTraversal;

mod linked_cells;
pub use self::linked_cells::LinkedCellsTraversal;

mod verlet_cells;
pub use self::verlet_cells::VerletCellsTraversal;

mod clusters;
pub use self::clusters::ClusterTraversal;

mod selector;
pub use self::selector::generate_traversal;

/// Information about a container needed to create traversals for it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalSelectorInfo {
    /// Number of cells along each dimension, including halo cells
    pub cells_per_dimension: [usize; 3],
    /// Cutoff plus skin
    pub interaction_length: f64,
    /// Length of the cells along each dimension
    pub cell_length: [f64; 3],
    /// Number of particles in a cluster, for cluster based containers
    pub cluster_size: usize,
}

impl TraversalSelectorInfo {
    /// Number of cells needed to cover the interaction length along each
    /// dimension
    pub fn overlap(&self) -> [usize; 3] {
        let mut overlap = [0; 3];
        for dim in 0..3 {
            overlap[dim] = f64::ceil(self.interaction_length / self.cell_length[dim]) as usize;
        }
        return overlap;
    }
}

/// Identity of a traversal, as used to check if a traversal can run on
/// neighbor lists built for another traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraversalSignature {
    pub traversal: TraversalOption,
    pub data_layout: DataLayoutOption,
    pub newton3: Newton3Option,
}

impl std::fmt::Display for TraversalSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/newton3-{}", self.traversal, self.data_layout, self.newton3)
    }
}

/// The data a traversal operates on, borrowed from a container for the
/// duration of a single traversal
pub enum TraversalTarget<'a> {
    /// The two cells of the direct sum container
    DirectSum {
        owned: &'a mut ParticleCell,
        halo: &'a mut ParticleCell,
    },
    /// A grid of linked cells
    Cells(&'a mut CellBlock),
    /// A grid of linked cells, and neighbor lists built on top of it
    VerletCells {
        cells: &'a mut CellBlock,
        lists: &'a dyn CellNeighborList,
    },
    /// Clusters of particles, organized in towers
    Clusters(&'a mut ClusterTowers),
}

impl TraversalTarget<'_> {
    /// Name of this target, for error messages
    pub fn name(&self) -> &'static str {
        match self {
            TraversalTarget::DirectSum { .. } => "direct sum cells",
            TraversalTarget::Cells(_) => "linked cells",
            TraversalTarget::VerletCells { .. } => "verlet lists cells",
            TraversalTarget::Clusters(_) => "cluster towers",
        }
    }
}

/// A `Traversal` iterates over all interacting pairs of particles in a
/// container, using a specific data layout, and exploiting or not Newton's
/// third law.
pub trait Traversal: Send + Sync {
    /// Which traversal is this?
    fn option(&self) -> TraversalOption;

    /// Data layout used by this traversal
    fn data_layout(&self) -> DataLayoutOption;

    /// Does this traversal use Newton's third law?
    fn use_newton3(&self) -> bool;

    /// Can this traversal be used with the container and functor it was
    /// created for?
    fn is_applicable(&self) -> bool;

    /// Get the signature of this traversal
    fn signature(&self) -> TraversalSignature {
        TraversalSignature {
            traversal: self.option(),
            data_layout: self.data_layout(),
            newton3: Newton3Option::from(self.use_newton3()),
        }
    }

    /// Prepare the cells for this traversal, converting them to the right
    /// data layout.
    fn init_traversal(&self, cells: &mut [ParticleCell]) -> Result<(), Error> {
        DataLayoutConverter::new(self.data_layout()).load_data(cells)
    }

    /// Write back the results of the traversal to the particles.
    fn end_traversal(&self, cells: &mut [ParticleCell]) -> Result<(), Error> {
        DataLayoutConverter::new(self.data_layout()).store_data(cells)
    }

    /// Apply the `functor` to all pairs of particles in the `target`. The
    /// cells of the target must have been prepared with `init_traversal`.
    fn traverse(&self, target: TraversalTarget<'_>, functor: &dyn PairwiseFunctor) -> Result<(), Error>;
}

/// Error for a traversal used with the wrong kind of container
fn wrong_target(option: TraversalOption, target: &TraversalTarget<'_>) -> Error {
    Error::Internal(format!("traversal {} can not be used with {}", option, target.name()))
}
