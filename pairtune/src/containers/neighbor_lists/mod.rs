//! Neighbor lists built on top of linked cells.
//!
//! The lists are built in array of structures form, referencing particles by
//! their `(cell, slot)` index in the cell block. A structure of arrays form,
//! using dense particle indexes in the concatenation of all cells, is then
//! generated from the AoS lists. Both are invalidated by any change to the
//! content of the cells.

use crate::options::{ContainerOption, TraversalOption};
use crate::Error;

use super::CellBlock;

mod all_cells;
pub use self::all_cells::AllCellsNeighborList;

mod cell_pair;
pub use self::cell_pair::CellPairNeighborList;

/// Parameters used to build a set of neighbor lists
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborListBuild {
    /// Were the lists built to be used with Newton's third law?
    pub newton3: bool,
    pub cutoff: f64,
    pub skin: f64,
    /// Traversal of the linked cells used to build the lists
    pub build_traversal: TraversalOption,
}

impl NeighborListBuild {
    /// Do the lists contain each pair only once? This is the case for lists
    /// built with `lc-c18`, where the lists of a cell only reference the
    /// cell itself and cells at a forward offset. Lists built with `lc-c01`
    /// contain all the neighbors of every particle.
    pub fn half_lists(&self) -> bool {
        self.build_traversal == TraversalOption::LcC18
    }
}

/// Common interface of neighbor lists based on linked cells
pub trait CellNeighborList: Send + Sync {
    /// Container using this kind of neighbor list
    fn container_type(&self) -> ContainerOption;

    /// Build the lists for all particles in the `cells`. With the `lc-c18`
    /// `build_traversal`, each pair of particles appears only once in the
    /// lists, in the list of the particle in the cell with the smallest
    /// index. With `lc-c01`, `i` is in the list of `j` and `j` in the list of
    /// `i`. Lists built with `lc-c01` can not be used with `newton3`.
    ///
    /// Particles are neighbors if they are closer than `cutoff + skin`.
    fn build_aos_neighbor_list(
        &mut self,
        cells: &CellBlock,
        newton3: bool,
        cutoff: f64,
        skin: f64,
        interaction_length: f64,
        build_traversal: TraversalOption,
    ) -> Result<(), Error>;

    /// Generate the SoA representation of the lists from the AoS one
    fn generate_soa_from_aos(&mut self, cells: &CellBlock);

    /// Get the parameters used for the last build, if any
    fn build_parameters(&self) -> Option<NeighborListBuild>;

    /// Forget about all the lists, they will need to be rebuilt before the
    /// next use
    fn invalidate(&mut self);

    /// Number of neighbors of the particle at `slot` inside `cell`
    fn number_of_partners(&self, cell: usize, slot: usize) -> usize;

    /// Call `function(slot, neighbor_cell, neighbor_slot)` for all pairs in
    /// the lists of particles inside `cell`
    fn for_each_pair(&self, cell: usize, function: &mut dyn FnMut(usize, usize, usize));

    /// Call `function(index, neighbors)` for all the particles of `cell`,
    /// using dense indexes from the SoA lists
    fn for_each_soa_list(&self, cell: usize, function: &mut dyn FnMut(usize, &[usize]));
}

/// Offset of each cell in the concatenation of all cells, used for dense
/// particle indexes
fn cells_offsets(cells: &CellBlock) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(cells.len());
    let mut current = 0;
    for cell in cells.cells() {
        offsets.push(current);
        current += cell.len();
    }
    return offsets;
}

/// Check the parameters of a neighbor list build
fn check_build(newton3: bool, cutoff: f64, skin: f64, interaction_length: f64, build_traversal: TraversalOption) -> Result<(), Error> {
    if !matches!(build_traversal, TraversalOption::LcC01 | TraversalOption::LcC18) {
        return Err(Error::InvalidParameter(format!(
            "neighbor lists must be built with lc-c01 or lc-c18, got {}", build_traversal
        )));
    }

    if newton3 && build_traversal == TraversalOption::LcC01 {
        return Err(Error::InvalidParameter(
            "neighbor lists built with lc-c01 can not be used with newton3".into()
        ));
    }

    if !(cutoff > 0.0) || skin < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "invalid cutoff ({}) or skin ({}) for neighbor lists", cutoff, skin
        )));
    }

    if cutoff + skin > interaction_length * (1.0 + 1e-12) {
        return Err(Error::InvalidParameter(format!(
            "cutoff + skin ({}) is larger than the interaction length of the cells ({})",
            cutoff + skin, interaction_length
        )));
    }

    return Ok(());
}

/// Get the traversal of linked cells used to build the lists for a
/// traversal of verlet lists cells: `c01` traversals need the full lists,
/// and `c18` traversals the half lists.
pub fn build_traversal_for(traversal: TraversalOption) -> TraversalOption {
    match traversal {
        TraversalOption::VlcC01 | TraversalOption::VlpC01 => TraversalOption::LcC01,
        _ => TraversalOption::LcC18,
    }
}
