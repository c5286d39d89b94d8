use std::cell::RefCell;

use rayon::prelude::*;
use thread_local::ThreadLocal;

use crate::containers::{CellBlock, CellNeighborList, build_traversal_for};
use crate::options::{DataLayoutOption, TraversalOption};
use crate::particles::{Particle, ParticleCell, SoABuffer};
use crate::{Error, PairwiseFunctor, Vector3D};

use super::cell_functor::zero_force_copy;
use super::coloring::{SharedCells, colored_sweep, c18_stride, two_mut};
use super::{Traversal, TraversalTarget, wrong_target};

/// Traversals of the neighbor lists built on top of linked cells, for both
/// the verlet lists cells (`vlc-*`) and pairwise verlet lists (`vlp-*`)
/// containers.
///
/// - `c18` traversals use half lists, where each pair appears once in the
///   lists of the cell with the smallest index. Cells are processed with the
///   c18 coloring, and both particles of a pair are updated, in one call to
///   the functor with Newton's third law or in two calls without it.
/// - `c01` traversals use full lists, and process all the cells in parallel
///   without coloring. Each cell only computes the forces on its own
///   particles, reading the other cells. They can not use Newton's third law.
///
/// In the SoA layout, all the cells are concatenated in a single buffer and
/// every thread accumulates forces in its own copy of this buffer.
#[derive(Debug, Clone)]
pub struct VerletCellsTraversal {
    option: TraversalOption,
    data_layout: DataLayoutOption,
    newton3: bool,
    applicable: bool,
}

impl VerletCellsTraversal {
    pub fn new(option: TraversalOption, data_layout: DataLayoutOption, newton3: bool, applicable: bool) -> Result<VerletCellsTraversal, Error> {
        if !matches!(option, TraversalOption::VlcC01 | TraversalOption::VlcC18 | TraversalOption::VlpC01 | TraversalOption::VlpC18) {
            return Err(Error::InvalidParameter(format!(
                "{} is not a verlet lists cells traversal", option
            )));
        }

        Ok(VerletCellsTraversal {
            option: option,
            data_layout: data_layout,
            newton3: newton3,
            applicable: applicable,
        })
    }

    /// AoS traversal of half lists with the c18 coloring
    fn traverse_aos_c18(&self, block: &mut CellBlock, lists: &dyn CellNeighborList, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        let shape = block.cells_per_dimension();
        let stride = c18_stride(block.overlap());
        let flat = |index: [usize; 3]| (index[0] * shape[1] + index[1]) * shape[2] + index[2];
        let cells = SharedCells::new(block.as_slice_mut()?);
        let newton3 = self.newton3;

        let interact = |i: &mut Particle, j: &mut Particle| {
            if i.is_dummy() || j.is_dummy() {
                return;
            }

            if newton3 {
                functor.aos(i, j, true);
            } else {
                functor.aos(i, j, false);
                functor.aos(j, i, false);
            }
        };

        colored_sweep(shape, stride, |base| {
            let base = flat(base);
            lists.for_each_pair(base, &mut |slot, neighbor_cell, neighbor_slot| {
                // SAFETY: the half lists of `base` only reference `base` and
                // cells at forward offsets, which are not accessed by any
                // other base cell of the same color. References do not
                // outlive a single pair.
                if neighbor_cell == base {
                    let cell = unsafe { cells.get(base) };
                    let (i, j) = two_mut(&mut cell.particles, slot, neighbor_slot);
                    interact(i, j);
                } else {
                    let (cell, neighbor) = unsafe { cells.get_pair(base, neighbor_cell) };
                    interact(&mut cell.particles[slot], &mut neighbor.particles[neighbor_slot]);
                }
            });
        });

        return Ok(());
    }

    /// AoS traversal of full lists: the forces on the particles of each cell
    /// are computed in parallel while reading all cells, and added to the
    /// cells at the end
    fn traverse_aos_c01(&self, block: &mut CellBlock, lists: &dyn CellNeighborList, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        let halo_cells = halo_mask(block);
        let cells = block.as_slice_mut()?;

        let shared = &*cells;
        let forces = (0..shared.len()).into_par_iter().map(|current| {
            if halo_cells[current] {
                return Vec::new();
            }

            let mut targets = zero_force_copy(&shared[current].particles);
            lists.for_each_pair(current, &mut |slot, neighbor_cell, neighbor_slot| {
                let i = &mut targets[slot];
                let j = &shared[neighbor_cell].particles[neighbor_slot];
                if !i.is_dummy() && !j.is_dummy() {
                    functor.aos_one_way(i, j);
                }
            });
            targets.into_iter().map(|particle| particle.force).collect()
        }).collect::<Vec<Vec<Vector3D>>>();

        cells.par_iter_mut().zip(&forces).for_each(|(cell, forces)| {
            for (particle, force) in cell.particles.iter_mut().zip(forces) {
                particle.force += *force;
            }
        });

        return Ok(());
    }

    /// SoA traversal, using the concatenation of all cells' buffers. Every
    /// thread accumulates forces in its own copy of the buffer, and the
    /// copies are summed at the end.
    fn traverse_soa(&self, block: &mut CellBlock, lists: &dyn CellNeighborList, functor: &dyn PairwiseFunctor, half_lists: bool) -> Result<(), Error> {
        let halo_cells = halo_mask(block);
        let cells = block.as_slice_mut()?;

        let mut global = SoABuffer::default();
        for cell in cells.iter() {
            global.append(&cell.soa);
        }

        let mut template = global.clone();
        template.reset_forces();

        let buffers = ThreadLocal::new();
        let newton3 = self.newton3;
        (0..cells.len()).into_par_iter().for_each(|flat| {
            // with full lists, the halo particles do not need forces
            if !half_lists && halo_cells[flat] {
                return;
            }

            let mut buffer = buffers.get_or(|| RefCell::new(template.clone())).borrow_mut();
            lists.for_each_soa_list(flat, &mut |index, neighbors| {
                functor.soa_verlet(&mut buffer, index, neighbors, newton3);
                if half_lists && !newton3 {
                    for &neighbor in neighbors {
                        functor.soa_verlet(&mut buffer, neighbor, &[index], false);
                    }
                }
            });
        });

        for buffer in buffers {
            global.add_forces(&buffer.into_inner());
        }

        scatter_forces(cells, &global);
        return Ok(());
    }
}

/// For each cell of the block, is it a halo cell?
fn halo_mask(block: &CellBlock) -> Vec<bool> {
    (0..block.len()).map(|flat| block.is_halo_cell(block.unflatten(flat))).collect()
}

/// Copy the forces of the global buffer back to the buffers of each cell
fn scatter_forces(cells: &mut [ParticleCell], global: &SoABuffer) {
    let mut offset = 0;
    for cell in cells {
        cell.soa.copy_forces(global, offset);
        offset += cell.soa.len();
    }
}

impl Traversal for VerletCellsTraversal {
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

    #[time_graph::instrument(name = "VerletCellsTraversal::traverse")]
    fn traverse(&self, target: TraversalTarget<'_>, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        let (block, lists) = match target {
            TraversalTarget::VerletCells { cells, lists } => (cells, lists),
            target => return Err(wrong_target(self.option, &target)),
        };

        if lists.container_type() != self.option.container() {
            return Err(Error::Internal(format!(
                "traversal {} can not use neighbor lists for {}", self.option, lists.container_type()
            )));
        }

        let half_lists = match lists.build_parameters() {
            Some(parameters) if parameters.newton3 == self.newton3
                && parameters.build_traversal == build_traversal_for(self.option) => parameters.half_lists(),
            _ => {
                return Err(Error::Internal(format!(
                    "neighbor lists are not built for {}", self.signature()
                )));
            }
        };

        if self.newton3 && !self.option.supports_newton3() {
            return Err(Error::InvalidParameter(format!("{} does not support newton3", self.option)));
        }

        match self.data_layout {
            DataLayoutOption::Aos if half_lists => self.traverse_aos_c18(block, lists, functor),
            DataLayoutOption::Aos => self.traverse_aos_c01(block, lists, functor),
            DataLayoutOption::Soa => self.traverse_soa(block, lists, functor, half_lists),
            DataLayoutOption::Device => Err(Error::Unsupported(format!(
                "{} has no implementation for device data", self.option
            ))),
        }
    }
}
