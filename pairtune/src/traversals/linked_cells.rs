use rayon::prelude::*;

use crate::containers::{CellBlock, offset_cell, is_forward};
use crate::options::{DataLayoutOption, TraversalOption};
use crate::{Error, PairwiseFunctor};

use super::cell_functor::CellFunctor;
use super::coloring::{SharedCells, colored_sweep, c08_stride, c18_stride};
use super::{Traversal, TraversalTarget, wrong_target};

/// Traversals of the linked cells container.
///
/// - `lc-c01` processes every cell in parallel without coloring, computing
///   the forces from all neighboring cells on the particles of this cell
///   only. It can not use Newton's third law.
/// - `lc-c08` uses a base cell and all cells in the `[base, base + overlap]`
///   block, and processes all pairs of cells inside this block involving the
///   base cell at one corner of the pair.
/// - `lc-c18` uses a base cell and all cells at a forward offset from it.
#[derive(Debug, Clone)]
pub struct LinkedCellsTraversal {
    option: TraversalOption,
    data_layout: DataLayoutOption,
    newton3: bool,
    applicable: bool,
}

impl LinkedCellsTraversal {
    pub fn new(option: TraversalOption, data_layout: DataLayoutOption, newton3: bool, applicable: bool) -> Result<LinkedCellsTraversal, Error> {
        if !matches!(option, TraversalOption::LcC01 | TraversalOption::LcC08 | TraversalOption::LcC18) {
            return Err(Error::InvalidParameter(format!(
                "{} is not a linked cells traversal", option
            )));
        }

        Ok(LinkedCellsTraversal {
            option: option,
            data_layout: data_layout,
            newton3: newton3,
            applicable: applicable,
        })
    }

    /// Every cell computes the forces on its own particles, only reading the
    /// neighboring cells. The forces are added to the cells once all of them
    /// are computed.
    fn traverse_c01(&self, block: &mut CellBlock, cell_functor: &CellFunctor) -> Result<(), Error> {
        let shape = block.cells_per_dimension();
        let overlap = block.overlap();
        let offsets = block.neighbor_offsets().into_iter()
            .filter(|&offset| offset != [0, 0, 0])
            .collect::<Vec<_>>();

        let flat = |index: [usize; 3]| (index[0] * shape[1] + index[1]) * shape[2] + index[2];
        let cells = block.as_slice_mut()?;

        let shared = &*cells;
        let forces = (0..shared.len()).into_par_iter().map(|current| {
            let index = [current / (shape[1] * shape[2]), (current / shape[2]) % shape[1], current % shape[2]];
            let is_halo = (0..3).any(|d| index[d] < overlap[d] || index[d] >= shape[d] - overlap[d]);
            if is_halo {
                return Vec::new();
            }

            let neighbors = offsets.iter()
                .filter_map(|&offset| offset_cell(shape, index, offset))
                .map(|neighbor| &shared[flat(neighbor)]);
            cell_functor.one_way_forces(&shared[current], neighbors)
        }).collect::<Vec<_>>();

        cells.par_iter_mut().zip(&forces).for_each(|(cell, forces)| {
            if !forces.is_empty() {
                cell_functor.add_forces(cell, forces);
            }
        });

        return Ok(());
    }

    fn traverse_c08(&self, block: &mut CellBlock, cell_functor: &CellFunctor) -> Result<(), Error> {
        let shape = block.cells_per_dimension();
        let stride = c08_stride(block.overlap());
        let offsets = block.neighbor_offsets().into_iter()
            .filter(|&offset| is_forward(offset))
            .collect::<Vec<_>>();

        let flat = |index: [usize; 3]| (index[0] * shape[1] + index[1]) * shape[2] + index[2];
        let cells = SharedCells::new(block.as_slice_mut()?);

        colored_sweep(shape, stride, |base| {
            // SAFETY (for all unsafe blocks below): all cells accessed from
            // this base are inside `[base, base + overlap]`, and the c08
            // coloring ensures these blocks are disjoint for all the base
            // cells of the same color.
            cell_functor.process_cell(unsafe { cells.get(flat(base)) });

            for &offset in &offsets {
                // the pair (first, first + offset) with both cells inside the
                // block starting at base
                let start = [
                    (-offset[0]).max(0),
                    (-offset[1]).max(0),
                    (-offset[2]).max(0),
                ];

                let first = match offset_cell(shape, base, start) {
                    Some(first) => first,
                    None => continue,
                };

                let second = match offset_cell(shape, first, offset) {
                    Some(second) => second,
                    None => continue,
                };

                let (first, second) = unsafe { cells.get_pair(flat(first), flat(second)) };
                cell_functor.process_pair(first, second);
            }
        });

        return Ok(());
    }

    fn traverse_c18(&self, block: &mut CellBlock, cell_functor: &CellFunctor) -> Result<(), Error> {
        let shape = block.cells_per_dimension();
        let stride = c18_stride(block.overlap());
        let offsets = block.neighbor_offsets().into_iter()
            .filter(|&offset| is_forward(offset))
            .collect::<Vec<_>>();

        let flat = |index: [usize; 3]| (index[0] * shape[1] + index[1]) * shape[2] + index[2];
        let cells = SharedCells::new(block.as_slice_mut()?);

        colored_sweep(shape, stride, |base| {
            // SAFETY (for both unsafe blocks): cells accessed from this base
            // are at forward offsets, which the c18 coloring keeps disjoint
            // for all the base cells of the same color.
            cell_functor.process_cell(unsafe { cells.get(flat(base)) });

            for &offset in &offsets {
                if let Some(neighbor) = offset_cell(shape, base, offset) {
                    let (first, second) = unsafe { cells.get_pair(flat(base), flat(neighbor)) };
                    cell_functor.process_pair(first, second);
                }
            }
        });

        return Ok(());
    }
}

impl Traversal for LinkedCellsTraversal {
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

    #[time_graph::instrument(name = "LinkedCellsTraversal::traverse")]
    fn traverse(&self, target: TraversalTarget<'_>, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        let block = match target {
            TraversalTarget::Cells(block) => block,
            target => return Err(wrong_target(self.option, &target)),
        };

        let cell_functor = CellFunctor::new(functor, self.data_layout, self.newton3)?;
        match self.option {
            TraversalOption::LcC01 => {
                if self.newton3 {
                    return Err(Error::InvalidParameter("lc-c01 does not support newton3".into()));
                }
                self.traverse_c01(block, &cell_functor)
            }
            TraversalOption::LcC08 => self.traverse_c08(block, &cell_functor),
            TraversalOption::LcC18 => self.traverse_c18(block, &cell_functor),
            _ => Err(Error::Internal(format!("unexpected linked cells traversal {}", self.option))),
        }
    }
}
