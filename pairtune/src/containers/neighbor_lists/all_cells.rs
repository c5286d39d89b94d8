use log::debug;
use rayon::prelude::*;

use crate::containers::{CellBlock, offset_cell};
use crate::options::{ContainerOption, TraversalOption};
use crate::Error;

use super::{CellNeighborList, NeighborListBuild, cells_offsets, check_build};

/// One neighbor list per particle, containing the `(cell, slot)` indexes of
/// all the particles within the interaction length.
///
/// With half lists (built with `lc-c18`), only neighbors in cells with a
/// larger or equal flat index are stored, and only neighbors with a larger
/// slot inside the same cell.
#[derive(Debug, Clone, Default)]
pub struct AllCellsNeighborList {
    /// `aos_lists[cell][slot]` contains the neighbors of the particle at
    /// `slot` in `cell`
    aos_lists: Vec<Vec<Vec<(usize, usize)>>>,
    /// `soa_lists[cell][slot]` contains the dense index of the neighbors of
    /// the particle at `slot` in `cell`
    soa_lists: Vec<Vec<Vec<usize>>>,
    /// dense index of the first particle of each cell
    offsets: Vec<usize>,
    parameters: Option<NeighborListBuild>,
}

impl CellNeighborList for AllCellsNeighborList {
    fn container_type(&self) -> ContainerOption {
        ContainerOption::VerletListsCells
    }

    #[time_graph::instrument(name = "AllCellsNeighborList::build")]
    fn build_aos_neighbor_list(
        &mut self,
        cells: &CellBlock,
        newton3: bool,
        cutoff: f64,
        skin: f64,
        interaction_length: f64,
        build_traversal: TraversalOption,
    ) -> Result<(), Error> {
        self.invalidate();
        check_build(newton3, cutoff, skin, interaction_length, build_traversal)?;
        let half = build_traversal == TraversalOption::LcC18;

        let shape = cells.cells_per_dimension();
        let offsets = cells.neighbor_offsets();
        let range2 = (cutoff + skin) * (cutoff + skin);
        let all_cells = cells.as_slice()?;

        self.aos_lists = (0..all_cells.len()).into_par_iter().map(|flat| {
            let index = cells.unflatten(flat);
            let particles = &all_cells[flat].particles;

            let mut lists = vec![Vec::new(); particles.len()];
            for &offset in &offsets {
                let neighbor = match offset_cell(shape, index, offset) {
                    Some(neighbor) => cells.flat_index(neighbor),
                    None => continue,
                };

                if half && neighbor < flat {
                    continue;
                }

                for (slot, particle) in particles.iter().enumerate() {
                    if particle.is_dummy() {
                        continue;
                    }

                    for (other_slot, other) in all_cells[neighbor].particles.iter().enumerate() {
                        if other.is_dummy() {
                            continue;
                        }

                        if neighbor == flat && (other_slot == slot || (half && other_slot < slot)) {
                            continue;
                        }

                        if (particle.position - other.position).norm2() <= range2 {
                            lists[slot].push((neighbor, other_slot));
                        }
                    }
                }
            }
            lists
        }).collect();

        self.parameters = Some(NeighborListBuild {
            newton3: newton3,
            cutoff: cutoff,
            skin: skin,
            build_traversal: build_traversal,
        });

        debug!(
            "built verlet lists for {} cells with {} pairs (newton3 = {}, built with {})",
            self.aos_lists.len(),
            self.aos_lists.iter().flatten().map(Vec::len).sum::<usize>(),
            newton3, build_traversal,
        );

        self.generate_soa_from_aos(cells);
        return Ok(());
    }

    fn generate_soa_from_aos(&mut self, cells: &CellBlock) {
        self.offsets = cells_offsets(cells);
        let offsets = &self.offsets;
        self.soa_lists = self.aos_lists.iter().map(|cell| {
            cell.iter().map(|list| {
                list.iter().map(|&(cell, slot)| offsets[cell] + slot).collect()
            }).collect()
        }).collect();
    }

    fn build_parameters(&self) -> Option<NeighborListBuild> {
        self.parameters
    }

    fn invalidate(&mut self) {
        self.aos_lists.clear();
        self.soa_lists.clear();
        self.offsets.clear();
        self.parameters = None;
    }

    fn number_of_partners(&self, cell: usize, slot: usize) -> usize {
        self.aos_lists.get(cell).and_then(|lists| lists.get(slot)).map_or(0, Vec::len)
    }

    fn for_each_pair(&self, cell: usize, function: &mut dyn FnMut(usize, usize, usize)) {
        if let Some(lists) = self.aos_lists.get(cell) {
            for (slot, list) in lists.iter().enumerate() {
                for &(neighbor_cell, neighbor_slot) in list {
                    function(slot, neighbor_cell, neighbor_slot);
                }
            }
        }
    }

    fn for_each_soa_list(&self, cell: usize, function: &mut dyn FnMut(usize, &[usize])) {
        if let Some(lists) = self.soa_lists.get(cell) {
            for (slot, list) in lists.iter().enumerate() {
                function(self.offsets[cell] + slot, list);
            }
        }
    }
}
