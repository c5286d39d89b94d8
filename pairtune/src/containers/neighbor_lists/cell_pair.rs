use indexmap::IndexSet;
use log::debug;
use rayon::prelude::*;

use crate::containers::{CellBlock, offset_cell};
use crate::options::{ContainerOption, TraversalOption};
use crate::Error;

use super::{CellNeighborList, NeighborListBuild, cells_offsets, check_build};

/// Neighbor lists for the pairwise verlet lists container: the neighbors of
/// a particle are split by the cell they belong to, with one list per pair
/// of cells.
#[derive(Debug, Clone, Default)]
pub struct CellPairNeighborList {
    /// `aos_lists[cell][local][slot]` contains the slots of the neighbors of
    /// the particle at `slot` in `cell`, which belong to the neighboring cell
    /// with local index `local`
    aos_lists: Vec<Vec<Vec<Vec<usize>>>>,
    /// For each cell, the flat index of the neighboring cells, in the order
    /// of their local index
    global_to_local: Vec<IndexSet<usize>>,
    /// `soa_lists[cell][local]` contains pairs of dense particle index and
    /// dense index of its neighbors in the neighboring cell `local`
    soa_lists: Vec<Vec<Vec<(usize, Vec<usize>)>>>,
    parameters: Option<NeighborListBuild>,
}

impl CellPairNeighborList {
    /// Get the local index of the neighboring cell `neighbor` in the lists of
    /// `cell`
    pub fn local_index(&self, cell: usize, neighbor: usize) -> Option<usize> {
        self.global_to_local.get(cell).and_then(|map| map.get_index_of(&neighbor))
    }

    /// Number of neighboring cells stored for `cell`
    pub fn number_of_cell_pairs(&self, cell: usize) -> usize {
        self.global_to_local.get(cell).map_or(0, IndexSet::len)
    }
}

impl CellNeighborList for CellPairNeighborList {
    fn container_type(&self) -> ContainerOption {
        ContainerOption::PairwiseVerletLists
    }

    #[time_graph::instrument(name = "CellPairNeighborList::build")]
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

        let built = (0..all_cells.len()).into_par_iter().map(|flat| {
            let index = cells.unflatten(flat);
            let particles = &all_cells[flat].particles;

            let mut global_to_local = IndexSet::new();
            let mut lists = Vec::new();
            for &offset in &offsets {
                let neighbor = match offset_cell(shape, index, offset) {
                    Some(neighbor) => cells.flat_index(neighbor),
                    None => continue,
                };

                if half && neighbor < flat {
                    continue;
                }

                let mut pair_lists = vec![Vec::new(); particles.len()];
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
                            pair_lists[slot].push(other_slot);
                        }
                    }
                }

                global_to_local.insert(neighbor);
                lists.push(pair_lists);
            }

            (global_to_local, lists)
        }).collect::<Vec<_>>();

        let (global_to_local, aos_lists): (Vec<_>, Vec<_>) = built.into_iter().unzip();
        self.global_to_local = global_to_local;
        self.aos_lists = aos_lists;

        self.parameters = Some(NeighborListBuild {
            newton3: newton3,
            cutoff: cutoff,
            skin: skin,
            build_traversal: build_traversal,
        });

        debug!(
            "built pairwise verlet lists for {} cells with {} cell pairs (newton3 = {}, built with {})",
            self.aos_lists.len(),
            self.global_to_local.iter().map(IndexSet::len).sum::<usize>(),
            newton3, build_traversal,
        );

        self.generate_soa_from_aos(cells);
        return Ok(());
    }

    fn generate_soa_from_aos(&mut self, cells: &CellBlock) {
        let offsets = cells_offsets(cells);
        self.soa_lists = self.aos_lists.iter().enumerate().map(|(cell, pairs)| {
            pairs.iter().enumerate().map(|(local, lists)| {
                let neighbor = self.global_to_local[cell][local];
                lists.iter().enumerate().map(|(slot, list)| {
                    let partners = list.iter().map(|&other_slot| offsets[neighbor] + other_slot).collect();
                    (offsets[cell] + slot, partners)
                }).collect()
            }).collect()
        }).collect();
    }

    fn build_parameters(&self) -> Option<NeighborListBuild> {
        self.parameters
    }

    fn invalidate(&mut self) {
        self.aos_lists.clear();
        self.global_to_local.clear();
        self.soa_lists.clear();
        self.parameters = None;
    }

    fn number_of_partners(&self, cell: usize, slot: usize) -> usize {
        self.aos_lists.get(cell).map_or(0, |pairs| {
            pairs.iter().filter_map(|lists| lists.get(slot)).map(Vec::len).sum()
        })
    }

    fn for_each_pair(&self, cell: usize, function: &mut dyn FnMut(usize, usize, usize)) {
        let (pairs, global_to_local) = match (self.aos_lists.get(cell), self.global_to_local.get(cell)) {
            (Some(pairs), Some(map)) => (pairs, map),
            _ => return,
        };

        for (lists, &neighbor) in pairs.iter().zip(global_to_local) {
            for (slot, list) in lists.iter().enumerate() {
                for &neighbor_slot in list {
                    function(slot, neighbor, neighbor_slot);
                }
            }
        }
    }

    fn for_each_soa_list(&self, cell: usize, function: &mut dyn FnMut(usize, &[usize])) {
        if let Some(pairs) = self.soa_lists.get(cell) {
            for lists in pairs {
                for (index, partners) in lists {
                    function(*index, partners);
                }
            }
        }
    }
}
