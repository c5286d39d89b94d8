use crate::options::ContainerOption;
use crate::particles::{IteratorBehavior, Particle};
use crate::traversals::{Traversal, TraversalSelectorInfo, TraversalTarget};
use crate::{Error, PairwiseFunctor, Vector3D};

use super::{CellBlock, ParticleContainer, check_traversal, check_owned, check_halo};
use super::{mark_leaving_particles, split_leaving_particles};

/// Linked cells container: particles are sorted in a regular grid of cells,
/// and only the particles in neighboring cells are checked for interactions.
#[derive(Debug, Clone)]
pub struct LinkedCells {
    pub(crate) cells: CellBlock,
    cutoff: f64,
    skin: f64,
}

impl LinkedCells {
    pub fn new(box_min: Vector3D, box_max: Vector3D, cutoff: f64, skin: f64, cell_size_factor: f64) -> Result<LinkedCells, Error> {
        Ok(LinkedCells {
            cells: CellBlock::new(box_min, box_max, cutoff + skin, cell_size_factor)?,
            cutoff: cutoff,
            skin: skin,
        })
    }

    /// Get the cells of this container
    pub fn cells(&self) -> &CellBlock {
        &self.cells
    }
}

impl ParticleContainer for LinkedCells {
    fn container_type(&self) -> ContainerOption {
        ContainerOption::LinkedCells
    }

    fn box_min(&self) -> Vector3D {
        self.cells.box_min()
    }

    fn box_max(&self) -> Vector3D {
        self.cells.box_max()
    }

    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn skin(&self) -> f64 {
        self.skin
    }

    fn cell_size_factor(&self) -> f64 {
        self.cells.cell_size_factor()
    }

    fn add_particle(&mut self, mut particle: Particle) -> Result<(), Error> {
        check_owned(&mut particle, self.box_min(), self.box_max())?;
        self.cells.push(particle);
        return Ok(());
    }

    fn add_halo_particle(&mut self, mut particle: Particle) -> Result<(), Error> {
        check_halo(&mut particle, self.box_min(), self.box_max(), self.interaction_length())?;
        self.cells.push(particle);
        return Ok(());
    }

    fn insert_particles(&mut self, particles: Vec<Particle>) {
        for particle in particles {
            if !particle.is_dummy() {
                self.cells.push(particle);
            }
        }
    }

    fn take_all_particles(&mut self) -> Vec<Particle> {
        self.cells.take_particles()
    }

    fn delete_halo_particles(&mut self) {
        for cell in self.cells.cells_mut() {
            cell.particles.retain(|particle| !particle.is_halo());
        }
    }

    fn for_each(&self, behavior: IteratorBehavior, function: &mut dyn FnMut(&Particle)) {
        for particle in self.cells.cells().iter().flat_map(|cell| &cell.particles) {
            if behavior.accepts(particle.ownership) {
                function(particle);
            }
        }
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, function: &mut dyn FnMut(&mut Particle)) {
        for particle in self.cells.cells_mut().iter_mut().flat_map(|cell| &mut cell.particles) {
            if behavior.accepts(particle.ownership) {
                function(particle);
            }
        }
    }

    fn update_container(&mut self, keep_neighbor_lists_valid: bool) -> Result<Vec<Particle>, Error> {
        let (box_min, box_max) = (self.box_min(), self.box_max());
        if keep_neighbor_lists_valid {
            let particles = self.cells.cells_mut().iter_mut().flat_map(|cell| &mut cell.particles);
            return Ok(mark_leaving_particles(particles, box_min, box_max));
        }

        let mut particles = self.cells.take_particles();
        let leaving = split_leaving_particles(&mut particles, box_min, box_max);
        for particle in particles {
            self.cells.push(particle);
        }
        return Ok(leaving);
    }

    fn traversal_info(&self) -> TraversalSelectorInfo {
        TraversalSelectorInfo {
            cells_per_dimension: self.cells.cells_per_dimension(),
            interaction_length: self.interaction_length(),
            cell_length: self.cells.cell_length(),
            cluster_size: 0,
        }
    }

    fn rebuild_neighbor_lists(&mut self, traversal: &dyn Traversal) -> Result<(), Error> {
        check_traversal(self.container_type(), traversal)?;
        self.cells.rebin();
        return Ok(());
    }

    fn iterate_pairwise(&mut self, traversal: &dyn Traversal, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        check_traversal(self.container_type(), traversal)?;

        traversal.init_traversal(self.cells.as_slice_mut()?)?;
        traversal.traverse(TraversalTarget::Cells(&mut self.cells), functor)?;
        traversal.end_traversal(self.cells.as_slice_mut()?)?;

        return Ok(());
    }
}
