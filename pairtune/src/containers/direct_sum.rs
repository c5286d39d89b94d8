use crate::options::ContainerOption;
use crate::particles::{IteratorBehavior, Particle, ParticleCell};
use crate::traversals::{Traversal, TraversalSelectorInfo, TraversalTarget};
use crate::{Error, PairwiseFunctor, Vector3D};

use super::{ParticleContainer, check_traversal, check_owned, check_halo};
use super::{mark_leaving_particles, split_leaving_particles};

/// Direct sum container, computing the interactions between all pairs of
/// particles. Owned particles are stored in one cell, and halo particles in
/// another one.
#[derive(Debug, Clone)]
pub struct DirectSum {
    box_min: Vector3D,
    box_max: Vector3D,
    cutoff: f64,
    skin: f64,
    /// owned particles in the first cell, halo particles in the second
    cells: [ParticleCell; 2],
}

impl DirectSum {
    pub fn new(box_min: Vector3D, box_max: Vector3D, cutoff: f64, skin: f64) -> DirectSum {
        DirectSum {
            box_min: box_min,
            box_max: box_max,
            cutoff: cutoff,
            skin: skin,
            cells: [ParticleCell::new(), ParticleCell::new()],
        }
    }
}

impl ParticleContainer for DirectSum {
    fn container_type(&self) -> ContainerOption {
        ContainerOption::DirectSum
    }

    fn box_min(&self) -> Vector3D {
        self.box_min
    }

    fn box_max(&self) -> Vector3D {
        self.box_max
    }

    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn skin(&self) -> f64 {
        self.skin
    }

    fn add_particle(&mut self, mut particle: Particle) -> Result<(), Error> {
        check_owned(&mut particle, self.box_min, self.box_max)?;
        self.cells[0].push(particle);
        return Ok(());
    }

    fn add_halo_particle(&mut self, mut particle: Particle) -> Result<(), Error> {
        check_halo(&mut particle, self.box_min, self.box_max, self.interaction_length())?;
        self.cells[1].push(particle);
        return Ok(());
    }

    fn insert_particles(&mut self, particles: Vec<Particle>) {
        for particle in particles {
            if particle.is_halo() {
                self.cells[1].push(particle);
            } else if particle.is_owned() {
                self.cells[0].push(particle);
            }
        }
    }

    fn take_all_particles(&mut self) -> Vec<Particle> {
        let mut particles = std::mem::take(&mut self.cells[0].particles);
        particles.append(&mut self.cells[1].particles);
        return particles;
    }

    fn delete_halo_particles(&mut self) {
        self.cells[1].particles.clear();
    }

    fn for_each(&self, behavior: IteratorBehavior, function: &mut dyn FnMut(&Particle)) {
        for particle in self.cells.iter().flat_map(|cell| &cell.particles) {
            if behavior.accepts(particle.ownership) {
                function(particle);
            }
        }
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, function: &mut dyn FnMut(&mut Particle)) {
        for particle in self.cells.iter_mut().flat_map(|cell| &mut cell.particles) {
            if behavior.accepts(particle.ownership) {
                function(particle);
            }
        }
    }

    fn update_container(&mut self, keep_neighbor_lists_valid: bool) -> Result<Vec<Particle>, Error> {
        if keep_neighbor_lists_valid {
            let particles = self.cells.iter_mut().flat_map(|cell| &mut cell.particles);
            return Ok(mark_leaving_particles(particles, self.box_min, self.box_max));
        }

        self.delete_halo_particles();
        let leaving = split_leaving_particles(&mut self.cells[0].particles, self.box_min, self.box_max);
        return Ok(leaving);
    }

    fn traversal_info(&self) -> TraversalSelectorInfo {
        let length = self.box_max - self.box_min;
        TraversalSelectorInfo {
            cells_per_dimension: [2, 1, 1],
            interaction_length: self.interaction_length(),
            cell_length: [length[0], length[1], length[2]],
            cluster_size: 0,
        }
    }

    fn rebuild_neighbor_lists(&mut self, traversal: &dyn Traversal) -> Result<(), Error> {
        check_traversal(self.container_type(), traversal)?;
        for cell in &mut self.cells {
            cell.particles.retain(|particle| !particle.is_dummy());
        }
        return Ok(());
    }

    fn iterate_pairwise(&mut self, traversal: &dyn Traversal, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        check_traversal(self.container_type(), traversal)?;

        traversal.init_traversal(&mut self.cells)?;
        let [owned, halo] = &mut self.cells;
        traversal.traverse(TraversalTarget::DirectSum { owned: owned, halo: halo }, functor)?;
        traversal.end_traversal(&mut self.cells)?;

        return Ok(());
    }
}
