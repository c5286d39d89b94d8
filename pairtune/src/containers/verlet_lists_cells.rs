use log::info;

use crate::options::ContainerOption;
use crate::particles::{IteratorBehavior, Particle};
use crate::traversals::{Traversal, TraversalSelectorInfo, TraversalTarget};
use crate::{Error, PairwiseFunctor, Vector3D};

use super::neighbor_lists::{CellNeighborList, CellPairNeighborList, build_traversal_for};
use super::{CellBlock, ParticleContainer, check_traversal, check_owned, check_halo};
use super::{mark_leaving_particles, split_leaving_particles};

/// Linked cells with neighbor lists built on top of them. The kind of
/// neighbor list is given by the `L` parameter, and defines which container
/// this is (see [`CellNeighborList::container_type`]).
///
/// The neighbor lists are built with the interaction length (cutoff + skin),
/// and stay valid as long as no particle moved more than half the skin, and
/// no particle was added or removed.
#[derive(Debug, Clone)]
pub struct VerletListsCells<L> {
    cells: CellBlock,
    cutoff: f64,
    skin: f64,
    lists: L,
}

/// Verlet lists with one list for each pair of neighboring cells
pub type PairwiseVerletLists = VerletListsCells<CellPairNeighborList>;

impl<L: CellNeighborList + Default> VerletListsCells<L> {
    pub fn new(box_min: Vector3D, box_max: Vector3D, cutoff: f64, skin: f64, cell_size_factor: f64) -> Result<VerletListsCells<L>, Error> {
        Ok(VerletListsCells {
            cells: CellBlock::new(box_min, box_max, cutoff + skin, cell_size_factor)?,
            cutoff: cutoff,
            skin: skin,
            lists: L::default(),
        })
    }

    /// Get the neighbor lists of this container
    pub fn neighbor_lists(&self) -> &L {
        &self.lists
    }

    fn build(&mut self, traversal: &dyn Traversal) -> Result<(), Error> {
        self.cells.rebin();
        self.lists.build_aos_neighbor_list(
            &self.cells,
            traversal.use_newton3(),
            self.cutoff,
            self.skin,
            self.cells.interaction_length(),
            build_traversal_for(traversal.option()),
        )
    }
}

impl<L: CellNeighborList + Default> ParticleContainer for VerletListsCells<L> {
    fn container_type(&self) -> ContainerOption {
        self.lists.container_type()
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
        self.lists.invalidate();
        return Ok(());
    }

    fn add_halo_particle(&mut self, mut particle: Particle) -> Result<(), Error> {
        check_halo(&mut particle, self.box_min(), self.box_max(), self.interaction_length())?;
        self.cells.push(particle);
        self.lists.invalidate();
        return Ok(());
    }

    fn insert_particles(&mut self, particles: Vec<Particle>) {
        for particle in particles {
            if !particle.is_dummy() {
                self.cells.push(particle);
            }
        }
        self.lists.invalidate();
    }

    fn take_all_particles(&mut self) -> Vec<Particle> {
        self.lists.invalidate();
        self.cells.take_particles()
    }

    fn delete_halo_particles(&mut self) {
        for cell in self.cells.cells_mut() {
            cell.particles.retain(|particle| !particle.is_halo());
        }
        self.lists.invalidate();
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
            // particles stay in their slot, the lists skip dummies
            let particles = self.cells.cells_mut().iter_mut().flat_map(|cell| &mut cell.particles);
            return Ok(mark_leaving_particles(particles, box_min, box_max));
        }

        self.lists.invalidate();
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
        return self.build(traversal);
    }

    fn iterate_pairwise(&mut self, traversal: &dyn Traversal, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        check_traversal(self.container_type(), traversal)?;

        match self.lists.build_parameters() {
            None => {
                info!("{} neighbor lists are not valid, rebuilding them", self.container_type());
                self.build(traversal)?;
            }
            Some(parameters) if parameters.newton3 != traversal.use_newton3()
                || parameters.build_traversal != build_traversal_for(traversal.option()) => {
                info!(
                    "{} neighbor lists were built with {} and newton3 = {}, rebuilding them for {}",
                    self.container_type(), parameters.build_traversal, parameters.newton3, traversal.signature()
                );
                self.build(traversal)?;
            }
            Some(_) => {}
        }

        traversal.init_traversal(self.cells.as_slice_mut()?)?;
        let target = TraversalTarget::VerletCells {
            cells: &mut self.cells,
            lists: &self.lists,
        };
        let result = traversal.traverse(target, functor);
        traversal.end_traversal(self.cells.as_slice_mut()?)?;

        return result;
    }
}
