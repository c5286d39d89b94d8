//! Containers store the particles in a spatial data structure, and use
//! traversals to iterate over all pairs of interacting particles.

use crate::options::ContainerOption;
use crate::particles::{IteratorBehavior, OwnershipState, Particle};
use crate::traversals::{Traversal, TraversalSelectorInfo};
use crate::{Error, PairwiseFunctor, Vector3D};

mod cell_block;
pub use self::cell_block::CellBlock;
pub(crate) use self::cell_block::{offset_cell, is_forward};

pub mod neighbor_lists;
pub use self::neighbor_lists::{CellNeighborList, NeighborListBuild, AllCellsNeighborList, CellPairNeighborList};
pub use self::neighbor_lists::build_traversal_for;

mod direct_sum;
pub use self::direct_sum::DirectSum;

mod linked_cells;
pub use self::linked_cells::LinkedCells;

mod verlet_lists_cells;
pub use self::verlet_lists_cells::{VerletListsCells, PairwiseVerletLists};

mod cluster_lists;
pub use self::cluster_lists::{ClusterTowers, VerletClusterLists};
pub(crate) use self::cluster_lists::uses_half_lists;

mod selector;
pub use self::selector::ContainerSelector;

/// Common interface of all particle containers
pub trait ParticleContainer: Send {
    /// Which kind of container is this?
    fn container_type(&self) -> ContainerOption;

    /// Lower corner of the simulation box
    fn box_min(&self) -> Vector3D;

    /// Upper corner of the simulation box
    fn box_max(&self) -> Vector3D;

    /// Cutoff of the interactions
    fn cutoff(&self) -> f64;

    /// Additional distance added to the cutoff when building neighbor lists
    fn skin(&self) -> f64;

    /// Cutoff plus skin
    fn interaction_length(&self) -> f64 {
        self.cutoff() + self.skin()
    }

    /// Cell size factor used by this container, `1.0` for containers
    /// without cells
    fn cell_size_factor(&self) -> f64 {
        1.0
    }

    /// Add an owned particle to the container. The particle must be inside
    /// the box.
    fn add_particle(&mut self, particle: Particle) -> Result<(), Error>;

    /// Add a halo particle to the container. The particle must be outside
    /// the box, but within the interaction length of it.
    fn add_halo_particle(&mut self, particle: Particle) -> Result<(), Error>;

    /// Insert particles coming from another container, without any check on
    /// their position
    fn insert_particles(&mut self, particles: Vec<Particle>);

    /// Remove all particles from this container and return them
    fn take_all_particles(&mut self) -> Vec<Particle>;

    /// Remove all the halo particles from this container
    fn delete_halo_particles(&mut self);

    /// Call `function` on all the particles matching `behavior`
    fn for_each(&self, behavior: IteratorBehavior, function: &mut dyn FnMut(&Particle));

    /// Call `function` on all the particles matching `behavior`, allowing to
    /// modify them
    fn for_each_mut(&mut self, behavior: IteratorBehavior, function: &mut dyn FnMut(&mut Particle));

    /// Number of particles matching `behavior` in this container
    fn number_of_particles(&self, behavior: IteratorBehavior) -> usize {
        let mut count = 0;
        self.for_each(behavior, &mut |_| count += 1);
        return count;
    }

    /// Update the container after the particles moved, returning all owned
    /// particles which left the box. Halo particles are removed.
    ///
    /// If `keep_neighbor_lists_valid` is `true`, the internal structure of
    /// the container is not modified: leaving and halo particles are only
    /// marked as dummies. Otherwise, particles are sorted again in the
    /// container and all neighbor lists are invalidated.
    fn update_container(&mut self, keep_neighbor_lists_valid: bool) -> Result<Vec<Particle>, Error>;

    /// Get the information needed to create traversals for this container
    fn traversal_info(&self) -> TraversalSelectorInfo;

    /// Sort the particles in the container and rebuild the neighbor lists
    /// (if any) for use with `traversal`.
    fn rebuild_neighbor_lists(&mut self, traversal: &dyn Traversal) -> Result<(), Error>;

    /// Apply `functor` to all pairs of particles closer than the cutoff
    /// using the given `traversal`.
    fn iterate_pairwise(&mut self, traversal: &dyn Traversal, functor: &dyn PairwiseFunctor) -> Result<(), Error>;
}

/// Check that a traversal can be used with a container
fn check_traversal(container: ContainerOption, traversal: &dyn Traversal) -> Result<(), Error> {
    if traversal.option().container() != container {
        return Err(Error::InvalidParameter(format!(
            "traversal {} can not be used with container {}", traversal.option(), container
        )));
    }
    return Ok(());
}

/// Check that `particle` can be added as an owned particle to a container
/// with the given box
fn check_owned(particle: &mut Particle, box_min: Vector3D, box_max: Vector3D) -> Result<(), Error> {
    if !particle.position.is_inside(&box_min, &box_max) {
        return Err(Error::InvalidParameter(format!(
            "particle {} at {:?} is outside of the box", particle.id, particle.position
        )));
    }
    particle.ownership = OwnershipState::Owned;
    return Ok(());
}

/// Check that `particle` can be added as a halo particle to a container with
/// the given box
fn check_halo(particle: &mut Particle, box_min: Vector3D, box_max: Vector3D, interaction_length: f64) -> Result<(), Error> {
    let halo = Vector3D::new(interaction_length, interaction_length, interaction_length);
    if particle.position.is_inside(&box_min, &box_max) || !particle.position.is_inside(&(box_min - halo), &(box_max + halo)) {
        return Err(Error::InvalidParameter(format!(
            "halo particle {} at {:?} must be outside of the box and inside the halo region",
            particle.id, particle.position
        )));
    }
    particle.ownership = OwnershipState::Halo;
    return Ok(());
}

/// Mark halo particles and owned particles outside the box as dummies,
/// returning a copy of the owned particles which left the box
fn mark_leaving_particles<'a>(particles: impl Iterator<Item = &'a mut Particle>, box_min: Vector3D, box_max: Vector3D) -> Vec<Particle> {
    let mut leaving = Vec::new();
    for particle in particles {
        match particle.ownership {
            OwnershipState::Halo => particle.mark_dummy(),
            OwnershipState::Owned => {
                if !particle.position.is_inside(&box_min, &box_max) {
                    leaving.push(particle.clone());
                    particle.mark_dummy();
                }
            }
            OwnershipState::Dummy => {}
        }
    }
    return leaving;
}

/// Remove halo and dummy particles from `particles`, and move owned
/// particles which left the box to the returned vector
fn split_leaving_particles(particles: &mut Vec<Particle>, box_min: Vector3D, box_max: Vector3D) -> Vec<Particle> {
    particles.retain(Particle::is_owned);
    let (inside, leaving): (Vec<_>, Vec<_>) = std::mem::take(particles).into_iter()
        .partition(|particle| particle.position.is_inside(&box_min, &box_max));
    *particles = inside;
    return leaving;
}

#[cfg(test)]
mod tests {
    use crate::functors::tests_utils::{PairRecorder, random_particles, brute_force_pairs};
    use crate::options::{ContainerOption, DataLayoutOption, TraversalOption};
    use crate::particles::{IteratorBehavior, Particle};
    use crate::traversals::generate_traversal;
    use crate::Vector3D;

    use super::*;

    pub(super) fn create(container: ContainerOption, cell_size_factor: f64) -> Box<dyn ParticleContainer> {
        let mut selector = ContainerSelector::new(Vector3D::zero(), Vector3D::new(5.0, 4.0, 6.0), 1.0, 0.2, 4).unwrap();
        selector.select(container, cell_size_factor).unwrap();
        return selector.into_container();
    }

    /// Run all compatible traversals on all containers and compare the pairs
    /// found with a brute force computation
    #[test]
    fn all_traversals_find_all_pairs() {
        let particles = random_particles(120, Vector3D::zero(), Vector3D::new(5.0, 4.0, 6.0), 7);
        let expected = brute_force_pairs(&particles, 1.0);

        for container_option in ContainerOption::all() {
            for cell_size_factor in [0.5, 1.0, 1.5] {
                for traversal_option in TraversalOption::all() {
                    if traversal_option.container() != container_option {
                        continue;
                    }

                    for data_layout in [DataLayoutOption::Aos, DataLayoutOption::Soa] {
                        for newton3 in [true, false] {
                            let mut container = create(container_option, cell_size_factor);
                            for particle in &particles {
                                container.add_particle(particle.clone()).unwrap();
                            }

                            let mut functor = PairRecorder::new(1.0);
                            let info = container.traversal_info();
                            let traversal = generate_traversal(traversal_option, data_layout, newton3, &info, &functor).unwrap();
                            if !traversal.is_applicable() {
                                continue;
                            }

                            container.rebuild_neighbor_lists(&*traversal).unwrap();
                            container.iterate_pairwise(&*traversal, &functor).unwrap();

                            assert_eq!(
                                functor.pairs(), expected,
                                "wrong pairs for {}/{}/{}/{}/newton3={}",
                                container_option, cell_size_factor, traversal_option, data_layout, newton3
                            );
                            let unordered = expected.len() / 2;
                            let calls = functor.interactions();
                            if newton3 {
                                assert_eq!(calls, unordered);
                            } else {
                                assert_eq!(calls, 2 * unordered);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn update_container() {
        for container_option in ContainerOption::all() {
            for keep_lists in [true, false] {
                let mut container = create(container_option, 1.0);
                container.add_particle(Particle::new(0, Vector3D::new(1.0, 1.0, 1.0))).unwrap();
                container.add_particle(Particle::new(1, Vector3D::new(4.5, 2.0, 3.0))).unwrap();
                container.add_halo_particle(Particle::new(2, Vector3D::new(-0.5, 2.0, 3.0))).unwrap();
                assert_eq!(container.number_of_particles(IteratorBehavior::Owned), 2);
                assert_eq!(container.number_of_particles(IteratorBehavior::Halo), 1);

                container.for_each_mut(IteratorBehavior::Owned, &mut |particle| {
                    if particle.id == 1 {
                        particle.position[0] = 5.5;
                    }
                });

                let leaving = container.update_container(keep_lists).unwrap();
                assert_eq!(leaving.len(), 1, "{}", container_option);
                assert_eq!(leaving[0].id, 1);
                assert!(leaving[0].is_owned());

                assert_eq!(container.number_of_particles(IteratorBehavior::Owned), 1);
                assert_eq!(container.number_of_particles(IteratorBehavior::Halo), 0);
            }
        }
    }

    #[test]
    fn invalid_particles() {
        for container_option in ContainerOption::all() {
            let mut container = create(container_option, 1.0);
            assert!(container.add_particle(Particle::new(0, Vector3D::new(-1.0, 1.0, 1.0))).is_err());
            assert!(container.add_halo_particle(Particle::new(0, Vector3D::new(1.0, 1.0, 1.0))).is_err());
            assert!(container.add_halo_particle(Particle::new(0, Vector3D::new(-3.0, 1.0, 1.0))).is_err());
            assert_eq!(container.number_of_particles(IteratorBehavior::All), 0);
        }
    }

    #[test]
    fn wrong_traversal() {
        let mut container = create(ContainerOption::LinkedCells, 1.0);
        let functor = PairRecorder::new(1.0);
        let info = container.traversal_info();
        let traversal = generate_traversal(TraversalOption::DsSequential, DataLayoutOption::Aos, true, &info, &functor).unwrap();
        assert!(container.iterate_pairwise(&*traversal, &functor).is_err());
    }
}
