use log::debug;

use crate::options::ContainerOption;
use crate::{Error, Vector3D};

use super::{AllCellsNeighborList, DirectSum, LinkedCells, ParticleContainer};
use super::{PairwiseVerletLists, VerletClusterLists, VerletListsCells};

/// Owns the current particle container, and switches between containers
/// when the tuner selects a new configuration, moving all particles to the
/// new container.
pub struct ContainerSelector {
    box_min: Vector3D,
    box_max: Vector3D,
    cutoff: f64,
    skin: f64,
    cluster_size: usize,
    container: Box<dyn ParticleContainer>,
}

impl std::fmt::Debug for ContainerSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSelector")
            .field("box_min", &self.box_min)
            .field("box_max", &self.box_max)
            .field("cutoff", &self.cutoff)
            .field("skin", &self.skin)
            .field("container", &self.container.container_type())
            .finish_non_exhaustive()
    }
}

impl ContainerSelector {
    /// Create a new selector, starting with an empty direct sum container
    pub fn new(box_min: Vector3D, box_max: Vector3D, cutoff: f64, skin: f64, cluster_size: usize) -> Result<ContainerSelector, Error> {
        if !(cutoff > 0.0) || !cutoff.is_finite() {
            return Err(Error::InvalidParameter(format!("cutoff must be positive, got {}", cutoff)));
        }

        if !(skin >= 0.0) || !skin.is_finite() {
            return Err(Error::InvalidParameter(format!("skin must be positive or zero, got {}", skin)));
        }

        for dim in 0..3 {
            if !(box_max[dim] > box_min[dim]) {
                return Err(Error::InvalidParameter(format!(
                    "box_max must be larger than box_min along all dimensions, got {:?} and {:?}",
                    box_min, box_max
                )));
            }
        }

        Ok(ContainerSelector {
            box_min: box_min,
            box_max: box_max,
            cutoff: cutoff,
            skin: skin,
            cluster_size: cluster_size,
            container: Box::new(DirectSum::new(box_min, box_max, cutoff, skin)),
        })
    }

    fn create(&self, option: ContainerOption, cell_size_factor: f64) -> Result<Box<dyn ParticleContainer>, Error> {
        let (box_min, box_max, cutoff, skin) = (self.box_min, self.box_max, self.cutoff, self.skin);
        let container: Box<dyn ParticleContainer> = match option {
            ContainerOption::DirectSum => Box::new(DirectSum::new(box_min, box_max, cutoff, skin)),
            ContainerOption::LinkedCells => {
                Box::new(LinkedCells::new(box_min, box_max, cutoff, skin, cell_size_factor)?)
            }
            ContainerOption::VerletListsCells => {
                Box::new(VerletListsCells::<AllCellsNeighborList>::new(box_min, box_max, cutoff, skin, cell_size_factor)?)
            }
            ContainerOption::PairwiseVerletLists => {
                Box::new(PairwiseVerletLists::new(box_min, box_max, cutoff, skin, cell_size_factor)?)
            }
            ContainerOption::VerletClusterLists => {
                Box::new(VerletClusterLists::new(box_min, box_max, cutoff, skin, self.cluster_size)?)
            }
        };
        return Ok(container);
    }

    /// Make sure the current container is `option` with the given cell size
    /// factor, creating a new container and moving the particles to it if
    /// needed. Returns `true` if the container changed.
    ///
    /// The cell size factor is ignored by containers without cells.
    pub fn select(&mut self, option: ContainerOption, cell_size_factor: f64) -> Result<bool, Error> {
        let uses_cells = !matches!(option, ContainerOption::DirectSum | ContainerOption::VerletClusterLists);
        if self.container.container_type() == option && (!uses_cells || self.container.cell_size_factor() == cell_size_factor) {
            return Ok(false);
        }

        let mut container = self.create(option, cell_size_factor)?;
        let particles = self.container.take_all_particles();
        debug!(
            "switching from {} to {} (cell size factor = {}), moving {} particles",
            self.container.container_type(), option, cell_size_factor, particles.len()
        );
        container.insert_particles(particles);
        self.container = container;

        return Ok(true);
    }

    /// Get the current container
    pub fn container(&self) -> &dyn ParticleContainer {
        &*self.container
    }

    /// Get the current container mutably
    pub fn container_mut(&mut self) -> &mut dyn ParticleContainer {
        &mut *self.container
    }

    /// Consume the selector and get the current container
    pub fn into_container(self) -> Box<dyn ParticleContainer> {
        self.container
    }
}
