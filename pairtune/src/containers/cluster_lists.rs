use log::{debug, info};
use rayon::prelude::*;

use crate::options::{ContainerOption, TraversalOption};
use crate::particles::{IteratorBehavior, OwnershipState, Particle, ParticleCell};
use crate::traversals::{Traversal, TraversalSelectorInfo, TraversalTarget};
use crate::{Error, PairwiseFunctor, Vector3D};

use super::{ParticleContainer, check_traversal, check_owned, check_halo};
use super::{mark_leaving_particles, split_leaving_particles};

/// Identifier of the dummy particles used to fill the last cluster of each
/// tower
const PADDING_ID: usize = usize::MAX;

/// Particles sorted in a 2D grid of towers along `x` and `y`. Inside each
/// tower, particles are sorted along `z` and split in clusters of a fixed
/// size. The neighbor lists of clusters contain all other clusters whose
/// bounding box is within the interaction length.
///
/// Clusters are stored one tower after the other, so the index of a cluster
/// in the lists grows with the flat index of its tower.
#[derive(Debug, Clone)]
pub struct ClusterTowers {
    interaction_length: f64,
    cluster_size: usize,
    /// lower corner of the tower grid, including the halo region
    grid_min: Vector3D,
    /// length of a tower along `x` and `y`
    tower_length: [f64; 2],
    towers_per_dimension: [usize; 2],
    /// all clusters, tower after tower
    clusters: Vec<ParticleCell>,
    /// number of real (non padding) particles in each cluster
    sizes: Vec<usize>,
    /// index of the first cluster of each tower, and total number of clusters
    /// at the end
    tower_starts: Vec<usize>,
    /// neighbors of each cluster, as cluster indexes
    neighbors: Vec<Vec<usize>>,
    /// Do the current lists contain each pair of clusters only once?
    half_lists: Option<bool>,
}

impl ClusterTowers {
    /// Get mutable access to the clusters together with their neighbor lists
    pub fn clusters_mut_with_neighbors(&mut self) -> (&mut [ParticleCell], &[Vec<usize>]) {
        (&mut self.clusters, &self.neighbors)
    }

    fn new(interaction_length: f64, cluster_size: usize) -> ClusterTowers {
        ClusterTowers {
            interaction_length: interaction_length,
            cluster_size: cluster_size,
            grid_min: Vector3D::zero(),
            tower_length: [interaction_length, interaction_length],
            towers_per_dimension: [1, 1],
            clusters: Vec::new(),
            sizes: Vec::new(),
            tower_starts: vec![0, 0],
            neighbors: Vec::new(),
            half_lists: None,
        }
    }

    /// Number of particles in each cluster
    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    /// Number of towers along `x` and `y`
    pub fn towers_per_dimension(&self) -> [usize; 2] {
        self.towers_per_dimension
    }

    /// Length of the towers along `x` and `y`
    pub fn tower_length(&self) -> [f64; 2] {
        self.tower_length
    }

    /// Number of towers needed to cover the interaction length along `x`
    /// and `y`
    pub fn overlap(&self) -> [usize; 2] {
        [
            f64::ceil(self.interaction_length / self.tower_length[0]) as usize,
            f64::ceil(self.interaction_length / self.tower_length[1]) as usize,
        ]
    }

    /// All clusters, tower after tower
    pub fn clusters(&self) -> &[ParticleCell] {
        &self.clusters
    }

    pub fn clusters_mut(&mut self) -> &mut [ParticleCell] {
        &mut self.clusters
    }

    /// Range of cluster indexes in the tower at `[x, y]`
    pub fn tower(&self, index: [usize; 2]) -> std::ops::Range<usize> {
        let flat = index[0] * self.towers_per_dimension[1] + index[1];
        self.tower_starts[flat]..self.tower_starts[flat + 1]
    }

    /// Neighbors of the cluster at `index`. With half lists, only clusters
    /// with a larger index are included.
    pub fn neighbors(&self, cluster: usize) -> &[usize] {
        &self.neighbors[cluster]
    }

    /// Do the current lists contain each pair of clusters only once? This is
    /// `None` if the lists are not built.
    pub fn half_lists(&self) -> Option<bool> {
        self.half_lists
    }

    /// Iterate over the real particles in all clusters
    fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.clusters.iter().zip(&self.sizes).flat_map(|(cluster, &size)| &cluster.particles[..size])
    }

    fn particles_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.clusters.iter_mut().zip(&self.sizes).flat_map(|(cluster, &size)| &mut cluster.particles[..size])
    }

    /// Remove all particles from the towers, returning them
    fn take_particles(&mut self) -> Vec<Particle> {
        let mut particles = Vec::new();
        for (cluster, &size) in self.clusters.iter_mut().zip(&self.sizes) {
            cluster.particles.truncate(size);
            particles.append(&mut cluster.particles);
        }
        self.clusters.clear();
        self.sizes.clear();
        self.neighbors.clear();
        self.tower_starts = vec![0; self.tower_starts.len()];
        self.half_lists = None;
        return particles;
    }

    /// Sort the `particles` in towers and clusters, and build the neighbor
    /// lists of all clusters
    #[time_graph::instrument(name = "ClusterTowers::build")]
    fn build(&mut self, particles: Vec<Particle>, box_min: Vector3D, box_max: Vector3D, half_lists: bool) {
        let il = self.interaction_length;
        let halo = Vector3D::new(il, il, il);
        self.grid_min = box_min - halo;
        let grid_max = box_max + halo;
        let size = grid_max - self.grid_min;

        let tower_side = if particles.is_empty() {
            il
        } else {
            let density = particles.len() as f64 / (size[0] * size[1] * size[2]);
            f64::cbrt(self.cluster_size as f64 / density)
        };

        for dim in 0..2 {
            let n_towers = f64::floor(size[dim] / tower_side).max(1.0) as usize;
            self.towers_per_dimension[dim] = n_towers;
            self.tower_length[dim] = size[dim] / n_towers as f64;
        }

        let [tx, ty] = self.towers_per_dimension;
        let mut towers = vec![Vec::new(); tx * ty];
        for particle in particles {
            let mut index = [0; 2];
            for dim in 0..2 {
                let i = f64::floor((particle.position[dim] - self.grid_min[dim]) / self.tower_length[dim]);
                index[dim] = (i.max(0.0) as usize).min(self.towers_per_dimension[dim] - 1);
            }
            towers[index[0] * ty + index[1]].push(particle);
        }

        self.clusters.clear();
        self.sizes.clear();
        self.tower_starts.clear();
        for mut tower in towers {
            self.tower_starts.push(self.clusters.len());
            tower.sort_by(|a, b| a.position[2].total_cmp(&b.position[2]));

            let mut tower = tower.into_iter().peekable();
            while tower.peek().is_some() {
                let mut cluster = ParticleCell::new();
                cluster.particles.extend(tower.by_ref().take(self.cluster_size));
                let size = cluster.len();
                let last = cluster.particles[size - 1].position;
                while cluster.len() < self.cluster_size {
                    let mut padding = Particle::new(PADDING_ID, last);
                    padding.ownership = OwnershipState::Dummy;
                    cluster.push(padding);
                }

                self.clusters.push(cluster);
                self.sizes.push(size);
            }
        }
        self.tower_starts.push(self.clusters.len());

        self.build_neighbor_lists(half_lists);
    }

    fn build_neighbor_lists(&mut self, half_lists: bool) {
        let bounding_boxes = self.clusters.iter().zip(&self.sizes)
            .map(|(cluster, &size)| bounding_box(&cluster.particles[..size]))
            .collect::<Vec<_>>();

        let [tx, ty] = self.towers_per_dimension;
        let overlap = self.overlap();
        let il2 = self.interaction_length * self.interaction_length;

        let towers = (0..tx * ty).into_par_iter().map(|flat: usize| {
            let (x, y) = (flat / ty, flat % ty);
            let x_range = x.saturating_sub(overlap[0])..(x + overlap[0] + 1).min(tx);
            let y_range = y.saturating_sub(overlap[1])..(y + overlap[1] + 1).min(ty);

            (self.tower_starts[flat]..self.tower_starts[flat + 1]).map(|cluster| {
                let mut neighbors = Vec::new();
                for other_x in x_range.clone() {
                    for other_y in y_range.clone() {
                        for other in self.tower([other_x, other_y]) {
                            if other == cluster || (half_lists && other < cluster) {
                                continue;
                            }

                            if box_distance2(&bounding_boxes[cluster], &bounding_boxes[other]) <= il2 {
                                neighbors.push(other);
                            }
                        }
                    }
                }
                neighbors.sort_unstable();
                neighbors
            }).collect::<Vec<_>>()
        }).collect::<Vec<_>>();

        self.neighbors = towers.into_iter().flatten().collect();
        self.half_lists = Some(half_lists);

        debug!(
            "built cluster lists for {} clusters in {}x{} towers with {} cluster pairs (half lists = {})",
            self.clusters.len(), tx, ty,
            self.neighbors.iter().map(Vec::len).sum::<usize>(),
            half_lists,
        );
    }
}

/// Do the cluster lists used by `traversal` contain each pair only once?
/// `vcl-c06` uses half lists, and `vcl-cluster-iteration` full lists.
pub(crate) fn uses_half_lists(traversal: TraversalOption) -> bool {
    traversal == TraversalOption::VclC06
}

/// Axis aligned bounding box of some particles, as `(min, max)`
fn bounding_box(particles: &[Particle]) -> (Vector3D, Vector3D) {
    let mut min = Vector3D::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = -min;
    for particle in particles {
        min = min.min(&particle.position);
        max = max.max(&particle.position);
    }
    return (min, max);
}

/// Squared distance between two bounding boxes
fn box_distance2(first: &(Vector3D, Vector3D), second: &(Vector3D, Vector3D)) -> f64 {
    let mut distance2 = 0.0;
    for dim in 0..3 {
        let gap = f64::max(0.0, f64::max(first.0[dim] - second.1[dim], second.0[dim] - first.1[dim]));
        distance2 += gap * gap;
    }
    return distance2;
}

/// Verlet cluster lists: particles are grouped in clusters of a fixed size,
/// and neighbor lists are built between clusters instead of particles.
///
/// New particles are kept in a buffer until the next rebuild of the towers.
#[derive(Debug, Clone)]
pub struct VerletClusterLists {
    box_min: Vector3D,
    box_max: Vector3D,
    cutoff: f64,
    skin: f64,
    towers: ClusterTowers,
    /// particles added since the last build
    pending: Vec<Particle>,
}

impl VerletClusterLists {
    pub fn new(box_min: Vector3D, box_max: Vector3D, cutoff: f64, skin: f64, cluster_size: usize) -> Result<VerletClusterLists, Error> {
        if cluster_size == 0 {
            return Err(Error::InvalidParameter("cluster size must be at least 1".into()));
        }

        if !(cutoff > 0.0) || !(skin >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "invalid cutoff ({}) or skin ({}) for verlet cluster lists", cutoff, skin
            )));
        }

        Ok(VerletClusterLists {
            box_min: box_min,
            box_max: box_max,
            cutoff: cutoff,
            skin: skin,
            towers: ClusterTowers::new(cutoff + skin, cluster_size),
            pending: Vec::new(),
        })
    }

    /// Get the towers of clusters in this container
    pub fn towers(&self) -> &ClusterTowers {
        &self.towers
    }

    fn build(&mut self, half_lists: bool) {
        let mut particles = self.towers.take_particles();
        particles.append(&mut self.pending);
        particles.retain(|particle| !particle.is_dummy());
        self.towers.build(particles, self.box_min, self.box_max, half_lists);
    }
}

impl ParticleContainer for VerletClusterLists {
    fn container_type(&self) -> ContainerOption {
        ContainerOption::VerletClusterLists
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
        self.pending.push(particle);
        return Ok(());
    }

    fn add_halo_particle(&mut self, mut particle: Particle) -> Result<(), Error> {
        check_halo(&mut particle, self.box_min, self.box_max, self.interaction_length())?;
        self.pending.push(particle);
        return Ok(());
    }

    fn insert_particles(&mut self, particles: Vec<Particle>) {
        self.pending.extend(particles.into_iter().filter(|particle| !particle.is_dummy()));
    }

    fn take_all_particles(&mut self) -> Vec<Particle> {
        let mut particles = self.towers.take_particles();
        particles.append(&mut self.pending);
        return particles;
    }

    fn delete_halo_particles(&mut self) {
        let mut particles = self.take_all_particles();
        particles.retain(|particle| !particle.is_halo());
        self.pending = particles;
    }

    fn for_each(&self, behavior: IteratorBehavior, function: &mut dyn FnMut(&Particle)) {
        for particle in self.towers.particles().chain(&self.pending) {
            if behavior.accepts(particle.ownership) {
                function(particle);
            }
        }
    }

    fn for_each_mut(&mut self, behavior: IteratorBehavior, function: &mut dyn FnMut(&mut Particle)) {
        for particle in self.towers.particles_mut().chain(&mut self.pending) {
            if behavior.accepts(particle.ownership) {
                function(particle);
            }
        }
    }

    fn update_container(&mut self, keep_neighbor_lists_valid: bool) -> Result<Vec<Particle>, Error> {
        let (box_min, box_max) = (self.box_min, self.box_max);
        if keep_neighbor_lists_valid {
            let particles = self.towers.particles_mut().chain(&mut self.pending);
            return Ok(mark_leaving_particles(particles, box_min, box_max));
        }

        let mut particles = self.take_all_particles();
        let leaving = split_leaving_particles(&mut particles, box_min, box_max);
        self.pending = particles;
        return Ok(leaving);
    }

    fn traversal_info(&self) -> TraversalSelectorInfo {
        let [tx, ty] = self.towers.towers_per_dimension();
        let [lx, ly] = self.towers.tower_length();
        TraversalSelectorInfo {
            cells_per_dimension: [tx, ty, 1],
            interaction_length: self.interaction_length(),
            cell_length: [lx, ly, f64::INFINITY],
            cluster_size: self.towers.cluster_size(),
        }
    }

    fn rebuild_neighbor_lists(&mut self, traversal: &dyn Traversal) -> Result<(), Error> {
        check_traversal(self.container_type(), traversal)?;
        self.build(uses_half_lists(traversal.option()));
        return Ok(());
    }

    fn iterate_pairwise(&mut self, traversal: &dyn Traversal, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        check_traversal(self.container_type(), traversal)?;

        let half_lists = uses_half_lists(traversal.option());
        if !self.pending.is_empty() {
            info!("{} new particles in verlet cluster lists, rebuilding the towers", self.pending.len());
            self.build(half_lists);
        } else if self.towers.half_lists() != Some(half_lists) {
            info!("verlet cluster lists are not valid for {}, rebuilding them", traversal.signature());
            self.build(half_lists);
        }

        traversal.init_traversal(self.towers.clusters_mut())?;
        let result = traversal.traverse(TraversalTarget::Clusters(&mut self.towers), functor);
        traversal.end_traversal(self.towers.clusters_mut())?;

        return result;
    }
}
