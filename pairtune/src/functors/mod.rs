//! Pairwise functors define the interaction between two particles. They are
//! consumed by the traversals, which decide which pairs of particles are
//! passed to the functor and in which memory layout.

use crate::options::DataLayoutOption;
use crate::particles::{Particle, SoABuffer};
use crate::Vector3D;

mod lennard_jones;
pub use self::lennard_jones::{LennardJones, LennardJonesParameters};

#[cfg(test)]
pub(crate) mod tests_utils;

/// A `PairwiseFunctor` computes the interaction between pairs of particles.
///
/// Implementations must ignore pairs where one of the particles is a dummy
/// in the SoA kernels; the AoS kernel is never called with dummy particles.
///
/// Functors are shared between the threads of a traversal, and any
/// accumulation of global values must be done through thread-safe storage
/// (see [`LennardJones`] for an example using thread local storage).
pub trait PairwiseFunctor: Send + Sync {
    /// Get the name of this functor
    fn name(&self) -> String;

    /// Cutoff radius of the interaction
    fn cutoff(&self) -> f64;

    /// Compute the interaction between particles `i` and `j`. The force on
    /// `i` is always updated, and the force on `j` only if `newton3` is
    /// `true`.
    fn aos(&self, i: &mut Particle, j: &mut Particle, newton3: bool);

    /// Compute the force exerted by `j` on `i`, without Newton's third law.
    /// This is used by traversals which can only read `j`.
    fn aos_one_way(&self, i: &mut Particle, j: &Particle) {
        let mut j = j.clone();
        self.aos(i, &mut j, false);
    }

    /// Compute all interactions between the particles inside a single
    /// structure of arrays. This always uses Newton's third law inside the
    /// buffer if `newton3` is true, and computes both directions otherwise.
    fn soa_single(&self, soa: &mut SoABuffer, newton3: bool) {
        for i in 0..soa.len() {
            let start = if newton3 { i + 1 } else { 0 };
            for j in start..soa.len() {
                if i == j || soa.is_dummy(i) || soa.is_dummy(j) {
                    continue;
                }
                let (mut pi, mut pj) = (soa_particle(soa, i), soa_particle(soa, j));
                self.aos(&mut pi, &mut pj, newton3);
                soa_store_force(soa, i, &pi);
                if newton3 {
                    soa_store_force(soa, j, &pj);
                }
            }
        }
    }

    /// Compute the interactions between all particles in `soa1` and all
    /// particles in `soa2`. Forces in `soa2` are only updated if `newton3` is
    /// `true`.
    fn soa_pair(&self, soa1: &mut SoABuffer, soa2: &mut SoABuffer, newton3: bool) {
        for i in 0..soa1.len() {
            if soa1.is_dummy(i) {
                continue;
            }
            let mut pi = soa_particle(soa1, i);
            for j in 0..soa2.len() {
                if soa2.is_dummy(j) {
                    continue;
                }
                let mut pj = soa_particle(soa2, j);
                self.aos(&mut pi, &mut pj, newton3);
                if newton3 {
                    soa_store_force(soa2, j, &pj);
                }
            }
            soa_store_force(soa1, i, &pi);
        }
    }

    /// Compute the forces exerted by all particles in `other` on the
    /// particles in `soa`, without Newton's third law.
    fn soa_pair_one_way(&self, soa: &mut SoABuffer, other: &SoABuffer) {
        for i in 0..soa.len() {
            if soa.is_dummy(i) {
                continue;
            }
            let mut pi = soa_particle(soa, i);
            for j in 0..other.len() {
                if other.is_dummy(j) {
                    continue;
                }
                self.aos_one_way(&mut pi, &soa_particle(other, j));
            }
            soa_store_force(soa, i, &pi);
        }
    }

    /// Compute the interactions between the particle at `index` in `soa` and
    /// the particles at the indexes in `neighbors`, using a neighbor list in
    /// structure of arrays form.
    fn soa_verlet(&self, soa: &mut SoABuffer, index: usize, neighbors: &[usize], newton3: bool) {
        if soa.is_dummy(index) {
            return;
        }
        let mut pi = soa_particle(soa, index);
        for &j in neighbors {
            if soa.is_dummy(j) {
                continue;
            }
            let mut pj = soa_particle(soa, j);
            self.aos(&mut pi, &mut pj, newton3);
            if newton3 {
                soa_store_force(soa, j, &pj);
            }
        }
        soa_store_force(soa, index, &pi);
    }

    /// Can this functor be used with Newton's third law?
    fn allows_newton3(&self) -> bool;

    /// Can this functor be used without Newton's third law?
    fn allows_non_newton3(&self) -> bool;

    /// Can this functor be used with clusters of the given size, in the
    /// given data layout?
    fn is_appropriate_cluster_size(&self, cluster_size: usize, data_layout: DataLayoutOption) -> bool;

    /// Should the time spent in this functor be used for tuning?
    fn is_relevant_for_tuning(&self) -> bool {
        true
    }
}

/// Create a particle with the position and force of the entry at `index` in
/// `soa`, for the fallback implementations of the SoA kernels
fn soa_particle(soa: &SoABuffer, index: usize) -> Particle {
    let mut particle = Particle::new(soa.id[index], Vector3D::new(soa.x[index], soa.y[index], soa.z[index]));
    particle.type_id = soa.type_id[index];
    particle.ownership = soa.ownership[index];
    particle.force = Vector3D::new(soa.fx[index], soa.fy[index], soa.fz[index]);
    return particle;
}

fn soa_store_force(soa: &mut SoABuffer, index: usize, particle: &Particle) {
    soa.fx[index] = particle.force[0];
    soa.fy[index] = particle.force[1];
    soa.fz[index] = particle.force[2];
}
