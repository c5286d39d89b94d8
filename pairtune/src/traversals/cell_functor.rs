use crate::options::DataLayoutOption;
use crate::particles::{Particle, ParticleCell};
use crate::{Error, PairwiseFunctor, Vector3D};

use super::coloring::two_mut;

/// Apply a pairwise functor to the particles inside a single cell, or
/// between the particles of two cells, in a given data layout.
pub(crate) struct CellFunctor<'f> {
    functor: &'f dyn PairwiseFunctor,
    soa: bool,
    newton3: bool,
}

impl<'f> CellFunctor<'f> {
    pub(crate) fn new(functor: &'f dyn PairwiseFunctor, data_layout: DataLayoutOption, newton3: bool) -> Result<CellFunctor<'f>, Error> {
        let soa = match data_layout {
            DataLayoutOption::Aos => false,
            DataLayoutOption::Soa => true,
            DataLayoutOption::Device => {
                return Err(Error::Unsupported("cell functors can not run on device data".into()));
            }
        };

        Ok(CellFunctor {
            functor: functor,
            soa: soa,
            newton3: newton3,
        })
    }

    /// Compute all interactions between particles in `cell`
    pub(crate) fn process_cell(&self, cell: &mut ParticleCell) {
        if self.soa {
            self.functor.soa_single(&mut cell.soa, self.newton3);
            return;
        }

        let particles = &mut cell.particles;
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                let (first, second) = two_mut(particles, i, j);
                if first.is_dummy() || second.is_dummy() {
                    continue;
                }

                if self.newton3 {
                    self.functor.aos(first, second, true);
                } else {
                    self.functor.aos(first, second, false);
                    self.functor.aos(second, first, false);
                }
            }
        }
    }

    /// Compute all interactions between particles in `first` and particles
    /// in `second`, updating the forces in both cells.
    pub(crate) fn process_pair(&self, first: &mut ParticleCell, second: &mut ParticleCell) {
        if self.soa {
            if self.newton3 {
                self.functor.soa_pair(&mut first.soa, &mut second.soa, true);
            } else {
                self.functor.soa_pair(&mut first.soa, &mut second.soa, false);
                self.functor.soa_pair(&mut second.soa, &mut first.soa, false);
            }
            return;
        }

        for i in first.particles.iter_mut().filter(|p| !p.is_dummy()) {
            for j in second.particles.iter_mut().filter(|p| !p.is_dummy()) {
                if self.newton3 {
                    self.functor.aos(i, j, true);
                } else {
                    self.functor.aos(i, j, false);
                    self.functor.aos(j, i, false);
                }
            }
        }
    }

    /// Compute the forces exerted by the particles in `other` on the
    /// particles in `cell`, leaving `other` untouched.
    pub(crate) fn process_pair_one_way(&self, cell: &mut ParticleCell, other: &ParticleCell) {
        if self.soa {
            self.functor.soa_pair_one_way(&mut cell.soa, &other.soa);
            return;
        }

        for i in cell.particles.iter_mut().filter(|p| !p.is_dummy()) {
            for j in other.particles.iter().filter(|p| !p.is_dummy()) {
                self.functor.aos_one_way(i, j);
            }
        }
    }

    /// Compute the forces exerted on the particles of `cell` by the other
    /// particles in `cell` and by all the particles in `neighbors`, without
    /// modifying any cell. The forces are returned in the same order as the
    /// particles of `cell`, and can be added to it with [`CellFunctor::add_forces`].
    pub(crate) fn one_way_forces<'c>(&self, cell: &ParticleCell, neighbors: impl Iterator<Item = &'c ParticleCell>) -> Vec<Vector3D> {
        if self.soa {
            let mut soa = cell.soa.clone();
            soa.reset_forces();
            self.functor.soa_single(&mut soa, false);
            for other in neighbors {
                self.functor.soa_pair_one_way(&mut soa, &other.soa);
            }

            return (0..soa.len()).map(|i| Vector3D::new(soa.fx[i], soa.fy[i], soa.fz[i])).collect();
        }

        let mut targets = zero_force_copy(&cell.particles);
        for (slot, i) in targets.iter_mut().enumerate() {
            if i.is_dummy() {
                continue;
            }
            for (other_slot, j) in cell.particles.iter().enumerate() {
                if other_slot != slot && !j.is_dummy() {
                    self.functor.aos_one_way(i, j);
                }
            }
        }

        for other in neighbors {
            for i in targets.iter_mut().filter(|p| !p.is_dummy()) {
                for j in other.particles.iter().filter(|p| !p.is_dummy()) {
                    self.functor.aos_one_way(i, j);
                }
            }
        }

        return targets.into_iter().map(|particle| particle.force).collect();
    }

    /// Add `forces`, as computed by [`CellFunctor::one_way_forces`], to the
    /// particles of `cell`
    pub(crate) fn add_forces(&self, cell: &mut ParticleCell, forces: &[Vector3D]) {
        if self.soa {
            debug_assert_eq!(cell.soa.len(), forces.len());
            for (i, force) in forces.iter().enumerate() {
                cell.soa.fx[i] += force[0];
                cell.soa.fy[i] += force[1];
                cell.soa.fz[i] += force[2];
            }
        } else {
            debug_assert_eq!(cell.particles.len(), forces.len());
            for (particle, force) in cell.particles.iter_mut().zip(forces) {
                particle.force += *force;
            }
        }
    }
}

/// Copy `particles`, setting the force of the copies to zero. The copies are
/// used to accumulate forces while the original particles are shared.
pub(crate) fn zero_force_copy(particles: &[Particle]) -> Vec<Particle> {
    particles.iter().map(|particle| {
        let mut copy = particle.clone();
        copy.force = Vector3D::zero();
        copy
    }).collect()
}
