use super::{Particle, OwnershipState};

/// Structure-of-arrays storage for the particles of a single cell.
///
/// The buffers are filled from the particles when a traversal starts and the
/// forces are written back when it ends. They hold no data outside of a
/// traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoABuffer {
    pub id: Vec<usize>,
    pub type_id: Vec<usize>,
    pub ownership: Vec<OwnershipState>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub fx: Vec<f64>,
    pub fy: Vec<f64>,
    pub fz: Vec<f64>,
}

impl SoABuffer {
    /// Number of particles in this buffer
    pub fn len(&self) -> usize {
        self.id.len()
    }

    /// Is this buffer empty?
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Remove all particles from this buffer, keeping the allocations
    pub fn clear(&mut self) {
        self.id.clear();
        self.type_id.clear();
        self.ownership.clear();
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.fx.clear();
        self.fy.clear();
        self.fz.clear();
    }

    /// Append a single particle to the buffers
    pub fn push(&mut self, particle: &Particle) {
        self.id.push(particle.id);
        self.type_id.push(particle.type_id);
        self.ownership.push(particle.ownership);
        self.x.push(particle.position[0]);
        self.y.push(particle.position[1]);
        self.z.push(particle.position[2]);
        self.fx.push(particle.force[0]);
        self.fy.push(particle.force[1]);
        self.fz.push(particle.force[2]);
    }

    /// Replace the content of the buffers with the given particles
    pub fn load(&mut self, particles: &[Particle]) {
        self.clear();
        for particle in particles {
            self.push(particle);
        }
    }

    /// Write the forces stored in the buffers back to the particles, and
    /// clear the buffers
    pub fn extract(&mut self, particles: &mut [Particle]) {
        debug_assert_eq!(particles.len(), self.len());
        for (i, particle) in particles.iter_mut().enumerate() {
            particle.force[0] = self.fx[i];
            particle.force[1] = self.fy[i];
            particle.force[2] = self.fz[i];
        }
        self.clear();
    }

    /// Append all particles from `other` at the end of this buffer
    pub fn append(&mut self, other: &SoABuffer) {
        self.id.extend_from_slice(&other.id);
        self.type_id.extend_from_slice(&other.type_id);
        self.ownership.extend_from_slice(&other.ownership);
        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.z.extend_from_slice(&other.z);
        self.fx.extend_from_slice(&other.fx);
        self.fy.extend_from_slice(&other.fy);
        self.fz.extend_from_slice(&other.fz);
    }

    /// Set all the forces in this buffer to zero
    pub fn reset_forces(&mut self) {
        self.fx.fill(0.0);
        self.fy.fill(0.0);
        self.fz.fill(0.0);
    }

    /// Add the forces from `other`, which must contain the same particles, to
    /// the forces in this buffer
    pub fn add_forces(&mut self, other: &SoABuffer) {
        debug_assert_eq!(self.len(), other.len());
        for (f, other) in self.fx.iter_mut().zip(&other.fx) {
            *f += other;
        }
        for (f, other) in self.fy.iter_mut().zip(&other.fy) {
            *f += other;
        }
        for (f, other) in self.fz.iter_mut().zip(&other.fz) {
            *f += other;
        }
    }

    /// Copy the forces of the particles `offset..offset + self.len()` in
    /// `source` into this buffer
    pub fn copy_forces(&mut self, source: &SoABuffer, offset: usize) {
        let range = offset..(offset + self.len());
        self.fx.copy_from_slice(&source.fx[range.clone()]);
        self.fy.copy_from_slice(&source.fy[range.clone()]);
        self.fz.copy_from_slice(&source.fz[range]);
    }

    /// Is the particle at `index` deleted?
    #[inline]
    pub fn is_dummy(&self, index: usize) -> bool {
        self.ownership[index] == OwnershipState::Dummy
    }
}

#[cfg(test)]
mod tests {
    use crate::Vector3D;
    use super::*;

    #[test]
    fn load_and_extract() {
        let mut particles = vec![
            Particle::new(0, Vector3D::new(1.0, 2.0, 3.0)),
            Particle::new(1, Vector3D::new(4.0, 5.0, 6.0)),
        ];

        let mut soa = SoABuffer::default();
        soa.load(&particles);
        assert_eq!(soa.len(), 2);
        assert_eq!(soa.x, [1.0, 4.0]);
        assert_eq!(soa.z, [3.0, 6.0]);

        soa.fy[1] = 42.0;
        soa.extract(&mut particles);
        assert!(soa.is_empty());
        assert_eq!(particles[1].force, Vector3D::new(0.0, 42.0, 0.0));
        assert_eq!(particles[0].force, Vector3D::zero());
    }

    #[test]
    fn merge_forces() {
        let particles = vec![
            Particle::new(0, Vector3D::new(1.0, 2.0, 3.0)),
            Particle::new(1, Vector3D::new(4.0, 5.0, 6.0)),
        ];

        let mut first = SoABuffer::default();
        first.load(&particles[..1]);
        first.fx[0] = 3.0;

        let mut all = SoABuffer::default();
        all.append(&first);
        all.push(&particles[1]);
        assert_eq!(all.len(), 2);
        assert_eq!(all.id, [0, 1]);

        let mut partial = all.clone();
        partial.reset_forces();
        partial.fx[0] = 2.0;
        partial.fz[1] = -1.0;
        all.add_forces(&partial);
        assert_eq!(all.fx, [5.0, 0.0]);
        assert_eq!(all.fz, [0.0, -1.0]);

        let mut second = SoABuffer::default();
        second.load(&particles[1..]);
        second.copy_forces(&all, 1);
        assert_eq!(second.fz, [-1.0]);
    }
}
