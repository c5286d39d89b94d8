use super::{Particle, SoABuffer};

/// A spatial bin holding particles. The particles are stored directly, and
/// converted to the `soa` buffers during traversals using the
/// structure-of-arrays layout.
#[derive(Debug, Clone, Default)]
pub struct ParticleCell {
    /// particles in this cell
    pub particles: Vec<Particle>,
    /// structure of arrays buffers, only filled during a traversal
    pub soa: SoABuffer,
}

impl ParticleCell {
    /// Create an empty cell
    pub fn new() -> ParticleCell {
        ParticleCell::default()
    }

    /// Add a particle to this cell
    pub fn push(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Number of particles in this cell, including deleted ones
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Is this cell empty?
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Remove all particles marked as dummy from this cell
    pub fn remove_dummies(&mut self) {
        self.particles.retain(|particle| !particle.is_dummy());
    }

    /// Fill the SoA buffers from the particles in this cell
    pub fn load_soa(&mut self) {
        self.soa.load(&self.particles);
    }

    /// Write back the forces from the SoA buffers to the particles
    pub fn extract_soa(&mut self) {
        self.soa.extract(&mut self.particles);
    }
}
