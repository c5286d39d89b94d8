//! Particles and the cells storing them.

use crate::Vector3D;

mod cell;
pub use self::cell::ParticleCell;

mod soa;
pub use self::soa::SoABuffer;

/// Ownership of a particle relative to the local domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub enum OwnershipState {
    /// The particle belongs to this domain
    #[default]
    Owned,
    /// Copy of a particle owned by another domain, only used as interaction
    /// partner
    Halo,
    /// Deleted particle, ignored by all traversals and removed at the next
    /// container update
    Dummy,
}

/// A single particle, as created by the particle generators and updated by
/// the integrator and force functors.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Unique identifier of this particle
    pub id: usize,
    /// Type of this particle, used to look up interaction parameters
    pub type_id: usize,
    /// Position of the particle
    pub position: Vector3D,
    /// Velocity of the particle
    pub velocity: Vector3D,
    /// Force acting on the particle during the current step
    pub force: Vector3D,
    /// Force acting on the particle during the previous step
    pub old_force: Vector3D,
    /// Is this particle owned, a halo copy or deleted?
    pub ownership: OwnershipState,
}

impl Particle {
    /// Create a new owned particle at rest with the given `id` and `position`
    pub fn new(id: usize, position: Vector3D) -> Particle {
        Particle {
            id: id,
            type_id: 0,
            position: position,
            velocity: Vector3D::zero(),
            force: Vector3D::zero(),
            old_force: Vector3D::zero(),
            ownership: OwnershipState::Owned,
        }
    }

    /// Is this particle owned by the local domain?
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.ownership == OwnershipState::Owned
    }

    /// Is this particle a halo copy?
    #[inline]
    pub fn is_halo(&self) -> bool {
        self.ownership == OwnershipState::Halo
    }

    /// Has this particle been deleted?
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.ownership == OwnershipState::Dummy
    }

    /// Mark this particle as deleted. It will be ignored from now on, and
    /// removed at the next container update.
    pub fn mark_dummy(&mut self) {
        self.ownership = OwnershipState::Dummy;
    }
}

/// Which particles should be visited when iterating over a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorBehavior {
    /// Only owned particles
    Owned,
    /// Only halo particles
    Halo,
    /// Owned and halo particles
    OwnedOrHalo,
    /// All particles, including deleted ones
    All,
}

impl IteratorBehavior {
    /// Should a particle with the given ownership be visited?
    pub fn accepts(self, ownership: OwnershipState) -> bool {
        match self {
            IteratorBehavior::Owned => ownership == OwnershipState::Owned,
            IteratorBehavior::Halo => ownership == OwnershipState::Halo,
            IteratorBehavior::OwnedOrHalo => ownership != OwnershipState::Dummy,
            IteratorBehavior::All => true,
        }
    }
}
