//! Velocity-Verlet time integration of the owned particles in a
//! [`PairwiseEngine`]. All particles have a unit mass.
//!
//! A time step is done by calling [`calculate_positions`], then computing the
//! new forces, and then calling [`calculate_velocities`].

use crate::particles::IteratorBehavior;
use crate::{Error, PairwiseEngine, Vector3D};

fn check_time_step(delta_t: f64) -> Result<(), Error> {
    if !(delta_t > 0.0) || !delta_t.is_finite() {
        return Err(Error::InvalidParameter(format!("time step must be positive, got {}", delta_t)));
    }
    return Ok(());
}

/// Update the positions of all owned particles with their velocity and
/// force. The current force is then stored as the old force, and reset to
/// zero for the next force calculation.
#[time_graph::instrument(name = "integrator::calculate_positions")]
pub fn calculate_positions(engine: &mut PairwiseEngine, delta_t: f64) -> Result<(), Error> {
    check_time_step(delta_t)?;
    engine.for_each_mut(IteratorBehavior::Owned, |particle| {
        let displacement = delta_t * particle.velocity + (0.5 * delta_t * delta_t) * particle.force;
        particle.position += displacement;
        particle.old_force = particle.force;
        particle.force = Vector3D::zero();
    });
    return Ok(());
}

/// Update the velocities of all owned particles with the average of the
/// force and old force.
#[time_graph::instrument(name = "integrator::calculate_velocities")]
pub fn calculate_velocities(engine: &mut PairwiseEngine, delta_t: f64) -> Result<(), Error> {
    check_time_step(delta_t)?;
    engine.for_each_mut(IteratorBehavior::Owned, |particle| {
        particle.velocity += (0.5 * delta_t) * (particle.force + particle.old_force);
    });
    return Ok(());
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{EngineOptions, Particle};

    use super::*;

    #[test]
    fn single_particle() {
        let options = EngineOptions::new(1.0, 0.2, Vector3D::zero(), Vector3D::new(4.0, 4.0, 4.0));
        let mut engine = PairwiseEngine::new(options).unwrap();

        let mut particle = Particle::new(0, Vector3D::new(1.0, 1.0, 1.0));
        particle.velocity = Vector3D::new(1.0, 0.0, 0.0);
        particle.force = Vector3D::new(0.0, 2.0, 0.0);
        engine.add_particle(particle).unwrap();

        calculate_positions(&mut engine, 0.5).unwrap();
        engine.for_each(IteratorBehavior::Owned, |particle| {
            assert_relative_eq!(particle.position, Vector3D::new(1.5, 1.25, 1.0));
            assert_eq!(particle.force, Vector3D::zero());
            assert_eq!(particle.old_force, Vector3D::new(0.0, 2.0, 0.0));
        });

        calculate_velocities(&mut engine, 0.5).unwrap();
        engine.for_each(IteratorBehavior::Owned, |particle| {
            assert_relative_eq!(particle.velocity, Vector3D::new(1.0, 0.5, 0.0));
        });

        assert!(calculate_positions(&mut engine, 0.0).is_err());
        assert!(calculate_velocities(&mut engine, f64::NAN).is_err());
    }
}
