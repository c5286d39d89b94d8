use approx::assert_relative_eq;

use pairtune::integrator::{calculate_positions, calculate_velocities};
use pairtune::particles::IteratorBehavior;
use pairtune::{EngineOptions, PairwiseEngine, Vector3D};

mod data;

fn engine() -> PairwiseEngine {
    let options = EngineOptions::new(1.0, 0.2, Vector3D::zero(), Vector3D::new(5.0, 5.0, 5.0));
    let mut engine = PairwiseEngine::new(options).unwrap();
    for mut particle in data::grid([2, 2, 2], 1.0, Vector3D::new(1.0, 1.0, 1.0)) {
        particle.force = Vector3D::new(0.0, 0.0, 1.0);
        particle.velocity = Vector3D::new(0.0, 0.0, 1.0);
        engine.add_particle(particle).unwrap();
    }
    return engine;
}

#[test]
fn positions() {
    let mut engine = engine();
    let mut initial = Vec::new();
    engine.for_each(IteratorBehavior::Owned, |particle| initial.push((particle.id, particle.position)));
    initial.sort_by_key(|&(id, _)| id);

    calculate_positions(&mut engine, 0.1).unwrap();

    engine.for_each(IteratorBehavior::Owned, |particle| {
        let expected = initial[particle.id].1 + Vector3D::new(0.0, 0.0, 0.105);
        assert_relative_eq!(particle.position, expected, epsilon = 1e-13);
        assert_eq!(particle.force, Vector3D::zero());
        assert_eq!(particle.old_force, Vector3D::new(0.0, 0.0, 1.0));
    });
}

#[test]
fn velocities() {
    let mut engine = engine();
    calculate_positions(&mut engine, 0.1).unwrap();
    calculate_velocities(&mut engine, 0.1).unwrap();
    engine.for_each(IteratorBehavior::Owned, |particle| {
        assert_relative_eq!(particle.velocity, Vector3D::new(0.0, 0.0, 1.05), epsilon = 1e-13);
    });

    engine.for_each_mut(IteratorBehavior::Owned, |particle| particle.force = Vector3D::new(0.0, 0.0, 2.0));
    calculate_velocities(&mut engine, 0.1).unwrap();
    engine.for_each(IteratorBehavior::Owned, |particle| {
        assert_relative_eq!(particle.velocity, Vector3D::new(0.0, 0.0, 1.2), epsilon = 1e-13);
    });
}
