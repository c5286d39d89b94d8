use pairtune::integrator::{calculate_positions, calculate_velocities};
use pairtune::particles::IteratorBehavior;
use pairtune::tuning::TuningResultLogger;
use pairtune::{EngineOptions, LennardJones, PairwiseEngine, Particle, Vector3D};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let steps = match std::env::args().nth(1) {
        Some(steps) => steps.parse()?,
        None => 200,
    };

    let (mut engine, functor) = setup()?;
    engine.set_result_logger(TuningResultLogger::new(Box::new(std::io::stdout()))?);

    run(&mut engine, &functor, steps)?;

    let statistics = engine.statistics();
    println!("iterations: {}", statistics.iterations);
    println!("neighbor lists rebuilds: {}", statistics.neighbor_list_rebuilds);
    println!("tuning phases: {}", statistics.tuning_phases);
    println!("tuning time: {:?}", statistics.total_tuning_time);

    Ok(())
}

/// Create an engine containing a cubic grid of particles, and the
/// corresponding Lennard-Jones functor
pub fn setup() -> Result<(PairwiseEngine, LennardJones), Box<dyn std::error::Error>> {
    let options = r#"{
        "cutoff": 2.5,
        "skin": 0.3,
        "box_min": [0.0, 0.0, 0.0],
        "box_max": [11.2, 11.2, 11.2],
        "verlet_rebuild_frequency": 10,
        "search_space": {
            "cell_size_factors": {"Finite": [1.0, 1.5]}
        },
        "tuner": {
            "strategy": "full-search",
            "tuning_interval": 100,
            "num_samples": 2
        }
    }"#;
    let mut engine = PairwiseEngine::from_json(options)?;

    let mut id = 0;
    for x in 0..10 {
        for y in 0..10 {
            for z in 0..10 {
                let position = Vector3D::new(x as f64 + 0.5, y as f64 + 0.5, z as f64 + 0.5) * 1.12;
                engine.add_particle(Particle::new(id, position))?;
                id += 1;
            }
        }
    }

    let functor = LennardJones::with_cutoff(2.5)?;
    Ok((engine, functor))
}

/// Run `steps` steps of molecular dynamics with periodic boundary conditions
pub fn run(engine: &mut PairwiseEngine, functor: &LennardJones, steps: usize) -> Result<(), Box<dyn std::error::Error>> {
    let delta_t = 0.001;
    let (box_min, box_max) = (engine.options().box_min, engine.options().box_max);
    let box_length = box_max - box_min;
    let interaction_length = engine.options().cutoff + engine.options().skin;

    for _ in 0..steps {
        calculate_positions(engine, delta_t)?;

        for mut particle in engine.update_container()? {
            for dim in 0..3 {
                if particle.position[dim] < box_min[dim] {
                    particle.position[dim] += box_length[dim];
                } else if particle.position[dim] >= box_max[dim] {
                    particle.position[dim] -= box_length[dim];
                }
            }
            engine.add_particle(particle)?;
        }

        // periodic images of the particles close to the boundaries
        let mut halo = Vec::new();
        engine.for_each(IteratorBehavior::Owned, |particle| {
            for shift in periodic_shifts() {
                let mut image = particle.clone();
                let mut in_halo = true;
                for dim in 0..3 {
                    image.position[dim] += shift[dim] * box_length[dim];
                    let position = image.position[dim];
                    in_halo &= position >= box_min[dim] - interaction_length && position < box_max[dim] + interaction_length;
                }
                if in_halo {
                    halo.push(image);
                }
            }
        });
        for particle in halo {
            engine.add_halo_particle(particle)?;
        }

        engine.iterate_pairwise(functor)?;
        calculate_velocities(engine, delta_t)?;
    }

    Ok(())
}

/// All periodic shifts except the identity
fn periodic_shifts() -> impl Iterator<Item = [f64; 3]> {
    (0..27).filter(|&i| i != 13).map(|i| {
        [(i % 3) as f64 - 1.0, ((i / 3) % 3) as f64 - 1.0, (i / 9) as f64 - 1.0]
    })
}
