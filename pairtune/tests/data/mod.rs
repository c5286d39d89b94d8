#![allow(dead_code)]

use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use pairtune::options::DataLayoutOption;
use pairtune::{PairwiseFunctor, Particle, Vector3D};

/// Create `per_dimension` particles on a regular grid with the given
/// `spacing`, the first particle being at `origin`. Particles ids follow
/// the x-major order of the grid.
pub fn grid(per_dimension: [usize; 3], spacing: f64, origin: Vector3D) -> Vec<Particle> {
    let mut particles = Vec::new();
    for z in 0..per_dimension[2] {
        for y in 0..per_dimension[1] {
            for x in 0..per_dimension[0] {
                let position = origin + spacing * Vector3D::new(x as f64, y as f64, z as f64);
                particles.push(Particle::new(particles.len(), position));
            }
        }
    }
    return particles;
}

/// Create `count` particles uniformly distributed inside the given box
pub fn random(count: usize, box_min: Vector3D, box_max: Vector3D, seed: u64) -> Vec<Particle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count).map(|id| {
        let position = Vector3D::new(
            rng.gen_range(box_min[0]..box_max[0]),
            rng.gen_range(box_min[1]..box_max[1]),
            rng.gen_range(box_min[2]..box_max[2]),
        );
        Particle::new(id, position)
    }).collect()
}

/// All ordered pairs of particles ids closer than `range`, sorted
pub fn brute_force_pairs(particles: &[Particle], range: f64) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in particles {
        for j in particles {
            if i.id != j.id && (i.position - j.position).norm2() <= range * range {
                pairs.push((i.id, j.id));
            }
        }
    }
    pairs.sort_unstable();
    return pairs;
}

/// Functor counting the calls for pairs closer than its range, and
/// recording these pairs in both directions
pub struct PairCounter {
    range: f64,
    calls: Mutex<usize>,
    pairs: Mutex<Vec<(usize, usize)>>,
}

impl PairCounter {
    pub fn new(range: f64) -> PairCounter {
        PairCounter {
            range: range,
            calls: Mutex::new(0),
            pairs: Mutex::new(Vec::new()),
        }
    }

    /// Get the number of calls and the sorted pairs, resetting both
    pub fn take(&self) -> (usize, Vec<(usize, usize)>) {
        let calls = std::mem::take(&mut *self.calls.lock().unwrap());
        let mut pairs = std::mem::take(&mut *self.pairs.lock().unwrap());
        pairs.sort_unstable();
        return (calls, pairs);
    }
}

impl PairwiseFunctor for PairCounter {
    fn name(&self) -> String {
        "pair counter".into()
    }

    fn cutoff(&self) -> f64 {
        self.range
    }

    fn aos(&self, i: &mut Particle, j: &mut Particle, newton3: bool) {
        if (i.position - j.position).norm2() > self.range * self.range {
            return;
        }

        *self.calls.lock().unwrap() += 1;
        let mut pairs = self.pairs.lock().unwrap();
        pairs.push((i.id, j.id));
        if newton3 {
            pairs.push((j.id, i.id));
        }
    }

    fn allows_newton3(&self) -> bool {
        true
    }

    fn allows_non_newton3(&self) -> bool {
        true
    }

    fn is_appropriate_cluster_size(&self, cluster_size: usize, data_layout: DataLayoutOption) -> bool {
        cluster_size > 0 && data_layout != DataLayoutOption::Device
    }
}
