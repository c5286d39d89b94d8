use std::cell::{Cell, RefCell};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thread_local::ThreadLocal;

use crate::options::DataLayoutOption;
use crate::particles::Particle;
use crate::Vector3D;

use super::PairwiseFunctor;

/// Functor recording all ordered pairs `(i, j)` of particle ids for which the
/// force on `i` was computed, with a distance below `cutoff`.
pub struct PairRecorder {
    cutoff: f64,
    newton3: bool,
    non_newton3: bool,
    pairs: ThreadLocal<RefCell<Vec<(usize, usize)>>>,
    calls: ThreadLocal<Cell<usize>>,
}

impl PairRecorder {
    pub fn new(cutoff: f64) -> PairRecorder {
        PairRecorder {
            cutoff: cutoff,
            newton3: true,
            non_newton3: true,
            pairs: ThreadLocal::new(),
            calls: ThreadLocal::new(),
        }
    }

    pub fn only_non_newton3(cutoff: f64) -> PairRecorder {
        let mut recorder = PairRecorder::new(cutoff);
        recorder.newton3 = false;
        recorder
    }

    /// Get all the recorded pairs, sorted
    pub fn pairs(&mut self) -> Vec<(usize, usize)> {
        let mut all = self.pairs.iter_mut()
            .flat_map(|pairs| pairs.get_mut().drain(..))
            .collect::<Vec<_>>();
        all.sort_unstable();
        return all;
    }

    /// Number of calls to the functor for pairs inside the cutoff
    pub fn interactions(&mut self) -> usize {
        self.calls.iter_mut().map(|calls| calls.get()).sum()
    }
}

impl PairwiseFunctor for PairRecorder {
    fn name(&self) -> String {
        "pair recorder".into()
    }

    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn aos(&self, i: &mut Particle, j: &mut Particle, newton3: bool) {
        assert!(!i.is_dummy() && !j.is_dummy());
        if (i.position - j.position).norm2() > self.cutoff * self.cutoff {
            return;
        }

        let calls = self.calls.get_or_default();
        calls.set(calls.get() + 1);

        let mut pairs = self.pairs.get_or_default().borrow_mut();
        pairs.push((i.id, j.id));
        if newton3 {
            pairs.push((j.id, i.id));
        }
    }

    fn allows_newton3(&self) -> bool {
        self.newton3
    }

    fn allows_non_newton3(&self) -> bool {
        self.non_newton3
    }

    fn is_appropriate_cluster_size(&self, _: usize, data_layout: DataLayoutOption) -> bool {
        data_layout != DataLayoutOption::Device
    }
}

/// Create `per_dimension` particles on a regular grid with the given
/// `spacing`, starting at `spacing / 2` from the origin
pub fn grid_particles(per_dimension: [usize; 3], spacing: f64) -> Vec<Particle> {
    let mut particles = Vec::new();
    for z in 0..per_dimension[2] {
        for y in 0..per_dimension[1] {
            for x in 0..per_dimension[0] {
                let position = Vector3D::new(
                    (x as f64 + 0.5) * spacing,
                    (y as f64 + 0.5) * spacing,
                    (z as f64 + 0.5) * spacing,
                );
                particles.push(Particle::new(particles.len(), position));
            }
        }
    }
    return particles;
}

/// Create `count` particles uniformly distributed inside the given box
pub fn random_particles(count: usize, box_min: Vector3D, box_max: Vector3D, seed: u64) -> Vec<Particle> {
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

/// Reference result for `PairRecorder`, computed by checking all pairs
pub fn brute_force_pairs(particles: &[Particle], cutoff: f64) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in particles {
        for j in particles {
            if i.id != j.id && (i.position - j.position).norm2() <= cutoff * cutoff {
                pairs.push((i.id, j.id));
            }
        }
    }
    pairs.sort_unstable();
    return pairs;
}
