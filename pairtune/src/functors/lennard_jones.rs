use std::cell::Cell;

use thread_local::ThreadLocal;

use crate::options::DataLayoutOption;
use crate::particles::{Particle, SoABuffer, OwnershipState};
use crate::Error;

use super::PairwiseFunctor;

/// Global values accumulated by the Lennard-Jones functor on each thread
#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    potential_energy: f64,
    virial: f64,
}

/// Parameters for the Lennard-Jones functor
#[derive(Debug, Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct LennardJonesParameters {
    /// Cutoff radius of the interaction
    pub cutoff: f64,
    /// Depth of the potential well
    pub epsilon: f64,
    /// Distance at which the potential is zero
    pub sigma: f64,
    /// Shift the potential energy to make it zero at the cutoff
    #[serde(default)]
    pub shift: bool,
    /// Accumulate the potential energy and virial during the force
    /// calculation
    #[serde(default)]
    pub compute_globals: bool,
}

/// The 12-6 Lennard-Jones potential, `V(r) = 4 ε ((σ/r)^12 - (σ/r)^6)`.
pub struct LennardJones {
    parameters: LennardJonesParameters,
    cutoff2: f64,
    sigma6: f64,
    shift6: f64,
    globals: ThreadLocal<Cell<Globals>>,
}

impl std::fmt::Debug for LennardJones {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LennardJones")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl LennardJones {
    /// Create a new Lennard-Jones functor with the given parameters
    pub fn new(parameters: LennardJonesParameters) -> Result<LennardJones, Error> {
        if !(parameters.cutoff > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "Lennard-Jones cutoff must be positive, got {}", parameters.cutoff
            )));
        }

        if !(parameters.sigma > 0.0) || parameters.epsilon < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "invalid Lennard-Jones parameters: sigma = {}, epsilon = {}",
                parameters.sigma, parameters.epsilon
            )));
        }

        let sigma6 = parameters.sigma.powi(6);
        let shift6 = if parameters.shift {
            let lj6 = sigma6 / parameters.cutoff.powi(6);
            -4.0 * parameters.epsilon * (lj6 * lj6 - lj6)
        } else {
            0.0
        };

        Ok(LennardJones {
            parameters: parameters,
            cutoff2: parameters.cutoff * parameters.cutoff,
            sigma6: sigma6,
            shift6: shift6,
            globals: ThreadLocal::new(),
        })
    }

    /// Create a Lennard-Jones functor with `ε = σ = 1` and the given cutoff
    pub fn with_cutoff(cutoff: f64) -> Result<LennardJones, Error> {
        LennardJones::new(LennardJonesParameters {
            cutoff: cutoff,
            epsilon: 1.0,
            sigma: 1.0,
            shift: false,
            compute_globals: false,
        })
    }

    /// Potential energy accumulated since the last call to `reset_globals`
    pub fn potential_energy(&mut self) -> f64 {
        self.globals.iter_mut().map(|g| g.get().potential_energy).sum()
    }

    /// Virial accumulated since the last call to `reset_globals`
    pub fn virial(&mut self) -> f64 {
        self.globals.iter_mut().map(|g| g.get().virial).sum()
    }

    /// Reset the accumulated potential energy and virial
    pub fn reset_globals(&mut self) {
        self.globals.clear();
    }

    /// Compute the scalar force factor `f` such that the force on `i` is
    /// `f * (r_i - r_j)`, and the corresponding energy
    #[inline]
    fn kernel(&self, distance2: f64) -> (f64, f64) {
        let inv_r2 = 1.0 / distance2;
        let lj6 = self.sigma6 * inv_r2 * inv_r2 * inv_r2;
        let lj12 = lj6 * lj6;
        let factor = 24.0 * self.parameters.epsilon * (2.0 * lj12 - lj6) * inv_r2;
        let energy = 4.0 * self.parameters.epsilon * (lj12 - lj6) + self.shift6;
        return (factor, energy);
    }

    #[inline]
    fn accumulate(&self, energy: f64, virial: f64, weight: f64) {
        if weight == 0.0 {
            return;
        }
        let cell = self.globals.get_or_default();
        let mut globals = cell.get();
        globals.potential_energy += weight * energy;
        globals.virial += weight * virial;
        cell.set(globals);
    }

    /// Weight of a pair in the global values, each pair of owned particles
    /// contributes exactly once regardless of Newton's third law
    #[inline]
    fn global_weight(first: OwnershipState, second: OwnershipState, newton3: bool) -> f64 {
        let owned = |state| if state == OwnershipState::Owned { 0.5 } else { 0.0 };
        if newton3 {
            owned(first) + owned(second)
        } else {
            owned(first)
        }
    }
}

impl PairwiseFunctor for LennardJones {
    fn name(&self) -> String {
        "Lennard-Jones 12-6".into()
    }

    fn cutoff(&self) -> f64 {
        self.parameters.cutoff
    }

    fn aos(&self, i: &mut Particle, j: &mut Particle, newton3: bool) {
        let dr = i.position - j.position;
        let distance2 = dr.norm2();
        if distance2 > self.cutoff2 {
            return;
        }

        let (factor, energy) = self.kernel(distance2);
        let force = dr * factor;
        i.force += force;
        if newton3 {
            j.force -= force;
        }

        if self.parameters.compute_globals {
            let weight = LennardJones::global_weight(i.ownership, j.ownership, newton3);
            self.accumulate(energy, dr * force, weight);
        }
    }

    fn aos_one_way(&self, i: &mut Particle, j: &Particle) {
        let dr = i.position - j.position;
        let distance2 = dr.norm2();
        if distance2 > self.cutoff2 {
            return;
        }

        let (factor, energy) = self.kernel(distance2);
        let force = dr * factor;
        i.force += force;

        if self.parameters.compute_globals {
            let weight = LennardJones::global_weight(i.ownership, j.ownership, false);
            self.accumulate(energy, dr * force, weight);
        }
    }

    fn soa_single(&self, soa: &mut SoABuffer, newton3: bool) {
        let n = soa.len();
        for i in 0..n {
            if soa.is_dummy(i) {
                continue;
            }

            let (xi, yi, zi) = (soa.x[i], soa.y[i], soa.z[i]);
            let (mut fxi, mut fyi, mut fzi) = (0.0, 0.0, 0.0);

            let start = if newton3 { i + 1 } else { 0 };
            for j in start..n {
                if i == j || soa.is_dummy(j) {
                    continue;
                }

                let (dx, dy, dz) = (xi - soa.x[j], yi - soa.y[j], zi - soa.z[j]);
                let distance2 = dx * dx + dy * dy + dz * dz;
                if distance2 > self.cutoff2 {
                    continue;
                }

                let (factor, energy) = self.kernel(distance2);
                fxi += dx * factor;
                fyi += dy * factor;
                fzi += dz * factor;
                if newton3 {
                    soa.fx[j] -= dx * factor;
                    soa.fy[j] -= dy * factor;
                    soa.fz[j] -= dz * factor;
                }

                if self.parameters.compute_globals {
                    let weight = LennardJones::global_weight(soa.ownership[i], soa.ownership[j], newton3);
                    self.accumulate(energy, distance2 * factor, weight);
                }
            }

            soa.fx[i] += fxi;
            soa.fy[i] += fyi;
            soa.fz[i] += fzi;
        }
    }

    fn soa_pair(&self, soa1: &mut SoABuffer, soa2: &mut SoABuffer, newton3: bool) {
        for i in 0..soa1.len() {
            if soa1.is_dummy(i) {
                continue;
            }

            let (xi, yi, zi) = (soa1.x[i], soa1.y[i], soa1.z[i]);
            let (mut fxi, mut fyi, mut fzi) = (0.0, 0.0, 0.0);

            for j in 0..soa2.len() {
                if soa2.is_dummy(j) {
                    continue;
                }

                let (dx, dy, dz) = (xi - soa2.x[j], yi - soa2.y[j], zi - soa2.z[j]);
                let distance2 = dx * dx + dy * dy + dz * dz;
                if distance2 > self.cutoff2 {
                    continue;
                }

                let (factor, energy) = self.kernel(distance2);
                fxi += dx * factor;
                fyi += dy * factor;
                fzi += dz * factor;
                if newton3 {
                    soa2.fx[j] -= dx * factor;
                    soa2.fy[j] -= dy * factor;
                    soa2.fz[j] -= dz * factor;
                }

                if self.parameters.compute_globals {
                    let weight = LennardJones::global_weight(soa1.ownership[i], soa2.ownership[j], newton3);
                    self.accumulate(energy, distance2 * factor, weight);
                }
            }

            soa1.fx[i] += fxi;
            soa1.fy[i] += fyi;
            soa1.fz[i] += fzi;
        }
    }

    fn soa_pair_one_way(&self, soa: &mut SoABuffer, other: &SoABuffer) {
        for i in 0..soa.len() {
            if soa.is_dummy(i) {
                continue;
            }

            let (xi, yi, zi) = (soa.x[i], soa.y[i], soa.z[i]);
            let (mut fxi, mut fyi, mut fzi) = (0.0, 0.0, 0.0);

            for j in 0..other.len() {
                if other.is_dummy(j) {
                    continue;
                }

                let (dx, dy, dz) = (xi - other.x[j], yi - other.y[j], zi - other.z[j]);
                let distance2 = dx * dx + dy * dy + dz * dz;
                if distance2 > self.cutoff2 {
                    continue;
                }

                let (factor, energy) = self.kernel(distance2);
                fxi += dx * factor;
                fyi += dy * factor;
                fzi += dz * factor;

                if self.parameters.compute_globals {
                    let weight = LennardJones::global_weight(soa.ownership[i], other.ownership[j], false);
                    self.accumulate(energy, distance2 * factor, weight);
                }
            }

            soa.fx[i] += fxi;
            soa.fy[i] += fyi;
            soa.fz[i] += fzi;
        }
    }

    fn soa_verlet(&self, soa: &mut SoABuffer, index: usize, neighbors: &[usize], newton3: bool) {
        if soa.is_dummy(index) {
            return;
        }

        let (xi, yi, zi) = (soa.x[index], soa.y[index], soa.z[index]);
        let (mut fxi, mut fyi, mut fzi) = (0.0, 0.0, 0.0);
        for &j in neighbors {
            if soa.is_dummy(j) {
                continue;
            }

            let (dx, dy, dz) = (xi - soa.x[j], yi - soa.y[j], zi - soa.z[j]);
            let distance2 = dx * dx + dy * dy + dz * dz;
            if distance2 > self.cutoff2 {
                continue;
            }

            let (factor, energy) = self.kernel(distance2);
            fxi += dx * factor;
            fyi += dy * factor;
            fzi += dz * factor;
            if newton3 {
                soa.fx[j] -= dx * factor;
                soa.fy[j] -= dy * factor;
                soa.fz[j] -= dz * factor;
            }

            if self.parameters.compute_globals {
                let weight = LennardJones::global_weight(soa.ownership[index], soa.ownership[j], newton3);
                self.accumulate(energy, distance2 * factor, weight);
            }
        }

        soa.fx[index] += fxi;
        soa.fy[index] += fyi;
        soa.fz[index] += fzi;
    }

    fn allows_newton3(&self) -> bool {
        true
    }

    fn allows_non_newton3(&self) -> bool {
        true
    }

    fn is_appropriate_cluster_size(&self, cluster_size: usize, data_layout: DataLayoutOption) -> bool {
        match data_layout {
            DataLayoutOption::Aos | DataLayoutOption::Soa => cluster_size > 0,
            // there is no device kernel for this functor
            DataLayoutOption::Device => false,
        }
    }
}
