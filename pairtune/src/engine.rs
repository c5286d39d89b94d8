use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};

use crate::containers::{ContainerSelector, ParticleContainer};
use crate::particles::{IteratorBehavior, OwnershipState, Particle};
use crate::traversals::{generate_traversal, Traversal};
use crate::tuning::{AutoTuner, Configuration, ConfigurationSpace, SearchSpaceOptions, TunerOptions};
use crate::tuning::{TuningResultLogger, PredictionLogger};
use crate::options::TimingOption;
use crate::utils::Timer;
use crate::{Error, PairwiseFunctor, Vector3D};

fn default_verlet_rebuild_frequency() -> usize { 10 }
fn default_cluster_size() -> usize { 4 }

/// Parameters of a [`PairwiseEngine`]
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    /// Cutoff radius of the interactions
    pub cutoff: f64,
    /// Additional distance added to the cutoff when building neighbor lists,
    /// allowing to reuse the lists while particles move less than half of it
    pub skin: f64,
    /// Lower corner of the simulation box
    pub box_min: Vector3D,
    /// Upper corner of the simulation box
    pub box_max: Vector3D,
    /// Neighbor lists are rebuilt at least every this many iterations
    #[serde(default = "default_verlet_rebuild_frequency")]
    pub verlet_rebuild_frequency: usize,
    /// Number of particles in a cluster for the verlet cluster lists
    #[serde(default = "default_cluster_size")]
    pub cluster_size: usize,
    /// Algorithmic choices available to the tuner
    #[serde(default)]
    pub search_space: SearchSpaceOptions,
    /// Parameters of the tuner
    #[serde(default)]
    pub tuner: TunerOptions,
    /// How the time of the iterations reported to the tuner is measured
    #[serde(default)]
    pub timing: TimingOption,
}

impl EngineOptions {
    /// Create options for the given cutoff, skin and box, using default
    /// values for everything else
    pub fn new(cutoff: f64, skin: f64, box_min: Vector3D, box_max: Vector3D) -> EngineOptions {
        EngineOptions {
            cutoff: cutoff,
            skin: skin,
            box_min: box_min,
            box_max: box_max,
            verlet_rebuild_frequency: default_verlet_rebuild_frequency(),
            cluster_size: default_cluster_size(),
            search_space: SearchSpaceOptions::default(),
            tuner: TunerOptions::default(),
            timing: TimingOption::default(),
        }
    }
}

/// What happened during a single call to [`PairwiseEngine::iterate_pairwise`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// Configuration used for this iteration
    pub configuration: Configuration,
    /// Was this iteration part of a tuning phase?
    pub tuning: bool,
    /// Were the neighbor lists rebuilt before this iteration?
    pub rebuilt_neighbor_lists: bool,
    /// Time taken by the iteration, including the neighbor lists rebuild
    pub time: Duration,
}

/// Statistics collected by a [`PairwiseEngine`] over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatistics {
    /// Number of calls to `iterate_pairwise`
    pub iterations: usize,
    /// Number of neighbor lists rebuilds, including the sorting of particles
    /// in the cells of the containers without lists
    pub neighbor_list_rebuilds: usize,
    /// Number of completed tuning phases
    pub tuning_phases: usize,
    /// Time spent in iterations measured by the tuner
    pub total_tuning_time: Duration,
}

/// The `PairwiseEngine` owns the particles and the tuner, and runs each
/// iteration of pairwise interactions with the configuration selected by
/// the tuner.
///
/// A typical step of a simulation looks like this:
///
/// 1. update the positions of the particles with [`PairwiseEngine::for_each_mut`];
/// 2. call [`PairwiseEngine::update_container`] and send the leaving
///    particles to their new domain (or wrap them around the periodic
///    boundaries and add them back);
/// 3. add halo particles with [`PairwiseEngine::add_halo_particle`];
/// 4. compute the interactions with [`PairwiseEngine::iterate_pairwise`].
pub struct PairwiseEngine {
    options: EngineOptions,
    selector: ContainerSelector,
    tuner: AutoTuner,
    /// Are the neighbor lists of the current container still valid?
    lists_valid: bool,
    /// Configuration the neighbor lists were last built for
    built_for: Option<Configuration>,
    iterations_since_rebuild: usize,
    /// Position of the owned particles at the last rebuild, indexed by id
    rebuild_positions: HashMap<usize, Vector3D>,
    timer: Timer,
    statistics: EngineStatistics,
}

impl std::fmt::Debug for PairwiseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairwiseEngine")
            .field("options", &self.options)
            .field("selector", &self.selector)
            .field("tuner", &self.tuner)
            .field("statistics", &self.statistics)
            .finish_non_exhaustive()
    }
}

impl PairwiseEngine {
    /// Create a new engine with the given options
    pub fn new(options: EngineOptions) -> Result<PairwiseEngine, Error> {
        if options.verlet_rebuild_frequency == 0 {
            return Err(Error::InvalidParameter("verlet_rebuild_frequency must be at least 1".into()));
        }

        let space = ConfigurationSpace::new(&options.search_space)?;
        let selector = ContainerSelector::new(
            options.box_min,
            options.box_max,
            options.cutoff,
            options.skin,
            options.cluster_size,
        )?;
        let tuner = AutoTuner::new(options.tuner.clone(), space)?;
        let timer = Timer::with_mode(options.timing);

        return Ok(PairwiseEngine {
            options: options,
            selector: selector,
            tuner: tuner,
            lists_valid: false,
            built_for: None,
            iterations_since_rebuild: 0,
            rebuild_positions: HashMap::new(),
            timer: timer,
            statistics: EngineStatistics::default(),
        });
    }

    /// Create a new engine from options in JSON format
    pub fn from_json(json: &str) -> Result<PairwiseEngine, Error> {
        let options = serde_json::from_str::<EngineOptions>(json)?;
        return PairwiseEngine::new(options);
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Get the tuner used by this engine
    pub fn tuner(&self) -> &AutoTuner {
        &self.tuner
    }

    /// Write the result of all tuning phases to the given logger
    pub fn set_result_logger(&mut self, logger: TuningResultLogger) {
        self.tuner.set_result_logger(logger);
    }

    /// Write the predictions of predictive tuning to the given logger
    pub fn set_prediction_logger(&mut self, logger: PredictionLogger) {
        self.tuner.set_prediction_logger(logger);
    }

    /// Get the container currently storing the particles
    pub fn container(&self) -> &dyn ParticleContainer {
        self.selector.container()
    }

    /// Get the statistics collected by this engine
    pub fn statistics(&self) -> EngineStatistics {
        let mut statistics = self.statistics;
        statistics.tuning_phases = self.tuner.completed_tuning_phases();
        statistics.total_tuning_time = self.tuner.total_tuning_time();
        return statistics;
    }

    /// Start a new tuning phase at the next iteration, for example after a
    /// large change in the particles distribution
    pub fn force_retune(&mut self) {
        self.tuner.force_retune();
    }

    /// Add an owned particle inside the box. This invalidates the neighbor
    /// lists.
    pub fn add_particle(&mut self, particle: Particle) -> Result<(), Error> {
        self.selector.container_mut().add_particle(particle)?;
        self.lists_valid = false;
        return Ok(());
    }

    /// Add a halo particle, outside of the box but within the interaction
    /// length of it.
    ///
    /// If the neighbor lists are still valid and the same particle was
    /// already a halo particle before the last container update, the existing
    /// copy is updated instead and the lists are kept.
    pub fn add_halo_particle(&mut self, particle: Particle) -> Result<(), Error> {
        if self.lists_valid && self.update_halo_particle(&particle) {
            return Ok(());
        }

        self.selector.container_mut().add_halo_particle(particle)?;
        self.lists_valid = false;
        return Ok(());
    }

    /// Try to revive a halo particle marked as dummy by the last container
    /// update
    fn update_halo_particle(&mut self, particle: &Particle) -> bool {
        let max_distance2 = 0.25 * self.options.skin * self.options.skin;
        let mut updated = false;
        self.selector.container_mut().for_each_mut(IteratorBehavior::All, &mut |existing| {
            if updated || existing.id != particle.id || !existing.is_dummy() {
                return;
            }

            if (existing.position - particle.position).norm2() <= max_distance2 {
                *existing = particle.clone();
                existing.ownership = OwnershipState::Halo;
                updated = true;
            }
        });
        return updated;
    }

    /// Delete all owned particles for which `predicate` returns `true`,
    /// returning the number of deleted particles. Deleted particles are
    /// marked as dummies and removed at the next container update.
    pub fn delete_particles(&mut self, predicate: impl Fn(&Particle) -> bool) -> usize {
        let mut deleted = 0;
        self.selector.container_mut().for_each_mut(IteratorBehavior::Owned, &mut |particle| {
            if predicate(particle) {
                particle.mark_dummy();
                deleted += 1;
            }
        });

        if deleted != 0 {
            self.lists_valid = false;
        }
        return deleted;
    }

    /// Delete all the halo particles
    pub fn delete_halo_particles(&mut self) {
        self.selector.container_mut().delete_halo_particles();
        self.lists_valid = false;
    }

    /// Call `function` on all particles matching `behavior`
    pub fn for_each(&self, behavior: IteratorBehavior, mut function: impl FnMut(&Particle)) {
        self.selector.container().for_each(behavior, &mut function);
    }

    /// Call `function` on all particles matching `behavior`, allowing to
    /// modify them. Particles should not move by more than half of the skin
    /// between two calls to `update_container`.
    pub fn for_each_mut(&mut self, behavior: IteratorBehavior, mut function: impl FnMut(&mut Particle)) {
        self.selector.container_mut().for_each_mut(behavior, &mut function);
    }

    /// Number of particles matching `behavior`
    pub fn number_of_particles(&self, behavior: IteratorBehavior) -> usize {
        self.selector.container().number_of_particles(behavior)
    }

    /// Does the next iteration need to rebuild the neighbor lists?
    pub fn needs_rebuild(&self) -> bool {
        if !self.lists_valid || self.iterations_since_rebuild >= self.options.verlet_rebuild_frequency {
            return true;
        }

        if self.tuner.is_tuning() {
            return true;
        }

        return 2.0 * self.max_displacement() >= self.options.skin;
    }

    /// Largest displacement of an owned particle since the last rebuild
    fn max_displacement(&self) -> f64 {
        let mut max2: f64 = 0.0;
        self.selector.container().for_each(IteratorBehavior::Owned, &mut |particle| {
            match self.rebuild_positions.get(&particle.id) {
                Some(reference) => max2 = max2.max((particle.position - *reference).norm2()),
                None => max2 = f64::INFINITY,
            }
        });
        return max2.sqrt();
    }

    /// Update the container after the particles moved. All halo particles
    /// are removed, and the owned particles which left the box are returned.
    ///
    /// If the neighbor lists are still valid, particles stay in place and
    /// the lists are kept. Otherwise the particles are sorted again.
    #[time_graph::instrument(name = "PairwiseEngine::update_container")]
    pub fn update_container(&mut self) -> Result<Vec<Particle>, Error> {
        let keep_lists = !self.needs_rebuild();
        let leaving = self.selector.container_mut().update_container(keep_lists)?;
        if !keep_lists {
            self.lists_valid = false;
        }

        debug!(
            "updated container (keep neighbor lists = {}), {} particles left the box",
            keep_lists, leaving.len()
        );
        return Ok(leaving);
    }

    /// Get the configuration for this iteration and the corresponding
    /// traversal, rejecting inapplicable configurations along the way.
    /// Returns `true` as the last element if the container changed.
    fn select_configuration(&mut self, functor: &dyn PairwiseFunctor) -> Result<(Configuration, Box<dyn Traversal>, bool), Error> {
        let mut configuration = self.tuner.tune()?;
        let mut container_changed = false;
        loop {
            container_changed |= self.selector.select(configuration.container, configuration.cell_size_factor)?;

            let info = self.selector.container().traversal_info();
            let traversal = generate_traversal(
                configuration.traversal,
                configuration.data_layout,
                configuration.newton3.enabled(),
                &info,
                functor,
            )?;

            if traversal.is_applicable() {
                return Ok((configuration, traversal, container_changed));
            }

            configuration = self.tuner.reject_configuration(&configuration)?;
        }
    }

    /// Compute the interactions between all pairs of particles with the
    /// given `functor`, using the configuration selected by the tuner.
    #[time_graph::instrument(name = "PairwiseEngine::iterate_pairwise")]
    pub fn iterate_pairwise(&mut self, functor: &dyn PairwiseFunctor) -> Result<IterationReport, Error> {
        let (configuration, traversal, container_changed) = self.select_configuration(functor)?;
        let tuning = self.tuner.is_tuning();

        let rebuild = container_changed
            || !self.lists_valid
            || self.built_for != Some(configuration)
            || self.iterations_since_rebuild >= self.options.verlet_rebuild_frequency
            || 2.0 * self.max_displacement() >= self.options.skin;

        let time = self.timed_iteration(rebuild, &configuration, &*traversal, functor)?;

        if tuning && functor.is_relevant_for_tuning() {
            self.tuner.report_result(time)?;
        }

        self.iterations_since_rebuild += 1;
        self.statistics.iterations += 1;

        return Ok(IterationReport {
            configuration: configuration,
            tuning: tuning,
            rebuilt_neighbor_lists: rebuild,
            time: time,
        });
    }

    /// Rebuild the neighbor lists if needed and run the iteration, returning
    /// the time it took. The timer is stopped even if the iteration fails.
    fn timed_iteration(
        &mut self,
        rebuild: bool,
        configuration: &Configuration,
        traversal: &dyn Traversal,
        functor: &dyn PairwiseFunctor,
    ) -> Result<Duration, Error> {
        self.timer.start()?;

        let mut result = Ok(());
        if rebuild {
            result = self.rebuild(configuration, traversal);
        }
        if result.is_ok() {
            result = self.selector.container_mut().iterate_pairwise(traversal, functor);
        }

        let time = self.timer.stop()?;
        result?;
        return Ok(time);
    }

    fn rebuild(&mut self, configuration: &Configuration, traversal: &dyn Traversal) -> Result<(), Error> {
        if self.built_for != Some(*configuration) {
            info!("rebuilding neighbor lists for {}", configuration);
        } else {
            debug!("rebuilding neighbor lists after {} iterations", self.iterations_since_rebuild);
        }

        let container = self.selector.container_mut();
        container.rebuild_neighbor_lists(traversal)?;

        self.rebuild_positions.clear();
        let positions = &mut self.rebuild_positions;
        container.for_each(IteratorBehavior::Owned, &mut |particle| {
            positions.insert(particle.id, particle.position);
        });

        self.lists_valid = true;
        self.built_for = Some(*configuration);
        self.iterations_since_rebuild = 0;
        self.statistics.neighbor_list_rebuilds += 1;
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use crate::functors::tests_utils::{PairRecorder, brute_force_pairs, random_particles};
    use crate::options::{ContainerOption, DataLayoutOption, Newton3Option, TraversalOption};
    use crate::tuning::TunerState;

    use super::*;

    fn options() -> EngineOptions {
        let mut options = EngineOptions::new(1.0, 0.2, Vector3D::zero(), Vector3D::new(5.0, 5.0, 5.0));
        options.verlet_rebuild_frequency = 4;
        options.tuner.num_samples = 1;
        options.tuner.tuning_interval = 20;
        options.search_space.containers = [ContainerOption::LinkedCells, ContainerOption::VerletListsCells].into_iter().collect();
        options
    }

    #[test]
    fn all_configurations_find_all_pairs() {
        let particles = random_particles(80, Vector3D::zero(), Vector3D::new(5.0, 5.0, 5.0), 3);
        let expected = brute_force_pairs(&particles, 1.0);

        let mut engine = PairwiseEngine::new(options()).unwrap();
        for particle in &particles {
            engine.add_particle(particle.clone()).unwrap();
        }

        let mut functor = PairRecorder::new(1.0);
        let mut configurations = Vec::new();
        while engine.tuner().state() != TunerState::Steady || configurations.is_empty() {
            let report = engine.iterate_pairwise(&functor).unwrap();
            assert!(report.tuning);
            assert!(report.rebuilt_neighbor_lists);
            assert_eq!(functor.pairs(), expected, "wrong pairs with {}", report.configuration);
            configurations.push(report.configuration);
        }

        let statistics = engine.statistics();
        assert_eq!(statistics.tuning_phases, 1);
        assert_eq!(statistics.iterations, configurations.len());
        assert_eq!(statistics.neighbor_list_rebuilds, configurations.len());
    }

    #[test]
    fn rebuild_frequency() {
        let mut options = options();
        options.search_space.containers = [ContainerOption::VerletListsCells].into_iter().collect();
        options.search_space.traversals = [TraversalOption::VlcC18].into_iter().collect();
        options.search_space.data_layouts = [DataLayoutOption::Aos].into_iter().collect();
        options.search_space.newton3 = [Newton3Option::Enabled].into_iter().collect();
        let mut engine = PairwiseEngine::new(options).unwrap();
        for particle in random_particles(30, Vector3D::zero(), Vector3D::new(5.0, 5.0, 5.0), 8) {
            engine.add_particle(particle).unwrap();
        }

        let functor = PairRecorder::new(1.0);
        while engine.tuner().is_tuning() {
            engine.update_container().unwrap();
            engine.iterate_pairwise(&functor).unwrap();
        }

        let mut rebuilds = Vec::new();
        for _ in 0..8 {
            let leaving = engine.update_container().unwrap();
            assert!(leaving.is_empty());
            rebuilds.push(engine.iterate_pairwise(&functor).unwrap().rebuilt_neighbor_lists);
        }
        // the single tuning iteration built the lists
        assert_eq!(rebuilds, [false, false, false, true, false, false, false, true]);
    }

    #[test]
    fn displacement_triggers_rebuild() {
        let mut options = options();
        options.verlet_rebuild_frequency = 100;
        options.search_space.containers = [ContainerOption::VerletListsCells].into_iter().collect();
        options.search_space.traversals = [TraversalOption::VlcC18].into_iter().collect();
        let mut engine = PairwiseEngine::new(options).unwrap();
        engine.add_particle(Particle::new(0, Vector3D::new(1.0, 1.0, 1.0))).unwrap();
        engine.add_particle(Particle::new(1, Vector3D::new(1.5, 1.0, 1.0))).unwrap();

        let functor = PairRecorder::new(1.0);
        while engine.tuner().is_tuning() {
            engine.iterate_pairwise(&functor).unwrap();
        }
        assert!(!engine.needs_rebuild());

        engine.for_each_mut(IteratorBehavior::Owned, |particle| particle.position[0] += 0.05);
        assert!(!engine.needs_rebuild());
        engine.for_each_mut(IteratorBehavior::Owned, |particle| particle.position[0] += 0.05);
        assert!(engine.needs_rebuild());

        engine.update_container().unwrap();
        assert!(engine.iterate_pairwise(&functor).unwrap().rebuilt_neighbor_lists);
        assert!(!engine.needs_rebuild());
    }

    #[test]
    fn particles_and_halo() {
        let mut engine = PairwiseEngine::new(options()).unwrap();
        engine.add_particle(Particle::new(0, Vector3D::new(0.2, 1.0, 1.0))).unwrap();
        engine.add_particle(Particle::new(1, Vector3D::new(4.9, 1.0, 1.0))).unwrap();
        assert!(engine.add_particle(Particle::new(2, Vector3D::new(5.5, 1.0, 1.0))).is_err());
        engine.add_halo_particle(Particle::new(3, Vector3D::new(-0.3, 1.0, 1.0))).unwrap();
        assert!(engine.add_halo_particle(Particle::new(4, Vector3D::new(1.0, 1.0, 1.0))).is_err());

        assert_eq!(engine.number_of_particles(IteratorBehavior::Owned), 2);
        assert_eq!(engine.number_of_particles(IteratorBehavior::Halo), 1);

        let mut functor = PairRecorder::new(1.0);
        engine.iterate_pairwise(&functor).unwrap();
        let pairs = functor.pairs();
        assert!(pairs.contains(&(0, 3)));
        assert!(!pairs.contains(&(0, 1)));

        assert_eq!(engine.delete_particles(|particle| particle.id == 0), 1);
        assert_eq!(engine.number_of_particles(IteratorBehavior::Owned), 1);

        engine.for_each_mut(IteratorBehavior::Owned, |particle| particle.position[0] = 5.05);
        let leaving = engine.update_container().unwrap();
        assert_eq!(leaving.len(), 1);
        assert_eq!(leaving[0].id, 1);
        assert_eq!(engine.number_of_particles(IteratorBehavior::OwnedOrHalo), 0);
    }

    #[test]
    fn halo_particles_keep_lists() {
        let mut options = options();
        options.search_space.containers = [ContainerOption::VerletListsCells].into_iter().collect();
        options.search_space.traversals = [TraversalOption::VlcC18].into_iter().collect();
        options.search_space.data_layouts = [DataLayoutOption::Aos].into_iter().collect();
        options.search_space.newton3 = [Newton3Option::Enabled].into_iter().collect();
        let mut engine = PairwiseEngine::new(options).unwrap();
        engine.add_particle(Particle::new(0, Vector3D::new(0.3, 1.0, 1.0))).unwrap();
        engine.add_halo_particle(Particle::new(1, Vector3D::new(-0.2, 1.0, 1.0))).unwrap();

        let mut functor = PairRecorder::new(1.0);
        assert!(engine.iterate_pairwise(&functor).unwrap().rebuilt_neighbor_lists);
        assert_eq!(functor.pairs(), [(0, 1), (1, 0)]);

        engine.update_container().unwrap();
        assert_eq!(engine.number_of_particles(IteratorBehavior::Halo), 0);
        engine.add_halo_particle(Particle::new(1, Vector3D::new(-0.25, 1.0, 1.0))).unwrap();
        assert_eq!(engine.number_of_particles(IteratorBehavior::Halo), 1);

        let report = engine.iterate_pairwise(&functor).unwrap();
        assert!(!report.tuning);
        assert!(!report.rebuilt_neighbor_lists);
        assert_eq!(functor.pairs(), [(0, 1), (1, 0)]);

        engine.force_retune();
        assert!(engine.iterate_pairwise(&functor).unwrap().tuning);
        assert_eq!(engine.statistics().tuning_phases, 2);
    }

    #[test]
    fn halo_dummies_are_removed_on_rebuild() {
        let mut options = options();
        options.verlet_rebuild_frequency = 5;
        options.search_space.containers = [ContainerOption::VerletListsCells].into_iter().collect();
        options.search_space.traversals = [TraversalOption::VlcC18].into_iter().collect();
        options.search_space.data_layouts = [DataLayoutOption::Aos].into_iter().collect();
        options.search_space.newton3 = [Newton3Option::Enabled].into_iter().collect();
        let mut engine = PairwiseEngine::new(options).unwrap();
        engine.add_particle(Particle::new(0, Vector3D::new(1.0, 1.0, 1.0))).unwrap();

        let functor = PairRecorder::new(1.0);
        for step in 1..=50 {
            engine.update_container().unwrap();
            // a new halo particle every step, the previous ones become dummies
            engine.add_halo_particle(Particle::new(step, Vector3D::new(-0.3, 1.0, 1.0))).unwrap();
            engine.iterate_pairwise(&functor).unwrap();

            // the dummies are removed when the lists are rebuilt
            assert_eq!(engine.number_of_particles(IteratorBehavior::All), 2, "step {}", step);
            assert_eq!(engine.number_of_particles(IteratorBehavior::Halo), 1);
        }
    }

    #[test]
    fn timer_stopped_after_errors() {
        let mut options = options();
        options.search_space.containers = [ContainerOption::VerletListsCells].into_iter().collect();
        let mut engine = PairwiseEngine::new(options).unwrap();
        engine.add_particle(Particle::new(0, Vector3D::new(1.0, 1.0, 1.0))).unwrap();
        engine.add_particle(Particle::new(1, Vector3D::new(1.5, 1.0, 1.0))).unwrap();

        let mut functor = PairRecorder::new(1.0);
        engine.iterate_pairwise(&functor).unwrap();
        functor.pairs();
        assert_eq!(engine.container().container_type(), ContainerOption::VerletListsCells);

        // a linked cells traversal can not be used with the current container
        let configuration = Configuration::new(
            ContainerOption::LinkedCells, TraversalOption::LcC08, DataLayoutOption::Aos, Newton3Option::Enabled, 1.0
        );
        let info = engine.container().traversal_info();
        let traversal = generate_traversal(TraversalOption::LcC08, DataLayoutOption::Aos, true, &info, &functor).unwrap();
        assert!(engine.timed_iteration(true, &configuration, &*traversal, &functor).is_err());
        assert!(engine.timed_iteration(false, &configuration, &*traversal, &functor).is_err());
        assert!(!engine.timer.is_running());

        engine.iterate_pairwise(&functor).unwrap();
        assert_eq!(functor.pairs(), [(0, 1), (1, 0)]);
    }

    #[test]
    fn thread_time() {
        let mut options = options();
        options.timing = TimingOption::ThreadTime;
        options.tuner.tuning_interval = 1000;
        let mut engine = PairwiseEngine::new(options).unwrap();
        assert_eq!(engine.timer.mode(), TimingOption::ThreadTime);
        for particle in random_particles(50, Vector3D::zero(), Vector3D::new(5.0, 5.0, 5.0), 12) {
            engine.add_particle(particle).unwrap();
        }

        let functor = PairRecorder::new(1.0);
        while engine.tuner().is_tuning() {
            engine.iterate_pairwise(&functor).unwrap();
        }
        assert_eq!(engine.statistics().tuning_phases, 1);
        assert!(!engine.timer.is_running());
    }

    #[test]
    fn json() {
        let engine = PairwiseEngine::from_json(r#"{
            "cutoff": 2.5,
            "skin": 0.3,
            "box_min": [0, 0, 0],
            "box_max": [10, 10, 10],
            "search_space": {
                "containers": ["linked-cells"],
                "cell_size_factors": {"Finite": [1.0, 2.0]}
            },
            "tuner": {"strategy": "full-search", "tuning_interval": 500}
        }"#).unwrap();
        assert_eq!(engine.options().verlet_rebuild_frequency, 10);
        assert_eq!(engine.options().tuner.tuning_interval, 500);
        assert_eq!(engine.container().container_type(), ContainerOption::DirectSum);
        assert_eq!(engine.options().timing, TimingOption::WallClock);

        let engine = PairwiseEngine::from_json(r#"{
            "cutoff": 2.5,
            "skin": 0.3,
            "box_min": [0, 0, 0],
            "box_max": [10, 10, 10],
            "timing": "thread-time"
        }"#).unwrap();
        assert_eq!(engine.options().timing, TimingOption::ThreadTime);

        assert!(PairwiseEngine::from_json(r#"{"cutoff": 2.5}"#).is_err());
    }
}
