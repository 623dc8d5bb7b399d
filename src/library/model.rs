use super::calendar::{self, OpeningHours};
use super::catalog::{Catalog, TitleId};
use super::config::{Config, ConfigError, TimeRange};
use super::generator::BookGenerator;
use super::stats::{DailySample, DailySampler, StatsCollector, StatsSnapshot, Statistics};
use super::student::{Student, StudentId, StudentLife};
use crate::engine::{Process, ProcessId, ResourcePool, Simulation};
use crate::SimTime;

use rand::{Rng, SeedableRng};
use rand_distr::{Exp1, StandardNormal};
use rand_pcg::Pcg64;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Everything the library's processes share: catalog, students, counters, statistics and the random-number stream.
///
/// The whole run draws from a single [`Pcg64`] seeded from the configuration, and processes draw from it in the order
/// the scheduler resumes them. Two runs with the same configuration therefore produce identical results.
#[derive(Debug)]
pub struct LibraryState {
    pub(super) config: Config,
    pub(super) hours: OpeningHours,
    pub(super) catalog: Catalog,
    pub(super) students: Vec<Student>,
    pub(super) counters: ResourcePool,
    pub(super) stats: Arc<Statistics>,
    pub(super) collector: StatsCollector,
    pub(super) rng: Pcg64,
}

impl LibraryState {
    /// Validate `config`, stock the catalog with the initial copies and enroll the students.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration does not pass [`Config::validated()`].
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let mut rng = Pcg64::seed_from_u64(config.random_seed);
        let stats = Arc::new(Statistics::default());

        let mut catalog = Catalog::new();
        for index in 0..config.titles {
            let title = catalog.add_title(format!("Title #{:04}", index + 1));
            for _ in 0..config.copies_per_title {
                catalog.add_copy(title);
                stats.record_created();
            }
        }

        let students = (0..config.students)
            .map(|index| {
                let deviation: f64 = rng.sample(StandardNormal);
                let patience = config.patience_mean + config.patience_sd * deviation;
                let unit: f64 = rng.sample(Exp1);
                let need_probability = config.need_probability_mean * unit;
                Student::new(StudentId(index), format!("Student #{:04}", index + 1), patience, need_probability)
            })
            .collect();

        Ok(Self {
            hours: OpeningHours::from_config(&config),
            counters: ResourcePool::new("counters", config.counter_capacity),
            collector: StatsCollector::new(stats.snapshot()),
            config,
            catalog,
            students,
            stats,
            rng,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hours(&self) -> &OpeningHours {
        &self.hours
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student_mut(&mut self, id: StudentId) -> &mut Student {
        &mut self.students[id.0]
    }

    /// The shared service counters.
    pub fn counters(&self) -> &ResourcePool {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut ResourcePool {
        &mut self.counters
    }

    pub fn statistics(&self) -> Arc<Statistics> {
        Arc::clone(&self.stats)
    }

    pub fn samples(&self) -> &[DailySample] {
        self.collector.samples()
    }

    pub(super) fn random_title(&mut self) -> TitleId {
        TitleId(self.rng.random_range(0..self.catalog.title_count()))
    }

    pub(super) fn uniform(&mut self, range: TimeRange) -> f64 {
        self.rng.random_range(range.min..=range.max)
    }

    /// A whole number of minutes, uniform over the integers in `range` and never less than one.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub(super) fn whole_minutes(&mut self, range: TimeRange) -> f64 {
        let low = (range.min.round() as i64).max(1);
        let high = (range.max.round() as i64).max(low);
        self.rng.random_range(low..=high) as f64
    }

    pub(super) fn exponential(&mut self, mean: f64) -> f64 {
        let unit: f64 = self.rng.sample(Exp1);
        mean * unit
    }

    pub(super) fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        let deviation: f64 = self.rng.sample(StandardNormal);
        mean + sd * deviation
    }

    pub(super) fn chance(&mut self, probability: f64) -> bool {
        self.rng.random::<f64>() < probability
    }

    pub(super) fn delay_until_open(&mut self, now: SimTime) -> f64 {
        calendar::delay_until_open(now, &self.hours, &mut self.rng)
    }
}

/// A complete library run: the shared state plus the simulation driving its processes.
///
/// [`Library::new()`] spawns the full model: one main loop per student, the copy generator and the daily sampler.
/// [`Library::unpopulated()`] builds the same state without any process, for driving hand-picked scenarios through
/// [`Library::spawn()`].
#[derive(Debug)]
pub struct Library {
    simulation: Simulation<LibraryState>,
}

impl Library {
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration is out of range.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let mut library = Self::unpopulated(config)?;
        for index in 0..library.state().students.len() {
            library.spawn(StudentLife::new(StudentId(index)));
        }
        library.spawn(BookGenerator::new());
        library.spawn(DailySampler::new());
        Ok(library)
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration is out of range.
    pub fn unpopulated(config: Config) -> Result<Self, ConfigError> {
        let state = LibraryState::new(config)?;
        Ok(Self {
            simulation: Simulation::new(state, SimTime::ZERO),
        })
    }

    pub fn spawn<ProcessType>(&mut self, process: ProcessType) -> ProcessId
    where
        ProcessType: Process<LibraryState> + 'static,
    {
        self.simulation.spawn(process)
    }

    /// Run until the configured horizon.
    ///
    /// # Errors
    ///
    /// Any error raised by a process; see [`Simulation::run()`].
    pub fn run(&mut self) -> crate::Result {
        let horizon = SimTime::from_minutes(self.state().config.run_horizon);
        self.run_until(horizon)
    }

    /// Run until `until`, or not at all if the clock is already past it. Can be called repeatedly to inspect the
    /// library between stretches of simulated time.
    ///
    /// # Errors
    ///
    /// Any error raised by a process; see [`Simulation::run()`].
    pub fn run_until(&mut self, until: SimTime) -> crate::Result {
        tracing::info!(from = %self.now(), %until, "running library");
        self.simulation.run(until)?;
        tracing::info!(now = %self.now(), summary = %self.summary(), "run finished");
        Ok(())
    }

    pub fn now(&self) -> SimTime {
        self.simulation.now()
    }

    pub fn state(&self) -> &LibraryState {
        self.simulation.state()
    }

    pub fn state_mut(&mut self) -> &mut LibraryState {
        self.simulation.state_mut()
    }

    pub fn statistics(&self) -> Arc<Statistics> {
        self.state().statistics()
    }

    pub fn summary(&self) -> StatsSnapshot {
        self.state().stats.snapshot()
    }

    pub fn samples(&self) -> &[DailySample] {
        self.state().samples()
    }
}

impl Display for Library {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Library with {} titles, {} copies and {} students at {}",
            self.state().catalog.title_count(),
            self.state().catalog.copy_count(),
            self.state().students.len(),
            self.now()
        )
    }
}
