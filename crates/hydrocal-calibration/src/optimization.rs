//! Search algorithm configuration and execution

use argmin::core::Executor;
use argmin::solver::particleswarm::ParticleSwarm;
use hydrocal_core::{ParameterSpace, SimulationEngine};

use crate::error::{CalibrationError, PersistenceError};
use crate::problem::CalibrationProblem;
use crate::sceua::{self, SceUaConfig};
use crate::trial_log::{best_trials, TrialRecord};
use crate::types::CalibrationResult;

/// Print search header for verbose output
fn print_search_header(algorithm: &str, space: &ParameterSpace, budget: usize) {
    eprintln!("=== {} Search (Verbose Mode) ===", algorithm);
    eprintln!("Parameters: {:?}", space.names());
    eprintln!("Bounds: {:?}", space.bounds());
    eprintln!("Evaluation budget: {}", budget);
}

/// Run executor with logging observer
fn run_with_logging<O, S, I>(
    executor: Executor<O, S, I>,
) -> Result<argmin::core::OptimizationResult<O, S, I>, CalibrationError>
where
    O: argmin::core::CostFunction,
    S: argmin::core::Solver<O, I>,
    I: argmin::core::State,
{
    use argmin::core::observers::ObserverMode;
    use argmin_observer_slog::SlogLogger;

    executor
        .add_observer(SlogLogger::term(), ObserverMode::Always)
        .run()
        .map_err(|e| CalibrationError::Solver(format!("search failed: {}", e)))
}

/// Configuration for Particle Swarm Optimization
///
/// Retained as the gradient-free alternative to the shuffled-complex
/// reference search; useful as a cross-check when the complex count is
/// hard to choose.
#[derive(Debug, Clone)]
pub struct ParticleSwarmConfig {
    /// Number of particles in the swarm
    pub num_particles: usize,

    /// Maximum number of solver iterations (each evaluates every particle)
    pub max_iterations: u64,

    /// Inertia weight applied to particle velocity
    /// Defaults to 1/(2*ln(2)) ≈ 0.721
    pub inertia_factor: Option<f64>,

    /// Cognitive acceleration factor (attraction to personal best)
    /// Defaults to 0.5 + ln(2) ≈ 1.193
    pub cognitive_factor: Option<f64>,

    /// Social acceleration factor (attraction to swarm best)
    /// Defaults to 0.5 + ln(2) ≈ 1.193
    pub social_factor: Option<f64>,

    /// Enable verbose output
    pub verbose: bool,
}

impl Default for ParticleSwarmConfig {
    fn default() -> Self {
        Self {
            num_particles: 20,
            max_iterations: 100,
            inertia_factor: None,   // use argmin's default
            cognitive_factor: None, // use argmin's default
            social_factor: None,    // use argmin's default
            verbose: false,
        }
    }
}

impl ParticleSwarmConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of particles
    pub fn with_num_particles(mut self, num_particles: usize) -> Self {
        self.num_particles = num_particles;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set inertia weight factor
    pub fn with_inertia_factor(mut self, factor: f64) -> Self {
        self.inertia_factor = Some(factor);
        self
    }

    /// Set cognitive acceleration factor
    pub fn with_cognitive_factor(mut self, factor: f64) -> Self {
        self.cognitive_factor = Some(factor);
        self
    }

    /// Set social acceleration factor
    pub fn with_social_factor(mut self, factor: f64) -> Self {
        self.social_factor = Some(factor);
        self
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Algorithm-specific search configuration
#[derive(Debug, Clone)]
pub enum OptimizationConfig {
    /// Shuffled complex evolution (gradient-free, global search).
    /// The reference algorithm for sewer-network calibration.
    SceUa(SceUaConfig),

    /// Particle Swarm Optimization (gradient-free, global search).
    /// Use as a cross-check against the complex-shuffle search.
    ParticleSwarm(ParticleSwarmConfig),
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig::SceUa(SceUaConfig::default())
    }
}

/// Drives a stochastic global search over a calibration problem and reads
/// the best trials back from the append-only log.
pub struct Optimizer<E> {
    problem: CalibrationProblem<E>,
    config: OptimizationConfig,
}

impl<E: SimulationEngine> Optimizer<E> {
    pub fn new(problem: CalibrationProblem<E>, config: OptimizationConfig) -> Self {
        Self { problem, config }
    }

    pub fn problem(&self) -> &CalibrationProblem<E> {
        &self.problem
    }

    /// Run the configured search to completion.
    pub fn run(&self) -> Result<CalibrationResult, CalibrationError> {
        match &self.config {
            OptimizationConfig::SceUa(config) => self.run_sceua(config),
            OptimizationConfig::ParticleSwarm(config) => self.run_particle_swarm(config),
        }
    }

    /// The best `how_many` trials of the search, best-first, read back from
    /// the trial log; ties break toward the lower run index.
    pub fn best(&self, how_many: usize) -> Result<Vec<TrialRecord>, PersistenceError> {
        best_trials(
            &self.problem.log_path(),
            self.problem.space(),
            self.problem.direction(),
            how_many,
        )
    }

    fn run_sceua(&self, config: &SceUaConfig) -> Result<CalibrationResult, CalibrationError> {
        if config.verbose {
            print_search_header(
                "Shuffled Complex Evolution",
                self.problem.space(),
                config.max_evaluations,
            );
            eprintln!("Complexes: {}", config.num_complexes);
            eprintln!(
                "Convergence: {} over {} generations",
                config.convergence_fraction, config.stop_after_stalled_generations
            );
            eprintln!("===============================================");
        }

        let outcome = sceua::sample(&self.problem, config)?;
        let best_parameters = self.problem.space().to_named(&outcome.best_vector)?;
        Ok(CalibrationResult {
            best_parameters,
            best_vector: outcome.best_vector,
            best_fitness: outcome.best_fitness,
            generations: outcome.generations,
            evaluations: outcome.evaluations,
            converged: outcome.converged,
            termination_reason: outcome.termination_reason,
        })
    }

    fn run_particle_swarm(
        &self,
        config: &ParticleSwarmConfig,
    ) -> Result<CalibrationResult, CalibrationError> {
        let bounds = self.problem.space().bounds();
        let lower_bound: Vec<f64> = bounds.iter().map(|(min, _)| *min).collect();
        let upper_bound: Vec<f64> = bounds.iter().map(|(_, max)| *max).collect();

        let mut solver = ParticleSwarm::new((lower_bound, upper_bound), config.num_particles);

        if let Some(inertia) = config.inertia_factor {
            solver = solver
                .with_inertia_factor(inertia)
                .map_err(|e| CalibrationError::Solver(format!("failed to set inertia_factor: {}", e)))?;
        }

        if let Some(cognitive) = config.cognitive_factor {
            solver = solver.with_cognitive_factor(cognitive).map_err(|e| {
                CalibrationError::Solver(format!("failed to set cognitive_factor: {}", e))
            })?;
        }

        if let Some(social) = config.social_factor {
            solver = solver
                .with_social_factor(social)
                .map_err(|e| CalibrationError::Solver(format!("failed to set social_factor: {}", e)))?;
        }

        let executor = Executor::new(&self.problem, solver)
            .configure(|state| state.max_iters(config.max_iterations));

        let result = if config.verbose {
            print_search_header(
                "Particle Swarm",
                self.problem.space(),
                config.num_particles * config.max_iterations as usize,
            );
            eprintln!("Num particles: {}", config.num_particles);
            eprintln!("===================================================");

            run_with_logging(executor)?
        } else {
            executor
                .run()
                .map_err(|e| CalibrationError::Solver(format!("search failed: {}", e)))?
        };

        let state = result.state();
        let direction = self.problem.direction();

        // best_individual carries the best particle; its cost is in the
        // solver's minimization convention
        let (best_vector, best_fitness) = match &state.best_individual {
            Some(particle) => (particle.position.clone(), direction.as_cost(particle.cost)),
            None => {
                return Err(CalibrationError::Solver(
                    "particle swarm finished without a best particle".to_string(),
                ))
            }
        };

        let best_parameters = self.problem.space().to_named(&best_vector)?;
        Ok(CalibrationResult {
            best_parameters,
            best_vector,
            best_fitness,
            generations: state.iter as usize,
            evaluations: self.problem.evaluations(),
            converged: state.termination_status.terminated(),
            termination_reason: format!("{:?}", state.termination_status),
        })
    }
}
