//! Shuffled complex evolution sampler
//!
//! The reference global-search algorithm: the population is split into
//! complexes that evolve independently through simplex
//! reflection/contraction steps with occasional random replacement, then
//! get shuffled back together. Every candidate, including infeasible ones
//! rejected before the engine runs, passes through the problem's logged
//! fitness oracle, so the realized trial count can exceed the evaluation
//! budget by up to one generation.

use hydrocal_core::{Direction, SimulationEngine};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::error::CalibrationError;
use crate::problem::{CalibrationProblem, UNCHAINED};

/// Configuration of the shuffled-complex search.
#[derive(Debug, Clone)]
pub struct SceUaConfig {
    /// Evaluation budget. The in-flight generation completes, so slightly
    /// more trials may be realized.
    pub max_evaluations: usize,

    /// Width of the stall window: the search stops once the relative
    /// best-fitness improvement over this many generations falls below
    /// `convergence_fraction`.
    pub stop_after_stalled_generations: usize,

    /// Number of complexes the population is partitioned into
    pub num_complexes: usize,

    /// Relative improvement below which the search counts as converged
    pub convergence_fraction: f64,

    /// Seed for the sampling stream; `None` draws one from the OS
    pub seed: Option<u64>,

    /// Enable verbose output
    pub verbose: bool,
}

impl Default for SceUaConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 1000,
            stop_after_stalled_generations: 10,
            num_complexes: 8,
            convergence_fraction: 0.01,
            seed: None,
            verbose: false,
        }
    }
}

impl SceUaConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the evaluation budget
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    /// Set the stall window (generations)
    pub fn with_stop_after_stalled_generations(mut self, generations: usize) -> Self {
        self.stop_after_stalled_generations = generations;
        self
    }

    /// Set the number of complexes
    pub fn with_num_complexes(mut self, num_complexes: usize) -> Self {
        self.num_complexes = num_complexes;
        self
    }

    /// Set the convergence fraction
    pub fn with_convergence_fraction(mut self, fraction: f64) -> Self {
        self.convergence_fraction = fraction;
        self
    }

    /// Fix the random seed for a deterministic search
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Result of one finished search, before it is folded into the public
/// [`crate::types::CalibrationResult`].
#[derive(Debug, Clone)]
pub(crate) struct SearchOutcome {
    pub best_vector: Vec<f64>,
    pub best_fitness: f64,
    pub generations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub termination_reason: String,
}

#[derive(Clone)]
struct Candidate {
    vector: Vec<f64>,
    fitness: f64,
}

fn sort_best_first(candidates: &mut [Candidate], direction: Direction) {
    candidates.sort_by(|a, b| direction.compare(a.fitness, b.fitness));
}

/// Draw a uniform random point from the box.
fn sample_uniform<R: Rng>(bounds: &[(f64, f64)], rng: &mut R) -> Vec<f64> {
    bounds
        .iter()
        .map(|(lower, upper)| rng.gen_range(*lower..=*upper))
        .collect()
}

fn in_bounds(vector: &[f64], bounds: &[(f64, f64)]) -> bool {
    vector
        .iter()
        .zip(bounds)
        .all(|(v, (lower, upper))| *v >= *lower && *v <= *upper)
}

/// Sample a member index with the triangular distribution that favors
/// better-ranked members (members are sorted best-first).
fn triangular_index<R: Rng>(len: usize, rng: &mut R) -> usize {
    let m = len as f64;
    let u: f64 = rng.gen();
    let rank = m + 0.5 - ((m + 0.5).powi(2) - m * (m + 1.0) * u).sqrt();
    (rank.floor() as usize).clamp(1, len) - 1
}

/// Relative best-fitness change over the trailing `window` generations.
/// `None` until the history spans the window.
fn relative_change(history: &[f64], window: usize) -> Option<f64> {
    if window == 0 || history.len() <= window {
        return None;
    }
    let newest = history[history.len() - 1];
    let oldest = history[history.len() - 1 - window];
    let mean_abs: f64 = history[history.len() - 1 - window..]
        .iter()
        .map(|f| f.abs())
        .sum::<f64>()
        / (window + 1) as f64;
    if mean_abs == 0.0 {
        return Some(0.0);
    }
    Some((oldest - newest).abs() / mean_abs)
}

/// Run the shuffled-complex search against a problem.
pub(crate) fn sample<E: SimulationEngine>(
    problem: &CalibrationProblem<E>,
    config: &SceUaConfig,
) -> Result<SearchOutcome, CalibrationError> {
    let direction = problem.direction();
    let bounds = problem.space().bounds();
    let n = problem.space().len();

    let num_complexes = config.num_complexes.max(1);
    let points_per_complex = 2 * n + 1;
    let simplex_size = n + 1;
    let evolution_steps = points_per_complex;
    let population_size = num_complexes * points_per_complex;

    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    // burn-in: uniform population over the whole box
    let mut population = Vec::with_capacity(population_size);
    for _ in 0..population_size {
        let vector = sample_uniform(&bounds, &mut rng);
        let fitness = problem.evaluate_vector(&vector, UNCHAINED)?;
        population.push(Candidate { vector, fitness });
    }
    sort_best_first(&mut population, direction);

    let mut best_history = vec![population[0].fitness];
    let mut generations = 0usize;

    loop {
        if problem.evaluations() >= config.max_evaluations {
            let best = &population[0];
            return Ok(SearchOutcome {
                best_vector: best.vector.clone(),
                best_fitness: best.fitness,
                generations,
                evaluations: problem.evaluations(),
                converged: false,
                termination_reason: format!(
                    "evaluation budget exhausted ({} trials)",
                    problem.evaluations()
                ),
            });
        }

        // evolve each complex independently; members are picked with a
        // stride so every complex spans the fitness range
        for complex_index in 0..num_complexes {
            let mut members: Vec<Candidate> = (0..points_per_complex)
                .map(|k| population[complex_index + k * num_complexes].clone())
                .collect();
            let chain = complex_index as u32 + 1;
            for _ in 0..evolution_steps {
                evolve_simplex(
                    problem,
                    &bounds,
                    &mut members,
                    simplex_size,
                    chain,
                    direction,
                    &mut rng,
                )?;
            }
            for (k, member) in members.into_iter().enumerate() {
                population[complex_index + k * num_complexes] = member;
            }
        }

        // shuffle: the global re-sort redistributes members over complexes
        sort_best_first(&mut population, direction);
        generations += 1;
        best_history.push(population[0].fitness);

        if config.verbose {
            eprintln!(
                "generation {:>4}: best = {:.6}, {} evaluations",
                generations,
                population[0].fitness,
                problem.evaluations()
            );
        }
        info!(
            generation = generations,
            best = population[0].fitness,
            evaluations = problem.evaluations(),
            "generation complete"
        );

        if let Some(change) = relative_change(&best_history, config.stop_after_stalled_generations)
        {
            if change < config.convergence_fraction {
                let best = &population[0];
                return Ok(SearchOutcome {
                    best_vector: best.vector.clone(),
                    best_fitness: best.fitness,
                    generations,
                    evaluations: problem.evaluations(),
                    converged: true,
                    termination_reason: format!(
                        "converged: best fitness changed by {:.2e} over {} generations",
                        change, config.stop_after_stalled_generations
                    ),
                });
            }
        }
    }
}

/// One competitive-complex-evolution step: reflect the worst simplex point
/// through the centroid of the others, fall back to contraction, fall back
/// to a random point.
#[allow(clippy::too_many_arguments)]
fn evolve_simplex<E: SimulationEngine, R: Rng>(
    problem: &CalibrationProblem<E>,
    bounds: &[(f64, f64)],
    members: &mut [Candidate],
    simplex_size: usize,
    chain: u32,
    direction: Direction,
    rng: &mut R,
) -> Result<(), CalibrationError> {
    // triangular selection of distinct members, best ones favored
    let mut chosen: Vec<usize> = Vec::with_capacity(simplex_size);
    while chosen.len() < simplex_size {
        let index = triangular_index(members.len(), rng);
        if !chosen.contains(&index) {
            chosen.push(index);
        }
    }
    chosen.sort_unstable();
    let worst_index = chosen[chosen.len() - 1];
    let worst = members[worst_index].clone();

    let n = worst.vector.len();
    let mut centroid = vec![0.0; n];
    for &index in &chosen[..simplex_size - 1] {
        for (c, v) in centroid.iter_mut().zip(&members[index].vector) {
            *c += v;
        }
    }
    for c in centroid.iter_mut() {
        *c /= (simplex_size - 1) as f64;
    }

    // reflection; leaving the box degenerates to a mutation step
    let mut reflected: Vec<f64> = centroid
        .iter()
        .zip(&worst.vector)
        .map(|(c, w)| c + (c - w))
        .collect();
    if !in_bounds(&reflected, bounds) {
        reflected = sample_uniform(bounds, rng);
    }
    let fitness = problem.evaluate_vector(&reflected, chain)?;
    if direction.is_better(fitness, worst.fitness) {
        members[worst_index] = Candidate {
            vector: reflected,
            fitness,
        };
    } else {
        let contracted: Vec<f64> = centroid
            .iter()
            .zip(&worst.vector)
            .map(|(c, w)| (c + w) / 2.0)
            .collect();
        let fitness = problem.evaluate_vector(&contracted, chain)?;
        if direction.is_better(fitness, worst.fitness) {
            members[worst_index] = Candidate {
                vector: contracted,
                fitness,
            };
        } else {
            // unconditional random replacement keeps the complex moving
            let vector = sample_uniform(bounds, rng);
            let fitness = problem.evaluate_vector(&vector, chain)?;
            members[worst_index] = Candidate { vector, fitness };
        }
    }

    sort_best_first(members, direction);
    Ok(())
}
