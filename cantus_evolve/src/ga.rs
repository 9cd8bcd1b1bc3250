// The generational engine.
//
// `MusicGa` owns the reference corpus, the population, and the run's random
// stream. Construction validates the corpus, equalizes every reference to
// the finest chunk size present, and seeds the population: a `random_fraction`
// share of fully random melodies (each as long as a randomly picked
// reference) and the rest as corpus copies mutated at the exploration rate.
//
// Each generation then:
// 1. scores every individual (in parallel; scoring draws no randomness, so
//    the result is the same as a sequential pass),
// 2. copies the two best unchanged into the next generation (ties go to the
//    later index),
// 3. fills the remainder with pairs bred from binary tournaments: crossover
//    at `crossover_rate`, then steady-state mutation and repair of each child,
// 4. swaps the new generation in and drops the old one.
//
// All random draws happen on the calling thread in a fixed order, so a seed
// reproduces the whole run. Without niching, fitness depends only on the
// melody and the corpus, so the elites guarantee the best score never drops.

use crate::config::GaConfig;
use crate::error::{CantusError, Result};
use crate::operators::{crossover, mutate};
use crate::selection::Selection;
use crate::similarity::{corpus_similarity, shaped_fitness, similarity};
use cantus_prng::CantusRng;
use log::{debug, info, warn};
use rayon::prelude::*;

/// Individuals carried unchanged into every next generation.
const ELITE_COUNT: usize = 2;

/// Equalizing by more than this many holds per slot is almost always a
/// corpus mistake (e.g. a chunk size typed as 96 instead of 4).
const SUSPICIOUS_STRETCH: u32 = 16;

/// Hook called once per scored generation.
///
/// Generation 0 is the initial population. `fitness[i]` belongs to
/// `population[i]`.
pub trait GenerationObserver {
    fn on_generation(&mut self, generation: usize, population: &[Selection], fitness: &[f64]);
}

impl GenerationObserver for () {
    fn on_generation(&mut self, _generation: usize, _population: &[Selection], _fitness: &[f64]) {}
}

/// Outcome of `MusicGa::run`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Fittest individual of any generation, as scored within its own
    /// generation. Without niching that is always the final generation's.
    pub best: Selection,
    /// Equal to the maximum of `fitness_trace`.
    pub best_fitness: f64,
    /// Best fitness of each scored generation, starting with generation 0.
    pub fitness_trace: Vec<f64>,
}

pub struct MusicGa {
    corpus: Vec<Selection>,
    population: Vec<Selection>,
    config: GaConfig,
    chunk_size: u32,
    rng: CantusRng,
    generation: usize,
}

impl MusicGa {
    /// Validate inputs, equalize the corpus, and seed the first generation.
    pub fn new(mut corpus: Vec<Selection>, config: GaConfig) -> Result<Self> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(CantusError::EmptyCorpus);
        }
        if let Some(index) = corpus.iter().position(|s| !s.has_note()) {
            return Err(CantusError::SilentReference { index });
        }

        let chunk_size = corpus
            .iter()
            .map(Selection::chunk_size)
            .max()
            .unwrap_or(1);
        for (index, reference) in corpus.iter_mut().enumerate() {
            let from = reference.chunk_size();
            reference.equalize(chunk_size)?;
            let ratio = chunk_size / from;
            if ratio > SUSPICIOUS_STRETCH {
                warn!("reference {index}: stretched chunk size {from} to {chunk_size} ({ratio}x)");
            }
        }

        let mut rng = CantusRng::new(config.seed);
        let population = initial_population(&corpus, &config, chunk_size, &mut rng);
        info!(
            "initialized {} individuals from {} reference(s) at chunk size {chunk_size}",
            population.len(),
            corpus.len()
        );

        Ok(MusicGa {
            corpus,
            population,
            config,
            chunk_size,
            rng,
            generation: 0,
        })
    }

    pub fn corpus(&self) -> &[Selection] {
        &self.corpus
    }

    pub fn population(&self) -> &[Selection] {
        &self.population
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Common chunk size of the corpus and every individual.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Generations completed so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Aggregated similarity of `s` to the corpus, before shaping.
    pub fn fitness_orig(&self, s: &Selection) -> f64 {
        corpus_similarity(s, &self.corpus, self.config.aggregation)
    }

    /// Fitness of `s` against the corpus, judged within the current
    /// population when niching is enabled.
    pub fn fitness(&self, s: &Selection) -> f64 {
        let shaped = shaped_fitness(self.fitness_orig(s), self.config.optimal_fitness);
        if !self.config.niching {
            return shaped;
        }
        let crowding: f64 = self.population.iter().map(|other| similarity(s, other)).sum();
        if crowding > 0.0 { shaped / crowding } else { shaped }
    }

    /// Fitness of every individual, index-aligned with `population()`.
    pub fn evaluate(&self) -> Vec<f64> {
        if self.config.parallel_evaluation {
            self.population.par_iter().map(|s| self.fitness(s)).collect()
        } else {
            self.population.iter().map(|s| self.fitness(s)).collect()
        }
    }

    /// Fittest individual of the current population.
    pub fn best_piece(&self) -> &Selection {
        let scores = self.evaluate();
        &self.population[ranked_top(&scores, 1)[0]]
    }

    /// Advance one generation.
    pub fn step(&mut self) {
        let scores = self.evaluate();
        self.breed(&scores);
    }

    /// Run `generations` steps with no observer.
    pub fn run(&mut self, generations: usize) -> RunSummary {
        self.run_with(generations, &mut ())
    }

    /// Run `generations` steps, reporting each scored generation (including
    /// the starting one) to `observer`.
    pub fn run_with(
        &mut self,
        generations: usize,
        observer: &mut impl GenerationObserver,
    ) -> RunSummary {
        info!("running {generations} generation(s), seed {}", self.config.seed);
        let mut scores = self.evaluate();
        let mut fitness_trace = Vec::with_capacity(generations + 1);
        let top = self.record(&scores, &mut fitness_trace, observer);
        let mut best = self.population[top].clone();
        let mut best_fitness = scores[top];

        for _ in 0..generations {
            self.breed(&scores);
            scores = self.evaluate();
            let top = self.record(&scores, &mut fitness_trace, observer);
            // Later generations win ties.
            if scores[top] >= best_fitness {
                best = self.population[top].clone();
                best_fitness = scores[top];
            }
        }

        let summary = RunSummary {
            best,
            best_fitness,
            fitness_trace,
        };
        info!(
            "finished at generation {} with best fitness {:.4}",
            self.generation, summary.best_fitness
        );
        summary
    }

    /// Log, trace and report one scored generation. Returns the index of its
    /// fittest individual.
    fn record(
        &self,
        scores: &[f64],
        trace: &mut Vec<f64>,
        observer: &mut impl GenerationObserver,
    ) -> usize {
        let top = ranked_top(scores, 1)[0];
        let best = scores[top];
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        debug!(
            "generation {}: best {best:.4}, mean {mean:.4}",
            self.generation
        );
        trace.push(best);
        observer.on_generation(self.generation, &self.population, scores);
        top
    }

    /// Replace the population with the next generation bred from `scores`.
    fn breed(&mut self, scores: &[f64]) {
        let size = self.population.len();
        let current = &self.population;
        let rng = &mut self.rng;
        let config = &self.config;

        let mut next: Vec<Selection> = ranked_top(scores, ELITE_COUNT.min(size))
            .into_iter()
            .map(|i| current[i].clone())
            .collect();

        while next.len() < size {
            let a = tournament(scores, rng);
            let b = tournament(scores, rng);
            let (mut first, mut second) = if rng.random_bool(config.crossover_rate) {
                crossover(&current[a], &current[b], config.crossover_points, rng)
            } else {
                (current[a].clone(), current[b].clone())
            };
            for child in [&mut first, &mut second] {
                mutate(
                    child,
                    config.mutation_probability,
                    config.mutation_distance,
                    rng,
                );
                child.repair();
            }
            next.push(first);
            if next.len() < size {
                next.push(second);
            }
        }

        self.population = next;
        self.generation += 1;
    }
}

fn initial_population(
    corpus: &[Selection],
    config: &GaConfig,
    chunk_size: u32,
    rng: &mut CantusRng,
) -> Vec<Selection> {
    let size = corpus.len() * config.individuals_per_reference;
    let random_count = ((config.random_fraction * size as f64) as usize).min(size);
    let mut population = Vec::with_capacity(size);

    for _ in 0..random_count {
        let template = &corpus[rng.choose_index(corpus.len())];
        population.push(Selection::random(template.len(), chunk_size, rng));
    }
    for _ in random_count..size {
        let mut copy = corpus[rng.choose_index(corpus.len())].clone();
        mutate(
            &mut copy,
            config.initial_mutation_probability,
            config.mutation_distance,
            rng,
        );
        population.push(copy);
    }
    population
}

/// Binary tournament: the fitter of two uniform draws, the first on a tie.
fn tournament(scores: &[f64], rng: &mut CantusRng) -> usize {
    let a = rng.choose_index(scores.len());
    let b = rng.choose_index(scores.len());
    if scores[a] >= scores[b] { a } else { b }
}

/// Indices of the `n` highest scores, best first. Among equal scores the
/// later index ranks higher.
fn ranked_top(scores: &[f64], n: usize) -> Vec<usize> {
    let mut top: Vec<usize> = Vec::with_capacity(n + 1);
    for (i, &score) in scores.iter().enumerate() {
        let slot = top
            .iter()
            .position(|&j| score >= scores[j])
            .unwrap_or(top.len());
        if slot < n {
            top.insert(slot, i);
            top.truncate(n);
        }
    }
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitnessAggregation;

    fn sel(codes: &[i64], chunk_size: i64) -> Selection {
        Selection::from_codes(codes, chunk_size).unwrap()
    }

    fn small_config(seed: u64) -> GaConfig {
        GaConfig {
            seed,
            individuals_per_reference: 20,
            ..Default::default()
        }
    }

    #[test]
    fn ranked_top_prefers_later_on_ties() {
        assert_eq!(ranked_top(&[0.5, 0.9, 0.9, 0.1], 2), vec![2, 1]);
        assert_eq!(ranked_top(&[0.3, 0.7, 0.5], 2), vec![1, 2]);
        assert_eq!(ranked_top(&[0.4], 2), vec![0]);
        assert_eq!(ranked_top(&[0.2, 0.2, 0.2], 1), vec![2]);
    }

    #[test]
    fn tournament_returns_the_fitter_draw() {
        let scores = [0.1, 0.9];
        let mut rng = CantusRng::new(6);
        let mut saw_best = false;
        for _ in 0..100 {
            let i = tournament(&scores, &mut rng);
            assert!(i < 2);
            saw_best |= i == 1;
        }
        assert!(saw_best);
    }

    #[test]
    fn empty_corpus_rejected() {
        assert!(matches!(
            MusicGa::new(Vec::new(), GaConfig::default()),
            Err(CantusError::EmptyCorpus)
        ));
    }

    #[test]
    fn silent_reference_rejected() {
        let corpus = vec![sel(&[60, 62], 1), sel(&[129, 128, 129], 1)];
        assert!(matches!(
            MusicGa::new(corpus, GaConfig::default()),
            Err(CantusError::SilentReference { index: 1 })
        ));
    }

    #[test]
    fn invalid_config_rejected_before_corpus() {
        let config = GaConfig {
            mutation_probability: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            MusicGa::new(vec![sel(&[60], 1)], config),
            Err(CantusError::Config(_))
        ));
    }

    #[test]
    fn corpus_is_equalized_to_finest_resolution() {
        let corpus = vec![sel(&[60, 62], 1), sel(&[64, 128, 65, 129], 4)];
        let ga = MusicGa::new(corpus, small_config(1)).unwrap();
        assert_eq!(ga.chunk_size(), 4);
        assert_eq!(ga.corpus()[0].codes(), vec![60, 128, 128, 128, 62, 128, 128, 128]);
        assert_eq!(ga.corpus()[1].len(), 4);
        assert!(ga.population().iter().all(|s| s.chunk_size() == 4));
    }

    #[test]
    fn incompatible_resolutions_rejected() {
        let corpus = vec![sel(&[60], 2), sel(&[62], 3)];
        assert!(matches!(
            MusicGa::new(corpus, GaConfig::default()),
            Err(CantusError::IncompatibleChunkSize { from: 2, to: 3 })
        ));
    }

    #[test]
    fn oversized_resolution_gap_rejected() {
        let corpus = vec![sel(&[60, 62], 1), sel(&[64], 4_000_000)];
        assert!(matches!(
            MusicGa::new(corpus, GaConfig::default()),
            Err(CantusError::StretchTooLarge {
                from: 1,
                to: 4_000_000,
                ..
            })
        ));
    }

    #[test]
    fn population_size_scales_with_corpus() {
        let corpus = vec![sel(&[60, 62, 64], 1), sel(&[67, 65, 64], 1)];
        let ga = MusicGa::new(corpus, small_config(2)).unwrap();
        assert_eq!(ga.population().len(), 40);
    }

    #[test]
    fn fitness_is_bounded_without_niching() {
        let corpus = vec![sel(&[60, 128, 62, 129, 64, 65], 1)];
        let ga = MusicGa::new(corpus, small_config(3)).unwrap();
        let mut rng = CantusRng::new(99);
        for _ in 0..200 {
            let f = ga.fitness(&Selection::random(6, 1, &mut rng));
            assert!((0.0..=1.0).contains(&f), "fitness {f}");
        }
        for s in ga.population() {
            let f = ga.fitness(s);
            assert!((0.0..=1.0).contains(&f), "fitness {f}");
        }
    }

    #[test]
    fn exact_copy_scores_below_target_peak() {
        let reference = sel(&[60, 62, 64, 65, 67], 1);
        let ga = MusicGa::new(vec![reference.clone()], small_config(4)).unwrap();
        assert!((ga.fitness_orig(&reference) - 1.0).abs() < 1e-12);
        assert!((ga.fitness(&reference) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn niching_penalizes_crowded_population() {
        let corpus = vec![sel(&[60, 62, 64, 65], 1)];
        let plain = MusicGa::new(corpus.clone(), small_config(5)).unwrap();
        let niched = MusicGa::new(
            corpus,
            GaConfig {
                niching: true,
                ..small_config(5)
            },
        )
        .unwrap();
        let probe = &plain.population()[0];
        assert!(niched.fitness(probe) < plain.fitness(probe));
    }

    #[test]
    fn elites_survive_unchanged() {
        let corpus = vec![sel(&[60, 128, 62, 129, 64, 128, 65, 67], 1)];
        let mut ga = MusicGa::new(corpus, small_config(7)).unwrap();
        let scores = ga.evaluate();
        let top = ranked_top(&scores, 2);
        let elites: Vec<Selection> = top.iter().map(|&i| ga.population()[i].clone()).collect();
        ga.step();
        assert_eq!(ga.generation(), 1);
        assert_eq!(&ga.population()[..2], &elites[..]);
    }

    #[test]
    fn best_fitness_never_decreases() {
        let corpus = vec![sel(&[62, 128, 64, 66, 129, 67, 128, 69], 1)];
        let mut ga = MusicGa::new(corpus, small_config(8)).unwrap();
        let summary = ga.run(15);
        assert_eq!(summary.fitness_trace.len(), 16);
        for pair in summary.fitness_trace.windows(2) {
            assert!(pair[1] >= pair[0], "trace dropped: {pair:?}");
        }
        assert_eq!(summary.best_fitness, *summary.fitness_trace.last().unwrap());
    }

    #[test]
    fn niching_run_reports_best_of_any_generation() {
        let corpus = vec![sel(&[60, 62, 64, 128, 65, 67, 129, 69], 1)];
        let config = GaConfig {
            niching: true,
            ..small_config(12)
        };
        let mut ga = MusicGa::new(corpus, config).unwrap();
        let summary = ga.run(12);
        let peak = summary
            .fitness_trace
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(summary.best_fitness, peak);
        assert!(summary.best_fitness >= *summary.fitness_trace.last().unwrap());
    }

    #[test]
    fn parallel_and_sequential_scoring_agree() {
        let corpus = vec![sel(&[60, 64, 67, 72], 1), sel(&[62, 65, 69, 74], 1)];
        let config = GaConfig {
            aggregation: FitnessAggregation::Minimum,
            ..small_config(9)
        };
        let par = MusicGa::new(corpus.clone(), config.clone()).unwrap();
        let seq = MusicGa::new(
            corpus,
            GaConfig {
                parallel_evaluation: false,
                ..config
            },
        )
        .unwrap();
        assert_eq!(par.evaluate(), seq.evaluate());
    }

    #[test]
    fn single_individual_population_runs() {
        let config = GaConfig {
            individuals_per_reference: 1,
            ..Default::default()
        };
        let mut ga = MusicGa::new(vec![sel(&[60, 62], 1)], config).unwrap();
        let summary = ga.run(3);
        assert_eq!(ga.population().len(), 1);
        assert_eq!(summary.fitness_trace.len(), 4);
    }

    struct Counter {
        generations: Vec<usize>,
    }

    impl GenerationObserver for Counter {
        fn on_generation(&mut self, generation: usize, population: &[Selection], fitness: &[f64]) {
            assert_eq!(population.len(), fitness.len());
            self.generations.push(generation);
        }
    }

    #[test]
    fn observer_sees_every_generation() {
        let mut ga = MusicGa::new(vec![sel(&[60, 62, 64], 1)], small_config(10)).unwrap();
        let mut counter = Counter {
            generations: Vec::new(),
        };
        ga.run_with(4, &mut counter);
        assert_eq!(counter.generations, vec![0, 1, 2, 3, 4]);
    }
}
