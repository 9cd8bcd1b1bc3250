// Run configuration for the genetic search.
//
// Every tunable rate and constant of a run lives in `GaConfig`, loadable from
// JSON so experiments don't need a rebuild. Missing fields take their
// defaults, which reproduce the classic setup: 50 individuals per reference,
// 2-point crossover at rate 0.9, 5% steady-state mutation, half the initial
// population random and half mutated corpus copies at 33%, and a fitness
// target of 0.95 similarity.
//
// `MusicGa::new` calls `validate()` before touching the corpus.

use crate::error::{CantusError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How per-reference similarities collapse into one corpus score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessAggregation {
    #[default]
    Average,
    Minimum,
    Maximum,
}

impl FitnessAggregation {
    /// Reduce a non-empty list of similarities. An empty list reduces to 0.
    pub fn reduce(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            FitnessAggregation::Average => values.iter().sum::<f64>() / values.len() as f64,
            FitnessAggregation::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
            FitnessAggregation::Maximum => {
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
        }
    }

    /// Parse the CLI spelling: `average`/`avg`, `min`/`minimum`, `max`/`maximum`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "average" | "avg" | "mean" => Some(FitnessAggregation::Average),
            "min" | "minimum" => Some(FitnessAggregation::Minimum),
            "max" | "maximum" => Some(FitnessAggregation::Maximum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    /// Seed for the run's single random stream.
    pub seed: u64,
    /// Generations `run` performs when the caller doesn't say otherwise.
    pub generations: usize,
    /// Population size is this times the number of reference melodies.
    pub individuals_per_reference: usize,
    pub aggregation: FitnessAggregation,
    /// Divide fitness by summed similarity to the whole population.
    pub niching: bool,
    /// Largest pitch step, in semitones, of a note mutation.
    pub mutation_distance: u8,
    /// Number of toggle points in the crossover mask.
    pub crossover_points: usize,
    /// Per-slot mutation probability applied to offspring each generation.
    pub mutation_probability: f64,
    pub crossover_rate: f64,
    /// Fraction of the initial population drawn fully at random.
    pub random_fraction: f64,
    /// Per-slot mutation probability for the seeded corpus copies.
    pub initial_mutation_probability: f64,
    /// Corpus similarity at which fitness peaks.
    pub optimal_fitness: f64,
    /// Score each generation on the rayon pool. Results are identical
    /// either way; only wall time differs.
    pub parallel_evaluation: bool,
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            seed: 123_456,
            generations: 100,
            individuals_per_reference: 50,
            aggregation: FitnessAggregation::Average,
            niching: false,
            mutation_distance: 2,
            crossover_points: 2,
            mutation_probability: 0.05,
            crossover_rate: 0.9,
            random_fraction: 0.5,
            initial_mutation_probability: 0.33,
            optimal_fitness: 0.95,
            parallel_evaluation: true,
        }
    }
}

impl GaConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CantusError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("mutation_probability", self.mutation_probability),
            ("crossover_rate", self.crossover_rate),
            ("random_fraction", self.random_fraction),
            ("initial_mutation_probability", self.initial_mutation_probability),
            ("optimal_fitness", self.optimal_fitness),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(CantusError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.individuals_per_reference == 0 {
            return Err(CantusError::Config(
                "individuals_per_reference must be at least 1".to_string(),
            ));
        }
        if self.crossover_points == 0 {
            return Err(CantusError::Config(
                "crossover_points must be at least 1".to_string(),
            ));
        }
        if self.mutation_distance == 0 {
            return Err(CantusError::Config(
                "mutation_distance must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
