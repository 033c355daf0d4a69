//! Architecture search driver.

use super::candidate::ArchitectureCandidate;
use super::genetic::{crossover, mutate};
use chrono::{DateTime, Utc};
use netlens_core::{
    NasConfig, OracleFactory, Point, PredictionOracle, SearchStrategy, ToolkitError, TrainingStats,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome of training and validating one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureResult {
    pub candidate: ArchitectureCandidate,
    /// Validation accuracy.
    pub accuracy: f64,
    /// Validation loss.
    pub loss: f64,
    /// Loss reported by the final training epoch.
    pub train_loss: f64,
    pub training_time_ms: f64,
    pub num_parameters: usize,
    pub epochs_trained: usize,
}

/// A completed search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NasRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub best: ArchitectureResult,
    /// Every evaluated candidate, in evaluation order.
    pub history: Vec<ArchitectureResult>,
    pub config: NasConfig,
    pub total_time_ms: f64,
}

impl NasRun {
    /// History sorted by accuracy, best first. Ties keep evaluation order.
    pub fn ranked(&self) -> Vec<&ArchitectureResult> {
        let mut ranked: Vec<&ArchitectureResult> = self.history.iter().collect();
        ranked.sort_by(|a, b| by_accuracy_desc(a, b));
        ranked
    }
}

fn by_accuracy_desc(a: &ArchitectureResult, b: &ArchitectureResult) -> std::cmp::Ordering {
    ranking_accuracy(b).total_cmp(&ranking_accuracy(a))
}

/// NaN accuracies rank below every real score.
fn ranking_accuracy(result: &ArchitectureResult) -> f64 {
    if result.accuracy.is_nan() {
        f64::NEG_INFINITY
    } else {
        result.accuracy
    }
}

/// Top half of a population sorted best first, never empty for a non-empty
/// population.
pub fn select_parents(population: &[ArchitectureResult]) -> &[ArchitectureResult] {
    &population[..(population.len() / 2).max(1).min(population.len())]
}

/// Keep the `size` most accurate members of `population` and `offspring`.
///
/// Incumbents win ties against offspring.
pub fn next_generation(
    population: Vec<ArchitectureResult>,
    offspring: Vec<ArchitectureResult>,
    size: usize,
) -> Vec<ArchitectureResult> {
    let mut pool = population;
    pool.extend(offspring);
    pool.sort_by(by_accuracy_desc);
    pool.truncate(size);
    pool
}

/// Searches the candidate space by training fresh oracles from a factory.
#[derive(Debug, Clone, Default)]
pub struct ArchitectureSearch {
    config: NasConfig,
}

impl ArchitectureSearch {
    pub fn new(config: NasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NasConfig {
        &self.config
    }

    /// Number of candidates a search with this config will evaluate.
    pub fn expected_evaluations(&self) -> usize {
        let num = self.config.num_candidates;
        match self.config.strategy {
            SearchStrategy::Random => num,
            SearchStrategy::Grid => num.min(ArchitectureCandidate::grid().len()),
            SearchStrategy::Evolutionary => {
                let initial = self.config.population_size.min(num);
                initial + 2 * self.generations()
            }
        }
    }

    fn generations(&self) -> usize {
        let initial = self.config.population_size.min(self.config.num_candidates);
        (self.config.num_candidates - initial) / 2
    }

    /// Run the configured strategy.
    ///
    /// `on_progress` receives `(evaluated, expected, best_so_far)` after every
    /// candidate. Oracle failures abort the search.
    pub async fn search<F, R, P>(
        &self,
        factory: &F,
        train: &[Point],
        validation: &[Point],
        rng: &mut R,
        mut on_progress: P,
    ) -> Result<NasRun, ToolkitError>
    where
        F: OracleFactory + ?Sized,
        R: Rng,
        P: FnMut(usize, usize, &ArchitectureResult),
    {
        self.config.validate()?;
        if train.is_empty() {
            return Err(ToolkitError::empty_dataset("architecture search training set"));
        }
        if validation.is_empty() {
            return Err(ToolkitError::empty_dataset(
                "architecture search validation set",
            ));
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut tracker = Tracker {
            expected: self.expected_evaluations(),
            history: Vec::with_capacity(self.expected_evaluations()),
            best: None,
        };

        tracing::debug!(
            strategy = ?self.config.strategy,
            expected = tracker.expected,
            epochs = self.config.epochs_per_candidate,
            "Starting architecture search"
        );

        match self.config.strategy {
            SearchStrategy::Random => {
                for _ in 0..self.config.num_candidates {
                    let candidate = ArchitectureCandidate::random(rng);
                    let result = self.evaluate(factory, candidate, train, validation).await?;
                    tracker.record(result, &mut on_progress);
                }
            }
            SearchStrategy::Grid => {
                for candidate in ArchitectureCandidate::grid()
                    .into_iter()
                    .take(self.config.num_candidates)
                {
                    let result = self.evaluate(factory, candidate, train, validation).await?;
                    tracker.record(result, &mut on_progress);
                }
            }
            SearchStrategy::Evolutionary => {
                self.evolve(factory, train, validation, rng, &mut tracker, &mut on_progress)
                    .await?;
            }
        }

        let Tracker { history, best, .. } = tracker;
        let best = best.ok_or_else(|| {
            ToolkitError::invalid_config("architecture search evaluated no candidates")
        })?;
        let total_time_ms = clock.elapsed().as_secs_f64() * 1000.0;

        tracing::info!(
            best = %best.candidate.describe(),
            accuracy = best.accuracy,
            evaluated = history.len(),
            total_time_ms,
            "Architecture search complete"
        );

        Ok(NasRun {
            id: uuid::Uuid::new_v4().to_string(),
            started_at,
            best,
            history,
            config: self.config.clone(),
            total_time_ms,
        })
    }

    async fn evolve<F, R, P>(
        &self,
        factory: &F,
        train: &[Point],
        validation: &[Point],
        rng: &mut R,
        tracker: &mut Tracker,
        on_progress: &mut P,
    ) -> Result<(), ToolkitError>
    where
        F: OracleFactory + ?Sized,
        R: Rng,
        P: FnMut(usize, usize, &ArchitectureResult),
    {
        let size = self.config.population_size.min(self.config.num_candidates);
        let mut population = Vec::with_capacity(size + 2);
        for _ in 0..size {
            let candidate = ArchitectureCandidate::random(rng);
            let result = self.evaluate(factory, candidate, train, validation).await?;
            tracker.record(result.clone(), on_progress);
            population.push(result);
        }

        for generation in 0..self.generations() {
            population.sort_by(by_accuracy_desc);
            let parents = select_parents(&population);

            let mut children = Vec::with_capacity(2);
            for _ in 0..2 {
                let a = &parents[rng.gen_range(0..parents.len())].candidate;
                let b = &parents[rng.gen_range(0..parents.len())].candidate;
                children.push(mutate(&crossover(a, b, rng), self.config.mutation_rate, rng));
            }

            let mut offspring = Vec::with_capacity(2);
            for child in children {
                let result = self.evaluate(factory, child, train, validation).await?;
                tracker.record(result.clone(), on_progress);
                offspring.push(result);
            }

            population = next_generation(population, offspring, size);
            tracing::debug!(
                generation,
                population = population.len(),
                leader_accuracy = population.first().map(|r| r.accuracy),
                "Evolved generation"
            );
        }
        Ok(())
    }

    async fn evaluate<F>(
        &self,
        factory: &F,
        candidate: ArchitectureCandidate,
        train: &[Point],
        validation: &[Point],
    ) -> Result<ArchitectureResult, ToolkitError>
    where
        F: OracleFactory + ?Sized,
    {
        let clock = Instant::now();
        let mut oracle = factory.create();
        oracle.initialize(&candidate.to_hyperparameters()).await?;

        let mut last = TrainingStats::default();
        for _ in 0..self.config.epochs_per_candidate {
            last = oracle.train(train).await?;
        }
        let validated = oracle.evaluate(validation).await?;

        let result = ArchitectureResult {
            num_parameters: candidate.num_parameters(),
            candidate,
            accuracy: validated.accuracy,
            loss: validated.loss,
            train_loss: last.loss,
            training_time_ms: clock.elapsed().as_secs_f64() * 1000.0,
            epochs_trained: self.config.epochs_per_candidate,
        };
        tracing::debug!(
            candidate = %result.candidate.describe(),
            accuracy = result.accuracy,
            loss = result.loss,
            "Evaluated candidate"
        );
        Ok(result)
    }
}

struct Tracker {
    expected: usize,
    history: Vec<ArchitectureResult>,
    best: Option<ArchitectureResult>,
}

impl Tracker {
    fn record<P>(&mut self, result: ArchitectureResult, on_progress: &mut P)
    where
        P: FnMut(usize, usize, &ArchitectureResult),
    {
        let improved = self
            .best
            .as_ref()
            .is_none_or(|best| ranking_accuracy(&result) > ranking_accuracy(best));
        if improved {
            self.best = Some(result.clone());
        }
        self.history.push(result);
        if let Some(best) = &self.best {
            on_progress(self.history.len(), self.expected, best);
        }
    }
}
