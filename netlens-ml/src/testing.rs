//! Oracle doubles for unit tests.

use async_trait::async_trait;
use netlens_core::{
    Hyperparameters, OracleError, Point, PredictionOracle, PredictionResult, TrainingStats,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Same prediction everywhere.
pub struct ConstantOracle {
    pub predicted_class: usize,
    pub confidence: f64,
    pub probabilities: Option<Vec<f64>>,
    pub predict_calls: AtomicUsize,
}

impl ConstantOracle {
    pub fn binary(predicted_class: usize, confidence: f64) -> Self {
        Self {
            predicted_class,
            confidence,
            probabilities: None,
            predict_calls: AtomicUsize::new(0),
        }
    }

    pub fn multiclass(probabilities: Vec<f64>) -> Self {
        let base = PredictionResult::from_probabilities(0.0, 0.0, probabilities.clone());
        Self {
            predicted_class: base.predicted_class,
            confidence: base.confidence,
            probabilities: Some(probabilities),
            predict_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionOracle for ConstantOracle {
    async fn initialize(&mut self, _h: &Hyperparameters) -> Result<(), OracleError> {
        Ok(())
    }

    async fn train(&mut self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn evaluate(&self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn predict(&self, points: &[Point]) -> Result<Vec<PredictionResult>, OracleError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        Ok(points
            .iter()
            .map(|p| match &self.probabilities {
                Some(probs) => PredictionResult::from_probabilities(p.x, p.y, probs.clone()),
                None => PredictionResult {
                    x: p.x,
                    y: p.y,
                    predicted_class: self.predicted_class,
                    confidence: self.confidence,
                    distribution: netlens_core::ClassDistribution::Binary,
                },
            })
            .collect())
    }
}

/// Logistic model `sigmoid(wx * x + wy * y + b)` predicting class 1 above 0.5.
pub struct LogisticOracle {
    pub wx: f64,
    pub wy: f64,
    pub bias: f64,
}

impl LogisticOracle {
    pub fn new(wx: f64, wy: f64, bias: f64) -> Self {
        Self { wx, wy, bias }
    }

    pub fn probability(&self, x: f64, y: f64) -> f64 {
        1.0 / (1.0 + (-(self.wx * x + self.wy * y + self.bias)).exp())
    }
}

#[async_trait]
impl PredictionOracle for LogisticOracle {
    async fn initialize(&mut self, _h: &Hyperparameters) -> Result<(), OracleError> {
        Ok(())
    }

    async fn train(&mut self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn evaluate(&self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn predict(&self, points: &[Point]) -> Result<Vec<PredictionResult>, OracleError> {
        Ok(points
            .iter()
            .map(|p| PredictionResult::from_sigmoid(p.x, p.y, self.probability(p.x, p.y)))
            .collect())
    }
}

/// Fails every prediction whose x coordinate lies within `poison` of `bad_x`.
pub struct PoisonedOracle {
    pub inner: LogisticOracle,
    pub bad_x: f64,
    pub poison: f64,
}

#[async_trait]
impl PredictionOracle for PoisonedOracle {
    async fn initialize(&mut self, _h: &Hyperparameters) -> Result<(), OracleError> {
        Ok(())
    }

    async fn train(&mut self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn evaluate(&self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn predict(&self, points: &[Point]) -> Result<Vec<PredictionResult>, OracleError> {
        if points.iter().any(|p| (p.x - self.bad_x).abs() <= self.poison) {
            return Err(OracleError::prediction("poisoned region"));
        }
        self.inner.predict(points).await
    }
}

/// Returns nothing at all.
pub struct EmptyOracle;

#[async_trait]
impl PredictionOracle for EmptyOracle {
    async fn initialize(&mut self, _h: &Hyperparameters) -> Result<(), OracleError> {
        Ok(())
    }

    async fn train(&mut self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn evaluate(&self, _p: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(TrainingStats::default())
    }

    async fn predict(&self, _p: &[Point]) -> Result<Vec<PredictionResult>, OracleError> {
        Ok(Vec::new())
    }
}
