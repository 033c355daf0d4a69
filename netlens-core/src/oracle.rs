//! The prediction oracle contract every toolkit algorithm runs against.
//!
//! Algorithms never see how an oracle is implemented. They call `predict` for
//! inference and, for architecture search, drive the full
//! `initialize` / `train` / `evaluate` lifecycle on freshly created instances.

use crate::error::{OracleError, ToolkitError};
use crate::types::{Hyperparameters, Point, PredictionResult, TrainingStats};
use async_trait::async_trait;

/// Opaque classifier over 2D points.
#[async_trait]
pub trait PredictionOracle: Send + Sync {
    /// Build a fresh model for the given hyperparameters, discarding any weights.
    async fn initialize(&mut self, hyperparameters: &Hyperparameters) -> Result<(), OracleError>;

    /// Change the learning rate without touching the weights.
    async fn update_learning_rate(&mut self, rate: f64) -> Result<(), OracleError> {
        Err(OracleError::Unsupported(format!(
            "update_learning_rate({rate})"
        )))
    }

    /// One optimization pass over `points`.
    async fn train(&mut self, points: &[Point]) -> Result<TrainingStats, OracleError>;

    /// Loss and accuracy on `points` without updating weights.
    async fn evaluate(&self, points: &[Point]) -> Result<TrainingStats, OracleError>;

    /// Batched inference, one result per input point in input order.
    async fn predict(&self, points: &[Point]) -> Result<Vec<PredictionResult>, OracleError>;
}

/// Creates uninitialized oracles, one per architecture candidate.
pub trait OracleFactory: Send + Sync {
    type Oracle: PredictionOracle;

    fn create(&self) -> Self::Oracle;
}

impl<O, F> OracleFactory for F
where
    O: PredictionOracle,
    F: Fn() -> O + Send + Sync,
{
    type Oracle = O;

    fn create(&self) -> O {
        self()
    }
}

/// Query a single point, failing if the oracle returns nothing for it.
pub async fn predict_one<O>(oracle: &O, point: &Point) -> Result<PredictionResult, ToolkitError>
where
    O: PredictionOracle + ?Sized,
{
    oracle
        .predict(std::slice::from_ref(point))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ToolkitError::missing_prediction(point.x, point.y))
}

/// Query a batch and require exactly one prediction per point.
pub async fn predict_all<O>(
    oracle: &O,
    points: &[Point],
) -> Result<Vec<PredictionResult>, ToolkitError>
where
    O: PredictionOracle + ?Sized,
{
    let predictions = oracle.predict(points).await?;
    if predictions.len() < points.len() {
        let missing = &points[predictions.len()];
        return Err(ToolkitError::missing_prediction(missing.x, missing.y));
    }
    Ok(predictions)
}

/// Oracle backed by a fixed decision function.
///
/// Training never changes the function; `train` and `evaluate` both score it
/// against the given labels. Useful for analytic demos and as a test double.
pub struct FunctionOracle<F> {
    decide: F,
    hyperparameters: Option<Hyperparameters>,
    learning_rate: Option<f64>,
}

impl<F> FunctionOracle<F>
where
    F: Fn(f64, f64) -> PredictionResult + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self {
            decide,
            hyperparameters: None,
            learning_rate: None,
        }
    }

    /// Hyperparameters from the last `initialize` call.
    pub fn hyperparameters(&self) -> Option<&Hyperparameters> {
        self.hyperparameters.as_ref()
    }

    pub fn learning_rate(&self) -> Option<f64> {
        self.learning_rate
    }

    fn score(&self, points: &[Point]) -> TrainingStats {
        if points.is_empty() {
            return TrainingStats::default();
        }
        let mut correct = 0usize;
        let mut loss = 0.0;
        for point in points {
            let prediction = (self.decide)(point.x, point.y);
            if prediction.predicted_class == point.label {
                correct += 1;
            }
            loss -= prediction.probability_of(point.label).max(1e-12).ln();
        }
        let n = points.len() as f64;
        TrainingStats {
            loss: loss / n,
            accuracy: correct as f64 / n,
        }
    }
}

#[async_trait]
impl<F> PredictionOracle for FunctionOracle<F>
where
    F: Fn(f64, f64) -> PredictionResult + Send + Sync,
{
    async fn initialize(&mut self, hyperparameters: &Hyperparameters) -> Result<(), OracleError> {
        self.learning_rate = Some(hyperparameters.learning_rate);
        self.hyperparameters = Some(hyperparameters.clone());
        Ok(())
    }

    async fn update_learning_rate(&mut self, rate: f64) -> Result<(), OracleError> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(OracleError::invalid_config(format!(
                "learning rate must be positive, got {rate}"
            )));
        }
        self.learning_rate = Some(rate);
        Ok(())
    }

    async fn train(&mut self, points: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(self.score(points))
    }

    async fn evaluate(&self, points: &[Point]) -> Result<TrainingStats, OracleError> {
        Ok(self.score(points))
    }

    async fn predict(&self, points: &[Point]) -> Result<Vec<PredictionResult>, OracleError> {
        Ok(points.iter().map(|p| (self.decide)(p.x, p.y)).collect())
    }
}
