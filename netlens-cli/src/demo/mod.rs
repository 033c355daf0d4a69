//! Demonstration oracles for the command line.

pub mod datasets;
pub mod mlp;

use netlens_core::{FunctionOracle, Hyperparameters, Point, PredictionOracle, PredictionResult};

pub use datasets::DatasetKind;
pub use mlp::MlpOracle;

/// Oracle backed by one of the analytic decision functions below.
pub type AnalyticOracle = FunctionOracle<fn(f64, f64) -> PredictionResult>;

/// Which oracle a command runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoModel {
    /// Boundary along the line `y = x`.
    Linear,
    /// Class 1 inside a circle of radius 3.
    Circle,
    /// Class 1 in the first and third quadrants.
    Xor,
    /// Perceptron trained on a generated dataset.
    Mlp,
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

pub fn linear(x: f64, y: f64) -> PredictionResult {
    PredictionResult::from_sigmoid(x, y, logistic(1.5 * (x - y)))
}

pub fn circle(x: f64, y: f64) -> PredictionResult {
    let r = (x * x + y * y).sqrt();
    PredictionResult::from_sigmoid(x, y, logistic(2.0 * (3.0 - r)))
}

pub fn xor(x: f64, y: f64) -> PredictionResult {
    PredictionResult::from_sigmoid(x, y, logistic(0.8 * x * y))
}

/// The analytic oracle for `model`, or `None` for models that need training.
pub fn analytic(model: DemoModel) -> Option<AnalyticOracle> {
    let decide: fn(f64, f64) -> PredictionResult = match model {
        DemoModel::Linear => linear,
        DemoModel::Circle => circle,
        DemoModel::Xor => xor,
        DemoModel::Mlp => return None,
    };
    Some(FunctionOracle::new(decide))
}

/// Train a perceptron on `train`, halving the learning rate for the second
/// half of the epochs.
pub async fn train_mlp(
    seed: u64,
    hyperparameters: &Hyperparameters,
    train: &[Point],
    epochs: usize,
) -> anyhow::Result<MlpOracle> {
    let mut oracle = MlpOracle::new(seed);
    oracle.initialize(hyperparameters).await?;
    for epoch in 0..epochs {
        if epoch == epochs / 2 && epoch > 0 {
            oracle
                .update_learning_rate(hyperparameters.learning_rate * 0.5)
                .await?;
        }
        let stats = oracle.train(train).await?;
        tracing::debug!(epoch, loss = stats.loss, accuracy = stats.accuracy, "Trained epoch");
    }
    Ok(oracle)
}
