//! Architecture candidates and the search space they are drawn from.

use netlens_core::{Activation, Hyperparameters, Optimizer};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MIN_LAYERS: usize = 1;
pub const MAX_LAYERS: usize = 4;
pub const MIN_NEURONS: usize = 2;
pub const MAX_NEURONS: usize = 32;

pub const LEARNING_RATES: [f64; 5] = [0.001, 0.003, 0.01, 0.03, 0.1];
pub const DROPOUT_RATES: [f64; 4] = [0.0, 0.1, 0.2, 0.3];
pub const L2_RATES: [f64; 3] = [0.0, 0.001, 0.01];

/// Layer shapes enumerated by grid search, outermost loop.
pub const GRID_LAYER_SHAPES: [&[usize]; 5] = [&[4], &[8], &[8, 4], &[16, 8], &[16, 8, 4]];
pub const GRID_LEARNING_RATES: [f64; 3] = [0.003, 0.01, 0.03];
pub const GRID_ACTIVATIONS: [Activation; 2] = [Activation::Relu, Activation::Tanh];

/// Network inputs (x, y).
const INPUT_SIZE: usize = 2;

pub(crate) fn pick<T: Copy, R: Rng>(rng: &mut R, options: &[T]) -> T {
    options[rng.gen_range(0..options.len())]
}

/// One fully specified architecture / hyperparameter combination.
///
/// Immutable: the `with_*` methods return a new candidate. Layer lists are
/// clamped into the search space on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureCandidate {
    layers: Vec<usize>,
    activation: Activation,
    optimizer: Optimizer,
    learning_rate: f64,
    dropout_rate: f64,
    l2_regularization: f64,
}

impl ArchitectureCandidate {
    /// Candidate with the given hidden layers and default training settings.
    pub fn new(layers: Vec<usize>) -> Self {
        Self {
            layers: clamp_layers(layers),
            activation: Activation::Relu,
            optimizer: Optimizer::Adam,
            learning_rate: 0.01,
            dropout_rate: 0.0,
            l2_regularization: 0.0,
        }
    }

    pub fn with_layers(self, layers: Vec<usize>) -> Self {
        Self {
            layers: clamp_layers(layers),
            ..self
        }
    }

    pub fn with_activation(self, activation: Activation) -> Self {
        Self { activation, ..self }
    }

    pub fn with_optimizer(self, optimizer: Optimizer) -> Self {
        Self { optimizer, ..self }
    }

    pub fn with_learning_rate(self, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..self
        }
    }

    pub fn with_dropout_rate(self, dropout_rate: f64) -> Self {
        Self {
            dropout_rate,
            ..self
        }
    }

    pub fn with_l2_regularization(self, l2_regularization: f64) -> Self {
        Self {
            l2_regularization,
            ..self
        }
    }

    /// Draw a random candidate.
    ///
    /// Layers after the first are at most as wide as the previous one, which
    /// favours funnel-shaped networks.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let depth = rng.gen_range(MIN_LAYERS..=MAX_LAYERS);
        let mut layers = Vec::with_capacity(depth);
        let mut widest = MAX_NEURONS;
        for _ in 0..depth {
            let size = rng.gen_range(MIN_NEURONS..=widest);
            layers.push(size);
            widest = size;
        }
        Self {
            layers,
            activation: pick(rng, &Activation::ALL),
            optimizer: pick(rng, &Optimizer::ALL),
            learning_rate: pick(rng, &LEARNING_RATES),
            dropout_rate: pick(rng, &DROPOUT_RATES),
            l2_regularization: pick(rng, &L2_RATES),
        }
    }

    /// The fixed grid-search enumeration: shapes x learning rates x activations.
    pub fn grid() -> Vec<Self> {
        let mut candidates =
            Vec::with_capacity(GRID_LAYER_SHAPES.len() * GRID_LEARNING_RATES.len() * 2);
        for shape in GRID_LAYER_SHAPES {
            for learning_rate in GRID_LEARNING_RATES {
                for activation in GRID_ACTIVATIONS {
                    candidates.push(
                        Self::new(shape.to_vec())
                            .with_learning_rate(learning_rate)
                            .with_activation(activation),
                    );
                }
            }
        }
        candidates
    }

    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn optimizer(&self) -> Optimizer {
        self.optimizer
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn dropout_rate(&self) -> f64 {
        self.dropout_rate
    }

    pub fn l2_regularization(&self) -> f64 {
        self.l2_regularization
    }

    /// Weights and biases of a dense network with 2 inputs and a single output unit.
    pub fn num_parameters(&self) -> usize {
        let mut previous = INPUT_SIZE;
        let mut total = 0;
        for &size in &self.layers {
            total += previous * size + size;
            previous = size;
        }
        total + previous + 1
    }

    pub fn to_hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            hidden_layers: self.layers.clone(),
            activation: self.activation,
            optimizer: self.optimizer,
            learning_rate: self.learning_rate,
            dropout_rate: self.dropout_rate,
            l2_regularization: self.l2_regularization,
        }
    }

    /// Short label such as `8-4 relu adam lr=0.01`.
    pub fn describe(&self) -> String {
        let shape = self
            .layers
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("-");
        let mut label = format!(
            "{shape} {} {} lr={}",
            self.activation.as_str(),
            self.optimizer.as_str(),
            self.learning_rate
        );
        if self.dropout_rate > 0.0 {
            label.push_str(&format!(" dropout={}", self.dropout_rate));
        }
        if self.l2_regularization > 0.0 {
            label.push_str(&format!(" l2={}", self.l2_regularization));
        }
        label
    }
}

fn clamp_layers(layers: Vec<usize>) -> Vec<usize> {
    let mut layers: Vec<usize> = layers
        .into_iter()
        .take(MAX_LAYERS)
        .map(|l| l.clamp(MIN_NEURONS, MAX_NEURONS))
        .collect();
    if layers.is_empty() {
        layers.push(MIN_NEURONS);
    }
    layers
}
