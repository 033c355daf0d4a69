//! Data model shared by the oracle contract and every toolkit algorithm.

use serde::{Deserialize, Serialize};

/// A labeled 2D sample.
///
/// Points handed to [`crate::PredictionOracle::predict`] only need coordinates;
/// their label is ignored there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub label: usize,
    #[serde(default)]
    pub is_validation: bool,
}

impl Point {
    pub fn new(x: f64, y: f64, label: usize) -> Self {
        Self {
            x,
            y,
            label,
            is_validation: false,
        }
    }

    /// An unlabeled query position.
    pub fn at(x: f64, y: f64) -> Self {
        Self::new(x, y, 0)
    }

    pub fn validation(mut self) -> Self {
        self.is_validation = true;
        self
    }

    /// Coordinate by feature index (0 = x, 1 = y).
    pub fn feature(&self, index: usize) -> f64 {
        match index {
            0 => self.x,
            _ => self.y,
        }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Same label and flags, shifted position.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Class scores returned alongside a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "probabilities", rename_all = "snake_case")]
pub enum ClassDistribution {
    /// Single sigmoid output; `confidence` is the probability of `predicted_class`.
    Binary,
    /// Softmax output over all classes, summing to 1.
    Multiclass(Vec<f64>),
}

/// One oracle prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub x: f64,
    pub y: f64,
    pub predicted_class: usize,
    pub confidence: f64,
    pub distribution: ClassDistribution,
}

impl PredictionResult {
    /// Binary prediction from a sigmoid output `p = P(class 1)`.
    pub fn from_sigmoid(x: f64, y: f64, p: f64) -> Self {
        let (predicted_class, confidence) = if p >= 0.5 { (1, p) } else { (0, 1.0 - p) };
        Self {
            x,
            y,
            predicted_class,
            confidence,
            distribution: ClassDistribution::Binary,
        }
    }

    /// Multiclass prediction; the predicted class is the first arg-max.
    pub fn from_probabilities(x: f64, y: f64, probabilities: Vec<f64>) -> Self {
        let mut predicted_class = 0;
        let mut confidence = f64::NEG_INFINITY;
        for (class, &p) in probabilities.iter().enumerate() {
            if p > confidence {
                predicted_class = class;
                confidence = p;
            }
        }
        if probabilities.is_empty() {
            confidence = 0.0;
        }
        Self {
            x,
            y,
            predicted_class,
            confidence,
            distribution: ClassDistribution::Multiclass(probabilities),
        }
    }

    /// Probability the oracle assigns to `class`.
    ///
    /// Multiclass outputs are indexed directly (0 for unknown classes). Binary
    /// outputs yield `confidence` for the predicted class and `1 - confidence`
    /// for any other class.
    pub fn probability_of(&self, class: usize) -> f64 {
        match &self.distribution {
            ClassDistribution::Multiclass(probabilities) => {
                probabilities.get(class).copied().unwrap_or(0.0)
            }
            ClassDistribution::Binary => {
                if class == self.predicted_class {
                    self.confidence
                } else {
                    1.0 - self.confidence
                }
            }
        }
    }

    /// Full probability vector, synthesizing `[P(0), P(1)]` for binary outputs.
    pub fn probabilities(&self) -> Vec<f64> {
        match &self.distribution {
            ClassDistribution::Multiclass(probabilities) => probabilities.clone(),
            ClassDistribution::Binary => vec![self.probability_of(0), self.probability_of(1)],
        }
    }
}

/// Loss and accuracy reported by `train` and `evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainingStats {
    pub loss: f64,
    pub accuracy: f64,
}

/// Hidden-layer activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    pub const ALL: [Activation; 3] = [Activation::Relu, Activation::Tanh, Activation::Sigmoid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
        }
    }
}

/// Weight update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimizer {
    Adam,
    Sgd,
    Rmsprop,
}

impl Optimizer {
    pub const ALL: [Optimizer; 3] = [Optimizer::Adam, Optimizer::Sgd, Optimizer::Rmsprop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Optimizer::Adam => "adam",
            Optimizer::Sgd => "sgd",
            Optimizer::Rmsprop => "rmsprop",
        }
    }
}

/// Configuration handed to [`crate::PredictionOracle::initialize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub hidden_layers: Vec<usize>,
    pub activation: Activation,
    pub optimizer: Optimizer,
    pub learning_rate: f64,
    pub dropout_rate: f64,
    pub l2_regularization: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            hidden_layers: vec![8, 4],
            activation: Activation::Tanh,
            optimizer: Optimizer::Adam,
            learning_rate: 0.03,
            dropout_rate: 0.0,
            l2_regularization: 0.0,
        }
    }
}

/// Axis-aligned rectangle over the feature plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::square(6.0)
    }
}

impl Bounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// `[-half, half]` on both axes.
    pub fn square(half: f64) -> Self {
        Self::new(-half, half, -half, half)
    }

    /// Centers of a `resolution x resolution` grid, row-major with rows along y.
    pub fn cell_centers(&self, resolution: usize) -> Vec<Vec<(f64, f64)>> {
        let step_x = (self.x_max - self.x_min) / resolution as f64;
        let step_y = (self.y_max - self.y_min) / resolution as f64;
        (0..resolution)
            .map(|row| {
                let y = self.y_min + (row as f64 + 0.5) * step_y;
                (0..resolution)
                    .map(|col| (self.x_min + (col as f64 + 0.5) * step_x, y))
                    .collect()
            })
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.x_min.is_finite()
            && self.x_max.is_finite()
            && self.y_min.is_finite()
            && self.y_max.is_finite()
            && self.x_max > self.x_min
            && self.y_max > self.y_min
    }
}
