//! A small trainable multilayer perceptron oracle.
//!
//! Dense layers over `(x, y)` with a single sigmoid output trained on binary
//! cross-entropy in mini-batches. Hidden activations, optimizer, dropout and
//! L2 penalty come from the [`Hyperparameters`] passed to `initialize`.

use async_trait::async_trait;
use netlens_core::{
    Activation, Hyperparameters, OracleError, Optimizer, Point, PredictionOracle,
    PredictionResult, TrainingStats,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const BATCH_SIZE: usize = 10;
const PROBABILITY_FLOOR: f64 = 1e-7;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const RMS_DECAY: f64 = 0.9;
const STABILITY: f64 = 1e-8;

#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    first: f64,
    second: f64,
}

#[derive(Debug, Clone)]
struct Layer {
    inputs: usize,
    outputs: usize,
    /// Row-major `outputs x inputs`.
    weights: Vec<f64>,
    biases: Vec<f64>,
    weight_moments: Vec<Moments>,
    bias_moments: Vec<Moments>,
}

impl Layer {
    fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        // Glorot uniform
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs)
                .map(|_| rng.gen_range(-limit..limit))
                .collect(),
            biases: vec![0.0; outputs],
            weight_moments: vec![Moments::default(); inputs * outputs],
            bias_moments: vec![Moments::default(); outputs],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.outputs)
            .map(|o| {
                let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                self.biases[o] + row.iter().zip(input).map(|(w, v)| w * v).sum::<f64>()
            })
            .collect()
    }
}

/// Intermediate values of one forward pass.
struct Trace {
    /// `inputs[l]` is what layer `l` consumed (after dropout).
    inputs: Vec<Vec<f64>>,
    /// Hidden activations before dropout, for derivatives.
    activated: Vec<Vec<f64>>,
    /// Inverted dropout scale per hidden unit (0 for dropped units).
    masks: Vec<Vec<f64>>,
    output: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn activate(activation: Activation, z: f64) -> f64 {
    match activation {
        Activation::Relu => z.max(0.0),
        Activation::Tanh => z.tanh(),
        Activation::Sigmoid => sigmoid(z),
    }
}

/// Derivative expressed through the activated value.
fn derivative(activation: Activation, a: f64) -> f64 {
    match activation {
        Activation::Relu => {
            if a > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Activation::Tanh => 1.0 - a * a,
        Activation::Sigmoid => a * (1.0 - a),
    }
}

fn cross_entropy(p: f64, label: usize) -> f64 {
    let p = p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
    if label == 1 { -p.ln() } else { -(1.0 - p).ln() }
}

/// Perceptron oracle with its own seeded generator for weight init, dropout
/// and shuffling.
pub struct MlpOracle {
    rng: StdRng,
    hyperparameters: Hyperparameters,
    learning_rate: f64,
    layers: Vec<Layer>,
    step: i32,
}

impl MlpOracle {
    /// Uninitialized oracle; call `initialize` before use.
    pub fn new(seed: u64) -> Self {
        let hyperparameters = Hyperparameters::default();
        Self {
            rng: StdRng::seed_from_u64(seed),
            learning_rate: hyperparameters.learning_rate,
            hyperparameters,
            layers: Vec::new(),
            step: 0,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn is_initialized(&self) -> bool {
        !self.layers.is_empty()
    }

    fn ensure_initialized(&self) -> Result<(), OracleError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(OracleError::prediction("network is not initialized"))
        }
    }

    fn forward(&mut self, point: &Point, train: bool) -> Trace {
        let dropout = if train {
            self.hyperparameters.dropout_rate.clamp(0.0, 0.95)
        } else {
            0.0
        };
        let activation = self.hyperparameters.activation;
        let hidden = self.layers.len() - 1;

        let mut current = vec![point.x, point.y];
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut activated = Vec::with_capacity(hidden);
        let mut masks = Vec::with_capacity(hidden);
        for layer in &self.layers[..hidden] {
            let a: Vec<f64> = layer
                .forward(&current)
                .into_iter()
                .map(|z| activate(activation, z))
                .collect();
            let mask: Vec<f64> = a
                .iter()
                .map(|_| {
                    if dropout > 0.0 && self.rng.gen_bool(dropout) {
                        0.0
                    } else {
                        1.0 / (1.0 - dropout)
                    }
                })
                .collect();
            let next = a.iter().zip(&mask).map(|(v, m)| v * m).collect();
            inputs.push(std::mem::replace(&mut current, next));
            activated.push(a);
            masks.push(mask);
        }
        let output = sigmoid(self.layers[hidden].forward(&current)[0]);
        inputs.push(current);
        Trace {
            inputs,
            activated,
            masks,
            output,
        }
    }

    fn probability(&self, point: &Point) -> f64 {
        let activation = self.hyperparameters.activation;
        let hidden = self.layers.len() - 1;
        let mut current = vec![point.x, point.y];
        for layer in &self.layers[..hidden] {
            current = layer
                .forward(&current)
                .into_iter()
                .map(|z| activate(activation, z))
                .collect();
        }
        sigmoid(self.layers[hidden].forward(&current)[0])
    }

    /// Accumulate gradients of one sample into `grads` (same shapes as layers).
    fn backward(&self, trace: &Trace, label: usize, grads: &mut [(Vec<f64>, Vec<f64>)]) {
        let activation = self.hyperparameters.activation;
        let mut delta = vec![trace.output - label as f64];
        for l in (0..self.layers.len()).rev() {
            let layer = &self.layers[l];
            let input = &trace.inputs[l];
            let (weight_grads, bias_grads) = &mut grads[l];
            for (o, d) in delta.iter().enumerate() {
                bias_grads[o] += d;
                for (i, v) in input.iter().enumerate() {
                    weight_grads[o * layer.inputs + i] += d * v;
                }
            }
            if l == 0 {
                break;
            }
            delta = (0..layer.inputs)
                .map(|i| {
                    let back: f64 = delta
                        .iter()
                        .enumerate()
                        .map(|(o, d)| layer.weights[o * layer.inputs + i] * d)
                        .sum();
                    back * trace.masks[l - 1][i] * derivative(activation, trace.activated[l - 1][i])
                })
                .collect();
        }
    }

    fn apply(&mut self, grads: &[(Vec<f64>, Vec<f64>)], batch: usize) {
        self.step += 1;
        let optimizer = self.hyperparameters.optimizer;
        let lr = self.learning_rate;
        let l2 = self.hyperparameters.l2_regularization;
        let t = self.step;
        let scale = 1.0 / batch as f64;
        for (layer, (weight_grads, bias_grads)) in self.layers.iter_mut().zip(grads) {
            for ((w, g), m) in layer
                .weights
                .iter_mut()
                .zip(weight_grads)
                .zip(&mut layer.weight_moments)
            {
                let g = g * scale + l2 * *w;
                update(optimizer, lr, t, w, g, m);
            }
            for ((b, g), m) in layer
                .biases
                .iter_mut()
                .zip(bias_grads)
                .zip(&mut layer.bias_moments)
            {
                update(optimizer, lr, t, b, g * scale, m);
            }
        }
    }
}

fn update(optimizer: Optimizer, lr: f64, t: i32, param: &mut f64, g: f64, m: &mut Moments) {
    match optimizer {
        Optimizer::Sgd => *param -= lr * g,
        Optimizer::Rmsprop => {
            m.second = RMS_DECAY * m.second + (1.0 - RMS_DECAY) * g * g;
            *param -= lr * g / (m.second.sqrt() + STABILITY);
        }
        Optimizer::Adam => {
            m.first = BETA1 * m.first + (1.0 - BETA1) * g;
            m.second = BETA2 * m.second + (1.0 - BETA2) * g * g;
            let first = m.first / (1.0 - BETA1.powi(t));
            let second = m.second / (1.0 - BETA2.powi(t));
            *param -= lr * first / (second.sqrt() + STABILITY);
        }
    }
}

#[async_trait]
impl PredictionOracle for MlpOracle {
    async fn initialize(&mut self, hyperparameters: &Hyperparameters) -> Result<(), OracleError> {
        if hyperparameters.hidden_layers.is_empty() {
            return Err(OracleError::invalid_config("at least one hidden layer is required"));
        }
        if hyperparameters.hidden_layers.contains(&0) {
            return Err(OracleError::invalid_config("hidden layers must be non-empty"));
        }
        if !(hyperparameters.learning_rate > 0.0 && hyperparameters.learning_rate.is_finite()) {
            return Err(OracleError::invalid_config(format!(
                "learning rate must be positive, got {}",
                hyperparameters.learning_rate
            )));
        }

        let mut sizes = vec![2];
        sizes.extend(&hyperparameters.hidden_layers);
        sizes.push(1);
        self.layers = sizes
            .windows(2)
            .map(|w| Layer::new(w[0], w[1], &mut self.rng))
            .collect();
        self.hyperparameters = hyperparameters.clone();
        self.learning_rate = hyperparameters.learning_rate;
        self.step = 0;
        Ok(())
    }

    async fn update_learning_rate(&mut self, rate: f64) -> Result<(), OracleError> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(OracleError::invalid_config(format!(
                "learning rate must be positive, got {rate}"
            )));
        }
        self.learning_rate = rate;
        Ok(())
    }

    async fn train(&mut self, points: &[Point]) -> Result<TrainingStats, OracleError> {
        if !self.is_initialized() {
            return Err(OracleError::training("network is not initialized"));
        }
        if points.is_empty() {
            return Ok(TrainingStats::default());
        }

        let mut order: Vec<usize> = (0..points.len()).collect();
        order.shuffle(&mut self.rng);

        let mut loss = 0.0;
        let mut correct = 0usize;
        for batch in order.chunks(BATCH_SIZE) {
            let mut grads: Vec<(Vec<f64>, Vec<f64>)> = self
                .layers
                .iter()
                .map(|l| (vec![0.0; l.weights.len()], vec![0.0; l.biases.len()]))
                .collect();
            for &index in batch {
                let point = &points[index];
                let trace = self.forward(point, true);
                loss += cross_entropy(trace.output, point.label);
                if usize::from(trace.output >= 0.5) == point.label {
                    correct += 1;
                }
                self.backward(&trace, point.label, &mut grads);
            }
            self.apply(&grads, batch.len());
        }

        let n = points.len() as f64;
        let stats = TrainingStats {
            loss: loss / n,
            accuracy: correct as f64 / n,
        };
        if !stats.loss.is_finite() {
            return Err(OracleError::training("loss diverged"));
        }
        Ok(stats)
    }

    async fn evaluate(&self, points: &[Point]) -> Result<TrainingStats, OracleError> {
        self.ensure_initialized()?;
        if points.is_empty() {
            return Ok(TrainingStats::default());
        }
        let mut loss = 0.0;
        let mut correct = 0usize;
        for point in points {
            let p = self.probability(point);
            loss += cross_entropy(p, point.label);
            if usize::from(p >= 0.5) == point.label {
                correct += 1;
            }
        }
        let n = points.len() as f64;
        Ok(TrainingStats {
            loss: loss / n,
            accuracy: correct as f64 / n,
        })
    }

    async fn predict(&self, points: &[Point]) -> Result<Vec<PredictionResult>, OracleError> {
        self.ensure_initialized()?;
        Ok(points
            .iter()
            .map(|p| PredictionResult::from_sigmoid(p.x, p.y, self.probability(p)))
            .collect())
    }
}
