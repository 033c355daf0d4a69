//! Monte-Carlo predictive uncertainty.
//!
//! The oracle exposes no stochastic inference, so dropout is approximated by
//! jittering the input with Gaussian noise (`sigma = dropout_rate * 0.5`) and
//! querying all noisy copies in one batch. Spread of the sampled confidences
//! is reported as epistemic uncertainty, entropy of the sampled labels as
//! aleatoric uncertainty.

use netlens_core::{
    Bounds, Point, PredictionOracle, PredictionResult, ToolkitError, UncertaintyConfig,
    predict_all, predict_one, standard_normal,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One noisy query outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintySample {
    pub x: f64,
    pub y: f64,
    pub predicted_class: usize,
    pub confidence: f64,
}

/// Nearest-rank confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyResult {
    pub point: Point,
    /// Majority vote across samples; ties go to the class seen first.
    pub predicted_class: usize,
    pub mean_confidence: f64,
    /// Standard deviation of sample confidences.
    pub epistemic_uncertainty: f64,
    /// Shannon entropy (bits) of the sampled class distribution.
    pub aleatoric_uncertainty: f64,
    /// `sqrt(epistemic^2 + aleatoric^2)`.
    pub total_uncertainty: f64,
    /// 2.5th / 97.5th percentile of sample confidences.
    pub confidence_interval: ConfidenceInterval,
    /// Prediction at the unperturbed point.
    pub clean_prediction: PredictionResult,
    pub samples: Vec<UncertaintySample>,
}

/// Uncertainty summary for one map cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyCell {
    pub x: f64,
    pub y: f64,
    pub predicted_class: usize,
    pub mean_confidence: f64,
    pub epistemic_uncertainty: f64,
    pub aleatoric_uncertainty: f64,
    pub total_uncertainty: f64,
}

impl From<&UncertaintyResult> for UncertaintyCell {
    fn from(result: &UncertaintyResult) -> Self {
        Self {
            x: result.point.x,
            y: result.point.y,
            predicted_class: result.predicted_class,
            mean_confidence: result.mean_confidence,
            epistemic_uncertainty: result.epistemic_uncertainty,
            aleatoric_uncertainty: result.aleatoric_uncertainty,
            total_uncertainty: result.total_uncertainty,
        }
    }
}

/// Grid of uncertainty estimates, row-major with rows along y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyMap {
    pub grid: Vec<Vec<UncertaintyCell>>,
    pub resolution: usize,
    pub bounds: Bounds,
    pub min_total: f64,
    pub max_total: f64,
}

/// Reduce noisy samples to an [`UncertaintyResult`].
pub fn summarize(
    point: Point,
    clean_prediction: PredictionResult,
    samples: Vec<UncertaintySample>,
) -> Result<UncertaintyResult, ToolkitError> {
    if samples.is_empty() {
        return Err(ToolkitError::empty_dataset("no uncertainty samples to summarize"));
    }
    let n = samples.len() as f64;
    let first = samples[0].confidence;
    // Identical samples keep an exact mean so the spread is exactly zero.
    let mean_confidence = if samples.iter().all(|s| s.confidence == first) {
        first
    } else {
        samples.iter().map(|s| s.confidence).sum::<f64>() / n
    };
    let variance = samples
        .iter()
        .map(|s| (s.confidence - mean_confidence).powi(2))
        .sum::<f64>()
        / n;
    let epistemic_uncertainty = variance.sqrt();

    // (class, count) in first-seen order.
    let mut votes: Vec<(usize, usize)> = Vec::new();
    for sample in &samples {
        match votes.iter_mut().find(|(class, _)| *class == sample.predicted_class) {
            Some((_, count)) => *count += 1,
            None => votes.push((sample.predicted_class, 1)),
        }
    }
    let mut predicted_class = votes[0].0;
    let mut best_count = 0;
    for &(class, count) in &votes {
        if count > best_count {
            predicted_class = class;
            best_count = count;
        }
    }
    let aleatoric_uncertainty = votes
        .iter()
        .map(|&(_, count)| {
            let p = count as f64 / n;
            -p * p.log2()
        })
        .sum::<f64>()
        .max(0.0);

    let mut sorted: Vec<f64> = samples.iter().map(|s| s.confidence).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let last = sorted.len() - 1;
    let lower_index = ((0.025 * n).floor() as usize).min(last);
    let upper_index = ((0.975 * n).floor() as usize).min(last);

    Ok(UncertaintyResult {
        point,
        predicted_class,
        mean_confidence,
        epistemic_uncertainty,
        aleatoric_uncertainty,
        total_uncertainty: (epistemic_uncertainty.powi(2) + aleatoric_uncertainty.powi(2)).sqrt(),
        confidence_interval: ConfidenceInterval {
            lower: sorted[lower_index],
            upper: sorted[upper_index],
        },
        clean_prediction,
        samples,
    })
}

/// Estimates predictive uncertainty by noisy re-querying.
#[derive(Debug, Clone, Default)]
pub struct UncertaintyEstimator {
    config: UncertaintyConfig,
}

impl UncertaintyEstimator {
    pub fn new(config: UncertaintyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UncertaintyConfig {
        &self.config
    }

    /// Estimate uncertainty at `point` with one clean and one batched noisy query.
    pub async fn estimate<O, R>(
        &self,
        oracle: &O,
        point: &Point,
        rng: &mut R,
    ) -> Result<UncertaintyResult, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
        R: Rng,
    {
        self.config.validate()?;
        self.estimate_unchecked(oracle, point, rng).await
    }

    /// Estimate every cell of a `resolution x resolution` grid over `bounds`.
    ///
    /// Costs `num_samples * resolution^2` predicted points; keep `num_samples`
    /// low here. `on_progress(done, total)` fires after each cell.
    pub async fn estimate_map<O, R, P>(
        &self,
        oracle: &O,
        resolution: usize,
        bounds: &Bounds,
        rng: &mut R,
        mut on_progress: P,
    ) -> Result<UncertaintyMap, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
        R: Rng,
        P: FnMut(usize, usize),
    {
        self.config.validate()?;
        if resolution == 0 {
            return Err(ToolkitError::invalid_config(
                "uncertainty map resolution must be >= 1",
            ));
        }
        if !bounds.is_valid() {
            return Err(ToolkitError::invalid_config(format!(
                "uncertainty map bounds are empty or non-finite: {bounds:?}"
            )));
        }

        let total = resolution * resolution;
        let mut done = 0;
        let mut min_total = f64::INFINITY;
        let mut max_total = f64::NEG_INFINITY;
        let mut grid = Vec::with_capacity(resolution);
        for row in bounds.cell_centers(resolution) {
            let mut cells = Vec::with_capacity(resolution);
            for (x, y) in row {
                let result = self.estimate_unchecked(oracle, &Point::at(x, y), rng).await?;
                let cell = UncertaintyCell::from(&result);
                min_total = min_total.min(cell.total_uncertainty);
                max_total = max_total.max(cell.total_uncertainty);
                cells.push(cell);
                done += 1;
                on_progress(done, total);
            }
            grid.push(cells);
        }

        tracing::debug!(resolution, min_total, max_total, "Computed uncertainty map");
        Ok(UncertaintyMap {
            grid,
            resolution,
            bounds: *bounds,
            min_total,
            max_total,
        })
    }

    async fn estimate_unchecked<O, R>(
        &self,
        oracle: &O,
        point: &Point,
        rng: &mut R,
    ) -> Result<UncertaintyResult, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
        R: Rng,
    {
        let sigma = self.config.dropout_rate * 0.5;
        let noisy: Vec<Point> = (0..self.config.num_samples)
            .map(|_| {
                let dx = standard_normal(rng) * sigma;
                let dy = standard_normal(rng) * sigma;
                Point::at(point.x + dx, point.y + dy)
            })
            .collect();

        let clean_prediction = predict_one(oracle, point).await?;
        let predictions = predict_all(oracle, &noisy).await?;
        let samples = predictions
            .iter()
            .zip(&noisy)
            .map(|(prediction, p)| UncertaintySample {
                x: p.x,
                y: p.y,
                predicted_class: prediction.predicted_class,
                confidence: prediction.confidence,
            })
            .collect();
        summarize(*point, clean_prediction, samples)
    }
}
