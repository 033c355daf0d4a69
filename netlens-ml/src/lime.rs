//! Local surrogate explanations (LIME).
//!
//! Explains one prediction by sampling a neighbourhood around the point,
//! querying the oracle on it in a single batch, and fitting a
//! distance-weighted linear model to the probability of the originally
//! predicted class.

use crate::linalg::weighted_least_squares;
use netlens_core::{
    LimeConfig, Point, PredictionOracle, ToolkitError, predict_all, predict_one,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Influence of one input feature on the local surrogate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature_name: String,
    pub feature_value: f64,
    /// Surrogate coefficient for this feature.
    pub weight: f64,
    /// `weight * feature_value`.
    pub contribution: f64,
}

/// Result of explaining a single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimeExplanation {
    pub point: Point,
    /// Prediction of the oracle itself, not the surrogate.
    pub predicted_class: usize,
    pub confidence: f64,
    pub contributions: Vec<FeatureContribution>,
    pub intercept: f64,
    /// Weighted R^2 of the surrogate; at most 1, negative when it fits worse than the mean.
    pub local_fidelity: f64,
    pub num_samples: usize,
    pub kernel_width: f64,
}

impl LimeExplanation {
    /// Contributions ordered by absolute size, largest first.
    pub fn sorted_contributions(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<&FeatureContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    pub fn top_feature(&self) -> Option<&FeatureContribution> {
        self.sorted_contributions().into_iter().next()
    }

    /// Surrogate output at the explained point.
    pub fn surrogate_prediction(&self) -> f64 {
        self.intercept
            + self
                .contributions
                .iter()
                .map(|c| c.contribution)
                .sum::<f64>()
    }
}

/// Fits local linear surrogates against an oracle.
#[derive(Debug, Clone, Default)]
pub struct LimeExplainer {
    config: LimeConfig,
}

impl LimeExplainer {
    pub fn new(config: LimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LimeConfig {
        &self.config
    }

    /// Explain the oracle's prediction at `point`.
    ///
    /// Issues exactly two `predict` calls: one for the point, one batch for the
    /// whole neighbourhood.
    pub async fn explain<O, R>(
        &self,
        oracle: &O,
        point: &Point,
        rng: &mut R,
    ) -> Result<LimeExplanation, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
        R: Rng,
    {
        self.config.validate()?;
        let width = self.config.kernel_width;

        let original = predict_one(oracle, point).await?;
        let target_class = original.predicted_class;

        let neighbourhood: Vec<Point> = (0..self.config.num_samples)
            .map(|_| {
                point.offset(
                    rng.gen_range(-width..width),
                    rng.gen_range(-width..width),
                )
            })
            .collect();
        let predictions = predict_all(oracle, &neighbourhood).await?;

        let mut design = Vec::with_capacity(neighbourhood.len());
        let mut targets = Vec::with_capacity(neighbourhood.len());
        let mut weights = Vec::with_capacity(neighbourhood.len());
        for (sample, prediction) in neighbourhood.iter().zip(&predictions) {
            let d = sample.distance_to(point);
            weights.push((-(d / width).powi(2)).exp());
            targets.push(prediction.probability_of(target_class));
            design.push(vec![1.0, sample.x, sample.y]);
        }

        let fit = weighted_least_squares(&design, &targets, &weights);
        tracing::debug!(
            samples = neighbourhood.len(),
            coefficients = ?fit.coefficients,
            fidelity = fit.r_squared,
            "Fitted local surrogate"
        );

        let contributions = self
            .config
            .feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let weight = fit.coefficients[i + 1];
                let feature_value = point.feature(i);
                FeatureContribution {
                    feature_name: name.clone(),
                    feature_value,
                    weight,
                    contribution: weight * feature_value,
                }
            })
            .collect();

        Ok(LimeExplanation {
            point: *point,
            predicted_class: target_class,
            confidence: original.confidence,
            contributions,
            intercept: fit.coefficients[0],
            local_fidelity: fit.r_squared,
            num_samples: self.config.num_samples,
            kernel_width: width,
        })
    }
}
