//! Fast gradient sign (FGSM) perturbations against a black-box oracle.
//!
//! Gradients are estimated by central differences of the loss
//! `1 - P(class)` with four probe points per estimate. Untargeted attacks take a
//! single signed step up the loss of the original class; targeted attacks step
//! down the loss of the target class and then refine with decaying steps until
//! the oracle flips or the iteration budget runs out.

use netlens_core::{
    AdversarialConfig, Point, PredictionOracle, PredictionResult, ToolkitError, predict_all,
    predict_one,
};
use serde::{Deserialize, Serialize};

/// Displacement applied to the original point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Perturbation {
    pub dx: f64,
    pub dy: f64,
}

impl Perturbation {
    pub fn magnitude(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// Outcome of attacking one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialResult {
    pub original_point: Point,
    pub adversarial_point: Point,
    pub original_prediction: PredictionResult,
    pub adversarial_prediction: PredictionResult,
    pub perturbation: Perturbation,
    pub epsilon: f64,
    pub target_class: Option<usize>,
    /// Refinement steps taken after the initial sign step.
    pub iterations: usize,
    pub success: bool,
}

/// Aggregate robustness over a batch of attacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustnessMetrics {
    pub total_attacks: usize,
    pub successful_attacks: usize,
    pub attack_success_rate: f64,
    /// Mean Euclidean size of the applied perturbations.
    pub average_perturbation: f64,
    /// `1 - success_rate / (1 + average_perturbation)`, within `(0, 1]`.
    pub robustness_score: f64,
}

impl RobustnessMetrics {
    pub fn from_results(results: &[AdversarialResult]) -> Self {
        let total_attacks = results.len();
        if total_attacks == 0 {
            return Self {
                total_attacks: 0,
                successful_attacks: 0,
                attack_success_rate: 0.0,
                average_perturbation: 0.0,
                robustness_score: 1.0,
            };
        }
        let successful_attacks = results.iter().filter(|r| r.success).count();
        let attack_success_rate = successful_attacks as f64 / total_attacks as f64;
        let average_perturbation = results
            .iter()
            .map(|r| r.perturbation.magnitude())
            .sum::<f64>()
            / total_attacks as f64;
        Self {
            total_attacks,
            successful_attacks,
            attack_success_rate,
            average_perturbation,
            robustness_score: 1.0 - attack_success_rate * (1.0 / (1.0 + average_perturbation)),
        }
    }
}

/// Results of [`AdversarialAttacker::attack_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAttackReport {
    pub results: Vec<AdversarialResult>,
    /// Input indices whose attack failed with an oracle error.
    pub failed_indices: Vec<usize>,
    pub metrics: RobustnessMetrics,
}

/// Sign that maps 0 to 0.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Runs FGSM attacks against an oracle.
#[derive(Debug, Clone, Default)]
pub struct AdversarialAttacker {
    config: AdversarialConfig,
}

impl AdversarialAttacker {
    pub fn new(config: AdversarialConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdversarialConfig {
        &self.config
    }

    /// Attack a single point. Oracle failures propagate.
    pub async fn attack<O>(&self, oracle: &O, point: &Point) -> Result<AdversarialResult, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
    {
        self.config.validate()?;
        let epsilon = self.config.epsilon;
        let original_prediction = predict_one(oracle, point).await?;

        let (adversarial_point, adversarial_prediction, iterations, success) =
            match self.config.target_class {
                None => {
                    let class = original_prediction.predicted_class;
                    let (gx, gy) = self.loss_gradient(oracle, point, class).await?;
                    let adversarial = point.offset(epsilon * sign(gx), epsilon * sign(gy));
                    let prediction = predict_one(oracle, &adversarial).await?;
                    let success = prediction.predicted_class != class;
                    (adversarial, prediction, 0, success)
                }
                Some(target) => {
                    let (gx, gy) = self.loss_gradient(oracle, point, target).await?;
                    let mut adversarial =
                        point.offset(-epsilon * sign(gx), -epsilon * sign(gy));
                    let mut prediction = predict_one(oracle, &adversarial).await?;
                    let mut iterations = 0;
                    while iterations < self.config.max_iterations
                        && prediction.predicted_class != target
                    {
                        let (gx, gy) = self.loss_gradient(oracle, &adversarial, target).await?;
                        let step = epsilon / (iterations + 2) as f64;
                        adversarial = adversarial.offset(-step * sign(gx), -step * sign(gy));
                        prediction = predict_one(oracle, &adversarial).await?;
                        iterations += 1;
                    }
                    let success = prediction.predicted_class == target;
                    (adversarial, prediction, iterations, success)
                }
            };

        tracing::debug!(
            x = point.x,
            y = point.y,
            success,
            iterations,
            "FGSM attack finished"
        );

        Ok(AdversarialResult {
            original_point: *point,
            adversarial_point,
            original_prediction,
            adversarial_prediction,
            perturbation: Perturbation {
                dx: adversarial_point.x - point.x,
                dy: adversarial_point.y - point.y,
            },
            epsilon,
            target_class: self.config.target_class,
            iterations,
            success,
        })
    }

    /// Attack every point independently.
    ///
    /// A point whose attack fails is logged, recorded in `failed_indices`, and
    /// skipped. `on_progress(done, total)` fires after every point either way.
    pub async fn attack_batch<O, P>(
        &self,
        oracle: &O,
        points: &[Point],
        mut on_progress: P,
    ) -> Result<BatchAttackReport, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
        P: FnMut(usize, usize),
    {
        self.config.validate()?;
        let mut results = Vec::with_capacity(points.len());
        let mut failed_indices = Vec::new();

        for (index, point) in points.iter().enumerate() {
            match self.attack(oracle, point).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(index, x = point.x, y = point.y, error = %e, "Attack failed, skipping point");
                    failed_indices.push(index);
                }
            }
            on_progress(index + 1, points.len());
        }

        let metrics = RobustnessMetrics::from_results(&results);
        tracing::info!(
            attacked = metrics.total_attacks,
            failed = failed_indices.len(),
            success_rate = metrics.attack_success_rate,
            robustness = metrics.robustness_score,
            "Batch attack complete"
        );
        Ok(BatchAttackReport {
            results,
            failed_indices,
            metrics,
        })
    }

    /// Central-difference gradient of `1 - P(class)` at `point`.
    async fn loss_gradient<O>(
        &self,
        oracle: &O,
        point: &Point,
        class: usize,
    ) -> Result<(f64, f64), ToolkitError>
    where
        O: PredictionOracle + ?Sized,
    {
        let h = self.config.gradient_step;
        let probes = [
            point.offset(h, 0.0),
            point.offset(-h, 0.0),
            point.offset(0.0, h),
            point.offset(0.0, -h),
        ];
        let predictions = predict_all(oracle, &probes).await?;
        let loss = |i: usize| 1.0 - predictions[i].probability_of(class);
        Ok((
            (loss(0) - loss(1)) / (2.0 * h),
            (loss(2) - loss(3)) / (2.0 * h),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ConstantOracle, EmptyOracle, LogisticOracle, PoisonedOracle};

    fn attacker(epsilon: f64, target_class: Option<usize>) -> AdversarialAttacker {
        AdversarialAttacker::new(AdversarialConfig {
            epsilon,
            target_class,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_untargeted_flip_near_boundary() {
        let oracle = LogisticOracle::new(1.0, 0.0, 0.0);
        let result = attacker(0.1, None)
            .attack(&oracle, &Point::at(0.05, 0.0))
            .await
            .unwrap();
        assert_eq!(result.original_prediction.predicted_class, 1);
        assert_eq!(result.adversarial_prediction.predicted_class, 0);
        assert!(result.success);
        assert!((result.perturbation.dx + 0.1).abs() < 1e-12);
        assert_eq!(result.perturbation.dy, 0.0);
        assert_eq!(result.iterations, 0);
    }

    #[tokio::test]
    async fn test_untargeted_far_point_survives() {
        let oracle = LogisticOracle::new(1.0, 0.0, 0.0);
        let result = attacker(0.1, None)
            .attack(&oracle, &Point::at(3.0, 0.0))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.adversarial_point.x < 3.0);
    }

    #[tokio::test]
    async fn test_larger_epsilon_never_shrinks_perturbation() {
        let oracle = LogisticOracle::new(1.0, -0.5, 0.2);
        let point = Point::at(1.0, 1.0);
        let mut last = 0.0;
        for epsilon in [0.05, 0.1, 0.5, 1.0, 2.0] {
            let result = attacker(epsilon, None).attack(&oracle, &point).await.unwrap();
            let magnitude = result.perturbation.magnitude();
            assert!(magnitude >= last);
            last = magnitude;
        }
        let big = attacker(5.0, None).attack(&oracle, &point).await.unwrap();
        assert!(big.success);
    }

    #[tokio::test]
    async fn test_targeted_refines_until_flip() {
        let oracle = LogisticOracle::new(1.0, 0.0, 0.0);
        let result = attacker(0.5, Some(0))
            .attack(&oracle, &Point::at(1.0, 0.0))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.adversarial_prediction.predicted_class, 0);
        assert_eq!(result.iterations, 3);
        assert!(result.adversarial_point.x < 0.0);
        assert_eq!(result.target_class, Some(0));
    }

    #[tokio::test]
    async fn test_targeted_respects_iteration_budget() {
        let oracle = LogisticOracle::new(1.0, 0.0, 0.0);
        let config = AdversarialConfig {
            epsilon: 0.1,
            target_class: Some(0),
            max_iterations: 2,
            ..Default::default()
        };
        let result = AdversarialAttacker::new(config)
            .attack(&oracle, &Point::at(5.0, 0.0))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.iterations, 2);
    }

    #[tokio::test]
    async fn test_flat_oracle_has_zero_perturbation() {
        let oracle = ConstantOracle::binary(1, 0.7);
        let result = attacker(0.3, None)
            .attack(&oracle, &Point::at(0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(result.perturbation, Perturbation::default());
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_missing_prediction() {
        let err = attacker(0.1, None)
            .attack(&EmptyOracle, &Point::at(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolkitError::MissingPrediction { .. }));
    }

    #[tokio::test]
    async fn test_batch_skips_failures() {
        let oracle = PoisonedOracle {
            inner: LogisticOracle::new(1.0, 0.0, 0.0),
            bad_x: 10.0,
            poison: 0.5,
        };
        let points = [
            Point::at(0.05, 0.0),
            Point::at(10.0, 0.0),
            Point::at(3.0, 0.0),
        ];
        let mut progress = Vec::new();
        let report = attacker(0.1, None)
            .attack_batch(&oracle, &points, |done, total| progress.push((done, total)))
            .await
            .unwrap();

        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.failed_indices, vec![1]);
        assert_eq!(report.metrics.total_attacks, 2);
        assert_eq!(report.metrics.successful_attacks, 1);
        assert!((report.metrics.attack_success_rate - 0.5).abs() < 1e-12);
        assert!((report.metrics.average_perturbation - 0.1).abs() < 1e-12);
        assert!((report.metrics.robustness_score - (1.0 - 0.5 / 1.1)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = RobustnessMetrics::from_results(&[]);
        assert_eq!(metrics.robustness_score, 1.0);
        assert_eq!(metrics.attack_success_rate, 0.0);
    }

    #[test]
    fn test_sign_of_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(2.0), 1.0);
        assert_eq!(sign(-1e-300), -1.0);
    }
}
