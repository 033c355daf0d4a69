//! End-to-end scenarios against closure-backed oracles.

use netlens_core::{
    AdversarialConfig, Bounds, FunctionOracle, LimeConfig, NasConfig, Point, PredictionResult,
    SaliencyConfig, SearchStrategy, UncertaintyConfig, seeded_rng,
};
use netlens_ml::{
    AdversarialAttacker, ArchitectureSearch, LimeExplainer, SaliencyEstimator,
    UncertaintyEstimator,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn always_class_one(x: f64, y: f64) -> PredictionResult {
    PredictionResult::from_probabilities(x, y, vec![0.2, 0.8])
}

fn steep_half_plane(x: f64, y: f64) -> PredictionResult {
    PredictionResult::from_sigmoid(x, y, 1.0 / (1.0 + (-4.0 * x).exp()))
}

fn circle(x: f64, y: f64) -> PredictionResult {
    let r = (x * x + y * y).sqrt();
    PredictionResult::from_sigmoid(x, y, 1.0 / (1.0 + (2.0 * (r - 2.0)).exp()))
}

#[tokio::test]
async fn lime_on_constant_oracle() {
    let oracle = FunctionOracle::new(always_class_one);
    let explainer = LimeExplainer::new(LimeConfig {
        num_samples: 100,
        kernel_width: 0.75,
        ..Default::default()
    });
    let explanation = explainer
        .explain(&oracle, &Point::at(0.5, 0.5), &mut seeded_rng(Some(42)))
        .await
        .unwrap();

    assert_eq!(explanation.predicted_class, 1);
    assert!((explanation.confidence - 0.8).abs() < 1e-12);
    let names: Vec<&str> = explanation
        .contributions
        .iter()
        .map(|c| c.feature_name.as_str())
        .collect();
    assert_eq!(names, vec!["x", "y"]);
    assert!((0.0..=1.0).contains(&explanation.local_fidelity));
    assert!((explanation.surrogate_prediction() - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn lime_is_reproducible_with_a_seed() {
    let oracle = FunctionOracle::new(circle);
    let explainer = LimeExplainer::default();
    let point = Point::at(1.5, -0.5);
    let a = explainer
        .explain(&oracle, &point, &mut seeded_rng(Some(9)))
        .await
        .unwrap();
    let b = explainer
        .explain(&oracle, &point, &mut seeded_rng(Some(9)))
        .await
        .unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn uncertainty_on_fixed_oracle_is_zero() {
    let oracle = FunctionOracle::new(always_class_one);
    let estimator = UncertaintyEstimator::new(UncertaintyConfig::default());
    let result = estimator
        .estimate(&oracle, &Point::at(-1.0, 2.0), &mut seeded_rng(Some(1)))
        .await
        .unwrap();
    assert_eq!(result.epistemic_uncertainty, 0.0);
    assert_eq!(result.aleatoric_uncertainty, 0.0);
    assert_eq!(result.total_uncertainty, 0.0);
    assert_eq!(result.samples.len(), 30);
}

#[tokio::test]
async fn uncertainty_peaks_on_the_boundary() {
    let oracle = FunctionOracle::new(steep_half_plane);
    let estimator = UncertaintyEstimator::new(UncertaintyConfig {
        num_samples: 200,
        dropout_rate: 0.4,
    });
    let mut rng = seeded_rng(Some(5));
    let on_boundary = estimator
        .estimate(&oracle, &Point::at(0.0, 0.0), &mut rng)
        .await
        .unwrap();
    let far_away = estimator
        .estimate(&oracle, &Point::at(5.0, 0.0), &mut rng)
        .await
        .unwrap();
    assert!(on_boundary.aleatoric_uncertainty > 0.5);
    assert_eq!(far_away.aleatoric_uncertainty, 0.0);
    assert!(on_boundary.total_uncertainty > far_away.total_uncertainty);
}

#[tokio::test]
async fn saliency_map_of_circle() {
    let oracle = FunctionOracle::new(circle);
    let estimator = SaliencyEstimator::new(SaliencyConfig {
        resolution: 6,
        ..Default::default()
    });
    let map = estimator
        .compute_map(&oracle, &Bounds::default())
        .await
        .unwrap();
    assert_eq!(map.grid.len(), 6);
    assert!(map.grid.iter().all(|row| row.len() == 6));
    assert!(map.max_saliency >= map.min_saliency);
    assert!(map.min_saliency >= 0.0);
    // Corners sit far outside the ring, where the sigmoid is flat.
    let corner = map.grid[0][0];
    assert!(map.normalized(&corner) < 0.1);
}

#[tokio::test]
async fn untargeted_attack_flips_near_boundary() {
    let oracle = FunctionOracle::new(steep_half_plane);
    let attacker = AdversarialAttacker::new(AdversarialConfig::default());
    let result = attacker.attack(&oracle, &Point::at(0.05, 0.0)).await.unwrap();
    assert_eq!(result.original_prediction.predicted_class, 1);
    assert!(result.success);
    assert!((result.adversarial_point.x + 0.05).abs() < 1e-12);
    assert_eq!(result.perturbation.dy, 0.0);
}

#[tokio::test]
async fn batch_robustness_of_far_points() {
    let oracle = FunctionOracle::new(steep_half_plane);
    let attacker = AdversarialAttacker::new(AdversarialConfig::default());
    let points = [Point::at(4.0, 0.0), Point::at(-4.0, 1.0)];
    let mut ticks = 0;
    let report = attacker
        .attack_batch(&oracle, &points, |_, _| ticks += 1)
        .await
        .unwrap();
    assert_eq!(ticks, 2);
    assert!(report.failed_indices.is_empty());
    assert_eq!(report.metrics.successful_attacks, 0);
    assert_eq!(report.metrics.robustness_score, 1.0);

    let empty = attacker.attack_batch(&oracle, &[], |_, _| {}).await.unwrap();
    assert_eq!(empty.metrics.total_attacks, 0);
    assert_eq!(empty.metrics.robustness_score, 1.0);
}

#[tokio::test]
async fn grid_search_covers_the_enumeration() {
    let factory = || FunctionOracle::new(steep_half_plane);
    let train = vec![Point::new(1.0, 0.0, 1), Point::new(-1.0, 0.0, 0)];
    let validation = vec![Point::new(2.0, 0.0, 1).validation()];
    let search = ArchitectureSearch::new(NasConfig {
        num_candidates: 30,
        epochs_per_candidate: 2,
        strategy: SearchStrategy::Grid,
        ..Default::default()
    });
    let run = search
        .search(&factory, &train, &validation, &mut seeded_rng(None), |_, _, _| {})
        .await
        .unwrap();

    assert_eq!(run.history.len(), 30);
    let triples: HashSet<String> = run
        .history
        .iter()
        .map(|r| {
            format!(
                "{:?} {} {}",
                r.candidate.layers(),
                r.candidate.learning_rate(),
                r.candidate.activation().as_str()
            )
        })
        .collect();
    assert_eq!(triples.len(), 30);
    assert_eq!(run.best.accuracy, 1.0);
    assert_eq!(run.best, run.history[0]);
}

#[tokio::test]
async fn search_run_serializes() {
    let factory = || FunctionOracle::new(circle);
    let train = vec![Point::new(0.0, 0.0, 1), Point::new(4.0, 4.0, 0)];
    let search = ArchitectureSearch::new(NasConfig {
        num_candidates: 3,
        epochs_per_candidate: 1,
        ..Default::default()
    });
    let run = search
        .search(&factory, &train, &train, &mut seeded_rng(Some(11)), |_, _, _| {})
        .await
        .unwrap();
    let json = serde_json::to_value(&run).unwrap();
    assert_eq!(json["history"].as_array().unwrap().len(), 3);
    assert_eq!(json["config"]["strategy"], "random");
    assert!(json["id"].as_str().unwrap().len() == 36);
}
