//! Finite-difference saliency maps.
//!
//! Every cell of a `resolution x resolution` grid gets one batched oracle
//! query of five points (centre and `±epsilon` along each axis), from which a
//! central-difference gradient of the target-class probability is formed.
//! Total cost is `5 * resolution^2` predicted points.

pub mod colormap;

pub use colormap::{ColorScheme, Rgb, color_for};

use netlens_core::{Bounds, Point, PredictionOracle, SaliencyConfig, ToolkitError, predict_all};
use serde::{Deserialize, Serialize};

/// Sensitivity of the oracle at one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaliencyCell {
    pub x: f64,
    pub y: f64,
    /// Gradient magnitude, never negative.
    pub saliency: f64,
    pub gradient_x: f64,
    pub gradient_y: f64,
}

/// A full saliency grid, row-major with rows along y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyMap {
    pub grid: Vec<Vec<SaliencyCell>>,
    pub min_saliency: f64,
    pub max_saliency: f64,
    pub resolution: usize,
    pub bounds: Bounds,
}

impl SaliencyMap {
    /// Saliency of `cell` rescaled to `[0, 1]` by the map's range.
    pub fn normalized(&self, cell: &SaliencyCell) -> f64 {
        let range = self.max_saliency - self.min_saliency;
        if range <= 0.0 {
            return 0.0;
        }
        ((cell.saliency - self.min_saliency) / range).clamp(0.0, 1.0)
    }

    pub fn color_of(&self, cell: &SaliencyCell, scheme: ColorScheme) -> Rgb {
        color_for(self.normalized(cell), scheme)
    }

    pub fn cells(&self) -> impl Iterator<Item = &SaliencyCell> {
        self.grid.iter().flatten()
    }

    /// The `k` most sensitive cells, highest first.
    pub fn hotspots(&self, k: usize) -> Vec<SaliencyCell> {
        let mut cells: Vec<SaliencyCell> = self.cells().copied().collect();
        cells.sort_by(|a, b| {
            b.saliency
                .partial_cmp(&a.saliency)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        cells.truncate(k);
        cells
    }
}

/// Computes saliency maps against an oracle.
#[derive(Debug, Clone, Default)]
pub struct SaliencyEstimator {
    config: SaliencyConfig,
}

impl SaliencyEstimator {
    pub fn new(config: SaliencyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SaliencyConfig {
        &self.config
    }

    /// Saliency at a single position.
    pub async fn cell_at<O>(&self, oracle: &O, x: f64, y: f64) -> Result<SaliencyCell, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
    {
        self.config.validate()?;
        self.probe(oracle, x, y).await
    }

    /// Compute the map over `bounds`.
    pub async fn compute_map<O>(&self, oracle: &O, bounds: &Bounds) -> Result<SaliencyMap, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
    {
        self.config.validate()?;
        if !bounds.is_valid() {
            return Err(ToolkitError::invalid_config(format!(
                "saliency bounds are empty or non-finite: {bounds:?}"
            )));
        }

        let mut min_saliency = f64::INFINITY;
        let mut max_saliency = f64::NEG_INFINITY;
        let mut grid = Vec::with_capacity(self.config.resolution);
        for row in bounds.cell_centers(self.config.resolution) {
            let mut cells = Vec::with_capacity(row.len());
            for (x, y) in row {
                let cell = self.probe(oracle, x, y).await?;
                min_saliency = min_saliency.min(cell.saliency);
                max_saliency = max_saliency.max(cell.saliency);
                cells.push(cell);
            }
            grid.push(cells);
        }

        tracing::debug!(
            resolution = self.config.resolution,
            min_saliency,
            max_saliency,
            "Computed saliency map"
        );

        Ok(SaliencyMap {
            grid,
            min_saliency,
            max_saliency,
            resolution: self.config.resolution,
            bounds: *bounds,
        })
    }

    async fn probe<O>(&self, oracle: &O, x: f64, y: f64) -> Result<SaliencyCell, ToolkitError>
    where
        O: PredictionOracle + ?Sized,
    {
        let eps = self.config.epsilon;
        let probes = [
            Point::at(x, y),
            Point::at(x + eps, y),
            Point::at(x - eps, y),
            Point::at(x, y + eps),
            Point::at(x, y - eps),
        ];
        let predictions = predict_all(oracle, &probes).await?;

        let target = self
            .config
            .target_class
            .unwrap_or(predictions[0].predicted_class);
        let f = |i: usize| predictions[i].probability_of(target);

        let gradient_x = (f(1) - f(2)) / (2.0 * eps);
        let gradient_y = (f(3) - f(4)) / (2.0 * eps);
        Ok(SaliencyCell {
            x,
            y,
            saliency: (gradient_x * gradient_x + gradient_y * gradient_y).sqrt(),
            gradient_x,
            gradient_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ConstantOracle, EmptyOracle, LogisticOracle};

    #[tokio::test]
    async fn test_grid_shape_and_range() {
        let oracle = LogisticOracle::new(2.0, -1.0, 0.0);
        let estimator = SaliencyEstimator::new(SaliencyConfig {
            resolution: 4,
            ..Default::default()
        });
        let map = estimator
            .compute_map(&oracle, &Bounds::square(2.0))
            .await
            .unwrap();
        assert_eq!(map.grid.len(), 4);
        assert!(map.grid.iter().all(|row| row.len() == 4));
        assert!(map.min_saliency >= 0.0);
        assert!(map.max_saliency >= map.min_saliency);
        assert_eq!(map.resolution, 4);
        assert!((map.grid[0][0].x + 1.5).abs() < 1e-12);
        assert!((map.grid[3][0].y - 1.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_logistic_gradient_matches_analytic() {
        let oracle = LogisticOracle::new(2.0, -1.0, 0.5);
        let estimator = SaliencyEstimator::new(SaliencyConfig {
            resolution: 1,
            epsilon: 1e-4,
            target_class: Some(1),
        });
        let cell = estimator.cell_at(&oracle, 0.3, -0.2).await.unwrap();
        let p = oracle.probability(0.3, -0.2);
        let slope = p * (1.0 - p);
        assert!((cell.gradient_x - 2.0 * slope).abs() < 1e-6);
        assert!((cell.gradient_y + slope).abs() < 1e-6);
        assert!((cell.saliency - slope * 5f64.sqrt()).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_untargeted_gradient_follows_predicted_class() {
        // Predicted class 0 here, so the gradient of P(0) points the other way.
        let oracle = LogisticOracle::new(2.0, 0.0, 0.0);
        let estimator = SaliencyEstimator::new(SaliencyConfig {
            epsilon: 1e-4,
            ..Default::default()
        });
        let cell = estimator.cell_at(&oracle, -1.0, 0.0).await.unwrap();
        assert!(cell.gradient_x < 0.0);
    }

    #[tokio::test]
    async fn test_constant_oracle_has_zero_saliency() {
        let oracle = ConstantOracle::binary(1, 0.9);
        let estimator = SaliencyEstimator::new(SaliencyConfig {
            resolution: 3,
            ..Default::default()
        });
        let map = estimator
            .compute_map(&oracle, &Bounds::square(1.0))
            .await
            .unwrap();
        assert_eq!(oracle.calls(), 9);
        assert_eq!(map.max_saliency, 0.0);
        assert_eq!(map.normalized(&map.grid[1][1]), 0.0);
        assert_eq!(map.hotspots(2).len(), 2);
    }

    #[tokio::test]
    async fn test_normalized_and_hotspots() {
        let oracle = LogisticOracle::new(3.0, 0.0, 0.0);
        let estimator = SaliencyEstimator::new(SaliencyConfig {
            resolution: 5,
            ..Default::default()
        });
        let map = estimator
            .compute_map(&oracle, &Bounds::square(2.5))
            .await
            .unwrap();
        let top = map.hotspots(1)[0];
        // Steepest where the boundary x = 0 crosses the middle column.
        assert!(top.x.abs() < 1e-12);
        assert_eq!(map.normalized(&top), 1.0);
        assert!(map.cells().all(|c| (0.0..=1.0).contains(&map.normalized(c))));
    }

    #[tokio::test]
    async fn test_errors() {
        let estimator = SaliencyEstimator::default();
        let err = estimator.cell_at(&EmptyOracle, 0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, ToolkitError::MissingPrediction { .. }));
        let err = estimator
            .compute_map(&EmptyOracle, &Bounds::new(1.0, 0.0, 0.0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolkitError::InvalidConfig(_)));
    }
}
