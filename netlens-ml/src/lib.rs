//! # netlens-ml: Black-box Interpretability & Architecture Search
//!
//! Model-agnostic algorithms that only ever talk to a
//! [`PredictionOracle`](netlens_core::PredictionOracle):
//!
//! 1. **LIME**: weighted linear surrogates around a single point
//! 2. **Saliency**: finite-difference gradient maps over a region
//! 3. **Adversarial**: fast gradient sign perturbations and batch robustness
//! 4. **Uncertainty**: Monte-Carlo input noise, variance and entropy
//! 5. **NAS**: random, grid and evolutionary architecture search

// Numerics
pub mod linalg;

// Explanations
pub mod lime;
pub mod saliency;

// Robustness
pub mod adversarial;
pub mod uncertainty;

// Search
pub mod nas;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use adversarial::{
    AdversarialAttacker, AdversarialResult, BatchAttackReport, Perturbation, RobustnessMetrics,
};
pub use lime::{FeatureContribution, LimeExplainer, LimeExplanation};
pub use linalg::{WeightedFit, solve_linear_system, weighted_least_squares, weighted_r_squared};
pub use nas::{ArchitectureCandidate, ArchitectureResult, ArchitectureSearch, NasRun};
pub use saliency::{ColorScheme, Rgb, SaliencyCell, SaliencyEstimator, SaliencyMap, color_for};
pub use uncertainty::{
    ConfidenceInterval, UncertaintyCell, UncertaintyEstimator, UncertaintyMap, UncertaintyResult,
    UncertaintySample,
};
