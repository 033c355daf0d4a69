//! # netlens-core: Oracle Contract, Data Model & Configuration
//!
//! Everything the netlens algorithms share: the [`PredictionOracle`] trait they
//! query, the point / prediction / hyperparameter types that cross it, the
//! error types, and the layered [`ToolkitConfig`].
//!
//! The oracle is the only boundary. No algorithm knows how a classifier is
//! implemented; each receives the oracle (or an [`OracleFactory`]) explicitly
//! along with its own random number generator.

pub mod config;
pub mod error;
pub mod oracle;
pub mod rng;
pub mod types;

// Re-exports
pub use config::{
    AdversarialConfig, LimeConfig, NasConfig, SaliencyConfig, SearchStrategy, ToolkitConfig,
    UncertaintyConfig, load_config,
};
pub use error::{OracleError, ToolkitError};
pub use oracle::{FunctionOracle, OracleFactory, PredictionOracle, predict_all, predict_one};
pub use rng::{seeded_rng, standard_normal};
pub use types::{
    Activation, Bounds, ClassDistribution, Hyperparameters, Optimizer, Point, PredictionResult,
    TrainingStats,
};
