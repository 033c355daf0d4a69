//! Configuration for the toolkit algorithms.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides. Configuration is
//! loaded from the platform config dir (`netlens/config.toml`) and/or
//! `.netlens/config.toml` in the workspace directory.

use crate::error::ToolkitError;
use crate::types::Bounds;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level toolkit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Seed for every random draw; fresh entropy when unset.
    pub seed: Option<u64>,
    /// Region covered by saliency and uncertainty maps.
    pub bounds: Bounds,
    pub lime: LimeConfig,
    pub saliency: SaliencyConfig,
    pub adversarial: AdversarialConfig,
    /// Single-point uncertainty estimation.
    pub uncertainty: UncertaintyConfig,
    /// Per-cell settings for uncertainty maps; keep `num_samples` low.
    pub uncertainty_map: UncertaintyConfig,
    pub nas: NasConfig,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            seed: None,
            bounds: Bounds::default(),
            lime: LimeConfig::default(),
            saliency: SaliencyConfig::default(),
            adversarial: AdversarialConfig::default(),
            uncertainty: UncertaintyConfig::default(),
            uncertainty_map: default_uncertainty_map(),
            nas: NasConfig::default(),
        }
    }
}

/// Local surrogate (LIME) explanation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimeConfig {
    /// Perturbed neighbours sampled around the explained point.
    #[serde(default = "default_lime_samples")]
    pub num_samples: usize,
    /// Half-width of the uniform perturbation box and Gaussian kernel scale.
    #[serde(default = "default_kernel_width")]
    pub kernel_width: f64,
    #[serde(default = "default_feature_names")]
    pub feature_names: [String; 2],
}

impl Default for LimeConfig {
    fn default() -> Self {
        Self {
            num_samples: default_lime_samples(),
            kernel_width: default_kernel_width(),
            feature_names: default_feature_names(),
        }
    }
}

impl LimeConfig {
    pub fn validate(&self) -> Result<(), ToolkitError> {
        if self.num_samples == 0 {
            return Err(ToolkitError::invalid_config("lime.num_samples must be >= 1"));
        }
        if !(self.kernel_width > 0.0 && self.kernel_width.is_finite()) {
            return Err(ToolkitError::invalid_config(format!(
                "lime.kernel_width must be positive, got {}",
                self.kernel_width
            )));
        }
        Ok(())
    }
}

fn default_lime_samples() -> usize {
    100
}

fn default_kernel_width() -> f64 {
    0.75
}

fn default_feature_names() -> [String; 2] {
    ["x".to_string(), "y".to_string()]
}

/// Finite-difference saliency map settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyConfig {
    /// Cells per axis; the map costs `5 * resolution^2` oracle queries.
    #[serde(default = "default_saliency_resolution")]
    pub resolution: usize,
    /// Central-difference step.
    #[serde(default = "default_saliency_epsilon")]
    pub epsilon: f64,
    /// Class whose probability is differentiated; each cell's own prediction when unset.
    #[serde(default)]
    pub target_class: Option<usize>,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            resolution: default_saliency_resolution(),
            epsilon: default_saliency_epsilon(),
            target_class: None,
        }
    }
}

impl SaliencyConfig {
    pub fn validate(&self) -> Result<(), ToolkitError> {
        if self.resolution == 0 {
            return Err(ToolkitError::invalid_config(
                "saliency.resolution must be >= 1",
            ));
        }
        validate_step("saliency.epsilon", self.epsilon)
    }
}

fn default_saliency_resolution() -> usize {
    20
}

fn default_saliency_epsilon() -> f64 {
    0.01
}

/// Fast gradient sign attack settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialConfig {
    /// Size of the sign step.
    #[serde(default = "default_attack_epsilon")]
    pub epsilon: f64,
    /// Finite-difference step used for gradient estimation.
    #[serde(default = "default_gradient_step")]
    pub gradient_step: f64,
    /// Class to steer towards; untargeted when unset.
    #[serde(default)]
    pub target_class: Option<usize>,
    /// Refinement iterations for targeted attacks.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            epsilon: default_attack_epsilon(),
            gradient_step: default_gradient_step(),
            target_class: None,
            max_iterations: default_max_iterations(),
        }
    }
}

impl AdversarialConfig {
    pub fn validate(&self) -> Result<(), ToolkitError> {
        validate_step("adversarial.epsilon", self.epsilon)?;
        validate_step("adversarial.gradient_step", self.gradient_step)
    }
}

fn default_attack_epsilon() -> f64 {
    0.1
}

fn default_gradient_step() -> f64 {
    0.01
}

fn default_max_iterations() -> usize {
    10
}

/// Monte-Carlo uncertainty settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyConfig {
    /// Noisy queries per estimate.
    #[serde(default = "default_uncertainty_samples")]
    pub num_samples: usize,
    /// Input noise standard deviation is `dropout_rate * 0.5`.
    #[serde(default = "default_dropout_rate")]
    pub dropout_rate: f64,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            num_samples: default_uncertainty_samples(),
            dropout_rate: default_dropout_rate(),
        }
    }
}

impl UncertaintyConfig {
    pub fn validate(&self) -> Result<(), ToolkitError> {
        if self.num_samples == 0 {
            return Err(ToolkitError::invalid_config(
                "uncertainty.num_samples must be >= 1",
            ));
        }
        if !(self.dropout_rate >= 0.0 && self.dropout_rate.is_finite()) {
            return Err(ToolkitError::invalid_config(format!(
                "uncertainty.dropout_rate must be non-negative, got {}",
                self.dropout_rate
            )));
        }
        Ok(())
    }
}

fn default_uncertainty_samples() -> usize {
    30
}

fn default_dropout_rate() -> f64 {
    0.2
}

fn default_uncertainty_map() -> UncertaintyConfig {
    UncertaintyConfig {
        num_samples: 10,
        dropout_rate: default_dropout_rate(),
    }
}

/// How architecture candidates are proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    #[default]
    Random,
    Evolutionary,
    Grid,
}

/// Architecture search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NasConfig {
    /// Upper bound on evaluated candidates.
    #[serde(default = "default_num_candidates")]
    pub num_candidates: usize,
    #[serde(default = "default_epochs_per_candidate")]
    pub epochs_per_candidate: usize,
    #[serde(default)]
    pub strategy: SearchStrategy,
    /// Evolutionary population size.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Per-gene mutation probability.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
}

impl Default for NasConfig {
    fn default() -> Self {
        Self {
            num_candidates: default_num_candidates(),
            epochs_per_candidate: default_epochs_per_candidate(),
            strategy: SearchStrategy::default(),
            population_size: default_population_size(),
            mutation_rate: default_mutation_rate(),
        }
    }
}

impl NasConfig {
    pub fn validate(&self) -> Result<(), ToolkitError> {
        if self.num_candidates == 0 {
            return Err(ToolkitError::invalid_config("nas.num_candidates must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ToolkitError::invalid_config(format!(
                "nas.mutation_rate must be within [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if self.strategy == SearchStrategy::Evolutionary && self.population_size < 2 {
            return Err(ToolkitError::invalid_config(
                "nas.population_size must be >= 2 for evolutionary search",
            ));
        }
        Ok(())
    }
}

fn default_num_candidates() -> usize {
    20
}

fn default_epochs_per_candidate() -> usize {
    50
}

fn default_population_size() -> usize {
    6
}

fn default_mutation_rate() -> f64 {
    0.3
}

fn validate_step(name: &str, value: f64) -> Result<(), ToolkitError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ToolkitError::invalid_config(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `NETLENS_`)
/// 3. Workspace-local config (`.netlens/config.toml`)
/// 4. User config (`<config dir>/netlens/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ToolkitConfig>,
) -> Result<ToolkitConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ToolkitConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "netlens", "netlens") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            tracing::debug!(path = %user_config.display(), "Merging user config");
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".netlens").join("config.toml");
        if ws_config.exists() {
            tracing::debug!(path = %ws_config.display(), "Merging workspace config");
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // NETLENS_SEED, NETLENS_LIME__NUM_SAMPLES, NETLENS_NAS__STRATEGY, ...
    figment = figment.merge(Env::prefixed("NETLENS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
