//! Subcommand handlers.

use crate::demo::{self, DatasetKind, DemoModel};
use crate::{Commands, ConfigAction, ModelArgs, SchemeArg};
use netlens_core::{
    Hyperparameters, Point, PredictionOracle, SearchStrategy, ToolkitConfig, load_config,
    seeded_rng,
};
use netlens_ml::{
    AdversarialAttacker, ArchitectureResult, ArchitectureSearch, ColorScheme, LimeExplainer,
    NasRun, SaliencyCell, SaliencyEstimator, SaliencyMap, UncertaintyEstimator,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;

/// Points generated for `--model mlp` training.
const MLP_TRAINING_POINTS: usize = 200;
const MLP_TRAINING_NOISE: f64 = 0.1;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace),
        other => run_toolkit(other, workspace, seed).await,
    }
}

async fn run_toolkit(command: Commands, workspace: &Path, seed: Option<u64>) -> anyhow::Result<()> {
    let mut config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if seed.is_some() {
        config.seed = seed;
    }
    let mut rng = seeded_rng(config.seed);

    match command {
        Commands::Explain {
            x,
            y,
            model,
            samples,
            kernel_width,
        } => {
            if let Some(samples) = samples {
                config.lime.num_samples = samples;
            }
            if let Some(width) = kernel_width {
                config.lime.kernel_width = width;
            }
            let oracle = build_oracle(&model, &mut rng).await?;
            let explanation = LimeExplainer::new(config.lime)
                .explain(oracle.as_ref(), &Point::at(x, y), &mut rng)
                .await?;
            print_json(&explanation)
        }
        Commands::Saliency {
            model,
            resolution,
            target_class,
            scheme,
            top,
        } => {
            if let Some(resolution) = resolution {
                config.saliency.resolution = resolution;
            }
            if target_class.is_some() {
                config.saliency.target_class = target_class;
            }
            let oracle = build_oracle(&model, &mut rng).await?;
            let map = SaliencyEstimator::new(config.saliency)
                .compute_map(oracle.as_ref(), &config.bounds)
                .await?;
            print_json(&SaliencyReport::new(map, scheme.into(), top))
        }
        Commands::Attack {
            x,
            y,
            model,
            epsilon,
            target_class,
        } => {
            if let Some(epsilon) = epsilon {
                config.adversarial.epsilon = epsilon;
            }
            if target_class.is_some() {
                config.adversarial.target_class = target_class;
            }
            let oracle = build_oracle(&model, &mut rng).await?;
            let result = AdversarialAttacker::new(config.adversarial)
                .attack(oracle.as_ref(), &Point::at(x, y))
                .await?;
            print_json(&result)
        }
        Commands::AttackBatch {
            model,
            count,
            epsilon,
        } => {
            if let Some(epsilon) = epsilon {
                config.adversarial.epsilon = epsilon;
            }
            let oracle = build_oracle(&model, &mut rng).await?;
            let points = demo::datasets::generate(model.dataset, count, 0.0, &mut rng);
            let report = AdversarialAttacker::new(config.adversarial)
                .attack_batch(oracle.as_ref(), &points, |done, total| {
                    tracing::debug!(done, total, "Attacked point");
                })
                .await?;
            print_json(&report)
        }
        Commands::Uncertainty {
            x,
            y,
            model,
            samples,
            dropout,
        } => {
            if let Some(samples) = samples {
                config.uncertainty.num_samples = samples;
            }
            if let Some(dropout) = dropout {
                config.uncertainty.dropout_rate = dropout;
            }
            let oracle = build_oracle(&model, &mut rng).await?;
            let result = UncertaintyEstimator::new(config.uncertainty)
                .estimate(oracle.as_ref(), &Point::at(x, y), &mut rng)
                .await?;
            print_json(&result)
        }
        Commands::UncertaintyMap {
            model,
            resolution,
            samples,
        } => {
            if let Some(samples) = samples {
                config.uncertainty_map.num_samples = samples;
            }
            let oracle = build_oracle(&model, &mut rng).await?;
            let map = UncertaintyEstimator::new(config.uncertainty_map)
                .estimate_map(
                    oracle.as_ref(),
                    resolution,
                    &config.bounds,
                    &mut rng,
                    |done, total| tracing::debug!(done, total, "Estimated cell"),
                )
                .await?;
            print_json(&map)
        }
        Commands::Search {
            dataset,
            strategy,
            candidates,
            epochs,
            points,
            noise,
            top,
        } => {
            if let Some(strategy) = strategy {
                config.nas.strategy = strategy.into();
            }
            if let Some(candidates) = candidates {
                config.nas.num_candidates = candidates;
            }
            if let Some(epochs) = epochs {
                config.nas.epochs_per_candidate = epochs;
            }
            let data = demo::datasets::generate(dataset, points, noise, &mut rng);
            let (train, validation) = demo::datasets::split(data, 0.2, &mut rng);

            let oracle_seed: u64 = rng.gen_range(0..u64::MAX);
            let factory = move || demo::MlpOracle::new(oracle_seed);
            let run = ArchitectureSearch::new(config.nas)
                .search(&factory, &train, &validation, &mut rng, |done, total, best| {
                    tracing::info!(
                        done,
                        total,
                        best = %best.candidate.describe(),
                        accuracy = best.accuracy,
                        "Search progress"
                    );
                })
                .await?;
            print_json(&Leaderboard::new(&run, top))
        }
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".netlens");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&ToolkitConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Build the oracle selected by `args`, training it first for `--model mlp`.
async fn build_oracle<R: Rng>(
    args: &ModelArgs,
    rng: &mut R,
) -> anyhow::Result<Box<dyn PredictionOracle>> {
    if let Some(oracle) = demo::analytic(args.model) {
        return Ok(Box::new(oracle));
    }
    debug_assert_eq!(args.model, DemoModel::Mlp);

    let mut data_rng = StdRng::seed_from_u64(rng.gen_range(0..u64::MAX));
    let data = demo::datasets::generate(
        args.dataset,
        MLP_TRAINING_POINTS,
        MLP_TRAINING_NOISE,
        &mut data_rng,
    );
    let (train, validation) = demo::datasets::split(data, 0.2, &mut data_rng);
    let hyperparameters = Hyperparameters::default();
    let oracle_seed = rng.gen_range(0..u64::MAX);
    let oracle = demo::train_mlp(oracle_seed, &hyperparameters, &train, args.epochs).await?;
    let stats = oracle.evaluate(&validation).await?;
    tracing::info!(
        dataset = ?args.dataset,
        epochs = args.epochs,
        accuracy = stats.accuracy,
        loss = stats.loss,
        "Trained demonstration perceptron"
    );
    Ok(Box::new(oracle))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl From<SchemeArg> for ColorScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Heat => ColorScheme::Heat,
            SchemeArg::Diverging => ColorScheme::Diverging,
            SchemeArg::Viridis => ColorScheme::Viridis,
        }
    }
}

/// Saliency map plus rendered colours and the most sensitive cells.
#[derive(Debug, Serialize)]
struct SaliencyReport {
    scheme: ColorScheme,
    /// Hex colour per cell, same layout as `map.grid`.
    colors: Vec<Vec<String>>,
    hotspots: Vec<SaliencyCell>,
    map: SaliencyMap,
}

impl SaliencyReport {
    fn new(map: SaliencyMap, scheme: ColorScheme, top: usize) -> Self {
        let colors = map
            .grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| map.color_of(cell, scheme).to_hex())
                    .collect()
            })
            .collect();
        Self {
            scheme,
            colors,
            hotspots: map.hotspots(top),
            map,
        }
    }
}

/// Search summary with the top candidates.
#[derive(Debug, Serialize)]
struct Leaderboard {
    id: String,
    started_at: String,
    strategy: SearchStrategy,
    evaluated: usize,
    total_time_ms: f64,
    best: ArchitectureResult,
    ranking: Vec<RankedCandidate>,
}

#[derive(Debug, Serialize)]
struct RankedCandidate {
    rank: usize,
    architecture: String,
    accuracy: f64,
    loss: f64,
    num_parameters: usize,
    training_time_ms: f64,
}

impl Leaderboard {
    fn new(run: &NasRun, top: usize) -> Self {
        let ranking = run
            .ranked()
            .into_iter()
            .take(top)
            .enumerate()
            .map(|(i, result)| RankedCandidate {
                rank: i + 1,
                architecture: result.candidate.describe(),
                accuracy: result.accuracy,
                loss: result.loss,
                num_parameters: result.num_parameters,
                training_time_ms: result.training_time_ms,
            })
            .collect();
        Self {
            id: run.id.clone(),
            started_at: run.started_at.to_rfc3339(),
            strategy: run.config.strategy,
            evaluated: run.history.len(),
            total_time_ms: run.total_time_ms,
            best: run.best.clone(),
            ranking,
        }
    }
}
