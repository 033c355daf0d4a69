//! netlens CLI: explain, attack and search small 2D classifiers.
//!
//! Every command runs one toolkit algorithm against a demonstration oracle and
//! prints its result as pretty JSON on stdout.

mod commands;
mod demo;

use clap::Parser;
use demo::{DatasetKind, DemoModel};
use netlens_core::SearchStrategy;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// netlens: black-box interpretability for small neural networks
#[derive(Parser, Debug)]
#[command(name = "netlens", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.netlens/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Seed every random draw for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Oracle selection shared by the explanation commands.
#[derive(clap::Args, Debug, Clone)]
pub struct ModelArgs {
    /// Oracle to query
    #[arg(short, long, value_enum, default_value = "circle")]
    pub model: DemoModel,

    /// Training data for `--model mlp`
    #[arg(long, value_enum, default_value = "circle")]
    pub dataset: DatasetKind,

    /// Training epochs for `--model mlp`
    #[arg(long, default_value = "100")]
    pub epochs: usize,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Explain one prediction with a local linear surrogate (LIME)
    #[command(allow_negative_numbers = true)]
    Explain {
        x: f64,
        y: f64,
        #[command(flatten)]
        model: ModelArgs,
        /// Neighbourhood samples
        #[arg(long)]
        samples: Option<usize>,
        /// Perturbation and kernel width
        #[arg(long)]
        kernel_width: Option<f64>,
    },
    /// Compute a finite-difference saliency map over the plot bounds
    Saliency {
        #[command(flatten)]
        model: ModelArgs,
        /// Cells per axis
        #[arg(short, long)]
        resolution: Option<usize>,
        /// Class to differentiate (defaults to each cell's prediction)
        #[arg(long)]
        target_class: Option<usize>,
        /// Colour ramp for the rendered cells
        #[arg(long, value_enum, default_value = "heat")]
        scheme: SchemeArg,
        /// Number of hotspots to report
        #[arg(long, default_value = "5")]
        top: usize,
    },
    /// Perturb one point with FGSM
    #[command(allow_negative_numbers = true)]
    Attack {
        x: f64,
        y: f64,
        #[command(flatten)]
        model: ModelArgs,
        /// Step size
        #[arg(short, long)]
        epsilon: Option<f64>,
        /// Steer towards this class instead of away from the prediction
        #[arg(long)]
        target_class: Option<usize>,
    },
    /// Attack a generated dataset and report robustness
    AttackBatch {
        #[command(flatten)]
        model: ModelArgs,
        /// Points to attack
        #[arg(short = 'n', long, default_value = "50")]
        count: usize,
        /// Step size
        #[arg(short, long)]
        epsilon: Option<f64>,
    },
    /// Estimate predictive uncertainty at one point
    #[command(allow_negative_numbers = true)]
    Uncertainty {
        x: f64,
        y: f64,
        #[command(flatten)]
        model: ModelArgs,
        /// Noisy queries
        #[arg(long)]
        samples: Option<usize>,
        /// Simulated dropout rate (noise sigma is half of it)
        #[arg(long)]
        dropout: Option<f64>,
    },
    /// Estimate uncertainty over a grid
    UncertaintyMap {
        #[command(flatten)]
        model: ModelArgs,
        /// Cells per axis
        #[arg(short, long, default_value = "10")]
        resolution: usize,
        /// Noisy queries per cell
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Search perceptron architectures on a generated dataset
    Search {
        #[arg(long, value_enum, default_value = "circle")]
        dataset: DatasetKind,
        /// Candidate proposal strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Maximum candidates to evaluate
        #[arg(short = 'n', long)]
        candidates: Option<usize>,
        /// Training epochs per candidate
        #[arg(long)]
        epochs: Option<usize>,
        /// Generated points, split 80/20 into train and validation
        #[arg(long, default_value = "200")]
        points: usize,
        /// Label noise of the generated data
        #[arg(long, default_value = "0.1")]
        noise: f64,
        /// Leaderboard length
        #[arg(long, default_value = "5")]
        top: usize,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration to the workspace
    Init,
    /// Show the merged configuration
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemeArg {
    Heat,
    Diverging,
    Viridis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    Random,
    Evolutionary,
    Grid,
}

impl From<StrategyArg> for SearchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Random => SearchStrategy::Random,
            StrategyArg::Evolutionary => SearchStrategy::Evolutionary,
            StrategyArg::Grid => SearchStrategy::Grid,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "netlens", "netlens")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "netlens.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.seed).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_coordinates_parse() {
        let cli = Cli::try_parse_from(["netlens", "explain", "-1.5", "2", "--model", "xor"]).unwrap();
        match cli.command {
            Commands::Explain { x, y, model, .. } => {
                assert_eq!((x, y), (-1.5, 2.0));
                assert_eq!(model.model, DemoModel::Xor);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_search_flags_parse() {
        let cli = Cli::try_parse_from([
            "netlens", "--seed", "7", "search", "--strategy", "evolutionary", "-n", "12",
        ])
        .unwrap();
        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Commands::Search {
                strategy,
                candidates,
                dataset,
                ..
            } => {
                assert_eq!(strategy, Some(StrategyArg::Evolutionary));
                assert_eq!(candidates, Some(12));
                assert_eq!(dataset, DatasetKind::Circle);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
