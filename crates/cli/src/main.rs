//! `alutrack` command-line entry point.

mod replay;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use alutrack_ai::{DEFAULT_REACTION_TIME, PredictionInput, YieldEstimator};
use alutrack_core::SystemClock;
use alutrack_infra::{
    AppConfig, ConfigSource, InMemoryIdentityDirectory, LoadedConfig, ProductionService,
};

#[derive(Parser, Debug)]
#[command(name = "alutrack")]
#[command(about = "Alumina yield estimation and by-product ledger")]
#[command(version)]
struct CliArgs {
    /// Config file (default: $ALUTRACK_CONFIG, then ./alutrack.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override `estimator.model_path`
    #[arg(long, global = true, value_name = "PATH")]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate yield and by-product for one run and print it as JSON
    Estimate {
        /// Bauxite input mass (kg)
        #[arg(long)]
        bauxite_mass: f64,
        /// Caustic soda concentration (g/L)
        #[arg(long)]
        caustic_soda_conc: f64,
        /// Digestion temperature
        #[arg(long)]
        temperature: f64,
        /// Digestion pressure
        #[arg(long)]
        pressure: f64,
        /// Ore quality / purity
        #[arg(long)]
        purity: f64,
        /// Reaction time (hours)
        #[arg(long, default_value_t = DEFAULT_REACTION_TIME)]
        reaction_time: f64,
    },

    /// Feed a JSON script of predictions and status changes through an
    /// in-memory ledger and print the resulting overview
    Replay {
        /// Replay script
        file: PathBuf,
        /// How many recent predictions to include in the overview
        #[arg(long, default_value_t = 20)]
        recent: usize,
    },
}

/// Resolve the config without logging; the logging section decides how
/// the subscriber is built, so the outcome is reported afterwards.
fn load_config(args: &CliArgs) -> anyhow::Result<LoadedConfig> {
    let mut loaded = match &args.config {
        Some(path) => LoadedConfig {
            config: AppConfig::load_from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            source: ConfigSource::Explicit(path.clone()),
            skipped: Vec::new(),
        },
        None => AppConfig::discover(),
    };
    if let Some(model) = &args.model {
        loaded.config.estimator.model_path = model.clone();
    }
    Ok(loaded)
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let loaded = load_config(&args)?;
    alutrack_observability::init_with(&loaded.config.logging);
    loaded.report();
    let config = loaded.config;

    match args.command {
        Command::Estimate {
            bauxite_mass,
            caustic_soda_conc,
            temperature,
            pressure,
            purity,
            reaction_time,
        } => {
            let estimator = YieldEstimator::load(&config.estimator.model_path)
                .context("loading yield model")?
                .with_byproduct_ratio(config.estimator.byproduct_ratio);
            let input = PredictionInput::new(
                bauxite_mass,
                caustic_soda_conc,
                temperature,
                pressure,
                purity,
                reaction_time,
            )?;
            let result = estimator.predict(&input)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "input": input, "result": result }))?
            );
        }
        Command::Replay { file, recent } => {
            let script = replay::ReplayScript::load(&file)?;
            let service = ProductionService::in_memory(
                &config,
                Arc::new(InMemoryIdentityDirectory::new()),
                Arc::new(SystemClock),
            )
            .context("loading yield model")?;

            let report = replay::run(&service, script, recent)?;
            info!(
                submitted = report.submitted,
                failed = report.failed,
                transitioned = report.transitioned,
                "replay finished"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
