//! # machine-watch
//!
//! Command-line entry point: train, evaluate and serve the sensor anomaly model.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use machine_watch::anomaly::{Contamination, MaxSamples};
use machine_watch::config::{
    ServiceConfig, DEFAULT_MODEL_PATH, DEFAULT_TRAINING_DATA, HOST_ENV, MODEL_ENV, PORT_ENV,
};
use machine_watch::datasets::sample_batch;
use machine_watch::datasets::synthetic::SyntheticMachine;
use machine_watch::evaluate::evaluate;
use machine_watch::stream::load_readings;
use machine_watch::train::{train, TrainConfig};
use machine_watch::{service, ModelArtifact};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "machine-watch")]
#[command(about = "Anomaly detection for machine sensor readings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit an Isolation Forest on normal readings and save it
    Train {
        /// Training CSV with hour, vibration and temperature_c columns
        #[arg(short, long, default_value = DEFAULT_TRAINING_DATA)]
        input: PathBuf,

        /// Where to write the model
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        output: PathBuf,

        /// Number of trees
        #[arg(short = 'n', long, default_value = "100")]
        n_estimators: usize,

        /// Rows per tree (default: min(256, rows))
        #[arg(long)]
        max_samples: Option<usize>,

        /// Expected share of anomalies in (0, 0.5] (default: auto)
        #[arg(short, long)]
        contamination: Option<f64>,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Score a batch of readings with a saved model
    Evaluate {
        /// Model file
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// CSV of readings (default: built-in sample batch)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Start the prediction API server
    Serve {
        /// Host name or IP address to bind to (default: 0.0.0.0)
        #[arg(long, env = HOST_ENV)]
        host: Option<String>,

        /// Port to listen on (default: 5000)
        #[arg(short, long, env = PORT_ENV)]
        port: Option<u16>,

        /// Model file (default: isolation_forest_model.bin)
        #[arg(short, long, env = MODEL_ENV)]
        model: Option<PathBuf>,
    },

    /// Write a CSV of synthetic normal readings
    Generate {
        /// Output file
        #[arg(short, long, default_value = DEFAULT_TRAINING_DATA)]
        output: PathBuf,

        /// Number of rows
        #[arg(short, long, default_value = "1000")]
        rows: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

fn run_train(
    input: PathBuf,
    output: PathBuf,
    n_estimators: usize,
    max_samples: Option<usize>,
    contamination: Option<f64>,
    seed: u64,
) -> CliResult<()> {
    let config = TrainConfig {
        input,
        output,
        n_estimators,
        max_samples: max_samples.map_or(MaxSamples::Auto, MaxSamples::Count),
        contamination: contamination.map_or(Contamination::Auto, Contamination::Fixed),
        random_state: Some(seed),
    };
    train(&config)?;
    println!("Model trained and saved as {}", config.output.display());
    Ok(())
}

fn run_evaluate(model: PathBuf, input: Option<PathBuf>) -> CliResult<()> {
    let artifact = ModelArtifact::load(&model)?;
    let readings = match input {
        Some(path) => load_readings(path)?,
        None => sample_batch(),
    };
    let report = evaluate(&artifact, &readings)?;
    println!("Test Results:");
    println!("{report}");
    Ok(())
}

fn run_serve(host: Option<String>, port: Option<u16>, model: Option<PathBuf>) -> CliResult<()> {
    let config = ServiceConfig::default().with_overrides(host, port, model);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(service::serve(&config))?;
    Ok(())
}

fn run_generate(output: PathBuf, rows: usize, seed: u64) -> CliResult<()> {
    let written = SyntheticMachine::new(rows, seed).write_csv(&output)?;
    println!("Wrote {written} readings to {}", output.display());
    Ok(())
}

fn main() -> ExitCode {
    // Load .env file (optional - won't fail if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "machine_watch=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Train {
            input,
            output,
            n_estimators,
            max_samples,
            contamination,
            seed,
        } => run_train(input, output, n_estimators, max_samples, contamination, seed),
        Commands::Evaluate { model, input } => run_evaluate(model, input),
        Commands::Serve { host, port, model } => run_serve(host, port, model),
        Commands::Generate { output, rows, seed } => run_generate(output, rows, seed),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "command failed");
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
