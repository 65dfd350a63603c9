use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::anomaly::{Contamination, IsolationForest, MaxSamples};
use crate::common::SensorReading;
use crate::config::{DEFAULT_MODEL_PATH, DEFAULT_TRAINING_DATA};
use crate::error::{Error, Result};
use crate::model::ModelArtifact;
use crate::stream::iter_csv::{load_readings, to_matrix};

/// Parameters of a training run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub n_estimators: usize,
    pub max_samples: MaxSamples,
    pub contamination: Contamination,
    pub random_state: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            input: PathBuf::from(DEFAULT_TRAINING_DATA),
            output: PathBuf::from(DEFAULT_MODEL_PATH),
            n_estimators: 100,
            max_samples: MaxSamples::Auto,
            contamination: Contamination::Auto,
            random_state: Some(42),
        }
    }
}

impl TrainConfig {
    fn forest(&self) -> IsolationForest<f64> {
        let forest = IsolationForest::new()
            .with_n_estimators(self.n_estimators)
            .with_max_samples(self.max_samples)
            .with_contamination(self.contamination);
        match self.random_state {
            Some(seed) => forest.with_random_state(seed),
            None => forest,
        }
    }
}

/// Fit a model on in-memory readings.
pub fn fit_readings(readings: &[SensorReading], config: &TrainConfig) -> Result<ModelArtifact> {
    if readings.is_empty() {
        return Err(Error::EmptyDataset);
    }
    let mut forest = config.forest();
    forest.fit(&to_matrix(readings))?;
    ModelArtifact::new(forest)
}

/// Read the training CSV, fit the forest and write the artifact to `config.output`.
pub fn train(config: &TrainConfig) -> Result<ModelArtifact> {
    let now = Instant::now();
    let readings = load_readings(&config.input)?;
    info!(
        rows = readings.len(),
        input = %config.input.display(),
        "training data loaded"
    );

    let artifact = fit_readings(&readings, config)?;
    artifact.save(&config.output)?;

    info!(
        n_estimators = config.n_estimators,
        elapsed_ms = now.elapsed().as_millis() as u64,
        output = %config.output.display(),
        "model trained"
    );
    Ok(artifact)
}
