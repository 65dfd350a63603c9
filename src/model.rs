//! Persisted model artifact.
//!
//! The trainer writes a fitted forest to disk once; the evaluator and the service load it
//! at start-up and never modify it.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::anomaly::IsolationForest;
use crate::common::{AnomalyDetector, Label, SensorReading, FEATURES};
use crate::error::{Error, Result};

const FORMAT: &str = "machine-watch/isolation-forest/1";

/// A fitted isolation forest and the names of the features it was fitted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    format: String,
    features: Vec<String>,
    forest: IsolationForest<f64>,
}

impl ModelArtifact {
    /// Wrap a forest fitted on readings in [`FEATURES`] order.
    pub fn new(forest: IsolationForest<f64>) -> Result<Self> {
        if !forest.is_fitted() {
            return Err(Error::NotFitted);
        }
        if forest.n_features() != FEATURES.len() {
            return Err(Error::FeatureMismatch {
                expected: FEATURES.len(),
                got: forest.n_features(),
            });
        }
        Ok(ModelArtifact {
            format: FORMAT.to_string(),
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
            forest,
        })
    }

    /// Write the artifact next to its destination first, then move it into place, so a
    /// reader never sees a half-written model.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        info!(path = %path.display(), "model artifact saved");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let artifact: ModelArtifact = bincode::deserialize(&bytes)?;

        if artifact.format != FORMAT {
            return Err(Error::IncompatibleArtifact(format!(
                "format {:?}, expected {:?}",
                artifact.format, FORMAT
            )));
        }
        if artifact.features != FEATURES {
            return Err(Error::IncompatibleArtifact(format!(
                "features {:?}, expected {:?}",
                artifact.features, FEATURES
            )));
        }
        if !artifact.forest.is_fitted() || artifact.forest.n_features() != FEATURES.len() {
            return Err(Error::IncompatibleArtifact(
                "forest is not fitted on the sensor features".to_string(),
            ));
        }
        artifact
            .forest
            .check_structure()
            .map_err(Error::IncompatibleArtifact)?;

        info!(
            path = %path.display(),
            n_estimators = artifact.forest.n_estimators(),
            "model artifact loaded"
        );
        Ok(artifact)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn forest(&self) -> &IsolationForest<f64> {
        &self.forest
    }
}

impl AnomalyDetector for ModelArtifact {
    fn classify(&self, reading: &SensorReading) -> Result<Label> {
        self.forest.predict_one(&reading.to_features())
    }

    fn score(&self, reading: &SensorReading) -> Result<f64> {
        self.forest.decision_one(&reading.to_features())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::synthetic::SyntheticMachine;
    use crate::datasets::sample_batch;
    use crate::stream::iter_csv::to_matrix;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn fitted() -> IsolationForest<f64> {
        let readings = SyntheticMachine::new(300, 1).generate().unwrap();
        let mut forest = IsolationForest::new()
            .with_n_estimators(30)
            .with_random_state(42);
        forest.fit(&to_matrix(&readings)).unwrap();
        forest
    }

    #[test]
    fn test_save_and_load_keep_scores() {
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("isolation_forest_model.bin");

        let artifact = ModelArtifact::new(fitted()).unwrap();
        artifact.save(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.features(), FEATURES);
        for reading in sample_batch() {
            assert_eq!(
                artifact.score(&reading).unwrap(),
                loaded.score(&reading).unwrap()
            );
            assert_eq!(
                artifact.classify(&reading).unwrap(),
                loaded.classify(&reading).unwrap()
            );
        }
    }

    #[test]
    fn test_unfitted_forest_rejected() {
        assert!(matches!(
            ModelArtifact::new(IsolationForest::new()),
            Err(Error::NotFitted)
        ));
    }

    #[test]
    fn test_wrong_feature_count_rejected() {
        let mut forest = IsolationForest::new().with_n_estimators(5);
        forest
            .fit(&Array2::from_shape_fn((10, 2), |(i, j)| (i + j) as f64))
            .unwrap();
        assert!(matches!(
            ModelArtifact::new(forest),
            Err(Error::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(ModelArtifact::load(&path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().expect("failed to create temp dir");
        assert!(matches!(
            ModelArtifact::load(dir.path().join("absent.bin")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_corrupted_tree_rejected_on_load() {
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("model.bin");
        let mut artifact = ModelArtifact::new(fitted()).unwrap();
        artifact.forest.trees_mut()[0].nodes_mut()[0].right = Some(1_000_000);
        artifact.save(&path).unwrap();

        match ModelArtifact::load(&path) {
            Err(Error::IncompatibleArtifact(reason)) => assert!(reason.contains("tree 0")),
            other => panic!("expected an incompatible artifact, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_artifact_rejected() {
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("model.bin");
        ModelArtifact::new(fitted()).unwrap().save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(ModelArtifact::load(&path).is_err());
    }

    #[test]
    fn test_wrong_format_tag_rejected() {
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("model.bin");
        let mut artifact = ModelArtifact::new(fitted()).unwrap();
        artifact.format = "something-else/0".to_string();
        artifact.save(&path).unwrap();

        assert!(matches!(
            ModelArtifact::load(&path),
            Err(Error::IncompatibleArtifact(_))
        ));
    }
}
