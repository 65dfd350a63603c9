//! Isolation Forest anomaly detection for machine sensor readings.
//!
//! The crate covers the whole life of a model: [`train`] fits an
//! [`anomaly::IsolationForest`] on a CSV of normal readings and writes a
//! [`model::ModelArtifact`], [`evaluate`] scores a batch against it offline and
//! [`service`] serves it over HTTP.

pub mod anomaly;
pub mod common;
pub mod config;
pub mod datasets;
pub mod error;
pub mod evaluate;
pub mod metrics;
pub mod model;
pub mod service;
pub mod stream;
pub mod train;

pub use common::{AnomalyDetector, Label, SensorReading};
pub use error::{Error, Result};
pub use model::ModelArtifact;
