use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Names of the features a reading carries, in the order the model sees them.
pub const FEATURES: [&str; 3] = ["hour", "vibration", "temperature_c"];

/// One sensor reading taken from a machine.
///
/// # Example
///
/// ```
/// use machine_watch::common::SensorReading;
///
/// let reading = SensorReading::new(10.0, 1200.0, 25.0);
/// assert_eq!(reading.to_features(), [10.0, 1200.0, 25.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub hour: f64,
    pub vibration: f64,
    pub temperature_c: f64,
}

impl SensorReading {
    pub fn new(hour: f64, vibration: f64, temperature_c: f64) -> Self {
        Self {
            hour,
            vibration,
            temperature_c,
        }
    }

    /// Feature values in [`FEATURES`] order.
    pub fn to_features(&self) -> [f64; 3] {
        [self.hour, self.vibration, self.temperature_c]
    }
}

/// Outcome of classifying a reading.
///
/// On the wire a label is an integer: `1` for normal, `-1` for anomalous.
///
/// # Example
///
/// ```
/// use machine_watch::common::Label;
///
/// assert_eq!(Label::Normal.as_i8(), 1);
/// assert_eq!(Label::Anomalous.as_i8(), -1);
/// assert_eq!(Label::from_decision(-0.01), Label::Anomalous);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Normal,
    Anomalous,
}

impl Label {
    /// A non-negative decision value is normal.
    pub fn from_decision(decision: f64) -> Self {
        if decision >= 0.0 {
            Label::Normal
        } else {
            Label::Anomalous
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Label::Normal => 1,
            Label::Anomalous => -1,
        }
    }

    pub fn is_anomaly(self) -> bool {
        self == Label::Anomalous
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_i8(), f)
    }
}

/// Trait for a fitted anomaly detector over sensor readings.
///
/// Consumers (the evaluator and the HTTP service) only see these two methods, so the
/// underlying algorithm can change without touching them.
pub trait AnomalyDetector: Send + Sync {
    /// Label a reading as normal or anomalous.
    fn classify(&self, reading: &SensorReading) -> Result<Label>;

    /// Continuous score: higher is more normal, negative values are outliers.
    fn score(&self, reading: &SensorReading) -> Result<f64>;
}
