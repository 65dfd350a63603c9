use std::fmt;

use crate::common::{AnomalyDetector, Label, SensorReading};
use crate::error::Result;
use crate::metrics::{AnomalyRate, LabelMetric};

/// A reading together with what the detector made of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredReading {
    pub reading: SensorReading,
    pub label: Label,
    pub score: f64,
}

/// Per-row results and the share of anomalies in a batch.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub rows: Vec<ScoredReading>,
    pub rate: AnomalyRate,
}

impl EvaluationReport {
    pub fn anomalies(&self) -> usize {
        self.rate.anomalies()
    }

    pub fn total(&self) -> usize {
        self.rate.total()
    }

    pub fn anomaly_percent(&self) -> f64 {
        self.rate.get()
    }

    pub fn summary(&self) -> String {
        format!(
            "Detected {} anomalies out of {} samples ({:.2}% abnormal)",
            self.anomalies(),
            self.total(),
            self.anomaly_percent()
        )
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>5} {:>8} {:>10} {:>14} {:>10} {:>14}",
            "", "hour", "vibration", "temperature_c", "prediction", "anomaly_score"
        )?;
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(
                f,
                "{:>5} {:>8} {:>10} {:>14} {:>10} {:>14.6}",
                i,
                row.reading.hour,
                row.reading.vibration,
                row.reading.temperature_c,
                row.label,
                row.score
            )?;
        }
        writeln!(f)?;
        write!(f, "{}", self.summary())
    }
}

/// Classify and score every reading of a batch.
pub fn evaluate(
    detector: &dyn AnomalyDetector,
    readings: &[SensorReading],
) -> Result<EvaluationReport> {
    let mut rate = AnomalyRate::new();
    let mut rows = Vec::with_capacity(readings.len());
    for reading in readings {
        let label = detector.classify(reading)?;
        let score = detector.score(reading)?;
        rate.update(label);
        rows.push(ScoredReading {
            reading: *reading,
            label,
            score,
        });
    }
    Ok(EvaluationReport { rows, rate })
}
