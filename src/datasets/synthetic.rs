use std::f64::consts::PI;
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::common::SensorReading;
use crate::error::{Error, Result};

/// Synthetic readings of a machine running normally.
///
/// Each row draws an hour uniformly from `0..24`, a vibration from a normal
/// distribution (1200 ± 50 by default) and a temperature that follows a mild daily
/// cycle peaking mid-afternoon, plus gaussian noise. The generator is seeded, so the
/// same parameters always give the same rows.
///
/// # Example
///
/// ```
/// use machine_watch::datasets::synthetic::SyntheticMachine;
///
/// let readings = SyntheticMachine::new(100, 42).generate().unwrap();
/// assert_eq!(readings.len(), 100);
/// assert!(readings.iter().all(|r| (0.0..24.0).contains(&r.hour)));
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticMachine {
    n_rows: usize,
    seed: u64,
    vibration_mean: f64,
    vibration_std: f64,
    temperature_mean: f64,
    temperature_swing: f64,
    temperature_std: f64,
}

impl SyntheticMachine {
    pub fn new(n_rows: usize, seed: u64) -> Self {
        SyntheticMachine {
            n_rows,
            seed,
            vibration_mean: 1200.0,
            vibration_std: 50.0,
            temperature_mean: 25.5,
            temperature_swing: 1.5,
            temperature_std: 1.0,
        }
    }

    pub fn with_vibration(mut self, mean: f64, std: f64) -> Self {
        self.vibration_mean = mean;
        self.vibration_std = std;
        self
    }

    pub fn with_temperature(mut self, mean: f64, swing: f64, std: f64) -> Self {
        self.temperature_mean = mean;
        self.temperature_swing = swing;
        self.temperature_std = std;
        self
    }

    fn normal(name: &str, mean: f64, std: f64) -> Result<Normal<f64>> {
        Normal::new(mean, std).map_err(|e| Error::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn generate(&self) -> Result<Vec<SensorReading>> {
        let vibration = Self::normal("vibration_std", self.vibration_mean, self.vibration_std)?;
        let noise = Self::normal("temperature_std", 0.0, self.temperature_std)?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let readings = (0..self.n_rows)
            .map(|_| {
                let hour = rng.gen_range(0..24) as f64;
                // Warmest at 15h, coolest at 3h
                let cycle = (2.0 * PI * (hour - 9.0) / 24.0).sin();
                let temperature_c = self.temperature_mean
                    + self.temperature_swing * cycle
                    + noise.sample(&mut rng);
                SensorReading::new(hour, vibration.sample(&mut rng), temperature_c)
            })
            .collect();
        Ok(readings)
    }

    /// Write the generated rows, with a header, to a CSV file. Returns the row count.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let readings = self.generate()?;
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        for reading in &readings {
            writer.serialize(reading)?;
        }
        writer.flush()?;
        info!(
            rows = readings.len(),
            path = %path.as_ref().display(),
            "synthetic readings written"
        );
        Ok(readings.len())
    }
}
