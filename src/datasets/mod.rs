pub mod synthetic;

use crate::common::SensorReading;

/// Small hand-picked batch used by the offline evaluator when no input file is given.
///
/// Rows 3 and 5 carry unusually high vibration, row 3 also runs hot.
pub fn sample_batch() -> Vec<SensorReading> {
    vec![
        SensorReading::new(2.0, 1190.0, 24.5),
        SensorReading::new(9.0, 1250.0, 25.5),
        SensorReading::new(14.0, 1450.0, 31.2),
        SensorReading::new(15.0, 1100.0, 29.0),
        SensorReading::new(21.0, 1350.0, 25.8),
    ]
}
