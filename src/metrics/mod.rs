pub mod anomaly_rate;
pub mod traits;

pub use anomaly_rate::AnomalyRate;
pub use traits::LabelMetric;
