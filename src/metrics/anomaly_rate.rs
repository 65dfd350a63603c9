use crate::common::Label;
use crate::metrics::traits::LabelMetric;

/// Percentage of readings labelled anomalous.
///
/// # Example
///
/// ```
/// use machine_watch::common::Label;
/// use machine_watch::metrics::{AnomalyRate, LabelMetric};
///
/// let mut rate = AnomalyRate::new();
/// for label in [Label::Normal, Label::Anomalous, Label::Normal, Label::Normal] {
///     rate.update(label);
/// }
/// assert_eq!(rate.anomalies(), 1);
/// assert_eq!(rate.get(), 25.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnomalyRate {
    anomalies: usize,
    total: usize,
}

impl AnomalyRate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl LabelMetric for AnomalyRate {
    fn update(&mut self, y_pred: Label) {
        self.total += 1;
        if y_pred.is_anomaly() {
            self.anomalies += 1;
        }
    }

    /// 0 when nothing has been seen yet.
    fn get(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.anomalies as f64 / self.total as f64 * 100.0
    }
}
