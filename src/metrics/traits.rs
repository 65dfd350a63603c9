use crate::common::Label;

/// Running metric over the labels a detector assigns.
pub trait LabelMetric {
    fn update(&mut self, y_pred: Label);
    fn get(&self) -> f64;
}
