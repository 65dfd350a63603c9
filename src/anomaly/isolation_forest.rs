use std::cmp::Ordering;

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::isolation_tree::{average_path_length, IsolationTree};
use super::{float, FType};
use crate::common::Label;
use crate::error::{Error, Result};

/// Number of rows each tree is grown on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxSamples {
    /// `min(256, n_samples)`
    Auto,
    /// A fixed count, clamped to the number of training rows.
    Count(usize),
}

/// Expected share of anomalies in the training data, used to place the decision offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Contamination {
    /// Offset fixed at `-0.5`, the score at which a point is isolated as fast as an
    /// average point.
    Auto,
    /// Offset set so that this fraction of the training rows falls below it.
    Fixed(f64),
}

/// Isolation Forest anomaly detector.
///
/// Anomalies are few and different, so random axis-aligned splits isolate them in fewer
/// steps than normal points. The forest averages the isolation depth over many trees,
/// each grown on a random subsample of the training data.
///
/// # Parameters
///
/// - `n_estimators`: The number of trees.
/// - `max_samples`: The number of rows drawn, without replacement, to grow each tree.
/// - `contamination`: How the decision offset is chosen.
/// - `random_state`: Seed for the subsampling and the splits. With a seed, fitting the
///   same data twice gives the same forest.
///
/// # Example
///
/// ```
/// use machine_watch::anomaly::IsolationForest;
/// use ndarray::array;
///
/// let data = array![[1.0, 1.0], [1.1, 1.0], [1.0, 1.1], [0.9, 0.9], [1.1, 1.1], [1.0, 0.9]];
/// let mut forest: IsolationForest<f64> = IsolationForest::new()
///     .with_n_estimators(50)
///     .with_random_state(42);
/// forest.fit(&data).unwrap();
///
/// let scores = forest.score_samples(&data).unwrap();
/// assert!(scores.iter().all(|s| (-1.0..=0.0).contains(s)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest<F> {
    n_estimators: usize,
    max_samples: MaxSamples,
    contamination: Contamination,
    random_state: Option<u64>,
    trees: Vec<IsolationTree<F>>,
    n_features: usize,
    sample_size: usize,
    offset: F,
}

impl<F: FType> Default for IsolationForest<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FType> IsolationForest<F> {
    pub fn new() -> Self {
        IsolationForest {
            n_estimators: 100,
            max_samples: MaxSamples::Auto,
            contamination: Contamination::Auto,
            random_state: None,
            trees: Vec::new(),
            n_features: 0,
            sample_size: 0,
            offset: float(-0.5),
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_samples(mut self, max_samples: MaxSamples) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_contamination(mut self, contamination: Contamination) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn validate(&self, data: &Array2<F>) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::InvalidParameter {
                name: "n_estimators".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let MaxSamples::Count(0) = self.max_samples {
            return Err(Error::InvalidParameter {
                name: "max_samples".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Contamination::Fixed(c) = self.contamination {
            if !(c > 0.0 && c <= 0.5) {
                return Err(Error::InvalidParameter {
                    name: "contamination".to_string(),
                    reason: format!("must be in (0, 0.5], got {c}"),
                });
            }
        }
        if data.nrows() == 0 {
            return Err(Error::EmptyDataset);
        }
        if data.ncols() == 0 {
            return Err(Error::InvalidParameter {
                name: "data".to_string(),
                reason: "must have at least one feature".to_string(),
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "data".to_string(),
                reason: "contains non-finite values".to_string(),
            });
        }
        // Split thresholds are drawn from [min, max), which needs a finite width
        for (feature, column) in data.columns().into_iter().enumerate() {
            let (min, max) = column.iter().fold(
                (F::infinity(), F::neg_infinity()),
                |(min, max), &v| (min.min(v), max.max(v)),
            );
            if !(max - min).is_finite() {
                return Err(Error::InvalidParameter {
                    name: "data".to_string(),
                    reason: format!("feature {feature} spans a range too wide to split"),
                });
            }
        }
        Ok(())
    }

    /// Fit the forest on an `n_samples x n_features` matrix.
    ///
    /// Refitting discards the previous trees.
    pub fn fit(&mut self, data: &Array2<F>) -> Result<()> {
        self.validate(data)?;

        let n_samples = data.nrows();
        let sample_size = match self.max_samples {
            MaxSamples::Auto => n_samples.min(256),
            MaxSamples::Count(count) => count.min(n_samples),
        };
        // A single row gives depth 0: every tree is one leaf
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // One seed per tree, drawn up front, keeps every tree reproducible on its own
        self.trees = (0..self.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.gen());
                let rows = index::sample(&mut tree_rng, n_samples, sample_size).into_vec();
                IsolationTree::fit(data, rows, max_depth, &mut tree_rng)
            })
            .collect();
        self.n_features = data.ncols();
        self.sample_size = sample_size;

        self.offset = match self.contamination {
            Contamination::Auto => float(-0.5),
            Contamination::Fixed(c) => {
                let scores = self.score_samples(data)?;
                percentile(scores, c)
            }
        };

        debug!(
            n_samples,
            n_features = self.n_features,
            n_estimators = self.n_estimators,
            sample_size,
            max_depth,
            "isolation forest fitted"
        );
        Ok(())
    }

    fn check_features(&self, got: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted);
        }
        if got != self.n_features {
            return Err(Error::FeatureMismatch {
                expected: self.n_features,
                got,
            });
        }
        Ok(())
    }

    fn score_row(&self, x: &ArrayView1<F>) -> F {
        let total = self
            .trees
            .iter()
            .fold(F::zero(), |acc, tree| acc + tree.path_length(x));
        let mean_depth = total / float(self.trees.len() as f64);
        let normaliser = average_path_length::<F>(self.sample_size);
        // c(1) is 0; a one-row subsample scores as an average point
        let ratio = if normaliser > F::zero() {
            mean_depth / normaliser
        } else {
            F::one()
        };
        -float::<F>(2.0).powf(-ratio)
    }

    /// Check the trees of a deserialized forest against its own metadata.
    ///
    /// Returns a description of the first inconsistency found.
    pub fn check_structure(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.trees.len() != self.n_estimators {
            return Err(format!(
                "{} trees stored, n_estimators is {}",
                self.trees.len(),
                self.n_estimators
            ));
        }
        if self.sample_size == 0 {
            return Err("sample_size is 0".to_string());
        }
        if !self.offset.is_finite() {
            return Err("offset is not finite".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check_structure(self.n_features)
                .map_err(|reason| format!("tree {i}: {reason}"))?;
        }
        Ok(())
    }

    /// Opposite of the anomaly score from the original paper, in `[-1, 0]`.
    ///
    /// The lower the score, the more abnormal the row.
    pub fn score_samples(&self, data: &Array2<F>) -> Result<Vec<F>> {
        self.check_features(data.ncols())?;
        Ok(data.rows().into_iter().map(|row| self.score_row(&row)).collect())
    }

    /// Score minus the fitted offset: negative values are anomalies.
    pub fn decision_function(&self, data: &Array2<F>) -> Result<Vec<F>> {
        Ok(self
            .score_samples(data)?
            .into_iter()
            .map(|score| score - self.offset)
            .collect())
    }

    pub fn predict(&self, data: &Array2<F>) -> Result<Vec<Label>> {
        Ok(self
            .decision_function(data)?
            .into_iter()
            .map(to_label)
            .collect())
    }

    /// Decision value of a single row.
    pub fn decision_one(&self, x: &[F]) -> Result<F> {
        self.check_features(x.len())?;
        Ok(self.score_row(&ArrayView1::from(x)) - self.offset)
    }

    pub fn predict_one(&self, x: &[F]) -> Result<Label> {
        self.decision_one(x).map(to_label)
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn offset(&self) -> F {
        self.offset
    }

    pub fn contamination(&self) -> Contamination {
        self.contamination
    }

    pub fn trees(&self) -> &[IsolationTree<F>] {
        &self.trees
    }

    #[cfg(test)]
    pub(crate) fn trees_mut(&mut self) -> &mut [IsolationTree<F>] {
        &mut self.trees
    }
}

fn to_label<F: FType>(decision: F) -> Label {
    if decision >= F::zero() {
        Label::Normal
    } else {
        Label::Anomalous
    }
}

/// Linear-interpolated `q`-quantile (`q` in `[0, 1]`) of a non-empty sample.
fn percentile<F: FType>(mut values: Vec<F>, q: f64) -> F {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let rank = q * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight: F = float(rank - lo as f64);
    values[lo] + (values[hi] - values[lo]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand_distr::{Distribution, Normal};

    fn cluster(n: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        Array2::from_shape_fn((n, 2), |_| normal.sample(&mut rng))
    }

    fn small() -> Array2<f64> {
        array![
            [1.0, 1.0],
            [1.1, 1.0],
            [1.0, 1.1],
            [0.9, 0.9],
            [1.1, 1.1],
            [1.0, 0.9],
            [0.9, 1.1],
            [1.0, 1.0]
        ]
    }

    #[test]
    fn test_scores_bounded() {
        let data = small();
        let mut forest = IsolationForest::new()
            .with_n_estimators(50)
            .with_random_state(42);
        forest.fit(&data).unwrap();

        for score in forest.score_samples(&data).unwrap() {
            assert!((-1.0..=0.0).contains(&score), "score {score} out of [-1, 0]");
        }
    }

    #[test]
    fn test_one_prediction_per_row() {
        let data = cluster(40, 1);
        let mut forest = IsolationForest::new()
            .with_n_estimators(20)
            .with_random_state(3);
        forest.fit(&data).unwrap();
        assert_eq!(forest.predict(&data).unwrap().len(), 40);
    }

    #[test]
    fn test_same_seed_same_scores() {
        let data = cluster(300, 5);
        let probe = array![[0.0, 0.0], [2.5, -1.0], [9.0, 9.0]];

        let mut a: IsolationForest<f64> = IsolationForest::new().with_random_state(42);
        let mut b: IsolationForest<f64> = IsolationForest::new().with_random_state(42);
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();

        assert_eq!(
            a.decision_function(&probe).unwrap(),
            b.decision_function(&probe).unwrap()
        );
        assert_eq!(a.predict(&probe).unwrap(), b.predict(&probe).unwrap());
    }

    #[test]
    fn test_far_point_is_anomalous_and_scores_lower() {
        let data = cluster(500, 8);
        let mut forest = IsolationForest::new().with_random_state(42);
        forest.fit(&data).unwrap();

        let inlier = forest.decision_one(&[0.0, 0.0]).unwrap();
        let outlier = forest.decision_one(&[25.0, -25.0]).unwrap();
        assert!(outlier < inlier);
        assert_eq!(forest.predict_one(&[25.0, -25.0]).unwrap(), Label::Anomalous);
        assert_eq!(forest.predict_one(&[0.0, 0.0]).unwrap(), Label::Normal);
    }

    #[test]
    fn test_auto_offset() {
        let mut forest: IsolationForest<f64> = IsolationForest::new().with_random_state(0);
        forest.fit(&cluster(50, 2)).unwrap();
        assert_eq!(forest.offset(), -0.5);
        assert_eq!(forest.sample_size(), 50);
        assert_eq!(forest.trees().len(), 100);
    }

    #[test]
    fn test_fixed_contamination_flags_that_share() {
        let data = cluster(400, 9);
        let mut forest = IsolationForest::new()
            .with_random_state(42)
            .with_contamination(Contamination::Fixed(0.1));
        forest.fit(&data).unwrap();

        let flagged = forest
            .predict(&data)
            .unwrap()
            .into_iter()
            .filter(|label| label.is_anomaly())
            .count();
        // Ties at the percentile can shift the count by a row or two
        assert!((36..=44).contains(&flagged), "flagged {flagged} of 400");
    }

    #[test]
    fn test_max_samples_is_clamped() {
        let mut forest: IsolationForest<f64> = IsolationForest::new()
            .with_max_samples(MaxSamples::Count(1000))
            .with_random_state(1);
        forest.fit(&cluster(30, 4)).unwrap();
        assert_eq!(forest.sample_size(), 30);
        assert!(forest.trees().iter().all(|t| t.max_depth() == 5));
    }

    #[test]
    fn test_f32_forest() {
        let data = small().mapv(|v| v as f32);
        let mut forest: IsolationForest<f32> = IsolationForest::new()
            .with_n_estimators(10)
            .with_random_state(42);
        forest.fit(&data).unwrap();
        assert_eq!(forest.score_samples(&data).unwrap().len(), 8);
    }

    #[test]
    fn test_not_fitted() {
        let forest: IsolationForest<f64> = IsolationForest::new();
        assert!(!forest.is_fitted());
        assert!(matches!(
            forest.decision_one(&[1.0, 2.0]),
            Err(Error::NotFitted)
        ));
    }

    #[test]
    fn test_feature_mismatch() {
        let mut forest: IsolationForest<f64> = IsolationForest::new().with_n_estimators(5);
        forest.fit(&small()).unwrap();
        assert!(matches!(
            forest.predict_one(&[1.0, 2.0, 3.0]),
            Err(Error::FeatureMismatch {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let mut forest: IsolationForest<f64> = IsolationForest::new();
        assert!(matches!(
            forest.fit(&Array2::zeros((0, 3))),
            Err(Error::EmptyDataset)
        ));
        assert!(matches!(
            forest.fit(&array![[1.0, f64::NAN], [2.0, 3.0]]),
            Err(Error::InvalidParameter { .. })
        ));

        let mut zero_trees: IsolationForest<f64> = IsolationForest::new().with_n_estimators(0);
        assert!(zero_trees.fit(&small()).is_err());

        let mut bad_share: IsolationForest<f64> =
            IsolationForest::new().with_contamination(Contamination::Fixed(0.7));
        assert!(bad_share.fit(&small()).is_err());
    }

    #[test]
    fn test_constant_data_scores_at_offset() {
        let data = Array2::from_elem((20, 3), 4.0);
        let mut forest: IsolationForest<f64> = IsolationForest::new().with_random_state(7);
        forest.fit(&data).unwrap();
        let decision = forest.decision_one(&[4.0, 4.0, 4.0]).unwrap();
        assert!(decision.abs() < 1e-12);
    }

    #[test]
    fn test_single_row_fits_as_one_leaf() {
        let data = array![[1.0, 1200.0, 25.0]];
        let mut forest: IsolationForest<f64> = IsolationForest::new()
            .with_n_estimators(10)
            .with_random_state(42);
        forest.fit(&data).unwrap();

        assert_eq!(forest.sample_size(), 1);
        assert!(forest.trees().iter().all(|t| t.n_nodes() == 1));
        let score = forest.score_samples(&data).unwrap()[0];
        assert_eq!(score, -0.5);
        assert_eq!(
            forest.predict_one(&[3.0, 900.0, 30.0]).unwrap(),
            Label::Normal
        );
    }

    #[test]
    fn test_single_row_subsample() {
        let mut forest: IsolationForest<f64> = IsolationForest::new()
            .with_max_samples(MaxSamples::Count(1))
            .with_random_state(3);
        forest.fit(&small()).unwrap();
        for score in forest.score_samples(&small()).unwrap() {
            assert!(score.is_finite());
        }
    }

    #[test]
    fn test_overflowing_range_is_rejected() {
        let mut data = cluster(50, 6);
        data[[0, 1]] = -1.7e308;
        data[[1, 1]] = 1.7e308;
        let mut forest: IsolationForest<f64> = IsolationForest::new().with_random_state(1);
        assert!(matches!(
            forest.fit(&data),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(!forest.is_fitted());
    }

    #[test]
    fn test_check_structure() {
        let mut forest: IsolationForest<f64> = IsolationForest::new()
            .with_n_estimators(5)
            .with_random_state(42);
        assert!(forest.check_structure().is_err());

        forest.fit(&small()).unwrap();
        assert!(forest.check_structure().is_ok());

        forest.trees_mut()[2].nodes_mut()[0].left = Some(10_000);
        let reason = forest.check_structure().unwrap_err();
        assert!(reason.starts_with("tree 2"), "{reason}");
    }

    #[test]
    fn test_percentile_interpolates() {
        let values: Vec<f64> = vec![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(values.clone(), 0.0), 1.0);
        assert_eq!(percentile(values.clone(), 0.5), 3.0);
        assert_eq!(percentile(values.clone(), 1.0), 5.0);
        assert!((percentile(values, 0.1) - 1.4).abs() < 1e-12);
    }
}
