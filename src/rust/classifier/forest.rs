use std::collections::BTreeSet;

use log::{debug, info};
use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::tree::{DecisionTree, MaxFeatures, TreeParams};

pub const DEFAULT_TREE_COUNT: usize = 100;
pub const DEFAULT_SEED: u64 = 42;

/// Hyperparameters of the random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    /// Maximum tree depth, unlimited when `None`
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples than this become leaves
    pub min_samples_split: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample for every tree
    pub bootstrap: bool,
    /// Seed for bootstrap draws and feature sampling
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREE_COUNT,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForestConfig {
    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.n_trees == 0 {
            return Err(ClassifierError::Validation("Forest must have at least one tree".into()));
        }
        if self.max_depth == Some(0) {
            return Err(ClassifierError::Validation("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

/// Bagged ensemble of decision trees voting by averaged class distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    labels: Vec<String>,
    n_features: Option<usize>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Creates an unfitted forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            labels: Vec::new(),
            n_features: None,
            trees: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Class labels in sorted order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Fits the forest on the rows of `x` labelled by `y`.
    ///
    /// # Errors
    /// - `EmptyTrainingSet` if `x` has no rows
    /// - `Validation` if `x` and `y` disagree in length or the config is invalid
    pub fn fit<S: AsRef<str>>(&mut self, x: ArrayView2<f32>, y: &[S]) -> Result<(), ClassifierError> {
        self.config.validate()?;
        if x.nrows() == 0 {
            return Err(ClassifierError::EmptyTrainingSet("cannot fit forest without rows".into()));
        }
        if x.nrows() != y.len() {
            return Err(ClassifierError::Validation(format!(
                "Feature rows ({}) and labels ({}) differ in length",
                x.nrows(),
                y.len()
            )));
        }

        let labels: Vec<String> = y
            .iter()
            .map(|label| label.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let encoded: Vec<usize> = y
            .iter()
            .map(|label| labels.binary_search_by(|l| l.as_str().cmp(label.as_ref())).unwrap_or(0))
            .collect();

        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            max_features: self.config.max_features.resolve(x.ncols()),
        };

        info!(
            "Fitting {} trees on {} rows x {} features ({} classes)",
            self.config.n_trees,
            x.nrows(),
            x.ncols(),
            labels.len()
        );

        let n = x.nrows();
        let mut master = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.n_trees);
        for _ in 0..self.config.n_trees {
            let mut rng = ChaCha8Rng::seed_from_u64(master.gen::<u64>());
            let samples: Vec<usize> = if self.config.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            trees.push(DecisionTree::fit(x, &encoded, samples, labels.len(), params, &mut rng));
        }
        debug!(
            "Grew {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(|t| t.depth()).sum::<usize>() as f32 / trees.len() as f32
        );

        self.labels = labels;
        self.n_features = Some(x.ncols());
        self.trees = trees;
        Ok(())
    }

    /// Checks a deserialized forest so prediction cannot index out of bounds
    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        let n_features = self.n_features
            .ok_or_else(|| ClassifierError::NotFitted("RandomForest".into()))?;
        if self.labels.is_empty() || self.trees.is_empty() {
            return Err(ClassifierError::Validation("Forest has no labels or no trees".into()));
        }
        for tree in &self.trees {
            tree.validate(n_features, self.labels.len())?;
        }
        Ok(())
    }

    fn check_input(&self, x: &ArrayView1<f32>) -> Result<(), ClassifierError> {
        let expected = self.n_features
            .ok_or_else(|| ClassifierError::NotFitted("RandomForest".into()))?;
        if x.len() != expected {
            return Err(ClassifierError::DimensionMismatch {
                expected,
                actual: x.len(),
            });
        }
        Ok(())
    }

    /// Returns the averaged class distribution, one probability per label in `labels()` order.
    pub fn predict_proba(&self, x: ArrayView1<f32>) -> Result<Vec<f32>, ClassifierError> {
        self.check_input(&x)?;

        let mut totals = vec![0.0f32; self.labels.len()];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.leaf_distribution(x.view())) {
                *total += p;
            }
        }
        let n_trees = self.trees.len() as f32;
        totals.iter_mut().for_each(|t| *t /= n_trees);
        Ok(totals)
    }

    /// Predicts exactly one label. Ties go to the label that sorts first.
    pub fn predict(&self, x: ArrayView1<f32>) -> Result<String, ClassifierError> {
        let proba = self.predict_proba(x)?;
        let mut best = 0;
        for (i, &p) in proba.iter().enumerate() {
            if p > proba[best] {
                best = i;
            }
        }
        Ok(self.labels[best].clone())
    }

    /// Fraction of rows whose prediction matches the expected label
    pub fn accuracy<S: AsRef<str>>(&self, x: ArrayView2<f32>, y: &[S]) -> Result<f32, ClassifierError> {
        if x.nrows() == 0 {
            return Ok(0.0);
        }
        let mut correct = 0;
        for (row, expected) in x.rows().into_iter().zip(y) {
            if self.predict(row)? == expected.as_ref() {
                correct += 1;
            }
        }
        Ok(correct as f32 / x.nrows() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data() -> (ndarray::Array2<f32>, Vec<&'static str>) {
        let x = array![
            [0.9, 0.0, 0.0],
            [0.8, 0.1, 0.0],
            [0.7, 0.0, 0.1],
            [0.0, 0.9, 0.0],
            [0.1, 0.8, 0.0],
            [0.0, 0.7, 0.2],
            [0.0, 0.0, 0.9],
            [0.0, 0.1, 0.8],
            [0.1, 0.0, 0.7],
        ];
        let y = vec!["Food", "Food", "Food", "Bills", "Bills", "Bills", "Transport", "Transport", "Transport"];
        (x, y)
    }

    #[test]
    fn test_fit_and_predict() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(ForestConfig::default().with_trees(25));
        forest.fit(x.view(), &y).unwrap();

        assert_eq!(forest.labels(), &["Bills", "Food", "Transport"]);
        assert_eq!(forest.tree_count(), 25);
        assert_eq!(forest.predict(array![1.0, 0.0, 0.0].view()).unwrap(), "Food");
        assert_eq!(forest.predict(array![0.0, 0.0, 1.0].view()).unwrap(), "Transport");
        assert!(forest.accuracy(x.view(), &y).unwrap() > 0.8);
    }

    #[test]
    fn test_proba_sums_to_one() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(ForestConfig::default().with_trees(10));
        forest.fit(x.view(), &y).unwrap();

        let proba = forest.predict_proba(array![0.3, 0.3, 0.3].view()).unwrap();
        assert_eq!(proba.len(), 3);
        assert!((proba.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = toy_data();
        let mut a = RandomForest::new(ForestConfig::default().with_trees(10).with_seed(3));
        let mut b = RandomForest::new(ForestConfig::default().with_trees(10).with_seed(3));
        a.fit(x.view(), &y).unwrap();
        b.fit(x.view(), &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_before_fit() {
        let forest = RandomForest::new(ForestConfig::default());
        assert!(matches!(
            forest.predict(array![0.0, 1.0].view()),
            Err(ClassifierError::NotFitted(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(ForestConfig::default().with_trees(5));
        forest.fit(x.view(), &y).unwrap();
        assert!(matches!(
            forest.predict(array![0.0, 1.0].view()),
            Err(ClassifierError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let (x, _) = toy_data();
        let mut forest = RandomForest::new(ForestConfig::default());
        assert!(matches!(
            forest.fit(x.view(), &["Food"]),
            Err(ClassifierError::Validation(_))
        ));

        let mut forest = RandomForest::new(ForestConfig::default().with_trees(0));
        assert!(forest.fit(x.view(), &["Food"; 9]).is_err());

        let empty = ndarray::Array2::<f32>::zeros((0, 3));
        let labels: Vec<String> = Vec::new();
        let mut forest = RandomForest::new(ForestConfig::default());
        assert!(matches!(
            forest.fit(empty.view(), &labels),
            Err(ClassifierError::EmptyTrainingSet(_))
        ));
    }

    #[test]
    fn test_fitted_forest_validates() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(ForestConfig::default().with_trees(5));
        assert!(matches!(forest.validate(), Err(ClassifierError::NotFitted(_))));

        forest.fit(x.view(), &y).unwrap();
        assert!(forest.validate().is_ok());

        // A feature count smaller than the trees were grown on
        forest.n_features = Some(1);
        assert!(matches!(forest.validate(), Err(ClassifierError::Validation(_))));
    }

    #[test]
    fn test_single_class_always_predicted() {
        let x = array![[0.1, 0.2], [0.3, 0.4]];
        let mut forest = RandomForest::new(ForestConfig::default().with_trees(3));
        forest.fit(x.view(), &["Others", "Others"]).unwrap();
        assert_eq!(forest.predict(array![5.0, 5.0].view()).unwrap(), "Others");
    }
}
