mod error;
mod vectorizer;
mod tree;
mod forest;
mod evaluation;
#[allow(clippy::module_inception)]
mod classifier;
pub mod builder;
mod utils;

pub use error::ClassifierError;
pub use vectorizer::{FeatureExtractor, TfidfVectorizer};
pub use tree::{DecisionTree, MaxFeatures};
pub use forest::{ForestConfig, RandomForest, DEFAULT_SEED, DEFAULT_TREE_COUNT};
pub use evaluation::{train_test_split, TrainTestSplit, TrainingReport, DEFAULT_TEST_SIZE};
pub use classifier::Classifier;
pub use builder::ClassifierBuilder;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Number of categories the classifier can predict
    pub num_classes: usize,
    /// Labels of the categories, sorted
    pub class_labels: Vec<String>,
    /// Number of terms in the fitted vocabulary
    pub vocabulary_size: usize,
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Seed used for the split and the forest
    pub seed: u64,
    /// Fingerprint of the training data
    pub fingerprint: String,
    /// Accuracy on the held-out split, if any rows were held out
    pub held_out_accuracy: Option<f32>,
}
