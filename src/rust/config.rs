use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::artifact_store::ArtifactStore;
use crate::classifier::{ClassifierError, ForestConfig, DEFAULT_TEST_SIZE};

pub const DATASET_ENV_VAR: &str = "EXPENSE_CATEGORIZER_DATASET";
pub const TREES_ENV_VAR: &str = "EXPENSE_CATEGORIZER_TREES";
pub const SEED_ENV_VAR: &str = "EXPENSE_CATEGORIZER_SEED";

pub const DEFAULT_DATASET_PATH: &str = "data/categories_dataset.csv";

/// Everything the training pipeline needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizerConfig {
    /// CSV file with `description` and `category` columns
    pub dataset_path: PathBuf,
    /// Directory holding the persisted vectorizer and model
    pub artifacts_dir: PathBuf,
    pub forest: ForestConfig,
    /// Fraction of the dataset held out for evaluation
    pub test_size: f32,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            artifacts_dir: ArtifactStore::get_default_artifacts_dir(),
            forest: ForestConfig::default(),
            test_size: DEFAULT_TEST_SIZE,
        }
    }
}

impl CategorizerConfig {
    pub fn new(dataset_path: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            artifacts_dir: artifacts_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `EXPENSE_CATEGORIZER_*` environment variables.
    ///
    /// The artifacts directory honours `EXPENSE_CATEGORIZER_CACHE` through
    /// the default.
    pub fn from_env() -> Result<Self, ClassifierError> {
        let mut config = Self::default();
        if let Ok(path) = env::var(DATASET_ENV_VAR) {
            config.dataset_path = PathBuf::from(path);
        }
        if let Some(n_trees) = parse_env::<usize>(TREES_ENV_VAR)? {
            config.forest.n_trees = n_trees;
        }
        if let Some(seed) = parse_env::<u64>(SEED_ENV_VAR)? {
            config.forest.seed = seed;
        }
        Ok(config)
    }

    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    pub fn with_test_size(mut self, test_size: f32) -> Self {
        self.test_size = test_size;
        self
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ClassifierError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClassifierError::Validation(format!("{} must be a number, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
