use std::sync::Arc;

use log::info;
use ndarray::Axis;

use super::classifier::Classifier;
use super::error::ClassifierError;
use super::evaluation::{train_test_split, TrainingReport, DEFAULT_TEST_SIZE};
use super::forest::{ForestConfig, RandomForest};
use super::vectorizer::TfidfVectorizer;
use crate::dataset::{TrainingExample, TrainingSet};

/// A builder for fitting a Classifier with a fluent interface.
#[derive(Debug, Clone)]
pub struct ClassifierBuilder {
    examples: Vec<TrainingExample>,
    config: ForestConfig,
    test_size: f32,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder {
    /// Creates an empty builder with the default forest configuration
    /// and a 20% held-out split.
    pub fn new() -> Self {
        Self {
            examples: Vec::new(),
            config: ForestConfig::default(),
            test_size: DEFAULT_TEST_SIZE,
        }
    }

    /// Sets the forest hyperparameters, including the seed used for the
    /// train/test split
    pub fn with_config(mut self, config: ForestConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the fraction of examples held out for evaluation.
    ///
    /// Held-out examples are never seen by the forest. `0.0` trains on everything.
    pub fn with_test_size(mut self, test_size: f32) -> Self {
        self.test_size = test_size;
        self
    }

    /// Validates a single labelled example:
    /// - Description must not be blank
    /// - Category must not be blank
    fn validate_example(description: &str, category: &str) -> Result<(), ClassifierError> {
        if description.trim().is_empty() {
            return Err(ClassifierError::Validation("Example description cannot be empty".into()));
        }
        if category.trim().is_empty() {
            return Err(ClassifierError::Validation(
                format!("Category for '{}' cannot be empty", description)
            ));
        }
        Ok(())
    }

    /// Adds one labelled expense description
    ///
    /// # Example
    /// ```
    /// use expense_categorizer::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .add_example("paid electricity bill", "Bills");
    /// assert!(builder.is_ok());
    /// ```
    pub fn add_example(
        mut self,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, ClassifierError> {
        let example = TrainingExample::new(description, category);
        Self::validate_example(&example.description, &example.category)?;
        self.examples.push(example);
        Ok(self)
    }

    /// Adds every example of an already validated training set
    pub fn with_training_set(mut self, set: &TrainingSet) -> Self {
        self.examples.extend(set.examples().iter().cloned());
        self
    }

    /// Fits the vectorizer on every description, then fits the forest on the
    /// training part of a seeded split and scores it on the held-out part.
    ///
    /// # Errors
    /// - `EmptyTrainingSet` if no examples were added
    /// - `Validation` if the test size is outside `[0, 1)` or the config is invalid
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        let set = TrainingSet::new(self.examples)?;
        let descriptions = set.descriptions();
        let categories = set.categories();

        let mut vectorizer = TfidfVectorizer::new();
        let features = vectorizer.fit_transform(&descriptions)?;

        let split = train_test_split(set.len(), self.test_size, self.config.seed)?;
        let x_train = features.select(Axis(0), &split.train);
        let y_train: Vec<&str> = split.train.iter().map(|&i| categories[i]).collect();

        let mut forest = RandomForest::new(self.config);
        forest.fit(x_train.view(), &y_train)?;

        let held_out_accuracy = if split.test.is_empty() {
            None
        } else {
            let x_test = features.select(Axis(0), &split.test);
            let y_test: Vec<&str> = split.test.iter().map(|&i| categories[i]).collect();
            Some(forest.accuracy(x_test.view(), &y_test)?)
        };

        let report = TrainingReport {
            test_size: self.test_size,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            held_out_accuracy,
            labels: forest.labels().to_vec(),
            vocabulary_size: vectorizer.vocabulary_size(),
        };
        match report.held_out_accuracy {
            Some(accuracy) => info!(
                "Trained on {} rows, held-out accuracy {:.1}% over {} rows",
                report.train_rows,
                accuracy * 100.0,
                report.test_rows
            ),
            None => info!("Trained on {} rows, nothing held out", report.train_rows),
        }

        Ok(Classifier {
            vectorizer: Arc::new(vectorizer),
            forest: Arc::new(forest),
            fingerprint: set.fingerprint(),
            report,
        })
    }
}
