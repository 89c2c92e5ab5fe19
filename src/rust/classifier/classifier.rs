use std::collections::HashMap;
use std::sync::Arc;

use ndarray::Array1;

use super::error::ClassifierError;
use super::evaluation::TrainingReport;
use super::forest::RandomForest;
use super::utils::is_blank;
use super::vectorizer::{FeatureExtractor, TfidfVectorizer};

/// A fitted expense categorizer: TF-IDF features feeding a random forest.
///
/// # Thread Safety
///
/// This type is `Send + Sync`: the fitted parts are immutable and shared
/// through `Arc`, so cloning is cheap and clones can be handed to other threads.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use expense_categorizer::{Classifier, ForestConfig};
///
/// let classifier = Classifier::builder()
///     .with_config(ForestConfig::default().with_trees(10))
///     .add_example("bus fare to work", "Transport")?
///     .add_example("train ticket", "Transport")?
///     .add_example("groceries at the market", "Food")?
///     .add_example("lunch groceries", "Food")?
///     .with_test_size(0.0)
///     .build()?;
///
/// let label = classifier.predict("bus ticket")?;
/// assert!(label == "Transport" || label == "Food");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Classifier {
    pub(crate) vectorizer: Arc<TfidfVectorizer>,
    pub(crate) forest: Arc<RandomForest>,
    pub(crate) fingerprint: String,
    pub(crate) report: TrainingReport,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Assembles a classifier from already fitted parts.
    ///
    /// # Errors
    /// - `NotFitted` if either part is unfitted
    /// - `Validation` if the vectorizer's vocabulary and weights disagree or a
    ///   tree refers to missing features, classes or nodes
    /// - `DimensionMismatch` if the vectorizer and forest disagree on feature count
    pub fn from_parts(
        vectorizer: TfidfVectorizer,
        forest: RandomForest,
        fingerprint: String,
        report: TrainingReport,
    ) -> Result<Self, ClassifierError> {
        let dims = vectorizer.dimensions()
            .ok_or_else(|| ClassifierError::NotFitted("TfidfVectorizer".into()))?;
        vectorizer.validate()?;
        forest.validate()?;
        let expected = forest.n_features()
            .ok_or_else(|| ClassifierError::NotFitted("RandomForest".into()))?;
        if dims != expected {
            return Err(ClassifierError::DimensionMismatch { expected, actual: dims });
        }
        Ok(Self {
            vectorizer: Arc::new(vectorizer),
            forest: Arc::new(forest),
            fingerprint,
            report,
        })
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        let config = self.forest.config();
        super::ClassifierInfo {
            num_classes: self.forest.labels().len(),
            class_labels: self.forest.labels().to_vec(),
            vocabulary_size: self.vectorizer.vocabulary_size(),
            n_trees: self.forest.tree_count(),
            seed: config.seed,
            fingerprint: self.fingerprint.clone(),
            held_out_accuracy: self.report.held_out_accuracy,
        }
    }

    /// Labels the classifier can produce, sorted
    pub fn labels(&self) -> &[String] {
        self.forest.labels()
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Fingerprint of the training data this classifier was fitted on
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    fn features(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        if is_blank(text) {
            return Err(ClassifierError::Validation("Input text cannot be empty".into()));
        }
        self.vectorizer.transform(text)
    }

    /// Predicts the category of an expense description.
    ///
    /// Always returns one of `labels()`, even for text sharing no vocabulary
    /// with the training data.
    pub fn predict(&self, text: &str) -> Result<String, ClassifierError> {
        let features = self.features(text)?;
        self.forest.predict(features.view())
    }

    /// Predicts the category and returns the vote share of every label.
    ///
    /// # Returns
    /// A tuple containing:
    /// * The predicted label
    /// * A HashMap of labels to their share of the forest's vote (0.0 to 1.0)
    pub fn predict_with_scores(&self, text: &str) -> Result<(String, HashMap<String, f32>), ClassifierError> {
        let features = self.features(text)?;
        let proba = self.forest.predict_proba(features.view())?;
        let label = self.forest.predict(features.view())?;

        let scores = self.forest.labels()
            .iter()
            .cloned()
            .zip(proba)
            .collect();
        Ok((label, scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ForestConfig, TfidfVectorizer};

    fn setup_test_classifier() -> Classifier {
        Classifier::builder()
            .with_config(ForestConfig::default().with_trees(50))
            .with_test_size(0.0)
            .add_example("movie tickets", "Entertainment").unwrap()
            .add_example("concert tickets", "Entertainment").unwrap()
            .add_example("bus fare", "Transport").unwrap()
            .add_example("taxi fare", "Transport").unwrap()
            .build()
            .expect("Failed to create classifier")
    }

    #[test]
    fn test_class_info() {
        let classifier = setup_test_classifier();
        let info = classifier.info();
        assert_eq!(info.num_classes, 2);
        assert_eq!(info.class_labels, vec!["Entertainment", "Transport"]);
        assert_eq!(info.n_trees, 50);
        assert_eq!(info.vocabulary_size, 6);
        assert!(info.held_out_accuracy.is_none());
    }

    #[test]
    fn test_scores_cover_every_label() {
        let classifier = setup_test_classifier();
        let (label, scores) = classifier.predict_with_scores("taxi fare home").unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(label, "Transport");
        assert!(scores["Transport"] > scores["Entertainment"]);
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let classifier = setup_test_classifier();
        assert!(matches!(classifier.predict("  "), Err(ClassifierError::Validation(_))));
    }

    #[test]
    fn test_unknown_words_still_get_a_label() {
        let classifier = setup_test_classifier();
        let label = classifier.predict("zzz qqq").unwrap();
        assert!(classifier.labels().contains(&label));
    }

    #[test]
    fn test_from_parts_requires_fitted_parts() {
        let classifier = setup_test_classifier();
        let result = Classifier::from_parts(
            TfidfVectorizer::new(),
            classifier.forest().clone(),
            String::new(),
            classifier.report().clone(),
        );
        assert!(matches!(result, Err(ClassifierError::NotFitted(_))));

        let mut other = TfidfVectorizer::new();
        other.fit(&["only three words"]).unwrap();
        let result = Classifier::from_parts(
            other,
            classifier.forest().clone(),
            String::new(),
            classifier.report().clone(),
        );
        assert!(matches!(result, Err(ClassifierError::DimensionMismatch { expected: 6, actual: 3 })));
    }
}
