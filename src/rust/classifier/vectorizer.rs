use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{normalize_in_place, normalize_vector, tokenize};

/// Turns free text into fixed-size numeric vectors.
///
/// Implementors must keep the feature space fixed once fitted: calling
/// `transform` never adds dimensions.
pub trait FeatureExtractor {
    /// Number of dimensions of the produced vectors, if fitted
    fn dimensions(&self) -> Option<usize>;

    /// Converts a single text into a feature vector.
    ///
    /// # Errors
    /// - `NotFitted` if the extractor has not been fitted yet
    fn transform(&self, text: &str) -> Result<Array1<f32>, ClassifierError>;

    /// Converts a batch of texts into a matrix with one row per text.
    fn transform_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Array2<f32>, ClassifierError> {
        let dims = self.dimensions()
            .ok_or_else(|| ClassifierError::NotFitted("feature extractor".into()))?;
        let mut matrix = Array2::zeros((texts.len(), dims));
        for (i, text) in texts.iter().enumerate() {
            matrix.row_mut(i).assign(&self.transform(text.as_ref())?);
        }
        Ok(matrix)
    }
}

/// Term-frequency / inverse-document-frequency vectorizer.
///
/// The vocabulary is every token seen during fitting, indexed in
/// lexicographic order. Weights use the smoothed idf
/// `ln((1 + n) / (1 + df)) + 1` and each row is L2-normalised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: Option<BTreeMap<String, usize>>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Creates an unfitted vectorizer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.vocabulary.is_some()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.as_ref().map_or(0, |v| v.len())
    }

    /// Returns the fitted vocabulary (term → column index)
    pub fn vocabulary(&self) -> Option<&BTreeMap<String, usize>> {
        self.vocabulary.as_ref()
    }

    /// Returns the idf weight of a term, if it is in the vocabulary
    pub fn idf(&self, term: &str) -> Option<f32> {
        let index = *self.vocabulary.as_ref()?.get(term)?;
        self.idf.get(index).copied()
    }

    /// Learns the vocabulary and idf weights from the corpus.
    ///
    /// Refitting replaces the previous vocabulary entirely.
    ///
    /// # Errors
    /// - `EmptyTrainingSet` if the corpus is empty or contains no tokens
    pub fn fit<S: AsRef<str>>(&mut self, corpus: &[S]) -> Result<(), ClassifierError> {
        if corpus.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet("cannot fit vectorizer on an empty corpus".into()));
        }

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for text in corpus {
            let unique: BTreeSet<String> = tokenize(text.as_ref()).into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet(
                "corpus produced an empty vocabulary".into(),
            ));
        }

        let n_documents = corpus.len() as f32;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + n_documents) / (1.0 + df as f32)).ln() + 1.0);
            vocabulary.insert(term, index);
        }

        debug!("Fitted vocabulary of {} terms over {} documents", vocabulary.len(), corpus.len());
        self.vocabulary = Some(vocabulary);
        self.idf = idf;
        Ok(())
    }

    /// Fits on the corpus and returns its matrix of training vectors
    pub fn fit_transform<S: AsRef<str>>(&mut self, corpus: &[S]) -> Result<Array2<f32>, ClassifierError> {
        self.fit(corpus)?;
        self.transform_batch(corpus)
    }

    /// Checks that vocabulary indices are exactly `0..len`, each with an idf weight
    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        let Some(vocabulary) = &self.vocabulary else {
            return Ok(());
        };
        if self.idf.len() != vocabulary.len() {
            return Err(ClassifierError::Validation(format!(
                "vocabulary of {} terms has {} idf weights",
                vocabulary.len(),
                self.idf.len()
            )));
        }
        let mut seen = vec![false; vocabulary.len()];
        for (term, &index) in vocabulary {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(ClassifierError::Validation(format!(
                        "term '{}' has out-of-range or duplicate index {}",
                        term, index
                    )))
                }
            }
        }
        Ok(())
    }

    fn term_counts(vocabulary: &BTreeMap<String, usize>, text: &str) -> HashMap<usize, f32> {
        let mut counts = HashMap::new();
        for token in tokenize(text) {
            // Out-of-vocabulary tokens carry no weight
            if let Some(&index) = vocabulary.get(&token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }
        counts
    }
}

impl FeatureExtractor for TfidfVectorizer {
    fn dimensions(&self) -> Option<usize> {
        self.vocabulary.as_ref().map(|v| v.len())
    }

    fn transform(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        let vocabulary = self.vocabulary.as_ref()
            .ok_or_else(|| ClassifierError::NotFitted("TfidfVectorizer".into()))?;

        let mut vector = Array1::zeros(vocabulary.len());
        for (index, count) in Self::term_counts(vocabulary, text) {
            vector[index] = count * self.idf[index];
        }
        Ok(normalize_vector(&vector))
    }

    fn transform_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Array2<f32>, ClassifierError> {
        let vocabulary = self.vocabulary.as_ref()
            .ok_or_else(|| ClassifierError::NotFitted("TfidfVectorizer".into()))?;

        let mut matrix = Array2::zeros((texts.len(), vocabulary.len()));
        for (i, text) in texts.iter().enumerate() {
            let mut row = matrix.row_mut(i);
            for (index, count) in Self::term_counts(vocabulary, text.as_ref()) {
                row[index] = count * self.idf[index];
            }
            normalize_in_place(row);
        }
        Ok(matrix)
    }
}
