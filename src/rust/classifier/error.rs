use std::fmt;
use std::io;

/// Represents the different types of errors that can occur while training or using the categorizer.
#[derive(Debug)]
pub enum ClassifierError {
    /// The training corpus had no usable examples
    EmptyTrainingSet(String),
    /// A vectorizer or model was used before it was fitted
    NotFitted(String),
    /// A feature vector did not match the fitted dimensionality
    DimensionMismatch { expected: usize, actual: usize },
    /// Error occurred while reading or writing persisted artifacts
    ArtifactIo(String),
    /// Error occurred while reading the training dataset
    Dataset(String),
    /// Error occurred due to invalid input parameters
    Validation(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTrainingSet(msg) => write!(f, "Empty training set: {}", msg),
            Self::NotFitted(what) => write!(f, "Not fitted: {} must be fitted before use", what),
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "Dimension mismatch: expected {} features, got {}",
                expected, actual
            ),
            Self::ArtifactIo(msg) => write!(f, "Artifact I/O error: {}", msg),
            Self::Dataset(msg) => write!(f, "Dataset error: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<csv::Error> for ClassifierError {
    fn from(err: csv::Error) -> Self {
        ClassifierError::Dataset(err.to_string())
    }
}

impl From<io::Error> for ClassifierError {
    fn from(err: io::Error) -> Self {
        ClassifierError::ArtifactIo(err.to_string())
    }
}
