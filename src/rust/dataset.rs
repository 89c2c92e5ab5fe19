//! Labelled training data for the categorizer.
//!
//! The dataset is a CSV file with (at least) a `description` and a `category`
//! column, one expense per row:
//!
//! ```text
//! description,category
//! bought groceries at mart,Food
//! paid electricity bill,Bills
//! ```

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::ClassifierError;

/// Categories always offered to the user next to a prediction
pub const FALLBACK_CATEGORIES: [&str; 5] = ["Food", "Transport", "Entertainment", "Bills", "Others"];

/// A single labelled expense description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub description: String,
    pub category: String,
}

impl TrainingExample {
    pub fn new(description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
        }
    }
}

/// The distinct categories of a training set, sorted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Ordered, validated training examples. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSet {
    examples: Vec<TrainingExample>,
}

impl TrainingSet {
    /// Validates and wraps a list of examples.
    ///
    /// # Errors
    /// - `EmptyTrainingSet` if `examples` is empty
    /// - `Validation` if any description or category is blank
    pub fn new(examples: Vec<TrainingExample>) -> Result<Self, ClassifierError> {
        if examples.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet("training set has no rows".into()));
        }
        for (i, example) in examples.iter().enumerate() {
            Self::validate_example(i + 1, example)?;
        }
        Ok(Self { examples })
    }

    fn validate_example(row: usize, example: &TrainingExample) -> Result<(), ClassifierError> {
        if example.description.trim().is_empty() {
            return Err(ClassifierError::Validation(format!("Row {}: description is empty", row)));
        }
        if example.category.trim().is_empty() {
            return Err(ClassifierError::Validation(format!("Row {}: category is empty", row)));
        }
        Ok(())
    }

    /// Reads a CSV file with `description` and `category` columns
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ClassifierError::Dataset(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let set = Self::from_reader(file)?;
        info!("Loaded {} training examples from {}", set.len(), path.display());
        Ok(set)
    }

    /// Reads CSV data with `description` and `category` columns from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ClassifierError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        for required in ["description", "category"] {
            if !headers.iter().any(|h| h == required) {
                return Err(ClassifierError::Dataset(format!(
                    "Missing required column '{}'",
                    required
                )));
            }
        }

        let mut examples = Vec::new();
        for record in csv_reader.deserialize() {
            let example: TrainingExample = record?;
            examples.push(example);
        }
        Self::new(examples)
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.description.as_str()).collect()
    }

    pub fn categories(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.category.as_str()).collect()
    }

    pub fn label_set(&self) -> LabelSet {
        self.examples.iter().map(|e| e.category.clone()).collect()
    }

    /// SHA-256 over every example in order, as lowercase hex
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for example in &self.examples {
            hasher.update(example.description.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(example.category.as_bytes());
            hasher.update(b"\x1e");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Options for a category selector, most relevant first.
///
/// The prediction (if any) leads, followed by the fallback categories it does
/// not duplicate. Without a prediction a blank entry leads so nothing is
/// preselected. Predicted labels outside the fallback list are kept as-is.
pub fn category_options(predicted: Option<&str>) -> Vec<String> {
    let mut options = Vec::with_capacity(FALLBACK_CATEGORIES.len() + 1);
    match predicted {
        Some(label) if !label.trim().is_empty() => {
            options.push(label.to_string());
            options.extend(
                FALLBACK_CATEGORIES
                    .iter()
                    .filter(|&&c| c != label)
                    .map(|c| c.to_string()),
            );
        }
        _ => {
            options.push(String::new());
            options.extend(FALLBACK_CATEGORIES.iter().map(|c| c.to_string()));
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
id,category,description
1,Food,bought groceries at mart
2,Bills, paid electricity bill
3,Food,bought groceries at mart
";

    #[test]
    fn test_reads_named_columns_in_any_order() {
        let set = TrainingSet::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.examples()[1], TrainingExample::new("paid electricity bill", "Bills"));
        // duplicates are kept
        assert_eq!(set.descriptions()[0], set.descriptions()[2]);
    }

    #[test]
    fn test_label_set() {
        let set = TrainingSet::from_reader(CSV.as_bytes()).unwrap();
        let labels = set.label_set();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains("Food"));
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["Bills", "Food"]);
    }

    #[test]
    fn test_missing_column() {
        let result = TrainingSet::from_reader("description,label\nbus fare,Transport\n".as_bytes());
        assert!(matches!(result, Err(ClassifierError::Dataset(_))));
    }

    #[test]
    fn test_blank_field_is_rejected() {
        let result = TrainingSet::from_reader("description,category\nbus fare,\n".as_bytes());
        assert!(matches!(result, Err(ClassifierError::Validation(msg)) if msg.contains("Row 1")));
    }

    #[test]
    fn test_header_only_is_empty() {
        let result = TrainingSet::from_reader("description,category\n".as_bytes());
        assert!(matches!(result, Err(ClassifierError::EmptyTrainingSet(_))));
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let a = TrainingSet::new(vec![
            TrainingExample::new("bus fare", "Transport"),
            TrainingExample::new("movie tickets", "Entertainment"),
        ])
        .unwrap();
        let b = TrainingSet::new(vec![
            TrainingExample::new("movie tickets", "Entertainment"),
            TrainingExample::new("bus fare", "Transport"),
        ])
        .unwrap();
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_category_options() {
        assert_eq!(
            category_options(Some("Bills")),
            vec!["Bills", "Food", "Transport", "Entertainment", "Others"]
        );
        assert_eq!(
            category_options(Some("Health")),
            vec!["Health", "Food", "Transport", "Entertainment", "Bills", "Others"]
        );
        assert_eq!(
            category_options(None),
            vec!["", "Food", "Transport", "Entertainment", "Bills", "Others"]
        );
    }
}
