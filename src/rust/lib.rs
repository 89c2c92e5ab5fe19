//! Train-once expense categorization: predicts a spending category from the
//! free-text description of an expense.
//!
//! Descriptions are turned into TF-IDF vectors and classified by a random
//! forest. A [`Pipeline`] fits both once from a labelled CSV file, persists
//! them, and reloads them on later starts.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use expense_categorizer::{Classifier, ForestConfig};
//!
//! let classifier = Classifier::builder()
//!     .with_config(ForestConfig::default().with_trees(25))
//!     .with_test_size(0.0)
//!     .add_example("bought groceries at mart", "Food")?
//!     .add_example("grocery shopping", "Food")?
//!     .add_example("paid electricity bill", "Bills")?
//!     .add_example("water bill payment", "Bills")?
//!     .build()?;
//!
//! let (label, scores) = classifier.predict_with_scores("monthly water bill")?;
//! println!("Predicted category: {} ({:.0}%)", label, scores[&label] * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Pipeline
//!
//! The [`Pipeline`] is the call surface for an application: it trains at most
//! once per instance and never fails a prediction, answering `None` instead.
//!
//! ```rust,no_run
//! use expense_categorizer::{CategorizerConfig, Pipeline};
//!
//! let pipeline = Pipeline::new(CategorizerConfig::new(
//!     "data/categories_dataset.csv",
//!     "models",
//! ));
//! if let Some(category) = pipeline.predict_category("bus fare to work") {
//!     println!("Suggested category: {}", category);
//! }
//! ```

pub mod classifier;
pub mod artifact_store;
pub mod config;
pub mod dataset;
pub mod pipeline;

pub use classifier::{
    Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, FeatureExtractor, ForestConfig,
    MaxFeatures, RandomForest, TfidfVectorizer, TrainingReport,
};
pub use artifact_store::{ArtifactError, ArtifactStore};
pub use config::CategorizerConfig;
pub use dataset::{category_options, LabelSet, TrainingExample, TrainingSet, FALLBACK_CATEGORIES};
pub use pipeline::{Pipeline, PipelineState};

pub fn init_logger() {
    env_logger::init();
}
