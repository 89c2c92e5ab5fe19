//! Train-once orchestration around the classifier.
//!
//! A [`Pipeline`] owns the memoized classifier for the life of the process:
//! the first [`Pipeline::get_or_train`] call loads the persisted artifacts (or
//! fits and persists a fresh classifier), and every later call returns the
//! same instance. Construct one at the application's composition root and
//! share it by reference or `Arc`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};

use crate::artifact_store::ArtifactStore;
use crate::classifier::{Classifier, ClassifierBuilder, ClassifierError};
use crate::config::CategorizerConfig;
use crate::dataset::{category_options, TrainingSet};

/// Lifecycle of a pipeline. A failed training run returns to `Untrained`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Untrained,
    Training,
    Ready,
}

#[derive(Debug)]
pub struct Pipeline {
    config: CategorizerConfig,
    store: ArtifactStore,
    classifier: Mutex<Option<Arc<Classifier>>>,
    training: AtomicBool,
    ready: AtomicBool,
}

/// Clears the training flag when dropped, including on unwind
struct TrainingFlag<'a>(&'a AtomicBool);

impl<'a> TrainingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for TrainingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Pipeline {
    pub fn new(config: CategorizerConfig) -> Self {
        let store = ArtifactStore::new(&config.artifacts_dir);
        Self {
            config,
            store,
            classifier: Mutex::new(None),
            training: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CategorizerConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn state(&self) -> PipelineState {
        if self.training.load(Ordering::SeqCst) {
            PipelineState::Training
        } else if self.ready.load(Ordering::SeqCst) {
            PipelineState::Ready
        } else {
            PipelineState::Untrained
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<Classifier>>> {
        self.classifier.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the memoized classifier, loading or training it on first use.
    ///
    /// Concurrent first calls train once; the others wait for the result.
    /// On error nothing is memoized and the next call tries again.
    pub fn get_or_train(&self) -> Result<Arc<Classifier>, ClassifierError> {
        let mut slot = self.lock();
        if let Some(classifier) = slot.as_ref() {
            return Ok(Arc::clone(classifier));
        }

        let classifier = Arc::new(self.with_training_flag(|| self.load_or_fit())?);
        *slot = Some(Arc::clone(&classifier));
        self.ready.store(true, Ordering::SeqCst);
        Ok(classifier)
    }

    /// Refits from the dataset regardless of cached artifacts and replaces
    /// both the memoized classifier and the artifacts.
    pub fn retrain(&self) -> Result<Arc<Classifier>, ClassifierError> {
        let mut slot = self.lock();
        let classifier = Arc::new(self.with_training_flag(|| {
            let dataset = TrainingSet::from_csv_path(&self.config.dataset_path)?;
            self.fit_and_persist(&dataset)
        })?);
        *slot = Some(Arc::clone(&classifier));
        self.ready.store(true, Ordering::SeqCst);
        Ok(classifier)
    }

    fn with_training_flag<T>(&self, f: impl FnOnce() -> T) -> T {
        let _flag = TrainingFlag::raise(&self.training);
        f()
    }

    /// Whether a cached classifier was fitted with the configured
    /// hyperparameters and split
    fn matches_config(&self, cached: &Classifier) -> bool {
        cached.forest().config() == &self.config.forest
            && cached.report().test_size == self.config.test_size
    }

    fn load_or_fit(&self) -> Result<Classifier, ClassifierError> {
        let dataset = TrainingSet::from_csv_path(&self.config.dataset_path);

        match self.store.load() {
            Ok(Some(cached)) => match &dataset {
                Ok(set) if set.fingerprint() != cached.fingerprint() => {
                    info!("Training data changed since artifacts were written, retraining");
                }
                Ok(_) if !self.matches_config(&cached) => {
                    info!("Forest settings changed since artifacts were written, retraining");
                }
                Ok(_) => return Ok(cached),
                Err(e) => {
                    if !self.matches_config(&cached) {
                        warn!("Cached artifacts use different forest settings but cannot be refitted");
                    }
                    warn!("Using cached artifacts, training data unavailable: {}", e);
                    return Ok(cached);
                }
            },
            Ok(None) => info!("No cached artifacts, training from {:?}", self.config.dataset_path),
            Err(e) => warn!("Ignoring unreadable artifacts in {:?}: {}", self.store.artifacts_dir(), e),
        }

        self.fit_and_persist(&dataset?)
    }

    fn fit_and_persist(&self, dataset: &TrainingSet) -> Result<Classifier, ClassifierError> {
        let classifier = ClassifierBuilder::new()
            .with_config(self.config.forest.clone())
            .with_test_size(self.config.test_size)
            .with_training_set(dataset)
            .build()?;

        // The in-memory classifier is still usable when persisting fails
        if let Err(e) = self.store.save(&classifier) {
            warn!("Failed to persist artifacts to {:?}: {}", self.store.artifacts_dir(), e);
        }
        Ok(classifier)
    }

    /// Suggests a category for an expense description.
    ///
    /// Returns `None` for blank input without touching the classifier. Trains
    /// on first use if needed; any failure is logged and also yields `None`
    /// so the caller can fall back to manual entry.
    pub fn predict_category(&self, description: &str) -> Option<String> {
        if description.trim().is_empty() {
            return None;
        }

        let classifier = match self.get_or_train() {
            Ok(classifier) => classifier,
            Err(e) => {
                error!("Category prediction unavailable: {}", e);
                return None;
            }
        };

        match classifier.predict(description) {
            Ok(label) => Some(label),
            Err(e) => {
                warn!("Could not categorize {:?}: {}", description, e);
                None
            }
        }
    }

    /// Selector options for a description: the suggestion first, then the
    /// fallback categories.
    pub fn category_options(&self, description: &str) -> Vec<String> {
        category_options(self.predict_category(description).as_deref())
    }
}
