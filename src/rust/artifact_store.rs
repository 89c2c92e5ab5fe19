use std::env;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::{Classifier, ClassifierError, RandomForest, TfidfVectorizer, TrainingReport};

pub const CACHE_ENV_VAR: &str = "EXPENSE_CATEGORIZER_CACHE";
pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const MODEL_FILE: &str = "model.json";

/// Bumped whenever the on-disk layout changes; older files are treated as corrupt
const ARTIFACT_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to (de)serialize {file}: {source}")]
    Serialization {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported artifact version {found} in {file} (expected {expected})")]
    UnsupportedVersion {
        file: String,
        expected: u32,
        found: u32,
    },
    #[error("Artifact pair mismatch: vectorizer fitted on {vectorizer}, model fitted on {model}")]
    FingerprintMismatch { vectorizer: String, model: String },
    #[error("Invalid artifact: {0}")]
    Invalid(#[from] ClassifierError),
}

impl From<ArtifactError> for ClassifierError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Invalid(inner) => inner,
            other => ClassifierError::ArtifactIo(other.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ArtifactFile<T> {
    version: u32,
    fingerprint: String,
    payload: T,
}

#[derive(Serialize, Deserialize)]
struct ModelPayload<F, R> {
    forest: F,
    report: R,
}

/// Persists a fitted classifier as two files: the vectorizer and the model.
///
/// Both files carry the fingerprint of the training data so a torn pair
/// (one file replaced, the other not) is detected on load.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    artifacts_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a new ArtifactStore in the default artifacts directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_artifacts_dir())
    }

    /// Returns the default artifacts directory path
    pub fn get_default_artifacts_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(CACHE_ENV_VAR) {
            return PathBuf::from(path).join("artifacts");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("expense-categorizer").join("artifacts");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("expense-categorizer").join("artifacts");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("expense-categorizer").join("artifacts")
    }

    /// Creates a store rooted at `artifacts_dir`. The directory is created lazily on save.
    pub fn new<P: AsRef<Path>>(artifacts_dir: P) -> Self {
        Self {
            artifacts_dir: artifacts_dir.as_ref().to_path_buf(),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn vectorizer_path(&self) -> PathBuf {
        self.artifacts_dir.join(VECTORIZER_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifacts_dir.join(MODEL_FILE)
    }

    pub fn is_present(&self) -> bool {
        let vectorizer_path = self.vectorizer_path();
        let model_path = self.model_path();
        log::debug!("Checking for artifacts:");
        log::debug!("  Vectorizer path: {:?} (exists: {})", vectorizer_path, vectorizer_path.exists());
        log::debug!("  Model path: {:?} (exists: {})", model_path, model_path.exists());
        vectorizer_path.exists() && model_path.exists()
    }

    /// Writes both artifacts, each through a temporary file renamed into place
    pub fn save(&self, classifier: &Classifier) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.artifacts_dir)?;

        let vectorizer = ArtifactFile {
            version: ARTIFACT_VERSION,
            fingerprint: classifier.fingerprint().to_string(),
            payload: classifier.vectorizer(),
        };
        let model = ArtifactFile {
            version: ARTIFACT_VERSION,
            fingerprint: classifier.fingerprint().to_string(),
            payload: ModelPayload {
                forest: classifier.forest(),
                report: classifier.report(),
            },
        };

        let vectorizer_path = self.vectorizer_path();
        let model_path = self.model_path();
        write_json_atomic(&vectorizer_path, &vectorizer)?;
        write_json_atomic(&model_path, &model)?;

        log::info!("Saved vectorizer to {:?}", vectorizer_path);
        log::info!("Saved model to {:?}", model_path);
        Ok(())
    }

    /// Loads a previously saved classifier.
    ///
    /// Returns `Ok(None)` if either file is missing, and an error if the files
    /// exist but cannot be read, parsed, or do not belong together.
    pub fn load(&self) -> Result<Option<Classifier>, ArtifactError> {
        if !self.is_present() {
            log::info!("No artifacts in {:?}", self.artifacts_dir);
            return Ok(None);
        }

        let vectorizer: ArtifactFile<TfidfVectorizer> = read_json(&self.vectorizer_path())?;
        let model: ArtifactFile<ModelPayload<RandomForest, TrainingReport>> = read_json(&self.model_path())?;

        for (file, version) in [(VECTORIZER_FILE, vectorizer.version), (MODEL_FILE, model.version)] {
            if version != ARTIFACT_VERSION {
                return Err(ArtifactError::UnsupportedVersion {
                    file: file.to_string(),
                    expected: ARTIFACT_VERSION,
                    found: version,
                });
            }
        }
        if vectorizer.fingerprint != model.fingerprint {
            return Err(ArtifactError::FingerprintMismatch {
                vectorizer: vectorizer.fingerprint,
                model: model.fingerprint,
            });
        }

        let classifier = Classifier::from_parts(
            vectorizer.payload,
            model.payload.forest,
            model.fingerprint,
            model.payload.report,
        )?;
        log::info!("Loaded classifier from {:?}", self.artifacts_dir);
        Ok(Some(classifier))
    }

    pub fn remove(&self) -> Result<(), ArtifactError> {
        let vectorizer_path = self.vectorizer_path();
        let model_path = self.model_path();

        if vectorizer_path.exists() {
            fs::remove_file(&vectorizer_path)?;
        }
        if model_path.exists() {
            fs::remove_file(&model_path)?;
        }
        Ok(())
    }

    /// SHA-256 of a file as lowercase hex
    pub fn file_digest(path: &Path) -> Result<String, ArtifactError> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|source| ArtifactError::Serialization {
        file: file_name(path),
        source,
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<(), ArtifactError> {
    // Temp file lives next to the target so the rename stays on one filesystem
    let temp_path = path.with_extension("json.tmp");

    let result = (|| -> Result<(), ArtifactError> {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, data).map_err(|source| ArtifactError::Serialization {
            file: file_name(path),
            source,
        })?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ForestConfig;
    use tempfile::TempDir;

    fn small_classifier() -> Classifier {
        Classifier::builder()
            .with_config(ForestConfig::default().with_trees(5))
            .with_test_size(0.0)
            .add_example("bus fare", "Transport").unwrap()
            .add_example("movie tickets", "Entertainment").unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_paths() {
        let store = ArtifactStore::new("/tmp/categorizer-test");
        assert!(store.vectorizer_path().ends_with("vectorizer.json"));
        assert!(store.model_path().ends_with("model.json"));
    }

    #[test]
    fn test_default_artifacts_dir() {
        // Test with environment variable
        env::set_var(CACHE_ENV_VAR, "/tmp/test-cache");
        let path = ArtifactStore::get_default_artifacts_dir();
        assert!(path.to_str().unwrap().contains("/tmp/test-cache/artifacts"));
        assert_eq!(ArtifactStore::new_default().artifacts_dir(), path.as_path());
        env::remove_var(CACHE_ENV_VAR);

        // Test without environment variable
        let path = ArtifactStore::get_default_artifacts_dir();
        assert!(path.to_str().unwrap().contains("expense-categorizer/artifacts"));
    }

    #[test]
    fn test_missing_artifacts_load_as_none() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(!store.is_present());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"));
        store.save(&small_classifier()).unwrap();

        let mut names: Vec<String> = fs::read_dir(store.artifacts_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["model.json", "vectorizer.json"]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&small_classifier()).unwrap();
        fs::write(store.model_path(), "corrupted data").unwrap();

        assert!(matches!(store.load(), Err(ArtifactError::Serialization { .. })));
    }

    #[test]
    fn test_torn_pair_is_detected() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let store_a = ArtifactStore::new(dir_a.path());
        let store_b = ArtifactStore::new(dir_b.path());

        store_a.save(&small_classifier()).unwrap();
        let other = Classifier::builder()
            .with_test_size(0.0)
            .add_example("water bill", "Bills").unwrap()
            .build()
            .unwrap();
        store_b.save(&other).unwrap();

        fs::copy(store_b.model_path(), store_a.model_path()).unwrap();
        assert!(matches!(store_a.load(), Err(ArtifactError::FingerprintMismatch { .. })));
    }

    #[test]
    fn test_remove_and_digest() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&small_classifier()).unwrap();

        let digest = ArtifactStore::file_digest(&store.model_path()).unwrap();
        assert_eq!(digest.len(), 64);

        store.remove().unwrap();
        assert!(!store.is_present());
    }
}
