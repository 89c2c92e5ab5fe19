use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

pub const DEFAULT_TEST_SIZE: f32 = 0.2;

/// Row indices of a seeded train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles `0..n` with `seed` and holds out `ceil(n * test_size)` rows.
///
/// At least one row always stays in the training part.
pub fn train_test_split(n: usize, test_size: f32, seed: u64) -> Result<TrainTestSplit, ClassifierError> {
    if !(0.0..1.0).contains(&test_size) {
        return Err(ClassifierError::Validation(format!(
            "test_size must be in [0, 1), got {}",
            test_size
        )));
    }
    if n == 0 {
        return Err(ClassifierError::EmptyTrainingSet("nothing to split".into()));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    // Epsilon absorbs f32 representation error (0.2 * 20 must be 4, not 5)
    let n_test = ((n as f64 * test_size as f64 - 1e-6).ceil().max(0.0) as usize).min(n - 1);
    let train = indices.split_off(n_test);
    Ok(TrainTestSplit { train, test: indices })
}

/// Summary of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Fraction of rows the split was asked to hold out
    pub test_size: f32,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Accuracy on the held-out rows, `None` when nothing was held out
    pub held_out_accuracy: Option<f32>,
    pub labels: Vec<String>,
    pub vocabulary_size: usize,
}
