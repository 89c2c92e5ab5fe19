use ndarray::{Array1, ArrayViewMut1};

pub(crate) fn normalize_vector(vec: &Array1<f32>) -> Array1<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec / norm
    } else {
        Array1::zeros(vec.len())
    }
}

pub(crate) fn normalize_in_place(mut row: ArrayViewMut1<f32>) {
    let norm: f32 = row.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        row.mapv_inplace(|x| x / norm);
    }
}

/// Splits text into lowercase word tokens of at least two characters.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(|token| token.to_lowercase())
        .collect()
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
