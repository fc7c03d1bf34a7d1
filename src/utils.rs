use ndarray::{Array2, Axis};
use std::env;
use std::path::{Path, PathBuf};

/// Default base folder for model directories.
#[must_use]
pub fn default_model_root() -> PathBuf {
    env::home_dir().map_or_else(
        || Path::new(".simbench_models").to_owned(),
        |p| p.join(".cache/simbench"),
    )
}

/// L2-normalize each row of a batch of embeddings.
///
/// Zero-magnitude rows are left untouched rather than divided into NaN.
#[must_use]
pub fn l2_normalize_rows(mut embeddings: Array2<f32>) -> Array2<f32> {
    let norms = embeddings.map_axis(Axis(1), |row| {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 { norm } else { 1.0 }
    });
    embeddings /= &norms.insert_axis(Axis(1));
    embeddings
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rows_are_unit_norm_after_normalization() {
        let embs = array![[3.0_f32, 4.0], [0.0, 2.0]];
        let normalized = l2_normalize_rows(embs);
        for row in normalized.rows() {
            let norm = row.dot(&row).sqrt();
            assert!((norm - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_rows_survive_normalization() {
        let embs = array![[0.0_f32, 0.0]];
        let normalized = l2_normalize_rows(embs);
        assert_eq!(normalized, array![[0.0_f32, 0.0]]);
    }
}
