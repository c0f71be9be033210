//! Random train/test partitioning.

use crate::dataset::InMemoryDataset;
use crate::preprocessing::PipelineError;
use rand::seq::SliceRandom;
use rand::Rng;

/// Disjoint train and test groups.
#[derive(Clone, Debug)]
pub struct DatasetSplit {
    pub train: InMemoryDataset,
    pub test: InMemoryDataset,
    /// Source row index of every train sample, in train order.
    pub train_indices: Vec<usize>,
    /// Source row index of every test sample, in test order.
    pub test_indices: Vec<usize>,
}

/// Shuffles row indices (Fisher–Yates) and takes the first `floor(n * ratio)` as train.
///
/// # Errors
/// - [`PipelineError::Shape`] if feature vectors differ in length or the vector
///   and target counts differ. Checked before partitioning.
/// - [`PipelineError::InsufficientData`] if either group would be empty.
pub fn split<R: Rng + ?Sized>(
    vectors: Vec<Vec<f64>>,
    targets: Vec<f64>,
    ratio: f64,
    rng: &mut R,
) -> Result<DatasetSplit, PipelineError> {
    if vectors.len() != targets.len() {
        return Err(PipelineError::Shape {
            expected: vectors.len(),
            got: targets.len(),
            row: 0,
        });
    }
    if let Some(width) = vectors.first().map(Vec::len) {
        if let Some((row, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != width) {
            return Err(PipelineError::Shape {
                expected: width,
                got: v.len(),
                row,
            });
        }
    }

    let n = vectors.len();
    let n_train = (n as f64 * ratio).floor() as usize;
    let n_test = n.saturating_sub(n_train);
    if n_train == 0 || n_test == 0 {
        return Err(PipelineError::InsufficientData {
            rows: n,
            train: n_train.min(n),
            test: n_test,
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let test_indices = indices.split_off(n_train);
    let train_indices = indices;

    let pick = |idx: &[usize]| -> Result<InMemoryDataset, PipelineError> {
        InMemoryDataset::new(
            idx.iter().map(|&i| vectors[i].clone()).collect(),
            idx.iter().map(|&i| targets[i]).collect(),
        )
    };
    let train = pick(&train_indices)?;
    let test = pick(&test_indices)?;

    tracing::debug!(train = n_train, test = n_test, "split dataset");
    Ok(DatasetSplit {
        train,
        test,
        train_indices,
        test_indices,
    })
}
