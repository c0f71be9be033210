use crate::backend::{Backend, BackendError, Tensor2D};
use crate::dataset::Dataset;
use crate::preprocessing::PipelineError;

/// Feature vectors and targets held in host memory.
///
/// Rows are plain `Vec<f64>`; tensors only exist for the batch being processed.
#[derive(Clone, Debug, PartialEq)]
pub struct InMemoryDataset {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    n_features: usize,
}

impl InMemoryDataset {
    /// # Errors
    /// [`PipelineError::Shape`] if `x` and `y` differ in length or rows differ in width,
    /// [`PipelineError::EmptyDataset`] if there are no rows.
    pub fn new(x: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Self, PipelineError> {
        if x.len() != y.len() {
            return Err(PipelineError::Shape {
                expected: x.len(),
                got: y.len(),
                row: 0,
            });
        }
        let n_features = x.first().ok_or(PipelineError::EmptyDataset)?.len();
        if let Some((row, r)) = x.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(PipelineError::Shape {
                expected: n_features,
                got: r.len(),
                row,
            });
        }
        Ok(Self { x, y, n_features })
    }

    pub fn features(&self) -> &[Vec<f64>] {
        &self.x
    }

    pub fn targets(&self) -> &[f64] {
        &self.y
    }
}

impl Dataset for InMemoryDataset {
    type Error = BackendError;

    fn len(&self) -> usize {
        self.x.len()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn get_batch<B: Backend>(
        &self,
        indices: &[usize],
    ) -> Result<(Tensor2D<B>, Tensor2D<B>), Self::Error> {
        let rows = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= rows) {
            return Err(BackendError::RowOutOfBounds { index, rows });
        }

        let mut xs = Vec::with_capacity(indices.len() * self.n_features);
        let mut ys = Vec::with_capacity(indices.len());
        for &i in indices {
            xs.extend(self.x[i].iter().map(|&v| v as f32));
            ys.push(self.y[i] as f32);
        }

        let x_tensor = Tensor2D::<B>::new(xs, indices.len(), self.n_features);
        let y_tensor = Tensor2D::<B>::new(ys, indices.len(), 1);
        Ok((x_tensor, y_tensor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{live_buffers, CpuBackend};

    fn dataset() -> InMemoryDataset {
        InMemoryDataset::new(
            vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
            vec![0.5, 1.5, 2.5],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        assert!(matches!(
            InMemoryDataset::new(vec![vec![1.0]], vec![1.0, 2.0]),
            Err(PipelineError::Shape { .. })
        ));
        assert!(matches!(
            InMemoryDataset::new(vec![vec![1.0, 2.0], vec![1.0]], vec![1.0, 2.0]),
            Err(PipelineError::Shape {
                expected: 2,
                got: 1,
                row: 1
            })
        ));
        assert!(matches!(
            InMemoryDataset::new(Vec::new(), Vec::new()),
            Err(PipelineError::EmptyDataset)
        ));
    }

    #[test]
    fn test_get_batch_follows_indices() {
        let ds = dataset();
        let (x, y) = ds.get_batch::<CpuBackend>(&[2, 0]).unwrap();
        assert_eq!(x.to_vec(), vec![3.0, 30.0, 1.0, 10.0]);
        assert_eq!(y.shape(), (2, 1));
        assert_eq!(y.to_vec(), vec![2.5, 0.5]);
        assert!(ds.get_batch::<CpuBackend>(&[3]).is_err());
    }

    #[test]
    fn test_batches_cover_order_and_release_tensors() {
        let ds = dataset();
        let before = live_buffers();
        let order = [1, 2, 0];
        let mut seen = Vec::new();
        let iter = ds.batches::<CpuBackend>(&order, 2);
        assert_eq!(iter.size_hint(), (2, Some(2)));
        for batch in iter {
            let (_, y) = batch.unwrap();
            seen.extend(y.to_vec());
        }
        assert_eq!(seen, vec![1.5, 2.5, 0.5]);
        assert_eq!(live_buffers(), before);
    }

    #[test]
    fn test_full_dataset() {
        let (x, y) = dataset().full::<CpuBackend>().unwrap();
        assert_eq!(x.shape(), (3, 2));
        assert_eq!(y.shape(), (3, 1));
    }
}
