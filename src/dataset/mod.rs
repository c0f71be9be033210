//! Dataset abstractions for training and evaluation.
//!
//! This module provides a [`Dataset`] trait for uniform access to `(X, y)` pairs,
//! a [`DatasetBatchIter`] that walks an index order in mini-batches, and the
//! random train/test [`split`].
//!
//! # Core Concepts
//!
//! - **Dataset**: a source of `(X, y)` pairs where `X` is a feature matrix of shape
//!   `(n_samples, n_features)` and `y` a target column of shape `(n_samples, 1)`.
//! - **Batch**: the rows named by one window of the iteration order. Each batch is a
//!   fresh pair of tensors released when the caller drops it.
//!
//! # Example
//!
//! ```rust
//! use ev_range::dataset::{Dataset, InMemoryDataset};
//! use ev_range::backend::CpuBackend;
//!
//! let x = vec![vec![1.0], vec![2.0], vec![3.0]];
//! let y = vec![0.0, 1.0, 2.0];
//! let dataset = InMemoryDataset::new(x, y).unwrap();
//!
//! let order = [2, 0, 1];
//! let sizes: Vec<usize> = dataset
//!     .batches::<CpuBackend>(&order, 2)
//!     .map(|b| b.unwrap().0.rows())
//!     .collect();
//! assert_eq!(sizes, vec![2, 1]);
//! ```

use crate::backend::{Backend, Tensor2D};
use std::fmt::Debug;

pub mod memory;
pub mod split;
pub use self::memory::InMemoryDataset;
pub use self::split::{split, DatasetSplit};

/// Abstract interface for a supervised dataset.
pub trait Dataset {
    /// Error type returned when accessing data.
    type Error: Debug + 'static;

    /// Total number of samples.
    fn len(&self) -> usize;

    /// Checks whether the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of feature columns.
    fn n_features(&self) -> usize;

    /// Iterates over `order` in batches of `batch_size` rows.
    ///
    /// # Panics
    /// If `batch_size` is zero.
    fn batches<'a, B: Backend>(
        &'a self,
        order: &'a [usize],
        batch_size: usize,
    ) -> DatasetBatchIter<'a, B, Self>
    where
        Self: Sized,
    {
        assert!(batch_size > 0, "batch_size must be positive");
        DatasetBatchIter {
            dataset: self,
            order,
            batch_size,
            current: 0,
            _backend: std::marker::PhantomData,
        }
    }

    /// Materializes the given rows as `(X, y)` tensors.
    fn get_batch<B: Backend>(
        &self,
        indices: &[usize],
    ) -> Result<(Tensor2D<B>, Tensor2D<B>), Self::Error>;

    /// The whole dataset in storage order.
    fn full<B: Backend>(&self) -> Result<(Tensor2D<B>, Tensor2D<B>), Self::Error> {
        let all: Vec<usize> = (0..self.len()).collect();
        self.get_batch(&all)
    }
}

/// Iterator over mini-batches following a fixed index order.
pub struct DatasetBatchIter<'a, B: Backend, D: ?Sized> {
    dataset: &'a D,
    order: &'a [usize],
    batch_size: usize,
    current: usize,
    _backend: std::marker::PhantomData<B>,
}

impl<'a, B: Backend, D: Dataset> Iterator for DatasetBatchIter<'a, B, D> {
    type Item = Result<(Tensor2D<B>, Tensor2D<B>), D::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.order.len();
        if self.current >= total {
            return None;
        }

        let end = (self.current + self.batch_size).min(total);
        let window = &self.order[self.current..end];
        self.current = end;

        Some(self.dataset.get_batch::<B>(window))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len().saturating_sub(self.current);
        let n = remaining.div_ceil(self.batch_size);
        (n, Some(n))
    }
}
