use super::memory::BufferLease;
use super::Backend;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// Shape failures surfaced by the checked tensor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{op}: incompatible shapes {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: (usize, usize),
        rhs: (usize, usize),
    },
    #[error("ragged rows: expected {expected} columns, row {row} has {found}")]
    RaggedRows {
        expected: usize,
        row: usize,
        found: usize,
    },
    #[error("row index {index} out of bounds for {rows} rows")]
    RowOutOfBounds { index: usize, rows: usize },
}

/// A 2-D tensor bound to a backend.
///
/// Each instance holds one buffer lease, so cloning counts as a new allocation and
/// dropping releases it.
pub struct Tensor2D<B: Backend> {
    pub(crate) data: B::Tensor2D,
    _lease: BufferLease,
    pub(crate) backend: PhantomData<B>,
}

impl<B: Backend> Clone for Tensor2D<B> {
    fn clone(&self) -> Self {
        Self::from_raw(self.data.clone())
    }
}

impl<B: Backend> fmt::Debug for Tensor2D<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor2D")
            .field("backend", &B::name())
            .field("shape", &self.shape())
            .finish()
    }
}

impl<B: Backend> Tensor2D<B> {
    pub(crate) fn from_raw(data: B::Tensor2D) -> Self {
        Self {
            data,
            _lease: BufferLease::acquire(),
            backend: PhantomData,
        }
    }

    /// Builds a tensor from row-major `f32` data.
    ///
    /// # Panics
    /// If `data.len() != rows * cols`.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Self {
        Self::from_raw(B::from_vec_2d(data, rows, cols))
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_raw(B::zeros_2d(rows, cols))
    }

    /// Builds a `rows.len() × cols` tensor, rejecting ragged input.
    pub fn from_rows(rows: &[Vec<f64>], cols: usize) -> Result<Self, BackendError> {
        let mut flat = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(BackendError::RaggedRows {
                    expected: cols,
                    row: i,
                    found: row.len(),
                });
            }
            flat.extend(row.iter().map(|&v| v as f32));
        }
        Ok(Self::new(flat, rows.len(), cols))
    }

    pub fn shape(&self) -> (usize, usize) {
        B::shape(&self.data)
    }

    pub fn rows(&self) -> usize {
        self.shape().0
    }

    pub fn cols(&self) -> usize {
        self.shape().1
    }

    /// Row-major copy of the contents.
    pub fn to_vec(&self) -> Vec<f64> {
        B::to_vec_2d(&self.data)
    }

    /// Contents split into rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        let (_, cols) = self.shape();
        if cols == 0 {
            return vec![Vec::new(); self.rows()];
        }
        self.to_vec().chunks(cols).map(<[f64]>::to_vec).collect()
    }

    // --- checked linear algebra ---

    /// `self · other`.
    pub fn matmul(&self, other: &Self) -> Result<Self, BackendError> {
        let (lhs, rhs) = (self.shape(), other.shape());
        if lhs.1 != rhs.0 {
            return Err(BackendError::ShapeMismatch {
                op: "matmul",
                lhs,
                rhs,
            });
        }
        Ok(Self::from_raw(B::matmul(&self.data, &other.data)))
    }

    /// `selfᵀ · other`.
    pub fn matmul_tn(&self, other: &Self) -> Result<Self, BackendError> {
        let (lhs, rhs) = (self.shape(), other.shape());
        if lhs.0 != rhs.0 {
            return Err(BackendError::ShapeMismatch {
                op: "matmul_tn",
                lhs,
                rhs,
            });
        }
        Ok(Self::from_raw(B::matmul_transposed_lhs(
            &self.data,
            &other.data,
        )))
    }

    /// `self · otherᵀ`.
    pub fn matmul_nt(&self, other: &Self) -> Result<Self, BackendError> {
        let (lhs, rhs) = (self.shape(), other.shape());
        if lhs.1 != rhs.1 {
            return Err(BackendError::ShapeMismatch {
                op: "matmul_nt",
                lhs,
                rhs,
            });
        }
        Ok(Self::from_raw(B::matmul_transposed_rhs(
            &self.data,
            &other.data,
        )))
    }

    /// Adds a `(1, cols)` bias row to every row.
    pub fn add_row(&self, row: &Self) -> Result<Self, BackendError> {
        let (lhs, rhs) = (self.shape(), row.shape());
        if rhs != (1, lhs.1) {
            return Err(BackendError::ShapeMismatch {
                op: "add_row",
                lhs,
                rhs,
            });
        }
        Ok(Self::from_raw(B::broadcast_add_row_2d(&self.data, &row.data)))
    }

    /// Gathers rows by index.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self, BackendError> {
        let rows = self.rows();
        if let Some(&index) = indices.iter().find(|&&i| i >= rows) {
            return Err(BackendError::RowOutOfBounds { index, rows });
        }
        Ok(Self::from_raw(B::select_rows_2d(&self.data, indices)))
    }

    // --- element-wise ---

    pub fn add(&self, other: &Self) -> Self {
        Self::from_raw(B::add_2d(&self.data, &other.data))
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::from_raw(B::sub_2d(&self.data, &other.data))
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self::from_raw(B::mul_2d(&self.data, &other.data))
    }

    pub fn div(&self, other: &Self) -> Self {
        Self::from_raw(B::div_2d(&self.data, &other.data))
    }

    pub fn scale(&self, s: f64) -> Self {
        Self::from_raw(B::mul_scalar_2d(&self.data, s))
    }

    pub fn add_scalar(&self, s: f64) -> Self {
        Self::from_raw(B::add_scalar_2d(&self.data, s))
    }

    pub fn sqrt(&self) -> Self {
        Self::from_raw(B::sqrt_2d(&self.data))
    }

    pub fn abs(&self) -> Self {
        Self::from_raw(B::abs_2d(&self.data))
    }

    pub fn relu(&self) -> Self {
        Self::from_raw(B::relu_2d(&self.data))
    }

    pub fn relu_mask(&self) -> Self {
        Self::from_raw(B::relu_mask_2d(&self.data))
    }

    // --- reductions ---

    pub fn sum(&self) -> f64 {
        B::sum_all_2d(&self.data)
    }

    pub fn mean(&self) -> f64 {
        B::mean_all_2d(&self.data)
    }

    /// Column sums as a `(1, cols)` tensor.
    pub fn col_sum(&self) -> Self {
        Self::from_raw(B::col_sum_2d(&self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{live_buffers, CpuBackend};

    type T = Tensor2D<CpuBackend>;

    #[test]
    fn test_tensor2d_matmul_variants() {
        // A = [[1, 2],
        //      [3, 4]]
        let a = T::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let x = T::new(vec![1.0, 0.0], 2, 1);

        assert_eq!(a.matmul(&x).unwrap().to_vec(), vec![1.0, 3.0]);
        // Aᵀ · x = [1, 2]
        assert_eq!(a.matmul_tn(&x).unwrap().to_vec(), vec![1.0, 2.0]);
        // A · Aᵀ = [[5, 11], [11, 25]]
        assert_eq!(
            a.matmul_nt(&a).unwrap().to_vec(),
            vec![5.0, 11.0, 11.0, 25.0]
        );
    }

    #[test]
    fn test_matmul_shape_mismatch_is_error() {
        let a = T::zeros(2, 3);
        let b = T::zeros(2, 3);
        let err = a.matmul(&b).unwrap_err();
        assert_eq!(
            err,
            BackendError::ShapeMismatch {
                op: "matmul",
                lhs: (2, 3),
                rhs: (2, 3)
            }
        );
        assert!(err.to_string().contains("matmul"));
        assert!(a.matmul_nt(&b).is_ok());
    }

    #[test]
    fn test_add_row_requires_bias_shape() {
        let x = T::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let bias = T::new(vec![10.0, 20.0], 1, 2);
        assert_eq!(
            x.add_row(&bias).unwrap().to_vec(),
            vec![11.0, 22.0, 13.0, 24.0]
        );
        assert!(x.add_row(&T::zeros(2, 2)).is_err());
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert_eq!(
            T::from_rows(&rows, 2).unwrap_err(),
            BackendError::RaggedRows {
                expected: 2,
                row: 1,
                found: 1
            }
        );
        let ok = T::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
        assert_eq!(ok.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_select_rows_bounds() {
        let x = T::new(vec![1.0, 2.0, 3.0], 3, 1);
        assert_eq!(x.select_rows(&[2, 0]).unwrap().to_vec(), vec![3.0, 1.0]);
        assert_eq!(
            x.select_rows(&[3]).unwrap_err(),
            BackendError::RowOutOfBounds { index: 3, rows: 3 }
        );
    }

    #[test]
    fn test_clone_and_drop_track_leases() {
        let before = live_buffers();
        let a = T::zeros(4, 4);
        let b = a.clone();
        let c = a.add(&b).relu();
        assert_eq!(live_buffers(), before + 3);
        drop((a, b, c));
        assert_eq!(live_buffers(), before);
    }

    #[test]
    fn test_reductions() {
        let x = T::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        assert_eq!(x.sum(), 10.0);
        assert_eq!(x.mean(), 2.5);
        assert_eq!(x.col_sum().to_vec(), vec![4.0, 6.0]);
    }
}
