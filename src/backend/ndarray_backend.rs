use super::Backend;
use ndarray::{Array2, Axis};

/// CPU backend implemented on top of the `ndarray` crate.
///
/// # Type mappings
/// - `Tensor2D`: `NdarrayTensor2D` wrapper around `ndarray::Array2<f64>`
/// - `Device`: `()` (unit type, CPU-only execution)
#[derive(Clone, Debug, Copy)]
pub struct NdarrayBackend;

/// Wrapper type for 2D tensors using ndarray's `Array2<f64>`.
#[derive(Debug, Clone)]
pub struct NdarrayTensor2D(pub Array2<f64>);

impl From<&[Vec<f64>]> for NdarrayTensor2D {
    /// Converts a slice of row vectors into a 2D tensor.
    ///
    /// # Panics
    /// Panics if rows have inconsistent lengths.
    fn from(x: &[Vec<f64>]) -> Self {
        let rows = x.len();
        if rows == 0 {
            return NdarrayTensor2D(Array2::zeros((0, 0)));
        }
        let cols = x[0].len();
        assert!(x.iter().all(|r| r.len() == cols));
        let data: Vec<f64> = x.iter().flat_map(|r| r.iter()).copied().collect();
        NdarrayTensor2D(
            Array2::from_shape_vec((rows, cols), data).expect("row lengths validated above"),
        )
    }
}

impl NdarrayTensor2D {
    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        NdarrayTensor2D(self.0.mapv(f))
    }
}

impl Backend for NdarrayBackend {
    type Tensor2D = NdarrayTensor2D;
    type Device = ();

    fn default_device() -> Self::Device {}

    fn name() -> &'static str {
        "ndarray"
    }

    fn zeros_2d(rows: usize, cols: usize) -> Self::Tensor2D {
        NdarrayTensor2D(Array2::zeros((rows, cols)))
    }

    fn from_vec_2d(data: Vec<f32>, rows: usize, cols: usize) -> Self::Tensor2D {
        assert_eq!(data.len(), rows * cols, "Inconsistent shape");
        let data: Vec<f64> = data.into_iter().map(f64::from).collect();
        NdarrayTensor2D(Array2::from_shape_vec((rows, cols), data).expect("length checked"))
    }

    fn to_vec_2d(t: &Self::Tensor2D) -> Vec<f64> {
        t.0.iter().copied().collect()
    }

    fn shape(t: &Self::Tensor2D) -> (usize, usize) {
        t.0.dim()
    }

    fn add_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(a.0.dim(), b.0.dim(), "Element-wise op on mismatched shapes");
        NdarrayTensor2D(&a.0 + &b.0)
    }

    fn sub_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(a.0.dim(), b.0.dim(), "Element-wise op on mismatched shapes");
        NdarrayTensor2D(&a.0 - &b.0)
    }

    fn mul_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(a.0.dim(), b.0.dim(), "Element-wise op on mismatched shapes");
        NdarrayTensor2D(&a.0 * &b.0)
    }

    fn div_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(a.0.dim(), b.0.dim(), "Element-wise op on mismatched shapes");
        NdarrayTensor2D(&a.0 / &b.0)
    }

    fn mul_scalar_2d(t: &Self::Tensor2D, s: f64) -> Self::Tensor2D {
        NdarrayTensor2D(&t.0 * s)
    }

    fn add_scalar_2d(t: &Self::Tensor2D, s: f64) -> Self::Tensor2D {
        NdarrayTensor2D(&t.0 + s)
    }

    fn sqrt_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        t.map(f64::sqrt)
    }

    fn abs_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        t.map(f64::abs)
    }

    fn relu_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        t.map(|x| if x > 0.0 { x } else { 0.0 })
    }

    fn relu_mask_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        t.map(|x| if x > 0.0 { 1.0 } else { 0.0 })
    }

    fn sum_all_2d(t: &Self::Tensor2D) -> f64 {
        t.0.sum()
    }

    fn mean_all_2d(t: &Self::Tensor2D) -> f64 {
        t.0.mean().unwrap_or(0.0)
    }

    fn col_sum_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        NdarrayTensor2D(t.0.sum_axis(Axis(0)).insert_axis(Axis(0)))
    }

    fn matmul(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(a.0.ncols(), b.0.nrows(), "matmul: inner dimensions differ");
        NdarrayTensor2D(a.0.dot(&b.0))
    }

    fn matmul_transposed_lhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(
            a.0.nrows(),
            b.0.nrows(),
            "matmul_transposed_lhs: row counts differ"
        );
        NdarrayTensor2D(a.0.t().dot(&b.0))
    }

    fn matmul_transposed_rhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(
            a.0.ncols(),
            b.0.ncols(),
            "matmul_transposed_rhs: column counts differ"
        );
        NdarrayTensor2D(a.0.dot(&b.0.t()))
    }

    fn broadcast_add_row_2d(t: &Self::Tensor2D, row: &Self::Tensor2D) -> Self::Tensor2D {
        assert_eq!(
            row.0.dim(),
            (1, t.0.ncols()),
            "broadcast row must have shape (1, cols)"
        );
        NdarrayTensor2D(&t.0 + &row.0)
    }

    fn select_rows_2d(t: &Self::Tensor2D, rows: &[usize]) -> Self::Tensor2D {
        NdarrayTensor2D(t.0.select(Axis(0), rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CpuBackend, CpuTensor2D};

    fn sample() -> (NdarrayTensor2D, CpuTensor2D) {
        let rows = vec![vec![1.0, -2.0, 3.0], vec![4.0, 5.0, -6.0]];
        (
            NdarrayTensor2D::from(&rows[..]),
            CpuTensor2D::from(&rows[..]),
        )
    }

    #[test]
    fn test_matmul_parity_with_cpu_backend() {
        let (a_nd, a_cpu) = sample();
        let nd = NdarrayBackend::matmul_transposed_rhs(&a_nd, &a_nd);
        let cpu = CpuBackend::matmul_transposed_rhs(&a_cpu, &a_cpu);
        assert_eq!(NdarrayBackend::to_vec_2d(&nd), CpuBackend::to_vec_2d(&cpu));

        let nd = NdarrayBackend::matmul_transposed_lhs(&a_nd, &a_nd);
        let cpu = CpuBackend::matmul_transposed_lhs(&a_cpu, &a_cpu);
        assert_eq!(NdarrayBackend::to_vec_2d(&nd), CpuBackend::to_vec_2d(&cpu));
    }

    #[test]
    fn test_column_reductions_parity() {
        let (a_nd, a_cpu) = sample();
        assert_eq!(
            NdarrayBackend::to_vec_2d(&NdarrayBackend::col_sum_2d(&a_nd)),
            CpuBackend::to_vec_2d(&CpuBackend::col_sum_2d(&a_cpu))
        );
    }

    #[test]
    fn test_select_rows_and_broadcast() {
        let (a_nd, _) = sample();
        let picked = NdarrayBackend::select_rows_2d(&a_nd, &[1]);
        assert_eq!(NdarrayBackend::shape(&picked), (1, 3));
        let shifted = NdarrayBackend::broadcast_add_row_2d(&a_nd, &picked);
        assert_eq!(
            NdarrayBackend::to_vec_2d(&shifted),
            vec![5.0, 3.0, -3.0, 8.0, 10.0, -12.0]
        );
    }
}
