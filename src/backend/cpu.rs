use super::Backend;

/// Pure-Rust CPU backend. Tensors are row-major `f64` buffers.
#[derive(Clone, Debug, Copy)]
pub struct CpuBackend;

/// Row-major 2D buffer: `(data, rows, cols)`.
#[derive(Debug, Clone)]
pub struct CpuTensor2D(pub Vec<f64>, pub usize, pub usize);

impl CpuTensor2D {
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "Inconsistent shape");
        Self(data, rows, cols)
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self(self.0.iter().map(|&x| f(x)).collect(), self.1, self.2)
    }

    fn zip_map(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        assert_eq!(
            (self.1, self.2),
            (other.1, other.2),
            "Element-wise op on mismatched shapes"
        );
        Self(
            self.0.iter().zip(other.0.iter()).map(|(&a, &b)| f(a, b)).collect(),
            self.1,
            self.2,
        )
    }
}

impl From<&[Vec<f64>]> for CpuTensor2D {
    fn from(x: &[Vec<f64>]) -> Self {
        if x.is_empty() {
            return CpuTensor2D::new(Vec::new(), 0, 0);
        }
        let rows = x.len();
        let cols = x[0].len();
        assert!(
            x.iter().all(|row| row.len() == cols),
            "All rows must have same length"
        );
        let data: Vec<f64> = x.iter().flat_map(|row| row.iter()).copied().collect();
        CpuTensor2D::new(data, rows, cols)
    }
}

impl Backend for CpuBackend {
    type Tensor2D = CpuTensor2D;
    type Device = ();

    fn default_device() -> Self::Device {}

    fn name() -> &'static str {
        "cpu"
    }

    // --- Constructors ---
    fn zeros_2d(rows: usize, cols: usize) -> Self::Tensor2D {
        CpuTensor2D::new(vec![0.; rows * cols], rows, cols)
    }

    fn from_vec_2d(data: Vec<f32>, rows: usize, cols: usize) -> Self::Tensor2D {
        CpuTensor2D::new(data.into_iter().map(|x| x as f64).collect(), rows, cols)
    }

    // --- Access ---
    fn to_vec_2d(t: &Self::Tensor2D) -> Vec<f64> {
        t.0.clone()
    }

    fn shape(t: &Self::Tensor2D) -> (usize, usize) {
        (t.1, t.2)
    }

    // --- Element-wise ops ---
    fn add_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_map(b, |a, b| a + b)
    }

    fn sub_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_map(b, |a, b| a - b)
    }

    fn mul_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_map(b, |a, b| a * b)
    }

    fn div_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        a.zip_map(b, |a, b| a / b)
    }

    fn mul_scalar_2d(t: &Self::Tensor2D, s: f64) -> Self::Tensor2D {
        t.map(|x| x * s)
    }

    fn add_scalar_2d(t: &Self::Tensor2D, s: f64) -> Self::Tensor2D {
        t.map(|x| x + s)
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
        // subgradient at zero is 0
        t.map(|x| if x > 0.0 { 1.0 } else { 0.0 })
    }

    // --- Reductions ---
    fn sum_all_2d(t: &Self::Tensor2D) -> f64 {
        t.0.iter().sum::<f64>()
    }

    fn mean_all_2d(t: &Self::Tensor2D) -> f64 {
        if t.0.is_empty() {
            return 0.0;
        }
        t.0.iter().sum::<f64>() / t.0.len() as f64
    }

    fn col_sum_2d(t: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(data, rows, cols) = t;
        let mut out = vec![0.0; *cols];
        for row in 0..*rows {
            for col in 0..*cols {
                out[col] += data[row * cols + col];
            }
        }
        CpuTensor2D::new(out, 1, *cols)
    }

    // --- Linear algebra ---
    fn matmul(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(a_data, m, k) = a;
        let CpuTensor2D(b_data, k2, n) = b;
        assert_eq!(k, k2, "matmul: inner dimensions differ");
        let mut out = vec![0.0; m * n];
        for i in 0..*m {
            for p in 0..*k {
                let a_ip = a_data[i * k + p];
                if a_ip == 0.0 {
                    continue;
                }
                let b_row = &b_data[p * n..(p + 1) * n];
                let out_row = &mut out[i * n..(i + 1) * n];
                for (o, &b_pj) in out_row.iter_mut().zip(b_row) {
                    *o += a_ip * b_pj;
                }
            }
        }
        CpuTensor2D::new(out, *m, *n)
    }

    fn matmul_transposed_lhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(a_data, k, m) = a;
        let CpuTensor2D(b_data, k2, n) = b;
        assert_eq!(k, k2, "matmul_transposed_lhs: row counts differ");
        let mut out = vec![0.0; m * n];
        for p in 0..*k {
            let a_row = &a_data[p * m..(p + 1) * m];
            let b_row = &b_data[p * n..(p + 1) * n];
            for (i, &a_pi) in a_row.iter().enumerate() {
                if a_pi == 0.0 {
                    continue;
                }
                let out_row = &mut out[i * n..(i + 1) * n];
                for (o, &b_pj) in out_row.iter_mut().zip(b_row) {
                    *o += a_pi * b_pj;
                }
            }
        }
        CpuTensor2D::new(out, *m, *n)
    }

    fn matmul_transposed_rhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(a_data, m, k) = a;
        let CpuTensor2D(b_data, n, k2) = b;
        assert_eq!(k, k2, "matmul_transposed_rhs: column counts differ");
        let mut out = Vec::with_capacity(m * n);
        for i in 0..*m {
            let a_row = &a_data[i * k..(i + 1) * k];
            for j in 0..*n {
                let b_row = &b_data[j * k..(j + 1) * k];
                out.push(a_row.iter().zip(b_row).map(|(x, y)| x * y).sum());
            }
        }
        CpuTensor2D::new(out, *m, *n)
    }

    // --- Broadcasting ---
    fn broadcast_add_row_2d(t: &Self::Tensor2D, row: &Self::Tensor2D) -> Self::Tensor2D {
        let CpuTensor2D(data, rows, cols) = t;
        assert_eq!(
            (row.1, row.2),
            (1, *cols),
            "broadcast row must have shape (1, cols)"
        );
        let mut out = data.clone();
        for r in 0..*rows {
            for (o, &b) in out[r * cols..(r + 1) * cols].iter_mut().zip(&row.0) {
                *o += b;
            }
        }
        CpuTensor2D::new(out, *rows, *cols)
    }

    fn select_rows_2d(t: &Self::Tensor2D, rows: &[usize]) -> Self::Tensor2D {
        let CpuTensor2D(data, n, cols) = t;
        let mut out = Vec::with_capacity(rows.len() * cols);
        for &r in rows {
            assert!(r < *n, "row index {} out of bounds ({} rows)", r, n);
            out.extend_from_slice(&data[r * cols..(r + 1) * cols]);
        }
        CpuTensor2D::new(out, rows.len(), *cols)
    }
}
