//! # Backend Abstraction
//!
//! This module provides a trait-based abstraction over the numeric runtime that
//! the model, loss and optimizer run on, so the training code never touches a
//! concrete array type.
//!
//! ## Design Philosophy
//!
//! - **Minimal trait surface**: only the 2-D operations a dense network needs are
//!   exposed (matrix products, broadcasting a bias row, element-wise maps and column
//!   reductions).
//! - **Zero-cost generics**: backend selection happens at compile time via type
//!   parameters.
//! - **Accounted buffers**: every [`Tensor2D`] holds a [`memory::BufferLease`], so the
//!   number of live numeric buffers can be observed with [`memory::live_buffers`].
//!
//! ## Available Backends
//!
//! | Backend          | Feature   | Use Case                          |
//! |------------------|-----------|-----------------------------------|
//! | `CpuBackend`     | (always)  | Default, pure-Rust implementation |
//! | `NdarrayBackend` | `ndarray` | Interop with `ndarray` ecosystem  |
//!
//! ## Example
//!
//! ```rust
//! use ev_range::backend::{CpuBackend, Tensor2D};
//!
//! let x: Tensor2D<CpuBackend> = Tensor2D::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
//! let w: Tensor2D<CpuBackend> = Tensor2D::new(vec![0.5, 0.5], 2, 1);
//! let y = x.matmul(&w).unwrap();
//! assert_eq!(y.to_vec(), vec![1.5, 3.5]);
//! ```

pub mod cpu;
/// Pure-Rust CPU backend implementation with zero external dependencies.
pub use cpu::{CpuBackend, CpuTensor2D};

#[cfg(feature = "ndarray")]
mod ndarray_backend;
#[cfg(feature = "ndarray")]
/// Backend backed by the `ndarray` crate for ecosystem interoperability.
pub use ndarray_backend::{NdarrayBackend, NdarrayTensor2D};

/// Live-buffer accounting and scoped release checks.
pub mod memory;
/// Two-dimensional tensor abstraction.
pub mod tensor2d;

pub use memory::{live_buffers, MemoryScope};
pub use tensor2d::{BackendError, Tensor2D};

/// Abstraction over computation devices and tensor operations.
///
/// Implementations provide a concrete 2-D tensor type. All checked shape
/// validation happens in [`Tensor2D`]; the raw operations here may assume
/// compatible shapes and panic otherwise.
///
/// # Example Implementation Sketch
///
/// ```ignore
/// #[derive(Clone, Debug, Copy)]
/// struct MyBackend;
///
/// impl Backend for MyBackend {
///     type Tensor2D = MyTensor;
///     type Device = ();
///
///     fn default_device() -> Self::Device { () }
///     // ... implement all required methods
/// }
/// ```
pub trait Backend: Clone + Copy + std::fmt::Debug + 'static {
    /// Two-dimensional tensor type.
    type Tensor2D: Clone + Send + Sync + std::fmt::Debug;

    /// Device identifier type (CPU core index, GPU handle, etc.).
    type Device: Clone + Send + Sync;

    /// Returns the default device for this backend.
    fn default_device() -> Self::Device;

    /// Short human-readable backend name, used in log output.
    fn name() -> &'static str;

    // --- Constructors ---

    /// Creates a 2D tensor filled with zeros of given dimensions.
    fn zeros_2d(rows: usize, cols: usize) -> Self::Tensor2D;

    /// Constructs a 2D tensor from row-major ordered data.
    ///
    /// # Panics
    /// If `data.len() != rows * cols`.
    fn from_vec_2d(data: Vec<f32>, rows: usize, cols: usize) -> Self::Tensor2D;

    // --- Data access ---

    /// Copies the tensor out in row-major order.
    fn to_vec_2d(t: &Self::Tensor2D) -> Vec<f64>;

    /// Returns the shape of a 2D tensor as (rows, cols).
    fn shape(t: &Self::Tensor2D) -> (usize, usize);

    // --- Element-wise operations ---

    /// Element-wise addition of two same-shaped tensors.
    fn add_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Element-wise subtraction of two same-shaped tensors.
    fn sub_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Element-wise multiplication of two same-shaped tensors.
    fn mul_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Element-wise division of two same-shaped tensors.
    fn div_2d(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Multiplies each element by a scalar.
    fn mul_scalar_2d(t: &Self::Tensor2D, s: f64) -> Self::Tensor2D;

    /// Adds a scalar to each element.
    fn add_scalar_2d(t: &Self::Tensor2D, s: f64) -> Self::Tensor2D;

    /// Element-wise square root.
    fn sqrt_2d(t: &Self::Tensor2D) -> Self::Tensor2D;

    /// Element-wise absolute value.
    fn abs_2d(t: &Self::Tensor2D) -> Self::Tensor2D;

    /// Rectified linear unit: `max(x, 0)`.
    fn relu_2d(t: &Self::Tensor2D) -> Self::Tensor2D;

    /// Derivative mask of ReLU: 1.0 where `x > 0`, else 0.0.
    fn relu_mask_2d(t: &Self::Tensor2D) -> Self::Tensor2D;

    // --- Reduction operations ---

    /// Sum of all elements.
    fn sum_all_2d(t: &Self::Tensor2D) -> f64;

    /// Arithmetic mean of all elements (0.0 for an empty tensor).
    fn mean_all_2d(t: &Self::Tensor2D) -> f64;

    /// Column sums as a `(1, cols)` tensor.
    fn col_sum_2d(t: &Self::Tensor2D) -> Self::Tensor2D;

    // --- Linear algebra ---

    /// Matrix product `A · B` for `A: (m × k)`, `B: (k × n)`.
    ///
    /// # Panics
    /// If inner dimensions differ.
    fn matmul(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Matrix product `Aᵀ · B` for `A: (k × m)`, `B: (k × n)`.
    ///
    /// # Panics
    /// If row counts differ.
    fn matmul_transposed_lhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    /// Matrix product `A · Bᵀ` for `A: (m × k)`, `B: (n × k)`.
    ///
    /// # Panics
    /// If column counts differ.
    fn matmul_transposed_rhs(a: &Self::Tensor2D, b: &Self::Tensor2D) -> Self::Tensor2D;

    // --- Broadcasting and row selection ---

    /// Adds a `(1, cols)` row to each row of `t`.
    ///
    /// Result[i, j] = t[i, j] + row[0, j]
    fn broadcast_add_row_2d(t: &Self::Tensor2D, row: &Self::Tensor2D) -> Self::Tensor2D;

    /// Gathers the given rows (in order) into a new tensor.
    ///
    /// # Panics
    /// If any index is out of bounds.
    fn select_rows_2d(t: &Self::Tensor2D, rows: &[usize]) -> Self::Tensor2D;
}
