//! Live numeric-buffer accounting.
//!
//! Every [`Tensor2D`](super::Tensor2D) owns a [`BufferLease`]. Creating or cloning a
//! tensor acquires a lease, dropping it releases the lease, so release happens on
//! every exit path (including `?` early returns and unwinding).
//!
//! Counters are thread-local. Training and inference run on one thread, and leases
//! are `!Send` so a tensor can never be released against another thread's counter.
//!
//! [`MemoryScope`] brackets a stage (fit, evaluate, predict) and reports any buffers
//! that are still alive when the scope ends.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static LIVE: Cell<usize> = const { Cell::new(0) };
    static PEAK: Cell<usize> = const { Cell::new(0) };
}

/// Number of tensors currently alive on this thread.
pub fn live_buffers() -> usize {
    LIVE.with(Cell::get)
}

/// Highest number of simultaneously live tensors observed on this thread.
pub fn peak_buffers() -> usize {
    PEAK.with(Cell::get)
}

/// RAII token proving ownership of one numeric buffer.
#[derive(Debug)]
pub struct BufferLease {
    _not_send: PhantomData<*const ()>,
}

impl BufferLease {
    pub(crate) fn acquire() -> Self {
        LIVE.with(|live| {
            let now = live.get() + 1;
            live.set(now);
            PEAK.with(|peak| peak.set(peak.get().max(now)));
        });
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        LIVE.with(|live| live.set(live.get().saturating_sub(1)));
    }
}

/// Brackets one stage and checks that it did not leave buffers behind.
///
/// `retained` declares how many buffers the stage is expected to hand back to its
/// caller (for example the parameters of a freshly trained model).
///
/// ```rust
/// use ev_range::backend::{live_buffers, CpuBackend, MemoryScope, Tensor2D};
///
/// let before = live_buffers();
/// {
///     let scope = MemoryScope::enter("predict");
///     let t = Tensor2D::<CpuBackend>::zeros(1, 4);
///     assert_eq!(scope.outstanding(), 1);
///     drop(t);
/// }
/// assert_eq!(live_buffers(), before);
/// ```
#[derive(Debug)]
pub struct MemoryScope {
    label: &'static str,
    baseline: usize,
    retained: usize,
}

impl MemoryScope {
    pub fn enter(label: &'static str) -> Self {
        Self {
            label,
            baseline: live_buffers(),
            retained: 0,
        }
    }

    /// Declares buffers that intentionally outlive the scope.
    pub fn retain(&mut self, buffers: usize) {
        self.retained += buffers;
    }

    /// Buffers created inside the scope that are still alive.
    pub fn outstanding(&self) -> usize {
        live_buffers().saturating_sub(self.baseline)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        let outstanding = self.outstanding();
        if outstanding > self.retained {
            tracing::warn!(
                scope = self.label,
                outstanding,
                retained = self.retained,
                "numeric buffers outlived their scope"
            );
        } else {
            tracing::trace!(
                scope = self.label,
                live = live_buffers(),
                peak = peak_buffers(),
                "scope released"
            );
        }
    }
}
