//! Half-length complex FFT backend.
//!
//! The recombination in [`crate::post`] consumes the output of an `N/2`-point
//! complex FFT. This module defines the seam to that engine ([`HalfFft`]), the
//! default implementation backed by [`rustfft`], a planner that caches backends
//! by length, and the crate-wide [`FftError`].

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use rustfft::num_complex::Complex as RustComplex;
use rustfft::Fft;

pub use crate::num::{Complex, Complex32, Complex64, Float};
pub use rustfft::FftNum;

/// Axis of the launch grid, used when reporting limit violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAxis {
    /// Outer-dimension row.
    Row,
    /// Batch entry.
    Batch,
}

impl fmt::Display for GridAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row => "row".fmt(f),
            Self::Batch => "batch".fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftError {
    EmptyInput,
    /// Transform length must be even and at least 4.
    InvalidLength(usize),
    MismatchedLengths,
    InvalidStride,
    /// A row window falls outside the supplied buffer.
    OutOfBounds,
    /// Two output windows overlap, or an in-place input window overlaps
    /// another row's output window.
    OverlappingLayout,
    GridOverflow {
        axis: GridAxis,
        requested: usize,
        limit: usize,
    },
    /// The half-length FFT engine rejected the buffer.
    Backend,
}

impl fmt::Display for FftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => "input is empty".fmt(f),
            Self::InvalidLength(n) => {
                write!(f, "transform length {n} must be even and at least 4")
            }
            Self::MismatchedLengths => "buffer lengths do not match the transform".fmt(f),
            Self::InvalidStride => "stride and distance must be non-zero".fmt(f),
            Self::OutOfBounds => "row window exceeds the buffer".fmt(f),
            Self::OverlappingLayout => "row windows overlap".fmt(f),
            Self::GridOverflow {
                axis,
                requested,
                limit,
            } => write!(
                f,
                "{axis} axis needs {requested} blocks but the launch limit is {limit}"
            ),
            Self::Backend => "half-length FFT backend failed".fmt(f),
        }
    }
}

impl std::error::Error for FftError {}

/// Check the precondition shared by every stage: `n` even and `n >= 4`.
pub fn check_len(n: usize) -> Result<(), FftError> {
    if n < 4 || n % 2 != 0 {
        return Err(FftError::InvalidLength(n));
    }
    Ok(())
}

/// A forward complex FFT of fixed length, applied in place.
pub trait HalfFft<T: Float>: Send + Sync {
    fn len(&self) -> usize;
    fn process(&self, buf: &mut [Complex<T>]) -> Result<(), FftError>;

    /// Run the transform over consecutive `len()`-sized chunks.
    fn process_chunks(&self, buf: &mut [Complex<T>]) -> Result<(), FftError> {
        let n = self.len();
        if n == 0 || buf.len() % n != 0 {
            return Err(FftError::MismatchedLengths);
        }
        for chunk in buf.chunks_exact_mut(n) {
            self.process(chunk)?;
        }
        Ok(())
    }
}

/// [`HalfFft`] backed by a `rustfft` forward plan.
pub struct RustFftBackend<T: Float + FftNum> {
    fft: Arc<dyn Fft<T>>,
}

impl<T: Float + FftNum> RustFftBackend<T> {
    pub fn new(len: usize) -> Self {
        let mut planner = rustfft::FftPlanner::<T>::new();
        Self {
            fft: planner.plan_fft_forward(len),
        }
    }

    pub fn from_plan(fft: Arc<dyn Fft<T>>) -> Self {
        Self { fft }
    }
}

impl<T: Float + FftNum> RustFftBackend<T> {
    /// Transform `buf` as back-to-back plans; length already checked.
    fn run(&self, buf: &mut [Complex<T>]) {
        let mut work: Vec<RustComplex<T>> =
            buf.iter().map(|c| RustComplex::new(c.re, c.im)).collect();
        let zero = RustComplex::new(<T as Float>::zero(), <T as Float>::zero());
        let mut scratch = vec![zero; self.fft.get_inplace_scratch_len()];
        self.fft.process_with_scratch(&mut work, &mut scratch);
        for (dst, src) in buf.iter_mut().zip(work.iter()) {
            *dst = Complex::new(src.re, src.im);
        }
    }
}

impl<T: Float + FftNum> HalfFft<T> for RustFftBackend<T> {
    fn len(&self) -> usize {
        self.fft.len()
    }

    fn process(&self, buf: &mut [Complex<T>]) -> Result<(), FftError> {
        if buf.len() != self.fft.len() {
            return Err(FftError::MismatchedLengths);
        }
        self.run(buf);
        Ok(())
    }

    fn process_chunks(&self, buf: &mut [Complex<T>]) -> Result<(), FftError> {
        let n = self.fft.len();
        if n == 0 || buf.len() % n != 0 {
            return Err(FftError::MismatchedLengths);
        }
        if buf.is_empty() {
            return Ok(());
        }
        self.run(buf);
        Ok(())
    }
}

/// Caches half-length backends by transform length.
pub struct HalfFftPlanner<T: Float + FftNum> {
    planner: rustfft::FftPlanner<T>,
    cache: HashMap<usize, Arc<RustFftBackend<T>>>,
}

impl<T: Float + FftNum> Default for HalfFftPlanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float + FftNum> HalfFftPlanner<T> {
    pub fn new() -> Self {
        Self {
            planner: rustfft::FftPlanner::new(),
            cache: HashMap::new(),
        }
    }

    /// Retrieve or plan the forward FFT of length `len`.
    pub fn plan(&mut self, len: usize) -> Result<Arc<RustFftBackend<T>>, FftError> {
        if len == 0 {
            return Err(FftError::EmptyInput);
        }
        let planner = &mut self.planner;
        let backend = self
            .cache
            .entry(len)
            .or_insert_with(|| Arc::new(RustFftBackend::from_plan(planner.plan_fft_forward(len))));
        Ok(Arc::clone(backend))
    }
}
