//! Real-to-complex FFT pipeline.
//!
//! A length-`N` real transform runs in three steps: pack the `N` reals as
//! `N/2` complex values, run the `N/2`-point complex FFT, then recombine with
//! the post-processing kernel into `N/2 + 1` outputs. [`RealFftPlanner`]
//! caches the half-length backends and twiddle tables by length and hands out
//! [`RealFftPlan`]s that drive the three steps over a whole batch.

use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, warn};
use rustfft::FftNum;

use crate::fft::{check_len, Complex, FftError, Float, HalfFft, HalfFftPlanner};
use crate::launch::{launch_in_place, launch_out_of_place, LaunchConfig, LaunchGrid, LaunchReport};
use crate::layout::BatchLayout;
use crate::num::pack_real;
use crate::twiddle::{TwiddleCache, TwiddleTable};

/// Planner that caches half-length FFT backends and twiddle tables.
pub struct RealFftPlanner<T: Float + FftNum> {
    ffts: HalfFftPlanner<T>,
    twiddles: TwiddleCache<T>,
    config: LaunchConfig,
}

impl<T: Float + FftNum> Default for RealFftPlanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float + FftNum> RealFftPlanner<T> {
    /// Planner whose plans launch with [`LaunchConfig::from_env`].
    pub fn new() -> Self {
        Self::with_config(LaunchConfig::from_env())
    }

    pub fn with_config(config: LaunchConfig) -> Self {
        Self {
            ffts: HalfFftPlanner::new(),
            twiddles: TwiddleCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Plan a length-`n` real transform.
    pub fn plan(&mut self, n: usize) -> Result<RealFftPlan<T>, FftError> {
        check_len(n)?;
        let fft = self.ffts.plan(n / 2)?;
        let twiddles = self.twiddles.get(n)?;
        debug!("planned real FFT of length {n} ({} cached tables)", self.twiddles.len());
        RealFftPlan::new(n, fft, twiddles, self.config)
    }
}

/// A real-to-complex transform of fixed length.
#[derive(Clone)]
pub struct RealFftPlan<T: Float> {
    n: usize,
    fft: Arc<dyn HalfFft<T>>,
    twiddles: Arc<TwiddleTable<T>>,
    config: LaunchConfig,
}

impl<T: Float> RealFftPlan<T> {
    /// Assemble a plan from its parts. `fft` must have length `n / 2` and
    /// `twiddles` must be the table for `n`.
    pub fn new(
        n: usize,
        fft: Arc<dyn HalfFft<T>>,
        twiddles: Arc<TwiddleTable<T>>,
        config: LaunchConfig,
    ) -> Result<Self, FftError> {
        check_len(n)?;
        if fft.len() != n / 2 || twiddles.len() != n {
            return Err(FftError::MismatchedLengths);
        }
        Ok(Self {
            n,
            fft,
            twiddles,
            config,
        })
    }

    /// Real input length.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Complex outputs per transform, `n / 2 + 1`.
    pub fn complex_len(&self) -> usize {
        self.n / 2 + 1
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn with_config(mut self, config: LaunchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn twiddles(&self) -> &TwiddleTable<T> {
        &self.twiddles
    }

    /// Transform back-to-back signals of `len()` reals into back-to-back
    /// spectra of `complex_len()` values.
    pub fn process(&self, input: &[T], output: &mut [Complex<T>]) -> Result<LaunchReport, FftError> {
        if input.is_empty() {
            return Err(FftError::EmptyInput);
        }
        if input.len() % self.n != 0 {
            return Err(FftError::MismatchedLengths);
        }
        let batch = input.len() / self.n;
        if output.len() != batch * self.complex_len() {
            return Err(FftError::MismatchedLengths);
        }
        self.process_strided(input, output, &BatchLayout::contiguous(self.n, batch))
    }

    /// Transform the rows of `layout`. Input offsets count complex values,
    /// so a row starting at offset `o` reads reals `2o..2o + len()`.
    pub fn process_strided(
        &self,
        input: &[T],
        output: &mut [Complex<T>],
        layout: &BatchLayout,
    ) -> Result<LaunchReport, FftError> {
        let n = self.n;
        let half = n / 2;
        LaunchGrid::for_transform(n, layout, &self.config)?;
        if let Err(err) = layout.validate(n, input.len() / 2, output.len(), false) {
            warn!("rejecting strided layout {layout:?}: {err}");
            return Err(err);
        }

        let mut work = vec![Complex::zero(); layout.row_count() * half];
        for (row, dst) in layout.iter_rows().zip(work.chunks_exact_mut(half)) {
            let start = 2 * row.input;
            pack_real(&input[start..start + n], dst);
        }
        self.fft.process_chunks(&mut work)?;

        let packed = BatchLayout {
            input_stride: half,
            input_distance: layout.high_dimension * half,
            ..*layout
        };
        launch_out_of_place(n, &packed, &self.twiddles, &self.config, &work, output)
    }

    /// Copy back-to-back signals into the input windows of an in-place
    /// `layout`, ready for [`process_in_place`](Self::process_in_place).
    pub fn pack_in_place(
        &self,
        input: &[T],
        data: &mut [Complex<T>],
        layout: &BatchLayout,
    ) -> Result<(), FftError> {
        let n = self.n;
        if layout.row_count().checked_mul(n) != Some(input.len()) {
            return Err(FftError::MismatchedLengths);
        }
        layout.validate(n, data.len(), data.len(), true)?;
        for (row, signal) in layout.iter_rows().zip(input.chunks_exact(n)) {
            pack_real(signal, &mut data[row.input..row.input + n / 2]);
        }
        Ok(())
    }

    /// Transform packed rows held in `data`, leaving each spectrum at the
    /// row's output offset.
    pub fn process_in_place(
        &self,
        data: &mut [Complex<T>],
        layout: &BatchLayout,
    ) -> Result<LaunchReport, FftError> {
        let n = self.n;
        let half = n / 2;
        // fail before touching the buffer
        LaunchGrid::for_transform(n, layout, &self.config)?;
        if let Err(err) = layout.validate(n, data.len(), data.len(), true) {
            warn!("rejecting in-place layout {layout:?}: {err}");
            return Err(err);
        }
        for row in layout.iter_rows() {
            self.fft.process(&mut data[row.input..row.input + half])?;
        }
        launch_in_place(n, layout, &self.twiddles, &self.config, data)
    }

    /// Convenience wrapper returning a freshly allocated output.
    pub fn transform(&self, input: &[T]) -> Result<Vec<Complex<T>>, FftError> {
        let batch = input.len() / self.n;
        let mut output = vec![Complex::zero(); batch * self.complex_len()];
        self.process(input, &mut output)?;
        Ok(output)
    }
}
