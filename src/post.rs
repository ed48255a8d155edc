//! Real-FFT post-processing kernel.
//!
//! An `N`-point real signal packed as `N/2` complex values (`z[k] = x[2k] +
//! i·x[2k+1]`) and run through an `N/2`-point complex FFT yields `Z`. The
//! `N/2 + 1` outputs of the real transform follow from `Z` through the
//! even/odd split
//!
//! ```text
//! X[k] = ½(Z[k] + Z*[N/2-k]) - ½·i·W^k·(Z[k] - Z*[N/2-k]),   W = exp(-2πi/N)
//! ```
//!
//! Output `k` and output `N/2 - k` read the same two inputs, so one unit of
//! work handles the symmetric pair `(idx_p, idx_q = N/2 - idx_p)` for
//! `idx_p` in `[0, N/4]`. Unit 0 produces the purely real DC and Nyquist bins.
//!
//! Units are grouped in blocks; blocks of a row, and rows of a launch, run
//! concurrently. Out of place every unit reads and writes in one step. In
//! place a unit's `idx_q` input may be another unit's `idx_p` output, so a
//! row runs in two phases: every unit gathers its pair into private storage,
//! the row waits for all of them, then every unit scatters.

use alloc::vec::Vec;
use core::ops::Range;

use crate::fft::{check_len, Complex, FftError, Float};
use crate::layout::BatchLayout;
use crate::twiddle::{compute_twiddle, TwiddleTable};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Where the kernel takes its rotation factors from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TwiddleMode {
    /// Look up the precomputed [`TwiddleTable`].
    #[default]
    Table,
    /// Evaluate `exp(-2πi·k/N)` per unit. Reference path only.
    Inline,
}

/// Raw view of a buffer shared by all units of a launch.
///
/// Units write disjoint elements (distinct pairs, non-overlapping rows as
/// checked by [`BatchLayout::validate`]), and in place every read of a row
/// happens before that row's writes.
#[derive(Clone, Copy)]
struct SharedBuf<T: Float> {
    ptr: *mut Complex<T>,
    len: usize,
}

// SAFETY: access is partitioned as described above; no element is written
// by two units or read by one unit while another writes it.
unsafe impl<T: Float> Send for SharedBuf<T> {}
unsafe impl<T: Float> Sync for SharedBuf<T> {}

impl<T: Float> SharedBuf<T> {
    fn new(buf: &mut [Complex<T>]) -> Self {
        Self {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
        }
    }

    /// # Safety
    /// `idx < len`, and no other unit writes `idx` concurrently.
    #[inline(always)]
    unsafe fn read(&self, idx: usize) -> Complex<T> {
        debug_assert!(idx < self.len);
        self.ptr.add(idx).read()
    }

    /// # Safety
    /// `idx < len`, and no other unit reads or writes `idx` concurrently.
    #[inline(always)]
    unsafe fn write(&self, idx: usize, value: Complex<T>) {
        debug_assert!(idx < self.len);
        self.ptr.add(idx).write(value)
    }
}

/// The two outputs of one unit of work, as row-relative indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairOutput<T: Float> {
    pub idx_p: usize,
    pub out_p: Complex<T>,
    pub idx_q: usize,
    pub out_q: Complex<T>,
}

/// DC and Nyquist bins from the first half-FFT value.
#[inline(always)]
pub fn boundary_pair<T: Float>(half: usize, p: Complex<T>) -> PairOutput<T> {
    PairOutput {
        idx_p: 0,
        out_p: Complex::new(p.re + p.im, T::zero()),
        idx_q: half,
        out_q: Complex::new(p.re - p.im, T::zero()),
    }
}

/// Recombine `p = Z[idx_p]` and `q = Z[idx_q]` into `X[idx_p]` and `X[idx_q]`.
///
/// `tw_p` and `tw_q` are `W^idx_p` and `W^idx_q`.
#[inline(always)]
pub fn butterfly_pair<T: Float>(
    idx_p: usize,
    idx_q: usize,
    p: Complex<T>,
    q: Complex<T>,
    tw_p: Complex<T>,
    tw_q: Complex<T>,
) -> PairOutput<T> {
    let half = T::from_f32(0.5);
    let u = Complex::new((p.re + q.re) * half, (p.im - q.im) * half);
    let v = Complex::new((p.im + q.im) * half, (p.re - q.re) * half);
    PairOutput {
        idx_p,
        out_p: Complex::new(
            u.re + v.re * tw_p.re + v.im * tw_p.im,
            u.im - v.im * tw_p.re + v.re * tw_p.im,
        ),
        idx_q,
        out_q: Complex::new(
            u.re + v.re * tw_q.re - v.im * tw_q.im,
            -u.im + v.im * tw_q.re + v.re * tw_q.im,
        ),
    }
}

/// Post-processing kernel bound to one transform length and twiddle source.
pub struct PostProcessKernel<'a, T: Float> {
    n: usize,
    half: usize,
    quarter: usize,
    block_size: usize,
    blocks: usize,
    twiddles: &'a TwiddleTable<T>,
    mode: TwiddleMode,
}

impl<'a, T: Float> PostProcessKernel<'a, T> {
    pub fn new(
        n: usize,
        twiddles: &'a TwiddleTable<T>,
        mode: TwiddleMode,
        block_size: usize,
    ) -> Result<Self, FftError> {
        check_len(n)?;
        if block_size == 0 {
            return Err(FftError::InvalidStride);
        }
        if mode == TwiddleMode::Table && twiddles.len() != n {
            return Err(FftError::MismatchedLengths);
        }
        Ok(Self {
            n,
            half: n / 2,
            quarter: n / 4,
            block_size,
            blocks: (n / 4) / block_size + 1,
            twiddles,
            mode,
        })
    }

    /// Number of blocks per row.
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Units of `block` that have a pair to process; the tail past `N/4` idles.
    fn units(&self, block: usize) -> Range<usize> {
        let start = block * self.block_size;
        let end = (start + self.block_size).min(self.quarter + 1);
        start.min(end)..end
    }

    #[inline(always)]
    fn twiddle(&self, k: usize) -> Complex<T> {
        match self.mode {
            TwiddleMode::Table => self.twiddles.get(k),
            TwiddleMode::Inline => compute_twiddle(k, self.n),
        }
    }

    /// Kernel body for one unit, given the values it gathered. For unit 0
    /// `q` is ignored.
    #[inline(always)]
    pub fn unit(&self, idx_p: usize, p: Complex<T>, q: Complex<T>) -> PairOutput<T> {
        if idx_p == 0 {
            return boundary_pair(self.half, p);
        }
        let idx_q = self.half - idx_p;
        butterfly_pair(idx_p, idx_q, p, q, self.twiddle(idx_p), self.twiddle(idx_q))
    }

    /// Process every row of `layout` from `input` into `output`.
    ///
    /// Nothing is written unless `layout` fits both buffers with disjoint
    /// output windows.
    pub fn run_out_of_place(
        &self,
        layout: &BatchLayout,
        input: &[Complex<T>],
        output: &mut [Complex<T>],
    ) -> Result<(), FftError> {
        layout.validate(self.n, input.len(), output.len(), false)?;
        let out = SharedBuf::new(output);
        for_each(layout.row_count(), |flat| {
            let row = layout.row(flat);
            let src = &input[row.input..row.input + self.half];
            for_each(self.blocks, |block| {
                for idx_p in self.units(block) {
                    // unit 0 reads only Z[0]; Z[N/2] lies past the row
                    let p = src[idx_p];
                    let q = if idx_p == 0 { p } else { src[self.half - idx_p] };
                    let pair = self.unit(idx_p, p, q);
                    // SAFETY: output windows are disjoint per row and pairs
                    // are disjoint within a row.
                    unsafe {
                        out.write(row.output + pair.idx_p, pair.out_p);
                        out.write(row.output + pair.idx_q, pair.out_q);
                    }
                }
            });
        });
        Ok(())
    }

    /// Process every row of `layout` within `data`.
    ///
    /// Nothing is written unless `layout` passes the in-place checks of
    /// [`BatchLayout::validate`].
    pub fn run_in_place(
        &self,
        layout: &BatchLayout,
        data: &mut [Complex<T>],
    ) -> Result<(), FftError> {
        layout.validate(self.n, data.len(), data.len(), true)?;
        let buf = SharedBuf::new(data);
        for_each(layout.row_count(), |flat| {
            let row = layout.row(flat);
            // gather: each block loads its units' pairs into private storage
            let gathered: Vec<Vec<(Complex<T>, Complex<T>)>> = map_collect(self.blocks, |block| {
                self.units(block)
                    .map(|idx_p| {
                        // SAFETY: this row's input window is written by no
                        // other row, and this row has not started writing.
                        unsafe {
                            let p = buf.read(row.input + idx_p);
                            let q = if idx_p == 0 {
                                p
                            } else {
                                buf.read(row.input + self.half - idx_p)
                            };
                            (p, q)
                        }
                    })
                    .collect()
            });
            // the row barrier: every block has gathered before any scatters
            for_each(gathered.len(), |block| {
                let start = block * self.block_size;
                for (k, &(p, q)) in gathered[block].iter().enumerate() {
                    let pair = self.unit(start + k, p, q);
                    // SAFETY: as in `run_out_of_place`; all reads of this
                    // row completed before the barrier.
                    unsafe {
                        buf.write(row.output + pair.idx_p, pair.out_p);
                        buf.write(row.output + pair.idx_q, pair.out_q);
                    }
                }
            });
        });
        Ok(())
    }
}

#[cfg(feature = "parallel")]
fn for_each<F: Fn(usize) + Send + Sync>(count: usize, f: F) {
    (0..count).into_par_iter().for_each(f);
}

#[cfg(not(feature = "parallel"))]
fn for_each<F: Fn(usize) + Send + Sync>(count: usize, f: F) {
    (0..count).for_each(f);
}

#[cfg(feature = "parallel")]
fn map_collect<R: Send, F: Fn(usize) -> R + Send + Sync>(count: usize, f: F) -> Vec<R> {
    (0..count).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn map_collect<R: Send, F: Fn(usize) -> R + Send + Sync>(count: usize, f: F) -> Vec<R> {
    (0..count).map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::{Complex32, Complex64};

    fn naive_r2c(x: &[f64]) -> Vec<Complex64> {
        let n = x.len();
        (0..=n / 2)
            .map(|k| {
                let mut acc = Complex64::zero();
                for (j, &v) in x.iter().enumerate() {
                    acc += Complex64::expi(-core::f64::consts::TAU * (j * k) as f64 / n as f64)
                        .scale(v);
                }
                acc
            })
            .collect()
    }

    fn naive_half_fft(x: &[f64]) -> Vec<Complex64> {
        let m = x.len() / 2;
        (0..m)
            .map(|k| {
                let mut acc = Complex64::zero();
                for j in 0..m {
                    let z = Complex64::new(x[2 * j], x[2 * j + 1]);
                    acc += z * Complex64::expi(-core::f64::consts::TAU * (j * k) as f64 / m as f64);
                }
                acc
            })
            .collect()
    }

    #[test]
    fn four_point_example() {
        let x = [1.0f64, 2.0, 3.0, 4.0];
        let z = naive_half_fft(&x);
        let table = TwiddleTable::<f64>::generate(4).unwrap();
        let kernel = PostProcessKernel::new(4, &table, TwiddleMode::Table, 512).unwrap();
        let mut out = vec![Complex64::zero(); 3];
        kernel
            .run_out_of_place(&crate::layout::BatchLayout::contiguous(4, 1), &z, &mut out)
            .unwrap();
        let want = [
            Complex64::new(10.0, 0.0),
            Complex64::new(-2.0, 2.0),
            Complex64::new(-2.0, 0.0),
        ];
        for (a, b) in out.iter().zip(want.iter()) {
            assert!((a.re - b.re).abs() < 1e-12, "{a} vs {b}");
            assert!((a.im - b.im).abs() < 1e-12, "{a} vs {b}");
        }
    }

    #[test]
    fn matches_naive_dft_for_even_lengths() {
        for n in (4..=40).step_by(2) {
            let x: Vec<f64> = (0..n).map(|i| ((i * 7 + 3) % 11) as f64 - 4.5).collect();
            let z = naive_half_fft(&x);
            let table = TwiddleTable::<f64>::generate(n).unwrap();
            let kernel = PostProcessKernel::new(n, &table, TwiddleMode::Table, 3).unwrap();
            let mut out = vec![Complex64::zero(); n / 2 + 1];
            kernel
                .run_out_of_place(&crate::layout::BatchLayout::contiguous(n, 1), &z, &mut out)
                .unwrap();
            for (k, (a, b)) in out.iter().zip(naive_r2c(&x).iter()).enumerate() {
                assert!((*a - *b).norm() < 1e-9, "n={n} k={k}: {a} vs {b}");
            }
            assert_eq!(out[0].im, 0.0);
            assert_eq!(out[n / 2].im, 0.0);
        }
    }

    #[test]
    fn inline_twiddles_match_table() {
        let n = 22;
        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
        let z = naive_half_fft(&x);
        let table = TwiddleTable::<f64>::generate(n).unwrap();
        let layout = crate::layout::BatchLayout::contiguous(n, 1);
        let mut a = vec![Complex64::zero(); n / 2 + 1];
        let mut b = a.clone();
        PostProcessKernel::new(n, &table, TwiddleMode::Table, 4)
            .unwrap()
            .run_out_of_place(&layout, &z, &mut a)
            .unwrap();
        PostProcessKernel::new(n, &table, TwiddleMode::Inline, 4)
            .unwrap()
            .run_out_of_place(&layout, &z, &mut b)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn in_place_matches_out_of_place() {
        let n = 18;
        let x: Vec<f64> = (0..2 * n).map(|i| (i % 5) as f64 + 0.25 * i as f64).collect();
        let mut z = naive_half_fft(&x[..n]);
        z.extend(naive_half_fft(&x[n..]));
        let table = TwiddleTable::<f64>::generate(n).unwrap();
        let kernel = PostProcessKernel::new(n, &table, TwiddleMode::Table, 2).unwrap();

        let mut out = vec![Complex64::zero(); 2 * (n / 2 + 1)];
        kernel
            .run_out_of_place(&crate::layout::BatchLayout::contiguous(n, 2), &z, &mut out)
            .unwrap();

        let mut data = vec![Complex64::zero(); 2 * (n / 2 + 1)];
        data[..n / 2].copy_from_slice(&z[..n / 2]);
        data[n / 2 + 1..n + 1].copy_from_slice(&z[n / 2..]);
        kernel
            .run_in_place(&crate::layout::BatchLayout::in_place(n, 2), &mut data)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn short_output_slice_is_rejected() {
        let x: Vec<f64> = (0..8).map(|i| i as f64 + 1.0).collect();
        let z = naive_half_fft(&x);
        let table = TwiddleTable::<f64>::generate(8).unwrap();
        let kernel = PostProcessKernel::new(8, &table, TwiddleMode::Table, 512).unwrap();
        let sentinel = Complex64::new(-7.0, 7.0);
        let mut big = vec![sentinel; 5];
        let layout = crate::layout::BatchLayout::contiguous(8, 1);
        assert_eq!(
            kernel.run_out_of_place(&layout, &z, &mut big[..1]),
            Err(FftError::OutOfBounds)
        );
        assert!(big.iter().all(|&c| c == sentinel));
        assert_eq!(
            kernel.run_out_of_place(&layout, &z[..3], &mut big),
            Err(FftError::OutOfBounds)
        );
    }

    #[test]
    fn unsafe_in_place_layout_is_rejected() {
        let table = TwiddleTable::<f32>::generate(14).unwrap();
        let kernel = PostProcessKernel::new(14, &table, TwiddleMode::Table, 4).unwrap();
        let mut data = vec![Complex32::new(1.0, 1.0); 24];
        assert_eq!(
            kernel.run_in_place(&crate::layout::BatchLayout::contiguous(14, 3), &mut data),
            Err(FftError::OverlappingLayout)
        );
        assert!(data.iter().all(|&c| c == Complex32::new(1.0, 1.0)));
        assert_eq!(
            kernel.run_in_place(&crate::layout::BatchLayout::in_place(14, 3), &mut data[..23]),
            Err(FftError::OutOfBounds)
        );
    }

    #[test]
    fn units_cover_each_pair_once() {
        let table = TwiddleTable::<f32>::generate(32).unwrap();
        for bs in [1, 2, 3, 8, 9, 512] {
            let kernel = PostProcessKernel::new(32, &table, TwiddleMode::Table, bs).unwrap();
            let all: Vec<usize> = (0..kernel.blocks()).flat_map(|b| kernel.units(b)).collect();
            assert_eq!(all, (0..=8).collect::<Vec<_>>(), "block size {bs}");
        }
    }

    #[test]
    fn rejects_bad_configuration() {
        let table = TwiddleTable::<f32>::generate(8).unwrap();
        assert_eq!(
            PostProcessKernel::new(16, &table, TwiddleMode::Table, 4).err(),
            Some(FftError::MismatchedLengths)
        );
        assert!(PostProcessKernel::new(16, &table, TwiddleMode::Inline, 4).is_ok());
        assert_eq!(
            PostProcessKernel::new(8, &table, TwiddleMode::Table, 0).err(),
            Some(FftError::InvalidStride)
        );
        assert_eq!(
            PostProcessKernel::new(7, &table, TwiddleMode::Table, 4).err(),
            Some(FftError::InvalidLength(7))
        );
    }

    #[test]
    fn self_paired_unit_is_consistent() {
        // n divisible by 4: unit N/4 has idx_p == idx_q
        let table = TwiddleTable::<f32>::generate(8).unwrap();
        let kernel = PostProcessKernel::new(8, &table, TwiddleMode::Table, 512).unwrap();
        let z = Complex32::new(1.5, -0.5);
        let pair = kernel.unit(2, z, z);
        assert_eq!(pair.idx_p, pair.idx_q);
        assert!((pair.out_p.re - pair.out_q.re).abs() < 1e-6);
        assert!((pair.out_p.im - pair.out_q.im).abs() < 1e-6);
    }
}
