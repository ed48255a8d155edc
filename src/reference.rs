//! Reference computations for validating the post-processing kernel.
//!
//! Two independent paths produce the same `N/2 + 1` outputs per batch entry:
//!
//! * [`oracle_r2c`] runs the direct real-to-complex transform from `realfft`.
//! * [`sequential_r2c`] packs each entry, runs the half-length FFT through a
//!   [`HalfFft`] backend and recombines one bin at a time with rotation
//!   factors evaluated per index, with no table and no pairing.
//!
//! [`OutputSummary`] prints a tagged aggregate for eyeballing runs side by
//! side; [`compare`] is the element-wise check tests rely on.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use realfft::RealFftPlanner;
use rustfft::num_complex::Complex as RustComplex;
use rustfft::FftNum;

use crate::fft::{check_len, Complex, FftError, Float, HalfFft};
use crate::num::pack_real;

/// Values printed by an [`OutputSummary`].
pub const SUMMARY_HEAD: usize = 16;

fn check_batch(n: usize, batch: usize, len: usize) -> Result<(), FftError> {
    check_len(n)?;
    if batch == 0 {
        return Err(FftError::EmptyInput);
    }
    if len != n * batch {
        return Err(FftError::MismatchedLengths);
    }
    Ok(())
}

/// Direct R2C transform of `batch` contiguous length-`n` signals.
pub fn oracle_r2c<T: Float + FftNum>(
    n: usize,
    batch: usize,
    input: &[T],
) -> Result<Vec<Complex<T>>, FftError> {
    check_batch(n, batch, input.len())?;
    let mut planner = RealFftPlanner::<T>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut scratch_in = r2c.make_input_vec();
    let mut spectrum = r2c.make_output_vec();
    let mut out = Vec::with_capacity(batch * (n / 2 + 1));
    for signal in input.chunks_exact(n) {
        scratch_in.copy_from_slice(signal);
        r2c.process(&mut scratch_in, &mut spectrum)
            .map_err(|_| FftError::Backend)?;
        out.extend(spectrum.iter().map(|c: &RustComplex<T>| Complex::new(c.re, c.im)));
    }
    Ok(out)
}

/// Half-length FFT plus one-bin-at-a-time recombination, per batch entry.
pub fn sequential_r2c<T: Float + FftNum>(
    n: usize,
    batch: usize,
    input: &[T],
    fft: &dyn HalfFft<T>,
) -> Result<Vec<Complex<T>>, FftError> {
    check_batch(n, batch, input.len())?;
    let half = n / 2;
    if fft.len() != half {
        return Err(FftError::MismatchedLengths);
    }
    let one = Complex::new(<T as Float>::one(), <T as Float>::zero());
    let i = Complex::<T>::i();
    let h = <T as Float>::from_f32(0.5);

    let mut work = vec![Complex::<T>::zero(); half];
    let mut out = Vec::with_capacity(batch * (half + 1));
    for signal in input.chunks_exact(n) {
        pack_real(signal, &mut work);
        fft.process(&mut work)?;

        let z0 = work[0];
        out.push(Complex::new(z0.re + z0.im, <T as Float>::zero()));
        for r in 1..half {
            let theta = <T as Float>::from_f64(-core::f64::consts::TAU * r as f64 / n as f64);
            let omega = Complex::expi(theta);
            let zr = work[r];
            let zt = work[half - r];
            let x = zr * (one - i * omega) + zt.conj() * (one + i * omega);
            out.push(x.scale(h));
        }
        out.push(Complex::new(z0.re - z0.im, <T as Float>::zero()));
    }
    Ok(out)
}

/// Tagged aggregate of a run's outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSummary {
    pub tag: String,
    pub count: usize,
    pub sum: Complex<f64>,
    pub head: Vec<Complex<f64>>,
}

impl OutputSummary {
    pub fn of<T: Float>(tag: &str, values: &[Complex<T>]) -> Self {
        let mut sum = Complex::<f64>::zero();
        for v in values {
            sum += Complex::new(v.re.to_f64(), v.im.to_f64());
        }
        Self {
            tag: tag.into(),
            count: values.len(),
            sum,
            head: values
                .iter()
                .take(SUMMARY_HEAD)
                .map(|v| Complex::new(v.re.to_f64(), v.im.to_f64()))
                .collect(),
        }
    }
}

impl fmt::Display for OutputSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} cplx output ({} values): ------------------", self.tag, self.count)?;
        for v in &self.head {
            write!(f, "({:e}, {:e}), ", v.re, v.im)?;
        }
        writeln!(f)?;
        write!(f, "sum: ({:e}, {:e})", self.sum.re, self.sum.im)
    }
}

/// Disagreement found by [`compare`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mismatch {
    Length {
        expected: usize,
        actual: usize,
    },
    Value {
        index: usize,
        expected: Complex<f64>,
        actual: Complex<f64>,
        error: f64,
        tolerance: f64,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { expected, actual } => {
                write!(f, "expected {expected} values, got {actual}")
            }
            Self::Value {
                index,
                expected,
                actual,
                error,
                tolerance,
            } => write!(
                f,
                "value {index}: expected {expected}, got {actual} (relative error {error:e} > {tolerance:e})"
            ),
        }
    }
}

impl std::error::Error for Mismatch {}

/// Element-wise comparison relative to the largest-magnitude component of
/// `expected`. Returns the worst relative error on success.
pub fn compare<T: Float>(
    expected: &[Complex<T>],
    actual: &[Complex<T>],
    tolerance: f64,
) -> Result<f64, Mismatch> {
    if expected.len() != actual.len() {
        return Err(Mismatch::Length {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    let scale = expected
        .iter()
        .map(|c| c.re.to_f64().abs().max(c.im.to_f64().abs()))
        .fold(0.0f64, f64::max);
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let mut worst = 0.0f64;
    for (index, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
        let e = Complex::new(e.re.to_f64(), e.im.to_f64());
        let a = Complex::new(a.re.to_f64(), a.im.to_f64());
        let error = (e.re - a.re).abs().max((e.im - a.im).abs()) / scale;
        // NaN never passes
        if !(error <= tolerance) {
            return Err(Mismatch::Value {
                index,
                expected: e,
                actual: a,
                error,
                tolerance,
            });
        }
        worst = worst.max(error);
    }
    Ok(worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::{Complex32, Complex64, RustFftBackend};

    #[test]
    fn oracle_four_point() {
        let out = oracle_r2c::<f64>(4, 1, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let want = [
            Complex64::new(10.0, 0.0),
            Complex64::new(-2.0, 2.0),
            Complex64::new(-2.0, 0.0),
        ];
        assert!(compare(&want, &out, 1e-12).is_ok());
    }

    #[test]
    fn sequential_matches_oracle() {
        let n = 14;
        let batch = 3;
        let input: Vec<f32> = (0..n * batch)
            .map(|i| ((i + 1) * 5 - (i % 7)) as f32)
            .collect();
        let fft = RustFftBackend::<f32>::new(n / 2);
        let seq = sequential_r2c(n, batch, &input, &fft).unwrap();
        let oracle = oracle_r2c(n, batch, &input).unwrap();
        assert_eq!(seq.len(), 24);
        let worst = compare(&oracle, &seq, 1e-5).unwrap();
        assert!(worst < 1e-5);
    }

    #[test]
    fn reference_paths_reject_bad_input() {
        let fft = RustFftBackend::<f32>::new(2);
        assert_eq!(
            oracle_r2c::<f32>(5, 1, &[0.0; 5]).unwrap_err(),
            FftError::InvalidLength(5)
        );
        assert_eq!(
            sequential_r2c::<f32>(4, 2, &[0.0; 4], &fft).unwrap_err(),
            FftError::MismatchedLengths
        );
        assert_eq!(
            sequential_r2c::<f32>(8, 1, &[0.0; 8], &fft).unwrap_err(),
            FftError::MismatchedLengths
        );
        assert_eq!(
            oracle_r2c::<f32>(4, 0, &[]).unwrap_err(),
            FftError::EmptyInput
        );
    }

    #[test]
    fn summary_sums_and_truncates() {
        let values: Vec<Complex32> = (0..20).map(|i| Complex32::new(i as f32, 1.0)).collect();
        let s = OutputSummary::of("ref", &values);
        assert_eq!(s.count, 20);
        assert_eq!(s.head.len(), SUMMARY_HEAD);
        assert_eq!(s.sum, Complex64::new(190.0, 20.0));
        let text = s.to_string();
        assert!(text.starts_with("ref cplx output (20 values)"));
        assert!(text.ends_with("sum: (1.9e2, 2e1)"));
    }

    #[test]
    fn compare_reports_first_offender() {
        let a = [Complex64::new(100.0, 0.0), Complex64::new(1.0, 1.0)];
        let b = [Complex64::new(100.0, 0.0), Complex64::new(1.5, 1.0)];
        match compare(&a, &b, 1e-3) {
            Err(Mismatch::Value { index, error, .. }) => {
                assert_eq!(index, 1);
                assert!((error - 0.005).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(compare(&a, &b, 1e-2).is_ok());
        assert_eq!(
            compare(&a, &b[..1], 1.0),
            Err(Mismatch::Length {
                expected: 2,
                actual: 1
            })
        );
        let nan = [Complex64::new(f64::NAN, 0.0), Complex64::new(1.0, 1.0)];
        assert!(compare(&a, &nan, 1.0).is_err());
    }
}
