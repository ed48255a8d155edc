use std::fmt;

use anyhow::{Context, Result};
use r2cfft::fft::{FftNum, RustFftBackend};
use r2cfft::reference::{compare, oracle_r2c, sequential_r2c, OutputSummary, SUMMARY_HEAD};
use r2cfft::{BatchLayout, Complex, Float, LaunchConfig, LaunchReport, RealFftPlanner, TwiddleMode};

/// What to run and how strictly to judge it.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub len: usize,
    pub batch: usize,
    pub in_place: bool,
    pub block_size: Option<usize>,
    pub threads: Option<usize>,
    pub twiddle_mode: TwiddleMode,
    pub tolerance: f64,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            len: 14,
            batch: 3,
            in_place: false,
            block_size: None,
            threads: None,
            twiddle_mode: TwiddleMode::Table,
            tolerance: 1e-4,
        }
    }
}

/// Leading samples of the first transform's real input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputHead(pub Vec<f64>);

impl fmt::Display for InputHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "real input: ------------------")?;
        for v in &self.0 {
            write!(f, "{v:e}, ")?;
        }
        Ok(())
    }
}

/// Summaries print in field order: input, `ref` (direct real transform),
/// `cpu` (sequential recombination), `kernel`.
pub struct CheckOutcome {
    pub input: InputHead,
    pub oracle: OutputSummary,
    pub reference: OutputSummary,
    pub kernel: OutputSummary,
    pub report: LaunchReport,
    /// Worst error against the sequential reference.
    pub worst_error: f64,
    /// Worst error against the direct real transform.
    pub worst_oracle_error: f64,
}

/// Deterministic test signal: `x[i] = (i + 1) * 5 - (i % 7)`.
pub fn test_signal<T: Float>(len: usize) -> Vec<T> {
    (0..len).map(|i| T::from_f64(((i + 1) * 5 - (i % 7)) as f64)).collect()
}

/// Run the kernel pipeline and both references on [`test_signal`], failing
/// when the kernel disagrees with either beyond `opts.tolerance`.
pub fn run_check<T: Float + FftNum>(opts: &CheckOptions) -> Result<CheckOutcome> {
    let n = opts.len;
    let batch = opts.batch;
    let mut cfg = LaunchConfig::from_env().with_twiddle_mode(opts.twiddle_mode);
    if let Some(bs) = opts.block_size {
        cfg = cfg.with_block_size(bs);
    }
    if let Some(threads) = opts.threads {
        cfg = cfg.with_threads(threads);
    }

    let plan = RealFftPlanner::<T>::with_config(cfg)
        .plan(n)
        .with_context(|| format!("planning a length-{n} transform"))?;
    let input = test_signal::<T>(n * batch);

    let (kernel, report) = if opts.in_place {
        let layout = BatchLayout::in_place(n, batch);
        let mut data = vec![Complex::zero(); layout.required_output_len(n)];
        plan.pack_in_place(&input, &mut data, &layout)?;
        let report = plan.process_in_place(&mut data, &layout)?;
        (data, report)
    } else {
        let mut out = vec![Complex::zero(); batch * plan.complex_len()];
        let report = plan.process(&input, &mut out)?;
        (out, report)
    };
    log::info!("{report}");

    let fft = RustFftBackend::<T>::new(n / 2);
    let reference = sequential_r2c(n, batch, &input, &fft)?;
    let oracle = oracle_r2c(n, batch, &input)?;
    let worst_error = compare(&reference, &kernel, opts.tolerance)
        .context("kernel output disagrees with the sequential reference")?;
    let worst_oracle_error = compare(&oracle, &kernel, opts.tolerance)
        .context("kernel output disagrees with the direct real transform")?;

    Ok(CheckOutcome {
        input: InputHead(
            input
                .iter()
                .take(n.min(SUMMARY_HEAD))
                .map(|&x| <T as Float>::to_f64(x))
                .collect(),
        ),
        oracle: OutputSummary::of("ref", &oracle),
        reference: OutputSummary::of("cpu", &reference),
        kernel: OutputSummary::of("kernel", &kernel),
        report,
        worst_error,
        worst_oracle_error,
    })
}
