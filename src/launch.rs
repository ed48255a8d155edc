//! Launch orchestration for the post-processing kernel.
//!
//! The kernel is scheduled like a device launch: units of work are grouped
//! into blocks of [`LaunchConfig::block_size`], and blocks form a
//! three-axis grid (position within the transform, outer-dimension row,
//! batch entry). This module sizes the grid, enforces per-axis limits,
//! validates buffer layouts, times the launch and logs the result.
//!
//! Tunables come from, in order of precedence, the process-wide setters
//! ([`set_block_size`], [`set_threads`], [`set_max_grid_dim`]), the
//! environment variables `R2CFFT_BLOCK_SIZE`, `R2CFFT_THREADS` and
//! `R2CFFT_MAX_GRID_DIM`, and the built-in defaults.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::fft::{check_len, Complex, FftError, Float, GridAxis};
use crate::layout::BatchLayout;
use crate::post::{PostProcessKernel, TwiddleMode};
use crate::twiddle::TwiddleTable;

/// Units of work per block.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Per-axis block limit for the row and batch axes.
pub const DEFAULT_MAX_GRID_DIM: usize = 65535;

static BLOCK_SIZE_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
static THREADS_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
static MAX_GRID_DIM_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
static LAUNCH_ENV: OnceLock<LaunchEnv> = OnceLock::new();

struct LaunchEnv {
    block_size: usize,
    threads: usize,
    max_grid_dim: usize,
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!("ignoring {key}={raw:?}: expected a positive integer");
            None
        }
    }
}

fn launch_env() -> &'static LaunchEnv {
    LAUNCH_ENV.get_or_init(|| LaunchEnv {
        block_size: env_usize("R2CFFT_BLOCK_SIZE").unwrap_or(DEFAULT_BLOCK_SIZE),
        threads: env_usize("R2CFFT_THREADS").unwrap_or(0),
        max_grid_dim: env_usize("R2CFFT_MAX_GRID_DIM").unwrap_or(DEFAULT_MAX_GRID_DIM),
    })
}

fn resolve(override_value: &AtomicUsize, fallback: usize) -> usize {
    match override_value.load(Ordering::Relaxed) {
        0 => fallback,
        v => v,
    }
}

/// Set the number of units per block. `0` reverts to the environment or default.
pub fn set_block_size(size: usize) {
    BLOCK_SIZE_OVERRIDE.store(size, Ordering::Relaxed);
}

/// Run launches on a dedicated pool of `threads` workers. `0` reverts to the
/// environment, or to the global rayon pool when unset.
pub fn set_threads(threads: usize) {
    THREADS_OVERRIDE.store(threads, Ordering::Relaxed);
}

/// Override the per-axis grid limit. `0` reverts to the environment or default.
pub fn set_max_grid_dim(limit: usize) {
    MAX_GRID_DIM_OVERRIDE.store(limit, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub block_size: usize,
    pub max_grid_dim: usize,
    pub twiddle_mode: TwiddleMode,
    /// Worker threads; `0` uses the global rayon pool.
    pub threads: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_grid_dim: DEFAULT_MAX_GRID_DIM,
            twiddle_mode: TwiddleMode::Table,
            threads: 0,
        }
    }
}

impl LaunchConfig {
    /// Configuration with setter and environment overrides applied.
    pub fn from_env() -> Self {
        let env = launch_env();
        Self {
            block_size: resolve(&BLOCK_SIZE_OVERRIDE, env.block_size),
            max_grid_dim: resolve(&MAX_GRID_DIM_OVERRIDE, env.max_grid_dim),
            twiddle_mode: TwiddleMode::Table,
            threads: resolve(&THREADS_OVERRIDE, env.threads),
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_twiddle_mode(mut self, mode: TwiddleMode) -> Self {
        self.twiddle_mode = mode;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_max_grid_dim(mut self, limit: usize) -> Self {
        self.max_grid_dim = limit;
        self
    }
}

/// Block counts along the three launch axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGrid {
    /// Blocks along the transform, covering `idx_p` in `[0, N/4]`.
    pub blocks: usize,
    pub rows: usize,
    pub batches: usize,
}

impl LaunchGrid {
    /// Size the grid for a length-`n` transform over `layout`.
    ///
    /// Fails when the row or batch axis exceeds `cfg.max_grid_dim`; a
    /// partial launch would leave the overflowing rows unwritten.
    pub fn for_transform(
        n: usize,
        layout: &BatchLayout,
        cfg: &LaunchConfig,
    ) -> Result<Self, FftError> {
        check_len(n)?;
        if cfg.block_size == 0 {
            return Err(FftError::InvalidStride);
        }
        let grid = Self {
            // N/4 + 1 units: idx_p = N/4 must get a block even when N/4
            // is a multiple of the block size
            blocks: (n / 4) / cfg.block_size + 1,
            rows: layout.high_dimension,
            batches: layout.batch,
        };
        for (axis, requested) in [(GridAxis::Row, grid.rows), (GridAxis::Batch, grid.batches)] {
            if requested > cfg.max_grid_dim {
                warn!(
                    "{axis} axis of {requested} exceeds launch limit {}; rejecting launch",
                    cfg.max_grid_dim
                );
                return Err(FftError::GridOverflow {
                    axis,
                    requested,
                    limit: cfg.max_grid_dim,
                });
            }
        }
        Ok(grid)
    }

    /// Units scheduled per row, including the idle tail of the last block.
    pub fn units_per_row(&self, block_size: usize) -> usize {
        self.blocks * block_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchReport {
    pub grid: LaunchGrid,
    pub block_size: usize,
    pub in_place: bool,
    pub twiddle_mode: TwiddleMode,
    pub elapsed: Duration,
}

impl fmt::Display for LaunchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grid {}, {}, {}, block {}, {}, {:?} twiddles, time (milliseconds): {:.4}",
            self.grid.blocks,
            self.grid.rows,
            self.grid.batches,
            self.block_size,
            if self.in_place { "in-place" } else { "out-of-place" },
            self.twiddle_mode,
            self.elapsed.as_secs_f64() * 1e3,
        )
    }
}

/// Run `job` on a dedicated pool when `threads > 0`.
#[cfg(feature = "parallel")]
fn install<R: Send>(threads: usize, job: impl FnOnce() -> R + Send) -> R {
    if threads == 0 {
        return job();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(job),
        Err(err) => {
            warn!("could not build a {threads}-thread pool ({err}); using the global pool");
            job()
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn install<R: Send>(_threads: usize, job: impl FnOnce() -> R + Send) -> R {
    job()
}

fn finish(grid: LaunchGrid, cfg: &LaunchConfig, in_place: bool, start: Instant) -> LaunchReport {
    let report = LaunchReport {
        grid,
        block_size: cfg.block_size,
        in_place,
        twiddle_mode: cfg.twiddle_mode,
        elapsed: start.elapsed(),
    };
    debug!("post-process launch: {report}");
    report
}

/// Post-process the half-length FFT rows in `input` into `output`.
pub fn launch_out_of_place<T: Float>(
    n: usize,
    layout: &BatchLayout,
    twiddles: &TwiddleTable<T>,
    cfg: &LaunchConfig,
    input: &[Complex<T>],
    output: &mut [Complex<T>],
) -> Result<LaunchReport, FftError> {
    let grid = LaunchGrid::for_transform(n, layout, cfg)?;
    let kernel = PostProcessKernel::new(n, twiddles, cfg.twiddle_mode, cfg.block_size)?;
    let start = Instant::now();
    if let Err(err) = install(cfg.threads, || kernel.run_out_of_place(layout, input, output)) {
        warn!("rejecting out-of-place layout {layout:?}: {err}");
        return Err(err);
    }
    Ok(finish(grid, cfg, false, start))
}

/// Post-process the half-length FFT rows in `data`, overwriting them with
/// the `N/2 + 1` outputs at the layout's output offsets.
pub fn launch_in_place<T: Float>(
    n: usize,
    layout: &BatchLayout,
    twiddles: &TwiddleTable<T>,
    cfg: &LaunchConfig,
    data: &mut [Complex<T>],
) -> Result<LaunchReport, FftError> {
    let grid = LaunchGrid::for_transform(n, layout, cfg)?;
    let kernel = PostProcessKernel::new(n, twiddles, cfg.twiddle_mode, cfg.block_size)?;
    let start = Instant::now();
    if let Err(err) = install(cfg.threads, || kernel.run_in_place(layout, data)) {
        warn!("rejecting in-place layout {layout:?}: {err}");
        return Err(err);
    }
    Ok(finish(grid, cfg, true, start))
}
