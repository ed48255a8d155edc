//! # r2cfft - batched real-to-complex FFT post-processing
//!
//! A real signal of even length `N` is transformed by packing it into `N/2`
//! complex values, running an `N/2`-point complex FFT and recombining the
//! result into the `N/2 + 1` non-redundant spectrum bins. This crate provides
//! the recombination step as a data-parallel kernel over batched, strided
//! buffers, along with everything needed to drive and check it:
//!
//! - [`twiddle`]: precomputed rotation factors, cached per length
//! - [`layout`]: batch/row addressing and layout validation
//! - [`post`]: the pairwise post-processing kernel, in or out of place
//! - [`launch`]: grid sizing, limits, tunables and timing
//! - [`rfft`]: the full pack, FFT, recombine pipeline
//! - [`reference`]: sequential and direct reference transforms for checking
//!
//! ## Cargo Features
//!
//! - `parallel` (default): run rows and blocks on Rayon
//!
//! ## Example
//!
//! ```
//! use r2cfft::rfft::RealFftPlanner;
//!
//! let mut planner = RealFftPlanner::<f32>::new();
//! let plan = planner.plan(4).unwrap();
//! let spectrum = plan.transform(&[1.0, 2.0, 3.0, 4.0]).unwrap();
//! assert_eq!(spectrum.len(), 3);
//! assert!((spectrum[0].re - 10.0).abs() < 1e-6);
//! ```

extern crate alloc;

pub mod fft;
/// Complex numbers and the floating-point abstraction.
pub mod num;

pub mod launch;
pub mod layout;
pub mod post;
pub mod reference;
pub mod rfft;
pub mod twiddle;

pub use fft::{Complex, Complex32, Complex64, FftError, Float, GridAxis};
pub use launch::{LaunchConfig, LaunchReport};
pub use layout::BatchLayout;
pub use post::{PostProcessKernel, TwiddleMode};
pub use rfft::{RealFftPlan, RealFftPlanner};
pub use twiddle::TwiddleTable;
