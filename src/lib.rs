//! Spectral proper orthogonal decomposition (SPOD) for statistically
//! stationary data.
//!
//! SPOD generalizes POD to stationary time series: instead of diagonalizing
//! a single spatial covariance, it diagonalizes one cross-spectral density
//! per temporal frequency, producing modes that are orthogonal in space and
//! uncorrelated in time across realizations. The estimator is Welch-style:
//! the time series is split into overlapping windowed segments, each segment
//! is Fourier transformed, and at every frequency the segment coefficients
//! form the low-rank "method of snapshots" eigenproblem.
//!
//! The crate runs in two sequential passes: one along the time axis
//! (producing per-segment Fourier blocks, held in memory or streamed to
//! disk), one along the frequency axis (producing mode energies and mode
//! shapes). Peak memory is one segment during the first pass and one
//! frequency slice during the second.
//!
//! See Towne, Schmidt & Colonius, *Spectral analysis of fluid flows using
//! proper orthogonal decomposition*, JFM 847 (2018), and Schmidt & Colonius,
//! *Guide to spectral proper orthogonal decomposition*, AIAA J 58 (2020).
//!
//! ```
//! use ndarray::Array2;
//! use spod_rs::{spod, EagerSnapshots, SpodOptions};
//!
//! // 400 snapshots of a 4-point field
//! let x = Array2::from_shape_fn((400, 4), |(t, i)| {
//!     (0.3 * t as f64).sin() * (1.0 + i as f64)
//! });
//! let mut source = EagerSnapshots::from_real(x.into_dyn()).unwrap();
//! let result = spod(&mut source, SpodOptions::default()).unwrap();
//! assert_eq!(result.frequencies.len(), result.energies.nrows());
//! ```

pub mod error;
pub mod fft;
pub mod freq;
pub mod modes;
pub mod params;
pub mod provider;
pub mod special;
pub mod spod;
pub mod store;
pub mod windows;

mod solver;

pub use error::Error;
pub use fft::BlockFft;
pub use freq::frequency_axis;
pub use modes::ModeAccessor;
pub use params::{SpodOptions, SpodParams, WindowChoice};
pub use provider::{EagerSnapshots, LazySnapshots, SnapshotSource};
pub use spod::{spod, Spod};
pub use store::BlockStore;
pub use windows::{gain_correction, hamming};
