//! Resolution of user options into a complete, validated parameter set.
//!
//! Every default of the estimator lives here: window length and shape,
//! overlap, timestep, weight, mean, block count, spectrum sidedness. All
//! feasibility checks run before the pipeline touches any snapshot beyond
//! the optional sidedness peek, so an infeasible call fails without I/O.

use crate::error::Error;
use crate::provider::{flatten_column_major, SnapshotSource};
use crate::windows::{gain_correction, hamming};
use ndarray::ArrayD;
use num_complex::Complex;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// How the segment window is chosen.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum WindowChoice {
    /// Hamming window of length `2^⌊log₂(n_t/10)⌋`.
    #[default]
    Auto,
    /// Hamming window of the given length.
    Length(usize),
    /// Explicit window samples, used verbatim; the segment length is the
    /// vector's own length.
    Samples(Vec<f64>),
}

/// User-facing options. Every field has a documented default; `None` (or
/// `Auto`) means "resolve it for me".
#[derive(Debug, Clone)]
pub struct SpodOptions {
    /// Segment window selection.
    pub window: WindowChoice,
    /// Spatial inner-product weight, one value per spatial point.
    pub weight: Option<ArrayD<f64>>,
    /// Segment overlap in samples. Default: half the segment length.
    pub n_ovlp: Option<usize>,
    /// Timestep between snapshots. Default: 1.0.
    pub dt: Option<f64>,
    /// Long-time mean to subtract from every snapshot. Default: the
    /// temporal mean for eager sources, zero (with a warning) for lazy
    /// ones.
    pub mean: Option<ArrayD<Complex<f64>>>,
    /// Force one- or two-sided spectra instead of inferring from the data.
    pub is_complex: Option<bool>,
    /// Snapshot count for sources that cannot report one.
    pub n_t: Option<usize>,
    /// Compute chi-squared confidence bounds on the mode energies.
    pub confidence: bool,
    /// Confidence level for the bounds. Default: 0.95.
    pub conf_level: Option<f64>,
    /// Persist Fourier blocks to disk and stream frequencies back instead
    /// of holding every block in memory.
    pub save_blocks: bool,
    /// Delete the block files once mode extraction completes.
    pub delete_blocks: bool,
    /// Root directory for streaming-mode output.
    pub save_dir: PathBuf,
    /// Frequency indices retained in streaming mode. Default: all.
    pub save_freqs: Option<BTreeSet<usize>>,
    /// Number of leading modes persisted per frequency. Default: all.
    pub n_save: Option<usize>,
}

impl Default for SpodOptions {
    fn default() -> Self {
        Self {
            window: WindowChoice::Auto,
            weight: None,
            n_ovlp: None,
            dt: None,
            mean: None,
            is_complex: None,
            n_t: None,
            confidence: false,
            conf_level: None,
            save_blocks: false,
            delete_blocks: true,
            save_dir: PathBuf::from("results"),
            save_freqs: None,
            n_save: None,
        }
    }
}

/// Fully resolved spectral parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SpodParams {
    /// Total snapshot count.
    pub n_t: usize,
    /// Segment (DFT) length.
    pub n_dft: usize,
    /// Segment overlap in samples.
    pub n_ovlp: usize,
    /// Number of segments.
    pub n_blks: usize,
    /// Number of retained frequency bins.
    pub n_freq: usize,
    /// Timestep between snapshots.
    pub dt: f64,
    /// Two-sided spectrum (complex-valued data).
    pub two_sided: bool,
    /// Window samples, length `n_dft`.
    pub window: Vec<f64>,
    /// Window gain correction `1/mean(window)`.
    pub gain: f64,
    /// Inner-product weight, flattened column-major, length `n_space`.
    pub weight: Vec<f64>,
    /// Subtracted mean, flattened column-major, length `n_space`.
    pub mean: Vec<Complex<f64>>,
    /// Spatial shape of one snapshot.
    pub spatial_shape: Vec<usize>,
    /// Flattened spatial size.
    pub n_space: usize,
}

impl SpodParams {
    /// Resolve defaults and validate feasibility against a source.
    pub fn resolve<S>(source: &mut S, options: &SpodOptions) -> Result<Self, Error>
    where
        S: SnapshotSource + ?Sized,
    {
        let spatial_shape = source.spatial_shape().to_vec();
        let n_space: usize = spatial_shape.iter().product();

        let n_t = match (source.count(), options.n_t) {
            (Some(n), _) => n,
            (None, Some(n)) => n,
            (None, None) => {
                log::warn!("snapshot count not declared; assuming n_t = 10000");
                10000
            }
        };

        let (n_dft, window) = resolve_window(&options.window, n_t)?;
        let gain = gain_correction(&window);

        let n_ovlp = options.n_ovlp.unwrap_or(n_dft / 2);
        if n_ovlp > n_dft - 1 {
            return Err(Error::Parameter {
                arg: "n_ovlp",
                reason: format!("overlap {n_ovlp} must be smaller than the segment length {n_dft}"),
            });
        }

        let dt = options.dt.unwrap_or(1.0);
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::Parameter {
                arg: "dt",
                reason: format!("timestep must be strictly positive, got {dt}"),
            });
        }

        let weight = resolve_weight(options.weight.as_ref(), n_space, &spatial_shape)?;
        let mean = resolve_mean(source, options, n_space, &spatial_shape)?;

        let n_blks = if n_ovlp < n_t {
            (n_t - n_ovlp) / (n_dft - n_ovlp)
        } else {
            0
        };
        if n_blks < 2 {
            return Err(Error::Parameter {
                arg: "n_blks",
                reason: format!(
                    "need at least 2 segments, got {n_blks} from n_t = {n_t}, \
                     n_dft = {n_dft}, n_ovlp = {n_ovlp}"
                ),
            });
        }

        if let Some(level) = options.conf_level {
            if !(level.is_finite() && 0.0 < level && level < 1.0) {
                return Err(Error::Parameter {
                    arg: "conf_level",
                    reason: format!("confidence level must lie in (0, 1), got {level}"),
                });
            }
        }

        let two_sided = match options.is_complex.or_else(|| source.declared_complex()) {
            Some(c) => c,
            None => peek_complex(source)?,
        };
        let n_freq = if two_sided { n_dft } else { n_dft / 2 + 1 };

        Ok(Self {
            n_t,
            n_dft,
            n_ovlp,
            n_blks,
            n_freq,
            dt,
            two_sided,
            window,
            gain,
            weight,
            mean,
            spatial_shape,
            n_space,
        })
    }

    /// Frequency grid matching the resolved sidedness.
    pub fn frequencies(&self) -> Vec<f64> {
        crate::freq::frequency_axis(self.n_dft, self.dt, self.two_sided)
    }

    /// Time offset of segment `b`: blocks advance by `n_dft − n_ovlp`, and
    /// the last one sits flush against the end of the record.
    pub fn block_offset(&self, b: usize) -> usize {
        (b * (self.n_dft - self.n_ovlp) + self.n_dft).min(self.n_t) - self.n_dft
    }
}

fn resolve_window(choice: &WindowChoice, n_t: usize) -> Result<(usize, Vec<f64>), Error> {
    let (n_dft, window) = match choice {
        WindowChoice::Auto => {
            if n_t < 40 {
                return Err(Error::Parameter {
                    arg: "window",
                    reason: format!("n_t = {n_t} is too short for the default segment length"),
                });
            }
            let exponent = (n_t as f64 / 10.0).log2().floor() as u32;
            let n_dft = 1usize << exponent;
            (n_dft, hamming(n_dft))
        }
        WindowChoice::Length(n) => (*n, hamming(*n)),
        WindowChoice::Samples(w) => {
            if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::Parameter {
                    arg: "window",
                    reason: "window samples must be finite and non-negative".into(),
                });
            }
            (w.len(), w.clone())
        }
    };
    if n_dft < 4 {
        return Err(Error::Parameter {
            arg: "window",
            reason: format!("segment length must be at least 4, got {n_dft}"),
        });
    }
    if window.iter().sum::<f64>() <= 0.0 {
        return Err(Error::Parameter {
            arg: "window",
            reason: "window must have positive mean".into(),
        });
    }
    Ok((n_dft, window))
}

fn resolve_weight(
    weight: Option<&ArrayD<f64>>,
    n_space: usize,
    spatial_shape: &[usize],
) -> Result<Vec<f64>, Error> {
    match weight {
        None => Ok(vec![1.0; n_space]),
        Some(w) => {
            let flat = flatten_column_major(w.view());
            if flat.len() != n_space {
                return Err(Error::Parameter {
                    arg: "weight",
                    reason: format!(
                        "need {n_space} values for spatial shape {spatial_shape:?}, \
                         got shape {:?}",
                        w.shape()
                    ),
                });
            }
            if flat.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::Parameter {
                    arg: "weight",
                    reason: "weight values must be finite and non-negative".into(),
                });
            }
            if flat.iter().sum::<f64>() <= 0.0 {
                return Err(Error::Parameter {
                    arg: "weight",
                    reason: "weight must be positive somewhere".into(),
                });
            }
            Ok(flat)
        }
    }
}

fn resolve_mean<S>(
    source: &mut S,
    options: &SpodOptions,
    n_space: usize,
    spatial_shape: &[usize],
) -> Result<Vec<Complex<f64>>, Error>
where
    S: SnapshotSource + ?Sized,
{
    if let Some(mean) = options.mean.as_ref() {
        if mean.shape() != spatial_shape {
            return Err(Error::Parameter {
                arg: "mean",
                reason: format!(
                    "need spatial shape {spatial_shape:?}, got {:?}",
                    mean.shape()
                ),
            });
        }
        return Ok(flatten_column_major(mean.view()));
    }
    if let Some(mean) = source.temporal_mean() {
        return Ok(flatten_column_major(mean.view()));
    }
    log::warn!("no mean available for a lazy source; using zero (low-frequency accuracy degrades)");
    Ok(vec![Complex::new(0.0, 0.0); n_space])
}

fn peek_complex<S>(source: &mut S) -> Result<bool, Error>
where
    S: SnapshotSource + ?Sized,
{
    let first = source.snapshot(0)?;
    Ok(first.iter().any(|v| v.im != 0.0))
}
