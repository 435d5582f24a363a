//! Per-segment Fourier transform stage.
//!
//! Each segment is read one snapshot at a time, demeaned, windowed,
//! transformed along the time axis with a planned FFT, normalized by
//! `gain/n_dft`, truncated to the retained bins, and (for real data)
//! doubled on the strict-interior bins. Peak memory is one segment.

use crate::error::Error;
use crate::params::SpodParams;
use crate::provider::{flatten_column_major, SnapshotSource};
use ndarray::Array2;
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Windowed-segment DFT producer.
pub struct BlockFft {
    params: SpodParams,
    fft: Arc<dyn Fft<f64>>,
}

impl BlockFft {
    /// Plan the forward transform for the resolved parameters.
    pub fn new(params: &SpodParams) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(params.n_dft);
        Self {
            params: params.clone(),
            fft,
        }
    }

    /// Fourier block `b`: an `n_freq × n_space` matrix of normalized
    /// segment coefficients.
    pub fn block<S>(&self, source: &mut S, b: usize) -> Result<Array2<Complex<f64>>, Error>
    where
        S: SnapshotSource + ?Sized,
    {
        let p = &self.params;
        let offset = p.block_offset(b);

        // Segment assembly: row k is the demeaned, windowed snapshot.
        let mut segment = Array2::<Complex<f64>>::zeros((p.n_dft, p.n_space));
        for k in 0..p.n_dft {
            let snap = source.snapshot(offset + k)?;
            if snap.shape() != p.spatial_shape.as_slice() {
                return Err(Error::Shape {
                    arg: "snapshot",
                    expected: p.spatial_shape.clone(),
                    got: snap.shape().to_vec(),
                });
            }
            let flat = flatten_column_major(snap.view());
            let w = p.window[k];
            for (x, value) in flat.into_iter().enumerate() {
                segment[[k, x]] = (value - p.mean[x]) * w;
            }
        }

        // Transform along time, one spatial column at a time.
        let scale = p.gain / p.n_dft as f64;
        let mut out = Array2::<Complex<f64>>::zeros((p.n_freq, p.n_space));
        let mut buf = vec![Complex::new(0.0, 0.0); p.n_dft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        for x in 0..p.n_space {
            for k in 0..p.n_dft {
                buf[k] = segment[[k, x]];
            }
            self.fft.process_with_scratch(&mut buf, &mut scratch);
            for i in 0..p.n_freq {
                out[[i, x]] = buf[i] * scale;
            }
        }

        // One-sided doubling on the strict interior: DC and the last
        // retained bin keep their single-sided amplitude.
        if !p.two_sided {
            for i in 1..p.n_freq - 1 {
                for x in 0..p.n_space {
                    out[[i, x]] *= 2.0;
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{SpodOptions, WindowChoice};
    use crate::provider::EagerSnapshots;
    use approx::assert_relative_eq;
    use ndarray::Array2 as A2;
    use std::f64::consts::PI;

    fn resolve(
        source: &mut EagerSnapshots,
        window: WindowChoice,
        is_complex: Option<bool>,
    ) -> SpodParams {
        let opts = SpodOptions {
            window,
            n_ovlp: Some(0),
            is_complex,
            ..SpodOptions::default()
        };
        SpodParams::resolve(source, &opts).unwrap()
    }

    #[test]
    fn bin_aligned_tone_lands_with_its_amplitude() {
        // Boxcar window, one full segment, tone on bin 8: the one-sided
        // doubled coefficient recovers the cosine amplitude.
        let n = 64;
        let a = 3.0;
        let x = A2::from_shape_fn((128, 2), |(t, _)| a * (2.0 * PI * 8.0 * t as f64 / n as f64).cos());
        let mut src = EagerSnapshots::from_real(x.into_dyn()).unwrap();
        let params = resolve(&mut src, WindowChoice::Samples(vec![1.0; n]), None);
        let stage = BlockFft::new(&params);
        let block = stage.block(&mut src, 0).unwrap();

        assert_relative_eq!(block[[8, 0]].norm(), a, epsilon = 1e-10);
        assert!(block[[7, 0]].norm() < 1e-10);
        assert!(block[[9, 0]].norm() < 1e-10);
    }

    #[test]
    fn two_sided_blocks_preserve_windowed_energy() {
        let n = 32;
        let x = A2::from_shape_fn((64, 3), |(t, i)| {
            ((t * 13 + i * 5) % 17) as f64 / 17.0 - 0.5
        });
        let mut src = EagerSnapshots::from_real(x.clone().into_dyn()).unwrap();
        let params = resolve(&mut src, WindowChoice::Length(n), Some(true));
        let stage = BlockFft::new(&params);
        let block = stage.block(&mut src, 1).unwrap();

        let offset = params.block_offset(1);
        let mean = src.temporal_mean().unwrap();
        for i in 0..3 {
            let spectral: f64 = (0..params.n_freq).map(|k| block[[k, i]].norm_sqr()).sum();
            let temporal: f64 = (0..n)
                .map(|k| {
                    let v = (x[[offset + k, i]] - mean[[i]].re) * params.window[k];
                    v * v
                })
                .sum();
            let expected = params.gain * params.gain / n as f64 * temporal;
            assert_relative_eq!(spectral, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn dc_and_nyquist_are_not_doubled() {
        // Flat unit field with zero mean supplied: everything sits at DC.
        let n = 16;
        let x = A2::from_shape_fn((32, 1), |_| 1.0);
        let mut src = EagerSnapshots::from_real(x.into_dyn()).unwrap();
        let opts = SpodOptions {
            window: WindowChoice::Samples(vec![1.0; n]),
            n_ovlp: Some(0),
            mean: Some(ndarray::ArrayD::zeros(ndarray::IxDyn(&[1]))),
            ..SpodOptions::default()
        };
        let params = SpodParams::resolve(&mut src, &opts).unwrap();
        let stage = BlockFft::new(&params);
        let block = stage.block(&mut src, 0).unwrap();
        assert_relative_eq!(block[[0, 0]].re, 1.0, epsilon = 1e-12);
        for k in 1..params.n_freq {
            assert!(block[[k, 0]].norm() < 1e-12);
        }
    }
}
