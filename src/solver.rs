//! Per-frequency eigensolve: reduced cross-spectral density assembly,
//! Hermitian eigendecomposition, and method-of-snapshots mode
//! reconstruction.

use crate::error::Error;
use crate::modes::ModeAccessor;
use crate::params::SpodParams;
use crate::special::chi_squared_quantile;
use crate::store::{write_mode_record, BlockStore, ModeRecord};
use nalgebra::DMatrix;
use ndarray::{Array2, Array3};
use num_complex::Complex;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Where the solver puts mode shapes, and whether it bounds the energies.
pub(crate) struct Disposition {
    /// `Some(dir)`: write `spod_f{NNNN}` records there. `None`: keep the
    /// full mode tensor in memory.
    pub mode_dir: Option<PathBuf>,
    /// Leading modes persisted per frequency (streaming mode only).
    pub n_save: usize,
    /// Confidence level for chi-squared bounds, when requested.
    pub conf_level: Option<f64>,
}

pub(crate) struct Solved {
    /// Mode energies, `n_freq × n_blks`; rows of unsolved frequencies
    /// stay zero.
    pub energies: Array2<f64>,
    /// Lower/upper energy bounds, `n_freq × n_blks × 2`.
    pub confidence: Option<Array3<f64>>,
    pub modes: ModeAccessor,
}

/// Solve every frequency the store can answer, ascending.
pub(crate) fn solve(
    params: &SpodParams,
    store: &BlockStore,
    disposition: &Disposition,
) -> Result<Solved, Error> {
    let n_blks = params.n_blks;
    let freqs = store.list_frequencies();
    let n_save = disposition.n_save.min(n_blks);

    let mut energies = Array2::<f64>::zeros((params.n_freq, n_blks));
    let mut confidence = disposition
        .conf_level
        .map(|_| Array3::<f64>::zeros((params.n_freq, n_blks, 2)));
    // Chi-squared interval factors are frequency-independent: the segment
    // count fixes the degrees of freedom.
    let conf_factors = disposition.conf_level.map(|level| {
        let dof = 2.0 * n_blks as f64;
        (
            dof / chi_squared_quantile(level, dof),
            dof / chi_squared_quantile(1.0 - level, dof),
        )
    });

    let mut modes = match &disposition.mode_dir {
        None => ModeAccessor::new_memory(params.spatial_shape.clone()),
        Some(dir) => ModeAccessor::new_disk(
            dir.clone(),
            params.spatial_shape.clone(),
            n_save,
            freqs.iter().copied().collect::<BTreeSet<_>>(),
        ),
    };

    let mut warned_drift = false;
    let mut warned_clamp = false;

    for &i in &freqs {
        let a = store.read_frequency(i)?;
        let m = reduced_csd(&a, &params.weight, n_blks, i, &mut warned_drift);

        let eigen = m.symmetric_eigen();
        let order = descending_order(eigen.eigenvalues.as_slice());

        for (j, &src) in order.iter().enumerate() {
            energies[[i, j]] = eigen.eigenvalues[src].abs();
        }
        if let (Some(lc), Some((lower, upper))) = (confidence.as_mut(), conf_factors) {
            for j in 0..n_blks {
                lc[[i, j, 0]] = energies[[i, j]] * lower;
                lc[[i, j, 1]] = energies[[i, j]] * upper;
            }
        }

        let n_modes = if disposition.mode_dir.is_some() {
            n_save
        } else {
            n_blks
        };
        let psi = reconstruct_modes(&a, &eigen, &order, n_blks, n_modes, &mut warned_clamp);

        match &disposition.mode_dir {
            None => modes.push(psi),
            Some(dir) => {
                let record = ModeRecord {
                    spatial_shape: params.spatial_shape.clone(),
                    n_save: n_modes,
                    data: psi.t().iter().copied().collect(),
                };
                write_mode_record(dir, i, &record)?;
            }
        }
    }

    Ok(Solved {
        energies,
        confidence,
        modes,
    })
}

/// `M = AᴴWA / n_blks`, Hermitian by construction up to roundoff; the
/// drift is measured before symmetrization.
fn reduced_csd(
    a: &Array2<Complex<f64>>,
    weight: &[f64],
    n_blks: usize,
    freq: usize,
    warned_drift: &mut bool,
) -> DMatrix<Complex<f64>> {
    let n_space = a.nrows();
    let m = DMatrix::from_fn(n_blks, n_blks, |r, c| {
        let mut acc = Complex::new(0.0, 0.0);
        for x in 0..n_space {
            acc += a[[x, r]].conj() * weight[x] * a[[x, c]];
        }
        acc / n_blks as f64
    });

    let adjoint = m.adjoint();
    let scale = m.iter().fold(0.0f64, |s, v| s.max(v.norm()));
    let drift = (&m - &adjoint)
        .iter()
        .fold(0.0f64, |s, v| s.max(v.norm()));
    if !*warned_drift && scale > 0.0 && drift > 1e-10 * scale {
        log::warn!(
            "cross-spectral density at frequency {freq} drifted from Hermitian \
             by {drift:.3e}; symmetrizing"
        );
        *warned_drift = true;
    }

    (m + adjoint) * Complex::new(0.5, 0.0)
}

/// Stable descending index order; equal eigenvalues keep the solver's
/// natural order.
fn descending_order(eigenvalues: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(core::cmp::Ordering::Equal)
    });
    order
}

/// `Ψ = A·Θ·diag(1/√(n_blks·Λ⁺))` for the leading `n_modes` eigenpairs.
///
/// Λ⁺ floors each eigenvalue at `ε·max(Λ)` so degenerate directions scale
/// finitely; the reported energies are the raw |Λ|.
fn reconstruct_modes(
    a: &Array2<Complex<f64>>,
    eigen: &nalgebra::SymmetricEigen<Complex<f64>, nalgebra::Dyn>,
    order: &[usize],
    n_blks: usize,
    n_modes: usize,
    warned_clamp: &mut bool,
) -> Array2<Complex<f64>> {
    let lambda_max = order
        .first()
        .map(|&j| eigen.eigenvalues[j])
        .unwrap_or(0.0);
    let floor = if lambda_max > 0.0 {
        f64::EPSILON * lambda_max
    } else {
        f64::MIN_POSITIVE
    };

    let mut clamped = false;
    let mut theta_scaled = Array2::<Complex<f64>>::zeros((n_blks, n_modes));
    for (j, &src) in order.iter().take(n_modes).enumerate() {
        let lambda = eigen.eigenvalues[src];
        if lambda <= 0.0 {
            clamped = true;
        }
        let inv = 1.0 / (n_blks as f64 * lambda.max(floor)).sqrt();
        for c in 0..n_blks {
            theta_scaled[[c, j]] = eigen.eigenvectors[(c, src)] * inv;
        }
    }
    if clamped && !*warned_clamp {
        log::warn!("non-positive eigenvalues clamped during mode scaling");
        *warned_clamp = true;
    }

    a.dot(&theta_scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{SpodOptions, SpodParams, WindowChoice};
    use crate::provider::EagerSnapshots;
    use approx::assert_relative_eq;
    use ndarray::Array2 as A2;

    fn tiny_params(weight: Vec<f64>) -> SpodParams {
        let x = A2::from_shape_fn((48, 5), |(t, i)| ((t * 3 + i * 7) % 5) as f64);
        let mut src = EagerSnapshots::from_real(x.into_dyn()).unwrap();
        let opts = SpodOptions {
            window: WindowChoice::Length(8),
            n_ovlp: Some(0),
            weight: Some(ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&[5]), weight).unwrap()),
            ..SpodOptions::default()
        };
        SpodParams::resolve(&mut src, &opts).unwrap()
    }

    fn filled_store(params: &SpodParams) -> BlockStore {
        let mut store = BlockStore::in_memory(params);
        for b in 0..params.n_blks {
            let block = A2::from_shape_fn((params.n_freq, params.n_space), |(i, x)| {
                let phase = (b * 17 + i * 5 + x * 3 + b * x * 7) as f64 * 0.37;
                Complex::new(phase.cos(), phase.sin()) * (1.0 + x as f64)
            });
            store.put(b, block).unwrap();
        }
        store
    }

    #[test]
    fn energies_are_sorted_and_match_the_csd_trace() {
        let weight = vec![0.5, 1.0, 2.0, 1.5, 0.25];
        let params = tiny_params(weight.clone());
        let store = filled_store(&params);
        let disposition = Disposition {
            mode_dir: None,
            n_save: params.n_blks,
            conf_level: None,
        };
        let solved = solve(&params, &store, &disposition).unwrap();

        for i in 0..params.n_freq {
            let floor = 1e-12 * solved.energies[[i, 0]];
            for j in 1..params.n_blks {
                assert!(solved.energies[[i, j]] <= solved.energies[[i, j - 1]] + floor);
            }
            let a = store.read_frequency(i).unwrap();
            let trace: f64 = (0..params.n_space)
                .map(|x| {
                    (0..params.n_blks)
                        .map(|b| weight[x] * a[[x, b]].norm_sqr())
                        .sum::<f64>()
                })
                .sum::<f64>()
                / params.n_blks as f64;
            let total: f64 = (0..params.n_blks).map(|j| solved.energies[[i, j]]).sum();
            assert_relative_eq!(total, trace, epsilon = 1e-10, max_relative = 1e-10);
        }
    }

    #[test]
    fn modes_are_orthonormal_under_the_weight() {
        let weight = vec![0.5, 1.0, 2.0, 1.5, 0.25];
        let params = tiny_params(weight.clone());
        let store = filled_store(&params);
        let disposition = Disposition {
            mode_dir: None,
            n_save: params.n_blks,
            conf_level: None,
        };
        let solved = solve(&params, &store, &disposition).unwrap();

        let i = 2;
        let lambda_max = solved.energies[[i, 0]];
        for j in 0..params.n_blks {
            for k in 0..params.n_blks {
                if solved.energies[[i, j]] < 1e-4 * lambda_max
                    || solved.energies[[i, k]] < 1e-4 * lambda_max
                {
                    continue;
                }
                let mj = solved.modes.mode(i, j).unwrap();
                let mk = solved.modes.mode(i, k).unwrap();
                let inner: Complex<f64> = mj
                    .iter()
                    .zip(mk.iter())
                    .zip(weight.iter())
                    .map(|((a, b), w)| a.conj() * b * *w)
                    .sum();
                let expected = if j == k { 1.0 } else { 0.0 };
                assert_relative_eq!(inner.norm(), expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn confidence_bounds_bracket_the_energies() {
        let params = tiny_params(vec![1.0; 5]);
        let store = filled_store(&params);
        let disposition = Disposition {
            mode_dir: None,
            n_save: params.n_blks,
            conf_level: Some(0.95),
        };
        let solved = solve(&params, &store, &disposition).unwrap();
        let lc = solved.confidence.unwrap();
        for i in 0..params.n_freq {
            for j in 0..params.n_blks {
                let l = solved.energies[[i, j]];
                assert!(lc[[i, j, 0]] <= l);
                assert!(lc[[i, j, 1]] >= l);
            }
        }
    }
}
