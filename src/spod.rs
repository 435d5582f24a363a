//! The end-to-end decomposition: resolve, transform, solve.

use crate::error::Error;
use crate::fft::BlockFft;
use crate::modes::ModeAccessor;
use crate::params::{SpodOptions, SpodParams};
use crate::provider::SnapshotSource;
use crate::solver::{solve, Disposition};
use crate::store::BlockStore;
use ndarray::{Array2, Array3};
use std::path::PathBuf;

/// Result bundle of one decomposition.
pub struct Spod {
    /// Frequency grid, one- or two-sided per the resolved sidedness.
    pub frequencies: Vec<f64>,
    /// Mode energies, `n_freq × n_blks`, non-increasing along the mode
    /// axis. In streaming mode, rows of unretained frequencies are zero.
    pub energies: Array2<f64>,
    /// Chi-squared energy bounds, `n_freq × n_blks × 2` (lower, upper),
    /// when confidence intervals were requested.
    pub confidence: Option<Array3<f64>>,
    /// Mode shapes, resident or streamed from disk.
    pub modes: ModeAccessor,
    /// The fully resolved parameters the run used.
    pub params: SpodParams,
    /// Effective output directory of a streaming run.
    pub save_dir: Option<PathBuf>,
}

/// Run the decomposition on a snapshot source.
///
/// Two sequential passes: the time pass turns every overlapping windowed
/// segment into a Fourier block and hands it to the block store; the
/// frequency pass assembles each retained cross-spectral density and
/// solves it. Block files of a streaming run are deleted afterwards unless
/// the options say otherwise.
pub fn spod<S>(source: &mut S, options: SpodOptions) -> Result<Spod, Error>
where
    S: SnapshotSource + ?Sized,
{
    let params = SpodParams::resolve(source, &options)?;

    let (mut store, save_dir) = if options.save_blocks {
        let dir = options.save_dir.join(format!(
            "nfft{}_novlp{}_nblks{}",
            params.n_dft, params.n_ovlp, params.n_blks
        ));
        (
            BlockStore::on_disk(dir.clone(), &params, options.save_freqs.as_ref())?,
            Some(dir),
        )
    } else {
        (BlockStore::in_memory(&params), None)
    };

    let stage = BlockFft::new(&params);
    for b in 0..params.n_blks {
        let block = stage.block(source, b)?;
        store.put(b, block)?;
    }

    let disposition = Disposition {
        mode_dir: save_dir.clone(),
        n_save: options.n_save.unwrap_or(params.n_blks),
        conf_level: options
            .confidence
            .then(|| options.conf_level.unwrap_or(0.95)),
    };
    let solved = solve(&params, &store, &disposition)?;

    if options.save_blocks && options.delete_blocks {
        store.remove_block_files()?;
    }

    Ok(Spod {
        frequencies: params.frequencies(),
        energies: solved.energies,
        confidence: solved.confidence,
        modes: solved.modes,
        params,
        save_dir,
    })
}
