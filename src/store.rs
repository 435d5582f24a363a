//! Fourier block storage: a dense in-memory tensor or one record per
//! block on disk, behind a single read interface.
//!
//! Disk records are sparse along the frequency axis: exactly the retained
//! rows are present. Both variants answer `read_frequency` with the same
//! values, so the solver never knows which one it is running against.

use crate::error::Error;
use crate::params::SpodParams;
use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// One persisted Fourier block: the retained rows of an
/// `n_freq × n_space` coefficient matrix.
#[derive(Serialize, Deserialize)]
struct BlockRecord {
    n_freq: usize,
    n_space: usize,
    /// `(frequency index, row values)`, sorted by frequency index.
    rows: Vec<(usize, Vec<Complex<f64>>)>,
}

/// Write-once, read-many storage for the segment Fourier blocks.
pub enum BlockStore {
    /// Dense tensor: every block, every frequency.
    Memory {
        n_freq: usize,
        n_space: usize,
        blocks: Vec<Array2<Complex<f64>>>,
    },
    /// One `fft_block{NNNN}` record per block under `dir`.
    Disk {
        dir: PathBuf,
        n_freq: usize,
        n_space: usize,
        n_blks: usize,
        saved: BTreeSet<usize>,
    },
}

impl BlockStore {
    /// Dense in-memory store.
    pub fn in_memory(params: &SpodParams) -> Self {
        BlockStore::Memory {
            n_freq: params.n_freq,
            n_space: params.n_space,
            blocks: Vec::with_capacity(params.n_blks),
        }
    }

    /// Streaming store rooted at `dir`, retaining `save_freqs` (all
    /// frequencies when `None`). Creates the directory.
    pub fn on_disk(
        dir: PathBuf,
        params: &SpodParams,
        save_freqs: Option<&BTreeSet<usize>>,
    ) -> Result<Self, Error> {
        let saved: BTreeSet<usize> = match save_freqs {
            None => (0..params.n_freq).collect(),
            Some(set) => {
                if let Some(&bad) = set.iter().find(|&&i| i >= params.n_freq) {
                    return Err(Error::Parameter {
                        arg: "save_freqs",
                        reason: format!(
                            "frequency index {bad} out of range (n_freq = {})",
                            params.n_freq
                        ),
                    });
                }
                set.clone()
            }
        };
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(BlockStore::Disk {
            dir,
            n_freq: params.n_freq,
            n_space: params.n_space,
            n_blks: params.n_blks,
            saved,
        })
    }

    /// Path of the record for block `b` (1-based, zero-padded name).
    pub fn block_path(dir: &Path, b: usize) -> PathBuf {
        dir.join(format!("fft_block{:04}", b + 1))
    }

    /// Store block `b`. Blocks arrive in order during the FFT pass;
    /// rerunning with identical parameters overwrites records in place.
    pub fn put(&mut self, b: usize, block: Array2<Complex<f64>>) -> Result<(), Error> {
        match self {
            BlockStore::Memory { blocks, .. } => {
                if b == blocks.len() {
                    blocks.push(block);
                } else if b < blocks.len() {
                    blocks[b] = block;
                } else {
                    return Err(Error::Lookup {
                        what: "block slot",
                        index: b,
                        len: blocks.len(),
                    });
                }
                Ok(())
            }
            BlockStore::Disk {
                dir,
                n_freq,
                n_space,
                saved,
                ..
            } => {
                let record = BlockRecord {
                    n_freq: *n_freq,
                    n_space: *n_space,
                    rows: saved
                        .iter()
                        .map(|&i| (i, block.row(i).to_vec()))
                        .collect(),
                };
                let path = Self::block_path(dir, b);
                let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
                let writer = BufWriter::new(file);
                bincode::serialize_into(writer, &record).map_err(|e| Error::io(&path, e))
            }
        }
    }

    /// The cross-spectral snapshot matrix at frequency `i`:
    /// `n_space × n_blks`, one segment per column.
    pub fn read_frequency(&self, i: usize) -> Result<Array2<Complex<f64>>, Error> {
        match self {
            BlockStore::Memory {
                n_freq,
                n_space,
                blocks,
            } => {
                if i >= *n_freq {
                    return Err(Error::Lookup {
                        what: "frequency",
                        index: i,
                        len: *n_freq,
                    });
                }
                let mut out = Array2::zeros((*n_space, blocks.len()));
                for (b, block) in blocks.iter().enumerate() {
                    for x in 0..*n_space {
                        out[[x, b]] = block[[i, x]];
                    }
                }
                Ok(out)
            }
            BlockStore::Disk {
                dir,
                n_space,
                n_blks,
                saved,
                ..
            } => {
                if !saved.contains(&i) {
                    return Err(Error::Lookup {
                        what: "retained frequency",
                        index: i,
                        len: saved.len(),
                    });
                }
                let mut out = Array2::zeros((*n_space, *n_blks));
                for b in 0..*n_blks {
                    let path = Self::block_path(dir, b);
                    let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
                    let record: BlockRecord = bincode::deserialize_from(BufReader::new(file))
                        .map_err(|e| Error::io(&path, e))?;
                    let row = record
                        .rows
                        .binary_search_by_key(&i, |(idx, _)| *idx)
                        .map(|pos| &record.rows[pos].1)
                        .map_err(|_| Error::io(&path, format!("frequency {i} not recorded")))?;
                    if row.len() != *n_space {
                        return Err(Error::io(&path, "row length mismatch"));
                    }
                    for (x, v) in row.iter().enumerate() {
                        out[[x, b]] = *v;
                    }
                }
                Ok(out)
            }
        }
    }

    /// The frequency indices this store can answer, ascending.
    pub fn list_frequencies(&self) -> Vec<usize> {
        match self {
            BlockStore::Memory { n_freq, .. } => (0..*n_freq).collect(),
            BlockStore::Disk { saved, .. } => saved.iter().copied().collect(),
        }
    }

    /// Remove every block record. Only meaningful for the disk variant.
    pub fn remove_block_files(&self) -> Result<(), Error> {
        if let BlockStore::Disk { dir, n_blks, .. } = self {
            for b in 0..*n_blks {
                let path = Self::block_path(dir, b);
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::io(&path, e)),
                }
            }
        }
        Ok(())
    }
}

/// One persisted set of leading modes at a single frequency, flattened
/// column-major with the mode index as the slowest axis.
#[derive(Serialize, Deserialize)]
pub(crate) struct ModeRecord {
    pub spatial_shape: Vec<usize>,
    pub n_save: usize,
    pub data: Vec<Complex<f64>>,
}

/// Path of the mode record for frequency `i` (1-based name).
pub(crate) fn mode_path(dir: &Path, i: usize) -> PathBuf {
    dir.join(format!("spod_f{:04}", i + 1))
}

pub(crate) fn write_mode_record(dir: &Path, i: usize, record: &ModeRecord) -> Result<(), Error> {
    let path = mode_path(dir, i);
    let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
    bincode::serialize_into(BufWriter::new(file), record).map_err(|e| Error::io(&path, e))
}

pub(crate) fn read_mode_record(dir: &Path, i: usize) -> Result<ModeRecord, Error> {
    let path = mode_path(dir, i);
    let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|e| Error::io(&path, e))
}
