//! Access to computed SPOD modes, in memory or by lazy disk read.

use crate::error::Error;
use crate::provider::unflatten_column_major;
use crate::store::{read_mode_record, ModeRecord};
use ndarray::{Array2, ArrayD};
use num_complex::Complex;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Hands out the j-th spatial mode at frequency i with the original
/// snapshot shape.
///
/// The in-memory variant owns the full mode tensor; the disk variant owns
/// only the output directory and shape metadata, opening one `spod_f{NNNN}`
/// record per call.
pub enum ModeAccessor {
    /// Every mode of every frequency, resident.
    Memory {
        spatial_shape: Vec<usize>,
        /// Per frequency: `n_space × n_modes`, modes in energy order.
        modes: Vec<Array2<Complex<f64>>>,
    },
    /// Modes streamed from `spod_f{NNNN}` records.
    Disk {
        dir: PathBuf,
        spatial_shape: Vec<usize>,
        n_save: usize,
        saved: BTreeSet<usize>,
    },
}

impl ModeAccessor {
    pub(crate) fn new_memory(spatial_shape: Vec<usize>) -> Self {
        ModeAccessor::Memory {
            spatial_shape,
            modes: Vec::new(),
        }
    }

    pub(crate) fn new_disk(
        dir: PathBuf,
        spatial_shape: Vec<usize>,
        n_save: usize,
        saved: BTreeSet<usize>,
    ) -> Self {
        ModeAccessor::Disk {
            dir,
            spatial_shape,
            n_save,
            saved,
        }
    }

    pub(crate) fn push(&mut self, freq_modes: Array2<Complex<f64>>) {
        if let ModeAccessor::Memory { modes, .. } = self {
            modes.push(freq_modes);
        }
    }

    /// Number of modes retrievable per frequency.
    pub fn modes_per_frequency(&self) -> usize {
        match self {
            ModeAccessor::Memory { modes, .. } => modes.first().map_or(0, |m| m.ncols()),
            ModeAccessor::Disk { n_save, .. } => *n_save,
        }
    }

    /// The j-th mode at frequency i, shaped like one snapshot.
    pub fn mode(&self, i: usize, j: usize) -> Result<ArrayD<Complex<f64>>, Error> {
        match self {
            ModeAccessor::Memory {
                spatial_shape,
                modes,
            } => {
                let slice = modes.get(i).ok_or(Error::Lookup {
                    what: "frequency",
                    index: i,
                    len: modes.len(),
                })?;
                if j >= slice.ncols() {
                    return Err(Error::Lookup {
                        what: "mode",
                        index: j,
                        len: slice.ncols(),
                    });
                }
                unflatten_column_major(spatial_shape, slice.column(j).to_vec())
            }
            ModeAccessor::Disk {
                dir,
                spatial_shape,
                n_save,
                saved,
            } => {
                if !saved.contains(&i) {
                    return Err(Error::Lookup {
                        what: "saved frequency",
                        index: i,
                        len: saved.len(),
                    });
                }
                if j >= *n_save {
                    return Err(Error::Lookup {
                        what: "mode",
                        index: j,
                        len: *n_save,
                    });
                }
                let record: ModeRecord = read_mode_record(dir, i)?;
                let n_space: usize = record.spatial_shape.iter().product();
                let start = j * n_space;
                let values = record.data[start..start + n_space].to_vec();
                unflatten_column_major(spatial_shape, values)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::write_mode_record;
    use ndarray::IxDyn;

    fn column(values: &[f64]) -> Vec<Complex<f64>> {
        values.iter().map(|&v| Complex::new(v, -v)).collect()
    }

    #[test]
    fn memory_accessor_returns_shaped_modes() {
        let mut acc = ModeAccessor::new_memory(vec![2, 2]);
        let m = Array2::from_shape_fn((4, 3), |(x, j)| Complex::new((10 * j + x) as f64, 0.0));
        acc.push(m);
        assert_eq!(acc.modes_per_frequency(), 3);

        let mode = acc.mode(0, 1).unwrap();
        assert_eq!(mode.shape(), &[2, 2]);
        // Column-major unflattening: first index fastest.
        assert_eq!(mode[IxDyn(&[0, 0])].re, 10.0);
        assert_eq!(mode[IxDyn(&[1, 0])].re, 11.0);
        assert_eq!(mode[IxDyn(&[0, 1])].re, 12.0);

        assert!(matches!(acc.mode(1, 0), Err(Error::Lookup { .. })));
        assert!(matches!(acc.mode(0, 3), Err(Error::Lookup { .. })));
    }

    #[test]
    fn disk_accessor_reads_saved_records_only() {
        let dir = tempfile::tempdir().unwrap();
        let record = ModeRecord {
            spatial_shape: vec![3],
            n_save: 2,
            data: [column(&[1.0, 2.0, 3.0]), column(&[4.0, 5.0, 6.0])].concat(),
        };
        write_mode_record(dir.path(), 5, &record).unwrap();

        let acc = ModeAccessor::new_disk(
            dir.path().to_path_buf(),
            vec![3],
            2,
            [5usize].into_iter().collect(),
        );
        let mode = acc.mode(5, 1).unwrap();
        assert_eq!(mode[IxDyn(&[0])], Complex::new(4.0, -4.0));
        assert_eq!(mode[IxDyn(&[2])], Complex::new(6.0, -6.0));

        assert!(matches!(acc.mode(4, 0), Err(Error::Lookup { .. })));
        assert!(matches!(acc.mode(5, 2), Err(Error::Lookup { .. })));
    }
}
