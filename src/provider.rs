//! Snapshot sources: eager time-major arrays and lazy one-at-a-time
//! callbacks.

use crate::error::Error;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, ShapeBuilder};
use num_complex::Complex;

/// A time-ordered sequence of equally shaped spatial snapshots.
///
/// The pipeline only ever touches one snapshot at a time, so a source may
/// hold the whole record in memory or materialize snapshots on demand.
pub trait SnapshotSource {
    /// Spatial shape of every snapshot.
    fn spatial_shape(&self) -> &[usize];

    /// Total snapshot count, when the source knows it.
    fn count(&self) -> Option<usize>;

    /// Whether the data is complex-valued, when the source declares it.
    /// Undeclared sidedness is resolved by peeking at snapshot 0.
    fn declared_complex(&self) -> Option<bool>;

    /// Snapshot `i` as a complex array of the spatial shape.
    fn snapshot(&mut self, i: usize) -> Result<ArrayD<Complex<f64>>, Error>;

    /// Per-point temporal mean, for sources that can compute it cheaply.
    fn temporal_mean(&self) -> Option<ArrayD<Complex<f64>>> {
        None
    }
}

enum EagerData {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex<f64>>),
}

/// Source backed by a single time-major array: axis 0 is time, the
/// remaining axes are the spatial shape.
pub struct EagerSnapshots {
    data: EagerData,
    spatial_shape: Vec<usize>,
    n_t: usize,
}

impl EagerSnapshots {
    /// Wrap a real-valued record. Axis 0 must be the time axis.
    pub fn from_real(data: ArrayD<f64>) -> Result<Self, Error> {
        let (spatial_shape, n_t) = split_time_axis(data.shape())?;
        Ok(Self {
            data: EagerData::Real(data),
            spatial_shape,
            n_t,
        })
    }

    /// Wrap a complex-valued record. Axis 0 must be the time axis.
    pub fn from_complex(data: ArrayD<Complex<f64>>) -> Result<Self, Error> {
        let (spatial_shape, n_t) = split_time_axis(data.shape())?;
        Ok(Self {
            data: EagerData::Complex(data),
            spatial_shape,
            n_t,
        })
    }
}

fn split_time_axis(shape: &[usize]) -> Result<(Vec<usize>, usize), Error> {
    match shape.split_first() {
        Some((&n_t, spatial)) if n_t > 0 => Ok((spatial.to_vec(), n_t)),
        _ => Err(Error::Parameter {
            arg: "data",
            reason: "need a non-empty time axis as axis 0".into(),
        }),
    }
}

impl SnapshotSource for EagerSnapshots {
    fn spatial_shape(&self) -> &[usize] {
        &self.spatial_shape
    }

    fn count(&self) -> Option<usize> {
        Some(self.n_t)
    }

    fn declared_complex(&self) -> Option<bool> {
        Some(matches!(self.data, EagerData::Complex(_)))
    }

    fn snapshot(&mut self, i: usize) -> Result<ArrayD<Complex<f64>>, Error> {
        if i >= self.n_t {
            return Err(Error::Lookup {
                what: "snapshot",
                index: i,
                len: self.n_t,
            });
        }
        Ok(match &self.data {
            EagerData::Real(x) => x.index_axis(Axis(0), i).mapv(|v| Complex::new(v, 0.0)),
            EagerData::Complex(x) => x.index_axis(Axis(0), i).to_owned(),
        })
    }

    fn temporal_mean(&self) -> Option<ArrayD<Complex<f64>>> {
        let n = self.n_t as f64;
        Some(match &self.data {
            EagerData::Real(x) => x
                .sum_axis(Axis(0))
                .mapv(|v| Complex::new(v / n, 0.0)),
            EagerData::Complex(x) => x.sum_axis(Axis(0)).mapv(|v| v / n),
        })
    }
}

/// Source backed by a callback that materializes one snapshot at a time.
///
/// The callback owns whatever handle it needs (file reader, generator,
/// decimator); the pipeline calls it once per `(block, row)` visit.
pub struct LazySnapshots<F> {
    f: F,
    spatial_shape: Vec<usize>,
    declared_complex: Option<bool>,
}

impl<F> LazySnapshots<F>
where
    F: FnMut(usize) -> ArrayD<Complex<f64>>,
{
    /// Wrap a snapshot callback with its declared spatial shape.
    pub fn new(spatial_shape: Vec<usize>, f: F) -> Self {
        Self {
            f,
            spatial_shape,
            declared_complex: None,
        }
    }

    /// Declare the sidedness up front instead of having it peeked.
    pub fn with_declared_complex(mut self, is_complex: bool) -> Self {
        self.declared_complex = Some(is_complex);
        self
    }
}

impl<F> SnapshotSource for LazySnapshots<F>
where
    F: FnMut(usize) -> ArrayD<Complex<f64>>,
{
    fn spatial_shape(&self) -> &[usize] {
        &self.spatial_shape
    }

    fn count(&self) -> Option<usize> {
        None
    }

    fn declared_complex(&self) -> Option<bool> {
        self.declared_complex
    }

    fn snapshot(&mut self, i: usize) -> Result<ArrayD<Complex<f64>>, Error> {
        let snap = (self.f)(i);
        if snap.shape() != self.spatial_shape.as_slice() {
            return Err(Error::Shape {
                arg: "snapshot",
                expected: self.spatial_shape.clone(),
                got: snap.shape().to_vec(),
            });
        }
        Ok(snap)
    }
}

/// Flatten a spatial array in column-major (first-index-fastest) order.
pub(crate) fn flatten_column_major<T: Clone>(a: ArrayViewD<'_, T>) -> Vec<T> {
    a.reversed_axes().iter().cloned().collect()
}

/// Rebuild a spatial array from its column-major flattening.
pub(crate) fn unflatten_column_major<T>(
    shape: &[usize],
    values: Vec<T>,
) -> Result<ArrayD<T>, Error> {
    let expected: usize = shape.iter().product();
    if values.len() != expected {
        return Err(Error::Shape {
            arg: "mode",
            expected: shape.to_vec(),
            got: vec![values.len()],
        });
    }
    ArrayD::from_shape_vec(IxDyn(shape).f(), values).map_err(|_| Error::Shape {
        arg: "mode",
        expected: shape.to_vec(),
        got: vec![expected],
    })
}
