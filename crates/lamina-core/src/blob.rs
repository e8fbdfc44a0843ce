// Blob — The 4-D container layers read from and write into
//
// A Blob holds two equal-length planes:
//
//   data  — values, read by forward and produced as forward output
//   diff  — gradients, produced by backward and consumed as upstream signal
//
// MEMORY MODEL:
//
//   Each plane lives behind Arc<RwLock<Vec<T>>>. Two blobs may point at the
//   same plane: `share_data` / `share_diff` swap in another blob's Arc, so a
//   write through one handle is seen through the other. This is how a
//   reshape layer hands its input to the next layer without copying.
//
//   Blobs are owned by the driver (a Net, or a test). Layers only see
//   references and never keep a blob beyond a single call.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dtype::WithDType;
use crate::error::{Error, Result};
use crate::shape::BlobShape;

type Plane<T> = Arc<RwLock<Vec<T>>>;

fn new_plane<T: WithDType>(count: usize) -> Plane<T> {
    Arc::new(RwLock::new(vec![T::zero(); count]))
}

/// A 4-D `(num, channels, height, width)` array with data and diff planes.
pub struct Blob<T: WithDType = f32> {
    shape: BlobShape,
    data: Plane<T>,
    diff: Plane<T>,
}

impl<T: WithDType> Default for Blob<T> {
    fn default() -> Self {
        Blob::new(BlobShape::default())
    }
}

impl<T: WithDType> std::fmt::Debug for Blob<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blob(shape={}, dtype={})", self.shape, T::DTYPE)
    }
}

impl<T: WithDType> Blob<T> {
    /// Create a zero-filled blob.
    pub fn new(shape: impl Into<BlobShape>) -> Self {
        let shape = shape.into();
        let count = shape.count();
        Blob {
            shape,
            data: new_plane(count),
            diff: new_plane(count),
        }
    }

    /// Create a blob whose data plane is `data`; the diff plane is zeroed.
    pub fn from_vec(shape: impl Into<BlobShape>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.count(),
                got: data.len(),
            });
        }
        Ok(Blob {
            shape,
            diff: new_plane(data.len()),
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Create a blob from f64 values, converting to `T`.
    pub fn from_f64_slice(shape: impl Into<BlobShape>, values: &[f64]) -> Result<Self> {
        Self::from_vec(shape, values.iter().map(|&v| T::from_f64(v)).collect())
    }

    // Shape queries

    pub fn shape(&self) -> BlobShape {
        self.shape
    }

    pub fn num(&self) -> usize {
        self.shape.num
    }

    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    /// Total number of elements in each plane.
    pub fn count(&self) -> usize {
        self.shape.count()
    }

    /// Row-major offset of element `(n, c, h, w)`.
    pub fn offset(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        self.shape.offset(n, c, h, w)
    }

    /// Assign a new shape.
    ///
    /// Planes are kept (along with any sharing) when the element count is
    /// unchanged; otherwise both planes are replaced by fresh zeroed buffers
    /// and the blob stops sharing with anything.
    pub fn reshape(&mut self, shape: impl Into<BlobShape>) {
        let shape = shape.into();
        if shape.count() != self.shape.count() {
            self.data = new_plane(shape.count());
            self.diff = new_plane(shape.count());
        }
        self.shape = shape;
    }

    /// Reshape to the shape of `other`.
    pub fn reshape_like(&mut self, other: &Blob<T>) {
        self.reshape(other.shape());
    }

    // Plane access

    /// Read lock on the data plane.
    pub fn data(&self) -> Result<RwLockReadGuard<'_, Vec<T>>> {
        self.data
            .read()
            .map_err(|_| Error::msg("data plane lock poisoned"))
    }

    /// Write lock on the data plane.
    pub fn data_mut(&self) -> Result<RwLockWriteGuard<'_, Vec<T>>> {
        self.data
            .write()
            .map_err(|_| Error::msg("data plane lock poisoned"))
    }

    /// Read lock on the diff plane.
    pub fn diff(&self) -> Result<RwLockReadGuard<'_, Vec<T>>> {
        self.diff
            .read()
            .map_err(|_| Error::msg("diff plane lock poisoned"))
    }

    /// Write lock on the diff plane.
    pub fn diff_mut(&self) -> Result<RwLockWriteGuard<'_, Vec<T>>> {
        self.diff
            .write()
            .map_err(|_| Error::msg("diff plane lock poisoned"))
    }

    /// Copy of the data plane.
    pub fn data_to_vec(&self) -> Result<Vec<T>> {
        Ok(self.data()?.clone())
    }

    /// Copy of the diff plane.
    pub fn diff_to_vec(&self) -> Result<Vec<T>> {
        Ok(self.diff()?.clone())
    }

    /// Data plane converted to f64.
    pub fn data_to_f64_vec(&self) -> Result<Vec<f64>> {
        Ok(self.data()?.iter().map(|v| v.as_f64()).collect())
    }

    /// Diff plane converted to f64.
    pub fn diff_to_f64_vec(&self) -> Result<Vec<f64>> {
        Ok(self.diff()?.iter().map(|v| v.as_f64()).collect())
    }

    /// Fill every data element with `value`.
    pub fn fill_data(&self, value: T) -> Result<()> {
        self.data_mut()?.iter_mut().for_each(|v| *v = value);
        Ok(())
    }

    /// Fill every diff element with `value`.
    pub fn fill_diff(&self, value: T) -> Result<()> {
        self.diff_mut()?.iter_mut().for_each(|v| *v = value);
        Ok(())
    }

    /// Overwrite the data plane from a slice of equal length.
    pub fn copy_data_from(&self, values: &[T]) -> Result<()> {
        let mut data = self.data_mut()?;
        if values.len() != data.len() {
            return Err(Error::ElementCountMismatch {
                expected: data.len(),
                got: values.len(),
            });
        }
        data.copy_from_slice(values);
        Ok(())
    }

    /// Overwrite the diff plane from a slice of equal length.
    pub fn copy_diff_from(&self, values: &[T]) -> Result<()> {
        let mut diff = self.diff_mut()?;
        if values.len() != diff.len() {
            return Err(Error::ElementCountMismatch {
                expected: diff.len(),
                got: values.len(),
            });
        }
        diff.copy_from_slice(values);
        Ok(())
    }

    // Sharing

    /// Make this blob's data plane an alias of `other`'s.
    ///
    /// Only the plane is shared; each blob keeps its own shape.
    pub fn share_data(&mut self, other: &Blob<T>) -> Result<()> {
        if self.count() != other.count() {
            return Err(Error::ElementCountMismatch {
                expected: self.count(),
                got: other.count(),
            });
        }
        self.data = Arc::clone(&other.data);
        Ok(())
    }

    /// Make this blob's diff plane an alias of `other`'s.
    pub fn share_diff(&mut self, other: &Blob<T>) -> Result<()> {
        if self.count() != other.count() {
            return Err(Error::ElementCountMismatch {
                expected: self.count(),
                got: other.count(),
            });
        }
        self.diff = Arc::clone(&other.diff);
        Ok(())
    }

    /// Whether both blobs read and write the same data plane.
    pub fn shares_data_with(&self, other: &Blob<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Whether both blobs read and write the same diff plane.
    pub fn shares_diff_with(&self, other: &Blob<T>) -> bool {
        Arc::ptr_eq(&self.diff, &other.diff)
    }
}
