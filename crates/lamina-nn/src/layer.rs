// Layer trait — The interface every lamina layer implements
//
// A layer is driven through four calls, always in this order:
//
//   setup     — once: check blob counts, read parameters, then reshape
//   reshape   — whenever bottom shapes change: derive top shapes
//   forward   — bottom data → top data
//   backward  — top diff → bottom diff, for bottoms flagged in propagate_down
//
// Layers never own blobs. Bottoms arrive as shared references, tops as a
// mutable slice the layer may reshape or re-point (share) at other planes.
// In backward the roles flip: tops are read, bottoms are written.
//
// GENERIC OVER ELEMENT TYPE:
//
// Every layer is generic over T: WithDType, so the same definition runs in
// f32 for normal use and in f64 for finite-difference gradient checks.

use lamina_core::dtype::WithDType;
use lamina_core::error::{Error, Result};
use lamina_core::Blob;

/// The fundamental trait for all hand-differentiated layers.
///
/// # Example
/// ```ignore
/// let mut layer = ExpandLayer::new(ExpandParameter::square(3));
/// let bottom = Blob::<f32>::from_vec((2, 4, 1, 1), values)?;
/// let mut top = vec![Blob::default()];
/// Layer::<f32>::setup(&mut layer, &[&bottom], &mut top)?;
/// layer.forward(&[&bottom], &mut top)?; // top is [2, 4, 3, 3]
/// ```
pub trait Layer<T: WithDType>: Send {
    /// Registered type name, e.g. `"Expand"`.
    fn layer_type(&self) -> &'static str;

    /// Exact number of bottom blobs this layer accepts.
    fn exact_num_bottom_blobs(&self) -> usize;

    /// Exact number of top blobs this layer produces.
    fn exact_num_top_blobs(&self) -> usize;

    /// Layer-specific one-time setup: parse parameters and validate.
    fn layer_setup(&mut self, _bottom: &[&Blob<T>], _top: &mut [Blob<T>]) -> Result<()> {
        Ok(())
    }

    /// Derive top shapes (and internal buffer shapes) from bottom shapes.
    fn reshape(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()>;

    /// Compute top data from bottom data.
    fn forward(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()>;

    /// Compute bottom diffs from top diffs.
    ///
    /// `propagate_down[i]` says whether bottom `i` wants a gradient.
    fn backward(
        &mut self,
        top: &[&Blob<T>],
        propagate_down: &[bool],
        bottom: &mut [Blob<T>],
    ) -> Result<()>;

    /// Whether a driver may request a gradient for bottom `bottom_index`.
    /// Loss layers return false for their label input.
    fn allow_force_backward(&self, _bottom_index: usize) -> bool {
        true
    }

    /// Whether top 0 is a scalar loss the driver should seed with a loss weight.
    fn is_loss(&self) -> bool {
        false
    }

    /// Check arity, run `layer_setup`, then `reshape`.
    fn setup(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        self.check_blob_counts(bottom.len(), top.len())?;
        self.layer_setup(bottom, top)?;
        self.reshape(bottom, top)
    }

    /// Fail unless the blob counts match the declared arity.
    fn check_blob_counts(&self, num_bottom: usize, num_top: usize) -> Result<()> {
        if num_bottom != self.exact_num_bottom_blobs() {
            return Err(Error::BlobCount {
                layer: self.layer_type(),
                which: "bottom",
                expected: self.exact_num_bottom_blobs(),
                got: num_bottom,
            });
        }
        if num_top != self.exact_num_top_blobs() {
            return Err(Error::BlobCount {
                layer: self.layer_type(),
                which: "top",
                expected: self.exact_num_top_blobs(),
                got: num_top,
            });
        }
        Ok(())
    }
}

/// `propagate_down[index]`, treating a missing flag as false.
pub(crate) fn propagates(propagate_down: &[bool], index: usize) -> bool {
    propagate_down.get(index).copied().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;

    impl Layer<f32> for Identity {
        fn layer_type(&self) -> &'static str {
            "Identity"
        }
        fn exact_num_bottom_blobs(&self) -> usize {
            1
        }
        fn exact_num_top_blobs(&self) -> usize {
            1
        }
        fn reshape(&mut self, bottom: &[&Blob<f32>], top: &mut [Blob<f32>]) -> Result<()> {
            top[0].reshape_like(bottom[0]);
            Ok(())
        }
        fn forward(&mut self, bottom: &[&Blob<f32>], top: &mut [Blob<f32>]) -> Result<()> {
            top[0].copy_data_from(&bottom[0].data()?)
        }
        fn backward(
            &mut self,
            top: &[&Blob<f32>],
            _propagate_down: &[bool],
            bottom: &mut [Blob<f32>],
        ) -> Result<()> {
            bottom[0].copy_diff_from(&top[0].diff()?)
        }
    }

    #[test]
    fn test_setup_checks_bottom_count() {
        let a = Blob::<f32>::new((1, 1, 1, 1));
        let b = Blob::<f32>::new((1, 1, 1, 1));
        let mut top = vec![Blob::default()];
        let err = Identity.setup(&[&a, &b], &mut top).unwrap_err();
        assert!(matches!(
            err,
            Error::BlobCount {
                which: "bottom",
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_setup_checks_top_count() {
        let a = Blob::<f32>::new((1, 1, 1, 1));
        let mut top: Vec<Blob<f32>> = vec![];
        assert!(matches!(
            Identity.setup(&[&a], &mut top),
            Err(Error::BlobCount { which: "top", .. })
        ));
    }

    #[test]
    fn test_setup_runs_reshape() -> Result<()> {
        let a = Blob::<f32>::new((2, 3, 4, 5));
        let mut top = vec![Blob::default()];
        Identity.setup(&[&a], &mut top)?;
        assert_eq!(top[0].shape(), a.shape());
        Ok(())
    }

    #[test]
    fn test_propagates_defaults_to_false() {
        assert!(propagates(&[true], 0));
        assert!(!propagates(&[true], 1));
        assert!(!propagates(&[], 0));
    }
}
