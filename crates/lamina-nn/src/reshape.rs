// Reshape — Reinterpret the (channel, height, width) partition in place
//
// [N, C, H, W] → [N, C', H', W'] with C·H·W = C'·H'·W'
//
// No element is copied. Forward points the top's data plane at the bottom's,
// backward points the bottom's diff plane at the top's, so both blobs see
// one buffer under two shapes.
//
// PARAMETERS:
//
//   At least two of channel / height / width must be positive; a zero axis is
//   solved from the conserved per-sample count, checking width first, then
//   height, then channel. The result must conserve the total count exactly.

use lamina_core::dtype::WithDType;
use lamina_core::error::{Error, Result};
use lamina_core::{ensure_config, Blob, BlobShape};

use crate::config::ReshapeParameter;
use crate::layer::Layer;

const LAYER: &str = "Reshape";

/// Zero-copy reshape of the non-batch axes.
///
/// # Examples
/// ```ignore
/// let mut reshape = ReshapeLayer::new(ReshapeParameter::new(1, 4, 0));
/// // bottom [2, 8, 1, 1] → top [2, 1, 4, 2], sharing storage
/// ```
pub struct ReshapeLayer {
    param: ReshapeParameter,
}

impl ReshapeLayer {
    pub fn new(param: ReshapeParameter) -> Self {
        ReshapeLayer { param }
    }

    /// Solve for the unspecified axis given `bottom`'s shape.
    pub fn resolve_shape(param: &ReshapeParameter, bottom: BlobShape) -> Result<BlobShape> {
        let ReshapeParameter {
            mut channel,
            mut height,
            mut width,
        } = *param;
        let n_param = [channel, height, width].iter().filter(|&&d| d > 0).count();
        ensure_config!(
            n_param >= 2,
            LAYER,
            "at least two of channel, height and width must be specified, got {:?}",
            param
        );

        let dim = bottom.sample_dim();
        if width == 0 {
            width = dim / (channel * height);
        } else if height == 0 {
            height = dim / (channel * width);
        } else if channel == 0 {
            channel = dim / (width * height);
        }

        let shape = BlobShape::new(bottom.num, channel, height, width);
        if shape.count() != bottom.count() {
            return Err(Error::ElementCountMismatch {
                expected: bottom.count(),
                got: shape.count(),
            });
        }
        Ok(shape)
    }
}

impl<T: WithDType> Layer<T> for ReshapeLayer {
    fn layer_type(&self) -> &'static str {
        LAYER
    }

    fn exact_num_bottom_blobs(&self) -> usize {
        1
    }

    fn exact_num_top_blobs(&self) -> usize {
        1
    }

    fn reshape(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        let shape = Self::resolve_shape(&self.param, bottom[0].shape())?;
        top[0].reshape(shape);
        log::debug!("Reshape: {} -> {}", bottom[0].shape(), shape);
        Ok(())
    }

    fn forward(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        top[0].share_data(bottom[0])
    }

    // Sharing is unconditional: the diff plane is linked even when the
    // bottom does not ask for a gradient.
    fn backward(
        &mut self,
        top: &[&Blob<T>],
        _propagate_down: &[bool],
        bottom: &mut [Blob<T>],
    ) -> Result<()> {
        bottom[0].share_diff(top[0])
    }
}
