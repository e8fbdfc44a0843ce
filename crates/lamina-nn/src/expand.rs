// Expand — Broadcast a per-channel scalar over a spatial grid
//
// Input  [N, C, 1, 1]  →  Output [N, C, H_e, W_e]
//
// FORWARD:
//
//   top[n, c, h, w] = bottom[n, c, 0, 0]   for every (h, w) in the grid
//
//   Values are replicated, not interpolated.
//
// BACKWARD:
//
//   The adjoint of a copy is a sum over the copied axes:
//
//   d bottom[n, c] = Σ_{h, w} d top[n, c, h, w]
//
// SIZING:
//
//   Either `expand_size` (square grid) or both `expand_h` and `expand_w`.
//   Giving both styles, neither, or only one of height/width fails setup.

use lamina_core::dtype::WithDType;
use lamina_core::error::{Error, Result};
use lamina_core::{ensure_config, Blob, BlobShape};

use crate::config::ExpandParameter;
use crate::layer::{propagates, Layer};

const LAYER: &str = "Expand";

/// Replicates each `(n, c)` scalar of a 1×1 input over an `H × W` grid.
///
/// # Examples
/// ```ignore
/// let mut expand = ExpandLayer::new(ExpandParameter::hw(2, 3));
/// // bottom [4, 8, 1, 1] → top [4, 8, 2, 3]
/// ```
pub struct ExpandLayer {
    param: ExpandParameter,
    expand_h: usize,
    expand_w: usize,
    channels: usize,
}

impl ExpandLayer {
    pub fn new(param: ExpandParameter) -> Self {
        ExpandLayer {
            param,
            expand_h: 0,
            expand_w: 0,
            channels: 0,
        }
    }

    /// Resolved `(expand_h, expand_w)`; zero until setup has run.
    pub fn expand_dims(&self) -> (usize, usize) {
        (self.expand_h, self.expand_w)
    }

    fn resolve_dims(param: &ExpandParameter) -> Result<(usize, usize)> {
        let has_hw = param.expand_h.is_some() || param.expand_w.is_some();
        ensure_config!(
            !(param.expand_size.is_some() && has_hw),
            LAYER,
            "expand size is expand_size OR expand_h and expand_w, not both"
        );
        let (h, w) = match (param.expand_size, param.expand_h, param.expand_w) {
            (Some(size), _, _) => (size, size),
            (None, Some(h), Some(w)) => (h, w),
            (None, None, None) => {
                return Err(Error::invalid_config(
                    LAYER,
                    "one of expand_size or expand_h and expand_w is required",
                ))
            }
            _ => {
                return Err(Error::invalid_config(
                    LAYER,
                    "for a non-square output both expand_h and expand_w are required",
                ))
            }
        };
        ensure_config!(h > 0, LAYER, "expand_h must be positive, got {}", h);
        ensure_config!(w > 0, LAYER, "expand_w must be positive, got {}", w);
        Ok((h, w))
    }

    fn check_unit_spatial<T: WithDType>(bottom: &Blob<T>) -> Result<()> {
        if bottom.height() != 1 || bottom.width() != 1 {
            return Err(Error::ShapeMismatch {
                expected: BlobShape::new(bottom.num(), bottom.channels(), 1, 1),
                got: bottom.shape(),
            });
        }
        Ok(())
    }
}

impl<T: WithDType> Layer<T> for ExpandLayer {
    fn layer_type(&self) -> &'static str {
        LAYER
    }

    fn exact_num_bottom_blobs(&self) -> usize {
        1
    }

    fn exact_num_top_blobs(&self) -> usize {
        1
    }

    fn layer_setup(&mut self, bottom: &[&Blob<T>], _top: &mut [Blob<T>]) -> Result<()> {
        let (h, w) = Self::resolve_dims(&self.param)?;
        Self::check_unit_spatial(bottom[0])?;
        self.expand_h = h;
        self.expand_w = w;
        log::debug!("Expand: {}x{} grid", h, w);
        Ok(())
    }

    fn reshape(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        Self::check_unit_spatial(bottom[0])?;
        self.channels = bottom[0].channels();
        top[0].reshape((bottom[0].num(), self.channels, self.expand_h, self.expand_w));
        Ok(())
    }

    fn forward(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        let spatial_dim = self.expand_h * self.expand_w;
        let bottom_data = bottom[0].data()?;
        let mut top_data = top[0].data_mut()?;
        // One bottom scalar per (n, c) plane of the top.
        for (&value, plane) in bottom_data.iter().zip(top_data.chunks_mut(spatial_dim)) {
            plane.fill(value);
        }
        Ok(())
    }

    fn backward(
        &mut self,
        top: &[&Blob<T>],
        propagate_down: &[bool],
        bottom: &mut [Blob<T>],
    ) -> Result<()> {
        if !propagates(propagate_down, 0) {
            return Ok(());
        }
        let spatial_dim = self.expand_h * self.expand_w;
        let top_diff = top[0].diff()?;
        let mut bottom_diff = bottom[0].diff_mut()?;
        for (grad, plane) in bottom_diff.iter_mut().zip(top_diff.chunks(spatial_dim)) {
            *grad = plane.iter().fold(T::zero(), |acc, &g| acc + g);
        }
        Ok(())
    }
}
