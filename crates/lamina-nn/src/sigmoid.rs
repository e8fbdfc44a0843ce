// Sigmoid — Element-wise logistic function
//
//   forward:   y = 1 / (1 + e^(-x))
//   backward:  dx = dy · y · (1 - y)
//
// Backward only needs the top data, so the layer keeps no state. The
// sigmoid cross-entropy loss owns one of these directly to produce the
// probabilities its gradient is written in terms of.

use lamina_core::dtype::WithDType;
use lamina_core::error::Result;
use lamina_core::Blob;

use crate::layer::{propagates, Layer};

/// Element-wise logistic sigmoid.
#[derive(Debug, Default, Clone, Copy)]
pub struct SigmoidLayer;

impl SigmoidLayer {
    pub fn new() -> Self {
        SigmoidLayer
    }
}

#[inline]
pub(crate) fn sigmoid<T: WithDType>(x: T) -> T {
    T::one() / (T::one() + (-x).exp())
}

impl<T: WithDType> Layer<T> for SigmoidLayer {
    fn layer_type(&self) -> &'static str {
        "Sigmoid"
    }

    fn exact_num_bottom_blobs(&self) -> usize {
        1
    }

    fn exact_num_top_blobs(&self) -> usize {
        1
    }

    fn reshape(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        top[0].reshape_like(bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        let bottom_data = bottom[0].data()?;
        let mut top_data = top[0].data_mut()?;
        for (y, &x) in top_data.iter_mut().zip(bottom_data.iter()) {
            *y = sigmoid(x);
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
        let top_data = top[0].data()?;
        let top_diff = top[0].diff()?;
        let mut bottom_diff = bottom[0].diff_mut()?;
        for ((dx, &y), &dy) in bottom_diff
            .iter_mut()
            .zip(top_data.iter())
            .zip(top_diff.iter())
        {
            *dx = dy * y * (T::one() - y);
        }
        Ok(())
    }
}
