// SigmoidCrossEntropyLoss — Class-weighted binary cross-entropy on logits
//
// Bottoms: logits x [N, C, H, W] and targets t (same element count).
// Top:     a scalar loss [1, 1, 1, 1].
//
// TARGET ENCODING:
//
//   t > 0   positive class, weighted by class_weight[0]
//   t < 0   negative class, weighted by class_weight[1]
//   t = 0   ignored: contributes to neither the loss nor its normaliser
//
// FORWARD (numerically stable, no exp of a positive argument):
//
//   ℓ(x, t) = -( x·([t>0] - [x≥0]) - ln(1 + e^(x - 2x·[x≥0])) )
//           = max(x, 0) - x·[t>0] + ln(1 + e^(-|x|))
//
//   loss = Σ w_t · ℓ(x, t) / Σ w_t        over elements with t ≠ 0
//
// BACKWARD (with σ the cached sigmoid of x):
//
//   dx = w_pos · (σ - 1)   for t > 0
//   dx = w_neg · σ         for t < 0
//   dx = 0                 for t = 0
//
//   then every dx is scaled by (top diff) / Σ w_t in one pass.
//
// When no target is non-zero the normaliser is zero and the loss and every
// gradient come out non-finite. That case is left unguarded on purpose.

use std::slice;

use lamina_core::dtype::WithDType;
use lamina_core::error::{Error, Result};
use lamina_core::{Blob, BlobShape};

use crate::config::LossParameter;
use crate::layer::{propagates, Layer};
use crate::sigmoid::SigmoidLayer;

const LAYER: &str = "SigmoidCrossEntropyLoss";

/// Stable per-element negative log-likelihood of logit `x` for a positive
/// (`positive = true`) or negative target.
pub fn stable_sigmoid_cross_entropy<T: WithDType>(x: T, positive: bool) -> T {
    let zero = T::zero();
    let target = if positive { T::one() } else { zero };
    let x_nonneg = if x >= zero { T::one() } else { zero };
    -(x * (target - x_nonneg) - (-x.abs()).exp().ln_1p())
}

/// Weighted sigmoid cross-entropy loss over signed trinary targets.
///
/// # Examples
/// ```ignore
/// let mut loss = SigmoidCrossEntropyLossLayer::<f32>::new(
///     LossParameter::with_class_weight(2.0, 1.0),
/// );
/// loss.setup(&[&logits, &targets], &mut top)?;
/// loss.forward(&[&logits, &targets], &mut top)?;
/// let value = top[0].data()?[0];
/// ```
pub struct SigmoidCrossEntropyLossLayer<T: WithDType> {
    param: LossParameter,
    sigmoid: SigmoidLayer,
    sigmoid_output: Blob<T>,
    positive_weight: T,
    negative_weight: T,
}

impl<T: WithDType> SigmoidCrossEntropyLossLayer<T> {
    pub fn new(param: LossParameter) -> Self {
        SigmoidCrossEntropyLossLayer {
            param,
            sigmoid: SigmoidLayer::new(),
            sigmoid_output: Blob::default(),
            positive_weight: T::one(),
            negative_weight: T::one(),
        }
    }

    /// `(positive, negative)` class weights in effect after setup.
    pub fn class_weights(&self) -> (T, T) {
        (self.positive_weight, self.negative_weight)
    }

    /// The weight for a target value, or `None` when the target is ignored.
    fn weight_for(&self, target: T) -> Option<T> {
        if target > T::zero() {
            Some(self.positive_weight)
        } else if target < T::zero() {
            Some(self.negative_weight)
        } else {
            None
        }
    }

    /// Sum of weighted per-element losses and the sum of weights used.
    fn weighted_loss(&self, input: &[T], target: &[T]) -> (T, T) {
        let mut loss = T::zero();
        let mut weight_sum = T::zero();
        for (&x, &t) in input.iter().zip(target.iter()) {
            if let Some(w) = self.weight_for(t) {
                loss = loss + w * stable_sigmoid_cross_entropy(x, t > T::zero());
                weight_sum = weight_sum + w;
            }
        }
        (loss, weight_sum)
    }
}

impl<T: WithDType> Layer<T> for SigmoidCrossEntropyLossLayer<T> {
    fn layer_type(&self) -> &'static str {
        LAYER
    }

    fn exact_num_bottom_blobs(&self) -> usize {
        2
    }

    fn exact_num_top_blobs(&self) -> usize {
        1
    }

    fn layer_setup(&mut self, bottom: &[&Blob<T>], _top: &mut [Blob<T>]) -> Result<()> {
        self.sigmoid
            .setup(&bottom[..1], slice::from_mut(&mut self.sigmoid_output))?;

        match self.param.class_weight.as_slice() {
            [positive, negative, ..] => {
                self.positive_weight = T::from_f64(*positive);
                self.negative_weight = T::from_f64(*negative);
                log::info!(
                    "positive class weight: {}, negative class weight: {}",
                    positive,
                    negative
                );
            }
            _ => {
                self.positive_weight = T::one();
                self.negative_weight = T::one();
                log::info!("No class_weight specified. Use 1 for both classes.");
            }
        }
        Ok(())
    }

    fn reshape(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        if bottom[0].count() != bottom[1].count() {
            return Err(Error::ElementCountMismatch {
                expected: bottom[0].count(),
                got: bottom[1].count(),
            });
        }
        top[0].reshape(BlobShape::scalar());
        self.sigmoid
            .reshape(&bottom[..1], slice::from_mut(&mut self.sigmoid_output))
    }

    fn forward(&mut self, bottom: &[&Blob<T>], top: &mut [Blob<T>]) -> Result<()> {
        // The probabilities are only needed by backward.
        self.sigmoid
            .forward(&bottom[..1], slice::from_mut(&mut self.sigmoid_output))?;

        let input = bottom[0].data()?;
        let target = bottom[1].data()?;
        let (loss, weight_sum) = self.weighted_loss(&input, &target);
        let value = loss / weight_sum;
        log::debug!("{}: loss {} over weight {}", LAYER, value, weight_sum);
        top[0].data_mut()?[0] = value;
        Ok(())
    }

    fn backward(
        &mut self,
        top: &[&Blob<T>],
        propagate_down: &[bool],
        bottom: &mut [Blob<T>],
    ) -> Result<()> {
        if propagates(propagate_down, 1) {
            return Err(Error::CannotBackpropagate {
                layer: LAYER,
                index: 1,
            });
        }
        if !propagates(propagate_down, 0) {
            return Ok(());
        }

        let sigmoid_output = self.sigmoid_output.data()?;
        let target = bottom[1].data()?;
        let mut bottom_diff = bottom[0].diff_mut()?;
        if sigmoid_output.len() != bottom_diff.len() {
            return Err(Error::ElementCountMismatch {
                expected: bottom_diff.len(),
                got: sigmoid_output.len(),
            });
        }

        let mut weight_sum = T::zero();
        for ((dx, &s), &t) in bottom_diff
            .iter_mut()
            .zip(sigmoid_output.iter())
            .zip(target.iter())
        {
            *dx = match self.weight_for(t) {
                Some(w) => {
                    weight_sum = weight_sum + w;
                    if t > T::zero() {
                        w * (s - T::one())
                    } else {
                        w * s
                    }
                }
                None => T::zero(),
            };
        }

        let loss_weight = top[0].diff()?[0];
        let scale = loss_weight / weight_sum;
        bottom_diff.iter_mut().for_each(|dx| *dx = *dx * scale);
        Ok(())
    }

    fn allow_force_backward(&self, bottom_index: usize) -> bool {
        bottom_index != 1
    }

    fn is_loss(&self) -> bool {
        true
    }
}
