// Gradient checking — Compare a layer's backward against finite differences
//
// The checker turns a layer into a scalar objective
//
//   J = Σ_k r_k · top_k                (summed over every top element)
//
// with fixed random weights r drawn from a seeded RNG. Seeding the top diffs
// with r and running backward gives the analytic dJ/dx; perturbing each
// bottom element by ±h and re-running forward gives the central difference
//
//   (J(x + h) - J(x - h)) / 2h
//
// An element passes when |analytic - numeric| <= threshold · max(|analytic|,
// |numeric|, 1).
//
// Run checks in f64: with f32 the truncation and rounding errors of the
// central difference are of the same order as a real gradient bug.

use rand::rngs::StdRng;
use rand::SeedableRng;

use lamina_core::dtype::WithDType;
use lamina_core::error::Result;
use lamina_core::{bail, Blob, Filler};
use lamina_nn::layer::Layer;

/// One element whose analytic and numeric gradients disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientMismatch {
    pub index: usize,
    pub analytic: f64,
    pub numeric: f64,
}

/// Outcome of a gradient check over one bottom blob.
#[derive(Debug, Clone, Default)]
pub struct GradientReport {
    pub checked: usize,
    pub max_abs_error: f64,
    pub mismatches: Vec<GradientMismatch>,
}

impl GradientReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Finite-difference gradient checker.
#[derive(Debug, Clone, Copy)]
pub struct GradientChecker {
    stepsize: f64,
    threshold: f64,
    seed: u64,
}

impl Default for GradientChecker {
    fn default() -> Self {
        GradientChecker::new(1e-4, 1e-6)
    }
}

impl GradientChecker {
    pub fn new(stepsize: f64, threshold: f64) -> Self {
        GradientChecker {
            stepsize,
            threshold,
            seed: 1701,
        }
    }

    /// Use a different seed for the objective weights.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the gradient of `layer` with respect to `bottom[check_bottom]`.
    ///
    /// The layer is set up on `bottom` first, so it may be freshly built.
    /// `bottom` data is restored to its original values before returning.
    pub fn check<T: WithDType>(
        &self,
        layer: &mut dyn Layer<T>,
        bottom: &mut [Blob<T>],
        check_bottom: usize,
    ) -> Result<GradientReport> {
        if check_bottom >= bottom.len() {
            bail!("bottom {check_bottom} out of range for {} bottoms", bottom.len());
        }

        let mut top: Vec<Blob<T>> = (0..layer.exact_num_top_blobs())
            .map(|_| Blob::default())
            .collect();
        {
            let refs: Vec<&Blob<T>> = bottom.iter().collect();
            layer.setup(&refs, &mut top)?;
            layer.forward(&refs, &mut top)?;
        }

        // Objective weights double as the upstream gradient.
        let mut rng = StdRng::seed_from_u64(self.seed);
        let filler = Filler::Uniform {
            min: -1.0,
            max: 1.0,
        };
        let mut weights = Vec::with_capacity(top.len());
        for blob in &top {
            filler.fill_diff(blob, &mut rng)?;
            weights.push(blob.diff_to_f64_vec()?);
        }

        let mut propagate_down = vec![false; bottom.len()];
        propagate_down[check_bottom] = true;
        {
            let top_refs: Vec<&Blob<T>> = top.iter().collect();
            layer.backward(&top_refs, &propagate_down, bottom)?;
        }
        let analytic = bottom[check_bottom].diff_to_f64_vec()?;

        let mut report = GradientReport::default();
        for (index, &analytic) in analytic.iter().enumerate() {
            let original = bottom[check_bottom].data()?[index];
            let step = T::from_f64(self.stepsize);

            bottom[check_bottom].data_mut()?[index] = original + step;
            let positive = self.objective(layer, bottom, &mut top, &weights)?;
            bottom[check_bottom].data_mut()?[index] = original - step;
            let negative = self.objective(layer, bottom, &mut top, &weights)?;
            bottom[check_bottom].data_mut()?[index] = original;

            let numeric = (positive - negative) / (2.0 * self.stepsize);
            let error = (analytic - numeric).abs();
            let scale = analytic.abs().max(numeric.abs()).max(1.0);
            report.checked += 1;
            report.max_abs_error = report.max_abs_error.max(error);
            if error.is_nan() || error > self.threshold * scale {
                report.mismatches.push(GradientMismatch {
                    index,
                    analytic,
                    numeric,
                });
            }
        }
        log::debug!(
            "{} gradient check: {} elements, max error {:e}",
            layer.layer_type(),
            report.checked,
            report.max_abs_error
        );
        Ok(report)
    }

    fn objective<T: WithDType>(
        &self,
        layer: &mut dyn Layer<T>,
        bottom: &[Blob<T>],
        top: &mut [Blob<T>],
        weights: &[Vec<f64>],
    ) -> Result<f64> {
        let refs: Vec<&Blob<T>> = bottom.iter().collect();
        layer.forward(&refs, top)?;
        let mut total = 0.0;
        for (blob, r) in top.iter().zip(weights) {
            let data = blob.data()?;
            total += data
                .iter()
                .zip(r)
                .map(|(&v, &w)| v.as_f64() * w)
                .sum::<f64>();
        }
        Ok(total)
    }
}
