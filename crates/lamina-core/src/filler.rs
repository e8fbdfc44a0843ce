// Fillers — Seeded initial values for blob planes
//
// Tests and gradient checks need reproducible, non-trivial blob contents.
// A Filler describes a distribution; `fill_data` draws one value per element
// from a caller-supplied RNG so the same seed always yields the same blob.

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::Normal;

use crate::blob::Blob;
use crate::bail;
use crate::dtype::WithDType;
use crate::error::{Error, Result};

/// Distribution used to initialise a blob plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filler {
    /// Every element set to the same value.
    Constant(f64),
    /// Uniform on `[min, max)`.
    Uniform { min: f64, max: f64 },
    /// Normal with the given mean and standard deviation.
    Gaussian { mean: f64, std: f64 },
    /// Uniform choice among {-1, 0, +1}: signed trinary labels.
    SignedTrinary,
}

impl Filler {
    fn fill_plane<T: WithDType, R: Rng>(&self, plane: &mut [T], rng: &mut R) -> Result<()> {
        match *self {
            Filler::Constant(value) => plane.fill(T::from_f64(value)),
            Filler::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite()) || min >= max {
                    bail!("uniform filler needs finite min < max, got [{min}, {max})");
                }
                let uniform = Uniform::new(min, max);
                for v in plane.iter_mut() {
                    *v = T::from_f64(uniform.sample(rng));
                }
            }
            Filler::Gaussian { mean, std } => {
                let normal = Normal::new(mean, std)
                    .map_err(|e| Error::msg(format!("gaussian filler (std {std}): {e}")))?;
                for v in plane.iter_mut() {
                    *v = T::from_f64(normal.sample(rng));
                }
            }
            Filler::SignedTrinary => {
                for v in plane.iter_mut() {
                    *v = T::from_f64(f64::from(rng.gen_range(-1i32..=1)));
                }
            }
        }
        Ok(())
    }

    /// Overwrite the data plane of `blob` with samples.
    pub fn fill_data<T: WithDType, R: Rng>(&self, blob: &Blob<T>, rng: &mut R) -> Result<()> {
        self.fill_plane(&mut blob.data_mut()?, rng)
    }

    /// Overwrite the diff plane of `blob` with samples.
    pub fn fill_diff<T: WithDType, R: Rng>(&self, blob: &Blob<T>, rng: &mut R) -> Result<()> {
        self.fill_plane(&mut blob.diff_mut()?, rng)
    }
}
