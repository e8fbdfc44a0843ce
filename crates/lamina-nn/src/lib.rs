//! # lamina-nn
//!
//! Hand-differentiated layers for lamina.
//!
//! Every layer implements the [`Layer`] trait: `setup` → `reshape` →
//! `forward` → `backward`, reading and writing caller-owned [`Blob`]s.
//!
//! 1. **ExpandLayer** — broadcast a 1×1 per-channel value over an H×W grid
//! 2. **ReshapeLayer** — zero-copy reinterpretation of channel/height/width
//! 3. **SigmoidLayer** — element-wise logistic function
//! 4. **SigmoidCrossEntropyLossLayer** — class-weighted, numerically stable
//!    binary cross-entropy over signed trinary targets
//!
//! Layers are built from [`LayerConfig`] records by [`create_layer`].
//!
//! [`Blob`]: lamina_core::Blob

pub mod config;
pub mod expand;
pub mod layer;
pub mod loss;
pub mod registry;
pub mod reshape;
pub mod sigmoid;

pub use config::{ExpandParameter, LayerConfig, LayerKind, LossParameter, ReshapeParameter};
pub use expand::ExpandLayer;
pub use layer::Layer;
pub use loss::{stable_sigmoid_cross_entropy, SigmoidCrossEntropyLossLayer};
pub use registry::{create_layer, LAYER_TYPES};
pub use reshape::ReshapeLayer;
pub use sigmoid::SigmoidLayer;
