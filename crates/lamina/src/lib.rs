//! # lamina
//!
//! Layer networks with hand-derived gradients over shared 4-D blobs.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use lamina::prelude::*;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `lamina-core` | Blob (data + diff planes), BlobShape, DType, Filler, Error |
//! | `lamina-nn` | Layer trait, Expand / Reshape / Sigmoid / SigmoidCrossEntropyLoss, configs, registry |
//!
//! ## Modules
//!
//! - [`net`] — build a network from a JSON description and drive it
//! - [`gradient_check`] — finite-difference verification of layer gradients

/// Re-export core types.
pub use lamina_core::{
    bail, ensure_config, Blob, BlobShape, DType, Error, Filler, Result, WithDType,
};

/// Re-export layers.
pub mod nn {
    pub use lamina_nn::*;
}

/// Net — layer sequence over named blobs.
pub mod net;

/// Gradient checking — compare backward passes against finite differences.
pub mod gradient_check;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::gradient_check::{GradientChecker, GradientReport};
    pub use crate::net::{InputSpec, Net, NetConfig};
    pub use crate::nn::{
        create_layer, ExpandLayer, ExpandParameter, Layer, LayerConfig, LayerKind, LossParameter,
        ReshapeLayer, ReshapeParameter, SigmoidCrossEntropyLossLayer, SigmoidLayer,
    };
    pub use crate::{Blob, BlobShape, DType, Error, Filler, Result, WithDType};
}
