//! # lamina-core
//!
//! Blob container, shapes, element types and errors for lamina.
//!
//! This crate provides:
//! - [`Blob`] — 4-D `(num, channels, height, width)` array with separate
//!   data and diff planes that can be shared between blobs
//! - [`BlobShape`] — the four-axis shape and its row-major offsets
//! - [`DType`] / [`WithDType`] — the f32 / f64 element types
//! - [`Filler`] — seeded value distributions for initialising blobs
//! - [`Error`] / [`Result`] — the error type shared by every lamina crate

pub mod blob;
pub mod dtype;
pub mod error;
pub mod filler;
pub mod shape;

pub use blob::Blob;
pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use filler::Filler;
pub use shape::BlobShape;
