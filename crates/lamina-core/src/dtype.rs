use std::fmt;

// DType — Element types a blob can hold
//
// Layers do real floating-point math (exp, ln, max, abs) in both passes, so
// only the two IEEE float widths are supported:
//
//   F32  — the default workhorse
//   F64  — used by gradient checks, where finite differences need headroom

/// Enum of the supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

// WithDType — Trait that connects Rust types to the DType enum
//
// Layer code is written once as `impl<T: WithDType> Layer<T> for ...` and the
// `num_traits::Float` supertrait supplies the math.

/// Trait implemented by Rust types that can be stored in a blob.
pub trait WithDType:
    num_traits::Float + Default + Send + Sync + 'static + fmt::Debug + fmt::Display
{
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// Convert this value to f64 (for logging and tolerance checks).
    fn as_f64(self) -> f64;

    /// Create a value of this type from f64.
    fn from_f64(v: f64) -> Self;
}

impl WithDType for f32 {
    const DTYPE: DType = DType::F32;
    fn as_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl WithDType for f64 {
    const DTYPE: DType = DType::F64;
    fn as_f64(self) -> f64 {
        self
    }
    fn from_f64(v: f64) -> Self {
        v
    }
}
