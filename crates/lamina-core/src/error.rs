use crate::shape::BlobShape;

/// All errors that can occur within lamina.
///
/// Configuration and shape problems surface from `setup` / `reshape`;
/// contract violations (such as asking a loss layer for label gradients)
/// surface from `backward`. None of them are retried: the failing pass stops.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two shapes that must agree do not.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: BlobShape, got: BlobShape },

    /// Element counts disagree (sharing planes, building a blob from a vec,
    /// pairing logits with targets, or a reshape that does not conserve count).
    #[error("element count mismatch: expected {expected} elements, got {got}")]
    ElementCountMismatch { expected: usize, got: usize },

    /// A layer's parameters are missing, contradictory or out of range.
    #[error("invalid configuration for {layer} layer: {reason}")]
    InvalidConfig { layer: &'static str, reason: String },

    /// A layer received the wrong number of bottom or top blobs.
    #[error("{layer} layer takes {expected} {which} blob(s), got {got}")]
    BlobCount {
        layer: &'static str,
        which: &'static str,
        expected: usize,
        got: usize,
    },

    /// Gradient propagation was requested into an input that is not
    /// differentiable.
    #[error("{layer} layer cannot backpropagate to input {index}")]
    CannotBackpropagate { layer: &'static str, index: usize },

    /// A network referenced a blob name that does not exist.
    #[error("unknown blob `{0}`")]
    UnknownBlob(String),

    /// Network or layer configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Shorthand for [`Error::InvalidConfig`].
    pub fn invalid_config(layer: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            layer,
            reason: reason.into(),
        }
    }
}

/// Convenience Result type used throughout lamina.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

/// Early return with [`Error::InvalidConfig`] unless the condition holds.
/// Usage: `ensure_config!(size > 0, "Expand", "size must be positive, got {}", size)`
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $layer:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::Error::InvalidConfig {
                layer: $layer,
                reason: format!($($arg)*),
            });
        }
    };
}
