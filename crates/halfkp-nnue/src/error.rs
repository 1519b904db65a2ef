//! Error types for evaluation, export, snapshots and configuration.

/// A tensor or feature vector does not match the configured architecture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("shape mismatch for {tensor}: expected {expected} values, found {found}")]
    ShapeMismatch {
        /// Which tensor or input was checked (e.g. `"feature_in.weights"`).
        tensor: String,
        expected: usize,
        found: usize,
    },
}

impl NetworkError {
    pub(crate) fn shape(tensor: impl Into<String>, expected: usize, found: usize) -> Self {
        NetworkError::ShapeMismatch {
            tensor: tensor.into(),
            expected,
            found,
        }
    }
}

/// Errors while writing or reading a quantized artifact.
///
/// Any of these means the artifact is not valid.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error while exporting: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error(transparent)]
    Shape(#[from] NetworkError),

    #[error("description is {len} bytes, longer than a u32 length prefix allows")]
    DescriptionTooLong { len: usize },

    #[error("bad magic tag: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("description is not valid UTF-8")]
    InvalidDescription,
}

/// Errors while reading or writing a float parameter snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("I/O error on snapshot: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("bad snapshot magic: {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("snapshot output size {found} is not supported, expected {expected}")]
    OutputSize { expected: u32, found: u32 },

    #[error("snapshot input size {found} matches no feature layout")]
    UnknownInputSize { found: u32 },

    #[error("snapshot hidden size {found} is outside 1..={max}")]
    HiddenSize { found: u32, max: u32 },

    #[error(transparent)]
    Shape(#[from] NetworkError),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("hidden size must be greater than zero")]
    ZeroHidden,

    #[error("eval scale must be finite and positive, got {value}")]
    InvalidEvalScale { value: f32 },

    #[error("unknown preset: {name}")]
    UnknownPreset { name: String },

    #[error("unknown feature layout: {name}")]
    UnknownLayout { name: String },

    #[error("unknown quantization scheme: {name}")]
    UnknownScheme { name: String },
}

/// A game result string other than `1-0`, `0-1` or `1/2-1/2`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized game result: {found:?}")]
pub struct GameResultError {
    pub found: String,
}

#[cfg(test)]
mod tests {
    use super::{ExportError, NetworkError};

    #[test]
    fn shape_mismatch_display() {
        let err = NetworkError::shape("features", 768, 12);
        assert_eq!(
            err.to_string(),
            "shape mismatch for features: expected 768 values, found 12"
        );
    }

    #[test]
    fn export_error_wraps_shape_transparently() {
        let err: ExportError = NetworkError::shape("output.bias", 1, 2).into();
        assert_eq!(
            err.to_string(),
            "shape mismatch for output.bias: expected 1 values, found 2"
        );
    }
}
