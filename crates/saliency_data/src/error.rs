//! Error taxonomy for the saliency data pipeline.
//!
//! Every stage returns `anyhow::Result`; the conditions callers are expected
//! to react to are raised as [`SaliencyError`] values so they survive any
//! added context and can be recovered with `err.downcast_ref::<SaliencyError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaliencyError {
    /// Invalid normalization constants, sizes, scales or mode.
    #[error("configuration: {message}")]
    Configuration { message: String },

    /// The manifest file could not be opened or read.
    #[error("failed to read manifest {}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest line too short to carry an identifier plus its extension.
    #[error("malformed manifest entry on line {line}: {entry:?}")]
    MalformedManifestEntry { line: usize, entry: String },

    /// No raster exists at the path derived from a sample identifier.
    #[error("sample raster not found: {}", path.display())]
    SampleNotFound { path: PathBuf },

    /// Requested index is past the end of the identifier list.
    #[error("sample index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    /// Mask/edge dimensions disagree with the image, or the channel count
    /// disagrees with the normalization constants.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },
}

impl SaliencyError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn shape_mismatch(context: impl Into<String>, expected: &[i64], actual: &[i64]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
