//! Error types for the molprop crate.

use thiserror::Error;

/// Main error type for molecular property prediction.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A chemical property value falls outside the closed feature vocabulary
    #[error("vocabulary lookup failed: {value} is not a known {category}")]
    Vocabulary {
        category: &'static str,
        value: String,
    },

    /// Prediction and label tensors disagree on element count
    #[error("shape mismatch: {predictions} prediction elements vs {labels} label elements")]
    ShapeMismatch { predictions: usize, labels: usize },

    /// A pretrained checkpoint could not be retrieved
    #[error("artifact fetch failed: {0}")]
    ArtifactFetch(String),

    /// Save payload is missing or incompatible with the current backbone
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Molecule graph assembly error
    #[error("graph error: {0}")]
    Graph(String),

    /// Training error
    #[error("training error: {0}")]
    Training(String),

    /// Tensor data conversion error
    #[error("tensor error: {0}")]
    Tensor(String),

    /// Invalid argument error
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Specialized Result type for molprop operations.
pub type Result<T> = std::result::Result<T, Error>;
