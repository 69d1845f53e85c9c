//! Error types for artifact storage and lookup

use thiserror::Error;

use crate::shape::Shape;

/// Errors that can occur while building, storing or reading artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Artifact file is absent from the results directory
    #[error("Result artifact not found: {name}. Run `flowscope run` to generate it")]
    ArtifactMissing { name: String },

    /// Artifact file exists but does not hold valid JSON
    #[error("Failed to decode JSON in result artifact {name}: {reason}")]
    ArtifactMalformed { name: String, reason: String },

    /// Artifact shape does not match the manifest entry for its key
    #[error("Artifact {key} is a {actual} but the manifest expects a {expected}")]
    ShapeMismatch {
        key: &'static str,
        expected: Shape,
        actual: Shape,
    },

    /// Table dimensions are inconsistent
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// Bundle handed to the store does not cover the whole manifest
    #[error("Artifact bundle is incomplete, missing: {0:?}")]
    IncompleteBundle(Vec<&'static str>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for artifact operations
pub type Result<T> = std::result::Result<T, ArtifactError>;
