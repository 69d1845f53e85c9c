use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use flowscope_artifacts::ArtifactError;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Load,
    Preprocess,
    LabelSplit,
    Split,
    Train,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::Preprocess => "preprocess",
            Stage::LabelSplit => "label-split",
            Stage::Split => "split",
            Stage::Train => "train",
            Stage::Store => "store",
        };
        f.write_str(name)
    }
}

/// Errors returned by the analysis pipeline. All of them are fatal.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("dataset is empty at {stage} stage: {reason}")]
    EmptyDataset { stage: Stage, reason: String },

    #[error("label column `{column}` not found in columns {available:?}")]
    LabelColumnMissing {
        column: String,
        available: Vec<String>,
    },

    #[error("feature column `{0}` is not numeric")]
    NonNumericFeature(String),

    #[error("stratified split failed: {0}")]
    StratificationFailure(String),

    #[error("training failed: {0}")]
    TrainingFailure(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact error: {0}")]
    Store(#[from] ArtifactError),
}

impl AnalysisError {
    /// Stage that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisError::InputNotFound(_) | AnalysisError::Csv(_) | AnalysisError::Io(_) => {
                Stage::Load
            }
            AnalysisError::EmptyDataset { stage, .. } => *stage,
            AnalysisError::LabelColumnMissing { .. } | AnalysisError::NonNumericFeature(_) => {
                Stage::LabelSplit
            }
            AnalysisError::StratificationFailure(_) => Stage::Split,
            AnalysisError::TrainingFailure(_) => Stage::Train,
            AnalysisError::InvalidConfig(_) => Stage::Config,
            AnalysisError::Store(_) => Stage::Store,
        }
    }
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
