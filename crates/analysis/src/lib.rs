//! flowscope analysis - deterministic network-flow analysis pipeline
//!
//! Loads a labelled flow dataset, cleans it, trains a seeded random forest
//! on a stratified split and publishes descriptive statistics, correlation
//! rankings and feature importances as the nine result artifacts of
//! `flowscope-artifacts`.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod forest;
pub mod importance;
pub mod pipeline;
pub mod split;
pub mod stats;

pub use config::AnalysisConfig;
pub use dataset::{Cell, ColumnKind, FeatureMatrix, LabelEncoder, RecordSet};
pub use errors::{AnalysisError, Result, Stage};
pub use forest::{ForestConfig, RandomForest, RandomForestTrainer};
pub use importance::{ImportanceRanking, ReducedHead, TopColumns, TopImportances};
pub use pipeline::{AnalysisPipeline, RunReport, RunSummary};
pub use split::{StratifiedSplitter, TrainTestSplit};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
