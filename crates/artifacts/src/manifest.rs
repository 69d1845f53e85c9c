//! Fixed manifest of the nine result artifacts
//!
//! The manifest is the contract between the analysis pipeline (writer) and
//! the results lookup (reader): each logical key has one file name and one
//! serialization shape.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{ArtifactError, Result};
use crate::shape::{Artifact, Shape};

/// Logical key of a result artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKey {
    HeadSample,
    SchemaSummary,
    LabelFrequency,
    DescriptiveStats,
    LabelCorrelation,
    FeatureCorrelation,
    TopImportances,
    TopColumns,
    ReducedTrainingHead,
}

impl ArtifactKey {
    /// All keys in manifest order
    pub const ALL: [ArtifactKey; 9] = [
        ArtifactKey::HeadSample,
        ArtifactKey::SchemaSummary,
        ArtifactKey::LabelFrequency,
        ArtifactKey::DescriptiveStats,
        ArtifactKey::LabelCorrelation,
        ArtifactKey::FeatureCorrelation,
        ArtifactKey::TopImportances,
        ArtifactKey::TopColumns,
        ArtifactKey::ReducedTrainingHead,
    ];

    /// Key used in the lookup response and as the file stem
    pub fn name(self) -> &'static str {
        match self {
            ArtifactKey::HeadSample => "df_head_10",
            ArtifactKey::SchemaSummary => "df_info",
            ArtifactKey::LabelFrequency => "calss_value_counts",
            ArtifactKey::DescriptiveStats => "df_describe",
            ArtifactKey::LabelCorrelation => "calss_corr_sorted",
            ArtifactKey::FeatureCorrelation => "X_corr_matrix",
            ArtifactKey::TopImportances => "feature_importances_top_20",
            ArtifactKey::TopColumns => "columns_top_10",
            ArtifactKey::ReducedTrainingHead => "X_train_reduced_head_10",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    pub fn shape(self) -> Shape {
        match self {
            ArtifactKey::HeadSample
            | ArtifactKey::DescriptiveStats
            | ArtifactKey::FeatureCorrelation
            | ArtifactKey::ReducedTrainingHead => Shape::Table,
            ArtifactKey::LabelFrequency
            | ArtifactKey::LabelCorrelation
            | ArtifactKey::TopImportances => Shape::KeyedScalar,
            ArtifactKey::SchemaSummary | ArtifactKey::TopColumns => Shape::Plain,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The artifacts produced by one run, keyed by manifest entry
#[derive(Debug, Clone, Default)]
pub struct ArtifactBundle {
    artifacts: BTreeMap<ArtifactKey, Artifact>,
}

impl ArtifactBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact, rejecting it if its shape disagrees with the manifest.
    pub fn insert(&mut self, key: ArtifactKey, artifact: Artifact) -> Result<()> {
        if artifact.shape() != key.shape() {
            return Err(ArtifactError::ShapeMismatch {
                key: key.name(),
                expected: key.shape(),
                actual: artifact.shape(),
            });
        }
        self.artifacts.insert(key, artifact);
        Ok(())
    }

    pub fn get(&self, key: ArtifactKey) -> Option<&Artifact> {
        self.artifacts.get(&key)
    }

    /// Keys of the manifest that have no artifact yet
    pub fn missing(&self) -> Vec<&'static str> {
        ArtifactKey::ALL
            .iter()
            .filter(|key| !self.artifacts.contains_key(key))
            .map(|key| key.name())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.artifacts.len() == ArtifactKey::ALL.len()
    }

    /// Artifacts in manifest order
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKey, &Artifact)> {
        ArtifactKey::ALL
            .iter()
            .filter_map(move |key| self.artifacts.get(key).map(|artifact| (*key, artifact)))
    }
}
