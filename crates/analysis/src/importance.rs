//! Feature importance ranking and reduced-feature training sample

use flowscope_artifacts::{
    Artifact, IndexLabel, KeyedScalar, Result as ArtifactResult, Scalar, Table, ToArtifact,
};

use crate::dataset::FeatureMatrix;
use crate::errors::{AnalysisError, Result};
use crate::stats::descending_nan_last;

/// Features ordered by descending importance; ties keep column order
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceRanking {
    entries: Vec<(String, f64)>,
}

impl ImportanceRanking {
    pub fn rank(names: &[String], importances: &[f64]) -> Result<Self> {
        if names.len() != importances.len() {
            return Err(AnalysisError::TrainingFailure(format!(
                "{} importances for {} feature columns",
                importances.len(),
                names.len()
            )));
        }

        let mut entries: Vec<(String, f64)> = names.iter().cloned().zip(importances.iter().copied()).collect();
        entries.sort_by(|a, b| descending_nan_last(a.1, b.1));
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    /// Leading `k` entries (all of them when fewer exist)
    pub fn top(&self, k: usize) -> TopImportances {
        TopImportances(self.entries[..k.min(self.entries.len())].to_vec())
    }

    pub fn top_names(&self, k: usize) -> TopColumns {
        TopColumns(
            self.entries
                .iter()
                .take(k)
                .map(|(name, _)| name.clone())
                .collect(),
        )
    }
}

/// Highest-ranked feature→importance entries
#[derive(Debug, Clone, PartialEq)]
pub struct TopImportances(pub Vec<(String, f64)>);

impl ToArtifact for TopImportances {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        Ok(KeyedScalar::new(
            self.0
                .iter()
                .map(|(name, value)| (name.clone(), Scalar::Float(*value)))
                .collect(),
        )
        .into())
    }
}

/// Names of the highest-ranked features, in rank order
#[derive(Debug, Clone, PartialEq)]
pub struct TopColumns(pub Vec<String>);

impl ToArtifact for TopColumns {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        Ok(Artifact::list(self.0.clone()))
    }
}

/// First rows of the training partition restricted to the top columns
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedHead {
    pub matrix: FeatureMatrix,
    /// Per selected column: published as integers
    pub integral: Vec<bool>,
}

impl ReducedHead {
    /// `integral_columns` names the integer-typed columns of the loaded data
    pub fn build(
        x_train: &FeatureMatrix,
        columns: &TopColumns,
        rows: usize,
        integral_columns: &[String],
    ) -> Result<Self> {
        let matrix = x_train.head(rows).select_columns(&columns.0).ok_or_else(|| {
            AnalysisError::TrainingFailure(format!(
                "top columns {:?} are not all training columns",
                columns.0
            ))
        })?;
        let integral = matrix
            .names
            .iter()
            .map(|name| integral_columns.contains(name))
            .collect();
        Ok(Self { matrix, integral })
    }
}

impl ToArtifact for ReducedHead {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        let x = &self.matrix;
        let table = Table::new(
            x.names.clone(),
            x.row_ids.iter().map(|&id| IndexLabel::from(id)).collect(),
            (0..x.n_rows())
                .map(|r| {
                    x.row(r)
                        .into_iter()
                        .zip(&self.integral)
                        .map(|(value, &integral)| {
                            if integral && value.fract() == 0.0 {
                                Scalar::Int(value as i64)
                            } else {
                                Scalar::Float(value)
                            }
                        })
                        .collect()
                })
                .collect(),
        )?;
        Ok(table.into())
    }
}
