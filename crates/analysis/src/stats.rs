//! Read-only descriptive statistics over the cleaned record set

use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

use flowscope_artifacts::{
    Artifact, IndexLabel, KeyedScalar, Result as ArtifactResult, Scalar, Table, ToArtifact,
};

use crate::dataset::{ColumnKind, FeatureMatrix, LabelEncoder, RecordSet};

/// Row labels of the descriptive statistics table
pub const DESCRIBE_ROWS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

/// First rows of the record set, verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct HeadSample(pub RecordSet);

impl ToArtifact for HeadSample {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        let records = &self.0;
        let table = Table::new(
            records.columns.clone(),
            records.row_ids.iter().map(|&id| IndexLabel::from(id)).collect(),
            records
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .zip(&records.integral)
                        .map(|(cell, &integral)| cell.to_scalar(integral))
                        .collect()
                })
                .collect(),
        )?;
        Ok(table.into())
    }
}

/// Per-column facts rendered as one text block
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSummary {
    pub rows: usize,
    pub first_id: Option<usize>,
    pub last_id: Option<usize>,
    pub columns: Vec<(String, usize, ColumnKind)>,
}

impl SchemaSummary {
    /// Summarize `records`; the `label` column is always categorical
    pub fn of(records: &RecordSet, label: &str) -> Self {
        let columns = records
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let kind = if name == label {
                    ColumnKind::Categorical
                } else {
                    records.column_kind(idx)
                };
                (name.clone(), records.non_missing_count(idx), kind)
            })
            .collect();

        Self {
            rows: records.len(),
            first_id: records.row_ids.first().copied(),
            last_id: records.row_ids.last().copied(),
            columns,
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SchemaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RecordSet")?;
        match (self.first_id, self.last_id) {
            (Some(first), Some(last)) => {
                writeln!(f, "Index: {} entries, {} to {}", self.rows, first, last)?
            }
            _ => writeln!(f, "Index: 0 entries")?,
        }
        writeln!(f, "Data columns (total {} columns):", self.columns.len())?;

        let name_width = self
            .columns
            .iter()
            .map(|(name, _, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("Column".len());
        let count_width = self
            .columns
            .iter()
            .map(|(_, count, _)| format!("{} non-null", count).len())
            .max()
            .unwrap_or(0)
            .max("Non-Null Count".len());

        writeln!(
            f,
            " {:<3}  {:<name_width$}  {:<count_width$}  Kind",
            "#", "Column", "Non-Null Count"
        )?;
        writeln!(
            f,
            " {:<3}  {:<name_width$}  {:<count_width$}  ----",
            "---",
            "-".repeat("Column".len()),
            "-".repeat("Non-Null Count".len())
        )?;
        for (idx, (name, count, kind)) in self.columns.iter().enumerate() {
            writeln!(
                f,
                " {:<3}  {:<name_width$}  {:<count_width$}  {}",
                idx,
                name,
                format!("{} non-null", count),
                kind
            )?;
        }

        let numeric = self
            .columns
            .iter()
            .filter(|(_, _, kind)| *kind == ColumnKind::Numeric)
            .count();
        let categorical = self.columns.len() - numeric;
        writeln!(f, "kinds: numeric({}), categorical({})", numeric, categorical)
    }
}

impl ToArtifact for SchemaSummary {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        Ok(Artifact::text(self.render()))
    }
}

/// Rows per label, descending count, first-seen order on ties
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFrequency(pub Vec<(String, usize)>);

impl LabelFrequency {
    pub fn of(labels: &[String]) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for label in labels {
            match counts.iter_mut().find(|(l, _)| l == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label.clone(), 1)),
            }
        }
        // stable sort keeps first-seen order among equal counts
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Self(counts)
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, count)| count).sum()
    }
}

impl ToArtifact for LabelFrequency {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        Ok(KeyedScalar::new(
            self.0
                .iter()
                .map(|(label, count)| (label.clone(), Scalar::from(*count)))
                .collect(),
        )
        .into())
    }
}

/// count / mean / std / min / quartiles / max per feature column
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    pub columns: Vec<String>,
    /// `values[stat][column]`, stats in [`DESCRIBE_ROWS`] order
    pub values: Vec<Vec<f64>>,
}

impl DescriptiveStats {
    pub fn of(x: &FeatureMatrix) -> Self {
        let mut values = vec![Vec::with_capacity(x.n_features()); DESCRIBE_ROWS.len()];

        for column in &x.columns {
            let mut sorted = column.clone();
            sorted.sort_by(f64::total_cmp);

            let stats = [
                column.len() as f64,
                mean(column),
                sample_std(column),
                sorted.first().copied().unwrap_or(f64::NAN),
                percentile(&sorted, 0.25),
                percentile(&sorted, 0.50),
                percentile(&sorted, 0.75),
                sorted.last().copied().unwrap_or(f64::NAN),
            ];
            for (row, value) in values.iter_mut().zip(stats) {
                row.push(value);
            }
        }

        Self {
            columns: x.names.clone(),
            values,
        }
    }

    pub fn get(&self, stat: &str, column: &str) -> Option<f64> {
        let row = DESCRIBE_ROWS.iter().position(|s| *s == stat)?;
        let col = self.columns.iter().position(|c| c == column)?;
        Some(self.values[row][col])
    }
}

impl ToArtifact for DescriptiveStats {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        let table = Table::new(
            self.columns.clone(),
            DESCRIBE_ROWS.iter().map(|&s| IndexLabel::from(s)).collect(),
            self.values
                .iter()
                .map(|row| row.iter().map(|&v| Scalar::Float(v)).collect())
                .collect(),
        )?;
        Ok(table.into())
    }
}

/// Pearson correlation of each feature with the encoded label, descending
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCorrelation(pub Vec<(String, f64)>);

impl LabelCorrelation {
    pub fn of(x: &FeatureMatrix, labels: &[String]) -> Self {
        let encoder = LabelEncoder::fit(labels);
        let codes: Vec<f64> = encoder.transform(labels).into_iter().map(|c| c as f64).collect();

        let mut ranking: Vec<(String, f64)> = x
            .names
            .iter()
            .zip(&x.columns)
            .map(|(name, column)| (name.clone(), pearson(column, &codes)))
            .collect();

        let undefined = ranking.iter().filter(|(_, r)| r.is_nan()).count();
        if undefined > 0 {
            warn!("{} features have an undefined label correlation", undefined);
        }

        ranking.sort_by(|a, b| descending_nan_last(a.1, b.1));
        Self(ranking)
    }
}

impl ToArtifact for LabelCorrelation {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        Ok(KeyedScalar::new(
            self.0
                .iter()
                .map(|(name, r)| (name.clone(), Scalar::Float(*r)))
                .collect(),
        )
        .into())
    }
}

/// Pairwise Pearson correlation between feature columns
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn of(x: &FeatureMatrix) -> Self {
        let n = x.n_features();
        let mut values = vec![vec![0.0; n]; n];

        for i in 0..n {
            values[i][i] = 1.0;
            for j in (i + 1)..n {
                let r = pearson(&x.columns[i], &x.columns[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        Self {
            names: x.names.clone(),
            values,
        }
    }
}

impl ToArtifact for CorrelationMatrix {
    fn to_artifact(&self) -> ArtifactResult<Artifact> {
        let table = Table::new(
            self.names.clone(),
            self.names.iter().map(|n| IndexLabel::from(n.as_str())).collect(),
            self.values
                .iter()
                .map(|row| row.iter().map(|&v| Scalar::Float(v)).collect())
                .collect(),
        )?;
        Ok(table.into())
    }
}

/// Descending order with NaN sorted last
pub fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `n - 1` degrees of freedom
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Linear-interpolated percentile of ascending sorted values
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Pearson correlation coefficient; NaN when either side has zero variance
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    let (mx, my) = (mean(x), mean(y));

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}
