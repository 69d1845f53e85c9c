//! CSV record set loading and preprocessing
//!
//! Reads a delimited file with a header row into a row-oriented record set,
//! drops incomplete rows, and separates the numeric feature matrix from the
//! categorical label column.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use flowscope_artifacts::Scalar;

use crate::errors::{AnalysisError, Result, Stage};

const MISSING_MARKERS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// One value of the record set
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parse a raw CSV field.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if MISSING_MARKERS.contains(&raw) {
            return Cell::Missing;
        }

        let unsigned = raw.trim_start_matches(['+', '-']);
        if unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity") {
            return if raw.starts_with('-') {
                Cell::Number(f64::NEG_INFINITY)
            } else {
                Cell::Number(f64::INFINITY)
            };
        }

        match raw.parse::<f64>() {
            Ok(value) if value.is_nan() => Cell::Missing,
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Text form used for categorical labels
    pub fn as_label(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            Cell::Number(value) => value.to_string(),
            Cell::Text(text) => text.clone(),
        }
    }

    /// JSON value of the cell; `integral` cells of integer-typed columns
    /// keep their integer form
    pub fn to_scalar(&self, integral: bool) -> Scalar {
        match self {
            Cell::Missing => Scalar::Null,
            Cell::Number(value) if integral && value.fract() == 0.0 => Scalar::Int(*value as i64),
            Cell::Number(value) => Scalar::Float(*value),
            Cell::Text(text) => Scalar::Text(text.clone()),
        }
    }
}

/// Inferred data kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => f.write_str("numeric"),
            ColumnKind::Categorical => f.write_str("categorical"),
        }
    }
}

/// Ordered rows with named columns; each row keeps its original position
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub row_ids: Vec<usize>,
    /// Per column: every loaded field was an integer literal. Fixed at load
    /// time, so cleaning never turns a column integer-typed.
    pub integral: Vec<bool>,
}

impl RecordSet {
    /// Load a record set from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalysisError::InputNotFound(path.to_path_buf()))
            }
            Err(err) => return Err(err.into()),
        };

        Self::from_reader(file)
    }

    /// Load a record set from any CSV byte source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(AnalysisError::EmptyDataset {
                stage: Stage::Load,
                reason: "no header row".to_string(),
            });
        }

        let mut rows = Vec::new();
        let mut integral = vec![true; columns.len()];
        for record in reader.records() {
            let record = record?;
            for (flag, field) in integral.iter_mut().zip(record.iter()) {
                *flag = *flag && field.parse::<i64>().is_ok();
            }
            rows.push(record.iter().map(Cell::parse).collect::<Vec<_>>());
        }

        if rows.is_empty() {
            return Err(AnalysisError::EmptyDataset {
                stage: Stage::Load,
                reason: "no data rows".to_string(),
            });
        }

        let row_ids = (0..rows.len()).collect();
        Ok(Self {
            columns,
            rows,
            row_ids,
            integral,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Numeric when every non-missing value is a number
    pub fn column_kind(&self, column: usize) -> ColumnKind {
        let numeric = self
            .rows
            .iter()
            .map(|row| &row[column])
            .all(|cell| matches!(cell, Cell::Missing | Cell::Number(_)));
        if numeric {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        }
    }

    /// Names of the integer-typed columns
    pub fn integral_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.integral)
            .filter(|(_, &integral)| integral)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn non_missing_count(&self, column: usize) -> usize {
        self.rows.iter().filter(|row| !row[column].is_missing()).count()
    }

    /// First `n` rows with their original positions
    pub fn head(&self, n: usize) -> RecordSet {
        let n = n.min(self.len());
        RecordSet {
            columns: self.columns.clone(),
            rows: self.rows[..n].to_vec(),
            row_ids: self.row_ids[..n].to_vec(),
            integral: self.integral.clone(),
        }
    }

    /// Treat infinities as missing, then drop every row holding a missing
    /// value in any column.
    pub fn clean(self) -> Result<RecordSet> {
        let before = self.len();
        let RecordSet {
            columns,
            rows,
            row_ids,
            integral,
        } = self;

        let (rows, row_ids): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        Cell::Number(value) if value.is_infinite() => Cell::Missing,
                        other => other,
                    })
                    .collect::<Vec<_>>()
            })
            .zip(row_ids)
            .filter(|(row, _)| !row.iter().any(Cell::is_missing))
            .unzip();

        let dropped = before - rows.len();
        if dropped > 0 {
            warn!("Dropped {} of {} rows with missing or infinite values", dropped, before);
        }

        if rows.is_empty() {
            return Err(AnalysisError::EmptyDataset {
                stage: Stage::Preprocess,
                reason: format!("all {} rows held missing or infinite values", before),
            });
        }

        info!("Preprocessing kept {} rows", rows.len());
        Ok(RecordSet {
            columns,
            rows,
            row_ids,
            integral,
        })
    }

    /// Separate the feature matrix from the label column
    pub fn split_label(&self, label: &str) -> Result<(FeatureMatrix, Vec<String>)> {
        let label_idx = self
            .column_index(label)
            .ok_or_else(|| AnalysisError::LabelColumnMissing {
                column: label.to_string(),
                available: self.columns.clone(),
            })?;

        let feature_idx: Vec<usize> = (0..self.columns.len()).filter(|&i| i != label_idx).collect();
        if feature_idx.is_empty() {
            return Err(AnalysisError::EmptyDataset {
                stage: Stage::LabelSplit,
                reason: "no feature columns besides the label".to_string(),
            });
        }

        let mut columns = Vec::with_capacity(feature_idx.len());
        for &idx in &feature_idx {
            let values = self
                .rows
                .iter()
                .map(|row| row[idx].as_number())
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| AnalysisError::NonNumericFeature(self.columns[idx].clone()))?;
            columns.push(values);
        }

        let names = feature_idx.iter().map(|&i| self.columns[i].clone()).collect();
        let labels = self.rows.iter().map(|row| row[label_idx].as_label()).collect();

        Ok((
            FeatureMatrix {
                names,
                columns,
                row_ids: self.row_ids.clone(),
            },
            labels,
        ))
    }
}

/// Column-major numeric features in canonical column order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub columns: Vec<Vec<f64>>,
    pub row_ids: Vec<usize>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.columns[feature][row]
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|column| column[row]).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Rows at the given positions, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| rows.iter().map(|&r| column[r]).collect())
                .collect(),
            row_ids: rows.iter().map(|&r| self.row_ids[r]).collect(),
        }
    }

    /// Named columns in the given order; `None` if a name is unknown
    pub fn select_columns(&self, names: &[String]) -> Option<FeatureMatrix> {
        let columns = names
            .iter()
            .map(|name| self.column_index(name).map(|idx| self.columns[idx].clone()))
            .collect::<Option<Vec<_>>>()?;
        Some(FeatureMatrix {
            names: names.to_vec(),
            columns,
            row_ids: self.row_ids.clone(),
        })
    }

    pub fn head(&self, n: usize) -> FeatureMatrix {
        let n = n.min(self.n_rows());
        self.select_rows(&(0..n).collect::<Vec<_>>())
    }
}

/// Stable mapping from label value to integer category code
///
/// Codes follow sorted order of the distinct labels: numeric order when
/// every label is a number, lexical order otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> Self {
        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();

        let numeric: Option<Vec<f64>> = classes.iter().map(|c| c.parse::<f64>().ok()).collect();
        if let Some(values) = numeric {
            let mut pairs: Vec<(f64, String)> = values.into_iter().zip(classes).collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            classes = pairs.into_iter().map(|(_, class)| class).collect();
        }

        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == label)
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    /// Codes for the labels seen at fit time; unknown labels are skipped.
    pub fn transform(&self, labels: &[String]) -> Vec<usize> {
        labels.iter().filter_map(|label| self.encode(label)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(text: &str) -> RecordSet {
        RecordSet::from_reader(text.as_bytes()).expect("valid csv")
    }

    #[test]
    fn parse_cells() {
        assert_eq!(Cell::parse("1.5"), Cell::Number(1.5));
        assert_eq!(Cell::parse(" 7 "), Cell::Number(7.0));
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse("NaN"), Cell::Missing);
        assert_eq!(Cell::parse("inf"), Cell::Number(f64::INFINITY));
        assert_eq!(Cell::parse("-Infinity"), Cell::Number(f64::NEG_INFINITY));
        assert_eq!(Cell::parse("benign"), Cell::Text("benign".into()));
    }

    #[test]
    fn test_load_csv() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a,b,calss")?;
        writeln!(file, "1,2,benign")?;
        writeln!(file, "3,4,adware")?;
        file.flush()?;

        let records = RecordSet::from_csv(file.path())?;
        assert_eq!(records.columns, vec!["a", "b", "calss"]);
        assert_eq!(records.len(), 2);
        assert_eq!(records.rows[1][2], Cell::Text("adware".into()));
        assert_eq!(records.row_ids, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn missing_file_is_input_not_found() {
        let err = RecordSet::from_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, AnalysisError::InputNotFound(_)));
    }

    #[test]
    fn integer_columns_are_tracked_from_load() -> Result<()> {
        let records = load("a,b,c,calss\n1,2.5,3,0\n4,5,,1\n");
        assert_eq!(records.integral, vec![true, false, false, true]);

        // the missing field keeps `c` float-typed after cleaning
        let cleaned = records.clean()?;
        assert_eq!(cleaned.integral_columns(), vec!["a", "calss"]);
        assert_eq!(cleaned.rows[0][0].to_scalar(true), Scalar::Int(1));
        assert_eq!(cleaned.rows[0][2].to_scalar(false), Scalar::Float(3.0));
        Ok(())
    }

    #[test]
    fn header_only_file_is_empty() {
        let err = RecordSet::from_reader("a,b,calss\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDataset { stage: Stage::Load, .. }));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = RecordSet::from_reader("a,b\n1,2\n3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AnalysisError::Csv(_)));
    }

    #[test]
    fn clean_drops_rows_with_any_missing_value() -> Result<()> {
        let records = load("a,b,calss\n1,2,x\n,2,x\ninf,1,y\n4,5,\n6,7,y\n");
        let cleaned = records.clean()?;

        assert_eq!(cleaned.row_ids, vec![0, 4]);
        assert_eq!(cleaned.rows[0], vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Text("x".into())]);
        assert_eq!(cleaned.rows[1], vec![Cell::Number(6.0), Cell::Number(7.0), Cell::Text("y".into())]);
        Ok(())
    }

    #[test]
    fn clean_fails_when_nothing_survives() {
        let records = load("a,calss\n,x\n-inf,y\n");
        let err = records.clean().unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDataset { stage: Stage::Preprocess, .. }));
    }

    #[test]
    fn split_label_by_name() -> Result<()> {
        let records = load("a,calss,b\n1,x,2\n3,y,4\n");
        let (features, labels) = records.split_label("calss")?;

        assert_eq!(features.names, vec!["a", "b"]);
        assert_eq!(features.columns, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
        assert_eq!(labels, vec!["x", "y"]);
        Ok(())
    }

    #[test]
    fn split_label_reports_missing_column() {
        let records = load("a,b\n1,2\n");
        let err = records.split_label("calss").unwrap_err();
        assert!(matches!(err, AnalysisError::LabelColumnMissing { ref column, .. } if column == "calss"));
    }

    #[test]
    fn split_label_rejects_text_features() {
        let records = load("a,proto,calss\n1,tcp,x\n");
        let err = records.split_label("calss").unwrap_err();
        assert!(matches!(err, AnalysisError::NonNumericFeature(ref name) if name == "proto"));
    }

    #[test]
    fn column_kinds() {
        let records = load("a,calss\n1,x\n,y\n");
        assert_eq!(records.column_kind(0), ColumnKind::Numeric);
        assert_eq!(records.column_kind(1), ColumnKind::Categorical);
        assert_eq!(records.non_missing_count(0), 1);
    }

    #[test]
    fn select_columns_keeps_requested_order() {
        let records = load("a,b,c,calss\n1,2,3,x\n4,5,6,y\n");
        let (features, _) = records.split_label("calss").unwrap();
        let picked = features
            .select_columns(&["c".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(picked.columns, vec![vec![3.0, 6.0], vec![1.0, 4.0]]);
        assert!(features.select_columns(&["zzz".to_string()]).is_none());
    }

    #[test]
    fn label_encoder_sorts_classes() {
        let labels: Vec<String> = ["scareware", "benign", "adware", "benign"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let encoder = LabelEncoder::fit(&labels);
        assert_eq!(encoder.classes(), ["adware", "benign", "scareware"]);
        assert_eq!(encoder.transform(&labels), vec![2, 1, 0, 1]);
        assert_eq!(encoder.decode(1), Some("benign"));
    }

    #[test]
    fn label_encoder_orders_numeric_labels_numerically() {
        let labels: Vec<String> = ["10", "2", "1"].iter().map(|s| s.to_string()).collect();
        let encoder = LabelEncoder::fit(&labels);
        assert_eq!(encoder.classes(), ["1", "2", "10"]);
    }
}
