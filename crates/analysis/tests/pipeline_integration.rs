//! End-to-end tests for the analysis pipeline
//!
//! Runs the full pipeline on a synthetic three-class flow dataset and checks
//! the published artifacts through the lookup contract.

use anyhow::Result;
use flowscope_analysis::{AnalysisConfig, AnalysisError, AnalysisPipeline, Stage};
use flowscope_artifacts::{read_all, ArtifactKey, ArtifactStore};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

const FEATURES: [&str; 12] = [
    "duration",
    "total_fpackets",
    "total_bpackets",
    "total_fpktl",
    "total_bpktl",
    "min_fpktl",
    "max_fpktl",
    "mean_fiat",
    "std_fiat",
    "fpsh_cnt",
    "furg_cnt",
    "fin_cnt",
];
const CLASSES: [&str; 3] = ["benign", "adware", "scareware"];
const ROWS: usize = 96;
/// Rows carrying a missing or infinite value
const DIRTY: [usize; 3] = [5, 17, 40];

/// Cell text of feature `j` for data row `i`
fn cell(i: usize, j: usize) -> String {
    let class = i % 3;
    if i == 5 && j == 3 {
        return String::new();
    }
    if i == 17 && j == 8 {
        return "inf".to_string();
    }
    if i == 40 && j == 0 {
        return "NaN".to_string();
    }
    let value = match j % 3 {
        0 => class * 50 + (i * (j + 1)) % 7,
        1 => (i * (j + 5)) % 23,
        _ => class * (j + 1) + i % 4,
    };
    if j == 7 {
        format!("{}.5", value)
    } else {
        value.to_string()
    }
}

fn write_flows() -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{},calss", FEATURES.join(","))?;
    for i in 0..ROWS {
        let cells: Vec<String> = (0..FEATURES.len()).map(|j| cell(i, j)).collect();
        writeln!(file, "{},{}", cells.join(","), CLASSES[i % 3])?;
    }
    file.flush()?;
    Ok(file)
}

fn config(input: &Path, output: &Path) -> AnalysisConfig {
    AnalysisConfig {
        input_path: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        n_trees: 20,
        n_jobs: 2,
        seed: 7,
        ..AnalysisConfig::default()
    }
}

fn object<'a>(response: &'a Map<String, Value>, key: &str) -> &'a Map<String, Value> {
    response[key]
        .as_object()
        .unwrap_or_else(|| panic!("{key} is not an object"))
}

fn array<'a>(value: &'a Value, field: &str) -> &'a Vec<Value> {
    value[field]
        .as_array()
        .unwrap_or_else(|| panic!("{field} is not an array"))
}

#[test]
fn test_run_publishes_all_artifacts() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    let output = dir.path().join("results");

    let report = AnalysisPipeline::new(config(input.path(), &output))?.run()?;
    assert_eq!(report.summary.rows_loaded, ROWS);
    assert_eq!(report.summary.rows_kept, ROWS - DIRTY.len());
    assert_eq!(report.summary.n_features, FEATURES.len());
    assert_eq!(report.summary.n_classes, 3);
    assert_eq!(report.summary.n_train + report.summary.n_test, ROWS - DIRTY.len());
    assert_eq!(report.manifest.artifacts.len(), 9);

    let response = read_all(&output)?;
    let keys: Vec<&str> = response.keys().map(String::as_str).collect();
    let expected: Vec<&str> = ArtifactKey::ALL.iter().map(|key| key.name()).collect();
    assert_eq!(keys, expected);

    assert!(ArtifactStore::new(&output).verify()?.is_empty());
    Ok(())
}

#[test]
fn test_label_frequency_sums_to_cleaned_rows() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    AnalysisPipeline::new(config(input.path(), dir.path()))?.run()?;

    let response = read_all(dir.path())?;
    let counts = object(&response, "calss_value_counts");
    assert_eq!(counts.len(), 3);

    let total: u64 = counts.values().filter_map(Value::as_u64).sum();
    assert_eq!(total as usize, ROWS - DIRTY.len());

    let ordered: Vec<u64> = counts.values().filter_map(Value::as_u64).collect();
    assert!(ordered.windows(2).all(|pair| pair[0] >= pair[1]));
    Ok(())
}

#[test]
fn test_head_sample_skips_dropped_rows() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    AnalysisPipeline::new(config(input.path(), dir.path()))?.run()?;

    let response = read_all(dir.path())?;
    let head = &response["df_head_10"];
    let index: Vec<u64> = array(head, "index").iter().filter_map(Value::as_u64).collect();
    assert_eq!(index, vec![0, 1, 2, 3, 4, 6, 7, 8, 9, 10]);
    assert_eq!(array(head, "columns").len(), FEATURES.len() + 1);
    assert_eq!(head["data"][0][FEATURES.len()], Value::from("benign"));

    let schema = response["df_info"].as_str().unwrap_or_default();
    assert!(schema.contains("93 entries"));
    assert!(schema.contains("calss"));
    Ok(())
}

#[test]
fn test_integer_columns_publish_integers() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    AnalysisPipeline::new(config(input.path(), dir.path()))?.run()?;

    // columns 0, 3 and 8 held a defect and column 7 is fractional
    let float_typed = ["duration", "total_fpktl", "mean_fiat", "std_fiat"];

    let text = fs::read_to_string(dir.path().join("df_head_10.json"))?;
    let head: Value = serde_json::from_str(&text)?;
    for (j, name) in FEATURES.iter().enumerate() {
        let value = &head["data"][1][j];
        if float_typed.contains(name) {
            assert!(value.is_f64(), "{name} should be float, got {value}");
        } else {
            assert!(value.is_u64(), "{name} should be integer, got {value}");
        }
    }

    let response = read_all(dir.path())?;
    let reduced = &response["X_train_reduced_head_10"];
    for (col, name) in array(reduced, "columns").iter().filter_map(Value::as_str).enumerate() {
        let value = &reduced["data"][0][col];
        assert_eq!(value.is_u64(), !float_typed.contains(&name), "{name}: {value}");
    }
    Ok(())
}

#[test]
fn test_importances_and_top_columns() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    AnalysisPipeline::new(config(input.path(), dir.path()))?.run()?;

    let response = read_all(dir.path())?;
    let top20 = object(&response, "feature_importances_top_20");
    // fewer features than the top-k: every feature is ranked
    assert_eq!(top20.len(), FEATURES.len());

    let values: Vec<f64> = top20.values().filter_map(Value::as_f64).collect();
    assert!(values.iter().all(|&v| v >= 0.0));
    assert!(values.windows(2).all(|pair| pair[0] >= pair[1]));
    assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-9);

    let top10: Vec<&str> = response["columns_top_10"]
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let prefix: Vec<&str> = top20.keys().take(10).map(String::as_str).collect();
    assert_eq!(top10, prefix);
    Ok(())
}

#[test]
fn test_reduced_head_matches_training_cells() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    AnalysisPipeline::new(config(input.path(), dir.path()))?.run()?;

    let response = read_all(dir.path())?;
    let reduced = &response["X_train_reduced_head_10"];
    let columns: Vec<&str> = array(reduced, "columns").iter().filter_map(Value::as_str).collect();
    let expected: Vec<&str> = response["columns_top_10"]
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    assert_eq!(columns, expected);

    let index: Vec<usize> = array(reduced, "index")
        .iter()
        .filter_map(Value::as_u64)
        .map(|id| id as usize)
        .collect();
    assert_eq!(index.len(), 10);
    assert!(index.iter().all(|id| !DIRTY.contains(id)));

    for (row, &id) in index.iter().enumerate() {
        for (col, name) in columns.iter().enumerate() {
            let j = FEATURES.iter().position(|f| f == name).unwrap();
            let expected: f64 = cell(id, j).parse()?;
            assert_eq!(reduced["data"][row][col].as_f64(), Some(expected), "row {id} column {name}");
        }
    }
    Ok(())
}

#[test]
fn test_correlation_matrix_is_symmetric() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    AnalysisPipeline::new(config(input.path(), dir.path()))?.run()?;

    let response = read_all(dir.path())?;
    let matrix = &response["X_corr_matrix"];
    let n = array(matrix, "columns").len();
    assert_eq!(n, FEATURES.len());
    assert_eq!(array(matrix, "index").len(), n);

    let data = &matrix["data"];
    for i in 0..n {
        assert_eq!(data[i][i].as_f64(), Some(1.0));
        for j in 0..n {
            assert_eq!(data[i][j], data[j][i], "entry ({i}, {j})");
        }
    }

    let describe = &response["df_describe"];
    let stats: Vec<&str> = array(describe, "index").iter().filter_map(Value::as_str).collect();
    assert_eq!(stats, vec!["count", "mean", "std", "min", "25%", "50%", "75%", "max"]);
    assert_eq!(describe["data"][0][0].as_f64(), Some((ROWS - DIRTY.len()) as f64));
    Ok(())
}

#[test]
fn test_runs_are_byte_identical() -> Result<()> {
    let input = write_flows()?;
    let first = tempdir()?;
    let second = tempdir()?;

    AnalysisPipeline::new(config(input.path(), first.path()))?.run()?;
    AnalysisPipeline::new(AnalysisConfig {
        n_jobs: 1,
        ..config(input.path(), second.path())
    })?
    .run()?;

    for key in ArtifactKey::ALL {
        let a = fs::read(first.path().join(key.file_name()))?;
        let b = fs::read(second.path().join(key.file_name()))?;
        assert_eq!(a, b, "{} differs between runs", key.file_name());
    }
    Ok(())
}

#[test]
fn test_missing_input_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("results");
    let err = AnalysisPipeline::new(config(&dir.path().join("absent.csv"), &output))?
        .run()
        .unwrap_err();

    assert!(matches!(err, AnalysisError::InputNotFound(_)));
    assert_eq!(err.stage(), Stage::Load);
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_missing_label_column_writes_nothing() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    let pipeline = AnalysisPipeline::new(AnalysisConfig {
        label_column: "Label".to_string(),
        ..config(input.path(), dir.path())
    })?;

    match pipeline.run() {
        Err(AnalysisError::LabelColumnMissing { column, available }) => {
            assert_eq!(column, "Label");
            assert!(available.contains(&"calss".to_string()));
        }
        other => panic!("expected LabelColumnMissing, got {other:?}"),
    }
    assert!(fs::read_dir(dir.path())?.next().is_none());
    Ok(())
}

#[test]
fn test_failed_run_keeps_previous_generation() -> Result<()> {
    let input = write_flows()?;
    let dir = tempdir()?;
    AnalysisPipeline::new(config(input.path(), dir.path()))?.run()?;
    let before = fs::read(dir.path().join("df_describe.json"))?;

    let mut empty = NamedTempFile::new()?;
    writeln!(empty, "{},calss", FEATURES.join(","))?;
    empty.flush()?;
    let err = AnalysisPipeline::new(config(empty.path(), dir.path()))?
        .run()
        .unwrap_err();

    assert!(matches!(err, AnalysisError::EmptyDataset { stage: Stage::Load, .. }));
    assert_eq!(fs::read(dir.path().join("df_describe.json"))?, before);
    assert!(ArtifactStore::new(dir.path()).verify()?.is_empty());
    Ok(())
}
