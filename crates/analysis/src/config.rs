//! Analysis run configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then
//! `FLOWSCOPE_*` environment variables, then command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::errors::{AnalysisError, Result};
use crate::forest::ForestConfig;

/// Parameters of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Delimited input file with a header row
    pub input_path: PathBuf,
    /// Results directory written by the store
    pub output_dir: PathBuf,
    /// Name of the categorical label column
    pub label_column: String,
    /// Fraction of rows held out for testing
    pub test_fraction: f64,
    /// Trees in the forest
    pub n_trees: usize,
    /// Entries kept in the importance ranking artifact
    pub top_importances: usize,
    /// Feature names kept for the reduced training sample
    pub top_columns: usize,
    /// Rows in the head samples
    pub head_rows: usize,
    /// Seed for the split and every tree
    pub seed: u64,
    /// Tree fitting threads, 0 = all cores
    pub n_jobs: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("TotalFeatures-ISCXFlowMeter.csv"),
            output_dir: PathBuf::from("api/results"),
            label_column: "calss".to_string(),
            test_fraction: 0.3,
            n_trees: 100,
            top_importances: 20,
            top_columns: 10,
            head_rows: 10,
            seed: 42,
            n_jobs: 0,
        }
    }
}

impl AnalysisConfig {
    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AnalysisError::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::InvalidConfig(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `FLOWSCOPE_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("FLOWSCOPE_INPUT") {
            self.input_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("FLOWSCOPE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("FLOWSCOPE_LABEL_COLUMN") {
            self.label_column = val;
        }
        if let Some(val) = lookup("FLOWSCOPE_SEED") {
            self.seed = parse_override("FLOWSCOPE_SEED", &val)?;
        }
        if let Some(val) = lookup("FLOWSCOPE_TREES") {
            self.n_trees = parse_override("FLOWSCOPE_TREES", &val)?;
        }
        if let Some(val) = lookup("FLOWSCOPE_JOBS") {
            self.n_jobs = parse_override("FLOWSCOPE_JOBS", &val)?;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            problems.push(format!("test_fraction must be in (0, 1), got {}", self.test_fraction));
        }
        if self.n_trees == 0 {
            problems.push("n_trees must be at least 1".to_string());
        }
        if self.top_importances == 0 || self.top_columns == 0 || self.head_rows == 0 {
            problems.push("top_importances, top_columns and head_rows must be at least 1".to_string());
        }
        if self.top_columns > self.top_importances {
            problems.push(format!(
                "top_columns ({}) cannot exceed top_importances ({})",
                self.top_columns, self.top_importances
            ));
        }
        if self.label_column.trim().is_empty() {
            problems.push("label_column must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::InvalidConfig(problems.join("; ")))
        }
    }

    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_trees,
            seed: self.seed,
            n_jobs: self.n_jobs,
            ..ForestConfig::default()
        }
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AnalysisError::InvalidConfig(format!("{} has invalid value `{}`", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_trees, 100);
        assert_eq!(config.test_fraction, 0.3);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn toml_overrides_only_given_keys() -> Result<()> {
        let config = AnalysisConfig::from_toml_str(
            r#"
            input_path = "data/flows.csv"
            label_column = "class"
            n_trees = 25
            "#,
        )?;
        assert_eq!(config.input_path, PathBuf::from("data/flows.csv"));
        assert_eq!(config.label_column, "class");
        assert_eq!(config.n_trees, 25);
        assert_eq!(config.top_importances, 20);
        Ok(())
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let err = AnalysisConfig::from_toml_str("n_tress = 5").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn env_overrides_apply() -> Result<()> {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FLOWSCOPE_SEED", "7"),
            ("FLOWSCOPE_TREES", "12"),
            ("FLOWSCOPE_LABEL_COLUMN", "Label"),
        ]);
        let mut config = AnalysisConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()))?;

        assert_eq!(config.seed, 7);
        assert_eq!(config.n_trees, 12);
        assert_eq!(config.label_column, "Label");
        assert_eq!(config.output_dir, PathBuf::from("api/results"));
        Ok(())
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = AnalysisConfig::default();
        let err = config
            .apply_overrides(|key| (key == "FLOWSCOPE_TREES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let config = AnalysisConfig {
            test_fraction: 1.0,
            n_trees: 0,
            top_columns: 30,
            ..AnalysisConfig::default()
        };
        match config.validate() {
            Err(AnalysisError::InvalidConfig(message)) => {
                assert!(message.contains("test_fraction"));
                assert!(message.contains("n_trees"));
                assert!(message.contains("top_columns"));
            }
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }
}
