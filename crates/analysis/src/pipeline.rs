//! End-to-end analysis run
//!
//! load → clean → label split → stratified split → forest fit → statistics
//! → importance ranking → staged store commit. Every stage runs to completion
//! before the next starts; the first error aborts the run and nothing is
//! published.

use tracing::{error, info};

use flowscope_artifacts::{ArtifactBundle, ArtifactKey, ArtifactStore, StoreManifest, ToArtifact};

use crate::config::AnalysisConfig;
use crate::dataset::RecordSet;
use crate::errors::Result;
use crate::forest::RandomForestTrainer;
use crate::importance::{ImportanceRanking, ReducedHead};
use crate::split::StratifiedSplitter;
use crate::stats::{
    CorrelationMatrix, DescriptiveStats, HeadSample, LabelCorrelation, LabelFrequency,
    SchemaSummary,
};

/// Counts gathered while computing one bundle
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub rows_kept: usize,
    pub n_features: usize,
    pub n_classes: usize,
    pub n_train: usize,
    pub n_test: usize,
    /// Hold-out accuracy of the forest on the test partition
    pub test_accuracy: f64,
}

/// Result of a published run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub manifest: StoreManifest,
}

pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Compute and publish all nine artifacts
    pub fn run(&self) -> Result<RunReport> {
        let outcome = self.compute().and_then(|(bundle, summary)| {
            let store = ArtifactStore::new(&self.config.output_dir);
            let manifest = store.commit(&bundle)?;
            info!(
                "Published {} artifacts to {}",
                manifest.artifacts.len(),
                store.root().display()
            );
            Ok(RunReport { summary, manifest })
        });

        if let Err(err) = &outcome {
            error!("Analysis failed at {} stage: {}", err.stage(), err);
        }
        outcome
    }

    /// Compute the artifact bundle without touching the store
    pub fn compute(&self) -> Result<(ArtifactBundle, RunSummary)> {
        let config = &self.config;

        info!("Loading records from: {}", config.input_path.display());
        let raw = RecordSet::from_csv(&config.input_path)?;
        let rows_loaded = raw.len();
        info!("Loaded {} rows with {} columns", rows_loaded, raw.columns.len());

        let records = raw.clean()?;
        let (x, y) = records.split_label(&config.label_column)?;
        info!(
            "Label column `{}`: {} feature columns",
            config.label_column,
            x.n_features()
        );

        let split = StratifiedSplitter::new(config.test_fraction, config.seed).split(&x, &y)?;

        let forest = RandomForestTrainer::new(config.forest_config()).fit(&split.x_train, &split.y_train)?;
        let test_accuracy = forest.accuracy(&split.x_test, &split.y_test);
        info!("Hold-out accuracy: {:.4} on {} rows", test_accuracy, split.y_test.len());

        info!("Computing statistics over {} cleaned rows", records.len());
        let frequency = LabelFrequency::of(&y);
        let ranking = ImportanceRanking::rank(forest.feature_names(), forest.feature_importances())?;
        let top_columns = ranking.top_names(config.top_columns);

        let mut bundle = ArtifactBundle::new();
        bundle.insert(
            ArtifactKey::HeadSample,
            HeadSample(records.head(config.head_rows)).to_artifact()?,
        )?;
        bundle.insert(
            ArtifactKey::SchemaSummary,
            SchemaSummary::of(&records, &config.label_column).to_artifact()?,
        )?;
        bundle.insert(ArtifactKey::LabelFrequency, frequency.to_artifact()?)?;
        bundle.insert(ArtifactKey::DescriptiveStats, DescriptiveStats::of(&x).to_artifact()?)?;
        bundle.insert(ArtifactKey::LabelCorrelation, LabelCorrelation::of(&x, &y).to_artifact()?)?;
        bundle.insert(ArtifactKey::FeatureCorrelation, CorrelationMatrix::of(&x).to_artifact()?)?;
        bundle.insert(
            ArtifactKey::TopImportances,
            ranking.top(config.top_importances).to_artifact()?,
        )?;
        let reduced_head = ReducedHead::build(
            &split.x_train,
            &top_columns,
            config.head_rows,
            &records.integral_columns(),
        )?;
        bundle.insert(ArtifactKey::ReducedTrainingHead, reduced_head.to_artifact()?)?;
        bundle.insert(ArtifactKey::TopColumns, top_columns.to_artifact()?)?;

        let summary = RunSummary {
            rows_loaded,
            rows_kept: records.len(),
            n_features: x.n_features(),
            n_classes: frequency.0.len(),
            n_train: split.y_train.len(),
            n_test: split.y_test.len(),
            test_accuracy,
        };
        Ok((bundle, summary))
    }
}
