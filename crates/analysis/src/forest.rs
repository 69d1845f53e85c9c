//! Random forest classifier trainer
//!
//! Fits independent CART trees on bootstrap draws of the training rows.
//! Each tree gets its own RNG stream derived from the run seed and its
//! index, so trees may be fitted in parallel on a rayon pool without
//! changing the result.

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cart::{CartBuilder, Tree, TreeConfig};
use crate::dataset::{FeatureMatrix, LabelEncoder};
use crate::deterministic::stream_rng;
use crate::errors::{AnalysisError, Result};

/// Random forest training configuration
#[derive(Clone, Debug)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per node; `None` uses `floor(sqrt(n_features))`
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    /// Worker threads for tree fitting; 0 uses every core
    pub n_jobs: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            n_jobs: 0,
        }
    }
}

/// Fitted ensemble
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Tree>,
    importances: Vec<f64>,
    encoder: LabelEncoder,
    feature_names: Vec<String>,
}

impl RandomForest {
    /// Mean decrease in impurity per feature, canonical column order, sums to 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn classes(&self) -> &[String] {
        self.encoder.classes()
    }

    /// Majority vote over trees; ties go to the lowest class code
    pub fn predict(&self, x: &FeatureMatrix) -> Vec<String> {
        let n_classes = self.encoder.n_classes();
        (0..x.n_rows())
            .map(|r| {
                let row = x.row(r);
                let mut votes = vec![0usize; n_classes];
                for tree in &self.trees {
                    votes[tree.predict(&row)] += 1;
                }
                let winner = votes
                    .iter()
                    .enumerate()
                    .fold((0, 0), |best, (class, &v)| if v > best.1 { (class, v) } else { best })
                    .0;
                self.encoder.decode(winner).unwrap_or_default().to_string()
            })
            .collect()
    }

    /// Fraction of rows whose prediction matches the label
    pub fn accuracy(&self, x: &FeatureMatrix, y: &[String]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let correct = self
            .predict(x)
            .iter()
            .zip(y)
            .filter(|(predicted, actual)| predicted == actual)
            .count();
        correct as f64 / y.len() as f64
    }
}

/// Random forest trainer
pub struct RandomForestTrainer {
    config: ForestConfig,
}

impl RandomForestTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    /// Train a forest on the given training partition
    pub fn fit(&self, x: &FeatureMatrix, y: &[String]) -> Result<RandomForest> {
        let n_samples = x.n_rows();
        let n_features = x.n_features();

        if n_samples == 0 || y.is_empty() {
            return Err(AnalysisError::TrainingFailure("training set is empty".to_string()));
        }
        if n_samples != y.len() {
            return Err(AnalysisError::TrainingFailure(format!(
                "{} feature rows for {} labels",
                n_samples,
                y.len()
            )));
        }
        if self.config.n_trees == 0 {
            return Err(AnalysisError::TrainingFailure("tree count is zero".to_string()));
        }

        let encoder = LabelEncoder::fit(y);
        if encoder.n_classes() < 2 {
            return Err(AnalysisError::TrainingFailure(format!(
                "need at least two distinct labels, found {:?}",
                encoder.classes()
            )));
        }
        let codes = encoder.transform(y);

        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self
                .config
                .max_features
                .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
                .clamp(1, n_features.max(1)),
        };

        info!(
            "Training {} trees on {} samples, {} features, {} classes (max_features={})",
            self.config.n_trees,
            n_samples,
            n_features,
            encoder.n_classes(),
            tree_config.max_features
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_jobs)
            .build()
            .map_err(|err| AnalysisError::TrainingFailure(format!("thread pool: {}", err)))?;

        let fitted: Vec<(Tree, Vec<f64>)> = pool.install(|| {
            (0..self.config.n_trees)
                .into_par_iter()
                .map(|tree_idx| self.fit_tree(tree_idx, x, &codes, encoder.n_classes(), &tree_config))
                .collect()
        });

        let importances = aggregate_importances(&fitted, n_features).ok_or_else(|| {
            AnalysisError::TrainingFailure(
                "no tree found an informative split; features carry no signal".to_string(),
            )
        })?;

        let trees = fitted.into_iter().map(|(tree, _)| tree).collect();
        Ok(RandomForest {
            trees,
            importances,
            encoder,
            feature_names: x.names.clone(),
        })
    }

    fn fit_tree(
        &self,
        tree_idx: usize,
        x: &FeatureMatrix,
        codes: &[usize],
        n_classes: usize,
        tree_config: &TreeConfig,
    ) -> (Tree, Vec<f64>) {
        let mut rng = stream_rng(self.config.seed, tree_idx as u64);
        let n = codes.len();

        let weights = if self.config.bootstrap {
            let mut weights = vec![0u32; n];
            for _ in 0..n {
                weights[rng.gen_range(0..n)] += 1;
            }
            weights
        } else {
            vec![1u32; n]
        };

        let builder = CartBuilder::new(x, codes, &weights, n_classes, tree_config.clone());
        let (tree, importances) = builder.build(&mut rng);
        debug!("Tree {}/{}: {} nodes", tree_idx + 1, self.config.n_trees, tree.nodes.len());
        (tree, importances)
    }
}

/// Normalize each tree's impurity decrease to sum 1, average over trees that
/// split at least once, then renormalize. `None` when no tree split.
fn aggregate_importances(fitted: &[(Tree, Vec<f64>)], n_features: usize) -> Option<Vec<f64>> {
    let mut total = vec![0.0; n_features];
    let mut contributing = 0usize;

    for (tree, importances) in fitted {
        let sum: f64 = importances.iter().sum();
        if tree.is_leaf_only() || sum <= 0.0 {
            continue;
        }
        for (acc, value) in total.iter_mut().zip(importances) {
            *acc += value / sum;
        }
        contributing += 1;
    }

    if contributing == 0 {
        return None;
    }

    for value in &mut total {
        *value /= contributing as f64;
    }
    let sum: f64 = total.iter().sum();
    for value in &mut total {
        *value /= sum;
    }
    Some(total)
}
