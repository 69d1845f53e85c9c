//! Stratified train/test partitioning
//!
//! `n_test = ceil(test_fraction * n)`. Per-class training counts are the
//! largest-remainder rounding of `n_train * count / n`, clamped so that every
//! class keeps at least one row on each side.

use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::dataset::FeatureMatrix;
use crate::deterministic::stream_rng;
use crate::errors::{AnalysisError, Result};

/// Stream number reserved for the split so it never shares draws with trees
const SPLIT_STREAM: u64 = u64::MAX;

/// Output of a stratified split
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Vec<String>,
    pub y_test: Vec<String>,
}

/// Seeded splitter preserving label proportions
#[derive(Debug, Clone)]
pub struct StratifiedSplitter {
    test_fraction: f64,
    seed: u64,
}

impl StratifiedSplitter {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed,
        }
    }

    pub fn split(&self, x: &FeatureMatrix, y: &[String]) -> Result<TrainTestSplit> {
        if x.n_rows() != y.len() {
            return Err(AnalysisError::StratificationFailure(format!(
                "{} feature rows for {} labels",
                x.n_rows(),
                y.len()
            )));
        }

        let (train, test) = self.split_indices(y)?;
        info!("Split {} rows into {} train / {} test", y.len(), train.len(), test.len());

        Ok(TrainTestSplit {
            x_train: x.select_rows(&train),
            x_test: x.select_rows(&test),
            y_train: train.iter().map(|&i| y[i].clone()).collect(),
            y_test: test.iter().map(|&i| y[i].clone()).collect(),
        })
    }

    /// Row positions of the training and test partitions
    pub fn split_indices(&self, y: &[String]) -> Result<(Vec<usize>, Vec<usize>)> {
        let n = y.len();
        let classes = group_by_label(y);
        let n_classes = classes.len();

        let n_test = (self.test_fraction * n as f64).ceil() as usize;
        let n_train = n.saturating_sub(n_test);

        if let Some((label, members)) = classes.iter().find(|(_, members)| members.len() < 2) {
            return Err(AnalysisError::StratificationFailure(format!(
                "the least populated class `{}` has only {} member; every class needs at least 2",
                label,
                members.len()
            )));
        }
        if n_train < n_classes || n_test < n_classes {
            return Err(AnalysisError::StratificationFailure(format!(
                "{} classes cannot be spread over {} train and {} test rows",
                n_classes, n_train, n_test
            )));
        }

        let counts: Vec<usize> = classes.iter().map(|(_, members)| members.len()).collect();
        let train_counts = allocate(&counts, n_train, n);

        let mut rng = stream_rng(self.seed, SPLIT_STREAM);
        let mut train = Vec::with_capacity(n_train);
        let mut test = Vec::with_capacity(n_test);

        for ((label, mut members), take) in classes.into_iter().zip(train_counts) {
            debug!("Class {}: {} train / {} test", label, take, members.len() - take);
            members.shuffle(&mut rng);
            train.extend_from_slice(&members[..take]);
            test.extend_from_slice(&members[take..]);
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);
        Ok((train, test))
    }
}

/// Row positions per label, in first-seen label order
fn group_by_label(y: &[String]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (idx, label) in y.iter().enumerate() {
        match groups.iter_mut().find(|(l, _)| l == label) {
            Some((_, members)) => members.push(idx),
            None => groups.push((label.clone(), vec![idx])),
        }
    }
    groups
}

/// Largest-remainder allocation of `total` slots proportional to `counts`,
/// each class clamped to `[1, count - 1]`. Ties go to the earlier class.
fn allocate(counts: &[usize], total: usize, n: usize) -> Vec<usize> {
    let ideal: Vec<f64> = counts
        .iter()
        .map(|&count| total as f64 * count as f64 / n as f64)
        .collect();

    let mut alloc: Vec<usize> = ideal
        .iter()
        .zip(counts)
        .map(|(&want, &count)| (want.floor() as usize).clamp(1, count - 1))
        .collect();

    let mut assigned: usize = alloc.iter().sum();

    while assigned < total {
        let pick = (0..counts.len())
            .filter(|&i| alloc[i] < counts[i] - 1)
            .fold(None, |best: Option<usize>, i| match best {
                Some(b) if ideal[b] - alloc[b] as f64 >= ideal[i] - alloc[i] as f64 => Some(b),
                _ => Some(i),
            });
        match pick {
            Some(i) => {
                alloc[i] += 1;
                assigned += 1;
            }
            None => break,
        }
    }

    while assigned > total {
        let pick = (0..counts.len())
            .filter(|&i| alloc[i] > 1)
            .fold(None, |best: Option<usize>, i| match best {
                Some(b) if alloc[b] as f64 - ideal[b] >= alloc[i] as f64 - ideal[i] => Some(b),
                _ => Some(i),
            });
        match pick {
            Some(i) => {
                alloc[i] -= 1;
                assigned -= 1;
            }
            None => break,
        }
    }

    alloc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(classes: &[(&str, usize)]) -> Vec<String> {
        classes.iter()
            .flat_map(|(label, count)| std::iter::repeat(label.to_string()).take(*count))
            .collect()
    }

    fn count(y: &[String], rows: &[usize], label: &str) -> usize {
        rows.iter().filter(|&&i| y[i] == label).count()
    }

    #[test]
    fn test_proportions_preserved() -> Result<()> {
        let y = labels(&[("benign", 60), ("adware", 30), ("scareware", 10)]);
        let (train, test) = StratifiedSplitter::new(0.3, 42).split_indices(&y)?;

        assert_eq!(train.len(), 70);
        assert_eq!(test.len(), 30);
        assert_eq!(count(&y, &train, "benign"), 42);
        assert_eq!(count(&y, &train, "adware"), 21);
        assert_eq!(count(&y, &train, "scareware"), 7);
        Ok(())
    }

    #[test]
    fn partitions_cover_every_row_once() -> Result<()> {
        let y = labels(&[("a", 17), ("b", 9), ("c", 5)]);
        let (train, test) = StratifiedSplitter::new(0.3, 7).split_indices(&y)?;

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..y.len()).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_split_determinism() -> Result<()> {
        let y = labels(&[("a", 40), ("b", 25)]);
        let first = StratifiedSplitter::new(0.3, 42).split_indices(&y)?;
        let second = StratifiedSplitter::new(0.3, 42).split_indices(&y)?;
        assert_eq!(first, second);

        let other_seed = StratifiedSplitter::new(0.3, 43).split_indices(&y)?;
        assert_ne!(first, other_seed);
        Ok(())
    }

    #[test]
    fn singleton_class_fails() {
        let y = labels(&[("a", 20), ("rare", 1)]);
        let err = StratifiedSplitter::new(0.3, 42).split_indices(&y).unwrap_err();
        assert!(matches!(err, AnalysisError::StratificationFailure(_)));
    }

    #[test]
    fn too_many_classes_for_test_partition_fails() {
        let y = labels(&[("a", 2), ("b", 2), ("c", 2), ("d", 2), ("e", 2)]);
        // 10 rows: 3 test rows cannot hold 5 classes
        let err = StratifiedSplitter::new(0.3, 42).split_indices(&y).unwrap_err();
        assert!(matches!(err, AnalysisError::StratificationFailure(_)));
    }

    #[test]
    fn small_classes_appear_in_both_partitions() -> Result<()> {
        let y = labels(&[("big", 95), ("tiny", 2), ("small", 3)]);
        let (train, test) = StratifiedSplitter::new(0.3, 42).split_indices(&y)?;
        for label in ["big", "tiny", "small"] {
            assert!(count(&y, &train, label) >= 1, "{label} missing from train");
            assert!(count(&y, &test, label) >= 1, "{label} missing from test");
        }
        Ok(())
    }

    #[test]
    fn allocation_sums_to_total() {
        let counts = [13, 7, 5, 2];
        let alloc = allocate(&counts, 18, 27);
        assert_eq!(alloc.iter().sum::<usize>(), 18);
        for (a, c) in alloc.iter().zip(counts) {
            assert!(*a >= 1 && *a < c);
        }
    }

    #[test]
    fn split_carries_row_ids_and_labels() -> Result<()> {
        let y = labels(&[("a", 5), ("b", 5)]);
        let x = FeatureMatrix {
            names: vec!["f".into()],
            columns: vec![(0..10).map(|v| v as f64).collect()],
            row_ids: (100..110).collect(),
        };
        let split = StratifiedSplitter::new(0.3, 1).split(&x, &y)?;

        assert_eq!(split.x_train.n_rows(), 7);
        assert_eq!(split.x_test.n_rows(), 3);
        for (pos, &row_id) in split.x_train.row_ids.iter().enumerate() {
            let original = row_id - 100;
            assert_eq!(split.x_train.value(pos, 0), original as f64);
            assert_eq!(split.y_train[pos], y[original]);
        }
        Ok(())
    }
}
