//! CART (Classification and Regression Tree) builder
//!
//! Grows a single Gini classification tree with exact-greedy split search.
//! Samples carry integer weights so a bootstrap draw is expressed as a
//! multiplicity per training row rather than a copied matrix.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::dataset::FeatureMatrix;

/// Growth parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure or unsplittable
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features examined per node
    pub max_features: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        }
    }
}

/// A decision tree node (internal or leaf)
///
/// Internal nodes send `value <= threshold` left. Leaves carry the class code.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub feature_index: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub class: Option<usize>,
}

impl Node {
    fn leaf(class: usize) -> Self {
        Self {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            class: Some(class),
        }
    }
}

/// A fitted classification tree; node 0 is the root
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Class code predicted for one feature row
    pub fn predict(&self, row: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if let Some(class) = node.class {
                return class;
            }
            idx = if row[node.feature_index] <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    pub fn is_leaf_only(&self) -> bool {
        self.nodes.len() == 1
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    improvement: f64,
}

/// Pending node: its slot in `nodes`, its samples and depth
struct Frame {
    slot: usize,
    samples: Vec<usize>,
    depth: usize,
}

/// Build a classification tree over weighted samples
pub struct CartBuilder<'a> {
    config: TreeConfig,
    x: &'a FeatureMatrix,
    y: &'a [usize],
    weights: &'a [u32],
    n_classes: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        x: &'a FeatureMatrix,
        y: &'a [usize],
        weights: &'a [u32],
        n_classes: usize,
        config: TreeConfig,
    ) -> Self {
        assert_eq!(x.n_rows(), y.len());
        assert_eq!(y.len(), weights.len());

        Self {
            config,
            x,
            y,
            weights,
            n_classes,
        }
    }

    /// Grow the tree. Returns it with the unnormalized impurity decrease
    /// accumulated per feature.
    pub fn build(&self, rng: &mut StdRng) -> (Tree, Vec<f64>) {
        let mut importances = vec![0.0; self.x.n_features()];
        let mut nodes = vec![Node::leaf(0)];

        let root: Vec<usize> = (0..self.y.len()).filter(|&i| self.weights[i] > 0).collect();
        let mut stack = vec![Frame {
            slot: 0,
            samples: root,
            depth: 0,
        }];

        // Explicit stack: unbounded depth must not overflow the call stack
        while let Some(Frame {
            slot,
            samples,
            depth,
        }) = stack.pop()
        {
            let counts = self.class_counts(&samples);
            let weight: f64 = counts.iter().sum();
            let impurity = gini(&counts, weight);
            nodes[slot] = Node::leaf(majority(&counts));

            let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
            if depth_reached || samples.len() < self.config.min_samples_split || impurity <= 0.0 {
                continue;
            }

            let split = match self.find_best_split(&samples, &counts, weight, impurity, rng) {
                Some(split) => split,
                None => continue,
            };

            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| self.x.value(i, split.feature_idx) <= split.threshold);

            importances[split.feature_idx] += split.improvement;

            let left_slot = nodes.len();
            nodes.push(Node::leaf(0));
            let right_slot = nodes.len();
            nodes.push(Node::leaf(0));

            nodes[slot] = Node {
                feature_index: split.feature_idx,
                threshold: split.threshold,
                left: left_slot,
                right: right_slot,
                class: None,
            };

            stack.push(Frame {
                slot: right_slot,
                samples: right,
                depth: depth + 1,
            });
            stack.push(Frame {
                slot: left_slot,
                samples: left,
                depth: depth + 1,
            });
        }

        (Tree { nodes }, importances)
    }

    /// Exact-greedy search over a random draw of features.
    ///
    /// Features are visited in a random order until `max_features`
    /// non-constant ones have been examined. Only a strictly better
    /// improvement replaces the current best.
    fn find_best_split(
        &self,
        samples: &[usize],
        counts: &[f64],
        weight: f64,
        impurity: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.x.n_features()).collect();
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0usize;
        let mut sorted: Vec<(f64, usize, f64)> = Vec::with_capacity(samples.len());

        for feature_idx in features {
            if visited >= self.config.max_features {
                break;
            }

            sorted.clear();
            sorted.extend(samples.iter().map(|&i| {
                (self.x.value(i, feature_idx), self.y[i], self.weights[i] as f64)
            }));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (first, last) = (sorted[0].0, sorted[sorted.len() - 1].0);
            if first >= last {
                continue;
            }
            visited += 1;

            let mut left_counts = vec![0.0; self.n_classes];
            let mut left_weight = 0.0;
            let min_leaf = self.config.min_samples_leaf;

            for pos in 0..sorted.len() - 1 {
                let (value, class, w) = sorted[pos];
                left_counts[class] += w;
                left_weight += w;

                let next = sorted[pos + 1].0;
                if value >= next {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || sorted.len() - n_left < min_leaf {
                    continue;
                }

                let right_weight = weight - left_weight;
                let right_sq: f64 = counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(total, left)| (total - left) * (total - left))
                    .sum();
                let right_gini = (1.0 - right_sq / (right_weight * right_weight)).max(0.0);

                let improvement = weight * impurity
                    - left_weight * gini(&left_counts, left_weight)
                    - right_weight * right_gini;

                if best.as_ref().map_or(true, |b| improvement > b.improvement) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold,
                        improvement,
                    });
                }
            }
        }

        best
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += self.weights[i] as f64;
        }
        counts
    }
}

/// Gini impurity `1 - sum(p_k^2)` of weighted class counts
pub fn gini(counts: &[f64], weight: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = counts.iter().map(|c| (c / weight) * (c / weight)).sum();
    (1.0 - sum_sq).max(0.0)
}

/// Class with the largest weight; lowest code wins ties
fn majority(counts: &[f64]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |(best, best_w), (class, &w)| {
            if w > best_w {
                (class, w)
            } else {
                (best, best_w)
            }
        })
        .0
}
