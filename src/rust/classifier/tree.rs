use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of the feature count
    Sqrt,
    /// Base-2 logarithm of the feature count
    Log2,
    /// Every feature
    All,
    /// A fixed number of features
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            Self::Sqrt => (n_features as f64).sqrt() as usize,
            Self::Log2 => (n_features as f64).log2() as usize,
            Self::All => n_features,
            Self::Count(count) => count,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f32>,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

/// A CART classification tree grown with Gini impurity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
}

impl DecisionTree {
    /// Grows a tree on the rows of `x` listed in `samples`.
    ///
    /// `samples` may contain repeated rows (bootstrap draws). `y` holds the
    /// class index of every row of `x`.
    pub(crate) fn fit(
        x: ArrayView2<f32>,
        y: &[usize],
        samples: Vec<usize>,
        n_classes: usize,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            n_classes,
        };
        let mut features: Vec<usize> = (0..x.ncols()).collect();
        tree.grow(x, y, samples, 0, params, &mut features, rng);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        x: ArrayView2<f32>,
        y: &[usize],
        samples: Vec<usize>,
        depth: usize,
        params: TreeParams,
        features: &mut [usize],
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let counts = self.class_counts(y, &samples);
        let id = self.nodes.len();

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
        if is_pure || depth_reached || samples.len() < params.min_samples_split {
            self.nodes.push(Self::leaf(&counts));
            return id;
        }

        let Some(split) = Self::best_split(x, y, &samples, self.n_classes, params.max_features, features, rng) else {
            self.nodes.push(Self::leaf(&counts));
            return id;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&row| x[[row, split.feature]] <= split.threshold);

        // Placeholder until both children are known
        self.nodes.push(Self::leaf(&counts));
        let left = self.grow(x, y, left_samples, depth + 1, params, features, rng);
        let right = self.grow(x, y, right_samples, depth + 1, params, features, rng);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn class_counts(&self, y: &[usize], samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &row in samples {
            counts[y[row]] += 1;
        }
        counts
    }

    fn leaf(counts: &[usize]) -> Node {
        let total: usize = counts.iter().sum();
        let distribution = counts
            .iter()
            .map(|&c| if total > 0 { c as f32 / total as f32 } else { 0.0 })
            .collect();
        Node::Leaf { distribution }
    }

    fn gini(counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let total = total as f64;
        1.0 - counts
            .iter()
            .map(|&c| {
                let p = c as f64 / total;
                p * p
            })
            .sum::<f64>()
    }

    /// Draws features in random order until `max_features` non-constant ones
    /// have been evaluated, returning the split with the lowest weighted Gini.
    fn best_split(
        x: ArrayView2<f32>,
        y: &[usize],
        samples: &[usize],
        n_classes: usize,
        max_features: usize,
        features: &mut [usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n = samples.len();
        if n < 2 {
            return None;
        }
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut evaluated = 0;
        let mut column: Vec<(f32, usize)> = Vec::with_capacity(n);

        for &feature in features.iter() {
            if evaluated >= max_features {
                break;
            }

            column.clear();
            column.extend(samples.iter().map(|&row| (x[[row, feature]], y[row])));

            let (min, max) = column.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &(v, _)| {
                (lo.min(v), hi.max(v))
            });
            if max <= min {
                continue;
            }
            evaluated += 1;

            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; n_classes];
            let mut right = vec![0usize; n_classes];
            for &(_, label) in column.iter() {
                right[label] += 1;
            }

            for i in 0..n - 1 {
                let (value, label) = column[i];
                left[label] += 1;
                right[label] -= 1;

                let next = column[i + 1].0;
                if next <= value {
                    continue;
                }

                let n_left = i + 1;
                let n_right = n - n_left;
                let impurity = (n_left as f64 * Self::gini(&left, n_left)
                    + n_right as f64 * Self::gini(&right, n_right))
                    / n as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }

        best
    }

    /// Returns the class distribution of the leaf `x` falls into
    pub(crate) fn leaf_distribution(&self, x: ArrayView1<f32>) -> &[f32] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Split { feature, threshold, left, right } => {
                    id = if x[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    /// Checks a deserialized tree before it is walked.
    ///
    /// Split features must be below `n_features`, children must point to
    /// later nodes (which rules out cycles) and every leaf must hold one
    /// probability per class.
    pub(crate) fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), ClassifierError> {
        let invalid = |msg: String| Err(ClassifierError::Validation(format!("Decision tree: {}", msg)));

        if self.nodes.is_empty() {
            return invalid("no nodes".into());
        }
        if self.n_classes != n_classes {
            return invalid(format!("{} classes, expected {}", self.n_classes, n_classes));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split { feature, left, right, .. } => {
                    if *feature >= n_features {
                        return invalid(format!("node {} splits on feature {} of {}", id, feature, n_features));
                    }
                    for &child in [left, right] {
                        if child <= id || child >= self.nodes.len() {
                            return invalid(format!("node {} has child {} out of order", id, child));
                        }
                    }
                }
                Node::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return invalid(format!(
                            "leaf {} has {} probabilities, expected {}",
                            id,
                            distribution.len(),
                            n_classes
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}
