//! Random forest of Gini decision trees
//!
//! Each tree is grown to purity (unless limited by depth or split size) on a
//! bootstrap sample, considering `sqrt(n_features)` randomly chosen features
//! at every split. Trees are fitted in parallel; tree `t` draws from its own
//! generator seeded with `seed + t`, so the forest does not depend on thread
//! scheduling.

use idmatch_core::{Error, ForestParams, Result};
use idmatch_similarity::{FeatureVector, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        positive_fraction: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A binary classification tree stored as a flat node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Fraction of positive training samples in the leaf `x` falls into
    pub fn predict_proba(&self, x: &FeatureVector) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { positive_fraction } => return *positive_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if x.0[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        depth_of(&self.nodes, 0)
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a [FeatureVector],
    y: &'a [bool],
    params: &'a ForestParams,
    max_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn grow(mut self, samples: &mut [usize]) -> DecisionTree {
        self.build(samples, 0);
        DecisionTree { nodes: self.nodes }
    }

    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let index = self.nodes.len();
        let n = samples.len();
        let positives = samples.iter().filter(|&&i| self.y[i]).count();
        self.nodes.push(Node::Leaf {
            positive_fraction: positives as f64 / n.max(1) as f64,
        });

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if positives == 0
            || positives == n
            || n < self.params.min_samples_split.max(2)
            || depth_reached
        {
            return index;
        }

        let Some(split) = self.best_split(samples, positives) else {
            return index;
        };

        let x = self.x;
        let mut mid = 0;
        for k in 0..samples.len() {
            if x[samples[k]].0[split.feature] <= split.threshold {
                samples.swap(k, mid);
                mid += 1;
            }
        }

        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    /// Lowest weighted Gini impurity split over a random feature subset.
    /// Keeps drawing features past `max_features` until one can split.
    fn best_split(&mut self, samples: &[usize], positives: usize) -> Option<Split> {
        let (x, y) = (self.x, self.y);
        let n = samples.len() as f64;
        let total_positive = positives as f64;

        let mut features: [usize; FEATURE_COUNT] = std::array::from_fn(|i| i);
        features.shuffle(&mut self.rng);

        let mut order = samples.to_vec();
        let mut best: Option<Split> = None;

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }

            order.sort_unstable_by(|&a, &b| x[a].0[feature].total_cmp(&x[b].0[feature]));

            let mut left_n = 0.0;
            let mut left_positive = 0.0;
            for k in 0..order.len() - 1 {
                left_n += 1.0;
                if y[order[k]] {
                    left_positive += 1.0;
                }

                let current = x[order[k]].0[feature];
                let next = x[order[k + 1]].0[feature];
                if next <= current {
                    continue;
                }

                let right_n = n - left_n;
                let impurity = (left_n * gini(left_positive, left_n)
                    + right_n * gini(total_positive - left_positive, right_n))
                    / n;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = current + (next - current) / 2.0;
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }

        best
    }
}

fn gini(positive: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let p = positive / total;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

/// Bagged ensemble of [`DecisionTree`]s
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(
        x: &[FeatureVector],
        y: &[bool],
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(Error::Training(format!(
                "random forest needs matching non-empty inputs (got {} rows, {} labels)",
                x.len(),
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(Error::Training("random forest needs at least one tree".into()));
        }

        let n = x.len();
        let max_features = ((FEATURE_COUNT as f64).sqrt() as usize).max(1);

        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let mut samples: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                TreeBuilder {
                    x,
                    y,
                    params,
                    max_features,
                    rng,
                    nodes: Vec::new(),
                }
                .grow(&mut samples)
            })
            .collect();

        tracing::debug!(
            "Fitted random forest: {} trees, {} nodes",
            trees.len(),
            trees.iter().map(DecisionTree::node_count).sum::<usize>()
        );
        Ok(Self { trees })
    }

    /// Mean positive-class probability over all trees
    pub fn predict_proba(&self, x: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|tree| tree.predict_proba(x)).sum();
        total / self.trees.len() as f64
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Label is `signal > 0.5`; the first half of the features are noisy
    /// copies of the signal, the rest pure noise
    fn separable(n: usize, seed: u64) -> (Vec<FeatureVector>, Vec<bool>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for _ in 0..n {
            let signal = rng.random::<f64>();
            let values: [f64; FEATURE_COUNT] = std::array::from_fn(|i| {
                if i < FEATURE_COUNT / 2 {
                    signal + rng.random_range(-0.02..0.02)
                } else {
                    rng.random::<f64>()
                }
            });
            y.push(signal > 0.5);
            x.push(FeatureVector(values));
        }
        (x, y)
    }

    #[test]
    fn test_learns_threshold() {
        let (x, y) = separable(400, 1);
        let forest = RandomForest::fit(&x, &y, &ForestParams::default(), 42).unwrap();

        let (test_x, test_y) = separable(200, 2);
        let correct = test_x
            .iter()
            .zip(&test_y)
            .filter(|(row, &label)| (forest.predict_proba(row) > 0.5) == label)
            .count();
        assert!(correct >= 170, "{} / 200", correct);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (x, y) = separable(200, 3);
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(&x, &y, &params, 7).unwrap();
        let b = RandomForest::fit(&x, &y, &params, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_limit() {
        let (x, y) = separable(200, 4);
        let params = ForestParams {
            n_estimators: 5,
            max_depth: Some(2),
            min_samples_split: 2,
        };
        let forest = RandomForest::fit(&x, &y, &params, 0).unwrap();
        assert!(forest.trees().iter().all(|tree| tree.depth() <= 2));
    }

    #[test]
    fn test_single_class() {
        let (x, _) = separable(50, 5);
        let y = vec![true; 50];
        let forest = RandomForest::fit(&x, &y, &ForestParams::default(), 0).unwrap();
        assert_eq!(forest.predict_proba(&x[0]), 1.0);
        assert!(forest.trees().iter().all(|tree| tree.node_count() == 1));
    }

    #[test]
    fn test_probabilities_in_range() {
        let (x, y) = separable(100, 6);
        let forest = RandomForest::fit(&x, &y, &ForestParams::default(), 0).unwrap();
        for row in &x {
            let p = forest.predict_proba(row);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_invalid_input() {
        assert!(RandomForest::fit(&[], &[], &ForestParams::default(), 0).is_err());
        let (x, _) = separable(3, 0);
        assert!(RandomForest::fit(&x, &[true], &ForestParams::default(), 0).is_err());
    }
}
