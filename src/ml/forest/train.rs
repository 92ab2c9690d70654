use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::model::{ForestRegressor, RegressionTree, TreeNode};

/// Training hyperparameters for the tree ensemble.
#[derive(Debug, Clone)]
pub struct ForestOptions {
    /// Number of trees.
    pub n_estimators: usize,
    /// Hard cap on tree depth.
    pub max_depth: usize,
    /// Nodes with fewer rows become leaves.
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
    /// Resample rows with replacement for each tree.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            n_estimators: 150,
            max_depth: 32,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Fit a bagged ensemble of regression trees.
pub fn train_forest<'a>(
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    options: &'a ForestOptions,
) -> Result<ForestRegressor, String> {
    let n = x.nrows();
    if n != y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if n == 0 {
        return Err("Empty dataset".to_string());
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err("Training data contains non-finite values".to_string());
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let n_estimators = options.n_estimators.max(1);
    let mut trees = Vec::with_capacity(n_estimators);
    for _ in 0..n_estimators {
        let mut indices: Vec<usize> = if options.bootstrap {
            (0..n).map(|_| rng.random_range(0..n)).collect()
        } else {
            (0..n).collect()
        };
        let mut builder = TreeBuilder {
            x,
            y,
            options,
            nodes: Vec::new(),
        };
        builder.grow(&mut indices, 0);
        trees.push(RegressionTree {
            nodes: builder.nodes,
        });
    }

    Ok(ForestRegressor {
        model_version: 1,
        feature_len: x.ncols(),
        trees,
    })
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    options: &'a ForestOptions,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `indices`, returning its node index.
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let node_idx = self.nodes.len();
        let (mean, sse) = mean_and_sse(self.y, indices);
        self.nodes.push(TreeNode::Leaf { value: mean });

        let min_split = self.options.min_samples_split.max(2);
        if indices.len() < min_split || depth >= self.options.max_depth || sse <= 1e-12 {
            return node_idx;
        }
        let Some(split) = self.best_split(indices) else {
            return node_idx;
        };

        sort_by_feature(self.x, indices, split.feature);
        let (left_rows, right_rows) = indices.split_at_mut(split.left_count);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    /// Lowest combined SSE split over all features, ties going to the lower feature.
    fn best_split(&self, indices: &mut [usize]) -> Option<Split> {
        let min_leaf = self.options.min_samples_leaf.max(1);
        let n = indices.len();
        if n < 2 * min_leaf {
            return None;
        }
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<Split> = None;
        for feature in 0..self.x.ncols() {
            sort_by_feature(self.x, indices, feature);
            let mut left_sum = 0.0f64;
            let mut left_sq = 0.0f64;
            for k in 1..n {
                let target = self.y[indices[k - 1]];
                left_sum += target;
                left_sq += target * target;
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let below = self.x[[indices[k - 1], feature]];
                let above = self.x[[indices[k], feature]];
                if below >= above {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / k as f64;
                let right_sse = right_sq - right_sum * right_sum / (n - k) as f64;
                let score = left_sse + right_sse;
                if best.as_ref().is_none_or(|b| score < b.score) {
                    best = Some(Split {
                        score,
                        feature,
                        threshold: midpoint(below, above),
                        left_count: k,
                    });
                }
            }
        }
        best
    }
}

#[derive(Debug, Clone)]
struct Split {
    score: f64,
    feature: usize,
    threshold: f64,
    left_count: usize,
}

fn sort_by_feature(x: ArrayView2<'_, f64>, indices: &mut [usize], feature: usize) {
    indices.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
}

/// Midpoint that still routes `below` left and `above` right.
fn midpoint(below: f64, above: f64) -> f64 {
    let mid = below + (above - below) / 2.0;
    if mid >= above { below } else { mid }
}

fn mean_and_sse(y: ArrayView1<'_, f64>, indices: &[usize]) -> (f64, f64) {
    if indices.is_empty() {
        return (0.0, 0.0);
    }
    let n = indices.len() as f64;
    let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n;
    let sse = indices
        .iter()
        .map(|&i| {
            let diff = y[i] - mean;
            diff * diff
        })
        .sum();
    (mean, sse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, s};

    fn step_dataset() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let lat = i as f64 / n as f64;
            x[[i, 0]] = lat;
            x[[i, 1]] = 0.25;
            y[i] = if lat < 0.5 { -85.0 } else { -45.0 };
        }
        (x, y)
    }

    #[test]
    fn single_tree_without_bootstrap_fits_step_exactly() {
        let (x, y) = step_dataset();
        let options = ForestOptions {
            n_estimators: 1,
            bootstrap: false,
            ..ForestOptions::default()
        };
        let forest = train_forest(x.view(), y.view(), &options).unwrap();
        forest.validate().unwrap();
        assert_eq!(forest.trees[0].depth(), 1);
        assert_eq!(forest.predict(&[0.1, 0.25]), -85.0);
        assert_eq!(forest.predict(&[0.9, 0.25]), -45.0);
    }

    #[test]
    fn trains_from_sliced_views_with_shared_options() {
        let (x, y) = step_dataset();
        let options = ForestOptions {
            n_estimators: 3,
            ..ForestOptions::default()
        };
        let upper = train_forest(x.slice(s![20.., ..]), y.slice(s![20..]), &options).unwrap();
        upper.validate().unwrap();
        assert_eq!(upper.feature_len, 2);
        assert_eq!(upper.predict(&[0.1, 0.25]), -45.0);
    }

    #[test]
    fn predictions_stay_within_target_range() {
        let (x, y) = step_dataset();
        let forest = train_forest(x.view(), y.view(), &ForestOptions::default()).unwrap();
        assert_eq!(forest.trees.len(), 150);
        for probe in [-1.0, 0.0, 0.3, 0.49, 0.51, 0.8, 2.0] {
            let value = forest.predict(&[probe, 0.25]);
            assert!((-85.0..=-45.0).contains(&value), "{probe} -> {value}");
        }
    }

    #[test]
    fn training_is_deterministic_for_a_seed() {
        let (x, y) = step_dataset();
        let a = train_forest(x.view(), y.view(), &ForestOptions::default()).unwrap();
        let b = train_forest(x.view(), y.view(), &ForestOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constant_features_produce_leaf_only_trees() {
        let x = Array2::from_elem((12, 2), 1.5);
        let y = Array1::from_iter((0..12).map(|i| -50.0 - i as f64));
        let forest = train_forest(x.view(), y.view(), &ForestOptions::default()).unwrap();
        assert!(forest.trees.iter().all(|tree| tree.nodes.len() == 1));
    }

    #[test]
    fn rejects_mismatched_or_empty_input() {
        let x = Array2::<f64>::zeros((3, 2));
        let y = Array1::<f64>::zeros(2);
        assert!(train_forest(x.view(), y.view(), &ForestOptions::default()).is_err());
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(train_forest(x.view(), y.view(), &ForestOptions::default()).is_err());
    }

    #[test]
    fn midpoint_never_routes_upper_value_left() {
        let below = 1.0f64;
        let above = f64::from_bits(below.to_bits() + 1);
        let t = midpoint(below, above);
        assert!(below <= t && t < above);
    }
}
