use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Node of a regression tree stored in pre-order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Terminal node predicting the mean target of its training rows.
    Leaf { value: f64 },
    /// Internal node routing `feature <= threshold` left, otherwise right.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Binary regression tree; the root is `nodes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Check that child links only point forward and features are in range.
    ///
    /// Forward-only links guarantee that [`RegressionTree::predict`] terminates.
    pub fn validate(&self, feature_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("Leaf {idx} has a non-finite value"));
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= feature_len {
                        return Err(format!("Split {idx} uses feature {feature} (len {feature_len})"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("Split {idx} has a non-finite threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("Split {idx} links to invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Route a feature vector to its leaf value.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Averaging ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestRegressor {
    /// Model format version.
    pub model_version: i64,
    /// Number of features per input row.
    pub feature_len: usize,
    pub trees: Vec<RegressionTree>,
}

impl ForestRegressor {
    /// Validate structural invariants of every tree.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("Forest must contain at least one tree".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_len)
                .map_err(|err| format!("Tree {idx}: {err}"))?;
        }
        Ok(())
    }

    /// Mean of the per-tree predictions.
    pub fn predict(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    /// Predict every row of a `(n, feature_len)` matrix.
    pub fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Array1<f64> {
        rows.rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => self.predict(slice),
                None => self.predict(&row.to_vec()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump(threshold: f64, left: f64, right: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: left },
                TreeNode::Leaf { value: right },
            ],
        }
    }

    #[test]
    fn tree_routes_on_threshold_inclusive_left() {
        let tree = stump(0.5, -80.0, -40.0);
        assert_eq!(tree.predict(&[0.5, 0.0]), -80.0);
        assert_eq!(tree.predict(&[0.6, 0.0]), -40.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn forest_averages_trees() {
        let forest = ForestRegressor {
            model_version: 1,
            feature_len: 2,
            trees: vec![stump(0.0, -60.0, -50.0), stump(1.0, -80.0, -70.0)],
        };
        forest.validate().unwrap();
        assert_eq!(forest.predict(&[0.5, 0.0]), (-50.0 + -80.0) / 2.0);
        let batch = forest.predict_batch(array![[-1.0, 0.0], [2.0, 0.0]].view());
        assert_eq!(batch.to_vec(), vec![-70.0, -60.0]);
    }

    #[test]
    fn validate_rejects_backward_links_and_bad_features() {
        let looping = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf { value: 1.0 },
            ],
        };
        assert!(looping.validate(2).is_err());
        assert!(stump(0.0, 1.0, 2.0).validate(0).is_err());
        let empty = ForestRegressor {
            model_version: 1,
            feature_len: 2,
            trees: Vec::new(),
        };
        assert!(empty.validate().is_err());
    }
}
