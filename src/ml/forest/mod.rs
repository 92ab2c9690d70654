//! Bagged regression-tree ensemble.
//!
//! Each tree is a full-depth CART regressor grown on a bootstrap resample of the
//! training rows; predictions average the trees. Training is deterministic for
//! a fixed seed and the model serializes to plain JSON.

mod model;
mod train;

pub use model::{ForestRegressor, RegressionTree, TreeNode};
pub use train::{ForestOptions, train_forest};
