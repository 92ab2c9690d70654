//! Small feed-forward regressor over standardized inputs.

mod model;
mod train;

pub use model::{DenseLayer, MlpRegressor};
pub use train::{MlpOptions, train_mlp};
