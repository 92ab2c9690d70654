use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Fully connected layer with row-major `[outputs][inputs]` weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    /// Write `W * input + b` into `out`.
    pub(crate) fn forward(&self, input: &[f64], out: &mut [f64]) {
        for o in 0..self.outputs {
            let base = o * self.inputs;
            let mut sum = self.bias[o];
            for i in 0..self.inputs {
                sum += self.weights[base + i] * input[i];
            }
            out[o] = sum;
        }
    }
}

/// Multi-layer perceptron with ReLU hidden layers and a single linear output.
///
/// Inputs are standardized with the training mean/std and the output is
/// mapped back to dBm with the target mean/std.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpRegressor {
    pub model_version: i64,
    pub feature_len: usize,
    pub layers: Vec<DenseLayer>,
    pub feature_mean: Vec<f64>,
    pub feature_std: Vec<f64>,
    pub target_mean: f64,
    pub target_std: f64,
}

impl MlpRegressor {
    pub fn validate(&self) -> Result<(), String> {
        let Some(first) = self.layers.first() else {
            return Err("Model has no layers".to_string());
        };
        if first.inputs != self.feature_len {
            return Err("first layer input size mismatch".to_string());
        }
        if self.layers.last().map(|layer| layer.outputs) != Some(1) {
            return Err("output layer must have exactly one unit".to_string());
        }
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.inputs * layer.outputs {
                return Err(format!("layer {idx} weights length mismatch"));
            }
            if layer.bias.len() != layer.outputs {
                return Err(format!("layer {idx} bias length mismatch"));
            }
            if let Some(next) = self.layers.get(idx + 1)
                && next.inputs != layer.outputs
            {
                return Err(format!("layer {} input size mismatch", idx + 1));
            }
            if layer.weights.iter().chain(&layer.bias).any(|v| !v.is_finite()) {
                return Err(format!("layer {idx} has non-finite parameters"));
            }
        }
        if self.feature_mean.len() != self.feature_len {
            return Err("feature_mean length mismatch".to_string());
        }
        if self.feature_std.len() != self.feature_len {
            return Err("feature_std length mismatch".to_string());
        }
        if !(self.target_std.is_finite() && self.target_std > 0.0 && self.target_mean.is_finite()) {
            return Err("invalid target scaling".to_string());
        }
        Ok(())
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        if features.len() != self.feature_len || self.layers.is_empty() {
            return self.target_mean;
        }
        let mut current: Vec<f64> = features
            .iter()
            .zip(self.feature_mean.iter().zip(&self.feature_std))
            .map(|(&value, (&mean, &std))| (value - mean) / std.max(1e-12))
            .collect();
        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut next = vec![0.0f64; layer.outputs];
            layer.forward(&current, &mut next);
            if idx != last {
                for value in &mut next {
                    *value = value.max(0.0);
                }
            }
            current = next;
        }
        current[0] * self.target_std + self.target_mean
    }

    pub fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Array1<f64> {
        rows.rows()
            .into_iter()
            .map(|row| self.predict(&row.to_vec()))
            .collect()
    }
}
