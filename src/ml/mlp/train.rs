use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};

use super::{DenseLayer, MlpRegressor};

#[derive(Debug, Clone)]
pub struct MlpOptions {
    /// Units per hidden layer, input side first.
    pub hidden_layers: Vec<usize>,
    /// Maximum number of passes over the training rows.
    pub max_iter: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub l2_penalty: f64,
    /// Minimum loss improvement that resets the patience counter.
    pub tolerance: f64,
    /// Epochs without improvement before training stops early.
    pub patience: usize,
    pub seed: u64,
}

impl Default for MlpOptions {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            max_iter: 500,
            batch_size: 200,
            learning_rate: 0.01,
            l2_penalty: 1e-4,
            tolerance: 1e-4,
            patience: 10,
            seed: 42,
        }
    }
}

/// Fit an MLP regressor with Adam on mean squared error.
pub fn train_mlp(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    options: &MlpOptions,
) -> Result<MlpRegressor, String> {
    let n = x.nrows();
    if n != y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if n == 0 {
        return Err("Empty dataset".to_string());
    }
    let d = x.ncols();
    let (feature_mean, feature_std) = column_mean_std(x);
    let (target_mean, target_std) = mean_std(y.iter().copied());
    let rows: Vec<Vec<f64>> = x
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(j, &v)| (v - feature_mean[j]) / feature_std[j])
                .collect()
        })
        .collect();
    let targets: Vec<f64> = y.iter().map(|&v| (v - target_mean) / target_std).collect();

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut layers = init_layers(d, &options.hidden_layers, &mut rng);
    let mut optimizers: Vec<LayerAdam> = layers.iter().map(LayerAdam::new).collect();
    let batch_size = options.batch_size.clamp(1, n);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut best_loss = f64::INFINITY;
    let mut stale_epochs = 0usize;
    for epoch in 0..options.max_iter {
        indices.shuffle(&mut rng);
        let mut epoch_loss = 0.0f64;
        for batch in indices.chunks(batch_size) {
            let mut grads: Vec<LayerGrad> = layers.iter().map(LayerGrad::zeros).collect();
            for &idx in batch {
                epoch_loss += backprop(&layers, &rows[idx], targets[idx], &mut grads);
            }
            let scale = 1.0 / batch.len() as f64;
            for ((layer, grad), adam) in layers.iter_mut().zip(&mut grads).zip(&mut optimizers) {
                for (g, w) in grad.weights.iter_mut().zip(&layer.weights) {
                    *g = (*g + options.l2_penalty * w) * scale;
                }
                for g in &mut grad.bias {
                    *g *= scale;
                }
                adam.step(layer, grad, options.learning_rate);
            }
        }
        let loss = epoch_loss / n as f64;
        if !loss.is_finite() {
            return Err(format!("Training diverged at epoch {epoch}"));
        }
        if loss > best_loss - options.tolerance {
            stale_epochs += 1;
        } else {
            stale_epochs = 0;
        }
        best_loss = best_loss.min(loss);
        if stale_epochs > options.patience {
            tracing::debug!(epoch, loss, "mlp training converged");
            break;
        }
    }

    Ok(MlpRegressor {
        model_version: 1,
        feature_len: d,
        layers,
        feature_mean,
        feature_std,
        target_mean,
        target_std,
    })
}

/// Glorot-uniform weights, zero bias, single linear output.
fn init_layers(inputs: usize, hidden: &[usize], rng: &mut StdRng) -> Vec<DenseLayer> {
    let mut sizes = vec![inputs];
    sizes.extend(hidden.iter().map(|&units| units.max(1)));
    sizes.push(1);
    sizes
        .windows(2)
        .map(|pair| {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
            DenseLayer {
                inputs: fan_in,
                outputs: fan_out,
                weights: (0..fan_in * fan_out)
                    .map(|_| rng.random_range(-bound..bound))
                    .collect(),
                bias: vec![0.0; fan_out],
            }
        })
        .collect()
}

struct LayerGrad {
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl LayerGrad {
    fn zeros(layer: &DenseLayer) -> Self {
        Self {
            weights: vec![0.0; layer.weights.len()],
            bias: vec![0.0; layer.bias.len()],
        }
    }
}

/// Accumulate gradients for one row and return its half squared error.
fn backprop(layers: &[DenseLayer], input: &[f64], target: f64, grads: &mut [LayerGrad]) -> f64 {
    let last = layers.len() - 1;
    let mut activations: Vec<Vec<f64>> = Vec::with_capacity(layers.len() + 1);
    activations.push(input.to_vec());
    for (idx, layer) in layers.iter().enumerate() {
        let mut out = vec![0.0f64; layer.outputs];
        layer.forward(&activations[idx], &mut out);
        if idx != last {
            for value in &mut out {
                *value = value.max(0.0);
            }
        }
        activations.push(out);
    }

    let error = activations[layers.len()][0] - target;
    let mut delta = vec![error];
    for idx in (0..layers.len()).rev() {
        let layer = &layers[idx];
        let input = &activations[idx];
        let grad = &mut grads[idx];
        for o in 0..layer.outputs {
            grad.bias[o] += delta[o];
            let base = o * layer.inputs;
            for i in 0..layer.inputs {
                grad.weights[base + i] += delta[o] * input[i];
            }
        }
        if idx == 0 {
            break;
        }
        // `input` is the previous layer's ReLU output, so a zero means inactive.
        delta = (0..layer.inputs)
            .map(|i| {
                if input[i] <= 0.0 {
                    return 0.0;
                }
                (0..layer.outputs)
                    .map(|o| layer.weights[o * layer.inputs + i] * delta[o])
                    .sum()
            })
            .collect();
    }
    0.5 * error * error
}

struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-8;

    fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    fn step(&mut self, params: &mut [f64], grads: &[f64], learning_rate: f64, t: i32) {
        let correction1 = 1.0 - Self::BETA1.powi(t);
        let correction2 = 1.0 - Self::BETA2.powi(t);
        for (((p, &g), m), v) in params
            .iter_mut()
            .zip(grads)
            .zip(&mut self.m)
            .zip(&mut self.v)
        {
            *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g;
            *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + Self::EPSILON);
        }
    }
}

struct LayerAdam {
    weights: Adam,
    bias: Adam,
    t: i32,
}

impl LayerAdam {
    fn new(layer: &DenseLayer) -> Self {
        Self {
            weights: Adam::new(layer.weights.len()),
            bias: Adam::new(layer.bias.len()),
            t: 0,
        }
    }

    fn step(&mut self, layer: &mut DenseLayer, grad: &LayerGrad, learning_rate: f64) {
        self.t = self.t.saturating_add(1);
        self.weights
            .step(&mut layer.weights, &grad.weights, learning_rate, self.t);
        self.bias.step(&mut layer.bias, &grad.bias, learning_rate, self.t);
    }
}

fn column_mean_std(x: ArrayView2<'_, f64>) -> (Vec<f64>, Vec<f64>) {
    x.columns()
        .into_iter()
        .map(|column| mean_std(column.iter().copied()))
        .unzip()
}

/// Population mean and std; a zero spread is replaced by 1 so scaling is a no-op.
fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0.0f64), |(c, s), v| (c + 1, s + v));
    if count == 0 {
        return (0.0, 1.0);
    }
    let mean = sum / count as f64;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
    let std = var.sqrt();
    (mean, if std > 1e-12 { std } else { 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn plane(n_side: usize) -> (Array2<f64>, Array1<f64>) {
        let n = n_side * n_side;
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n_side {
            for j in 0..n_side {
                let row = i * n_side + j;
                let lat = 37.0 + i as f64 * 0.001;
                let lon = -122.0 + j as f64 * 0.001;
                x[[row, 0]] = lat;
                x[[row, 1]] = lon;
                y[row] = -45.0 - 4.0 * i as f64 - 2.0 * j as f64;
            }
        }
        (x, y)
    }

    #[test]
    fn learns_a_smooth_surface_better_than_the_mean() {
        let (x, y) = plane(8);
        let model = train_mlp(x.view(), y.view(), &MlpOptions::default()).unwrap();
        model.validate().unwrap();
        let mean = y.mean().unwrap();
        let baseline: f64 = y.iter().map(|v| (v - mean).abs()).sum::<f64>() / y.len() as f64;
        let preds = model.predict_batch(x.view());
        let mae: f64 = preds
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mae < baseline * 0.5, "mae {mae} baseline {baseline}");
    }

    #[test]
    fn training_is_deterministic_for_a_seed() {
        let (x, y) = plane(4);
        let options = MlpOptions {
            max_iter: 20,
            ..MlpOptions::default()
        };
        let a = train_mlp(x.view(), y.view(), &options).unwrap();
        let b = train_mlp(x.view(), y.view(), &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn layer_shapes_follow_options() {
        let (x, y) = plane(4);
        let options = MlpOptions {
            max_iter: 1,
            ..MlpOptions::default()
        };
        let model = train_mlp(x.view(), y.view(), &options).unwrap();
        let shapes: Vec<(usize, usize)> = model
            .layers
            .iter()
            .map(|layer| (layer.inputs, layer.outputs))
            .collect();
        assert_eq!(shapes, vec![(2, 64), (64, 32), (32, 1)]);
    }

    #[test]
    fn constant_columns_do_not_produce_nan() {
        let x = Array2::from_elem((10, 2), 5.0);
        let y = Array1::from_iter((0..10).map(|i| -60.0 - i as f64));
        let model = train_mlp(x.view(), y.view(), &MlpOptions::default()).unwrap();
        assert!(model.predict(&[5.0, 5.0]).is_finite());
    }
}
