use std::fs;

use anyhow::{ensure, Context, Result};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::QModel;

/// Feed-forward Q-value network: ReLU hidden layers, linear outputs, mean-squared
/// error against target Q-vectors with a plain gradient step
#[derive(Debug, Clone)]
pub struct QNetwork {
    layers: Vec<Layer>,
    learning_rate: f64,
}

#[derive(Debug, Clone)]
struct Layer {
    weights: Array2<f64>,
    biases: Array1<f64>,
}

impl QNetwork {
    pub fn new(layer_sizes: &[usize], learning_rate: f64, rng: &mut impl Rng) -> Self {
        let mut layers = Vec::new();

        for window in layer_sizes.windows(2) {
            let (inputs, outputs) = (window[0], window[1]);
            let limit = (6. / (inputs + outputs) as f64).sqrt();

            layers.push(Layer {
                weights: Array2::from_shape_fn((outputs, inputs), |_| {
                    rng.gen_range(-limit..limit)
                }),
                biases: Array1::zeros(outputs),
            });
        }

        QNetwork {
            layers,
            learning_rate,
        }
    }

    fn input_width(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.weights.ncols())
    }

    fn output_width(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.weights.nrows())
    }

    /// Activations per layer, input first. Hidden layers are ReLU, the output
    /// layer is linear
    fn forward(&self, input: &[f64]) -> Vec<Array1<f64>> {
        let mut activations = vec![Array1::from(input.to_vec())];

        for (index, layer) in self.layers.iter().enumerate() {
            let z = layer.weights.dot(activations.last().unwrap()) + &layer.biases;

            let activation = if index + 1 == self.layers.len() {
                z
            } else {
                z.mapv(|value| value.max(0.))
            };
            activations.push(activation);
        }

        activations
    }

    pub fn write_to_file(&self, path: &str) -> Result<()> {
        let encoded = postcard::to_stdvec(&self.to_weights())?;
        fs::write(path, encoded).with_context(|| format!("failed to write weights to {path}"))?;
        Ok(())
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let file = fs::read(path).with_context(|| format!("failed to read weights from {path}"))?;
        let weights: NetworkWeights = postcard::from_bytes(&file)?;
        Self::from_weights(weights)
    }

    fn to_weights(&self) -> NetworkWeights {
        NetworkWeights {
            learning_rate: self.learning_rate,
            layers: self
                .layers
                .iter()
                .map(|layer| LayerWeights {
                    rows: layer.weights.nrows(),
                    cols: layer.weights.ncols(),
                    weights: layer.weights.iter().copied().collect(),
                    biases: layer.biases.to_vec(),
                })
                .collect(),
        }
    }

    fn from_weights(weights: NetworkWeights) -> Result<Self> {
        let mut layers = Vec::new();

        for layer in weights.layers {
            layers.push(Layer {
                weights: Array2::from_shape_vec((layer.rows, layer.cols), layer.weights)?,
                biases: Array1::from(layer.biases),
            });
        }

        Ok(QNetwork {
            layers,
            learning_rate: weights.learning_rate,
        })
    }
}

impl QModel for QNetwork {
    fn predict(&self, state: &[f64]) -> Result<Vec<f64>> {
        ensure!(
            state.len() == self.input_width(),
            "state width {} does not match network input width {}",
            state.len(),
            self.input_width()
        );

        Ok(self.forward(state).pop().unwrap().to_vec())
    }

    fn fit(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<()> {
        ensure!(!states.is_empty(), "cannot fit on an empty batch");
        ensure!(
            states.len() == targets.len(),
            "batch has {} states but {} targets",
            states.len(),
            targets.len()
        );

        let mut weight_grads: Vec<Array2<f64>> = self
            .layers
            .iter()
            .map(|layer| Array2::zeros(layer.weights.raw_dim()))
            .collect();
        let mut bias_grads: Vec<Array1<f64>> = self
            .layers
            .iter()
            .map(|layer| Array1::zeros(layer.biases.raw_dim()))
            .collect();

        for (state, target) in states.iter().zip(targets) {
            ensure!(
                state.len() == self.input_width() && target.len() == self.output_width(),
                "sample dimensions do not match the network"
            );

            let activations = self.forward(state);
            let mut delta = activations.last().unwrap() - &Array1::from(target.clone());

            for index in (0..self.layers.len()).rev() {
                let layer_input = &activations[index];

                let weight_grad = delta
                    .view()
                    .insert_axis(Axis(1))
                    .dot(&layer_input.view().insert_axis(Axis(0)));
                weight_grads[index] += &weight_grad;
                bias_grads[index] += &delta;

                if index > 0 {
                    let upstream = self.layers[index].weights.t().dot(&delta);
                    delta = upstream * layer_input.mapv(|value| if value > 0. { 1. } else { 0. });
                }
            }
        }

        let scale = self.learning_rate / states.len() as f64;

        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.weights -= &(weight_grads[index].clone() * scale);
            layer.biases -= &(bias_grads[index].clone() * scale);
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkWeights {
    learning_rate: f64,
    layers: Vec<LayerWeights>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerWeights {
    rows: usize,
    cols: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
}

/// Two networks with identical architecture and independent weights, for the
/// predict/update role pair
pub fn create_network_pair(
    input_count: usize,
    hidden_units: usize,
    output_count: usize,
    learning_rate: f64,
    rng: &mut impl Rng,
) -> (QNetwork, QNetwork) {
    let layer_sizes = [input_count, hidden_units, hidden_units, output_count];

    (
        QNetwork::new(&layer_sizes, learning_rate, rng),
        QNetwork::new(&layer_sizes, learning_rate, rng),
    )
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn predict_rejects_wrong_state_width() {
        let mut rng = StdRng::seed_from_u64(1);
        let network = QNetwork::new(&[4, 8, 3], 0.01, &mut rng);

        assert!(network.predict(&[0.; 3]).is_err());
        assert_eq!(network.predict(&[0.; 4]).unwrap().len(), 3);
    }

    #[test]
    fn fit_moves_predictions_toward_targets() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut network = QNetwork::new(&[2, 8, 2], 0.05, &mut rng);

        let state = vec![0.5, -0.25];
        let target = vec![1., -1.];

        let before = network.predict(&state).unwrap();
        let error_before: f64 = before
            .iter()
            .zip(&target)
            .map(|(p, t)| (p - t) * (p - t))
            .sum();

        for _ in 0..200 {
            network
                .fit(&[state.clone()], &[target.clone()])
                .unwrap();
        }

        let after = network.predict(&state).unwrap();
        let error_after: f64 = after
            .iter()
            .zip(&target)
            .map(|(p, t)| (p - t) * (p - t))
            .sum();

        assert!(error_after < error_before * 0.1);
    }

    #[test]
    fn network_pair_has_independent_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let (first, second) = create_network_pair(4, 8, 3, 0.01, &mut rng);

        let state = vec![0.1, 0.2, 0.3, 0.4];
        assert_ne!(
            first.predict(&state).unwrap(),
            second.predict(&state).unwrap()
        );
    }

    #[test]
    fn weights_round_trip_through_file() {
        let mut rng = StdRng::seed_from_u64(4);
        let network = QNetwork::new(&[4, 8, 3], 0.01, &mut rng);

        let dir = std::env::temp_dir().join("coin_trading_bot_weights_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("weights.bin");
        let path = path.to_str().unwrap();

        network.write_to_file(path).unwrap();
        let restored = QNetwork::from_file(path).unwrap();

        let state = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(
            network.predict(&state).unwrap(),
            restored.predict(&state).unwrap()
        );
    }
}
