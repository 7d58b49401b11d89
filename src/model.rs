pub mod actor;
pub mod critic;
pub mod checkpoint;

use rand::Rng;

use crate::error::{NetError, Result};
use crate::nn::init::{fan_in_range, OUTPUT_WEIGHT_BOUND};
use crate::nn::layer::Dense;

/// Common surface of the three-layer networks in this crate.
pub trait Network {
    /// Layers in forward order.
    fn layers(&self) -> [&Dense; 3];

    /// Checks that the layer widths chain the way the network's sizes demand.
    fn validate(&self) -> Result<()>;

    fn parameter_count(&self) -> usize {
        self.layers().iter().map(|layer| layer.weights.len() + layer.biases.len()).sum()
    }
}

// hidden weights from the fan-in range, output weights near zero
fn reset_parameters(hidden: [&mut Dense; 2], output: &mut Dense, rng: &mut impl Rng) -> Result<()> {
    for layer in hidden {
        let (low, high) = fan_in_range(layer);
        layer.reset_weights(low, high, rng)?;
    }
    output.reset_weights(-OUTPUT_WEIGHT_BOUND, OUTPUT_WEIGHT_BOUND, rng)
}

fn ensure_layer(name: &str, layer: &Dense, input_size: usize, output_size: usize) -> Result<()> {
    if input_size == 0 || output_size == 0 {
        return Err(NetError::InvalidDimension(format!(
            "{} needs non-zero widths, got {} -> {}", name, input_size, output_size
        )));
    }

    let weights_ok = layer.weights.shape == vec![input_size, output_size];
    let biases_ok = layer.biases.shape == vec![1, output_size];
    if weights_ok && biases_ok {
        return Ok(());
    }
    Err(NetError::InvalidDimension(format!(
        "{} expected weights {:?} and biases {:?}, found {:?} and {:?}",
        name,
        [input_size, output_size],
        [1, output_size],
        layer.weights.shape,
        layer.biases.shape
    )))
}

fn ensure_tau(tau: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&tau) {
        return Err(NetError::InvalidArgument(format!("tau must lie in [0, 1], got {}", tau)));
    }
    Ok(())
}
