use super::init::fan_in_bound;
use super::tensor::Tensor;
use crate::error::{NetError, Result};
use rand::Rng;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};


// dense layer

/// Fully connected layer computing `x @ weights + biases`.
///
/// `weights` has shape `[input_size, output_size]` and `biases` is a single
/// row `[1, output_size]` broadcast over the batch.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor
}

// clones own their parameters; tensors alone share storage
impl Clone for Dense {
    fn clone(&self) -> Self {
        Self {
            weights: self.weights.deep_clone(),
            biases: self.biases.deep_clone()
        }
    }
}

/// Parameter gradients produced by [`Dense::backward`].
#[derive(Clone, Debug)]
pub struct DenseGrads {
    pub d_weights: Tensor,
    pub d_biases: Tensor
}

impl Dense {
    /// Builds a layer with weights and biases drawn from the fan-in range.
    pub fn new(input_size: usize, output_size: usize, rng: &mut impl Rng) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(NetError::InvalidDimension(format!(
                "dense layer needs non-zero widths, got {} -> {}", input_size, output_size
            )));
        }

        let bound = fan_in_bound(input_size);
        let weights = Tensor::uniform(vec![input_size, output_size], -bound, bound, rng)?;
        let biases = Tensor::uniform(vec![1, output_size], -bound, bound, rng)?;
        Ok(Self {
            weights,
            biases
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape[1]
    }

    pub fn fan_in(&self) -> usize {
        self.input_size()
    }

    /// Redraws the weights from U(low, high). Biases are left untouched.
    pub fn reset_weights(&mut self, low: f32, high: f32, rng: &mut impl Rng) -> Result<()> {
        self.weights = Tensor::uniform(self.weights.shape.clone(), low, high, rng)?;
        Ok(())
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if input.shape.len() != 2 || input.cols() != self.input_size() {
            return Err(NetError::ShapeMismatch {
                op: "dense forward",
                expected: vec![input.rows(), self.input_size()],
                actual: input.shape.clone()
            });
        }

        let output = input.matmul(&self.weights)?;

        // add biases
        {
            let mut output_data = output.write();
            let biases_data = self.biases.read();
            let output_size = output.shape[1];

            output_data.par_chunks_mut(output_size).for_each(|row_chunk| {
                for j in 0..output_size {
                    row_chunk[j] += biases_data[j];
                }
            });
        }

        Ok(output)
    }

    /// Returns `(d_input, grads)` for the pass that consumed `input`.
    pub fn backward(&self, input: &Tensor, d_output: &Tensor) -> Result<(Tensor, DenseGrads)> {
        if d_output.shape != vec![input.rows(), self.output_size()] {
            return Err(NetError::ShapeMismatch {
                op: "dense backward",
                expected: vec![input.rows(), self.output_size()],
                actual: d_output.shape.clone()
            });
        }

        // dL/dW = input.T @ dL/dY
        let d_weights = input.transpose().matmul(d_output)?;

        // dL/db = dL/dY.sum(axis=0)
        let d_biases = d_output.sum(0)?;

        // dL/dX = dL/dY @ weights.T
        let d_input = d_output.matmul(&self.weights.transpose())?;

        Ok((d_input, DenseGrads { d_weights, d_biases }))
    }

    fn ensure_same_shape(&self, other: &Dense, op: &'static str) -> Result<()> {
        if self.weights.shape != other.weights.shape {
            return Err(NetError::ShapeMismatch {
                op,
                expected: self.weights.shape.clone(),
                actual: other.weights.shape.clone()
            });
        }
        Ok(())
    }

    /// Checks that `grads` line up with this layer's weights and biases.
    pub fn ensure_grads(&self, grads: &DenseGrads) -> Result<()> {
        for (param, grad) in [(&self.weights, &grads.d_weights), (&self.biases, &grads.d_biases)] {
            if param.shape != grad.shape {
                return Err(NetError::ShapeMismatch {
                    op: "apply gradients",
                    expected: param.shape.clone(),
                    actual: grad.shape.clone()
                });
            }
        }
        Ok(())
    }

    /// Overwrites this layer's parameters with detached copies of `other`'s.
    pub fn copy_from(&mut self, other: &Dense) -> Result<()> {
        self.ensure_same_shape(other, "copy weights")?;
        self.weights = other.weights.deep_clone();
        self.biases = other.biases.deep_clone();
        Ok(())
    }

    /// Polyak averaging: `self = tau * source + (1 - tau) * self`.
    pub fn soft_update_from(&mut self, source: &Dense, tau: f32) -> Result<()> {
        self.ensure_same_shape(source, "soft update")?;
        self.weights = source.weights.map2(&self.weights, |src, dst| tau * src + (1.0 - tau) * dst)?;
        self.biases = source.biases.map2(&self.biases, |src, dst| tau * src + (1.0 - tau) * dst)?;
        Ok(())
    }
}


// activations

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Tanh
}

impl Activation {
    pub fn forward(&self, input: &Tensor) -> Tensor {
        match self {
            Activation::Relu => input.map(|x| x.max(0.0)),
            Activation::Tanh => input.map(f32::tanh)
        }
    }

    /// `input` is the pre-activation and `output` what `forward` returned for it.
    pub fn backward(&self, input: &Tensor, output: &Tensor, d_output: &Tensor) -> Result<Tensor> {
        match self {
            Activation::Relu => input.map2(d_output, |input_val, grad| {
                if input_val > 0.0 {
                    grad
                } else {
                    0.0
                }
            }),
            Activation::Tanh => output.map2(d_output, |y, grad| (1.0 - y * y) * grad)
        }
    }
}
