use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};
use tracing::debug;

use super::{ensure_layer, ensure_tau, reset_parameters, Network};
use crate::config::NetworkConfig;
use crate::error::{NetError, Result};
use crate::nn::layer::{Activation, Dense, DenseGrads};
use crate::nn::optimizer::Optimizer;
use crate::nn::tensor::Tensor;

/// Action-value network estimating one unbounded scalar per (state, action) row.
///
/// The state goes through `fc1` and a ReLU on its own. The hidden features are
/// then joined with the raw action batch before `fc2`, and `fc3` reads out the
/// value with no output activation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Critic {
    state_size: usize,
    action_size: usize,
    fc1: Dense,
    fc2: Dense,
    fc3: Dense
}

#[derive(Clone, Debug)]
pub struct CriticTrace {
    pub state: Tensor,
    pub action: Tensor,
    pub z1: Tensor,
    pub h1: Tensor,
    pub joined: Tensor,
    pub z2: Tensor,
    pub h2: Tensor,
    pub value: Tensor
}

#[derive(Clone, Debug)]
pub struct CriticGradients {
    pub fc1: DenseGrads,
    pub fc2: DenseGrads,
    pub fc3: DenseGrads,
    pub d_state: Tensor,
    pub d_action: Tensor
}

impl Critic {
    /// Critic with the default hidden widths (256, 128).
    pub fn new(state_size: usize, action_size: usize, seed: u64) -> Result<Self> {
        Self::from_config(&NetworkConfig::new(state_size, action_size, seed))
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut fc1 = Dense::new(config.state_input_width(), config.fc1_units, &mut rng)?;
        let mut fc2 = Dense::new(config.fc1_units + config.action_input_width(), config.fc2_units, &mut rng)?;
        let mut fc3 = Dense::new(config.fc2_units, 1, &mut rng)?;
        reset_parameters([&mut fc1, &mut fc2], &mut fc3, &mut rng)?;

        debug!(
            state_size = config.state_size,
            action_size = config.action_size,
            seed = config.seed,
            fc1_units = config.fc1_units,
            fc2_units = config.fc2_units,
            "critic initialized"
        );

        Ok(Self {
            state_size: config.state_size,
            action_size: config.action_size,
            fc1,
            fc2,
            fc3
        })
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Q-values of shape `(batch, 1)` for `(batch, 2 * state_size)` states and
    /// `(batch, 2 * action_size)` actions.
    pub fn forward(&self, state: &Tensor, action: &Tensor) -> Result<Tensor> {
        Ok(self.forward_traced(state, action)?.value)
    }

    pub fn forward_traced(&self, state: &Tensor, action: &Tensor) -> Result<CriticTrace> {
        self.check_inputs(state, action)?;

        let z1 = self.fc1.forward(state)?;
        let h1 = Activation::Relu.forward(&z1);
        let joined = h1.concat_cols(action)?;
        let z2 = self.fc2.forward(&joined)?;
        let h2 = Activation::Relu.forward(&z2);
        let value = self.fc3.forward(&h2)?;

        Ok(CriticTrace {
            state: state.clone(),
            action: action.clone(),
            z1,
            h1,
            joined,
            z2,
            h2,
            value
        })
    }

    /// Backpropagates `d_value` (same shape as `trace.value`) down to both inputs.
    pub fn backward(&self, trace: &CriticTrace, d_value: &Tensor) -> Result<CriticGradients> {
        let (d_h2, fc3) = self.fc3.backward(&trace.h2, d_value)?;

        let d_z2 = Activation::Relu.backward(&trace.z2, &trace.h2, &d_h2)?;
        let (d_joined, fc2) = self.fc2.backward(&trace.joined, &d_z2)?;
        let (d_h1, d_action) = d_joined.split_cols(self.fc1.output_size())?;

        let d_z1 = Activation::Relu.backward(&trace.z1, &trace.h1, &d_h1)?;
        let (d_state, fc1) = self.fc1.backward(&trace.state, &d_z1)?;

        Ok(CriticGradients { fc1, fc2, fc3, d_state, d_action })
    }

    /// dQ/daction for every row, the signal a deterministic policy update follows.
    pub fn action_gradient(&self, state: &Tensor, action: &Tensor) -> Result<Tensor> {
        let trace = self.forward_traced(state, action)?;
        let d_value = Tensor::full(trace.value.shape.clone(), 1.0);
        Ok(self.backward(&trace, &d_value)?.d_action)
    }

    /// Steps all three layers, or none of them if any gradient has the wrong shape.
    pub fn apply_gradients(&mut self, grads: &CriticGradients, optimizer: &impl Optimizer) -> Result<()> {
        self.fc1.ensure_grads(&grads.fc1)?;
        self.fc2.ensure_grads(&grads.fc2)?;
        self.fc3.ensure_grads(&grads.fc3)?;

        optimizer.step(&mut self.fc1, &grads.fc1)?;
        optimizer.step(&mut self.fc2, &grads.fc2)?;
        optimizer.step(&mut self.fc3, &grads.fc3)
    }

    pub fn copy_weights_from(&mut self, other: &Critic) -> Result<()> {
        self.fc1.copy_from(&other.fc1)?;
        self.fc2.copy_from(&other.fc2)?;
        self.fc3.copy_from(&other.fc3)
    }

    pub fn soft_update_from(&mut self, source: &Critic, tau: f32) -> Result<()> {
        ensure_tau(tau)?;
        self.fc1.soft_update_from(&source.fc1, tau)?;
        self.fc2.soft_update_from(&source.fc2, tau)?;
        self.fc3.soft_update_from(&source.fc3, tau)
    }

    fn check_inputs(&self, state: &Tensor, action: &Tensor) -> Result<()> {
        let action_width = self.action_size * 2;
        if action.shape.len() != 2 || action.cols() != action_width {
            return Err(NetError::ShapeMismatch {
                op: "critic action",
                expected: vec![action.rows(), action_width],
                actual: action.shape.clone()
            });
        }
        if state.rows() != action.rows() {
            return Err(NetError::BatchMismatch {
                op: "critic forward",
                left: state.rows(),
                right: action.rows()
            });
        }
        Ok(())
    }
}

impl Network for Critic {
    fn layers(&self) -> [&Dense; 3] {
        [&self.fc1, &self.fc2, &self.fc3]
    }

    fn validate(&self) -> Result<()> {
        let hidden1 = self.fc1.output_size();
        let hidden2 = self.fc2.output_size();
        ensure_layer("critic fc1", &self.fc1, self.state_size * 2, hidden1)?;
        ensure_layer("critic fc2", &self.fc2, hidden1 + self.action_size * 2, hidden2)?;
        ensure_layer("critic fc3", &self.fc3, hidden2, 1)
    }
}
