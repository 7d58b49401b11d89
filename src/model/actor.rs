use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};
use tracing::debug;

use super::{ensure_layer, ensure_tau, reset_parameters, Network};
use crate::config::NetworkConfig;
use crate::error::Result;
use crate::nn::layer::{Activation, Dense, DenseGrads};
use crate::nn::optimizer::Optimizer;
use crate::nn::tensor::Tensor;

/// Policy network: `2 * state_size` inputs to `action_size` outputs in [-1, 1].
///
/// Layout is `Linear -> ReLU -> Linear -> ReLU -> Linear -> tanh`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Actor {
    state_size: usize,
    action_size: usize,
    fc1: Dense,
    fc2: Dense,
    fc3: Dense
}

/// Intermediate values of one actor pass, kept for [`Actor::backward`].
#[derive(Clone, Debug)]
pub struct ActorTrace {
    pub state: Tensor,
    pub z1: Tensor,
    pub h1: Tensor,
    pub z2: Tensor,
    pub h2: Tensor,
    pub z3: Tensor,
    pub action: Tensor
}

#[derive(Clone, Debug)]
pub struct ActorGradients {
    pub fc1: DenseGrads,
    pub fc2: DenseGrads,
    pub fc3: DenseGrads,
    pub d_state: Tensor
}

impl Actor {
    /// Actor with the default hidden widths (256, 128).
    pub fn new(state_size: usize, action_size: usize, seed: u64) -> Result<Self> {
        Self::from_config(&NetworkConfig::new(state_size, action_size, seed))
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut fc1 = Dense::new(config.state_input_width(), config.fc1_units, &mut rng)?;
        let mut fc2 = Dense::new(config.fc1_units, config.fc2_units, &mut rng)?;
        let mut fc3 = Dense::new(config.fc2_units, config.action_size, &mut rng)?;
        reset_parameters([&mut fc1, &mut fc2], &mut fc3, &mut rng)?;

        debug!(
            state_size = config.state_size,
            action_size = config.action_size,
            seed = config.seed,
            fc1_units = config.fc1_units,
            fc2_units = config.fc2_units,
            "actor initialized"
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

    /// Maps a `(batch, 2 * state_size)` batch to `(batch, action_size)` actions.
    pub fn forward(&self, state: &Tensor) -> Result<Tensor> {
        Ok(self.forward_traced(state)?.action)
    }

    pub fn forward_traced(&self, state: &Tensor) -> Result<ActorTrace> {
        let z1 = self.fc1.forward(state)?;
        let h1 = Activation::Relu.forward(&z1);
        let z2 = self.fc2.forward(&h1)?;
        let h2 = Activation::Relu.forward(&z2);
        let z3 = self.fc3.forward(&h2)?;
        let action = Activation::Tanh.forward(&z3);

        Ok(ActorTrace {
            state: state.clone(),
            z1,
            h1,
            z2,
            h2,
            z3,
            action
        })
    }

    /// Backpropagates `d_action` (dL/daction, same shape as `trace.action`).
    pub fn backward(&self, trace: &ActorTrace, d_action: &Tensor) -> Result<ActorGradients> {
        let d_z3 = Activation::Tanh.backward(&trace.z3, &trace.action, d_action)?;
        let (d_h2, fc3) = self.fc3.backward(&trace.h2, &d_z3)?;

        let d_z2 = Activation::Relu.backward(&trace.z2, &trace.h2, &d_h2)?;
        let (d_h1, fc2) = self.fc2.backward(&trace.h1, &d_z2)?;

        let d_z1 = Activation::Relu.backward(&trace.z1, &trace.h1, &d_h1)?;
        let (d_state, fc1) = self.fc1.backward(&trace.state, &d_z1)?;

        Ok(ActorGradients { fc1, fc2, fc3, d_state })
    }

    /// Steps all three layers, or none of them if any gradient has the wrong shape.
    pub fn apply_gradients(&mut self, grads: &ActorGradients, optimizer: &impl Optimizer) -> Result<()> {
        self.fc1.ensure_grads(&grads.fc1)?;
        self.fc2.ensure_grads(&grads.fc2)?;
        self.fc3.ensure_grads(&grads.fc3)?;

        optimizer.step(&mut self.fc1, &grads.fc1)?;
        optimizer.step(&mut self.fc2, &grads.fc2)?;
        optimizer.step(&mut self.fc3, &grads.fc3)
    }

    pub fn copy_weights_from(&mut self, other: &Actor) -> Result<()> {
        self.fc1.copy_from(&other.fc1)?;
        self.fc2.copy_from(&other.fc2)?;
        self.fc3.copy_from(&other.fc3)
    }

    /// Moves this (target) actor towards `source` by a factor of `tau`.
    pub fn soft_update_from(&mut self, source: &Actor, tau: f32) -> Result<()> {
        ensure_tau(tau)?;
        self.fc1.soft_update_from(&source.fc1, tau)?;
        self.fc2.soft_update_from(&source.fc2, tau)?;
        self.fc3.soft_update_from(&source.fc3, tau)
    }
}

impl Network for Actor {
    fn layers(&self) -> [&Dense; 3] {
        [&self.fc1, &self.fc2, &self.fc3]
    }

    fn validate(&self) -> Result<()> {
        let hidden1 = self.fc1.output_size();
        let hidden2 = self.fc2.output_size();
        ensure_layer("actor fc1", &self.fc1, self.state_size * 2, hidden1)?;
        ensure_layer("actor fc2", &self.fc2, hidden1, hidden2)?;
        ensure_layer("actor fc3", &self.fc3, hidden2, self.action_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetError;
    use crate::nn::init::OUTPUT_WEIGHT_BOUND;
    use crate::nn::optimizer::Sgd;

    fn ramp(shape: Vec<usize>, start: f32, step: f32) -> Tensor {
        let len = shape.iter().product();
        Tensor::from_vec((0..len).map(|i| start + step * i as f32).collect(), shape)
    }

    // small actor with positive parameters so every ReLU stays active
    fn hand_set_actor() -> Actor {
        let config = NetworkConfig::new(1, 2, 0).with_hidden_units(3, 2);
        let mut actor = Actor::from_config(&config).unwrap();
        for layer in [&mut actor.fc1, &mut actor.fc2, &mut actor.fc3] {
            layer.weights = ramp(layer.weights.shape.clone(), 0.05, 0.01);
            layer.biases = ramp(layer.biases.shape.clone(), 0.1, 0.02);
        }
        actor
    }

    fn total(t: &Tensor) -> f32 {
        t.read().iter().sum()
    }

    #[test]
    fn test_layer_shapes() {
        let actor = Actor::new(4, 2, 0).unwrap();
        let shapes: Vec<Vec<usize>> = actor.layers().iter().map(|l| l.weights.shape.clone()).collect();
        assert_eq!(shapes, vec![vec![8, 256], vec![256, 128], vec![128, 2]]);
        assert!(actor.validate().is_ok());
        assert_eq!(actor.parameter_count(), 8 * 256 + 256 + 256 * 128 + 128 + 128 * 2 + 2);
    }

    #[test]
    fn test_zero_state_forward() {
        let actor = Actor::new(4, 2, 0).unwrap();
        let action = actor.forward(&Tensor::zeros(vec![1, 8])).unwrap();

        assert_eq!(action.shape, vec![1, 2]);
        for &a in action.read().iter() {
            assert!((-1.0..=1.0).contains(&a));
            assert!(a.abs() < 0.5, "fresh actor output {} should be close to zero", a);
        }
    }

    #[test]
    fn test_output_bounded_for_large_inputs() {
        let actor = Actor::new(3, 4, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let state = Tensor::random_normal(vec![32, 6], &mut rng).map(|x| x * 1000.0);

        let action = actor.forward(&state).unwrap();

        assert_eq!(action.shape, vec![32, 4]);
        assert!(action.read().iter().all(|a| (-1.0..=1.0).contains(a)));
    }

    #[test]
    fn test_same_seed_same_parameters() {
        let a = Actor::new(4, 2, 42).unwrap();
        let b = Actor::new(4, 2, 42).unwrap();
        let c = Actor::new(4, 2, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_initialization_ranges() {
        let actor = Actor::new(4, 2, 0).unwrap();
        let fc1_bound = 1.0 / 8f32.sqrt();
        let fc2_bound = 1.0 / 256f32.sqrt();

        assert!(actor.fc1.weights.read().iter().all(|w| w.abs() <= fc1_bound));
        assert!(actor.fc2.weights.read().iter().all(|w| w.abs() <= fc2_bound));
        assert!(actor.fc3.weights.read().iter().all(|w| w.abs() <= OUTPUT_WEIGHT_BOUND));
        // biases keep the layer default, drawn from the fan-in range
        assert!(actor.fc3.biases.read().iter().all(|b| b.abs() <= 1.0 / 128f32.sqrt()));
    }

    #[test]
    fn test_wrong_state_width() {
        let actor = Actor::new(4, 2, 0).unwrap();
        let err = actor.forward(&Tensor::zeros(vec![1, 4])).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(matches!(Actor::new(0, 2, 0), Err(NetError::InvalidDimension(_))));
        let config = NetworkConfig::new(4, 2, 0).with_hidden_units(16, 0);
        assert!(matches!(Actor::from_config(&config), Err(NetError::InvalidDimension(_))));
    }

    #[test]
    fn test_state_gradient_matches_finite_difference() {
        let actor = hand_set_actor();
        let state = Tensor::from_vec(vec![0.5, -0.3, 0.2, 0.4], vec![2, 2]);

        let trace = actor.forward_traced(&state).unwrap();
        let d_action = Tensor::full(trace.action.shape.clone(), 1.0);
        let grads = actor.backward(&trace, &d_action).unwrap();
        let analytic = grads.d_state.to_vec();

        let eps = 1e-2;
        for i in 0..state.len() {
            let plus = state.deep_clone();
            plus.write()[i] += eps;
            let minus = state.deep_clone();
            minus.write()[i] -= eps;

            let numeric = (total(&actor.forward(&plus).unwrap()) - total(&actor.forward(&minus).unwrap())) / (2.0 * eps);
            assert!((numeric - analytic[i]).abs() < 1e-4, "d_state[{}]: {} vs {}", i, numeric, analytic[i]);
        }
    }

    #[test]
    fn test_weight_gradient_matches_finite_difference() {
        let actor = hand_set_actor();
        let state = Tensor::from_vec(vec![0.5, -0.3], vec![1, 2]);

        let trace = actor.forward_traced(&state).unwrap();
        let grads = actor.backward(&trace, &Tensor::full(vec![1, 2], 1.0)).unwrap();
        let analytic = grads.fc1.d_weights.to_vec();

        let eps = 1e-2;
        for i in 0..actor.fc1.weights.len() {
            actor.fc1.weights.write()[i] += eps;
            let up = total(&actor.forward(&state).unwrap());
            actor.fc1.weights.write()[i] -= 2.0 * eps;
            let down = total(&actor.forward(&state).unwrap());
            actor.fc1.weights.write()[i] += eps;

            let numeric = (up - down) / (2.0 * eps);
            assert!((numeric - analytic[i]).abs() < 1e-4, "d_fc1[{}]: {} vs {}", i, numeric, analytic[i]);
        }
    }

    #[test]
    fn test_backward_rejects_wrong_gradient_shape() {
        let actor = hand_set_actor();
        let trace = actor.forward_traced(&Tensor::zeros(vec![2, 2])).unwrap();
        let err = actor.backward(&trace, &Tensor::zeros(vec![2, 3])).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_sgd_step_lowers_objective() {
        let mut actor = hand_set_actor();
        let state = Tensor::from_vec(vec![0.5, -0.3, 0.2, 0.4], vec![2, 2]);

        let trace = actor.forward_traced(&state).unwrap();
        let before = total(&trace.action);
        let grads = actor.backward(&trace, &Tensor::full(trace.action.shape.clone(), 1.0)).unwrap();
        actor.apply_gradients(&grads, &Sgd::new(0.05)).unwrap();

        let after = total(&actor.forward(&state).unwrap());
        assert!(after < before, "{} should drop below {}", after, before);
    }

    #[test]
    fn test_bad_gradient_leaves_actor_untouched() {
        let mut actor = hand_set_actor();
        let before = actor.clone();
        let state = Tensor::from_vec(vec![0.5, -0.3, 0.2, 0.4], vec![2, 2]);

        let trace = actor.forward_traced(&state).unwrap();
        let mut grads = actor.backward(&trace, &Tensor::full(trace.action.shape.clone(), 1.0)).unwrap();
        grads.fc2 = DenseGrads { d_weights: Tensor::zeros(vec![2, 3]), d_biases: grads.fc2.d_biases.clone() };

        let err = actor.apply_gradients(&grads, &Sgd::new(0.05)).unwrap_err();
        assert!(err.is_shape_mismatch());
        assert_eq!(actor, before);
    }

    #[test]
    fn test_soft_update_and_copy() {
        let source = Actor::new(2, 1, 1).unwrap();
        let mut target = Actor::new(2, 1, 2).unwrap();

        target.soft_update_from(&source, 0.0).unwrap();
        assert_ne!(target, source);

        target.soft_update_from(&source, 1.0).unwrap();
        assert_eq!(target, source);

        let mut other = Actor::new(2, 1, 3).unwrap();
        other.copy_weights_from(&source).unwrap();
        assert_eq!(other, source);

        assert!(matches!(target.soft_update_from(&source, 1.5), Err(NetError::InvalidArgument(_))));
    }

    #[test]
    fn test_soft_update_rejects_other_architecture() {
        let source = Actor::new(2, 1, 1).unwrap();
        let mut target = Actor::new(3, 1, 1).unwrap();
        assert!(target.soft_update_from(&source, 0.5).unwrap_err().is_shape_mismatch());
    }
}
