use super::layer::{Dense, DenseGrads};
use crate::error::Result;
use serde::{Serialize, Deserialize};

pub trait Optimizer {
    fn step(&self, layer: &mut Dense, grads: &DenseGrads) -> Result<()>;
}


// SGD

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Sgd {
    learning_rate: f32
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate
        }
    }
}

impl Optimizer for Sgd {
    fn step(&self, layer: &mut Dense, grads: &DenseGrads) -> Result<()> {
        let new_weights = layer.weights.map2(&grads.d_weights, |w, dw| {
            w - self.learning_rate * dw
        })?;

        let new_biases = layer.biases.map2(&grads.d_biases, |b, db| {
            b - self.learning_rate * db
        })?;

        layer.weights = new_weights;
        layer.biases = new_biases;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::tensor::Tensor;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_sgd_optimizer_step() {
        let mut dense_layer = Dense::new(2, 2, &mut StdRng::seed_from_u64(0)).unwrap();
        dense_layer.weights = Tensor::from_vec(vec![10.0, 20.0, 30.0, 40.0], vec![2, 2]);
        dense_layer.biases = Tensor::from_vec(vec![5.0, 6.0], vec![1, 2]);
        let grads = DenseGrads {
            d_weights: Tensor::from_vec(vec![2.0, 3.0, 4.0, 5.0], vec![2, 2]),
            d_biases: Tensor::from_vec(vec![0.5, 1.5], vec![1, 2])
        };

        Sgd::new(0.1).step(&mut dense_layer, &grads).unwrap();

        // new_w = old_w - lr * d_w
        assert_vec_approx_eq(&dense_layer.weights.read(), &[9.8, 19.7, 29.6, 39.5]);
        // new_b = old_b - lr * d_b
        assert_vec_approx_eq(&dense_layer.biases.read(), &[4.95, 5.85]);
    }

    #[test]
    fn test_sgd_rejects_mismatched_grads() {
        let mut dense_layer = Dense::new(2, 2, &mut StdRng::seed_from_u64(0)).unwrap();
        let before = dense_layer.clone();
        let grads = DenseGrads {
            d_weights: Tensor::zeros(vec![3, 2]),
            d_biases: Tensor::zeros(vec![1, 2])
        };

        let err = Sgd::new(0.1).step(&mut dense_layer, &grads).unwrap_err();

        assert!(err.is_shape_mismatch());
        assert_eq!(dense_layer, before);
    }
}
