pub mod error;
pub mod config;
pub mod nn;
pub mod model;

pub use error::{NetError, Result};
pub use config::NetworkConfig;
pub use nn::tensor::Tensor;
pub use nn::layer::{
    Activation,
    Dense,
    DenseGrads,
};
pub use nn::init::{
    fan_in_bound,
    fan_in_range,
    OUTPUT_WEIGHT_BOUND,
};
pub use nn::optimizer::{
    Optimizer,
    Sgd,
};
pub use model::Network;
pub use model::actor::{Actor, ActorGradients, ActorTrace};
pub use model::critic::{Critic, CriticGradients, CriticTrace};
pub use model::checkpoint;
