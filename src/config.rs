use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{NetError, Result};

pub const DEFAULT_FC1_UNITS: usize = 256;
pub const DEFAULT_FC2_UNITS: usize = 128;

/// Hyperparameters shared by the actor and the critic.
///
/// Loadable from TOML; only `state_size` and `action_size` are required:
///
/// ```toml
/// state_size = 24
/// action_size = 2
/// seed = 7
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Width of one state observation. Network inputs take two of them side by side.
    pub state_size: usize,
    /// Width of one action vector.
    pub action_size: usize,
    /// Seed for parameter initialization
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_fc1_units")]
    pub fc1_units: usize,
    #[serde(default = "default_fc2_units")]
    pub fc2_units: usize,
}

fn default_fc1_units() -> usize {
    DEFAULT_FC1_UNITS
}

fn default_fc2_units() -> usize {
    DEFAULT_FC2_UNITS
}

impl NetworkConfig {
    pub fn new(state_size: usize, action_size: usize, seed: u64) -> Self {
        Self {
            state_size,
            action_size,
            seed,
            fc1_units: DEFAULT_FC1_UNITS,
            fc2_units: DEFAULT_FC2_UNITS,
        }
    }

    pub fn with_hidden_units(mut self, fc1_units: usize, fc2_units: usize) -> Self {
        self.fc1_units = fc1_units;
        self.fc2_units = fc2_units;
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: NetworkConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        let widths = [
            ("state_size", self.state_size),
            ("action_size", self.action_size),
            ("fc1_units", self.fc1_units),
            ("fc2_units", self.fc2_units),
        ];
        for (name, value) in widths {
            if value == 0 {
                return Err(NetError::InvalidDimension(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// Width of the state batch both networks consume.
    pub fn state_input_width(&self) -> usize {
        self.state_size * 2
    }

    /// Width of the action batch the critic consumes.
    pub fn action_input_width(&self) -> usize {
        self.action_size * 2
    }
}
