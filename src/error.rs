use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("shape mismatch in {op}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("batch size mismatch in {op}: {left} rows vs {right} rows")]
    BatchMismatch {
        op: &'static str,
        left: usize,
        right: usize,
    },

    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("invalid init range [{low}, {high})")]
    InitRange { low: f32, high: f32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl NetError {
    /// True for every error caused by tensors whose dimensions do not line up.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, NetError::ShapeMismatch { .. } | NetError::BatchMismatch { .. })
    }
}
