pub mod tensor;
pub mod layer;
pub mod init;
pub mod optimizer;
