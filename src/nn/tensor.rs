use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};
use rayon::prelude::*;
use std::fmt;
use serde::{Serialize, Deserialize, Serializer, Deserializer};

use crate::error::{NetError, Result};

pub struct Tensor {
    pub data: Arc<RwLock<Vec<f32>>>,
    pub shape: Vec<usize>,
    pub strides: Vec<usize>
}

impl Tensor {
    pub fn zeros(shape: Vec<usize>) -> Self {
        Tensor::full(shape, 0.0)
    }

    pub fn full(shape: Vec<usize>, value: f32) -> Self {
        let data: Vec<f32> = vec![value; shape.iter().product()];
        Tensor::from_vec(data, shape)
    }

    pub fn from_vec(data: Vec<f32>, shape: Vec<usize>) -> Self {
        assert_eq!(data.len(), shape.iter().product::<usize>(), "data length must match shape {:?}", shape);
        Self {
            data: Arc::new(RwLock::new(data)),
            strides: Tensor::calc_strides(&shape),
            shape
        }
    }

    // samples every element from U(low, high) using the caller's generator
    pub fn uniform(shape: Vec<usize>, low: f32, high: f32, rng: &mut impl Rng) -> Result<Self> {
        let dist = Uniform::new(low, high).map_err(|_| NetError::InitRange { low, high })?;
        let data: Vec<f32> = (0..shape.iter().product()).map(|_| dist.sample(&mut *rng)).collect();
        Ok(Tensor::from_vec(data, shape))
    }

    pub fn random_normal(shape: Vec<usize>, rng: &mut impl Rng) -> Self {
        let data: Vec<f32> = (0..shape.iter().product()).map(|_| rng.sample(StandardNormal)).collect();
        Tensor::from_vec(data, shape)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f32>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<f32>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn cols(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(0)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.contiguous().read().clone()
    }

    pub fn ensure_2d(&self, op: &'static str) -> Result<()> {
        if self.shape.len() != 2 {
            return Err(NetError::ShapeMismatch {
                op,
                expected: vec![self.rows(), self.cols()],
                actual: self.shape.clone()
            });
        }
        Ok(())
    }

    pub fn transpose(&self) -> Self {
        let mut new_shape = self.shape.clone();
        new_shape.reverse();
        let mut new_strides = self.strides.clone();
        new_strides.reverse();

        Self {
            data: Arc::clone(&self.data),
            shape: new_shape,
            strides: new_strides
        }
    }

    pub fn is_contiguous(&self) -> bool {
        self.strides == Tensor::calc_strides(&self.shape)
    }

    // materializes a strided view into row-major storage
    pub fn contiguous(&self) -> Tensor {
        if self.is_contiguous() {
            return self.clone();
        }

        let len = self.len();
        let data = self.read();
        let mut new_data = Vec::with_capacity(len);
        let mut index = vec![0usize; self.shape.len()];

        for _ in 0..len {
            let offset: usize = index.iter().zip(self.strides.iter()).map(|(i, s)| i * s).sum();
            new_data.push(data[offset]);

            for axis in (0..index.len()).rev() {
                index[axis] += 1;
                if index[axis] < self.shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }

        Tensor::from_vec(new_data, self.shape.clone())
    }

    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        self.ensure_2d("matmul")?;
        other.ensure_2d("matmul")?;
        if self.shape[1] != other.shape[0] {
            return Err(NetError::ShapeMismatch {
                op: "matmul",
                expected: vec![self.shape[1], other.shape[1]],
                actual: other.shape.clone()
            });
        }

        let k = self.shape[1];
        let n = other.shape[1];

        let c = Tensor::zeros(vec![self.shape[0], n]);
        if n == 0 {
            return Ok(c);
        }

        // get read locks
        let a_data = self.read();
        let b_data = other.read();

        {
            // get write lock for result
            let mut c_data_guard = c.write();
            let c_slice: &mut [f32] = &mut c_data_guard;

            c_slice.par_chunks_mut(n).enumerate().for_each(|(m_idx, c_row)| {
                for k_idx in 0..k {
                    let a_val = a_data[m_idx * self.strides[0] + k_idx * self.strides[1]];
                    for n_idx in 0..n {
                        let b_val = b_data[k_idx * other.strides[0] + n_idx * other.strides[1]];
                        c_row[n_idx] += a_val * b_val;
                    }
                }
            });
        }

        Ok(c)
    }

    pub fn sum(&self, axis: usize) -> Result<Tensor> {
        self.ensure_2d("sum")?;
        let source = self.contiguous();
        let data = source.read();
        let m = self.shape[0];
        let n = self.shape[1];

        match axis {
            0 => {
                let partial_sum = data.par_chunks(n.max(1)).map(|row_slice| {
                    row_slice.to_vec()
                }).reduce(
                    || vec![0.0; n],
                    |mut acc, row| {
                        for i in 0..n {
                            acc[i] += row[i];
                        }
                        acc
                    }
                );

                Ok(Tensor::from_vec(partial_sum, vec![1, n]))
            }
            1 => {
                let partial_sum: Vec<f32> = if n == 0 {
                    vec![0.0; m]
                } else {
                    data.par_chunks(n).map(|row_slice| row_slice.iter().sum::<f32>()).collect()
                };

                Ok(Tensor::from_vec(partial_sum, vec![m, 1]))
            }
            _ => Err(NetError::InvalidArgument(format!("sum axis must be 0 or 1, got {}", axis)))
        }
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where F: Fn(f32) -> f32 + Sync + Send {
        let source = self.contiguous();
        let input_data = source.read();
        let new_data: Vec<f32> = input_data.par_iter().map(|&x| f(x)).collect();
        Tensor::from_vec(new_data, self.shape.clone())
    }

    // map through self allowing access to second tensor
    pub fn map2<F>(&self, other: &Tensor, f: F) -> Result<Tensor>
    where F: Fn(f32, f32) -> f32 + Sync + Send {
        if self.shape != other.shape {
            return Err(NetError::ShapeMismatch {
                op: "map2",
                expected: self.shape.clone(),
                actual: other.shape.clone()
            });
        }

        let left = self.contiguous();
        let right = other.contiguous();
        let data1 = left.read();
        let data2 = right.read();
        let new_data: Vec<f32> = data1.par_iter().zip(data2.par_iter()).map(|(&x1, &x2)| f(x1, x2)).collect();
        Ok(Tensor::from_vec(new_data, self.shape.clone()))
    }

    // joins two batches along the feature axis; row counts must agree
    pub fn concat_cols(&self, other: &Tensor) -> Result<Tensor> {
        self.ensure_2d("concat")?;
        other.ensure_2d("concat")?;
        if self.rows() != other.rows() {
            return Err(NetError::BatchMismatch {
                op: "concat",
                left: self.rows(),
                right: other.rows()
            });
        }

        let (left_cols, right_cols) = (self.cols(), other.cols());
        let left = self.contiguous();
        let right = other.contiguous();
        let left_data = left.read();
        let right_data = right.read();

        let mut new_data = Vec::with_capacity(self.rows() * (left_cols + right_cols));
        for row in 0..self.rows() {
            new_data.extend_from_slice(&left_data[row * left_cols..(row + 1) * left_cols]);
            new_data.extend_from_slice(&right_data[row * right_cols..(row + 1) * right_cols]);
        }

        Ok(Tensor::from_vec(new_data, vec![self.rows(), left_cols + right_cols]))
    }

    pub fn split_cols(&self, at: usize) -> Result<(Tensor, Tensor)> {
        self.ensure_2d("split")?;
        let cols = self.cols();
        if at > cols {
            return Err(NetError::InvalidArgument(format!("split point {} beyond {} columns", at, cols)));
        }

        let source = self.contiguous();
        let data = source.read();
        let mut left = Vec::with_capacity(self.rows() * at);
        let mut right = Vec::with_capacity(self.rows() * (cols - at));
        for row in 0..self.rows() {
            let start = row * cols;
            left.extend_from_slice(&data[start..start + at]);
            right.extend_from_slice(&data[start + at..start + cols]);
        }

        Ok((
            Tensor::from_vec(left, vec![self.rows(), at]),
            Tensor::from_vec(right, vec![self.rows(), cols - at])
        ))
    }

    pub fn deep_clone(&self) -> Tensor {
        let data_clone = self.to_vec();
        Tensor::from_vec(data_clone, self.shape.clone())
    }

    fn calc_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides: Vec<usize> = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i+1] * shape[i+1];
        }
        strides
    }
}

impl Clone for Tensor {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            shape: self.shape.clone(),
            strides: self.strides.clone()
        }
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.to_vec() == other.to_vec()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
         .field("shape", &self.shape)
         .field("data", &self.to_vec())
         .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct SerializableTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Serialize for Tensor {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        let s_tensor = SerializableTensor {
            shape: self.shape.clone(),
            data: self.to_vec()
        };
        s_tensor.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where D: Deserializer<'de> {
        let s_tensor = SerializableTensor::deserialize(deserializer)?;
        let expected = s_tensor
            .shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| {
                <D::Error as serde::de::Error>::custom(format!("tensor shape {:?} overflows usize", s_tensor.shape))
            })?;
        if s_tensor.data.len() != expected {
            return Err(serde::de::Error::custom(format!(
                "tensor of shape {:?} needs {} values, found {}",
                s_tensor.shape, expected, s_tensor.data.len()
            )));
        }
        Ok(Tensor::from_vec(s_tensor.data, s_tensor.shape))
    }
}
