//! Named model inputs built from a [`Segment`](crate::types::Segment).

use std::collections::BTreeMap;

use candle_core::{DType, Device, Tensor};

use crate::alignment::speedup_from_steps;
use crate::config::Features;
use crate::error::DsError;
use crate::speaker::EMBED_DIM;

pub mod acoustic;
pub mod duration;
pub mod linguistic;
pub mod pitch;
pub mod variance;

/// Tensors keyed by model input/output name.
pub type TensorMap = BTreeMap<String, Tensor>;

pub(crate) fn f32_row(values: Vec<f32>) -> Result<Tensor, DsError> {
    let len = values.len();
    Tensor::from_vec(values, (1, len), &Device::Cpu).map_err(|e| DsError::infer("f32 tensor", e))
}

pub(crate) fn f64_row_as_f32(values: &[f64]) -> Result<Tensor, DsError> {
    f32_row(values.iter().map(|&v| v as f32).collect())
}

pub(crate) fn i64_row(values: Vec<i64>) -> Result<Tensor, DsError> {
    let len = values.len();
    Tensor::from_vec(values, (1, len), &Device::Cpu).map_err(|e| DsError::infer("i64 tensor", e))
}

/// Booleans travel as `u8` 0/1.
pub(crate) fn bool_tensor(values: &[bool], shape: &[usize]) -> Result<Tensor, DsError> {
    let data: Vec<u8> = values.iter().map(|&b| u8::from(b)).collect();
    Tensor::from_vec(data, shape, &Device::Cpu).map_err(|e| DsError::infer("bool tensor", e))
}

pub(crate) fn i64_scalar(value: i64) -> Result<Tensor, DsError> {
    Tensor::from_vec(vec![value], 1, &Device::Cpu).map_err(|e| DsError::infer("i64 scalar", e))
}

pub(crate) fn f32_scalar(value: f32) -> Result<Tensor, DsError> {
    Tensor::from_vec(vec![value], 1, &Device::Cpu).map_err(|e| DsError::infer("f32 scalar", e))
}

/// `[1, frames, EMBED_DIM]` speaker embedding tensor.
pub(crate) fn spk_embed_tensor(values: Vec<f32>, frames: usize) -> Result<Tensor, DsError> {
    Tensor::from_vec(values, (1, frames, EMBED_DIM), &Device::Cpu)
        .map_err(|e| DsError::infer("spk_embed tensor", e))
}

/// Either the raw `steps` count (continuous acceleration) or the quantized
/// `speedup` divisor.
pub(crate) fn insert_acceleration(
    map: &mut TensorMap,
    features: Features,
    steps: i64,
) -> Result<(), DsError> {
    if features.contains(Features::CONTINUOUS_ACCELERATION) {
        map.insert("steps".into(), i64_scalar(steps)?);
    } else {
        map.insert("speedup".into(), i64_scalar(speedup_from_steps(steps))?);
    }
    Ok(())
}

/// Flattens any numeric tensor into host `f32` values.
pub fn tensor_to_f32(tensor: &Tensor, context: &'static str) -> Result<Vec<f32>, DsError> {
    tensor
        .flatten_all()
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| DsError::infer(context, e))
}

/// Ready-made tensor map accessors for tests and callers inspecting inputs.
pub trait TensorMapExt {
    fn f32_values(&self, name: &str) -> Result<Vec<f32>, DsError>;
    fn i64_values(&self, name: &str) -> Result<Vec<i64>, DsError>;
    fn dims_of(&self, name: &str) -> Option<Vec<usize>>;
}

impl TensorMapExt for TensorMap {
    fn f32_values(&self, name: &str) -> Result<Vec<f32>, DsError> {
        let tensor = self
            .get(name)
            .ok_or_else(|| DsError::infer("read tensor", format!("no tensor named \"{name}\"")))?;
        tensor_to_f32(tensor, "read tensor")
    }

    fn i64_values(&self, name: &str) -> Result<Vec<i64>, DsError> {
        let tensor = self
            .get(name)
            .ok_or_else(|| DsError::infer("read tensor", format!("no tensor named \"{name}\"")))?;
        tensor
            .flatten_all()
            .and_then(|t| t.to_dtype(DType::I64))
            .and_then(|t| t.to_vec1::<i64>())
            .map_err(|e| DsError::infer("read tensor", e))
    }

    fn dims_of(&self, name: &str) -> Option<Vec<usize>> {
        self.get(name).map(|t| t.dims().to_vec())
    }
}
