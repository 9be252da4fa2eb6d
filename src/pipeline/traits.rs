use std::path::{Path, PathBuf};

use crate::error::DsError;
use crate::features::TensorMap;

/// A model file handed to [`InferenceEngine::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub path: PathBuf,
    /// Keep this model on the CPU even when an accelerator is available.
    pub prefer_cpu: bool,
}

impl ModelSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prefer_cpu: false,
        }
    }

    pub fn on_cpu(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prefer_cpu: true,
        }
    }
}

/// Where a bound tensor comes from in the stage that declares the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// One of the stage's own inputs, forwarded as is.
    Input,
    /// One of the stage's outputs.
    Output,
}

/// Feeds tensor `name` of the declaring stage into the input of the same name
/// of stage `target_stage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub target_stage: usize,
    pub source: BindingSource,
    pub name: String,
}

/// One model invocation in a chained run.
#[derive(Debug, Default)]
pub struct StageData {
    pub inputs: TensorMap,
    /// Outputs copied back to the caller.
    pub output_names: Vec<String>,
    pub bindings: Vec<Binding>,
}

impl StageData {
    pub fn new(inputs: TensorMap) -> Self {
        Self {
            inputs,
            ..Self::default()
        }
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output_names.push(name.into());
        self
    }

    pub fn bind_output(mut self, target_stage: usize, name: impl Into<String>) -> Self {
        self.bindings.push(Binding {
            target_stage,
            source: BindingSource::Output,
            name: name.into(),
        });
        self
    }

    pub fn bind_input(mut self, target_stage: usize, name: impl Into<String>) -> Self {
        self.bindings.push(Binding {
            target_stage,
            source: BindingSource::Input,
            name: name.into(),
        });
        self
    }
}

/// Opaque handle over a chain of loaded models.
pub trait InferenceEngine: Send {
    /// Loads one model per stage, in chain order.
    fn open(&mut self, models: &[ModelSource]) -> Result<(), DsError>;

    /// Runs every stage in order, resolving bindings between them, and returns
    /// the tensors named in each stage's `output_names`.
    fn run(&mut self, stages: Vec<StageData>) -> Result<TensorMap, DsError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Lifecycle shared by the synthesis stages.
pub trait Stage {
    fn open(&mut self) -> Result<(), DsError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
}

pub trait AudioWriter: Send + Sync {
    fn write(&self, path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), DsError>;
}
