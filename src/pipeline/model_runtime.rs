use crate::error::DsError;
use crate::pipeline::traits::InferenceEngine;

/// The default engine for this build.
pub fn build_engine() -> Result<Box<dyn InferenceEngine>, DsError> {
    #[cfg(feature = "onnx")]
    {
        Ok(Box::new(onnx::OrtEngine::new()))
    }

    #[cfg(not(feature = "onnx"))]
    {
        Err(DsError::model_load(
            "build inference engine",
            "ONNX runtime support is disabled; enable the `onnx` cargo feature",
        ))
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OrtEngine;

#[cfg(feature = "onnx")]
mod onnx {
    use candle_core::{DType, Device, Tensor};
    use ort::session::Session;
    use ort::value::DynValue;

    use crate::error::DsError;
    use crate::features::TensorMap;
    use crate::pipeline::traits::{BindingSource, InferenceEngine, ModelSource, StageData};

    /// ONNX Runtime sessions, one per chained stage, on the CPU execution
    /// provider.
    #[derive(Default)]
    pub struct OrtEngine {
        sessions: Vec<Session>,
    }

    impl OrtEngine {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl InferenceEngine for OrtEngine {
        fn open(&mut self, models: &[ModelSource]) -> Result<(), DsError> {
            self.close();
            let mut sessions = Vec::with_capacity(models.len());
            for model in models {
                let session = Session::builder()
                    .map_err(|e| DsError::model_load("onnx session builder", e))?
                    .with_execution_providers([ort::ep::CPU::default().build()])
                    .map_err(|e| DsError::model_load("onnx execution providers", e))?
                    .commit_from_file(&model.path)
                    .map_err(|e| {
                        DsError::model_load(
                            "onnx model load",
                            format!("{}: {e}", model.path.display()),
                        )
                    })?;

                tracing::info!(
                    inputs = session.inputs().len(),
                    outputs = session.outputs().len(),
                    model_path = %model.path.display(),
                    prefer_cpu = model.prefer_cpu,
                    "ONNX model loaded"
                );
                sessions.push(session);
            }
            self.sessions = sessions;
            Ok(())
        }

        fn run(&mut self, stages: Vec<StageData>) -> Result<TensorMap, DsError> {
            if stages.len() != self.sessions.len() {
                return Err(DsError::infer(
                    "onnx run",
                    format!(
                        "{} stages submitted for {} loaded models",
                        stages.len(),
                        self.sessions.len()
                    ),
                ));
            }

            let stage_count = stages.len();
            let mut carried: Vec<Vec<(String, DynValue)>> =
                (0..stage_count).map(|_| Vec::new()).collect();
            let mut result = TensorMap::new();

            for (index, (stage, session)) in
                stages.into_iter().zip(self.sessions.iter_mut()).enumerate()
            {
                for binding in &stage.bindings {
                    if binding.target_stage <= index || binding.target_stage >= stage_count {
                        return Err(DsError::infer(
                            "onnx run",
                            format!(
                                "stage {index} binds \"{}\" to invalid stage {}",
                                binding.name, binding.target_stage
                            ),
                        ));
                    }
                }

                let mut inputs = std::mem::take(&mut carried[index]);
                for binding in &stage.bindings {
                    if binding.source != BindingSource::Input {
                        continue;
                    }
                    let tensor = stage.inputs.get(&binding.name).ok_or_else(|| {
                        DsError::infer(
                            "onnx run",
                            format!("bound input \"{}\" is not an input", binding.name),
                        )
                    })?;
                    carried[binding.target_stage]
                        .push((binding.name.clone(), to_ort_value(tensor)?));
                }
                for (name, tensor) in &stage.inputs {
                    inputs.push((name.clone(), to_ort_value(tensor)?));
                }

                let mut outputs = session
                    .run(inputs)
                    .map_err(|e| DsError::infer("onnx forward pass", e))?;

                for name in &stage.output_names {
                    let value = outputs.get(name.as_str()).ok_or_else(|| {
                        DsError::infer("onnx run", format!("model produced no \"{name}\""))
                    })?;
                    result.insert(name.clone(), from_ort_value(value)?);
                }
                for binding in &stage.bindings {
                    if binding.source != BindingSource::Output {
                        continue;
                    }
                    let value = outputs.remove(binding.name.as_str()).ok_or_else(|| {
                        DsError::infer(
                            "onnx run",
                            format!("model produced no \"{}\" to bind", binding.name),
                        )
                    })?;
                    carried[binding.target_stage].push((binding.name.clone(), value));
                }
            }

            Ok(result)
        }

        fn close(&mut self) {
            self.sessions.clear();
        }

        fn is_open(&self) -> bool {
            !self.sessions.is_empty()
        }
    }

    fn to_ort_value(tensor: &Tensor) -> Result<DynValue, DsError> {
        let dims: Vec<i64> = tensor.dims().iter().map(|&d| d as i64).collect();
        let flat = tensor
            .flatten_all()
            .map_err(|e| DsError::infer("onnx input tensor", e))?;
        let value = match tensor.dtype() {
            DType::F32 => {
                let data = flat
                    .to_vec1::<f32>()
                    .map_err(|e| DsError::infer("onnx input tensor", e))?;
                ort::value::Tensor::from_array((dims, data)).map(|t| t.into_dyn())
            }
            DType::I64 => {
                let data = flat
                    .to_vec1::<i64>()
                    .map_err(|e| DsError::infer("onnx input tensor", e))?;
                ort::value::Tensor::from_array((dims, data)).map(|t| t.into_dyn())
            }
            DType::U8 => {
                let data: Vec<bool> = flat
                    .to_vec1::<u8>()
                    .map_err(|e| DsError::infer("onnx input tensor", e))?
                    .into_iter()
                    .map(|b| b != 0)
                    .collect();
                ort::value::Tensor::from_array((dims, data)).map(|t| t.into_dyn())
            }
            other => {
                return Err(DsError::infer(
                    "onnx input tensor",
                    format!("unsupported tensor dtype {other:?}"),
                ))
            }
        };
        value.map_err(|e| DsError::infer("onnx input tensor", e))
    }

    fn from_ort_value(value: &DynValue) -> Result<Tensor, DsError> {
        fn to_dims(shape: &[i64]) -> Vec<usize> {
            shape.iter().map(|&d| d.max(0) as usize).collect()
        }
        let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
            Tensor::from_slice(data, to_dims(shape), &Device::Cpu)
        } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
            Tensor::from_slice(data, to_dims(shape), &Device::Cpu)
        } else if let Ok((shape, data)) = value.try_extract_tensor::<bool>() {
            let bytes: Vec<u8> = data.iter().map(|&b| u8::from(b)).collect();
            Tensor::from_vec(bytes, to_dims(shape), &Device::Cpu)
        } else {
            return Err(DsError::infer(
                "onnx extract output",
                "output is not an f32, i64 or bool tensor",
            ));
        };
        tensor.map_err(|e| DsError::infer("onnx extract output", e))
    }
}
