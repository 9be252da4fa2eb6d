use crate::config::{
    AcousticConfig, DurationConfig, InferenceOptions, PitchConfig, VarianceConfig, VocoderConfig,
};
use crate::error::DsError;
use crate::pipeline::acoustic::AcousticStage;
use crate::pipeline::duration::DurationStage;
use crate::pipeline::model_runtime::build_engine;
use crate::pipeline::pitch::PitchStage;
use crate::pipeline::runtime::{Pipeline, PipelineParts};
use crate::pipeline::traits::{AudioWriter, InferenceEngine};
use crate::pipeline::variance::VarianceStage;

/// Produces one engine per stage.
pub type EngineFactory = Box<dyn Fn() -> Result<Box<dyn InferenceEngine>, DsError>>;

pub struct PipelineBuilder {
    options: InferenceOptions,
    duration: Option<DurationConfig>,
    pitch: Option<PitchConfig>,
    variance: Option<VarianceConfig>,
    acoustic: Option<(AcousticConfig, VocoderConfig)>,
    engine_factory: Option<EngineFactory>,
    audio_writer: Option<Box<dyn AudioWriter>>,
}

impl PipelineBuilder {
    pub fn new(options: InferenceOptions) -> Self {
        Self {
            options,
            duration: None,
            pitch: None,
            variance: None,
            acoustic: None,
            engine_factory: None,
            audio_writer: None,
        }
    }

    pub fn with_duration(mut self, config: DurationConfig) -> Self {
        self.duration = Some(config);
        self
    }

    pub fn with_pitch(mut self, config: PitchConfig) -> Self {
        self.pitch = Some(config);
        self
    }

    pub fn with_variance(mut self, config: VarianceConfig) -> Self {
        self.variance = Some(config);
        self
    }

    pub fn with_acoustic(mut self, config: AcousticConfig, vocoder: VocoderConfig) -> Self {
        self.acoustic = Some((config, vocoder));
        self
    }

    pub fn with_engine_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn InferenceEngine>, DsError> + 'static,
    {
        self.engine_factory = Some(Box::new(factory));
        self
    }

    pub fn with_audio_writer(mut self, audio_writer: Box<dyn AudioWriter>) -> Self {
        self.audio_writer = Some(audio_writer);
        self
    }

    pub fn build(self) -> Result<Pipeline, DsError> {
        let factory: EngineFactory = self
            .engine_factory
            .unwrap_or_else(|| Box::new(build_engine));
        let options = self.options;

        let duration = match self.duration {
            Some(config) => Some(DurationStage::new(config, factory()?)),
            None => None,
        };
        let pitch = match self.pitch {
            Some(config) => Some(PitchStage::new(config, factory()?, options)),
            None => None,
        };
        let variance = match self.variance {
            Some(config) => Some(VarianceStage::new(config, factory()?, options)),
            None => None,
        };
        let acoustic = match self.acoustic {
            Some((config, vocoder)) => {
                let stage = AcousticStage::new(config, vocoder, factory()?, options);
                Some(match self.audio_writer {
                    Some(writer) => stage.with_audio_writer(writer),
                    None => stage,
                })
            }
            None => None,
        };

        Ok(Pipeline::from_parts(PipelineParts {
            options,
            duration,
            pitch,
            variance,
            acoustic,
        }))
    }
}
