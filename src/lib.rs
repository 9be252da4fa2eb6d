pub mod alignment;
pub mod config;
pub mod curve;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod speaker;
pub mod types;
pub mod vocab;
pub mod wire;

pub use config::{
    AcousticConfig, DictionaryConfig, DurationConfig, Features, InferenceOptions, PitchConfig,
    VarianceConfig, VocoderConfig,
};
pub use curve::{SampleCurve, SpeakerMixCurve};
pub use error::{DsError, Status, StatusCode};
pub use features::TensorMap;
pub use pipeline::acoustic::AcousticStage;
pub use pipeline::builder::PipelineBuilder;
pub use pipeline::duration::DurationStage;
pub use pipeline::pitch::PitchStage;
pub use pipeline::runtime::{Pipeline, StageKind};
pub use pipeline::traits::{AudioWriter, InferenceEngine, ModelSource, Stage, StageData};
pub use pipeline::variance::VarianceStage;
pub use types::{GlideType, Note, Parameter, Phoneme, RetakeSpan, Segment, Word};
pub use vocab::Vocabulary;
pub use wire::{segment_from_cbor, segment_from_json, segment_to_cbor, segment_to_json};
