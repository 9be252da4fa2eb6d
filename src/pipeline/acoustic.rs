use std::path::Path;

use crate::config::{AcousticConfig, Features, InferenceOptions, VocoderConfig};
use crate::error::DsError;
use crate::features::acoustic::build_acoustic_inputs;
use crate::pipeline::defaults::WavFileWriter;
use crate::pipeline::session::{output_values, StageSession};
use crate::pipeline::traits::{AudioWriter, InferenceEngine, ModelSource, Stage, StageData};
use crate::types::Segment;

/// Acoustic model chained into the vocoder. Reads the segment without
/// modifying it.
pub struct AcousticStage {
    config: AcousticConfig,
    vocoder: VocoderConfig,
    session: StageSession,
    audio_writer: Box<dyn AudioWriter>,
    steps: i64,
    depth: f32,
}

impl AcousticStage {
    pub fn new(
        config: AcousticConfig,
        vocoder: VocoderConfig,
        engine: Box<dyn InferenceEngine>,
        options: InferenceOptions,
    ) -> Self {
        Self {
            config,
            vocoder,
            session: StageSession::new("acoustic", engine),
            audio_writer: Box::new(WavFileWriter),
            steps: options.default_steps,
            depth: options.default_depth,
        }
    }

    pub fn with_audio_writer(mut self, audio_writer: Box<dyn AudioWriter>) -> Self {
        self.audio_writer = audio_writer;
        self
    }

    pub fn config(&self) -> &AcousticConfig {
        &self.config
    }

    pub fn vocoder_config(&self) -> &VocoderConfig {
        &self.vocoder
    }

    pub fn steps(&self) -> i64 {
        self.steps
    }

    pub fn set_steps(&mut self, steps: i64) {
        self.steps = steps;
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth;
    }

    /// Runs both models and returns the vocoder's `waveform`.
    pub fn synthesize(&mut self, segment: &Segment) -> Result<Vec<f32>, DsError> {
        let vocab = self.session.vocab()?;
        let inputs = build_acoustic_inputs(
            vocab,
            segment,
            &self.config,
            self.vocoder.pitch_controllable,
            self.steps,
            self.depth,
        )?;

        let has_vocoder_f0 = inputs.has_vocoder_f0();
        let mut acoustic = StageData::new(inputs.acoustic).bind_output(1, "mel");
        if !has_vocoder_f0 {
            acoustic = acoustic.bind_input(1, "f0");
        }
        let vocoder = StageData::new(inputs.vocoder).with_output("waveform");

        let outputs = self.session.run(vec![acoustic, vocoder])?;
        output_values(&outputs, "waveform")
    }

    /// Synthesizes and writes the waveform at the vocoder sample rate.
    pub fn run_and_save_audio(&mut self, segment: &Segment, path: &Path) -> Result<(), DsError> {
        let waveform = self.synthesize(segment)?;
        self.audio_writer
            .write(path, &waveform, self.vocoder.sample_rate)
    }
}

impl Stage for AcousticStage {
    fn open(&mut self) -> Result<(), DsError> {
        self.config.check_vocoder(&self.vocoder)?;
        let models = [
            ModelSource::new(&self.config.acoustic),
            ModelSource::on_cpu(&self.vocoder.model),
        ];
        let multi_language = self.config.features.contains(Features::MULTI_LANGUAGE);
        self.session
            .open(&self.config.dictionary, multi_language, &models)
    }

    fn close(&mut self) {
        self.session.close();
    }

    fn is_open(&self) -> bool {
        self.session.is_open()
    }
}
