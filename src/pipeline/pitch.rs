use crate::config::{Features, InferenceOptions, PitchConfig};
use crate::error::DsError;
use crate::features::linguistic::build_linguistic_inputs;
use crate::features::pitch::build_pitch_inputs;
use crate::pipeline::session::{output_values, StageSession};
use crate::pipeline::traits::{InferenceEngine, ModelSource, Stage, StageData};
use crate::types::{Parameter, Segment};

/// Pitch curve prediction. Replaces the segment's `pitch` parameter with the
/// model output on the frame grid, retake spanning all of it.
pub struct PitchStage {
    config: PitchConfig,
    session: StageSession,
    steps: i64,
    depth: f32,
}

impl PitchStage {
    pub fn new(
        config: PitchConfig,
        engine: Box<dyn InferenceEngine>,
        options: InferenceOptions,
    ) -> Self {
        Self {
            config,
            session: StageSession::new("pitch", engine),
            steps: options.default_steps,
            depth: options.default_depth,
        }
    }

    pub fn config(&self) -> &PitchConfig {
        &self.config
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

    pub fn run_in_place(&mut self, segment: &mut Segment) -> Result<(), DsError> {
        let frame_length = self.config.frame_length();
        let predict_duration = self.config.features.contains(Features::LINGUISTIC_PREDICT_DUR);

        let vocab = self.session.vocab()?;
        let linguistic = build_linguistic_inputs(vocab, segment, frame_length, predict_duration)?;
        let decoder = build_pitch_inputs(segment, &self.config, self.steps)?;

        let mut encoder = StageData::new(linguistic).bind_output(1, "encoder_out");
        if !predict_duration {
            encoder = encoder.bind_input(1, "ph_dur");
        }
        let outputs = self.session.run(vec![
            encoder,
            StageData::new(decoder).with_output("pitch_pred"),
        ])?;

        let samples = output_values(&outputs, "pitch_pred")?
            .into_iter()
            .map(f64::from)
            .collect();
        segment.parameters.insert(
            "pitch".into(),
            Parameter::predicted("pitch", samples, frame_length),
        );
        Ok(())
    }
}

impl Stage for PitchStage {
    fn open(&mut self) -> Result<(), DsError> {
        let models = [
            ModelSource::new(&self.config.linguistic),
            ModelSource::new(&self.config.pitch),
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
