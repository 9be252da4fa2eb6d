use crate::alignment::plan_phone_starts;
use crate::config::{DurationConfig, Features};
use crate::error::DsError;
use crate::features::duration::build_duration_inputs;
use crate::features::linguistic::build_linguistic_inputs;
use crate::pipeline::session::{output_values, StageSession};
use crate::pipeline::traits::{InferenceEngine, ModelSource, Stage, StageData};
use crate::types::Segment;

/// Phoneme duration prediction: linguistic encoder chained into the duration
/// decoder.
///
/// Writes only `Phoneme::start` of the words covered by the prediction.
pub struct DurationStage {
    config: DurationConfig,
    session: StageSession,
}

impl DurationStage {
    pub fn new(config: DurationConfig, engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            config,
            session: StageSession::new("duration", engine),
        }
    }

    pub fn config(&self) -> &DurationConfig {
        &self.config
    }

    pub fn run_in_place(&mut self, segment: &mut Segment) -> Result<(), DsError> {
        let frame_length = self.config.frame_length();
        let predict_duration = self.config.features.contains(Features::LINGUISTIC_PREDICT_DUR);

        let vocab = self.session.vocab()?;
        let linguistic = build_linguistic_inputs(vocab, segment, frame_length, predict_duration)?;
        let decoder = build_duration_inputs(segment, &self.config.dictionary)?;

        let outputs = self.session.run(vec![
            StageData::new(linguistic)
                .bind_output(1, "encoder_out")
                .bind_output(1, "x_masks"),
            StageData::new(decoder).with_output("ph_dur_pred"),
        ])?;
        let predicted = output_values(&outputs, "ph_dur_pred")?;

        let plan = plan_phone_starts(&segment.words, &predicted, frame_length);
        if !plan.is_complete(&segment.words) {
            tracing::warn!(
                predicted = predicted.len(),
                phones = segment.phone_count(),
                covered_words = plan.covered_words,
                words = segment.words.len(),
                "predicted durations do not cover every phone; later words keep their offsets"
            );
        }
        plan.apply(&mut segment.words);
        Ok(())
    }
}

impl Stage for DurationStage {
    fn open(&mut self) -> Result<(), DsError> {
        let models = [
            ModelSource::new(&self.config.linguistic),
            ModelSource::new(&self.config.dur),
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
