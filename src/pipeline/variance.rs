use crate::config::{Features, InferenceOptions, VarianceConfig};
use crate::error::DsError;
use crate::features::linguistic::build_linguistic_inputs;
use crate::features::variance::{build_variance_inputs, expected_parameters};
use crate::pipeline::session::{output_values, StageSession};
use crate::pipeline::traits::{InferenceEngine, ModelSource, Stage, StageData};
use crate::types::{Parameter, Segment};

/// Energy/breathiness/tension/voicing prediction. Each predicted parameter
/// replaces the segment's curve of the same name.
pub struct VarianceStage {
    config: VarianceConfig,
    session: StageSession,
    steps: i64,
    depth: f32,
}

impl VarianceStage {
    pub fn new(
        config: VarianceConfig,
        engine: Box<dyn InferenceEngine>,
        options: InferenceOptions,
    ) -> Self {
        Self {
            config,
            session: StageSession::new("variance", engine),
            steps: options.default_steps,
            depth: options.default_depth,
        }
    }

    pub fn config(&self) -> &VarianceConfig {
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
        let decoder = build_variance_inputs(segment, &self.config, self.steps)?;
        let names = expected_parameters(self.config.features);

        let mut encoder = StageData::new(linguistic).bind_output(1, "encoder_out");
        if !predict_duration {
            encoder = encoder.bind_input(1, "ph_dur");
        }
        let mut variance = StageData::new(decoder);
        for name in &names {
            variance = variance.with_output(format!("{name}_pred"));
        }
        let outputs = self.session.run(vec![encoder, variance])?;

        let mut predicted = Vec::with_capacity(names.len());
        for name in names {
            let samples = output_values(&outputs, &format!("{name}_pred"))?
                .into_iter()
                .map(f64::from)
                .collect();
            predicted.push(Parameter::predicted(name, samples, frame_length));
        }
        for param in predicted {
            segment.parameters.insert(param.tag.clone(), param);
        }
        Ok(())
    }
}

impl Stage for VarianceStage {
    fn open(&mut self) -> Result<(), DsError> {
        let models = [
            ModelSource::new(&self.config.linguistic),
            ModelSource::new(&self.config.variance),
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
