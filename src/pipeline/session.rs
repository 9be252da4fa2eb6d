use crate::config::DictionaryConfig;
use crate::error::DsError;
use crate::features::{tensor_to_f32, TensorMap};
use crate::pipeline::traits::{InferenceEngine, ModelSource, StageData};
use crate::vocab::Vocabulary;

/// Engine handle plus the dictionaries a stage loads on `open`.
pub(crate) struct StageSession {
    name: &'static str,
    engine: Box<dyn InferenceEngine>,
    vocab: Option<Vocabulary>,
}

impl StageSession {
    pub(crate) fn new(name: &'static str, engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            name,
            engine,
            vocab: None,
        }
    }

    pub(crate) fn open(
        &mut self,
        dictionary: &DictionaryConfig,
        multi_language: bool,
        models: &[ModelSource],
    ) -> Result<(), DsError> {
        self.close();

        let languages = if multi_language {
            let path = dictionary.languages.as_deref().ok_or_else(|| {
                DsError::model_load(
                    "open stage",
                    format!("the {} model uses language ids but no languages file is configured", self.name),
                )
            })?;
            Some(path)
        } else {
            None
        };
        let vocab = Vocabulary::load(&dictionary.phonemes, languages)?;
        self.engine.open(models)?;

        tracing::info!(
            stage = self.name,
            models = models.len(),
            phonemes = vocab.phonemes.len(),
            "stage opened"
        );
        self.vocab = Some(vocab);
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        if self.vocab.take().is_some() {
            tracing::debug!(stage = self.name, "stage closed");
        }
        self.engine.close();
    }

    pub(crate) fn is_open(&self) -> bool {
        self.vocab.is_some()
    }

    /// Fails when the stage is not open.
    pub(crate) fn vocab(&self) -> Result<&Vocabulary, DsError> {
        self.vocab.as_ref().ok_or_else(|| {
            DsError::infer("run stage", format!("the {} stage is not open", self.name))
        })
    }

    pub(crate) fn run(&mut self, stages: Vec<StageData>) -> Result<TensorMap, DsError> {
        self.vocab()?;
        self.engine.run(stages)
    }
}

/// A named output as host `f32` values.
pub(crate) fn output_values(outputs: &TensorMap, name: &str) -> Result<Vec<f32>, DsError> {
    let tensor = outputs.get(name).ok_or_else(|| {
        DsError::infer("read model output", format!("model produced no \"{name}\""))
    })?;
    tensor_to_f32(tensor, "read model output")
}
