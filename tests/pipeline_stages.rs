use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use candle_core::{Device, Tensor};
use dsinfer::features::TensorMapExt;
use dsinfer::pipeline::traits::{BindingSource, StageData};
use dsinfer::{
    segment_from_json, segment_to_json, AcousticConfig, AcousticStage, AudioWriter,
    DictionaryConfig, DsError, DurationConfig, DurationStage, Features, InferenceEngine,
    InferenceOptions, ModelSource, Note, Parameter, Phoneme, PipelineBuilder, PitchConfig,
    PitchStage, SampleCurve, Segment, Stage, StageKind, StatusCode, TensorMap, VarianceConfig,
    VarianceStage, VocoderConfig, Word,
};
use tempfile::TempDir;

#[derive(Default)]
struct Recording {
    opened: Vec<Vec<ModelSource>>,
    runs: Vec<Vec<StageData>>,
}

/// Answers every run with the same outputs and keeps what it was sent.
struct MockEngine {
    recording: Arc<Mutex<Recording>>,
    outputs: TensorMap,
    fail_run: bool,
    open: bool,
}

impl MockEngine {
    fn new(outputs: TensorMap) -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        let engine = Self {
            recording: Arc::clone(&recording),
            outputs,
            fail_run: false,
            open: false,
        };
        (engine, recording)
    }

    fn failing() -> (Self, Arc<Mutex<Recording>>) {
        let (mut engine, recording) = Self::new(TensorMap::new());
        engine.fail_run = true;
        (engine, recording)
    }
}

impl InferenceEngine for MockEngine {
    fn open(&mut self, models: &[ModelSource]) -> Result<(), DsError> {
        self.recording.lock().unwrap().opened.push(models.to_vec());
        self.open = true;
        Ok(())
    }

    fn run(&mut self, stages: Vec<StageData>) -> Result<TensorMap, DsError> {
        self.recording.lock().unwrap().runs.push(stages);
        if self.fail_run {
            return Err(DsError::Infer {
                context: "mock run",
                message: "engine failure".to_string(),
            });
        }
        Ok(self.outputs.clone())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Default)]
struct CapturedAudio {
    path: Option<PathBuf>,
    samples: Vec<f32>,
    sample_rate: u32,
}

struct MockWriter(Arc<Mutex<CapturedAudio>>);

impl AudioWriter for MockWriter {
    fn write(&self, path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), DsError> {
        let mut captured = self.0.lock().unwrap();
        captured.path = Some(path.to_path_buf());
        captured.samples = samples.to_vec();
        captured.sample_rate = sample_rate;
        Ok(())
    }
}

fn f32_output(values: &[f32]) -> Tensor {
    Tensor::from_vec(values.to_vec(), (1, values.len()), &Device::Cpu).unwrap()
}

fn outputs(entries: &[(&str, &[f32])]) -> TensorMap {
    entries
        .iter()
        .map(|(name, values)| (name.to_string(), f32_output(values)))
        .collect()
}

fn phone(token: &str, start: f64) -> Phoneme {
    Phoneme {
        token: token.to_string(),
        start,
        ..Phoneme::default()
    }
}

/// One word `a b` over a single 1.0 s note at key 60, pitch curve included.
fn one_word_segment() -> Segment {
    let mut segment = Segment {
        words: vec![Word {
            phones: vec![phone("a", 0.0), phone("b", 0.5)],
            notes: vec![Note {
                key: 60,
                duration: 1.0,
                ..Note::default()
            }],
        }],
        ..Segment::default()
    };
    segment.parameters.insert(
        "pitch".to_string(),
        Parameter::predicted("pitch", vec![60.0; 8], 0.125),
    );
    segment
}

/// Phoneme list `SP a b` plus a dictionary pointing at it.
fn dictionary(dir: &TempDir) -> DictionaryConfig {
    let phonemes = dir.path().join("phonemes.txt");
    std::fs::write(&phonemes, "SP\na\nb\n").unwrap();
    DictionaryConfig {
        phonemes,
        ..DictionaryConfig::default()
    }
}

// hop 1 at 8 Hz gives 0.125 s frames.
fn duration_config(dir: &TempDir) -> DurationConfig {
    DurationConfig {
        dictionary: dictionary(dir),
        linguistic: dir.path().join("linguistic.onnx"),
        dur: dir.path().join("dur.onnx"),
        hop_size: 1,
        sample_rate: 8,
        ..DurationConfig::default()
    }
}

fn pitch_config(dir: &TempDir) -> PitchConfig {
    PitchConfig {
        dictionary: dictionary(dir),
        linguistic: dir.path().join("linguistic.onnx"),
        pitch: dir.path().join("pitch.onnx"),
        hop_size: 1,
        sample_rate: 8,
        ..PitchConfig::default()
    }
}

fn variance_config(dir: &TempDir, features: Features) -> VarianceConfig {
    VarianceConfig {
        dictionary: dictionary(dir),
        linguistic: dir.path().join("linguistic.onnx"),
        variance: dir.path().join("variance.onnx"),
        hop_size: 1,
        sample_rate: 8,
        features,
        ..VarianceConfig::default()
    }
}

fn acoustic_configs(dir: &TempDir) -> (AcousticConfig, VocoderConfig) {
    let acoustic = AcousticConfig {
        dictionary: dictionary(dir),
        acoustic: dir.path().join("acoustic.onnx"),
        hop_size: 1,
        sample_rate: 8,
        ..AcousticConfig::default()
    };
    let vocoder = VocoderConfig {
        model: dir.path().join("vocoder.onnx"),
        hop_size: 1,
        sample_rate: 8,
        ..VocoderConfig::default()
    };
    (acoustic, vocoder)
}

#[test]
fn duration_stage_redistributes_predicted_frames() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, recording) = MockEngine::new(outputs(&[("ph_dur_pred", &[3.0, 5.0])]));
    let mut stage = DurationStage::new(duration_config(&dir), Box::new(engine));
    stage.open().unwrap();

    let mut segment = one_word_segment();
    stage.run_in_place(&mut segment).unwrap();

    let starts: Vec<f64> = segment.words[0].phones.iter().map(|p| p.start).collect();
    assert_eq!(starts.len(), 2);
    assert!(starts[0].abs() < 1e-9);
    assert!((starts[1] - 0.375).abs() < 1e-9);
    assert_eq!(segment.words[0].notes[0].duration, 1.0);

    let recording = recording.lock().unwrap();
    assert_eq!(
        recording.opened[0],
        vec![
            ModelSource::new(dir.path().join("linguistic.onnx")),
            ModelSource::new(dir.path().join("dur.onnx")),
        ]
    );
    let run = &recording.runs[0];
    assert_eq!(run.len(), 2);

    let encoder = &run[0];
    let bound: Vec<(usize, BindingSource, &str)> = encoder
        .bindings
        .iter()
        .map(|b| (b.target_stage, b.source, b.name.as_str()))
        .collect();
    assert_eq!(
        bound,
        vec![
            (1, BindingSource::Output, "encoder_out"),
            (1, BindingSource::Output, "x_masks"),
        ]
    );
    assert_eq!(encoder.inputs.i64_values("tokens").unwrap(), vec![1, 2]);
    assert_eq!(encoder.inputs.i64_values("ph_dur").unwrap(), vec![4, 4]);
    assert!(!encoder.inputs.contains_key("languages"));

    let decoder = &run[1];
    assert_eq!(decoder.output_names, vec!["ph_dur_pred".to_string()]);
    assert_eq!(decoder.inputs.i64_values("ph_midi").unwrap(), vec![60, 60]);
    assert!(!decoder.inputs.contains_key("spk_embed"));
}

#[test]
fn failed_duration_run_leaves_segment_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _recording) = MockEngine::failing();
    let mut stage = DurationStage::new(duration_config(&dir), Box::new(engine));
    stage.open().unwrap();

    let mut segment = one_word_segment();
    let before = segment.clone();
    let err = stage.run_in_place(&mut segment).unwrap_err();
    assert_eq!(err.code(), StatusCode::InferError);
    assert_eq!(segment, before);
}

#[test]
fn missing_prediction_output_is_an_infer_error() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _recording) = MockEngine::new(TensorMap::new());
    let mut stage = DurationStage::new(duration_config(&dir), Box::new(engine));
    stage.open().unwrap();

    let mut segment = one_word_segment();
    let before = segment.clone();
    let err = stage.run_in_place(&mut segment).unwrap_err();
    assert_eq!(err.code(), StatusCode::InferError);
    assert_eq!(segment, before);
}

#[test]
fn closed_stage_rejects_runs() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, recording) = MockEngine::new(outputs(&[("pitch_pred", &[0.0; 8])]));
    let mut stage = PitchStage::new(
        pitch_config(&dir),
        Box::new(engine),
        InferenceOptions::default(),
    );
    assert!(!stage.is_open());

    let mut segment = one_word_segment();
    let err = stage.run_in_place(&mut segment).unwrap_err();
    assert_eq!(err.code(), StatusCode::InferError);

    stage.open().unwrap();
    assert!(stage.is_open());
    stage.close();
    assert!(!stage.is_open());
    assert!(stage.run_in_place(&mut segment).is_err());
    assert!(recording.lock().unwrap().runs.is_empty());
}

#[test]
fn open_fails_on_missing_phoneme_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = duration_config(&dir);
    config.dictionary.phonemes = dir.path().join("absent.txt");
    let (engine, recording) = MockEngine::new(TensorMap::new());
    let mut stage = DurationStage::new(config, Box::new(engine));

    let err = stage.open().unwrap_err();
    assert_eq!(err.code(), StatusCode::ModelLoadError);
    assert!(!stage.is_open());
    assert!(recording.lock().unwrap().opened.is_empty());
}

#[test]
fn pitch_stage_writes_predicted_curve() {
    let dir = tempfile::tempdir().unwrap();
    let predicted = [61.0, 61.5, 62.0, 62.5, 63.0, 63.5, 64.0, 64.5];
    let (engine, recording) = MockEngine::new(outputs(&[("pitch_pred", &predicted)]));
    let options = InferenceOptions {
        default_steps: 10,
        default_depth: 1.0,
    };
    let mut stage = PitchStage::new(pitch_config(&dir), Box::new(engine), options);
    stage.open().unwrap();

    let mut segment = one_word_segment();
    stage.run_in_place(&mut segment).unwrap();

    let pitch = segment.parameter("pitch").unwrap();
    assert_eq!(pitch.curve.timestep, 0.125);
    assert_eq!(pitch.curve.samples.len(), 8);
    assert!((pitch.curve.samples[3] - 62.5).abs() < 1e-6);
    assert_eq!((pitch.retake.start, pitch.retake.end), (0, 8));

    let recording = recording.lock().unwrap();
    let run = &recording.runs[0];
    let bound: Vec<(BindingSource, &str)> = run[0]
        .bindings
        .iter()
        .map(|b| (b.source, b.name.as_str()))
        .collect();
    assert_eq!(
        bound,
        vec![
            (BindingSource::Output, "encoder_out"),
            (BindingSource::Input, "ph_dur"),
        ]
    );
    let decoder = &run[1];
    assert_eq!(decoder.output_names, vec!["pitch_pred".to_string()]);
    assert_eq!(decoder.inputs.f32_values("note_midi").unwrap(), vec![60.0]);
    assert_eq!(decoder.inputs.i64_values("note_dur").unwrap(), vec![8]);
    assert_eq!(decoder.inputs.i64_values("speedup").unwrap(), vec![100]);
    assert_eq!(decoder.inputs.dims_of("retake"), Some(vec![1, 8]));
    assert!(!decoder.inputs.contains_key("ph_dur"));
}

#[test]
fn pitch_stage_requires_a_pitch_curve() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, recording) = MockEngine::new(outputs(&[("pitch_pred", &[0.0; 8])]));
    let mut stage = PitchStage::new(
        pitch_config(&dir),
        Box::new(engine),
        InferenceOptions::default(),
    );
    stage.open().unwrap();

    let mut segment = one_word_segment();
    segment.parameters.clear();
    let err = stage.run_in_place(&mut segment).unwrap_err();
    assert!(matches!(err, DsError::MissingParameters { .. }));
    assert_eq!(err.code(), StatusCode::InferError);
    assert!(segment.parameters.is_empty());
    assert!(recording.lock().unwrap().runs.is_empty());
}

#[test]
fn variance_stage_applies_each_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let features = Features::PARAM_ENERGY | Features::PARAM_BREATHINESS;
    let (engine, recording) = MockEngine::new(outputs(&[
        ("energy_pred", &[-20.0; 8]),
        ("breathiness_pred", &[-60.0; 8]),
    ]));
    let mut stage = VarianceStage::new(
        variance_config(&dir, features),
        Box::new(engine),
        InferenceOptions::default(),
    );
    stage.open().unwrap();

    let mut segment = one_word_segment();
    stage.run_in_place(&mut segment).unwrap();

    let energy = segment.parameter("energy").unwrap();
    assert_eq!(energy.curve.samples, vec![-20.0; 8]);
    let breathiness = segment.parameter("breathiness").unwrap();
    assert_eq!(breathiness.curve.samples, vec![-60.0; 8]);
    assert_eq!(breathiness.retake.end, 8);
    assert!(segment.parameter("tension").is_none());

    let recording = recording.lock().unwrap();
    let decoder = &recording.runs[0][1];
    assert_eq!(
        decoder.output_names,
        vec!["energy_pred".to_string(), "breathiness_pred".to_string()]
    );
    assert_eq!(decoder.inputs.dims_of("retake"), Some(vec![1, 8, 2]));
    assert_eq!(decoder.inputs.f32_values("energy").unwrap(), vec![0.0; 8]);
}

#[test]
fn variance_stage_keeps_segment_when_an_output_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let features = Features::PARAM_ENERGY | Features::PARAM_TENSION;
    let (engine, _recording) = MockEngine::new(outputs(&[("energy_pred", &[1.0; 8])]));
    let mut stage = VarianceStage::new(
        variance_config(&dir, features),
        Box::new(engine),
        InferenceOptions::default(),
    );
    stage.open().unwrap();

    let mut segment = one_word_segment();
    let before = segment.clone();
    assert!(stage.run_in_place(&mut segment).is_err());
    assert_eq!(segment, before);
}

#[test]
fn acoustic_stage_writes_vocoder_waveform() {
    let dir = tempfile::tempdir().unwrap();
    let (acoustic, vocoder) = acoustic_configs(&dir);
    let (engine, recording) = MockEngine::new(outputs(&[("waveform", &[0.1, -0.2, 0.3])]));
    let captured = Arc::new(Mutex::new(CapturedAudio::default()));
    let mut stage = AcousticStage::new(
        acoustic,
        vocoder,
        Box::new(engine),
        InferenceOptions::default(),
    )
    .with_audio_writer(Box::new(MockWriter(Arc::clone(&captured))));
    stage.open().unwrap();

    let segment = one_word_segment();
    let out = dir.path().join("out.wav");
    stage.run_and_save_audio(&segment, &out).unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured.path.as_deref(), Some(out.as_path()));
    assert_eq!(captured.samples, vec![0.1, -0.2, 0.3]);
    assert_eq!(captured.sample_rate, 8);

    let recording = recording.lock().unwrap();
    assert!(!recording.opened[0][0].prefer_cpu);
    assert!(recording.opened[0][1].prefer_cpu);

    let run = &recording.runs[0];
    let bound: Vec<(BindingSource, &str)> = run[0]
        .bindings
        .iter()
        .map(|b| (b.source, b.name.as_str()))
        .collect();
    assert_eq!(
        bound,
        vec![(BindingSource::Output, "mel"), (BindingSource::Input, "f0")]
    );
    assert_eq!(run[0].inputs.i64_values("durations").unwrap(), vec![4, 4]);
    let f0 = run[0].inputs.f32_values("f0").unwrap();
    assert_eq!(f0.len(), 8);
    assert!((f0[0] - 261.6256).abs() < 1e-2);
    assert!(run[1].inputs.is_empty());
    assert_eq!(run[1].output_names, vec!["waveform".to_string()]);
}

#[test]
fn pitch_controllable_vocoder_takes_shifted_f0() {
    let dir = tempfile::tempdir().unwrap();
    let (acoustic, mut vocoder) = acoustic_configs(&dir);
    vocoder.pitch_controllable = true;
    let (engine, recording) = MockEngine::new(outputs(&[("waveform", &[0.0; 4])]));
    let mut stage = AcousticStage::new(
        acoustic,
        vocoder,
        Box::new(engine),
        InferenceOptions::default(),
    );
    stage.open().unwrap();

    // One octave up over the whole segment.
    let mut segment = one_word_segment();
    segment.parameters.insert(
        "tone_shift".to_string(),
        Parameter::predicted("tone_shift", vec![1200.0; 8], 0.125),
    );
    stage.synthesize(&segment).unwrap();

    let recording = recording.lock().unwrap();
    let run = &recording.runs[0];
    let bound: Vec<(BindingSource, &str)> = run[0]
        .bindings
        .iter()
        .map(|b| (b.source, b.name.as_str()))
        .collect();
    assert_eq!(bound, vec![(BindingSource::Output, "mel")]);

    let f0 = run[0].inputs.f32_values("f0").unwrap();
    let shifted = run[1].inputs.f32_values("f0").unwrap();
    assert_eq!(shifted.len(), 8);
    for (base, up) in f0.iter().zip(&shifted) {
        assert!((up - 2.0 * base).abs() < 1e-3);
    }
}

#[test]
fn plain_vocoder_ignores_tone_shift() {
    let dir = tempfile::tempdir().unwrap();
    let (acoustic, vocoder) = acoustic_configs(&dir);
    let (engine, recording) = MockEngine::new(outputs(&[("waveform", &[0.0; 4])]));
    let mut stage = AcousticStage::new(
        acoustic,
        vocoder,
        Box::new(engine),
        InferenceOptions::default(),
    );
    stage.open().unwrap();

    let mut segment = one_word_segment();
    segment.parameters.insert(
        "tone_shift".to_string(),
        Parameter::predicted("tone_shift", vec![1200.0; 8], 0.125),
    );
    stage.synthesize(&segment).unwrap();

    let recording = recording.lock().unwrap();
    let run = &recording.runs[0];
    assert!(run[0]
        .bindings
        .iter()
        .any(|b| b.source == BindingSource::Input && b.name == "f0"));
    assert!(!run[1].inputs.contains_key("f0"));
}

#[test]
fn acoustic_stage_refuses_mismatched_vocoder() {
    let dir = tempfile::tempdir().unwrap();
    let (acoustic, mut vocoder) = acoustic_configs(&dir);
    vocoder.sample_rate = 16;
    let (engine, recording) = MockEngine::new(TensorMap::new());
    let mut stage = AcousticStage::new(
        acoustic,
        vocoder,
        Box::new(engine),
        InferenceOptions::default(),
    );

    let err = stage.open().unwrap_err();
    assert_eq!(err.code(), StatusCode::ModelLoadError);
    assert!(!stage.is_open());
    assert!(recording.lock().unwrap().opened.is_empty());
}

#[test]
fn pipeline_runs_stages_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (acoustic, vocoder) = acoustic_configs(&dir);
    let captured = Arc::new(Mutex::new(CapturedAudio::default()));

    let mut pipeline = PipelineBuilder::new(InferenceOptions::default())
        .with_duration(duration_config(&dir))
        .with_pitch(pitch_config(&dir))
        .with_acoustic(acoustic, vocoder)
        .with_audio_writer(Box::new(MockWriter(Arc::clone(&captured))))
        .with_engine_factory(|| {
            let (engine, _recording) = MockEngine::new(outputs(&[
                ("ph_dur_pred", &[3.0, 5.0]),
                ("pitch_pred", &[62.0; 8]),
                ("waveform", &[0.5; 4]),
            ]));
            Ok(Box::new(engine) as Box<dyn InferenceEngine>)
        })
        .build()
        .unwrap();
    assert_eq!(
        pipeline.stages(),
        vec![StageKind::Duration, StageKind::Pitch, StageKind::Acoustic]
    );
    pipeline.open().unwrap();

    let mut segment = one_word_segment();
    segment.parameters.clear();
    segment.parameters.insert(
        "pitch".to_string(),
        Parameter {
            tag: "pitch".to_string(),
            curve: SampleCurve::filled(60.0, 8, 0.125),
            retake: dsinfer::RetakeSpan::full(8),
        },
    );

    let mut seen = Vec::new();
    pipeline
        .run_with(&mut segment, &dir.path().join("out.wav"), |kind, segment| {
            seen.push((kind, segment.words[0].phones[1].start));
            Ok(())
        })
        .unwrap();
    pipeline.close();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, StageKind::Duration);
    assert!((seen[0].1 - 0.375).abs() < 1e-9);
    assert_eq!(seen[1].0, StageKind::Pitch);
    assert_eq!(segment.parameter("pitch").unwrap().curve.samples, vec![62.0; 8]);
    assert_eq!(captured.lock().unwrap().samples, vec![0.5; 4]);

    let restored = segment_from_json(&segment_to_json(&segment).unwrap()).unwrap();
    assert!((restored.words[0].phones[1].start - 0.375).abs() < 1e-9);
    assert_eq!(restored.parameter("pitch").unwrap().curve.samples, vec![62.0; 8]);
}
