use crate::alignment::{phone_frame_durations, speedup_from_steps};
use crate::config::{AcousticConfig, Features};
use crate::error::DsError;
use crate::features::linguistic::{phoneme_languages, phoneme_tokens};
use crate::features::{
    f32_row, f32_scalar, f64_row_as_f32, i64_row, i64_scalar, insert_acceleration,
    spk_embed_tensor, TensorMap,
};
use crate::speaker::mix_speakers;
use crate::types::Segment;
use crate::vocab::Vocabulary;

/// Inputs split between the acoustic model and the vocoder that follows it.
#[derive(Debug, Default)]
pub struct AcousticInputs {
    pub acoustic: TensorMap,
    /// Extra vocoder inputs; holds a pitch-shifted `f0` when the vocoder gets
    /// its own pitch instead of the acoustic model's.
    pub vocoder: TensorMap,
}

impl AcousticInputs {
    pub fn has_vocoder_f0(&self) -> bool {
        self.vocoder.contains_key("f0")
    }
}

/// Parameters required when the matching embedding is enabled, in the order
/// they are reported when missing.
const REQUIRED_PARAMETERS: [(Features, &str); 4] = [
    (Features::PARAM_BREATHINESS, "breathiness"),
    (Features::PARAM_TENSION, "tension"),
    (Features::PARAM_VOICING, "voicing"),
    (Features::PARAM_ENERGY, "energy"),
];

pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2f64.powf((midi - 69.0) / 12.0)
}

/// `f0` scaled per frame by `2^(cents / 1200)`.
pub fn shift_f0(f0: &[f32], cents: &[f64]) -> Vec<f32> {
    f0.iter()
        .zip(cents.iter().chain(std::iter::repeat(&0.0)))
        .map(|(&hz, &c)| hz * 2f64.powf(c / 1200.0) as f32)
        .collect()
}

/// The diffusion `depth` input.
///
/// Variable-depth models take the raw float. Others take `round(depth * 1000)`,
/// which under shallow diffusion with quantized steps is also capped at
/// `max_depth` and rounded down to a multiple of the speedup.
pub fn depth_input(
    features: Features,
    max_depth: f32,
    steps: i64,
    depth: f32,
) -> Result<candle_core::Tensor, DsError> {
    if features.contains(Features::VARIABLE_DEPTH) {
        return f32_scalar(depth);
    }
    let mut depth_steps = (depth as f64 * 1000.0).round() as i64;
    if features.contains(Features::SHALLOW_DIFFUSION)
        && !features.contains(Features::CONTINUOUS_ACCELERATION)
    {
        if max_depth < 0.0 {
            return Err(DsError::infer(
                "build acoustic inputs",
                "max_depth is unset or negative in acoustic configuration",
            ));
        }
        depth_steps = depth_steps.min(max_depth as i64);
        let speedup = speedup_from_steps(steps);
        depth_steps = depth_steps / speedup * speedup;
    }
    i64_scalar(depth_steps)
}

/// Inputs of the acoustic model and, with a pitch-controllable vocoder and a
/// `tone_shift` curve, the vocoder's own `f0`.
pub fn build_acoustic_inputs(
    vocab: &Vocabulary,
    segment: &Segment,
    config: &AcousticConfig,
    vocoder_pitch_controllable: bool,
    steps: i64,
    depth: f32,
) -> Result<AcousticInputs, DsError> {
    let frame_length = config.frame_length();
    let features = config.features;

    let durations = phone_frame_durations(&segment.words, frame_length);
    let n_frames = durations.iter().sum::<i64>().max(0) as usize;

    let mut missing = Vec::new();
    if segment.parameter("pitch").is_none() {
        missing.push("pitch".to_string());
    }
    for (flag, name) in REQUIRED_PARAMETERS {
        if features.contains(flag) && segment.parameter(name).is_none() {
            missing.push(name.to_string());
        }
    }
    let Some(pitch) = segment.parameter("pitch").filter(|_| missing.is_empty()) else {
        return Err(DsError::missing("acoustic", missing));
    };

    let mut map = TensorMap::new();
    map.insert("tokens".into(), i64_row(phoneme_tokens(vocab, segment))?);
    if vocab.is_multi_language() {
        map.insert("languages".into(), i64_row(phoneme_languages(vocab, segment))?);
    }
    map.insert("durations".into(), i64_row(durations)?);

    let f0: Vec<f32> = pitch
        .curve
        .resample(frame_length, n_frames)
        .into_iter()
        .map(|midi| midi_to_hz(midi) as f32)
        .collect();

    let resampled = |name: &str, default: f64| match segment.parameter(name) {
        Some(param) => param.curve.resample(frame_length, n_frames),
        None => vec![default; n_frames],
    };
    if features.contains(Features::PARAM_GENDER) {
        map.insert("gender".into(), f64_row_as_f32(&resampled("gender", 0.0))?);
    }
    if features.contains(Features::PARAM_VELOCITY) {
        map.insert("velocity".into(), f64_row_as_f32(&resampled("velocity", 1.0))?);
    }
    for (flag, name) in REQUIRED_PARAMETERS {
        if features.contains(flag) {
            map.insert(name.into(), f64_row_as_f32(&resampled(name, 0.0))?);
        }
    }

    let dictionary = &config.dictionary;
    if !dictionary.speakers.is_empty() {
        let embed = mix_speakers(
            &dictionary.speaker_embeds,
            &dictionary.speakers,
            &segment.speakers,
            frame_length,
            n_frames,
        )?;
        map.insert("spk_embed".into(), spk_embed_tensor(embed, n_frames)?);
    }

    insert_acceleration(&mut map, features, steps)?;
    map.insert(
        "depth".into(),
        depth_input(features, config.max_depth, steps, depth)?,
    );

    let mut vocoder = TensorMap::new();
    if vocoder_pitch_controllable {
        if let Some(tone_shift) = segment.parameter("tone_shift") {
            let cents = tone_shift
                .curve
                .resample_with(frame_length, n_frames, false, 0.0);
            vocoder.insert("f0".into(), f32_row(shift_f0(&f0, &cents))?);
        }
    }
    map.insert("f0".into(), f32_row(f0)?);

    tracing::debug!(
        phones = segment.phone_count(),
        frames = n_frames,
        inputs = map.len(),
        shifted_f0 = vocoder.contains_key("f0"),
        "acoustic inputs built"
    );
    Ok(AcousticInputs {
        acoustic: map,
        vocoder,
    })
}
