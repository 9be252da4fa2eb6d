use crate::alignment::{phone_frame_durations, total_frames};
use crate::config::{Features, VarianceConfig};
use crate::error::DsError;
use crate::features::pitch::retake_mask;
use crate::features::{
    bool_tensor, f64_row_as_f32, i64_row, insert_acceleration, spk_embed_tensor, TensorMap,
};
use crate::speaker::mix_speakers;
use crate::types::Segment;

/// Variance parameters in model input order, with the feature enabling each.
pub const VARIANCE_PARAMETERS: [(Features, &str); 4] = [
    (Features::PARAM_ENERGY, "energy"),
    (Features::PARAM_BREATHINESS, "breathiness"),
    (Features::PARAM_TENSION, "tension"),
    (Features::PARAM_VOICING, "voicing"),
];

/// Names of the parameters a variance model with `features` predicts.
pub fn expected_parameters(features: Features) -> Vec<&'static str> {
    VARIANCE_PARAMETERS
        .iter()
        .filter(|(flag, _)| features.contains(*flag))
        .map(|&(_, name)| name)
        .collect()
}

/// Inputs of the multi-variance decoder.
///
/// A requested parameter absent from the segment is sent as zeros with the
/// whole span marked for retake. `retake` is `[1, frames, parameters]`.
pub fn build_variance_inputs(
    segment: &Segment,
    config: &VarianceConfig,
    steps: i64,
) -> Result<TensorMap, DsError> {
    let frame_length = config.frame_length();
    let features = config.features;
    let n_frames = total_frames(&segment.words, frame_length);

    let pitch = segment
        .parameter("pitch")
        .ok_or_else(|| DsError::missing("variance", vec!["pitch".into()]))?;

    let expected = expected_parameters(features);
    if expected.is_empty() {
        return Err(DsError::infer(
            "build variance inputs",
            "the variance model config does not predict any parameters",
        ));
    }

    let mut map = TensorMap::new();
    map.insert(
        "pitch".into(),
        f64_row_as_f32(&pitch.curve.resample(frame_length, n_frames))?,
    );
    if features.contains(Features::LINGUISTIC_PREDICT_DUR) {
        map.insert(
            "ph_dur".into(),
            i64_row(phone_frame_durations(&segment.words, frame_length))?,
        );
    }

    let n_params = expected.len();
    let mut retake = vec![false; n_frames * n_params];
    for (p, name) in expected.iter().enumerate() {
        let (values, mask) = match segment.parameter(name) {
            Some(param) => (
                param.curve.resample(frame_length, n_frames),
                retake_mask(param, frame_length, n_frames),
            ),
            None => (vec![0.0; n_frames], vec![true; n_frames]),
        };
        for (frame, &set) in mask.iter().enumerate() {
            retake[frame * n_params + p] = set;
        }
        map.insert((*name).into(), f64_row_as_f32(&values)?);
    }
    map.insert(
        "retake".into(),
        bool_tensor(&retake, &[1, n_frames, n_params])?,
    );

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
    Ok(map)
}
