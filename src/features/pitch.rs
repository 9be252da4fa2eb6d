use crate::alignment::{fill_nearest, note_frame_durations, phone_frame_durations};
use crate::config::{Features, PitchConfig};
use crate::error::DsError;
use crate::features::{
    bool_tensor, f32_row, f64_row_as_f32, i64_row, insert_acceleration, spk_embed_tensor,
    TensorMap,
};
use crate::speaker::mix_speakers;
use crate::types::{Parameter, Segment};

/// `note_midi` value used when every note is a rest.
const ALL_REST_MIDI: f32 = -127.0;

/// Frame-level mask that is set inside the parameter's retake span.
pub(crate) fn retake_mask(param: &Parameter, frame_length: f64, n_frames: usize) -> Vec<bool> {
    let (start, end) = param
        .retake
        .to_frames(param.curve.timestep, frame_length, n_frames);
    let mut mask = vec![false; n_frames];
    if start < end {
        mask[start..end].fill(true);
    }
    mask
}

/// Inputs of the pitch decoder.
pub fn build_pitch_inputs(
    segment: &Segment,
    config: &PitchConfig,
    steps: i64,
) -> Result<TensorMap, DsError> {
    let frame_length = config.frame_length();
    let features = config.features;
    let notes: Vec<_> = segment.words.iter().flat_map(|word| &word.notes).collect();

    let pitch = segment
        .parameter("pitch")
        .ok_or_else(|| DsError::missing("pitch", vec!["pitch".into()]))?;

    let note_dur = note_frame_durations(notes.iter().copied(), frame_length);
    let n_frames = note_dur.iter().sum::<i64>().max(0) as usize;

    let midi: Vec<Option<f32>> = notes.iter().map(|note| note.midi().map(|m| m as f32)).collect();
    let note_midi = fill_nearest(&midi).unwrap_or_else(|| vec![ALL_REST_MIDI; notes.len()]);

    let mut map = TensorMap::new();
    map.insert("note_midi".into(), f32_row(note_midi)?);
    if features.contains(Features::PARAM_NOTE_REST) {
        let rests: Vec<bool> = notes.iter().map(|note| note.is_rest).collect();
        map.insert("note_rest".into(), bool_tensor(&rests, &[1, rests.len()])?);
    }
    map.insert("note_dur".into(), i64_row(note_dur)?);

    if features.contains(Features::LINGUISTIC_PREDICT_DUR) {
        map.insert(
            "ph_dur".into(),
            i64_row(phone_frame_durations(&segment.words, frame_length))?,
        );
    }

    map.insert(
        "pitch".into(),
        f64_row_as_f32(&pitch.curve.resample(frame_length, n_frames))?,
    );
    let retake = retake_mask(pitch, frame_length, n_frames);
    map.insert("retake".into(), bool_tensor(&retake, &[1, n_frames])?);

    if features.contains(Features::PARAM_EXPR) {
        let expr = match segment.parameter("expr") {
            Some(expr) => expr.curve.resample(frame_length, n_frames),
            None => {
                tracing::debug!("no expr curve in segment; using 1.0 throughout");
                vec![1.0; n_frames]
            }
        };
        map.insert("expr".into(), f64_row_as_f32(&expr)?);
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
    Ok(map)
}
