use crate::alignment::fill_nearest;
use crate::config::DictionaryConfig;
use crate::curve::SpeakerMixCurve;
use crate::error::DsError;
use crate::features::{i64_row, spk_embed_tensor, TensorMap};
use crate::speaker::mix_speakers;
use crate::types::{Note, Segment, Word};

/// `ph_midi` value used when the whole segment is rests.
const ALL_REST_MIDI: i64 = 0;

/// The note sounding at `start` seconds into a multi-note word: the first note
/// whose cumulative end lies past `start`, or the last note.
fn note_at(notes: &[Note], start: f64) -> Option<&Note> {
    let mut end = 0.0;
    for note in notes {
        end += note.duration;
        if end > start {
            return Some(note);
        }
    }
    notes.last()
}

/// Per-phone MIDI key; `None` for phones over a rest (or a word without notes).
pub fn phone_midi(words: &[Word]) -> Vec<Option<i64>> {
    words
        .iter()
        .flat_map(|word| {
            word.phones.iter().map(move |phone| {
                note_at(&word.notes, phone.start)
                    .filter(|note| !note.is_rest)
                    .map(|note| note.key as i64)
            })
        })
        .collect()
}

/// Inputs of the phoneme duration decoder.
///
/// Speaker embeddings are laid out per phone, using the static (first-sample)
/// weights of the segment's speaker mix.
pub fn build_duration_inputs(
    segment: &Segment,
    dictionary: &DictionaryConfig,
) -> Result<TensorMap, DsError> {
    let mut map = TensorMap::new();
    let phone_count = segment.phone_count();

    let ph_midi = fill_nearest(&phone_midi(&segment.words))
        .unwrap_or_else(|| vec![ALL_REST_MIDI; phone_count]);
    map.insert("ph_midi".into(), i64_row(ph_midi)?);

    if !dictionary.speakers.is_empty() {
        let static_mix = SpeakerMixCurve::from_static_mix(segment.speakers.static_weights());
        let embed = mix_speakers(
            &dictionary.speaker_embeds,
            &dictionary.speakers,
            &static_mix,
            1.0,
            phone_count,
        )?;
        map.insert("spk_embed".into(), spk_embed_tensor(embed, phone_count)?);
    }
    Ok(map)
}
