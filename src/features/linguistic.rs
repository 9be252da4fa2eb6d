use crate::alignment::{phone_frame_durations, word_frame_durations};
use crate::error::DsError;
use crate::features::{i64_row, TensorMap};
use crate::types::Segment;
use crate::vocab::Vocabulary;

pub fn phoneme_tokens(vocab: &Vocabulary, segment: &Segment) -> Vec<i64> {
    segment
        .words
        .iter()
        .flat_map(|word| &word.phones)
        .map(|phone| vocab.token_id(&phone.token, &phone.language))
        .collect()
}

pub fn phoneme_languages(vocab: &Vocabulary, segment: &Segment) -> Vec<i64> {
    segment
        .words
        .iter()
        .flat_map(|word| &word.phones)
        .map(|phone| vocab.language_id(&phone.language))
        .collect()
}

/// Inputs of the shared linguistic encoder.
///
/// Models that predict durations take `word_div` (phones per word) and
/// `word_dur` (frames per word); the others take `ph_dur` directly.
pub fn build_linguistic_inputs(
    vocab: &Vocabulary,
    segment: &Segment,
    frame_length: f64,
    predict_duration: bool,
) -> Result<TensorMap, DsError> {
    let mut map = TensorMap::new();
    map.insert("tokens".into(), i64_row(phoneme_tokens(vocab, segment))?);
    if vocab.is_multi_language() {
        map.insert("languages".into(), i64_row(phoneme_languages(vocab, segment))?);
    }

    if predict_duration {
        let word_div = segment
            .words
            .iter()
            .map(|word| word.phones.len() as i64)
            .collect();
        map.insert("word_div".into(), i64_row(word_div)?);
        map.insert(
            "word_dur".into(),
            i64_row(word_frame_durations(&segment.words, frame_length))?,
        );
    } else {
        map.insert(
            "ph_dur".into(),
            i64_row(phone_frame_durations(&segment.words, frame_length))?,
        );
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::features::fixtures::segment;
    use crate::features::TensorMapExt;

    fn vocab(multi_language: bool) -> Vocabulary {
        let phonemes = HashMap::from([
            ("SP".to_string(), 1),
            ("k".to_string(), 2),
            ("a".to_string(), 3),
            ("n".to_string(), 4),
            ("ja/a".to_string(), 9),
        ]);
        let languages = if multi_language {
            HashMap::from([("ja".to_string(), 1)])
        } else {
            HashMap::new()
        };
        Vocabulary {
            phonemes,
            languages,
        }
    }

    #[test]
    fn explicit_durations_without_languages() {
        let map = build_linguistic_inputs(&vocab(false), &segment(), 0.125, false).expect("build");
        assert_eq!(map.i64_values("tokens").expect("tokens"), vec![1, 2, 3, 4]);
        assert_eq!(map.i64_values("ph_dur").expect("ph_dur"), vec![4, 2, 6, 4]);
        assert!(!map.contains_key("languages"));
        assert!(!map.contains_key("word_div"));
    }

    #[test]
    fn word_level_durations_when_predicting() {
        let mut seg = segment();
        seg.words[1].phones[1].language = "ja".into();
        let map = build_linguistic_inputs(&vocab(true), &seg, 0.125, true).expect("build");
        assert_eq!(map.i64_values("tokens").expect("tokens"), vec![1, 2, 9, 4]);
        assert_eq!(map.i64_values("languages").expect("languages"), vec![0, 0, 1, 0]);
        assert_eq!(map.i64_values("word_div").expect("word_div"), vec![1, 2, 1]);
        assert_eq!(map.i64_values("word_dur").expect("word_dur"), vec![4, 8, 4]);
        assert!(!map.contains_key("ph_dur"));
        assert_eq!(map.dims_of("tokens"), Some(vec![1, 4]));
    }
}
