use std::collections::BTreeMap;

use crate::curve::{SampleCurve, SpeakerMixCurve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlideType {
    #[default]
    None,
    Up,
    Down,
}

impl GlideType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Unknown names fall back to `None`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "up" => Self::Up,
            "down" => Self::Down,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Phoneme {
    pub token: String,
    /// Empty when the phoneme carries no language tag.
    pub language: String,
    /// Seconds from the start of the owning word.
    pub start: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Note {
    pub key: i32,
    pub cents: i32,
    /// Seconds.
    pub duration: f64,
    pub glide: GlideType,
    pub is_rest: bool,
}

impl Note {
    /// MIDI pitch including the cents offset; `None` for rests.
    pub fn midi(&self) -> Option<f64> {
        (!self.is_rest).then(|| self.key as f64 + self.cents as f64 / 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub phones: Vec<Phoneme>,
    pub notes: Vec<Note>,
}

impl Word {
    pub fn duration(&self) -> f64 {
        self.notes.iter().map(|note| note.duration).sum()
    }
}

/// Sample-index interval `[start, end)` of a curve that is to be (re)predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetakeSpan {
    pub start: usize,
    pub end: usize,
}

impl RetakeSpan {
    pub fn full(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    /// Frame range on a grid of `frame_length` seconds, clamped to `[0, n_frames]`.
    pub(crate) fn to_frames(self, timestep: f64, frame_length: f64, n_frames: usize) -> (usize, usize) {
        let convert = |index: usize| {
            let frame = (index as f64 * timestep / frame_length).round();
            if frame.is_nan() || frame <= 0.0 {
                0
            } else {
                (frame as usize).min(n_frames)
            }
        };
        (convert(self.start), convert(self.end))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    pub tag: String,
    pub curve: SampleCurve,
    pub retake: RetakeSpan,
}

impl Parameter {
    /// A parameter whose whole span counts as model output.
    pub fn predicted(tag: impl Into<String>, samples: Vec<f64>, timestep: f64) -> Self {
        let retake = RetakeSpan::full(samples.len());
        Self {
            tag: tag.into(),
            curve: SampleCurve::new(samples, timestep),
            retake,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segment {
    /// Seconds from the start of the project.
    pub offset: f64,
    pub words: Vec<Word>,
    pub parameters: BTreeMap<String, Parameter>,
    pub speakers: SpeakerMixCurve,
}

impl Segment {
    pub fn phone_count(&self) -> usize {
        self.words.iter().map(|word| word.phones.len()).sum()
    }

    pub fn note_count(&self) -> usize {
        self.words.iter().map(|word| word.notes.len()).sum()
    }

    pub fn duration(&self) -> f64 {
        self.words.iter().map(Word::duration).sum()
    }

    pub fn parameter(&self, tag: &str) -> Option<&Parameter> {
        self.parameters.get(tag)
    }
}
