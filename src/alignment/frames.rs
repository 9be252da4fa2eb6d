use crate::types::{Note, Word};

/// Turns consecutive second-valued spans into frame counts by rounding the
/// running sum at every boundary, so per-span rounding never accumulates.
#[derive(Debug, Clone)]
pub(crate) struct FrameCursor {
    frame_length: f64,
    elapsed: f64,
    elapsed_frames: i64,
}

impl FrameCursor {
    pub(crate) fn new(frame_length: f64) -> Self {
        Self {
            frame_length,
            elapsed: 0.0,
            elapsed_frames: 0,
        }
    }

    /// Frames covered by the `[elapsed + from, elapsed + to)` window, without
    /// moving the cursor.
    pub(crate) fn span(&self, from: f64, to: f64) -> i64 {
        self.frames_at(self.elapsed + to) - self.frames_at(self.elapsed + from)
    }

    /// Advances by `seconds` and returns the frames consumed.
    pub(crate) fn advance(&mut self, seconds: f64) -> i64 {
        self.elapsed += seconds;
        let now = self.frames_at(self.elapsed);
        let delta = now - self.elapsed_frames;
        self.elapsed_frames = now;
        delta
    }

    fn frames_at(&self, seconds: f64) -> i64 {
        (seconds / self.frame_length).round() as i64
    }
}

/// Per-phone frame counts across the whole segment.
pub fn phone_frame_durations(words: &[Word], frame_length: f64) -> Vec<i64> {
    let mut cursor = FrameCursor::new(frame_length);
    let mut durations = Vec::with_capacity(words.iter().map(|w| w.phones.len()).sum());
    for word in words {
        let word_duration = word.duration();
        for (i, phone) in word.phones.iter().enumerate() {
            let next_start = word
                .phones
                .get(i + 1)
                .map_or(word_duration, |next| next.start);
            durations.push(cursor.span(phone.start, next_start));
        }
        cursor.advance(word_duration);
    }
    durations
}

/// Per-word frame counts.
pub fn word_frame_durations(words: &[Word], frame_length: f64) -> Vec<i64> {
    let mut cursor = FrameCursor::new(frame_length);
    words
        .iter()
        .map(|word| cursor.advance(word.duration()))
        .collect()
}

/// Per-note frame counts, notes taken in word order.
pub fn note_frame_durations<'a>(
    notes: impl IntoIterator<Item = &'a Note>,
    frame_length: f64,
) -> Vec<i64> {
    let mut cursor = FrameCursor::new(frame_length);
    notes
        .into_iter()
        .map(|note| cursor.advance(note.duration))
        .collect()
}

/// Total frame count of the segment, rounded once.
pub fn total_frames(words: &[Word], frame_length: f64) -> usize {
    let seconds: f64 = words.iter().map(Word::duration).sum();
    (seconds / frame_length).round().max(0.0) as usize
}

/// New phone start offsets for the words covered by a predicted-duration
/// buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PhoneStartPlan {
    /// One entry per word, in segment order; `None` for words left untouched
    /// (no phones, or a degenerate prediction).
    pub starts: Vec<Option<Vec<f64>>>,
    pub scale_factors: Vec<Option<f64>>,
    /// Phones consumed from the buffer.
    pub consumed: usize,
    /// Number of leading words the buffer covered. Less than the word count
    /// when the buffer was too short.
    pub covered_words: usize,
}

impl PhoneStartPlan {
    pub fn is_complete(&self, words: &[Word]) -> bool {
        self.covered_words == words.len()
    }

    /// Writes the planned starts into `words`. Words past `covered_words` keep
    /// their offsets.
    pub fn apply(&self, words: &mut [Word]) {
        for (word, starts) in words.iter_mut().zip(&self.starts) {
            let Some(starts) = starts else { continue };
            for (phone, start) in word.phones.iter_mut().zip(starts) {
                phone.start = *start;
            }
        }
    }
}

/// Maps predicted per-phone frame durations back onto phone start offsets,
/// rescaling each word so its phones exactly fill the authored word duration.
pub fn plan_phone_starts(words: &[Word], predicted: &[f32], frame_length: f64) -> PhoneStartPlan {
    let mut plan = PhoneStartPlan {
        starts: Vec::with_capacity(words.len()),
        scale_factors: Vec::with_capacity(words.len()),
        consumed: 0,
        covered_words: 0,
    };

    for word in words {
        if word.phones.is_empty() {
            plan.starts.push(None);
            plan.scale_factors.push(None);
            plan.covered_words += 1;
            continue;
        }

        let begin = plan.consumed;
        let end = begin + word.phones.len();
        let Some(frames) = predicted.get(begin..end) else {
            break;
        };

        let predicted_frames: f64 = frames.iter().map(|&f| f as f64).sum();
        let predicted_seconds = predicted_frames * frame_length;
        if predicted_seconds > 0.0 && predicted_seconds.is_finite() {
            let scale = word.duration() / predicted_seconds;
            let mut starts = Vec::with_capacity(frames.len());
            let mut cumulative = 0.0;
            starts.push(0.0);
            for &f in &frames[..frames.len() - 1] {
                cumulative += f as f64;
                starts.push(cumulative * frame_length * scale);
            }
            plan.starts.push(Some(starts));
            plan.scale_factors.push(Some(scale));
        } else {
            tracing::warn!(
                word_index = plan.starts.len(),
                predicted_frames,
                "predicted word duration is not positive; keeping authored phone offsets"
            );
            plan.starts.push(None);
            plan.scale_factors.push(None);
        }

        plan.consumed = end;
        plan.covered_words += 1;
    }

    plan
}
