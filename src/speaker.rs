use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::curve::SpeakerMixCurve;
use crate::error::DsError;

/// Width of a speaker embedding vector.
pub const EMBED_DIM: usize = 256;

pub type SpeakerEmbedding = [f32; EMBED_DIM];

/// Fixed per-speaker embedding vectors shipped alongside a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeakerEmbedTable {
    embeddings: HashMap<String, SpeakerEmbedding>,
}

impl SpeakerEmbedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `<dir>/<speaker>.emb` for every speaker: `EMBED_DIM` little-endian f32.
    pub fn load(speakers: &[String], dir: &Path) -> Result<Self, DsError> {
        let mut table = Self::new();
        for speaker in speakers {
            let path = dir.join(format!("{speaker}.emb"));
            let bytes = std::fs::read(&path).map_err(|e| {
                DsError::model_load("read speaker embedding", format!("{}: {e}", path.display()))
            })?;
            let embedding = parse_embedding(&bytes).ok_or_else(|| {
                DsError::model_load(
                    "parse speaker embedding",
                    format!(
                        "{} holds {} bytes, expected {}",
                        path.display(),
                        bytes.len(),
                        EMBED_DIM * 4
                    ),
                )
            })?;
            table.insert(speaker.clone(), embedding);
        }
        tracing::debug!(speakers = speakers.len(), dir = %dir.display(), "speaker embeddings loaded");
        Ok(table)
    }

    pub fn insert(&mut self, speaker: impl Into<String>, embedding: SpeakerEmbedding) {
        self.embeddings.insert(speaker.into(), embedding);
    }

    pub fn get(&self, speaker: &str) -> Option<&SpeakerEmbedding> {
        self.embeddings.get(speaker)
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

fn parse_embedding(bytes: &[u8]) -> Option<SpeakerEmbedding> {
    if bytes.len() != EMBED_DIM * 4 {
        return None;
    }
    let mut embedding = [0.0f32; EMBED_DIM];
    for (value, chunk) in embedding.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Some(embedding)
}

/// Per-frame blended speaker embeddings, flattened to `target_length * EMBED_DIM`.
///
/// An empty mix selects the first configured speaker on every frame. Otherwise
/// the mix curves are resampled onto the frame grid and each frame's weights
/// are normalised by their sum (a zero sum divides by one instead).
pub fn mix_speakers(
    table: &SpeakerEmbedTable,
    speakers: &[String],
    mix: &SpeakerMixCurve,
    frame_length: f64,
    target_length: usize,
) -> Result<Vec<f32>, DsError> {
    let mut out = vec![0.0f32; target_length * EMBED_DIM];

    if mix.is_empty() {
        let default = speakers
            .first()
            .and_then(|name| table.get(name))
            .ok_or_else(|| {
                DsError::infer(
                    "mix speakers",
                    "no speaker embedding available for the default speaker",
                )
            })?;
        for frame in out.chunks_exact_mut(EMBED_DIM) {
            frame.copy_from_slice(default);
        }
        return Ok(out);
    }

    let resampled = mix.resample(frame_length, target_length);
    let mut unknown = BTreeSet::new();
    let voices: Vec<(&[f64], Option<&SpeakerEmbedding>)> = resampled
        .speakers
        .iter()
        .map(|(name, curve)| {
            let embedding = table.get(name);
            if embedding.is_none() {
                unknown.insert(name.as_str());
            }
            (curve.samples.as_slice(), embedding)
        })
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(?unknown, "speaker mix names speakers without embeddings; ignoring them");
    }

    for (i, frame) in out.chunks_exact_mut(EMBED_DIM).enumerate() {
        let sum: f64 = voices.iter().map(|(weights, _)| weights[i]).sum();
        let denom = if sum == 0.0 { 1.0 } else { sum };
        for (weights, embedding) in &voices {
            let Some(embedding) = embedding else { continue };
            let weight = (weights[i] / denom) as f32;
            for (acc, value) in frame.iter_mut().zip(embedding.iter()) {
                *acc += weight * value;
            }
        }
    }

    Ok(out)
}
