use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DsError;
use crate::speaker::SpeakerEmbedTable;

/// Optional model inputs and behaviours, as declared by a stage config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Features(u32);

impl Features {
    pub const PARAM_GENDER: Self = Self(1 << 0);
    pub const PARAM_VELOCITY: Self = Self(1 << 1);
    pub const PARAM_ENERGY: Self = Self(1 << 2);
    pub const PARAM_BREATHINESS: Self = Self(1 << 3);
    pub const PARAM_TENSION: Self = Self(1 << 4);
    pub const PARAM_VOICING: Self = Self(1 << 5);
    pub const SHALLOW_DIFFUSION: Self = Self(1 << 6);
    pub const CONTINUOUS_ACCELERATION: Self = Self(1 << 7);
    pub const VARIABLE_DEPTH: Self = Self(1 << 8);
    pub const MULTI_LANGUAGE: Self = Self(1 << 9);
    pub const PARAM_EXPR: Self = Self(1 << 10);
    pub const PARAM_NOTE_REST: Self = Self(1 << 11);
    pub const LINGUISTIC_PREDICT_DUR: Self = Self(1 << 12);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for Features {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Process-level inference defaults, handed to each stage at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceOptions {
    pub default_steps: i64,
    pub default_depth: f32,
}

impl InferenceOptions {
    pub const DEFAULT_STEPS: i64 = 20;
    pub const DEFAULT_DEPTH: f32 = 1.0;
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            default_steps: Self::DEFAULT_STEPS,
            default_depth: Self::DEFAULT_DEPTH,
        }
    }
}

pub const DEFAULT_HOP_SIZE: u32 = 512;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Phoneme/language dictionaries and speaker table shared by every stage config.
#[derive(Debug, Clone, Default)]
pub struct DictionaryConfig {
    pub phonemes: PathBuf,
    pub languages: Option<PathBuf>,
    pub speakers: Vec<String>,
    pub speaker_embeds: SpeakerEmbedTable,
}

#[derive(Debug, Clone)]
pub struct AcousticConfig {
    pub dictionary: DictionaryConfig,
    pub acoustic: PathBuf,
    /// Name of the vocoder this model was trained against.
    pub vocoder: String,
    pub hop_size: u32,
    pub sample_rate: u32,
    pub max_depth: f32,
    pub features: Features,
}

#[derive(Debug, Clone)]
pub struct VocoderConfig {
    pub name: String,
    pub model: PathBuf,
    pub hop_size: u32,
    pub sample_rate: u32,
    /// Whether the vocoder accepts an f0 input that may differ from the
    /// acoustic model's.
    pub pitch_controllable: bool,
}

#[derive(Debug, Clone)]
pub struct DurationConfig {
    pub dictionary: DictionaryConfig,
    pub linguistic: PathBuf,
    pub dur: PathBuf,
    pub hop_size: u32,
    pub sample_rate: u32,
    pub features: Features,
}

#[derive(Debug, Clone)]
pub struct PitchConfig {
    pub dictionary: DictionaryConfig,
    pub linguistic: PathBuf,
    pub pitch: PathBuf,
    pub hop_size: u32,
    pub sample_rate: u32,
    pub features: Features,
}

#[derive(Debug, Clone)]
pub struct VarianceConfig {
    pub dictionary: DictionaryConfig,
    pub linguistic: PathBuf,
    pub variance: PathBuf,
    pub hop_size: u32,
    pub sample_rate: u32,
    pub features: Features,
}

impl Default for AcousticConfig {
    fn default() -> Self {
        Self {
            dictionary: DictionaryConfig::default(),
            acoustic: PathBuf::new(),
            vocoder: String::new(),
            hop_size: DEFAULT_HOP_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_depth: 0.0,
            features: Features::empty(),
        }
    }
}

impl Default for VocoderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: PathBuf::new(),
            hop_size: DEFAULT_HOP_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            pitch_controllable: false,
        }
    }
}

macro_rules! variance_family_default {
    ($ty:ident, $model:ident) => {
        impl Default for $ty {
            fn default() -> Self {
                Self {
                    dictionary: DictionaryConfig::default(),
                    linguistic: PathBuf::new(),
                    $model: PathBuf::new(),
                    hop_size: DEFAULT_HOP_SIZE,
                    sample_rate: DEFAULT_SAMPLE_RATE,
                    features: Features::empty(),
                }
            }
        }
    };
}

variance_family_default!(DurationConfig, dur);
variance_family_default!(PitchConfig, pitch);
variance_family_default!(VarianceConfig, variance);

/// Seconds per model frame.
pub fn frame_length(hop_size: u32, sample_rate: u32) -> f64 {
    hop_size as f64 / sample_rate as f64
}

/// Keys shared by every stage YAML; unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStageYaml {
    phonemes: Option<String>,
    languages: Option<String>,
    speakers: Option<Vec<String>>,
    hop_size: Option<u32>,
    sample_rate: Option<u32>,
    use_lang_id: bool,
    use_continuous_acceleration: bool,
    predict_dur: bool,

    // acoustic
    acoustic: Option<String>,
    vocoder: Option<String>,
    max_depth: Option<f32>,
    use_key_shift_embed: bool,
    use_speed_embed: bool,
    use_energy_embed: bool,
    use_breathiness_embed: bool,
    use_tension_embed: bool,
    use_voicing_embed: bool,
    use_shallow_diffusion: bool,
    use_variable_depth: bool,

    // duration / pitch / variance
    linguistic: Option<String>,
    dur: Option<String>,
    pitch: Option<String>,
    variance: Option<String>,
    use_expr: bool,
    use_note_rest: bool,
    predict_energy: bool,
    predict_breathiness: bool,
    predict_tension: bool,
    predict_voicing: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVocoderYaml {
    name: Option<String>,
    model: Option<String>,
    hop_size: Option<u32>,
    sample_rate: Option<u32>,
    pitch_controllable: bool,
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<(T, PathBuf), DsError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| DsError::model_load("read stage config", format!("{}: {e}", path.display())))?;
    let raw = serde_yaml::from_str(&data)
        .map_err(|e| DsError::model_load("parse stage config", format!("{}: {e}", path.display())))?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((raw, dir))
}

fn resolve(dir: &Path, file: Option<&str>) -> PathBuf {
    file.map(|f| dir.join(f)).unwrap_or_default()
}

impl RawStageYaml {
    fn dictionary(&self, dir: &Path) -> Result<DictionaryConfig, DsError> {
        let mut dictionary = DictionaryConfig {
            phonemes: resolve(dir, self.phonemes.as_deref()),
            languages: self.languages.as_deref().map(|f| dir.join(f)),
            ..DictionaryConfig::default()
        };
        if let Some(speakers) = &self.speakers {
            dictionary.speaker_embeds = SpeakerEmbedTable::load(speakers, dir)?;
            dictionary.speakers = speakers.clone();
        }
        Ok(dictionary)
    }

    fn common_features(&self) -> Features {
        let mut features = Features::empty();
        features.set(Features::MULTI_LANGUAGE, self.use_lang_id);
        features.set(Features::CONTINUOUS_ACCELERATION, self.use_continuous_acceleration);
        features
    }

    fn variance_family_features(&self) -> Features {
        let mut features = self.common_features();
        features.set(Features::LINGUISTIC_PREDICT_DUR, self.predict_dur);
        features
    }
}

impl AcousticConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, DsError> {
        let (raw, dir): (RawStageYaml, _) = read_yaml(path.as_ref())?;
        let mut features = raw.common_features();
        features.set(Features::PARAM_GENDER, raw.use_key_shift_embed);
        features.set(Features::PARAM_VELOCITY, raw.use_speed_embed);
        features.set(Features::PARAM_ENERGY, raw.use_energy_embed);
        features.set(Features::PARAM_BREATHINESS, raw.use_breathiness_embed);
        features.set(Features::PARAM_TENSION, raw.use_tension_embed);
        features.set(Features::PARAM_VOICING, raw.use_voicing_embed);
        features.set(Features::SHALLOW_DIFFUSION, raw.use_shallow_diffusion);
        features.set(Features::VARIABLE_DEPTH, raw.use_variable_depth);
        let dictionary = raw.dictionary(&dir)?;

        Ok(Self {
            dictionary,
            acoustic: resolve(&dir, raw.acoustic.as_deref()),
            vocoder: raw.vocoder.clone().unwrap_or_default(),
            hop_size: raw.hop_size.unwrap_or(DEFAULT_HOP_SIZE),
            sample_rate: raw.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            max_depth: raw.max_depth.unwrap_or(0.0),
            features,
        })
    }

    pub fn frame_length(&self) -> f64 {
        frame_length(self.hop_size, self.sample_rate)
    }

    /// Rejects a vocoder that would read mel frames on a different grid, or
    /// one other than the vocoder named by this config.
    pub fn check_vocoder(&self, vocoder: &VocoderConfig) -> Result<(), DsError> {
        if !self.vocoder.is_empty() && !vocoder.name.is_empty() && self.vocoder != vocoder.name {
            return Err(DsError::model_load(
                "check vocoder",
                format!(
                    "acoustic model expects vocoder \"{}\" but \"{}\" is configured",
                    self.vocoder, vocoder.name
                ),
            ));
        }
        if self.hop_size != vocoder.hop_size || self.sample_rate != vocoder.sample_rate {
            return Err(DsError::model_load(
                "check vocoder",
                format!(
                    "acoustic model runs at hop {} / {} Hz but the vocoder at hop {} / {} Hz",
                    self.hop_size, self.sample_rate, vocoder.hop_size, vocoder.sample_rate
                ),
            ));
        }
        Ok(())
    }
}

impl VocoderConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, DsError> {
        let (raw, dir): (RawVocoderYaml, _) = read_yaml(path.as_ref())?;
        Ok(Self {
            name: raw.name.unwrap_or_default(),
            model: resolve(&dir, raw.model.as_deref()),
            hop_size: raw.hop_size.unwrap_or(DEFAULT_HOP_SIZE),
            sample_rate: raw.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            pitch_controllable: raw.pitch_controllable,
        })
    }
}

impl DurationConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, DsError> {
        let (raw, dir): (RawStageYaml, _) = read_yaml(path.as_ref())?;
        let features = raw.variance_family_features();
        let dictionary = raw.dictionary(&dir)?;
        Ok(Self {
            dictionary,
            linguistic: resolve(&dir, raw.linguistic.as_deref()),
            dur: resolve(&dir, raw.dur.as_deref()),
            hop_size: raw.hop_size.unwrap_or(DEFAULT_HOP_SIZE),
            sample_rate: raw.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            features,
        })
    }

    pub fn frame_length(&self) -> f64 {
        frame_length(self.hop_size, self.sample_rate)
    }
}

impl PitchConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, DsError> {
        let (raw, dir): (RawStageYaml, _) = read_yaml(path.as_ref())?;
        let mut features = raw.variance_family_features();
        features.set(Features::PARAM_EXPR, raw.use_expr);
        features.set(Features::PARAM_NOTE_REST, raw.use_note_rest);
        let dictionary = raw.dictionary(&dir)?;
        Ok(Self {
            dictionary,
            linguistic: resolve(&dir, raw.linguistic.as_deref()),
            pitch: resolve(&dir, raw.pitch.as_deref()),
            hop_size: raw.hop_size.unwrap_or(DEFAULT_HOP_SIZE),
            sample_rate: raw.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            features,
        })
    }

    pub fn frame_length(&self) -> f64 {
        frame_length(self.hop_size, self.sample_rate)
    }
}

impl VarianceConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, DsError> {
        let (raw, dir): (RawStageYaml, _) = read_yaml(path.as_ref())?;
        let mut features = raw.variance_family_features();
        features.set(Features::PARAM_ENERGY, raw.predict_energy);
        features.set(Features::PARAM_BREATHINESS, raw.predict_breathiness);
        features.set(Features::PARAM_TENSION, raw.predict_tension);
        features.set(Features::PARAM_VOICING, raw.predict_voicing);
        let dictionary = raw.dictionary(&dir)?;
        Ok(Self {
            dictionary,
            linguistic: resolve(&dir, raw.linguistic.as_deref()),
            variance: resolve(&dir, raw.variance.as_deref()),
            hop_size: raw.hop_size.unwrap_or(DEFAULT_HOP_SIZE),
            sample_rate: raw.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            features,
        })
    }

    pub fn frame_length(&self) -> f64 {
        frame_length(self.hop_size, self.sample_rate)
    }
}
