use std::fmt;
use std::path::Path;

use crate::config::InferenceOptions;
use crate::error::DsError;
use crate::pipeline::acoustic::AcousticStage;
use crate::pipeline::duration::DurationStage;
use crate::pipeline::pitch::PitchStage;
use crate::pipeline::traits::Stage;
use crate::pipeline::variance::VarianceStage;
use crate::types::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Duration,
    Pitch,
    Variance,
    Acoustic,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Duration => "duration",
            StageKind::Pitch => "pitch",
            StageKind::Variance => "variance",
            StageKind::Acoustic => "acoustic",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The configured stages, run in duration → pitch → variance → acoustic order.
pub struct Pipeline {
    options: InferenceOptions,
    duration: Option<DurationStage>,
    pitch: Option<PitchStage>,
    variance: Option<VarianceStage>,
    acoustic: Option<AcousticStage>,
}

pub(crate) struct PipelineParts {
    pub options: InferenceOptions,
    pub duration: Option<DurationStage>,
    pub pitch: Option<PitchStage>,
    pub variance: Option<VarianceStage>,
    pub acoustic: Option<AcousticStage>,
}

impl Pipeline {
    pub(crate) fn from_parts(parts: PipelineParts) -> Self {
        Self {
            options: parts.options,
            duration: parts.duration,
            pitch: parts.pitch,
            variance: parts.variance,
            acoustic: parts.acoustic,
        }
    }

    pub fn options(&self) -> InferenceOptions {
        self.options
    }

    /// Configured stages in execution order.
    pub fn stages(&self) -> Vec<StageKind> {
        let mut kinds = Vec::new();
        if self.duration.is_some() {
            kinds.push(StageKind::Duration);
        }
        if self.pitch.is_some() {
            kinds.push(StageKind::Pitch);
        }
        if self.variance.is_some() {
            kinds.push(StageKind::Variance);
        }
        if self.acoustic.is_some() {
            kinds.push(StageKind::Acoustic);
        }
        kinds
    }

    pub fn duration(&self) -> Option<&DurationStage> {
        self.duration.as_ref()
    }

    pub fn duration_mut(&mut self) -> Option<&mut DurationStage> {
        self.duration.as_mut()
    }

    pub fn pitch(&self) -> Option<&PitchStage> {
        self.pitch.as_ref()
    }

    pub fn pitch_mut(&mut self) -> Option<&mut PitchStage> {
        self.pitch.as_mut()
    }

    pub fn variance(&self) -> Option<&VarianceStage> {
        self.variance.as_ref()
    }

    pub fn variance_mut(&mut self) -> Option<&mut VarianceStage> {
        self.variance.as_mut()
    }

    pub fn acoustic(&self) -> Option<&AcousticStage> {
        self.acoustic.as_ref()
    }

    pub fn acoustic_mut(&mut self) -> Option<&mut AcousticStage> {
        self.acoustic.as_mut()
    }

    /// Opens every configured stage. Stages opened before a failure are
    /// closed again.
    pub fn open(&mut self) -> Result<(), DsError> {
        let result = self.try_open();
        if result.is_err() {
            self.close();
        }
        result
    }

    fn try_open(&mut self) -> Result<(), DsError> {
        if let Some(stage) = self.duration.as_mut() {
            stage.open()?;
        }
        if let Some(stage) = self.pitch.as_mut() {
            stage.open()?;
        }
        if let Some(stage) = self.variance.as_mut() {
            stage.open()?;
        }
        if let Some(stage) = self.acoustic.as_mut() {
            stage.open()?;
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(stage) = self.duration.as_mut() {
            stage.close();
        }
        if let Some(stage) = self.pitch.as_mut() {
            stage.close();
        }
        if let Some(stage) = self.variance.as_mut() {
            stage.close();
        }
        if let Some(stage) = self.acoustic.as_mut() {
            stage.close();
        }
    }

    pub fn run(&mut self, segment: &mut Segment, audio_path: &Path) -> Result<(), DsError> {
        self.run_with(segment, audio_path, |_, _| Ok(()))
    }

    /// Runs the stages in order, calling `after_stage` once each mutating
    /// stage has written its results. Audio is written last.
    pub fn run_with<F>(
        &mut self,
        segment: &mut Segment,
        audio_path: &Path,
        mut after_stage: F,
    ) -> Result<(), DsError>
    where
        F: FnMut(StageKind, &Segment) -> Result<(), DsError>,
    {
        if let Some(stage) = self.duration.as_mut() {
            stage.run_in_place(segment)?;
            tracing::info!(stage = %StageKind::Duration, "stage finished");
            after_stage(StageKind::Duration, segment)?;
        }
        if let Some(stage) = self.pitch.as_mut() {
            stage.run_in_place(segment)?;
            tracing::info!(stage = %StageKind::Pitch, "stage finished");
            after_stage(StageKind::Pitch, segment)?;
        }
        if let Some(stage) = self.variance.as_mut() {
            stage.run_in_place(segment)?;
            tracing::info!(stage = %StageKind::Variance, "stage finished");
            after_stage(StageKind::Variance, segment)?;
        }
        if let Some(stage) = self.acoustic.as_mut() {
            stage.run_and_save_audio(segment, audio_path)?;
            tracing::info!(
                stage = %StageKind::Acoustic,
                path = %audio_path.display(),
                "stage finished"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_kind_names() {
        assert_eq!(StageKind::Duration.to_string(), "duration");
        assert_eq!(StageKind::Pitch.as_str(), "pitch");
        assert_eq!(StageKind::Variance.as_str(), "variance");
        assert_eq!(StageKind::Acoustic.as_str(), "acoustic");
    }
}
