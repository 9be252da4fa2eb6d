use std::path::Path;

use crate::error::DsError;
use crate::pipeline::traits::AudioWriter;

/// Mono 32-bit float WAV output.
pub struct WavFileWriter;

impl AudioWriter for WavFileWriter {
    fn write(&self, path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), DsError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| DsError::audio("create wav file", e))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| DsError::audio("write wav samples", e))?;
        }
        writer
            .finalize()
            .map_err(|e| DsError::audio("finalize wav file", e))?;

        tracing::info!(
            path = %path.display(),
            samples = samples.len(),
            sample_rate,
            "waveform written"
        );
        Ok(())
    }
}
