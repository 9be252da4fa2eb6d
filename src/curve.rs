use std::collections::BTreeMap;

/// Guards the sample-count computation against `0.1 * 3.0 / 0.1`-style
/// float error when the target grid lands on the last source sample.
const GRID_EPSILON: f64 = 1e-9;

/// Samples of a scalar curve on a uniform time grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleCurve {
    pub samples: Vec<f64>,
    /// Seconds between consecutive samples.
    pub timestep: f64,
}

impl SampleCurve {
    pub fn new(samples: Vec<f64>, timestep: f64) -> Self {
        Self { samples, timestep }
    }

    pub fn filled(value: f64, length: usize, timestep: f64) -> Self {
        Self {
            samples: vec![value; length],
            timestep,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Resamples onto `target_length` points spaced `target_timestep` apart,
    /// padding with the last sample. An empty curve yields zeros.
    pub fn resample(&self, target_timestep: f64, target_length: usize) -> Vec<f64> {
        self.resample_with(target_timestep, target_length, true, 0.0)
    }

    /// Piecewise-linear resampling onto a new grid.
    ///
    /// The interpolated run covers the source span only; it is then truncated
    /// or padded to `target_length`. Padding repeats the last interpolated value
    /// when `fill_last` is set and uses zeros otherwise. An empty curve yields
    /// `empty_value` everywhere.
    pub fn resample_with(
        &self,
        target_timestep: f64,
        target_length: usize,
        fill_last: bool,
        empty_value: f64,
    ) -> Vec<f64> {
        if target_length == 0 {
            return Vec::new();
        }
        if self.samples.is_empty() {
            return vec![empty_value; target_length];
        }

        let mut out = interpolate(&self.samples, self.timestep, target_timestep, target_length);
        if out.len() < target_length {
            let pad = if fill_last {
                out.last().copied().unwrap_or(empty_value)
            } else {
                0.0
            };
            out.resize(target_length, pad);
        }
        out.truncate(target_length);
        out
    }
}

fn interpolate(samples: &[f64], timestep: f64, target_timestep: f64, max_len: usize) -> Vec<f64> {
    let last = samples.len() - 1;
    if last == 0 || !(timestep > 0.0) || !(target_timestep > 0.0) {
        return vec![samples[0]];
    }

    // Position of target point j on the source index axis is j * ratio; computing
    // the ratio once keeps same-grid resampling exact.
    let ratio = target_timestep / timestep;
    let span = (last as f64 / ratio + GRID_EPSILON).floor() as usize + 1;
    let count = span.min(max_len);

    (0..count)
        .map(|j| {
            let pos = j as f64 * ratio;
            let left = (pos.floor() as usize).min(last);
            let frac = pos - left as f64;
            if left == last || frac <= 0.0 {
                samples[left]
            } else {
                samples[left] + (samples[left + 1] - samples[left]) * frac
            }
        })
        .collect()
}

/// Mix weight curve per speaker name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeakerMixCurve {
    pub speakers: BTreeMap<String, SampleCurve>,
}

impl SpeakerMixCurve {
    pub fn from_static_mix<'a>(weights: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            speakers: weights
                .into_iter()
                .map(|(name, weight)| (name.to_string(), SampleCurve::new(vec![weight], 1.0)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Every speaker curve resampled to exactly `target_length` points.
    pub fn resample(&self, target_timestep: f64, target_length: usize) -> Self {
        Self {
            speakers: self
                .speakers
                .iter()
                .map(|(name, curve)| {
                    (
                        name.clone(),
                        SampleCurve::new(
                            curve.resample(target_timestep, target_length),
                            target_timestep,
                        ),
                    )
                })
                .collect(),
        }
    }

    /// The first sample of every curve, absent curves counting as zero.
    pub fn static_weights(&self) -> Vec<(&str, f64)> {
        self.speakers
            .iter()
            .map(|(name, curve)| (name.as_str(), curve.samples.first().copied().unwrap_or(0.0)))
            .collect()
    }
}
