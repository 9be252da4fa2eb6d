//! JSON and CBOR encodings of a [`Segment`].

use serde::{Deserialize, Serialize};

use crate::curve::SampleCurve;
use crate::error::DsError;
use crate::types::{GlideType, Note, Parameter, Phoneme, RetakeSpan, Segment, Word};

#[derive(Debug, Serialize, Deserialize)]
struct WireSegment {
    #[serde(default)]
    offset: f64,
    words: Vec<WireWord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<WireParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    speakers: Vec<WireSpeaker>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireWord {
    phones: Vec<WirePhoneme>,
    notes: Vec<WireNote>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePhoneme {
    token: String,
    #[serde(default)]
    language: Option<String>,
    start: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireNote {
    key: i32,
    #[serde(default)]
    cents: Option<i32>,
    duration: f64,
    #[serde(default)]
    glide: Option<String>,
    is_rest: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRetake {
    #[serde(default)]
    start: Option<usize>,
    #[serde(default)]
    end: Option<usize>,
}

/// A parameter curve: `dynamic` carries `interval` + `values`, static carries
/// a single `value`.
#[derive(Debug, Serialize, Deserialize)]
struct WireParameter {
    tag: String,
    #[serde(default)]
    dynamic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default)]
    retake: Option<WireRetake>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireSpeaker {
    name: String,
    #[serde(default)]
    dynamic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

fn read_curve(
    owner: &str,
    dynamic: Option<bool>,
    interval: Option<f64>,
    values: Option<Vec<f64>>,
    value: Option<f64>,
) -> Result<SampleCurve, DsError> {
    let dynamic = dynamic.unwrap_or(values.is_some());
    if dynamic {
        let values = values.ok_or_else(|| {
            DsError::parse("read curve", format!("dynamic curve \"{owner}\" has no values"))
        })?;
        let interval = interval.ok_or_else(|| {
            DsError::parse("read curve", format!("dynamic curve \"{owner}\" has no interval"))
        })?;
        Ok(SampleCurve::new(values, interval))
    } else {
        let value = value.ok_or_else(|| {
            DsError::parse("read curve", format!("static curve \"{owner}\" has no value"))
        })?;
        Ok(SampleCurve::new(vec![value], interval.unwrap_or(0.0)))
    }
}

impl WireSegment {
    fn into_segment(self) -> Result<Segment, DsError> {
        let words = self
            .words
            .into_iter()
            .map(|word| Word {
                phones: word
                    .phones
                    .into_iter()
                    .map(|p| Phoneme {
                        token: p.token,
                        language: p.language.unwrap_or_default(),
                        start: p.start,
                    })
                    .collect(),
                notes: word
                    .notes
                    .into_iter()
                    .map(|n| Note {
                        key: n.key,
                        cents: n.cents.unwrap_or(0),
                        duration: n.duration,
                        glide: n.glide.as_deref().map_or(GlideType::None, GlideType::from_name),
                        is_rest: n.is_rest,
                    })
                    .collect(),
            })
            .collect();

        let mut segment = Segment {
            offset: self.offset,
            words,
            ..Segment::default()
        };

        for p in self.parameters {
            let curve = read_curve(&p.tag, p.dynamic, p.interval, p.values, p.value)?;
            let len = curve.len();
            let retake = match p.retake {
                Some(r) => RetakeSpan {
                    start: r.start.unwrap_or(0),
                    end: r.end.unwrap_or(len),
                },
                None => RetakeSpan::full(len),
            };
            segment.parameters.insert(
                p.tag.clone(),
                Parameter {
                    tag: p.tag,
                    curve,
                    retake,
                },
            );
        }

        for s in self.speakers {
            let curve = read_curve(&s.name, s.dynamic, s.interval, s.values, s.value)?;
            segment.speakers.speakers.insert(s.name, curve);
        }
        Ok(segment)
    }

    fn from_segment(segment: &Segment) -> Self {
        Self {
            offset: segment.offset,
            words: segment
                .words
                .iter()
                .map(|word| WireWord {
                    phones: word
                        .phones
                        .iter()
                        .map(|p| WirePhoneme {
                            token: p.token.clone(),
                            language: Some(p.language.clone()),
                            start: p.start,
                        })
                        .collect(),
                    notes: word
                        .notes
                        .iter()
                        .map(|n| WireNote {
                            key: n.key,
                            cents: Some(n.cents),
                            duration: n.duration,
                            glide: Some(n.glide.as_str().to_string()),
                            is_rest: n.is_rest,
                        })
                        .collect(),
                })
                .collect(),
            parameters: segment
                .parameters
                .values()
                .map(|p| WireParameter {
                    tag: p.tag.clone(),
                    dynamic: Some(true),
                    interval: Some(p.curve.timestep),
                    values: Some(p.curve.samples.clone()),
                    value: None,
                    retake: Some(WireRetake {
                        start: Some(p.retake.start),
                        end: Some(p.retake.end),
                    }),
                })
                .collect(),
            speakers: segment
                .speakers
                .speakers
                .iter()
                .map(|(name, curve)| WireSpeaker {
                    name: name.clone(),
                    dynamic: Some(true),
                    interval: Some(curve.timestep),
                    values: Some(curve.samples.clone()),
                    value: None,
                })
                .collect(),
        }
    }
}

pub fn segment_from_json(text: &str) -> Result<Segment, DsError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DsError::parse("parse segment json", e))?;
    if !value.is_object() {
        return Err(DsError::parse(
            "parse segment json",
            "top-level value is not an object",
        ));
    }
    let wire: WireSegment =
        serde_json::from_value(value).map_err(|e| DsError::parse("read segment json", e))?;
    wire.into_segment()
}

pub fn segment_to_json(segment: &Segment) -> Result<String, DsError> {
    serde_json::to_string(&WireSegment::from_segment(segment))
        .map_err(|e| DsError::serialization("write segment json", e))
}

pub fn segment_from_cbor(bytes: &[u8]) -> Result<Segment, DsError> {
    let value: ciborium::Value =
        ciborium::from_reader(bytes).map_err(|e| DsError::parse("parse segment cbor", e))?;
    if !value.is_map() {
        return Err(DsError::parse(
            "parse segment cbor",
            "top-level value is not a map",
        ));
    }
    let wire: WireSegment = value
        .deserialized()
        .map_err(|e| DsError::parse("read segment cbor", e))?;
    wire.into_segment()
}

pub fn segment_to_cbor(segment: &Segment) -> Result<Vec<u8>, DsError> {
    let mut out = Vec::new();
    ciborium::into_writer(&WireSegment::from_segment(segment), &mut out)
        .map_err(|e| DsError::serialization("write segment cbor", e))?;
    Ok(out)
}
