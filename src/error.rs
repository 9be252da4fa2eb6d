use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    GenericError,
    ParseError,
    SerializationError,
    ModelLoadError,
    InferError,
}

#[derive(Debug, Error)]
pub enum DsError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("audio output failed while {context}: {message}")]
    Audio {
        context: &'static str,
        message: String,
    },
    #[error("invalid input request format while {context}: {message}")]
    Parse {
        context: &'static str,
        message: String,
    },
    #[error("serialization failed while {context}: {message}")]
    Serialization {
        context: &'static str,
        message: String,
    },
    #[error("model load failed while {context}: {message}")]
    ModelLoad {
        context: &'static str,
        message: String,
    },
    #[error("{context}: {message}")]
    Infer {
        context: &'static str,
        message: String,
    },
    #[error("the {stage} model expects {} but such parameters are not provided", quoted(.names))]
    MissingParameters {
        stage: &'static str,
        names: Vec<String>,
    },
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

impl DsError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn audio(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Audio {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn serialization(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn model_load(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ModelLoad {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn infer(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Infer {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn missing(stage: &'static str, names: Vec<String>) -> Self {
        Self::MissingParameters { stage, names }
    }

    pub fn code(&self) -> StatusCode {
        match self {
            Self::Io { .. } | Self::Audio { .. } => StatusCode::GenericError,
            Self::Parse { .. } => StatusCode::ParseError,
            Self::Serialization { .. } => StatusCode::SerializationError,
            Self::ModelLoad { .. } => StatusCode::ModelLoadError,
            Self::Infer { .. } | Self::MissingParameters { .. } => StatusCode::InferError,
        }
    }

    pub fn status(&self) -> Status {
        Status {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Flat code + message view of an outcome, for callers that report results
/// across a process or language boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    pub fn from_result<T>(result: &Result<T, DsError>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(err) => err.status(),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}
