use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{kind} frame carries no value")]
    MissingValue { kind: String },
    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    pub fn payload(kind: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Payload {
            kind: kind.into(),
            source,
        }
    }
}
