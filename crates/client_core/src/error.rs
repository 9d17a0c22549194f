use thiserror::Error;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("mixer host must not be empty")]
    EmptyHost,
    #[error("invalid mixer endpoint '{endpoint}': {source}")]
    Invalid {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("thumbnail upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("mixer rejected thumbnail upload for clip {clip_id}: {status} {reason}")]
    Rejected {
        clip_id: i64,
        status: u16,
        reason: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("layer group {group_id} has no member layers")]
    EmptyGroup { group_id: i64 },
    #[error("layer group {group_id} lists layer {layer_id} which is not in the composition")]
    UnknownMember { group_id: i64, layer_id: i64 },
    #[error("layer group {group_id} members are not contiguous: layer {layer_id} found at position {found}, expected {expected}")]
    NotContiguous {
        group_id: i64,
        layer_id: i64,
        expected: usize,
        found: usize,
    },
}
