use shared::domain::ClipId;
use url::Url;

use crate::error::EndpointError;

const API_ROOT: &str = "/api/v1";
const DUMMY_THUMBNAIL_PATH: &str = "/composition/thumbnail/dummy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    authority: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, EndpointError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }

        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        Url::parse(&format!("http://{authority}/")).map_err(|source| EndpointError::Invalid {
            endpoint: authority.clone(),
            source,
        })?;

        Ok(Self {
            host,
            port,
            authority,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://{}{API_ROOT}", self.authority)
    }

    /// Plain HTTP url for an API path such as `/product`.
    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}{API_ROOT}{path}", self.authority)
    }

    pub fn product_url(&self) -> String {
        self.api_url("/product")
    }

    /// `last_update` is embedded verbatim so each new thumbnail gets a new url.
    pub fn thumbnail_url(&self, clip_id: ClipId, last_update: &str) -> String {
        if last_update == shared::composition::DUMMY_THUMBNAIL_TOKEN {
            self.api_url(DUMMY_THUMBNAIL_PATH)
        } else {
            self.api_url(&format!(
                "/composition/clips/by-id/{}/thumbnail/{last_update}",
                clip_id.0
            ))
        }
    }

    pub fn thumbnail_upload_url(&self, clip_id: ClipId) -> String {
        self.api_url(&format!("/composition/clips/by-id/{}/thumbnail", clip_id.0))
    }
}
