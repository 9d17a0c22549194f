use std::sync::Arc;

use reqwest::{multipart, Client};
use serde_json::Value;
use shared::{
    domain::{ClipId, ParameterId},
    protocol::{OutboundFrame, PostBody},
};
use tracing::{debug, info, warn};

use crate::{connection::ConnectionManager, endpoint::Endpoint, error::UploadError};

pub const TRIGGER: &str = "trigger";
pub const UPDATE: &str = "update";
pub const SUBSCRIBE: &str = "subscribe";
pub const UNSUBSCRIBE: &str = "unsubscribe";

/// Command paths, relative to the composition root.
pub mod paths {
    use shared::domain::{ClipId, ColumnId, LayerId, ParameterId};

    pub const LAYERS_ADD: &str = "/composition/layers/add";
    pub const COLUMNS_ADD: &str = "/composition/columns/add";
    pub const SELECTED: &str = "/composition/selected";
    pub const DISCONNECT_ALL: &str = "/composition/disconnect-all";

    pub fn clip(id: ClipId) -> String {
        format!("/composition/clips/by-id/{}", id.0)
    }

    pub fn clip_connect(id: ClipId) -> String {
        format!("{}/connect", clip(id))
    }

    pub fn clip_select(id: ClipId) -> String {
        format!("{}/select", clip(id))
    }

    pub fn clip_clear(id: ClipId) -> String {
        format!("{}/clear", clip(id))
    }

    pub fn clip_thumbnail(id: ClipId) -> String {
        format!("{}/thumbnail", clip(id))
    }

    pub fn layer(id: LayerId) -> String {
        format!("/composition/layers/by-id/{}", id.0)
    }

    pub fn layer_duplicate(id: LayerId) -> String {
        format!("{}/duplicate", layer(id))
    }

    pub fn layer_select(id: LayerId) -> String {
        format!("{}/select", layer(id))
    }

    pub fn layer_clear(id: LayerId) -> String {
        format!("{}/clear", layer(id))
    }

    pub fn column(id: ColumnId) -> String {
        format!("/composition/columns/by-id/{}", id.0)
    }

    pub fn column_connect(id: ColumnId) -> String {
        format!("{}/connect", column(id))
    }

    pub fn parameter(id: ParameterId) -> String {
        format!("/parameter/by-id/{}", id.0)
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    connection: Arc<ConnectionManager>,
    http: Client,
}

impl CommandDispatcher {
    pub fn new(connection: Arc<ConnectionManager>, http: Client) -> Self {
        Self { connection, http }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    /// Writes one frame. Returns whether it was queued; while disconnected the
    /// frame is dropped and `false` comes back.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        self.connection.send(&frame)
    }

    pub fn action(&self, kind: &str, path: impl Into<String>, value: Option<Value>) -> bool {
        self.send(OutboundFrame::action(kind, path, value))
    }

    /// Edge-triggered action with no value.
    pub fn trigger(&self, path: impl Into<String>) -> bool {
        self.action(TRIGGER, path, None)
    }

    /// Level-triggered action; `down` is the press, `!down` the release.
    pub fn trigger_level(&self, path: impl Into<String>, down: bool) -> bool {
        self.action(TRIGGER, path, Some(Value::Bool(down)))
    }

    pub fn post(&self, path: impl Into<String>, body: Option<PostBody>) -> bool {
        self.send(OutboundFrame::post(path, body))
    }

    pub fn remove(&self, path: impl Into<String>) -> bool {
        self.send(OutboundFrame::remove(path))
    }

    pub fn update_parameter(&self, id: ParameterId, value: impl Into<Value>) -> bool {
        self.action(UPDATE, paths::parameter(id), Some(value.into()))
    }

    pub fn subscribe_parameter(&self, id: ParameterId) -> bool {
        self.action(SUBSCRIBE, paths::parameter(id), None)
    }

    pub fn unsubscribe_parameter(&self, id: ParameterId) -> bool {
        self.action(UNSUBSCRIBE, paths::parameter(id), None)
    }

    /// Replaces a clip's thumbnail with an uploaded image. Never retried.
    pub async fn upload_thumbnail(
        &self,
        clip_id: ClipId,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Result<(), UploadError> {
        let file_name = file_name.into();
        let size = bytes.len();
        let mut part = multipart::Part::bytes(bytes).file_name(file_name.clone());
        if let Some(mime) = mime {
            part = part.mime_str(mime)?;
        }
        let form = multipart::Form::new().part("file", part);

        let url = self.endpoint().thumbnail_upload_url(clip_id);
        debug!(clip_id = clip_id.0, %url, size, "uploading clip thumbnail");
        let response = self.http.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let reason = match response.text().await {
                Ok(body) if !body.trim().is_empty() => body,
                _ => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            warn!(clip_id = clip_id.0, status = status.as_u16(), "thumbnail upload rejected");
            return Err(UploadError::Rejected {
                clip_id: clip_id.0,
                status: status.as_u16(),
                reason,
            });
        }

        info!(clip_id = clip_id.0, file_name = %file_name, size, "thumbnail uploaded");
        Ok(())
    }
}
