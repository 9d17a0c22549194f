use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
    composition::{Composition, ThumbnailDescriptor},
    domain::ParameterId,
    error::DecodeError,
};

pub const SOURCES_UPDATE: &str = "sources_update";
pub const EFFECTS_UPDATE: &str = "effects_update";
pub const THUMBNAIL_UPDATE: &str = "thumbnail_update";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub micro: u32,
    #[serde(default)]
    pub revision: u32,
}

impl Default for ProductInfo {
    fn default() -> Self {
        Self {
            name: "(disconnected)".into(),
            major: 0,
            minor: 0,
            micro: 0,
            revision: 0,
        }
    }
}

impl fmt::Display for ProductInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}.{} (rev {})",
            self.name, self.major, self.minor, self.micro, self.revision
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    #[serde(default)]
    pub idstring: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub presets: Vec<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Audio and video plugin catalogue, used both for sources and for effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginListing {
    #[serde(default)]
    pub audio: Vec<PluginEntry>,
    #[serde(default)]
    pub video: Vec<PluginEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub id: ParameterId,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub index: Option<i64>,
}

/// One inbound frame, classified once at the channel boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Snapshot(Box<Composition>),
    SourcesUpdate(PluginListing),
    EffectsUpdate(PluginListing),
    ThumbnailUpdate(ThumbnailDescriptor),
    ParameterUpdate(ParameterUpdate),
    Unroutable(Value),
}

impl InboundFrame {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw: Value = serde_json::from_str(text)?;
        Self::classify(raw)
    }

    /// Typed frames are recognised by a string `type`; untyped objects by
    /// which fields they carry.
    pub fn classify(raw: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut object) = raw else {
            return Ok(Self::Unroutable(raw));
        };

        if let Some(Value::String(kind)) = object.get("type") {
            let kind = kind.clone();
            return match kind.as_str() {
                SOURCES_UPDATE => Ok(Self::SourcesUpdate(typed_value(&mut object, &kind)?)),
                EFFECTS_UPDATE => Ok(Self::EffectsUpdate(typed_value(&mut object, &kind)?)),
                THUMBNAIL_UPDATE => Ok(Self::ThumbnailUpdate(typed_value(&mut object, &kind)?)),
                _ => Ok(Self::Unroutable(Value::Object(object))),
            };
        }

        if is_truthy(object.get("columns")) && is_truthy(object.get("layers")) {
            let composition = serde_json::from_value(Value::Object(object))
                .map_err(|source| DecodeError::payload("snapshot", source))?;
            return Ok(Self::Snapshot(Box::new(composition)));
        }

        if object.contains_key("id") {
            let update = serde_json::from_value(Value::Object(object))
                .map_err(|source| DecodeError::payload("parameter", source))?;
            return Ok(Self::ParameterUpdate(update));
        }

        Ok(Self::Unroutable(Value::Object(object)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::SourcesUpdate(_) => SOURCES_UPDATE,
            Self::EffectsUpdate(_) => EFFECTS_UPDATE,
            Self::ThumbnailUpdate(_) => THUMBNAIL_UPDATE,
            Self::ParameterUpdate(_) => "parameter_update",
            Self::Unroutable(_) => "unroutable",
        }
    }
}

fn typed_value<T>(object: &mut Map<String, Value>, kind: &str) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    let value = object
        .remove("value")
        .filter(|value| !value.is_null())
        .ok_or_else(|| DecodeError::MissingValue {
            kind: kind.to_string(),
        })?;
    serde_json::from_value(value).map_err(|source| DecodeError::payload(kind, source))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostBody {
    Text(String),
    Binary(Vec<u8>),
}

impl Serialize for PostBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Binary(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        }
    }
}

impl From<String> for PostBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for PostBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for PostBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// Outbound frame on the persistent channel.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Action {
        action: String,
        parameter: String,
        value: Option<Value>,
    },
    Post {
        path: String,
        body: Option<PostBody>,
    },
    Remove {
        path: String,
    },
}

impl OutboundFrame {
    pub fn action(action: impl Into<String>, parameter: impl Into<String>, value: Option<Value>) -> Self {
        Self::Action {
            action: action.into(),
            parameter: parameter.into(),
            value,
        }
    }

    pub fn post(path: impl Into<String>, body: Option<PostBody>) -> Self {
        Self::Post {
            path: path.into(),
            body,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn verb(&self) -> &str {
        match self {
            Self::Action { action, .. } => action,
            Self::Post { .. } => "post",
            Self::Remove { .. } => "remove",
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for OutboundFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Action {
                action,
                parameter,
                value,
            } => {
                let mut map = serializer.serialize_map(Some(if value.is_some() { 3 } else { 2 }))?;
                map.serialize_entry("action", action)?;
                map.serialize_entry("parameter", parameter)?;
                if let Some(value) = value {
                    map.serialize_entry("value", value)?;
                }
                map.end()
            }
            Self::Post { path, body } => {
                let mut map = serializer.serialize_map(Some(if body.is_some() { 3 } else { 2 }))?;
                map.serialize_entry("action", "post")?;
                map.serialize_entry("path", path)?;
                if let Some(body) = body {
                    map.serialize_entry("body", body)?;
                }
                map.end()
            }
            Self::Remove { path } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("action", "remove")?;
                map.serialize_entry("path", path)?;
                map.end()
            }
        }
    }
}
