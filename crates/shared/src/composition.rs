use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::{
    ClipId, ColumnId, ConnectedState, DeckId, LayerGroupId, LayerId, ParamType, ParameterId,
};

/// `last_update` value of a clip that still shows the mixer's placeholder image.
pub const DUMMY_THUMBNAIL_TOKEN: &str = "0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ParameterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuetype: Option<ParamType>,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Parameter {
    pub fn as_bool(&self) -> bool {
        self.value.as_bool().unwrap_or(false)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn is_text(&self) -> bool {
        self.valuetype == Some(ParamType::Text)
    }

    /// Position of `label` in the option list of an enum parameter.
    pub fn option_index(&self, label: &str) -> Option<usize> {
        self.options.iter().position(|option| option == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailDescriptor {
    pub id: ClipId,
    #[serde(
        default = "dummy_thumbnail_token",
        deserialize_with = "string_or_number"
    )]
    pub last_update: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThumbnailDescriptor {
    pub fn is_dummy(&self) -> bool {
        self.last_update == DUMMY_THUMBNAIL_TOKEN
    }
}

impl Default for ThumbnailDescriptor {
    fn default() -> Self {
        Self {
            id: ClipId(0),
            last_update: dummy_thumbnail_token(),
            extra: Map::new(),
        }
    }
}

fn dummy_thumbnail_token() -> String {
    DUMMY_THUMBNAIL_TOKEN.to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct TokenVisitor;

    impl de::Visitor<'_> for TokenVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or integer update token")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(TokenVisitor)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportControls {
    pub playdirection: Option<Parameter>,
    pub playmode: Option<Parameter>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    pub position: Option<Parameter>,
    pub controls: Option<TransportControls>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipVideo {
    #[serde(default)]
    pub sourceparams: Option<IndexMap<String, Parameter>>,
    pub resize: Option<Parameter>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub name: Parameter,
    #[serde(default)]
    pub thumbnail: ThumbnailDescriptor,
    pub selected: Option<Parameter>,
    pub connected: Option<Parameter>,
    pub transport: Option<Transport>,
    pub audio: Option<Value>,
    pub video: Option<ClipVideo>,
    pub dashboard: Option<Value>,
    pub beatsnap: Option<Parameter>,
    pub transporttype: Option<Parameter>,
    pub target: Option<Parameter>,
    pub triggerstyle: Option<Parameter>,
    pub faderstart: Option<Parameter>,
    pub ignorecolumntrigger: Option<Parameter>,
}

impl Clip {
    pub fn connected_state(&self) -> Option<ConnectedState> {
        self.connected
            .as_ref()
            .and_then(|connected| connected.index)
            .and_then(ConnectedState::from_index)
    }

    /// Index 3 and above of the `connected` state means the clip is on air.
    pub fn is_playing(&self) -> bool {
        self.connected
            .as_ref()
            .and_then(|connected| connected.index)
            .is_some_and(|index| index >= 3)
    }

    pub fn is_selected(&self) -> bool {
        self.selected.as_ref().is_some_and(Parameter::as_bool)
    }

    pub fn play_direction(&self) -> Option<&Parameter> {
        self.transport
            .as_ref()?
            .controls
            .as_ref()?
            .playdirection
            .as_ref()
    }

    /// First text-typed source parameter, in the order the mixer listed them.
    pub fn text_source_parameter(&self) -> Option<(&str, &Parameter)> {
        self.video
            .as_ref()?
            .sourceparams
            .as_ref()?
            .iter()
            .find(|(_, param)| param.is_text())
            .map(|(name, param)| (name.as_str(), param))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: Parameter,
    #[serde(default)]
    pub clips: Vec<Arc<Clip>>,
    pub selected: Option<Parameter>,
    pub bypassed: Option<Parameter>,
    pub solo: Option<Parameter>,
    pub crossfadergroup: Option<Parameter>,
    pub master: Option<Parameter>,
    pub maskmode: Option<Parameter>,
    pub faderstart: Option<Parameter>,
    pub ignorecolumntrigger: Option<Parameter>,
    pub dashboard: Option<Value>,
    pub autopilot: Option<Value>,
    pub transition: Option<Value>,
    pub audio: Option<Value>,
    pub video: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: LayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGroup {
    pub id: LayerGroupId,
    pub name: Parameter,
    #[serde(default)]
    pub layers: Vec<GroupMember>,
    #[serde(default)]
    pub columns: Vec<Arc<Column>>,
    pub bypassed: Option<Parameter>,
    pub solo: Option<Parameter>,
    pub selected: Option<Parameter>,
    pub ignorecolumntrigger: Option<Parameter>,
}

impl LayerGroup {
    pub fn first_member(&self) -> Option<LayerId> {
        self.layers.first().map(|member| member.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: Parameter,
    pub connected: Option<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: DeckId,
    pub name: Parameter,
    pub selected: Option<Parameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossFader {
    pub id: Option<ParameterId>,
    pub phase: Option<Parameter>,
    pub behaviour: Option<Parameter>,
    pub curve: Option<Parameter>,
    pub mixer: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoController {
    pub tempo: Option<Parameter>,
    pub resync: Option<Parameter>,
    pub tempo_pull: Option<Parameter>,
    pub tempo_push: Option<Parameter>,
    pub tempo_tap: Option<Parameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionAudio {
    pub volume: Option<Parameter>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    #[serde(default)]
    pub dashboard: Arc<Map<String, Value>>,
    #[serde(default)]
    pub crossfader: Arc<CrossFader>,
    #[serde(default)]
    pub tempocontroller: Arc<TempoController>,
    #[serde(default)]
    pub decks: Vec<Arc<Deck>>,
    #[serde(default)]
    pub layers: Vec<Arc<Layer>>,
    #[serde(default)]
    pub columns: Vec<Arc<Column>>,
    #[serde(default)]
    pub layergroups: Vec<Arc<LayerGroup>>,
    pub audio: Option<Arc<CompositionAudio>>,
    pub video: Option<Arc<Value>>,
}

impl Composition {
    /// Position of a clip as `(layer index, clip index)`, scanning layers in order.
    pub fn locate_clip(&self, clip_id: ClipId) -> Option<(usize, usize)> {
        self.layers.iter().enumerate().find_map(|(layer_index, layer)| {
            layer
                .clips
                .iter()
                .position(|clip| clip.id == clip_id)
                .map(|clip_index| (layer_index, clip_index))
        })
    }

    pub fn clip(&self, clip_id: ClipId) -> Option<&Arc<Clip>> {
        let (layer_index, clip_index) = self.locate_clip(clip_id)?;
        Some(&self.layers[layer_index].clips[clip_index])
    }

    pub fn layer(&self, layer_id: LayerId) -> Option<&Arc<Layer>> {
        self.layers.iter().find(|layer| layer.id == layer_id)
    }

    pub fn selected_clip(&self) -> Option<&Arc<Clip>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.clips.iter())
            .find(|clip| clip.is_selected())
    }

    pub fn volume(&self) -> Option<&Parameter> {
        self.audio.as_ref()?.volume.as_ref()
    }

    pub fn clip_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.clips.len()).sum()
    }
}

/// Replaces every `#` in a layer, group or column name with `index + 1`.
pub fn display_name(raw: &str, index: usize) -> String {
    raw.replace('#', &(index + 1).to_string())
}
