use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(LayerId);
id_newtype!(LayerGroupId);
id_newtype!(ClipId);
id_newtype!(ColumnId);
id_newtype!(DeckId);
id_newtype!(ParameterId);

/// The five states of a clip's `connected` parameter, in mixer index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectedState {
    Empty,
    Disconnected,
    Previewing,
    Connected,
    ConnectedAndPreviewing,
}

impl ConnectedState {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Empty),
            1 => Some(Self::Disconnected),
            2 => Some(Self::Previewing),
            3 => Some(Self::Connected),
            4 => Some(Self::ConnectedAndPreviewing),
            _ => None,
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, Self::Connected | Self::ConnectedAndPreviewing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    #[serde(rename = "ParamBoolean")]
    Boolean,
    #[serde(rename = "ParamChoice")]
    Choice,
    #[serde(rename = "ParamColor")]
    Color,
    #[serde(rename = "ParamEvent")]
    Event,
    #[serde(rename = "ParamNumber")]
    Number,
    #[serde(rename = "ParamRange")]
    Range,
    #[serde(rename = "ParamState")]
    State,
    #[serde(rename = "ParamString")]
    String,
    #[serde(rename = "ParamText")]
    Text,
    #[serde(other)]
    Unknown,
}
