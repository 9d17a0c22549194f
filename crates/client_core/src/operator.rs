use serde_json::Value;
use shared::{
    composition::{Clip, Composition, Layer, Parameter},
    domain::{ClipId, ColumnId, LayerId},
    protocol::PostBody,
};
use tracing::{debug, warn};

use crate::dispatcher::{paths, CommandDispatcher};

/// The limited column trigger only fires clips on this many bottom layers.
pub const LIMITED_COLUMN_LAYERS: usize = 3;

const FORWARD_OPTION: &str = ">";
const PAUSE_OPTION: &str = "||";
const FORWARD_FALLBACK: usize = 2;
const PAUSE_FALLBACK: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfaderSide {
    A,
    B,
}

impl CrossfaderSide {
    pub fn index(self) -> i64 {
        match self {
            Self::A => 1,
            Self::B => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayDirection {
    Forward,
    Pause,
}

impl PlayDirection {
    /// Index to write into a play-direction parameter, from its option list.
    pub fn option_index(self, parameter: &Parameter) -> usize {
        let (label, fallback) = match self {
            Self::Forward => (FORWARD_OPTION, FORWARD_FALLBACK),
            Self::Pause => (PAUSE_OPTION, PAUSE_FALLBACK),
        };
        parameter.option_index(label).unwrap_or(fallback)
    }
}

/// Clip whose transport a layer-level play or pause drives: the playing clip,
/// else the selected one, else the first clip with a transport.
pub fn layer_play_target(layer: &Layer) -> Option<&Clip> {
    let clips = || {
        layer
            .clips
            .iter()
            .map(|clip| clip.as_ref())
            .filter(|clip| clip.play_direction().is_some())
    };
    clips()
        .find(|clip| clip.is_playing())
        .or_else(|| clips().find(|clip| clip.is_selected()))
        .or_else(|| clips().next())
}

/// Same choice for the composition-wide controls, where playing and selected
/// clips rank equally.
pub fn composition_play_target(layer: &Layer) -> Option<&Clip> {
    let mut clips = layer
        .clips
        .iter()
        .map(|clip| clip.as_ref())
        .filter(|clip| clip.play_direction().is_some());
    let first = clips.clone().next();
    clips
        .find(|clip| clip.is_playing() || clip.is_selected())
        .or(first)
}

/// First selected clip carrying a text source parameter, with that parameter.
pub fn selected_text_parameter(composition: &Composition) -> Option<(&Clip, &Parameter)> {
    composition
        .layers
        .iter()
        .flat_map(|layer| layer.clips.iter())
        .filter(|clip| clip.is_selected())
        .find_map(|clip| {
            clip.text_source_parameter()
                .map(|(_, parameter)| (clip.as_ref(), parameter))
        })
}

impl CommandDispatcher {
    pub fn connect_clip(&self, clip_id: ClipId, down: bool) -> bool {
        self.trigger_level(paths::clip_connect(clip_id), down)
    }

    pub fn select_clip(&self, clip_id: ClipId) -> bool {
        self.trigger(paths::clip_select(clip_id))
    }

    pub fn clear_clip(&self, clip_id: ClipId) -> bool {
        self.post(paths::clip_clear(clip_id), None)
    }

    pub fn revert_thumbnail(&self, clip_id: ClipId) -> bool {
        self.remove(paths::clip_thumbnail(clip_id))
    }

    /// Loads a browser item into a clip slot; `target` is the sub-path the
    /// item was dragged from, `object` its description.
    pub fn drop_onto_clip(&self, clip_id: ClipId, target: &str, object: impl Into<PostBody>) -> bool {
        let target = target.trim_start_matches('/');
        self.post(
            format!("{}/{target}", paths::clip(clip_id)),
            Some(object.into()),
        )
    }

    pub fn add_layer(&self) -> bool {
        self.post(paths::LAYERS_ADD, None)
    }

    pub fn insert_layer_below(&self, layer_id: LayerId) -> bool {
        self.post(paths::LAYERS_ADD, Some(PostBody::Text(paths::layer(layer_id))))
    }

    pub fn duplicate_layer(&self, layer_id: LayerId) -> bool {
        self.post(paths::layer_duplicate(layer_id), None)
    }

    pub fn remove_layer(&self, layer_id: LayerId) -> bool {
        self.remove(paths::layer(layer_id))
    }

    pub fn select_layer(&self, layer_id: LayerId) -> bool {
        self.trigger(paths::layer_select(layer_id))
    }

    pub fn clear_layer(&self, layer_id: LayerId) -> bool {
        self.trigger(paths::layer_clear(layer_id))
    }

    /// Stopping a layer disconnects whatever it plays.
    pub fn stop_layer(&self, layer_id: LayerId) -> bool {
        self.clear_layer(layer_id)
    }

    pub fn set_layer_bypass(&self, layer: &Layer, bypassed: bool) -> bool {
        self.update_layer_parameter(layer, layer.bypassed.as_ref(), "bypassed", bypassed)
    }

    pub fn set_layer_solo(&self, layer: &Layer, solo: bool) -> bool {
        self.update_layer_parameter(layer, layer.solo.as_ref(), "solo", solo)
    }

    pub fn set_crossfader_group(&self, layer: &Layer, side: CrossfaderSide) -> bool {
        self.update_layer_parameter(
            layer,
            layer.crossfadergroup.as_ref(),
            "crossfadergroup",
            side.index(),
        )
    }

    pub fn play_layer(&self, layer: &Layer) -> bool {
        self.drive_transport(layer, layer_play_target(layer), PlayDirection::Forward)
    }

    pub fn pause_layer(&self, layer: &Layer) -> bool {
        self.drive_transport(layer, layer_play_target(layer), PlayDirection::Pause)
    }

    pub fn connect_column(&self, column_id: ColumnId, down: bool) -> bool {
        self.trigger_level(paths::column_connect(column_id), down)
    }

    /// Connects clip `index` of each of the first few layers instead of the
    /// whole column. Returns how many clips were triggered.
    pub fn connect_column_limited(&self, composition: &Composition, index: usize, down: bool) -> usize {
        composition
            .layers
            .iter()
            .take(LIMITED_COLUMN_LAYERS)
            .filter_map(|layer| layer.clips.get(index))
            .filter(|clip| self.connect_clip(clip.id, down))
            .count()
    }

    pub fn add_column(&self) -> bool {
        self.post(paths::COLUMNS_ADD, None)
    }

    pub fn remove_column(&self, column_id: ColumnId) -> bool {
        self.remove(paths::column(column_id))
    }

    pub fn disconnect_all(&self) -> bool {
        self.trigger(paths::DISCONNECT_ALL)
    }

    pub fn select_composition(&self) -> bool {
        self.trigger(paths::SELECTED)
    }

    /// Returns how many layers were told to play.
    pub fn play_all(&self, composition: &Composition) -> usize {
        self.drive_all(composition, PlayDirection::Forward)
    }

    pub fn pause_all(&self, composition: &Composition) -> usize {
        self.drive_all(composition, PlayDirection::Pause)
    }

    pub fn stop_all(&self, composition: &Composition) -> usize {
        composition
            .layers
            .iter()
            .filter(|layer| self.stop_layer(layer.id))
            .count()
    }

    /// Sets the master volume, clamped into the parameter's range.
    pub fn set_volume(&self, composition: &Composition, level: f64) -> bool {
        let Some(volume) = composition.volume() else {
            debug!("composition has no volume parameter");
            return false;
        };
        let level = clamp_to_range(volume, level);
        self.update_parameter(volume.id, level)
    }

    pub fn resync_tempo(&self, composition: &Composition) -> bool {
        match composition.tempocontroller.resync.as_ref() {
            Some(resync) => self.update_parameter(resync.id, true),
            None => {
                debug!("composition has no tempo resync parameter");
                false
            }
        }
    }

    /// Writes `text` into the selected clip's text source. Blank text is not sent.
    pub fn send_text_to_selected_clip(&self, composition: &Composition, text: &str) -> bool {
        let Some((clip, parameter)) = selected_text_parameter(composition) else {
            warn!("no selected clip with a text parameter");
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }
        debug!(clip_id = clip.id.0, parameter_id = parameter.id.0, "sending text to clip");
        self.update_parameter(parameter.id, text)
    }

    pub fn clear_selected_clip_text(&self, composition: &Composition) -> bool {
        match selected_text_parameter(composition) {
            Some((_, parameter)) => self.update_parameter(parameter.id, ""),
            None => false,
        }
    }

    fn update_layer_parameter(
        &self,
        layer: &Layer,
        parameter: Option<&Parameter>,
        name: &str,
        value: impl Into<Value>,
    ) -> bool {
        match parameter {
            Some(parameter) => self.update_parameter(parameter.id, value),
            None => {
                debug!(layer_id = layer.id.0, parameter = name, "layer has no such parameter");
                false
            }
        }
    }

    fn drive_transport(&self, layer: &Layer, target: Option<&Clip>, direction: PlayDirection) -> bool {
        let Some(parameter) = target.and_then(Clip::play_direction) else {
            debug!(layer_id = layer.id.0, "no clip with a transport in layer");
            return false;
        };
        self.update_parameter(parameter.id, direction.option_index(parameter))
    }

    fn drive_all(&self, composition: &Composition, direction: PlayDirection) -> usize {
        composition
            .layers
            .iter()
            .filter(|layer| self.drive_transport(layer, composition_play_target(layer), direction))
            .count()
    }
}

fn clamp_to_range(parameter: &Parameter, level: f64) -> f64 {
    let min = parameter.min.unwrap_or(f64::NEG_INFINITY);
    let max = parameter.max.unwrap_or(f64::INFINITY);
    if min <= max {
        level.clamp(min, max)
    } else {
        level
    }
}

#[cfg(test)]
#[path = "tests/operator_tests.rs"]
mod tests;
