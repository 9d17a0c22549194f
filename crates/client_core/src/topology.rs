use std::{collections::HashMap, sync::Arc};

use shared::composition::{display_name, Clip, Column, Composition, Layer, LayerGroup};
use tracing::warn;

use crate::error::TopologyError;

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// `index` counts standalone layers in mixer order, for `#` name translation.
    Layer { layer: Arc<Layer>, index: usize },
    Group { group: Arc<LayerGroup>, index: usize },
}

impl Row {
    pub fn display_name(&self) -> String {
        let (raw, index) = match self {
            Self::Layer { layer, index } => (layer.name.as_str(), *index),
            Self::Group { group, index } => (group.name.as_str(), *index),
        };
        display_name(raw.unwrap_or_default(), index)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClipRow {
    Clips(Vec<Arc<Clip>>),
    GroupColumns(Vec<Arc<Column>>),
}

impl ClipRow {
    pub fn len(&self) -> usize {
        match self {
            Self::Clips(clips) => clips.len(),
            Self::GroupColumns(columns) => columns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Clip(Arc<Clip>),
    Column(Arc<Column>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub rows: Vec<Row>,
    pub clip_rows: Vec<ClipRow>,
}

impl Topology {
    pub fn from_composition(composition: &Composition) -> Self {
        reconstruct(&composition.layers, &composition.layergroups)
    }

    /// All clip-row cells, top row first, in one sequence.
    pub fn flattened(&self) -> Vec<Cell> {
        self.clip_rows
            .iter()
            .flat_map(|row| -> Vec<Cell> {
                match row {
                    ClipRow::Clips(clips) => clips.iter().cloned().map(Cell::Clip).collect(),
                    ClipRow::GroupColumns(columns) => {
                        columns.iter().cloned().map(Cell::Column).collect()
                    }
                }
            })
            .collect()
    }
}

/// Merges layers and groups by the first-member rule in one pass. Inputs are
/// in mixer order, bottom first; rows come out top first.
///
/// Group membership is matched positionally against the group's first member
/// only; the following layers are consumed on trust. Mismatches are logged,
/// never fatal.
pub fn reconstruct(layers: &[Arc<Layer>], groups: &[Arc<LayerGroup>]) -> Topology {
    let mut layer_iter = layers.iter().peekable();
    let mut group_iter = groups.iter().peekable();
    let mut rows = Vec::with_capacity(layers.len() + groups.len());
    let mut clip_rows = Vec::with_capacity(layers.len() + groups.len());
    let mut layer_index = 0;
    let mut group_index = 0;

    loop {
        let layer = layer_iter.peek().copied();
        let group = group_iter.peek().copied();
        if layer.is_none() && group.is_none() {
            break;
        }

        match group {
            Some(group)
                if layer.map_or(true, |layer| Some(layer.id) == group.first_member()) =>
            {
                group_iter.next();
                rows.push(Row::Group {
                    group: Arc::clone(group),
                    index: group_index,
                });

                for member in &group.layers {
                    let Some(layer) = layer_iter.next() else {
                        warn!(group_id = group.id.0, "layer group runs past the last layer");
                        break;
                    };
                    if layer.id != member.id {
                        warn!(
                            group_id = group.id.0,
                            expected = member.id.0,
                            found = layer.id.0,
                            "layer group members are not contiguous"
                        );
                    }
                    clip_rows.push(ClipRow::Clips(layer.clips.clone()));
                }
                clip_rows.push(ClipRow::GroupColumns(group.columns.clone()));
                group_index += 1;
            }
            _ => {
                let Some(layer) = layer_iter.next() else {
                    break;
                };
                rows.push(Row::Layer {
                    layer: Arc::clone(layer),
                    index: layer_index,
                });
                clip_rows.push(ClipRow::Clips(layer.clips.clone()));
                layer_index += 1;
            }
        }
    }

    rows.reverse();
    clip_rows.reverse();
    Topology { rows, clip_rows }
}

/// Checks that every group names existing layers forming one contiguous run.
pub fn validate_groups(layers: &[Arc<Layer>], groups: &[Arc<LayerGroup>]) -> Result<(), TopologyError> {
    let positions: HashMap<_, _> = layers
        .iter()
        .enumerate()
        .map(|(position, layer)| (layer.id, position))
        .collect();

    for group in groups {
        let mut expected = None;
        if group.layers.is_empty() {
            return Err(TopologyError::EmptyGroup {
                group_id: group.id.0,
            });
        }
        for member in &group.layers {
            let found = *positions
                .get(&member.id)
                .ok_or(TopologyError::UnknownMember {
                    group_id: group.id.0,
                    layer_id: member.id.0,
                })?;
            if let Some(expected) = expected {
                if found != expected {
                    return Err(TopologyError::NotContiguous {
                        group_id: group.id.0,
                        layer_id: member.id.0,
                        expected,
                        found,
                    });
                }
            }
            expected = Some(found + 1);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/topology_tests.rs"]
mod tests;
