use shared::protocol::InboundFrame;
use tracing::{debug, warn};

use crate::{store::CompositionStore, SessionEvent};

/// Decodes one channel frame and applies it; malformed frames are logged and dropped.
pub fn route_text(store: &CompositionStore, text: &str) -> Option<SessionEvent> {
    match InboundFrame::decode(text) {
        Ok(frame) => route(store, frame),
        Err(err) => {
            warn!(error = %err, "dropping malformed mixer frame");
            None
        }
    }
}

pub fn route(store: &CompositionStore, frame: InboundFrame) -> Option<SessionEvent> {
    match frame {
        InboundFrame::Snapshot(composition) => {
            debug!(
                layers = composition.layers.len(),
                columns = composition.columns.len(),
                groups = composition.layergroups.len(),
                "applying composition snapshot"
            );
            store.apply_snapshot(*composition);
            Some(SessionEvent::CompositionReplaced)
        }
        InboundFrame::SourcesUpdate(listing) => {
            debug!(
                audio = listing.audio.len(),
                video = listing.video.len(),
                "sources update"
            );
            store.apply_sources(listing);
            Some(SessionEvent::SourcesUpdated)
        }
        InboundFrame::EffectsUpdate(listing) => {
            debug!(
                audio = listing.audio.len(),
                video = listing.video.len(),
                "effects update"
            );
            store.apply_effects(listing);
            Some(SessionEvent::EffectsUpdated)
        }
        InboundFrame::ThumbnailUpdate(thumbnail) => {
            let clip_id = thumbnail.id;
            if store.apply_thumbnail_patch(clip_id, thumbnail) {
                Some(SessionEvent::ThumbnailUpdated { clip_id })
            } else {
                debug!(clip_id = clip_id.0, "thumbnail update for unknown clip");
                None
            }
        }
        InboundFrame::ParameterUpdate(update) => {
            store.apply_parameter_update(update.clone());
            Some(SessionEvent::ParameterUpdated(update))
        }
        InboundFrame::Unroutable(raw) => {
            debug!(frame = %raw, "ignoring unroutable mixer frame");
            None
        }
    }
}
