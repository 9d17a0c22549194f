use std::{collections::HashMap, sync::Arc};

use shared::{
    composition::{Composition, ThumbnailDescriptor},
    domain::{ClipId, ParameterId},
    protocol::{ParameterUpdate, PluginListing, ProductInfo},
};
use tokio::sync::watch;

pub type ParameterCache = HashMap<ParameterId, ParameterUpdate>;

pub struct CompositionStore {
    composition: watch::Sender<Arc<Composition>>,
    sources: watch::Sender<Arc<PluginListing>>,
    effects: watch::Sender<Arc<PluginListing>>,
    product: watch::Sender<ProductInfo>,
    parameters: watch::Sender<Arc<ParameterCache>>,
}

impl Default for CompositionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionStore {
    pub fn new() -> Self {
        Self {
            composition: watch::Sender::new(Arc::new(Composition::default())),
            sources: watch::Sender::new(Arc::new(PluginListing::default())),
            effects: watch::Sender::new(Arc::new(PluginListing::default())),
            product: watch::Sender::new(ProductInfo::default()),
            parameters: watch::Sender::new(Arc::new(ParameterCache::new())),
        }
    }

    pub fn current(&self) -> Arc<Composition> {
        self.composition.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Composition>> {
        self.composition.subscribe()
    }

    pub fn sources(&self) -> Arc<PluginListing> {
        self.sources.borrow().clone()
    }

    pub fn effects(&self) -> Arc<PluginListing> {
        self.effects.borrow().clone()
    }

    pub fn product(&self) -> ProductInfo {
        self.product.borrow().clone()
    }

    pub fn subscribe_product(&self) -> watch::Receiver<ProductInfo> {
        self.product.subscribe()
    }

    pub fn parameters(&self) -> Arc<ParameterCache> {
        self.parameters.borrow().clone()
    }

    pub fn parameter(&self, id: ParameterId) -> Option<ParameterUpdate> {
        self.parameters.borrow().get(&id).cloned()
    }

    pub fn apply_snapshot(&self, composition: Composition) {
        self.composition.send_replace(Arc::new(composition));
    }

    /// Replaces one clip's thumbnail. Only the clip and its owning layer are
    /// rebuilt; returns `false` and leaves the composition untouched when no
    /// clip has that id.
    pub fn apply_thumbnail_patch(&self, clip_id: ClipId, thumbnail: ThumbnailDescriptor) -> bool {
        self.composition.send_if_modified(move |current| {
            let Some((layer_index, clip_index)) = current.locate_clip(clip_id) else {
                return false;
            };

            let mut next = Composition::clone(&**current);
            let layer = Arc::make_mut(&mut next.layers[layer_index]);
            Arc::make_mut(&mut layer.clips[clip_index]).thumbnail = thumbnail;
            *current = Arc::new(next);
            true
        })
    }

    pub fn apply_sources(&self, listing: PluginListing) {
        self.sources.send_replace(Arc::new(listing));
    }

    pub fn apply_effects(&self, listing: PluginListing) {
        self.effects.send_replace(Arc::new(listing));
    }

    pub fn set_product(&self, product: ProductInfo) {
        self.product.send_replace(product);
    }

    pub fn apply_parameter_update(&self, update: ParameterUpdate) {
        self.parameters.send_modify(|cache| {
            Arc::make_mut(cache).insert(update.id, update);
        });
    }

    /// Restores every mirrored value to its disconnected default.
    pub fn reset(&self) {
        self.composition.send_if_modified(|current| {
            if **current == Composition::default() {
                return false;
            }
            *current = Arc::new(Composition::default());
            true
        });
        self.sources
            .send_if_modified(|current| replace_if_changed(current, PluginListing::default()));
        self.effects
            .send_if_modified(|current| replace_if_changed(current, PluginListing::default()));
        self.product.send_if_modified(|current| {
            let fresh = ProductInfo::default();
            if *current == fresh {
                return false;
            }
            *current = fresh;
            true
        });
        self.parameters.send_if_modified(|current| {
            if current.is_empty() {
                return false;
            }
            *current = Arc::new(ParameterCache::new());
            true
        });
    }
}

fn replace_if_changed<T: PartialEq>(current: &mut Arc<T>, fresh: T) -> bool {
    if **current == fresh {
        return false;
    }
    *current = Arc::new(fresh);
    true
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
