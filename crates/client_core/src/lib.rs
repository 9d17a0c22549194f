use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    composition::{Clip, Composition},
    domain::ClipId,
    protocol::{ParameterUpdate, PluginListing, ProductInfo},
};
use tokio::sync::{broadcast, watch};
use tokio_stream::{
    wrappers::{BroadcastStream, WatchStream},
    Stream, StreamExt,
};
use tracing::{debug, info, warn};

pub mod connection;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod operator;
pub mod router;
pub mod store;
pub mod topology;

pub use connection::{ConnectionState, ReconnectPolicy};
pub use dispatcher::CommandDispatcher;
pub use endpoint::Endpoint;
pub use store::CompositionStore;
pub use topology::Topology;

use connection::{ChannelHandler, ConnectionManager};

/// What changed in the mirror, in the order the channel delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionStateChanged(ConnectionState),
    CompositionReplaced,
    ThumbnailUpdated { clip_id: ClipId },
    SourcesUpdated,
    EffectsUpdated,
    ProductUpdated(ProductInfo),
    ParameterUpdated(ParameterUpdate),
}

#[async_trait]
pub trait ProductInfoSource: Send + Sync {
    async fn fetch_product(&self) -> Result<ProductInfo>;
}

pub struct MissingProductInfo;

#[async_trait]
impl ProductInfoSource for MissingProductInfo {
    async fn fetch_product(&self) -> Result<ProductInfo> {
        Err(anyhow!("product info source is not configured"))
    }
}

/// Fetches `GET /api/v1/product` over plain HTTP, outside the channel.
pub struct HttpProductInfo {
    http: Client,
    url: String,
}

impl HttpProductInfo {
    pub fn new(http: Client, endpoint: &Endpoint) -> Self {
        Self {
            http,
            url: endpoint.product_url(),
        }
    }
}

#[async_trait]
impl ProductInfoSource for HttpProductInfo {
    async fn fetch_product(&self) -> Result<ProductInfo> {
        let product = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("failed to request {}", self.url))?
            .error_for_status()?
            .json()
            .await
            .context("mixer returned malformed product info")?;
        Ok(product)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// The store the channel feeds and the event fan-out. Handler callbacks run
/// on the connection task.
struct SessionCore {
    store: Arc<CompositionStore>,
    events: broadcast::Sender<SessionEvent>,
    product_source: Arc<dyn ProductInfoSource>,
    // Generation of the open channel, 0 while closed. Product writes check it
    // under the same lock that `closed` clears it with.
    open_generation: Mutex<u64>,
}

impl SessionCore {
    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn refresh_product(&self, generation: u64) {
        match self.product_source.fetch_product().await {
            Ok(product) => {
                let open = self.open_generation.lock().unwrap_or_else(PoisonError::into_inner);
                if *open != generation {
                    debug!(generation, "discarding product info from a closed connection");
                    return;
                }
                info!(product = %product, "mixer product info");
                self.store.set_product(product.clone());
                self.publish(SessionEvent::ProductUpdated(product));
            }
            Err(err) => warn!(error = %err, "failed to fetch mixer product info"),
        }
    }
}

impl ChannelHandler for SessionCore {
    fn opened(self: Arc<Self>, generation: u64) {
        *self.open_generation.lock().unwrap_or_else(PoisonError::into_inner) = generation;
        self.publish(SessionEvent::ConnectionStateChanged(ConnectionState::Connected));
        tokio::spawn(async move {
            self.refresh_product(generation).await;
        });
    }

    fn frame(&self, text: &str) {
        if let Some(event) = router::route_text(&self.store, text) {
            self.publish(event);
        }
    }

    fn closed(&self) {
        let mut open = self.open_generation.lock().unwrap_or_else(PoisonError::into_inner);
        if std::mem::take(&mut *open) == 0 {
            return;
        }
        self.store.reset();
        self.publish(SessionEvent::ConnectionStateChanged(ConnectionState::Disconnected));
    }
}

/// One mixer session: the single channel, the mirror it feeds and the command
/// sink. Construct it once and pass it to whatever needs it. Dropping the
/// session closes the channel.
pub struct Session {
    core: Arc<SessionCore>,
    connection: Arc<ConnectionManager>,
    dispatcher: CommandDispatcher,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let http = Client::new();
        let product_source = Arc::new(HttpProductInfo::new(http.clone(), &config.endpoint));
        Self::with_product_source(config, http, product_source)
    }

    pub fn with_product_source(
        config: SessionConfig,
        http: Client,
        product_source: Arc<dyn ProductInfoSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        let connection = ConnectionManager::new(config.endpoint, config.reconnect);
        let dispatcher = CommandDispatcher::new(Arc::clone(&connection), http);
        Self {
            core: Arc::new(SessionCore {
                store: Arc::new(CompositionStore::new()),
                events,
                product_source,
                open_generation: Mutex::new(0),
            }),
            connection,
            dispatcher,
        }
    }

    /// Starts connecting. Must be called inside a tokio runtime; subscribe
    /// first to see the initial connect.
    pub fn start(&self) {
        let handler: Arc<dyn ChannelHandler> = self.core.clone();
        self.connection.start(handler);
    }

    pub fn shutdown(&self) {
        self.connection.shutdown();
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    pub fn store(&self) -> &Arc<CompositionStore> {
        &self.core.store
    }

    pub fn composition(&self) -> Arc<Composition> {
        self.core.store.current()
    }

    pub fn watch_composition(&self) -> watch::Receiver<Arc<Composition>> {
        self.core.store.subscribe()
    }

    /// Render rows for the current composition, top row first.
    pub fn topology(&self) -> Topology {
        Topology::from_composition(&self.composition())
    }

    pub fn product(&self) -> ProductInfo {
        self.core.store.product()
    }

    pub fn sources(&self) -> Arc<PluginListing> {
        self.core.store.sources()
    }

    pub fn effects(&self) -> Arc<PluginListing> {
        self.core.store.effects()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub fn connection_states(&self) -> impl Stream<Item = ConnectionState> {
        WatchStream::new(self.connection.watch_state())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.core.events.subscribe()
    }

    /// Events as a stream. A subscriber that falls behind skips what it missed
    /// and keeps going; the store always holds the latest state.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> {
        BroadcastStream::new(self.core.events.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(error = %err, "session event subscriber lagged");
                None
            }
        })
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn thumbnail_url(&self, clip: &Clip) -> String {
        self.endpoint()
            .thumbnail_url(clip.id, &clip.thumbnail.last_update)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.connection.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
