use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use shared::protocol::OutboundFrame;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;

type MixerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Doubles the previous delay, never below `min_interval` nor above `max_interval`.
    pub fn next_delay(&self, previous: Option<Duration>) -> Duration {
        let max = self.max_interval.max(self.min_interval);
        match previous {
            None => self.min_interval,
            Some(previous) => previous.saturating_mul(2).clamp(self.min_interval, max),
        }
    }
}

/// Receives channel lifecycle and frames on the connection task, in arrival order.
pub trait ChannelHandler: Send + Sync + 'static {
    fn opened(self: Arc<Self>, generation: u64);
    fn frame(&self, text: &str);
    fn closed(&self);
}

struct ActiveRun {
    id: u64,
    handler: Arc<dyn ChannelHandler>,
}

struct QueuedFrame {
    generation: u64,
    text: String,
}

/// Frames carry the generation of the connection they were queued on; a frame
/// left over from an earlier connection is discarded, never replayed.
pub struct ConnectionManager {
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    generation: AtomicU64,
    runs: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<QueuedFrame>>>,
    // Held across every handler callback and every state change the task makes.
    active: Mutex<Option<ActiveRun>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, policy: ReconnectPolicy) -> Arc<Self> {
        Arc::new(Self {
            endpoint,
            policy,
            state: watch::Sender::new(ConnectionState::Disconnected),
            generation: AtomicU64::new(0),
            runs: AtomicU64::new(0),
            outbound: Mutex::new(None),
            active: Mutex::new(None),
            task: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Spawns the connection task. Calling it while a task is alive is a no-op,
    /// so there is never more than one channel.
    pub fn start(self: &Arc<Self>, handler: Arc<dyn ChannelHandler>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("mixer connection already running");
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveRun { id: run, handler });
        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            manager.run(run, rx).await;
        }));
    }

    /// Stops the connection task, including any pending reconnect delay. An
    /// open channel is reported closed to the handler before the state flips.
    ///
    /// The task may be mid-callback on another worker, where abort cannot reach
    /// it. Taking the handler lock waits that callback out, and the task makes
    /// no further callback once its run is gone.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(stopped) = active.take() {
            if self.state() == ConnectionState::Connected {
                stopped.handler.closed();
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Queues a frame for the open channel. Returns `false` and drops the
    /// frame when the channel is not connected.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        if self.state() != ConnectionState::Connected {
            debug!(action = frame.verb(), "mixer not connected, dropping command");
            return false;
        }

        let text = match frame.to_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, action = frame.verb(), "failed to encode command");
                return false;
            }
        };

        let generation = self.generation.load(Ordering::SeqCst);
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound.as_ref() {
            Some(tx) => tx.send(QueuedFrame { generation, text }).is_ok(),
            None => false,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Runs `callback` under the handler lock if run `run` is still the
    /// active one. Returns `false` once that run has been shut down.
    fn with_handler(&self, run: u64, callback: impl FnOnce(&Arc<dyn ChannelHandler>)) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(active) if active.id == run => {
                callback(&active.handler);
                true
            }
            _ => false,
        }
    }

    async fn run(self: Arc<Self>, run: u64, mut outbound: mpsc::UnboundedReceiver<QueuedFrame>) {
        let url = self.endpoint.websocket_url();
        let mut delay = None;

        loop {
            if !self.with_handler(run, |_| self.set_state(ConnectionState::Connecting)) {
                return;
            }
            match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    delay = None;
                    let mut generation = 0;
                    let opened = self.with_handler(run, |handler| {
                        generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                        self.set_state(ConnectionState::Connected);
                        Arc::clone(handler).opened(generation);
                    });
                    if !opened {
                        return;
                    }
                    info!(%url, generation, "mixer channel open");

                    self.pump(run, socket, &mut outbound, generation).await;

                    let active = self.with_handler(run, |handler| {
                        self.generation.fetch_add(1, Ordering::SeqCst);
                        handler.closed();
                        self.set_state(ConnectionState::Disconnected);
                    });
                    while outbound.try_recv().is_ok() {}
                    if !active {
                        return;
                    }
                    info!(%url, "mixer channel closed");
                }
                Err(err) => {
                    debug!(%url, error = %err, "mixer channel failed to open");
                    if !self.with_handler(run, |_| self.set_state(ConnectionState::Disconnected)) {
                        return;
                    }
                }
            }

            let wait = self.policy.next_delay(delay);
            delay = Some(wait);
            debug!(delay_ms = wait.as_millis() as u64, "scheduling mixer reconnect");
            tokio::time::sleep(wait).await;
        }
    }

    async fn pump(
        &self,
        run: u64,
        socket: MixerSocket,
        outbound: &mut mpsc::UnboundedReceiver<QueuedFrame>,
        generation: u64,
    ) {
        let (mut writer, mut reader) = socket.split();
        let deliver = |text: &str| self.with_handler(run, |handler| handler.frame(text));

        loop {
            tokio::select! {
                incoming = reader.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !deliver(text.as_str()) {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            if !deliver(text) {
                                break;
                            }
                        }
                        Err(_) => debug!(len = bytes.len(), "ignoring non-text binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "mixer channel receive failed");
                        break;
                    }
                },
                queued = outbound.recv() => match queued {
                    Some(frame) if frame.generation == generation => {
                        if let Err(err) = writer.send(Message::Text(frame.text)).await {
                            warn!(error = %err, "mixer channel send failed");
                            break;
                        }
                    }
                    Some(_) => debug!("discarding command queued on an earlier connection"),
                    None => break,
                },
            }
        }

        let _ = writer.close().await;
    }
}
