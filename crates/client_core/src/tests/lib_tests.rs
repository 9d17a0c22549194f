use super::*;
use std::{
    net::SocketAddr,
    sync::Mutex,
    time::Duration,
};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Multipart, Path, State,
    },
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{ColumnId, LayerId, ParameterId};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};

use crate::{dispatcher::paths, error::UploadError, operator::CrossfaderSide, topology::Row};

const REJECTED_CLIP: i64 = 13;
const WAIT: Duration = Duration::from_secs(5);

const SNAPSHOT: &str = r#"{
    "columns": [
        {"id": 300, "name": {"id": 301, "value": "Column #"}},
        {"id": 302, "name": {"id": 303, "value": "Column #"}}
    ],
    "layers": [
        {
            "id": 1,
            "name": {"id": 2, "value": "Layer #"},
            "clips": [
                {"id": 10, "name": {"id": 100, "value": "Intro"}, "thumbnail": {"id": 10, "last_update": "0"}},
                {"id": 11, "name": {"id": 110, "value": "Loop"}, "thumbnail": {"id": 11, "last_update": "0"}}
            ]
        },
        {
            "id": 3,
            "name": {"id": 4, "value": "Layer #"},
            "clips": [{"id": 20, "name": {"id": 200, "value": "Logo"}}]
        },
        {
            "id": 5,
            "name": {"id": 6, "value": "Layer #"},
            "clips": [{"id": 30, "name": {"id": 300, "value": "Text"}}]
        }
    ],
    "layergroups": [
        {
            "id": 9,
            "name": {"id": 90, "value": "Group #"},
            "layers": [{"id": 3}, {"id": 5}],
            "columns": [{"id": 910, "name": {"id": 911, "value": "Column #"}}]
        }
    ],
    "audio": {"volume": {"id": 700, "value": 1.0, "min": 0.0, "max": 1.0}}
}"#;

const OPERATOR_SNAPSHOT: &str = r#"{
    "columns": [{"id": 300, "name": {"id": 301, "value": "Column #"}}],
    "layers": [
        {
            "id": 1,
            "name": {"id": 2, "value": "Layer #"},
            "bypassed": {"id": 40, "valuetype": "ParamBoolean", "value": false},
            "solo": {"id": 41, "valuetype": "ParamBoolean", "value": false},
            "crossfadergroup": {"id": 42, "valuetype": "ParamChoice", "index": 0, "options": ["Off", "A", "B"]},
            "clips": [
                {
                    "id": 10,
                    "name": {"id": 100, "value": "Intro"},
                    "connected": {"id": 101, "index": 1},
                    "transport": {"controls": {"playdirection": {"id": 102, "valuetype": "ParamChoice", "index": 1, "options": ["<", "||", ">"]}}}
                },
                {
                    "id": 11,
                    "name": {"id": 110, "value": "Title"},
                    "selected": {"id": 111, "valuetype": "ParamBoolean", "value": true},
                    "connected": {"id": 112, "index": 3},
                    "transport": {"controls": {"playdirection": {"id": 113, "valuetype": "ParamChoice", "index": 0, "options": ["||", "<", ">"]}}},
                    "video": {"sourceparams": {"Text": {"id": 114, "valuetype": "ParamText", "value": "hello"}}}
                }
            ]
        },
        {"id": 3, "name": {"id": 4, "value": "Layer #"}, "clips": []}
    ],
    "tempocontroller": {"resync": {"id": 80, "valuetype": "ParamEvent", "value": false}}
}"#;

/// A snapshot big enough that routing it takes a while.
fn large_snapshot(layers: i64) -> String {
    let layers: Vec<Value> = (0..layers)
        .map(|index| {
            let id = 10_000 + index * 100;
            let clips: Vec<Value> = (0..8)
                .map(|clip| json!({"id": id + 10 + clip, "name": {"id": id + 50 + clip, "value": format!("Clip {clip}")}}))
                .collect();
            json!({"id": id, "name": {"id": id + 1, "value": "Layer #"}, "clips": clips})
        })
        .collect();
    json!({"columns": [{"id": 1, "name": {"id": 2, "value": "Column #"}}], "layers": layers}).to_string()
}

#[derive(Debug, Clone)]
struct UploadedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct MixerState {
    greeting: Arc<Vec<String>>,
    close_after_greeting: bool,
    received: mpsc::UnboundedSender<Value>,
    uploads: Arc<Mutex<Vec<(i64, Vec<UploadedField>)>>>,
}

fn mixer_state(
    greeting: Vec<String>,
    close_after_greeting: bool,
) -> (MixerState, mpsc::UnboundedReceiver<Value>) {
    let (received, rx) = mpsc::unbounded_channel();
    let state = MixerState {
        greeting: Arc::new(greeting),
        close_after_greeting,
        received,
        uploads: Arc::new(Mutex::new(Vec::new())),
    };
    (state, rx)
}

fn mixer_router(state: MixerState) -> Router {
    Router::new()
        .route("/api/v1", get(mixer_socket))
        .route("/api/v1/product", get(product))
        .route(
            "/api/v1/composition/clips/by-id/:id/thumbnail",
            post(upload_thumbnail),
        )
        .with_state(state)
}

async fn mixer_socket(State(state): State<MixerState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_channel(state, socket))
}

async fn serve_channel(state: MixerState, mut socket: WebSocket) {
    for frame in state.greeting.iter() {
        if socket.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }
    if state.close_after_greeting {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            if let Ok(value) = serde_json::from_str(&text) {
                let _ = state.received.send(value);
            }
        }
    }
}

async fn product() -> Json<Value> {
    Json(json!({"name": "Arena", "major": 7, "minor": 20, "micro": 1, "revision": 42}))
}

async fn upload_thumbnail(
    State(state): State<MixerState>,
    Path(clip_id): Path<i64>,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|bytes| bytes.to_vec()).unwrap_or_default();
        fields.push(UploadedField {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
    state.uploads.lock().unwrap().push((clip_id, fields));

    if clip_id == REJECTED_CLIP {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported image format".to_string())
    } else {
        (StatusCode::OK, String::new())
    }
}

async fn spawn_mixer(
    greeting: Vec<String>,
    close_after_greeting: bool,
) -> Result<(SocketAddr, MixerState, mpsc::UnboundedReceiver<Value>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (state, rx) = mixer_state(greeting, close_after_greeting);
    let app = mixer_router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((addr, state, rx))
}

fn session_config(addr: SocketAddr, min_interval: Duration) -> SessionConfig {
    let endpoint = Endpoint::new(addr.ip().to_string(), addr.port()).expect("endpoint");
    SessionConfig {
        endpoint,
        reconnect: ReconnectPolicy {
            min_interval,
            max_interval: min_interval * 4,
        },
    }
}

async fn next_matching(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut accept: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if accept(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("session event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

async fn next_frame(received: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(WAIT, received.recv())
        .await
        .expect("timed out waiting for mixer frame")
        .expect("mixer frame channel closed")
}

#[tokio::test]
async fn snapshot_and_patches_are_mirrored() -> Result<()> {
    let greeting = vec![
        SNAPSHOT.to_string(),
        json!({"type": "thumbnail_update", "value": {"id": 11, "last_update": "1700000000"}}).to_string(),
        json!({"type": "sources_update", "value": {"audio": [], "video": [{"idstring": "A1", "name": "Text Block"}]}})
            .to_string(),
        json!({"id": 700, "path": "/composition/audio/volume", "value": 0.8}).to_string(),
    ];
    let (addr, _state, _received) = spawn_mixer(greeting, false).await?;
    let session = Session::new(session_config(addr, Duration::from_millis(50)));
    let mut events = session.subscribe_events();
    let mut product = session.store().subscribe_product();
    session.start();

    next_matching(&mut events, |event| *event == SessionEvent::CompositionReplaced).await;
    let before_patch = session.composition();
    next_matching(&mut events, |event| {
        *event == SessionEvent::ThumbnailUpdated { clip_id: ClipId(11) }
    })
    .await;
    next_matching(&mut events, |event| *event == SessionEvent::SourcesUpdated).await;
    next_matching(&mut events, |event| matches!(event, SessionEvent::ParameterUpdated(_))).await;

    let composition = session.composition();
    assert!(Arc::ptr_eq(&before_patch.layers[1], &composition.layers[1]));
    assert!(Arc::ptr_eq(&before_patch.layers[0].clips[0], &composition.layers[0].clips[0]));

    let intro = composition.clip(ClipId(10)).expect("intro clip");
    let looping = composition.clip(ClipId(11)).expect("loop clip");
    let base = format!("http://{addr}/api/v1");
    assert_eq!(session.thumbnail_url(intro), format!("{base}/composition/thumbnail/dummy"));
    assert_eq!(
        session.thumbnail_url(looping),
        format!("{base}/composition/clips/by-id/11/thumbnail/1700000000")
    );

    assert_eq!(session.sources().video.len(), 1);
    assert_eq!(
        session.store().parameter(ParameterId(700)).map(|update| update.value),
        Some(json!(0.8))
    );
    assert_eq!(composition.volume().map(|volume| volume.value.clone()), Some(json!(1.0)));

    let names: Vec<_> = session.topology().rows.iter().map(Row::display_name).collect();
    assert_eq!(names, ["Group 1", "Layer 1"]);

    let name = timeout(WAIT, product.wait_for(|product| product.name == "Arena"))
        .await?
        .map(|product| product.to_string())?;
    assert_eq!(name, "Arena 7.20.1 (rev 42)");
    Ok(())
}

#[tokio::test]
async fn closing_the_channel_resets_the_mirror_and_reconnects() -> Result<()> {
    let (addr, _state, _received) = spawn_mixer(vec![SNAPSHOT.to_string()], true).await?;
    let session = Session::new(session_config(addr, Duration::from_millis(500)));
    let mut events = session.subscribe_events();
    session.start();

    next_matching(&mut events, |event| *event == SessionEvent::CompositionReplaced).await;
    next_matching(&mut events, |event| {
        *event == SessionEvent::ConnectionStateChanged(ConnectionState::Disconnected)
    })
    .await;

    assert_eq!(*session.composition(), Composition::default());
    assert_eq!(session.product(), ProductInfo::default());
    assert_eq!(*session.sources(), PluginListing::default());
    assert!(session.topology().rows.is_empty());

    next_matching(&mut events, |event| {
        *event == SessionEvent::ConnectionStateChanged(ConnectionState::Connected)
    })
    .await;
    next_matching(&mut events, |event| *event == SessionEvent::CompositionReplaced).await;
    assert_eq!(session.composition().layers.len(), 3);
    Ok(())
}

#[tokio::test]
async fn commands_reach_the_channel_in_call_order() -> Result<()> {
    let (addr, _state, mut received) = spawn_mixer(vec![SNAPSHOT.to_string()], false).await?;
    let session = Session::new(session_config(addr, Duration::from_millis(50)));
    let mut events = session.subscribe_events();
    session.start();
    next_matching(&mut events, |event| *event == SessionEvent::CompositionReplaced).await;

    let dispatcher = session.dispatcher();
    assert!(dispatcher.connect_clip(ClipId(10), true));
    assert!(dispatcher.insert_layer_below(LayerId(3)));
    assert!(dispatcher.remove_column(ColumnId(302)));
    assert!(dispatcher.set_volume(&session.composition(), 1.5));
    assert!(dispatcher.post(paths::clip_thumbnail(ClipId(10)), Some(vec![1u8, 2, 3].into())));
    assert_eq!(dispatcher.connect_column_limited(&session.composition(), 0, false), 3);

    let expected = [
        json!({"action": "trigger", "parameter": "/composition/clips/by-id/10/connect", "value": true}),
        json!({"action": "post", "path": "/composition/layers/add", "body": "/composition/layers/by-id/3"}),
        json!({"action": "remove", "path": "/composition/columns/by-id/302"}),
        json!({"action": "update", "parameter": "/parameter/by-id/700", "value": 1.0}),
        json!({"action": "post", "path": "/composition/clips/by-id/10/thumbnail", "body": "AQID"}),
        json!({"action": "trigger", "parameter": "/composition/clips/by-id/10/connect", "value": false}),
        json!({"action": "trigger", "parameter": "/composition/clips/by-id/20/connect", "value": false}),
        json!({"action": "trigger", "parameter": "/composition/clips/by-id/30/connect", "value": false}),
    ];
    for frame in expected {
        assert_eq!(next_frame(&mut received).await, frame);
    }
    Ok(())
}

#[tokio::test]
async fn commands_issued_before_the_channel_opens_are_never_replayed() -> Result<()> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (state, mut received) = mixer_state(Vec::new(), false);
    let session = Session::new(session_config(addr, Duration::from_millis(50)));
    let mut events = session.subscribe_events();
    let mut states = session.watch_connection();

    assert!(!session.dispatcher().disconnect_all());

    session.start();
    timeout(WAIT, states.wait_for(|state| *state == ConnectionState::Connecting)).await??;
    assert!(!session.dispatcher().remove(paths::column(ColumnId(3))));
    assert!(!session.dispatcher().add_layer());

    let app = mixer_router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    next_matching(&mut events, |event| {
        *event == SessionEvent::ConnectionStateChanged(ConnectionState::Connected)
    })
    .await;

    assert!(session.dispatcher().select_clip(ClipId(1)));
    assert_eq!(
        next_frame(&mut received).await,
        json!({"action": "trigger", "parameter": "/composition/clips/by-id/1/select"})
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(received.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn shutdown_resets_the_mirror_and_stops_reconnecting() -> Result<()> {
    let (addr, _state, _received) = spawn_mixer(vec![SNAPSHOT.to_string()], false).await?;
    let session = Session::new(session_config(addr, Duration::from_millis(50)));
    let mut events = Box::pin(session.events());
    session.start();

    timeout(WAIT, async {
        while let Some(event) = events.next().await {
            if event == SessionEvent::CompositionReplaced {
                break;
            }
        }
    })
    .await?;
    assert!(session.is_connected());

    session.shutdown();
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(*session.composition(), Composition::default());
    assert!(!session.dispatcher().add_column());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    Ok(())
}

struct FixedProduct(ProductInfo);

#[async_trait]
impl ProductInfoSource for FixedProduct {
    async fn fetch_product(&self) -> Result<ProductInfo> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn product_info_comes_from_the_configured_source() -> Result<()> {
    let (addr, _state, _received) = spawn_mixer(Vec::new(), false).await?;
    let fixed = ProductInfo {
        name: "Avenue".into(),
        major: 7,
        minor: 1,
        micro: 0,
        revision: 9,
    };
    let session = Session::with_product_source(
        session_config(addr, Duration::from_millis(50)),
        Client::new(),
        Arc::new(FixedProduct(fixed.clone())),
    );
    let mut events = session.subscribe_events();
    session.start();

    let event = next_matching(&mut events, |event| matches!(event, SessionEvent::ProductUpdated(_))).await;
    assert_eq!(event, SessionEvent::ProductUpdated(fixed.clone()));
    assert_eq!(session.product(), fixed);

    assert!(MissingProductInfo.fetch_product().await.is_err());
    Ok(())
}

#[tokio::test]
async fn thumbnail_upload_sends_one_file_field() -> Result<()> {
    let (addr, state, _received) = spawn_mixer(Vec::new(), false).await?;
    let session = Session::new(session_config(addr, Duration::from_millis(50)));

    session
        .dispatcher()
        .upload_thumbnail(ClipId(7), "poster.png", vec![0x89, b'P', b'N', b'G'], Some("image/png"))
        .await?;

    let uploads = state.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let (clip_id, fields) = &uploads[0];
    assert_eq!(*clip_id, 7);
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name, "file");
    assert_eq!(fields[0].file_name.as_deref(), Some("poster.png"));
    assert_eq!(fields[0].content_type.as_deref(), Some("image/png"));
    assert_eq!(fields[0].bytes, vec![0x89, b'P', b'N', b'G']);
    Ok(())
}

#[tokio::test]
async fn rejected_thumbnail_upload_is_reported_to_the_caller() -> Result<()> {
    let (addr, _state, _received) = spawn_mixer(Vec::new(), false).await?;
    let session = Session::new(session_config(addr, Duration::from_millis(50)));

    let err = session
        .dispatcher()
        .upload_thumbnail(ClipId(REJECTED_CLIP), "notes.txt", b"hello".to_vec(), None)
        .await
        .expect_err("upload should be rejected");
    match err {
        UploadError::Rejected {
            clip_id,
            status,
            reason,
        } => {
            assert_eq!(clip_id, REJECTED_CLIP);
            assert_eq!(status, 415);
            assert_eq!(reason, "unsupported image format");
        }
        other => panic!("unexpected upload error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn operator_intents_send_the_expected_frames() -> Result<()> {
    let (addr, _state, mut received) = spawn_mixer(vec![OPERATOR_SNAPSHOT.to_string()], false).await?;
    let session = Session::new(session_config(addr, Duration::from_millis(50)));
    let mut events = session.subscribe_events();
    session.start();
    next_matching(&mut events, |event| *event == SessionEvent::CompositionReplaced).await;

    let dispatcher = session.dispatcher();
    let composition = session.composition();
    let layer = &composition.layers[0];
    let empty_layer = &composition.layers[1];

    assert!(!dispatcher.send_text_to_selected_clip(&composition, "  \t "));
    assert!(dispatcher.send_text_to_selected_clip(&composition, "  Hello  "));
    assert!(dispatcher.clear_selected_clip_text(&composition));
    assert!(dispatcher.subscribe_parameter(ParameterId(114)));
    assert!(dispatcher.unsubscribe_parameter(ParameterId(114)));
    assert!(dispatcher.resync_tempo(&composition));
    assert!(dispatcher.set_layer_bypass(layer, true));
    assert!(dispatcher.set_layer_solo(layer, false));
    assert!(!dispatcher.set_layer_solo(empty_layer, true));
    assert!(dispatcher.set_crossfader_group(layer, CrossfaderSide::B));
    assert!(dispatcher.play_layer(layer));
    assert!(dispatcher.pause_layer(layer));
    assert!(!dispatcher.play_layer(empty_layer));
    assert!(dispatcher.drop_onto_clip(ClipId(10), "/open", "file:///clips/intro.mov"));
    assert!(dispatcher.revert_thumbnail(ClipId(10)));
    assert!(dispatcher.duplicate_layer(LayerId(1)));
    assert_eq!(dispatcher.stop_all(&composition), 2);

    let expected = [
        json!({"action": "update", "parameter": "/parameter/by-id/114", "value": "  Hello  "}),
        json!({"action": "update", "parameter": "/parameter/by-id/114", "value": ""}),
        json!({"action": "subscribe", "parameter": "/parameter/by-id/114"}),
        json!({"action": "unsubscribe", "parameter": "/parameter/by-id/114"}),
        json!({"action": "update", "parameter": "/parameter/by-id/80", "value": true}),
        json!({"action": "update", "parameter": "/parameter/by-id/40", "value": true}),
        json!({"action": "update", "parameter": "/parameter/by-id/41", "value": false}),
        json!({"action": "update", "parameter": "/parameter/by-id/42", "value": 2}),
        json!({"action": "update", "parameter": "/parameter/by-id/113", "value": 2}),
        json!({"action": "update", "parameter": "/parameter/by-id/113", "value": 0}),
        json!({"action": "post", "path": "/composition/clips/by-id/10/open", "body": "file:///clips/intro.mov"}),
        json!({"action": "remove", "path": "/composition/clips/by-id/10/thumbnail"}),
        json!({"action": "post", "path": "/composition/layers/by-id/1/duplicate"}),
        json!({"action": "trigger", "parameter": "/composition/layers/by-id/1/clear"}),
        json!({"action": "trigger", "parameter": "/composition/layers/by-id/3/clear"}),
    ];
    for frame in expected {
        assert_eq!(next_frame(&mut received).await, frame);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(received.try_recv().is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_while_a_snapshot_is_routed_leaves_the_mirror_empty() -> Result<()> {
    let snapshot = large_snapshot(1500);
    let (addr, _state, _received) = spawn_mixer(vec![snapshot; 4], false).await?;

    for delay_ms in [0, 20, 50, 100, 200, 400] {
        let session = Session::new(session_config(addr, Duration::from_millis(50)));
        let mut states = session.watch_connection();
        session.start();
        timeout(WAIT, states.wait_for(|state| *state == ConnectionState::Connected)).await??;

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        session.shutdown();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(session.connection_state(), ConnectionState::Disconnected, "after {delay_ms}ms");
        assert!(session.composition().layers.is_empty(), "after {delay_ms}ms");
    }
    Ok(())
}

struct SlowProduct(Duration);

#[async_trait]
impl ProductInfoSource for SlowProduct {
    async fn fetch_product(&self) -> Result<ProductInfo> {
        tokio::time::sleep(self.0).await;
        Ok(ProductInfo {
            name: "Arena".into(),
            ..ProductInfo::default()
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn product_info_arriving_after_shutdown_is_discarded() -> Result<()> {
    let (addr, _state, _received) = spawn_mixer(Vec::new(), false).await?;
    let session = Session::with_product_source(
        session_config(addr, Duration::from_millis(50)),
        Client::new(),
        Arc::new(SlowProduct(Duration::from_millis(200))),
    );
    let mut events = session.subscribe_events();
    session.start();
    next_matching(&mut events, |event| {
        *event == SessionEvent::ConnectionStateChanged(ConnectionState::Connected)
    })
    .await;

    session.shutdown();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(session.product(), ProductInfo::default());
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, SessionEvent::ProductUpdated(_)), "unexpected {event:?}");
    }
    Ok(())
}
