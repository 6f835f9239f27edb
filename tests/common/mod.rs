#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{StreamExt, sink, stream};
use highlights_events::{
    Event, EventClientError, EventRouter, EventTransport, Lifecycle, Listener, WILDCARD,
    config::TransportConfig,
    connector::{Connector, Frame, Socket},
    events::{EventReceiver, create_event_channel},
    listener,
    router::forward_to,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use url::Url;

pub const ENDPOINT: &str = "ws://dashboard.test/ws";

/// What the next connect call does.
pub enum Script {
    Refuse,
    Accept(Socket),
    Hang,
}

/// The backend's end of an in-memory socket.
pub struct ServerSide {
    pub to_client: mpsc::UnboundedSender<Result<Frame, EventClientError>>,
    pub from_client: mpsc::UnboundedReceiver<Frame>,
}

impl ServerSide {
    pub fn send_text(&self, text: &str) {
        self.to_client
            .send(Ok(Frame::Text(text.to_string())))
            .expect("client side gone");
    }

    pub fn send_binary(&self, data: &[u8]) {
        self.to_client
            .send(Ok(Frame::Binary(data.to_vec())))
            .expect("client side gone");
    }

    pub fn close(&self, reason: &str) {
        self.to_client
            .send(Ok(Frame::Close(Some(reason.to_string()))))
            .expect("client side gone");
    }
}

pub fn socket_pair() -> (Socket, ServerSide) {
    let (to_client, client_rx) = mpsc::unbounded_channel();
    let (client_tx, from_client) = mpsc::unbounded_channel::<Frame>();

    let inbound = stream::unfold(client_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();

    let outbound = sink::unfold(client_tx, |tx, frame: Frame| async move {
        tx.send(frame)
            .map_err(|_| EventClientError::ConnectionClosed)?;
        Ok::<_, EventClientError>(tx)
    });

    (
        Socket {
            inbound,
            outbound: Box::pin(outbound),
        },
        ServerSide {
            to_client,
            from_client,
        },
    )
}

/// Connector that plays back scripted outcomes and records every attempt.
/// Once the script runs out every attempt is refused.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<Instant>>,
    endpoints: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }

    /// Milliseconds between consecutive connect attempts.
    pub fn attempt_gaps_ms(&self) -> Vec<u64> {
        let attempts = self.attempts.lock().unwrap();
        attempts
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis() as u64)
            .collect()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, endpoint: &Url) -> Result<Socket, EventClientError> {
        self.attempts.lock().unwrap().push(Instant::now());
        self.endpoints.lock().unwrap().push(endpoint.to_string());

        let script = self.scripts.lock().unwrap().pop_front();
        match script.unwrap_or(Script::Refuse) {
            Script::Refuse => Err(EventClientError::ConnectionClosed),
            Script::Accept(socket) => Ok(socket),
            Script::Hang => std::future::pending().await,
        }
    }
}

pub fn config() -> TransportConfig {
    TransportConfig::with_endpoint(Url::parse(ENDPOINT).unwrap())
}

pub fn harness(
    config: TransportConfig,
    connector: Arc<ScriptedConnector>,
) -> (Arc<EventRouter>, EventTransport) {
    let router = Arc::new(EventRouter::new());
    let transport = EventTransport::with_connector(config, router.clone(), connector);
    (router, transport)
}

/// Like `harness`, for listeners that call back into the transport.
pub fn shared_harness(
    config: TransportConfig,
    connector: Arc<ScriptedConnector>,
) -> (Arc<EventRouter>, Arc<EventTransport>) {
    let (router, transport) = harness(config, connector);
    (router, Arc::new(transport))
}

/// Listener that runs `f` against the transport while it is still alive.
pub fn with_transport<F>(transport: &Arc<EventTransport>, f: F) -> Listener
where
    F: Fn(&EventTransport, &Event) + Send + Sync + 'static,
{
    let transport = Arc::downgrade(transport);
    listener(move |event| {
        if let Some(transport) = transport.upgrade() {
            f(&transport, event);
        }
        Ok(())
    })
}

/// Forwards every inbound event and every lifecycle notification.
pub fn record_all(router: &EventRouter) -> EventReceiver {
    let (tx, rx) = create_event_channel();
    let forward = forward_to(tx);
    router.subscribe(WILDCARD, forward.clone());
    for lifecycle in Lifecycle::ALL {
        router.subscribe(lifecycle.kind(), forward.clone());
    }
    rx
}

/// Forwards events of a single kind.
pub fn record_kind(router: &EventRouter, kind: &str) -> EventReceiver {
    let (tx, rx) = create_event_channel();
    router.subscribe(kind, forward_to(tx));
    rx
}

pub async fn next_event(rx: &mut EventReceiver) -> Event {
    timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

pub async fn next_of(rx: &mut EventReceiver, kind: &str) -> Event {
    loop {
        let event = next_event(rx).await;
        if event.kind == kind {
            return event;
        }
    }
}

/// Every event up to and including the first one of `kind`.
pub async fn collect_until(rx: &mut EventReceiver, kind: &str) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = event.kind == kind;
        events.push(event);
        if done {
            return events;
        }
    }
}

pub fn drain(rx: &mut EventReceiver) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[Event]) -> Vec<&str> {
    events.iter().map(|e| e.kind.as_str()).collect()
}
