// file: src/transport.rs
// description: Event transport owning one live WebSocket with bounded exponential reconnect

use crate::{
    backoff::ReconnectPolicy,
    client_state::{ConnectionState, SharedConnectionStatus, StatusSnapshot},
    config::TransportConfig,
    connector::{Connector, Frame, FrameSink, Socket, TungsteniteConnector},
    decode::{DecodeError, decode_frame, preview},
    error::EventClientError,
    events::Lifecycle,
    monitoring,
    router::EventRouter,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle, time::timeout};
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Upper bound for flushing a close frame on explicit disconnect.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

enum Command {
    Send(String),
    Close,
}

struct TaskControl {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

/// Owner of the single connection to the backend event stream.
///
/// One instance per process, constructed by the application root and handed
/// to whatever needs it. `connect`, `disconnect` and `send` never fail; every
/// failure surfaces as a lifecycle event on the router.
pub struct EventTransport {
    config: TransportConfig,
    router: Arc<EventRouter>,
    connector: Arc<dyn Connector>,
    status: SharedConnectionStatus,
    control: Mutex<Option<TaskControl>>,
}

impl EventTransport {
    /// Transport over tokio-tungstenite.
    pub fn new(
        config: TransportConfig,
        router: Arc<EventRouter>,
    ) -> Result<Self, EventClientError> {
        let connector = TungsteniteConnector::new()?;
        Ok(Self::with_connector(config, router, Arc::new(connector)))
    }

    pub fn with_connector(
        config: TransportConfig,
        router: Arc<EventRouter>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            router,
            connector,
            status: SharedConnectionStatus::new(),
            control: Mutex::new(None),
        }
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn state(&self) -> ConnectionState {
        self.status.lock().state
    }

    pub fn attempt(&self) -> u32 {
        self.status.lock().attempt
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn endpoint(&self) -> Option<String> {
        self.status.lock().endpoint.clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.lock().snapshot()
    }

    fn control(&self) -> MutexGuard<'_, Option<TaskControl>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the connection. Does nothing while `Open` or `Connecting`.
    ///
    /// `explicit_url` overrides the configured endpoint. The attempt counter
    /// is reset, so a `Failed` or `Reconnecting` transport starts over with
    /// a fresh backoff budget. Must be called within a tokio runtime;
    /// otherwise the transport moves to `Failed` and emits `error`.
    pub fn connect(&self, explicit_url: Option<&str>) {
        let prepared = {
            let mut status = self.status.lock();
            if status.state.is_active() {
                debug!(state = %status.state, "connect() ignored: connection already active");
                return;
            }

            match self.prepare(explicit_url) {
                Ok((endpoint, runtime)) => {
                    let generation = status.begin(endpoint.to_string());
                    Ok((endpoint, runtime, generation))
                }
                Err(e) => {
                    status.generation += 1;
                    status.mark_failed();
                    Err(e)
                }
            }
        };

        // Any previous task belongs to an older generation now.
        self.stop_task(false);

        let (endpoint, runtime, generation) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Unable to open event connection: {}", e);
                self.router.notify(&Lifecycle::error(&e));
                return;
            }
        };

        info!(%endpoint, "Connecting to event stream");

        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = ConnectionTask {
            generation,
            endpoint,
            policy: self.config.reconnect.clone(),
            connect_timeout: self.config.connect_timeout,
            connector: self.connector.clone(),
            router: self.router.clone(),
            status: self.status.clone(),
            commands: command_rx,
        };
        let handle = runtime.spawn(task.run());

        *self.control() = Some(TaskControl { commands, handle });
    }

    fn prepare(&self, explicit_url: Option<&str>) -> Result<(Url, Handle), EventClientError> {
        let endpoint = self.config.resolve_endpoint(explicit_url)?;
        let runtime = Handle::try_current().map_err(|_| EventClientError::NoRuntime)?;
        Ok((endpoint, runtime))
    }

    /// Closes the connection for good: cancels any pending reconnect, closes
    /// the socket, moves to `Closed` and (unless configured to retain them)
    /// drops every subscription. Safe to call in any state, any number of
    /// times.
    pub fn disconnect(&self) {
        let previous = {
            let mut status = self.status.lock();
            let previous = status.state;
            status.close();
            previous
        };

        self.stop_task(previous == ConnectionState::Open);
        monitoring::set_connected(false);

        if !matches!(previous, ConnectionState::Closed | ConnectionState::Idle) {
            info!(from = %previous, "Event connection closed by client");
            self.router
                .notify(&Lifecycle::disconnected(Some("client disconnect"), true));
        }

        if !self.config.retain_subscriptions {
            self.router.clear();
        }
    }

    /// Sends a JSON text frame. Fire-and-forget: when the connection is not
    /// open the message is dropped with a warning. Returns whether it was
    /// handed to the socket task.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        if !self.is_connected() {
            warn!(state = %self.state(), "Dropping outbound message: connection is not open");
            return false;
        }

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping outbound message that failed to serialize: {}", e);
                return false;
            }
        };

        match self.control().as_ref() {
            Some(control) => control.commands.send(Command::Send(text)).is_ok(),
            None => false,
        }
    }

    fn stop_task(&self, graceful: bool) {
        let Some(control) = self.control().take() else {
            return;
        };

        if graceful && control.commands.send(Command::Close).is_ok() {
            // The task flushes a close frame and exits on its own.
            return;
        }
        control.handle.abort();
    }
}

impl Drop for EventTransport {
    fn drop(&mut self) {
        self.status.lock().close();
        if let Some(control) = self.control().take() {
            control.handle.abort();
        }
    }
}

enum Outcome {
    /// Stopped by `disconnect()` or superseded by a newer `connect()`.
    Shutdown,
    /// The socket could not be opened.
    ConnectFailed(EventClientError),
    /// An open socket went away.
    Dropped {
        reason: Option<String>,
        error: Option<EventClientError>,
    },
}

enum NextStep {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
}

struct ConnectionTask {
    generation: u64,
    endpoint: Url,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    connector: Arc<dyn Connector>,
    router: Arc<EventRouter>,
    status: SharedConnectionStatus,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            let outcome = self.connect_and_run().await;

            let (was_open, reason, failure) = match outcome {
                Outcome::Shutdown => return,
                Outcome::ConnectFailed(e) => (false, None, Some(e)),
                Outcome::Dropped { reason, error } => (true, reason, error),
            };

            if was_open {
                monitoring::set_connected(false);
            }

            let policy = &self.policy;
            let next = self.status.with_generation(self.generation, |status| {
                if policy.allows_retry(status.attempt) {
                    let attempt = status.mark_reconnecting();
                    NextStep::Retry {
                        attempt,
                        delay: policy.delay_for(attempt),
                    }
                } else {
                    status.mark_failed();
                    NextStep::GiveUp {
                        attempts: status.attempt,
                    }
                }
            });
            let Some(next) = next else {
                return;
            };

            if let Some(e) = &failure {
                warn!(endpoint = %self.endpoint, "Event connection error: {}", e);
                self.router.notify(&Lifecycle::error(e));
            }
            // Listeners may disconnect or reconnect from inside a notification.
            if !self.is_current() {
                return;
            }
            if was_open {
                warn!(
                    endpoint = %self.endpoint,
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "Event connection dropped"
                );
                self.router
                    .notify(&Lifecycle::disconnected(reason.as_deref(), false));
            }
            if !self.is_current() {
                return;
            }

            match next {
                NextStep::Retry { attempt, delay } => {
                    monitoring::record_reconnect();
                    warn!(
                        "Reconnecting in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        attempt,
                        self.policy.max_attempts
                    );
                    self.router.notify(&Lifecycle::reconnecting(
                        attempt,
                        delay.as_millis() as u64,
                    ));

                    if !self.is_current() || !self.wait_backoff(delay).await {
                        return;
                    }

                    let resumed = self.status.with_generation(self.generation, |status| {
                        status.state = ConnectionState::Connecting;
                    });
                    if resumed.is_none() {
                        return;
                    }
                }
                NextStep::GiveUp { attempts } => {
                    error!(
                        "Maximum reconnection attempts ({}) reached, giving up",
                        attempts
                    );
                    self.router
                        .notify(&Lifecycle::max_reconnect_attempts(attempts));
                    return;
                }
            }
        }
    }

    fn is_current(&self) -> bool {
        self.status.lock().generation == self.generation
    }

    async fn connect_and_run(&mut self) -> Outcome {
        let socket = match self.open_socket().await {
            Ok(Some(socket)) => socket,
            Ok(None) => return Outcome::Shutdown,
            Err(e) => return Outcome::ConnectFailed(e),
        };

        let opened = self
            .status
            .with_generation(self.generation, |status| status.mark_open());
        let Some(connection_id) = opened else {
            return Outcome::Shutdown;
        };

        monitoring::set_connected(true);
        info!(
            endpoint = %self.endpoint,
            connection_id = %connection_id,
            "Event connection established"
        );
        self.router.notify(&Lifecycle::connected(
            self.endpoint.as_str(),
            &connection_id,
        ));

        self.handle_socket(socket).await
    }

    /// `Ok(None)` when shut down while the handshake was pending.
    async fn open_socket(&mut self) -> Result<Option<Socket>, EventClientError> {
        debug!(endpoint = %self.endpoint, "Opening event socket");

        let connector = self.connector.clone();
        let endpoint = self.endpoint.clone();
        let connect_timeout = self.connect_timeout;
        let connecting = timeout(connect_timeout, async move {
            connector.connect(&endpoint).await
        });
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                result = &mut connecting => {
                    return match result {
                        Ok(Ok(socket)) => Ok(Some(socket)),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(EventClientError::Timeout {
                            secs: connect_timeout.as_secs(),
                        }),
                    };
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(_)) => {
                        warn!("Dropping outbound message: connection is not open");
                    }
                    Some(Command::Close) | None => return Ok(None),
                },
            }
        }
    }

    async fn handle_socket(&mut self, socket: Socket) -> Outcome {
        let Socket {
            mut inbound,
            mut outbound,
        } = socket;

        loop {
            tokio::select! {
                frame = inbound.next() => match frame {
                    Some(Ok(Frame::Text(text))) => {
                        if !self.handle_text(&text) {
                            close_socket(&mut outbound).await;
                            return Outcome::Shutdown;
                        }
                    }
                    Some(Ok(Frame::Binary(data))) => {
                        if !self.record_frame() {
                            close_socket(&mut outbound).await;
                            return Outcome::Shutdown;
                        }
                        warn!("Dropping frame: {}", DecodeError::Binary { len: data.len() });
                        self.record_drop("binary");
                    }
                    Some(Ok(Frame::Control)) => {
                        trace!("Control frame received");
                    }
                    Some(Ok(Frame::Close(reason))) => {
                        return Outcome::Dropped { reason, error: None };
                    }
                    Some(Err(e)) => {
                        return Outcome::Dropped { reason: None, error: Some(e) };
                    }
                    None => {
                        return Outcome::Dropped {
                            reason: Some("stream ended".to_string()),
                            error: None,
                        };
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        trace!("Sending frame: {}", preview(&text));
                        if let Err(e) = outbound.send(Frame::Text(text)).await {
                            return Outcome::Dropped { reason: None, error: Some(e) };
                        }
                    }
                    Some(Command::Close) | None => {
                        close_socket(&mut outbound).await;
                        return Outcome::Shutdown;
                    }
                },
            }
        }
    }

    /// Sleeps out a backoff delay. Returns false when told to stop first.
    async fn wait_backoff(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(_)) => {
                        warn!("Dropping outbound message: connection is not open");
                    }
                    Some(Command::Close) | None => {
                        debug!("Pending reconnect cancelled");
                        return false;
                    }
                },
            }
        }
    }

    /// Decodes and dispatches one text frame. Returns false once this task
    /// has been superseded.
    fn handle_text(&self, text: &str) -> bool {
        let received_at = Utc::now();
        if !self.record_frame() {
            return false;
        }
        trace!("Received frame: {}", preview(text));

        match decode_frame(text, received_at) {
            Ok(event) => {
                let report = self.router.dispatch(&event);
                if report.failed > 0 {
                    self.status.with_generation(self.generation, |status| {
                        status.record_dispatch_failures(report.failed)
                    });
                }
            }
            Err(e) => {
                warn!(frame = %preview(text), "Dropping undecodable frame: {}", e);
                self.record_drop("decode");
            }
        }
        true
    }

    /// Counts an inbound frame. False once this task has been superseded.
    fn record_frame(&self) -> bool {
        let current = self
            .status
            .with_generation(self.generation, |status| status.record_frame());
        if current.is_some() {
            monitoring::record_frame_received();
        }
        current.is_some()
    }

    fn record_drop(&self, reason: &'static str) {
        monitoring::record_frame_dropped(reason);
        self.status
            .with_generation(self.generation, |status| status.record_drop());
    }
}

/// Sends a close frame and flushes the sink, each bounded by `CLOSE_GRACE`.
async fn close_socket(outbound: &mut FrameSink) {
    let closing = outbound.send(Frame::Close(Some("client disconnect".to_string())));
    if let Err(e) = timeout(CLOSE_GRACE, closing).await.unwrap_or(Ok(())) {
        debug!("Close frame not delivered: {}", e);
    }
    let _ = timeout(CLOSE_GRACE, outbound.close()).await;
}
