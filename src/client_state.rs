/// file: src/client_state.rs
/// description: Connection state machine data shared between the transport handle and its task
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }

    /// States in which `connect()` does nothing.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Connecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Automatic retries made since the last successful open or explicit connect.
    pub attempt: u32,
    pub endpoint: Option<String>,
    /// Fresh per physical socket.
    pub connection_id: Option<String>,
    /// Bumped by every explicit connect/disconnect; a task only mutates
    /// state while its own generation is current.
    pub generation: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub dispatch_failures: u64,
    pub reconnects: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            attempt: 0,
            endpoint: None,
            connection_id: None,
            generation: 0,
            frames_received: 0,
            frames_dropped: 0,
            dispatch_failures: 0,
            reconnects: 0,
            last_frame_at: None,
            opened_at: None,
        }
    }
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit connect: new generation, backoff history cleared.
    pub fn begin(&mut self, endpoint: String) -> u64 {
        self.generation += 1;
        self.attempt = 0;
        self.endpoint = Some(endpoint);
        self.connection_id = None;
        self.state = ConnectionState::Connecting;
        self.generation
    }

    pub fn mark_open(&mut self) -> String {
        let connection_id = uuid::Uuid::new_v4().to_string();
        self.state = ConnectionState::Open;
        self.attempt = 0;
        self.connection_id = Some(connection_id.clone());
        self.opened_at = Some(Utc::now());
        connection_id
    }

    pub fn mark_reconnecting(&mut self) -> u32 {
        self.attempt += 1;
        self.reconnects += 1;
        self.state = ConnectionState::Reconnecting;
        self.connection_id = None;
        self.opened_at = None;
        self.attempt
    }

    pub fn mark_failed(&mut self) {
        self.state = ConnectionState::Failed;
        self.connection_id = None;
        self.opened_at = None;
    }

    /// Explicit disconnect: invalidates any running task's generation.
    pub fn close(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Closed;
        self.connection_id = None;
        self.opened_at = None;
    }

    pub fn record_frame(&mut self) {
        self.frames_received += 1;
        self.last_frame_at = Some(Utc::now());
    }

    pub fn record_drop(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn record_dispatch_failures(&mut self, failed: usize) {
        self.dispatch_failures += failed as u64;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            attempt: self.attempt,
            endpoint: self.endpoint.clone(),
            connection_id: self.connection_id.clone(),
            frames_received: self.frames_received,
            frames_dropped: self.frames_dropped,
            dispatch_failures: self.dispatch_failures,
            reconnects: self.reconnects,
            last_frame_at: self.last_frame_at,
            uptime_seconds: self
                .opened_at
                .map(|opened| (Utc::now() - opened).num_seconds())
                .unwrap_or(0),
        }
    }
}

/// Point-in-time view of a connection, suitable for logging or a health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: ConnectionState,
    pub attempt: u32,
    pub endpoint: Option<String>,
    pub connection_id: Option<String>,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub dispatch_failures: u64,
    pub reconnects: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub uptime_seconds: i64,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.state == ConnectionState::Open { "healthy" } else { "unhealthy" },
            "connection": self,
            "timestamp": Utc::now()
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedConnectionStatus(Arc<Mutex<ConnectionStatus>>);

impl SharedConnectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ConnectionStatus> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` only if `generation` is still the current one.
    pub fn with_generation<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut ConnectionStatus) -> T,
    ) -> Option<T> {
        let mut status = self.lock();
        if status.generation != generation {
            return None;
        }
        Some(f(&mut status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_resets_attempt_and_bumps_generation() {
        let mut status = ConnectionStatus::new();
        status.attempt = 3;
        let generation = status.begin("ws://localhost/ws".into());
        assert_eq!(generation, 1);
        assert_eq!(status.attempt, 0);
        assert_eq!(status.state, ConnectionState::Connecting);
    }

    #[test]
    fn test_open_clears_backoff_history() {
        let mut status = ConnectionStatus::new();
        status.begin("ws://localhost/ws".into());
        assert_eq!(status.mark_reconnecting(), 1);
        assert_eq!(status.mark_reconnecting(), 2);
        let id = status.mark_open();
        assert_eq!(status.attempt, 0);
        assert_eq!(status.connection_id.as_deref(), Some(id.as_str()));
        assert_eq!(status.mark_reconnecting(), 1);
        assert_eq!(status.reconnects, 3);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let shared = SharedConnectionStatus::new();
        let generation = shared.lock().begin("ws://localhost/ws".into());
        shared.lock().close();

        let applied = shared.with_generation(generation, |s| s.mark_open());
        assert!(applied.is_none());
        assert_eq!(shared.lock().state, ConnectionState::Closed);
    }

    #[test]
    fn test_active_states() {
        assert!(ConnectionState::Open.is_active());
        assert!(ConnectionState::Connecting.is_active());
        assert!(!ConnectionState::Reconnecting.is_active());
        assert!(!ConnectionState::Failed.is_active());
        assert!(!ConnectionState::Closed.is_active());
        assert!(!ConnectionState::Idle.is_active());
    }

    #[test]
    fn test_snapshot_reports_health() {
        let mut status = ConnectionStatus::new();
        status.begin("ws://localhost/ws".into());
        status.mark_open();
        status.record_frame();
        let json = status.snapshot().to_json();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["connection"]["state"], "open");
        assert_eq!(json["connection"]["frames_received"], 1);
    }
}
