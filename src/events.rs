/// file: src/events.rs
/// description: Typed dashboard events and the lifecycle kinds emitted by the transport
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use tokio::sync::mpsc;

/// Generic router key: listeners registered here receive every inbound event.
pub const WILDCARD: &str = "message";

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Recognized dashboard kind, `EventKind::Other` for anything else.
    pub fn event_kind(&self) -> EventKind {
        EventKind::from(self.kind.as_str())
    }

    pub fn lifecycle(&self) -> Option<Lifecycle> {
        Lifecycle::from_kind(&self.kind)
    }
}

/// Kinds the dashboard reacts to. Any string is a legal kind on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrchestratorStarted,
    OrchestratorStopped,
    PipelineStarted,
    PipelineStopped,
    ScheduleCreated,
    ScheduleUpdated,
    ScheduleDeleted,
    ScheduleReloaded,
    ManualChannelAction,
    StatusUpdate,
    HighlightGenerated,
    ChannelStatusChanged,
    Other(String),
}

/// REST resource families whose cached results an event makes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Status,
    Schedules,
    Channels,
    Pipelines,
    Highlights,
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::OrchestratorStarted => "orchestrator_started",
            EventKind::OrchestratorStopped => "orchestrator_stopped",
            EventKind::PipelineStarted => "pipeline_started",
            EventKind::PipelineStopped => "pipeline_stopped",
            EventKind::ScheduleCreated => "schedule_created",
            EventKind::ScheduleUpdated => "schedule_updated",
            EventKind::ScheduleDeleted => "schedule_deleted",
            EventKind::ScheduleReloaded => "scheduleReloaded",
            EventKind::ManualChannelAction => "manual_channel_action",
            EventKind::StatusUpdate => "status_update",
            EventKind::HighlightGenerated => "highlight_generated",
            EventKind::ChannelStatusChanged => "channel_status_changed",
            EventKind::Other(kind) => kind,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, EventKind::Other(_))
    }

    /// Cached REST results a consumer should refetch after this event.
    pub fn invalidates(&self) -> &'static [Resource] {
        match self {
            EventKind::OrchestratorStarted | EventKind::OrchestratorStopped => {
                &[Resource::Status, Resource::Channels, Resource::Pipelines]
            }
            EventKind::PipelineStarted | EventKind::PipelineStopped => {
                &[Resource::Pipelines, Resource::Schedules, Resource::Status]
            }
            EventKind::ScheduleCreated
            | EventKind::ScheduleUpdated
            | EventKind::ScheduleDeleted
            | EventKind::ScheduleReloaded => &[Resource::Schedules],
            EventKind::ManualChannelAction | EventKind::ChannelStatusChanged => {
                &[Resource::Channels, Resource::Status]
            }
            EventKind::StatusUpdate => &[Resource::Status],
            EventKind::HighlightGenerated => &[Resource::Highlights],
            EventKind::Other(_) => &[],
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "orchestrator_started" => EventKind::OrchestratorStarted,
            "orchestrator_stopped" => EventKind::OrchestratorStopped,
            "pipeline_started" => EventKind::PipelineStarted,
            "pipeline_stopped" => EventKind::PipelineStopped,
            "schedule_created" => EventKind::ScheduleCreated,
            "schedule_updated" => EventKind::ScheduleUpdated,
            "schedule_deleted" => EventKind::ScheduleDeleted,
            "scheduleReloaded" => EventKind::ScheduleReloaded,
            "manual_channel_action" => EventKind::ManualChannelAction,
            "status_update" => EventKind::StatusUpdate,
            "highlight_generated" => EventKind::HighlightGenerated,
            "channel_status_changed" => EventKind::ChannelStatusChanged,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection lifecycle notifications. These travel through the router under
/// their own kind and are never delivered to wildcard listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Connected,
    Disconnected,
    Reconnecting,
    Error,
    MaxReconnectAttempts,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 5] = [
        Lifecycle::Connected,
        Lifecycle::Disconnected,
        Lifecycle::Reconnecting,
        Lifecycle::Error,
        Lifecycle::MaxReconnectAttempts,
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Lifecycle::Connected => "connected",
            Lifecycle::Disconnected => "disconnected",
            Lifecycle::Reconnecting => "reconnecting",
            Lifecycle::Error => "error",
            Lifecycle::MaxReconnectAttempts => "max_reconnect_attempts",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        Lifecycle::ALL.into_iter().find(|l| l.kind() == kind)
    }

    pub(crate) fn event(self, payload: Value) -> Event {
        Event::new(self.kind(), payload)
    }

    pub(crate) fn connected(endpoint: &str, connection_id: &str) -> Event {
        Lifecycle::Connected.event(json!({
            "endpoint": endpoint,
            "connection_id": connection_id,
        }))
    }

    pub(crate) fn disconnected(reason: Option<&str>, explicit: bool) -> Event {
        Lifecycle::Disconnected.event(json!({
            "reason": reason,
            "explicit": explicit,
        }))
    }

    pub(crate) fn reconnecting(attempt: u32, delay_ms: u64) -> Event {
        Lifecycle::Reconnecting.event(json!({
            "attempt": attempt,
            "delay_ms": delay_ms,
        }))
    }

    pub(crate) fn error(message: impl fmt::Display) -> Event {
        Lifecycle::Error.event(json!({ "message": message.to_string() }))
    }

    pub(crate) fn max_reconnect_attempts(attempts: u32) -> Event {
        Lifecycle::MaxReconnectAttempts.event(json!({ "attempts": attempts }))
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

// A full channel surfaces as a failure of the forwarding listener.
const EVENT_CHANNEL_CAPACITY: usize = 10_000;

pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_kinds_parse_both_ways() {
        for kind in [
            "orchestrator_started",
            "pipeline_stopped",
            "scheduleReloaded",
            "channel_status_changed",
        ] {
            let parsed = EventKind::from(kind);
            assert!(parsed.is_recognized());
            assert_eq!(parsed.as_str(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_other() {
        let kind = EventKind::from("brand_new_thing");
        assert_eq!(kind, EventKind::Other("brand_new_thing".to_string()));
        assert!(kind.invalidates().is_empty());
    }

    #[test]
    fn test_schedule_events_invalidate_schedules() {
        assert_eq!(
            EventKind::ScheduleReloaded.invalidates(),
            &[Resource::Schedules]
        );
        assert!(
            EventKind::PipelineStarted
                .invalidates()
                .contains(&Resource::Pipelines)
        );
    }

    #[test]
    fn test_lifecycle_kinds_round_trip() {
        for lifecycle in Lifecycle::ALL {
            assert_eq!(Lifecycle::from_kind(lifecycle.kind()), Some(lifecycle));
        }
        assert_eq!(Lifecycle::from_kind(WILDCARD), None);
        assert_eq!(Lifecycle::from_kind("pipeline_started"), None);
    }

    #[test]
    fn test_event_serializes_received_at_camel_case() {
        let event = Event::new("status_update", json!({"ok": true}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "status_update");
        assert!(value.get("receivedAt").is_some());
    }
}
