#![doc = include_str!("../docs/rustdoc.md")]

/// Bounded exponential reconnect policy.
pub mod backoff;
/// Command-line argument definitions.
pub mod cli;
/// Connection state and counters shared with the socket task.
pub mod client_state;
/// Runtime configuration model.
pub mod config;
/// Socket construction and the WebSocket implementation.
pub mod connector;
/// Inbound frame decoding.
pub mod decode;
/// Endpoint derivation from the dashboard origin.
pub mod endpoint;
/// Error types used across the crate.
pub mod error;
/// Dashboard event and lifecycle types.
pub mod events;
/// Terminal output formatters.
pub mod formatter;
/// Metrics recording and the Prometheus exporter.
pub mod monitoring;
/// Subscription registry and fan-out.
pub mod router;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// The event transport and its connection task.
pub mod transport;
/// Terminal printer consuming routed events.
pub mod ui;

pub use client_state::ConnectionState;
/// Primary crate error type.
pub use error::EventClientError;
pub use events::{Event, EventKind, Lifecycle, WILDCARD};
pub use router::{EventRouter, Listener, ListenerError, Subscription, listener};
pub use transport::EventTransport;
