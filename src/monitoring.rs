use crate::error::EventClientError;
use anyhow::Result;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

pub const FRAMES_RECEIVED: &str = "highlights_events_frames_received_total";
pub const FRAMES_DROPPED: &str = "highlights_events_frames_dropped_total";
pub const RECONNECTS: &str = "highlights_events_reconnects_total";
pub const LISTENER_FAILURES: &str = "highlights_events_listener_failures_total";
pub const CONNECTED: &str = "highlights_events_connected";

// No-ops until a recorder is installed.

pub fn record_frame_received() {
    counter!(FRAMES_RECEIVED).increment(1);
}

pub fn record_frame_dropped(reason: &'static str) {
    counter!(FRAMES_DROPPED, "reason" => reason).increment(1);
}

pub fn record_reconnect() {
    counter!(RECONNECTS).increment(1);
}

pub fn record_listener_failure() {
    counter!(LISTENER_FAILURES).increment(1);
}

pub fn set_connected(connected: bool) {
    gauge!(CONNECTED).set(if connected { 1.0 } else { 0.0 });
}

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "highlights-events")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            counter!(FRAMES_RECEIVED).absolute(0);
            counter!(RECONNECTS).absolute(0);
            counter!(LISTENER_FAILURES).absolute(0);
            set_connected(false);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(EventClientError::MetricsError(e.to_string()).into())
        }
    }
}
