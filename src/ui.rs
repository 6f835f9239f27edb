/// file: src/ui.rs
/// description: terminal consumer that renders routed events and connection notifications
use crate::{
    events::{Event, EventReceiver, Lifecycle},
    formatter::{EventFormatter, OutputFormat},
};
use tracing::debug;

/// Why the printer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterExit {
    /// Every sender is gone (the router was cleared or dropped).
    ChannelClosed,
    /// The transport exhausted its reconnect budget.
    GaveUp,
}

pub struct EventPrinter {
    event_receiver: EventReceiver,
    formatter: EventFormatter,
    quiet_mode: bool,
}

pub struct PrinterOptions {
    pub colored: bool,
    pub quiet: bool,
}

impl EventPrinter {
    pub fn new(event_receiver: EventReceiver, format: OutputFormat, options: PrinterOptions) -> Self {
        Self {
            event_receiver,
            formatter: EventFormatter::new(format, options.colored),
            quiet_mode: options.quiet,
        }
    }

    pub fn event_count(&self) -> u64 {
        self.formatter.event_count()
    }

    pub fn formatter(&self) -> &EventFormatter {
        &self.formatter
    }

    pub async fn run(&mut self) -> PrinterExit {
        while let Some(event) = self.event_receiver.recv().await {
            if let Some(exit) = self.handle_event(&event) {
                return exit;
            }
        }
        PrinterExit::ChannelClosed
    }

    fn handle_event(&mut self, event: &Event) -> Option<PrinterExit> {
        let Some(lifecycle) = event.lifecycle() else {
            self.formatter.print_event(event);
            return None;
        };

        let payload = &event.payload;
        match lifecycle {
            Lifecycle::Connected => {
                let endpoint = payload["endpoint"].as_str().unwrap_or("?");
                self.print_status("CONNECTED", endpoint);
            }
            Lifecycle::Disconnected => {
                let reason = payload["reason"].as_str().unwrap_or("connection lost");
                self.print_status("DISCONNECTED", reason);
            }
            Lifecycle::Reconnecting => {
                let attempt = payload["attempt"].as_u64().unwrap_or(0);
                let delay_ms = payload["delay_ms"].as_u64().unwrap_or(0);
                self.print_status(
                    "RECONNECTING",
                    &format!("attempt {} in {}ms...", attempt, delay_ms),
                );
            }
            Lifecycle::Error => {
                let message = payload["message"].as_str().unwrap_or("unknown error");
                println!("{}", self.formatter.format_error("ERROR", message));
            }
            Lifecycle::MaxReconnectAttempts => {
                let attempts = payload["attempts"].as_u64().unwrap_or(0);
                println!(
                    "{}",
                    self.formatter.format_error(
                        "GAVE UP",
                        &format!("no connection after {} reconnect attempts", attempts)
                    )
                );
                return Some(PrinterExit::GaveUp);
            }
        }

        debug!(kind = %event.kind, "Lifecycle event rendered");
        None
    }

    fn print_status(&self, status: &str, message: &str) {
        if self.quiet_mode {
            return;
        }
        println!("{}", self.formatter.format_status(status, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_event_channel;
    use serde_json::json;

    fn printer(receiver: EventReceiver) -> EventPrinter {
        EventPrinter::new(
            receiver,
            OutputFormat::Minimal,
            PrinterOptions {
                colored: false,
                quiet: true,
            },
        )
    }

    #[tokio::test]
    async fn test_stops_on_exhaustion() {
        let (tx, rx) = create_event_channel();
        tx.send(Event::new("status_update", json!({}))).await.unwrap();
        tx.send(Lifecycle::max_reconnect_attempts(5)).await.unwrap();
        tx.send(Event::new("status_update", json!({}))).await.unwrap();

        let mut printer = printer(rx);
        assert_eq!(printer.run().await, PrinterExit::GaveUp);
        assert_eq!(printer.event_count(), 1);
    }

    #[tokio::test]
    async fn test_stops_when_senders_are_gone() {
        let (tx, rx) = create_event_channel();
        tx.send(Lifecycle::connected("ws://localhost/ws", "id"))
            .await
            .unwrap();
        tx.send(Event::new("pipeline_stopped", json!({"schedule_id": "x"})))
            .await
            .unwrap();
        drop(tx);

        let mut printer = printer(rx);
        assert_eq!(printer.run().await, PrinterExit::ChannelClosed);
        assert_eq!(printer.event_count(), 1);
    }
}
