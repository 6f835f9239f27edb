use crate::events::{Event, EventKind, Resource};

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";

    pub const RED: &'static str = "\x1b[31m";
    pub const WHITE: &'static str = "\x1b[37m";
    pub const GRAY: &'static str = "\x1b[90m";

    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
    Minimal,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "minimal" => OutputFormat::Minimal,
            _ => OutputFormat::Pretty,
        }
    }
}

pub struct EventFormatter {
    format: OutputFormat,
    colored: bool,
    event_count: u64,
}

impl EventFormatter {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self {
            format,
            colored,
            event_count: 0,
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn print_event(&mut self, event: &Event) {
        self.event_count += 1;
        println!("{}", self.format_event(event));
    }

    pub fn format_event(&self, event: &Event) -> String {
        match self.format {
            OutputFormat::Pretty => self.format_pretty(event),
            OutputFormat::Json => serde_json::to_string(event)
                .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e)),
            OutputFormat::Minimal => format!("{} {}", event.kind, event.payload),
        }
    }

    fn format_pretty(&self, event: &Event) -> String {
        let time = event.received_at.format("%H:%M:%S%.3f");
        let kind = event.event_kind();
        let stale = kind
            .invalidates()
            .iter()
            .map(resource_name)
            .collect::<Vec<_>>()
            .join(",");
        let stale = if stale.is_empty() {
            String::new()
        } else {
            format!(" refresh: {}", stale)
        };

        if !self.colored {
            return format!("{} {:<24} {}{}", time, event.kind, event.payload, stale);
        }

        format!(
            "{}{}{} {}{}{:<24}{} {}{}{}{}",
            Colors::GRAY,
            time,
            Colors::RESET,
            Colors::BOLD,
            kind_color(&kind),
            event.kind,
            Colors::RESET,
            event.payload,
            Colors::DIM,
            stale,
            Colors::RESET
        )
    }

    pub fn format_status(&self, status: &str, message: &str) -> String {
        if !self.colored {
            return format!("[{}] {}", status, message);
        }

        let color = match status {
            "RECONNECTING" => Colors::BRIGHT_YELLOW,
            "CONNECTED" => Colors::BRIGHT_GREEN,
            "DISCONNECTED" => Colors::BRIGHT_RED,
            "ERROR" | "GAVE UP" => Colors::BRIGHT_RED,
            _ => Colors::WHITE,
        };

        format!(
            "{}{}[{}]{} {}{}{}",
            Colors::BOLD,
            color,
            status,
            Colors::RESET,
            Colors::WHITE,
            message,
            Colors::RESET
        )
    }

    pub fn format_error(&self, error_type: &str, message: &str) -> String {
        if !self.colored {
            return format!("[{}] ! {}", error_type, message);
        }

        format!(
            "{}{}[{}]{} ! {}{}{}",
            Colors::BOLD,
            Colors::BRIGHT_RED,
            error_type,
            Colors::RESET,
            Colors::RED,
            message,
            Colors::RESET
        )
    }

    pub fn format_summary(&self, duration_secs: u64) -> String {
        let rate = if duration_secs > 0 {
            self.event_count as f64 / duration_secs as f64
        } else {
            0.0
        };
        format!(
            "Session: {} events in {}s ({:.2}/s)",
            self.event_count, duration_secs, rate
        )
    }
}

fn kind_color(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::OrchestratorStarted | EventKind::OrchestratorStopped => Colors::BRIGHT_MAGENTA,
        EventKind::PipelineStarted | EventKind::PipelineStopped => Colors::BRIGHT_GREEN,
        EventKind::ScheduleCreated
        | EventKind::ScheduleUpdated
        | EventKind::ScheduleDeleted
        | EventKind::ScheduleReloaded => Colors::BRIGHT_BLUE,
        EventKind::ManualChannelAction | EventKind::ChannelStatusChanged => Colors::BRIGHT_CYAN,
        EventKind::HighlightGenerated => Colors::BRIGHT_YELLOW,
        EventKind::StatusUpdate | EventKind::Other(_) => Colors::WHITE,
    }
}

fn resource_name(resource: &Resource) -> &'static str {
    match resource {
        Resource::Status => "status",
        Resource::Schedules => "schedules",
        Resource::Channels => "channels",
        Resource::Pipelines => "pipelines",
        Resource::Highlights => "highlights",
    }
}
