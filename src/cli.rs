use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "highlights-events",
    about = "real-time event client for the highlights production dashboard",
    version
)]
pub struct Args {
    /// Dashboard origin the event endpoint is derived from (http -> ws, https -> wss)
    #[arg(short, long, default_value = "http://localhost:8000")]
    pub origin: String,

    /// Explicit event endpoint, overrides the one derived from --origin
    #[arg(short, long)]
    pub url: Option<String>,

    /// Delay before the first automatic reconnect, in milliseconds
    #[arg(long, default_value = "1000")]
    pub base_delay_ms: u64,

    /// Maximum number of automatic reconnect attempts
    #[arg(long, default_value = "5")]
    pub max_attempts: u32,

    /// Upper bound for any single reconnect delay, in milliseconds
    #[arg(long, default_value = "30000")]
    pub max_delay_ms: u64,

    /// Random spread applied to reconnect delays (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    pub jitter: f64,

    /// Handshake timeout in seconds
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// Keep subscriptions registered across disconnect/connect cycles
    #[arg(long)]
    pub retain_subscriptions: bool,

    /// Only print these event kinds (comma separated); all kinds when empty
    #[arg(short, long, value_delimiter = ',')]
    pub kinds: Vec<String>,

    /// Output format: pretty, json, minimal
    #[arg(long, default_value = "pretty")]
    pub format: String,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Quiet mode - only events and errors, no lifecycle chatter
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Log a connection status snapshot every N seconds (0 disables)
    #[arg(long, default_value = "0")]
    pub status_interval: u64,
}
