/// file: src/config.rs
/// description: Configuration model for the event transport and the terminal shell
use crate::{
    backoff::ReconnectPolicy,
    cli::Args,
    endpoint::{derive_endpoint, parse_endpoint},
    error::EventClientError,
    formatter::OutputFormat,
};
use anyhow::Result;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportConfig,
    pub output: OutputConfig,
    pub metrics: MetricsConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Dashboard origin; the endpoint is derived from it when no explicit one is set.
    pub origin: Option<Url>,
    pub endpoint: Option<Url>,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    /// Keep listeners registered when `disconnect()` is called.
    pub retain_subscriptions: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            origin: None,
            endpoint: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retain_subscriptions: false,
        }
    }
}

impl TransportConfig {
    pub fn with_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..Self::default()
        }
    }

    pub fn with_origin(origin: Url) -> Self {
        Self {
            origin: Some(origin),
            ..Self::default()
        }
    }

    /// Endpoint for a connect call: the explicit override, else the
    /// configured endpoint, else one derived from the origin.
    pub fn resolve_endpoint(&self, explicit: Option<&str>) -> Result<Url, EventClientError> {
        if let Some(raw) = explicit {
            return parse_endpoint(raw);
        }
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        match &self.origin {
            Some(origin) => derive_endpoint(origin),
            None => Err(EventClientError::InvalidConfig(
                "no event endpoint or dashboard origin configured".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub colored: bool,
    pub quiet: bool,
    /// Empty means every kind.
    pub kinds: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StatusConfig {
    pub interval: Option<Duration>,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let origin = Url::parse(&args.origin)?;
        let endpoint = args.url.as_deref().map(parse_endpoint).transpose()?;

        if args.max_delay_ms < args.base_delay_ms {
            return Err(EventClientError::InvalidConfig(format!(
                "max delay ({}ms) is shorter than base delay ({}ms)",
                args.max_delay_ms, args.base_delay_ms
            ))
            .into());
        }
        if !(0.0..=1.0).contains(&args.jitter) {
            return Err(EventClientError::InvalidConfig(format!(
                "jitter must be between 0.0 and 1.0, got {}",
                args.jitter
            ))
            .into());
        }

        let kinds = args
            .kinds
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Ok(Config {
            transport: TransportConfig {
                origin: Some(origin),
                endpoint,
                reconnect: ReconnectPolicy {
                    base_delay: Duration::from_millis(args.base_delay_ms),
                    max_attempts: args.max_attempts,
                    max_delay: Duration::from_millis(args.max_delay_ms),
                    jitter: args.jitter,
                },
                connect_timeout: Duration::from_secs(args.connect_timeout),
                retain_subscriptions: args.retain_subscriptions,
            },
            output: OutputConfig {
                format: OutputFormat::from(args.format.as_str()),
                colored: !args.no_color,
                quiet: args.quiet,
                kinds,
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            status: StatusConfig {
                interval: (args.status_interval > 0)
                    .then(|| Duration::from_secs(args.status_interval)),
            },
        })
    }
}
