// file: src/endpoint.rs
// description: Event endpoint derivation from the dashboard origin

use crate::error::EventClientError;
use url::Url;

/// Path of the backend's event stream, relative to the dashboard origin.
pub const EVENT_PATH: &str = "/ws";

/// Maps the dashboard origin to its event endpoint: `https` becomes `wss`,
/// `http` becomes `ws`, host and port are kept and the path is `/ws`.
/// A URL that is already `ws`/`wss` is returned unchanged.
pub fn derive_endpoint(origin: &Url) -> Result<Url, EventClientError> {
    let scheme = match origin.scheme() {
        "https" => "wss",
        "http" => "ws",
        "ws" | "wss" => return Ok(origin.clone()),
        other => {
            return Err(EventClientError::UnsupportedScheme {
                scheme: other.to_string(),
            });
        }
    };

    let host = origin
        .host_str()
        .ok_or_else(|| EventClientError::InvalidConfig(format!("origin {origin} has no host")))?;

    let authority = match origin.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(Url::parse(&format!("{scheme}://{authority}{EVENT_PATH}"))?)
}

/// Parses an explicit endpoint override, accepting `http(s)` origins as well.
pub fn parse_endpoint(raw: &str) -> Result<Url, EventClientError> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        "http" | "https" => derive_endpoint(&url),
        other => Err(EventClientError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}
