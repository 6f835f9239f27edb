// file: src/decode.rs
// description: Inbound frame decoding into typed events

use crate::events::Event;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no non-empty 'type' field")]
    MissingKind,

    #[error("binary frames are not supported ({len} bytes)")]
    Binary { len: usize },
}

/// Decodes one text frame. The discriminator is `type`, falling back to
/// `kind`; it is removed from the object and the rest becomes the payload.
pub fn decode_frame(text: &str, received_at: DateTime<Utc>) -> Result<Event, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let key = if object.contains_key("type") {
        "type"
    } else {
        "kind"
    };

    let kind = match object.remove(key) {
        Some(Value::String(kind)) if !kind.is_empty() => kind,
        _ => return Err(DecodeError::MissingKind),
    };

    Ok(Event {
        kind,
        payload: Value::Object(object),
        received_at,
    })
}

/// Shortened frame text for log lines.
pub(crate) fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_strips_type_into_kind() {
        let now = Utc::now();
        let event =
            decode_frame(r#"{"type":"pipeline_started","schedule_id":"abc"}"#, now).unwrap();
        assert_eq!(event.kind, "pipeline_started");
        assert_eq!(event.payload, json!({"schedule_id": "abc"}));
        assert_eq!(event.received_at, now);
    }

    #[test]
    fn test_decode_falls_back_to_kind_field() {
        let event = decode_frame(r#"{"kind":"status_update","running":true}"#, Utc::now())
            .unwrap();
        assert_eq!(event.kind, "status_update");
        assert_eq!(event.payload, json!({"running": true}));
    }

    #[test]
    fn test_decode_keeps_kind_field_when_type_present() {
        let event = decode_frame(r#"{"type":"a","kind":"b"}"#, Utc::now()).unwrap();
        assert_eq!(event.kind, "a");
        assert_eq!(event.payload, json!({"kind": "b"}));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let err = decode_frame("not json {", Utc::now()).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(matches!(
            decode_frame("[1,2,3]", Utc::now()),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            decode_frame("\"pipeline_started\"", Utc::now()),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn test_decode_rejects_missing_or_empty_kind() {
        for frame in [
            r#"{"schedule_id":"abc"}"#,
            r#"{"type":""}"#,
            r#"{"type":42}"#,
            r#"{"type":null,"kind":"status_update"}"#,
        ] {
            assert!(
                matches!(decode_frame(frame, Utc::now()), Err(DecodeError::MissingKind)),
                "expected MissingKind for {frame}"
            );
        }
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), 100);
        assert_eq!(preview("short"), "short");
    }
}
