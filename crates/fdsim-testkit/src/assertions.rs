//! Assertion helpers for simulator traffic.

use fdsim_endpoints::IncomingRequest;
use fdsim_streaming::SseEvent;
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Stream Assertions
// ─────────────────────────────────────────────────────────────────────────────

/// Assert that `event` is named `name` and return its JSON payload.
///
/// # Panics
///
/// Panics if the name differs or the data is not JSON.
pub fn expect_event(event: &SseEvent, name: &str) -> Value {
    assert!(
        event.is_event(name),
        "Expected '{name}' event but got {:?} with data {}",
        event.event,
        event.data
    );
    match event.json() {
        Ok(value) => value,
        Err(err) => panic!("'{name}' event data is not JSON ({err}): {}", event.data),
    }
}

/// Assert that `events` are named exactly `names`, in order.
///
/// # Panics
///
/// Panics on any difference.
pub fn assert_event_names(events: &[SseEvent], names: &[&str]) {
    let actual: Vec<&str> = events
        .iter()
        .map(|event| event.event.as_deref().unwrap_or("message"))
        .collect();
    assert_eq!(actual, names, "Unexpected stream event sequence");
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Assertions
// ─────────────────────────────────────────────────────────────────────────────

/// Assert that `request` hit `path` with `method`.
///
/// # Panics
///
/// Panics if either differs.
pub fn assert_request(request: &IncomingRequest, method: &str, path: &str) {
    assert_eq!(request.method.as_str(), method, "Unexpected method for {}", request.uri);
    assert_eq!(request.path(), path, "Unexpected path");
}

/// Assert that `request` carried `name: value`.
///
/// # Panics
///
/// Panics if the header is missing or differs.
pub fn assert_header(request: &IncomingRequest, name: &str, value: &str) {
    assert_eq!(
        request.header(name),
        Some(value),
        "Unexpected '{name}' header on {} {}",
        request.method,
        request.uri
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_event_returns_payload() {
        let event = SseEvent::named("delete", r#"{"key":"f","version":2}"#);
        assert_eq!(expect_event(&event, "delete")["version"], 2);
    }

    #[test]
    #[should_panic(expected = "Expected 'put' event")]
    fn test_expect_event_wrong_name() {
        expect_event(&SseEvent::named("patch", "{}"), "put");
    }

    #[test]
    fn test_event_names() {
        let events = [SseEvent::named("put", "{}"), SseEvent::new("x")];
        assert_event_names(&events, &["put", "message"]);
    }
}
