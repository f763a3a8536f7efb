//! Stream event payloads for each SDK kind.
//!
//! Server-side streams address items by path:
//!
//! ```text
//! event: put     data: {"path":"/","data":{"flags":{...},"segments":{...}}}
//! event: patch   data: {"path":"/flags/my-flag","data":{"key":"my-flag","version":2,...}}
//! event: delete  data: {"path":"/segments/my-segment","version":3}
//! ```
//!
//! Client-side streams only carry flags, addressed by key:
//!
//! ```text
//! event: put     data: {"my-flag":{"value":true,"version":1}}
//! event: patch   data: {"key":"my-flag","value":false,"version":2}
//! event: delete  data: {"key":"my-flag","version":3}
//! ```

use fdsim_core::{DataNamespace, SdkData, SdkKind};
use serde_json::{Map, Value, json};

use crate::SseEvent;

/// Name of the full-dataset event.
pub const PUT_EVENT: &str = "put";
/// Name of the single-item update event.
pub const PATCH_EVENT: &str = "patch";
/// Name of the single-item removal event.
pub const DELETE_EVENT: &str = "delete";

/// Full-dataset replay for `data`.
#[must_use]
pub fn put_event(data: &SdkData) -> SseEvent {
    let payload = match data {
        SdkData::Server(_) => json!({"path": "/", "data": data.to_json()}),
        SdkData::Client(_) => data.to_json(),
    };
    SseEvent::named(PUT_EVENT, payload.to_string())
}

/// Update of one item.
///
/// # Panics
///
/// Panics if `kind` is client-side and `namespace` is not flags, or if
/// `item` is not a JSON object. Neither can be represented on the wire.
#[must_use]
pub fn patch_event(
    kind: SdkKind,
    namespace: DataNamespace,
    key: &str,
    version: u64,
    item: Value,
) -> SseEvent {
    check_namespace(kind, namespace);

    let mut object = match item {
        Value::Object(object) => object,
        other => panic!("stream patch for {namespace}/{key} must be a JSON object, got {other}"),
    };
    object.insert("key".into(), Value::from(key));
    object.insert("version".into(), Value::from(version));

    let payload = if kind.is_client_side() {
        Value::Object(object)
    } else {
        json!({"path": item_path(namespace, key), "data": object})
    };
    SseEvent::named(PATCH_EVENT, payload.to_string())
}

/// Removal of one item.
///
/// # Panics
///
/// Panics if `kind` is client-side and `namespace` is not flags.
#[must_use]
pub fn delete_event(kind: SdkKind, namespace: DataNamespace, key: &str, version: u64) -> SseEvent {
    check_namespace(kind, namespace);

    let mut payload = Map::new();
    if kind.is_client_side() {
        payload.insert("key".into(), Value::from(key));
    } else {
        payload.insert("path".into(), Value::from(item_path(namespace, key)));
    }
    payload.insert("version".into(), Value::from(version));
    SseEvent::named(DELETE_EVENT, Value::Object(payload).to_string())
}

fn item_path(namespace: DataNamespace, key: &str) -> String {
    format!("/{namespace}/{key}")
}

fn check_namespace(kind: SdkKind, namespace: DataNamespace) {
    assert!(
        !kind.is_client_side() || namespace == DataNamespace::Flags,
        "{kind} streams can only carry flags, not {namespace}"
    );
}
