//! Shape normalisation for list endpoints whose response shape the server
//! does not pin down.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{Message, Peer};

/// Peer list from either a bare array or `{ "users": [...] }`. Anything else
/// yields an empty list.
pub fn peers_from_payload(payload: Value) -> Vec<Peer> {
    match payload {
        Value::Array(items) => collect_valid(items, "peer"),
        Value::Object(mut map) => match map.remove("users") {
            Some(Value::Array(items)) => collect_valid(items, "peer"),
            _ => {
                log::debug!("Peer list payload has no `users` array; treating as empty");
                Vec::new()
            }
        },
        other => {
            log::debug!("Unexpected peer list payload ({}); treating as empty", kind(&other));
            Vec::new()
        }
    }
}

/// Conversation history from a bare array. Anything else yields an empty list.
pub fn messages_from_payload(payload: Value) -> Vec<Message> {
    match payload {
        Value::Array(items) => collect_valid(items, "message"),
        other => {
            log::debug!("Unexpected history payload ({}); treating as empty", kind(&other));
            Vec::new()
        }
    }
}

/// Single message from a create-message response.
pub fn message_from_payload(payload: Value) -> Option<Message> {
    match serde_json::from_value(payload) {
        Ok(message) => Some(message),
        Err(err) => {
            log::warn!("Failed to decode message payload: {err}");
            None
        }
    }
}

// Entries that do not decode are skipped so one bad record does not blank the list.
fn collect_valid<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("Skipping malformed {what} entry: {err}");
                None
            }
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
