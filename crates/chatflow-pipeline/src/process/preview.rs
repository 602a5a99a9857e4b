//! Bounded log previews of inbound content.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::query::Query;

const PREVIEW_CHARS: usize = 10;

/// Renders `value` as compact JSON with every string longer than a few
/// characters cut down. This covers inline payloads (`base64`,
/// `image_base64`, `file_base64`, `data:` URIs) as well as long text.
///
/// Never fails: a value that cannot be serialized renders as `<TypeName>`.
pub fn preview<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(value) => truncate(value).to_string(),
        Err(_) => format!("<{}>", std::any::type_name::<T>()),
    }
}

/// Preview of what a query carries in: the chain text and, when present, the
/// provider-facing user message.
pub fn preview_query(query: &Query) -> String {
    let mut fields = Map::new();
    fields.insert(
        "message".to_string(),
        Value::String(query.message_chain().to_string().trim().to_string()),
    );
    if let Some(user_message) = query.user_message() {
        fields.insert(
            "user_message".to_string(),
            serde_json::to_value(user_message).unwrap_or(Value::Null),
        );
    }
    preview(&Value::Object(fields))
}

fn truncate(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(shorten(s)),
        Value::Array(items) => Value::Array(items.into_iter().map(truncate).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, truncate(value)))
                .collect(),
        ),
        other => other,
    }
}

fn shorten(s: String) -> String {
    match s.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s,
    }
}
