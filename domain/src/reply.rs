//! Normalization of the generation endpoint's replies.
//!
//! The service has answered in several shapes over time. Every one of them
//! is folded into a canonical object carrying an `es_itinerario` flag and
//! then into [`AssistantReply`].

use crate::itinerary::Itinerary;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const ITINERARY_FLAG: &str = "es_itinerario";
pub const CHAT_FIELD: &str = "mensaje_chat";
pub const UNEXPECTED_RESPONSE: &str = "Respuesta inesperada del servidor.";

fn embedded_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Greedy: first `{` through the last `}`.
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(_) => true,
    }
}

fn chat_only(text: impl Into<String>) -> Value {
    json!({ ITINERARY_FLAG: false, CHAT_FIELD: text.into() })
}

/// Pull the first brace-delimited JSON object out of free text.
///
/// Falls back to a chat-only reply carrying the raw text.
fn parse_embedded(text: &str) -> Value {
    if let Some(found) = embedded_object().find(text) {
        match serde_json::from_str::<Value>(found.as_str()) {
            Ok(parsed) => return parsed,
            Err(e) => warn!("embedded itinerary is not valid JSON: {}", e),
        }
    }
    chat_only(text)
}

/// Resolve a raw backend reply into the canonical object.
///
/// First match wins:
/// 1. an explicit `es_itinerario` key: returned untouched
/// 2. `itinerary`: text is scanned for an embedded object, anything else is
///    passed through
/// 3. `mensaje_chat`: wrapped as a chat reply
/// 4. `titulo` / `dias` at the top level: the value itself is the itinerary
/// 5. a bare string: scanned like (2)
/// 6. anything else: a fixed "unexpected response" chat reply
pub fn normalize_response(response: Value) -> Value {
    if let Value::Object(obj) = &response {
        if obj.contains_key(ITINERARY_FLAG) {
            return response;
        }

        if truthy(obj.get("itinerary")) {
            debug!("reply carries an `itinerary` payload");
            return match obj.get("itinerary") {
                Some(Value::String(text)) => parse_embedded(text),
                Some(payload) => payload.clone(),
                None => chat_only(UNEXPECTED_RESPONSE),
            };
        }

        if truthy(obj.get(CHAT_FIELD)) {
            let text = match obj.get(CHAT_FIELD) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            return chat_only(text);
        }

        if truthy(obj.get("titulo")) || truthy(obj.get("dias")) {
            let mut flagged = Map::new();
            flagged.insert(ITINERARY_FLAG.to_string(), Value::Bool(true));
            for (key, value) in obj {
                flagged.insert(key.clone(), value.clone());
            }
            return Value::Object(flagged);
        }
    }

    if let Value::String(text) = &response {
        return parse_embedded(text);
    }

    warn!("unrecognized reply shape from the generation endpoint");
    chat_only(UNEXPECTED_RESPONSE)
}

/// What the assistant said, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantReply {
    Itinerary(Itinerary),
    Chat(String),
}

impl AssistantReply {
    /// Interpret a canonical object produced by [`normalize_response`].
    ///
    /// An object without the flag that still looks like an itinerary
    /// (`titulo` or `dias`) is taken as one; an unflagged object with no
    /// chat text becomes the "unexpected response" message.
    pub fn from_canonical(canonical: Value) -> Self {
        let flagged = canonical.get(ITINERARY_FLAG).map(|v| truthy(Some(v)));
        let shaped = truthy(canonical.get("titulo")) || truthy(canonical.get("dias"));

        if flagged == Some(true) || (flagged.is_none() && shaped) {
            match serde_json::from_value::<Itinerary>(canonical.clone()) {
                Ok(itinerary) => return AssistantReply::Itinerary(itinerary),
                Err(e) => warn!("itinerary object could not be read: {}", e),
            }
        }

        match canonical.get(CHAT_FIELD) {
            Some(Value::String(text)) => AssistantReply::Chat(text.clone()),
            Some(Value::Null) | None => AssistantReply::Chat(UNEXPECTED_RESPONSE.to_string()),
            Some(other) => AssistantReply::Chat(other.to_string()),
        }
    }

    pub fn is_itinerary(&self) -> bool {
        matches!(self, AssistantReply::Itinerary(_))
    }
}

/// Normalize a raw reply straight into an [`AssistantReply`].
pub fn interpret(response: Value) -> AssistantReply {
    AssistantReply::from_canonical(normalize_response(response))
}
