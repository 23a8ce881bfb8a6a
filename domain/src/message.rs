use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Who authored a transcript entry.
///
/// Persisted as `"user"` / `"ai"`; anything that is not `"user"` reads back
/// as the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "ai",
        }
    }

    fn from_loose(raw: Option<&str>) -> Self {
        match raw {
            Some("user") => Role::User,
            _ => Role::Assistant,
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Role::from_loose(raw.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Coerce an arbitrary JSON value into a message list.
///
/// Non-arrays yield an empty list. Entries with a missing or unknown role
/// become assistant messages; content is stringified (`null` and missing
/// content become the empty string).
pub fn normalize_messages(raw: &Value) -> Vec<Message> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            let role = Role::from_loose(item.get("role").and_then(Value::as_str));
            let content = match item.get("content") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(Value::Bool(false)) => String::new(),
                Some(other) => other.to_string(),
            };
            Message { role, content }
        })
        .collect()
}

/// Collapse consecutive entries that share both role and content.
///
/// Only the last emitted entry is compared, so `[A, B, A]` stays intact.
pub fn dedupe_messages(messages: impl IntoIterator<Item = Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::new();
    for message in messages {
        if out.last() != Some(&message) {
            out.push(message);
        }
    }
    out
}

/// `serde` hook: read a message list leniently and drop adjacent repeats.
pub fn deserialize_lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Message>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(dedupe_messages(normalize_messages(&raw)))
}
