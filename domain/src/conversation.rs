use crate::ids::mint_id;
use crate::itinerary::Itinerary;
use crate::message::{deserialize_lenient, Message};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Nuevo chat";
pub const GREETING: &str = "**¡Hola!** Soy RutaÑ, tu experto en viajes por España. 🇪🇸\n\nCuéntame tu plan o usa /generar para diseñar un viaje.";

pub fn greeting() -> Message {
    Message::assistant(GREETING)
}

/// One chat thread with its itinerary and session binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    /// Last activity.
    #[serde(default = "Local::now")]
    pub date: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub itinerary: Option<Itinerary>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Conversation {
    /// A fresh conversation holding only the greeting.
    pub fn empty(session_id: &str) -> Self {
        Self {
            id: mint_id(),
            title: default_title(),
            date: Local::now(),
            session_id: Some(session_id.to_string()),
            messages: vec![greeting()],
            itinerary: None,
        }
    }

    /// Worth keeping: more than the greeting, or an itinerary attached.
    pub fn has_content(&self) -> bool {
        self.messages.len() > 1 || self.itinerary.is_some()
    }

    pub fn touch(&mut self) {
        self.date = Local::now();
    }
}

/// Insert or replace `conversation` by id and move it to the front.
pub fn upsert_front(list: &mut Vec<Conversation>, conversation: Conversation) {
    list.retain(|c| c.id != conversation.id);
    list.insert(0, conversation);
}

/// Replace `conversation` in place when present, otherwise prepend it.
pub fn upsert_in_place(list: &mut Vec<Conversation>, conversation: Conversation) {
    match list.iter_mut().find(|c| c.id == conversation.id) {
        Some(slot) => *slot = conversation,
        None => list.insert(0, conversation),
    }
}
