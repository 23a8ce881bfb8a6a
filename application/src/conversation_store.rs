use domain::conversation::{greeting, upsert_front, upsert_in_place, Conversation};
use domain::ids::mint_id;
use domain::itinerary::Itinerary;
use domain::message::{dedupe_messages, Message};
use domain::reply::AssistantReply;
use domain::storage::KeyValueStore;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const SESSION_KEY: &str = "rutaN_session";
pub const MODEL_KEY: &str = "rutaN_model";
pub const CONVERSATIONS_KEY: &str = "rutaN_conversations";

/// Single source of truth for the conversation list, the active
/// conversation and the session identifier.
///
/// Every mutation is written through to the key-value store. Storage
/// failures are logged and swallowed; the in-memory state stays
/// authoritative for the rest of the run.
pub struct ConversationStore<S: KeyValueStore> {
    storage: S,
    conversations: Vec<Conversation>,
    active: Conversation,
    transcript: Vec<Message>,
    session_id: String,
    model: String,
    itinerary: Option<Itinerary>,
}

impl<S: KeyValueStore> ConversationStore<S> {
    /// Load session, model preference and saved conversations, then activate
    /// the most recent conversation or synthesize an empty one.
    pub fn initialize(storage: S, default_model: &str) -> Self {
        let session_id = match read_key(&storage, SESSION_KEY) {
            Some(sid) if !sid.is_empty() => sid,
            _ => {
                let sid = mint_id();
                write_key(&storage, SESSION_KEY, &sid);
                sid
            }
        };
        let model = read_key(&storage, MODEL_KEY)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model.to_string());
        let conversations = read_key(&storage, CONVERSATIONS_KEY)
            .map(|raw| decode_conversations(&raw))
            .unwrap_or_default();

        let mut store = Self {
            active: Conversation::empty(&session_id),
            transcript: Vec::new(),
            storage,
            conversations,
            session_id,
            model,
            itinerary: None,
        };

        match store.conversations.first().cloned() {
            Some(last) => {
                info!(id = %last.id, saved = store.conversations.len(), "resuming conversation");
                store.activate(last);
            }
            None => {
                store.transcript = store.active.messages.clone();
            }
        }
        store
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn active(&self) -> &Conversation {
        &self.active
    }

    /// Saved conversations, most recent first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn itinerary(&self) -> Option<&Itinerary> {
        self.itinerary.as_ref()
    }

    /// Sidebar listing: the active conversation when it has not been saved
    /// yet, followed by the saved list. Never empty.
    pub fn list_view(&self) -> Vec<&Conversation> {
        let mut view = Vec::with_capacity(self.conversations.len() + 1);
        if !self.conversations.iter().any(|c| c.id == self.active.id) {
            view.push(&self.active);
        }
        view.extend(self.conversations.iter());
        view
    }

    /// Start a fresh conversation under a new session identifier.
    ///
    /// The outgoing conversation is saved first when it holds more than the
    /// greeting or carries an itinerary.
    pub fn new_conversation(&mut self) {
        let previous_sid = std::mem::replace(&mut self.session_id, mint_id());
        write_key(&self.storage, SESSION_KEY, &self.session_id);
        self.save_outgoing(&previous_sid);

        self.install_empty();
        info!(id = %self.active.id, session = %self.session_id, "new conversation");
    }

    /// Switch to a saved conversation. Returns `false` for unknown ids.
    pub fn open_conversation(&mut self, id: &str) -> bool {
        let Some(target) = self.conversations.iter().find(|c| c.id == id).cloned() else {
            return false;
        };
        if self.active.id != id {
            let sid = self.session_id.clone();
            self.save_outgoing(&sid);
        }
        debug!(id, "opening conversation");
        self.activate(target);
        true
    }

    /// Remove a conversation. When it was the active one, the most recent
    /// remaining conversation takes over, or a fresh one is synthesized
    /// under a new session identifier.
    pub fn delete_conversation(&mut self, id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        let removed = self.conversations.len() != before;
        if removed {
            self.persist_conversations();
        }

        if self.active.id != id {
            return removed;
        }

        match self.conversations.first().cloned() {
            Some(first) => self.activate(first),
            None => {
                self.session_id = mint_id();
                write_key(&self.storage, SESSION_KEY, &self.session_id);
                self.install_empty();
            }
        }
        info!(id, active = %self.active.id, "conversation deleted");
        true
    }

    /// Title from the user's own words, e.g. "Viaje a Sevilla".
    pub fn apply_title_hint(&mut self, place: &str) {
        self.active.title = format!("Viaje a {}", place);
        self.sync_active();
    }

    /// Optimistic append of the user's message.
    pub fn record_user_message(&mut self, content: &str) {
        let message = Message::user(content);
        self.transcript.push(message.clone());
        self.active.messages.push(message);
        self.active.touch();
        self.sync_active();
    }

    /// Fold a normalized reply into the transcript and the active
    /// conversation. Itineraries also retitle the conversation and move it
    /// to the front of the saved list.
    pub fn record_assistant_reply(&mut self, reply: AssistantReply) -> Message {
        match reply {
            AssistantReply::Itinerary(itinerary) => {
                let title = itinerary.conversation_title();
                let narrative = itinerary.chat_message.clone().unwrap_or_else(|| {
                    format!(
                        "¡Listo! He diseñado tu viaje a **{}**. 👉 Escribe /itinerario para verlo.",
                        title
                    )
                });
                let message = Message::assistant(narrative);

                self.itinerary = Some(itinerary.clone());
                self.active.title = title;
                self.active.itinerary = Some(itinerary);
                self.append_to_active(message.clone());
                self.active.touch();
                self.active.session_id = Some(self.session_id.clone());
                upsert_front(&mut self.conversations, self.active.clone());
                self.persist_conversations();

                self.transcript.push(message.clone());
                info!(id = %self.active.id, title = %self.active.title, "itinerary attached");
                message
            }
            AssistantReply::Chat(text) => {
                let message = Message::assistant(text);
                self.transcript.push(message.clone());
                self.append_to_active(message.clone());
                self.sync_active();
                message
            }
        }
    }

    /// Informational assistant line (model switches, provider checks).
    pub fn record_notice(&mut self, content: &str) {
        let message = Message::assistant(content);
        self.transcript.push(message.clone());
        self.append_to_active(message);
        self.sync_active();
    }

    /// Error bubble: shown in the transcript only.
    pub fn record_error(&mut self, content: &str) {
        self.transcript.push(Message::assistant(content));
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
        write_key(&self.storage, MODEL_KEY, model);
        self.record_notice(&format!("🔁 Modelo cambiado a **{}**", model));
    }

    /// Save the active conversation before the client exits.
    pub fn close(&mut self) {
        let sid = self.session_id.clone();
        self.save_outgoing(&sid);
    }

    fn append_to_active(&mut self, message: Message) {
        let merged = std::mem::take(&mut self.active.messages)
            .into_iter()
            .chain(std::iter::once(message));
        self.active.messages = dedupe_messages(merged);
    }

    /// Write the active conversation through once it holds more than the
    /// greeting. Its position in the saved list is kept.
    fn sync_active(&mut self) {
        if !self.active.has_content() {
            return;
        }
        if self.active.session_id.is_none() {
            self.active.session_id = Some(self.session_id.clone());
        }
        upsert_in_place(&mut self.conversations, self.active.clone());
        self.persist_conversations();
    }

    fn save_outgoing(&mut self, fallback_sid: &str) {
        if !self.active.has_content() {
            return;
        }
        let mut outgoing = self.active.clone();
        outgoing.touch();
        if outgoing.session_id.is_none() {
            outgoing.session_id = Some(fallback_sid.to_string());
        }
        upsert_in_place(&mut self.conversations, outgoing);
        self.persist_conversations();
    }

    fn activate(&mut self, mut conversation: Conversation) {
        if conversation.messages.is_empty() {
            conversation.messages.push(greeting());
        }
        if let Some(sid) = &conversation.session_id {
            self.session_id = sid.clone();
        }
        self.itinerary = conversation.itinerary.clone();
        self.transcript = conversation.messages.clone();
        self.active = conversation;
    }

    fn install_empty(&mut self) {
        self.active = Conversation::empty(&self.session_id);
        self.transcript = self.active.messages.clone();
        self.itinerary = None;
    }

    fn persist_conversations(&self) {
        match serde_json::to_string(&self.conversations) {
            Ok(encoded) => write_key(&self.storage, CONVERSATIONS_KEY, &encoded),
            Err(e) => warn!("could not encode conversations: {}", e),
        }
    }
}

fn read_key<S: KeyValueStore>(storage: &S, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, "storage read failed: {}", e);
            None
        }
    }
}

fn write_key<S: KeyValueStore>(storage: &S, key: &str, value: &str) {
    if let Err(e) = storage.set(key, value) {
        warn!(key, "storage write failed: {}", e);
    }
}

/// Decode the saved list, skipping entries that no longer parse.
fn decode_conversations(raw: &str) -> Vec<Conversation> {
    let items = match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("saved conversation list is unreadable: {}", e);
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Conversation>(item) {
            Ok(conv) => Some(conv),
            Err(e) => {
                warn!("skipping unreadable conversation: {}", e);
                None
            }
        })
        .collect()
}
