use crate::conversation_store::ConversationStore;
use domain::attachment::{Attachment, AttachmentKind};
use domain::reply::{interpret, AssistantReply};
use domain::storage::KeyValueStore;
use domain::title::extract_title;
use infrastructure::api_client::{ApiClient, ApiError, ModelCheck, TripRequest, UploadResult};
use serde_json::Value;
use shared::telemetry::Telemetry;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const FORM_EXTRA_INFO: &str = "El usuario ha pulsado el botón 'Generar'.";
const ATTACHMENT_ONLY_TEXT: &str = "(Analiza este adjunto)";

/// The remote itinerary service as seen by the orchestrator.
pub trait TravelBackend: Send + Sync {
    fn generate(&self, request: &TripRequest) -> impl Future<Output = Result<Value, ApiError>> + Send;

    fn upload_file(
        &self,
        path: &Path,
        session_id: &str,
        model: &str,
    ) -> impl Future<Output = Result<UploadResult, ApiError>> + Send;

    fn model_check(&self, model: &str) -> impl Future<Output = Result<ModelCheck, ApiError>> + Send;
}

impl TravelBackend for ApiClient {
    fn generate(&self, request: &TripRequest) -> impl Future<Output = Result<Value, ApiError>> + Send {
        ApiClient::generate(self, request)
    }

    fn upload_file(
        &self,
        path: &Path,
        session_id: &str,
        model: &str,
    ) -> impl Future<Output = Result<UploadResult, ApiError>> + Send {
        ApiClient::upload_file(self, path, session_id, model)
    }

    fn model_check(&self, model: &str) -> impl Future<Output = Result<ModelCheck, ApiError>> + Send {
        ApiClient::model_check(self, model)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("ya hay una petición en curso")]
    Busy,
    #[error("el mensaje está vacío")]
    EmptyMessage,
}

/// How one exchange with the service ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    Replied(AssistantReply),
    /// The error line already appended to the transcript.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    Low,
    #[default]
    Medium,
    High,
}

impl Difficulty {
    pub fn value(&self) -> &'static str {
        match self {
            Difficulty::Low => "low",
            Difficulty::Medium => "medium",
            Difficulty::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Low => "Relaxed",
            Difficulty::Medium => "Explorer",
            Difficulty::High => "Adventure",
        }
    }

    pub fn all() -> [Difficulty; 3] {
        [Difficulty::Low, Difficulty::Medium, Difficulty::High]
    }
}

/// Inputs of the structured "generate a trip" action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripForm {
    pub destination: String,
    pub days: u32,
    pub difficulty: Difficulty,
}

impl Default for TripForm {
    fn default() -> Self {
        Self {
            destination: String::new(),
            days: 7,
            difficulty: Difficulty::default(),
        }
    }
}

impl TripForm {
    fn visible_message(&self) -> String {
        let destination = self.destination.trim();
        if destination.is_empty() {
            "Quiero generar un viaje...".to_string()
        } else {
            format!("Genera un viaje a {}...", destination)
        }
    }
}

/// Clears the busy flag on every exit path.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: Arc::clone(flag) })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Mediates request/response exchanges between the user and the service.
///
/// The store lock is taken only around mutations, never across a network
/// call, so each completion folds into the latest state.
pub struct ChatOrchestrator<B, S: KeyValueStore> {
    backend: Arc<B>,
    store: Arc<Mutex<ConversationStore<S>>>,
    busy: Arc<AtomicBool>,
}

impl<B, S: KeyValueStore> Clone for ChatOrchestrator<B, S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            busy: Arc::clone(&self.busy),
        }
    }
}

impl<B: TravelBackend, S: KeyValueStore> ChatOrchestrator<B, S> {
    pub fn new(backend: B, store: ConversationStore<S>) -> Self {
        Self {
            backend: Arc::new(backend),
            store: Arc::new(Mutex::new(store)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> Arc<Mutex<ConversationStore<S>>> {
        Arc::clone(&self.store)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Send free text, optionally with an attachment for the service to
    /// analyse first.
    pub async fn send_message(
        &self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<ExchangeOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(ChatError::EmptyMessage);
        }
        let _guard = BusyGuard::acquire(&self.busy).ok_or(ChatError::Busy)?;

        let body = if text.is_empty() { ATTACHMENT_ONLY_TEXT } else { text };
        let visible = match &attachment {
            Some(att) => {
                let size = match att.path() {
                    Some(path) => tokio::fs::metadata(path).await.ok().map(|m| m.len()),
                    None => None,
                };
                format!("{}\n\n{}", att.banner(size), body)
            }
            None => body.to_string(),
        };

        let (session_id, model) = {
            let mut store = self.store.lock().await;
            if let Some(place) = extract_title(text) {
                store.apply_title_hint(&place);
            }
            store.record_user_message(&visible);
            (store.session_id().to_string(), store.model().to_string())
        };

        let mut outgoing = body.to_string();
        if let Some(att) = &attachment {
            match att.kind {
                AttachmentKind::Url => {
                    outgoing.push_str(&format!("\n\n🔗 URL: {}", att.payload));
                }
                AttachmentKind::File | AttachmentKind::Image => {
                    if let Some(analysis) = self.analyse(att, &session_id, &model).await {
                        outgoing.push_str(&format!(
                            "\n\n[ANÁLISIS DEL ARCHIVO COMPARTIDO]:\n{}",
                            analysis
                        ));
                    }
                }
            }
        }

        let request = TripRequest {
            session_id,
            extra_info: outgoing,
            model,
            ..TripRequest::default()
        };
        Ok(self.exchange(request).await)
    }

    /// Ask for a full itinerary from structured inputs.
    pub async fn generate_from_form(&self, form: &TripForm) -> Result<ExchangeOutcome, ChatError> {
        let _guard = BusyGuard::acquire(&self.busy).ok_or(ChatError::Busy)?;

        let (session_id, model) = {
            let mut store = self.store.lock().await;
            store.record_user_message(&form.visible_message());
            (store.session_id().to_string(), store.model().to_string())
        };

        let request = TripRequest {
            session_id,
            destination: form.destination.trim().to_string(),
            duration: format!("{} días", form.days),
            style: form.difficulty.value().to_string(),
            difficulty: form.difficulty.value().to_string(),
            extra_info: FORM_EXTRA_INFO.to_string(),
            model,
        };
        Ok(self.exchange(request).await)
    }

    /// Persist a new model choice, then report which provider answers for it.
    /// A failed probe only produces a notice.
    pub async fn switch_model(&self, model: &str) {
        self.store.lock().await.set_model(model);

        let notice = match self.backend.model_check(model).await {
            Ok(check) if check.ok => format!(
                "🔍 Provider: **{}** (conectado)",
                check.provider.as_deref().unwrap_or(model)
            ),
            Ok(check) => format!(
                "⚠️ No se pudo comprobar el proveedor: {}",
                check.message.as_deref().unwrap_or("error")
            ),
            Err(e) => {
                warn!(model, "model check failed: {}", e);
                format!("⚠️ No se pudo comprobar el proveedor: {}", e)
            }
        };
        self.store.lock().await.record_notice(&notice);
    }

    async fn analyse(&self, attachment: &Attachment, session_id: &str, model: &str) -> Option<String> {
        let path = attachment.path()?;
        match self.backend.upload_file(&path, session_id, model).await {
            Ok(UploadResult { ok: true, analysis: Some(analysis), filename, .. })
                if !analysis.trim().is_empty() =>
            {
                let file = filename.unwrap_or_else(|| attachment.display_name());
                debug!(%file, chars = analysis.len(), "attachment analysed");
                Some(analysis)
            }
            Ok(result) => {
                let file = result.filename.unwrap_or_else(|| attachment.display_name());
                warn!(%file, message = ?result.message, "upload returned no analysis");
                None
            }
            Err(e) => {
                warn!(file = %attachment.display_name(), "upload failed, sending text alone: {}", e);
                None
            }
        }
    }

    async fn exchange(&self, request: TripRequest) -> ExchangeOutcome {
        let timer = Telemetry::new();
        let result = self.backend.generate(&request).await;

        let mut store = self.store.lock().await;
        let outcome = match result {
            Ok(raw) => {
                let reply = interpret(raw);
                store.record_assistant_reply(reply.clone());
                ExchangeOutcome::Replied(reply)
            }
            Err(e) => {
                error!(session = %request.session_id, "generation failed: {}", e);
                let line = format!("❌ Error: {}", e);
                store.record_error(&line);
                ExchangeOutcome::Failed(line)
            }
        };
        info!(elapsed_ms = timer.elapsed_ms(), "exchange finished");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::message::Role;
    use domain::storage::MemoryStore;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeBackend {
        replies: StdMutex<VecDeque<Result<Value, ApiError>>>,
        requests: StdMutex<Vec<TripRequest>>,
        gate: Option<Arc<Notify>>,
        analysis: Option<String>,
        provider: Option<String>,
    }

    impl FakeBackend {
        fn replying(replies: Vec<Result<Value, ApiError>>) -> Self {
            Self {
                replies: StdMutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn last_request(&self) -> TripRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl TravelBackend for FakeBackend {
        fn generate(&self, request: &TripRequest) -> impl Future<Output = Result<Value, ApiError>> + Send {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"mensaje_chat": "ok"})));
            let gate = self.gate.clone();
            async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                reply
            }
        }

        fn upload_file(
            &self,
            _path: &Path,
            _session_id: &str,
            _model: &str,
        ) -> impl Future<Output = Result<UploadResult, ApiError>> + Send {
            let result = match &self.analysis {
                Some(analysis) => Ok(UploadResult {
                    ok: true,
                    analysis: Some(analysis.clone()),
                    ..UploadResult::default()
                }),
                None => Err(ApiError::Upload { body: "413".into() }),
            };
            async move { result }
        }

        fn model_check(&self, _model: &str) -> impl Future<Output = Result<ModelCheck, ApiError>> + Send {
            let result = match &self.provider {
                Some(p) => Ok(ModelCheck {
                    ok: true,
                    provider: Some(p.clone()),
                    message: None,
                }),
                None => Ok(ModelCheck {
                    ok: false,
                    provider: None,
                    message: Some("sin clave".into()),
                }),
            };
            async move { result }
        }
    }

    fn orchestrator(backend: FakeBackend) -> (MemoryStore, ChatOrchestrator<FakeBackend, MemoryStore>) {
        let storage = MemoryStore::new();
        let store = ConversationStore::initialize(storage.clone(), "smart");
        (storage, ChatOrchestrator::new(backend, store))
    }

    async fn contents(orch: &ChatOrchestrator<FakeBackend, MemoryStore>) -> Vec<String> {
        let store = orch.store();
        let store = store.lock().await;
        store.transcript().iter().map(|m| m.content.clone()).collect()
    }

    #[tokio::test]
    async fn chat_reply_lands_after_user_message() {
        let (_, orch) = orchestrator(FakeBackend::replying(vec![Ok(json!({"mensaje_chat": "¿Cuántos días?"}))]));
        let outcome = orch.send_message("Quiero ir a Sevilla y comer jamón", None).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Replied(AssistantReply::Chat("¿Cuántos días?".into())));
        let transcript = contents(&orch).await;
        assert_eq!(&transcript[1..], ["Quiero ir a Sevilla y comer jamón", "¿Cuántos días?"]);
        let store = orch.store();
        assert_eq!(store.lock().await.active().title, "Viaje a Sevilla");
        assert_eq!(orch.backend.last_request().extra_info, "Quiero ir a Sevilla y comer jamón");
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn itinerary_reply_is_attached_and_saved() {
        let (storage, orch) = orchestrator(FakeBackend::replying(vec![Ok(json!({
            "itinerary": "aquí va {\"es_itinerario\":true,\"titulo\":\"Madrid\",\"dias\":[]} fin"
        }))]));
        let outcome = orch.send_message("Planifica Madrid", None).await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Replied(AssistantReply::Itinerary(_))));

        let store = orch.store();
        let store = store.lock().await;
        assert_eq!(store.active().title, "Madrid");
        assert_eq!(store.conversations().len(), 1);
        assert!(storage.get("rutaN_conversations").unwrap().unwrap().contains("Madrid"));
    }

    #[tokio::test]
    async fn transport_failure_becomes_error_line() {
        let (_, orch) = orchestrator(FakeBackend::replying(vec![Err(ApiError::Server {
            status: 500,
            body: "boom".into(),
        })]));
        let outcome = orch.send_message("hola", None).await.unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::Failed("❌ Error: Error del servidor: 500 - boom".into())
        );
        let store = orch.store();
        let store = store.lock().await;
        assert_eq!(store.transcript().last().unwrap().role, Role::Assistant);
        assert_eq!(store.active().messages.len(), 2);
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (_, orch) = orchestrator(FakeBackend::default());
        assert_eq!(orch.send_message("   ", None).await, Err(ChatError::EmptyMessage));
        assert_eq!(contents(&orch).await.len(), 1);
    }

    #[tokio::test]
    async fn second_send_while_busy_is_rejected() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(Arc::clone(&gate)),
            ..FakeBackend::default()
        };
        let (_, orch) = orchestrator(backend);

        let (first, second) = tokio::join!(orch.send_message("primero", None), async {
            let result = orch.send_message("segundo", None).await;
            gate.notify_one();
            result
        });

        assert!(first.is_ok());
        assert_eq!(second, Err(ChatError::Busy));
        let transcript = contents(&orch).await;
        assert!(!transcript.iter().any(|c| c == "segundo"));
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn file_analysis_is_spliced_into_request() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("reserva.pdf");
        std::fs::write(&file, vec![0u8; 1536]).unwrap();
        let backend = FakeBackend {
            analysis: Some("Hotel en Cádiz, 3 noches".into()),
            ..FakeBackend::default()
        };
        let (_, orch) = orchestrator(backend);

        orch.send_message("Organiza el viaje", Some(Attachment::from_arg(file.to_str().unwrap())))
            .await
            .unwrap();

        let request = orch.backend.last_request();
        assert_eq!(
            request.extra_info,
            "Organiza el viaje\n\n[ANÁLISIS DEL ARCHIVO COMPARTIDO]:\nHotel en Cádiz, 3 noches"
        );
        let transcript = contents(&orch).await;
        assert_eq!(
            transcript[1],
            "📎 **Archivo Adjunto:** reserva.pdf (1.5 KB)\n\nOrganiza el viaje"
        );
    }

    #[tokio::test]
    async fn failed_upload_still_sends_text() {
        let (_, orch) = orchestrator(FakeBackend::default());
        orch.send_message("Mira esto", Some(Attachment::from_arg("/no/existe.png")))
            .await
            .unwrap();
        assert_eq!(orch.backend.last_request().extra_info, "Mira esto");
    }

    #[tokio::test]
    async fn url_is_spliced_textually() {
        let (_, orch) = orchestrator(FakeBackend::default());
        orch.send_message("", Some(Attachment::from_arg("https://turismo.es/ronda")))
            .await
            .unwrap();
        assert_eq!(
            orch.backend.last_request().extra_info,
            "(Analiza este adjunto)\n\n🔗 URL: https://turismo.es/ronda"
        );
    }

    #[tokio::test]
    async fn form_generation_builds_structured_request() {
        let (_, orch) = orchestrator(FakeBackend::default());
        let form = TripForm {
            destination: "Asturias".into(),
            days: 5,
            difficulty: Difficulty::High,
        };
        orch.generate_from_form(&form).await.unwrap();

        let request = orch.backend.last_request();
        assert_eq!(request.destination, "Asturias");
        assert_eq!(request.duration, "5 días");
        assert_eq!(request.style, "high");
        assert_eq!(request.extra_info, "El usuario ha pulsado el botón 'Generar'.");
        assert_eq!(request.model, "smart");
        assert_eq!(contents(&orch).await[1], "Genera un viaje a Asturias...");
    }

    #[tokio::test]
    async fn form_without_destination_uses_generic_message() {
        let (_, orch) = orchestrator(FakeBackend::default());
        orch.generate_from_form(&TripForm::default()).await.unwrap();
        assert_eq!(contents(&orch).await[1], "Quiero generar un viaje...");
        assert_eq!(orch.backend.last_request().duration, "7 días");
    }

    #[tokio::test]
    async fn switch_model_reports_probe_result() {
        let backend = FakeBackend {
            provider: Some("groq".into()),
            ..FakeBackend::default()
        };
        let (storage, orch) = orchestrator(backend);
        orch.switch_model("fast").await;

        assert_eq!(storage.get("rutaN_model").unwrap().as_deref(), Some("fast"));
        let transcript = contents(&orch).await;
        assert_eq!(
            &transcript[1..],
            ["🔁 Modelo cambiado a **fast**", "🔍 Provider: **groq** (conectado)"]
        );
    }

    #[tokio::test]
    async fn failed_probe_does_not_undo_switch() {
        let (_, orch) = orchestrator(FakeBackend::default());
        orch.switch_model("local").await;
        let store = orch.store();
        let store = store.lock().await;
        assert_eq!(store.model(), "local");
        assert_eq!(
            store.transcript().last().unwrap().content,
            "⚠️ No se pudo comprobar el proveedor: sin clave"
        );
    }

    #[tokio::test]
    async fn model_switch_during_generation_keeps_completion_order() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(Arc::clone(&gate)),
            provider: Some("ollama".into()),
            replies: StdMutex::new(VecDeque::from(vec![Ok(json!({"mensaje_chat": "Aquí tienes ideas"}))])),
            ..FakeBackend::default()
        };
        let (_, orch) = orchestrator(backend);

        let (sent, _) = tokio::join!(orch.send_message("Ideas para Galicia", None), async {
            orch.switch_model("local").await;
            gate.notify_one();
        });
        sent.unwrap();

        let transcript = contents(&orch).await;
        assert_eq!(
            &transcript[1..],
            [
                "Ideas para Galicia",
                "🔁 Modelo cambiado a **local**",
                "🔍 Provider: **ollama** (conectado)",
                "Aquí tienes ideas",
            ]
        );
        // The request left before the switch.
        assert_eq!(orch.backend.last_request().model, "smart");
    }
}
