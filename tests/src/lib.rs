//! Fixtures shared by the cross-crate tests: a mocked itinerary service and
//! helpers wiring real clients and stores against it.

use application::conversation_store::ConversationStore;
use application::orchestrator::ChatOrchestrator;
use domain::storage::KeyValueStore;
use infrastructure::api_client::ApiClient;
use infrastructure::config::Config;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct TravelMockServer {
    server: MockServer,
}

impl TravelMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn config(&self) -> Config {
        Config {
            api_url: self.uri(),
            request_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config()).expect("client")
    }

    pub fn orchestrator<S: KeyValueStore>(&self, storage: S) -> ChatOrchestrator<ApiClient, S> {
        let store = ConversationStore::initialize(storage, "smart");
        ChatOrchestrator::new(self.client(), store)
    }

    /// Generation endpoint answers every call with `body`.
    pub async fn mock_generate(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/chat/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Generation endpoint answers only requests whose JSON contains `partial`.
    pub async fn mock_generate_matching(&self, partial: Value, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/chat/generate"))
            .and(body_partial_json(partial))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_generate_error(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat/generate"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_upload(&self, analysis: &str) {
        Mock::given(method("POST"))
            .and(path("/api/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "analysis": analysis,
                "filename": "adjunto"
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_upload_error(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/api/files/upload"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"detail": "archivo demasiado grande"})))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_model_check(&self, provider: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat/model_check"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "provider": provider
            })))
            .mount(&self.server)
            .await;
    }

    /// JSON bodies received by the generation endpoint, in order.
    pub async fn generate_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/api/chat/generate")
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}

/// A complete itinerary reply in the service's native shape.
pub fn sample_itinerary(title: &str) -> Value {
    json!({
        "es_itinerario": true,
        "titulo": title,
        "destino": title,
        "resumen": "Tres días entre monumentos y tapas",
        "mensaje_chat": format!("He preparado tu ruta por {}.", title),
        "dias": [
            {"dia": 1, "titulo_dia": "Casco antiguo", "itinerario": [
                {"hora": "10:00", "activity": "Catedral", "category": "Cultura"},
                {"hora": "14:00", "activity": "Menú del día", "category": "Gastronomía"}
            ], "tip_pro": "Entra temprano"},
            {"dia": 2, "actividades": ["Museo", "Paseo por el río"]},
            {"morning": "Mercado", "lunch": {"activity": "Tapas", "category": "food"}, "afternoon": "Mirador"}
        ]
    })
}
