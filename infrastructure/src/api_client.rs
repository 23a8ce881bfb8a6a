use crate::config::Config;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const GENERATE_PATH: &str = "/api/chat/generate";
const UPLOAD_PATH: &str = "/api/files/upload";
const MODEL_CHECK_PATH: &str = "/api/chat/model_check";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Error del servidor: {status} - {body}")]
    Server { status: u16, body: String },
    #[error("Error subiendo archivo: {body}")]
    Upload { body: String },
    #[error("Tiempo de espera agotado ({0})")]
    Timeout(String),
    #[error("Error de red: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Respuesta no válida: {0}")]
    Decode(String),
    #[error("No se pudo leer {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else {
            ApiError::Transport(e)
        }
    }
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }
}

/// Body of `POST /api/chat/generate`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TripRequest {
    pub session_id: String,
    pub destination: String,
    pub duration: String,
    pub style: String,
    pub difficulty: String,
    pub extra_info: String,
    pub model: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UploadResult {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModelCheck {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
struct ModelCheckRequest<'a> {
    model: &'a str,
}

/// HTTP client for the itinerary-generation service.
#[derive(Clone)]
pub struct ApiClient {
    client: Arc<Client>,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Transport)?;
        Ok(Self {
            client: Arc::new(client),
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Raw reply of the generation endpoint; shape is not fixed.
    ///
    /// A timed-out call is retried once.
    pub async fn generate(&self, request: &TripRequest) -> Result<Value, ApiError> {
        match self.generate_once(request).await {
            Err(e) if e.is_timeout() => {
                warn!("generation timed out, retrying once");
                self.generate_once(request).await
            }
            other => other,
        }
    }

    async fn generate_once(&self, request: &TripRequest) -> Result<Value, ApiError> {
        let url = self.url(GENERATE_PATH);
        debug!(%url, session = %request.session_id, model = %request.model, "generate");
        let response = self.client.post(&url).json(request).send().await?;
        let text = Self::success_text(response).await?;
        // Bodies that are not JSON are handed on as a plain string reply.
        Ok(serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text)))
    }

    /// Upload a file for analysis (`multipart/form-data`).
    pub async fn upload_file(
        &self,
        path: &Path,
        session_id: &str,
        model: &str,
    ) -> Result<UploadResult, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "adjunto".to_string());
        info!(file = %file_name, bytes = bytes.len(), "uploading attachment");

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("session_id", session_id.to_string())
            .text("model", model.to_string());

        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Upload { body: text });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Ask the service which provider backs `model`.
    pub async fn model_check(&self, model: &str) -> Result<ModelCheck, ApiError> {
        let response = self
            .client
            .post(self.url(MODEL_CHECK_PATH))
            .json(&ModelCheckRequest { model })
            .send()
            .await?;
        let text = Self::success_text(response).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn success_text(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}
