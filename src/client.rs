//! HTTP layer for the classification and LLM services.
//!
//! Every call returns a typed result: success, [`CallError::Application`] when
//! the server answered with a non-2xx status, or [`CallError::Transport`] when
//! it could not be reached at all.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Endpoints;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("server responded with HTTP {status}")]
    Application {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("could not reach {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The request could not be built, so nothing was sent
    #[error("could not prepare the request: {reason}")]
    InvalidRequest { reason: String },
}

impl CallError {
    /// Server-supplied text, or the generic HTTP status message
    pub fn reason(&self) -> String {
        match self {
            CallError::Application { detail: Some(detail), .. } => detail.clone(),
            CallError::Application { status, detail: None } => {
                format!("Server error HTTP {}.", status.as_u16())
            }
            other => other.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CallError::Transport { .. })
    }
}

/// Image handed to the classification service
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Successful classification body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Classification {
    pub message: String,
    #[serde(default)]
    pub bird: Option<String>,
}

impl Classification {
    /// The species label, if the service named one
    pub fn species(&self) -> Option<&str> {
        self.bird.as_deref().filter(|b| !b.trim().is_empty())
    }
}

#[derive(Serialize)]
struct QuestionRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct EnrichRequest<'a> {
    bird_name: &'a str,
    original_message: &'a str,
}

#[derive(Deserialize)]
struct LlmReply {
    response: String,
}

/// Field of a failure body holding the human-readable error
#[derive(Debug, Clone, Copy)]
enum ErrorField {
    Detail,
    // The enrichment route reports failures in `response`.
    Response,
}

impl ErrorField {
    fn key(self) -> &'static str {
        match self {
            ErrorField::Detail => "detail",
            ErrorField::Response => "response",
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// POST the image to the classification service
    async fn classify(&self, upload: UploadRequest) -> Result<Classification, CallError>;

    /// POST a free-form question to the general LLM route
    async fn ask(&self, text: &str) -> Result<String, CallError>;

    /// POST an identified species to the enrichment LLM route
    async fn enrich(&self, bird_name: &str, original_message: &str) -> Result<String, CallError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    endpoints: Endpoints,
}

impl HttpBackend {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            client: Client::new(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn send(
        &self,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, CallError> {
        tracing::debug!(%url, "sending request");
        request.send().await.map_err(|e| {
            tracing::warn!(%url, error = %e, "request did not reach server");
            CallError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn classify(&self, upload: UploadRequest) -> Result<Classification, CallError> {
        let url = &self.endpoints.classifier;
        let mime = mime_guess::from_path(&upload.filename).first_or_octet_stream();
        let filename = upload.filename.clone();
        let size = upload.bytes.len();
        let part = file_part(upload, mime.essence_str())?;
        let form = multipart::Form::new().part("file", part);

        tracing::debug!(%filename, size, %mime, "uploading image");
        let response = self
            .send(url, self.client.post(url.clone()).multipart(form))
            .await?;
        read_json(url, response, ErrorField::Detail).await
    }

    async fn ask(&self, text: &str) -> Result<String, CallError> {
        let url = &self.endpoints.general;
        let request = self.client.post(url.clone()).json(&QuestionRequest { text });
        let response = self.send(url, request).await?;
        let reply: LlmReply = read_json(url, response, ErrorField::Detail).await?;
        Ok(reply.response)
    }

    async fn enrich(&self, bird_name: &str, original_message: &str) -> Result<String, CallError> {
        let url = &self.endpoints.enrich;
        let request = self.client.post(url.clone()).json(&EnrichRequest {
            bird_name,
            original_message,
        });
        let response = self.send(url, request).await?;
        let reply: LlmReply = read_json(url, response, ErrorField::Response).await?;
        Ok(reply.response)
    }
}

async fn read_json<T: DeserializeOwned>(
    url: &Url,
    response: Response,
    error_field: ErrorField,
) -> Result<T, CallError> {
    let status = response.status();

    if !status.is_success() {
        // A body that is not JSON still counts as an application error.
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let detail = extract_detail(&body, error_field);
        tracing::warn!(%url, %status, ?detail, "server returned an error");
        return Err(CallError::Application { status, detail });
    }

    response.json::<T>().await.map_err(|e| CallError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn extract_detail(body: &Value, field: ErrorField) -> Option<String> {
    match body.get(field.key())? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        // FastAPI validation errors carry a list here.
        other => Some(other.to_string()),
    }
}

fn file_part(upload: UploadRequest, mime: &str) -> Result<multipart::Part, CallError> {
    multipart::Part::bytes(upload.bytes)
        .file_name(upload.filename)
        .mime_str(mime)
        .map_err(|e| CallError::InvalidRequest {
            reason: e.to_string(),
        })
}
