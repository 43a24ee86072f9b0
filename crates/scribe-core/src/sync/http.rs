//! HTTP client for the notes API.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{CreatedNote, NoteServer};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NotePayload, Tag, TagId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const PROBE_TIMEOUT_SECS: u64 = 3;

/// [`NoteServer`] backed by the JSON notes API
#[derive(Clone)]
pub struct HttpNoteServer {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpNoteServer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpNoteServer")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpNoteServer {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Build a client from loaded configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = config
            .api_base_url
            .clone()
            .ok_or_else(|| Error::Config("api_base_url is not configured".to_string()))?;
        Self::new(
            base_url,
            config.api_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the server is reachable
    pub async fn probe(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Server probe failed: {error}");
                false
            }
        }
    }

    fn note_url(&self, id: &NoteId) -> String {
        format!(
            "{}/notes/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

impl NoteServer for HttpNoteServer {
    async fn create_note(&self, payload: &NotePayload) -> Result<CreatedNote> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/notes", self.base_url))
                    .json(&MutationBody::from(payload)),
            )
            .await?;

        let body = response.json::<MutationResponse>().await?;
        body.check()?;
        let id = body
            .id
            .and_then(|id| normalize_text_option(Some(id)))
            .ok_or_else(|| Error::Api {
                status: 200,
                message: "create response did not include an id".to_string(),
            })?;
        Ok(CreatedNote {
            id: NoteId::new(id),
        })
    }

    async fn update_note(&self, id: &NoteId, payload: &NotePayload) -> Result<()> {
        let response = self
            .send(
                self.client
                    .put(self.note_url(id))
                    .json(&MutationBody::from(payload)),
            )
            .await?;

        response.json::<MutationResponse>().await?.check()
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        self.send(self.client.delete(self.note_url(id))).await?;
        Ok(())
    }

    async fn fetch_note(&self, id: &NoteId) -> Result<Option<Note>> {
        match self.send(self.client.get(self.note_url(id))).await {
            Ok(response) => Ok(Some(response.json::<ServerNote>().await?.into())),
            Err(Error::Api { status: 404, .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn current_user(&self) -> Result<Option<String>> {
        let response = self
            .send(self.client.get(format!("{}/me", self.base_url)))
            .await?;
        let body = response.json::<CurrentUserResponse>().await?;
        Ok(normalize_text_option(body.user_id))
    }
}

/// Body of create/update requests. Tags go out both as a list and in the
/// comma-joined form accepted by form handlers.
#[derive(Debug, Serialize)]
struct MutationBody<'a> {
    title: &'a str,
    content: &'a str,
    category: Option<&'a str>,
    tags: &'a [String],
    tags_csv: String,
}

impl<'a> From<&'a NotePayload> for MutationBody<'a> {
    fn from(payload: &'a NotePayload) -> Self {
        Self {
            title: &payload.title,
            content: &payload.content,
            category: payload.category.as_deref(),
            tags: &payload.tags,
            tags_csv: payload.tags_csv(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

const fn default_success() -> bool {
    true
}

impl MutationResponse {
    fn check(&self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let message = self
            .message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "server reported failure".to_string());
        Err(Error::Api {
            status: 200,
            message: compact_text(&message),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerNote {
    id: String,
    title: String,
    content: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Vec<ServerTag>,
    #[serde(alias = "createdAt")]
    created_at: i64,
    #[serde(alias = "updatedAt")]
    updated_at: i64,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerTag {
    Named { id: String, name: String },
    Bare(String),
}

impl From<ServerNote> for Note {
    fn from(value: ServerNote) -> Self {
        Self {
            id: NoteId::new(value.id),
            title: value.title,
            content: value.content,
            category: normalize_text_option(value.category),
            tags: value
                .tags
                .into_iter()
                .map(|tag| match tag {
                    ServerTag::Named { id, name } => Tag {
                        id: TagId::new(id),
                        name,
                    },
                    ServerTag::Bare(name) => Tag::new(name),
                })
                .collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
            summary: normalize_text_option(value.summary),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
