//! REST client for the admin content API.
//!
//! Wraps the page, preview, workflow and history endpoints using
//! [`reqwest`]. Responses arrive in the backend's `{ "data": ... }`
//! envelope; errors as `{ "error": "...", "code": "..." }`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::IF_MATCH;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use lexcms_core::history::VersionHistoryEntry;
use lexcms_core::page::{validate_slug, DraftPayload, PageContent};
use lexcms_core::workflow::WorkflowRecord;

use crate::api::{BulkPublishOutcome, PagesApi, PreviewResponse, SaveOptions, ScheduleRequest};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// HTTP client for one admin backend.
pub struct HttpPagesApi {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
}

/// Standard success envelope. Bare bodies are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Data { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Data { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

impl HttpPagesApi {
    /// Create a client from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(
            client,
            config.api_url.clone(),
            config.api_token.clone(),
        ))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, api_token: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- private helpers ----

    fn page_url(&self, slug: &str, suffix: &str) -> Result<String, ClientError> {
        validate_slug(slug)?;
        Ok(format!("{}/pages/{slug}{suffix}", self.api_url))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn workflow_post(
        &self,
        slug: &str,
        action: &str,
        body: serde_json::Value,
    ) -> Result<WorkflowRecord, ClientError> {
        let url = self.page_url(slug, &format!("/workflow/{action}"))?;
        tracing::debug!(slug, action, "Sending workflow transition");
        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code. Conflicts become
    /// [`ClientError::Conflict`]; other failures carry the server message.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body);
        if status == StatusCode::CONFLICT || status == StatusCode::PRECONDITION_FAILED {
            return Err(ClientError::Conflict(message.unwrap_or_else(|| {
                "The page was changed by someone else. Reload to continue.".to_string()
            })));
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        decode_body(&bytes)
    }
}

/// Decode a success body, unwrapping the `data` envelope.
fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice::<Envelope<T>>(bytes)
        .map(Envelope::into_inner)
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{ "error": "..." }`, `{ "message": "..." }` and
/// `{ "error": { "message": "..." } }`; otherwise uses a short plain-text
/// body as is.
fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => {
            let candidates = [
                value.get("error").and_then(|e| e.as_str()),
                value.get("message").and_then(|m| m.as_str()),
                value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str()),
            ];
            candidates
                .into_iter()
                .flatten()
                .find(|s| !s.trim().is_empty())
                .map(str::to_string)
        }
        Err(_) if trimmed.len() <= 200 && !trimmed.starts_with('<') => Some(trimmed.to_string()),
        Err(_) => None,
    }
}

#[async_trait]
impl PagesApi for HttpPagesApi {
    async fn get_page(&self, slug: &str) -> Result<PageContent, ClientError> {
        let url = self.page_url(slug, "")?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::parse_response(response).await
    }

    async fn save_draft(
        &self,
        slug: &str,
        payload: &DraftPayload,
        opts: SaveOptions,
    ) -> Result<PageContent, ClientError> {
        let url = self.page_url(slug, "/draft")?;
        let mut body = payload.clone();
        if opts.status.is_some() {
            body.status = opts.status;
        }

        let mut request = self.authorize(self.client.put(url)).json(&body);
        if let Some(version) = opts.expected_version {
            request = request.header(IF_MATCH, format!("\"{version}\""));
        }

        tracing::debug!(
            slug,
            silent = opts.silent,
            blocks = body.content_blocks.len(),
            "Saving draft"
        );
        let response = request.send().await?;
        Self::parse_response(response).await
    }

    async fn request_preview(
        &self,
        slug: &str,
        payload: &DraftPayload,
    ) -> Result<PreviewResponse, ClientError> {
        let url = self.page_url(slug, "/preview")?;
        let response = self
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn request_approval(
        &self,
        slug: &str,
        draft_id: Option<&str>,
    ) -> Result<WorkflowRecord, ClientError> {
        self.workflow_post(
            slug,
            "request-approval",
            serde_json::json!({ "draft_id": draft_id }),
        )
        .await
    }

    async fn approve_and_publish(
        &self,
        slug: &str,
        draft_id: Option<&str>,
    ) -> Result<WorkflowRecord, ClientError> {
        self.workflow_post(slug, "approve", serde_json::json!({ "draft_id": draft_id }))
            .await
    }

    async fn reject(&self, slug: &str, notes: Option<&str>) -> Result<WorkflowRecord, ClientError> {
        self.workflow_post(slug, "reject", serde_json::json!({ "notes": notes }))
            .await
    }

    async fn publish_directly(&self, slug: &str) -> Result<WorkflowRecord, ClientError> {
        self.workflow_post(slug, "publish", serde_json::json!({})).await
    }

    async fn schedule_publish(
        &self,
        slug: &str,
        request: &ScheduleRequest,
    ) -> Result<WorkflowRecord, ClientError> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.workflow_post(slug, "schedule", body).await
    }

    async fn cancel_schedule(&self, slug: &str) -> Result<WorkflowRecord, ClientError> {
        self.workflow_post(slug, "cancel-schedule", serde_json::json!({}))
            .await
    }

    async fn get_history(&self, slug: &str) -> Result<Vec<VersionHistoryEntry>, ClientError> {
        let url = self.page_url(slug, "/history")?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::parse_response(response).await
    }

    async fn bulk_publish(&self, slugs: &[String]) -> Result<BulkPublishOutcome, ClientError> {
        for slug in slugs {
            validate_slug(slug)?;
        }
        let response = self
            .authorize(self.client.post(format!("{}/pages/bulk-publish", self.api_url)))
            .json(&serde_json::json!({ "slugs": slugs }))
            .send()
            .await?;
        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn error_message_from_error_field() {
        let body = r#"{"error":"Page is locked by another reviewer","code":"CONFLICT"}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Page is locked by another reviewer")
        );
    }

    #[test]
    fn error_message_from_message_field_or_nested() {
        assert_eq!(
            extract_error_message(r#"{"message":"Invalid block"}"#).as_deref(),
            Some("Invalid block")
        );
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"Nested"}}"#).as_deref(),
            Some("Nested")
        );
    }

    #[test]
    fn error_message_ignores_html_and_empty() {
        assert_eq!(extract_error_message(""), None);
        assert_eq!(extract_error_message("<html><body>502</body></html>"), None);
        assert_eq!(extract_error_message("Bad gateway").as_deref(), Some("Bad gateway"));
        assert_eq!(extract_error_message(r#"{"code":"X"}"#), None);
    }

    #[test]
    fn decode_unwraps_data_envelope() {
        let record: WorkflowRecord =
            decode_body(br#"{"data":{"state":"pendingReview","events":[]}}"#).unwrap();
        assert_eq!(record.state, lexcms_core::workflow::WorkflowState::PendingReview);
    }

    #[test]
    fn decode_accepts_bare_body() {
        let preview: PreviewResponse =
            decode_body(br#"{"preview_url":"https://site.test/preview/home?t=1"}"#).unwrap();
        assert_eq!(preview.preview_url.as_deref(), Some("https://site.test/preview/home?t=1"));
    }

    #[test]
    fn decode_failure_is_decode_error() {
        let result: Result<PageContent, _> = decode_body(b"[1,2,3]");
        assert_matches!(result, Err(ClientError::Decode(_)));
    }

    #[test]
    fn page_url_validates_slug() {
        let api = HttpPagesApi::with_client(
            reqwest::Client::new(),
            "http://localhost:3000/api/".into(),
            None,
        );
        assert_eq!(api.api_url(), "http://localhost:3000/api");
        assert_eq!(
            api.page_url("about-us", "/draft").unwrap(),
            "http://localhost:3000/api/pages/about-us/draft"
        );
        assert_matches!(api.page_url("../etc", ""), Err(ClientError::Core(_)));
    }
}
