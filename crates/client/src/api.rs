//! The content API contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lexcms_core::history::VersionHistoryEntry;
use lexcms_core::page::{DraftPayload, PageContent, PageStatus};
use lexcms_core::types::{Timestamp, Version};
use lexcms_core::workflow::{WorkflowAction, WorkflowRecord};

use crate::error::ClientError;

/// Options for [`PagesApi::save_draft`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Persist with this content status instead of `draft`.
    pub status: Option<PageStatus>,
    /// Background save; callers suppress the success notice.
    pub silent: bool,
    /// Version the draft was based on. Sent as `If-Match`; a mismatch is
    /// reported as [`ClientError::Conflict`].
    pub expected_version: Option<Version>,
}

/// Response of a preview request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub draft_id: Option<String>,
}

/// Body of a schedule request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_for: Timestamp,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub draft_id: Option<String>,
}

/// Result of a bulk publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkPublishOutcome {
    #[serde(default)]
    pub published: Vec<String>,
    #[serde(default)]
    pub failed: Vec<BulkPublishFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPublishFailure {
    pub slug: String,
    pub error: String,
}

/// Server operations the editor relies on.
#[async_trait]
pub trait PagesApi: Send + Sync {
    /// Fetch a page, creating an empty one on first reference.
    async fn get_page(&self, slug: &str) -> Result<PageContent, ClientError>;

    /// Persist title and blocks as a new draft version.
    async fn save_draft(
        &self,
        slug: &str,
        payload: &DraftPayload,
        opts: SaveOptions,
    ) -> Result<PageContent, ClientError>;

    /// Materialize a preview of `payload` without touching the saved page.
    async fn request_preview(
        &self,
        slug: &str,
        payload: &DraftPayload,
    ) -> Result<PreviewResponse, ClientError>;

    async fn request_approval(
        &self,
        slug: &str,
        draft_id: Option<&str>,
    ) -> Result<WorkflowRecord, ClientError>;

    async fn approve_and_publish(
        &self,
        slug: &str,
        draft_id: Option<&str>,
    ) -> Result<WorkflowRecord, ClientError>;

    /// Send a page under review back to draft.
    async fn reject(&self, slug: &str, notes: Option<&str>) -> Result<WorkflowRecord, ClientError>;

    async fn publish_directly(&self, slug: &str) -> Result<WorkflowRecord, ClientError>;

    async fn schedule_publish(
        &self,
        slug: &str,
        request: &ScheduleRequest,
    ) -> Result<WorkflowRecord, ClientError>;

    async fn cancel_schedule(&self, slug: &str) -> Result<WorkflowRecord, ClientError>;

    async fn get_history(&self, slug: &str) -> Result<Vec<VersionHistoryEntry>, ClientError>;

    async fn bulk_publish(&self, slugs: &[String]) -> Result<BulkPublishOutcome, ClientError>;
}

/// Send the request that corresponds to `action`.
pub async fn perform(
    api: &dyn PagesApi,
    slug: &str,
    action: &WorkflowAction,
    draft_id: Option<&str>,
) -> Result<WorkflowRecord, ClientError> {
    match action {
        WorkflowAction::RequestApproval => api.request_approval(slug, draft_id).await,
        WorkflowAction::ApproveAndPublish => api.approve_and_publish(slug, draft_id).await,
        WorkflowAction::Reject { notes } => api.reject(slug, notes.as_deref()).await,
        WorkflowAction::PublishDirectly => api.publish_directly(slug).await,
        WorkflowAction::SchedulePublish {
            scheduled_for,
            notes,
        } => {
            let request = ScheduleRequest {
                scheduled_for: *scheduled_for,
                notes: notes.clone(),
                draft_id: draft_id.map(str::to_string),
            };
            api.schedule_publish(slug, &request).await
        }
        WorkflowAction::CancelSchedule => api.cancel_schedule(slug).await,
    }
}
