//! In-process implementation of the content API.
//!
//! Applies the same workflow rules as the backend (via
//! [`lexcms_core::workflow::apply`]), versions every save and records each
//! call so tests can assert on traffic. Failures and latency can be injected.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use lexcms_core::error::CoreError;
use lexcms_core::history::VersionHistoryEntry;
use lexcms_core::page::{validate_slug, DraftPayload, PageContent, PageStatus};
use lexcms_core::workflow::{self, TransitionContext, WorkflowAction, WorkflowRecord, WorkflowState};

use crate::api::{
    BulkPublishFailure, BulkPublishOutcome, PagesApi, PreviewResponse, SaveOptions, ScheduleRequest,
};
use crate::error::ClientError;

#[derive(Debug, Default)]
struct StoredPage {
    page: Option<PageContent>,
    versions: Vec<VersionHistoryEntry>,
    has_unpublished_changes: bool,
}

#[derive(Debug, Default)]
struct State {
    pages: HashMap<String, StoredPage>,
    calls: Vec<String>,
    saved_payloads: Vec<DraftPayload>,
    failures: VecDeque<ClientError>,
}

/// Content API backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryPagesApi {
    state: Mutex<State>,
    actor: Option<String>,
    preview_base: Option<String>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryPagesApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name recorded as actor on workflow events and as version editor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Return preview URLs under this origin instead of leaving the URL to
    /// the caller.
    pub fn with_preview_base(mut self, base: impl Into<String>) -> Self {
        self.preview_base = Some(base.into());
        self
    }

    /// Delay every request by `latency` (uses `tokio::time`, so paused test
    /// clocks apply).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a page.
    pub fn insert_page(&self, page: PageContent) {
        let mut state = self.lock();
        let stored = state.pages.entry(page.slug.clone()).or_default();
        stored.page = Some(page);
    }

    /// Make the next request fail with `error`.
    pub fn fail_next(&self, error: ClientError) {
        self.lock().failures.push_back(error);
    }

    /// Names of all operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    /// Every payload passed to `save_draft`, in order.
    pub fn saved_payloads(&self) -> Vec<DraftPayload> {
        self.lock().saved_payloads.clone()
    }

    /// Highest number of requests that were in progress at the same time.
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current server copy of a page, without recording a call.
    pub fn page(&self, slug: &str) -> Option<PageContent> {
        self.lock().pages.get(slug).and_then(|s| s.page.clone())
    }

    // ---- private helpers ----

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic in a test while holding the lock must not cascade.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call, simulate latency and pop an injected failure.
    async fn enter(&self, operation: &str) -> Result<InFlight<'_>, ClientError> {
        let failure = {
            let mut state = self.lock();
            state.calls.push(operation.to_string());
            state.failures.pop_front()
        };

        let guard = InFlight::new(&self.in_flight, &self.max_in_flight);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(guard),
        }
    }

    fn transition(&self, slug: &str, action: &WorkflowAction) -> Result<WorkflowRecord, ClientError> {
        validate_slug(slug)?;
        let now = Utc::now();
        let mut state = self.lock();
        let stored = state.pages.entry(slug.to_string()).or_default();
        let page = stored.page.get_or_insert_with(|| new_page(slug));
        let record = page.workflow.clone().unwrap_or_default();

        let next = workflow::apply(
            &record,
            action,
            TransitionContext {
                actor: self.actor.as_deref(),
                now,
                has_unpublished_changes: stored.has_unpublished_changes,
            },
        )
        .map_err(server_error)?;

        if next.state == WorkflowState::Published {
            page.status = PageStatus::Published;
            let version = page.version.unwrap_or(0) + 1;
            page.version = Some(version);
            page.updated_at = Some(now);
            stored.has_unpublished_changes = false;
            stored.versions.push(VersionHistoryEntry {
                version,
                status: PageStatus::Published,
                editor: self.actor.clone(),
                created_at: now,
                updated_at: None,
                notes: None,
            });
        }

        page.workflow = Some(next.clone());
        Ok(next)
    }
}

/// Tracks concurrent requests for [`InMemoryPagesApi::max_concurrent_requests`].
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn new(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn new_page(slug: &str) -> PageContent {
    let mut page = PageContent::new(slug);
    page.workflow = Some(WorkflowRecord::default());
    page
}

/// Map a rule violation to what the backend would answer.
fn server_error(err: CoreError) -> ClientError {
    let status = match &err {
        CoreError::NotFound { .. } => 404,
        CoreError::Validation(_) => 422,
        CoreError::Conflict(_) => 409,
        CoreError::Forbidden(_) => 403,
    };
    let message = match err {
        CoreError::Validation(msg)
        | CoreError::Conflict(msg)
        | CoreError::Forbidden(msg) => msg,
        other => other.to_string(),
    };
    ClientError::Api {
        status,
        message: Some(message),
    }
}

#[async_trait]
impl PagesApi for InMemoryPagesApi {
    async fn get_page(&self, slug: &str) -> Result<PageContent, ClientError> {
        let _guard = self.enter("get_page").await?;
        validate_slug(slug)?;
        let mut state = self.lock();
        let stored = state.pages.entry(slug.to_string()).or_default();
        Ok(stored.page.get_or_insert_with(|| new_page(slug)).clone())
    }

    async fn save_draft(
        &self,
        slug: &str,
        payload: &DraftPayload,
        opts: SaveOptions,
    ) -> Result<PageContent, ClientError> {
        let _guard = self.enter("save_draft").await?;
        validate_slug(slug)?;
        let now = Utc::now();
        let mut state = self.lock();
        state.saved_payloads.push(payload.clone());

        let stored = state.pages.entry(slug.to_string()).or_default();
        let page = stored.page.get_or_insert_with(|| new_page(slug));

        if let Some(expected) = opts.expected_version {
            if page.version != Some(expected) {
                return Err(ClientError::Conflict(format!(
                    "Page '{slug}' is at version {} but the draft was based on version {expected}",
                    page.version.unwrap_or(0)
                )));
            }
        }

        let version = page.version.unwrap_or(0) + 1;
        let status = opts.status.or(payload.status).unwrap_or(PageStatus::Draft);
        page.title = payload.title.clone();
        page.content_blocks = payload.content_blocks.clone();
        page.status = status;
        page.version = Some(version);
        page.updated_at = Some(now);
        page.workflow
            .get_or_insert_with(WorkflowRecord::default)
            .draft_id = Some(uuid::Uuid::new_v4().to_string());

        stored.has_unpublished_changes = true;
        stored.versions.push(VersionHistoryEntry {
            version,
            status,
            editor: self.actor.clone(),
            created_at: now,
            updated_at: None,
            notes: opts.silent.then(|| "autosave".to_string()),
        });

        Ok(page.clone())
    }

    async fn request_preview(
        &self,
        slug: &str,
        _payload: &DraftPayload,
    ) -> Result<PreviewResponse, ClientError> {
        let _guard = self.enter("request_preview").await?;
        validate_slug(slug)?;
        let token = uuid::Uuid::new_v4().simple().to_string();
        Ok(PreviewResponse {
            preview_url: self
                .preview_base
                .as_ref()
                .map(|base| format!("{base}/preview/{slug}?token={token}")),
            draft_id: None,
        })
    }

    async fn request_approval(
        &self,
        slug: &str,
        _draft_id: Option<&str>,
    ) -> Result<WorkflowRecord, ClientError> {
        let _guard = self.enter("request_approval").await?;
        self.transition(slug, &WorkflowAction::RequestApproval)
    }

    async fn approve_and_publish(
        &self,
        slug: &str,
        _draft_id: Option<&str>,
    ) -> Result<WorkflowRecord, ClientError> {
        let _guard = self.enter("approve_and_publish").await?;
        self.transition(slug, &WorkflowAction::ApproveAndPublish)
    }

    async fn reject(&self, slug: &str, notes: Option<&str>) -> Result<WorkflowRecord, ClientError> {
        let _guard = self.enter("reject").await?;
        self.transition(
            slug,
            &WorkflowAction::Reject {
                notes: notes.map(str::to_string),
            },
        )
    }

    async fn publish_directly(&self, slug: &str) -> Result<WorkflowRecord, ClientError> {
        let _guard = self.enter("publish_directly").await?;
        self.transition(slug, &WorkflowAction::PublishDirectly)
    }

    async fn schedule_publish(
        &self,
        slug: &str,
        request: &ScheduleRequest,
    ) -> Result<WorkflowRecord, ClientError> {
        let _guard = self.enter("schedule_publish").await?;
        self.transition(
            slug,
            &WorkflowAction::SchedulePublish {
                scheduled_for: request.scheduled_for,
                notes: request.notes.clone(),
            },
        )
    }

    async fn cancel_schedule(&self, slug: &str) -> Result<WorkflowRecord, ClientError> {
        let _guard = self.enter("cancel_schedule").await?;
        self.transition(slug, &WorkflowAction::CancelSchedule)
    }

    async fn get_history(&self, slug: &str) -> Result<Vec<VersionHistoryEntry>, ClientError> {
        let _guard = self.enter("get_history").await?;
        validate_slug(slug)?;
        let state = self.lock();
        // Newest first, like the backend.
        Ok(state
            .pages
            .get(slug)
            .map(|s| s.versions.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn bulk_publish(&self, slugs: &[String]) -> Result<BulkPublishOutcome, ClientError> {
        let _guard = self.enter("bulk_publish").await?;
        let mut outcome = BulkPublishOutcome::default();
        for slug in slugs {
            let known = self.lock().pages.contains_key(slug);
            let result = if known {
                self.transition(slug, &WorkflowAction::PublishDirectly)
            } else {
                Err(server_error(CoreError::NotFound {
                    entity: "page",
                    id: slug.clone(),
                }))
            };
            match result {
                Ok(_) => outcome.published.push(slug.clone()),
                Err(e) => outcome.failed.push(BulkPublishFailure {
                    slug: slug.clone(),
                    error: e.user_message("Publish failed"),
                }),
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use lexcms_core::content::ContentBlock;
    use lexcms_core::locale::Localized;
    use lexcms_core::workflow::EventKind;

    use super::*;

    fn payload() -> DraftPayload {
        DraftPayload {
            title: Localized::new(Some("About".into()), Some("من نحن".into())),
            content_blocks: vec![ContentBlock::text("intro", "Since 1998", "منذ ١٩٩٨")],
            status: None,
        }
    }

    #[tokio::test]
    async fn first_reference_creates_page() {
        let api = InMemoryPagesApi::new();
        let page = api.get_page("about").await.unwrap();
        assert_eq!(page.slug, "about");
        assert_eq!(page.status, PageStatus::Draft);
        assert_eq!(page.workflow.unwrap().state, WorkflowState::Draft);
    }

    #[tokio::test]
    async fn save_versions_the_page() {
        let api = InMemoryPagesApi::new().with_actor("omar");
        let saved = api
            .save_draft("about", &payload(), SaveOptions::default())
            .await
            .unwrap();
        assert_eq!(saved.version, Some(1));
        assert!(saved.workflow.unwrap().draft_id.is_some());

        let history = api.get_history("about").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].editor.as_deref(), Some("omar"));
    }

    #[tokio::test]
    async fn stale_version_is_conflict() {
        let api = InMemoryPagesApi::new();
        api.save_draft("about", &payload(), SaveOptions::default())
            .await
            .unwrap();
        let opts = SaveOptions {
            expected_version: Some(0),
            ..Default::default()
        };
        let result = api.save_draft("about", &payload(), opts).await;
        assert_matches!(result, Err(ClientError::Conflict(_)));
    }

    #[tokio::test]
    async fn illegal_transition_is_409_with_message() {
        let api = InMemoryPagesApi::new();
        let err = api.approve_and_publish("about", None).await.unwrap_err();
        assert_matches!(err, ClientError::Api { status: 409, message: Some(ref m) } if m.contains("pendingReview"));
    }

    #[tokio::test]
    async fn approve_publishes_page() {
        let api = InMemoryPagesApi::new();
        api.save_draft("about", &payload(), SaveOptions::default())
            .await
            .unwrap();
        api.request_approval("about", None).await.unwrap();
        let record = api.approve_and_publish("about", None).await.unwrap();
        let kinds: Vec<_> = record.events.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Submitted, EventKind::Approved, EventKind::Published]
        );
        assert_eq!(api.page("about").unwrap().status, PageStatus::Published);
    }

    #[tokio::test]
    async fn injected_failure_is_returned_once() {
        let api = InMemoryPagesApi::new();
        api.fail_next(ClientError::Api {
            status: 503,
            message: None,
        });
        assert!(api.get_page("home").await.is_err());
        assert!(api.get_page("home").await.is_ok());
        assert_eq!(api.call_count("get_page"), 2);
    }

    #[tokio::test]
    async fn bulk_publish_reports_unknown_pages() {
        let api = InMemoryPagesApi::new();
        api.insert_page(PageContent::new("home"));
        let outcome = api
            .bulk_publish(&["home".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.published, vec!["home"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].slug, "ghost");
    }

    #[tokio::test]
    async fn preview_does_not_touch_page() {
        let api = InMemoryPagesApi::new().with_preview_base("https://site.test");
        api.insert_page(PageContent::new("home"));
        let before = api.page("home");
        let preview = api.request_preview("home", &payload()).await.unwrap();
        assert!(preview
            .preview_url
            .unwrap()
            .starts_with("https://site.test/preview/home?token="));
        assert_eq!(api.page("home"), before);
    }
}
