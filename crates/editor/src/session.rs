//! One open page in the editor.
//!
//! [`EditorSession`] owns the [`PageDraft`] of a page and mediates every
//! request made on its behalf. Writes (autosave, manual save, workflow
//! transitions) share one in-flight slot, so they reach the server one at a
//! time in the order they were issued. Capability and state checks run
//! before anything is sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use lexcms_client::api::perform;
use lexcms_client::{PagesApi, SaveOptions};
use lexcms_core::draft::{DraftEdit, PageDraft};
use lexcms_core::error::CoreError;
use lexcms_core::history::{sorted_events, VersionHistoryEntry};
use lexcms_core::page::{PageContent, PageStatus};
use lexcms_core::permissions::{capabilities, require_any, PermissionOracle};
use lexcms_core::preview::resolve_preview_url;
use lexcms_core::types::Timestamp;
use lexcms_core::workflow::{
    self, ActionKind, WorkflowAction, WorkflowEvent, WorkflowRecord, WorkflowState, WorkflowView,
};

use crate::autosave::Autosaver;
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::notice::{Notice, NoticeBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveMode {
    Manual,
    Autosave,
    /// Flush before a workflow action; the action reports the outcome.
    Flush,
}

#[derive(Debug)]
struct SessionState {
    draft: PageDraft,
    page: PageContent,
    /// Saved edits the live page does not contain yet.
    unpublished: bool,
    history: Option<Vec<VersionHistoryEntry>>,
    preview_url: Option<String>,
}

struct SessionInner {
    slug: String,
    api: Arc<dyn PagesApi>,
    permissions: Arc<dyn PermissionOracle>,
    notices: NoticeBus,
    state: Mutex<SessionState>,
    write_slot: Mutex<()>,
    transition_pending: AtomicBool,
}

/// Editor for a single page.
pub struct EditorSession {
    inner: Arc<SessionInner>,
    autosaver: Option<Autosaver>,
}

impl EditorSession {
    /// Load `slug` and start autosave when the operator may edit.
    ///
    /// Fails without a request when the operator lacks `pages:view`.
    pub async fn open(
        slug: impl Into<String>,
        api: Arc<dyn PagesApi>,
        permissions: Arc<dyn PermissionOracle>,
        notices: NoticeBus,
        config: &EditorConfig,
    ) -> Result<Self, EditorError> {
        let slug = slug.into();
        require_any(permissions.as_ref(), &[capabilities::PAGES_VIEW], "viewing pages")?;

        let page = api.get_page(&slug).await?;
        tracing::debug!(slug = %slug, version = ?page.version, "Page loaded");

        let can_edit = permissions.can(capabilities::PAGES_EDIT);
        let inner = Arc::new(SessionInner {
            state: Mutex::new(SessionState {
                draft: PageDraft::load(&page),
                unpublished: has_unpublished_changes(&page),
                page,
                history: None,
                preview_url: None,
            }),
            slug,
            api,
            permissions,
            notices,
            write_slot: Mutex::new(()),
            transition_pending: AtomicBool::new(false),
        });

        let autosaver = (can_edit && config.autosave_enabled).then(|| {
            let session = Arc::clone(&inner);
            Autosaver::spawn(config.autosave_debounce, move || {
                let session = Arc::clone(&session);
                async move { session.autosave().await }
            })
        });

        Ok(Self { inner, autosaver })
    }

    pub fn slug(&self) -> &str {
        &self.inner.slug
    }

    /// Whether the operator may change this page.
    pub fn can_edit(&self) -> bool {
        self.inner.permissions.can(capabilities::PAGES_EDIT)
    }

    /// Copy of the current draft.
    pub async fn draft(&self) -> PageDraft {
        self.inner.state.lock().await.draft.clone()
    }

    /// Last page content received from the server.
    pub async fn page(&self) -> PageContent {
        self.inner.state.lock().await.page.clone()
    }

    pub async fn is_dirty(&self) -> bool {
        self.inner.state.lock().await.draft.is_dirty()
    }

    /// Apply an edit to the draft and restart the autosave timer.
    ///
    /// Read-only operators get a warning notice and the draft stays as it
    /// was. Nothing is sent to the server here.
    pub async fn mutate(&self, edit: DraftEdit) -> Result<(), EditorError> {
        self.inner.require_edit("editing")?;
        self.inner.state.lock().await.draft.mutate(edit)?;
        if let Some(autosaver) = &self.autosaver {
            autosaver.touch();
        }
        Ok(())
    }

    /// Save now, bypassing the debounce. Always reports the outcome.
    pub async fn save(&self) -> Result<(), EditorError> {
        self.save_as(None).await
    }

    /// Save with an explicit content status (e.g. `preview`).
    ///
    /// Saving as `published` makes the content live, so it needs
    /// `pages:publish` and content that would pass review.
    pub async fn save_as(&self, status: Option<PageStatus>) -> Result<(), EditorError> {
        self.inner.require_edit("saving")?;
        if status == Some(PageStatus::Published) {
            self.inner.require_publish()?;
            let reviewable = self.inner.state.lock().await.draft.validate_for_review();
            if let Err(e) = reviewable {
                let err = EditorError::from(e);
                self.inner
                    .notices
                    .publish(Notice::error(err.user_message("Failed to save draft")));
                return Err(err);
            }
        }
        match self.inner.persist(SaveMode::Manual, status).await {
            Ok(_) => {
                self.inner.notices.publish(Notice::success("Draft saved"));
                Ok(())
            }
            Err(e) => {
                tracing::error!(slug = %self.inner.slug, error = %e, "Draft save failed");
                self.inner
                    .notices
                    .publish(Notice::error(e.user_message("Failed to save draft")));
                Err(e)
            }
        }
    }

    // ---- workflow ----

    pub async fn workflow(&self) -> Option<WorkflowRecord> {
        self.inner.state.lock().await.page.workflow.clone()
    }

    pub async fn page_status(&self) -> PageStatus {
        self.inner.state.lock().await.page.status
    }

    /// Workflow state plus whether edits are waiting to go live.
    pub async fn workflow_view(&self) -> WorkflowView {
        let state = self.inner.state.lock().await;
        self.inner.view(&state)
    }

    /// Actions the operator can take right now.
    pub async fn available_actions(&self) -> Vec<ActionKind> {
        let view = self.workflow_view().await;
        workflow::available_actions(&view, self.inner.permissions.as_ref())
    }

    pub async fn request_approval(&self) -> Result<WorkflowRecord, EditorError> {
        self.run_action(WorkflowAction::RequestApproval).await
    }

    pub async fn approve_and_publish(&self) -> Result<WorkflowRecord, EditorError> {
        self.run_action(WorkflowAction::ApproveAndPublish).await
    }

    /// Send a page under review back to draft.
    pub async fn reject(&self, notes: Option<String>) -> Result<WorkflowRecord, EditorError> {
        self.run_action(WorkflowAction::Reject { notes }).await
    }

    pub async fn publish_directly(&self) -> Result<WorkflowRecord, EditorError> {
        self.run_action(WorkflowAction::PublishDirectly).await
    }

    pub async fn schedule_publish(
        &self,
        scheduled_for: Timestamp,
        notes: Option<String>,
    ) -> Result<WorkflowRecord, EditorError> {
        self.run_action(WorkflowAction::SchedulePublish {
            scheduled_for,
            notes,
        })
        .await
    }

    pub async fn cancel_schedule(&self) -> Result<WorkflowRecord, EditorError> {
        self.run_action(WorkflowAction::CancelSchedule).await
    }

    /// Check, send and record one workflow transition.
    ///
    /// Capability, state and content checks run first; a failed check never
    /// reaches the server. Unsaved edits are flushed before content goes to
    /// review or live. On failure the local state is left as it was.
    pub async fn run_action(&self, action: WorkflowAction) -> Result<WorkflowRecord, EditorError> {
        let inner = &self.inner;
        let kind = action.kind();

        if let Err(e) = workflow::authorize(inner.permissions.as_ref(), kind) {
            let err = EditorError::from(e);
            inner.notices.publish(Notice::warning(err.user_message("Read-only")));
            return Err(err);
        }

        let result = inner.transition(&action).await;
        match &result {
            Ok(record) => {
                tracing::info!(slug = %inner.slug, action = %kind, state = %record.state, "Workflow updated");
                inner.notices.publish(Notice::success(success_message(&action)));
            }
            Err(EditorError::TransitionPending) => {
                inner.notices.publish(Notice::info(EditorError::TransitionPending.to_string()));
            }
            Err(e) => {
                tracing::warn!(slug = %inner.slug, action = %kind, error = %e, "Workflow action failed");
                inner
                    .notices
                    .publish(Notice::error(e.user_message(&format!("Failed to {}", kind.label()))));
            }
        }
        result
    }

    // ---- preview ----

    /// Ask the server to render the current draft and return the URL to
    /// open. Never changes the page status or workflow state.
    ///
    /// With `silent` set only failures are reported.
    pub async fn request_preview(&self, silent: bool) -> Result<String, EditorError> {
        let inner = &self.inner;
        let (payload, draft_id) = {
            let state = inner.state.lock().await;
            (
                state.draft.payload(None),
                state.page.workflow.as_ref().and_then(|w| w.draft_id.clone()),
            )
        };

        let response = match inner.api.request_preview(&inner.slug, &payload).await {
            Ok(response) => response,
            Err(e) => {
                let err = EditorError::from(e);
                tracing::warn!(slug = %inner.slug, error = %err, "Preview request failed");
                if !silent {
                    inner
                        .notices
                        .publish(Notice::error(err.user_message("Failed to generate preview")));
                }
                return Err(err);
            }
        };

        let url = resolve_preview_url(
            response.preview_url.as_deref(),
            &inner.slug,
            response.draft_id.as_deref().or(draft_id.as_deref()),
        );
        inner.state.lock().await.preview_url = Some(url.clone());
        if !silent {
            inner.notices.publish(Notice::success("Preview ready"));
        }
        Ok(url)
    }

    /// Refresh the preview silently and return its URL. Failures become an
    /// error notice and `None`.
    pub async fn open_preview(&self) -> Option<String> {
        match self.request_preview(true).await {
            Ok(url) => Some(url),
            Err(e) => {
                self.inner
                    .notices
                    .publish(Notice::error(e.user_message("Failed to open preview")));
                None
            }
        }
    }

    /// URL of the most recent successful preview.
    pub async fn preview_url(&self) -> Option<String> {
        self.inner.state.lock().await.preview_url.clone()
    }

    // ---- history ----

    /// Saved versions, newest first. Cached until the next write unless
    /// `refresh` is set.
    pub async fn history(&self, refresh: bool) -> Result<Vec<VersionHistoryEntry>, EditorError> {
        let inner = &self.inner;
        if !refresh {
            if let Some(cached) = inner.state.lock().await.history.clone() {
                return Ok(cached);
            }
        }

        match inner.api.get_history(&inner.slug).await {
            Ok(versions) => {
                inner.state.lock().await.history = Some(versions.clone());
                Ok(versions)
            }
            Err(e) => {
                let err = EditorError::from(e);
                inner
                    .notices
                    .publish(Notice::error(err.user_message("Failed to load history")));
                Err(err)
            }
        }
    }

    /// Workflow events in chronological order.
    pub async fn events(&self) -> Vec<WorkflowEvent> {
        let state = self.inner.state.lock().await;
        state
            .page
            .workflow
            .as_ref()
            .map(|w| sorted_events(&w.events).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    // ---- lifecycle ----

    /// Fetch the page again and discard local edits.
    pub async fn reload(&self) -> Result<(), EditorError> {
        let inner = &self.inner;
        let _slot = inner.write_slot.lock().await;
        let page = inner.api.get_page(&inner.slug).await?;
        let mut state = inner.state.lock().await;
        state.draft.reload(&page);
        state.unpublished = has_unpublished_changes(&page);
        state.page = page;
        state.history = None;
        Ok(())
    }

    /// Stop autosave. A pending timer is dropped; a save that already
    /// started still completes.
    pub async fn close(mut self) {
        if let Some(autosaver) = self.autosaver.take() {
            autosaver.shutdown().await;
        }
        tracing::debug!(slug = %self.inner.slug, "Editor session closed");
    }
}

impl SessionInner {
    fn require_edit(&self, action: &str) -> Result<(), EditorError> {
        require_any(self.permissions.as_ref(), &[capabilities::PAGES_EDIT], action).map_err(|e| {
            let err = EditorError::from(e);
            self.notices.publish(Notice::warning(err.user_message("Read-only")));
            err
        })
    }

    fn require_publish(&self) -> Result<(), EditorError> {
        require_any(
            self.permissions.as_ref(),
            &[capabilities::PAGES_PUBLISH],
            "saving as published",
        )
        .map_err(|e| {
            let err = EditorError::from(e);
            self.notices.publish(Notice::warning(err.user_message("Read-only")));
            err
        })
    }

    fn view(&self, state: &SessionState) -> WorkflowView {
        WorkflowView::new(
            state.page.workflow.as_ref(),
            state.unpublished || state.draft.is_dirty(),
        )
    }

    /// Send the draft through the write slot.
    ///
    /// Returns `false` when an autosave found nothing to do.
    async fn persist(&self, mode: SaveMode, status: Option<PageStatus>) -> Result<bool, EditorError> {
        let _slot = self.write_slot.lock().await;

        let (payload, snapshot, expected_version) = {
            let state = self.state.lock().await;
            if mode != SaveMode::Manual && !state.draft.is_dirty() {
                return Ok(false);
            }
            state.draft.validate()?;
            (
                state.draft.payload(status),
                state.draft.snapshot(),
                state.page.version,
            )
        };

        let opts = SaveOptions {
            status,
            silent: mode == SaveMode::Autosave,
            expected_version,
        };
        let saved = self.api.save_draft(&self.slug, &payload, opts).await?;
        tracing::info!(slug = %self.slug, version = ?saved.version, mode = ?mode, "Draft saved");

        let mut state = self.state.lock().await;
        state.draft.mark_saved(snapshot);
        state.unpublished = true;
        state.history = None;
        state.page = saved;
        Ok(true)
    }

    async fn autosave(&self) {
        match self.persist(SaveMode::Autosave, None).await {
            Ok(true) => self.notices.publish(Notice::info("Draft autosaved").silent()),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(slug = %self.slug, error = %e, "Autosave failed");
                self.notices.publish(
                    Notice::warning(format!("Autosave failed: {}", e.user_message("request failed")))
                        .silent(),
                );
            }
        }
    }

    async fn transition(&self, action: &WorkflowAction) -> Result<WorkflowRecord, EditorError> {
        let (dirty, draft_id) = {
            let state = self.state.lock().await;
            let view = self.view(&state);
            workflow::check(action, &view, Utc::now())?;
            if matches!(action, WorkflowAction::ApproveAndPublish) && state.draft.is_dirty() {
                return Err(CoreError::Conflict(
                    "Unsaved edits have not been reviewed; save or discard them before approving"
                        .into(),
                )
                .into());
            }
            if needs_review_content(action) {
                state.draft.validate_for_review()?;
            }
            (
                state.draft.is_dirty(),
                state.page.workflow.as_ref().and_then(|w| w.draft_id.clone()),
            )
        };

        let _pending = PendingGuard::acquire(&self.transition_pending)?;

        let draft_id = if dirty && flushes_draft(action) {
            self.require_edit("saving")?;
            self.persist(SaveMode::Flush, None).await?;
            let state = self.state.lock().await;
            state.page.workflow.as_ref().and_then(|w| w.draft_id.clone())
        } else {
            draft_id
        };

        let record = {
            let _slot = self.write_slot.lock().await;
            perform(self.api.as_ref(), &self.slug, action, draft_id.as_deref()).await?
        };

        // Pick up the version and status the transition produced.
        let refreshed = match self.api.get_page(&self.slug).await {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::warn!(slug = %self.slug, error = %e, "Failed to refresh page after transition");
                None
            }
        };

        let mut state = self.state.lock().await;
        if let Some(page) = refreshed {
            state.page = page;
        }
        if record.state == WorkflowState::Published {
            state.page.status = PageStatus::Published;
            state.unpublished = false;
        }
        state.page.workflow = Some(record.clone());
        state.history = None;
        Ok(record)
    }
}

/// Clears the transition flag when the action finishes, however it ends.
struct PendingGuard<'a>(&'a AtomicBool);

impl<'a> PendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, EditorError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EditorError::TransitionPending)?;
        Ok(Self(flag))
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A page whose workflow says published but whose content status does not
/// has saved edits that are not live yet.
fn has_unpublished_changes(page: &PageContent) -> bool {
    match page.workflow.as_ref().map(|w| w.state) {
        Some(WorkflowState::Published) => page.status != PageStatus::Published,
        _ => false,
    }
}

/// Actions that take the current content toward going live.
fn needs_review_content(action: &WorkflowAction) -> bool {
    matches!(
        action,
        WorkflowAction::RequestApproval
            | WorkflowAction::ApproveAndPublish
            | WorkflowAction::PublishDirectly
            | WorkflowAction::SchedulePublish { .. }
    )
}

/// Approval publishes what was reviewed, so it never flushes local edits.
fn flushes_draft(action: &WorkflowAction) -> bool {
    needs_review_content(action) && !matches!(action, WorkflowAction::ApproveAndPublish)
}

fn success_message(action: &WorkflowAction) -> String {
    match action {
        WorkflowAction::RequestApproval => "Submitted for review".into(),
        WorkflowAction::ApproveAndPublish => "Approved and published".into(),
        WorkflowAction::Reject { .. } => "Sent back to draft".into(),
        WorkflowAction::PublishDirectly => "Published".into(),
        WorkflowAction::SchedulePublish { scheduled_for, .. } => {
            format!("Scheduled for {}", scheduled_for.format("%Y-%m-%d %H:%M UTC"))
        }
        WorkflowAction::CancelSchedule => "Schedule cancelled".into(),
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("slug", &self.inner.slug)
            .field("autosave", &self.autosaver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_workflow_with_draft_status_has_changes() {
        let mut page = PageContent::new("home");
        page.workflow = Some(WorkflowRecord {
            state: WorkflowState::Published,
            ..Default::default()
        });
        assert!(has_unpublished_changes(&page));

        page.status = PageStatus::Published;
        assert!(!has_unpublished_changes(&page));
    }

    #[test]
    fn pending_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        {
            let _guard = PendingGuard::acquire(&flag).unwrap();
            assert!(matches!(
                PendingGuard::acquire(&flag),
                Err(EditorError::TransitionPending)
            ));
        }
        assert!(PendingGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn approval_checks_content_but_never_flushes() {
        assert!(needs_review_content(&WorkflowAction::ApproveAndPublish));
        assert!(!needs_review_content(&WorkflowAction::CancelSchedule));
    }

    #[test]
    fn only_content_actions_flush() {
        assert!(flushes_draft(&WorkflowAction::RequestApproval));
        assert!(flushes_draft(&WorkflowAction::PublishDirectly));
        assert!(!flushes_draft(&WorkflowAction::ApproveAndPublish));
        assert!(!flushes_draft(&WorkflowAction::CancelSchedule));
        assert!(!flushes_draft(&WorkflowAction::Reject { notes: None }));
    }
}
