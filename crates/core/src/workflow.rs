//! Page publishing workflow: states, actions and the transition rules.
//!
//! ```text
//! draft ──request approval──▶ pendingReview ──approve──▶ published
//!   ▲                            │    │
//!   └──────────reject────────────┘    └──schedule──▶ scheduled ──cancel──▶ draft / pendingReview
//! ```
//!
//! Publishing directly and scheduling are allowed from any state for
//! operators holding the matching capability. This module lives in `core`
//! so the editor (local precondition checks) and the in-memory backend
//! (authoritative transitions) share one definition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::permissions::{capabilities, require_any, PermissionOracle};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowState {
    #[default]
    Draft,
    PendingReview,
    Scheduled,
    Published,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Draft => "draft",
            WorkflowState::PendingReview => "pendingReview",
            WorkflowState::Scheduled => "scheduled",
            WorkflowState::Published => "published",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind of an audit-trail event. Unknown server values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Submitted,
    Reviewed,
    Approved,
    Rejected,
    Published,
    Scheduled,
    Cancelled,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Submitted => "submitted",
            EventKind::Reviewed => "reviewed",
            EventKind::Approved => "approved",
            EventKind::Rejected => "rejected",
            EventKind::Published => "published",
            EventKind::Scheduled => "scheduled",
            EventKind::Cancelled => "cancelled",
            EventKind::Other(s) => s,
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "submitted" => EventKind::Submitted,
            "reviewed" => EventKind::Reviewed,
            "approved" => EventKind::Approved,
            "rejected" => EventKind::Rejected,
            "published" => EventKind::Published,
            "scheduled" => EventKind::Scheduled,
            "cancelled" => EventKind::Cancelled,
            _ => EventKind::Other(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// One entry of a page's append-only workflow audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WorkflowEvent {
    pub fn new(kind: EventKind, timestamp: Timestamp) -> Self {
        Self {
            kind,
            timestamp,
            actor: None,
            notes: None,
        }
    }

    pub fn with_actor(mut self, actor: Option<&str>) -> Self {
        self.actor = actor.map(str::to_string);
        self
    }

    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.notes = notes.map(str::to_string);
        self
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Server-owned workflow state of one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowRecord {
    #[serde(default)]
    pub state: WorkflowState,
    #[serde(default)]
    pub draft_id: Option<String>,
    /// Only present while `state` is `scheduled`.
    #[serde(default)]
    pub scheduled_for: Option<Timestamp>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub events: Vec<WorkflowEvent>,
}

impl WorkflowRecord {
    pub fn new(draft_id: Option<String>) -> Self {
        Self {
            draft_id,
            ..Default::default()
        }
    }

    /// Whether a review was outstanding when the page was last scheduled.
    ///
    /// Replays the audit trail, so a page scheduled straight from review
    /// returns to review when the schedule is cancelled.
    pub fn review_was_pending(&self) -> bool {
        let mut state = WorkflowState::Draft;
        let mut before_schedule = WorkflowState::Draft;
        for event in &self.events {
            match event.kind {
                EventKind::Submitted => state = WorkflowState::PendingReview,
                EventKind::Rejected => state = WorkflowState::Draft,
                EventKind::Published => state = WorkflowState::Published,
                EventKind::Scheduled => {
                    if state != WorkflowState::Scheduled {
                        before_schedule = state;
                    }
                    state = WorkflowState::Scheduled;
                }
                EventKind::Cancelled => {
                    state = if before_schedule == WorkflowState::PendingReview {
                        WorkflowState::PendingReview
                    } else {
                        WorkflowState::Draft
                    };
                }
                EventKind::Reviewed | EventKind::Approved | EventKind::Other(_) => {}
            }
        }
        before_schedule == WorkflowState::PendingReview
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Data-free tag of a [`WorkflowAction`], used for capability lookups and
/// for listing the actions a UI should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    RequestApproval,
    ApproveAndPublish,
    Reject,
    PublishDirectly,
    SchedulePublish,
    CancelSchedule,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::RequestApproval,
        ActionKind::ApproveAndPublish,
        ActionKind::Reject,
        ActionKind::PublishDirectly,
        ActionKind::SchedulePublish,
        ActionKind::CancelSchedule,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::RequestApproval => "request approval",
            ActionKind::ApproveAndPublish => "approve and publish",
            ActionKind::Reject => "reject",
            ActionKind::PublishDirectly => "publish",
            ActionKind::SchedulePublish => "schedule publish",
            ActionKind::CancelSchedule => "cancel schedule",
        }
    }

    /// Capabilities of which the actor needs at least one.
    pub fn required_capabilities(self) -> &'static [&'static str] {
        match self {
            ActionKind::RequestApproval => &[capabilities::PAGES_EDIT],
            ActionKind::ApproveAndPublish | ActionKind::Reject => &[capabilities::PAGES_APPROVE],
            ActionKind::PublishDirectly => &[capabilities::PAGES_PUBLISH],
            ActionKind::SchedulePublish => &[capabilities::PAGES_SCHEDULE],
            ActionKind::CancelSchedule => &[
                capabilities::PAGES_SCHEDULE,
                capabilities::PAGES_APPROVE,
                capabilities::PAGES_PUBLISH,
            ],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user-initiated workflow transition.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    RequestApproval,
    ApproveAndPublish,
    Reject { notes: Option<String> },
    PublishDirectly,
    SchedulePublish {
        scheduled_for: Timestamp,
        notes: Option<String>,
    },
    CancelSchedule,
}

impl WorkflowAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            WorkflowAction::RequestApproval => ActionKind::RequestApproval,
            WorkflowAction::ApproveAndPublish => ActionKind::ApproveAndPublish,
            WorkflowAction::Reject { .. } => ActionKind::Reject,
            WorkflowAction::PublishDirectly => ActionKind::PublishDirectly,
            WorkflowAction::SchedulePublish { .. } => ActionKind::SchedulePublish,
            WorkflowAction::CancelSchedule => ActionKind::CancelSchedule,
        }
    }
}

// ---------------------------------------------------------------------------
// View and rules
// ---------------------------------------------------------------------------

/// Workflow state as seen by an editor, including whether there are edits
/// that the published version does not contain yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowView {
    pub state: WorkflowState,
    pub has_unpublished_changes: bool,
}

impl WorkflowView {
    pub fn new(record: Option<&WorkflowRecord>, has_unpublished_changes: bool) -> Self {
        Self {
            state: record.map(|r| r.state).unwrap_or_default(),
            has_unpublished_changes,
        }
    }

    /// A published page with new edits starts a fresh draft cycle.
    pub fn effective_state(&self) -> WorkflowState {
        match self.state {
            WorkflowState::Published if self.has_unpublished_changes => WorkflowState::Draft,
            state => state,
        }
    }
}

/// Check the state precondition of `action`.
pub fn check(action: &WorkflowAction, view: &WorkflowView, now: Timestamp) -> Result<(), CoreError> {
    let kind = action.kind();
    match action {
        WorkflowAction::RequestApproval => {
            require_state(kind, view.effective_state(), WorkflowState::Draft)
        }
        WorkflowAction::ApproveAndPublish | WorkflowAction::Reject { .. } => {
            require_state(kind, view.state, WorkflowState::PendingReview)
        }
        WorkflowAction::CancelSchedule => require_state(kind, view.state, WorkflowState::Scheduled),
        WorkflowAction::PublishDirectly => Ok(()),
        WorkflowAction::SchedulePublish { scheduled_for, .. } => {
            if *scheduled_for <= now {
                return Err(CoreError::Validation(format!(
                    "Scheduled time {} must be in the future",
                    scheduled_for.to_rfc3339()
                )));
            }
            Ok(())
        }
    }
}

fn require_state(
    kind: ActionKind,
    current: WorkflowState,
    required: WorkflowState,
) -> Result<(), CoreError> {
    if current == required {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Invalid transition: {kind} requires state {required} (current: {current})"
        )))
    }
}

/// Check that the oracle grants a capability for `kind`.
pub fn authorize(oracle: &dyn PermissionOracle, kind: ActionKind) -> Result<(), CoreError> {
    require_any(oracle, kind.required_capabilities(), kind.label())
}

/// Actions an operator can take right now, in display order.
pub fn available_actions(view: &WorkflowView, oracle: &dyn PermissionOracle) -> Vec<ActionKind> {
    ActionKind::ALL
        .into_iter()
        .filter(|kind| oracle.can_any(kind.required_capabilities()))
        .filter(|kind| match kind {
            ActionKind::RequestApproval => view.effective_state() == WorkflowState::Draft,
            ActionKind::ApproveAndPublish | ActionKind::Reject => {
                view.state == WorkflowState::PendingReview
            }
            ActionKind::CancelSchedule => view.state == WorkflowState::Scheduled,
            ActionKind::PublishDirectly | ActionKind::SchedulePublish => true,
        })
        .collect()
}

/// Who performs a transition, and when.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub actor: Option<&'a str>,
    pub now: Timestamp,
    pub has_unpublished_changes: bool,
}

/// Compute the record that results from applying `action`.
///
/// Checks the precondition first; `record` itself is never modified.
pub fn apply(
    record: &WorkflowRecord,
    action: &WorkflowAction,
    ctx: TransitionContext<'_>,
) -> Result<WorkflowRecord, CoreError> {
    let view = WorkflowView::new(Some(record), ctx.has_unpublished_changes);
    check(action, &view, ctx.now)?;

    let mut next = record.clone();
    let event = |kind: EventKind, notes: Option<&str>| {
        WorkflowEvent::new(kind, ctx.now)
            .with_actor(ctx.actor)
            .with_notes(notes)
    };

    match action {
        WorkflowAction::RequestApproval => {
            next.state = WorkflowState::PendingReview;
            next.scheduled_for = None;
            next.events.push(event(EventKind::Submitted, None));
        }
        WorkflowAction::ApproveAndPublish => {
            next.state = WorkflowState::Published;
            next.events.push(event(EventKind::Approved, None));
            next.events.push(event(EventKind::Published, None));
        }
        WorkflowAction::Reject { notes } => {
            next.state = WorkflowState::Draft;
            next.events
                .push(event(EventKind::Rejected, notes.as_deref()));
        }
        WorkflowAction::PublishDirectly => {
            next.state = WorkflowState::Published;
            next.scheduled_for = None;
            next.events.push(event(EventKind::Published, None));
        }
        WorkflowAction::SchedulePublish {
            scheduled_for,
            notes,
        } => {
            next.state = WorkflowState::Scheduled;
            next.scheduled_for = Some(*scheduled_for);
            next.events
                .push(event(EventKind::Scheduled, notes.as_deref()));
        }
        WorkflowAction::CancelSchedule => {
            next.state = if record.review_was_pending() {
                WorkflowState::PendingReview
            } else {
                WorkflowState::Draft
            };
            next.scheduled_for = None;
            next.events.push(event(EventKind::Cancelled, None));
        }
    }

    Ok(next)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
