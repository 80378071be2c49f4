//! Read-only history projection: workflow events and saved versions.
//!
//! Nothing here mutates history. Server order is not guaranteed, so every
//! projection sorts by timestamp (stable, so same-instant events such as
//! `approved` then `published` keep their recorded order).

use serde::{Deserialize, Serialize};

use crate::page::PageStatus;
use crate::types::{Timestamp, Version};
use crate::workflow::{EventKind, WorkflowEvent};

/// One saved version of a page, as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    pub version: Version,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub editor: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

/// How an event is rendered in the history panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPresentation {
    pub label: String,
    pub icon: &'static str,
    pub tone: Tone,
}

/// Fixed lookup from event kind to its rendering. Unknown kinds get a
/// generic icon and their raw name as label.
pub fn presentation(kind: &EventKind) -> EventPresentation {
    let (label, icon, tone) = match kind {
        EventKind::Submitted => ("Submitted for review", "send", Tone::Info),
        EventKind::Reviewed => ("Reviewed", "eye", Tone::Info),
        EventKind::Approved => ("Approved", "check", Tone::Success),
        EventKind::Rejected => ("Changes requested", "x-circle", Tone::Danger),
        EventKind::Published => ("Published", "globe", Tone::Success),
        EventKind::Scheduled => ("Scheduled", "clock", Tone::Warning),
        EventKind::Cancelled => ("Schedule cancelled", "slash", Tone::Neutral),
        EventKind::Other(name) => {
            return EventPresentation {
                label: if name.trim().is_empty() {
                    "Update".to_string()
                } else {
                    name.clone()
                },
                icon: "dot",
                tone: Tone::Neutral,
            }
        }
    };
    EventPresentation {
        label: label.to_string(),
        icon,
        tone,
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Events in ascending timestamp order.
pub fn sorted_events(events: &[WorkflowEvent]) -> Vec<&WorkflowEvent> {
    let mut sorted: Vec<&WorkflowEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);
    sorted
}

/// A row of the merged history timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineEntry<'a> {
    Event(&'a WorkflowEvent),
    Version(&'a VersionHistoryEntry),
}

impl TimelineEntry<'_> {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            TimelineEntry::Event(e) => e.timestamp,
            TimelineEntry::Version(v) => v.created_at,
        }
    }

    /// One-line description for plain-text rendering.
    pub fn summary(&self) -> String {
        match self {
            TimelineEntry::Event(e) => {
                let mut line = presentation(&e.kind).label;
                if let Some(actor) = &e.actor {
                    line.push_str(&format!(" by {actor}"));
                }
                if let Some(notes) = e.notes.as_deref().filter(|n| !n.is_empty()) {
                    line.push_str(&format!(": {notes}"));
                }
                line
            }
            TimelineEntry::Version(v) => {
                let mut line = format!("Version {} saved ({})", v.version, v.status.as_str());
                if let Some(editor) = &v.editor {
                    line.push_str(&format!(" by {editor}"));
                }
                if let Some(notes) = v.notes.as_deref().filter(|n| !n.is_empty()) {
                    line.push_str(&format!(": {notes}"));
                }
                line
            }
        }
    }
}

/// Workflow events and saved versions merged in chronological order.
pub fn timeline<'a>(
    events: &'a [WorkflowEvent],
    versions: &'a [VersionHistoryEntry],
) -> Vec<TimelineEntry<'a>> {
    let mut entries: Vec<TimelineEntry<'a>> = events
        .iter()
        .map(TimelineEntry::Event)
        .chain(versions.iter().map(TimelineEntry::Version))
        .collect();
    entries.sort_by_key(|e| e.timestamp());
    entries
}
