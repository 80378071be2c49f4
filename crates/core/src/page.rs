//! Page wire types shared by the client, the editor and the in-memory backend.

use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;
use crate::error::CoreError;
use crate::locale::Localized;
use crate::types::{Slug, Timestamp, Version};
use crate::workflow::WorkflowRecord;

/// Persisted content status of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Draft,
    Preview,
    Published,
    /// The slug no longer resolves to a landing section.
    Unlinked,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Preview => "preview",
            PageStatus::Published => "published",
            PageStatus::Unlinked => "unlinked",
        }
    }
}

/// Server view of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub slug: Slug,
    #[serde(default)]
    pub title: Localized<String>,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub workflow: Option<WorkflowRecord>,
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Latest saved version, used as the `If-Match` token on save.
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl PageContent {
    /// An empty page as the server creates it on first reference.
    pub fn new(slug: impl Into<Slug>) -> Self {
        Self {
            slug: slug.into(),
            title: Localized::default(),
            content_blocks: Vec::new(),
            status: PageStatus::Draft,
            workflow: None,
            preview_url: None,
            version: None,
            updated_at: None,
        }
    }
}

/// Body of a draft save or preview request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPayload {
    pub title: Localized<String>,
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PageStatus>,
}

/// Validate a page slug (non-empty, only lowercase alphanumeric, hyphens
/// and underscores).
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if slug.is_empty() {
        return Err(CoreError::Validation("Slug must not be empty".into()));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "Invalid slug '{slug}'. Only lowercase alphanumeric characters, hyphens and underscores are allowed"
        )));
    }
    Ok(())
}
