//! In-memory page draft with snapshot-based dirty detection.
//!
//! A [`PageDraft`] is loaded from a [`PageContent`], edited through
//! [`DraftEdit`]s and compared against the snapshot of the last saved state.
//! Snapshots are hashes of the editable form text, so two values that render
//! identically in the editor (e.g. an empty list and a missing list) are
//! never reported as a change.

use std::collections::HashSet;

use serde::Serialize;

use crate::content::{BlockContent, BlockType, ContentBlock};
use crate::error::CoreError;
use crate::hashing::sha256_hex;
use crate::locale::{Locale, Localized};
use crate::page::{DraftPayload, PageContent, PageStatus};

/// A single field-level edit.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEdit {
    Title {
        locale: Locale,
        text: String,
    },
    BlockKey {
        index: usize,
        key: String,
    },
    BlockType {
        index: usize,
        block_type: BlockType,
    },
    BlockValue {
        index: usize,
        locale: Locale,
        text: String,
    },
    AddBlock {
        block: ContentBlock,
    },
    RemoveBlock {
        index: usize,
    },
    MoveBlock {
        from: usize,
        to: usize,
    },
}

/// Editable state of one page.
#[derive(Debug, Clone)]
pub struct PageDraft {
    title: Localized<String>,
    blocks: Vec<ContentBlock>,
    baseline: String,
}

/// Canonical form used for snapshots.
#[derive(Serialize)]
struct FormState<'a> {
    title: [String; 2],
    blocks: Vec<FormBlock<'a>>,
}

#[derive(Serialize)]
struct FormBlock<'a> {
    key: &'a str,
    #[serde(rename = "type")]
    block_type: BlockType,
    value: [String; 2],
}

impl PageDraft {
    /// Build form state from server data and record it as the baseline.
    pub fn load(page: &PageContent) -> Self {
        let mut draft = Self {
            title: page.title.clone(),
            blocks: page.content_blocks.clone(),
            baseline: String::new(),
        };
        draft.baseline = draft.snapshot();
        draft
    }

    pub fn title(&self) -> &Localized<String> {
        &self.title
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Fingerprint of the current form state.
    pub fn snapshot(&self) -> String {
        let form = FormState {
            title: Locale::ALL.map(|l| self.title.get(l).cloned().unwrap_or_default()),
            blocks: self
                .blocks
                .iter()
                .map(|b| FormBlock {
                    key: &b.key,
                    block_type: b.block_type(),
                    value: Locale::ALL.map(|l| b.content.form_text(l)),
                })
                .collect(),
        };
        // Serializing strings and unit enums cannot fail.
        let json = serde_json::to_string(&form).unwrap_or_default();
        sha256_hex(json.as_bytes())
    }

    pub fn is_dirty(&self) -> bool {
        self.snapshot() != self.baseline
    }

    /// Record `snapshot` as the last saved state.
    ///
    /// Pass the snapshot taken when the save request was built; edits made
    /// while it was in flight then stay dirty.
    pub fn mark_saved(&mut self, snapshot: String) {
        self.baseline = snapshot;
    }

    /// Apply one edit. On error the draft is unchanged.
    pub fn mutate(&mut self, edit: DraftEdit) -> Result<(), CoreError> {
        match edit {
            DraftEdit::Title { locale, text } => {
                self.title.set(locale, crate::content::deserialize_text(&text));
            }
            DraftEdit::BlockKey { index, key } => {
                self.block_mut(index)?.key = key.trim().to_string();
            }
            DraftEdit::BlockType { index, block_type } => {
                let block = self.block_mut(index)?;
                let converted = block.content.convert_to(block_type).map_err(|e| {
                    CoreError::Validation(format!(
                        "Block {} ('{}') cannot become {block_type}: {}",
                        index + 1,
                        block.key,
                        inner_message(e)
                    ))
                })?;
                block.content = converted;
            }
            DraftEdit::BlockValue {
                index,
                locale,
                text,
            } => {
                let block = self.block_mut(index)?;
                let key = block.key.clone();
                block.content.set_form_text(locale, &text).map_err(|e| {
                    CoreError::Validation(format!(
                        "Block {} ('{key}') {locale}: {}",
                        index + 1,
                        inner_message(e)
                    ))
                })?;
            }
            DraftEdit::AddBlock { block } => self.blocks.push(block),
            DraftEdit::RemoveBlock { index } => {
                self.check_index(index)?;
                self.blocks.remove(index);
            }
            DraftEdit::MoveBlock { from, to } => {
                self.check_index(from)?;
                self.check_index(to)?;
                let block = self.blocks.remove(from);
                self.blocks.insert(to, block);
            }
        }
        Ok(())
    }

    /// Every block needs a non-empty key that no other block uses.
    ///
    /// The error names the first offending block.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for (i, block) in self.blocks.iter().enumerate() {
            let key = block.key.trim();
            if key.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Block {} has an empty key",
                    i + 1
                )));
            }
            if !seen.insert(key) {
                return Err(CoreError::Validation(format!(
                    "Block {} uses duplicate key '{key}'",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus a value in the primary locale for
    /// every block. Required before a page goes to review or live.
    pub fn validate_for_review(&self) -> Result<(), CoreError> {
        self.validate()?;
        if let Some((i, block)) = self
            .blocks
            .iter()
            .enumerate()
            .find(|(_, b)| !b.content.has_value(Locale::PRIMARY))
        {
            return Err(CoreError::Validation(format!(
                "Block {} ('{}') is missing a value for locale '{}'",
                i + 1,
                block.key,
                Locale::PRIMARY
            )));
        }
        Ok(())
    }

    /// Request body for saving or previewing the current state.
    pub fn payload(&self, status: Option<PageStatus>) -> DraftPayload {
        DraftPayload {
            title: self.title.clone(),
            content_blocks: self.blocks.clone(),
            status,
        }
    }

    /// Replace the content with a freshly loaded page, resetting the baseline.
    pub fn reload(&mut self, page: &PageContent) {
        *self = Self::load(page);
    }

    fn check_index(&self, index: usize) -> Result<(), CoreError> {
        if index < self.blocks.len() {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Block index {index} out of range (page has {} blocks)",
                self.blocks.len()
            )))
        }
    }

    fn block_mut(&mut self, index: usize) -> Result<&mut ContentBlock, CoreError> {
        self.check_index(index)?;
        Ok(&mut self.blocks[index])
    }
}

/// Strip the `Validation failed:` prefix when nesting messages.
fn inner_message(err: CoreError) -> String {
    match err {
        CoreError::Validation(msg) => msg,
        other => other.to_string(),
    }
}

/// Empty block of the given type, for "add block" in the editor.
pub fn new_block(key: impl Into<String>, block_type: BlockType) -> ContentBlock {
    ContentBlock::new(key, BlockContent::empty(block_type))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn page() -> PageContent {
        let mut page = PageContent::new("home");
        page.title = Localized::new(Some("Home".into()), Some("الرئيسية".into()));
        page.content_blocks = vec![
            ContentBlock::text("hero_title", "Welcome", "أهلاً"),
            new_block("services", BlockType::List),
        ];
        page
    }

    #[test]
    fn freshly_loaded_draft_is_clean() {
        let draft = PageDraft::load(&page());
        assert!(!draft.is_dirty());
    }

    #[test]
    fn mutation_makes_dirty_and_save_cleans() {
        let mut draft = PageDraft::load(&page());
        draft
            .mutate(DraftEdit::BlockValue {
                index: 0,
                locale: Locale::En,
                text: "Welcome back".into(),
            })
            .unwrap();
        assert!(draft.is_dirty());

        let snapshot = draft.snapshot();
        draft.mark_saved(snapshot);
        assert!(!draft.is_dirty());
    }

    #[test]
    fn edit_after_snapshot_stays_dirty() {
        let mut draft = PageDraft::load(&page());
        draft
            .mutate(DraftEdit::Title {
                locale: Locale::En,
                text: "Home page".into(),
            })
            .unwrap();
        let in_flight = draft.snapshot();
        draft
            .mutate(DraftEdit::Title {
                locale: Locale::En,
                text: "Home page!".into(),
            })
            .unwrap();
        draft.mark_saved(in_flight);
        assert!(draft.is_dirty());
    }

    #[test]
    fn reverting_an_edit_is_clean() {
        let mut draft = PageDraft::load(&page());
        let edit = |text: &str| DraftEdit::BlockValue {
            index: 0,
            locale: Locale::Ar,
            text: text.into(),
        };
        draft.mutate(edit("مرحباً")).unwrap();
        assert!(draft.is_dirty());
        draft.mutate(edit("أهلاً")).unwrap();
        assert!(!draft.is_dirty());
    }

    #[test]
    fn duplicate_keys_fail_validation_naming_the_key() {
        let mut draft = PageDraft::load(&page());
        draft
            .mutate(DraftEdit::BlockKey {
                index: 1,
                key: "hero_title".into(),
            })
            .unwrap();
        let err = draft.validate().unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("Block 2") && msg.contains("'hero_title'"));
    }

    #[test]
    fn empty_key_fails_validation() {
        let mut draft = PageDraft::load(&page());
        draft
            .mutate(DraftEdit::AddBlock {
                block: new_block("  ", BlockType::Text),
            })
            .unwrap();
        let err = draft.validate().unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("Block 3 has an empty key"));
    }

    #[test]
    fn review_validation_requires_primary_locale() {
        let draft = PageDraft::load(&page());
        assert!(draft.validate().is_ok());
        let err = draft.validate_for_review().unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("'services'") && msg.contains("'en'"));
    }

    #[test]
    fn invalid_json_value_is_rejected_without_change() {
        let mut draft = PageDraft::load(&page());
        draft
            .mutate(DraftEdit::BlockType {
                index: 1,
                block_type: BlockType::Json,
            })
            .unwrap();
        let before = draft.snapshot();
        let err = draft
            .mutate(DraftEdit::BlockValue {
                index: 1,
                locale: Locale::En,
                text: "{oops".into(),
            })
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("'services'") && msg.contains("Invalid JSON"));
        assert_eq!(draft.snapshot(), before);
    }

    #[test]
    fn move_and_remove_blocks() {
        let mut draft = PageDraft::load(&page());
        draft.mutate(DraftEdit::MoveBlock { from: 1, to: 0 }).unwrap();
        assert_eq!(draft.blocks()[0].key, "services");
        assert!(draft.is_dirty());

        draft.mutate(DraftEdit::RemoveBlock { index: 0 }).unwrap();
        assert_eq!(draft.blocks().len(), 1);
        assert!(draft.mutate(DraftEdit::RemoveBlock { index: 5 }).is_err());
    }

    #[test]
    fn payload_carries_current_blocks() {
        let mut draft = PageDraft::load(&page());
        draft
            .mutate(DraftEdit::BlockValue {
                index: 0,
                locale: Locale::En,
                text: "Welcome back".into(),
            })
            .unwrap();
        let payload = draft.payload(None);
        assert_eq!(payload.content_blocks[0].content.form_text(Locale::En), "Welcome back");
        assert_eq!(payload.title.en.as_deref(), Some("Home"));
    }
}
