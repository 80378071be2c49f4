//! Typed content blocks and their conversion to/from editable form text.
//!
//! A page is an ordered list of [`ContentBlock`]s. Each block carries a
//! per-locale value whose shape depends on the block type; [`BlockContent`]
//! is the closed set of those shapes. Editors work on plain text, so every
//! shape has a text form (see [`serialize_list`], [`deserialize_json`], ...).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::locale::{Locale, Localized};

// ---------------------------------------------------------------------------
// Block type
// ---------------------------------------------------------------------------

/// Discriminant of a content block, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    List,
    Json,
    Image,
    Media,
}

impl BlockType {
    pub const ALL: [BlockType; 5] = [
        BlockType::Text,
        BlockType::List,
        BlockType::Json,
        BlockType::Image,
        BlockType::Media,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Text => "text",
            BlockType::List => "list",
            BlockType::Json => "json",
            BlockType::Image => "image",
            BlockType::Media => "media",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid block type '{s}'. Must be one of: text, list, json, image, media"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Form text conversion
// ---------------------------------------------------------------------------

/// One item per line.
pub fn serialize_list(items: &[String]) -> String {
    items.join("\n")
}

/// Pretty-printed JSON, falling back to the compact form.
pub fn serialize_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Plain string value, or `""` when absent.
pub fn serialize_text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// Split on newlines, trim each line and drop blank lines.
pub fn deserialize_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse JSON text. Blank input is `None`; malformed input is a
/// validation error carrying the parser's line/column.
pub fn deserialize_json(text: &str) -> Result<Option<Value>, CoreError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| CoreError::Validation(format!("Invalid JSON: {e}")))
}

/// Trimmed string, `None` when blank.
pub fn deserialize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Block content
// ---------------------------------------------------------------------------

/// The typed, localized value of a block. One variant per [`BlockType`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Text(Localized<String>),
    List(Localized<Vec<String>>),
    Json(Localized<Value>),
    /// Image URL.
    Image(Localized<String>),
    /// Video/audio/document URL.
    Media(Localized<String>),
}

impl BlockContent {
    /// An empty value of the given type.
    pub fn empty(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Text => BlockContent::Text(Localized::default()),
            BlockType::List => BlockContent::List(Localized::default()),
            BlockType::Json => BlockContent::Json(Localized::default()),
            BlockType::Image => BlockContent::Image(Localized::default()),
            BlockType::Media => BlockContent::Media(Localized::default()),
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            BlockContent::Text(_) => BlockType::Text,
            BlockContent::List(_) => BlockType::List,
            BlockContent::Json(_) => BlockType::Json,
            BlockContent::Image(_) => BlockType::Image,
            BlockContent::Media(_) => BlockType::Media,
        }
    }

    /// Editable text for one locale.
    pub fn form_text(&self, locale: Locale) -> String {
        match self {
            BlockContent::Text(v) | BlockContent::Image(v) | BlockContent::Media(v) => {
                serialize_text(v.get(locale).map(String::as_str))
            }
            BlockContent::List(v) => v
                .get(locale)
                .map(|items| serialize_list(items))
                .unwrap_or_default(),
            BlockContent::Json(v) => v.get(locale).map(serialize_json).unwrap_or_default(),
        }
    }

    /// Replace one locale's value from editable text.
    ///
    /// On error the block is left untouched.
    pub fn set_form_text(&mut self, locale: Locale, text: &str) -> Result<(), CoreError> {
        match self {
            BlockContent::Text(v) | BlockContent::Image(v) | BlockContent::Media(v) => {
                v.set(locale, deserialize_text(text));
            }
            BlockContent::List(v) => {
                let items = deserialize_list(text);
                v.set(locale, (!items.is_empty()).then_some(items));
            }
            BlockContent::Json(v) => {
                let parsed = deserialize_json(text)?;
                v.set(locale, parsed);
            }
        }
        Ok(())
    }

    /// Build a value of `block_type` from per-locale form text.
    pub fn from_form_text(
        block_type: BlockType,
        text: &Localized<String>,
    ) -> Result<Self, CoreError> {
        let mut content = BlockContent::empty(block_type);
        for locale in Locale::ALL {
            if let Some(t) = text.get(locale) {
                content.set_form_text(locale, t)?;
            }
        }
        Ok(content)
    }

    /// Per-locale form text of this value.
    pub fn form_texts(&self) -> Localized<String> {
        let mut out = Localized::default();
        for locale in Locale::ALL {
            out.set(locale, Some(self.form_text(locale)));
        }
        out
    }

    /// Re-type the block by passing each locale through its text form.
    ///
    /// A list becomes newline-joined text, text becomes a one-item list, and
    /// so on. Converting to `json` fails if any locale's text is not JSON.
    pub fn convert_to(&self, block_type: BlockType) -> Result<Self, CoreError> {
        if block_type == self.block_type() {
            return Ok(self.clone());
        }
        BlockContent::from_form_text(block_type, &self.form_texts())
    }

    /// Whether `locale` carries a non-empty value.
    pub fn has_value(&self, locale: Locale) -> bool {
        match self {
            BlockContent::Text(v) | BlockContent::Image(v) | BlockContent::Media(v) => v
                .get(locale)
                .is_some_and(|s| !s.trim().is_empty()),
            BlockContent::List(v) => v.get(locale).is_some_and(|items| !items.is_empty()),
            BlockContent::Json(v) => v.get(locale).is_some_and(|value| !value.is_null()),
        }
    }
}

// ---------------------------------------------------------------------------
// Content block
// ---------------------------------------------------------------------------

/// One keyed block of page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct ContentBlock {
    pub key: String,
    pub content: BlockContent,
}

impl ContentBlock {
    pub fn new(key: impl Into<String>, content: BlockContent) -> Self {
        Self {
            key: key.into(),
            content,
        }
    }

    /// A text block with values in both locales.
    pub fn text(key: impl Into<String>, en: &str, ar: &str) -> Self {
        Self::new(
            key,
            BlockContent::Text(Localized::new(Some(en.to_string()), Some(ar.to_string()))),
        )
    }

    pub fn block_type(&self) -> BlockType {
        self.content.block_type()
    }
}

/// Wire shape: `{ "key": "...", "type": "...", "value": { "en": .., "ar": .. } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    key: String,
    #[serde(rename = "type")]
    block_type: BlockType,
    #[serde(default)]
    value: Localized<Value>,
}

impl TryFrom<RawBlock> for ContentBlock {
    type Error = CoreError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let content = match raw.block_type {
            BlockType::Text => BlockContent::Text(raw.value.map(coerce_string)),
            BlockType::Image => BlockContent::Image(raw.value.map(coerce_string)),
            BlockType::Media => BlockContent::Media(raw.value.map(coerce_string)),
            BlockType::List => BlockContent::List(raw.value.map(coerce_list)),
            BlockType::Json => BlockContent::Json(raw.value),
        };
        Ok(ContentBlock {
            key: raw.key,
            content,
        })
    }
}

impl From<ContentBlock> for RawBlock {
    fn from(block: ContentBlock) -> Self {
        let block_type = block.block_type();
        let value = match block.content {
            BlockContent::Text(v) | BlockContent::Image(v) | BlockContent::Media(v) => {
                v.map(Value::String)
            }
            BlockContent::List(v) => {
                v.map(|items| Value::Array(items.into_iter().map(Value::String).collect()))
            }
            BlockContent::Json(v) => v,
        };
        RawBlock {
            key: block.key,
            block_type,
            value,
        }
    }
}

/// Servers occasionally store numbers or objects in text fields.
fn coerce_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Lists may arrive as arrays or as newline-separated strings.
fn coerce_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().map(coerce_string).collect(),
        Value::String(s) => deserialize_list(&s),
        other => vec![other.to_string()],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
