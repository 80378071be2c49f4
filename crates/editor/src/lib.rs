//! Page editor session for the lexcms admin.
//!
//! An [`EditorSession`] owns the draft of one open page and drives
//! everything around it:
//!
//! - [`autosave`]: debounced background saves after edits.
//! - workflow actions (request approval, approve, publish, schedule, ...)
//!   gated by capability and state before any request is sent.
//! - preview generation and history reads.
//! - [`bulk`]: publishing many pages at once.
//! - [`NoticeBus`]: the toast channel every outcome is reported on.

pub mod autosave;
pub mod bulk;
pub mod config;
pub mod error;
pub mod notice;
pub mod session;

pub use config::EditorConfig;
pub use error::EditorError;
pub use notice::{Notice, NoticeBus, NoticeLevel};
pub use session::EditorSession;
