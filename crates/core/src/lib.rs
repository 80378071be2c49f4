//! lexcms domain core.
//!
//! Zero internal dependencies: typed content blocks, the page draft store,
//! the publishing workflow state machine, capabilities, preview URL
//! resolution and history projections. Shared by the REST client, the
//! editor session and the in-memory backend.

pub mod content;
pub mod draft;
pub mod error;
pub mod hashing;
pub mod history;
pub mod locale;
pub mod page;
pub mod permissions;
pub mod preview;
pub mod types;
pub mod workflow;
