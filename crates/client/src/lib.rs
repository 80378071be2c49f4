//! Client side of the lexcms content API.
//!
//! [`PagesApi`] is the contract the editor depends on. Two implementations
//! are provided:
//!
//! - [`HttpPagesApi`]: talks to the admin backend over HTTP via `reqwest`.
//! - [`InMemoryPagesApi`]: applies the same workflow rules in process; used
//!   by tests and offline tooling.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;

pub use api::{BulkPublishOutcome, PagesApi, PreviewResponse, SaveOptions, ScheduleRequest};
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::HttpPagesApi;
pub use memory::InMemoryPagesApi;
