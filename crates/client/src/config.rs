use lexcms_core::error::CoreError;

/// Default API base URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Content API client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the admin API, without trailing slash.
    pub api_url: String,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default                      |
    /// |------------------------------|------------------------------|
    /// | `LEXCMS_API_URL`             | `http://localhost:3000/api`  |
    /// | `LEXCMS_API_TOKEN`           | none                         |
    /// | `LEXCMS_REQUEST_TIMEOUT_SECS`| `30`                         |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let api_url = lookup("LEXCMS_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(CoreError::Validation(format!(
                "LEXCMS_API_URL must start with http:// or https://, got '{api_url}'"
            )));
        }

        let api_token = lookup("LEXCMS_API_TOKEN").filter(|v| !v.trim().is_empty());

        let request_timeout_secs = match lookup("LEXCMS_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().ok().filter(|v| *v > 0).ok_or_else(|| {
                CoreError::Validation(format!(
                    "LEXCMS_REQUEST_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url,
            api_token,
            request_timeout_secs,
        })
    }
}
