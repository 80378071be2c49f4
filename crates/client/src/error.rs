use lexcms_core::error::CoreError;

/// Errors from the content API layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("<no message>"))]
    Api {
        status: u16,
        /// Server-provided message, when the body carried one.
        message: Option<String>,
    },

    /// The page changed on the server since it was loaded.
    #[error("Version conflict: {0}")]
    Conflict(String),

    /// A success response whose body did not match the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Rejected locally before any request was sent.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ClientError {
    /// Message to show an operator: the server's own wording when it sent
    /// one, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Api {
                message: Some(msg), ..
            } if !msg.trim().is_empty() => msg.clone(),
            ClientError::Conflict(msg) => msg.clone(),
            ClientError::Core(err) => err.to_string(),
            _ => fallback.to_string(),
        }
    }

    /// HTTP status, when the failure came from the server.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Conflict(_) => Some(409),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_text() {
        let err = ClientError::Api {
            status: 422,
            message: Some("Slug is locked".into()),
        };
        assert_eq!(err.user_message("Save failed"), "Slug is locked");
    }

    #[test]
    fn user_message_falls_back() {
        let err = ClientError::Api {
            status: 500,
            message: None,
        };
        assert_eq!(err.user_message("Save failed"), "Save failed");
        assert_eq!(err.to_string(), "API error (500): <no message>");
        assert_eq!(ClientError::Decode("x".into()).user_message("Save failed"), "Save failed");
    }

    #[test]
    fn core_errors_pass_through() {
        let err = ClientError::from(CoreError::Forbidden("Read-only".into()));
        assert_eq!(err.user_message("nope"), "Forbidden: Read-only");
        assert_eq!(err.status(), None);
    }
}
