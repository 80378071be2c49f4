use lexcms_client::ClientError;
use lexcms_core::error::CoreError;

/// Errors returned by editor operations.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Rejected locally: validation, read-only, illegal transition.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request reached (or tried to reach) the server and failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A workflow action is already in flight for this page.
    #[error("Another workflow action is still in progress")]
    TransitionPending,
}

impl EditorError {
    /// Message to show an operator, with `fallback` for failures that carry
    /// no useful text of their own.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            EditorError::Core(err) => core_message(err),
            EditorError::Client(ClientError::Core(err)) => core_message(err),
            EditorError::Client(err) => err.user_message(fallback),
            EditorError::TransitionPending => self.to_string(),
        }
    }

    /// Whether the action was blocked for lack of a capability.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            EditorError::Core(CoreError::Forbidden(_))
                | EditorError::Client(ClientError::Core(CoreError::Forbidden(_)))
        )
    }
}

/// Local errors already read well without the variant prefix.
fn core_message(err: &CoreError) -> String {
    match err {
        CoreError::Validation(msg)
        | CoreError::Conflict(msg)
        | CoreError::Forbidden(msg) => msg.clone(),
        other => other.to_string(),
    }
}
