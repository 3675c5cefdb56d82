use sessions_core::SessionsError;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Failed to parse hook input: {0}")]
    Parse(#[source] serde_json::Error),

    #[error(transparent)]
    Sessions(#[from] SessionsError),

    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, HookError>;
