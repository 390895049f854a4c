use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("no row matched {0}")]
    NotFound(String),
    #[error("operation requires a signed-in user")]
    Unauthenticated,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("an email address is required")]
    EmptyEmail,
    #[error("the code must contain 6 digits")]
    InvalidCode,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("failed to persist session: {0}")]
    Persist(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("no user signed in")]
    NotSignedIn,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to locate the user configuration directory")]
    NoConfigDir,
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReactionError {
    #[error("reaction write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
