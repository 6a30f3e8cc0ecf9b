use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential source cannot produce a token (not installed, not
    /// logged in, not configured).
    #[error("Credential unavailable: {0}")]
    Unavailable(String),

    #[error("Token request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Authentication-specific failures are the only ones a credential
    /// chain moves past.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
