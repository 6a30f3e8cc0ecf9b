use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArmError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ArmError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Structured ARM error body (`{"error": {...}}`), when the response
    /// carried one.
    pub fn detail(&self) -> Option<Value> {
        match self {
            Self::Status { body, .. } => serde_json::from_str::<Value>(body)
                .ok()
                .map(|v| v.get("error").cloned().unwrap_or(v)),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArmError>;
