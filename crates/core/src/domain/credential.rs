use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Default scope for the Azure Resource Manager control plane.
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Short-lived bearer token for one orchestration run.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    scope: String,
    expires_on: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(token: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            scope: scope.into(),
            expires_on: None,
        }
    }

    pub fn with_expiry(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.expires_on
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Whether the token expires within `skew` from now. Tokens without a
    /// known expiry never do.
    pub fn expires_within(&self, skew: Duration) -> bool {
        match self.expires_on {
            Some(at) => at - Utc::now() <= skew,
            None => false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("scope", &self.scope)
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let cred = Credential::new("super-secret", ARM_SCOPE);
        let debug = format!("{:?}", cred);

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_expiry_window() {
        let soon = Credential::new("t", ARM_SCOPE).with_expiry(Utc::now() + Duration::minutes(2));
        assert!(soon.expires_within(Duration::minutes(5)));

        let later = Credential::new("t", ARM_SCOPE).with_expiry(Utc::now() + Duration::hours(1));
        assert!(!later.expires_within(Duration::minutes(5)));

        let unknown = Credential::new("t", ARM_SCOPE);
        assert!(!unknown.expires_within(Duration::minutes(5)));
    }

    #[test]
    fn test_bearer_header() {
        let cred = Credential::new("abc", ARM_SCOPE);
        assert_eq!(cred.bearer(), "Bearer abc");
    }
}
