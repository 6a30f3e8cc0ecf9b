use thiserror::Error;

/// Resource group names: 1-90 chars of alphanumerics, `_`, `-`, `.`, `(`, `)`,
/// not ending in a period.
const MAX_CONTAINER_NAME_LEN: usize = 90;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid resource group name '{name}': {reason}")]
    InvalidContainerName { name: String, reason: String },

    #[error("Invalid deployment name prefix '{prefix}': {reason}")]
    InvalidDeploymentPrefix { prefix: String, reason: String },
}

fn disallowed_char(name: &str) -> Option<char> {
    name.chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '(' | ')')))
}

pub fn validate_container_name(name: &str) -> Result<(), CoreError> {
    let invalid = |reason: &str| CoreError::InvalidContainerName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().count() > MAX_CONTAINER_NAME_LEN {
        return Err(invalid("name is longer than 90 characters"));
    }
    if name.ends_with('.') {
        return Err(invalid("name ends with a period"));
    }
    if let Some(c) = disallowed_char(name) {
        return Err(invalid(&format!("character '{}' is not allowed", c)));
    }

    Ok(())
}

/// Deployment names end up as a URL path segment, so the prefix is held to
/// ARM's deployment name alphabet: ASCII alphanumerics, `_`, `-`, `.`, `(`, `)`.
pub fn validate_deployment_prefix(prefix: &str) -> Result<(), CoreError> {
    let invalid = |reason: String| CoreError::InvalidDeploymentPrefix {
        prefix: prefix.to_string(),
        reason,
    };

    if prefix.is_empty() {
        return Err(invalid("prefix is empty".to_string()));
    }
    if let Some(c) = prefix.chars().find(|c| !c.is_ascii()).or_else(|| disallowed_char(prefix)) {
        return Err(invalid(format!("character '{}' is not allowed", c)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_container_names() {
        assert!(validate_container_name("rg-sentinel-prod").is_ok());
        assert!(validate_container_name("rg_(dev).1").is_ok());
    }

    #[test]
    fn test_invalid_container_names() {
        assert!(validate_container_name("").is_err());
        assert!(validate_container_name("rg.").is_err());
        assert!(validate_container_name("rg/prod").is_err());
        assert!(validate_container_name(&"a".repeat(91)).is_err());
    }

    #[test]
    fn test_deployment_prefixes() {
        assert!(validate_deployment_prefix("deployment").is_ok());
        assert!(validate_deployment_prefix("sentinel_(v2).1").is_ok());

        assert!(validate_deployment_prefix("").is_err());
        assert!(validate_deployment_prefix("a/b").is_err());
        assert!(validate_deployment_prefix("dep?x=1").is_err());
        assert!(validate_deployment_prefix("dép").is_err());
        assert!(validate_deployment_prefix("two words").is_err());
    }

    #[test]
    fn test_error_display() {
        let error = validate_container_name("bad name").unwrap_err();
        assert!(error.to_string().contains("bad name"));
    }
}
