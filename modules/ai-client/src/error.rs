use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    /// 401/403 from the provider. Never retried.
    #[error("Authentication rejected (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from model {0}")]
    EmptyResponse(String),
}

impl AiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, AiError::Unauthorized { .. })
    }

    /// Classify a non-success HTTP status and its body.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => AiError::Unauthorized { status, message },
            _ => AiError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_and_unauthorized_are_auth_errors() {
        assert!(AiError::from_status(401, "bad key".into()).is_auth());
        assert!(AiError::from_status(403, "no credits".into()).is_auth());
        assert!(!AiError::from_status(429, "slow down".into()).is_auth());
        assert!(!AiError::from_status(500, "oops".into()).is_auth());
    }
}
