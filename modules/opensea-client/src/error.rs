use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpenSeaError>;

#[derive(Debug, Error)]
pub enum OpenSeaError {
    #[error("Network error: {0}")]
    Network(String),

    /// Missing key, or a free-tier key hitting a paid endpoint.
    #[error("OpenSea rejected credentials for {slug} (status {status})")]
    Unauthorized { slug: String, status: u16 },

    #[error("OpenSea API error for {slug} (status {status}): {message}")]
    Api {
        slug: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenSeaError {
    pub fn is_auth(&self) -> bool {
        matches!(self, OpenSeaError::Unauthorized { .. })
    }

    pub(crate) fn from_status(slug: &str, status: u16, message: String) -> Self {
        match status {
            401 | 403 => OpenSeaError::Unauthorized {
                slug: slug.to_string(),
                status,
            },
            _ => OpenSeaError::Api {
                slug: slug.to_string(),
                status,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for OpenSeaError {
    fn from(err: reqwest::Error) -> Self {
        OpenSeaError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for OpenSeaError {
    fn from(err: serde_json::Error) -> Self {
        OpenSeaError::Parse(err.to_string())
    }
}
