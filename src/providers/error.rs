use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("missing API key: set {env} for backend {backend}")]
    MissingApiKey { backend: String, env: String },

    #[error("unknown provider kind: {0}")]
    UnknownProvider(String),

    #[error("HTTP error: {0}")]
    Http(Box<reqwest::Error>),

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty response from {0}")]
    EmptyResponse(String),
}

/// The request URL is dropped: it may carry an API key in its query.
impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Http(Box::new(error.without_url()))
    }
}

impl ProviderError {
    /// Rate limits, server errors and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
