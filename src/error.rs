use thiserror::Error;

/// Failures while scanning a document. These point at a broken grammar or an
/// unreasonable input, so callers fall back to an empty inventory.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("pattern `{pattern}` failed to compile: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: fancy_regex::Error,
    },
    #[error("pattern `{pattern}` failed while matching: {source}")]
    Match {
        pattern: String,
        #[source]
        source: fancy_regex::Error,
    },
    #[error("document of {0} bytes is too large to scan")]
    DocumentTooLarge(usize),
}

/// Failures while fetching statistics for one method site.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no statistics hostname is configured")]
    NotConfigured,
    #[error("statistics server not reachable: {0}")]
    Unavailable(#[source] reqwest::Error),
    #[error("statistics server answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("statistics server sent an empty response")]
    EmptyResponse,
    #[error("malformed statistics payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid statistics url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("statistics client is shutting down")]
    ShuttingDown,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unavailable(err)
        } else if let Some(status) = err.status() {
            Self::Status(status)
        } else {
            Self::Http(err)
        }
    }
}

impl FetchError {
    /// The text shown in place of call counts when the fetch failed.
    pub fn label(&self) -> String {
        match self {
            FetchError::NotConfigured | FetchError::Unavailable(_) => {
                "Data server not available".to_string()
            }
            FetchError::EmptyResponse => "There was no response from the server.".to_string(),
            other => format!("The following error occurred: {}", other),
        }
    }
}
