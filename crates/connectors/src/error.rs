use thiserror::Error;

/// All errors coming from the protocol/query layer.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The request never produced a response (refused, reset, DNS, TLS).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request or the body read exceeded the client timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// The query could not be expressed in the protocol (bad filter, bad column).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The response body did not have the expected shape.
    #[error("Failed to decode service payload: {0}")]
    Decode(String),

    #[error("Unknown entity set: {0}")]
    UnknownEntitySet(String),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
}

impl ServiceError {
    pub fn http(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        ServiceError::Http {
            status,
            url: url.into(),
            body: body.into(),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout(err.to_string())
        } else if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            ServiceError::http(status.as_u16(), url, err.to_string())
        } else if err.is_builder() {
            ServiceError::InvalidUrl(err.to_string())
        } else {
            // connect, request and body errors all mean the exchange broke off
            ServiceError::Connection(err.to_string())
        }
    }
}
