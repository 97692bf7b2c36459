use thiserror::Error;

/// Failure to complete a round trip. Non-success HTTP statuses are *not*
/// transport errors; they come back as a [`SearchResponse`](crate::SearchResponse).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not build the HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("network error requesting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not read the response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("transport unavailable: {message}")]
    Unavailable { message: String },
}

impl TransportError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network { url: url.into(), source }
    }

    pub fn body(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Body { url: url.into(), source }
    }

    /// Create an error for transports that cannot serve the request at all.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into() }
    }
}
