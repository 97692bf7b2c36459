use std::env;
use std::fmt;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use reqwest::blocking::Client;
use reqwest::header;
use tracing::{debug, warn};

use crate::{Method, SearchRequest, SearchResponse, TransportError};

/// Performs one request/response round trip.
///
/// Implementations own retries, TLS and connection pooling; callers only
/// decide what to send and how many times.
pub trait Transport: Send + Sync {
    fn send(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub user_agent: String,
    /// `None` disables the client-side timeout.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("cmr-search/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Blocking `reqwest` transport.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    user_agent: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").field("user_agent", &self.user_agent).finish()
    }
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(TransportError::Build)?;
        Ok(Self {
            http,
            user_agent: config.user_agent,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        let start = Instant::now();
        let url = request.url.as_str();
        debug!(
            method = ?request.method,
            url = %url,
            query_pair_count = request.query.len(),
            header_count = request.headers.len(),
            "cmr request started"
        );

        let mut builder = match request.method {
            Method::Get => self.http.get(request.url.clone()).query(&request.query),
            Method::Post => self.http.post(request.url.clone()).form(&request.query),
        };
        builder = builder.header(header::USER_AGENT, self.user_agent.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(|error| {
            warn!(
                url = %url,
                error = %error,
                duration_ms = start.elapsed().as_millis(),
                "cmr request failed"
            );
            TransportError::network(url, error)
        })?;

        let status = response.status();
        let mut headers = IndexMap::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), text.to_string());
            }
        }
        let body = response.text().map_err(|error| TransportError::body(url, error))?;

        debug!(
            url = %url,
            status = status.as_u16(),
            body_len = body.len(),
            duration_ms = start.elapsed().as_millis(),
            "cmr request completed"
        );

        let mut search_response = SearchResponse::new(status.as_u16(), body);
        for (name, value) in headers {
            search_response.insert_header(&name, value);
        }
        Ok(search_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_identifies_the_client() {
        let config = ClientConfig::default();
        assert!(config.user_agent.starts_with("cmr-search/"));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn transport_builds_without_network_access() {
        let transport = HttpTransport::with_config(ClientConfig {
            user_agent: "test-agent".into(),
            timeout: None,
        })
        .expect("client builds");
        assert!(format!("{:?}", transport).contains("test-agent"));
    }
}
