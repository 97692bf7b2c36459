//! Wire-level request and response values exchanged with a [`Transport`](crate::Transport).
//!
//! The query builder decides *what* to send; these types carry that decision
//! to whichever transport performs the round trip, and carry the status,
//! headers and body back.

use indexmap::IndexMap;
use url::Url;

use crate::redact_sensitive;

/// Response header carrying the total number of matching records.
pub const HITS_HEADER: &str = "cmr-hits";
/// Response header carrying the scroll token for the next page; echoed back
/// as a request header of the same name.
pub const SEARCH_AFTER_HEADER: &str = "cmr-search-after";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    /// Parameters travel as a form-encoded body instead of the query string.
    Post,
}

/// One search round trip: target URL, ordered query pairs and headers.
///
/// Query pairs keep insertion order and may repeat a key; the remote service
/// treats repeated `key[]` entries as a list.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub headers: IndexMap<String, String>,
}

impl SearchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            headers: IndexMap::new(),
        }
    }

    /// First value sent for `key`, if any.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// All values sent for `key`, in order.
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The URL with every query pair appended, as a GET would send it.
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        url
    }

    /// Length of the form-encoded parameter string.
    pub fn encoded_query_len(&self) -> usize {
        self.full_url().query().map(str::len).unwrap_or(0)
    }

    /// Headers with credentials masked, suitable for logs and dry runs.
    pub fn redacted_headers(&self) -> IndexMap<String, String> {
        self.headers
            .iter()
            .map(|(name, value)| {
                let line = redact_sensitive(&format!("{}: {}", name, value));
                let masked = line.split_once(": ").map(|(_, rest)| rest.to_string()).unwrap_or_default();
                (name.clone(), masked)
            })
            .collect()
    }
}

/// Status, headers and body of a completed round trip.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResponse {
    pub status: u16,
    headers: IndexMap<String, String>,
    pub body: String,
}

impl SearchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: IndexMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Total hits as reported by the service, when the header is present and numeric.
    pub fn reported_hits(&self) -> Option<u64> {
        self.header(HITS_HEADER).and_then(|value| value.trim().parse::<u64>().ok())
    }

    /// Total hits, treating a missing count as zero.
    pub fn hits(&self) -> u64 {
        self.reported_hits().unwrap_or(0)
    }

    /// Scroll token for the next page, if the service issued one.
    pub fn search_after(&self) -> Option<&str> {
        self.header(SEARCH_AFTER_HEADER).filter(|token| !token.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SearchRequest {
        let url = Url::parse("https://cmr.earthdata.nasa.gov/search/granules.json").expect("valid url");
        let mut request = SearchRequest::new(Method::Get, url);
        request.query.push(("concept_id[]".into(), "C1-A".into()));
        request.query.push(("concept_id[]".into(), "C2-B".into()));
        request.query.push(("page_size".into(), "10".into()));
        request.headers.insert("Authorization".into(), "Bearer abcdefghijklmnop".into());
        request
    }

    #[test]
    fn full_url_repeats_list_keys_in_order() {
        let url = request().full_url();
        assert_eq!(
            url.query(),
            Some("concept_id%5B%5D=C1-A&concept_id%5B%5D=C2-B&page_size=10")
        );
    }

    #[test]
    fn query_lookup_returns_all_repeated_values() {
        let request = request();
        assert_eq!(request.query_values("concept_id[]"), vec!["C1-A", "C2-B"]);
        assert_eq!(request.query_value("page_size"), Some("10"));
        assert_eq!(request.header("authorization"), Some("Bearer abcdefghijklmnop"));
    }

    #[test]
    fn redacted_headers_hide_credentials() {
        let headers = request().redacted_headers();
        assert_eq!(headers.get("Authorization").map(String::as_str), Some("<redacted>"));
    }

    #[test]
    fn missing_hits_header_counts_as_zero() {
        let response = SearchResponse::new(200, "{}");
        assert_eq!(response.reported_hits(), None);
        assert_eq!(response.hits(), 0);

        let response = response.with_header("CMR-Hits", "2500").with_header("CMR-Search-After", "[\"a\",1]");
        assert_eq!(response.hits(), 2500);
        assert_eq!(response.search_after(), Some("[\"a\",1]"));
    }
}
