#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use cmr_api::{SearchRequest, SearchResponse, Transport, TransportError};
use serde_json::json;

/// In-memory search service holding `total` numbered records.
///
/// Honours `page_size`, `offset` and the scroll header, and records every
/// request it receives.
pub struct SimulatedCmr {
    total: u64,
    fail_from_request: Option<usize>,
    report_hits: bool,
    requests: Mutex<Vec<SearchRequest>>,
}

impl SimulatedCmr {
    pub fn new(total: u64) -> Arc<Self> {
        Arc::new(Self {
            total,
            fail_from_request: None,
            report_hits: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answer every request from the n-th (zero based) onwards with HTTP 500.
    pub fn failing_from(total: u64, request_index: usize) -> Arc<Self> {
        Arc::new(Self {
            total,
            fail_from_request: Some(request_index),
            report_hits: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Never send the hits header.
    pub fn without_hits_header(total: u64) -> Arc<Self> {
        Arc::new(Self {
            total,
            fail_from_request: None,
            report_hits: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    pub fn page_sizes(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .filter_map(|request| request.query_value("page_size")?.parse().ok())
            .collect()
    }

    fn start_of(&self, request: &SearchRequest) -> u64 {
        if let Some(token) = request.header("cmr-search-after") {
            return token.trim_start_matches("token-").parse().unwrap_or(0);
        }
        request
            .query_value("offset")
            .and_then(|offset| offset.parse().ok())
            .unwrap_or(0)
    }
}

impl Transport for SimulatedCmr {
    fn send(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        let index = {
            let mut requests = self.requests.lock().map_err(|_| TransportError::unavailable("poisoned"))?;
            requests.push(request.clone());
            requests.len() - 1
        };
        if self.fail_from_request.is_some_and(|first| index >= first) {
            return Ok(SearchResponse::new(500, r#"{"errors":["internal error"]}"#));
        }

        let page_size: u64 = request
            .query_value("page_size")
            .and_then(|size| size.parse().ok())
            .unwrap_or(10);
        let start = self.start_of(request);
        let end = (start + page_size).min(self.total);
        let ids: Vec<_> = (start..end).map(|id| json!({ "id": format!("R{id}") })).collect();

        let path = request.url.path();
        let body = if path.ends_with(".json") {
            if path.contains("/granules") || path.contains("/collections") {
                json!({ "feed": { "entry": ids } }).to_string()
            } else {
                json!({ "hits": self.total, "items": ids }).to_string()
            }
        } else {
            format!("<results start=\"{start}\" end=\"{end}\"/>")
        };

        let mut response = SearchResponse::new(200, body);
        if self.report_hits {
            response.insert_header("CMR-Hits", self.total.to_string());
        }
        if end > start {
            response.insert_header("CMR-Search-After", format!("token-{end}"));
        }
        Ok(response)
    }
}

/// Plays back canned responses in order.
pub struct ScriptedTransport {
    responses: Mutex<Vec<SearchResponse>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<SearchResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.responses
            .lock()
            .map_err(|_| TransportError::unavailable("poisoned"))?
            .pop()
            .ok_or_else(|| TransportError::unavailable("no scripted response left"))
    }
}
