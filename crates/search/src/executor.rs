//! Paginated execution.
//!
//! [`Results`] is an explicit state machine: `Init` sends the first page,
//! `Fetching` pulls another page whenever its buffer runs dry, and the
//! iterator ends in `Exhausted` or, after yielding one error, `Failed`.

use std::{collections::VecDeque, fmt};

use cmr_api::{SearchRequest, SearchResponse};
use cmr_types::EntityKind;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::QueryError,
    format::{ParseStrategy, extract_records},
    query::Query,
};

/// Largest page the service returns.
pub const MAX_PAGE_SIZE: u64 = 2000;

/// One item yielded by a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchItem {
    /// A parsed JSON record.
    Record(Value),
    /// A whole response body in a non-JSON format.
    Page(String),
}

impl SearchItem {
    pub fn as_record(&self) -> Option<&Value> {
        match self {
            Self::Record(record) => Some(record),
            Self::Page(_) => None,
        }
    }

    pub fn as_page(&self) -> Option<&str> {
        match self {
            Self::Page(page) => Some(page),
            Self::Record(_) => None,
        }
    }
}

impl fmt::Display for SearchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(record) => write!(f, "{record}"),
            Self::Page(page) => f.write_str(page),
        }
    }
}

/// How consecutive pages are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStrategy {
    /// Echo the `CMR-Search-After` token from the previous response.
    SearchAfter,
    /// Send an `offset` equal to the number of records already fetched.
    Offset,
}

impl PagingStrategy {
    pub fn for_entity(entity: EntityKind) -> Self {
        match entity {
            EntityKind::Granule | EntityKind::Collection => Self::SearchAfter,
            EntityKind::Tool | EntityKind::Service | EntityKind::Variable => Self::Offset,
        }
    }
}

/// Progress through a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: u64,
    pub search_after: Option<String>,
    pub fetched: u64,
    /// Total reported by the first page, when the service sent one.
    pub total_hits: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultsState {
    Init,
    Fetching,
    Exhausted,
    Failed,
}

/// Lazy page-by-page iterator over search items.
///
/// Exhaustion yields `None`; a failure yields one `Some(Err(..))` and then `None`.
pub struct Results<'q> {
    query: &'q Query,
    strategy: PagingStrategy,
    page_size: u64,
    limit: Option<u64>,
    cursor: PageCursor,
    buffer: VecDeque<SearchItem>,
    state: ResultsState,
    pages: u64,
}

impl<'q> Results<'q> {
    fn new(query: &'q Query, page_size: u64, limit: Option<u64>) -> Self {
        Self {
            query,
            strategy: PagingStrategy::for_entity(query.entity()),
            page_size,
            limit,
            cursor: PageCursor::default(),
            buffer: VecDeque::new(),
            state: ResultsState::Init,
            pages: 0,
        }
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// Number of page requests sent so far.
    pub fn pages_fetched(&self) -> u64 {
        self.pages
    }

    /// Size of the next request, or zero when nothing is left to ask for.
    fn next_page_size(&self) -> u64 {
        let mut size = self.page_size.min(MAX_PAGE_SIZE);
        if let Some(limit) = self.limit {
            size = size.min(limit.saturating_sub(self.cursor.fetched));
        }
        if let Some(total) = self.cursor.total_hits {
            size = size.min(total.saturating_sub(self.cursor.fetched));
        }
        size
    }

    fn page_request(&self, size: u64) -> Result<SearchRequest, QueryError> {
        let mut paging = vec![("page_size".to_string(), size.to_string())];
        if self.strategy == PagingStrategy::Offset && self.cursor.offset > 0 {
            paging.push(("offset".to_string(), self.cursor.offset.to_string()));
        }
        let search_after = match self.strategy {
            PagingStrategy::SearchAfter => self.cursor.search_after.as_deref(),
            PagingStrategy::Offset => None,
        };
        self.query.build_request(&paging, search_after)
    }

    fn fetch_page(&mut self) -> Result<(), QueryError> {
        if self.page_size == 0 {
            return Err(QueryError::invalid_value("page_size", "page size must be at least 1"));
        }
        let size = self.next_page_size();
        if size == 0 {
            self.state = ResultsState::Exhausted;
            return Ok(());
        }

        let request = self.page_request(size)?;
        debug!(
            entity = %self.query.entity(),
            method = ?request.method,
            url = %request.url,
            page_size = size,
            offset = self.cursor.offset,
            "cmr page request started"
        );
        let response = ensure_success(self.query.transport().send(&request)?)?;
        self.pages += 1;

        if self.cursor.total_hits.is_none() {
            self.cursor.total_hits = response.reported_hits();
            if let Some(total) = self.cursor.total_hits {
                self.query.hits_cache.set(Some(total));
            }
        }
        let remaining_total = self
            .cursor
            .total_hits
            .map(|total| total.saturating_sub(self.cursor.fetched));

        let entity = self.query.entity();
        let received = match self.query.state().format().parse_strategy(entity) {
            ParseStrategy::JsonRecords(path) => {
                let records = extract_records(&response.body, path, response.hits())?;
                let received = records.len() as u64;
                self.buffer.extend(records.into_iter().map(SearchItem::Record));
                received
            }
            ParseStrategy::RawPage => {
                // Raw bodies cannot be counted; assume a full page bounded by the
                // total, where a missing count header means zero.
                let received = size.min(remaining_total.unwrap_or(response.hits()));
                if received > 0 {
                    self.buffer.push_back(SearchItem::Page(response.body.clone()));
                }
                received
            }
        };

        self.cursor.fetched += received;
        self.cursor.offset += received;
        self.cursor.search_after = response.search_after().map(str::to_string);

        let limit_reached = self.limit.is_some_and(|limit| self.cursor.fetched >= limit);
        let total_reached = self.cursor.total_hits.is_some_and(|total| self.cursor.fetched >= total);
        let scroll_ended = self.strategy == PagingStrategy::SearchAfter && self.cursor.search_after.is_none();
        let exhausted = received == 0 || received < size || limit_reached || total_reached || scroll_ended;

        debug!(
            entity = %entity,
            status = response.status,
            received,
            fetched = self.cursor.fetched,
            total_hits = ?self.cursor.total_hits,
            exhausted,
            "cmr page received"
        );
        self.state = if exhausted {
            ResultsState::Exhausted
        } else {
            ResultsState::Fetching
        };
        Ok(())
    }
}

impl Iterator for Results<'_> {
    type Item = Result<SearchItem, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            match self.state {
                ResultsState::Init | ResultsState::Fetching => {
                    if let Err(error) = self.fetch_page() {
                        self.state = ResultsState::Failed;
                        return Some(Err(error));
                    }
                }
                ResultsState::Exhausted | ResultsState::Failed => return None,
            }
        }
    }
}

impl fmt::Debug for Results<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Results")
            .field("strategy", &self.strategy)
            .field("page_size", &self.page_size)
            .field("limit", &self.limit)
            .field("cursor", &self.cursor)
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .finish()
    }
}

fn ensure_success(response: SearchResponse) -> Result<SearchResponse, QueryError> {
    if response.is_success() {
        return Ok(response);
    }
    warn!(status = response.status, "cmr request failed");
    Err(QueryError::RemoteRequestFailed {
        status: response.status,
        body: response.body,
    })
}

impl Query {
    /// Total number of matching records, from a zero-size request.
    ///
    /// The count is remembered until the query is changed.
    pub fn hits(&self) -> Result<u64, QueryError> {
        self.validate()?;
        if let Some(hits) = self.hits_cache.get() {
            return Ok(hits);
        }
        let request = self.build_request(&[("page_size".to_string(), "0".to_string())], None)?;
        debug!(entity = %self.entity(), url = %request.url, "cmr hits request started");
        let response = ensure_success(self.transport().send(&request)?)?;
        let hits = response.hits();
        self.hits_cache.set(Some(hits));
        Ok(hits)
    }

    /// Fetch up to `limit` items, spanning as many pages as needed.
    pub fn get(&self, limit: u64) -> Result<Vec<SearchItem>, QueryError> {
        self.validate()?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        Results::new(self, MAX_PAGE_SIZE, Some(limit)).collect()
    }

    /// Fetch every matching item. Costs one extra request to learn the total.
    pub fn get_all(&self) -> Result<Vec<SearchItem>, QueryError> {
        let hits = self.hits()?;
        self.get(hits)
    }

    /// Iterate lazily, one request per `page_size` items.
    pub fn results(&self, page_size: u64) -> Results<'_> {
        Results::new(self, page_size, None)
    }
}
