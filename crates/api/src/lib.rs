//! CMR search transport.
//!
//! This crate is the seam between the query engine and the network:
//!
//! - [`SearchRequest`] / [`SearchResponse`] describe one round trip
//! - [`Transport`] is the capability to perform it
//! - [`HttpTransport`] is the default blocking `reqwest` implementation
//!
//! Tests and embedders can supply their own [`Transport`] to script
//! responses without touching the network.
//!
//! # Example
//!
//! ```ignore
//! use cmr_api::{HttpTransport, Method, SearchRequest, Transport};
//!
//! let transport = HttpTransport::new()?;
//! let url = url::Url::parse("https://cmr.earthdata.nasa.gov/search/collections.json")?;
//! let mut request = SearchRequest::new(Method::Get, url);
//! request.query.push(("page_size".into(), "0".into()));
//! let response = transport.send(&request)?;
//! println!("hits: {}", response.hits());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod redact;
mod request;
mod transport;

pub use error::TransportError;
pub use redact::redact_sensitive;
pub use request::{HITS_HEADER, Method, SEARCH_AFTER_HEADER, SearchRequest, SearchResponse};
pub use transport::{ClientConfig, HttpTransport, Transport};
