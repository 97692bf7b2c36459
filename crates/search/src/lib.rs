//! Query construction and paginated execution for the CMR search API.
//!
//! - [`Query`] accumulates filters through a validating, chainable interface
//! - [`ParameterRegistry`] maps parameter names to encoders and validators per entity type
//! - [`OutputFormat`] negotiates the response representation
//! - [`Query::get`], [`Query::get_all`], [`Query::hits`] and [`Query::results`]
//!   run the query against a [`cmr_api::Transport`]
//!
//! ```ignore
//! use cmr_search::Query;
//!
//! let mut query = Query::collections()?;
//! query.keyword("sea surface temperature")?.cloud_hosted(true)?;
//! println!("{} collections", query.hits()?);
//! for item in query.results(100).take(5) {
//!     println!("{}", item?);
//! }
//! # Ok::<(), cmr_search::QueryError>(())
//! ```

mod catalog;
mod error;
mod executor;
mod format;
mod query;
mod registry;
mod spatial;
mod state;
mod temporal;
mod validators;
mod value;

pub use catalog::{COLLECTION_SORT_KEYS, DAY_NIGHT_FLAGS, GRANULE_SORT_KEYS, OPTION_KEYS};
pub use cmr_types::{EntityKind, Environment, Point, SpatialFilter, TemporalRange};
pub use error::QueryError;
pub use executor::{MAX_PAGE_SIZE, PageCursor, PagingStrategy, Results, SearchItem};
pub use format::{OutputFormat, ParseStrategy, extract_records};
pub use query::{POST_THRESHOLD, Query};
pub use registry::{Encoder, ParameterRegistry, ParameterSpec, Validator};
pub use state::{Assignment, Authorization, QueryState};
pub use validators::format_number;
pub use value::ParamValue;
