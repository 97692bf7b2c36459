//! The fluent, validating query builder.

use std::{cell::Cell, fmt, sync::Arc};

use cmr_api::{HttpTransport, Method, SEARCH_AFTER_HEADER, SearchRequest, Transport};
use cmr_types::{EntityKind, Environment, SpatialFilter};
use tracing::debug;
use url::Url;

use crate::{
    catalog::OPTION_KEYS,
    error::QueryError,
    format::OutputFormat,
    registry::ParameterRegistry,
    state::{Authorization, QueryState},
    value::ParamValue,
};

/// Encoded query strings longer than this are sent as a form body.
pub const POST_THRESHOLD: usize = 4000;

/// A search against one entity type.
///
/// Every setter validates its input before touching the query, so a failed
/// call leaves the query exactly as it was. Setters return `&mut Self` to
/// allow chaining:
///
/// ```ignore
/// let granules = Query::granules()?
///     .short_name("AST_L1T")?
///     .temporal("2016-10-10", "2016-10-12")?
///     .bounding_box(-10, 20, 30, 40)?
///     .get(100)?;
/// ```
pub struct Query {
    state: QueryState,
    registry: &'static ParameterRegistry,
    transport: Arc<dyn Transport>,
    pub(crate) hits_cache: Cell<Option<u64>>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("state", &self.state)
            .field("hits_cache", &self.hits_cache.get())
            .finish_non_exhaustive()
    }
}

impl Query {
    /// A query using the default HTTP transport.
    pub fn new(entity: EntityKind) -> Result<Self, QueryError> {
        Ok(Self::with_transport(entity, Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(entity: EntityKind, transport: Arc<dyn Transport>) -> Self {
        Self {
            state: QueryState::new(entity),
            registry: ParameterRegistry::for_entity(entity),
            transport,
            hits_cache: Cell::new(None),
        }
    }

    pub fn collections() -> Result<Self, QueryError> {
        Self::new(EntityKind::Collection)
    }

    pub fn granules() -> Result<Self, QueryError> {
        Self::new(EntityKind::Granule)
    }

    pub fn tools() -> Result<Self, QueryError> {
        Self::new(EntityKind::Tool)
    }

    pub fn services() -> Result<Self, QueryError> {
        Self::new(EntityKind::Service)
    }

    pub fn variables() -> Result<Self, QueryError> {
        Self::new(EntityKind::Variable)
    }

    pub fn entity(&self) -> EntityKind {
        self.state.entity()
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn registry(&self) -> &'static ParameterRegistry {
        self.registry
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Mutable state; any change forgets the memoised hit count.
    fn state_mut(&mut self) -> &mut QueryState {
        self.hits_cache.set(None);
        &mut self.state
    }

    /// Set a registered parameter by name with positional arguments.
    pub fn set<I, V>(&mut self, name: &str, arguments: I) -> Result<&mut Self, QueryError>
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        let arguments: Vec<ParamValue> = arguments.into_iter().map(Into::into).collect();
        self.registry.apply(&mut self.state, name, &arguments)?;
        self.hits_cache.set(None);
        Ok(self)
    }

    /// Set several parameters at once. Tuple values are spread into
    /// positional arguments; anything else is passed as a single argument.
    ///
    /// Besides registered filters, the names of the non-filter builder
    /// methods (`format`, `mode`, `token`, `bearer_token`, `header`, `option`,
    /// `temporal_excluding_boundary`, `orbit_range`) are accepted.
    pub fn parameters<I, K, V>(&mut self, entries: I) -> Result<&mut Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        for (name, value) in entries {
            let name = name.as_ref();
            let value: ParamValue = value.into();
            let arguments = value.into_arguments();
            match BUILDER_SETTERS.iter().find(|(setter, _)| *setter == name) {
                Some((_, apply)) => apply(self, &arguments)?,
                None => {
                    self.set(name, arguments)?;
                }
            }
        }
        Ok(self)
    }

    /// Attach a boolean qualifier, sent as `options[parameter][key]`.
    pub fn option(&mut self, parameter: &str, key: &str, value: bool) -> Result<&mut Self, QueryError> {
        let known_parameter =
            self.registry.contains(parameter) || (parameter == "spatial" && self.registry.supports_spatial());
        if !known_parameter {
            return Err(QueryError::unknown_parameter(parameter, self.entity()));
        }
        if !OPTION_KEYS.contains(&key) {
            return Err(QueryError::invalid_value(
                "options",
                format!("'{key}' is not one of {}", OPTION_KEYS.join(", ")),
            ));
        }
        self.state_mut().set_option(parameter, key, value);
        Ok(self)
    }

    /// Authenticate with an Echo or Launchpad token. Replaces any earlier credential.
    pub fn token(&mut self, token: &str) -> Result<&mut Self, QueryError> {
        let token = required_credential("token", token)?;
        self.state_mut().set_authorization(Authorization::Token(token));
        Ok(self)
    }

    /// Authenticate with an Earthdata Login bearer token. Replaces any earlier credential.
    pub fn bearer_token(&mut self, token: &str) -> Result<&mut Self, QueryError> {
        let token = required_credential("bearer_token", token)?;
        self.state_mut().set_authorization(Authorization::Bearer(token));
        Ok(self)
    }

    /// Add a request header. `Authorization` goes to the credential slot.
    pub fn header(&mut self, name: &str, value: &str) -> Result<&mut Self, QueryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(QueryError::invalid_value("header", "header name must not be empty"));
        }
        if name.eq_ignore_ascii_case("authorization") {
            return match value.trim().strip_prefix("Bearer ") {
                Some(token) => self.bearer_token(token),
                None => self.token(value),
            };
        }
        self.state_mut().set_header(name, value.to_string());
        Ok(self)
    }

    /// Choose the response format. An empty name selects JSON.
    pub fn format(&mut self, name: &str) -> Result<&mut Self, QueryError> {
        let format = OutputFormat::negotiate(name, self.entity())?;
        self.state_mut().set_format(format);
        Ok(self)
    }

    /// Target a deployment environment.
    pub fn mode(&mut self, environment: Environment) -> &mut Self {
        self.state_mut().set_environment(environment);
        self
    }

    pub fn concept_id(&mut self, ids: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("concept_id", [ids])
    }

    pub fn provider(&mut self, provider: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("provider", [provider])
    }

    pub fn native_id(&mut self, ids: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("native_id", [ids])
    }

    pub fn short_name(&mut self, short_name: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("short_name", [short_name])
    }

    pub fn version(&mut self, version: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("version", [version])
    }

    pub fn entry_title(&mut self, entry_title: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("entry_title", [entry_title])
    }

    pub fn platform(&mut self, platform: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("platform", [platform])
    }

    pub fn instrument(&mut self, instrument: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("instrument", [instrument])
    }

    /// Sort results; prefix with `-` for descending order.
    pub fn sort_key(&mut self, sort_key: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("sort_key", [sort_key])
    }

    /// Restrict to a time window. Either bound may be `None` or blank for an
    /// open side; passing two open bounds removes the temporal filter.
    pub fn temporal(
        &mut self,
        start: impl Into<ParamValue>,
        end: impl Into<ParamValue>,
    ) -> Result<&mut Self, QueryError> {
        self.set("temporal", [start.into(), end.into()])
    }

    /// Like [`Query::temporal`], but records touching only a boundary do not match.
    pub fn temporal_excluding_boundary(
        &mut self,
        start: impl Into<ParamValue>,
        end: impl Into<ParamValue>,
    ) -> Result<&mut Self, QueryError> {
        self.set("temporal", [start.into(), end.into(), ParamValue::Bool(true)])
    }

    pub fn revision_date(
        &mut self,
        start: impl Into<ParamValue>,
        end: impl Into<ParamValue>,
    ) -> Result<&mut Self, QueryError> {
        self.set("revision_date", [start.into(), end.into()])
    }

    pub fn point(&mut self, lon: impl Into<ParamValue>, lat: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("point", [lon.into(), lat.into()])
    }

    pub fn bounding_box(
        &mut self,
        lower_left_lon: impl Into<ParamValue>,
        lower_left_lat: impl Into<ParamValue>,
        upper_right_lon: impl Into<ParamValue>,
        upper_right_lat: impl Into<ParamValue>,
    ) -> Result<&mut Self, QueryError> {
        self.set(
            "bounding_box",
            [
                lower_left_lon.into(),
                lower_left_lat.into(),
                upper_right_lon.into(),
                upper_right_lat.into(),
            ],
        )
    }

    /// Closed counter-clockwise ring of `(lon, lat)` pairs.
    ///
    /// Fails with [`QueryError::InvalidPolygon`] when the ring has fewer than
    /// four points, is not closed, is wound clockwise, or encloses no area.
    pub fn polygon<I, P>(&mut self, coordinates: I) -> Result<&mut Self, QueryError>
    where
        I: IntoIterator<Item = P>,
        P: Into<ParamValue>,
    {
        self.set("polygon", [coordinate_list(coordinates)])
    }

    pub fn line<I, P>(&mut self, coordinates: I) -> Result<&mut Self, QueryError>
    where
        I: IntoIterator<Item = P>,
        P: Into<ParamValue>,
    {
        self.set("line", [coordinate_list(coordinates)])
    }

    /// Circle around a point; the radius is in meters.
    pub fn circle(
        &mut self,
        lon: impl Into<ParamValue>,
        lat: impl Into<ParamValue>,
        radius_meters: impl Into<ParamValue>,
    ) -> Result<&mut Self, QueryError> {
        self.set("circle", [lon.into(), lat.into(), radius_meters.into()])
    }

    /// Match any of several points. Repeated calls add points.
    pub fn multi_point<I, P>(&mut self, coordinates: I) -> Result<&mut Self, QueryError>
    where
        I: IntoIterator<Item = P>,
        P: Into<ParamValue>,
    {
        self.set("multi_point", [coordinate_list(coordinates)])
    }

    /// Only records that are online and not downloadable. Clears `downloadable`.
    pub fn online_only(&mut self, online_only: bool) -> Result<&mut Self, QueryError> {
        self.set("online_only", [online_only])
    }

    /// Only downloadable records. Clears `online_only`.
    pub fn downloadable(&mut self, downloadable: bool) -> Result<&mut Self, QueryError> {
        self.set("downloadable", [downloadable])
    }

    pub fn orbit_number(&mut self, orbit: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("orbit_number", [orbit])
    }

    /// Inclusive range of orbits.
    pub fn orbit_range(
        &mut self,
        first: impl Into<ParamValue>,
        last: impl Into<ParamValue>,
    ) -> Result<&mut Self, QueryError> {
        self.set("orbit_number", [first.into(), last.into()])
    }

    /// `day`, `night` or `unspecified`.
    pub fn day_night_flag(&mut self, flag: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("day_night_flag", [flag])
    }

    /// Cloud cover percentage window; a blank bound leaves that side open.
    pub fn cloud_cover(
        &mut self,
        minimum: impl Into<ParamValue>,
        maximum: impl Into<ParamValue>,
    ) -> Result<&mut Self, QueryError> {
        self.set("cloud_cover", [minimum.into(), maximum.into()])
    }

    pub fn granule_ur(&mut self, granule_ur: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("granule_ur", [granule_ur])
    }

    /// Wildcard match on the readable granule name (`*` and `?`).
    pub fn readable_granule_name(&mut self, names: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("readable_granule_name", [names])
    }

    pub fn archive_center(&mut self, center: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("archive_center", [center])
    }

    /// Case-insensitive search across summary, science keywords and similar fields.
    pub fn keyword(&mut self, text: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("keyword", [text])
    }

    pub fn tool_concept_id(&mut self, ids: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("tool_concept_id", [ids])
    }

    pub fn service_concept_id(&mut self, ids: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("service_concept_id", [ids])
    }

    pub fn cloud_hosted(&mut self, cloud_hosted: bool) -> Result<&mut Self, QueryError> {
        self.set("cloud_hosted", [cloud_hosted])
    }

    pub fn name(&mut self, name: impl Into<ParamValue>) -> Result<&mut Self, QueryError> {
        self.set("name", [name])
    }

    /// Checks that depend on more than one parameter.
    pub fn validate(&self) -> Result<(), QueryError> {
        let needs_collection = self.entity() == EntityKind::Granule && self.state.spatial().is_some();
        if needs_collection && !["short_name", "entry_title"].iter().any(|name| self.state.has_parameter(name)) {
            return Err(QueryError::MissingCollectionFilter { entity: self.entity() });
        }
        Ok(())
    }

    /// Search endpoint for the current environment, entity and format.
    pub fn url(&self) -> Result<Url, QueryError> {
        let address = format!(
            "{}{}.{}",
            self.state.environment().base_url(),
            self.entity().route(),
            self.state.format().extension()
        );
        Url::parse(&address).map_err(|error| QueryError::invalid_value("mode", error.to_string()))
    }

    /// Build a request carrying the query plus paging pairs and an optional scroll token.
    pub(crate) fn build_request(
        &self,
        paging: &[(String, String)],
        search_after: Option<&str>,
    ) -> Result<SearchRequest, QueryError> {
        self.validate()?;
        let mut request = SearchRequest::new(Method::Get, self.url()?);
        request.query = self.state.query_pairs();
        request.query.extend(paging.iter().cloned());
        request.headers = self.state.request_headers();
        if let Some(token) = search_after {
            request.headers.insert(SEARCH_AFTER_HEADER.to_string(), token.to_string());
        }
        if request.encoded_query_len() > POST_THRESHOLD {
            debug!(url = %request.url, length = request.encoded_query_len(), "query too long for GET, sending as form body");
            request.method = Method::Post;
        }
        Ok(request)
    }

    /// The request the first page of `get` would send, for previews.
    pub fn request(&self, page_size: u64) -> Result<SearchRequest, QueryError> {
        self.build_request(&[("page_size".to_string(), page_size.to_string())], None)
    }

    /// True when the query has a spatial filter of the given kind.
    pub fn has_spatial(&self, matches: impl Fn(&SpatialFilter) -> bool) -> bool {
        self.state.spatial().is_some_and(matches)
    }
}

/// Builder methods reachable by name from [`Query::parameters`].
type BuilderSetter = fn(&mut Query, &[ParamValue]) -> Result<(), QueryError>;

const BUILDER_SETTERS: &[(&str, BuilderSetter)] = &[
    ("format", set_format),
    ("mode", set_mode),
    ("token", set_token),
    ("bearer_token", set_bearer_token),
    ("header", set_header),
    ("option", set_option),
    ("temporal_excluding_boundary", set_temporal_excluding_boundary),
    ("orbit_range", set_orbit_range),
];

fn set_format(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [name] = exact_arguments::<1>("format", arguments)?;
    query.format(text_argument("format", name)?)?;
    Ok(())
}

fn set_mode(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [name] = exact_arguments::<1>("mode", arguments)?;
    let environment = text_argument("mode", name)?
        .parse::<Environment>()
        .map_err(|error| QueryError::invalid_value("mode", error.to_string()))?;
    query.mode(environment);
    Ok(())
}

fn set_token(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [token] = exact_arguments::<1>("token", arguments)?;
    query.token(text_argument("token", token)?)?;
    Ok(())
}

fn set_bearer_token(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [token] = exact_arguments::<1>("bearer_token", arguments)?;
    query.bearer_token(text_argument("bearer_token", token)?)?;
    Ok(())
}

fn set_header(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [name, value] = exact_arguments::<2>("header", arguments)?;
    query.header(text_argument("header", name)?, text_argument("header", value)?)?;
    Ok(())
}

fn set_option(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [parameter, key, value] = exact_arguments::<3>("options", arguments)?;
    let value = value
        .as_bool()
        .ok_or_else(|| QueryError::invalid_value("options", format!("'{value}' is not a boolean")))?;
    query.option(text_argument("options", parameter)?, text_argument("options", key)?, value)?;
    Ok(())
}

fn set_temporal_excluding_boundary(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [start, end] = exact_arguments::<2>("temporal", arguments)?;
    query.temporal_excluding_boundary(start.clone(), end.clone())?;
    Ok(())
}

fn set_orbit_range(query: &mut Query, arguments: &[ParamValue]) -> Result<(), QueryError> {
    let [first, last] = exact_arguments::<2>("orbit_number", arguments)?;
    query.orbit_range(first.clone(), last.clone())?;
    Ok(())
}

fn exact_arguments<'a, const N: usize>(
    parameter: &str,
    arguments: &'a [ParamValue],
) -> Result<&'a [ParamValue; N], QueryError> {
    arguments
        .try_into()
        .map_err(|_| QueryError::invalid_value(parameter, format!("expected {N} value(s), got {}", arguments.len())))
}

fn text_argument<'a>(parameter: &str, value: &'a ParamValue) -> Result<&'a str, QueryError> {
    value
        .as_text()
        .ok_or_else(|| QueryError::invalid_value(parameter, format!("'{value}' is not text")))
}

fn required_credential(parameter: &str, value: &str) -> Result<String, QueryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(QueryError::invalid_value(parameter, "a non-empty token is required"));
    }
    Ok(value.to_string())
}

fn coordinate_list<I, P>(coordinates: I) -> ParamValue
where
    I: IntoIterator<Item = P>,
    P: Into<ParamValue>,
{
    ParamValue::List(
        coordinates
            .into_iter()
            .map(|pair| {
                let pair: ParamValue = pair.into();
                match pair {
                    ParamValue::Tuple(items) => ParamValue::List(items),
                    other => other,
                }
            })
            .collect(),
    )
}
