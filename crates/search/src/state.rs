//! Accumulated query state and its wire rendering.

use cmr_types::{EntityKind, Environment, SpatialFilter, TemporalRange};
use indexmap::IndexMap;

use crate::{format::OutputFormat, spatial};

/// The single credential a query carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Legacy Echo/Launchpad token, sent as the raw header value.
    Token(String),
    /// Earthdata Login token, sent as `Bearer <token>`.
    Bearer(String),
}

impl Authorization {
    pub fn header_value(&self) -> String {
        match self {
            Self::Token(token) => token.clone(),
            Self::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

/// What an encoded parameter contributes to the query.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// Ordered query pairs. An empty list clears the parameter.
    Pairs(Vec<(String, String)>),
    Spatial(SpatialFilter),
    Temporal {
        range: TemporalRange,
        exclude_boundary: bool,
    },
}

/// Everything a query has accumulated. Two queries built the same way
/// compare equal regardless of whether they used fluent or bulk calls.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    entity: EntityKind,
    params: IndexMap<String, Vec<String>>,
    spatial: Option<SpatialFilter>,
    temporal: Option<TemporalRange>,
    options: IndexMap<String, IndexMap<String, bool>>,
    headers: IndexMap<String, String>,
    authorization: Option<Authorization>,
    environment: Environment,
    format: OutputFormat,
}

impl QueryState {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            params: IndexMap::new(),
            spatial: None,
            temporal: None,
            options: IndexMap::new(),
            headers: IndexMap::new(),
            authorization: None,
            environment: Environment::default(),
            format: OutputFormat::default(),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn spatial(&self) -> Option<&SpatialFilter> {
        self.spatial.as_ref()
    }

    pub fn temporal(&self) -> Option<&TemporalRange> {
        self.temporal.as_ref()
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn options(&self) -> &IndexMap<String, IndexMap<String, bool>> {
        &self.options
    }

    /// Values recorded for a parameter under either its scalar or list key.
    pub fn values(&self, name: &str) -> Vec<&str> {
        [name.to_string(), format!("{name}[]")]
            .iter()
            .filter_map(|key| self.params.get(key))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        match name {
            "temporal" => self.temporal.is_some(),
            _ if self.spatial.as_ref().is_some_and(|filter| filter.parameter_name() == name) => true,
            _ => !self.values(name).is_empty(),
        }
    }

    pub(crate) fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }

    pub(crate) fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    pub(crate) fn set_authorization(&mut self, authorization: Authorization) {
        self.authorization = Some(authorization);
    }

    pub(crate) fn set_header(&mut self, name: &str, value: String) {
        self.headers.insert(name.to_string(), value);
    }

    pub(crate) fn set_option(&mut self, parameter: &str, key: &str, value: bool) {
        self.options
            .entry(parameter.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn clear_option(&mut self, parameter: &str, key: &str) {
        if let Some(qualifiers) = self.options.get_mut(parameter) {
            qualifiers.shift_remove(key);
            if qualifiers.is_empty() {
                self.options.shift_remove(parameter);
            }
        }
    }

    /// Forget every value recorded for a parameter.
    pub(crate) fn remove_parameter(&mut self, name: &str) {
        self.params.shift_remove(name);
        self.params.shift_remove(&format!("{name}[]"));
        if self.spatial.as_ref().is_some_and(|filter| filter.parameter_name() == name) {
            self.spatial = None;
        }
    }

    /// Record an encoded parameter. Single-valued parameters replace what was
    /// there; multi-valued ones append.
    pub(crate) fn assign(&mut self, name: &str, multi_valued: bool, assignment: Assignment) {
        match assignment {
            Assignment::Pairs(pairs) => {
                if !multi_valued {
                    self.remove_parameter(name);
                }
                for (key, value) in pairs {
                    self.params.entry(key).or_default().push(value);
                }
            }
            Assignment::Spatial(filter) => {
                self.spatial = match (self.spatial.take(), filter) {
                    (Some(SpatialFilter::MultiPoint(mut existing)), SpatialFilter::MultiPoint(added)) => {
                        existing.extend(added);
                        Some(SpatialFilter::MultiPoint(existing))
                    }
                    (_, replacement) => Some(replacement),
                };
            }
            Assignment::Temporal {
                range,
                exclude_boundary,
            } => {
                if range.is_unbounded() {
                    self.temporal = None;
                    self.clear_option("temporal", "exclude_boundary");
                    return;
                }
                self.temporal = Some(range);
                if exclude_boundary {
                    self.set_option("temporal", "exclude_boundary", true);
                }
            }
        }
    }

    /// Ordered query pairs: filters, spatial, temporal, then option qualifiers.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .params
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.clone(), value.clone())))
            .collect();

        if let Some(filter) = &self.spatial {
            pairs.extend(spatial::wire_pairs(filter));
        }
        if let Some(range) = &self.temporal {
            pairs.push(("temporal[]".to_string(), range.to_wire()));
        }

        let mut options = self.options.clone();
        if matches!(self.spatial, Some(SpatialFilter::MultiPoint(_))) {
            options
                .entry("spatial".to_string())
                .or_default()
                .entry("or".to_string())
                .or_insert(true);
        }
        for (parameter, qualifiers) in &options {
            for (key, value) in qualifiers {
                pairs.push((format!("options[{parameter}][{key}]"), value.to_string()));
            }
        }
        pairs
    }

    /// Headers sent with every request: content negotiation, extras, credentials.
    pub fn request_headers(&self) -> IndexMap<String, String> {
        let mut headers = IndexMap::new();
        headers.insert("Accept".to_string(), self.format.accept());
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(authorization) = &self.authorization {
            headers.insert("Authorization".to_string(), authorization.header_value());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cmr_types::Point;

    #[test]
    fn single_valued_parameters_replace_and_lists_append() {
        let mut state = QueryState::new(EntityKind::Collection);
        state.assign("short_name", false, Assignment::Pairs(vec![("short_name".into(), "A".into())]));
        state.assign("short_name", false, Assignment::Pairs(vec![("short_name".into(), "B".into())]));
        state.assign("concept_id", true, Assignment::Pairs(vec![("concept_id[]".into(), "C1-A".into())]));
        state.assign("concept_id", true, Assignment::Pairs(vec![("concept_id[]".into(), "C2-A".into())]));

        assert_eq!(state.values("short_name"), vec!["B"]);
        assert_eq!(state.values("concept_id"), vec!["C1-A", "C2-A"]);
    }

    #[test]
    fn multi_point_extends_and_other_shapes_replace() {
        let mut state = QueryState::new(EntityKind::Collection);
        state.assign("multi_point", true, Assignment::Spatial(SpatialFilter::MultiPoint(vec![Point::new(1.0, 2.0)])));
        state.assign("multi_point", true, Assignment::Spatial(SpatialFilter::MultiPoint(vec![Point::new(3.0, 4.0)])));
        assert_eq!(
            state.spatial(),
            Some(&SpatialFilter::MultiPoint(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]))
        );
        assert!(state.query_pairs().contains(&("options[spatial][or]".to_string(), "true".to_string())));

        state.assign("point", false, Assignment::Spatial(SpatialFilter::Point(Point::new(5.0, 6.0))));
        assert_eq!(state.spatial(), Some(&SpatialFilter::Point(Point::new(5.0, 6.0))));
        assert!(!state.query_pairs().iter().any(|(key, _)| key.starts_with("options")));
    }

    #[test]
    fn clearing_temporal_drops_boundary_option() {
        let mut state = QueryState::new(EntityKind::Granule);
        let range = TemporalRange::new(chrono::Utc.timestamp_opt(0, 0).single(), None);
        state.assign("temporal", false, Assignment::Temporal { range, exclude_boundary: true });
        assert!(state.query_pairs().contains(&("options[temporal][exclude_boundary]".to_string(), "true".to_string())));

        state.assign("temporal", false, Assignment::Temporal { range: TemporalRange::default(), exclude_boundary: false });
        assert_eq!(state.temporal(), None);
        assert!(state.options().is_empty());
    }

    #[test]
    fn boundary_option_set_first_survives_a_new_range() {
        let mut state = QueryState::new(EntityKind::Granule);
        state.set_option("temporal", "exclude_boundary", true);
        let range = TemporalRange::new(chrono::Utc.timestamp_opt(0, 0).single(), None);
        state.assign("temporal", false, Assignment::Temporal { range, exclude_boundary: false });

        assert!(state.query_pairs().contains(&("options[temporal][exclude_boundary]".to_string(), "true".to_string())));
    }

    #[test]
    fn bearer_credentials_are_prefixed() {
        let mut state = QueryState::new(EntityKind::Tool);
        state.set_authorization(Authorization::Bearer("abc".into()));
        assert_eq!(state.request_headers().get("Authorization").map(String::as_str), Some("Bearer abc"));
        assert_eq!(state.request_headers().get("Accept").map(String::as_str), Some("application/json"));
    }
}
