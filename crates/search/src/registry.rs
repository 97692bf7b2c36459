//! Parameter registry: name → encoding rule, validator and multiplicity.

use std::{fmt, sync::Arc};

use cmr_types::EntityKind;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::trace;

use crate::{
    catalog,
    error::QueryError,
    state::{Assignment, QueryState},
    value::ParamValue,
};

/// Turns positional arguments into an [`Assignment`]. Receives the parameter name.
pub type Encoder = fn(&str, &[ParamValue]) -> Result<Assignment, QueryError>;

/// Extra check run before encoding; may capture per-entity data.
pub type Validator = Arc<dyn Fn(&[ParamValue]) -> Result<(), QueryError> + Send + Sync>;

/// How one named parameter is validated and encoded.
#[derive(Clone)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub encode: Encoder,
    pub validate: Option<Validator>,
    /// Appends to earlier values instead of replacing them.
    pub multi_valued: bool,
    /// Parameters cleared when this one is set.
    pub excludes: &'static [&'static str],
    /// Option qualifiers set alongside this parameter.
    pub implied_options: &'static [(&'static str, bool)],
}

impl ParameterSpec {
    pub fn new(name: &'static str, encode: Encoder) -> Self {
        Self {
            name,
            encode,
            validate: None,
            multi_valued: false,
            excludes: &[],
            implied_options: &[],
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn validated_by(mut self, validator: impl Fn(&[ParamValue]) -> Result<(), QueryError> + Send + Sync + 'static) -> Self {
        self.validate = Some(Arc::new(validator));
        self
    }

    pub fn excluding(mut self, excludes: &'static [&'static str]) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn implying(mut self, implied_options: &'static [(&'static str, bool)]) -> Self {
        self.implied_options = implied_options;
        self
    }
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("name", &self.name)
            .field("validated", &self.validate.is_some())
            .field("multi_valued", &self.multi_valued)
            .field("excludes", &self.excludes)
            .field("implied_options", &self.implied_options)
            .finish()
    }
}

/// The parameters one entity type accepts.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    entity: EntityKind,
    specs: IndexMap<&'static str, ParameterSpec>,
}

static COLLECTIONS: Lazy<ParameterRegistry> = Lazy::new(|| catalog::build(EntityKind::Collection));
static GRANULES: Lazy<ParameterRegistry> = Lazy::new(|| catalog::build(EntityKind::Granule));
static TOOLS: Lazy<ParameterRegistry> = Lazy::new(|| catalog::build(EntityKind::Tool));
static SERVICES: Lazy<ParameterRegistry> = Lazy::new(|| catalog::build(EntityKind::Service));
static VARIABLES: Lazy<ParameterRegistry> = Lazy::new(|| catalog::build(EntityKind::Variable));

impl ParameterRegistry {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            specs: IndexMap::new(),
        }
    }

    /// Shared registry for an entity type, built on first use.
    pub fn for_entity(entity: EntityKind) -> &'static ParameterRegistry {
        match entity {
            EntityKind::Collection => &COLLECTIONS,
            EntityKind::Granule => &GRANULES,
            EntityKind::Tool => &TOOLS,
            EntityKind::Service => &SERVICES,
            EntityKind::Variable => &VARIABLES,
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    /// Add or replace a parameter.
    pub fn register(&mut self, spec: ParameterSpec) {
        self.specs.insert(spec.name, spec);
    }

    pub fn extend(&mut self, specs: impl IntoIterator<Item = ParameterSpec>) {
        for spec in specs {
            self.register(spec);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.keys().copied()
    }

    /// True when the entity accepts geometric filters.
    pub fn supports_spatial(&self) -> bool {
        self.contains("point")
    }

    /// Validate, encode and record one parameter. State is untouched on error.
    pub fn apply(&self, state: &mut QueryState, name: &str, arguments: &[ParamValue]) -> Result<(), QueryError> {
        let spec = self
            .get(name)
            .ok_or_else(|| QueryError::unknown_parameter(name, self.entity))?;
        if let Some(validate) = &spec.validate {
            validate(arguments)?;
        }
        let assignment = (spec.encode)(spec.name, arguments)?;
        trace!(entity = %self.entity, parameter = spec.name, "parameter assigned");

        for excluded in spec.excludes {
            state.remove_parameter(excluded);
        }
        state.assign(spec.name, spec.multi_valued, assignment);
        for (key, value) in spec.implied_options {
            state.set_option(spec.name, key, *value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registries_are_composed_per_entity() {
        let granules = ParameterRegistry::for_entity(EntityKind::Granule);
        assert!(granules.contains("cloud_cover"));
        assert!(granules.contains("short_name"));
        assert!(granules.contains("concept_id"));
        assert!(!granules.contains("keyword"));
        assert!(granules.supports_spatial());

        let tools = ParameterRegistry::for_entity(EntityKind::Tool);
        assert!(tools.contains("name"));
        assert!(!tools.contains("temporal"));
        assert!(!tools.supports_spatial());
    }

    #[test]
    fn unknown_parameters_are_rejected_without_mutation() {
        let registry = ParameterRegistry::for_entity(EntityKind::Collection);
        let mut state = QueryState::new(EntityKind::Collection);
        let result = registry.apply(&mut state, "day_night_flag", &[ParamValue::from("day")]);
        assert!(matches!(result, Err(QueryError::UnknownParameter { .. })));
        assert_eq!(state, QueryState::new(EntityKind::Collection));
    }

    #[test]
    fn failed_validation_leaves_state_untouched() {
        let registry = ParameterRegistry::for_entity(EntityKind::Collection);
        let mut state = QueryState::new(EntityKind::Collection);
        registry
            .apply(&mut state, "concept_id", &[ParamValue::from("C1-PROV")])
            .expect("valid concept id");
        let before = state.clone();
        let result = registry.apply(&mut state, "concept_id", &[ParamValue::from("G1-PROV")]);
        assert!(matches!(result, Err(QueryError::InvalidParameterValue { .. })));
        assert_eq!(state, before);
    }

    #[test]
    fn custom_parameters_can_be_registered() {
        fn encode_flag(name: &str, _: &[ParamValue]) -> Result<Assignment, QueryError> {
            Ok(Assignment::Pairs(vec![(name.to_string(), "true".to_string())]))
        }
        let mut registry = ParameterRegistry::new(EntityKind::Variable);
        registry.register(ParameterSpec::new("has_granules", encode_flag));
        let mut state = QueryState::new(EntityKind::Variable);
        registry.apply(&mut state, "has_granules", &[]).expect("apply");
        assert_eq!(state.values("has_granules"), vec!["true"]);
    }
}
