//! Per-entity parameter catalogue.
//!
//! Registries are composed from shared sets: every entity gets the common
//! identifiers, granules and collections share the spatial/temporal set, and
//! each entity adds its own filters on top.

use cmr_types::EntityKind;

use crate::{
    error::QueryError,
    registry::{ParameterRegistry, ParameterSpec},
    spatial,
    state::Assignment,
    temporal,
    validators::{self, boolean_flag, concept_id, entity_concept_id, non_empty_text, numeric, one_of},
    value::ParamValue,
};

pub const DAY_NIGHT_FLAGS: [&str; 3] = ["day", "night", "unspecified"];

pub const GRANULE_SORT_KEYS: [&str; 22] = [
    "campaign",
    "entry_title",
    "dataset_id",
    "data_size",
    "end_date",
    "granule_ur",
    "producer_granule_id",
    "project",
    "provider",
    "readable_granule_name",
    "short_name",
    "start_date",
    "version",
    "platform",
    "instrument",
    "sensor",
    "day_night_flag",
    "online_only",
    "browsable",
    "browse_only",
    "cloud_cover",
    "revision_date",
];

pub const COLLECTION_SORT_KEYS: [&str; 16] = [
    "entry_title",
    "dataset_id",
    "entry_id",
    "short_name",
    "start_date",
    "end_date",
    "platform",
    "instrument",
    "sensor",
    "provider",
    "revision_date",
    "score",
    "has_granules",
    "usage_score",
    "processing_level_id",
    "create_data_date",
];

/// Option qualifier keys the service understands.
pub const OPTION_KEYS: [&str; 5] = ["ignore_case", "pattern", "and", "or", "exclude_boundary"];

/// Build the registry for an entity type.
pub fn build(entity: EntityKind) -> ParameterRegistry {
    let mut registry = ParameterRegistry::new(entity);
    registry.extend(common(entity));
    match entity {
        EntityKind::Granule => {
            registry.extend(granule_and_collection());
            registry.extend(granule_only());
        }
        EntityKind::Collection => {
            registry.extend(granule_and_collection());
            registry.extend(collection_only());
        }
        EntityKind::Tool | EntityKind::Service | EntityKind::Variable => {
            registry.extend(named_records());
        }
    }
    registry
}

fn common(entity: EntityKind) -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::new("concept_id", encode_text_list)
            .multi_valued()
            .validated_by(move |arguments| each_item(arguments, |item| entity_concept_id(entity, item).map(drop))),
        ParameterSpec::new("provider", encode_text),
        ParameterSpec::new("native_id", encode_text_list).multi_valued(),
    ]
}

fn granule_and_collection() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::new("short_name", encode_text),
        ParameterSpec::new("version", encode_text),
        ParameterSpec::new("entry_title", encode_text),
        ParameterSpec::new("temporal", encode_temporal),
        ParameterSpec::new("revision_date", encode_revision_date),
        ParameterSpec::new("point", |_, arguments| spatial::point(arguments).map(Assignment::Spatial)),
        ParameterSpec::new("bounding_box", |_, arguments| spatial::bounding_box(arguments).map(Assignment::Spatial)),
        ParameterSpec::new("polygon", |_, arguments| spatial::polygon(arguments).map(Assignment::Spatial)),
        ParameterSpec::new("line", |_, arguments| spatial::line(arguments).map(Assignment::Spatial)),
        ParameterSpec::new("circle", |_, arguments| spatial::circle(arguments).map(Assignment::Spatial)),
        ParameterSpec::new("multi_point", |_, arguments| spatial::multi_point(arguments).map(Assignment::Spatial))
            .multi_valued(),
        ParameterSpec::new("online_only", encode_flag).excluding(&["downloadable"]),
        ParameterSpec::new("downloadable", encode_flag).excluding(&["online_only"]),
        ParameterSpec::new("platform", encode_text),
        ParameterSpec::new("instrument", encode_text),
    ]
}

fn granule_only() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::new("orbit_number", encode_orbit_number),
        ParameterSpec::new("day_night_flag", |name, arguments| {
            let flag = one_of(name, single(name, arguments)?, &DAY_NIGHT_FLAGS)?;
            Ok(Assignment::Pairs(vec![(name.to_string(), flag)]))
        }),
        ParameterSpec::new("cloud_cover", encode_cloud_cover),
        ParameterSpec::new("granule_ur", encode_text),
        ParameterSpec::new("readable_granule_name", encode_text_list)
            .multi_valued()
            .implying(&[("pattern", true)]),
        ParameterSpec::new("sort_key", encode_text)
            .validated_by(|arguments| validators::sort_key(single("sort_key", arguments)?, &GRANULE_SORT_KEYS).map(drop)),
    ]
}

fn collection_only() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::new("archive_center", encode_text),
        ParameterSpec::new("keyword", encode_text),
        ParameterSpec::new("tool_concept_id", encode_text_list)
            .multi_valued()
            .validated_by(|arguments| each_item(arguments, |item| concept_id("tool_concept_id", item, &['T']).map(drop))),
        ParameterSpec::new("service_concept_id", encode_text_list)
            .multi_valued()
            .validated_by(|arguments| {
                each_item(arguments, |item| concept_id("service_concept_id", item, &['S']).map(drop))
            }),
        ParameterSpec::new("cloud_hosted", encode_flag),
        ParameterSpec::new("sort_key", encode_text).validated_by(|arguments| {
            validators::sort_key(single("sort_key", arguments)?, &COLLECTION_SORT_KEYS).map(drop)
        }),
    ]
}

fn named_records() -> Vec<ParameterSpec> {
    vec![ParameterSpec::new("name", encode_text)]
}

/// The one positional argument a scalar parameter takes.
fn single<'a>(name: &str, arguments: &'a [ParamValue]) -> Result<&'a ParamValue, QueryError> {
    match arguments {
        [value] => Ok(value),
        [] => Err(QueryError::invalid_value(name, "a value is required")),
        _ => Err(QueryError::invalid_value(
            name,
            format!("expected one value, got {}", arguments.len()),
        )),
    }
}

/// Run `check` over every item, flattening list arguments.
fn each_item(
    arguments: &[ParamValue],
    check: impl Fn(&ParamValue) -> Result<(), QueryError>,
) -> Result<(), QueryError> {
    arguments.iter().flat_map(ParamValue::items).try_for_each(check)
}

fn encode_text(name: &str, arguments: &[ParamValue]) -> Result<Assignment, QueryError> {
    let text = non_empty_text(name, single(name, arguments)?)?;
    Ok(Assignment::Pairs(vec![(name.to_string(), text)]))
}

fn encode_text_list(name: &str, arguments: &[ParamValue]) -> Result<Assignment, QueryError> {
    let key = format!("{name}[]");
    let pairs = arguments
        .iter()
        .flat_map(ParamValue::items)
        .map(|item| non_empty_text(name, item).map(|text| (key.clone(), text)))
        .collect::<Result<Vec<_>, _>>()?;
    if pairs.is_empty() {
        return Err(QueryError::invalid_value(name, "at least one value is required"));
    }
    Ok(Assignment::Pairs(pairs))
}

/// Flags default to `true` when called without a value.
fn encode_flag(name: &str, arguments: &[ParamValue]) -> Result<Assignment, QueryError> {
    let flag = match arguments {
        [] => true,
        _ => boolean_flag(name, single(name, arguments)?)?,
    };
    Ok(Assignment::Pairs(vec![(name.to_string(), flag.to_string())]))
}

fn encode_temporal(_: &str, arguments: &[ParamValue]) -> Result<Assignment, QueryError> {
    let (start, end, exclude) = range_arguments("temporal", arguments)?;
    let exclude_boundary = match exclude {
        Some(value) => boolean_flag("temporal", value)?,
        None => false,
    };
    Ok(Assignment::Temporal {
        range: temporal::parse_range(start, end)?,
        exclude_boundary,
    })
}

fn encode_revision_date(name: &str, arguments: &[ParamValue]) -> Result<Assignment, QueryError> {
    let (start, end, extra) = range_arguments(name, arguments)?;
    if extra.is_some() {
        return Err(QueryError::invalid_value(name, "expected a start and an end"));
    }
    let range = temporal::parse_range(start, end)?;
    if range.is_unbounded() {
        return Ok(Assignment::Pairs(Vec::new()));
    }
    Ok(Assignment::Pairs(vec![(name.to_string(), range.to_wire())]))
}

/// `(start, end, optional third)`; a missing end is open.
fn range_arguments<'a>(
    name: &str,
    arguments: &'a [ParamValue],
) -> Result<(&'a ParamValue, &'a ParamValue, Option<&'a ParamValue>), QueryError> {
    const OPEN: &ParamValue = &ParamValue::Null;
    match arguments {
        [start] => Ok((start, OPEN, None)),
        [start, end] => Ok((start, end, None)),
        [start, end, extra] => Ok((start, end, Some(extra))),
        _ => Err(QueryError::invalid_value(
            name,
            format!("expected a start and an end, got {} values", arguments.len()),
        )),
    }
}

/// Integral numbers render without a fraction (`985`, `-70`).
fn plain_number(number: f64) -> String {
    if number.fract() == 0.0 {
        format!("{number:.0}")
    } else {
        number.to_string()
    }
}

fn is_blank(value: &ParamValue) -> bool {
    match value {
        ParamValue::Null => true,
        ParamValue::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// A number, or `None` when the bound was left blank.
fn optional_number(name: &str, value: &ParamValue) -> Result<Option<f64>, QueryError> {
    if is_blank(value) {
        Ok(None)
    } else {
        numeric(name, value).map(Some)
    }
}

/// A single orbit or an inclusive `first,last` range.
fn encode_orbit_number(name: &str, arguments: &[ParamValue]) -> Result<Assignment, QueryError> {
    let value = match arguments {
        [orbit] => plain_number(numeric(name, orbit)?),
        [orbit, upper] if is_blank(upper) => plain_number(numeric(name, orbit)?),
        [first, last] => format!(
            "{},{}",
            plain_number(numeric(name, first)?),
            plain_number(numeric(name, last)?)
        ),
        _ => return Err(QueryError::invalid_value(name, "expected an orbit or a range of two orbits")),
    };
    Ok(Assignment::Pairs(vec![(name.to_string(), value)]))
}

/// Percentage window; missing bounds default to 0 and 100, blank bounds stay open.
fn encode_cloud_cover(name: &str, arguments: &[ParamValue]) -> Result<Assignment, QueryError> {
    let (minimum, maximum) = match arguments {
        [] => (Some(0.0), Some(100.0)),
        [minimum] => (optional_number(name, minimum)?, Some(100.0)),
        [minimum, maximum] => (optional_number(name, minimum)?, optional_number(name, maximum)?),
        _ => return Err(QueryError::invalid_value(name, "expected a minimum and a maximum")),
    };
    match (minimum, maximum) {
        (None, None) => return Err(QueryError::invalid_value(name, "provide a minimum, a maximum or both")),
        (Some(low), Some(high)) if low > high => {
            return Err(QueryError::invalid_value(
                name,
                format!("minimum {low} is greater than maximum {high}"),
            ));
        }
        _ => {}
    }
    let render = |bound: Option<f64>| bound.map(plain_number).unwrap_or_default();
    Ok(Assignment::Pairs(vec![(
        name.to_string(),
        format!("{},{}", render(minimum), render(maximum)),
    )]))
}
