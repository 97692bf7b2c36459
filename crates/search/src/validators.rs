//! Pure value predicates used by the parameter registry.
//!
//! Each helper converts a [`ParamValue`] into the shape a parameter needs or
//! explains why it cannot. None of them touch query state.

use cmr_types::EntityKind;

use crate::{error::QueryError, value::ParamValue};

/// Render a number the way CMR expects coordinates: integral values keep one
/// decimal place (`10.0`), everything else uses the shortest exact form.
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e16 {
        format!("{number:.1}")
    } else {
        number.to_string()
    }
}

/// Text the user supplied, trimmed; numbers are rendered as written.
pub fn non_empty_text(parameter: &str, value: &ParamValue) -> Result<String, QueryError> {
    let text = match value {
        ParamValue::Text(text) => text.trim().to_string(),
        ParamValue::Number(number) if number.fract() == 0.0 => format!("{number:.0}"),
        ParamValue::Number(number) => number.to_string(),
        ParamValue::Null => String::new(),
        other => {
            return Err(QueryError::invalid_value(
                parameter,
                format!("expected text, got {other}"),
            ));
        }
    };
    if text.is_empty() {
        return Err(QueryError::invalid_value(parameter, "a non-empty value is required"));
    }
    Ok(text)
}

/// Lower-cased text that must be one of `allowed`.
pub fn one_of(parameter: &str, value: &ParamValue, allowed: &[&str]) -> Result<String, QueryError> {
    let text = non_empty_text(parameter, value)?.to_ascii_lowercase();
    if allowed.contains(&text.as_str()) {
        Ok(text)
    } else {
        Err(QueryError::invalid_value(
            parameter,
            format!("'{text}' is not one of {}", allowed.join(", ")),
        ))
    }
}

pub fn boolean_flag(parameter: &str, value: &ParamValue) -> Result<bool, QueryError> {
    value
        .as_bool()
        .ok_or_else(|| QueryError::invalid_value(parameter, format!("expected true or false, got {value}")))
}

pub fn numeric(parameter: &str, value: &ParamValue) -> Result<f64, QueryError> {
    value
        .as_f64()
        .ok_or_else(|| QueryError::invalid_value(parameter, format!("expected a number, got {value}")))
}

pub fn longitude(value: &ParamValue) -> Result<f64, QueryError> {
    coordinate(value, "longitude", 180.0)
}

pub fn latitude(value: &ParamValue) -> Result<f64, QueryError> {
    coordinate(value, "latitude", 90.0)
}

fn coordinate(value: &ParamValue, axis: &str, limit: f64) -> Result<f64, QueryError> {
    let number = value
        .as_f64()
        .ok_or_else(|| QueryError::invalid_coordinate(format!("{axis} must be numeric, got {value}")))?;
    if !(-limit..=limit).contains(&number) {
        return Err(QueryError::invalid_coordinate(format!(
            "{axis} {number} is outside [-{limit}, {limit}]"
        )));
    }
    Ok(number)
}

/// Concept id text whose first character is one of `prefixes`.
pub fn concept_id(parameter: &str, value: &ParamValue, prefixes: &[char]) -> Result<String, QueryError> {
    let text = non_empty_text(parameter, value)?;
    match text.chars().next() {
        Some(first) if prefixes.contains(&first) => Ok(text),
        _ => {
            let expected: Vec<String> = prefixes.iter().map(|prefix| format!("'{prefix}'")).collect();
            Err(QueryError::invalid_value(
                parameter,
                format!("concept id '{text}' must begin with {}", expected.join(" or ")),
            ))
        }
    }
}

/// Concept id check bound to the entity being searched.
pub fn entity_concept_id(entity: EntityKind, value: &ParamValue) -> Result<String, QueryError> {
    concept_id("concept_id", value, entity.concept_id_prefixes())
}

/// Sort key, optionally prefixed with `-` or `+`, drawn from `allowed`.
pub fn sort_key(value: &ParamValue, allowed: &[&str]) -> Result<String, QueryError> {
    let text = non_empty_text("sort_key", value)?;
    let bare = text.trim_start_matches(['-', '+']);
    if allowed.contains(&bare) {
        Ok(text)
    } else {
        Err(QueryError::invalid_value("sort_key", format!("'{text}' is not a supported sort key")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_render_like_decimal_floats() {
        assert_eq!(format_number(10.0), "10.0");
        assert_eq!(format_number(-15.1), "-15.1");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[test]
    fn coordinates_outside_range_are_rejected() {
        assert_eq!(longitude(&ParamValue::from(-180)).ok(), Some(-180.0));
        assert!(matches!(longitude(&ParamValue::from(181)), Err(QueryError::InvalidCoordinate { .. })));
        assert!(matches!(latitude(&ParamValue::from(-90.5)), Err(QueryError::InvalidCoordinate { .. })));
        assert!(matches!(latitude(&ParamValue::from("north")), Err(QueryError::InvalidCoordinate { .. })));
    }

    #[test]
    fn concept_ids_must_match_entity_prefixes() {
        assert!(entity_concept_id(EntityKind::Granule, &ParamValue::from("C1299783579-LPDAAC_ECS")).is_ok());
        assert!(entity_concept_id(EntityKind::Granule, &ParamValue::from("G1327299284-LPDAAC_ECS")).is_ok());
        assert!(entity_concept_id(EntityKind::Collection, &ParamValue::from("G1327299284-LPDAAC_ECS")).is_err());
        assert!(entity_concept_id(EntityKind::Tool, &ParamValue::from("")).is_err());
    }

    #[test]
    fn one_of_normalises_case() {
        assert_eq!(one_of("day_night_flag", &ParamValue::from("DAY"), &["day", "night"]).ok(), Some("day".into()));
        assert!(one_of("day_night_flag", &ParamValue::from("dusk"), &["day", "night"]).is_err());
    }

    #[test]
    fn sort_keys_accept_direction_prefixes() {
        let allowed = ["start_date", "end_date"];
        assert_eq!(sort_key(&ParamValue::from("-start_date"), &allowed).ok(), Some("-start_date".into()));
        assert!(sort_key(&ParamValue::from("score"), &allowed).is_err());
    }
}
