//! Parsing of temporal bounds into UTC timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use cmr_types::TemporalRange;

use crate::{error::QueryError, value::ParamValue};

const NAIVE_DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which side of the window a value bounds. Date-only values expand to the
/// start or the end of that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Time of day used for a date-only end bound.
const END_OF_DAY: NaiveTime = NaiveTime::from_hms_opt(23, 59, 59).expect("23:59:59 should be a valid time");

impl Bound {
    fn time_of_day(self) -> NaiveTime {
        match self {
            Self::Start => NaiveTime::MIN,
            Self::End => END_OF_DAY,
        }
    }
}

/// Parse one bound. `Null` and blank text mean "open".
pub fn parse_bound(value: &ParamValue, bound: Bound) -> Result<Option<DateTime<Utc>>, QueryError> {
    match value {
        ParamValue::Null => Ok(None),
        ParamValue::Timestamp(timestamp) => Ok(Some(*timestamp)),
        ParamValue::Date(date) => Ok(Some(date.and_time(bound.time_of_day()).and_utc())),
        ParamValue::Text(text) if text.trim().is_empty() => Ok(None),
        ParamValue::Text(text) => parse_text(text.trim(), bound).map(Some),
        other => Err(QueryError::invalid_date(other.to_string())),
    }
}

fn parse_text(text: &str, bound: Bound) -> Result<DateTime<Utc>, QueryError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Ok(date.and_time(bound.time_of_day()).and_utc());
    }
    Err(QueryError::invalid_date(text))
}

/// Build a range from two bounds, rejecting inverted windows.
pub fn parse_range(start: &ParamValue, end: &ParamValue) -> Result<TemporalRange, QueryError> {
    let range = TemporalRange::new(parse_bound(start, Bound::Start)?, parse_bound(end, Bound::End)?);
    if let (Some(start), Some(end)) = (range.start, range.end)
        && start > end
    {
        return Err(QueryError::invalid_value(
            "temporal",
            format!("start {} is after end {}", start.to_rfc3339(), end.to_rfc3339()),
        ));
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(start: &str, end: &str) -> Result<String, QueryError> {
        parse_range(&ParamValue::from(start), &ParamValue::from(end)).map(|range| range.to_wire())
    }

    #[test]
    fn accepts_common_timestamp_shapes() {
        assert_eq!(
            wire("2016-10-10T01:02:03Z", "2016-10-12T09:08:07Z").ok().as_deref(),
            Some("2016-10-10T01:02:03Z,2016-10-12T09:08:07Z")
        );
        assert_eq!(
            wire("2016-10-10T01:02:03", "2016-10-12 09:08:07").ok().as_deref(),
            Some("2016-10-10T01:02:03Z,2016-10-12T09:08:07Z")
        );
        assert_eq!(
            wire("2016-10-10T01:02", "").ok().as_deref(),
            Some("2016-10-10T01:02:00Z,")
        );
        assert_eq!(
            wire("2016-10-10T03:02:03+02:00", "").ok().as_deref(),
            Some("2016-10-10T01:02:03Z,")
        );
    }

    #[test]
    fn date_only_bounds_cover_whole_days() {
        assert_eq!(
            wire("2016-10-10", "2016-10-12").ok().as_deref(),
            Some("2016-10-10T00:00:00Z,2016-10-12T23:59:59Z")
        );
        let date = NaiveDate::from_ymd_opt(2016, 10, 12).map(ParamValue::from).unwrap_or(ParamValue::Null);
        let range = parse_range(&ParamValue::Null, &date).expect("range");
        assert_eq!(range.to_wire(), ",2016-10-12T23:59:59Z");
    }

    #[test]
    fn rejects_unparseable_and_inverted_ranges() {
        assert!(matches!(wire("2016", ""), Err(QueryError::InvalidDateFormat { .. })));
        assert!(matches!(wire("yesterday", ""), Err(QueryError::InvalidDateFormat { .. })));
        assert!(matches!(
            wire("2016-10-12T00:00:00Z", "2016-10-10T00:00:00Z"),
            Err(QueryError::InvalidParameterValue { .. })
        ));
    }
}
