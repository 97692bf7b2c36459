//! Spatial argument parsing, geometry checks and wire encoding.

use cmr_types::{Point, SpatialFilter};

use crate::{
    error::QueryError,
    validators::{format_number, latitude, longitude, numeric},
    value::ParamValue,
};

/// Flatten arguments (scalars, pairs, nested lists) into scalar coordinates.
fn flatten(arguments: &[ParamValue], into: &mut Vec<ParamValue>) {
    for argument in arguments {
        match argument {
            ParamValue::List(items) | ParamValue::Tuple(items) => flatten(items, into),
            scalar => into.push(scalar.clone()),
        }
    }
}

/// Interpret arguments as a sequence of longitude/latitude pairs.
pub fn points_from(parameter: &str, arguments: &[ParamValue]) -> Result<Vec<Point>, QueryError> {
    let mut scalars = Vec::new();
    flatten(arguments, &mut scalars);
    if scalars.len() % 2 != 0 {
        return Err(QueryError::invalid_coordinate(format!(
            "{parameter} needs longitude/latitude pairs, got {} values",
            scalars.len()
        )));
    }
    scalars
        .chunks(2)
        .map(|pair| Ok(Point::new(longitude(&pair[0])?, latitude(&pair[1])?)))
        .collect()
}

pub fn point(arguments: &[ParamValue]) -> Result<SpatialFilter, QueryError> {
    let points = points_from("point", arguments)?;
    match points.as_slice() {
        [single] => Ok(SpatialFilter::Point(*single)),
        _ => Err(QueryError::invalid_value("point", "expected a single longitude/latitude pair")),
    }
}

pub fn bounding_box(arguments: &[ParamValue]) -> Result<SpatialFilter, QueryError> {
    let points = points_from("bounding_box", arguments)?;
    match points.as_slice() {
        [lower_left, upper_right] => Ok(SpatialFilter::BoundingBox {
            lower_left: *lower_left,
            upper_right: *upper_right,
        }),
        _ => Err(QueryError::invalid_value(
            "bounding_box",
            "expected lower-left longitude, lower-left latitude, upper-right longitude, upper-right latitude",
        )),
    }
}

/// A closed ring of at least four points wound counter-clockwise.
pub fn polygon(arguments: &[ParamValue]) -> Result<SpatialFilter, QueryError> {
    let points = points_from("polygon", arguments)?;
    if points.len() < 4 {
        return Err(QueryError::invalid_polygon(format!(
            "a polygon requires at least 4 points, got {}",
            points.len()
        )));
    }
    if points.first() != points.last() {
        return Err(QueryError::invalid_polygon("the last point must match the first point"));
    }
    let area = signed_area(&points);
    if area == 0.0 {
        return Err(QueryError::invalid_polygon("the ring encloses no area"));
    }
    if area < 0.0 {
        return Err(QueryError::invalid_polygon("points must be listed counter-clockwise"));
    }
    Ok(SpatialFilter::Polygon(points))
}

/// Shoelace area; positive for counter-clockwise rings.
fn signed_area(ring: &[Point]) -> f64 {
    ring.windows(2)
        .map(|edge| edge[0].lon * edge[1].lat - edge[1].lon * edge[0].lat)
        .sum::<f64>()
        / 2.0
}

pub fn line(arguments: &[ParamValue]) -> Result<SpatialFilter, QueryError> {
    let points = points_from("line", arguments)?;
    if points.len() < 2 {
        return Err(QueryError::invalid_value(
            "line",
            format!("a line requires at least 2 points, got {}", points.len()),
        ));
    }
    Ok(SpatialFilter::Line(points))
}

/// Centre point plus a radius in meters.
pub fn circle(arguments: &[ParamValue]) -> Result<SpatialFilter, QueryError> {
    let mut scalars = Vec::new();
    flatten(arguments, &mut scalars);
    let [lon, lat, radius] = scalars.as_slice() else {
        return Err(QueryError::invalid_value(
            "circle",
            "expected longitude, latitude and radius in meters",
        ));
    };
    let center = Point::new(longitude(lon)?, latitude(lat)?);
    let radius_meters = numeric("circle", radius)?;
    if radius_meters <= 0.0 {
        return Err(QueryError::invalid_value("circle", "radius must be greater than zero"));
    }
    Ok(SpatialFilter::Circle { center, radius_meters })
}

pub fn multi_point(arguments: &[ParamValue]) -> Result<SpatialFilter, QueryError> {
    let points = points_from("multi_point", arguments)?;
    if points.is_empty() {
        return Err(QueryError::invalid_value("multi_point", "at least one point is required"));
    }
    Ok(SpatialFilter::MultiPoint(points))
}

fn join_points(points: &[Point]) -> String {
    points
        .iter()
        .flat_map(|point| [format_number(point.lon), format_number(point.lat)])
        .collect::<Vec<_>>()
        .join(",")
}

/// Query pairs for a spatial filter.
///
/// Multi-point filters are sent as repeated `point[]` values; the matching
/// `options[spatial][or]` qualifier is added by the request builder.
pub fn wire_pairs(filter: &SpatialFilter) -> Vec<(String, String)> {
    match filter {
        SpatialFilter::Point(point) => vec![("point".into(), join_points(std::slice::from_ref(point)))],
        SpatialFilter::BoundingBox { lower_left, upper_right } => {
            vec![("bounding_box".into(), join_points(&[*lower_left, *upper_right]))]
        }
        SpatialFilter::Polygon(ring) => vec![("polygon".into(), join_points(ring))],
        SpatialFilter::Line(points) => vec![("line".into(), join_points(points))],
        SpatialFilter::Circle { center, radius_meters } => vec![(
            "circle".into(),
            format!("{},{}", join_points(std::slice::from_ref(center)), format_number(*radius_meters)),
        )],
        SpatialFilter::MultiPoint(points) => points
            .iter()
            .map(|point| ("point[]".to_string(), join_points(std::slice::from_ref(point))))
            .collect(),
    }
}
