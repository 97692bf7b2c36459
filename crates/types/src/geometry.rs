use serde::{Deserialize, Serialize};

/// A longitude/latitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<(f64, f64)> for Point {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

/// A geometric predicate restricting results to a region.
///
/// The remote service accepts a single spatial predicate per request, so a
/// query holds at most one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpatialFilter {
    Point(Point),
    BoundingBox { lower_left: Point, upper_right: Point },
    /// Closed, counter-clockwise ring; first point equals last point.
    Polygon(Vec<Point>),
    Line(Vec<Point>),
    Circle { center: Point, radius_meters: f64 },
    MultiPoint(Vec<Point>),
}

impl SpatialFilter {
    /// Name of the builder parameter that produces this variant.
    pub fn parameter_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::BoundingBox { .. } => "bounding_box",
            Self::Polygon(_) => "polygon",
            Self::Line(_) => "line",
            Self::Circle { .. } => "circle",
            Self::MultiPoint(_) => "multi_point",
        }
    }
}
