//! Dynamic parameter values shared by the fluent and bulk builder paths.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// One argument handed to a builder parameter.
///
/// `List` is a single list-valued argument (e.g. several concept ids).
/// `Tuple` only matters on the bulk path, where it is spread into
/// positional arguments, so `("temporal", ("2016-01-01", "2016-02-01"))`
/// behaves like `temporal("2016-01-01", "2016-02-01")`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    List(Vec<ParamValue>),
    Tuple(Vec<ParamValue>),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view; numeric text is accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(text) => text.trim().parse::<f64>().ok().filter(|number| number.is_finite()),
            _ => None,
        }
    }

    /// Boolean view; `"true"` / `"false"` text is accepted, case-insensitively.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Flatten a `List` into its items; any other value is a one-item slice.
    pub fn items(&self) -> &[ParamValue] {
        match self {
            Self::List(items) | Self::Tuple(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Spread a value into positional arguments: tuples expand, everything else stays whole.
    pub fn into_arguments(self) -> Vec<ParamValue> {
        match self {
            Self::Tuple(items) => items,
            other => vec![other],
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
            Self::Timestamp(timestamp) => write!(f, "{}", timestamp.to_rfc3339()),
            Self::Date(date) => write!(f, "{date}"),
            Self::List(items) | Self::Tuple(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<NaiveDateTime> for ParamValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value.and_utc())
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<ParamValue>, B: Into<ParamValue>> From<(A, B)> for ParamValue {
    fn from((a, b): (A, B)) -> Self {
        Self::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<ParamValue>, B: Into<ParamValue>, C: Into<ParamValue>> From<(A, B, C)> for ParamValue {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

impl<A, B, C, D> From<(A, B, C, D)> for ParamValue
where
    A: Into<ParamValue>,
    B: Into<ParamValue>,
    C: Into<ParamValue>,
    D: Into<ParamValue>,
{
    fn from((a, b, c, d): (A, B, C, D)) -> Self {
        Self::Tuple(vec![a.into(), b.into(), c.into(), d.into()])
    }
}
