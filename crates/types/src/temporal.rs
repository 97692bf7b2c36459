use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical UTC shape sent to the remote service.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// An open or closed time window. `None` on either side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemporalRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TemporalRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// `start,end` with empty text for an open side.
    pub fn to_wire(&self) -> String {
        let format_bound = |bound: Option<DateTime<Utc>>| {
            bound
                .map(|timestamp| timestamp.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default()
        };
        format!("{},{}", format_bound(self.start), format_bound(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn open_ended_ranges_leave_a_blank_side() {
        let start = Utc.with_ymd_and_hms(2016, 10, 12, 10, 55, 7).single();
        assert_eq!(TemporalRange::new(start, None).to_wire(), "2016-10-12T10:55:07Z,");
        assert_eq!(TemporalRange::new(None, start).to_wire(), ",2016-10-12T10:55:07Z");
        assert!(TemporalRange::default().is_unbounded());
    }
}
