use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Recurring local-time-of-day window, bound to an IANA time zone and a set
/// of weekdays. `start_on > stop_on` means the window wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtcTimeWindow {
    pub start_on: NaiveTime,
    pub stop_on: NaiveTime,
    pub time_zone: String,
    pub days_active: HashSet<Weekday>,
}

/// Outcome of checking a window against an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    NotApplicable,
    Open,
    Closed,
    /// The local weekday is not in `days_active`.
    InactiveDay,
    /// The zone name could not be resolved; treated as closed.
    UnknownZone,
}

impl WindowVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowVerdict::NotApplicable => "not-applicable",
            WindowVerdict::Open => "open",
            WindowVerdict::Closed => "closed",
            WindowVerdict::InactiveDay => "inactive-day",
            WindowVerdict::UnknownZone => "unknown-time-zone",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, WindowVerdict::Open | WindowVerdict::NotApplicable)
    }
}

/// Resolves zone names to a time zone. Injected so that tests and embedders
/// can control the zone database.
pub trait ZoneResolver {
    fn resolve(&self, name: &str) -> Option<Tz>;
}

/// The IANA database compiled into `chrono-tz`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IanaZones;

impl ZoneResolver for IanaZones {
    fn resolve(&self, name: &str) -> Option<Tz> {
        name.trim().parse::<Tz>().ok()
    }
}

pub const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn start_of_day() -> NaiveTime {
    NaiveTime::default()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

impl UtcTimeWindow {
    pub fn always_open() -> Self {
        Self {
            start_on: start_of_day(),
            stop_on: end_of_day(),
            time_zone: "UTC".to_string(),
            days_active: ALL_WEEKDAYS.into_iter().collect(),
        }
    }

    pub fn new(
        start_on: NaiveTime,
        stop_on: NaiveTime,
        time_zone: impl Into<String>,
        days_active: impl IntoIterator<Item = Weekday>,
    ) -> Self {
        Self {
            start_on,
            stop_on,
            time_zone: time_zone.into(),
            days_active: days_active.into_iter().collect(),
        }
    }

    /// The zone does not take part in the comparison: a full day on every
    /// weekday is unrestricted in any zone.
    pub fn has_window(&self) -> bool {
        !(self.start_on == start_of_day()
            && self.stop_on == end_of_day()
            && self.days_active.len() == ALL_WEEKDAYS.len())
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start_on > self.stop_on
    }

    pub fn check(&self, now: DateTime<Utc>, zones: &impl ZoneResolver) -> WindowVerdict {
        if !self.has_window() {
            return WindowVerdict::NotApplicable;
        }

        let Some(tz) = zones.resolve(&self.time_zone) else {
            tracing::warn!(
                time_zone = %self.time_zone,
                "unresolvable time zone, window treated as closed"
            );
            return WindowVerdict::UnknownZone;
        };

        let local = now.with_timezone(&tz);
        if !self.days_active.contains(&local.weekday()) {
            return WindowVerdict::InactiveDay;
        }

        // Sub-second precision is dropped so that a 23:59:59 stop covers the whole second.
        let time = local.time().with_nanosecond(0).unwrap_or(local.time());
        let open = if self.wraps_midnight() {
            time >= self.start_on || time <= self.stop_on
        } else {
            self.start_on <= time && time <= self.stop_on
        };

        if open {
            WindowVerdict::Open
        } else {
            WindowVerdict::Closed
        }
    }

    /// `None` when the window is unrestricted.
    pub fn is_active(&self, now: DateTime<Utc>, zones: &impl ZoneResolver) -> Option<bool> {
        match self.check(now, zones) {
            WindowVerdict::NotApplicable => None,
            verdict => Some(verdict.is_open()),
        }
    }
}

impl Default for UtcTimeWindow {
    fn default() -> Self {
        Self::always_open()
    }
}
