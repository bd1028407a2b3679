use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Absolute activation interval in UTC, half-open: `[enable_on, disable_on)`.
///
/// On the wire an open bound is written as `null` (or omitted), which maps to
/// the min/max instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScheduleWire", into = "ScheduleWire")]
pub struct UtcSchedule {
    pub enable_on: DateTime<Utc>,
    pub disable_on: DateTime<Utc>,
}

/// Where `now` sits relative to a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePhase {
    NotApplicable,
    Upcoming,
    Active,
    Expired,
}

impl SchedulePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulePhase::NotApplicable => "not-applicable",
            SchedulePhase::Upcoming => "upcoming",
            SchedulePhase::Active => "active",
            SchedulePhase::Expired => "expired",
        }
    }
}

impl UtcSchedule {
    pub const UNSCHEDULED: UtcSchedule = UtcSchedule {
        enable_on: DateTime::<Utc>::MIN_UTC,
        disable_on: DateTime::<Utc>::MAX_UTC,
    };

    pub fn new(enable_on: DateTime<Utc>, disable_on: DateTime<Utc>) -> Self {
        Self {
            enable_on,
            disable_on,
        }
    }

    pub fn unscheduled() -> Self {
        Self::UNSCHEDULED
    }

    pub fn has_schedule(&self) -> bool {
        *self != Self::UNSCHEDULED
    }

    pub fn phase(&self, now: DateTime<Utc>) -> SchedulePhase {
        if !self.has_schedule() {
            SchedulePhase::NotApplicable
        } else if now < self.enable_on {
            SchedulePhase::Upcoming
        } else if now >= self.disable_on {
            SchedulePhase::Expired
        } else {
            SchedulePhase::Active
        }
    }

    /// `None` when no schedule is configured.
    pub fn is_active(&self, now: DateTime<Utc>) -> Option<bool> {
        match self.phase(now) {
            SchedulePhase::NotApplicable => None,
            SchedulePhase::Active => Some(true),
            SchedulePhase::Upcoming | SchedulePhase::Expired => Some(false),
        }
    }
}

impl Default for UtcSchedule {
    fn default() -> Self {
        Self::UNSCHEDULED
    }
}

#[derive(Serialize, Deserialize)]
struct ScheduleWire {
    #[serde(default)]
    enable_on: Option<DateTime<Utc>>,
    #[serde(default)]
    disable_on: Option<DateTime<Utc>>,
}

impl From<ScheduleWire> for UtcSchedule {
    fn from(wire: ScheduleWire) -> Self {
        Self {
            enable_on: wire.enable_on.unwrap_or(DateTime::<Utc>::MIN_UTC),
            disable_on: wire.disable_on.unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl From<UtcSchedule> for ScheduleWire {
    fn from(schedule: UtcSchedule) -> Self {
        Self {
            enable_on: (schedule.enable_on != DateTime::<Utc>::MIN_UTC)
                .then_some(schedule.enable_on),
            disable_on: (schedule.disable_on != DateTime::<Utc>::MAX_UTC)
                .then_some(schedule.disable_on),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unscheduled_is_not_applicable() {
        let schedule = UtcSchedule::unscheduled();
        assert!(!schedule.has_schedule());
        assert_eq!(schedule.is_active(t0()), None);
    }

    #[test]
    fn test_half_open_boundaries() {
        let schedule = UtcSchedule::new(t0(), t0() + Duration::seconds(10));

        assert_eq!(schedule.is_active(t0()), Some(true));
        assert_eq!(schedule.is_active(t0() + Duration::seconds(10)), Some(false));
        assert_eq!(schedule.is_active(t0() - Duration::nanoseconds(1)), Some(false));
    }

    #[test]
    fn test_phases() {
        let schedule = UtcSchedule::new(t0(), t0() + Duration::hours(1));

        assert_eq!(schedule.phase(t0() - Duration::minutes(1)), SchedulePhase::Upcoming);
        assert_eq!(schedule.phase(t0() + Duration::minutes(30)), SchedulePhase::Active);
        assert_eq!(schedule.phase(t0() + Duration::hours(2)), SchedulePhase::Expired);
    }

    #[test]
    fn test_open_bound_is_written_as_null() {
        let schedule: UtcSchedule =
            serde_json::from_str(r#"{"enable_on": "2025-03-01T12:00:00Z"}"#).unwrap();
        assert!(schedule.has_schedule());
        assert_eq!(schedule.disable_on, DateTime::<Utc>::MAX_UTC);

        let json = serde_json::to_value(schedule).unwrap();
        assert!(json["disable_on"].is_null());

        let empty: UtcSchedule = serde_json::from_str("{}").unwrap();
        assert!(!empty.has_schedule());
    }
}
