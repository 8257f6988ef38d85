//! ScheduleRule - how the arrival instant is derived from authoritative time

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Which day the time-of-day is taken on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rollover {
    /// Today if the time-of-day is still ahead, otherwise tomorrow
    #[default]
    NextOccurrence,
    /// Always tomorrow's calendar date
    NextCalendarDay,
}

/// Parsed scheduling rule: wall-clock time-of-day in a named zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRule {
    pub time_of_day: NaiveTime,
    pub zone: Tz,
    pub rollover: Rollover,
}

impl ScheduleRule {
    /// Parse `HH:MM:SS[.fff]` and an IANA zone name
    pub fn parse(time_of_day: &str, zone: &str, rollover: Rollover) -> Result<Self, ContractError> {
        Ok(Self {
            time_of_day: parse_time_of_day(time_of_day)?,
            zone: parse_zone(zone)?,
            rollover,
        })
    }
}

pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ContractError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M:%S%.f").map_err(|e| {
        ContractError::InvalidTimeOfDay {
            value: value.to_string(),
            message: e.to_string(),
        }
    })
}

pub fn parse_zone(value: &str) -> Result<Tz, ContractError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| ContractError::UnknownTimeZone {
            zone: value.to_string(),
        })
}
