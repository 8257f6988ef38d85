//! Target time calculation.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use contracts::{AuthoritativeTime, LatencyEstimate, Rollover, ScheduleRule, ScheduleWindow};

use crate::TimeSyncError;

/// Days searched past the first candidate (DST gaps can skip a day's time-of-day)
const SEARCH_DAYS: u32 = 3;

/// Compute arrival and send instants from an authoritative time
///
/// # Errors
/// `PastDeadline` when `send <= authoritative time`.
pub fn compute_schedule(
    authoritative: &AuthoritativeTime,
    latency: LatencyEstimate,
    rule: &ScheduleRule,
) -> Result<ScheduleWindow, TimeSyncError> {
    compute_schedule_at(authoritative.epoch_ms(), latency, rule)
}

/// [`compute_schedule`] for a raw epoch-millisecond "now"
pub fn compute_schedule_at(
    now_ms: i64,
    latency: LatencyEstimate,
    rule: &ScheduleRule,
) -> Result<ScheduleWindow, TimeSyncError> {
    let arrival_epoch_ms = next_arrival_ms(now_ms, rule)?;
    let lead = i64::try_from(latency.as_millis()).unwrap_or(i64::MAX);
    let send_epoch_ms = arrival_epoch_ms.saturating_sub(lead);

    if send_epoch_ms <= now_ms {
        return Err(TimeSyncError::PastDeadline {
            send_epoch_ms,
            authoritative_epoch_ms: now_ms,
        });
    }

    Ok(ScheduleWindow {
        arrival_epoch_ms,
        send_epoch_ms,
    })
}

/// Next instant `>= now_ms` matching the rule in the rule's zone
///
/// Ambiguous local times (DST fold) resolve to the earliest instant; local
/// times inside a DST gap move to the following day.
pub fn next_arrival_ms(now_ms: i64, rule: &ScheduleRule) -> Result<i64, TimeSyncError> {
    let now_utc: DateTime<Utc> = Utc
        .timestamp_millis_opt(now_ms)
        .single()
        .ok_or(TimeSyncError::InvalidTimestamp(now_ms))?;
    let today = now_utc.with_timezone(&rule.zone).date_naive();

    let mut day = match rule.rollover {
        Rollover::NextOccurrence => today,
        Rollover::NextCalendarDay => next_day(today, now_ms)?,
    };

    for _ in 0..SEARCH_DAYS {
        let local = day.and_time(rule.time_of_day);
        if let Some(candidate) = rule.zone.from_local_datetime(&local).earliest() {
            let candidate_ms = candidate.timestamp_millis();
            if candidate_ms >= now_ms {
                return Ok(candidate_ms);
            }
        }
        day = next_day(day, now_ms)?;
    }

    Err(TimeSyncError::NoArrivalInstant {
        time_of_day: rule.time_of_day.to_string(),
        zone: rule.zone.name().to_string(),
    })
}

fn next_day(day: NaiveDate, now_ms: i64) -> Result<NaiveDate, TimeSyncError> {
    day.succ_opt().ok_or(TimeSyncError::InvalidTimestamp(now_ms))
}

/// Render `epoch_ms` as `yyyy-MM-dd HH:mm:ss.SSS TZ` in `zone`
pub fn format_in_zone(epoch_ms: i64, zone: Tz) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(utc) => utc
            .with_timezone(&zone)
            .format("%Y-%m-%d %H:%M:%S%.3f %Z")
            .to_string(),
        None => format!("{epoch_ms} (out of range)"),
    }
}
