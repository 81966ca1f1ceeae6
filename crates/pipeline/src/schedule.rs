//! Five-field schedule expressions (`minute hour day-of-month month day-of-week`).
//!
//! Supported field syntax: `*`, single values, `a-b` ranges, `/n` steps on
//! either, and comma lists. Day-of-week accepts `0-7` with both `0` and `7`
//! meaning Sunday. Every field must match, day-of-month and day-of-week
//! included: `0 9 1 * 1` fires only when the 1st is a Monday. This is the
//! matching rule of the node-cron scheduler that existing `CRON_SCHEDULE`
//! values were written for, not Vixie cron's either-day rule. All times are
//! UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

use crate::ScheduleError;

/// Weekday names in day-of-week order (Sunday = 0).
pub const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// How many days ahead [`Schedule::next_after`] searches. Covers the
/// 28-year weekday cycle, so a leap day on a given weekday is still found.
const SEARCH_DAYS: i64 = 366 * 29;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(self, value: u32) -> bool {
        value < 64 && self.0 & (1 << value) != 0
    }
}

/// A parsed schedule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    expression: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let invalid = |reason: String| ScheduleError::InvalidExpression {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields[..] else {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        };

        let minutes = parse_field(minute, 0, 59).map_err(&invalid)?;
        let hours = parse_field(hour, 0, 23).map_err(&invalid)?;
        let days_of_month = parse_field(dom, 1, 31).map_err(&invalid)?;
        let months = parse_field(month, 1, 12).map_err(&invalid)?;
        let mut days_of_week = parse_field(dow, 0, 7).map_err(&invalid)?;
        if days_of_week.contains(7) {
            days_of_week.0 |= 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
        })
    }

    /// Builds a weekly schedule from a day name and an `HH:MM` time,
    /// e.g. `("Sunday", "18:00")` becomes `0 18 * * 0`.
    pub fn weekly(day: &str, time: &str) -> Result<Self, ScheduleError> {
        let day_number = WEEKDAYS
            .iter()
            .position(|d| d.eq_ignore_ascii_case(day.trim()))
            .ok_or_else(|| ScheduleError::InvalidDay(day.to_string()))?;
        let (hour, minute) = parse_time(time)?;
        Self::parse(&format!("{minute} {hour} * * {day_number}"))
    }

    /// The normalised expression text.
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// `true` if the schedule fires in the minute containing `at`.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.minutes.contains(at.minute())
            && self.hours.contains(at.hour())
            && self.day_matches(at.date_naive())
    }

    /// The first fire time strictly after `after`, if any within the search
    /// horizon.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let mut date = start.date_naive();
        let (mut first_hour, mut first_minute) = (start.hour(), start.minute());

        for _ in 0..SEARCH_DAYS {
            if self.day_matches(date) {
                for hour in first_hour..24 {
                    if !self.hours.contains(hour) {
                        continue;
                    }
                    let from = if hour == first_hour { first_minute } else { 0 };
                    if let Some(minute) = (from..60).find(|m| self.minutes.contains(*m)) {
                        return date.and_hms_opt(hour, minute, 0).map(|dt| dt.and_utc());
                    }
                }
            }
            date = date.succ_opt()?;
            first_hour = 0;
            first_minute = 0;
        }
        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        self.months.contains(date.month())
            && self.days_of_month.contains(date.day())
            && self
                .days_of_week
                .contains(date.weekday().num_days_from_sunday())
    }
}

impl std::str::FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Parses `HH:MM` (24-hour clock) into `(hour, minute)`.
pub fn parse_time(time: &str) -> Result<(u32, u32), ScheduleError> {
    let invalid = || ScheduleError::InvalidTime(time.to_string());
    let (h, m) = time.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<FieldSet, String> {
    let mut set = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step in '{part}'"))?;
                if step == 0 {
                    return Err(format!("zero step in '{part}'"));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, min, max)?, parse_value(b, min, max)?)
        } else {
            let v = parse_value(range, min, max)?;
            // "5/15" means "from 5 to the end, every 15".
            if part.contains('/') { (v, max) } else { (v, v) }
        };
        if lo > hi {
            return Err(format!("descending range '{range}'"));
        }

        for v in (lo..=hi).step_by(step as usize) {
            set |= 1 << v;
        }
    }
    Ok(FieldSet(set))
}

fn parse_value(value: &str, min: u32, max: u32) -> Result<u32, String> {
    let v: u32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if v < min || v > max {
        return Err(format!("{v} outside {min}-{max}"));
    }
    Ok(v)
}
