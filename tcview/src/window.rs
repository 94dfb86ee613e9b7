//! Date windows selectable from the command line and the interactive menu.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// Date format accepted from users and used in exports.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A time window to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    /// The last 24 hours.
    Last24Hours,
    /// The last 7 days.
    Last7Days,
    /// The last 30 days.
    Last30Days,
    /// The last 90 days.
    Last90Days,
    /// From the start of `start` to the end of `end` (or now).
    Range {
        /// First day, inclusive.
        start: NaiveDate,
        /// Last day, inclusive; `None` means up to now.
        end: Option<NaiveDate>,
    },
    /// Unbounded: everything up to now.
    AllTime,
}

/// A resolved wall-clock interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    /// Lower bound; `None` means from genesis.
    pub start: Option<DateTime<Utc>>,
    /// Upper bound.
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// Resolve the window against `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when a custom range ends before it starts.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<TimeSpan> {
        let back = |d: Duration| TimeSpan {
            start: Some(now - d),
            end: now,
        };
        let span = match self {
            Self::Last24Hours => back(Duration::hours(24)),
            Self::Last7Days => back(Duration::days(7)),
            Self::Last30Days => back(Duration::days(30)),
            Self::Last90Days => back(Duration::days(90)),
            Self::AllTime => TimeSpan { start: None, end: now },
            Self::Range { start, end } => {
                let start = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
                let end = end.map_or(now, end_of_day);
                if start > end {
                    return Err(Error::InvalidInput(format!(
                        "start date {} is after end date {}",
                        start.format(DATE_FORMAT),
                        end.format(DATE_FORMAT)
                    )));
                }
                TimeSpan {
                    start: Some(start),
                    end,
                }
            }
        };
        Ok(span)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Last24Hours => f.write_str("last 24 hours"),
            Self::Last7Days => f.write_str("last 7 days"),
            Self::Last30Days => f.write_str("last 30 days"),
            Self::Last90Days => f.write_str("last 90 days"),
            Self::AllTime => f.write_str("all time"),
            Self::Range { start, end: Some(end) } => write!(
                f,
                "{} to {}",
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            ),
            Self::Range { start, end: None } => write!(f, "{} to today", start.format(DATE_FORMAT)),
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(start) => write!(
                f,
                "{} to {}",
                start.format(DATE_FORMAT),
                self.end.format(DATE_FORMAT)
            ),
            None => f.write_str("all time"),
        }
    }
}

/// 23:59:59 UTC on `day`.
fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&day.and_time(last_second))
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the string is not a valid date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("invalid date {input:?} (expected YYYY-MM-DD): {e}")))
}
