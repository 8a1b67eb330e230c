use std::fmt::Display;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Date format used by the permits portal and the command line.
pub const PORTAL_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, thiserror::Error)]
#[error("Invalid date '{input}', expected MM/DD/YYYY")]
pub struct DateParseError {
    input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Start date ({start}) cannot be after end date ({end})")]
pub struct InvalidRangeError {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn parse_portal_date(input: &str) -> Result<NaiveDate, DateParseError> {
    NaiveDate::parse_from_str(input.trim(), PORTAL_DATE_FORMAT).map_err(|_| DateParseError {
        input: input.to_string(),
    })
}

/// An inclusive date range searched in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub fn start_text(&self) -> String {
        self.start.format(PORTAL_DATE_FORMAT).to_string()
    }

    pub fn end_text(&self) -> String {
        self.end.format(PORTAL_DATE_FORMAT).to_string()
    }
}

impl Display for DateInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start_text(), self.end_text())
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = match date.month() {
        12 => (date.year() + 1, 1),
        m => (date.year(), m + 1),
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Cuts `[start, end]` into calendar-month chunks.
///
/// The first chunk starts at `start`, later ones on the 1st of their month;
/// each ends on the last day of its month or on `end`, whichever is earlier.
pub fn plan_intervals(
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DateInterval>, InvalidRangeError> {
    if start > end {
        return Err(InvalidRangeError { start, end });
    }

    let mut intervals = Vec::new();
    let mut current = start;
    while current <= end {
        let Some(next) = first_of_next_month(current) else {
            intervals.push(DateInterval {
                start: current,
                end,
            });
            break;
        };
        let month_end = next.pred_opt().map_or(end, |last| last.min(end));
        intervals.push(DateInterval {
            start: current,
            end: month_end,
        });
        current = next;
    }

    Ok(intervals)
}
