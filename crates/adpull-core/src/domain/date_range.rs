use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use crate::error::FetchError;

const DAY_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// One inclusive slice of a reporting interval.
///
/// Chunks produced by [`DateRange::split_into_chunks`] are contiguous and
/// non-overlapping: `chunk[i].until + 1 day == chunk[i + 1].since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeChunk {
    #[serde(with = "day_string")]
    pub since: Date,
    #[serde(with = "day_string")]
    pub until: Date,
}

impl TimeChunk {
    pub fn len_days(&self) -> i64 {
        (self.until - self.since).whole_days() + 1
    }
}

impl Display for TimeChunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", format_day(self.since), format_day(self.until))
    }
}

/// Inclusive reporting interval requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Result<Self, FetchError> {
        if start > end {
            return Err(FetchError::InvalidRange {
                start: format_day(start),
                end: format_day(end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, FetchError> {
        let parsed_start = parse_day(start)?;
        let parsed_end = parse_day(end)?;
        Self::new(parsed_start, parsed_end)
    }

    pub const fn start(&self) -> Date {
        self.start
    }

    pub const fn end(&self) -> Date {
        self.end
    }

    /// Splits the range into ordered chunks of at most `max_chunk_days` days.
    ///
    /// The union of the chunks reconstructs the range exactly once, with no
    /// gaps and no overlaps. Pure and deterministic.
    pub fn split_into_chunks(&self, max_chunk_days: u32) -> Vec<TimeChunk> {
        let max_days = i64::from(max_chunk_days.max(1));
        let mut chunks = Vec::new();
        let mut current = self.start;

        while current <= self.end {
            let candidate = current.saturating_add(time::Duration::days(max_days - 1));
            let until = candidate.min(self.end);
            chunks.push(TimeChunk {
                since: current,
                until,
            });
            current = until.saturating_add(time::Duration::days(1));
            if until == Date::MAX {
                break;
            }
        }

        chunks
    }
}

pub(crate) fn parse_day(value: &str) -> Result<Date, FetchError> {
    Date::parse(value, DAY_FORMAT).map_err(|_| FetchError::InvalidRange {
        start: value.to_owned(),
        end: value.to_owned(),
    })
}

pub(crate) fn format_day(date: Date) -> String {
    date.format(DAY_FORMAT)
        .expect("calendar dates always format as year-month-day")
}

mod day_string {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_day(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_day(&value).map_err(D::Error::custom)
    }
}
