use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Duration, Month};

use crate::ValidationError;

/// Calendar day used to key per-day history rows, printed as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingDay(Date);

impl TradingDay {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDate {
            value: input.to_owned(),
        };

        let mut parts = input.trim().splitn(3, '-');
        let year: i32 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let month: u8 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let day: u8 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;

        let month = Month::try_from(month).map_err(|_| invalid())?;
        let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;
        Ok(Self(date))
    }

    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub fn as_date(self) -> Date {
        self.0
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add(Duration::days(1)).map(Self)
    }
}

impl Display for TradingDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for TradingDay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TradingDay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Closed interval of trading days, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: TradingDay,
    end: TradingDay,
}

impl DateRange {
    pub fn new(start: TradingDay, end: TradingDay) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn single(day: TradingDay) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(self) -> TradingDay {
        self.start
    }

    pub fn end(self) -> TradingDay {
        self.end
    }

    pub fn contains(self, day: TradingDay) -> bool {
        self.start <= day && day <= self.end
    }

    /// Iterate every day in the range, both endpoints included, ascending.
    pub fn days(self) -> Days {
        Days {
            next: Some(self.start),
            end: self.end,
        }
    }

    /// Number of days in the range (always at least one).
    pub fn len_days(self) -> i64 {
        (self.end.as_date() - self.start.as_date()).whole_days() + 1
    }
}

/// Iterator over the days of a [`DateRange`].
#[derive(Debug, Clone)]
pub struct Days {
    next: Option<TradingDay>,
    end: TradingDay,
}

impl Iterator for Days {
    type Item = TradingDay;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = current.next();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_iso_date() {
        let day = TradingDay::parse("2024-03-09").expect("must parse");
        assert_eq!(day.to_string(), "2024-03-09");
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(TradingDay::parse("2024-13-01").is_err());
        assert!(TradingDay::parse("2024-02-30").is_err());
        assert!(TradingDay::parse("not-a-date").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        let start = TradingDay::parse("2024-03-09").expect("start");
        let end = TradingDay::parse("2024-03-01").expect("end");
        let err = DateRange::new(start, end).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvertedDateRange { .. }));
    }

    #[test]
    fn days_iterates_closed_interval_across_month_boundary() {
        let start = TradingDay::parse("2024-02-28").expect("start");
        let end = TradingDay::parse("2024-03-02").expect("end");
        let range = DateRange::new(start, end).expect("range");

        let days: Vec<String> = range.days().map(|day| day.to_string()).collect();
        assert_eq!(
            days,
            ["2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"]
        );
        assert_eq!(range.len_days(), 4);
    }

    #[test]
    fn single_day_range_contains_only_itself() {
        let day = TradingDay::parse("2024-06-01").expect("day");
        let range = DateRange::single(day);
        assert_eq!(range.days().count(), 1);
        assert!(range.contains(day));
        assert!(!range.contains(day.next().expect("next day")));
    }
}
