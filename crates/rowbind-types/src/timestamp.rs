//! Timestamp type bound as `SQL_TYPE_TIMESTAMP`.

use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

const NANOS_PER_MILLI: u32 = 1_000_000;
const NANOS_PER_SECOND: u32 = 1_000_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// A calendar date and time of day without zone, with nanosecond fraction.
///
/// Field order makes the derived ordering chronological. The default value
/// is the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    year: i16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    fraction: u32,
}

impl Timestamp {
    /// The Unix epoch, `1970-01-01T00:00:00.000Z`.
    pub const EPOCH: Self = Self {
        year: 1970,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
        fraction: 0,
    };

    /// Build a timestamp from calendar fields, validating every range.
    pub fn new(
        year: i16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        fraction: u32,
    ) -> Result<Self, TypeError> {
        if !(1..=12).contains(&month) {
            return Err(TypeError::InvalidTimestamp(format!("month {month}")));
        }
        if day == 0 || day > days_in_month(year, month) {
            return Err(TypeError::InvalidTimestamp(format!(
                "day {day} of {year:04}-{month:02}"
            )));
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(TypeError::InvalidTimestamp(format!(
                "time {hour:02}:{minute:02}:{second:02}"
            )));
        }
        if fraction >= NANOS_PER_SECOND {
            return Err(TypeError::InvalidTimestamp(format!("fraction {fraction}")));
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            fraction,
        })
    }

    /// Year.
    #[must_use]
    pub fn year(&self) -> i16 {
        self.year
    }

    /// Month, 1 through 12.
    #[must_use]
    pub fn month(&self) -> u8 {
        self.month
    }

    /// Day of month, starting at 1.
    #[must_use]
    pub fn day(&self) -> u8 {
        self.day
    }

    /// Hour, 0 through 23.
    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute, 0 through 59.
    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Second, 0 through 59.
    #[must_use]
    pub fn second(&self) -> u8 {
        self.second
    }

    /// Fraction of the second in nanoseconds.
    #[must_use]
    pub fn fraction(&self) -> u32 {
        self.fraction
    }

    /// Convert seconds since the Unix epoch.
    // rem_euclid keeps secs within one day, so the casts below are lossless.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, TypeError> {
        let days = seconds.div_euclid(SECONDS_PER_DAY);
        let secs = seconds.rem_euclid(SECONDS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        let year =
            i16::try_from(year).map_err(|_| TypeError::out_of_range(seconds, "Timestamp"))?;

        Ok(Self {
            year,
            month,
            day,
            hour: (secs / 3600) as u8,
            minute: (secs % 3600 / 60) as u8,
            second: (secs % 60) as u8,
            fraction: 0,
        })
    }

    /// Seconds since the Unix epoch, dropping the fraction.
    #[must_use]
    pub fn to_unix_seconds(&self) -> i64 {
        days_from_civil(i64::from(self.year), self.month, self.day) * SECONDS_PER_DAY
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.fraction / NANOS_PER_MILLI
        )
    }
}

impl FromStr for Timestamp {
    type Err = TypeError;

    /// Parse the `YYYY-MM-DDTHH:MM:SS[.mmm][Z]` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidTimestamp(s.to_string());

        let s_trimmed = s.strip_suffix('Z').unwrap_or(s);
        let (date, time) = s_trimmed
            .split_once(['T', ' '])
            .ok_or_else(invalid)?;

        let mut date_parts = date.splitn(3, '-');
        let year = date_parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let month = date_parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let day = date_parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

        let (clock, millis) = match time.split_once('.') {
            Some((clock, frac)) => {
                if frac.is_empty() || frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let padded = format!("{frac:0<3}");
                (clock, padded.parse::<u32>().map_err(|_| invalid())?)
            }
            None => (time, 0),
        };

        let mut clock_parts = clock.splitn(3, ':');
        let hour = clock_parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minute = clock_parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let second = clock_parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

        Self::new(year, month, day, hour, minute, second, millis * NANOS_PER_MILLI)
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::NaiveDateTime> for Timestamp {
    // chrono keeps every field within the ranges checked by `new`.
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: chrono::NaiveDateTime) -> Self {
        use chrono::{Datelike, Timelike};

        Self {
            year: value.year() as i16,
            month: value.month() as u8,
            day: value.day() as u8,
            hour: value.hour() as u8,
            minute: value.minute() as u8,
            second: value.second() as u8,
            fraction: value.nanosecond() % NANOS_PER_SECOND,
        }
    }
}

#[cfg(feature = "chrono")]
impl TryFrom<Timestamp> for chrono::NaiveDateTime {
    type Error = TypeError;

    fn try_from(value: Timestamp) -> Result<Self, Self::Error> {
        chrono::NaiveDate::from_ymd_opt(
            i32::from(value.year),
            u32::from(value.month),
            u32::from(value.day),
        )
        .and_then(|date| {
            date.and_hms_nano_opt(
                u32::from(value.hour),
                u32::from(value.minute),
                u32::from(value.second),
                value.fraction,
            )
        })
        .ok_or_else(|| TypeError::InvalidTimestamp(value.to_string()))
    }
}

fn is_leap_year(year: i16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        _ => 28,
    }
}

// Proleptic Gregorian day arithmetic, day 0 is 1970-01-01.
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let yoe = year.rem_euclid(400);
    let month = i64::from(month);
    let doy = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_epoch_display() {
        assert_eq!(Timestamp::default().to_string(), "1970-01-01T00:00:00.000Z");
        assert_eq!(Timestamp::from_unix_seconds(0).unwrap(), Timestamp::EPOCH);
    }

    #[test]
    fn test_display_millis() {
        let ts = Timestamp::new(2017, 3, 9, 14, 5, 7, 123_456_789).unwrap();
        assert_eq!(ts.to_string(), "2017-03-09T14:05:07.123Z");
    }

    #[test]
    fn test_parse_display_form() {
        let ts: Timestamp = "2017-03-09T14:05:07.123Z".parse().unwrap();
        assert_eq!(ts.year(), 2017);
        assert_eq!(ts.fraction(), 123_000_000);

        let ts: Timestamp = "2000-02-29 23:59:59".parse().unwrap();
        assert_eq!(ts.day(), 29);

        assert!("2001-02-29T00:00:00Z".parse::<Timestamp>().is_err());
        assert!("yesterday".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_validation() {
        assert!(Timestamp::new(2020, 13, 1, 0, 0, 0, 0).is_err());
        assert!(Timestamp::new(2020, 4, 31, 0, 0, 0, 0).is_err());
        assert!(Timestamp::new(2020, 4, 30, 24, 0, 0, 0).is_err());
        assert!(Timestamp::new(2020, 4, 30, 0, 0, 0, NANOS_PER_SECOND).is_err());
    }

    #[test]
    fn test_unix_before_epoch() {
        let ts = Timestamp::from_unix_seconds(-1).unwrap();
        assert_eq!(ts.to_string(), "1969-12-31T23:59:59.000Z");
        assert_eq!(ts.to_unix_seconds(), -1);
    }

    #[test]
    fn test_ordering_is_chronological() {
        let earlier = Timestamp::new(2019, 12, 31, 23, 59, 59, 0).unwrap();
        let later = Timestamp::new(2020, 1, 1, 0, 0, 0, 0).unwrap();
        assert!(earlier < later);
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn test_chrono_conversion() {
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(12, 30, 45, 250)
            .unwrap();
        let ts = Timestamp::from(naive);
        assert_eq!(ts.to_string(), "2024-02-29T12:30:45.250Z");
        assert_eq!(chrono::NaiveDateTime::try_from(ts).unwrap(), naive);
    }

    proptest! {
        #[test]
        fn prop_unix_seconds_round_trip(seconds in -62_000_000_000_i64..200_000_000_000_i64) {
            let ts = Timestamp::from_unix_seconds(seconds).unwrap();
            prop_assert_eq!(ts.to_unix_seconds(), seconds);
        }
    }
}
