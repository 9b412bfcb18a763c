//! Calendar timestamps with variable sub-second precision.
//!
//! The encoding is fixed-width big-endian for the bias-adjusted year (bias
//! 10000, covering years -9999..=9999), then one byte each for month, day,
//! hour, minute and second, then up to `precision` sub-second decimal digit
//! bytes (digit + 1) with trailing zero digits truncated, and a 0x00
//! terminator. A date-only value therefore encodes to the same short prefix
//! at every declared precision, and shorter encodings compare against longer
//! ones as if zero-padded.

use crate::error::{Error, Result};
use crate::value::num::{take, take_byte};

const YEAR_BIAS: i32 = 10_000;
const MIN_YEAR: i32 = -9_999;
const MAX_YEAR: i32 = 9_999;

/// A civil calendar timestamp with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    year: i16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    nanos: u32,
}

/// Unit a timestamp can be rounded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Calendar year.
    Year,
    /// Calendar month.
    Month,
    /// Week starting on Sunday.
    Week,
    /// ISO week starting on Monday.
    IsoWeek,
    /// Calendar day.
    Day,
    /// Hour of day.
    Hour,
    /// Minute.
    Minute,
    /// Second.
    Second,
}

/// How [`Timestamp::round`] resolves values between unit boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    /// Truncate toward the earlier boundary.
    Floor,
    /// Advance to the later boundary unless already aligned.
    Ceiling,
    /// Round to the closer boundary; ties round up.
    Nearest,
}

impl Timestamp {
    /// Creates a validated timestamp. Years outside -9999..=9999, invalid
    /// calendar dates and out-of-range time fields are rejected.
    pub fn new(
        year: i32,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        nanos: u32,
    ) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::malformed(format!("year {year} out of range")));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::malformed(format!("month {month} out of range")));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(Error::malformed(format!(
                "day {day} out of range for {year}-{month:02}"
            )));
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(Error::malformed(format!(
                "time {hour:02}:{minute:02}:{second:02} out of range"
            )));
        }
        if nanos >= 1_000_000_000 {
            return Err(Error::malformed(format!("nanos {nanos} out of range")));
        }
        Ok(Timestamp {
            year: year as i16,
            month,
            day,
            hour,
            minute,
            second,
            nanos,
        })
    }

    /// Creates a date-only timestamp at midnight.
    pub fn date(year: i32, month: u8, day: u8) -> Result<Self> {
        Timestamp::new(year, month, day, 0, 0, 0, 0)
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year as i32
    }

    /// Month (1-12).
    pub fn month(&self) -> u8 {
        self.month
    }

    /// Day of month (1-31).
    pub fn day(&self) -> u8 {
        self.day
    }

    /// Hour of day (0-23).
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute (0-59).
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Second (0-59).
    pub fn second(&self) -> u8 {
        self.second
    }

    /// Sub-second part in nanoseconds.
    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Rounds to a unit boundary before encoding.
    pub fn round(&self, unit: TimeUnit, mode: RoundMode) -> Result<Timestamp> {
        let floor = self.floor(unit);
        match mode {
            RoundMode::Floor => Ok(floor),
            RoundMode::Ceiling => {
                if *self == floor {
                    Ok(floor)
                } else {
                    floor.advance(unit)
                }
            }
            RoundMode::Nearest => {
                if *self == floor {
                    return Ok(floor);
                }
                let ceiling = floor.advance(unit)?;
                let below = self.epoch_nanos() - floor.epoch_nanos();
                let above = ceiling.epoch_nanos() - self.epoch_nanos();
                if below < above {
                    Ok(floor)
                } else {
                    Ok(ceiling)
                }
            }
        }
    }

    fn floor(&self, unit: TimeUnit) -> Timestamp {
        let mut out = *self;
        out.nanos = 0;
        if unit == TimeUnit::Second {
            return out;
        }
        out.second = 0;
        if unit == TimeUnit::Minute {
            return out;
        }
        out.minute = 0;
        if unit == TimeUnit::Hour {
            return out;
        }
        out.hour = 0;
        match unit {
            TimeUnit::Day => out,
            TimeUnit::Week | TimeUnit::IsoWeek => {
                let days = days_from_civil(out.year(), out.month, out.day);
                let shift = if unit == TimeUnit::Week { 4 } else { 3 };
                let dow = (days + shift).rem_euclid(7);
                let (year, month, day) = civil_from_days(days - dow);
                Timestamp {
                    year: year as i16,
                    month,
                    day,
                    ..out
                }
            }
            TimeUnit::Month => Timestamp { day: 1, ..out },
            TimeUnit::Year => Timestamp {
                month: 1,
                day: 1,
                ..out
            },
            TimeUnit::Hour | TimeUnit::Minute | TimeUnit::Second => unreachable!(),
        }
    }

    /// Advances a unit-aligned timestamp by exactly one unit.
    fn advance(&self, unit: TimeUnit) -> Result<Timestamp> {
        match unit {
            TimeUnit::Year => Timestamp::new(self.year() + 1, 1, 1, 0, 0, 0, 0),
            TimeUnit::Month => {
                let (year, month) = if self.month == 12 {
                    (self.year() + 1, 1)
                } else {
                    (self.year(), self.month + 1)
                };
                Timestamp::new(year, month, 1, 0, 0, 0, 0)
            }
            TimeUnit::Week | TimeUnit::IsoWeek | TimeUnit::Day => {
                let step = if unit == TimeUnit::Day { 1 } else { 7 };
                let days = days_from_civil(self.year(), self.month, self.day) + step;
                let (year, month, day) = civil_from_days(days);
                Timestamp::new(year, month, day, 0, 0, 0, 0)
            }
            TimeUnit::Hour | TimeUnit::Minute | TimeUnit::Second => {
                let step = match unit {
                    TimeUnit::Hour => 3_600,
                    TimeUnit::Minute => 60,
                    _ => 1,
                };
                let seconds = self.epoch_seconds() + step;
                let days = seconds.div_euclid(86_400);
                let tod = seconds.rem_euclid(86_400);
                let (year, month, day) = civil_from_days(days);
                Timestamp::new(
                    year,
                    month,
                    day,
                    (tod / 3_600) as u8,
                    (tod / 60 % 60) as u8,
                    (tod % 60) as u8,
                    0,
                )
            }
        }
    }

    fn epoch_seconds(&self) -> i64 {
        days_from_civil(self.year(), self.month, self.day) * 86_400
            + self.hour as i64 * 3_600
            + self.minute as i64 * 60
            + self.second as i64
    }

    fn epoch_nanos(&self) -> i128 {
        self.epoch_seconds() as i128 * 1_000_000_000 + self.nanos as i128
    }
}

pub(crate) fn encode(ts: &Timestamp, precision: u8, out: &mut Vec<u8>) -> Result<()> {
    if precision > 9 {
        return Err(Error::malformed(format!(
            "timestamp precision {precision} out of range"
        )));
    }
    out.extend_from_slice(&((ts.year() + YEAR_BIAS) as u16).to_be_bytes());
    out.push(ts.month);
    out.push(ts.day);
    out.push(ts.hour);
    out.push(ts.minute);
    out.push(ts.second);

    let mut digits = [0u8; 9];
    let mut n = ts.nanos;
    for slot in digits.iter_mut().rev() {
        *slot = (n % 10) as u8;
        n /= 10;
    }
    let mut len = precision as usize;
    while len > 0 && digits[len - 1] == 0 {
        len -= 1;
    }
    for &d in &digits[..len] {
        out.push(d + 1);
    }
    out.push(0x00);
    Ok(())
}

pub(crate) fn decode(input: &mut &[u8]) -> Result<Timestamp> {
    let raw = take(input, 2)?;
    let year = u16::from_be_bytes(raw.try_into().unwrap()) as i32 - YEAR_BIAS;
    let month = take_byte(input)?;
    let day = take_byte(input)?;
    let hour = take_byte(input)?;
    let minute = take_byte(input)?;
    let second = take_byte(input)?;

    let mut nanos: u32 = 0;
    let mut scale: u32 = 100_000_000;
    let mut count = 0;
    loop {
        let b = take_byte(input)?;
        if b == 0x00 {
            break;
        }
        if !(1..=10).contains(&b) || count == 9 {
            return Err(Error::malformed(format!(
                "invalid sub-second digit byte {b:#04x}"
            )));
        }
        nanos += (b - 1) as u32 * scale;
        scale /= 10;
        count += 1;
    }
    Timestamp::new(year, month, day, hour, minute, second, nanos)
}

pub(crate) fn is_leap(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub(crate) fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => 0,
    }
}

// Civil <-> day-count conversions over the proleptic Gregorian calendar,
// days counted from 1970-01-01.
pub(crate) fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let y = year as i64 - if month <= 2 { 1 } else { 0 };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = if month > 2 {
        month as i64 - 3
    } else {
        month as i64 + 9
    };
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

pub(crate) fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    ((y + if month <= 2 { 1 } else { 0 }) as i32, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::test_util::hex;

    fn ts(y: i32, mo: u8, d: u8, h: u8, mi: u8, s: u8, n: u32) -> Timestamp {
        Timestamp::new(y, mo, d, h, mi, s, n).unwrap()
    }

    #[test]
    fn date_only_prefix_is_precision_independent() {
        let midnight = Timestamp::date(2024, 3, 1).unwrap();
        let mut p0 = Vec::new();
        encode(&midnight, 0, &mut p0).unwrap();
        let mut p9 = Vec::new();
        encode(&midnight, 9, &mut p9).unwrap();
        assert_eq!(p0, p9);
        assert_eq!(hex(&p0), "2ef803010000000000");
    }

    #[test]
    fn shorter_encoding_compares_as_zero_padded() {
        let half = ts(2024, 3, 1, 12, 0, 0, 500_000_000);
        let fine = ts(2024, 3, 1, 12, 0, 0, 500_000_001);
        let whole = ts(2024, 3, 1, 12, 0, 0, 0);

        let mut enc_half = Vec::new();
        encode(&half, 3, &mut enc_half).unwrap();
        let mut enc_fine = Vec::new();
        encode(&fine, 9, &mut enc_fine).unwrap();
        let mut enc_whole = Vec::new();
        encode(&whole, 9, &mut enc_whole).unwrap();

        assert!(enc_whole < enc_half);
        assert!(enc_half < enc_fine);
    }

    #[test]
    fn round_trip_with_truncated_trailing_zeros() {
        let value = ts(1969, 12, 31, 23, 59, 59, 120_000_000);
        let mut out = Vec::new();
        encode(&value, 9, &mut out).unwrap();
        // Only two digit bytes survive: 1 and 2.
        assert_eq!(out.len(), 2 + 5 + 2 + 1);
        let mut cursor = out.as_slice();
        assert_eq!(decode(&mut cursor).unwrap(), value);
        assert!(cursor.is_empty());
    }

    #[test]
    fn digits_beyond_declared_precision_are_truncated() {
        let value = ts(2024, 1, 1, 0, 0, 0, 123_456_789);
        let mut millis = Vec::new();
        encode(&value, 3, &mut millis).unwrap();
        let mut cursor = millis.as_slice();
        assert_eq!(decode(&mut cursor).unwrap().nanos(), 123_000_000);
    }

    #[test]
    fn year_bounds_are_enforced() {
        assert!(Timestamp::date(-9_999, 1, 1).is_ok());
        assert!(Timestamp::date(9_999, 12, 31).is_ok());
        assert!(Timestamp::date(10_000, 1, 1).is_err());
        assert!(Timestamp::date(-10_000, 1, 1).is_err());
        assert!(Timestamp::date(2023, 2, 29).is_err());
        assert!(Timestamp::date(2024, 2, 29).is_ok());
    }

    #[test]
    fn civil_conversions_agree() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
        for days in [-1_000_000, -1, 0, 1, 11_017, 1_000_000] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
    }

    #[test]
    fn floor_rounding() {
        let value = ts(2024, 3, 15, 14, 30, 45, 123_000_000);
        assert_eq!(
            value.round(TimeUnit::Second, RoundMode::Floor).unwrap(),
            ts(2024, 3, 15, 14, 30, 45, 0)
        );
        assert_eq!(
            value.round(TimeUnit::Day, RoundMode::Floor).unwrap(),
            Timestamp::date(2024, 3, 15).unwrap()
        );
        assert_eq!(
            value.round(TimeUnit::Month, RoundMode::Floor).unwrap(),
            Timestamp::date(2024, 3, 1).unwrap()
        );
        assert_eq!(
            value.round(TimeUnit::Year, RoundMode::Floor).unwrap(),
            Timestamp::date(2024, 1, 1).unwrap()
        );
        // 2024-03-15 is a Friday.
        assert_eq!(
            value.round(TimeUnit::Week, RoundMode::Floor).unwrap(),
            Timestamp::date(2024, 3, 10).unwrap()
        );
        assert_eq!(
            value.round(TimeUnit::IsoWeek, RoundMode::Floor).unwrap(),
            Timestamp::date(2024, 3, 11).unwrap()
        );
    }

    #[test]
    fn ceiling_and_nearest_rounding() {
        let value = ts(2024, 3, 15, 14, 30, 45, 0);
        assert_eq!(
            value.round(TimeUnit::Hour, RoundMode::Ceiling).unwrap(),
            ts(2024, 3, 15, 15, 0, 0, 0)
        );
        // Already aligned: ceiling is a no-op.
        let aligned = ts(2024, 3, 15, 14, 0, 0, 0);
        assert_eq!(
            aligned.round(TimeUnit::Hour, RoundMode::Ceiling).unwrap(),
            aligned
        );
        // Nearest rounds down before the midpoint, up at and after it.
        assert_eq!(
            ts(2024, 3, 15, 14, 29, 0, 0)
                .round(TimeUnit::Hour, RoundMode::Nearest)
                .unwrap(),
            ts(2024, 3, 15, 14, 0, 0, 0)
        );
        assert_eq!(
            ts(2024, 3, 15, 14, 30, 0, 0)
                .round(TimeUnit::Hour, RoundMode::Nearest)
                .unwrap(),
            ts(2024, 3, 15, 15, 0, 0, 0)
        );
        // Month ceiling rolls the year.
        assert_eq!(
            ts(2024, 12, 2, 0, 0, 0, 0)
                .round(TimeUnit::Month, RoundMode::Ceiling)
                .unwrap(),
            Timestamp::date(2025, 1, 1).unwrap()
        );
        // Ceiling past the supported year range is an error, not a wrap.
        assert!(ts(9_999, 12, 20, 0, 0, 0, 0)
            .round(TimeUnit::Year, RoundMode::Ceiling)
            .is_err());
    }
}
