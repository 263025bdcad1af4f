//! The `P[n]Y[n]M[n]DT[n]H[n]M[n]S` duration notation used by XML schedule
//! files, including the producer convention of negating individual
//! components rather than the whole value.

use crate::duration::{Duration, TimeUnit, TimeUnitDefaults, convert_units};
use std::fmt;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
const DAYS_PER_OUTPUT_MONTH: i64 = 28;
const MONTHS_PER_YEAR: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XsdDuration {
    years: i64,
    months: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: f64,
}

impl XsdDuration {
    pub fn new(years: i64, months: i64, days: i64, hours: i64, minutes: i64, seconds: f64) -> Self {
        Self {
            years,
            months,
            days,
            hours,
            minutes,
            seconds,
        }
    }

    /// Parses a duration literal. Returns `None` when the value is malformed.
    pub fn parse(value: &str) -> Option<Self> {
        let mut result = XsdDuration::default();
        if value.is_empty() {
            return None;
        }

        // Some producers write a bare zero for an empty duration.
        if value == "0" {
            return Some(result);
        }

        let bytes = value.as_bytes();
        let (mut index, negative) = match bytes {
            [b'P', ..] => (1, false),
            [b'-', b'P', ..] => (2, true),
            _ => return None,
        };

        let mut has_time = false;
        while index < bytes.len() {
            let start = index;
            while index < bytes.len()
                && (bytes[index].is_ascii_digit() || bytes[index] == b'.' || bytes[index] == b'-')
            {
                index += 1;
            }
            let number = &value[start..index];
            let designator = *bytes.get(index)?;

            match designator {
                b'Y' => result.years = number.parse().ok()?,
                b'M' if has_time => result.minutes = number.parse().ok()?,
                b'M' => result.months = number.parse().ok()?,
                b'D' => result.days = number.parse().ok()?,
                b'T' => has_time = true,
                b'H' => result.hours = number.parse().ok()?,
                b'S' => {
                    let seconds: f64 = number.parse().ok()?;
                    if !seconds.is_finite() {
                        return None;
                    }
                    result.seconds = seconds;
                }
                _ => return None,
            }
            index += 1;
        }

        if negative {
            result = result.negated();
        }
        Some(result)
    }

    /// Splits a duration into components. The value is rounded to whole
    /// seconds first; weeks become days and months are 28 days long.
    pub fn from_duration(duration: &Duration) -> Self {
        let amount = duration.amount();
        let mut result = XsdDuration::default();
        if amount == 0.0 {
            return result;
        }

        let seconds_per_unit = match duration.unit() {
            TimeUnit::Minutes | TimeUnit::ElapsedMinutes => SECONDS_PER_MINUTE,
            TimeUnit::Hours | TimeUnit::ElapsedHours => SECONDS_PER_HOUR,
            TimeUnit::Days | TimeUnit::ElapsedDays => SECONDS_PER_DAY,
            TimeUnit::Weeks | TimeUnit::ElapsedWeeks => SECONDS_PER_DAY * 7,
            TimeUnit::Months | TimeUnit::ElapsedMonths => SECONDS_PER_DAY * DAYS_PER_OUTPUT_MONTH,
            TimeUnit::Years | TimeUnit::ElapsedYears => {
                SECONDS_PER_DAY * DAYS_PER_OUTPUT_MONTH * MONTHS_PER_YEAR
            }
            TimeUnit::Percent | TimeUnit::ElapsedPercent => return result,
        };

        let mut time = (amount * seconds_per_unit as f64).round() as i64;
        result.seconds = (time % 60) as f64;
        time /= 60;

        match duration.unit() {
            TimeUnit::Minutes | TimeUnit::ElapsedMinutes => {
                result.minutes = time;
                return result;
            }
            _ => {
                result.minutes = time % 60;
                time /= 60;
            }
        }

        match duration.unit() {
            TimeUnit::Hours | TimeUnit::ElapsedHours => {
                result.hours = time;
                return result;
            }
            _ => {
                result.hours = time % 24;
                time /= 24;
            }
        }

        match duration.unit() {
            TimeUnit::Days | TimeUnit::ElapsedDays | TimeUnit::Weeks | TimeUnit::ElapsedWeeks => {
                result.days = time;
                return result;
            }
            _ => {
                result.days = time % DAYS_PER_OUTPUT_MONTH;
                time /= DAYS_PER_OUTPUT_MONTH;
            }
        }

        match duration.unit() {
            TimeUnit::Months | TimeUnit::ElapsedMonths => result.months = time,
            _ => {
                result.months = time % MONTHS_PER_YEAR;
                result.years = time / MONTHS_PER_YEAR;
            }
        }
        result
    }

    /// Converts back to a [`Duration`]. The coarsest non-zero component picks
    /// the intermediate unit; the result is expressed in `target`.
    pub fn to_duration(&self, target: TimeUnit, defaults: &TimeUnitDefaults) -> Duration {
        let unit = self.coarsest_unit();
        let years = self.years as f64;
        let months = self.months as f64;
        let days = self.days as f64;
        let hours = self.hours as f64;
        let minutes = self.minutes as f64;
        let seconds = self.seconds;

        let amount = match unit {
            TimeUnit::Years => {
                years
                    + months / 12.0
                    + days / 365.0
                    + hours / (365.0 * 24.0)
                    + minutes / (365.0 * 24.0 * 60.0)
                    + seconds / (365.0 * 24.0 * 3600.0)
            }
            TimeUnit::Months => {
                years * 12.0
                    + months
                    + days / 30.0
                    + hours / (30.0 * 24.0)
                    + minutes / (30.0 * 24.0 * 60.0)
                    + seconds / (30.0 * 24.0 * 3600.0)
            }
            TimeUnit::Days => {
                years * 365.0
                    + months * 30.0
                    + days
                    + hours / 24.0
                    + minutes / (24.0 * 60.0)
                    + seconds / (24.0 * 3600.0)
            }
            TimeUnit::Hours => {
                years * 365.0 * 24.0
                    + months * 30.0 * 24.0
                    + days * 24.0
                    + hours
                    + minutes / 60.0
                    + seconds / 3600.0
            }
            _ => {
                years * 365.0 * 24.0 * 60.0
                    + months * 30.0 * 24.0 * 60.0
                    + days * 24.0 * 60.0
                    + hours * 60.0
                    + minutes
                    + seconds / 60.0
            }
        };

        convert_units(amount, unit, target, defaults)
    }

    fn coarsest_unit(&self) -> TimeUnit {
        if self.years != 0 {
            TimeUnit::Years
        } else if self.months != 0 {
            TimeUnit::Months
        } else if self.days != 0 {
            TimeUnit::Days
        } else if self.hours != 0 {
            TimeUnit::Hours
        } else if self.minutes != 0 || self.seconds != 0.0 {
            TimeUnit::Minutes
        } else {
            TimeUnit::Days
        }
    }

    /// Prints the duration. Negative components are written as magnitudes;
    /// `compatible` places the sign before the first non-zero digit instead
    /// of in front of the whole value.
    pub fn print(&self, compatible: bool) -> String {
        let mut buffer = String::from("P");

        if self.years != 0 || self.months != 0 || self.days != 0 {
            buffer.push_str(&format!(
                "{}Y{}M{}D",
                self.years.unsigned_abs(),
                self.months.unsigned_abs(),
                self.days.unsigned_abs()
            ));
        }

        buffer.push_str(&format!(
            "T{}H{}M{}S",
            self.hours.unsigned_abs(),
            self.minutes.unsigned_abs(),
            self.seconds.abs()
        ));

        if self.is_negative() {
            if compatible {
                if let Some(index) = buffer.find(|c: char| c.is_ascii_digit() && c != '0') {
                    buffer.insert(index, '-');
                }
            } else {
                buffer.insert(0, '-');
            }
        }

        buffer
    }

    pub fn is_negative(&self) -> bool {
        self.years < 0
            || self.months < 0
            || self.days < 0
            || self.hours < 0
            || self.minutes < 0
            || self.seconds < 0.0
    }

    pub fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0.0
    }

    fn negated(&self) -> Self {
        Self {
            years: -self.years,
            months: -self.months,
            days: -self.days,
            hours: -self.hours,
            minutes: -self.minutes,
            seconds: -self.seconds,
        }
    }

    pub fn years(&self) -> i64 {
        self.years
    }

    pub fn months(&self) -> i64 {
        self.months
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn hours(&self) -> i64 {
        self.hours
    }

    pub fn minutes(&self) -> i64 {
        self.minutes
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }
}

impl fmt::Display for XsdDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print(true))
    }
}

pub fn parse_duration_string(value: &str) -> Option<XsdDuration> {
    XsdDuration::parse(value)
}
