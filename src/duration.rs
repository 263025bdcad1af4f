use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const EPSILON: f64 = 0.00001;

const MINUTES_PER_HOUR: f64 = 60.0;
const ELAPSED_MINUTES_PER_DAY: f64 = 60.0 * 24.0;
const ELAPSED_MINUTES_PER_WEEK: f64 = ELAPSED_MINUTES_PER_DAY * 7.0;
const ELAPSED_MINUTES_PER_MONTH: f64 = ELAPSED_MINUTES_PER_DAY * 30.0;
const ELAPSED_MINUTES_PER_YEAR: f64 = ELAPSED_MINUTES_PER_WEEK * 52.0;
const WEEKS_PER_YEAR: f64 = 52.0;

/// Units in which a duration, an amount of work or a lag can be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
    Percent,
    ElapsedMinutes,
    ElapsedHours,
    ElapsedDays,
    ElapsedWeeks,
    ElapsedMonths,
    ElapsedYears,
    ElapsedPercent,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 14] = [
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
        TimeUnit::Weeks,
        TimeUnit::Months,
        TimeUnit::Years,
        TimeUnit::Percent,
        TimeUnit::ElapsedMinutes,
        TimeUnit::ElapsedHours,
        TimeUnit::ElapsedDays,
        TimeUnit::ElapsedWeeks,
        TimeUnit::ElapsedMonths,
        TimeUnit::ElapsedYears,
        TimeUnit::ElapsedPercent,
    ];

    /// Elapsed units measure wall-clock time and ignore working time.
    pub fn is_elapsed(self) -> bool {
        matches!(
            self,
            TimeUnit::ElapsedMinutes
                | TimeUnit::ElapsedHours
                | TimeUnit::ElapsedDays
                | TimeUnit::ElapsedWeeks
                | TimeUnit::ElapsedMonths
                | TimeUnit::ElapsedYears
                | TimeUnit::ElapsedPercent
        )
    }

    pub fn is_percent(self) -> bool {
        matches!(self, TimeUnit::Percent | TimeUnit::ElapsedPercent)
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
            TimeUnit::Weeks => "w",
            TimeUnit::Months => "mo",
            TimeUnit::Years => "y",
            TimeUnit::Percent => "%",
            TimeUnit::ElapsedMinutes => "em",
            TimeUnit::ElapsedHours => "eh",
            TimeUnit::ElapsedDays => "ed",
            TimeUnit::ElapsedWeeks => "ew",
            TimeUnit::ElapsedMonths => "emo",
            TimeUnit::ElapsedYears => "ey",
            TimeUnit::ElapsedPercent => "e%",
        }
    }

    /// Accepts the short abbreviations plus the long forms used by text
    /// based schedule formats ("mins", "hours", "wk", "mon", ...).
    pub fn from_abbreviation(value: &str) -> Option<Self> {
        let unit = match value.trim().to_ascii_lowercase().as_str() {
            "m" | "min" | "mins" | "minutes" => TimeUnit::Minutes,
            "h" | "hr" | "hrs" | "hours" => TimeUnit::Hours,
            "d" | "dy" | "days" => TimeUnit::Days,
            "w" | "wk" | "weeks" => TimeUnit::Weeks,
            "mo" | "mon" | "months" => TimeUnit::Months,
            "y" | "yr" | "years" => TimeUnit::Years,
            "%" => TimeUnit::Percent,
            "em" => TimeUnit::ElapsedMinutes,
            "eh" => TimeUnit::ElapsedHours,
            "ed" => TimeUnit::ElapsedDays,
            "ew" => TimeUnit::ElapsedWeeks,
            "emo" | "emon" => TimeUnit::ElapsedMonths,
            "ey" => TimeUnit::ElapsedYears,
            "e%" => TimeUnit::ElapsedPercent,
            _ => return None,
        };
        Some(unit)
    }

    /// Decodes the numeric duration format used by XML schedule files.
    /// Estimated variants are offset by 32 and decode to the same unit.
    pub fn from_format_code(code: i32) -> Option<Self> {
        let unit = match code {
            3 | 35 => TimeUnit::Minutes,
            4 | 36 => TimeUnit::ElapsedMinutes,
            5 | 37 => TimeUnit::Hours,
            6 | 38 => TimeUnit::ElapsedHours,
            7 | 39 | 53 => TimeUnit::Days,
            8 | 40 => TimeUnit::ElapsedDays,
            9 | 41 => TimeUnit::Weeks,
            10 | 42 => TimeUnit::ElapsedWeeks,
            11 | 43 => TimeUnit::Months,
            12 | 44 => TimeUnit::ElapsedMonths,
            19 | 51 => TimeUnit::Percent,
            20 | 52 => TimeUnit::ElapsedPercent,
            _ => return None,
        };
        Some(unit)
    }

    /// Years have no XML duration format and are written as hours.
    pub fn to_format_code(self, estimated: bool) -> i32 {
        let code = match self {
            TimeUnit::Minutes => 3,
            TimeUnit::ElapsedMinutes => 4,
            TimeUnit::ElapsedHours => 6,
            TimeUnit::Days => 7,
            TimeUnit::ElapsedDays => 8,
            TimeUnit::Weeks => 9,
            TimeUnit::ElapsedWeeks => 10,
            TimeUnit::Months => 11,
            TimeUnit::ElapsedMonths => 12,
            TimeUnit::Percent => 19,
            TimeUnit::ElapsedPercent => 20,
            TimeUnit::Hours | TimeUnit::Years | TimeUnit::ElapsedYears => 5,
        };
        if estimated { code + 32 } else { code }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Calendar-derived lengths used to move between working-time units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeUnitDefaults {
    pub minutes_per_day: f64,
    pub minutes_per_week: f64,
    pub days_per_month: f64,
}

impl Default for TimeUnitDefaults {
    fn default() -> Self {
        Self {
            minutes_per_day: 480.0,
            minutes_per_week: 2400.0,
            days_per_month: 20.0,
        }
    }
}

impl TimeUnitDefaults {
    pub fn minutes_per_month(&self) -> f64 {
        self.minutes_per_day * self.days_per_month
    }

    pub fn minutes_per_year(&self) -> f64 {
        self.minutes_per_week * WEEKS_PER_YEAR
    }
}

/// A scalar amount tagged with a time unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Duration {
    amount: f64,
    unit: TimeUnit,
}

impl Duration {
    pub fn new(amount: f64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    pub fn zero(unit: TimeUnit) -> Self {
        Self { amount: 0.0, unit }
    }

    pub fn minutes(amount: f64) -> Self {
        Self::new(amount, TimeUnit::Minutes)
    }

    pub fn hours(amount: f64) -> Self {
        Self::new(amount, TimeUnit::Hours)
    }

    pub fn days(amount: f64) -> Self {
        Self::new(amount, TimeUnit::Days)
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0.0
    }

    pub fn negate(&self) -> Self {
        if self.is_zero() {
            *self
        } else {
            Self::new(-self.amount, self.unit)
        }
    }

    pub fn convert_units(&self, to: TimeUnit, defaults: &TimeUnitDefaults) -> Self {
        if to == self.unit {
            return *self;
        }
        convert_units(self.amount, self.unit, to, defaults)
    }

    /// Sum of two durations, expressed in the units of `self`.
    pub fn add(&self, other: &Duration, defaults: &TimeUnitDefaults) -> Self {
        let other = other.convert_units(self.unit, defaults);
        Self::new(self.amount + other.amount, self.unit)
    }

    /// Compares two durations, converting `other` with the fixed
    /// 480 minutes/day, 2400 minutes/week and 20 days/month defaults.
    pub fn compare(&self, other: &Duration) -> Ordering {
        let other = other.convert_units(self.unit, &TimeUnitDefaults::default());
        if amounts_equal(self.amount, other.amount) {
            Ordering::Equal
        } else if self.amount < other.amount {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.unit == other.unit && amounts_equal(self.amount, other.amount)
    }
}

pub(crate) fn amounts_equal(lhs: f64, rhs: f64) -> bool {
    (lhs - rhs).abs() <= EPSILON
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("empty duration value")]
    Empty,
    #[error("invalid duration amount '{0}'")]
    InvalidAmount(String),
    #[error("unknown time unit '{0}'")]
    UnknownUnit(String),
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parses the compact notation used by text formats, e.g. `8h`, `1.5d`, `3ew`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DurationParseError::Empty);
        }

        let split = value
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(value.len());
        let (number, suffix) = value.split_at(split);
        let amount: f64 = number
            .parse()
            .map_err(|_| DurationParseError::InvalidAmount(number.to_string()))?;
        if !amount.is_finite() {
            return Err(DurationParseError::InvalidAmount(number.to_string()));
        }
        let unit = TimeUnit::from_abbreviation(suffix)
            .ok_or_else(|| DurationParseError::UnknownUnit(suffix.trim().to_string()))?;
        Ok(Duration::new(amount, unit))
    }
}

/// Rescales an amount between units. Everything passes through minutes;
/// working-time units use the calendar lengths in `defaults`, elapsed units
/// use wall-clock lengths. Percentages are not convertible and keep their
/// amount.
pub fn convert_units(
    amount: f64,
    from: TimeUnit,
    to: TimeUnit,
    defaults: &TimeUnitDefaults,
) -> Duration {
    if from == to || from.is_percent() || to.is_percent() {
        return Duration::new(amount, from);
    }

    let minutes = match from {
        TimeUnit::Years => amount * defaults.minutes_per_year(),
        TimeUnit::ElapsedYears => amount * ELAPSED_MINUTES_PER_YEAR,
        TimeUnit::Months => amount * defaults.minutes_per_month(),
        TimeUnit::ElapsedMonths => amount * ELAPSED_MINUTES_PER_MONTH,
        TimeUnit::Weeks => amount * defaults.minutes_per_week,
        TimeUnit::ElapsedWeeks => amount * ELAPSED_MINUTES_PER_WEEK,
        TimeUnit::Days => amount * defaults.minutes_per_day,
        TimeUnit::ElapsedDays => amount * ELAPSED_MINUTES_PER_DAY,
        TimeUnit::Hours | TimeUnit::ElapsedHours => amount * MINUTES_PER_HOUR,
        _ => amount,
    };

    let converted = match to {
        TimeUnit::Hours | TimeUnit::ElapsedHours => minutes / MINUTES_PER_HOUR,
        TimeUnit::Days => divide_or_zero(minutes, defaults.minutes_per_day),
        TimeUnit::ElapsedDays => minutes / ELAPSED_MINUTES_PER_DAY,
        TimeUnit::Weeks => divide_or_zero(minutes, defaults.minutes_per_week),
        TimeUnit::ElapsedWeeks => minutes / ELAPSED_MINUTES_PER_WEEK,
        TimeUnit::Months => divide_or_zero(minutes, defaults.minutes_per_month()),
        TimeUnit::ElapsedMonths => minutes / ELAPSED_MINUTES_PER_MONTH,
        TimeUnit::Years => divide_or_zero(minutes, defaults.minutes_per_year()),
        TimeUnit::ElapsedYears => minutes / ELAPSED_MINUTES_PER_YEAR,
        _ => minutes,
    };

    Duration::new(converted, to)
}

fn divide_or_zero(value: f64, divisor: f64) -> f64 {
    if divisor == 0.0 { 0.0 } else { value / divisor }
}

/// Rounds to a fixed number of decimal places, half away from zero.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
