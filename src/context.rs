//! Project-wide settings passed explicitly to every operation that needs
//! them, plus the tolerated-parse-error policy.

use crate::duration::{Duration, TimeUnit, TimeUnitDefaults};
use crate::xsd::XsdDuration;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    Duration,
    DateTime,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Duration => write!(f, "duration"),
            ParseErrorKind::DateTime => write!(f, "date/time"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("invalid {kind} literal '{literal}'{}", location_suffix(.location))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub literal: String,
    pub location: Option<String>,
}

fn location_suffix(location: &Option<String>) -> String {
    location
        .as_deref()
        .map(|location| format!(" at {location}"))
        .unwrap_or_default()
}

/// Parse failures that were absorbed instead of returned.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<ParseError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectContext {
    pub default_duration_unit: TimeUnit,
    pub ignore_parse_errors: bool,
    pub defaults: TimeUnitDefaults,
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self {
            default_duration_unit: TimeUnit::Days,
            ignore_parse_errors: true,
            defaults: TimeUnitDefaults::default(),
        }
    }
}

impl ProjectContext {
    pub fn new(default_duration_unit: TimeUnit, defaults: TimeUnitDefaults) -> Self {
        Self {
            default_duration_unit,
            defaults,
            ..Self::default()
        }
    }

    /// Parses a duration literal into `unit`, or the project default unit.
    /// An empty value is simply absent.
    pub fn parse_duration(
        &self,
        value: &str,
        unit: Option<TimeUnit>,
        location: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Duration>, ParseError> {
        if value.is_empty() {
            return Ok(None);
        }

        match XsdDuration::parse(value) {
            Some(xsd) => {
                let target = unit.unwrap_or(self.default_duration_unit);
                Ok(Some(xsd.to_duration(target, &self.defaults)))
            }
            None => self.tolerate(ParseErrorKind::Duration, value, location, diagnostics),
        }
    }

    /// Prints a duration, omitting absent and zero values.
    pub fn print_duration(&self, duration: Option<&Duration>, compatible: bool) -> Option<String> {
        match duration {
            Some(duration) if !duration.is_zero() => {
                Some(self.print_duration_mandatory(Some(duration), compatible))
            }
            _ => None,
        }
    }

    /// Prints a duration in hours. An absent value prints as zero hours.
    pub fn print_duration_mandatory(&self, duration: Option<&Duration>, compatible: bool) -> String {
        let Some(duration) = duration else {
            return XsdDuration::default().print(compatible);
        };

        let duration = match duration.unit() {
            TimeUnit::Hours | TimeUnit::ElapsedHours => *duration,
            _ => duration.convert_units(TimeUnit::Hours, &self.defaults),
        };
        XsdDuration::from_duration(&duration).print(compatible)
    }

    pub fn parse_datetime(
        &self,
        value: &str,
        location: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<NaiveDateTime>, ParseError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }

        for format in DATETIME_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(Some(parsed));
            }
        }

        if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(Some(midnight));
        }

        self.tolerate(ParseErrorKind::DateTime, value, location, diagnostics)
    }

    fn tolerate<T>(
        &self,
        kind: ParseErrorKind,
        literal: &str,
        location: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<T>, ParseError> {
        let error = ParseError {
            kind,
            literal: literal.to_string(),
            location: location.map(str::to_string),
        };

        if self.ignore_parse_errors {
            tracing::warn!(kind = %kind, literal, location, "ignoring malformed value");
            diagnostics.record(error);
            Ok(None)
        } else {
            Err(error)
        }
    }
}
