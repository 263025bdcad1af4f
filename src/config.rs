//! Serializable descriptions of calendars and project settings, loadable
//! from JSON.

use crate::calendar::{Calendar, CalendarError, CalendarException, CalendarSet, DayType, TimeRange};
use crate::context::ProjectContext;
use crate::recurrence::RecurringData;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("calendar error: {0}")]
    Calendar(#[from] CalendarError),
    #[error("exception in calendar '{calendar}' has neither dates nor recurrence")]
    MissingExceptionDates { calendar: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayConfig {
    pub day: Weekday,
    pub day_type: DayType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hours: Vec<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hours: Vec<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurringData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_unique_id: Option<i32>,
    /// Weekdays not listed defer to the parent calendar.
    #[serde(default)]
    pub days: Vec<DayConfig>,
    #[serde(default)]
    pub exceptions: Vec<ExceptionConfig>,
    #[serde(default)]
    pub resources: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_per_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_per_week: Option<f64>,
}

impl ExceptionConfig {
    fn to_exception(&self, calendar: &str) -> ConfigResult<CalendarException> {
        if let Some(recurrence) = &self.recurrence {
            return Ok(CalendarException::from_recurrence(
                recurrence.clone(),
                self.hours.clone(),
                self.name.clone(),
            ));
        }

        let from = self.from.or(self.to).ok_or_else(|| ConfigError::MissingExceptionDates {
            calendar: calendar.to_string(),
        })?;
        let mut exception = CalendarException::new(from, self.to.unwrap_or(from));
        exception.hours = self.hours.clone();
        exception.name = self.name.clone();
        Ok(exception)
    }
}

impl From<&CalendarException> for ExceptionConfig {
    fn from(exception: &CalendarException) -> Self {
        Self {
            from: Some(exception.from),
            to: Some(exception.to),
            name: exception.name.clone(),
            hours: exception.hours.clone(),
            recurrence: exception.recurrence.clone(),
        }
    }
}

impl Calendar {
    pub fn from_config(config: &CalendarConfig) -> ConfigResult<Self> {
        let mut calendar = Calendar::new(config.name.clone());
        calendar.unique_id = config.unique_id;
        calendar.parent_unique_id = config.parent_unique_id;
        calendar.minutes_per_day = config.minutes_per_day;
        calendar.minutes_per_week = config.minutes_per_week;

        for day in &config.days {
            calendar.set_day_type(day.day, day.day_type);
            calendar.set_hours(day.day, day.hours.clone());
        }
        for exception in &config.exceptions {
            calendar.add_exception(exception.to_exception(&config.name)?);
        }
        for resource in &config.resources {
            calendar.add_resource(*resource);
        }
        Ok(calendar)
    }

    pub fn to_config(&self) -> CalendarConfig {
        CalendarConfig::from(self)
    }
}

impl From<&Calendar> for CalendarConfig {
    fn from(calendar: &Calendar) -> Self {
        let days = Calendar::WEEKDAYS
            .into_iter()
            .filter(|day| calendar.day_type(*day) != DayType::Default || !calendar.hours(*day).is_empty())
            .map(|day| DayConfig {
                day,
                day_type: calendar.day_type(day),
                hours: calendar.hours(day).to_vec(),
            })
            .collect();

        Self {
            name: calendar.name.clone(),
            unique_id: calendar.unique_id,
            parent_unique_id: calendar.parent_unique_id,
            days,
            exceptions: calendar.exceptions().iter().map(ExceptionConfig::from).collect(),
            resources: calendar.resources().iter().copied().collect(),
            minutes_per_day: calendar.minutes_per_day,
            minutes_per_week: calendar.minutes_per_week,
        }
    }
}

/// Project settings together with the calendars they apply to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterchangeConfig {
    #[serde(default)]
    pub context: ProjectContext,
    #[serde(default)]
    pub calendars: Vec<CalendarConfig>,
}

impl InterchangeConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the calendar set, resolving parents by unique id.
    pub fn build_calendars(&self) -> ConfigResult<CalendarSet> {
        let mut builder = CalendarSet::builder().with_defaults(self.context.defaults);
        for config in &self.calendars {
            builder.add(Calendar::from_config(config)?);
        }
        Ok(builder.build()?)
    }
}

pub fn load_config_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<InterchangeConfig> {
    let file = File::open(path.as_ref())?;
    let config: InterchangeConfig = serde_json::from_reader(io::BufReader::new(file))?;
    tracing::debug!(
        path = %path.as_ref().display(),
        calendars = config.calendars.len(),
        "loaded interchange config"
    );
    Ok(config)
}

pub fn save_config_to_json<P: AsRef<Path>>(config: &InterchangeConfig, path: P) -> ConfigResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;
    Ok(())
}
