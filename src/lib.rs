//! Calendars, durations and timephased data for exchanging project schedules.

pub mod calendar;
pub mod config;
pub mod context;
pub mod duration;
pub mod recurrence;
pub mod timephased;
pub mod xsd;

pub use calendar::{
    Calendar, CalendarError, CalendarException, CalendarId, CalendarSet, CalendarSetBuilder,
    DayType, ProjectCalendar, TimeRange,
};
pub use config::{CalendarConfig, ConfigError, InterchangeConfig};
pub use context::{Diagnostics, ParseError, ProjectContext};
pub use duration::{Duration, TimeUnit, TimeUnitDefaults, convert_units};
pub use recurrence::{RecurrenceType, RecurringData, WeekdaySet};
pub use timephased::{
    TimephasedAssembler, TimephasedCost, TimephasedNormaliser, TimephasedSegment, TimephasedWork,
};
pub use xsd::{XsdDuration, parse_duration_string};
