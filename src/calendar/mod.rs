//! Working-time calendars: weekly hours, dated exceptions and inheritance
//! from a parent calendar.
//!
//! Calendars are plain values collected into a [`CalendarSet`]; parents are
//! referenced by [`CalendarId`] handles resolved once when the set is built.
//! All queries go through the borrowed [`ProjectCalendar`] view.

mod query;
mod set;

pub use query::ProjectCalendar;
pub use set::{CalendarError, CalendarId, CalendarSet, CalendarSetBuilder};

use crate::recurrence::{RecurrenceType, RecurringData};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

pub(crate) const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    NonWorking,
    Working,
    /// Defer to the parent calendar.
    Default,
}

/// A span of working time within one day. An `end` of 00:00 means the end
/// of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Range from whole hours, e.g. `TimeRange::hours(8, 12)`. 24 is midnight.
    pub fn hours(start: u32, end: u32) -> Self {
        Self {
            start: hm(start % 24, 0),
            end: hm(end % 24, 0),
        }
    }

    pub fn ends_at_midnight(&self) -> bool {
        self.end == NaiveTime::MIN
    }

    pub fn duration_millis(&self) -> i64 {
        millis_in_range(self.start, self.end)
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_millis() as f64 / 60_000.0
    }
}

/// A dated override of the weekly pattern. Empty `hours` make the period
/// non-working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarException {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub hours: Vec<TimeRange>,
    #[serde(default)]
    pub recurrence: Option<RecurringData>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CalendarException {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        Self {
            from,
            to,
            hours: Vec::new(),
            recurrence: None,
            name: None,
        }
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Builds an exception from recurrence data. A daily recurrence with
    /// frequency one collapses to a plain date range.
    pub fn from_recurrence(data: RecurringData, hours: Vec<TimeRange>, name: Option<String>) -> Self {
        let first = data.first_date().unwrap_or(data.start_date);
        let last = data.last_date().unwrap_or(first);

        let mut exception = Self::new(first, last);
        exception.hours = hours;
        exception.name = name;
        exception.recurrence = data.simplify();
        exception
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn add_hours(&mut self, range: TimeRange) {
        self.hours.push(range);
    }

    pub fn is_working(&self) -> bool {
        !self.hours.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn recurrence_type(&self) -> Option<RecurrenceType> {
        self.recurrence.as_ref().map(|r| r.recurrence_type)
    }

    /// The exception as it applies to individual dates: itself when it does
    /// not recur, otherwise one single-day exception per occurrence.
    pub fn expanded(&self) -> Vec<CalendarException> {
        match &self.recurrence {
            None => vec![self.clone()],
            Some(data) => data.expand(&self.hours, self.name.as_deref()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Calendar {
    pub name: String,
    pub unique_id: Option<i32>,
    /// Unique id of the parent calendar, resolved when the set is built.
    pub parent_unique_id: Option<i32>,
    day_types: [DayType; 7],
    hours: [Vec<TimeRange>; 7],
    exceptions: Vec<CalendarException>,
    resources: BTreeSet<i32>,
    pub minutes_per_day: Option<f64>,
    pub minutes_per_week: Option<f64>,
    parent: Option<CalendarId>,
    expanded: OnceLock<Vec<CalendarException>>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new("")
    }
}

impl Calendar {
    /// Weekday index order used for the per-day tables.
    pub const WEEKDAYS: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    /// An empty calendar: every weekday defers to the parent.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_id: None,
            parent_unique_id: None,
            day_types: [DayType::Default; 7],
            hours: Default::default(),
            exceptions: Vec::new(),
            resources: BTreeSet::new(),
            minutes_per_day: None,
            minutes_per_week: None,
            parent: None,
            expanded: OnceLock::new(),
        }
    }

    /// Monday to Friday, 08:00-12:00 and 13:00-17:00.
    pub fn standard() -> Self {
        let mut calendar = Self::new("Standard");
        for day in Self::WEEKDAYS {
            match day {
                Weekday::Sat | Weekday::Sun => calendar.set_day_type(day, DayType::NonWorking),
                _ => {
                    calendar.set_day_type(day, DayType::Working);
                    calendar.set_hours(day, vec![TimeRange::hours(8, 12), TimeRange::hours(13, 17)]);
                }
            }
        }
        calendar
    }

    pub fn with_unique_id(mut self, unique_id: i32) -> Self {
        self.unique_id = Some(unique_id);
        self
    }

    pub fn with_parent_unique_id(mut self, parent_unique_id: i32) -> Self {
        self.parent_unique_id = Some(parent_unique_id);
        self
    }

    pub fn day_type(&self, day: Weekday) -> DayType {
        self.day_types[weekday_index(day)]
    }

    pub fn set_day_type(&mut self, day: Weekday, day_type: DayType) {
        self.day_types[weekday_index(day)] = day_type;
    }

    /// Marks a weekday working or non-working without touching its hours.
    pub fn set_working_day(&mut self, day: Weekday, working: bool) {
        let day_type = if working { DayType::Working } else { DayType::NonWorking };
        self.set_day_type(day, day_type);
    }

    pub fn hours(&self, day: Weekday) -> &[TimeRange] {
        &self.hours[weekday_index(day)]
    }

    pub fn set_hours(&mut self, day: Weekday, mut ranges: Vec<TimeRange>) {
        ranges.sort_by_key(|r| r.start);
        self.hours[weekday_index(day)] = ranges;
    }

    pub fn add_hours(&mut self, day: Weekday, range: TimeRange) {
        let hours = &mut self.hours[weekday_index(day)];
        hours.push(range);
        hours.sort_by_key(|r| r.start);
    }

    pub fn exceptions(&self) -> &[CalendarException] {
        &self.exceptions
    }

    pub fn add_exception(&mut self, exception: CalendarException) {
        self.exceptions.push(exception);
        self.expanded = OnceLock::new();
    }

    pub fn clear_exceptions(&mut self) {
        self.exceptions.clear();
        self.expanded = OnceLock::new();
    }

    pub fn resources(&self) -> &BTreeSet<i32> {
        &self.resources
    }

    pub fn add_resource(&mut self, resource_id: i32) {
        self.resources.insert(resource_id);
    }

    pub fn remove_resource(&mut self, resource_id: i32) {
        self.resources.remove(&resource_id);
    }

    pub fn parent(&self) -> Option<CalendarId> {
        self.parent
    }

    pub fn is_derived(&self) -> bool {
        self.parent.is_some()
    }

    /// A derived calendar owned by exactly one resource.
    pub fn is_personal(&self) -> bool {
        self.is_derived() && self.resources.len() == 1
    }

    pub(crate) fn set_parent(&mut self, parent: Option<CalendarId>) {
        self.parent = parent;
    }

    /// Exceptions flattened to the periods they cover, sorted by start date.
    /// Recurring exceptions are overlaid weekly, monthly, yearly, then daily,
    /// and one-off exceptions override all of them.
    pub fn expanded_exceptions(&self) -> &[CalendarException] {
        self.expanded
            .get_or_init(|| expand_exceptions(&self.exceptions))
    }
}

fn expand_exceptions(exceptions: &[CalendarException]) -> Vec<CalendarException> {
    let mut one_off = Vec::new();
    let mut recurring: Vec<(RecurrenceType, Vec<CalendarException>)> = Vec::new();

    for exception in exceptions {
        let mut expanded = exception.expanded();
        match (expanded.len(), exception.recurrence_type()) {
            (1, _) | (_, None) => one_off.append(&mut expanded),
            (_, Some(recurrence_type)) => recurring.push((recurrence_type, expanded)),
        }
    }
    recurring.sort_by_key(|(recurrence_type, _)| recurrence_type.overlay_rank());

    // Widest one-off ranges first so narrower ones are carved out of them.
    one_off.sort_by_key(|exception| std::cmp::Reverse(exception.to - exception.from));

    let mut by_date: BTreeMap<NaiveDate, CalendarException> = BTreeMap::new();
    for (_, expanded) in recurring {
        for exception in expanded {
            overlay_exception(&mut by_date, exception);
        }
    }
    for exception in one_off {
        overlay_exception(&mut by_date, exception);
    }

    by_date.into_values().collect()
}

/// Inserts `exception`, trimming or splitting whatever it overlaps so the
/// map stays a set of disjoint ranges.
fn overlay_exception(by_date: &mut BTreeMap<NaiveDate, CalendarException>, exception: CalendarException) {
    let overlapping: Vec<NaiveDate> = by_date
        .range(..=exception.to)
        .filter(|(_, existing)| existing.to >= exception.from)
        .map(|(date, _)| *date)
        .collect();

    for date in overlapping {
        let Some(existing) = by_date.remove(&date) else {
            continue;
        };
        if existing.from < exception.from {
            if let Some(to) = exception.from.pred_opt() {
                let before = CalendarException { to, ..existing.clone() };
                by_date.insert(before.from, before);
            }
        }
        if existing.to > exception.to {
            if let Some(from) = exception.to.succ_opt() {
                let after = CalendarException { from, ..existing };
                by_date.insert(after.from, after);
            }
        }
    }

    by_date.insert(exception.from, exception);
}

pub(crate) fn weekday_index(day: Weekday) -> usize {
    day.num_days_from_sunday() as usize
}

pub(crate) fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

pub(crate) fn millis_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) * 1000 + i64::from(time.nanosecond() / 1_000_000)
}

/// Length of `start..end` where an `end` of 00:00 is the end of the day.
pub(crate) fn millis_in_range(start: NaiveTime, end: NaiveTime) -> i64 {
    let end = if end == NaiveTime::MIN {
        MILLIS_PER_DAY
    } else {
        millis_of_day(end)
    };
    let length = end - millis_of_day(start);
    if length < 0 { length + MILLIS_PER_DAY } else { length }
}

/// Midnight at the start of the instant's day.
pub fn day_start(instant: NaiveDateTime) -> NaiveDateTime {
    instant.date().and_time(NaiveTime::MIN)
}

/// The instant on `instant`'s date at `time`.
pub fn set_time(instant: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    instant.date().and_time(time)
}

/// Like [`set_time`], but a finish time of 00:00 means midnight at the end
/// of the day, i.e. the start of the following day.
pub fn set_end_time(instant: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    let date = instant.date();
    if time == NaiveTime::MIN {
        date.checked_add_days(Days::new(1))
            .unwrap_or(date)
            .and_time(NaiveTime::MIN)
    } else {
        date.and_time(time)
    }
}

pub(crate) fn same_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.year() == b.year() && a.ordinal() == b.ordinal()
}
